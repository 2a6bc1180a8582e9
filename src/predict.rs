use crate::error::{TrendError, TrendResult};
use crate::fit::TrendFit;
use crate::limits::{Side, Threshold};
use crate::time::{self, HORIZON_SECONDS, PAST_HORIZON_SECONDS};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoCrossingReason {
    /// The trend moves away from (or parallel to) the threshold.
    SlopeAway { slope: f64, side: Side },
    /// No limit set is known for the requested kind.
    NoLimits,
}

impl fmt::Display for NoCrossingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoCrossingReason::SlopeAway { slope, side } => {
                let side = match side {
                    Side::Low => "low",
                    Side::High => "high",
                };
                write!(f, "slope is {slope:e}, so no {side} limit cross")
            }
            NoCrossingReason::NoLimits => f.write_str("no known limits"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CrossingResult {
    /// Trend reaches the adjusted threshold at `seconds`.
    Crossing { seconds: f64 },
    /// Trend reaches the threshold only at or after 3000-01-01.
    BeyondHorizon,
    /// Trend already reached the threshold at or before 1900-01-01.
    BeforeHorizon,
    NoCrossing { reason: NoCrossingReason },
}

impl CrossingResult {
    /// Reported crossing date. Beyond-horizon outcomes report the sentinel.
    pub fn date(&self) -> Option<DateTime<Utc>> {
        match self {
            CrossingResult::Crossing { seconds } => time::from_seconds(*seconds),
            CrossingResult::BeyondHorizon => Some(time::horizon()),
            CrossingResult::BeforeHorizon => Some(time::past_horizon()),
            CrossingResult::NoCrossing { .. } => None,
        }
    }

    pub fn seconds(&self) -> Option<f64> {
        match self {
            CrossingResult::Crossing { seconds } => Some(*seconds),
            CrossingResult::BeyondHorizon => Some(HORIZON_SECONDS),
            CrossingResult::BeforeHorizon => Some(PAST_HORIZON_SECONDS),
            CrossingResult::NoCrossing { .. } => None,
        }
    }

    pub fn is_crossing(&self) -> bool {
        !matches!(self, CrossingResult::NoCrossing { .. })
    }
}

pub fn value_at(fit: &TrendFit, date: DateTime<Utc>) -> f64 {
    fit.value_at_seconds(time::to_seconds(date))
}

/// Threshold pulled toward the data by `safety_factor` residual deviations:
/// high limits move down, low limits move up.
pub fn adjusted_threshold(threshold: Threshold, value: f64, stddev: f64, safety_factor: f64) -> f64 {
    match threshold.side() {
        Side::High => value - stddev * safety_factor,
        Side::Low => value + stddev * safety_factor,
    }
}

/// Crossing of `value` by the fitted line. Times outside 1900..3000 collapse
/// to the horizon sentinels.
pub fn crossing(
    fit: &TrendFit,
    threshold: Threshold,
    value: f64,
    safety_factor: f64,
) -> TrendResult<CrossingResult> {
    let inputs = [
        ("slope", fit.slope),
        ("intercept", fit.intercept),
        ("residual stddev", fit.residual_stddev),
        ("limit", value),
        ("safety factor", safety_factor),
    ];
    if let Some((name, bad)) = inputs.iter().find(|(_, v)| !v.is_finite()) {
        return Err(TrendError::InvalidInput(format!(
            "{threshold} crossing needs a finite {name}, got {bad}"
        )));
    }
    if safety_factor < 0.0 {
        return Err(TrendError::InvalidInput(format!(
            "safety factor must not be negative, got {safety_factor}"
        )));
    }

    let side = threshold.side();
    let feasible = match side {
        Side::High => fit.slope > 0.0,
        Side::Low => fit.slope < 0.0,
    };
    if !feasible {
        return Ok(CrossingResult::NoCrossing {
            reason: NoCrossingReason::SlopeAway {
                slope: fit.slope,
                side,
            },
        });
    }

    let adjusted = adjusted_threshold(threshold, value, fit.residual_stddev, safety_factor);
    let seconds = (adjusted - fit.intercept) / fit.slope;
    if seconds.is_nan() {
        return Err(TrendError::InvalidInput(format!(
            "{threshold} crossing time is undefined for adjusted limit {adjusted}"
        )));
    }
    Ok(if seconds >= HORIZON_SECONDS {
        CrossingResult::BeyondHorizon
    } else if seconds <= PAST_HORIZON_SECONDS {
        CrossingResult::BeforeHorizon
    } else {
        CrossingResult::Crossing { seconds }
    })
}
