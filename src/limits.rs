use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitOrigin {
    Tdb,
    Secondary,
    Trending,
    Resolved,
}

impl LimitOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitOrigin::Tdb => "tdb",
            LimitOrigin::Secondary => "secondary",
            LimitOrigin::Trending => "trending",
            LimitOrigin::Resolved => "resolved",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Low,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Threshold {
    WarningLow,
    CautionLow,
    CautionHigh,
    WarningHigh,
}

impl Threshold {
    pub const ALL: [Threshold; 4] = [
        Threshold::WarningLow,
        Threshold::CautionLow,
        Threshold::CautionHigh,
        Threshold::WarningHigh,
    ];

    pub fn side(&self) -> Side {
        match self {
            Threshold::WarningLow | Threshold::CautionLow => Side::Low,
            Threshold::CautionHigh | Threshold::WarningHigh => Side::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Threshold::WarningLow => "warning_low",
            Threshold::CautionLow => "caution_low",
            Threshold::CautionHigh => "caution_high",
            Threshold::WarningHigh => "warning_high",
        }
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Threshold {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        Threshold::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| format!("unknown threshold {raw:?}"))
    }
}

/// Which limit set a crossing prediction is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitKind {
    /// Resolved TDB/secondary set.
    Safety,
    /// Separately maintained trending set.
    Trending,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LimitSet {
    pub origin: LimitOrigin,
    pub warning_low: f64,
    pub caution_low: f64,
    pub caution_high: f64,
    pub warning_high: f64,
}

impl LimitSet {
    pub fn new(
        origin: LimitOrigin,
        warning_low: f64,
        caution_low: f64,
        caution_high: f64,
        warning_high: f64,
    ) -> Self {
        Self {
            origin,
            warning_low,
            caution_low,
            caution_high,
            warning_high,
        }
    }

    pub fn get(&self, threshold: Threshold) -> f64 {
        match threshold {
            Threshold::WarningLow => self.warning_low,
            Threshold::CautionLow => self.caution_low,
            Threshold::CautionHigh => self.caution_high,
            Threshold::WarningHigh => self.warning_high,
        }
    }

    fn set(&mut self, threshold: Threshold, value: f64) {
        match threshold {
            Threshold::WarningLow => self.warning_low = value,
            Threshold::CautionLow => self.caution_low = value,
            Threshold::CautionHigh => self.caution_high = value,
            Threshold::WarningHigh => self.warning_high = value,
        }
    }

    /// `warning_low <= caution_low <= caution_high <= warning_high`.
    pub fn is_ordered(&self) -> bool {
        self.warning_low <= self.caution_low
            && self.caution_low <= self.caution_high
            && self.caution_high <= self.warning_high
    }

    pub fn with_origin(mut self, origin: LimitOrigin) -> Self {
        self.origin = origin;
        self
    }
}

/// One threshold replaced during resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LimitOverride {
    pub threshold: Threshold,
    pub previous: f64,
    pub value: f64,
    pub source: LimitOrigin,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Resolution {
    /// `None` means no known limits for the parameter.
    pub limits: Option<LimitSet>,
    pub overrides: Vec<LimitOverride>,
}

fn more_permissive(side: Side, current: f64, candidate: f64) -> bool {
    match side {
        Side::Low => candidate < current,
        Side::High => candidate > current,
    }
}

/// Merges TDB and secondary limits, keeping the more permissive bound per
/// threshold: the lower low and the higher high.
pub fn resolve(msid: &str, primary: Option<LimitSet>, secondary: Option<LimitSet>) -> Resolution {
    let (mut merged, other) = match (primary, secondary) {
        (None, None) => return Resolution::default(),
        (Some(only), None) | (None, Some(only)) => {
            return Resolution {
                limits: Some(only.with_origin(LimitOrigin::Resolved)),
                overrides: Vec::new(),
            }
        }
        (Some(primary), Some(secondary)) => (primary, secondary),
    };

    let mut overrides = Vec::new();
    for threshold in Threshold::ALL {
        let current = merged.get(threshold);
        let candidate = other.get(threshold);
        if more_permissive(threshold.side(), current, candidate) {
            merged.set(threshold, candidate);
            tracing::info!(
                msid,
                threshold = threshold.as_str(),
                previous = current,
                value = candidate,
                source = other.origin.as_str(),
                "updated safety limit"
            );
            overrides.push(LimitOverride {
                threshold,
                previous: current,
                value: candidate,
                source: other.origin,
            });
        }
    }

    let merged = merged.with_origin(LimitOrigin::Resolved);
    if !merged.is_ordered() {
        tracing::warn!(msid, ?merged, "resolved limits are not monotonically ordered");
    }

    Resolution {
        limits: Some(merged),
        overrides,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tdb(wl: f64, cl: f64, ch: f64, wh: f64) -> LimitSet {
        LimitSet::new(LimitOrigin::Tdb, wl, cl, ch, wh)
    }

    fn secondary(wl: f64, cl: f64, ch: f64, wh: f64) -> LimitSet {
        LimitSet::new(LimitOrigin::Secondary, wl, cl, ch, wh)
    }

    #[test]
    fn resolve_takes_permissive_bound_per_threshold() {
        let resolution = resolve(
            "pm1thv2t",
            Some(tdb(-10.0, -5.0, 40.0, 45.0)),
            Some(secondary(-8.0, -6.0, 38.0, 50.0)),
        );
        let limits = resolution.limits.unwrap();
        assert_eq!(limits.origin, LimitOrigin::Resolved);
        assert_eq!(limits.warning_low, -10.0);
        assert_eq!(limits.caution_low, -6.0);
        assert_eq!(limits.caution_high, 40.0);
        assert_eq!(limits.warning_high, 50.0);

        let overridden: Vec<Threshold> =
            resolution.overrides.iter().map(|o| o.threshold).collect();
        assert_eq!(overridden, vec![Threshold::CautionLow, Threshold::WarningHigh]);
        assert_eq!(resolution.overrides[0].previous, -5.0);
        assert_eq!(resolution.overrides[0].source, LimitOrigin::Secondary);
    }

    #[test]
    fn resolve_is_symmetric_in_values() {
        let a = tdb(-10.0, -5.0, 40.0, 45.0);
        let b = secondary(-8.0, -6.0, 38.0, 50.0);
        let ab = resolve("pm1thv2t", Some(a), Some(b));
        let ba = resolve("pm1thv2t", Some(b), Some(a));
        assert_eq!(ab.limits, ba.limits);
        assert_ne!(ab.overrides, ba.overrides);
    }

    #[test]
    fn resolve_empty_sources() {
        assert_eq!(resolve("pm1thv2t", None, None), Resolution::default());
    }

    #[test]
    fn resolve_single_source_passes_values_through() {
        let only_secondary = resolve("pm1thv2t", None, Some(secondary(1.0, 2.0, 3.0, 4.0)));
        let limits = only_secondary.limits.unwrap();
        assert_eq!(limits.origin, LimitOrigin::Resolved);
        assert_eq!(
            (limits.warning_low, limits.caution_low, limits.caution_high, limits.warning_high),
            (1.0, 2.0, 3.0, 4.0)
        );
        assert!(only_secondary.overrides.is_empty());

        let only_tdb = resolve("pm1thv2t", Some(tdb(1.0, 2.0, 3.0, 4.0)), None);
        assert_eq!(only_tdb.limits.unwrap().warning_high, 4.0);
    }

    #[test]
    fn resolve_keeps_primary_when_secondary_is_stricter() {
        let resolution = resolve(
            "pm1thv2t",
            Some(tdb(-10.0, -5.0, 40.0, 45.0)),
            Some(secondary(-9.0, -4.0, 39.0, 44.0)),
        );
        assert!(resolution.overrides.is_empty());
        assert_eq!(resolution.limits.unwrap().warning_low, -10.0);
    }

    #[test]
    fn threshold_parses_case_insensitively() {
        assert_eq!("WARNING_HIGH".parse::<Threshold>(), Ok(Threshold::WarningHigh));
        assert_eq!(" caution_low ".parse::<Threshold>(), Ok(Threshold::CautionLow));
        assert!("redline".parse::<Threshold>().is_err());
    }

    #[test]
    fn threshold_sides() {
        assert_eq!(Threshold::WarningLow.side(), Side::Low);
        assert_eq!(Threshold::CautionHigh.side(), Side::High);
    }
}
