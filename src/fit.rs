use crate::error::{TrendError, TrendResult};
use crate::resample::AggregateWindow;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    Max,
    Min,
    Mean,
}

impl Statistic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Statistic::Max => "max",
            Statistic::Min => "min",
            Statistic::Mean => "mean",
        }
    }

    pub fn of(&self, window: &AggregateWindow) -> f64 {
        match self {
            Statistic::Max => window.max,
            Statistic::Min => window.min,
            Statistic::Mean => window.mean,
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Statistic {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "max" => Ok(Statistic::Max),
            "min" => Ok(Statistic::Min),
            "mean" => Ok(Statistic::Mean),
            _ => Err(format!("unknown statistic {raw:?}; expected max, min or mean")),
        }
    }
}

/// Least-squares line `value = slope * time + intercept` through the trailing
/// windows, with the population standard deviation of its residuals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendFit {
    pub slope: f64,
    pub intercept: f64,
    pub residual_stddev: f64,
    pub points: usize,
}

impl TrendFit {
    pub fn value_at_seconds(&self, seconds: f64) -> f64 {
        self.slope * seconds + self.intercept
    }
}

/// Fits the trailing `trailing` windows of `statistic`. Uses every window when
/// fewer are available.
pub fn fit(windows: &[AggregateWindow], statistic: Statistic, trailing: usize) -> TrendResult<TrendFit> {
    let start = windows.len().saturating_sub(trailing);
    let points: Vec<(f64, f64)> = windows[start..]
        .iter()
        .map(|w| (w.time, statistic.of(w)))
        .collect();
    fit_points(&points)
}

pub fn fit_points(points: &[(f64, f64)]) -> TrendResult<TrendFit> {
    if points.len() < 2 {
        return Err(TrendError::insufficient(2, points.len()));
    }
    if points.iter().any(|(t, v)| !t.is_finite() || !v.is_finite()) {
        return Err(TrendError::InvalidSeries(
            "fit input contains non-finite values".to_string(),
        ));
    }

    // Centered sums keep precision with epoch-second abscissae.
    let time_mean = points.iter().map(|(t, _)| t).mean();
    let value_mean = points.iter().map(|(_, v)| v).mean();
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (t, v) in points {
        let dt = t - time_mean;
        sxx += dt * dt;
        sxy += dt * (v - value_mean);
    }
    if sxx <= 0.0 {
        return Err(TrendError::DegenerateFit(format!(
            "{} points share a single timestamp",
            points.len()
        )));
    }

    let slope = sxy / sxx;
    let intercept = value_mean - slope * time_mean;
    let residual_stddev = points
        .iter()
        .map(|(t, v)| v - (slope * t + intercept))
        .population_std_dev();

    Ok(TrendFit {
        slope,
        intercept,
        residual_stddev,
        points: points.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(time: f64, value: f64) -> AggregateWindow {
        AggregateWindow {
            time,
            max: value + 1.0,
            min: value - 1.0,
            mean: value,
        }
    }

    #[test]
    fn two_month_fit_is_exact() {
        let windows = [window(14.5, 24.5), window(44.5, 54.5)];
        let fit = fit(&windows, Statistic::Mean, 24).unwrap();
        assert!((fit.slope - 1.0).abs() < 1e-12);
        assert!((fit.intercept - 10.0).abs() < 1e-12);
        assert!(fit.residual_stddev.abs() < 1e-12);
        assert_eq!(fit.points, 2);
    }

    #[test]
    fn perfect_line_in_epoch_seconds_has_zero_residual() {
        let month = 30.0 * 86_400.0;
        let windows: Vec<AggregateWindow> = (0..24)
            .map(|i| {
                let t = 700_000_000.0 + i as f64 * month;
                window(t, 3.0e-7 * t - 150.0)
            })
            .collect();
        let fit = fit(&windows, Statistic::Max, 12).unwrap();
        assert!((fit.slope - 3.0e-7).abs() < 1e-15);
        assert!((fit.intercept - (-149.0)).abs() < 1e-6);
        assert!(fit.residual_stddev < 1e-9);
        assert_eq!(fit.points, 12);
    }

    #[test]
    fn trailing_windows_ignore_older_history() {
        // Older windows are flat, the last three rise by 2 per unit time.
        let mut windows: Vec<AggregateWindow> = (0..5).map(|i| window(i as f64, 0.0)).collect();
        windows.extend((5..8).map(|i| window(i as f64, 2.0 * i as f64)));
        let fit = fit(&windows, Statistic::Mean, 3).unwrap();
        assert!((fit.slope - 2.0).abs() < 1e-12);
        assert!(fit.intercept.abs() < 1e-12);
    }

    #[test]
    fn residual_stddev_uses_population_divisor() {
        // Residuals +1, -1, +1, -1 about the flat line y = 0.
        let points = [(0.0, 1.0), (1.0, -1.0), (2.0, -1.0), (3.0, 1.0)];
        let fit = fit_points(&points).unwrap();
        assert!(fit.slope.abs() < 1e-12);
        assert!((fit.residual_stddev - 1.0).abs() < 1e-12);
    }

    #[test]
    fn fewer_than_two_points_is_insufficient() {
        let err = fit(&[window(1.0, 1.0)], Statistic::Max, 24).unwrap_err();
        assert_eq!(err, TrendError::insufficient(2, 1));
        let err = fit(&[], Statistic::Max, 24).unwrap_err();
        assert_eq!(err, TrendError::insufficient(2, 0));
    }

    #[test]
    fn shared_timestamp_is_degenerate() {
        let err = fit_points(&[(5.0, 1.0), (5.0, 2.0)]).unwrap_err();
        assert_eq!(err.code(), "degenerate_fit");
    }

    #[test]
    fn statistic_parses_case_insensitively() {
        assert_eq!("MAX".parse::<Statistic>(), Ok(Statistic::Max));
        assert_eq!("Mean".parse::<Statistic>(), Ok(Statistic::Mean));
        assert!("median".parse::<Statistic>().is_err());
    }
}
