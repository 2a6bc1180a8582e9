use crate::error::{TrendError, TrendResult};
use crate::series::{finite_max, finite_min, TimeSeries};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

pub const DEFAULT_WINDOW_LEN: usize = 30;
pub const DEFAULT_OUTLIER_STDDEV: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResampleOptions {
    pub window_len: usize,
    pub reject_outliers: bool,
    pub outlier_stddev: f64,
}

impl Default for ResampleOptions {
    fn default() -> Self {
        Self {
            window_len: DEFAULT_WINDOW_LEN,
            reject_outliers: true,
            outlier_stddev: DEFAULT_OUTLIER_STDDEV,
        }
    }
}

/// One aggregation window ("month").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateWindow {
    pub time: f64,
    pub max: f64,
    pub min: f64,
    pub mean: f64,
}

/// Keep-mask for one channel: finite samples within `factor` population
/// standard deviations of the channel mean.
pub fn outlier_mask(values: &[f64], factor: f64) -> Vec<bool> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return vec![false; values.len()];
    }
    let mean = finite.iter().mean();
    let limit = finite.iter().population_std_dev() * factor;
    values
        .iter()
        .map(|v| v.is_finite() && (v - mean).abs() <= limit)
        .collect()
}

/// Combined keep-mask across the mean, min and max channels. A sample flagged
/// on any channel is dropped from all of them.
pub fn combined_mask(series: &TimeSeries, options: &ResampleOptions) -> TrendResult<Vec<bool>> {
    let stats = series.interval_stats().ok_or_else(|| {
        TrendError::InvalidSeries(format!(
            "{} carries raw samples; monthly aggregation needs interval statistics",
            series.msid()
        ))
    })?;

    if !options.reject_outliers {
        return Ok(vec![true; series.len()]);
    }

    let keep_mean = outlier_mask(&stats.means, options.outlier_stddev);
    let keep_min = outlier_mask(&stats.mins, options.outlier_stddev);
    let keep_max = outlier_mask(&stats.maxes, options.outlier_stddev);
    Ok(keep_mean
        .iter()
        .zip(&keep_min)
        .zip(&keep_max)
        .map(|((a, b), c)| *a && *b && *c)
        .collect())
}

/// Start indices of each window, newest first.
fn window_starts(kept: usize, window_len: usize) -> impl Iterator<Item = usize> {
    let first = kept.checked_sub(window_len);
    std::iter::successors(first, move |start| start.checked_sub(window_len))
        .take_while(|start| *start > 0)
}

/// Windows are anchored at the newest sample. Start indices run `kept - W,
/// kept - 2W, ...` while above zero, so `L` samples give `floor((L - 1) / W)`
/// windows; older leftovers are dropped.
pub fn aggregate(series: &TimeSeries, options: &ResampleOptions) -> TrendResult<Vec<AggregateWindow>> {
    if options.window_len == 0 {
        return Err(TrendError::InvalidSeries(
            "aggregation window must hold at least one sample".to_string(),
        ));
    }

    let keep = combined_mask(series, options)?;
    let filtered = series.select(&keep)?;
    let dropped = series.len() - filtered.len();
    if dropped > 0 {
        tracing::debug!(msid = %series.msid(), dropped, "rejected outlier samples");
    }

    let Some(stats) = filtered.interval_stats() else {
        return Err(TrendError::InvalidSeries(format!(
            "{} lost its interval statistics while filtering",
            series.msid()
        )));
    };
    let times = filtered.times();
    let w = options.window_len;

    let mut windows: Vec<AggregateWindow> = window_starts(times.len(), w)
        .map(|start| {
            let range = start..start + w;
            AggregateWindow {
                time: times[range.clone()].iter().mean(),
                max: finite_max(&stats.maxes[range.clone()]).unwrap_or(f64::NAN),
                min: finite_min(&stats.mins[range.clone()]).unwrap_or(f64::NAN),
                mean: stats.means[range].iter().mean(),
            }
        })
        .collect();
    windows.reverse();

    if windows.is_empty() {
        return Err(TrendError::insufficient(w + 1, times.len()));
    }

    tracing::debug!(
        msid = %series.msid(),
        samples = times.len(),
        windows = windows.len(),
        "aggregated monthly windows"
    );
    Ok(windows)
}
