use crate::error::{TrendError, TrendResult};
use crate::series::{finite_max, finite_min, IntervalStats, TimeSeries};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Archive statistics interval. The five-minute archive interval is 328 s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatInterval {
    FiveMin,
    Daily,
}

impl StatInterval {
    pub fn seconds(&self) -> f64 {
        match self {
            StatInterval::FiveMin => 328.0,
            StatInterval::Daily => 86_400.0,
        }
    }
}

/// Reduces a full-resolution series to per-interval statistics.
///
/// The sample count per interval is derived from the mean sample spacing, so
/// this assumes the raw series has no dropouts. A trailing partial interval is
/// discarded.
pub fn summarize(series: &TimeSeries, interval: StatInterval) -> TrendResult<TimeSeries> {
    let times = series.times();
    let values = series.values();
    if times.len() < 2 {
        return Err(TrendError::insufficient(2, times.len()));
    }

    let spacing = (times[times.len() - 1] - times[0]) / (times.len() - 1) as f64;
    if !(spacing > 0.0) {
        return Err(TrendError::InvalidSeries(
            "samples share a single timestamp; spacing is undefined".to_string(),
        ));
    }

    let pts = ((interval.seconds() / spacing).round() as usize).max(1);
    let count = times.len() / pts;
    if count == 0 {
        return Err(TrendError::insufficient(pts, times.len()));
    }

    let mut out_times = Vec::with_capacity(count);
    let mut stats = IntervalStats {
        means: Vec::with_capacity(count),
        mins: Vec::with_capacity(count),
        maxes: Vec::with_capacity(count),
        stds: Vec::with_capacity(count),
        midvals: Vec::with_capacity(count),
    };

    for (chunk_times, chunk_values) in times.chunks_exact(pts).zip(values.chunks_exact(pts)) {
        out_times.push(chunk_times.iter().mean());
        stats.means.push(chunk_values.iter().mean());
        stats.mins.push(finite_min(chunk_values).unwrap_or(f64::NAN));
        stats.maxes.push(finite_max(chunk_values).unwrap_or(f64::NAN));
        stats.stds.push(chunk_values.iter().population_std_dev());
        stats.midvals.push(chunk_values[pts / 2]);
    }

    tracing::debug!(
        msid = %series.msid(),
        samples = times.len(),
        per_interval = pts,
        intervals = count,
        "summarized full-resolution telemetry"
    );

    TimeSeries::stats(series.msid(), out_times, stats)
}
