use crate::error::{TrendError, TrendResult};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Per-interval statistics channels (daily or five-minute).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntervalStats {
    pub means: Vec<f64>,
    pub mins: Vec<f64>,
    pub maxes: Vec<f64>,
    pub stds: Vec<f64>,
    pub midvals: Vec<f64>,
}

impl IntervalStats {
    fn len_check(&self, expected: usize) -> TrendResult<()> {
        let channels = [
            ("means", self.means.len()),
            ("mins", self.mins.len()),
            ("maxes", self.maxes.len()),
            ("stds", self.stds.len()),
            ("midvals", self.midvals.len()),
        ];
        for (name, len) in channels {
            if len != expected {
                return Err(TrendError::InvalidSeries(format!(
                    "{name} has {len} samples but times has {expected}"
                )));
            }
        }
        Ok(())
    }

    fn select(&self, keep: &[bool]) -> Self {
        Self {
            means: select(&self.means, keep),
            mins: select(&self.mins, keep),
            maxes: select(&self.maxes, keep),
            stds: select(&self.stds, keep),
            midvals: select(&self.midvals, keep),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Channels {
    Raw { values: Vec<f64> },
    Stats(IntervalStats),
}

/// Every channel has one entry per timestamp and timestamps never decrease.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    msid: String,
    times: Vec<f64>,
    channels: Channels,
}

/// Extremes and spread of a series, over its primary channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub max: f64,
    pub min: f64,
    pub mean: f64,
    pub std: f64,
    pub first_time: f64,
    pub last_time: f64,
}

impl TimeSeries {
    pub fn raw(msid: impl Into<String>, times: Vec<f64>, values: Vec<f64>) -> TrendResult<Self> {
        Self::new(msid.into(), times, Channels::Raw { values })
    }

    pub fn stats(msid: impl Into<String>, times: Vec<f64>, stats: IntervalStats) -> TrendResult<Self> {
        Self::new(msid.into(), times, Channels::Stats(stats))
    }

    /// An empty statistics series, used when the archive does not know the
    /// parameter.
    pub fn empty(msid: impl Into<String>) -> Self {
        Self {
            msid: msid.into(),
            times: Vec::new(),
            channels: Channels::Stats(IntervalStats::default()),
        }
    }

    fn new(msid: String, times: Vec<f64>, channels: Channels) -> TrendResult<Self> {
        match &channels {
            Channels::Raw { values } => {
                if values.len() != times.len() {
                    return Err(TrendError::InvalidSeries(format!(
                        "values has {} samples but times has {}",
                        values.len(),
                        times.len()
                    )));
                }
            }
            Channels::Stats(stats) => stats.len_check(times.len())?,
        }
        if times.iter().any(|t| !t.is_finite()) {
            return Err(TrendError::InvalidSeries(
                "timestamps must be finite".to_string(),
            ));
        }
        if let Some(idx) = times.windows(2).position(|pair| pair[1] < pair[0]) {
            return Err(TrendError::InvalidSeries(format!(
                "timestamps decrease at index {}",
                idx + 1
            )));
        }
        Ok(Self {
            msid,
            times,
            channels,
        })
    }

    pub fn msid(&self) -> &str {
        &self.msid
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn channels(&self) -> &Channels {
        &self.channels
    }

    pub fn interval_stats(&self) -> Option<&IntervalStats> {
        match &self.channels {
            Channels::Stats(stats) => Some(stats),
            Channels::Raw { .. } => None,
        }
    }

    /// Primary value channel: raw values, or interval midpoints.
    pub fn values(&self) -> &[f64] {
        match &self.channels {
            Channels::Raw { values } => values,
            Channels::Stats(stats) => &stats.midvals,
        }
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Derived series keeping only samples where `keep` is true.
    pub fn select(&self, keep: &[bool]) -> TrendResult<Self> {
        if keep.len() != self.times.len() {
            return Err(TrendError::InvalidSeries(format!(
                "mask has {} entries but series has {}",
                keep.len(),
                self.times.len()
            )));
        }
        Ok(self.filtered(keep))
    }

    /// Derived series without samples inside `[start, stop]` (inclusive).
    pub fn excluding(&self, start: f64, stop: f64) -> Self {
        let keep: Vec<bool> = self.times.iter().map(|t| *t < start || *t > stop).collect();
        self.filtered(&keep)
    }

    fn filtered(&self, keep: &[bool]) -> Self {
        let channels = match &self.channels {
            Channels::Raw { values } => Channels::Raw {
                values: select(values, keep),
            },
            Channels::Stats(stats) => Channels::Stats(stats.select(keep)),
        };
        Self {
            msid: self.msid.clone(),
            times: select(&self.times, keep),
            channels,
        }
    }

    pub fn summary(&self) -> Option<SeriesSummary> {
        let (first_time, last_time) = (*self.times.first()?, *self.times.last()?);
        let (max, min) = match &self.channels {
            Channels::Raw { values } => (finite_max(values), finite_min(values)),
            Channels::Stats(stats) => (finite_max(&stats.maxes), finite_min(&stats.mins)),
        };
        let primary: Vec<f64> = match &self.channels {
            Channels::Raw { values } => values.iter().copied().filter(|v| v.is_finite()).collect(),
            Channels::Stats(stats) => stats
                .means
                .iter()
                .copied()
                .filter(|v| v.is_finite())
                .collect(),
        };
        if primary.is_empty() {
            return None;
        }
        Some(SeriesSummary {
            max: max?,
            min: min?,
            mean: primary.iter().mean(),
            std: primary.iter().population_std_dev(),
            first_time,
            last_time,
        })
    }
}

fn select(values: &[f64], keep: &[bool]) -> Vec<f64> {
    values
        .iter()
        .zip(keep)
        .filter_map(|(v, k)| k.then_some(*v))
        .collect()
}

pub(crate) fn finite_max(values: &[f64]) -> Option<f64> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
}

pub(crate) fn finite_min(values: &[f64]) -> Option<f64> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.min(v))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::daily_series;

    #[test]
    fn raw_series_rejects_mismatched_channels() {
        let err = TimeSeries::raw("tephin", vec![0.0, 1.0], vec![1.0]).unwrap_err();
        assert_eq!(err.code(), "invalid_series");
    }

    #[test]
    fn stats_series_rejects_mismatched_channels() {
        let stats = IntervalStats {
            means: vec![1.0, 2.0],
            mins: vec![1.0, 2.0],
            maxes: vec![1.0],
            stds: vec![0.0, 0.0],
            midvals: vec![1.0, 2.0],
        };
        let err = TimeSeries::stats("tephin", vec![0.0, 1.0], stats).unwrap_err();
        assert!(err.to_string().contains("maxes"));
    }

    #[test]
    fn series_rejects_decreasing_times() {
        let err = TimeSeries::raw("tephin", vec![0.0, 2.0, 1.0], vec![1.0, 2.0, 3.0]).unwrap_err();
        assert!(err.to_string().contains("index 2"));
    }

    #[test]
    fn excluding_drops_samples_on_every_channel() {
        let series = daily_series("pm1thv2t", &[0.0, 1.0, 2.0, 3.0, 4.0], |t| t * 10.0);
        let trimmed = series.excluding(1.0, 2.5);
        assert_eq!(trimmed.times(), &[0.0, 3.0, 4.0]);
        let stats = trimmed.interval_stats().unwrap();
        assert_eq!(stats.means, vec![0.0, 30.0, 40.0]);
        assert_eq!(stats.maxes.len(), 3);
        assert_eq!(stats.midvals.len(), 3);
        assert_eq!(series.len(), 5);
    }

    #[test]
    fn select_rejects_wrong_mask_length() {
        let series = TimeSeries::raw("tephin", vec![0.0, 1.0], vec![1.0, 2.0]).unwrap();
        assert!(series.select(&[true]).is_err());
    }

    #[test]
    fn summary_uses_extreme_channels_for_stats_series() {
        let series = daily_series("pm1thv2t", &[0.0, 1.0, 2.0], |t| t);
        let summary = series.summary().unwrap();
        // daily_series spreads max/min one unit around the mean.
        assert_eq!(summary.max, 3.0);
        assert_eq!(summary.min, -1.0);
        assert!((summary.mean - 1.0).abs() < 1e-12);
        assert_eq!(summary.first_time, 0.0);
        assert_eq!(summary.last_time, 2.0);
    }

    #[test]
    fn summary_of_empty_series_is_none() {
        assert!(TimeSeries::empty("tephin").summary().is_none());
    }

    #[test]
    fn empty_series_carries_empty_statistics() {
        let series = TimeSeries::empty("tephin");
        assert!(series.is_empty());
        assert_eq!(series.interval_stats(), Some(&IntervalStats::default()));
    }
}
