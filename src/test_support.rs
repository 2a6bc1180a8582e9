use crate::error::SourceError;
use crate::limits::LimitSet;
use crate::series::{IntervalStats, TimeSeries};
use crate::sources::{FetchMode, LimitLookup, TelemetryFetch};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Daily-statistics series with `means = f(t)`, max/min one unit either side and
/// a constant 0.5 spread.
pub fn daily_series(msid: &str, times: &[f64], f: impl Fn(f64) -> f64) -> TimeSeries {
    let means: Vec<f64> = times.iter().map(|t| f(*t)).collect();
    let stats = IntervalStats {
        mins: means.iter().map(|m| m - 1.0).collect(),
        maxes: means.iter().map(|m| m + 1.0).collect(),
        stds: vec![0.5; means.len()],
        midvals: means.clone(),
        means,
    };
    TimeSeries::stats(msid, times.to_vec(), stats).unwrap()
}

pub fn with_max_spike(series: TimeSeries, index: usize, value: f64) -> TimeSeries {
    let mut stats = series.interval_stats().cloned().unwrap();
    stats.maxes[index] = value;
    TimeSeries::stats(series.msid(), series.times().to_vec(), stats).unwrap()
}

/// In-memory archive. Unknown MSIDs report not-found.
#[derive(Default)]
pub struct MemoryArchive {
    series: HashMap<String, TimeSeries>,
    failures: HashMap<String, SourceError>,
    fetches: AtomicUsize,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, series: TimeSeries) -> Self {
        self.series.insert(series.msid().to_string(), series);
        self
    }

    pub fn with_failure(mut self, msid: &str, err: SourceError) -> Self {
        self.failures.insert(msid.to_string(), err);
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl TelemetryFetch for MemoryArchive {
    fn fetch(
        &self,
        msid: &str,
        _start: DateTime<Utc>,
        _stop: DateTime<Utc>,
        _mode: FetchMode,
    ) -> Result<TimeSeries, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failures.get(msid) {
            return Err(err.clone());
        }
        self.series
            .get(msid)
            .cloned()
            .ok_or_else(|| SourceError::not_found(msid))
    }
}

/// In-memory limit source. Unknown MSIDs have no limits.
#[derive(Default)]
pub struct StaticLimits {
    limits: HashMap<String, LimitSet>,
    failures: HashMap<String, SourceError>,
}

impl StaticLimits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(mut self, msid: &str, limits: LimitSet) -> Self {
        self.limits.insert(msid.to_string(), limits);
        self
    }

    pub fn with_failure(mut self, msid: &str, err: SourceError) -> Self {
        self.failures.insert(msid.to_string(), err);
        self
    }
}

impl LimitLookup for StaticLimits {
    fn lookup(&self, msid: &str) -> Result<Option<LimitSet>, SourceError> {
        if let Some(err) = self.failures.get(msid) {
            return Err(err.clone());
        }
        Ok(self.limits.get(msid).copied())
    }
}
