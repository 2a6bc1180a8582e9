use crate::config::ForecastConfig;
use crate::daily::{self, StatInterval};
use crate::error::{SourceError, TrendError, TrendResult};
use crate::fit::{self, Statistic, TrendFit};
use crate::limits::{self, LimitKind, LimitOrigin, LimitOverride, LimitSet, Resolution, Side, Threshold};
use crate::predict::{self, CrossingResult, NoCrossingReason};
use crate::resample::{self, AggregateWindow};
use crate::series::{Channels, IntervalStats, TimeSeries};
use crate::sources::{FetchMode, LimitLookup, Sources, TelemetryFetch};
use crate::time;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastState {
    Constructed,
    SeriesLoaded,
    LimitsResolved,
    Ready,
    Failed,
}

impl ForecastState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForecastState::Constructed => "constructed",
            ForecastState::SeriesLoaded => "series_loaded",
            ForecastState::LimitsResolved => "limits_resolved",
            ForecastState::Ready => "ready",
            ForecastState::Failed => "failed",
        }
    }
}

/// `Constructed -> SeriesLoaded -> LimitsResolved -> Ready`, or `Failed`.
#[derive(Debug, Clone)]
pub struct TrendForecast {
    msid: String,
    config: ForecastConfig,
    state: ForecastState,
    failure: Option<String>,
    series: TimeSeries,
    safety: Resolution,
    trending: Option<LimitSet>,
    windows: Vec<AggregateWindow>,
}

impl TrendForecast {
    /// A forecast built from an invalid configuration starts out `Failed`.
    pub fn new(msid: impl Into<String>, config: ForecastConfig) -> Self {
        let msid = msid.into();
        let (state, failure) = match config.validate() {
            Ok(()) => (ForecastState::Constructed, None),
            Err(err) => {
                tracing::warn!(msid = %msid, "invalid forecast configuration: {err:#}");
                (ForecastState::Failed, Some(format!("invalid configuration: {err:#}")))
            }
        };
        Self {
            series: TimeSeries::empty(msid.clone()),
            msid,
            config,
            state,
            failure,
            safety: Resolution::default(),
            trending: None,
            windows: Vec::new(),
        }
    }

    /// Runs every stage against `sources`.
    pub fn build(msid: impl Into<String>, config: ForecastConfig, sources: &Sources) -> TrendResult<Self> {
        let mut forecast = Self::new(msid, config);
        forecast.load_series(sources.telemetry.as_ref())?;
        forecast.resolve_limits(
            sources.primary_limits.as_ref(),
            sources.secondary_limits.as_ref(),
            sources.trending_limits.as_deref(),
        )?;
        forecast.prepare()?;
        Ok(forecast)
    }

    pub fn msid(&self) -> &str {
        &self.msid
    }

    pub fn state(&self) -> ForecastState {
        self.state
    }

    /// Failure message once the forecast is `Failed`.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    fn require(&self, expected: ForecastState) -> TrendResult<()> {
        match self.state {
            state if state == expected => Ok(()),
            ForecastState::Failed => Err(TrendError::Failed {
                msid: self.msid.clone(),
                reason: self.failure.clone().unwrap_or_default(),
            }),
            state => Err(TrendError::InvalidState {
                expected: expected.as_str(),
                actual: state.as_str(),
            }),
        }
    }

    fn fail(&mut self, err: TrendError) -> TrendError {
        tracing::warn!(msid = %self.msid, code = err.code(), "forecast failed: {err}");
        self.state = ForecastState::Failed;
        self.failure = Some(err.to_string());
        err
    }

    pub fn load_series(&mut self, telemetry: &dyn TelemetryFetch) -> TrendResult<()> {
        self.require(ForecastState::Constructed)?;

        let stop = self.config.stop_or(Utc::now());
        let mode = self.config.fetch_mode;
        let fetched = match telemetry.fetch(&self.msid, self.config.start, stop, mode) {
            Ok(series) => series,
            Err(SourceError::NotFound { .. }) => {
                tracing::warn!(msid = %self.msid, "not found in archive; using empty series");
                TimeSeries::empty(self.msid.clone())
            }
            Err(err) => return Err(self.fail(TrendError::from_source(&self.msid, err))),
        };

        let is_raw = matches!(fetched.channels(), Channels::Raw { .. });
        let mut series = if is_raw {
            match self.summarize_raw(&fetched, mode) {
                Ok(series) => series,
                Err(err) => return Err(self.fail(err)),
            }
        } else {
            fetched
        };

        for interval in &self.config.excluded_intervals {
            let before = series.len();
            series = series.excluding(time::to_seconds(interval.start), time::to_seconds(interval.stop));
            tracing::debug!(
                msid = %self.msid,
                start = %interval.start,
                stop = %interval.stop,
                removed = before - series.len(),
                "applied excluded interval"
            );
        }

        tracing::debug!(msid = %self.msid, samples = series.len(), "series loaded");
        self.series = series;
        self.state = ForecastState::SeriesLoaded;
        Ok(())
    }

    fn summarize_raw(&self, raw: &TimeSeries, mode: FetchMode) -> TrendResult<TimeSeries> {
        let interval = match mode {
            FetchMode::Stats(interval) => interval,
            FetchMode::Full => StatInterval::Daily,
        };
        match daily::summarize(raw, interval) {
            Ok(series) => Ok(series),
            Err(TrendError::InsufficientData { required, actual }) => {
                tracing::debug!(
                    msid = %self.msid,
                    required,
                    actual,
                    "too few raw samples for one statistics interval"
                );
                TimeSeries::stats(self.msid.clone(), Vec::new(), IntervalStats::default())
            }
            Err(err) => Err(err),
        }
    }

    pub fn resolve_limits(
        &mut self,
        primary: &dyn LimitLookup,
        secondary: &dyn LimitLookup,
        trending: Option<&dyn LimitLookup>,
    ) -> TrendResult<()> {
        self.require(ForecastState::SeriesLoaded)?;

        let primary = match self.lookup(primary, "primary") {
            Ok(limits) => limits.map(|l| l.with_origin(LimitOrigin::Tdb)),
            Err(err) => return Err(self.fail(err)),
        };
        let secondary = match self.lookup(secondary, "secondary") {
            Ok(limits) => limits.map(|l| l.with_origin(LimitOrigin::Secondary)),
            Err(err) => return Err(self.fail(err)),
        };
        let trending = match trending.map(|source| self.lookup(source, "trending")) {
            None => None,
            Some(Ok(limits)) => limits.map(|l| l.with_origin(LimitOrigin::Trending)),
            Some(Err(err)) => return Err(self.fail(err)),
        };

        self.safety = limits::resolve(&self.msid, primary, secondary);
        if self.safety.limits.is_none() {
            tracing::debug!(msid = %self.msid, "no safety limits known");
        }
        self.trending = trending;
        self.state = ForecastState::LimitsResolved;
        Ok(())
    }

    fn lookup(&self, source: &dyn LimitLookup, label: &'static str) -> TrendResult<Option<LimitSet>> {
        match source.lookup(&self.msid) {
            Ok(limits) => Ok(limits),
            Err(SourceError::NotFound { .. }) => {
                tracing::warn!(msid = %self.msid, source = label, "no limit record; treating as empty");
                Ok(None)
            }
            Err(err) => Err(TrendError::from_source(&self.msid, err)),
        }
    }

    /// Computes the monthly windows. Too little data is not a failure here; the
    /// fit queries report it instead.
    pub fn prepare(&mut self) -> TrendResult<()> {
        self.require(ForecastState::LimitsResolved)?;

        self.windows = match resample::aggregate(&self.series, &self.config.resample_options()) {
            Ok(windows) => windows,
            Err(TrendError::InsufficientData { required, actual }) => {
                tracing::debug!(msid = %self.msid, required, actual, "no complete windows");
                Vec::new()
            }
            Err(err) => return Err(self.fail(err)),
        };
        self.state = ForecastState::Ready;
        Ok(())
    }

    pub fn series(&self) -> &TimeSeries {
        &self.series
    }

    pub fn windows(&self) -> TrendResult<&[AggregateWindow]> {
        self.require(ForecastState::Ready)?;
        Ok(&self.windows)
    }

    pub fn safety_limits(&self) -> Option<&LimitSet> {
        self.safety.limits.as_ref()
    }

    pub fn trending_limits(&self) -> Option<&LimitSet> {
        self.trending.as_ref()
    }

    pub fn limits(&self, kind: LimitKind) -> Option<&LimitSet> {
        match kind {
            LimitKind::Safety => self.safety_limits(),
            LimitKind::Trending => self.trending_limits(),
        }
    }

    pub fn overrides(&self) -> &[LimitOverride] {
        &self.safety.overrides
    }

    pub fn fit(&self, statistic: Statistic) -> TrendResult<TrendFit> {
        self.require(ForecastState::Ready)?;
        fit::fit(&self.windows, statistic, self.config.trend_months)
    }

    pub fn value_at(&self, date: DateTime<Utc>, statistic: Statistic) -> TrendResult<f64> {
        let fit = self.fit(statistic)?;
        Ok(predict::value_at(&fit, date))
    }

    /// Crossing of `threshold` from `kind`. High thresholds use the max-series
    /// fit and low thresholds the min-series fit.
    pub fn crossing_date(&self, threshold: Threshold, kind: LimitKind) -> TrendResult<CrossingResult> {
        self.require(ForecastState::Ready)?;
        let Some(limits) = self.limits(kind) else {
            return Ok(CrossingResult::NoCrossing {
                reason: NoCrossingReason::NoLimits,
            });
        };
        let statistic = match threshold.side() {
            Side::High => Statistic::Max,
            Side::Low => Statistic::Min,
        };
        let fit = self.fit(statistic)?;
        predict::crossing(&fit, threshold, limits.get(threshold), self.config.num_stddev)
    }
}
