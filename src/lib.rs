//! Monthly trending of engineering telemetry (MSIDs): windowed aggregation,
//! line fits over the trailing windows, safety-limit resolution and prediction
//! of when a trend reaches a caution or warning threshold.

pub mod batch;
pub mod config;
pub mod daily;
pub mod error;
pub mod fit;
pub mod forecast;
pub mod limits;
pub mod logging;
pub mod predict;
pub mod resample;
pub mod series;
pub mod sources;
pub mod time;

#[cfg(test)]
pub mod test_support;

pub use batch::{run_batch, MsidOutcome, MsidReport};
pub use config::{ExcludedInterval, ForecastConfig};
pub use error::{SourceError, TrendError, TrendResult};
pub use fit::{Statistic, TrendFit};
pub use forecast::{ForecastState, TrendForecast};
pub use limits::{LimitKind, LimitOrigin, LimitSet, Threshold};
pub use predict::{CrossingResult, NoCrossingReason};
pub use resample::AggregateWindow;
pub use series::{IntervalStats, TimeSeries};
pub use sources::{FetchMode, LimitLookup, Sources, TelemetryFetch};
