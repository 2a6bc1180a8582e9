//! Collaborator interfaces. Archive access and limit-file parsing live outside
//! this crate; implementations only hand over already-decoded values.

use crate::daily::StatInterval;
use crate::error::SourceError;
use crate::limits::LimitSet;
use crate::series::TimeSeries;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// Full-resolution samples.
    Full,
    /// Archive interval statistics.
    Stats(StatInterval),
}

impl Default for FetchMode {
    fn default() -> Self {
        FetchMode::Stats(StatInterval::Daily)
    }
}

impl FromStr for FetchMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "full" | "none" => Ok(FetchMode::Full),
            "daily" => Ok(FetchMode::Stats(StatInterval::Daily)),
            "5min" | "five_min" => Ok(FetchMode::Stats(StatInterval::FiveMin)),
            _ => Err(format!("unknown fetch mode {raw:?}")),
        }
    }
}

pub trait TelemetryFetch: Send + Sync {
    fn fetch(
        &self,
        msid: &str,
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
        mode: FetchMode,
    ) -> Result<TimeSeries, SourceError>;
}

/// Key-value limit lookup. `Ok(None)` means the source has no limits for the
/// parameter.
pub trait LimitLookup: Send + Sync {
    fn lookup(&self, msid: &str) -> Result<Option<LimitSet>, SourceError>;
}

/// Everything a forecast needs from the outside world.
#[derive(Clone)]
pub struct Sources {
    pub telemetry: Arc<dyn TelemetryFetch>,
    pub primary_limits: Arc<dyn LimitLookup>,
    pub secondary_limits: Arc<dyn LimitLookup>,
    pub trending_limits: Option<Arc<dyn LimitLookup>>,
}
