use crate::resample::{ResampleOptions, DEFAULT_OUTLIER_STDDEV, DEFAULT_WINDOW_LEN};
use crate::sources::FetchMode;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

const CONFIG_PATH_ENV: &str = "MSID_TREND_CONFIG_PATH";

/// Telemetry interval removed before aggregation (inclusive on both ends).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedInterval {
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
    #[serde(default = "default_start")]
    pub start: DateTime<Utc>,
    /// `None` fetches through the most recent archived sample.
    #[serde(default)]
    pub stop: Option<DateTime<Utc>>,
    #[serde(default = "default_trend_months")]
    pub trend_months: usize,
    #[serde(default = "default_num_stddev")]
    pub num_stddev: f64,
    #[serde(default = "default_true")]
    pub remove_outliers: bool,
    #[serde(default = "default_max_outlier_stddev")]
    pub max_outlier_stddev: f64,
    #[serde(default = "default_window_days")]
    pub window_days: usize,
    #[serde(default)]
    pub fetch_mode: FetchMode,
    #[serde(default)]
    pub excluded_intervals: Vec<ExcludedInterval>,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn default_trend_months() -> usize {
    24
}

fn default_num_stddev() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

fn default_max_outlier_stddev() -> f64 {
    DEFAULT_OUTLIER_STDDEV
}

fn default_window_days() -> usize {
    DEFAULT_WINDOW_LEN
}

fn default_max_concurrency() -> usize {
    4
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            start: default_start(),
            stop: None,
            trend_months: default_trend_months(),
            num_stddev: default_num_stddev(),
            remove_outliers: default_true(),
            max_outlier_stddev: default_max_outlier_stddev(),
            window_days: default_window_days(),
            fetch_mode: FetchMode::default(),
            excluded_intervals: Vec::new(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

/// Optional file-based settings. Explicit environment variables win.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigOverrides {
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stop: Option<DateTime<Utc>>,
    #[serde(default)]
    pub trend_months: Option<usize>,
    #[serde(default)]
    pub num_stddev: Option<f64>,
    #[serde(default)]
    pub remove_outliers: Option<bool>,
    #[serde(default)]
    pub max_outlier_stddev: Option<f64>,
    #[serde(default)]
    pub window_days: Option<usize>,
    #[serde(default)]
    pub fetch_mode: Option<FetchMode>,
    #[serde(default)]
    pub excluded_intervals: Option<Vec<ExcludedInterval>>,
    #[serde(default)]
    pub max_concurrency: Option<usize>,
}

fn overrides_path() -> Option<PathBuf> {
    env::var(CONFIG_PATH_ENV)
        .ok()
        .map(|path| path.trim().to_string())
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
}

pub fn load_overrides(path: &Path) -> Option<ConfigOverrides> {
    if !path.exists() {
        return None;
    }
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "failed to read forecast config overrides; using env defaults"
            );
            return None;
        }
    };
    match serde_json::from_str(&contents) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "failed to parse forecast config overrides; using env defaults"
            );
            None
        }
    }
}

/// Applies file overrides to every field whose environment variable was not
/// set (`env_is_set` reports that per variable name).
pub fn apply_overrides(
    config: &mut ForecastConfig,
    overrides: &ConfigOverrides,
    env_is_set: impl Fn(&str) -> bool,
) {
    let allows = |key: &str| !env_is_set(key);

    if allows("MSID_TREND_START") {
        if let Some(start) = overrides.start {
            config.start = start;
        }
    }
    if allows("MSID_TREND_STOP") {
        if let Some(stop) = overrides.stop {
            config.stop = Some(stop);
        }
    }
    if allows("MSID_TREND_MONTHS") {
        if let Some(value) = overrides.trend_months.filter(|v| *v != 0) {
            config.trend_months = value;
        }
    }
    if allows("MSID_TREND_NUM_STDDEV") {
        if let Some(value) = overrides.num_stddev {
            config.num_stddev = value;
        }
    }
    if allows("MSID_TREND_REMOVE_OUTLIERS") {
        if let Some(value) = overrides.remove_outliers {
            config.remove_outliers = value;
        }
    }
    if allows("MSID_TREND_MAX_OUTLIER_STDDEV") {
        if let Some(value) = overrides.max_outlier_stddev {
            config.max_outlier_stddev = value;
        }
    }
    if allows("MSID_TREND_WINDOW_DAYS") {
        if let Some(value) = overrides.window_days.filter(|v| *v != 0) {
            config.window_days = value;
        }
    }
    if allows("MSID_TREND_FETCH_MODE") {
        if let Some(mode) = overrides.fetch_mode {
            config.fetch_mode = mode;
        }
    }
    if let Some(intervals) = overrides.excluded_intervals.as_ref() {
        config.excluded_intervals = intervals.clone();
    }
    if allows("MSID_TREND_MAX_CONCURRENCY") {
        if let Some(value) = overrides.max_concurrency.filter(|v| *v != 0) {
            config.max_concurrency = value;
        }
    }
}

/// Parses RFC 3339 timestamps or bare `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn env_value(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_bool(raw: &str) -> bool {
    raw == "1" || raw.eq_ignore_ascii_case("true")
}

impl ForecastConfig {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let defaults = Self::default();
        let start = match env_value("MSID_TREND_START") {
            Some(raw) => parse_date(&raw)
                .with_context(|| format!("MSID_TREND_START is not a valid date: {raw}"))?,
            None => defaults.start,
        };
        let stop = match env_value("MSID_TREND_STOP") {
            Some(raw) => Some(
                parse_date(&raw)
                    .with_context(|| format!("MSID_TREND_STOP is not a valid date: {raw}"))?,
            ),
            None => None,
        };
        let trend_months = env_value("MSID_TREND_MONTHS")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults.trend_months);
        let num_stddev = env_value("MSID_TREND_NUM_STDDEV")
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(defaults.num_stddev);
        let remove_outliers = env_value("MSID_TREND_REMOVE_OUTLIERS")
            .map(|v| parse_bool(&v))
            .unwrap_or(defaults.remove_outliers);
        let max_outlier_stddev = env_value("MSID_TREND_MAX_OUTLIER_STDDEV")
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(defaults.max_outlier_stddev);
        let window_days = env_value("MSID_TREND_WINDOW_DAYS")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults.window_days);
        let fetch_mode = env_value("MSID_TREND_FETCH_MODE")
            .and_then(|v| v.parse::<FetchMode>().ok())
            .unwrap_or(defaults.fetch_mode);
        let max_concurrency = env_value("MSID_TREND_MAX_CONCURRENCY")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults.max_concurrency);

        let mut config = Self {
            start,
            stop,
            trend_months,
            num_stddev,
            remove_outliers,
            max_outlier_stddev,
            window_days,
            fetch_mode,
            excluded_intervals: Vec::new(),
            max_concurrency,
        };

        if let Some(overrides) = overrides_path().and_then(|path| load_overrides(&path)) {
            apply_overrides(&mut config, &overrides, |key| env_value(key).is_some());
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.trend_months == 0 {
            bail!("trend_months must be at least 1");
        }
        if self.window_days == 0 {
            bail!("window_days must be at least 1");
        }
        if !self.num_stddev.is_finite() || self.num_stddev < 0.0 {
            bail!("num_stddev must be a non-negative number, got {}", self.num_stddev);
        }
        if !self.max_outlier_stddev.is_finite() || self.max_outlier_stddev < 0.0 {
            bail!(
                "max_outlier_stddev must be a non-negative number, got {}",
                self.max_outlier_stddev
            );
        }
        if let Some(stop) = self.stop {
            if stop <= self.start {
                bail!("stop {stop} must be after start {}", self.start);
            }
        }
        for interval in &self.excluded_intervals {
            if interval.stop < interval.start {
                bail!(
                    "excluded interval ends before it starts: {} .. {}",
                    interval.start,
                    interval.stop
                );
            }
        }
        Ok(())
    }

    pub fn resample_options(&self) -> ResampleOptions {
        ResampleOptions {
            window_len: self.window_days,
            reject_outliers: self.remove_outliers,
            outlier_stddev: self.max_outlier_stddev,
        }
    }

    pub fn stop_or(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.stop.unwrap_or(now)
    }
}
