use chrono::{DateTime, TimeZone, Utc};

/// Unix seconds of 3000-01-01T00:00:00Z. Crossings at or past this instant are
/// reported as beyond the prediction horizon.
pub const HORIZON_SECONDS: f64 = 32_503_680_000.0;

/// Unix seconds of 1900-01-01T00:00:00Z. Crossings at or before this instant
/// are reported as already past.
pub const PAST_HORIZON_SECONDS: f64 = -2_208_988_800.0;

pub fn to_seconds(dt: DateTime<Utc>) -> f64 {
    dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_nanos()) / 1e9
}

/// Converts fractional Unix seconds to a UTC timestamp, or `None` when the
/// value is not finite or outside chrono's range.
pub fn from_seconds(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round().clamp(0.0, 999_999_999.0) as u32;
    if whole < i64::MIN as f64 || whole > i64::MAX as f64 {
        return None;
    }
    Utc.timestamp_opt(whole as i64, nanos).single()
}

pub fn horizon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(3000, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

pub fn past_horizon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(1900, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
