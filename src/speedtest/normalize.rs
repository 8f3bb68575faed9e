use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use serde_json::Value;

use crate::error::SpeedTestError;

/// Timestamp as handed back by a provider: either a UNIX epoch in seconds or
/// an ISO-8601 string.
#[derive(Debug, Clone, PartialEq)]
pub enum RawTimestamp {
    Numeric(f64),
    Text(String),
}

impl TryFrom<&Value> for RawTimestamp {
    type Error = SpeedTestError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Number(n) => n
                .as_f64()
                .map(RawTimestamp::Numeric)
                .ok_or_else(|| SpeedTestError::InvalidTimestamp(value.to_string())),
            Value::String(s) => Ok(RawTimestamp::Text(s.clone())),
            other => Err(SpeedTestError::InvalidTimestamp(other.to_string())),
        }
    }
}

/// Bits per second to megabits per second, rounded half away from zero to
/// two decimals.
pub fn to_mbps(bits_per_second: f64) -> f64 {
    if !bits_per_second.is_finite() || bits_per_second <= 0.0 {
        return 0.0;
    }
    (bits_per_second / 1_000_000.0 * 100.0).round() / 100.0
}

pub fn normalize_timestamp(raw: &RawTimestamp) -> Result<DateTime<FixedOffset>, SpeedTestError> {
    match raw {
        RawTimestamp::Numeric(secs) => from_epoch(*secs),
        RawTimestamp::Text(text) => from_iso8601(text),
    }
}

fn from_epoch(secs: f64) -> Result<DateTime<FixedOffset>, SpeedTestError> {
    let invalid = || SpeedTestError::InvalidTimestamp(secs.to_string());
    if !secs.is_finite() {
        return Err(invalid());
    }

    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
    Local
        .timestamp_opt(whole as i64, nanos)
        .single()
        .map(|dt| dt.fixed_offset())
        .ok_or_else(invalid)
}

/// Extended and basic ISO-8601 layouts carrying an explicit offset. `%#z`
/// accepts `+HH`, `+HHMM` and `+HH:MM`.
const OFFSET_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S%.f%#z",
    "%Y-%m-%d %H:%M:%S%.f%#z",
    "%Y-%m-%dT%H:%M%#z",
    "%Y%m%dT%H%M%S%.f%#z",
    "%Y%m%dT%H%M%#z",
];

const NAIVE_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y%m%dT%H%M%S%.f",
    "%Y%m%dT%H%M",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y%m%d"];

fn from_iso8601(text: &str) -> Result<DateTime<FixedOffset>, SpeedTestError> {
    let trimmed = text.trim();
    let cleaned = match trimmed.strip_suffix('Z').or_else(|| trimmed.strip_suffix('z')) {
        Some(stem) => format!("{stem}+00:00"),
        None => trimmed.to_string(),
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&cleaned) {
        return Ok(dt);
    }
    if let Some(dt) = OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(&cleaned, fmt).ok())
    {
        return Ok(dt);
    }

    // No offset: read as local wall-clock time, dates at midnight.
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&cleaned, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(&cleaned, fmt).ok())
                .map(|date| date.and_time(NaiveTime::MIN))
        })
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .map(|dt| dt.fixed_offset())
        .ok_or_else(|| SpeedTestError::InvalidTimestamp(text.to_string()))
}
