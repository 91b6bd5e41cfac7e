use chrono::{DateTime, TimeDelta, Utc};

use crate::db::StoreError;

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn to_ms(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

/// `ts + minutes`, saturating at the representable range instead of panicking.
pub fn add_minutes(ts: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
    let bound = if minutes < 0 {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    };
    TimeDelta::try_minutes(minutes)
        .and_then(|delta| ts.checked_add_signed(delta))
        .unwrap_or(bound)
}

pub fn from_ms(column: &'static str, ms: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::Corrupt(format!("{column} out of range: {ms}")))
}
