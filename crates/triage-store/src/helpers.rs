//! Time and expiry helpers shared by both backends.
//!
//! Expiry columns are unix epoch milliseconds so `expires_at > now` comparisons
//! stay numeric in SQL.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::StoreError;

/// `now + ttl`, saturating at the far future.
#[must_use]
pub fn expiry_after(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// `now - age`, saturating at the far past. Rows last touched at or before
/// this instant are at least `age` old.
#[must_use]
pub fn finished_cutoff(now: DateTime<Utc>, age: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(age)
        .ok()
        .and_then(|age| now.checked_sub_signed(age))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Convert a stored millisecond timestamp back to `DateTime<Utc>`.
///
/// # Errors
///
/// Returns `StoreError::Query` if the value is outside chrono's range.
pub fn from_millis(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::Query(format!("timestamp out of range: {ms}")))
}

/// Parse a TEXT column into a serde-deserializable string newtype or enum.
///
/// Works with `ModelName` and the `snake_case` `JobStatus`.
///
/// # Errors
///
/// Returns `StoreError::Query` if the string does not deserialize into `T`.
pub fn parse_text<T: serde::de::DeserializeOwned>(s: &str) -> Result<T, StoreError> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|e| StoreError::Query(format!("Failed to parse '{s}': {e}")))
}
