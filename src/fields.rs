//! Ordered-candidate field resolution for loosely typed documents.
//!
//! The same logical value may live under several field names depending on
//! which client wrote the record. Each resolver walks its candidates in order
//! and returns the first present, correctly typed value.

use chrono::DateTime;
use serde_json::Value;

/// First candidate holding a finite JSON number.
pub fn number_field(data: &Value, candidates: &[impl AsRef<str>]) -> Option<f64> {
    candidates
        .iter()
        .filter_map(|name| data.get(name.as_ref()))
        .find_map(|v| v.as_f64().filter(|n| n.is_finite()))
}

/// First candidate holding a non-empty string.
pub fn string_field(data: &Value, candidates: &[impl AsRef<str>]) -> Option<String> {
    candidates
        .iter()
        .filter_map(|name| data.get(name.as_ref()))
        .find_map(|v| v.as_str().filter(|s| !s.is_empty()).map(str::to_string))
}

/// First candidate that converts to epoch milliseconds.
///
/// Numbers are taken as epoch millis. Structured timestamps are either
/// `{seconds, nanos}` objects (with or without a leading underscore, as the
/// document store's JSON export writes them) or RFC 3339 strings.
pub fn timestamp_millis_field(data: &Value, candidates: &[impl AsRef<str>]) -> Option<i64> {
    candidates
        .iter()
        .filter_map(|name| data.get(name.as_ref()))
        .find_map(timestamp_millis)
}

/// Converts one JSON value to epoch millis, if it looks like a timestamp.
pub fn timestamp_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64),
        Value::Object(map) => {
            let seconds = map
                .get("seconds")
                .or_else(|| map.get("_seconds"))
                .and_then(Value::as_i64)?;
            let nanos = map
                .get("nanos")
                .or_else(|| map.get("nanoseconds"))
                .or_else(|| map.get("_nanoseconds"))
                .and_then(Value::as_i64)
                .unwrap_or(0);
            seconds.checked_mul(1000)?.checked_add(nanos / 1_000_000)
        }
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.timestamp_millis()),
        _ => None,
    }
}
