//! Epoch-millisecond time helpers.

use chrono::{DateTime, SecondsFormat, Utc};

/// Current wall-clock time in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Format epoch milliseconds as an ISO-8601 UTC instant.
///
/// Fractional seconds are only printed when non-zero.
pub fn iso8601_from_millis(ms: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(ms) {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        None => String::new(),
    }
}

/// Combine header seconds and milliseconds into one epoch-ms value.
///
/// Returns `None` when the seconds field is absent or not positive.
pub fn combine_seconds_millis(seconds: Option<i64>, millis: Option<i64>) -> Option<i64> {
    let seconds = seconds.filter(|s| *s > 0)?;
    Some(
        seconds
            .saturating_mul(1000)
            .saturating_add(millis.unwrap_or(0)),
    )
}
