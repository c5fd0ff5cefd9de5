//! Timestamp helpers
//!
//! All timestamps in the workspace are Unix milliseconds (`i64`). Local
//! receipt times come from the wall clock; provider timestamps arrive as
//! decimal strings.

use chrono::Utc;

/// Provider timestamps below this are taken to be in seconds.
const SECONDS_CUTOFF: i64 = 100_000_000_000;

/// Current wall-clock time in Unix milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Parse a provider timestamp string into Unix milliseconds.
///
/// Returns `None` for empty or non-numeric input. Second-resolution values
/// are scaled up to milliseconds.
pub fn parse_timestamp_ms(raw: &str) -> Option<i64> {
    let value: i64 = raw.trim().parse().ok()?;
    if value < 0 {
        return None;
    }
    if value < SECONDS_CUTOFF {
        value.checked_mul(1000)
    } else {
        Some(value)
    }
}
