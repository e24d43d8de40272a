//! Wall-clock helpers
//!
//! All timestamps in quotacrab are milliseconds since the Unix epoch, stored as `i64`.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current time in milliseconds since the Unix epoch
///
/// A clock set before the epoch reads as `0` rather than failing the request.
pub fn now_millis() -> i64 {
    to_millis(SystemTime::now())
}

/// Convert a `SystemTime` to milliseconds since the Unix epoch
pub fn to_millis(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => duration_millis(elapsed),
        Err(_) => 0,
    }
}

/// Convert a `Duration` to whole milliseconds, saturating at `i64::MAX`
pub fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
