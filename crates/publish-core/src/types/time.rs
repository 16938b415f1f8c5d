//! Nanosecond epoch helpers.
//!
//! Every persisted timestamp is an `i64` count of nanoseconds since the Unix
//! epoch. Schedule times arrive on the wire as whole seconds.

use std::time::Duration;

use chrono::Utc;

/// Nanoseconds per second.
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Current wall-clock time in epoch nanoseconds.
pub fn now_nanos() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}

/// Scale epoch seconds to epoch nanoseconds, or `None` on overflow.
pub fn seconds_to_nanos(seconds: i64) -> Option<i64> {
    seconds.checked_mul(NANOS_PER_SECOND)
}

/// Convert a duration to nanoseconds, saturating at `i64::MAX`.
pub fn duration_nanos(duration: Duration) -> i64 {
    i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX)
}

/// Elapsed time between two epoch-nanosecond stamps, zero if negative.
pub fn elapsed(from: i64, to: i64) -> Duration {
    Duration::from_nanos(u64::try_from(to.saturating_sub(from)).unwrap_or(0))
}
