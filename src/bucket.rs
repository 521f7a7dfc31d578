//! Wall-clock bucket alignment.

use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the start of the bucket containing `timestamp_secs`.
///
/// Uses floor division so negative timestamps land in the bucket below
/// rather than rounding towards zero. A non-positive `step_secs` leaves the
/// timestamp untouched.
#[must_use]
pub fn align_floor(timestamp_secs: i64, step_secs: i64) -> i64 {
    if step_secs <= 0 {
        return timestamp_secs;
    }
    timestamp_secs.div_euclid(step_secs) * step_secs
}

/// Millisecond variant of [`align_floor`]; the step is still in seconds.
#[must_use]
pub fn align_floor_ms(timestamp_ms: i64, step_secs: i64) -> i64 {
    align_floor(timestamp_ms.div_euclid(1000), step_secs) * 1000
}

/// Current wall-clock time in milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
