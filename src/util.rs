use std::time;

/// Get the current system time in epoch format.
///
/// # Returns
///
/// Current system time in milliseconds from epoch, or zero if the system
/// clock is set before epoch.
#[must_use]
pub fn unix_millis() -> i64 {
    time::SystemTime::now()
        .duration_since(time::UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
        })
}

/// Get the current system time in microseconds from epoch.
///
/// Used to seed version counters so that versions keep increasing across
/// process restarts.
#[must_use]
pub fn unix_micros() -> u64 {
    time::SystemTime::now()
        .duration_since(time::UNIX_EPOCH)
        .map_or(0, |elapsed| {
            u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX)
        })
}
