use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn since_unix_epoch() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

/// Current Unix time in whole seconds. A clock before the epoch reads as 0.
pub fn current_unix_timestamp() -> u64 {
    since_unix_epoch().as_secs()
}

/// Current Unix time in milliseconds, saturated into `u64`.
pub fn current_unix_timestamp_ms() -> u64 {
    u64::try_from(since_unix_epoch().as_millis()).unwrap_or(u64::MAX)
}

/// Returns true when `deadline_unix_ms` is present and no longer in the
/// future. Used to gate benchmark windows and probe staleness.
pub fn is_expired_unix_ms(deadline_unix_ms: Option<u64>, now_unix_ms: u64) -> bool {
    matches!(deadline_unix_ms, Some(value) if value <= now_unix_ms)
}
