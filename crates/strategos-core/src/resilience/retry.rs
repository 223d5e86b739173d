//! Retry backoff schedule

use std::time::Duration;

/// Base delay for the first retry.
pub const BASE_DELAY_MS: u64 = 1000;

/// Ceiling applied to the exponential schedule.
pub const MAX_DELAY_MS: u64 = 30_000;

/// Delay before retry number `attempt` (zero-based).
///
/// Doubles from one second per attempt and caps at thirty seconds:
/// 1s, 2s, 4s, 8s, 16s, 30s, 30s, ...
#[must_use]
pub fn backoff_delay(attempt: u32) -> Duration {
    let multiplier = 2u64.saturating_pow(attempt);
    let millis = BASE_DELAY_MS.saturating_mul(multiplier).min(MAX_DELAY_MS);
    Duration::from_millis(millis)
}
