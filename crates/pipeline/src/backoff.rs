//! Backoff policy for chunk retries.

use std::time::Duration;

use crate::config::RetrySettings;

/// Delay to wait after the given failed attempt (1-based).
///
/// Exponential: `initial * multiplier^(attempt - 1)`, capped at the
/// configured maximum. Pure function of its inputs so the policy can be
/// tested apart from any retry loop.
pub fn backoff_delay(attempt: u32, settings: &RetrySettings) -> Duration {
    let exponent = attempt.saturating_sub(1).min(63);
    let delay =
        settings.initial_backoff_ms as f64 * settings.backoff_multiplier.powi(exponent as i32);
    let capped = delay.min(settings.max_backoff_ms as f64);
    Duration::from_millis(capped as u64)
}
