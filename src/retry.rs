//! Linear backoff between fetch attempts
//!
//! Attempt `0` runs immediately. Every later attempt `n` waits
//! `initial_delay + (n - 1) * delay_increment`, optionally with jitter.

use crate::config::RetryConfig;
use crate::error::FetchError;
use rand::Rng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Delay to wait before the given zero-based attempt, without jitter
pub fn delay_for_attempt(config: &RetryConfig, attempt: u32) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }
    config
        .initial_delay
        .saturating_add(config.delay_increment.saturating_mul(attempt - 1))
}

/// Sleep for the backoff that precedes `attempt`
///
/// Returns [`FetchError::Cancelled`] as soon as `cancel` fires, without waiting out
/// the remaining delay.
pub async fn wait_before_attempt(
    config: &RetryConfig,
    attempt: u32,
    cancel: &CancellationToken,
) -> Result<(), FetchError> {
    let base = delay_for_attempt(config, attempt);
    if base.is_zero() {
        return if cancel.is_cancelled() {
            Err(FetchError::Cancelled)
        } else {
            Ok(())
        };
    }

    let delay = if config.jitter { add_jitter(base) } else { base };

    tracing::debug!(
        attempt,
        delay_ms = delay.as_millis() as u64,
        "Waiting before next fetch attempt"
    );

    tokio::select! {
        _ = cancel.cancelled() => Err(FetchError::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

/// Add random jitter to a delay to prevent thundering herd
///
/// Jitter is uniformly distributed between 0% and 100% of the delay, so the
/// actual delay lies between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
