// Retry utility for sampling attempts.
//
// Fixed inter-attempt delay by default; exponential growth and jitter are opt-in
// and always capped by `max_delay`.

use crate::error::ProbeError;
use rand::RngExt;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero is treated as one.
    pub max_attempts: u32,
    /// Delay between attempts.
    pub base_delay: Duration,
    /// Hard cap on the computed delay.
    pub max_delay: Duration,
    /// When true, the delay doubles after every failed attempt.
    pub exponential: bool,
    /// When true, adds random jitter of [0, base_delay/2).
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            exponential: false,
            jitter: false,
        }
    }
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            max_delay: delay.max(Duration::from_secs(5)),
            ..Self::default()
        }
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Compute the delay after a given failed attempt (0-indexed).
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = if self.exponential {
            1u32.checked_shl(attempt).unwrap_or(u32::MAX)
        } else {
            1
        };
        let delay = self
            .base_delay
            .checked_mul(multiplier)
            .unwrap_or(self.max_delay);
        let capped = delay.min(self.max_delay);

        if !self.jitter {
            return capped;
        }

        let jitter_range_ms = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX) / 2;
        let remaining_ms =
            u64::try_from(self.max_delay.saturating_sub(capped).as_millis()).unwrap_or(0);
        let jitter_limit_ms = jitter_range_ms.min(remaining_ms);
        if jitter_limit_ms == 0 {
            return capped;
        }

        let jitter_ms = rand::rng().random_range(0..jitter_limit_ms);
        (capped + Duration::from_millis(jitter_ms)).min(self.max_delay)
    }
}

/// Result of a single attempt, used by the caller to signal retryability.
pub enum RetryAction<T> {
    Success(T),
    /// Failed, another attempt may succeed.
    Retry(ProbeError),
    /// Failed for a reason another attempt cannot change.
    Fail(ProbeError),
}

impl<T> From<Result<T, ProbeError>> for RetryAction<T> {
    fn from(result: Result<T, ProbeError>) -> Self {
        match result {
            Ok(value) => RetryAction::Success(value),
            Err(err) if err.is_retryable() => RetryAction::Retry(err),
            Err(err) => RetryAction::Fail(err),
        }
    }
}

/// Execute an async operation with retry-and-backoff.
///
/// The `operation` closure receives the current attempt number (0-indexed).
/// When every attempt fails, the last error is returned.
pub async fn retry_with_backoff<F, Fut, T>(policy: &RetryPolicy, operation: F) -> Result<T, ProbeError>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = RetryAction<T>>,
{
    let attempts = policy.attempts();
    let mut attempt = 0;
    loop {
        match operation(attempt).await {
            RetryAction::Success(value) => return Ok(value),
            RetryAction::Fail(err) => return Err(err),
            RetryAction::Retry(err) => {
                if attempt + 1 >= attempts {
                    return Err(err);
                }
                let delay = policy.delay_for_attempt(attempt);
                debug!(
                    attempt = attempt + 1,
                    max = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
