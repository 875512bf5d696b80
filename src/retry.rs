//! Bounded retry with exponential backoff and jitter.
//!
//! Remote calls report their result as a [`CallOutcome`]; only
//! [`CallOutcome::Retryable`] outcomes are retried. Delays follow
//! `base × multiplier^(retry-1)`, capped at `max_delay`, plus a random
//! jitter in `[0, max_jitter]`.

use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Result of a single remote call attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome<T> {
    Success(T),
    /// Rate limiting, server error, or transport failure.
    Retryable(String),
    /// Anything else (client error, malformed response).
    Fatal(String),
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
    pub max_delay: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            base_delay: Duration::from_secs(1),
            multiplier: 2,
            max_delay: Duration::from_secs(16),
            max_jitter: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Default backoff shape with a different attempt budget.
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// No delay between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            multiplier: 1,
            max_delay: Duration::ZERO,
            max_jitter: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (1-based), without jitter.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(16);
        let factor = self.multiplier.saturating_pow(exp);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    fn jitter(&self) -> Duration {
        let max = self.max_jitter.as_millis() as u64;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max))
    }
}

/// Run `call` until it succeeds, fails fatally, or the attempt budget is
/// spent. `call` receives the 0-based attempt number.
///
/// Returns the success value, or the last error message.
pub async fn call_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut call: F,
) -> Result<T, String>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = CallOutcome<T>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut last_err = String::from("no attempts made");

    for attempt in 0..attempts {
        if attempt > 0 {
            let delay = policy.backoff(attempt) + policy.jitter();
            tracing::debug!(call = label, attempt, ?delay, "retrying");
            tokio::time::sleep(delay).await;
        }

        match call(attempt).await {
            CallOutcome::Success(value) => return Ok(value),
            CallOutcome::Retryable(e) => {
                tracing::warn!(call = label, attempt, error = %e, "transient failure");
                last_err = e;
            }
            CallOutcome::Fatal(e) => {
                tracing::warn!(call = label, attempt, error = %e, "permanent failure");
                return Err(e);
            }
        }
    }

    Err(last_err)
}
