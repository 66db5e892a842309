//! Bounded retry with a fixed or linear schedule.
//!
//! [`retry_if`] calls an operation up to [`RetryPolicy::attempts`] times. The
//! first attempt runs immediately; a failed attempt is followed by a sleep of
//! [`RetryPolicy::delay_after`] before the next one. Errors rejected by the
//! `should_retry` predicate end the loop at once.
//!
//! Sleeping goes through the [`Sleeper`] trait so tests can run the loop
//! without real timers.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Delay growth between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// Same interval after every attempt
    #[default]
    None,
    /// `interval × attempt`
    Linear,
}

/// Retry schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts (values below 1 are treated as 1)
    pub attempts: u32,
    /// Base delay between attempts
    pub interval: Duration,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub const BOOT_WAIT_ATTEMPTS: u32 = 18;
    pub const BOOT_WAIT_INTERVAL: Duration = Duration::from_secs(10);

    /// Schedule used while waiting for a cloud instance to come online
    pub fn boot_wait() -> Self {
        Self {
            attempts: Self::BOOT_WAIT_ATTEMPTS,
            interval: Self::BOOT_WAIT_INTERVAL,
            backoff: Backoff::None,
        }
    }

    /// Delay following the failed 1-based `attempt`
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::None => self.interval,
            Backoff::Linear => self.interval.saturating_mul(attempt.max(1)),
        }
    }

    fn max_attempts(&self) -> u32 {
        self.attempts.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::boot_wait()
    }
}

/// Suspends the current task between attempts
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the policy
/// runs out of attempts.
///
/// `op` receives the 1-based attempt number. When attempts run out, the last
/// retryable error is returned.
pub async fn retry_if<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    should_retry: P,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts();
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < max_attempts && should_retry(&err) => {
                let delay = policy.delay_after(attempt);
                debug!("Attempt {}/{} failed, retrying in {:?}", attempt, max_attempts, delay);
                sleeper.sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
