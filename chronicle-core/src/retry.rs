//! Retry policy for model calls.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// How the delay between attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// Same delay before every retry.
    #[default]
    Fixed,
    /// Delay doubles after each failed attempt.
    Exponential,
}

/// Attempts and spacing for a retried operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Base delay between attempts, in milliseconds.
    pub delay_ms: u64,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 2_000,
            backoff: Backoff::Fixed,
        }
    }
}

impl RetryPolicy {
    /// A policy that retries `max_attempts` times with no delay (for tests).
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            delay_ms: 0,
            backoff: Backoff::Fixed,
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let base = Duration::from_millis(self.delay_ms);
        match self.backoff {
            Backoff::Fixed => base,
            Backoff::Exponential => base.saturating_mul(1u32 << attempt.saturating_sub(1).min(16)),
        }
    }

    /// Run `op` until it succeeds or attempts are exhausted.
    ///
    /// Returns the last error together with the number of attempts made.
    pub async fn run<T, E, F, Fut>(&self, label: &str, op: F) -> Result<T, (u32, E)>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.run_while(label, |_| true, op).await
    }

    /// Like [`run`](Self::run), but stops at the first error `retryable`
    /// rejects.
    pub async fn run_while<T, E, R, F, Fut>(
        &self,
        label: &str,
        retryable: R,
        mut op: F,
    ) -> Result<T, (u32, E)>
    where
        R: Fn(&E) -> bool,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= max_attempts => {
                    tracing::error!(%label, attempt, error = %e, "giving up after final attempt");
                    return Err((attempt, e));
                }
                Err(e) if !retryable(&e) => {
                    tracing::error!(%label, attempt, error = %e, "permanent failure, not retrying");
                    return Err((attempt, e));
                }
                Err(e) => {
                    let delay = self.delay_after(attempt);
                    tracing::warn!(
                        %label,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "attempt failed, retrying"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}
