//! Bounded retry with exponential backoff.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::domain::models::RetryConfig;

/// Retry policy with exponential backoff
///
/// An operation is attempted once and then retried up to `max_retries` times
/// (`max_retries + 1` attempts in total). Backoff doubles with each retry and is
/// capped at `max_backoff_ms`, so intervals never shrink. The wait is an async
/// sleep and only suspends the retrying task.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    max_retries: u32,
    /// Initial backoff duration in milliseconds
    initial_backoff_ms: u64,
    /// Maximum backoff duration in milliseconds
    max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Policy with explicit limits, in milliseconds.
    pub fn new(max_retries: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            initial_backoff_ms,
            max_backoff_ms: max_backoff_ms.max(initial_backoff_ms),
        }
    }

    /// Policy from the `execution.retry` settings.
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_retries, config.initial_backoff_ms, config.max_backoff_ms)
    }

    /// Retries allowed after the first attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Execute an operation, retrying every failure.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.execute_if(operation, |_| true).await
    }

    /// Execute an operation, retrying only failures accepted by `is_retryable`.
    ///
    /// A non-retryable failure is returned immediately without consuming
    /// further attempts. After the retries are exhausted the last error is
    /// returned.
    pub async fn execute_if<F, Fut, T, E, P>(&self, mut operation: F, is_retryable: P) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!(retries = attempt, "operation succeeded after retrying");
                    }
                    return Ok(result);
                }
                Err(err) => {
                    if !is_retryable(&err) {
                        debug!(error = %err, "permanent error, not retrying");
                        return Err(err);
                    }
                    if attempt >= self.max_retries {
                        warn!(attempts = attempt + 1, error = %err, "operation failed after all retries");
                        return Err(err);
                    }

                    let backoff = self.calculate_backoff(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "transient failure, retrying"
                    );

                    sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Formula: min(initial_backoff * 2^attempt, max_backoff)
    fn calculate_backoff(&self, attempt: u32) -> Duration {
        let backoff_ms = self
            .initial_backoff_ms
            .saturating_mul(2_u64.saturating_pow(attempt))
            .min(self.max_backoff_ms);

        Duration::from_millis(backoff_ms)
    }
}
