//! Retry helpers.
//!
//! Segment lookups retry on a fixed cadence: the recorder flushes one
//! segment per interval, so waiting longer between attempts gains nothing.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
    pub operation_name: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
            operation_name: "operation".to_string(),
        }
    }
}

impl RetryConfig {
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug)]
pub enum RetryResult<T, E> {
    Success(T),
    /// All attempts failed; `error` is the last one.
    Failed { error: E, attempts: u32 },
}

impl<T, E> RetryResult<T, E> {
    pub fn into_result(self) -> Result<T, (E, u32)> {
        match self {
            RetryResult::Success(v) => Ok(v),
            RetryResult::Failed { error, attempts } => Err((error, attempts)),
        }
    }
}

/// Run `operation` until it succeeds or the attempts run out.
///
/// `operation` receives the 1-based attempt number.
pub async fn retry_async<F, Fut, T, E>(config: &RetryConfig, operation: F) -> RetryResult<T, E>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1u32;

    loop {
        match operation(attempt).await {
            Ok(value) => return RetryResult::Success(value),
            Err(e) if attempt < max_attempts => {
                debug!(
                    "{} attempt {}/{} failed, retrying in {:?}: {}",
                    config.operation_name, attempt, max_attempts, config.delay, e
                );
                attempt += 1;
                tokio::time::sleep(config.delay).await;
            }
            Err(e) => {
                return RetryResult::Failed {
                    error: e,
                    attempts: attempt,
                }
            }
        }
    }
}

/// Suppresses log spam from an operation that keeps failing.
#[derive(Debug, Default)]
pub struct FailureTracker {
    consecutive_failures: u32,
    max_logged_failures: u32,
}

impl FailureTracker {
    pub fn new(max_logged_failures: u32) -> Self {
        Self {
            consecutive_failures: 0,
            max_logged_failures,
        }
    }

    /// Reset after a success. Returns the failure streak that just ended.
    pub fn record_success(&mut self) -> u32 {
        let streak = self.consecutive_failures;
        if streak > self.max_logged_failures {
            debug!("Recovered after {} consecutive failures", streak);
        }
        self.consecutive_failures = 0;
        streak
    }

    /// Returns `true` if this failure should be logged.
    pub fn record_failure(&mut self) -> bool {
        self.consecutive_failures += 1;
        if self.consecutive_failures == self.max_logged_failures + 1 {
            warn!(
                "Suppressing further failure logs after {} consecutive failures",
                self.max_logged_failures
            );
        }
        self.consecutive_failures <= self.max_logged_failures
    }

    pub fn failure_count(&self) -> u32 {
        self.consecutive_failures
    }
}
