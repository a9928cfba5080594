//! Retry with exponential backoff.

use crate::config::HttpConfig;
use crate::error::{FetchError, GisError};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// Errors that know whether another attempt could succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for FetchError {
    fn is_retryable(&self) -> bool {
        FetchError::is_retryable(self)
    }
}

impl Retryable for GisError {
    fn is_retryable(&self) -> bool {
        GisError::is_retryable(self)
    }
}

/// Attempt budget and backoff schedule: waits of `d, 2d, 4d, ...` between
/// attempts, none after the last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn from_config(config: &HttpConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_millis(config.backoff_ms))
    }

    /// Wait after failed attempt `attempt` (1-based), or `None` when the
    /// budget is spent.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        Some(self.base_delay.saturating_mul(factor))
    }

    /// Run `op` until it succeeds, fails terminally, or the budget runs
    /// out. `op` receives the 1-based attempt number. The last error is
    /// returned.
    pub async fn run<T, E, F, Fut>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => match self.delay_after(attempt) {
                    Some(wait) => {
                        warn!(
                            "{what}: attempt {attempt}/{} failed ({e}), retrying in {}ms",
                            self.max_attempts,
                            wait.as_millis()
                        );
                        tokio::time::sleep(wait).await;
                        attempt += 1;
                    }
                    None => {
                        error!("{what}: giving up after {attempt} attempts: {e}");
                        return Err(e);
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::new(3, Duration::from_secs(2));
        assert_eq!(policy.delay_after(1), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay_after(2), Some(Duration::from_secs(4)));
        assert_eq!(policy.delay_after(3), None);

        let single = RetryPolicy::new(0, Duration::from_secs(2));
        assert_eq!(single.max_attempts, 1);
        assert_eq!(single.delay_after(1), None);
    }

    fn server_error() -> FetchError {
        FetchError::Status {
            status: 500,
            url: "http://pdo/x".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_budget_spent() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result: Result<(), FetchError> = policy
            .run("test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(server_error()) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 100ms + 200ms, nothing after the last attempt.
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_error_not_retried() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        let calls = AtomicU32::new(0);

        let result: Result<(), FetchError> = policy
            .run("test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(FetchError::NotFound {
                        url: "http://pdo/x".into(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(FetchError::NotFound { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_failure() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        let result = policy
            .run("test", |attempt| async move {
                if attempt < 2 {
                    Err(server_error())
                } else {
                    Ok(attempt)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 2);
    }
}
