//! Politeness limiter for live requests.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;

/// Bounds concurrent requests and enforces a minimum spacing between
/// request starts, even when callers overlap.
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    min_delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// - `max_concurrent`: maximum number of in-flight requests
    /// - `min_delay`: minimum time between two request starts
    pub fn new(max_concurrent: usize, min_delay: Duration) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            min_delay,
            last_request: Mutex::new(None),
        }
    }

    /// One request at a time with `delay_ms` between them.
    pub fn sequential(delay_ms: u64) -> Self {
        Self::new(1, Duration::from_millis(delay_ms))
    }

    /// Wait until a request may start. The first request never waits.
    pub async fn acquire(&self) -> RateLimitGuard {
        // The semaphore is never closed, so this is always a permit.
        let permit = self.semaphore.clone().acquire_owned().await.ok();

        {
            let mut last = self.last_request.lock().await;
            if let Some(prev) = *last {
                let elapsed = prev.elapsed();
                if elapsed < self.min_delay {
                    tokio::time::sleep(self.min_delay - elapsed).await;
                }
            }
            *last = Some(Instant::now());
        }

        RateLimitGuard { _permit: permit }
    }
}

/// Releases the concurrency slot when dropped.
pub struct RateLimitGuard {
    _permit: Option<tokio::sync::OwnedSemaphorePermit>,
}
