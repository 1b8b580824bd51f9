//! Global outbound-call spacing.
//!
//! One shared `RateLimiter` instance is injected into every worker so the
//! outbound call rate is bounded independent of the concurrency level.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces a minimum interval between successive `acquire()` returns,
/// globally across all workers holding the same instance.
///
/// The mutex is held across the sleep, so waiters are released one at a
/// time in roughly arrival order. Starvation under extreme concurrency is
/// an accepted tradeoff given small worker counts.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_release: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_release: Mutex::new(None),
        }
    }

    /// Blocks until at least `min_interval` has elapsed since the previous
    /// `acquire()` returned.
    pub async fn acquire(&self) {
        let mut last = self.last_release.lock().await;
        if let Some(prev) = *last {
            let due = prev + self.min_interval;
            let now = Instant::now();
            if due > now {
                tokio::time::sleep_until(due).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn first_acquire_is_immediate() {
        let limiter = RateLimiter::new(Duration::from_millis(500));
        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn successive_acquires_are_spaced() {
        let limiter = RateLimiter::new(Duration::from_millis(500));
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn spacing_holds_across_concurrent_workers() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(200)));
        let start = Instant::now();
        let mut handles = Vec::new();
        for _ in 0..4 {
            let l = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                l.acquire().await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        // 4 acquires = 3 gaps of 200ms after the first immediate release.
        assert!(start.elapsed() >= Duration::from_millis(600));
    }
}
