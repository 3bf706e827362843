// Minimum-interval rate limiter for hosted API calls.
//
// The Hugging Face Inference API throttles free accounts. Each acquire()
// waits until at least `interval` has passed since the previous call was
// let through. A non-positive rate disables limiting.

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<RateLimiterInner>>,
}

struct RateLimiterInner {
    /// Minimum time between requests; `None` means unlimited
    interval: Option<Duration>,
    last_request: Option<Instant>,
}

impl RateLimiter {
    /// Allow at most `requests_per_second` calls per second.
    pub fn new(requests_per_second: f64) -> Self {
        let interval = (requests_per_second.is_finite() && requests_per_second > 0.0)
            .then(|| Duration::from_secs_f64(1.0 / requests_per_second));
        Self {
            inner: Arc::new(Mutex::new(RateLimiterInner {
                interval,
                last_request: None,
            })),
        }
    }

    /// Wait until a request is allowed, then return.
    pub async fn acquire(&self) {
        let mut inner = self.inner.lock().await;
        let Some(interval) = inner.interval else {
            return;
        };

        if let Some(last) = inner.last_request {
            let elapsed = last.elapsed();
            if elapsed < interval {
                // Sleep while holding the lock so waiters queue in order
                tokio::time::sleep(interval - elapsed).await;
            }
        }

        inner.last_request = Some(Instant::now());
    }
}
