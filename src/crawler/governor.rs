//! Shared request-rate governor
//!
//! A token bucket whose capacity equals its refill rate. Every request
//! attempt, retries included, takes one token, so the aggregate rate stays
//! bounded no matter how many workers are retrying.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Default polling interval while the bucket is empty
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token-bucket rate limiter shared by all fetch workers
///
/// Waiters poll; fairness between them is best effort.
#[derive(Debug)]
pub struct RateGovernor {
    rate: f64,
    capacity: f64,
    poll_interval: Duration,
    bucket: Mutex<Bucket>,
}

impl RateGovernor {
    /// Creates a governor that starts full
    ///
    /// # Arguments
    ///
    /// * `rate` - Tokens per second; also the bucket capacity
    pub fn new(rate: f64) -> Self {
        Self {
            rate,
            capacity: rate,
            poll_interval: DEFAULT_POLL_INTERVAL,
            bucket: Mutex::new(Bucket {
                tokens: rate,
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Waits until a token is available and consumes it
    pub async fn acquire(&self) {
        while !self.try_acquire().await {
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Consumes a token if one is available right now
    pub async fn try_acquire(&self) -> bool {
        let mut bucket = self.bucket.lock().await;

        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate).min(self.capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}
