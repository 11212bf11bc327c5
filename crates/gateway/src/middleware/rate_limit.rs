//! Token-bucket rate limiting for API calls.
//!
//! Calls that find the bucket empty wait for their token instead of being
//! rejected, so bursts are smoothed rather than dropped.

use crate::caller::{Middleware, Next};
use async_trait::async_trait;
use botbridge_core::ParamSource;
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Longest a single call will wait for its token.
pub const MAX_WAIT: Duration = Duration::from_secs(3600);

/// A token bucket refilled at `frequency` tokens per second.
pub struct RateLimit {
    frequency: f64,
    capacity: f64,
    bucket: std::sync::Mutex<Bucket>,
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimit {
    /// `frequency` must be > 0 and `capacity` >= 1 (checked at config load).
    pub fn new(frequency: f64, capacity: u32) -> Self {
        let capacity = f64::from(capacity.max(1));
        Self {
            frequency,
            capacity,
            bucket: std::sync::Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Reserve one token, returning how long the caller must wait for it.
    ///
    /// Tokens may go negative: each waiter reserves its own slot, so
    /// concurrent callers are spaced out instead of racing.
    fn reserve(&self) -> Duration {
        let now = Instant::now();
        let mut bucket = self.bucket.lock().unwrap_or_else(|e| e.into_inner());

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.frequency).min(self.capacity);
        bucket.last_refill = now;

        bucket.tokens -= 1.0;
        if bucket.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::try_from_secs_f64(-bucket.tokens / self.frequency)
                .map_or(MAX_WAIT, |wait| wait.min(MAX_WAIT))
        }
    }

    /// Wait until a token is available.
    pub async fn acquire(&self) {
        let wait = self.reserve();
        if !wait.is_zero() {
            debug!(wait_ms = wait.as_millis() as u64, "Rate limit: waiting for token");
            tokio::time::sleep(wait).await;
        }
    }
}

#[async_trait]
impl Middleware for RateLimit {
    async fn handle(&self, action: &str, params: &dyn ParamSource, next: Next<'_>) -> Value {
        self.acquire().await;
        next.run(action, params).await
    }
}
