//! Token-bucket rate limiter for outbound webhook requests.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

struct LimiterInner {
    tokens: f64,
    last_refill: Instant,
}

pub struct RateLimiter {
    /// Tokens per second.
    rate: f64,
    capacity: f64,
    inner: Mutex<LimiterInner>,
}

impl RateLimiter {
    /// Creates a limiter admitting `requests_per_minute` requests on
    /// average, with burst capacity equal to one minute's budget. The
    /// bucket starts full.
    pub fn new(requests_per_minute: u32) -> Self {
        let capacity = requests_per_minute as f64;
        Self {
            rate: capacity / 60.0,
            capacity,
            inner: Mutex::new(LimiterInner {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    fn locked(&self) -> MutexGuard<'_, LimiterInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Refills from elapsed time, then consumes one token if available.
    pub fn allow(&self) -> bool {
        let mut inner = self.locked();

        let now = Instant::now();
        let elapsed = now.duration_since(inner.last_refill).as_secs_f64();
        inner.tokens = (inner.tokens + elapsed * self.rate).min(self.capacity);
        inner.last_refill = now;

        if inner.tokens >= 1.0 {
            inner.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Waits until a token is available. Cancellation works by dropping the
    /// future; the sleep is the only suspension point.
    pub async fn wait(&self) {
        loop {
            if self.allow() {
                return;
            }
            tokio::time::sleep(self.time_until_next_token()).await;
        }
    }

    fn time_until_next_token(&self) -> Duration {
        let inner = self.locked();
        if inner.tokens >= 1.0 {
            return Duration::ZERO;
        }
        let needed = 1.0 - inner.tokens;
        Duration::from_secs_f64(needed / self.rate)
    }

    /// Snapshot of (tokens, capacity, rate) for diagnostics and tests.
    pub fn stats(&self) -> (f64, f64, f64) {
        let inner = self.locked();
        (inner.tokens, self.capacity, self.rate)
    }
}
