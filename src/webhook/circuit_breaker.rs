//! Three-state circuit breaker protecting the webhook endpoint.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::WebhookError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Requests pass through.
    Closed,
    /// Requests fail fast until the timeout elapses.
    Open,
    /// Probing recovery; limited successes close the circuit again.
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    failure_count: u32,
    success_count: u32,
    last_transition: Instant,
}

pub struct CircuitBreaker {
    failure_threshold: u32,
    success_threshold: u32,
    timeout: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, success_threshold: u32, timeout: Duration) -> Self {
        Self {
            failure_threshold,
            success_threshold,
            timeout,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                failure_count: 0,
                success_count: 0,
                last_transition: Instant::now(),
            }),
        }
    }

    fn locked(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `operation` through the breaker. When the circuit is open the
    /// operation is not called at all.
    pub async fn execute<F, Fut>(&self, operation: F) -> Result<(), WebhookError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), WebhookError>>,
    {
        if self.current_state() == BreakerState::Open {
            return Err(WebhookError::CircuitOpen);
        }

        let result = operation().await;
        match &result {
            Ok(()) => self.record_success(),
            Err(_) => self.record_failure(),
        }
        result
    }

    /// Current state with the lazy open → half-open transition applied.
    pub fn current_state(&self) -> BreakerState {
        let mut inner = self.locked();
        if inner.state == BreakerState::Open && inner.last_transition.elapsed() >= self.timeout {
            inner.state = BreakerState::HalfOpen;
            inner.failure_count = 0;
            inner.success_count = 0;
            inner.last_transition = Instant::now();
        }
        inner.state
    }

    fn record_success(&self) {
        let mut inner = self.locked();
        match inner.state {
            BreakerState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.success_threshold {
                    inner.state = BreakerState::Closed;
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    inner.last_transition = Instant::now();
                }
            }
            BreakerState::Closed => {
                inner.failure_count = 0;
            }
            BreakerState::Open => {}
        }
    }

    fn record_failure(&self) {
        let mut inner = self.locked();
        match inner.state {
            BreakerState::HalfOpen => {
                // One failed probe reopens the circuit immediately.
                inner.state = BreakerState::Open;
                inner.failure_count = 0;
                inner.success_count = 0;
                inner.last_transition = Instant::now();
            }
            BreakerState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.failure_threshold {
                    inner.state = BreakerState::Open;
                    inner.failure_count = 0;
                    inner.last_transition = Instant::now();
                }
            }
            BreakerState::Open => {}
        }
    }

    #[cfg(test)]
    fn counts(&self) -> (u32, u32) {
        let inner = self.locked();
        (inner.failure_count, inner.success_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn fail(breaker: &CircuitBreaker) -> Result<(), WebhookError> {
        breaker
            .execute(|| async { Err(WebhookError::Http { status: 503, body: String::new() }) })
            .await
    }

    async fn succeed(breaker: &CircuitBreaker) -> Result<(), WebhookError> {
        breaker.execute(|| async { Ok(()) }).await
    }

    #[tokio::test]
    async fn opens_after_failure_threshold() {
        let breaker = CircuitBreaker::new(3, 2, Duration::from_secs(30));

        for _ in 0..3 {
            assert!(fail(&breaker).await.is_err());
        }
        assert_eq!(breaker.current_state(), BreakerState::Open);

        // While open, operations are rejected without running.
        let err = breaker
            .execute(|| async {
                panic!("must not be called while open");
            })
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::CircuitOpen));
    }

    #[tokio::test]
    async fn success_resets_failure_count_while_closed() {
        let breaker = CircuitBreaker::new(3, 2, Duration::from_secs(30));

        fail(&breaker).await.ok();
        fail(&breaker).await.ok();
        succeed(&breaker).await.unwrap();
        assert_eq!(breaker.counts().0, 0);
        assert_eq!(breaker.current_state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn half_open_after_timeout_then_closes_on_successes() {
        let breaker = CircuitBreaker::new(1, 2, Duration::from_millis(20));

        fail(&breaker).await.ok();
        assert_eq!(breaker.current_state(), BreakerState::Open);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(breaker.current_state(), BreakerState::HalfOpen);

        succeed(&breaker).await.unwrap();
        assert_eq!(breaker.current_state(), BreakerState::HalfOpen);
        succeed(&breaker).await.unwrap();
        assert_eq!(breaker.current_state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn half_open_failure_reopens_immediately() {
        let breaker = CircuitBreaker::new(1, 2, Duration::from_millis(20));

        fail(&breaker).await.ok();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(breaker.current_state(), BreakerState::HalfOpen);

        fail(&breaker).await.ok();
        assert_eq!(breaker.current_state(), BreakerState::Open);
    }
}
