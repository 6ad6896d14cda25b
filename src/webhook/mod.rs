//! Webhook delivery engine.
//!
//! Composition per request: rate limiter → circuit breaker → retryer →
//! HTTP POST with a 10-second per-attempt timeout. The request id is minted
//! once and survives retries, so a downstream can correlate attempts.
//! `send_async` is fire-and-forget; `shutdown` drains in-flight sends
//! before the short-lived process exits.

pub mod circuit_breaker;
pub mod formatters;
pub mod metrics;
pub mod rate_limiter;
pub mod retry;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analyzer::Status;
use crate::config::Config;
use crate::errors::{AppError, AppResult};

pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use formatters::{build_payload, Payload};
pub use metrics::{Metrics, MetricsSnapshot};
pub use rate_limiter::RateLimiter;
pub use retry::Retryer;

/// Per-attempt HTTP timeout.
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Failures the delivery engine can produce.
#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("request transport failed: {0}")]
    Transport(String),

    #[error("permanent error (non-retryable): {source}")]
    Permanent {
        #[source]
        source: Box<WebhookError>,
    },

    #[error("max retry attempts ({attempts}) exhausted: {source}")]
    AttemptsExhausted {
        attempts: u32,
        #[source]
        source: Box<WebhookError>,
    },

    #[error("circuit breaker is open")]
    CircuitOpen,

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("payload construction failed: {0}")]
    Payload(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl WebhookError {
    /// 5xx, 429, and transport failures are worth retrying; other HTTP
    /// client errors are permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            WebhookError::Http { status, .. } => match status {
                429 => true,
                400..=499 => false,
                500..=599 => true,
                _ => true,
            },
            WebhookError::Transport(_) => true,
            _ => false,
        }
    }
}

struct InFlight {
    count: AtomicUsize,
    drained: Notify,
}

/// Decrements the in-flight count on drop, so a panicking task still
/// releases its slot.
struct InFlightGuard {
    in_flight: Arc<InFlight>,
}

impl InFlightGuard {
    fn new(in_flight: Arc<InFlight>) -> Self {
        in_flight.count.fetch_add(1, Ordering::SeqCst);
        Self { in_flight }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.in_flight.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.in_flight.drained.notify_waiters();
        }
    }
}

struct Engine {
    config: Config,
    client: reqwest::Client,
    retryer: Retryer,
    breaker: Option<CircuitBreaker>,
    limiter: Option<RateLimiter>,
    metrics: Metrics,
    in_flight: Arc<InFlight>,
}

/// Cloneable handle to the process-wide delivery engine.
#[derive(Clone)]
pub struct WebhookSender {
    engine: Arc<Engine>,
}

impl WebhookSender {
    pub fn new(config: &Config) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(ATTEMPT_TIMEOUT)
            .build()
            .map_err(|err| AppError::config(format!("failed to build HTTP client: {err}")))?;

        let webhook = &config.notifications.webhook;
        let breaker = webhook.circuit_breaker.enabled.then(|| {
            CircuitBreaker::new(
                webhook.circuit_breaker.failure_threshold,
                webhook.circuit_breaker.success_threshold,
                Duration::from_secs(webhook.circuit_breaker.timeout_seconds),
            )
        });
        let limiter = webhook
            .rate_limit
            .enabled
            .then(|| RateLimiter::new(webhook.rate_limit.requests_per_minute));

        Ok(Self {
            engine: Arc::new(Engine {
                config: config.clone(),
                client,
                retryer: Retryer::new(webhook.retry.clone()),
                breaker,
                limiter,
                metrics: Metrics::new(),
                in_flight: Arc::new(InFlight {
                    count: AtomicUsize::new(0),
                    drained: Notify::new(),
                }),
            }),
        })
    }

    /// Synchronous delivery: blocks until the request succeeds, exhausts its
    /// retries, or is refused by the limiter or breaker.
    pub async fn send(
        &self,
        status: Status,
        message: &str,
        session_id: &str,
    ) -> Result<(), WebhookError> {
        self.engine.send(status, message, session_id).await
    }

    /// Fire-and-forget delivery on a background task.
    pub fn send_async(&self, status: Status, message: String, session_id: String) {
        if !self.engine.config.is_webhook_enabled() {
            return;
        }

        let engine = self.engine.clone();
        let guard = InFlightGuard::new(engine.in_flight.clone());
        tokio::spawn(async move {
            let _guard = guard;
            if let Err(err) = engine.send(status, &message, &session_id).await {
                warn!(error = %err, session = %session_id, "async webhook delivery failed");
            }
        });
    }

    /// Waits for in-flight sends to drain. Returns false when the deadline
    /// passed with deliveries still pending.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        let in_flight = &self.engine.in_flight;
        let deadline = Instant::now() + timeout;

        loop {
            // Register interest before the check so a concurrent completion
            // cannot slip between the load and the wait.
            let drained = in_flight.drained.notified();
            let pending = in_flight.count.load(Ordering::SeqCst);
            if pending == 0 {
                debug!("webhook engine drained");
                return true;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(pending, "webhook shutdown deadline passed with deliveries pending");
                return false;
            }
            let _ = tokio::time::timeout(remaining, drained).await;
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.engine.metrics.stats()
    }

    #[cfg(test)]
    fn reset_metrics(&self) {
        self.engine.metrics.reset();
    }
}

impl Engine {
    async fn send(
        &self,
        status: Status,
        message: &str,
        session_id: &str,
    ) -> Result<(), WebhookError> {
        let webhook = &self.config.notifications.webhook;
        if !webhook.enabled {
            debug!("webhooks disabled, skipping");
            return Ok(());
        }

        // One id for the whole delivery, across every retry attempt.
        let request_id = Uuid::new_v4().to_string();
        self.metrics.record_request();

        if let Some(limiter) = &self.limiter {
            if !limiter.allow() {
                self.metrics.record_rate_limited();
                return Err(WebhookError::RateLimited);
            }
        }

        let status_title = self.config.status_title(status);
        let payload = build_payload(webhook, status, message, session_id, &status_title)?;

        let started = Instant::now();
        let attempt = || async {
            let outcome = self
                .retryer
                .run(|| self.post_once(&payload, &request_id))
                .await;
            self.metrics.record_retries(outcome.attempts.saturating_sub(1) as u64);
            outcome.result
        };

        let result = match &self.breaker {
            Some(breaker) => breaker.execute(attempt).await,
            None => attempt().await,
        };

        match &result {
            Ok(()) => {
                self.metrics.record_success(status, started.elapsed());
                info!(request_id = %request_id, status = %status, "webhook delivered");
            }
            Err(WebhookError::CircuitOpen) => {
                self.metrics.record_circuit_open();
                debug!(request_id = %request_id, "webhook skipped, circuit open");
            }
            Err(err) => {
                self.metrics.record_failure();
                warn!(request_id = %request_id, error = %err, "webhook delivery failed");
            }
        }
        if let Some(breaker) = &self.breaker {
            self.metrics.set_breaker_state(breaker.current_state());
        }

        result
    }

    async fn post_once(&self, payload: &Payload, request_id: &str) -> Result<(), WebhookError> {
        let webhook = &self.config.notifications.webhook;

        let mut request = self
            .client
            .post(&webhook.url)
            .header(reqwest::header::CONTENT_TYPE, payload.content_type)
            .header(REQUEST_ID_HEADER, request_id)
            .body(payload.body.clone());
        for (key, value) in &webhook.headers {
            request = request.header(key, value);
        }

        let response = request
            .send()
            .await
            .map_err(|err| WebhookError::Transport(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(WebhookError::Http { status: status.as_u16(), body })
    }
}
