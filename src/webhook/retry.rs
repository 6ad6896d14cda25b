//! Retry with jittered exponential backoff.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use super::WebhookError;
use crate::config::RetryConfig;

/// Result of a retried operation plus how many attempts it took.
#[derive(Debug)]
pub struct RetryOutcome {
    pub result: Result<(), WebhookError>,
    pub attempts: u32,
}

pub struct Retryer {
    config: RetryConfig,
}

impl Retryer {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Runs `operation` up to `max_attempts` times. Non-retryable failures
    /// stop immediately and are wrapped as permanent; exhausting all
    /// attempts yields `AttemptsExhausted`.
    pub async fn run<F, Fut>(&self, mut operation: F) -> RetryOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), WebhookError>>,
    {
        if !self.config.enabled {
            return RetryOutcome { result: operation().await, attempts: 1 };
        }

        let mut last_error = None;
        for attempt in 1..=self.config.max_attempts {
            match operation().await {
                Ok(()) => {
                    return RetryOutcome { result: Ok(()), attempts: attempt };
                }
                Err(err) if !err.is_retryable() => {
                    return RetryOutcome {
                        result: Err(WebhookError::Permanent { source: Box::new(err) }),
                        attempts: attempt,
                    };
                }
                Err(err) => {
                    last_error = Some(err);
                    if attempt < self.config.max_attempts {
                        tokio::time::sleep(self.backoff(attempt)).await;
                    }
                }
            }
        }

        let source = last_error.unwrap_or(WebhookError::Cancelled);
        RetryOutcome {
            result: Err(WebhookError::AttemptsExhausted {
                attempts: self.config.max_attempts,
                source: Box::new(source),
            }),
            attempts: self.config.max_attempts,
        }
    }

    /// Backoff for a given attempt: exponential growth capped at the
    /// maximum, plus up to 25% random jitter against thundering herds.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let initial = self.config.initial_backoff_ms as f64;
        let exponent = attempt.saturating_sub(1) as i32;
        let mut backoff_ms = initial * self.config.multiplier.powi(exponent);

        let max = self.config.max_backoff_ms as f64;
        if backoff_ms > max {
            backoff_ms = max;
        }

        let jitter = rand::thread_rng().gen_range(0.0..0.25);
        Duration::from_millis((backoff_ms * (1.0 + jitter)) as u64)
    }
}
