//! Process-local webhook delivery metrics.
//!
//! Counters are rebuilt at process start and never persisted; their value is
//! in the debug log line emitted at shutdown and in tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use crate::analyzer::Status;

use super::circuit_breaker::BreakerState;

#[derive(Default)]
pub struct Metrics {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    retried_requests: AtomicU64,
    rate_limited_requests: AtomicU64,
    circuit_open_requests: AtomicU64,

    status_counts: RwLock<HashMap<Status, AtomicU64>>,

    total_latency_ms: AtomicU64,
    latency_samples: AtomicU64,

    // 0=closed, 1=open, 2=half-open
    breaker_state: AtomicU8,
}

/// Point-in-time view of the counters.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub retried_requests: u64,
    pub rate_limited_requests: u64,
    pub circuit_open_requests: u64,
    pub status_counts: HashMap<Status, u64>,
    pub average_latency_ms: u64,
    pub breaker_state: BreakerState,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self, status: Status, latency: Duration) {
        self.successful_requests.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms
            .fetch_add(latency.as_millis() as u64, Ordering::Relaxed);
        self.latency_samples.fetch_add(1, Ordering::Relaxed);
        self.record_status(status);
    }

    pub fn record_failure(&self) {
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Records `count` additional attempts beyond the first.
    pub fn record_retries(&self, count: u64) {
        if count > 0 {
            self.retried_requests.fetch_add(count, Ordering::Relaxed);
        }
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_circuit_open(&self) {
        self.circuit_open_requests.fetch_add(1, Ordering::Relaxed);
    }

    fn record_status(&self, status: Status) {
        // Fast path: counter already exists under the read lock.
        {
            let counts = self.status_counts.read().unwrap_or_else(|e| e.into_inner());
            if let Some(counter) = counts.get(&status) {
                counter.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        let mut counts = self.status_counts.write().unwrap_or_else(|e| e.into_inner());
        counts
            .entry(status)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_breaker_state(&self, state: BreakerState) {
        let encoded = match state {
            BreakerState::Closed => 0,
            BreakerState::Open => 1,
            BreakerState::HalfOpen => 2,
        };
        self.breaker_state.store(encoded, Ordering::Relaxed);
    }

    pub fn stats(&self) -> MetricsSnapshot {
        let status_counts = {
            let counts = self.status_counts.read().unwrap_or_else(|e| e.into_inner());
            counts
                .iter()
                .map(|(status, counter)| (*status, counter.load(Ordering::Relaxed)))
                .collect()
        };

        let samples = self.latency_samples.load(Ordering::Relaxed);
        let average_latency_ms = if samples > 0 {
            self.total_latency_ms.load(Ordering::Relaxed) / samples
        } else {
            0
        };

        let breaker_state = match self.breaker_state.load(Ordering::Relaxed) {
            1 => BreakerState::Open,
            2 => BreakerState::HalfOpen,
            _ => BreakerState::Closed,
        };

        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            retried_requests: self.retried_requests.load(Ordering::Relaxed),
            rate_limited_requests: self.rate_limited_requests.load(Ordering::Relaxed),
            circuit_open_requests: self.circuit_open_requests.load(Ordering::Relaxed),
            status_counts,
            average_latency_ms,
            breaker_state,
        }
    }

    /// Clears all counters. Test support.
    pub fn reset(&self) {
        self.total_requests.store(0, Ordering::Relaxed);
        self.successful_requests.store(0, Ordering::Relaxed);
        self.failed_requests.store(0, Ordering::Relaxed);
        self.retried_requests.store(0, Ordering::Relaxed);
        self.rate_limited_requests.store(0, Ordering::Relaxed);
        self.circuit_open_requests.store(0, Ordering::Relaxed);
        self.total_latency_ms.store(0, Ordering::Relaxed);
        self.latency_samples.store(0, Ordering::Relaxed);
        self.breaker_state.store(0, Ordering::Relaxed);
        self.status_counts
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

impl MetricsSnapshot {
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.successful_requests as f64 / self.total_requests as f64 * 100.0
    }

    pub fn failure_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.failed_requests as f64 / self.total_requests as f64 * 100.0
    }
}
