//! Pipeline counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Process-wide pipeline counters.
///
/// All counters are monotonic and updated with relaxed atomics; a
/// snapshot is not a consistent cut across counters.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    requests_total: AtomicU64,
    bypassed_total: AtomicU64,
    csp_failures: AtomicU64,
    cache_failures: AtomicU64,
    header_failures: AtomicU64,
    breaker_trips: AtomicU64,
}

/// Point-in-time copy of [`PipelineMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub bypassed_total: u64,
    pub csp_failures: u64,
    pub cache_failures: u64,
    pub header_failures: u64,
    pub breaker_trips: u64,
}

impl MetricsSnapshot {
    /// Sum of all per-step failures.
    pub fn total_failures(&self) -> u64 {
        self.csp_failures + self.cache_failures + self.header_failures
    }
}

impl PipelineMetrics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request entering the pipeline.
    pub fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request that skipped header generation.
    pub fn record_bypass(&self) {
        self.bypassed_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a CSP step failure.
    pub fn record_csp_failure(&self) {
        self.csp_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a Cache-Control step failure.
    pub fn record_cache_failure(&self) {
        self.cache_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a security-header step failure.
    pub fn record_header_failure(&self) {
        self.header_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the breaker opening.
    pub fn record_breaker_trip(&self) {
        self.breaker_trips.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            bypassed_total: self.bypassed_total.load(Ordering::Relaxed),
            csp_failures: self.csp_failures.load(Ordering::Relaxed),
            cache_failures: self.cache_failures.load(Ordering::Relaxed),
            header_failures: self.header_failures.load(Ordering::Relaxed),
            breaker_trips: self.breaker_trips.load(Ordering::Relaxed),
        }
    }
}
