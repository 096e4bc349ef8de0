//! Circuit breaker guarding the header pipeline.
//!
//! Two states only. Closed counts failures inside a fixed window; reaching
//! the threshold opens the breaker. Open bypasses the pipeline until the
//! recovery period has elapsed, then the next access closes it again.
//! Recovery is evaluated on access; there are no timers.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use edge_core::{Clock, SystemClock};
use parking_lot::Mutex;
use serde::Serialize;

/// Breaker thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Failures inside one window that open the breaker.
    pub threshold: u32,
    /// Length of the failure-counting window.
    pub window: Duration,
    /// How long the breaker stays open.
    pub recovery: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            threshold: 10,
            window: Duration::from_secs(60),
            recovery: Duration::from_secs(300),
        }
    }
}

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CircuitState {
    /// Pipeline runs normally.
    Closed,
    /// Pipeline is bypassed.
    Open,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    error_count: u32,
    window_start: Instant,
    opened_at: Option<Instant>,
}

/// Process-local circuit breaker.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a closed breaker on the system clock.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a closed breaker reading time from `clock`.
    pub fn with_clock(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            config,
            clock,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                error_count: 0,
                window_start: now,
                opened_at: None,
            }),
        }
    }

    /// Breaker configuration.
    pub fn config(&self) -> CircuitBreakerConfig {
        self.config
    }

    /// Record one failure. Returns `true` if this failure opened the breaker.
    ///
    /// Failures recorded while the breaker is open are ignored.
    pub fn record_failure(&self) -> bool {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        if inner.state == CircuitState::Open {
            return false;
        }

        if now.saturating_duration_since(inner.window_start) > self.config.window {
            inner.error_count = 0;
            inner.window_start = now;
        }

        inner.error_count += 1;
        if inner.error_count >= self.config.threshold {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(now);
            tracing::warn!(
                error_count = inner.error_count,
                recovery_secs = self.config.recovery.as_secs(),
                "Circuit breaker opened, bypassing header pipeline"
            );
            return true;
        }

        false
    }

    /// Check whether the pipeline should be bypassed.
    ///
    /// Closes the breaker if it has been open for the recovery period.
    pub fn is_open(&self) -> bool {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        if inner.state == CircuitState::Closed {
            return false;
        }

        let recovered = inner
            .opened_at
            .map(|opened| now.saturating_duration_since(opened) >= self.config.recovery)
            .unwrap_or(true);
        if recovered {
            inner.state = CircuitState::Closed;
            inner.error_count = 0;
            inner.window_start = now;
            inner.opened_at = None;
            tracing::info!("Circuit breaker closed, header pipeline resumed");
            return false;
        }

        true
    }

    /// Failures counted in the current window.
    pub fn error_count(&self) -> u32 {
        self.inner.lock().error_count
    }

    /// Current state, without evaluating recovery.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("state", &inner.state)
            .field("error_count", &inner.error_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use edge_core::ManualClock;

    fn breaker() -> (CircuitBreaker, ManualClock) {
        let clock = ManualClock::new();
        let breaker =
            CircuitBreaker::with_clock(CircuitBreakerConfig::default(), Arc::new(clock.clone()));
        (breaker, clock)
    }

    #[test]
    fn test_opens_at_threshold() {
        let (breaker, _clock) = breaker();

        for _ in 0..9 {
            assert!(!breaker.record_failure());
        }
        assert!(!breaker.is_open());
        assert_eq!(breaker.error_count(), 9);

        assert!(breaker.record_failure());
        assert!(breaker.is_open());
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn test_failures_while_open_are_ignored() {
        let (breaker, _clock) = breaker();
        for _ in 0..10 {
            breaker.record_failure();
        }

        assert!(!breaker.record_failure());
        assert_eq!(breaker.error_count(), 10);
    }

    #[test]
    fn test_recovers_after_period() {
        let (breaker, clock) = breaker();
        for _ in 0..10 {
            breaker.record_failure();
        }

        clock.advance(Duration::from_secs(299));
        assert!(breaker.is_open());

        clock.advance(Duration::from_secs(1));
        assert!(!breaker.is_open());
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.error_count(), 0);
    }

    #[test]
    fn test_window_resets_count() {
        let (breaker, clock) = breaker();
        for _ in 0..9 {
            breaker.record_failure();
        }

        // Exactly one window later still counts as the same window.
        clock.advance(Duration::from_secs(60));
        assert!(breaker.record_failure());

        let (breaker, clock) = self::breaker();
        for _ in 0..9 {
            breaker.record_failure();
        }
        clock.advance(Duration::from_secs(61));
        assert!(!breaker.record_failure());
        assert_eq!(breaker.error_count(), 1);
    }

    #[test]
    fn test_window_restarts_after_recovery() {
        let (breaker, clock) = breaker();
        for _ in 0..10 {
            breaker.record_failure();
        }
        clock.advance(Duration::from_secs(300));
        assert!(!breaker.is_open());

        for _ in 0..9 {
            assert!(!breaker.record_failure());
        }
        assert!(breaker.record_failure());
    }

    #[test]
    fn test_custom_threshold() {
        let clock = ManualClock::new();
        let config = CircuitBreakerConfig {
            threshold: 1,
            ..Default::default()
        };
        let breaker = CircuitBreaker::with_clock(config, Arc::new(clock));
        assert!(breaker.record_failure());
        assert!(breaker.is_open());
    }

    #[test]
    fn test_concurrent_failures_trip_once() {
        let (breaker, _clock) = breaker();
        let breaker = Arc::new(breaker);

        let trips: u32 = (0..4)
            .map(|_| {
                let breaker = Arc::clone(&breaker);
                thread::spawn(move || (0..25).filter(|_| breaker.record_failure()).count() as u32)
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap())
            .sum();

        assert_eq!(trips, 1);
        assert_eq!(breaker.error_count(), 10);
    }
}
