//! Sliding-window rate limiting keyed by string.
//!
//! State lives in process memory only. Separate instances keep separate
//! windows, so limits are best-effort across a fleet.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use edge_core::{Clock, SystemClock};
use parking_lot::Mutex;

/// Rate limit configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum events allowed in the window.
    pub max_requests: usize,
    /// Window length.
    pub window: Duration,
}

impl RateLimitConfig {
    /// Create a new rate limit configuration.
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    /// Limit per rolling hour.
    pub fn per_hour(max_requests: usize) -> Self {
        Self::new(max_requests, Duration::from_secs(3600))
    }

    /// Limit per rolling minute.
    pub fn per_minute(max_requests: usize) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// The event was admitted and recorded.
    Allowed {
        /// Events left in the current window.
        remaining: usize,
    },
    /// The key is over its limit.
    Limited {
        /// Time until the oldest event leaves the window.
        retry_after: Duration,
    },
}

impl RateDecision {
    /// Check if the event was admitted.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// Per-key sliding-window limiter.
///
/// Each key holds the timestamps of its admitted events; entries older
/// than the window are dropped on access. Idle keys are swept from
/// `check` at most once per window.
pub struct SlidingWindowLimiter {
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    windows: DashMap<String, VecDeque<Instant>>,
    last_sweep: Mutex<Instant>,
}

impl SlidingWindowLimiter {
    /// Create a limiter on the system clock.
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a limiter reading time from `clock`.
    pub fn with_clock(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        let last_sweep = Mutex::new(clock.now());
        Self {
            config,
            clock,
            windows: DashMap::new(),
            last_sweep,
        }
    }

    /// Limiter configuration.
    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Check the key and record the event if it is admitted.
    pub fn check(&self, key: &str) -> RateDecision {
        let now = self.clock.now();
        self.sweep_if_due(now);

        let mut entry = self.windows.entry(key.to_string()).or_default();
        let events = entry.value_mut();
        evict_expired(events, now, self.config.window);

        if events.len() >= self.config.max_requests {
            let retry_after = events
                .front()
                .map(|oldest| (*oldest + self.config.window).saturating_duration_since(now))
                .unwrap_or(self.config.window);
            return RateDecision::Limited { retry_after };
        }

        events.push_back(now);
        RateDecision::Allowed {
            remaining: self.config.max_requests - events.len(),
        }
    }

    /// Events currently counted against the key.
    pub fn count(&self, key: &str) -> usize {
        let now = self.clock.now();
        self.windows
            .get(key)
            .map(|events| {
                events
                    .iter()
                    .filter(|t| now.saturating_duration_since(**t) < self.config.window)
                    .count()
            })
            .unwrap_or(0)
    }

    /// Drop keys with no events inside the window.
    pub fn prune(&self) {
        let now = self.clock.now();
        *self.last_sweep.lock() = now;
        self.prune_at(now);
    }

    /// Number of tracked keys.
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }

    // Must run before taking an entry guard; `retain` locks every shard.
    fn sweep_if_due(&self, now: Instant) {
        {
            let mut last = self.last_sweep.lock();
            if now.saturating_duration_since(*last) < self.config.window {
                return;
            }
            *last = now;
        }
        self.prune_at(now);
    }

    fn prune_at(&self, now: Instant) {
        let window = self.config.window;
        self.windows.retain(|_, events| {
            evict_expired(events, now, window);
            !events.is_empty()
        });
    }
}

impl std::fmt::Debug for SlidingWindowLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlidingWindowLimiter")
            .field("config", &self.config)
            .field("tracked_keys", &self.windows.len())
            .finish()
    }
}

fn evict_expired(events: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(oldest) = events.front() {
        if now.saturating_duration_since(*oldest) >= window {
            events.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_core::ManualClock;

    fn limiter(max: usize) -> (SlidingWindowLimiter, ManualClock) {
        let clock = ManualClock::new();
        let limiter =
            SlidingWindowLimiter::with_clock(RateLimitConfig::per_hour(max), Arc::new(clock.clone()));
        (limiter, clock)
    }

    #[test]
    fn test_allows_up_to_limit() {
        let (limiter, _clock) = limiter(3);

        assert_eq!(limiter.check("a"), RateDecision::Allowed { remaining: 2 });
        assert_eq!(limiter.check("a"), RateDecision::Allowed { remaining: 1 });
        assert_eq!(limiter.check("a"), RateDecision::Allowed { remaining: 0 });
        assert!(!limiter.check("a").is_allowed());
        assert_eq!(limiter.count("a"), 3);
    }

    #[test]
    fn test_keys_are_independent() {
        let (limiter, _clock) = limiter(1);

        assert!(limiter.check("a").is_allowed());
        assert!(limiter.check("b").is_allowed());
        assert!(!limiter.check("a").is_allowed());
    }

    #[test]
    fn test_retry_after_tracks_oldest_event() {
        let (limiter, clock) = limiter(2);

        limiter.check("a");
        clock.advance(Duration::from_secs(600));
        limiter.check("a");
        clock.advance(Duration::from_secs(600));

        assert_eq!(
            limiter.check("a"),
            RateDecision::Limited {
                retry_after: Duration::from_secs(2400)
            }
        );
    }

    #[test]
    fn test_window_slides() {
        let (limiter, clock) = limiter(2);

        limiter.check("a");
        clock.advance(Duration::from_secs(1800));
        limiter.check("a");
        assert!(!limiter.check("a").is_allowed());

        // First event leaves the window, second is still counted.
        clock.advance(Duration::from_secs(1800));
        assert_eq!(limiter.check("a"), RateDecision::Allowed { remaining: 0 });
        assert!(!limiter.check("a").is_allowed());
    }

    #[test]
    fn test_rejected_events_are_not_counted() {
        let (limiter, clock) = limiter(1);

        limiter.check("a");
        for _ in 0..5 {
            limiter.check("a");
        }
        clock.advance(Duration::from_secs(3600));
        assert!(limiter.check("a").is_allowed());
    }

    #[test]
    fn test_prune_drops_idle_keys() {
        let (limiter, clock) = limiter(3);

        limiter.check("a");
        limiter.check("b");
        clock.advance(Duration::from_secs(1800));
        limiter.check("b");
        clock.advance(Duration::from_secs(1800));

        limiter.prune();
        assert_eq!(limiter.tracked_keys(), 1);
        assert_eq!(limiter.count("a"), 0);
        assert_eq!(limiter.count("b"), 1);
    }

    #[test]
    fn test_check_sweeps_idle_keys() {
        let (limiter, clock) = limiter(3);

        for i in 0..1000 {
            limiter.check(&format!("user{}@example.com", i));
        }
        assert_eq!(limiter.tracked_keys(), 1000);

        clock.advance(Duration::from_secs(7200));
        assert!(limiter.check("fresh@example.com").is_allowed());
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn test_sweep_keeps_keys_inside_window() {
        let (limiter, clock) = limiter(3);

        limiter.check("old");
        clock.advance(Duration::from_secs(3000));
        limiter.check("recent");
        clock.advance(Duration::from_secs(600));

        // Sweep due: "old" is past the window, "recent" is not.
        limiter.check("new");
        assert_eq!(limiter.tracked_keys(), 2);
        assert_eq!(limiter.count("recent"), 1);

        // Not due again until another full window passes.
        limiter.check("other");
        clock.advance(Duration::from_secs(3500));
        limiter.check("later");
        assert_eq!(limiter.tracked_keys(), 4);
    }
}
