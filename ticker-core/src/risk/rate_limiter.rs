//! Rate Limiting - Fixed Window Per Action
//!
//! Bounds how often each caller action may mutate the engine. Every action
//! key gets its own tracker, created lazily on first use.
//!
//! ## Algorithm
//!
//! ```text
//! Ceiling: 3 per 60s window
//!
//! t=0s   call → count 1            ✓
//! t=1s   call → count 2            ✓
//! t=2s   call → count 3            ✓
//! t=3s   call → count ≥ ceiling    ✗ latch rate-limited
//! t=4s   call → latched            ✗ (no accounting)
//! t=63s  call → window since last success elapsed, reset → count 1  ✓
//! ```
//!
//! The window is measured from the last accepted call, so a steady stream
//! of accepted calls keeps extending it.
//!
//! ## Keys
//!
//! Price overrides are keyed per symbol (`setPrice-MSFT`) so one noisy
//! instrument cannot starve another. Catalogue churn (`addStock`,
//! `removeStock`) shares one key across all symbols.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::core::EngineError;

pub const UPDATE_SPEED_KEY: &str = "updateSpeed";
pub const ADD_STOCK_KEY: &str = "addStock";
pub const REMOVE_STOCK_KEY: &str = "removeStock";
pub const SELECT_STOCK_KEY: &str = "selectStock";

/// Rate-limit key for manual price overrides on `symbol`
pub fn set_price_key(symbol: &str) -> String {
    format!("setPrice-{}", symbol)
}

/// Ceiling for one action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionLimit {
    /// Accepted calls per window
    pub max_updates: u32,
    /// Window length in milliseconds
    pub window_ms: u64,
}

impl ActionLimit {
    pub fn new(max_updates: u32, window_ms: u64) -> Self {
        Self {
            max_updates,
            window_ms,
        }
    }
}

/// Accounting for one action key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitTracker {
    /// Epoch milliseconds of the last accepted call or window reset
    pub last_update_timestamp: u64,
    /// Accepted calls in the current window
    pub update_count: u32,
    /// Latched once the ceiling is hit; cleared only by a window reset
    pub is_rate_limited: bool,
}

impl RateLimitTracker {
    pub fn new(now_ms: u64) -> Self {
        Self {
            last_update_timestamp: now_ms,
            update_count: 0,
            is_rate_limited: false,
        }
    }

    /// Account for one call. Returns true if the call is allowed.
    pub fn check(&mut self, limit: ActionLimit, now_ms: u64) -> bool {
        if now_ms.saturating_sub(self.last_update_timestamp) > limit.window_ms {
            self.update_count = 0;
            self.is_rate_limited = false;
            self.last_update_timestamp = now_ms;
        }

        if self.is_rate_limited {
            return false;
        }

        if self.update_count >= limit.max_updates {
            self.is_rate_limited = true;
            return false;
        }

        self.update_count += 1;
        self.last_update_timestamp = now_ms;
        true
    }
}

/// Trackers for every action key seen so far, plus totals for monitoring.
///
/// Lives inside `TickerState` so limiter updates commit atomically with
/// the mutation they gate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimiter {
    trackers: HashMap<String, RateLimitTracker>,
    total_requests: u64,
    total_allowed: u64,
    total_rejected: u64,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check and account one call for `action`
    pub fn check(&mut self, action: &str, limit: ActionLimit, now_ms: u64) -> Result<(), EngineError> {
        self.total_requests += 1;

        let tracker = self
            .trackers
            .entry(action.to_string())
            .or_insert_with(|| RateLimitTracker::new(now_ms));
        let was_limited = tracker.is_rate_limited;

        if tracker.check(limit, now_ms) {
            self.total_allowed += 1;
            return Ok(());
        }

        self.total_rejected += 1;
        if was_limited {
            debug!(action = %action, "Rate-limited call rejected");
        } else {
            warn!(
                action = %action,
                max_updates = limit.max_updates,
                window_ms = limit.window_ms,
                "Rate limit exceeded: {}/{} requests allowed",
                self.total_allowed,
                self.total_requests
            );
        }

        Err(EngineError::RateLimited {
            action: action.to_string(),
            max_updates: limit.max_updates,
            window_ms: limit.window_ms,
        })
    }

    pub fn tracker(&self, action: &str) -> Option<&RateLimitTracker> {
        self.trackers.get(action)
    }

    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }

    /// Get total calls checked
    pub fn total_requests(&self) -> u64 {
        self.total_requests
    }

    /// Get total calls allowed
    pub fn total_allowed(&self) -> u64 {
        self.total_allowed
    }

    /// Get total calls rejected
    pub fn total_rejected(&self) -> u64 {
        self.total_rejected
    }

    /// Get acceptance rate (0.0 to 1.0)
    pub fn acceptance_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 1.0;
        }
        self.total_allowed as f64 / self.total_requests as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: u64 = 60_000;

    #[test]
    fn test_tracker_allows_up_to_ceiling() {
        let limit = ActionLimit::new(3, WINDOW);
        let mut tracker = RateLimitTracker::new(0);

        for i in 0..3 {
            assert!(tracker.check(limit, i), "call {} should be allowed", i);
        }
        assert_eq!(tracker.update_count, 3);
        assert!(!tracker.check(limit, 3));
        assert!(tracker.is_rate_limited);
    }

    #[test]
    fn test_latch_does_no_accounting() {
        let limit = ActionLimit::new(1, WINDOW);
        let mut tracker = RateLimitTracker::new(0);

        assert!(tracker.check(limit, 10));
        assert!(!tracker.check(limit, 20));
        let latched = tracker;
        assert!(!tracker.check(limit, 30));
        assert_eq!(tracker, latched);
    }

    #[test]
    fn test_window_reset_clears_latch() {
        let limit = ActionLimit::new(2, WINDOW);
        let mut tracker = RateLimitTracker::new(0);

        assert!(tracker.check(limit, 0));
        assert!(tracker.check(limit, 1_000));
        assert!(!tracker.check(limit, 2_000));

        // Exactly one window after the last accepted call is still inside it
        assert!(!tracker.check(limit, 1_000 + WINDOW));
        assert!(tracker.check(limit, 1_001 + WINDOW));
        assert_eq!(tracker.update_count, 1);
        assert!(!tracker.is_rate_limited);
    }

    #[test]
    fn test_keys_do_not_cross_contaminate() {
        let limit = ActionLimit::new(1, WINDOW);
        let mut limiter = RateLimiter::new();

        assert!(limiter.check(&set_price_key("MSFT"), limit, 0).is_ok());
        assert!(limiter.check(&set_price_key("MSFT"), limit, 1).is_err());
        assert!(limiter.check(&set_price_key("GOOGL"), limit, 2).is_ok());
        assert_eq!(limiter.len(), 2);
    }

    #[test]
    fn test_rejection_reports_limit() {
        let limit = ActionLimit::new(1, WINDOW);
        let mut limiter = RateLimiter::new();

        limiter.check(ADD_STOCK_KEY, limit, 0).unwrap();
        let err = limiter.check(ADD_STOCK_KEY, limit, 1).unwrap_err();

        assert_eq!(
            err,
            EngineError::RateLimited {
                action: ADD_STOCK_KEY.to_string(),
                max_updates: 1,
                window_ms: WINDOW,
            }
        );
    }

    #[test]
    fn test_acceptance_rate() {
        let limit = ActionLimit::new(5, WINDOW);
        let mut limiter = RateLimiter::new();

        for i in 0..10 {
            let _ = limiter.check(SELECT_STOCK_KEY, limit, i);
        }

        assert_eq!(limiter.total_requests(), 10);
        assert_eq!(limiter.total_allowed(), 5);
        assert_eq!(limiter.total_rejected(), 5);
        assert!((limiter.acceptance_rate() - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_lazy_tracker_creation() {
        let mut limiter = RateLimiter::new();
        assert!(limiter.tracker(UPDATE_SPEED_KEY).is_none());

        limiter
            .check(UPDATE_SPEED_KEY, ActionLimit::new(10, WINDOW), 500)
            .unwrap();

        let tracker = limiter.tracker(UPDATE_SPEED_KEY).unwrap();
        assert_eq!(tracker.update_count, 1);
        assert_eq!(tracker.last_update_timestamp, 500);
    }
}
