//! Bounded retries for fallible operations
//!
//! Each operation key gets an attempt counter. Once `max_attempts` is
//! reached further invocations are refused until the cooldown (twice the
//! retry delay) has passed since the last attempt. A success clears the
//! counter.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::supervisor::supervise;
use crate::config::constants::{MAX_RETRY_ATTEMPTS, RETRY_DELAY_MS};
use crate::core::EngineError;

/// Attempt budget and cooldown for retried operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts allowed before the cooldown applies
    pub max_attempts: u32,
    /// Base delay; the counter resets after twice this long
    pub retry_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RETRY_ATTEMPTS,
            retry_delay_ms: RETRY_DELAY_MS,
        }
    }
}

impl RetryPolicy {
    /// Policy for tests and tight loops
    pub fn aggressive() -> Self {
        Self {
            max_attempts: 5,
            retry_delay_ms: 10,
        }
    }

    pub fn cooldown_ms(&self) -> u64 {
        self.retry_delay_ms.saturating_mul(2)
    }
}

/// Attempt accounting for one operation key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryTracker {
    pub attempts: u32,
    /// Epoch milliseconds of the last attempt
    pub last_attempt: u64,
    pub operation: String,
}

impl RetryTracker {
    pub fn new(operation: impl Into<String>, now_ms: u64) -> Self {
        Self {
            attempts: 0,
            last_attempt: now_ms,
            operation: operation.into(),
        }
    }
}

/// Trackers for every operation key seen so far
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryRegistry {
    trackers: HashMap<String, RetryTracker>,
}

impl RetryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` under the attempt budget for `operation`.
    ///
    /// Errors and panics from `f` are reported as the returned error and
    /// count as a failed attempt; nothing propagates past this call.
    pub fn with_retry<T, F>(
        &mut self,
        operation: &str,
        policy: RetryPolicy,
        now_ms: u64,
        f: F,
    ) -> Result<T, EngineError>
    where
        F: FnOnce() -> Result<T, EngineError>,
    {
        let tracker = self
            .trackers
            .entry(operation.to_string())
            .or_insert_with(|| RetryTracker::new(operation, now_ms));

        if now_ms.saturating_sub(tracker.last_attempt) > policy.cooldown_ms() {
            tracker.attempts = 0;
        }

        if tracker.attempts >= policy.max_attempts {
            warn!(
                operation = %operation,
                attempts = tracker.attempts,
                "Retry budget exhausted, cooling down"
            );
            return Err(EngineError::RetryExhausted {
                operation: operation.to_string(),
                attempts: tracker.attempts,
            });
        }

        tracker.attempts += 1;
        tracker.last_attempt = now_ms;

        match supervise(operation, f) {
            Ok(value) => {
                tracker.attempts = 0;
                Ok(value)
            }
            Err(e) => {
                debug!(
                    operation = %operation,
                    attempt = tracker.attempts,
                    error = %e,
                    "Attempt failed"
                );
                Err(e)
            }
        }
    }

    pub fn tracker(&self, operation: &str) -> Option<&RetryTracker> {
        self.trackers.get(operation)
    }

    /// Check if `operation` may run at `now_ms`
    pub fn can_retry(&self, operation: &str, policy: RetryPolicy, now_ms: u64) -> bool {
        match self.trackers.get(operation) {
            None => true,
            Some(t) => {
                t.attempts < policy.max_attempts
                    || now_ms.saturating_sub(t.last_attempt) > policy.cooldown_ms()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StorageError;

    fn failing() -> Result<(), EngineError> {
        Err(StorageError::Backend("disk full".into()).into())
    }

    #[test]
    fn test_success_resets_attempts() {
        let mut registry = RetryRegistry::new();
        let policy = RetryPolicy::default();

        assert!(registry.with_retry("save", policy, 0, failing).is_err());
        assert_eq!(registry.tracker("save").unwrap().attempts, 1);

        assert_eq!(registry.with_retry("save", policy, 10, || Ok(42)), Ok(42));
        assert_eq!(registry.tracker("save").unwrap().attempts, 0);
    }

    #[test]
    fn test_refuses_after_max_attempts_until_cooldown() {
        let mut registry = RetryRegistry::new();
        let policy = RetryPolicy {
            max_attempts: 3,
            retry_delay_ms: 1_000,
        };

        for t in 0..3 {
            assert!(registry.with_retry("load", policy, t, failing).is_err());
        }

        let mut invoked = false;
        let refused = registry.with_retry("load", policy, 100, || {
            invoked = true;
            Ok(())
        });
        assert!(!invoked, "closure must not run while exhausted");
        assert_eq!(
            refused,
            Err(EngineError::RetryExhausted {
                operation: "load".into(),
                attempts: 3
            })
        );
        assert!(!registry.can_retry("load", policy, 100));

        // Cooldown is twice the delay, measured from the last attempt (t=2)
        assert!(registry.can_retry("load", policy, 2_003));
        assert_eq!(registry.with_retry("load", policy, 2_003, || Ok(1)), Ok(1));
    }

    #[test]
    fn test_panics_count_as_failures() {
        let mut registry = RetryRegistry::new();
        let policy = RetryPolicy::default();

        let result: Result<(), _> =
            registry.with_retry("tick", policy, 0, || panic!("model blew up"));

        assert!(matches!(result, Err(EngineError::Internal { .. })));
        assert_eq!(registry.tracker("tick").unwrap().attempts, 1);
    }

    #[test]
    fn test_operations_are_independent() {
        let mut registry = RetryRegistry::new();
        let policy = RetryPolicy {
            max_attempts: 1,
            retry_delay_ms: 1_000,
        };

        assert!(registry.with_retry("a", policy, 0, failing).is_err());
        assert!(matches!(
            registry.with_retry("a", policy, 1, failing),
            Err(EngineError::RetryExhausted { .. })
        ));
        assert!(matches!(
            registry.with_retry("b", policy, 1, failing),
            Err(EngineError::Storage(_))
        ));
    }

    #[test]
    fn test_policy_presets() {
        assert_eq!(RetryPolicy::default().cooldown_ms(), 2 * RETRY_DELAY_MS);
        assert_eq!(RetryPolicy::aggressive().max_attempts, 5);
    }
}
