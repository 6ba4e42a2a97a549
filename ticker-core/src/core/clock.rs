//! Millisecond clocks
//!
//! Rate-limit windows, retry cooldowns and price-point timestamps all read
//! time through [`Clock`] so tests and the async driver can control it.

use std::time::{SystemTime, UNIX_EPOCH};

/// Source of wall-clock milliseconds since the UNIX epoch
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Reads the operating system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Epoch milliseconds that advance with tokio's clock
///
/// Anchored to the system clock at construction, then driven by
/// `tokio::time::Instant`, so paused-time tests move it with
/// `tokio::time::advance`.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: tokio::time::Instant,
    origin_epoch_ms: u64,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
            origin_epoch_ms: SystemClock.now_ms(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> u64 {
        self.origin_epoch_ms + self.origin.elapsed().as_millis() as u64
    }
}
