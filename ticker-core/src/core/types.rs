//! Engine data model
//!
//! [`TickerState`] is the aggregate root. The store never edits a published
//! snapshot; it clones a draft, mutates the draft, and publishes the draft
//! as the next snapshot.

use serde::{Deserialize, Serialize};

use crate::config::constants::MAX_HISTORY_POINTS;
use crate::resilience::RetryRegistry;
use crate::risk::RateLimiter;

/// One observed price. Immutable once recorded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Epoch milliseconds
    pub timestamp: u64,
    pub price: f64,
}

/// A tracked instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockInfo {
    pub symbol: String,
    pub name: String,
    pub current_price: f64,
    pub previous_price: f64,
    /// `(current - previous) / previous * 100`
    pub percentage_change: f64,
    /// Epoch milliseconds of the last price change
    pub last_updated: u64,
    /// Oldest first, never longer than `MAX_HISTORY_POINTS`
    pub price_history: Vec<PricePoint>,
}

impl StockInfo {
    /// New instrument with a single-point history at `price`.
    ///
    /// Inputs are expected to be sanitized and validated already.
    pub fn new(symbol: String, name: String, price: f64, now_ms: u64) -> Self {
        Self {
            symbol,
            name,
            current_price: price,
            previous_price: price,
            percentage_change: 0.0,
            last_updated: now_ms,
            price_history: vec![PricePoint {
                timestamp: now_ms,
                price,
            }],
        }
    }

    /// Move to `price`, shifting the current price into `previous_price`.
    ///
    /// The change is computed against the state at the time of the call,
    /// so a manual override and a scheduler tick never share a stale base.
    pub fn apply_price(&mut self, price: f64, now_ms: u64) {
        self.previous_price = self.current_price;
        self.current_price = price;
        self.percentage_change = percentage_change(price, self.previous_price);
        self.last_updated = now_ms;
        self.push_history(PricePoint {
            timestamp: now_ms,
            price,
        });
    }

    fn push_history(&mut self, point: PricePoint) {
        self.price_history.push(point);
        if self.price_history.len() > MAX_HISTORY_POINTS {
            let excess = self.price_history.len() - MAX_HISTORY_POINTS;
            self.price_history.drain(..excess);
        }
    }
}

/// Relative change in percent. Zero when there is no meaningful base.
pub fn percentage_change(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        return 0.0;
    }
    (current - previous) / previous * 100.0
}

/// Heap usage as sampled by the memory monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    /// Upper bound the host reports for the heap, 0 when unlimited
    pub heap_size_limit: u64,
    /// Reserved bytes
    pub total_heap_size: u64,
    /// Bytes in use
    pub used_heap_size: u64,
    /// Epoch milliseconds of the sample
    pub last_checked: u64,
}

impl MemoryStats {
    pub fn used_mb(&self) -> f64 {
        self.used_heap_size as f64 / crate::config::constants::BYTES_PER_MB as f64
    }
}

/// Why the simulation stopped ticking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseReason {
    /// Caller toggled pause
    User,
    /// Heap budget exceeded
    MemoryPressure,
    /// Repeated internal errors
    InternalError,
}

/// Aggregate root owned exclusively by the store
#[derive(Debug, Clone, PartialEq)]
pub struct TickerState {
    /// Unique by symbol, in insertion order
    pub stocks: Vec<StockInfo>,
    /// Scheduler cadence, never below `MIN_UPDATE_INTERVAL_MS`
    pub update_interval_ms: u64,
    pub is_paused: bool,
    /// Always the symbol of a member of `stocks` when set
    pub selected_stock: Option<String>,
    /// Per-action trackers, committed together with the mutation they gate
    pub rate_limiters: RateLimiter,
    pub retry_trackers: RetryRegistry,
    pub memory_stats: Option<MemoryStats>,
    /// Dismissable banner set by internal errors and memory auto-pause
    pub error: Option<String>,
}

impl TickerState {
    pub fn new(update_interval_ms: u64, is_paused: bool) -> Self {
        Self {
            stocks: Vec::new(),
            update_interval_ms,
            is_paused,
            selected_stock: None,
            rate_limiters: RateLimiter::default(),
            retry_trackers: RetryRegistry::default(),
            memory_stats: None,
            error: None,
        }
    }

    pub fn stock(&self, symbol: &str) -> Option<&StockInfo> {
        self.stocks.iter().find(|s| s.symbol == symbol)
    }

    pub(crate) fn stock_mut(&mut self, symbol: &str) -> Option<&mut StockInfo> {
        self.stocks.iter_mut().find(|s| s.symbol == symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.stock(symbol).is_some()
    }

    pub fn selected(&self) -> Option<&StockInfo> {
        self.selected_stock.as_deref().and_then(|s| self.stock(s))
    }

    /// The persisted subset of this snapshot
    pub fn persisted(&self) -> PersistedState {
        PersistedState {
            stocks: self.stocks.clone(),
            update_interval_ms: self.update_interval_ms,
            is_paused: self.is_paused,
            selected_stock: self.selected_stock.clone(),
        }
    }
}

/// Fields written by `save_state_to_storage`.
///
/// Rate limiters, retry trackers and memory stats are live-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    pub stocks: Vec<StockInfo>,
    pub update_interval_ms: u64,
    pub is_paused: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_stock: Option<String>,
}
