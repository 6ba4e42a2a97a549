//! Centralized engine constants
//!
//! Bounds, cadences and budgets shared by validation, the scheduler, the
//! memory monitor and the persistence codec. A few of them can be switched
//! at build time via Cargo features.

// ===== INSTRUMENT BOUNDS =====

/// Lowest accepted price (inclusive)
pub const MIN_STOCK_PRICE: f64 = 0.01;

/// Highest accepted price (inclusive)
pub const MAX_STOCK_PRICE: f64 = 1_000_000.0;

/// Maximum symbol length after sanitation
pub const MAX_SYMBOL_LEN: usize = 5;

/// Maximum display name length after sanitation
pub const MAX_NAME_LEN: usize = 50;

/// Price points retained per instrument (oldest evicted first)
/// Default: 30
#[cfg(not(feature = "history-60"))]
pub const MAX_HISTORY_POINTS: usize = 30;
#[cfg(feature = "history-60")]
pub const MAX_HISTORY_POINTS: usize = 60;

// ===== SCHEDULER =====

/// Fastest accepted update cadence in milliseconds
pub const MIN_UPDATE_INTERVAL_MS: u64 = 100;

/// Cadence used when nothing else is configured
pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 2_000;

/// Largest relative move applied by one random-walk tick (2%)
pub const MAX_PRICE_CHANGE_PCT: f64 = 0.02;

// ===== MEMORY MONITOR =====

/// How often the heap is sampled
pub const MEMORY_CHECK_INTERVAL_MS: u64 = 10_000;

/// Heap budget before the simulation is auto-paused
/// Default: 100 MB
#[cfg(not(feature = "memory-budget-250mb"))]
pub const MAX_MEMORY_USAGE_MB: u64 = 100;
#[cfg(feature = "memory-budget-250mb")]
pub const MAX_MEMORY_USAGE_MB: u64 = 250;

pub const BYTES_PER_MB: u64 = 1_048_576;

// ===== RATE LIMITING =====

/// Window shared by every action ceiling
pub const RATE_LIMIT_WINDOW_MS: u64 = 60_000;

/// Manual price overrides, per symbol
pub const SET_PRICE_MAX_UPDATES: u32 = 120;

/// Cadence changes
pub const UPDATE_SPEED_MAX_UPDATES: u32 = 10;

/// Catalogue inserts (one key for all symbols)
pub const ADD_STOCK_MAX_UPDATES: u32 = 20;

/// Catalogue removals (one key for all symbols)
pub const REMOVE_STOCK_MAX_UPDATES: u32 = 20;

/// Selection changes
pub const SELECT_STOCK_MAX_UPDATES: u32 = 60;

// ===== RETRY =====

/// Base retry delay; attempt counters reset after twice this long
pub const RETRY_DELAY_MS: u64 = 1_000;

/// Attempts allowed per operation before the cooldown kicks in
pub const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Consecutive internal errors that force the scheduler into Paused
pub const SEVERE_ERROR_THRESHOLD: u32 = 3;

// ===== PERSISTENCE =====

/// Envelope version written by this build; any other version is rejected
pub const STORAGE_VERSION: u32 = 1;

/// Namespace prepended to every persisted key
pub const STORAGE_KEY_PREFIX: &str = "secure_ticker_";

/// Name under which the engine snapshot is stored
pub const STATE_STORAGE_NAME: &str = "state";

/// Static key for the reversible byte transform.
/// Obfuscation only; anyone with this source can read the blob.
pub const OBFUSCATION_KEY: &[u8] = b"ticker-sim-obfuscation-v1";
