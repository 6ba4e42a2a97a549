use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::constants::*;
use crate::resilience::RetryPolicy;
use crate::risk::ActionLimit;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Initial scheduler cadence in milliseconds
    pub update_interval_ms: u64,

    /// Start in Paused instead of Running
    pub start_paused: bool,

    /// Seed for the random-walk price model (random when absent)
    pub price_seed: Option<u64>,

    pub rate_limits: RateLimitConfig,
    pub retry: RetryPolicy,
    pub memory: MemoryConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,

    /// Catalogue loaded at startup
    pub stocks: Vec<SeedStock>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: DEFAULT_UPDATE_INTERVAL_MS,
            start_paused: false,
            price_seed: None,
            rate_limits: RateLimitConfig::default(),
            retry: RetryPolicy::default(),
            memory: MemoryConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
            stocks: SeedStock::default_catalogue(),
        }
    }
}

/// Per-action ceilings, all sharing one window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub window_ms: u64,
    pub set_price: u32,
    pub update_speed: u32,
    pub add_stock: u32,
    pub remove_stock: u32,
    pub select_stock: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: RATE_LIMIT_WINDOW_MS,
            set_price: SET_PRICE_MAX_UPDATES,
            update_speed: UPDATE_SPEED_MAX_UPDATES,
            add_stock: ADD_STOCK_MAX_UPDATES,
            remove_stock: REMOVE_STOCK_MAX_UPDATES,
            select_stock: SELECT_STOCK_MAX_UPDATES,
        }
    }
}

impl RateLimitConfig {
    pub fn set_price(&self) -> ActionLimit {
        ActionLimit::new(self.set_price, self.window_ms)
    }

    pub fn update_speed(&self) -> ActionLimit {
        ActionLimit::new(self.update_speed, self.window_ms)
    }

    pub fn add_stock(&self) -> ActionLimit {
        ActionLimit::new(self.add_stock, self.window_ms)
    }

    pub fn remove_stock(&self) -> ActionLimit {
        ActionLimit::new(self.remove_stock, self.window_ms)
    }

    pub fn select_stock(&self) -> ActionLimit {
        ActionLimit::new(self.select_stock, self.window_ms)
    }
}

/// Memory monitor settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub enabled: bool,
    pub check_interval_ms: u64,
    /// Heap budget; exceeding it pauses the simulation
    pub max_usage_mb: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval_ms: MEMORY_CHECK_INTERVAL_MS,
            max_usage_mb: MAX_MEMORY_USAGE_MB,
        }
    }
}

impl MemoryConfig {
    pub fn max_usage_bytes(&self) -> u64 {
        self.max_usage_mb.saturating_mul(BYTES_PER_MB)
    }
}

/// Where snapshots are persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for the file-backed store; in-memory when absent
    pub dir: Option<PathBuf>,

    /// Name of the snapshot key (prefixed with `secure_ticker_`)
    pub name: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: None,
            name: STATE_STORAGE_NAME.to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Instrument loaded at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedStock {
    pub symbol: String,
    pub name: String,
    pub price: f64,
}

impl SeedStock {
    pub fn new(symbol: &str, name: &str, price: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            price,
        }
    }

    pub fn default_catalogue() -> Vec<Self> {
        vec![
            Self::new("BNOX", "Bionomics Limited", 185.75),
            Self::new("GOOGL", "Alphabet Inc.", 176.30),
            Self::new("MSFT", "Microsoft Corporation", 415.20),
        ]
    }
}
