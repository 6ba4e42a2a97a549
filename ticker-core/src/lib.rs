//! Ticker Core - simulated market-data state engine
//!
//! Holds a small catalogue of instruments, moves their prices on a timer
//! or on demand, and wraps every mutation in the same disciplines:
//! sanitation and validation, per-action rate limiting, bounded price
//! history, memory-pressure auto-pause, and a checksummed persistence
//! envelope.
//!
//! ## Architecture
//!
//! ```text
//!          EngineHandle (async, cloneable)
//!                   │ commands
//!                   ▼
//!          EngineService (one tokio task)
//!           │       │            │
//!     commands  tick deadline  memory interval
//!           └───────┼────────────┘
//!                   ▼
//!             TickerStore ──▶ watch<Arc<TickerState>>
//!      validate ▸ rate-limit ▸ apply ▸ publish
//! ```
//!
//! ## Core Modules
//! - `core`: data model, errors, clocks
//! - `data`: symbol/name/price/interval sanitation and validation
//! - `risk`: per-action rate limiter
//! - `resilience`: retry tracker, panic supervisor, panic hook
//! - `monitoring`: heap sampling against a budget
//! - `storage`: persistence codec and key-value backends
//! - `engine`: store, scheduler, price model, async service
//! - `config`: constants and runtime configuration
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use ticker_core::prelude::*;
//!
//! let mut store = TickerStore::from_config(EngineConfig::default(), Arc::new(SystemClock))?;
//! store.set_price("GOOGL", 200.0)?;
//!
//! let googl = store.stock("GOOGL").unwrap();
//! assert!((googl.percentage_change - 13.44).abs() < 0.01);
//! # Ok::<(), ticker_core::EngineError>(())
//! ```

pub mod config;
pub mod core;
pub mod data;
pub mod engine;
pub mod monitoring;
pub mod resilience;
pub mod risk;
pub mod storage;
pub mod testing;
pub mod utils;

// Re-export core types
pub use crate::core::{
    Clock, EngineError, ErrorKind, MemoryStats, PauseReason, PricePoint, StockInfo,
    StorageError, SystemClock, TickerState, TokioClock, ValidationError,
};

pub use config::EngineConfig;
pub use engine::{EngineHandle, EngineService, TickerStore};

/// Prelude for convenient imports
pub mod prelude {
    // Data model and errors
    pub use crate::core::{
        Clock, EngineError, ErrorKind, PricePoint, StockInfo, SystemClock, TickerState,
        TokioClock,
    };

    // Engine
    pub use crate::engine::{EngineHandle, EngineService, PriceModel, RandomWalk, TickerStore};

    // Monitoring and storage
    pub use crate::monitoring::{MemoryMonitor, ProcessHeapProbe};
    pub use crate::storage::{FileStore, MemoryStore, SecureStorage};

    pub use crate::config::EngineConfig;
}
