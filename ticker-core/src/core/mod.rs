//! Core engine types
//!
//! - `types`: the data model (`TickerState`, `StockInfo`, `PricePoint`, ...)
//! - `errors`: validation, storage and engine error taxonomy
//! - `clock`: millisecond clock abstraction

pub mod clock;
pub mod errors;
pub mod types;

// Re-export commonly used types
pub use clock::{Clock, SystemClock, TokioClock};
pub use errors::{EngineError, ErrorKind, StorageError, ValidationError};
pub use types::{
    percentage_change, MemoryStats, PauseReason, PersistedState, PricePoint, StockInfo,
    TickerState,
};
