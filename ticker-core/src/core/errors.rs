//! Domain-specific error types for the ticker engine
//!
//! Every public store operation returns one of these instead of panicking.
//! [`EngineError::kind`] folds the variants into the coarse taxonomy callers
//! use to decide how to present a failure.

use thiserror::Error;

/// Rejected symbol, name, price or interval input
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol '{value}' must be 1-{max} uppercase letters")]
    InvalidSymbol { value: String, max: usize },

    #[error("name cannot be empty")]
    EmptyName,
    #[error("name length {len} exceeds max {max}")]
    NameTooLong { len: usize, max: usize },
    #[error("name contains invalid character '{ch}' at index {index}")]
    NameInvalidChar { ch: char, index: usize },

    #[error("price must be a finite number")]
    NonFinitePrice,
    #[error("price {price} outside allowed range [{min}, {max}]")]
    PriceOutOfRange { price: f64, min: f64, max: f64 },

    #[error("update interval {interval_ms}ms is below the {min_ms}ms minimum")]
    IntervalTooShort { interval_ms: u64, min_ms: u64 },

    #[error("stock '{symbol}' already exists")]
    DuplicateSymbol { symbol: String },
}

/// Failures of the persistence codec and its key-value backends
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("no stored value under key '{key}'")]
    Missing { key: String },
    #[error("stored blob is not valid base64: {0}")]
    Decode(String),
    #[error("stored envelope could not be parsed: {0}")]
    Parse(String),
    #[error("snapshot could not be serialized: {0}")]
    Serialize(String),
    #[error("checksum mismatch: stored {stored}, computed {computed}")]
    ChecksumMismatch { stored: String, computed: String },
    #[error("unsupported envelope version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Top-level error returned by every engine operation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("rate limit exceeded for '{action}': max {max_updates} per {window_ms}ms")]
    RateLimited {
        action: String,
        max_updates: u32,
        window_ms: u64,
    },

    #[error("stock '{symbol}' not found")]
    NotFound { symbol: String },

    #[error("operation '{operation}' exhausted {attempts} attempts, cooling down")]
    RetryExhausted { operation: String, attempts: u32 },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("internal error in '{operation}': {message}")]
    Internal { operation: String, message: String },

    #[error("engine is no longer running")]
    EngineStopped,
}

/// Coarse error classes surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    RateLimit,
    NotFound,
    RetryExhausted,
    Storage,
    Internal,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::RateLimited { .. } => ErrorKind::RateLimit,
            EngineError::NotFound { .. } => ErrorKind::NotFound,
            EngineError::RetryExhausted { .. } => ErrorKind::RetryExhausted,
            EngineError::Storage(_) => ErrorKind::Storage,
            EngineError::Internal { .. } | EngineError::EngineStopped => ErrorKind::Internal,
        }
    }

    /// Everything except internal failures clears itself or is fixed by the caller.
    pub fn is_recoverable(&self) -> bool {
        self.kind() != ErrorKind::Internal
    }

    pub(crate) fn not_found(symbol: impl Into<String>) -> Self {
        EngineError::NotFound {
            symbol: symbol.into(),
        }
    }

    pub(crate) fn internal(operation: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::Internal {
            operation: operation.into(),
            message: message.into(),
        }
    }
}
