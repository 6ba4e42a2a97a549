//! Mutation throttling
//!
//! Per-action rate limiting applied by the store before any mutation.

pub mod rate_limiter;

pub use rate_limiter::{
    set_price_key, ActionLimit, RateLimitTracker, RateLimiter, ADD_STOCK_KEY, REMOVE_STOCK_KEY,
    SELECT_STOCK_KEY, UPDATE_SPEED_KEY,
};
