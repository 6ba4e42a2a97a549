//! Resilience patterns around engine operations
//!
//! - Bounded retries with cooldown per operation key
//! - Supervisor turning panics into internal errors
//! - Process-wide panic hook for binaries

pub mod panic;
pub mod retry;
pub mod supervisor;

pub use panic::install_panic_handler;
pub use retry::{RetryPolicy, RetryRegistry, RetryTracker};
pub use supervisor::supervise;
