//! Global panic hook for binaries
//!
//! Routes panic location and message through tracing before the default
//! hook prints its report. The hook does not exit the process: panics
//! raised inside a store operation are caught by
//! [`supervise`](super::supervise) and become internal errors, so the
//! engine keeps running.
//!
//! # Usage
//!
//! Call `install_panic_handler()` early in main(), after logging is set up:
//!
//! ```no_run
//! use ticker_core::resilience::install_panic_handler;
//!
//! fn main() {
//!     install_panic_handler();
//!     // ... rest of application
//! }
//! ```

use std::panic;
use tracing::error;

use super::supervisor::panic_message;

/// Install a global panic hook that logs through tracing
pub fn install_panic_handler() {
    // Store the default panic hook for delegation
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_else(|| "<unknown location>".to_string());

        let message = panic_message(panic_info.payload());

        error!(
            location = %location,
            message = %message,
            "PANIC: handing over to the operation supervisor"
        );

        // Prints full backtrace if RUST_BACKTRACE=1
        default_hook(panic_info);
    }));

    tracing::info!("Panic handler installed - panics will be logged");
}
