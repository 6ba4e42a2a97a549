//! Operation supervisor
//!
//! Runs an operation body and turns a panic inside it into
//! [`EngineError::Internal`], so nothing unwinds across a public boundary.
//! The store runs every mutation on a draft snapshot, which means a caught
//! panic never leaves a half-applied state behind.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::error;

use crate::core::EngineError;

/// Run `f`, converting a panic into an internal error for `operation`.
pub fn supervise<T, F>(operation: &str, f: F) -> Result<T, EngineError>
where
    F: FnOnce() -> Result<T, EngineError>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(
                operation = %operation,
                message = %message,
                "Internal error caught by supervisor"
            );
            Err(EngineError::internal(operation, message))
        }
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<no message>".to_string()
    }
}
