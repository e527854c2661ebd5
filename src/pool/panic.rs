//! Panic containment for handler execution.
//!
//! A panicking handler must not take its worker down: the unwind is caught
//! at the execution boundary and converted into a task failure that travels
//! back to the submitter.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Runs a handler closure, converting an unwind into its panic message.
pub(crate) fn contain<F, R>(f: F) -> Result<R, String>
where
    F: FnOnce() -> R,
{
    catch_unwind(AssertUnwindSafe(f)).map_err(panic_message)
}

/// Best-effort extraction of a human-readable message from a panic payload.
fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
