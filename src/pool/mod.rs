//! Task execution infrastructure.
//!
//! This module provides the pool manager, its worker threads, the FIFO
//! task queue, and the result-routing plumbing that connects completions
//! back to submitter handles.

pub mod handle;
pub mod manager;
mod panic;
mod queue;
mod router;
pub mod task;
mod worker;

#[cfg(feature = "async")]
pub use handle::AsyncTaskHandle;
pub use handle::{CancelOutcome, TaskHandle};
pub use manager::{Pool, PoolStats};
pub use task::{TaskId, TaskResult};
pub use worker::WorkerId;
