//! Karya - a bounded-concurrency task pool with registered handlers.
//!
//! A fixed set of worker threads executes tasks submitted by kind. Tasks are
//! dispatched strictly in submission order, every submission yields a handle
//! that resolves exactly once, and a panicking handler never takes its
//! worker down.
//!
//! # Quick Start
//!
//! ```
//! use karya::{HandlerRegistry, Pool};
//!
//! let registry = HandlerRegistry::new()
//!     .with("square", |n: i64| Ok(n * n));
//!
//! let pool = Pool::new(registry)?;
//!
//! let handle = pool.submit("square", 12)?;
//! assert_eq!(handle.wait().outcome, Ok(144));
//!
//! pool.shutdown();
//! # Ok::<(), karya::PoolError>(())
//! ```
//!
//! # Features
//!
//! - **Strict FIFO**: tasks start in the order they were accepted
//! - **Result Handles**: await, poll, or time out on a task from the caller's side
//! - **Backpressure**: bounded queues that reject or block on overflow
//! - **Cancellation**: queued tasks are removed; in-flight tasks finish but
//!   their results can be discarded or short-circuited
//! - **Failure Isolation**: handler panics become task errors, not dead workers
//! - **Worker Recovery**: lost worker threads are detected and respawned
//! - **Async Handles**: `await`-able submission handles (optional)

// Lint configuration
#![warn(missing_docs, missing_debug_implementations)]

// Core modules - always available
pub mod config;
pub mod error;
pub mod pool;
pub mod registry;

// Re-export key types at crate root
pub use config::{CancelInFlight, OverflowPolicy, PoolConfig, PoolConfigBuilder, QueueCapacity};
pub use error::{HandlerError, PoolError, Result, TaskError};
#[cfg(feature = "async")]
pub use pool::AsyncTaskHandle;
pub use pool::{CancelOutcome, Pool, PoolStats, TaskHandle, TaskId, TaskResult, WorkerId};
pub use registry::HandlerRegistry;
