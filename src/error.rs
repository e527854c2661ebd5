use std::time::Duration;

/// Shorthand for results carrying a [`PoolError`].
pub type Result<T> = std::result::Result<T, PoolError>;

/// Synchronous, pool-level failures: rejected submissions, configuration
/// problems, caller-side waits that ran out of time.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("pool is closed")]
    Closed,

    #[error("task queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("result not ready after {waited:?}")]
    WaitTimeout { waited: Duration },

    #[error("config error: {0}")]
    Config(String),

    #[error("worker spawn failed: {0}")]
    Spawn(String),
}

impl PoolError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        PoolError::Config(msg.into())
    }

    pub fn spawn<S: Into<String>>(msg: S) -> Self {
        PoolError::Spawn(msg.into())
    }
}

/// Per-task execution failures, delivered inside a
/// [`TaskResult`](crate::TaskResult) rather than thrown at the caller.
///
/// A task failing never takes its worker down (the worker catches panics at
/// the execution boundary); `WorkerLost` is the one variant produced when the
/// worker itself died instead of the task.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("unrecognized task kind: {kind}")]
    UnknownKind { kind: String },

    #[error("handler failed: {message}")]
    Failed { message: String },

    #[error("handler panicked: {message}")]
    Panicked { message: String },

    #[error("task cancelled")]
    Cancelled,

    #[error("pool shutting down")]
    ShuttingDown,

    #[error("worker lost")]
    WorkerLost,
}

impl TaskError {
    pub fn unknown_kind<S: Into<String>>(kind: S) -> Self {
        TaskError::UnknownKind { kind: kind.into() }
    }

    pub fn failed<S: Into<String>>(message: S) -> Self {
        TaskError::Failed {
            message: message.into(),
        }
    }

    pub fn panicked<S: Into<String>>(message: S) -> Self {
        TaskError::Panicked {
            message: message.into(),
        }
    }
}

/// Error type task handlers return; converted to [`TaskError::Failed`] when
/// the result is routed back to the submitter.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct HandlerError(String);

impl HandlerError {
    pub fn new(msg: impl std::fmt::Display) -> Self {
        HandlerError(msg.to_string())
    }
}

impl From<String> for HandlerError {
    fn from(msg: String) -> Self {
        HandlerError(msg)
    }
}

impl From<&str> for HandlerError {
    fn from(msg: &str) -> Self {
        HandlerError(msg.to_string())
    }
}

impl From<HandlerError> for TaskError {
    fn from(err: HandlerError) -> Self {
        TaskError::Failed { message: err.0 }
    }
}
