//! Task and result representation.

use std::fmt;
use std::time::{Duration, Instant};

use crate::error::TaskError;
use crate::pool::worker::WorkerId;

/// Unique identifier for a submitted task.
///
/// Assigned by the pool at submission time, strictly monotonic per pool
/// instance. Callers correlate results by this id, never by arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn from_raw(raw: u64) -> Self {
        TaskId(raw)
    }

    /// Raw counter value behind this id.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One unit of submitted work: a kind tag selecting the handler, plus the
/// handler's input. Immutable once constructed; consumed by exactly one
/// worker, then discarded.
pub(crate) struct Task<P> {
    pub(crate) id: TaskId,
    pub(crate) kind: String,
    pub(crate) payload: P,
    pub(crate) submitted_at: Instant,
}

impl<P> Task<P> {
    pub(crate) fn new(id: TaskId, kind: impl Into<String>, payload: P) -> Self {
        Task {
            id,
            kind: kind.into(),
            payload,
            submitted_at: Instant::now(),
        }
    }
}

impl<P> fmt::Debug for Task<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("submitted_at", &self.submitted_at)
            .finish()
    }
}

/// Outcome of one submitted task, delivered through its handle.
#[derive(Debug, Clone)]
pub struct TaskResult<V> {
    /// Id of the originating submission.
    pub task_id: TaskId,
    /// Worker that produced the result; `None` when the task never reached a
    /// worker (cancelled while queued, or failed at shutdown drain).
    pub worker: Option<WorkerId>,
    /// Time the handler spent executing. Zero for tasks that never ran.
    pub duration: Duration,
    /// Success value or execution failure.
    pub outcome: std::result::Result<V, TaskError>,
}

impl<V> TaskResult<V> {
    pub(crate) fn completed(task_id: TaskId, worker: WorkerId, duration: Duration, value: V) -> Self {
        TaskResult {
            task_id,
            worker: Some(worker),
            duration,
            outcome: Ok(value),
        }
    }

    pub(crate) fn failed(
        task_id: TaskId,
        worker: WorkerId,
        duration: Duration,
        error: TaskError,
    ) -> Self {
        TaskResult {
            task_id,
            worker: Some(worker),
            duration,
            outcome: Err(error),
        }
    }

    /// Result for a task that never reached a worker.
    pub(crate) fn unrun(task_id: TaskId, error: TaskError) -> Self {
        TaskResult {
            task_id,
            worker: None,
            duration: Duration::ZERO,
            outcome: Err(error),
        }
    }

    /// True when the task produced a success value.
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Consumes the result, keeping only the success value or error.
    pub fn value(self) -> std::result::Result<V, TaskError> {
        self.outcome
    }
}
