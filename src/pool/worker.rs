//! Worker thread loop.
//!
//! Workers are mailbox-driven: each one blocks on a single-slot channel the
//! manager feeds, runs the task it is handed, reports the result, and is told
//! in the same step whether to run the next queued task, go idle, or stop.

use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::Receiver;
use tracing::{debug, trace, warn};

use crate::error::TaskError;
use crate::pool::manager::{Followup, PoolShared};
use crate::pool::panic;
use crate::pool::task::{Task, TaskResult};
use crate::registry::HandlerRegistry;

/// Stable index of a worker slot within its pool.
pub type WorkerId = usize;

/// Lifecycle of one worker slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerState {
    /// Waiting on its mailbox for an assignment.
    Idle,
    /// Executing a task.
    Busy,
    /// Told to stop; will exit after its current task, if any.
    Terminating,
    /// Exited, normally or through loss.
    Terminated,
}

/// What the manager hands a worker through its mailbox.
pub(crate) enum Assignment<P> {
    Run(Task<P>),
    Stop,
}

/// Thread body for one worker slot.
pub(crate) fn run<P, V>(
    shared: Arc<PoolShared<P, V>>,
    id: WorkerId,
    epoch: u64,
    mailbox: Receiver<Assignment<P>>,
) where
    P: Send + 'static,
    V: Send + 'static,
{
    let mut guard = LossGuard::arm(&shared, id, epoch);
    debug!(worker = id, "worker started");

    'live: loop {
        let assignment = match mailbox.recv() {
            Ok(assignment) => assignment,
            // pool gone; nothing left to do
            Err(_) => break,
        };
        let mut next = match assignment {
            Assignment::Run(task) => Some(task),
            Assignment::Stop => break,
        };

        // Completion and the next pick-up happen in one step, so the slot is
        // never observable as idle while the queue is non-empty.
        while let Some(task) = next.take() {
            let result = execute(&shared.registry, id, task);
            match shared.complete(id, epoch, result) {
                Followup::Run(task) => next = Some(task),
                Followup::Idle => {}
                Followup::Stop => break 'live,
            }
        }
    }

    guard.disarm();
    shared.on_worker_exit(id, epoch);
    debug!(worker = id, "worker stopped");
}

/// Runs one task to a result. Handler panics are contained here; the worker
/// itself never unwinds out of this call.
fn execute<P, V>(registry: &HandlerRegistry<P, V>, worker: WorkerId, task: Task<P>) -> TaskResult<V> {
    let task_id = task.id;
    trace!(
        task = %task_id,
        worker,
        kind = %task.kind,
        queued_for = ?task.submitted_at.elapsed(),
        "task picked up"
    );
    let start = Instant::now();

    let handler = match registry.get(&task.kind) {
        Some(handler) => handler,
        None => {
            return TaskResult::failed(
                task_id,
                worker,
                start.elapsed(),
                TaskError::unknown_kind(task.kind),
            );
        }
    };

    let payload = task.payload;
    let outcome = panic::contain(move || handler(payload));
    let duration = start.elapsed();

    match outcome {
        Ok(Ok(value)) => TaskResult::completed(task_id, worker, duration, value),
        Ok(Err(err)) => TaskResult::failed(task_id, worker, duration, err.into()),
        Err(message) => {
            warn!(task = %task_id, worker, panic = %message, "handler panicked");
            TaskResult::failed(task_id, worker, duration, TaskError::panicked(message))
        }
    }
}

/// Drop sentinel that reports abnormal worker death.
///
/// Armed for the whole thread body: if the worker unwinds past its loop (a
/// containment escape, not a handler panic), the guard's drop runs during
/// unwind and lets the pool resolve the orphaned task and respawn the slot.
struct LossGuard<'a, P, V>
where
    P: Send + 'static,
    V: Send + 'static,
{
    shared: &'a Arc<PoolShared<P, V>>,
    id: WorkerId,
    epoch: u64,
    armed: bool,
}

impl<'a, P, V> LossGuard<'a, P, V>
where
    P: Send + 'static,
    V: Send + 'static,
{
    fn arm(shared: &'a Arc<PoolShared<P, V>>, id: WorkerId, epoch: u64) -> Self {
        Self {
            shared,
            id,
            epoch,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<P, V> Drop for LossGuard<'_, P, V>
where
    P: Send + 'static,
    V: Send + 'static,
{
    fn drop(&mut self) {
        if self.armed {
            warn!(worker = self.id, "worker thread lost");
            PoolShared::on_worker_lost(self.shared, self.id, self.epoch);
        }
    }
}
