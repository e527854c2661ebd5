//! Caller-side handles for awaiting, polling, and cancelling tasks.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{PoolError, Result, TaskError};
use crate::pool::task::{TaskId, TaskResult};

/// What a cancellation request observed when it ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The task was still queued. It will never run and its handle resolves
    /// with [`TaskError::Cancelled`].
    Cancelled,
    /// The task had already been dispatched. The worker keeps running it;
    /// what the handle observes is governed by
    /// [`CancelInFlight`](crate::config::CancelInFlight).
    InFlight,
    /// The task had already resolved. Cancellation changed nothing.
    Done,
}

/// Shared cancellation entry point, erased over the pool's payload type.
pub(crate) type Canceller = Arc<dyn Fn(TaskId) -> CancelOutcome + Send + Sync>;

/// Handle to a submitted task.
///
/// Every accepted submission yields exactly one handle, and every handle
/// resolves exactly once. Dropping the handle does not cancel the task; the
/// result is simply discarded when it arrives.
pub struct TaskHandle<V> {
    id: TaskId,
    receiver: crossbeam_channel::Receiver<TaskResult<V>>,
    canceller: Canceller,
}

impl<V> TaskHandle<V> {
    pub(crate) fn new(
        id: TaskId,
        receiver: crossbeam_channel::Receiver<TaskResult<V>>,
        canceller: Canceller,
    ) -> Self {
        Self {
            id,
            receiver,
            canceller,
        }
    }

    /// The pool-assigned id of the task this handle tracks.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Blocks until the task resolves.
    ///
    /// A task cancelled in flight under
    /// [`CancelInFlight::Discard`](crate::config::CancelInFlight::Discard)
    /// has its result channel dropped instead of resolved; that is reported
    /// here as [`TaskError::Cancelled`].
    pub fn wait(self) -> TaskResult<V> {
        match self.receiver.recv() {
            Ok(result) => result,
            Err(_) => TaskResult::unrun(self.id, TaskError::Cancelled),
        }
    }

    /// Blocks until the task resolves or `timeout` elapses.
    ///
    /// A timeout is local to this call: the task keeps running, the handle
    /// remains usable, and a later [`wait`](Self::wait), poll, or
    /// [`cancel`](Self::cancel) behaves as usual.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<TaskResult<V>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => Ok(result),
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                Err(PoolError::WaitTimeout { waited: timeout })
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                Ok(TaskResult::unrun(self.id, TaskError::Cancelled))
            }
        }
    }

    /// Returns the result if the task has already resolved.
    pub fn try_wait(&self) -> Option<TaskResult<V>> {
        self.receiver.try_recv().ok()
    }

    /// Requests cancellation of the task.
    ///
    /// A queued task is removed before it can run. A dispatched task is not
    /// interrupted; see [`CancelOutcome::InFlight`].
    pub fn cancel(&self) -> CancelOutcome {
        (self.canceller)(self.id)
    }
}

impl<V> fmt::Debug for TaskHandle<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Handle to a submitted task, awaitable from async code.
///
/// Produced by [`Pool::submit_async`](crate::Pool::submit_async); otherwise
/// identical in semantics to [`TaskHandle`].
#[cfg(feature = "async")]
pub struct AsyncTaskHandle<V> {
    id: TaskId,
    receiver: async_channel::Receiver<TaskResult<V>>,
    canceller: Canceller,
}

#[cfg(feature = "async")]
impl<V> AsyncTaskHandle<V> {
    pub(crate) fn new(
        id: TaskId,
        receiver: async_channel::Receiver<TaskResult<V>>,
        canceller: Canceller,
    ) -> Self {
        Self {
            id,
            receiver,
            canceller,
        }
    }

    /// The pool-assigned id of the task this handle tracks.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Waits for the task to resolve.
    pub async fn join(self) -> TaskResult<V> {
        match self.receiver.recv().await {
            Ok(result) => result,
            Err(_) => TaskResult::unrun(self.id, TaskError::Cancelled),
        }
    }

    /// Returns the result if the task has already resolved.
    pub fn try_join(&self) -> Option<TaskResult<V>> {
        self.receiver.try_recv().ok()
    }

    /// Requests cancellation of the task.
    pub fn cancel(&self) -> CancelOutcome {
        (self.canceller)(self.id)
    }
}

#[cfg(feature = "async")]
impl<V> fmt::Debug for AsyncTaskHandle<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncTaskHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_canceller() -> Canceller {
        Arc::new(|_| CancelOutcome::Done)
    }

    fn handle_pair() -> (
        crossbeam_channel::Sender<TaskResult<i64>>,
        TaskHandle<i64>,
    ) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        (tx, TaskHandle::new(TaskId::from_raw(1), rx, noop_canceller()))
    }

    #[test]
    fn test_wait_returns_delivered_result() {
        let (tx, handle) = handle_pair();
        tx.try_send(TaskResult::completed(
            TaskId::from_raw(1),
            0,
            Duration::from_millis(5),
            99,
        ))
        .unwrap();

        let result = handle.wait();
        assert_eq!(result.outcome, Ok(99));
        assert_eq!(result.worker, Some(0));
    }

    #[test]
    fn test_value_keeps_only_the_outcome() {
        let (tx, handle) = handle_pair();
        tx.try_send(TaskResult::completed(
            TaskId::from_raw(1),
            0,
            Duration::ZERO,
            5,
        ))
        .unwrap();

        let result = handle.wait();
        assert!(result.is_success());
        assert_eq!(result.value(), Ok(5));
    }

    #[test]
    fn test_dropped_sender_reads_as_cancelled() {
        let (tx, handle) = handle_pair();
        drop(tx);

        let result = handle.wait();
        assert_eq!(result.outcome, Err(TaskError::Cancelled));
        assert!(result.worker.is_none());
    }

    #[test]
    fn test_wait_timeout_expires_without_consuming_handle() {
        let (tx, handle) = handle_pair();

        let err = handle.wait_timeout(Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, PoolError::WaitTimeout { .. }));

        // Late delivery is still observable through the same handle.
        tx.try_send(TaskResult::completed(
            TaskId::from_raw(1),
            0,
            Duration::ZERO,
            7,
        ))
        .unwrap();
        let result = handle.wait_timeout(Duration::from_millis(10)).unwrap();
        assert_eq!(result.outcome, Ok(7));
    }

    #[test]
    fn test_try_wait_polls_without_blocking() {
        let (tx, handle) = handle_pair();
        assert!(handle.try_wait().is_none());

        tx.try_send(TaskResult::completed(
            TaskId::from_raw(1),
            2,
            Duration::ZERO,
            1,
        ))
        .unwrap();
        assert_eq!(handle.try_wait().unwrap().outcome, Ok(1));
    }

    #[test]
    fn test_cancel_routes_through_shared_canceller() {
        let (_tx, rx) = crossbeam_channel::bounded::<TaskResult<i64>>(1);
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let seen2 = Arc::clone(&seen);
        let canceller: Canceller = Arc::new(move |id| {
            *seen2.lock() = Some(id);
            CancelOutcome::Cancelled
        });

        let handle = TaskHandle::new(TaskId::from_raw(12), rx, canceller);
        assert_eq!(handle.cancel(), CancelOutcome::Cancelled);
        assert_eq!(*seen.lock(), Some(TaskId::from_raw(12)));
    }
}
