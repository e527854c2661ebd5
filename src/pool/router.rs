//! Result routing: correlates each completed result back to its submitter.
//!
//! One single-resolution entry per accepted task. Resolving an id twice, or
//! resolving an id that has no entry, is an internal invariant violation:
//! logged, never fatal. The one sanctioned silent path is a late result for
//! an in-flight task whose caller cancelled.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::error::TaskError;
use crate::pool::task::{TaskId, TaskResult};

/// Sender half of a handle's oneshot result channel.
pub(crate) enum ResultSender<V> {
    Sync(crossbeam_channel::Sender<TaskResult<V>>),
    #[cfg(feature = "async")]
    Async(async_channel::Sender<TaskResult<V>>),
}

impl<V> ResultSender<V> {
    /// Delivers without blocking: both variants are bounded(1) channels that
    /// are sent to at most once. A failed send means the receiver is gone.
    fn send(self, result: TaskResult<V>) -> bool {
        match self {
            ResultSender::Sync(tx) => tx.try_send(result).is_ok(),
            #[cfg(feature = "async")]
            ResultSender::Async(tx) => tx.try_send(result).is_ok(),
        }
    }
}

/// How a resolution attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resolution {
    /// Entry found, caller received the result.
    Delivered,
    /// Entry found, but the caller dropped its handle (or timed out locally).
    CallerGone,
    /// Late result for a cancelled in-flight task; dropped by design.
    Discarded,
    /// No entry and no cancellation record: invariant violation.
    Unknown,
}

/// Pending-submission table.
pub(crate) struct ResultRouter<V> {
    pending: HashMap<TaskId, ResultSender<V>>,
    discarded: HashSet<TaskId>,
}

impl<V> ResultRouter<V> {
    pub fn new() -> Self {
        Self {
            pending: HashMap::new(),
            discarded: HashSet::new(),
        }
    }

    pub fn register(&mut self, id: TaskId, sender: ResultSender<V>) {
        if self.pending.insert(id, sender).is_some() {
            warn!(task_id = %id, "pending entry overwritten: duplicate task id");
        }
    }

    /// Routes a result to its submitter, removing the entry first so a second
    /// resolution for the same id cannot reach a caller.
    pub fn resolve(&mut self, result: TaskResult<V>) -> Resolution {
        let id = result.task_id;
        match self.pending.remove(&id) {
            Some(sender) => {
                if sender.send(result) {
                    Resolution::Delivered
                } else {
                    Resolution::CallerGone
                }
            }
            None => {
                if self.discarded.remove(&id) {
                    Resolution::Discarded
                } else {
                    warn!(task_id = %id, "result for task with no pending entry dropped");
                    Resolution::Unknown
                }
            }
        }
    }

    /// Records cancellation of a dispatched task. With `resolve_now` the
    /// handle observes `Cancelled` immediately; either way the worker's
    /// eventual result will be discarded silently.
    ///
    /// Returns false when the id has no pending entry (already resolved).
    pub fn cancel_in_flight(&mut self, id: TaskId, resolve_now: bool) -> bool {
        match self.pending.remove(&id) {
            Some(sender) => {
                self.discarded.insert(id);
                if resolve_now {
                    sender.send(TaskResult::unrun(id, TaskError::Cancelled));
                }
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.pending.contains_key(&id)
    }

    #[cfg(test)]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sync_pair() -> (
        ResultSender<i64>,
        crossbeam_channel::Receiver<TaskResult<i64>>,
    ) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        (ResultSender::Sync(tx), rx)
    }

    fn ok_result(id: u64) -> TaskResult<i64> {
        TaskResult::completed(TaskId::from_raw(id), 0, Duration::ZERO, 42)
    }

    #[test]
    fn test_resolve_delivers_exactly_once() {
        let mut router = ResultRouter::new();
        let (tx, rx) = sync_pair();
        router.register(TaskId::from_raw(1), tx);

        assert_eq!(router.resolve(ok_result(1)), Resolution::Delivered);
        assert_eq!(rx.recv().unwrap().task_id, TaskId::from_raw(1));

        // Second resolution finds no entry.
        assert_eq!(router.resolve(ok_result(1)), Resolution::Unknown);
        assert_eq!(router.pending_len(), 0);
    }

    #[test]
    fn test_dropped_receiver_is_caller_gone() {
        let mut router = ResultRouter::new();
        let (tx, rx) = sync_pair();
        router.register(TaskId::from_raw(7), tx);
        drop(rx);

        assert_eq!(router.resolve(ok_result(7)), Resolution::CallerGone);
    }

    #[test]
    fn test_cancelled_in_flight_discards_late_result() {
        let mut router = ResultRouter::new();
        let (tx, rx) = sync_pair();
        router.register(TaskId::from_raw(3), tx);

        assert!(router.cancel_in_flight(TaskId::from_raw(3), false));
        assert!(rx.try_recv().is_err());

        // The worker finishes later; nothing is delivered and nothing warns.
        assert_eq!(router.resolve(ok_result(3)), Resolution::Discarded);
        assert_eq!(router.resolve(ok_result(3)), Resolution::Unknown);
    }

    #[test]
    fn test_cancel_with_resolve_now_delivers_cancelled() {
        let mut router = ResultRouter::new();
        let (tx, rx) = sync_pair();
        router.register(TaskId::from_raw(4), tx);

        assert!(router.cancel_in_flight(TaskId::from_raw(4), true));
        let result = rx.recv().unwrap();
        assert_eq!(result.outcome, Err(TaskError::Cancelled));
        assert!(result.worker.is_none());

        assert_eq!(router.resolve(ok_result(4)), Resolution::Discarded);
    }

    #[test]
    fn test_cancel_of_resolved_task_reports_false() {
        let mut router: ResultRouter<i64> = ResultRouter::new();
        assert!(!router.cancel_in_flight(TaskId::from_raw(9), true));
    }
}
