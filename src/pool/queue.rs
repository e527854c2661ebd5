//! Strict FIFO buffer for tasks awaiting an idle worker.
//!
//! A task sits here only while every worker is busy; dispatch order is
//! insertion order. No priorities, no reordering, no deduplication.

use std::collections::VecDeque;

use crate::config::QueueCapacity;
use crate::pool::task::{Task, TaskId};

#[derive(Debug)]
pub(crate) struct TaskQueue<P> {
    entries: VecDeque<Task<P>>,
    capacity: Option<usize>,
}

impl<P> TaskQueue<P> {
    pub fn new(capacity: QueueCapacity) -> Self {
        let capacity = match capacity {
            QueueCapacity::Unbounded => None,
            QueueCapacity::Bounded(n) => Some(n),
        };
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    pub fn is_full(&self) -> bool {
        self.capacity.is_some_and(|cap| self.entries.len() >= cap)
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Appends to the tail. Callers check [`is_full`](Self::is_full) first;
    /// admission policy lives in the manager.
    pub fn push(&mut self, task: Task<P>) {
        debug_assert!(!self.is_full());
        self.entries.push_back(task);
    }

    /// Removes and returns the oldest entry.
    pub fn pop(&mut self) -> Option<Task<P>> {
        self.entries.pop_front()
    }

    /// Removes a queued task by id, keeping the order of the remainder.
    pub fn remove(&mut self, id: TaskId) -> Option<Task<P>> {
        let pos = self.entries.iter().position(|t| t.id == id)?;
        self.entries.remove(pos)
    }

    /// Empties the queue, yielding tasks in FIFO order.
    pub fn drain(&mut self) -> impl Iterator<Item = Task<P>> + '_ {
        self.entries.drain(..)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
