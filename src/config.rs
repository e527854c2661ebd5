use crate::error::{PoolError, Result};

/// Capacity of the pending-task queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueCapacity {
    Unbounded,
    Bounded(usize),
}

impl Default for QueueCapacity {
    fn default() -> Self {
        QueueCapacity::Unbounded
    }
}

/// What `submit` does when a bounded queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Fail the submission synchronously with `PoolError::QueueFull`.
    Reject,
    /// Park the submitting thread until a slot frees up (or the pool closes).
    Block,
}

impl Default for OverflowPolicy {
    fn default() -> Self {
        OverflowPolicy::Reject
    }
}

/// What cancelling an already-dispatched task does to its handle.
///
/// Either way the worker finishes the computation; there is no preemption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelInFlight {
    /// Advisory cancel: the pending entry is dropped and the eventual result
    /// is discarded. The handle is never resolved.
    Discard,
    /// Resolve the handle with `TaskError::Cancelled` immediately and discard
    /// the late result when the worker finishes.
    ResolveCancelled,
}

impl Default for CancelInFlight {
    fn default() -> Self {
        CancelInFlight::Discard
    }
}

/// Pool construction options.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub worker_count: Option<usize>,
    pub queue_capacity: QueueCapacity,
    pub on_queue_full: OverflowPolicy,
    pub cancel_in_flight: CancelInFlight,
    pub shutdown_drains_queue: bool,
    pub restart_lost_workers: bool,
    pub thread_name_prefix: String,
    pub stack_size: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: None,
            queue_capacity: QueueCapacity::default(),
            on_queue_full: OverflowPolicy::default(),
            cancel_in_flight: CancelInFlight::default(),
            shutdown_drains_queue: false,
            restart_lost_workers: true,
            thread_name_prefix: "karya-worker".to_string(),
            stack_size: Some(2 * 1024 * 1024),
        }
    }
}

impl PoolConfig {
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.worker_count {
            if n == 0 {
                return Err(PoolError::config("worker_count must be > 0"));
            }
            if n > 1024 {
                return Err(PoolError::config("worker_count too large (max 1024)"));
            }
        }

        if let QueueCapacity::Bounded(n) = self.queue_capacity {
            if n == 0 {
                return Err(PoolError::config("bounded queue capacity must be > 0"));
            }
        }

        if self.thread_name_prefix.is_empty() {
            return Err(PoolError::config("thread_name_prefix must not be empty"));
        }

        Ok(())
    }

    /// Effective worker count: the configured value or the number of
    /// available CPU cores.
    pub fn workers(&self) -> usize {
        self.worker_count.unwrap_or_else(num_cpus::get)
    }
}

#[derive(Debug, Default)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: PoolConfig::default(),
        }
    }

    pub fn worker_count(mut self, n: usize) -> Self {
        self.config.worker_count = Some(n);
        self
    }

    pub fn queue_capacity(mut self, capacity: QueueCapacity) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    pub fn bounded_queue(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = QueueCapacity::Bounded(capacity);
        self
    }

    pub fn on_queue_full(mut self, policy: OverflowPolicy) -> Self {
        self.config.on_queue_full = policy;
        self
    }

    pub fn cancel_in_flight(mut self, policy: CancelInFlight) -> Self {
        self.config.cancel_in_flight = policy;
        self
    }

    pub fn shutdown_drains_queue(mut self, drain: bool) -> Self {
        self.config.shutdown_drains_queue = drain;
        self
    }

    pub fn restart_lost_workers(mut self, restart: bool) -> Self {
        self.config.restart_lost_workers = restart;
        self
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn build(self) -> Result<PoolConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
