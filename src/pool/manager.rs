//! Pool construction, submission, dispatch, and shutdown.
//!
//! All scheduling state lives behind one mutex: worker slots, the FIFO
//! queue, and the pending-result table move together, which is what makes
//! the ordering and exactly-once guarantees cheap to uphold. Workers only
//! ever touch that state through [`PoolShared::complete`], so a completed
//! worker picks up the next queued task in the same critical section that
//! records its result.

use std::fmt;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, trace};

use crate::config::{CancelInFlight, OverflowPolicy, PoolConfig};
use crate::error::{PoolError, Result, TaskError};
#[cfg(feature = "async")]
use crate::pool::handle::AsyncTaskHandle;
use crate::pool::handle::{CancelOutcome, Canceller, TaskHandle};
use crate::pool::queue::TaskQueue;
use crate::pool::router::{Resolution, ResultRouter, ResultSender};
use crate::pool::task::{Task, TaskId, TaskResult};
use crate::pool::worker::{self, Assignment, WorkerId, WorkerState};
use crate::registry::HandlerRegistry;

/// A fixed-size pool of worker threads executing registered task kinds.
///
/// Tasks are dispatched strictly in submission order. Submission returns a
/// [`TaskHandle`] that resolves exactly once with the task's result. The
/// pool owns its workers: dropping it (or calling [`shutdown`](Pool::shutdown))
/// stops them and joins their threads.
pub struct Pool<P, V> {
    shared: Arc<PoolShared<P, V>>,
    canceller: Canceller,
}

/// Point-in-time and lifetime counters for a pool.
///
/// Gauges are read in a single critical section, so they are mutually
/// consistent: `idle_workers` and `queued_tasks` can never show an idle
/// worker alongside a waiting task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Live workers: every slot whose thread has not terminated. Worker
    /// replacement keeps this constant; shutdown drives it to zero.
    pub pool_size: usize,
    /// Workers currently waiting for an assignment.
    pub idle_workers: usize,
    /// Tasks accepted but not yet dispatched.
    pub queued_tasks: usize,
    /// Tasks currently executing on a worker.
    pub in_flight_tasks: usize,
    /// Submissions accepted over the pool's lifetime.
    pub submitted: u64,
    /// Tasks that resolved with a value.
    pub completed: u64,
    /// Tasks that resolved with an error, including tasks dumped unrun at
    /// shutdown or on worker loss. Cancellations count separately.
    pub failed: u64,
    /// Cancellation requests that took effect.
    pub cancelled: u64,
    /// Submissions refused at the door (queue full or pool closed).
    pub rejected: u64,
}

/// What a worker should do after reporting a completion.
pub(crate) enum Followup<P> {
    /// Run this task next.
    Run(Task<P>),
    /// Nothing queued; wait on the mailbox.
    Idle,
    /// The pool is draining and has nothing left for this worker.
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Running,
    Draining,
}

struct WorkerSlot<P> {
    state: WorkerState,
    mailbox: crossbeam_channel::Sender<Assignment<P>>,
    /// Task the worker is executing, when `Busy`.
    current: Option<TaskId>,
    /// Bumped when the slot gets a replacement thread. Reports carrying a
    /// stale epoch come from the previous occupant and are ignored.
    epoch: u64,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: u64,
    completed: u64,
    failed: u64,
    cancelled: u64,
    rejected: u64,
}

struct Core<P, V> {
    workers: Vec<WorkerSlot<P>>,
    queue: TaskQueue<P>,
    router: ResultRouter<V>,
    phase: Phase,
    next_id: u64,
    counters: Counters,
}

impl<P, V> Core<P, V> {
    fn next_task_id(&mut self) -> TaskId {
        let id = TaskId::from_raw(self.next_id);
        self.next_id += 1;
        id
    }

    fn idle_worker(&self) -> Option<WorkerId> {
        self.workers
            .iter()
            .position(|slot| slot.state == WorkerState::Idle)
    }

    fn live_workers(&self) -> bool {
        self.workers
            .iter()
            .any(|slot| slot.state != WorkerState::Terminated)
    }

    /// Resolves everything still queued with `error`. Used when no worker
    /// will ever pick those tasks up again. Dumped tasks count as failures,
    /// so the lifetime counters reconcile with what the handles observed.
    fn dump_queue(&mut self, error: TaskError) {
        let orphaned: Vec<Task<P>> = self.queue.drain().collect();
        for task in orphaned {
            let resolution = self
                .router
                .resolve(TaskResult::unrun(task.id, error.clone()));
            if matches!(resolution, Resolution::Delivered | Resolution::CallerGone) {
                self.counters.failed += 1;
            }
        }
    }
}

/// State shared between the pool front end and its worker threads.
pub(crate) struct PoolShared<P, V> {
    core: Mutex<Core<P, V>>,
    /// Signalled when queue space frees up; blocked submitters wait here.
    space: Condvar,
    /// Signalled when a worker terminates; shutdown waits here.
    drained: Condvar,
    threads: Mutex<Vec<Option<JoinHandle<()>>>>,
    pub(crate) registry: Arc<HandlerRegistry<P, V>>,
    config: PoolConfig,
    worker_count: usize,
}

impl<P, V> Pool<P, V>
where
    P: Send + 'static,
    V: Send + 'static,
{
    /// Creates a pool with default configuration.
    pub fn new(registry: HandlerRegistry<P, V>) -> Result<Self> {
        Self::with_config(registry, PoolConfig::default())
    }

    /// Creates a pool, validating `config` and spawning its workers up front.
    pub fn with_config(registry: HandlerRegistry<P, V>, config: PoolConfig) -> Result<Self> {
        config.validate()?;
        let worker_count = config.workers();

        let mut slots = Vec::with_capacity(worker_count);
        let mut inboxes = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let (tx, rx) = crossbeam_channel::bounded(1);
            slots.push(WorkerSlot {
                state: WorkerState::Idle,
                mailbox: tx,
                current: None,
                epoch: 0,
            });
            inboxes.push(rx);
        }

        let shared = Arc::new(PoolShared {
            core: Mutex::new(Core {
                workers: slots,
                queue: TaskQueue::new(config.queue_capacity),
                router: ResultRouter::new(),
                phase: Phase::Running,
                next_id: 1,
                counters: Counters::default(),
            }),
            space: Condvar::new(),
            drained: Condvar::new(),
            threads: Mutex::new((0..worker_count).map(|_| None).collect()),
            registry: Arc::new(registry),
            config,
            worker_count,
        });

        let weak: Weak<PoolShared<P, V>> = Arc::downgrade(&shared);
        let canceller: Canceller = Arc::new(move |id| match weak.upgrade() {
            Some(shared) => shared.cancel(id),
            // pool already gone; everything it tracked has resolved
            None => CancelOutcome::Done,
        });

        for (id, inbox) in inboxes.into_iter().enumerate() {
            if let Err(err) = spawn_worker(&shared, id, 0, inbox) {
                // Slots that never got a thread cannot converge on their own.
                {
                    let mut core = shared.core.lock();
                    for slot in core.workers.iter_mut().skip(id) {
                        slot.state = WorkerState::Terminated;
                    }
                }
                let partial = Pool { shared, canceller };
                partial.shutdown();
                return Err(err);
            }
        }

        debug!(workers = worker_count, "pool started");
        Ok(Pool { shared, canceller })
    }

    /// Submits a task of a registered `kind`, returning a handle that
    /// resolves exactly once with its result.
    ///
    /// When the queue is bounded and full, the call either fails with
    /// [`PoolError::QueueFull`] or blocks until space frees up, per
    /// [`OverflowPolicy`]. A draining or closed pool fails with
    /// [`PoolError::Closed`].
    pub fn submit(&self, kind: impl Into<String>, payload: P) -> Result<TaskHandle<V>> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let id = self
            .shared
            .enqueue(kind.into(), payload, ResultSender::Sync(tx))?;
        Ok(TaskHandle::new(id, rx, Arc::clone(&self.canceller)))
    }

    /// Submits a task and returns a handle awaitable from async code.
    ///
    /// Admission behaves exactly like [`submit`](Pool::submit); under
    /// [`OverflowPolicy::Block`] a full queue blocks the calling thread,
    /// not just the current future.
    #[cfg(feature = "async")]
    pub fn submit_async(&self, kind: impl Into<String>, payload: P) -> Result<AsyncTaskHandle<V>> {
        let (tx, rx) = async_channel::bounded(1);
        let id = self
            .shared
            .enqueue(kind.into(), payload, ResultSender::Async(tx))?;
        Ok(AsyncTaskHandle::new(id, rx, Arc::clone(&self.canceller)))
    }
}

impl<P, V> Pool<P, V> {
    /// Requests cancellation of a task by id.
    ///
    /// Equivalent to [`TaskHandle::cancel`], usable without the handle.
    pub fn cancel(&self, id: TaskId) -> CancelOutcome {
        self.shared.cancel(id)
    }

    /// Point-in-time snapshot of pool state and lifetime counters.
    pub fn stats(&self) -> PoolStats {
        let core = self.shared.core.lock();
        let mut live = 0;
        let mut idle = 0;
        let mut busy = 0;
        for slot in &core.workers {
            match slot.state {
                WorkerState::Idle => {
                    live += 1;
                    idle += 1;
                }
                WorkerState::Busy => {
                    live += 1;
                    busy += 1;
                }
                WorkerState::Terminating => live += 1,
                WorkerState::Terminated => {}
            }
        }
        PoolStats {
            pool_size: live,
            idle_workers: idle,
            queued_tasks: core.queue.len(),
            in_flight_tasks: busy,
            submitted: core.counters.submitted,
            completed: core.counters.completed,
            failed: core.counters.failed,
            cancelled: core.counters.cancelled,
            rejected: core.counters.rejected,
        }
    }

    /// Number of worker slots the pool was built with.
    pub fn worker_count(&self) -> usize {
        self.shared.worker_count
    }

    /// Whether the pool still accepts submissions.
    pub fn is_running(&self) -> bool {
        self.shared.core.lock().phase == Phase::Running
    }

    /// Stops the pool and joins every worker thread.
    ///
    /// In-flight tasks always run to completion. Queued tasks either run
    /// first or resolve with [`TaskError::ShuttingDown`], per
    /// [`PoolConfig::shutdown_drains_queue`]. Submitters blocked on a full
    /// queue are woken and fail with [`PoolError::Closed`]. Idempotent;
    /// concurrent callers all block until the pool has converged.
    pub fn shutdown(&self) {
        self.shared.begin_shutdown();
        self.shared.await_terminated();

        // Take each handle under a short lock: a lost worker's replacement
        // may be storing its own handle while this loop runs.
        let count = self.shared.threads.lock().len();
        for slot in 0..count {
            let handle = self.shared.threads.lock()[slot].take();
            if let Some(handle) = handle {
                let _ = handle.join();
            }
        }
        debug!("pool shut down");
    }
}

impl<P, V> Drop for Pool<P, V> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<P, V> fmt::Debug for Pool<P, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("workers", &self.shared.worker_count)
            .finish_non_exhaustive()
    }
}

impl<P, V> PoolShared<P, V> {
    /// Admits a task: hands it straight to an idle worker when one exists,
    /// otherwise queues it, otherwise applies the overflow policy.
    fn enqueue(&self, kind: String, payload: P, sender: ResultSender<V>) -> Result<TaskId> {
        let mut core = self.core.lock();
        loop {
            if core.phase != Phase::Running {
                core.counters.rejected += 1;
                trace!(kind = %kind, "submission rejected: pool closed");
                return Err(PoolError::Closed);
            }

            if let Some(worker) = core.idle_worker() {
                let id = core.next_task_id();
                core.router.register(id, sender);
                core.counters.submitted += 1;
                let slot = &mut core.workers[worker];
                slot.state = WorkerState::Busy;
                slot.current = Some(id);
                // an idle worker's mailbox is empty, so this cannot fail
                let sent = slot.mailbox.try_send(Assignment::Run(Task::new(id, kind, payload)));
                debug_assert!(sent.is_ok());
                return Ok(id);
            }

            if !core.queue.is_full() {
                let id = core.next_task_id();
                core.router.register(id, sender);
                core.counters.submitted += 1;
                core.queue.push(Task::new(id, kind, payload));
                return Ok(id);
            }

            match self.config.on_queue_full {
                OverflowPolicy::Reject => {
                    core.counters.rejected += 1;
                    trace!(kind = %kind, "submission rejected: queue full");
                    return Err(PoolError::QueueFull {
                        capacity: core.queue.capacity().unwrap_or(0),
                    });
                }
                OverflowPolicy::Block => self.space.wait(&mut core),
            }
        }
    }

    /// Records a finished task and decides the worker's next move. Routing
    /// the result and picking up the queue head happen under one lock, so
    /// the worker is never observable as idle while tasks wait.
    ///
    /// A stale `epoch` means the slot was given to a replacement thread while
    /// this one was presumed lost; its task already resolved as lost, so the
    /// late result is dropped and the thread is told to retire.
    pub(crate) fn complete(&self, worker: WorkerId, epoch: u64, result: TaskResult<V>) -> Followup<P> {
        let mut guard = self.core.lock();
        let core = &mut *guard;
        if core.workers[worker].epoch != epoch {
            return Followup::Stop;
        }
        core.workers[worker].current = None;

        let succeeded = result.is_success();
        match core.router.resolve(result) {
            Resolution::Delivered | Resolution::CallerGone => {
                if succeeded {
                    core.counters.completed += 1;
                } else {
                    core.counters.failed += 1;
                }
            }
            // cancelled mid-flight; already accounted for
            Resolution::Discarded | Resolution::Unknown => {}
        }

        let pick_next = core.phase == Phase::Running || self.config.shutdown_drains_queue;
        if pick_next {
            if let Some(task) = core.queue.pop() {
                let slot = &mut core.workers[worker];
                slot.current = Some(task.id);
                drop(guard);
                self.space.notify_one();
                return Followup::Run(task);
            }
        }

        match core.phase {
            Phase::Running => {
                core.workers[worker].state = WorkerState::Idle;
                Followup::Idle
            }
            Phase::Draining => {
                core.workers[worker].state = WorkerState::Terminating;
                Followup::Stop
            }
        }
    }

    /// Cancels a task wherever it currently is.
    fn cancel(&self, id: TaskId) -> CancelOutcome {
        let mut guard = self.core.lock();
        let core = &mut *guard;

        if let Some(task) = core.queue.remove(id) {
            drop(task);
            core.router
                .resolve(TaskResult::unrun(id, TaskError::Cancelled));
            core.counters.cancelled += 1;
            drop(guard);
            self.space.notify_one();
            return CancelOutcome::Cancelled;
        }

        if core.router.contains(id) {
            let resolve_now = self.config.cancel_in_flight == CancelInFlight::ResolveCancelled;
            core.router.cancel_in_flight(id, resolve_now);
            core.counters.cancelled += 1;
            return CancelOutcome::InFlight;
        }

        CancelOutcome::Done
    }

    fn begin_shutdown(&self) {
        let mut guard = self.core.lock();
        if guard.phase == Phase::Draining {
            return;
        }
        guard.phase = Phase::Draining;
        debug!("pool draining");

        let core = &mut *guard;
        if !self.config.shutdown_drains_queue {
            core.dump_queue(TaskError::ShuttingDown);
        }
        for slot in &mut core.workers {
            if slot.state == WorkerState::Idle {
                slot.state = WorkerState::Terminating;
                let _ = slot.mailbox.try_send(Assignment::Stop);
            }
        }
        drop(guard);
        // blocked submitters wake up and observe the drain
        self.space.notify_all();
    }

    fn await_terminated(&self) {
        let mut core = self.core.lock();
        while core.live_workers() {
            self.drained.wait(&mut core);
        }
    }

    /// Normal worker exit: the thread is about to return.
    pub(crate) fn on_worker_exit(&self, worker: WorkerId, epoch: u64) {
        let mut core = self.core.lock();
        if core.workers[worker].epoch == epoch {
            core.workers[worker].state = WorkerState::Terminated;
        }
        drop(core);
        self.drained.notify_all();
    }
}

impl<P, V> PoolShared<P, V>
where
    P: Send + 'static,
    V: Send + 'static,
{
    /// Abnormal worker death, reported from the thread's drop guard.
    ///
    /// Resolves the orphaned task, then either respawns the slot (running
    /// pool, restarts enabled) or retires it. A pool whose last worker is
    /// gone with restarts disabled closes itself: nothing could ever run
    /// its queue.
    pub(crate) fn on_worker_lost(shared: &Arc<Self>, worker: WorkerId, epoch: u64) {
        let respawn;
        {
            let mut guard = shared.core.lock();
            let core = &mut *guard;
            if core.workers[worker].epoch != epoch {
                return;
            }
            core.workers[worker].state = WorkerState::Terminated;
            if let Some(task_id) = core.workers[worker].current.take() {
                let resolution = core.router.resolve(TaskResult::failed(
                    task_id,
                    worker,
                    Duration::ZERO,
                    TaskError::WorkerLost,
                ));
                if matches!(resolution, Resolution::Delivered | Resolution::CallerGone) {
                    core.counters.failed += 1;
                }
            }

            respawn = core.phase == Phase::Running && shared.config.restart_lost_workers;
            if !respawn && !core.live_workers() {
                let error = if core.phase == Phase::Draining {
                    TaskError::ShuttingDown
                } else {
                    TaskError::WorkerLost
                };
                core.phase = Phase::Draining;
                core.dump_queue(error);
            }
        }
        shared.drained.notify_all();
        shared.space.notify_all();

        if respawn {
            Self::respawn_worker(shared, worker);
        }
    }

    /// Replaces a lost worker's thread, reusing its slot id. The slot stays
    /// `Terminated` until the replacement thread has spawned, so nothing is
    /// dispatched into a mailbox nobody reads. A draining pool keeps the slot
    /// retired: the respawn is skipped outright, and a drain that begins
    /// mid-spawn stops the fresh thread before it is ever counted as live.
    fn respawn_worker(shared: &Arc<Self>, worker: WorkerId) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let epoch;
        {
            let mut core = shared.core.lock();
            if core.phase != Phase::Running {
                // shutdown won the race; the slot stays down
                return;
            }
            let slot = &mut core.workers[worker];
            slot.mailbox = tx;
            slot.current = None;
            slot.epoch += 1;
            epoch = slot.epoch;
        }

        match spawn_worker(shared, worker, epoch, rx) {
            Ok(()) => {
                let mut guard = shared.core.lock();
                let core = &mut *guard;
                if core.phase != Phase::Running {
                    // drain began mid-spawn; retire the thread while the
                    // slot stays Terminated
                    let _ = core.workers[worker].mailbox.try_send(Assignment::Stop);
                    return;
                }
                core.workers[worker].state = WorkerState::Idle;
                if let Some(task) = core.queue.pop() {
                    let slot = &mut core.workers[worker];
                    slot.state = WorkerState::Busy;
                    slot.current = Some(task.id);
                    let _ = slot.mailbox.try_send(Assignment::Run(task));
                    drop(guard);
                    shared.space.notify_one();
                }
                debug!(worker, "worker respawned");
            }
            Err(err) => {
                error!(worker, %err, "failed to respawn worker");
                let mut guard = shared.core.lock();
                let core = &mut *guard;
                if !core.live_workers() {
                    let error = if core.phase == Phase::Draining {
                        TaskError::ShuttingDown
                    } else {
                        TaskError::WorkerLost
                    };
                    core.phase = Phase::Draining;
                    core.dump_queue(error);
                    drop(guard);
                    shared.drained.notify_all();
                    shared.space.notify_all();
                }
            }
        }
    }
}

fn spawn_worker<P, V>(
    shared: &Arc<PoolShared<P, V>>,
    worker: WorkerId,
    epoch: u64,
    mailbox: crossbeam_channel::Receiver<Assignment<P>>,
) -> Result<()>
where
    P: Send + 'static,
    V: Send + 'static,
{
    let name = format!("{}-{}", shared.config.thread_name_prefix, worker);
    let mut builder = thread::Builder::new().name(name);
    if let Some(stack_size) = shared.config.stack_size {
        builder = builder.stack_size(stack_size);
    }

    let body = Arc::clone(shared);
    let handle = builder
        .spawn(move || worker::run(body, worker, epoch, mailbox))
        .map_err(|e| PoolError::spawn(format!("spawn failed: {}", e)))?;
    shared.threads.lock()[worker] = Some(handle);
    Ok(())
}
