//! Fixed-size worker pool fed by a bounded task queue
//!
//! The pool moves through `Created → Running → Stopped` exactly once.
//! `start` and `stop` are idempotent; a stopped pool cannot be restarted.

use crate::error::PoolError;
use crate::pool::queue::{TaskQueue, QUEUE_CAPACITY};
use crate::pool::quiescence::{Quiescence, QuiescenceDetector, Termination};
use crate::pool::task::Task;
use crate::pool::worker::{on_worker_of, run_task, Worker};
use crossbeam_channel::{unbounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Lifecycle state of a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// Constructed, no worker running yet
    Created,

    /// Workers are draining the queue
    Running,

    /// Quit has been signaled; terminal
    Stopped,
}

/// What happened to a submitted task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Placed on the queue
    Queued,

    /// Queue was full; executed on the submitting worker
    RanInline,

    /// Pool is shutting down; the task was discarded
    Dropped,
}

/// Pool-wide task statistics
#[derive(Debug, Default)]
pub struct PoolStats {
    /// Tasks accepted (queued or run inline)
    pub submitted: AtomicU64,

    /// Tasks whose body returned `Ok`
    pub executed: AtomicU64,

    /// Tasks whose body returned an error or panicked
    pub failed: AtomicU64,

    /// Tasks executed inline because the queue was full
    pub inline: AtomicU64,

    /// Submissions discarded after shutdown began
    pub dropped: AtomicU64,

    /// Queued tasks left unexecuted at shutdown
    pub abandoned: AtomicU64,
}

impl PoolStats {
    /// Tasks that ran to completion, successfully or not
    pub fn completed(&self) -> u64 {
        self.executed.load(Ordering::Relaxed) + self.failed.load(Ordering::Relaxed)
    }
}

struct Lifecycle {
    state: PoolState,
    // Dropping the sender closes the quit channel for every listener
    quit_tx: Option<Sender<()>>,
}

/// State shared by the pool handle, its workers and its submitters
pub(crate) struct PoolShared {
    pub(crate) queue: TaskQueue,
    pub(crate) quit_rx: Receiver<()>,
    pub(crate) detector: QuiescenceDetector,
    pub(crate) stats: PoolStats,
    lifecycle: Mutex<Lifecycle>,
}

impl PoolShared {
    pub(crate) fn is_stopped(&self) -> bool {
        self.lifecycle.lock().state == PoolState::Stopped
    }

    pub(crate) fn abandon(&self, task: Task) {
        self.stats.abandoned.fetch_add(1, Ordering::Relaxed);
        drop(task);
    }

    fn drop_submission(&self, task: Task) -> Submission {
        self.stats.dropped.fetch_add(1, Ordering::Relaxed);
        self.detector.task_finished();
        trace!("Submission dropped after shutdown");
        drop(task);
        Submission::Dropped
    }

    fn add_task(&self, task: Task) -> Submission {
        if self.is_stopped() {
            return self.drop_submission_uncounted(task);
        }

        self.detector.task_submitted();
        if self.queue.push(task, &self.quit_rx) {
            self.stats.submitted.fetch_add(1, Ordering::Relaxed);
            Submission::Queued
        } else {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            self.detector.task_finished();
            trace!("Submission dropped after shutdown");
            Submission::Dropped
        }
    }

    fn add_task_or_run_inline(&self, task: Task) -> Submission {
        if !on_worker_of(self) {
            return self.add_task(task);
        }
        if self.is_stopped() {
            return self.drop_submission_uncounted(task);
        }

        self.detector.task_submitted();
        match self.queue.try_push(task) {
            Ok(()) => {
                self.stats.submitted.fetch_add(1, Ordering::Relaxed);
                Submission::Queued
            }
            Err(TrySendError::Full(task)) => {
                self.stats.submitted.fetch_add(1, Ordering::Relaxed);
                self.stats.inline.fetch_add(1, Ordering::Relaxed);
                trace!("Queue full, running task inline");
                run_task(self, task);
                Submission::RanInline
            }
            Err(TrySendError::Disconnected(task)) => self.drop_submission(task),
        }
    }

    fn drop_submission_uncounted(&self, task: Task) -> Submission {
        // Never registered with the detector, so nothing to decrement
        self.stats.dropped.fetch_add(1, Ordering::Relaxed);
        trace!("Submission dropped after shutdown");
        drop(task);
        Submission::Dropped
    }
}

/// Handle for submitting tasks from inside running tasks (fan-out)
#[derive(Clone)]
pub struct TaskSubmitter {
    shared: Arc<PoolShared>,
}

impl TaskSubmitter {
    /// Enqueue, blocking while the queue is full; dropped after shutdown
    pub fn add_task(&self, task: Task) -> Submission {
        self.shared.add_task(task)
    }

    /// Enqueue without ever blocking a worker.
    ///
    /// On one of this pool's worker threads a full queue makes the task run
    /// in place. Anywhere else this is the same as [`add_task`](Self::add_task).
    pub fn add_task_or_run_inline(&self, task: Task) -> Submission {
        self.shared.add_task_or_run_inline(task)
    }

    /// Check whether the pool has been told to quit
    pub fn is_stopped(&self) -> bool {
        self.shared.is_stopped()
    }
}

/// Fixed set of worker threads draining one bounded queue
pub struct WorkerPool {
    capacity: usize,
    shared: Arc<PoolShared>,
    workers: Mutex<Vec<Worker>>,
}

impl WorkerPool {
    /// Create a pool with `workers` threads and a queue of [`QUEUE_CAPACITY`].
    ///
    /// No task runs until [`start`](Self::start).
    pub fn new(workers: usize) -> Self {
        let (quit_tx, quit_rx) = unbounded();

        let shared = Arc::new(PoolShared {
            queue: TaskQueue::new(QUEUE_CAPACITY),
            quit_rx,
            detector: QuiescenceDetector::new(),
            stats: PoolStats::default(),
            lifecycle: Mutex::new(Lifecycle {
                state: PoolState::Created,
                quit_tx: Some(quit_tx),
            }),
        });

        Self {
            capacity: workers.max(1),
            shared,
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Launch the workers. Only the first call on a `Created` pool has an effect.
    pub fn start(&self) -> Result<(), PoolError> {
        let mut lifecycle = self.shared.lifecycle.lock();
        if lifecycle.state != PoolState::Created {
            return Ok(());
        }

        let mut workers = self.workers.lock();
        for id in 0..self.capacity {
            match Worker::spawn(id, Arc::clone(&self.shared)) {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    lifecycle.state = PoolState::Stopped;
                    lifecycle.quit_tx = None;
                    return Err(e);
                }
            }
        }

        lifecycle.state = PoolState::Running;
        info!(workers = self.capacity, "Worker pool started");
        Ok(())
    }

    /// Signal quit. Returns `true` only for the call that performed it.
    ///
    /// Running tasks finish; queued tasks are never executed.
    pub fn stop(&self) -> bool {
        let mut lifecycle = self.shared.lifecycle.lock();
        if lifecycle.state == PoolState::Stopped {
            return false;
        }

        lifecycle.state = PoolState::Stopped;
        lifecycle.quit_tx = None;
        debug!(pending = self.shared.queue.len(), "Worker pool stopping");
        true
    }

    /// Enqueue, blocking while the queue is full; dropped after shutdown
    pub fn add_task(&self, task: Task) -> Submission {
        self.shared.add_task(task)
    }

    /// Get a submitter handle for tasks that fan out
    pub fn submitter(&self) -> TaskSubmitter {
        TaskSubmitter {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Stop once no task has completed for `window`.
    ///
    /// Every heartbeat restarts the window. Also returns early if the pool is
    /// stopped by someone else.
    pub fn wait_for_timeout(&self, window: Duration) -> Quiescence {
        if self.shared.is_stopped() {
            return Quiescence::Stopped;
        }
        let reason = self.shared.detector.wait_idle(window, &self.shared.quit_rx);
        self.finish_wait(reason)
    }

    /// Stop once every submitted task has finished
    pub fn wait_until_drained(&self) -> Quiescence {
        if self.shared.is_stopped() {
            return Quiescence::Stopped;
        }
        let reason = self.shared.detector.wait_drained(&self.shared.quit_rx);
        self.finish_wait(reason)
    }

    /// Wait using the given termination strategy
    pub fn wait(&self, termination: Termination) -> Quiescence {
        match termination {
            Termination::Drained => self.wait_until_drained(),
            Termination::IdleTimeout(window) => self.wait_for_timeout(window),
        }
    }

    fn finish_wait(&self, reason: Quiescence) -> Quiescence {
        if reason != Quiescence::Stopped && self.stop() {
            info!(reason = ?reason, "Worker pool quiescent");
        }
        reason
    }

    /// Join all worker threads. Call after the pool has stopped.
    pub fn join(&self) -> Result<(), PoolError> {
        let workers = std::mem::take(&mut *self.workers.lock());
        let mut first_err = None;

        for worker in workers {
            let id = worker.id();
            if let Err(e) = worker.join() {
                warn!(worker = id, error = %e, "Worker failed to join cleanly");
                first_err.get_or_insert(e);
            }
        }

        // Pending tasks may hold submitters; release them now
        for task in self.shared.queue.drain() {
            self.shared.abandon(task);
        }

        first_err.map_or(Ok(()), Err)
    }

    /// Current lifecycle state
    pub fn state(&self) -> PoolState {
        self.shared.lifecycle.lock().state
    }

    /// Number of worker threads
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of workers currently spawned
    pub fn worker_count(&self) -> usize {
        self.workers.lock().len()
    }

    /// Tasks waiting in the queue
    pub fn queue_len(&self) -> usize {
        self.shared.queue.len()
    }

    /// Tasks submitted but not yet finished
    pub fn outstanding(&self) -> usize {
        self.shared.detector.outstanding()
    }

    /// Pool-wide statistics
    pub fn stats(&self) -> &PoolStats {
        &self.shared.stats
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop();
        let _ = self.join();
    }
}
