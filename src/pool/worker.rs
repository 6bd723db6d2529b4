//! Worker thread logic for the pool
//!
//! Each worker:
//! - Pulls tasks from the shared queue until quit is signaled
//! - Runs the task body, then emits a heartbeat
//! - Hands a failed task's error to that task's own handler
//! - Never exits because a task failed

use crate::error::PoolError;
use crate::pool::task::Task;
use crate::pool::worker_pool::PoolShared;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, trace, warn};

thread_local! {
    // Address of the pool this thread works for, 0 elsewhere
    static CURRENT_POOL: Cell<usize> = const { Cell::new(0) };
}

/// True when called from one of `shared`'s own worker threads
pub(crate) fn on_worker_of(shared: &PoolShared) -> bool {
    CURRENT_POOL.with(Cell::get) == shared as *const PoolShared as usize
}

/// A worker thread that executes tasks
pub struct Worker {
    /// Worker ID
    id: usize,

    /// Thread handle
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawn a new worker thread
    pub(crate) fn spawn(id: usize, shared: Arc<PoolShared>) -> Result<Self, PoolError> {
        let handle = thread::Builder::new()
            .name(format!("walker-{}", id))
            .spawn(move || worker_loop(id, shared))
            .map_err(|e| PoolError::SpawnFailed {
                id,
                reason: e.to_string(),
            })?;

        Ok(Self {
            id,
            handle: Some(handle),
        })
    }

    /// Get worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Wait for the worker to finish
    pub fn join(mut self) -> Result<(), PoolError> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| PoolError::WorkerPanicked { id: self.id }),
            None => Ok(()),
        }
    }
}

/// Main worker loop
fn worker_loop(id: usize, shared: Arc<PoolShared>) {
    CURRENT_POOL.with(|pool| pool.set(Arc::as_ptr(&shared) as usize));
    debug!(worker = id, "Worker starting");

    while let Some(task) = shared.queue.pop(&shared.quit_rx) {
        // Dequeued in the same instant quit fired: leave it unexecuted
        if shared.is_stopped() {
            shared.abandon(task);
            break;
        }
        run_task(&shared, task);
    }

    debug!(worker = id, "Worker shutting down");
}

/// Execute one task: body, heartbeat, then the error handler on failure
pub(crate) fn run_task(shared: &PoolShared, task: Task) {
    let (result, on_error) = task.run();
    shared.detector.beat();

    match result {
        Ok(()) => {
            shared.stats.executed.fetch_add(1, Ordering::Relaxed);
        }
        Err(err) => {
            shared.stats.failed.fetch_add(1, Ordering::Relaxed);
            trace!(error = %err, "Task returned an error");
            if panic::catch_unwind(AssertUnwindSafe(|| on_error(err))).is_err() {
                warn!("Task error handler panicked");
            }
        }
    }

    shared.detector.task_finished();
}
