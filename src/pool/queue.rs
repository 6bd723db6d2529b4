//! Bounded task queue with backpressure support
//!
//! Producers block on a full queue unless the pool has been told to quit,
//! in which case the submission is dropped. Consumers block on an empty
//! queue until a task arrives or quit is signaled.

use crate::pool::task::Task;
use crossbeam_channel::{bounded, select, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};

/// Fixed capacity of the pool's task queue
pub const QUEUE_CAPACITY: usize = 256;

/// Statistics for the task queue
#[derive(Debug, Default)]
pub struct QueueStats {
    /// Total tasks enqueued
    pub enqueued: AtomicU64,

    /// Total tasks dequeued
    pub dequeued: AtomicU64,

    /// Number of times a producer found the queue full
    pub backpressure_events: AtomicU64,
}

impl QueueStats {
    /// Get queue throughput (dequeued tasks)
    pub fn throughput(&self) -> u64 {
        self.dequeued.load(Ordering::Relaxed)
    }

    /// Get backpressure event count
    pub fn backpressure_count(&self) -> u64 {
        self.backpressure_events.load(Ordering::Relaxed)
    }
}

/// Bounded buffer of pending tasks
pub struct TaskQueue {
    sender: Sender<Task>,
    receiver: Receiver<Task>,
    capacity: usize,
    stats: QueueStats,
}

impl TaskQueue {
    /// Create a new task queue with the specified capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);

        Self {
            sender,
            receiver,
            capacity,
            stats: QueueStats::default(),
        }
    }

    /// Enqueue, blocking while the queue is full.
    ///
    /// Returns `false` if `quit` fired first; the task is dropped.
    pub fn push(&self, task: Task, quit: &Receiver<()>) -> bool {
        match self.try_push(task) {
            Ok(()) => true,
            Err(TrySendError::Disconnected(_)) => false,
            Err(TrySendError::Full(task)) => {
                self.stats.backpressure_events.fetch_add(1, Ordering::Relaxed);
                select! {
                    send(self.sender, task) -> res => {
                        if res.is_ok() {
                            self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                        }
                        res.is_ok()
                    }
                    recv(quit) -> _ => false,
                }
            }
        }
    }

    /// Enqueue without blocking; a full queue hands the task back
    pub fn try_push(&self, task: Task) -> Result<(), TrySendError<Task>> {
        self.sender.try_send(task)?;
        self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Dequeue, blocking while the queue is empty.
    ///
    /// Returns `None` once `quit` fires.
    pub fn pop(&self, quit: &Receiver<()>) -> Option<Task> {
        select! {
            recv(self.receiver) -> msg => {
                let task = msg.ok()?;
                self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
                Some(task)
            }
            recv(quit) -> _ => None,
        }
    }

    /// Remove every pending task without running it
    pub fn drain(&self) -> Vec<Task> {
        self.receiver.try_iter().collect()
    }

    /// Get queue statistics
    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Get current queue length
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Get queue capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
