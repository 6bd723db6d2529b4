//! Termination detection for the worker pool
//!
//! Two strategies decide when a self-feeding pool has no more work:
//!
//! - **Idle timeout**: every completed task emits a heartbeat; if no
//!   heartbeat arrives within the window, the pool is considered done.
//!   This races against a task that is about to submit children right at
//!   the window boundary, so it can drop tail work.
//! - **Drained**: an outstanding-task counter is incremented on every
//!   accepted submission and decremented after every completion. The pool
//!   is done when the counter reaches zero.

use crossbeam_channel::{bounded, select, Receiver, Sender};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// How a waiter decides that the pool has run out of work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Termination {
    /// Wait until no submitted task is outstanding
    #[default]
    Drained,

    /// Wait until no task has completed for the given window
    IdleTimeout(Duration),
}

/// Why a wait returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quiescence {
    /// No heartbeat within the idle window
    Idle,

    /// Outstanding-task counter reached zero
    Drained,

    /// The pool was stopped by someone else
    Stopped,
}

pub(crate) struct QuiescenceDetector {
    heartbeat_tx: Sender<()>,
    heartbeat_rx: Receiver<()>,
    drained_tx: Sender<()>,
    drained_rx: Receiver<()>,
    outstanding: AtomicUsize,
}

impl QuiescenceDetector {
    pub(crate) fn new() -> Self {
        // Capacity 1: a pending signal already says everything a waiter needs
        let (heartbeat_tx, heartbeat_rx) = bounded(1);
        let (drained_tx, drained_rx) = bounded(1);

        Self {
            heartbeat_tx,
            heartbeat_rx,
            drained_tx,
            drained_rx,
            outstanding: AtomicUsize::new(0),
        }
    }

    /// Record a completed task execution
    pub(crate) fn beat(&self) {
        let _ = self.heartbeat_tx.try_send(());
    }

    /// Must be called before the task becomes visible to any worker
    pub(crate) fn task_submitted(&self) {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
    }

    /// Called after a task finished (or was dropped instead of queued)
    pub(crate) fn task_finished(&self) {
        if self.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _ = self.drained_tx.try_send(());
        }
    }

    pub(crate) fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Block until no heartbeat arrives for `window`, or `quit` fires
    pub(crate) fn wait_idle(&self, window: Duration, quit: &Receiver<()>) -> Quiescence {
        loop {
            select! {
                recv(self.heartbeat_rx) -> _ => continue,
                recv(quit) -> _ => return Quiescence::Stopped,
                default(window) => return Quiescence::Idle,
            }
        }
    }

    /// Block until the outstanding counter is zero, or `quit` fires
    pub(crate) fn wait_drained(&self, quit: &Receiver<()>) -> Quiescence {
        loop {
            if self.outstanding() == 0 {
                return Quiescence::Drained;
            }
            // A stale token only costs one extra check of the counter
            select! {
                recv(self.drained_rx) -> _ => {}
                recv(quit) -> _ => return Quiescence::Stopped,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_idle_without_heartbeats() {
        let detector = QuiescenceDetector::new();
        let (_quit_tx, quit_rx) = unbounded::<()>();

        let start = Instant::now();
        let reason = detector.wait_idle(Duration::from_millis(30), &quit_rx);

        assert_eq!(reason, Quiescence::Idle);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_heartbeats_extend_idle_window() {
        let detector = Arc::new(QuiescenceDetector::new());
        let (_quit_tx, quit_rx) = unbounded::<()>();

        let beater = {
            let detector = Arc::clone(&detector);
            thread::spawn(move || {
                for _ in 0..6 {
                    thread::sleep(Duration::from_millis(20));
                    detector.beat();
                }
            })
        };

        let start = Instant::now();
        let reason = detector.wait_idle(Duration::from_millis(80), &quit_rx);
        beater.join().unwrap();

        assert_eq!(reason, Quiescence::Idle);
        // Six beats 20ms apart keep the 80ms window open past 120ms
        assert!(start.elapsed() >= Duration::from_millis(120));
    }

    #[test]
    fn test_quit_interrupts_idle_wait() {
        let detector = QuiescenceDetector::new();
        let (quit_tx, quit_rx) = unbounded::<()>();
        drop(quit_tx);

        let reason = detector.wait_idle(Duration::from_secs(60), &quit_rx);
        assert_eq!(reason, Quiescence::Stopped);
    }

    #[test]
    fn test_drained_when_counter_reaches_zero() {
        let detector = Arc::new(QuiescenceDetector::new());
        let (_quit_tx, quit_rx) = unbounded::<()>();

        detector.task_submitted();
        detector.task_submitted();
        assert_eq!(detector.outstanding(), 2);

        let finisher = {
            let detector = Arc::clone(&detector);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                detector.task_finished();
                thread::sleep(Duration::from_millis(10));
                detector.task_finished();
            })
        };

        assert_eq!(detector.wait_drained(&quit_rx), Quiescence::Drained);
        assert_eq!(detector.outstanding(), 0);
        finisher.join().unwrap();
    }

    #[test]
    fn test_drained_ignores_stale_token() {
        let detector = QuiescenceDetector::new();
        let (quit_tx, quit_rx) = unbounded::<()>();

        // Counter hits zero once, leaving a token behind
        detector.task_submitted();
        detector.task_finished();
        detector.task_submitted();

        drop(quit_tx);
        assert_eq!(detector.wait_drained(&quit_rx), Quiescence::Stopped);
    }
}
