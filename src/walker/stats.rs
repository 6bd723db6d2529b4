//! Walk counters, final summary and live progress snapshots

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Counters shared by every task of one walk
#[derive(Debug, Default)]
pub struct WalkCounters {
    /// Directories opened and listed
    pub dirs: AtomicU64,

    /// Files reported to the callback
    pub files: AtomicU64,

    /// Bytes reported to the callback
    pub bytes: AtomicU64,

    /// Directory tasks that failed
    pub errors: AtomicU64,

    /// Directories not opened because they were below the max level
    pub pruned: AtomicU64,

    /// Entries skipped by exclude patterns
    pub excluded: AtomicU64,
}

impl WalkCounters {
    pub(crate) fn record_dir(&self) {
        self.dirs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_file(&self, size: u64) {
        self.files.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(size, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_pruned(&self) {
        self.pruned.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_excluded(&self) {
        self.excluded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn summary(
        &self,
        duration: Duration,
        workers: usize,
        completed: bool,
    ) -> WalkSummary {
        WalkSummary {
            total_dirs: self.dirs.load(Ordering::Relaxed),
            total_files: self.files.load(Ordering::Relaxed),
            total_bytes: self.bytes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            pruned: self.pruned.load(Ordering::Relaxed),
            excluded: self.excluded.load(Ordering::Relaxed),
            workers,
            duration,
            completed,
        }
    }
}

/// Result of a finished walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkSummary {
    /// Total directories listed
    pub total_dirs: u64,

    /// Total files reported
    pub total_files: u64,

    /// Total bytes (sum of reported file sizes)
    pub total_bytes: u64,

    /// Directories that could not be read
    pub errors: u64,

    /// Directories skipped by the depth limit
    pub pruned: u64,

    /// Entries skipped by exclude patterns
    pub excluded: u64,

    /// Worker threads used
    pub workers: usize,

    /// Time taken for the walk
    pub duration: Duration,

    /// Whether the walk reached quiescence (vs was interrupted)
    pub completed: bool,
}

/// Progress information for display
#[derive(Debug, Clone, Default)]
pub struct WalkProgress {
    /// Directories processed
    pub dirs: u64,

    /// Files found
    pub files: u64,

    /// Bytes found
    pub bytes: u64,

    /// Errors encountered
    pub errors: u64,

    /// Current queue size
    pub queue_size: usize,

    /// Tasks submitted but not finished
    pub outstanding: usize,

    /// Total workers
    pub total_workers: usize,

    /// Elapsed time
    pub elapsed: Duration,
}

impl WalkProgress {
    /// Calculate files per second rate
    pub fn files_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.files as f64 / secs
        } else {
            0.0
        }
    }

    /// Calculate dirs per second rate
    pub fn dirs_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.dirs as f64 / secs
        } else {
            0.0
        }
    }
}
