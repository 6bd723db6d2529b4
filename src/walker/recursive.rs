//! Recursive directory walker driven by the worker pool
//!
//! The root directory is submitted as the first task. Every task lists one
//! directory, reports its regular files through the caller's callback and
//! submits one new task per subdirectory back into the same pool.
//!
//! A failing directory only reaches its own task's error handler. The walk
//! as a whole still returns `Ok`; failures show up in
//! [`WalkSummary::errors`] and in the optional error hook.

use crate::config::{WalkConfig, DEFAULT_MAX_LEVEL, DEFAULT_WORKERS};
use crate::error::{Result, TaskError, TaskResult};
use crate::pool::task::panic_message;
use crate::pool::{Quiescence, Task, TaskSubmitter, Termination, WorkerPool};
use crate::walker::stats::{WalkCounters, WalkProgress, WalkSummary};
use crossbeam_channel::bounded;
use parking_lot::Mutex;
use regex::Regex;
use std::collections::hash_map::{Entry, HashMap};
use std::fs::{self, Metadata};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Per-file callback: full path and size in bytes.
///
/// Invoked concurrently from several workers for different files. A panic
/// is caught for that one file and counted as an error; the rest of the
/// directory is still reported.
pub type FileCallback = Arc<dyn Fn(&Path, u64) + Send + Sync>;

/// Observer for directory failures
pub type ErrorHook = Arc<dyn Fn(&TaskError) + Send + Sync>;

/// Buffered (path, size) pairs between workers and a serialized callback
const HANDOFF_CAPACITY: usize = 1024;

/// A task to walk one directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirTask {
    /// Full path to the directory
    pub path: PathBuf,

    /// Depth from root (0 = root)
    pub level: usize,
}

impl DirTask {
    /// Create a new directory task
    pub fn new(path: PathBuf, level: usize) -> Self {
        Self { path, level }
    }

    /// Create the root task
    pub fn root(path: PathBuf) -> Self {
        Self { path, level: 0 }
    }

    /// Task for a subdirectory one level down
    pub fn child(&self, path: PathBuf) -> Self {
        Self {
            path,
            level: self.level + 1,
        }
    }
}

#[derive(Debug)]
enum EntryKind {
    File(u64),
    Dir,
}

#[derive(Debug)]
struct DirEntry {
    path: PathBuf,
    kind: EntryKind,
}

#[cfg(unix)]
type DirId = (u64, u64);

#[cfg(not(unix))]
type DirId = PathBuf;

#[cfg(unix)]
fn dir_id(path: &Path) -> Option<DirId> {
    use std::os::unix::fs::MetadataExt;
    fs::metadata(path).ok().map(|meta| (meta.dev(), meta.ino()))
}

#[cfg(not(unix))]
fn dir_id(path: &Path) -> Option<DirId> {
    fs::canonicalize(path).ok()
}

/// Outcome of claiming a directory in the visited set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Claim {
    /// Never listed before: report files and fan out
    First,

    /// Listed before from a deeper level: fan out again, files were reported
    Shallower,

    /// Already listed at this level or above
    Seen,
}

/// Everything a directory task needs, shared by all tasks of one walk
struct WalkContext {
    submitter: TaskSubmitter,
    callback: FileCallback,
    max_level: usize,
    follow_links: bool,
    exclude_patterns: Arc<Vec<Regex>>,
    counters: Arc<WalkCounters>,
    on_error: Option<ErrorHook>,
    // Only tracked when following links; a plain tree cannot revisit a directory.
    // Maps each listed directory to the shallowest level it was listed at.
    visited: Option<Mutex<HashMap<DirId, usize>>>,
}

impl WalkContext {
    fn task_for(self: &Arc<Self>, dir: DirTask) -> Task {
        let ctx = Arc::clone(self);
        let err_ctx = Arc::clone(self);
        Task::new(move || ctx.visit(dir), move |err| err_ctx.report_error(err))
    }

    fn report_error(&self, err: TaskError) {
        self.counters.record_error();
        warn!(error = %err, "Walk task failed");
        if let Some(hook) = &self.on_error {
            hook(&err);
        }
    }

    fn is_excluded(&self, path: &Path) -> bool {
        if self.exclude_patterns.is_empty() {
            return false;
        }
        let path = path.to_string_lossy();
        self.exclude_patterns.iter().any(|re| re.is_match(&path))
    }

    fn claim(&self, path: &Path, level: usize) -> Claim {
        let (Some(visited), Some(id)) = (&self.visited, dir_id(path)) else {
            return Claim::First;
        };

        match visited.lock().entry(id) {
            Entry::Vacant(slot) => {
                slot.insert(level);
                Claim::First
            }
            Entry::Occupied(mut slot) if level < *slot.get() => {
                slot.insert(level);
                Claim::Shallower
            }
            Entry::Occupied(_) => Claim::Seen,
        }
    }

    fn report_file(&self, path: &Path, size: u64) {
        match panic::catch_unwind(AssertUnwindSafe(|| (self.callback)(path, size))) {
            Ok(()) => self.counters.record_file(size),
            Err(payload) => self.report_error(TaskError::Callback {
                path: path.to_path_buf(),
                message: panic_message(payload.as_ref()),
            }),
        }
    }

    /// Walk one directory level
    fn visit(self: &Arc<Self>, dir: DirTask) -> TaskResult {
        if dir.level > self.max_level {
            self.counters.record_pruned();
            debug!(path = %dir.path.display(), level = dir.level, "Pruned below max level");
            return Ok(());
        }

        let claim = self.claim(&dir.path, dir.level);
        if claim == Claim::Seen {
            debug!(path = %dir.path.display(), level = dir.level, "Directory already visited");
            return Ok(());
        }
        let first = claim == Claim::First;

        let entries = read_entries(&dir.path, self.follow_links)?;
        if first {
            self.counters.record_dir();
        }

        let mut children = Vec::new();
        for entry in entries {
            if self.is_excluded(&entry.path) {
                if first {
                    self.counters.record_excluded();
                }
                continue;
            }

            match entry.kind {
                EntryKind::File(size) if first => self.report_file(&entry.path, size),
                EntryKind::File(_) => {}
                EntryKind::Dir => children.push(entry.path),
            }
        }

        trace!(
            path = %dir.path.display(),
            level = dir.level,
            subdirs = children.len(),
            "Directory processed"
        );

        for child in children {
            self.submitter
                .add_task_or_run_inline(self.task_for(dir.child(child)));
        }

        Ok(())
    }
}

/// List a directory completely before anything is reported.
///
/// The `ReadDir` handle is closed on every return path when it drops.
fn read_entries(
    path: &Path,
    follow_links: bool,
) -> std::result::Result<Vec<DirEntry>, TaskError> {
    let reader = fs::read_dir(path).map_err(|e| TaskError::open(path, e))?;
    let mut entries = Vec::new();

    for item in reader {
        let item = item.map_err(|e| TaskError::open(path, e))?;
        let full_path = item.path();
        let file_type = item.file_type().map_err(|e| TaskError::open(path, e))?;

        let kind = if file_type.is_symlink() {
            if !follow_links {
                continue;
            }
            match fs::metadata(&full_path) {
                Ok(meta) => classify(&meta),
                Err(e) => {
                    debug!(path = %full_path.display(), error = %e, "Dangling symlink");
                    None
                }
            }
        } else if file_type.is_dir() {
            Some(EntryKind::Dir)
        } else if file_type.is_file() {
            match item.metadata() {
                Ok(meta) => Some(EntryKind::File(meta.len())),
                // Removed between listing and stat
                Err(e) if e.kind() == io::ErrorKind::NotFound => None,
                Err(e) => return Err(TaskError::open(path, e)),
            }
        } else {
            None
        };

        if let Some(kind) = kind {
            entries.push(DirEntry {
                path: full_path,
                kind,
            });
        }
    }

    Ok(entries)
}

fn classify(meta: &Metadata) -> Option<EntryKind> {
    if meta.is_dir() {
        Some(EntryKind::Dir)
    } else if meta.is_file() {
        Some(EntryKind::File(meta.len()))
    } else {
        None
    }
}

struct ShutdownInner {
    requested: AtomicBool,
    active: Mutex<Vec<Arc<WorkerPool>>>,
}

/// Stops every walk currently running on a [`RecursiveWalker`].
///
/// Running directory tasks finish; queued ones are abandoned. Once
/// triggered, later walks on the same walker stop immediately too.
#[derive(Clone)]
pub struct ShutdownHandle {
    inner: Arc<ShutdownInner>,
}

impl ShutdownHandle {
    fn new() -> Self {
        Self {
            inner: Arc::new(ShutdownInner {
                requested: AtomicBool::new(false),
                active: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Stop the active walks
    pub fn trigger(&self) {
        self.inner.requested.store(true, Ordering::SeqCst);
        for pool in self.inner.active.lock().iter() {
            pool.stop();
        }
    }

    /// Check whether shutdown was requested
    pub fn is_triggered(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    fn attach(&self, pool: &Arc<WorkerPool>) {
        let mut active = self.inner.active.lock();
        active.push(Arc::clone(pool));
        if self.is_triggered() {
            pool.stop();
        }
    }

    fn detach(&self, pool: &Arc<WorkerPool>) {
        self.inner
            .active
            .lock()
            .retain(|active| !Arc::ptr_eq(active, pool));
    }
}

/// Counters and pool of the most recently started walk
#[derive(Default)]
struct LatestWalk {
    counters: Option<Arc<WalkCounters>>,
    pool: Option<Arc<WorkerPool>>,
}

/// Parallel recursive directory walker
pub struct RecursiveWalker {
    workers: usize,
    max_level: usize,
    termination: Termination,
    follow_links: bool,
    exclude_patterns: Arc<Vec<Regex>>,
    on_error: Option<ErrorHook>,
    latest: Mutex<LatestWalk>,
    shutdown: ShutdownHandle,
}

impl Default for RecursiveWalker {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}

impl RecursiveWalker {
    /// Create a walker with `workers` threads and the default depth limit
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            max_level: DEFAULT_MAX_LEVEL,
            termination: Termination::default(),
            follow_links: false,
            exclude_patterns: Arc::new(Vec::new()),
            on_error: None,
            latest: Mutex::new(LatestWalk::default()),
            shutdown: ShutdownHandle::new(),
        }
    }

    /// Create a walker from validated configuration
    pub fn from_config(config: &WalkConfig) -> Self {
        Self::new(config.worker_count)
            .max_level(config.max_level)
            .termination(config.termination)
            .follow_links(config.follow_links)
            .exclude_patterns(config.exclude_patterns.clone())
    }

    /// Deepest level that is still opened (root is level 0)
    pub fn max_level(mut self, max_level: usize) -> Self {
        self.max_level = max_level;
        self
    }

    /// How the walk decides it is finished
    pub fn termination(mut self, termination: Termination) -> Self {
        self.termination = termination;
        self
    }

    /// Follow symbolic links, visiting each directory once
    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    /// Skip entries whose full path matches any pattern
    pub fn exclude_patterns(mut self, patterns: Vec<Regex>) -> Self {
        self.exclude_patterns = Arc::new(patterns);
        self
    }

    /// Observe directory failures (they are logged either way)
    pub fn on_error<H>(mut self, hook: H) -> Self
    where
        H: Fn(&TaskError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }

    /// Worker thread count
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Configured depth limit
    pub fn max_depth(&self) -> usize {
        self.max_level
    }

    /// Handle for stopping the running walk from another thread
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Live snapshot of the most recently started walk
    pub fn progress(&self, elapsed: Duration) -> WalkProgress {
        let latest = self.latest.lock();
        let (queue_size, outstanding) = latest
            .pool
            .as_ref()
            .map(|pool| (pool.queue_len(), pool.outstanding()))
            .unwrap_or((0, 0));
        let counters = latest.counters.as_deref();
        let load = |read: fn(&WalkCounters) -> u64| counters.map_or(0, read);

        WalkProgress {
            dirs: load(|c| c.dirs.load(Ordering::Relaxed)),
            files: load(|c| c.files.load(Ordering::Relaxed)),
            bytes: load(|c| c.bytes.load(Ordering::Relaxed)),
            errors: load(|c| c.errors.load(Ordering::Relaxed)),
            queue_size,
            outstanding,
            total_workers: self.workers,
            elapsed,
        }
    }

    /// Walk `root`, calling `callback(path, size)` for every regular file.
    ///
    /// Blocks until the walk is quiescent. The callback runs on worker
    /// threads, possibly concurrently for files in different directories.
    pub fn walk_dir<P, F>(&self, root: P, callback: F) -> Result<WalkSummary>
    where
        P: AsRef<Path>,
        F: Fn(&Path, u64) + Send + Sync + 'static,
    {
        self.run(root.as_ref(), Arc::new(callback))
    }

    /// Like [`walk_dir`](Self::walk_dir), but `callback` only ever runs on
    /// the calling thread; workers hand files over through a channel.
    pub fn walk_dir_serialized<P, F>(&self, root: P, mut callback: F) -> Result<WalkSummary>
    where
        P: AsRef<Path>,
        F: FnMut(&Path, u64),
    {
        let root = root.as_ref();
        let (tx, rx) = bounded::<(PathBuf, u64)>(HANDOFF_CAPACITY);

        thread::scope(|scope| {
            let walk = scope.spawn(move || {
                self.walk_dir(root, move |path: &Path, size| {
                    let _ = tx.send((path.to_path_buf(), size));
                })
            });

            // Ends once the walk drops the last sender
            for (path, size) in rx {
                callback(&path, size);
            }

            match walk.join() {
                Ok(result) => result,
                Err(payload) => std::panic::resume_unwind(payload),
            }
        })
    }

    fn run(&self, root: &Path, callback: FileCallback) -> Result<WalkSummary> {
        let start = Instant::now();
        let counters = Arc::new(WalkCounters::default());

        let pool = Arc::new(WorkerPool::new(self.workers));
        pool.start()?;
        self.shutdown.attach(&pool);
        *self.latest.lock() = LatestWalk {
            counters: Some(Arc::clone(&counters)),
            pool: Some(Arc::clone(&pool)),
        };

        info!(
            root = %root.display(),
            workers = self.workers,
            max_level = self.max_level,
            termination = ?self.termination,
            "Starting directory walk"
        );

        let ctx = Arc::new(WalkContext {
            submitter: pool.submitter(),
            callback,
            max_level: self.max_level,
            follow_links: self.follow_links,
            exclude_patterns: Arc::clone(&self.exclude_patterns),
            counters: Arc::clone(&counters),
            on_error: self.on_error.clone(),
            visited: self.follow_links.then(|| Mutex::new(HashMap::new())),
        });

        pool.add_task(ctx.task_for(DirTask::root(root.to_path_buf())));
        let reason = pool.wait(self.termination);

        let joined = pool.join();
        self.shutdown.detach(&pool);
        {
            let mut latest = self.latest.lock();
            if latest.pool.as_ref().is_some_and(|p| Arc::ptr_eq(p, &pool)) {
                latest.pool = None;
            }
        }
        drop(ctx);
        joined?;

        let completed = reason != Quiescence::Stopped && !self.shutdown.is_triggered();
        let summary = counters.summary(start.elapsed(), self.workers, completed);

        info!(
            dirs = summary.total_dirs,
            files = summary.total_files,
            bytes = summary.total_bytes,
            errors = summary.errors,
            duration_ms = summary.duration.as_millis() as u64,
            completed,
            "Walk finished"
        );

        Ok(summary)
    }
}
