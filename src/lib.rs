//! fs-walker - Parallel Directory Walker
//!
//! A fixed-size worker pool fed by a bounded task queue, and a recursive
//! directory walker built on top of it that reports every regular file with
//! its size.
//!
//! # Features
//!
//! - **Bounded Work Queue**: At most 256 tasks wait in the queue; producers
//!   block when it is full, and workers fanning out run the new task inline
//!   instead of waiting on themselves.
//!
//! - **Quiescence Detection**: A walk ends when no task is outstanding, or,
//!   on request, when no task has finished within an idle window.
//!
//! - **Per-Task Error Routing**: A failing task only reaches its own error
//!   handler; a panicking task never takes its worker down.
//!
//! - **Depth Limit**: Directories deeper than the configured level are never
//!   opened.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       RecursiveWalker                            │
//! │                  walk_dir(root, callback)                        │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │ root task
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         WorkerPool                               │
//! │            ┌──────────────────────────┐                         │
//! │            │       Task Queue         │ ◄─── subdirectory tasks │
//! │            │  (crossbeam bounded)     │                         │
//! │            │  - capacity 256          │                         │
//! │            └────────────┬─────────────┘                         │
//! │                         │                                       │
//! │       ┌─────────────────┼──────────────────────┐                │
//! │  ┌────▼────┐  ┌────────▼┐  ┌─────────┐    ┌────▼────┐           │
//! │  │Worker 1 │  │Worker 2 │  │Worker 3 │ ...│Worker N │           │
//! │  └────┬────┘  └────┬────┘  └────┬────┘    └────┬────┘           │
//! │       └────────────┴─────┬──────┴──────────────┘                │
//! │                          ▼                                      │
//! │            ┌──────────────────────────┐                         │
//! │            │   Quiescence Detector    │                         │
//! │            │  outstanding / heartbeat │                         │
//! │            └──────────────────────────┘                         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use fs_walker::RecursiveWalker;
//!
//! let walker = RecursiveWalker::new(10);
//! let summary = walker
//!     .walk_dir("/tmp", |path, size| println!("{} {}", path.display(), size))
//!     .unwrap();
//! println!("{} files, {} bytes", summary.total_files, summary.total_bytes);
//! ```

pub mod config;
pub mod error;
pub mod pool;
pub mod progress;
pub mod walker;

pub use config::{CliArgs, WalkConfig};
pub use error::{ConfigError, PoolError, Result, TaskError, TaskResult, WalkerError};
pub use pool::{PoolState, PoolStats, Quiescence, Task, TaskSubmitter, Termination, WorkerPool};
pub use walker::{RecursiveWalker, ShutdownHandle, WalkProgress, WalkSummary};
