//! Parallel recursive directory walker
//!
//! ```text
//!                 walk_dir(root, callback)
//!                           │ root task (level 0)
//!                           ▼
//!              ┌──────────────────────────┐
//!              │        WorkerPool        │ ◄──────────────┐
//!              └────────────┬─────────────┘                │
//!                           │                              │
//!        ┌──────────────────┼──────────────────┐           │
//!  ┌─────▼─────┐      ┌─────▼─────┐      ┌─────▼─────┐     │
//!  │ read_dir  │      │ read_dir  │      │ read_dir  │     │
//!  │ files ─► callback│ files ─► callback│ files ─► callback
//!  └─────┬─────┘      └─────┬─────┘      └─────┬─────┘     │
//!        └─── one task per subdirectory (level + 1) ───────┘
//! ```

pub mod recursive;
pub mod stats;

pub use recursive::{DirTask, ErrorHook, FileCallback, RecursiveWalker, ShutdownHandle};
pub use stats::{WalkCounters, WalkProgress, WalkSummary};
