//! Bounded worker pool
//!
//! ```text
//!   add_task ──► ┌──────────────────────────┐
//!                │   TaskQueue (cap 256)    │ ◄── fan-out from running tasks
//!                │  crossbeam bounded chan  │     (inline when full)
//!                └────────────┬─────────────┘
//!          ┌──────────────────┼──────────────────┐
//!     ┌────▼────┐        ┌────▼────┐        ┌────▼────┐
//!     │Worker 0 │        │Worker 1 │  ...   │Worker N │
//!     └────┬────┘        └────┬────┘        └────┬────┘
//!          └─────── heartbeat / outstanding ─────┘
//!                             │
//!                   ┌─────────▼──────────┐
//!                   │ QuiescenceDetector │ ──► stop()
//!                   └────────────────────┘
//! ```

pub mod queue;
pub mod quiescence;
pub mod task;
pub mod worker;
pub mod worker_pool;

pub use queue::{TaskQueue, QUEUE_CAPACITY};
pub use quiescence::{Quiescence, Termination};
pub use task::Task;
pub use worker_pool::{PoolState, PoolStats, Submission, TaskSubmitter, WorkerPool};
