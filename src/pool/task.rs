//! Units of work executed by the worker pool

use crate::error::{TaskError, TaskResult};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// Body of a task
pub type ExecuteFn = Box<dyn FnOnce() -> TaskResult + Send + 'static>;

/// Handler invoked with the task's error, if `execute` failed
pub type ErrorHandler = Box<dyn FnOnce(TaskError) + Send + 'static>;

/// A unit of work: an execution function and its own error handler.
///
/// A task runs at most once. It is owned by the queue until a worker
/// dequeues it and is consumed by running it.
pub struct Task {
    execute: ExecuteFn,
    on_error: ErrorHandler,
}

impl Task {
    /// Create a task with an explicit error handler
    pub fn new<E, H>(execute: E, on_error: H) -> Self
    where
        E: FnOnce() -> TaskResult + Send + 'static,
        H: FnOnce(TaskError) + Send + 'static,
    {
        Self {
            execute: Box::new(execute),
            on_error: Box::new(on_error),
        }
    }

    /// Create a task whose errors are logged and otherwise ignored
    pub fn logged<E>(execute: E) -> Self
    where
        E: FnOnce() -> TaskResult + Send + 'static,
    {
        Self::new(execute, |err| {
            tracing::warn!(error = %err, "Task failed");
        })
    }

    /// Run the body, catching panics.
    ///
    /// Returns the outcome together with the error handler so the caller can
    /// emit its heartbeat before the handler runs.
    pub(crate) fn run(self) -> (TaskResult, ErrorHandler) {
        let Task { execute, on_error } = self;
        let result = match panic::catch_unwind(AssertUnwindSafe(execute)) {
            Ok(result) => result,
            Err(payload) => Err(TaskError::Panicked {
                message: panic_message(payload.as_ref()),
            }),
        };
        (result, on_error)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").finish_non_exhaustive()
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
