//! Error types for fs-walker
//!
//! This module defines the error hierarchy for:
//! - Task execution failures (directory open/listing, panics)
//! - Worker pool lifecycle failures
//! - Configuration and CLI errors
//!
//! Task errors never escape their own task: they are handed to the task's
//! error handler and counted. Only pool and configuration failures reach
//! the caller of a walk.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the fs-walker library
#[derive(Error, Debug)]
pub enum WalkerError {
    /// Worker pool errors
    #[error("Worker pool error: {0}")]
    Pool(#[from] PoolError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Failure of a single task's `execute` step
#[derive(Error, Debug)]
pub enum TaskError {
    /// Directory could not be opened or its entries could not be listed
    #[error("Failed to read directory '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Any other failure reported by the task body
    #[error("Task failed: {0}")]
    Execution(String),

    /// The task body panicked; the worker survived
    #[error("Task panicked: {message}")]
    Panicked { message: String },

    /// The file callback panicked for one entry
    #[error("Callback panicked for '{path}': {message}")]
    Callback { path: PathBuf, message: String },
}

impl TaskError {
    /// Build an open error for `path`
    pub fn open(path: impl Into<PathBuf>, source: io::Error) -> Self {
        TaskError::Open {
            path: path.into(),
            source,
        }
    }

    /// Path associated with this error, if any
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            TaskError::Open { path, .. } | TaskError::Callback { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Check if this error was caused by missing permissions
    pub fn is_permission_denied(&self) -> bool {
        matches!(
            self,
            TaskError::Open { source, .. } if source.kind() == io::ErrorKind::PermissionDenied
        )
    }
}

/// Worker pool lifecycle errors
#[derive(Error, Debug)]
pub enum PoolError {
    /// A worker thread could not be spawned
    #[error("Failed to spawn worker {id}: {reason}")]
    SpawnFailed { id: usize, reason: String },

    /// A worker thread panicked outside of task execution
    #[error("Worker {id} panicked")]
    WorkerPanicked { id: usize },
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid worker count
    #[error("Invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Root path missing or not a directory
    #[error("Invalid root '{path}': {reason}")]
    InvalidRoot { path: PathBuf, reason: String },

    /// Invalid exclude pattern
    #[error("Invalid exclude pattern '{pattern}': {reason}")]
    InvalidExcludePattern { pattern: String, reason: String },

    /// Idle timeout of zero would stop the pool immediately
    #[error("Invalid idle timeout: must be greater than zero")]
    InvalidIdleTimeout,
}

/// Result type alias for WalkerError
pub type Result<T> = std::result::Result<T, WalkerError>;

/// Result type alias for a task body
pub type TaskResult = std::result::Result<(), TaskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied_detection() {
        let denied = TaskError::open(
            "/locked",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(denied.is_permission_denied());
        assert_eq!(denied.path(), Some(&PathBuf::from("/locked")));

        let missing = TaskError::open("/gone", io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(!missing.is_permission_denied());

        let other = TaskError::Execution("boom".into());
        assert!(!other.is_permission_denied());
        assert!(other.path().is_none());

        let callback = TaskError::Callback {
            path: "/data/f".into(),
            message: "bad".into(),
        };
        assert_eq!(callback.path(), Some(&PathBuf::from("/data/f")));
    }

    #[test]
    fn test_error_conversion() {
        let pool_err = PoolError::WorkerPanicked { id: 3 };
        let walker_err: WalkerError = pool_err.into();
        assert!(matches!(walker_err, WalkerError::Pool(_)));

        let cfg_err = ConfigError::InvalidIdleTimeout;
        let walker_err: WalkerError = cfg_err.into();
        assert!(matches!(walker_err, WalkerError::Config(_)));
    }

    #[test]
    fn test_open_error_message_names_path() {
        let err = TaskError::open("/data/x", io::Error::new(io::ErrorKind::NotFound, "missing"));
        assert!(err.to_string().contains("/data/x"));
    }
}
