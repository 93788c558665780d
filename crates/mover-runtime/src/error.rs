//! Error types for the runtime crate: locking and driver orchestration.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors produced while locking or driving a run.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Another process already holds the pidfile lock.
    #[error("another instance already holds the lock at {path}", path = path.display())]
    LockHeld {
        /// Pidfile path that is already locked.
        path: PathBuf,
    },
    /// The pidfile could not be opened, locked, or written.
    #[error("failed to acquire pidfile lock")]
    Lock {
        /// Pidfile path involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Configuration could not be loaded.
    #[error("configuration error")]
    Config {
        /// Underlying configuration error.
        #[source]
        source: mover_config::ConfigError,
    },
    /// Plan construction failed for a mapping.
    #[error("planning error")]
    Planner {
        /// Underlying planner error.
        #[source]
        source: mover_planner::PlannerError,
    },
    /// Plan execution failed for a mapping.
    #[error("execution error")]
    Executor {
        /// Underlying executor error.
        #[source]
        source: mover_executor::ExecutorError,
    },
}

impl From<mover_config::ConfigError> for RuntimeError {
    fn from(source: mover_config::ConfigError) -> Self {
        Self::Config { source }
    }
}

impl From<mover_planner::PlannerError> for RuntimeError {
    fn from(source: mover_planner::PlannerError) -> Self {
        Self::Planner { source }
    }
}

impl From<mover_executor::ExecutorError> for RuntimeError {
    fn from(source: mover_executor::ExecutorError) -> Self {
        Self::Executor { source }
    }
}
