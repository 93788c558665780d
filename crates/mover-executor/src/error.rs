//! Error types for move execution.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for execution operations.
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Errors produced while executing a [`mover_model::MovePlan`].
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// IO failure while copying, linking, or removing a path.
    #[error("executor io failure")]
    Io {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A planned path did not live under either tier root of its mapping,
    /// so its destination could not be computed.
    #[error("path is not rooted under either tier of its mapping")]
    UnrootedPath {
        /// The offending path.
        path: PathBuf,
    },
}

impl ExecutorError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_helper_builds_io_variant() {
        let err = ExecutorError::io(
            "copy_leader",
            "/fast/a.mkv",
            io::Error::from(io::ErrorKind::NotFound),
        );
        assert!(matches!(err, ExecutorError::Io { operation: "copy_leader", .. }));
    }
}
