//! Error types for planning operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for planning operations.
#[derive(Debug, Error)]
pub enum PlannerError {
    /// Walking a tier's directory tree failed.
    #[error("failed to walk directory tree")]
    Walk {
        /// Root the walk started from.
        root: PathBuf,
        /// Underlying walk error.
        #[source]
        source: walkdir::Error,
    },
    /// Reading filesystem capacity for a tier failed.
    #[error("failed to read filesystem capacity")]
    Capacity {
        /// Tier root whose capacity could not be read.
        root: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Convenience alias for planner results.
pub type PlannerResult<T> = Result<T, PlannerError>;
