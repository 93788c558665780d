//! Error types shared by the domain model.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for model-level operations (stat/metadata lookups).
#[derive(Debug, Error)]
pub enum ModelError {
    /// Reading filesystem metadata for a path failed.
    #[error("failed to read metadata")]
    Metadata {
        /// Path whose metadata could not be read.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A birth time (creation time) was unavailable on this platform or filesystem.
    #[error("birth time unavailable")]
    BirthTimeUnavailable {
        /// Path whose birth time was requested.
        path: PathBuf,
    },
}

/// Convenience alias for model-level results.
pub type ModelResult<T> = Result<T, ModelError>;
