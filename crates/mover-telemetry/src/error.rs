//! Error types for telemetry operations.

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::io;
use std::path::PathBuf;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised by telemetry helpers.
#[derive(Debug)]
pub enum TelemetryError {
    /// Installing the tracing subscriber failed.
    SubscriberInstall {
        /// Underlying tracing subscriber error.
        source: tracing_subscriber::util::TryInitError,
    },
    /// Creating the log file's parent directory failed.
    LogDirCreate {
        /// Directory path that could not be created.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Opening or rotating the log file failed.
    LogFileOpen {
        /// File path that could not be opened.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
}

impl Display for TelemetryError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubscriberInstall { .. } => {
                formatter.write_str("failed to install tracing subscriber")
            }
            Self::LogDirCreate { .. } => formatter.write_str("failed to create log directory"),
            Self::LogFileOpen { .. } => formatter.write_str("failed to open log file"),
        }
    }
}

impl Error for TelemetryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::SubscriberInstall { source } => Some(source),
            Self::LogDirCreate { source, .. } | Self::LogFileOpen { source, .. } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::util::SubscriberInitExt;

    fn try_init_error() -> tracing_subscriber::util::TryInitError {
        match tracing_subscriber::registry().try_init() {
            Ok(()) => match tracing_subscriber::registry().try_init() {
                Ok(()) => panic!("expected init error"),
                Err(err) => err,
            },
            Err(err) => err,
        }
    }

    #[test]
    fn telemetry_error_display_and_source() {
        let init_error = try_init_error();
        let cases: Vec<(TelemetryError, &str)> = vec![
            (
                TelemetryError::SubscriberInstall { source: init_error },
                "failed to install tracing subscriber",
            ),
            (
                TelemetryError::LogDirCreate {
                    path: PathBuf::from("/var/log/mover"),
                    source: io::Error::other("io"),
                },
                "failed to create log directory",
            ),
            (
                TelemetryError::LogFileOpen {
                    path: PathBuf::from("/var/log/mover/mover.log"),
                    source: io::Error::other("io"),
                },
                "failed to open log file",
            ),
        ];

        for (err, message) in cases {
            assert_eq!(err.to_string(), message);
            assert!(err.source().is_some());
        }
    }
}
