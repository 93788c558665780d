//! Telemetry initialisation: a stdout layer plus an optional
//! size-rotating file layer.

use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{Result, TelemetryError};
use crate::rotating::{DEFAULT_MAX_BACKUPS, DEFAULT_MAX_BYTES, RotatingFileWriter};

/// Default logging target when `RUST_LOG` is not provided.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level string (e.g. `info`, `debug`), or an `EnvFilter`
    /// directive string.
    pub level: String,
    /// Output format selection for the stdout layer.
    pub format: LogFormat,
    /// Optional path to a rotating log file written alongside stdout.
    pub log_file: Option<PathBuf>,
    /// Byte cap before the log file rotates.
    pub max_bytes: u64,
    /// Number of rotated backups retained.
    pub max_backups: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            format: LogFormat::infer(),
            log_file: None,
            max_bytes: DEFAULT_MAX_BYTES,
            max_backups: DEFAULT_MAX_BACKUPS,
        }
    }
}

/// Available output formats for the logger.
#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    /// Emit logs as structured JSON objects.
    Json,
    /// Emit human-readable, pretty-printed logs.
    Pretty,
}

impl LogFormat {
    /// Choose a sensible default for the current build.
    #[must_use]
    pub const fn infer() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

/// Configure and install the global tracing subscriber.
///
/// Installs stdout logging unconditionally, plus a size-capped rotating
/// file layer when `config.log_file` is set.
///
/// # Errors
/// Returns [`TelemetryError::LogDirCreate`]/[`TelemetryError::LogFileOpen`]
/// if the log file cannot be opened, or
/// [`TelemetryError::SubscriberInstall`] if a subscriber is already
/// installed globally.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let file_writer = config
        .log_file
        .as_ref()
        .map(|path| RotatingFileWriter::open(path, config.max_bytes, config.max_backups))
        .transpose()?
        .map(Arc::new);

    let registry = tracing_subscriber::registry().with(env_filter);

    let stdout_layer = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(false)
            .with_thread_ids(false)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .boxed(),
    };

    let file_layer = file_writer.map(|writer| {
        fmt::layer()
            .json()
            .with_target(false)
            .with_ansi(false)
            .with_writer(writer)
            .boxed()
    });

    registry
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|source| TelemetryError::SubscriberInstall { source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logging_config_default_infers_format() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, DEFAULT_LOG_LEVEL);
        assert!(config.log_file.is_none());
    }

    #[test]
    fn init_logging_with_file_creates_parent_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log_path = dir.path().join("logs").join("mover.log");
        let config = LoggingConfig {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            log_file: Some(log_path.clone()),
            max_bytes: DEFAULT_MAX_BYTES,
            max_backups: DEFAULT_MAX_BACKUPS,
        };
        // Installing the subscriber globally a second time in the same test
        // binary would error; we only assert the directory/file side effect.
        let _ = init_logging(&config);
        assert!(log_path.parent().expect("parent").exists());
    }
}
