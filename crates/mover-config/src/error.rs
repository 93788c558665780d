//! Error types for configuration operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the configuration file from disk failed.
    #[error("failed to read configuration file")]
    Io {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The configuration file was not valid YAML.
    #[error("failed to parse configuration file")]
    Yaml {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_yaml::Error,
    },
    /// An `${VAR}` reference in the configuration file had no value in
    /// the environment and no default.
    #[error("environment variable not set")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },
    /// A field contained a value that failed validation.
    #[error("invalid configuration field")]
    InvalidField {
        /// Dotted path to the offending mapping (e.g. `mappings[0]`).
        section: String,
        /// Name of the field that failed validation.
        field: &'static str,
        /// Offending value rendered as a string, when available.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// A duration string (e.g. `"2h"`, `"30d"`) could not be parsed.
    #[error("invalid duration")]
    InvalidDuration {
        /// Dotted path to the offending mapping.
        section: String,
        /// Name of the field that failed validation.
        field: &'static str,
        /// Raw value that failed to parse.
        value: String,
        /// Underlying parse error.
        #[source]
        source: humantime::DurationError,
    },
    /// An ignore glob pattern failed to compile.
    #[error("invalid ignore pattern")]
    InvalidGlob {
        /// Dotted path to the offending mapping.
        section: String,
        /// Raw glob pattern that failed to compile.
        pattern: String,
        /// Underlying compilation error.
        #[source]
        source: globset::Error,
    },
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
