//! Error types for external seed-client and media-player integrations.

use thiserror::Error;

/// Primary error type for client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The HTTP request itself failed (connection, TLS, timeout).
    #[error("request to {service} failed")]
    Request {
        /// Service identifier (e.g. `"qbittorrent"`, `"plex"`, `"jellyfin"`).
        service: &'static str,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },
    /// The service responded with a non-success status code.
    #[error("{service} responded with status {status}")]
    Status {
        /// Service identifier.
        service: &'static str,
        /// HTTP status code returned.
        status: u16,
        /// Operation identifier (e.g. `"login"`, `"torrents/info"`).
        operation: &'static str,
    },
    /// The response body could not be decoded into the expected shape.
    #[error("failed to decode {service} response for {operation}")]
    Decode {
        /// Service identifier.
        service: &'static str,
        /// Operation identifier.
        operation: &'static str,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// Authentication with the service failed (bad credentials/token).
    #[error("authentication with {service} failed")]
    Auth {
        /// Service identifier.
        service: &'static str,
    },
}

/// Convenience alias for client operation results.
pub type ClientResult<T> = Result<T, ClientError>;
