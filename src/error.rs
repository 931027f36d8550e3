//! Error types for SpaceBot

use thiserror::Error;

/// Result type alias for SpaceBot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in SpaceBot
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Non-success status or network failure talking to a data source.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Upstream answered, but the body was missing something we need.
    #[error("Malformed upstream payload: {0}")]
    MalformedPayload(String),

    #[error("Incorrect date format, should be YYYY-MM-DD: {0}")]
    InvalidDate(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the failure came from a data source rather than from us.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Error::UpstreamUnavailable(_) | Error::MalformedPayload(_) | Error::Json(_)
        )
    }
}
