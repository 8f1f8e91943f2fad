//! Error types for tablelink-relay.

use thiserror::Error;

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Errors that can occur while relaying updates to the link structure.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The shared-memory link could not be opened.
    #[error("Link sink unavailable: {0}")]
    SinkUnavailable(String),

    /// Writing a frame to the sink failed.
    #[error("Sink write failed: {0}")]
    Sink(String),

    /// A client message was not a valid update.
    #[error("Invalid update: {0}")]
    Decode(#[from] serde_json::Error),

    /// Encoding the link structure failed.
    #[error(transparent)]
    Link(#[from] tablelink_core::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
