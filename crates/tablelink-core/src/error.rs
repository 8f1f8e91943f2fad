//! Error types for tablelink-core.

use thiserror::Error;

/// Result type alias for tablelink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while bridging positions to the audio consumer.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested transport is not available in this environment.
    #[error("Transport unsupported: {0}")]
    Unsupported(String),

    /// Connecting to the audio consumer failed.
    #[error("Connection failed: {0}")]
    Connect(String),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// A LinkedMem frame could not be encoded or decoded.
    #[error("LinkedMem layout error: {0}")]
    Layout(String),
}
