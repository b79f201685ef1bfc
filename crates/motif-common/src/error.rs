//! Error types for the motif workspace

use thiserror::Error;

/// Result type alias for motif operations
pub type Result<T> = std::result::Result<T, MotifError>;

/// Main error type for motif database operations
///
/// Per-record parse failures are not represented here: converters skip and log
/// those. A `MotifError` means a whole file, request or cache entry could not be
/// handled.
#[derive(Error, Debug)]
pub enum MotifError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Unknown format type: {0}")]
    UnknownFormat(String),
}

impl MotifError {
    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a cache error
    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the error came from the network layer
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Network(_))
    }
}
