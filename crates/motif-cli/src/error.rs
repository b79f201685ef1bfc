//! Error types for the motif CLI
//!
//! Messages are user-facing and say what to check next.

use motif_common::MotifError;
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file or environment is invalid
    #[error("Configuration error: {0}. Check your config file and RNA_MOTIF_* environment variables.")]
    Config(String),

    /// Source override names nothing in the session
    #[error("Unknown source '{0}'. Run 'rna-motifs sources' to list the registered sources.")]
    UnknownSource(String),

    /// Tool name is not a supported export format
    #[error("Unknown tool '{0}'. Expected 'fr3d' or 'rnamotifscan'.")]
    UnknownTool(String),

    /// Cache operation failed
    #[error("Cache error: {0}. Try 'rna-motifs cache clear' to start from an empty cache.")]
    Cache(String),

    /// Motif database layer failed
    #[error(transparent)]
    Motif(#[from] MotifError),

    /// File system operation failed
    #[error("File operation failed: {0}. Check file permissions and disk space.")]
    Io(#[from] std::io::Error),

    /// JSON rendering failed
    #[error("Failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Failure with context attached, printed with its whole cause chain
    #[error("{0:#}")]
    Other(#[from] anyhow::Error),
}

impl CliError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_suggest_next_step() {
        let err = CliError::UnknownSource("pdbe".to_string());
        assert!(err.to_string().contains("rna-motifs sources"));

        let err = CliError::cache("locked");
        assert!(err.to_string().starts_with("Cache error: locked."));
    }

    #[test]
    fn test_motif_errors_pass_through() {
        let err: CliError = MotifError::config("timeout_secs must be greater than zero").into();
        assert_eq!(
            err.to_string(),
            MotifError::config("timeout_secs must be greater than zero").to_string()
        );
    }
}
