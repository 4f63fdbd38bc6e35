//! Error types for docrag.
//!
//! One enum covers every failure category of the pipeline: configuration,
//! I/O, the embedding and generation services, index persistence and
//! retrieval.

use thiserror::Error;

/// Unified error type for docrag.
///
/// Chunking aids (sentence embeddings, proposition and grouping calls)
/// recover locally and never surface `Embedding` or `Generation` to the
/// caller; the retrieval and answer paths propagate them.
#[derive(Error, Debug)]
pub enum AppError {
    /// Invalid configuration, e.g. `overlap >= chunk_size`
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Embedding service failure (transport, server error)
    #[error("Embedding service error: {0}")]
    Embedding(String),

    /// Language-model call failure (transport, server error)
    #[error("Generation service error: {0}")]
    Generation(String),

    /// A service refused the request (bad key, bad model, malformed body)
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// Malformed model output or document content
    #[error("Parse error: {0}")]
    Parse(String),

    /// Index and chunk list are out of sync
    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    /// Retrieval could not produce results
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Vector index backend errors
    #[error("Index error: {0}")]
    Index(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The operation was cancelled before completion
    #[error("Operation cancelled")]
    Cancelled,

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether retrying the same call could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::Embedding(_) | AppError::Generation(_) | AppError::Io(_)
        )
    }

    /// Error for a non-success HTTP `status`.
    ///
    /// Client errors are `Rejected`, except 408 and 429 which go through
    /// `service` along with every server error.
    pub fn for_status(status: u16, message: String, service: fn(String) -> AppError) -> Self {
        match status {
            408 | 429 => service(message),
            400..=499 => AppError::Rejected(message),
            _ => service(message),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_category() {
        let err = AppError::Config("overlap (5) must be smaller than chunk_size (5)".into());
        assert!(err.to_string().starts_with("Configuration error"));
        assert_eq!(AppError::Cancelled.to_string(), "Operation cancelled");
    }

    #[test]
    fn test_transient_classification() {
        assert!(AppError::Embedding("timeout".into()).is_transient());
        assert!(AppError::Generation("502".into()).is_transient());
        assert!(!AppError::Config("bad".into()).is_transient());
        assert!(!AppError::CorruptIndex("3 != 4".into()).is_transient());
        assert!(!AppError::Rejected("401".into()).is_transient());
        assert!(!AppError::Parse("bad json".into()).is_transient());
    }

    #[test]
    fn test_for_status() {
        let err = AppError::for_status(401, "invalid api key".into(), AppError::Embedding);
        assert!(matches!(err, AppError::Rejected(_)));
        assert!(!err.is_transient());

        assert!(matches!(
            AppError::for_status(404, "model not found".into(), AppError::Generation),
            AppError::Rejected(_)
        ));
        for status in [408, 429, 500, 503] {
            let err = AppError::for_status(status, "try later".into(), AppError::Generation);
            assert!(matches!(err, AppError::Generation(_)), "status {}", status);
            assert!(err.is_transient());
        }
    }

    #[test]
    fn test_from_serde_json() {
        let err: AppError = serde_json::from_str::<Vec<String>>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
