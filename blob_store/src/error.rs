//! Error types for backend adapter operations.

use std::time::Duration;

/// Result type for backend adapter operations.
pub type BlobResult<T> = Result<T, BlobError>;

/// Errors that can occur while talking to a storage backend.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BlobError {
    /// Nothing is stored under the id.
    #[error("blob not found: {id}")]
    NotFound { id: String },

    /// The id cannot be mapped onto this backend's namespace.
    #[error("invalid blob id '{id}': {reason}")]
    InvalidId { id: String, reason: String },

    /// The backend did not answer within the allotted time.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// Transient backend failure (5xx, connection reset, ...).
    #[error("backend unavailable: {source}")]
    Unavailable { source: anyhow::Error },

    /// The backend refused the request (4xx other than 404).
    #[error("backend rejected the request with status {status}")]
    Rejected { status: u16 },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("database error: {source}")]
    Database {
        #[from]
        source: rusqlite::Error,
    },

    #[error("blob store error: {source}")]
    Other { source: anyhow::Error },
}

impl BlobError {
    /// Identifies failed operations that can be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Unavailable { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Stable, caller-safe name of the error class. Never contains backend
    /// internals.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::InvalidId { .. } => "invalid_id",
            Self::Timeout { .. } => "timeout",
            Self::Unavailable { .. } => "unavailable",
            Self::Rejected { .. } => "rejected",
            Self::Io { .. } => "io",
            Self::Database { .. } => "database",
            Self::Other { .. } => "other",
        }
    }
}

impl From<anyhow::Error> for BlobError {
    fn from(err: anyhow::Error) -> Self {
        BlobError::Other { source: err }
    }
}

impl From<tokio::task::JoinError> for BlobError {
    fn from(err: tokio::task::JoinError) -> Self {
        BlobError::Other {
            source: anyhow::Error::from(err),
        }
    }
}
