//! Error types for yarrow-db.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for yarrow-db operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors that can occur in the passage store.
#[derive(Debug, Error)]
pub enum DbError {
    /// The store could not be reached or opened at all.
    ///
    /// This is the only error class the query pipeline treats as fatal;
    /// everything else degrades to the next retrieval strategy.
    #[error("Passage store unavailable: {reason}")]
    Unavailable {
        /// Description of the connectivity failure.
        reason: String,
    },

    /// A passage file could not be read.
    #[error("Passage store I/O error at `{path}`: {message}")]
    StoreIo {
        /// Path to the store file.
        path: PathBuf,
        /// Description of the I/O error.
        message: String,
    },

    /// A passage record could not be parsed.
    #[error("Passage store parse error at `{path}` line {line}: {message}")]
    StoreParse {
        /// Path to the store file.
        path: PathBuf,
        /// 1-based line number of the bad record.
        line: usize,
        /// Description of the parse error.
        message: String,
    },

    /// A query embedding did not match the store's embedding dimension.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension the store was built with.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DbError {
    /// Create an `Unavailable` error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Whether this error indicates the store itself cannot be reached.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}
