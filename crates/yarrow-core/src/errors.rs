//! Error types for yarrow-core.

use thiserror::Error;

/// Domain-specific errors for the query pipeline.
///
/// Stage-internal failures (a model call timing out, a retrieval strategy
/// coming back empty) are not errors; they degrade inside the stage and
/// leave a trace entry. Only the conditions below surface to the caller.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The caller passed an empty or whitespace-only question.
    #[error("Question cannot be empty.")]
    EmptyQuery,

    /// The passage store could not be reached on the cascade's first access.
    ///
    /// Later store failures degrade to the next strategy; this one is fatal
    /// because nothing can be retrieved at all.
    #[error("Passage store unavailable: {reason}")]
    StoreUnavailable {
        /// Description of the connectivity failure.
        reason: String,
    },

    /// Configuration file could not be read or parsed.
    #[error("Invalid configuration at `{path}`: {message}")]
    InvalidConfig {
        /// Path of the offending file.
        path: String,
        /// Description of the problem.
        message: String,
    },

    /// Failed to append to the query log.
    #[error("Query log write failed: {0}")]
    LogWrite(String),

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
