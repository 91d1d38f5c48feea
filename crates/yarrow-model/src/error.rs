//! Error types for yarrow-model.
//!
//! Every model service is remote and therefore unreliable; these errors are
//! expected to be caught at the pipeline stage boundary and turned into
//! degraded behavior, never propagated to the caller unformatted.

use thiserror::Error;

/// Result type alias for yarrow-model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur when calling a model service.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The HTTP request itself failed (connection refused, timeout, DNS).
    #[error("Request to {service} service failed: {message}")]
    Request {
        /// Which service was being called (embedding, relevance, generation).
        service: &'static str,
        /// Description of the transport failure.
        message: String,
    },

    /// The service answered with a non-success status code.
    #[error("{service} service returned HTTP {status}: {message}")]
    Status {
        /// Which service was being called.
        service: &'static str,
        /// The HTTP status code.
        status: u16,
        /// Response body excerpt.
        message: String,
    },

    /// The service answered but the payload was empty or malformed.
    #[error("{service} service returned an unusable response: {message}")]
    EmptyResponse {
        /// Which service was being called.
        service: &'static str,
        /// What was wrong with the payload.
        message: String,
    },

    /// The configured provider is not available.
    #[error("Provider '{provider}' not available: {reason}")]
    ProviderNotAvailable {
        /// The requested provider.
        provider: String,
        /// Why it cannot be used.
        reason: String,
    },

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ModelError {
    /// Create a transport-failure error.
    pub fn request(service: &'static str, message: impl Into<String>) -> Self {
        Self::Request {
            service,
            message: message.into(),
        }
    }

    /// Create an empty/malformed-response error.
    pub fn empty_response(service: &'static str, message: impl Into<String>) -> Self {
        Self::EmptyResponse {
            service,
            message: message.into(),
        }
    }
}
