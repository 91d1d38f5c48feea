//! # yarrow-model
//!
//! Model services layer for Yarrow. The pipeline consumes three remote
//! capabilities through this crate, all treated as opaque and unreliable:
//!
//! - **Embedding**: text -> fixed-length vector (query classification
//!   fallback and vector retrieval)
//! - **Relevance**: (query, passage) -> scalar score (cross-encoder
//!   reranking)
//! - **Generation**: prompt -> answer text plus a self-reported confidence
//!
//! ## Design Principles
//!
//! 1. **Remote-only**: inference runs on a model server; this crate is HTTP
//!    plumbing plus response validation. Test doubles live in consuming
//!    crates.
//! 2. **Provider-agnostic traits**: nothing above this crate knows which
//!    server is behind the clients.
//! 3. **Untrusted outputs**: malformed or empty responses become
//!    [`ModelError`] values, never panics.

pub mod config;
pub mod error;
pub mod http;
pub mod quality;

pub use config::{
    ModelConfig, ProviderKind, DEFAULT_EMBEDDING_MODEL, DEFAULT_ENDPOINT,
    DEFAULT_GENERATION_MODEL, DEFAULT_RELEVANCE_MODEL,
};
pub use error::{ModelError, ModelResult};
pub use http::{HttpEmbeddingClient, HttpGenerationClient, HttpRelevanceClient};

// ============================================================================
// EmbeddingClient
// ============================================================================

/// Client for the embedding service.
///
/// Implementations must be `Send + Sync`; one client is shared across
/// concurrent pipeline instances.
pub trait EmbeddingClient: Send + Sync {
    /// Embed a single text into a fixed-length vector.
    fn embed(&self, text: &str) -> ModelResult<Vec<f32>>;

    /// Embed a batch of texts.
    fn embed_batch(&self, texts: &[String]) -> ModelResult<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Model identifier, for logging.
    fn model_id(&self) -> &str;
}

// ============================================================================
// RelevanceClient
// ============================================================================

/// Client for the cross-encoder relevance service.
///
/// Stateless and batchable: scores every (query, document) pair.
pub trait RelevanceClient: Send + Sync {
    /// Score a batch of documents against a query. Higher is more relevant.
    fn score_batch(&self, query: &str, documents: &[String]) -> ModelResult<Vec<f32>>;

    /// Model identifier, for logging.
    fn model_id(&self) -> &str;
}

// ============================================================================
// GenerationClient
// ============================================================================

/// What the generation service returned.
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    /// The generated answer text.
    pub text: String,

    /// Self-reported confidence in [0, 1].
    ///
    /// One input to the pipeline's confidence blend, never the final value.
    pub confidence: f32,
}

/// Client for the generation service.
pub trait GenerationClient: Send + Sync {
    /// Generate an answer for the assembled prompt.
    ///
    /// May fail for any transport or quota reason; callers are expected to
    /// catch the error and substitute a fallback answer.
    fn generate(&self, prompt: &str) -> ModelResult<GenerationOutput>;

    /// Model identifier, for logging.
    fn model_id(&self) -> &str;
}

// ============================================================================
// Factory Functions
// ============================================================================

/// Create an embedding client from configuration.
pub fn create_embedding_client(config: &ModelConfig) -> ModelResult<Box<dyn EmbeddingClient>> {
    match config.provider {
        ProviderKind::Ollama => Ok(Box::new(HttpEmbeddingClient::new(config)?)),
    }
}

/// Create a relevance client from configuration.
pub fn create_relevance_client(config: &ModelConfig) -> ModelResult<Box<dyn RelevanceClient>> {
    match config.provider {
        ProviderKind::Ollama => Ok(Box::new(HttpRelevanceClient::new(config)?)),
    }
}

/// Create a generation client from configuration.
pub fn create_generation_client(config: &ModelConfig) -> ModelResult<Box<dyn GenerationClient>> {
    match config.provider {
        ProviderKind::Ollama => Ok(Box::new(HttpGenerationClient::new(config)?)),
    }
}
