//! Configuration for the model service clients.

use serde::{Deserialize, Serialize};

/// Default base URL for an Ollama-compatible model server.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";

/// Default cross-encoder relevance model.
pub const DEFAULT_RELEVANCE_MODEL: &str = "bge-reranker-base";

/// Default generation model.
pub const DEFAULT_GENERATION_MODEL: &str = "llama3.1";

/// Which provider the clients talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// An Ollama-compatible HTTP server.
    #[default]
    Ollama,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ollama => write!(f, "ollama"),
        }
    }
}

/// Configuration for all three model services.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    /// Provider kind.
    #[serde(default)]
    pub provider: ProviderKind,

    /// Base URL of the model server.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Embedding model identifier.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Cross-encoder relevance model identifier.
    #[serde(default = "default_relevance_model")]
    pub relevance_model: String,

    /// Generation model identifier.
    #[serde(default = "default_generation_model")]
    pub generation_model: String,

    /// Sampling temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Nucleus sampling cutoff for generation.
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Maximum tokens the generation service may produce.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_relevance_model() -> String {
    DEFAULT_RELEVANCE_MODEL.to_string()
}

fn default_generation_model() -> String {
    DEFAULT_GENERATION_MODEL.to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    0.8
}

fn default_max_output_tokens() -> u32 {
    1000
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            endpoint: default_endpoint(),
            embedding_model: default_embedding_model(),
            relevance_model: default_relevance_model(),
            generation_model: default_generation_model(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}
