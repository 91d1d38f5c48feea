//! Blocking HTTP clients for the model services.
//!
//! The embedding and generation clients speak the Ollama API
//! (`/api/embeddings`, `/api/generate`); the relevance client speaks the
//! `/rerank` route exposed by cross-encoder servers. All three validate the
//! payload before trusting it.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ModelConfig;
use crate::error::{ModelError, ModelResult};
use crate::quality;
use crate::{EmbeddingClient, GenerationClient, GenerationOutput, RelevanceClient};

fn build_http_client(service: &'static str, timeout_secs: u64) -> ModelResult<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ModelError::request(service, e.to_string()))
}

fn check_status(service: &'static str, response: reqwest::blocking::Response) -> ModelResult<reqwest::blocking::Response> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().unwrap_or_default();
        return Err(ModelError::Status {
            service,
            status: status.as_u16(),
            message: message.chars().take(200).collect(),
        });
    }
    Ok(response)
}

// ============================================================================
// Embedding
// ============================================================================

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

/// Embedding client over the Ollama embeddings API.
pub struct HttpEmbeddingClient {
    client: reqwest::blocking::Client,
    url: String,
    model: String,
}

impl HttpEmbeddingClient {
    /// Create a client from configuration.
    pub fn new(config: &ModelConfig) -> ModelResult<Self> {
        Ok(Self {
            client: build_http_client("embedding", config.timeout_secs)?,
            url: format!("{}/api/embeddings", config.endpoint.trim_end_matches('/')),
            model: config.embedding_model.clone(),
        })
    }
}

impl EmbeddingClient for HttpEmbeddingClient {
    fn embed(&self, text: &str) -> ModelResult<Vec<f32>> {
        debug!(model = %self.model, chars = text.len(), "Embedding request");

        let response = self
            .client
            .post(&self.url)
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .map_err(|e| ModelError::request("embedding", e.to_string()))?;

        let payload: EmbeddingResponse = check_status("embedding", response)?
            .json()
            .map_err(|e| ModelError::empty_response("embedding", e.to_string()))?;

        if payload.embedding.is_empty() {
            return Err(ModelError::empty_response(
                "embedding",
                "empty embedding vector",
            ));
        }
        Ok(payload.embedding)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Relevance (cross-encoder)
// ============================================================================

#[derive(Serialize)]
struct RelevanceRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
}

#[derive(Deserialize)]
struct RelevanceResponse {
    #[serde(default)]
    scores: Vec<f32>,
}

/// Cross-encoder client over a `/rerank` route.
pub struct HttpRelevanceClient {
    client: reqwest::blocking::Client,
    url: String,
    model: String,
}

impl HttpRelevanceClient {
    /// Create a client from configuration.
    pub fn new(config: &ModelConfig) -> ModelResult<Self> {
        Ok(Self {
            client: build_http_client("relevance", config.timeout_secs)?,
            url: format!("{}/rerank", config.endpoint.trim_end_matches('/')),
            model: config.relevance_model.clone(),
        })
    }
}

impl RelevanceClient for HttpRelevanceClient {
    fn score_batch(&self, query: &str, documents: &[String]) -> ModelResult<Vec<f32>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        debug!(model = %self.model, documents = documents.len(), "Relevance request");

        let response = self
            .client
            .post(&self.url)
            .json(&RelevanceRequest {
                model: &self.model,
                query,
                documents,
            })
            .send()
            .map_err(|e| ModelError::request("relevance", e.to_string()))?;

        let payload: RelevanceResponse = check_status("relevance", response)?
            .json()
            .map_err(|e| ModelError::empty_response("relevance", e.to_string()))?;

        if payload.scores.len() != documents.len() {
            return Err(ModelError::empty_response(
                "relevance",
                format!(
                    "expected {} scores, got {}",
                    documents.len(),
                    payload.scores.len()
                ),
            ));
        }
        Ok(payload.scores)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Generation
// ============================================================================

#[derive(Serialize)]
struct GenerationOptions {
    temperature: f32,
    top_p: f32,
    num_predict: u32,
}

#[derive(Serialize)]
struct GenerationRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerationOptions,
}

#[derive(Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    response: String,
}

/// Generation client over the Ollama generate API.
///
/// The server does not report a confidence, so one is derived with
/// [`quality::estimate_confidence`] from the answer text and the hexagram
/// codes the prompt was built from.
pub struct HttpGenerationClient {
    client: reqwest::blocking::Client,
    url: String,
    model: String,
    temperature: f32,
    top_p: f32,
    max_output_tokens: u32,
    /// Entry codes present in the current prompt context, used by the
    /// quality heuristic. Set per request through `with_context_codes`.
    context_codes: Vec<String>,
}

impl HttpGenerationClient {
    /// Create a client from configuration.
    pub fn new(config: &ModelConfig) -> ModelResult<Self> {
        Ok(Self {
            client: build_http_client("generation", config.timeout_secs)?,
            url: format!("{}/api/generate", config.endpoint.trim_end_matches('/')),
            model: config.generation_model.clone(),
            temperature: config.temperature,
            top_p: config.top_p,
            max_output_tokens: config.max_output_tokens,
            context_codes: Vec::new(),
        })
    }

    /// Return a copy of this client scoped to the given context codes.
    pub fn with_context_codes(&self, codes: Vec<String>) -> Self {
        Self {
            client: self.client.clone(),
            url: self.url.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            top_p: self.top_p,
            max_output_tokens: self.max_output_tokens,
            context_codes: codes,
        }
    }
}

impl GenerationClient for HttpGenerationClient {
    fn generate(&self, prompt: &str) -> ModelResult<GenerationOutput> {
        debug!(model = %self.model, prompt_chars = prompt.len(), "Generation request");

        let response = self
            .client
            .post(&self.url)
            .json(&GenerationRequest {
                model: &self.model,
                prompt,
                stream: false,
                options: GenerationOptions {
                    temperature: self.temperature,
                    top_p: self.top_p,
                    num_predict: self.max_output_tokens,
                },
            })
            .send()
            .map_err(|e| ModelError::request("generation", e.to_string()))?;

        let payload: GenerationResponse = check_status("generation", response)?
            .json()
            .map_err(|e| ModelError::empty_response("generation", e.to_string()))?;

        let text = payload.response.trim().to_string();
        if text.is_empty() {
            return Err(ModelError::empty_response("generation", "empty answer"));
        }

        let confidence = quality::estimate_confidence(&text, &self.context_codes);
        Ok(GenerationOutput { text, confidence })
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
