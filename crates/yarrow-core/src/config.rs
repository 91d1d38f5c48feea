//! Configuration for the query pipeline.
//!
//! Loaded from `~/.yarrow/config.yaml` when present, with programmatic
//! defaults for every field so a missing file is never an error. All
//! tunables the pipeline consults live here; nothing is hardcoded at the
//! call sites.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::PipelineError;

/// Directory under the user's home for yarrow state.
pub const YARROW_HOME_DIR: &str = ".yarrow";

/// Config filename inside the yarrow home.
pub const CONFIG_FILENAME: &str = "config.yaml";

// ============================================================================
// RetrievalConfig
// ============================================================================

/// Tunables for the cascading retriever.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalConfig {
    /// Candidates requested from each strategy.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Similarity floor for the vector strategy.
    ///
    /// Deployments of this system have run anywhere from 0.25 to 0.5; the
    /// default is the lower bound, which avoids empty result sets on short
    /// queries.
    #[serde(default = "default_similarity_floor")]
    pub similarity_floor: f32,

    /// Oversampling factor for the vector strategy: request
    /// `top_k * oversample` neighbors, then cut by the floor.
    #[serde(default = "default_oversample")]
    pub oversample: usize,

    /// Acceptance threshold (0-100) for fuzzy concept matching.
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f32,

    /// Size of the random-sample floor strategy.
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,

    /// TTL in seconds for code-keyed cache entries (strategies 1-3).
    #[serde(default = "default_entry_cache_ttl_secs")]
    pub entry_cache_ttl_secs: u64,

    /// Capacity of the code-keyed cache.
    #[serde(default = "default_entry_cache_capacity")]
    pub entry_cache_capacity: u64,

    /// TTL in seconds for query-keyed cache entries (strategies 4-5).
    #[serde(default = "default_query_cache_ttl_secs")]
    pub query_cache_ttl_secs: u64,

    /// Capacity of each query-keyed cache.
    #[serde(default = "default_query_cache_capacity")]
    pub query_cache_capacity: u64,
}

fn default_top_k() -> usize {
    20
}

fn default_similarity_floor() -> f32 {
    0.25
}

fn default_oversample() -> usize {
    3
}

fn default_fuzzy_threshold() -> f32 {
    80.0
}

fn default_sample_size() -> usize {
    5
}

fn default_entry_cache_ttl_secs() -> u64 {
    600
}

fn default_entry_cache_capacity() -> u64 {
    1024
}

fn default_query_cache_ttl_secs() -> u64 {
    300
}

fn default_query_cache_capacity() -> u64 {
    512
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            similarity_floor: default_similarity_floor(),
            oversample: default_oversample(),
            fuzzy_threshold: default_fuzzy_threshold(),
            sample_size: default_sample_size(),
            entry_cache_ttl_secs: default_entry_cache_ttl_secs(),
            entry_cache_capacity: default_entry_cache_capacity(),
            query_cache_ttl_secs: default_query_cache_ttl_secs(),
            query_cache_capacity: default_query_cache_capacity(),
        }
    }
}

// ============================================================================
// ReasoningConfig
// ============================================================================

/// Tunables for reranking and answer assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningConfig {
    /// Candidates kept after reranking.
    #[serde(default = "default_final_k")]
    pub final_k: usize,

    /// Weight of the cross-encoder score in the blend.
    #[serde(default = "default_cross_weight")]
    pub cross_weight: f32,

    /// Weight of the vector score in the blend.
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f32,

    /// Characters of passage text sent to the cross-encoder.
    #[serde(default = "default_rerank_prefix_chars")]
    pub rerank_prefix_chars: usize,

    /// Passages included in the prompt context block.
    #[serde(default = "default_context_passages")]
    pub context_passages: usize,

    /// Character cap per passage in the context block.
    #[serde(default = "default_context_chars")]
    pub context_chars: usize,
}

fn default_final_k() -> usize {
    12
}

fn default_cross_weight() -> f32 {
    0.7
}

fn default_vector_weight() -> f32 {
    0.3
}

fn default_rerank_prefix_chars() -> usize {
    512
}

fn default_context_passages() -> usize {
    8
}

fn default_context_chars() -> usize {
    400
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            final_k: default_final_k(),
            cross_weight: default_cross_weight(),
            vector_weight: default_vector_weight(),
            rerank_prefix_chars: default_rerank_prefix_chars(),
            context_passages: default_context_passages(),
            context_chars: default_context_chars(),
        }
    }
}

// ============================================================================
// ClassifierConfig / LinguisticsConfig / AnswerConfig
// ============================================================================

/// Tunables for the query dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierConfig {
    /// Minimum cosine similarity for the embedding fallback to accept a
    /// category instead of defaulting to `general`.
    #[serde(default = "default_accept_threshold")]
    pub accept_threshold: f32,
}

fn default_accept_threshold() -> f32 {
    0.3
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            accept_threshold: default_accept_threshold(),
        }
    }
}

/// Tunables for the linguistic resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinguisticsConfig {
    /// Minimum sense confidence before sense synonyms join the expansion.
    #[serde(default = "default_sense_threshold")]
    pub sense_threshold: f32,
}

fn default_sense_threshold() -> f32 {
    0.6
}

impl Default for LinguisticsConfig {
    fn default() -> Self {
        Self {
            sense_threshold: default_sense_threshold(),
        }
    }
}

/// Tunables for response assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerConfig {
    /// Maximum sources listed in the response.
    #[serde(default = "default_max_sources")]
    pub max_sources: usize,

    /// Character cap for source previews.
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

fn default_max_sources() -> usize {
    10
}

fn default_preview_chars() -> usize {
    150
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            max_sources: default_max_sources(),
            preview_chars: default_preview_chars(),
        }
    }
}

// ============================================================================
// PipelineConfig
// ============================================================================

/// Root configuration for the query pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Retriever tunables.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Reranking and answer assembly tunables.
    #[serde(default)]
    pub reasoning: ReasoningConfig,

    /// Dispatcher tunables.
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Linguistic resolver tunables.
    #[serde(default)]
    pub linguistics: LinguisticsConfig,

    /// Response assembly tunables.
    #[serde(default)]
    pub answer: AnswerConfig,

    /// Model service configuration.
    #[serde(default)]
    pub models: yarrow_model::ModelConfig,

    /// Optional path for the JSONL query log; unset disables logging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_log_path: Option<PathBuf>,
}

impl PipelineConfig {
    /// Path of the user-level config file, if a home directory exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(YARROW_HOME_DIR).join(CONFIG_FILENAME))
    }

    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let raw = fs::read_to_string(path).map_err(|e| PipelineError::InvalidConfig {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        serde_yaml::from_str(&raw).map_err(|e| PipelineError::InvalidConfig {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Load the user-level config, falling back to defaults when the file
    /// does not exist.
    pub fn load_or_default() -> Result<Self, PipelineError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.retrieval.top_k, 20);
        assert!((config.retrieval.similarity_floor - 0.25).abs() < 1e-6);
        assert_eq!(config.retrieval.oversample, 3);
        assert!((config.retrieval.fuzzy_threshold - 80.0).abs() < 1e-6);
        assert_eq!(config.retrieval.entry_cache_ttl_secs, 600);
        assert_eq!(config.retrieval.query_cache_ttl_secs, 300);
        assert_eq!(config.reasoning.final_k, 12);
        assert!((config.reasoning.cross_weight - 0.7).abs() < 1e-6);
        assert!((config.classifier.accept_threshold - 0.3).abs() < 1e-6);
        assert_eq!(config.answer.max_sources, 10);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "retrieval:\n  similarityFloor: 0.5").unwrap();

        let config = PipelineConfig::load(file.path()).unwrap();
        assert!((config.retrieval.similarity_floor - 0.5).abs() < 1e-6);
        assert_eq!(config.retrieval.top_k, 20);
    }

    #[test]
    fn malformed_yaml_is_an_invalid_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "retrieval: [not, a, map]").unwrap();

        let err = PipelineConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig { .. }));
    }
}
