//! # yarrow-core
//!
//! **Yarrow** - cited question answering over the I Ching reference corpus.
//!
//! This crate implements the multi-stage query pipeline: classification,
//! entity and sense resolution, cascading retrieval, reranking, and cited
//! answer assembly with a blended confidence score. It is consumed by the
//! `yarrow` CLI and by any other Rust host with a passage store and model
//! services to plug in.
//!
//! ## Main Types
//!
//! - [`QueryPipeline`] - the entry point: `process(query, cast_context)`
//! - [`QueryResponse`] - the externally visible result
//! - [`ProcessingState`] - the record threaded through the four stages
//! - [`PipelineError`] - domain-specific error type
//!
//! ## Stages
//!
//! - [`dispatch`] - rule-based classification with an embedding fallback
//! - [`linguistics`] - mention extraction, sense disambiguation, expansion
//! - [`retrieval`] - six cascading strategies with TTL-cached lookups
//! - [`reasoning`] - reranking, generation, citations, confidence
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use yarrow_core::{PipelineConfig, QueryPipeline};
//! use yarrow_db::MemoryPassageStore;
//!
//! let store = Arc::new(MemoryPassageStore::load("passages.jsonl".as_ref())?);
//! let config = PipelineConfig::load_or_default()?;
//! let generator = yarrow_model::create_generation_client(&config.models)?;
//!
//! let pipeline = QueryPipeline::new(store, None, None, generator.into(), config);
//! let response = pipeline.process("hexagram Revolution meaning?", None)?;
//! println!("{} ({:.0}%)", response.answer, response.confidence * 100.0);
//! ```

// Modules
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod hexagrams;
pub mod lexicon;
pub mod linguistics;
pub mod log;
pub mod pipeline;
pub mod prompt;
pub mod reasoning;
pub mod retrieval;
pub mod state;

// Re-exports for convenience
pub use cache::{EntryList, ScoredList, TtlCache};
pub use config::{
    AnswerConfig, ClassifierConfig, LinguisticsConfig, PipelineConfig, ReasoningConfig,
    RetrievalConfig, CONFIG_FILENAME, YARROW_HOME_DIR,
};
pub use dispatch::{Classification, QueryDispatcher};
pub use errors::PipelineError;
pub use hexagrams::{by_code, detect_hexagram, is_canonical_name, name_to_code, Hexagram, HEXAGRAMS};
pub use lexicon::{partial_ratio, ConceptLexicon, FuzzyMatch, LexiconEntry};
pub use linguistics::{LinguisticResolver, Resolution};
pub use log::{append_query_log, read_query_log, QueryLogEntry};
pub use pipeline::{QueryPipeline, QueryResponse, SourceRef, STORE_DOWN_ANSWER};
pub use reasoning::{
    compute_confidence, Citation, Reasoner, ReasoningOutcome, FALLBACK_CONFIDENCE,
    GENERATION_FAILED_ANSWER, NO_RESULTS_ANSWER,
};
pub use retrieval::{CascadingRetriever, RetrievalOutcome};
pub use state::{
    CastContext, Entities, Passage, ProcessingState, QueryType, Sense, SenseResolution,
};
