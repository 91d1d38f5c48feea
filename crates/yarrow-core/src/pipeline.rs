//! Pipeline harness.
//!
//! Owns the four stages and runs them strictly in sequence - dispatch,
//! linguistics, retrieval, reasoning - threading one [`ProcessingState`]
//! forward and timing each stage. The harness is the only component that
//! assembles the externally visible [`QueryResponse`].

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use yarrow_db::PassageStore;
use yarrow_model::{EmbeddingClient, GenerationClient, RelevanceClient};

use crate::config::{AnswerConfig, PipelineConfig};
use crate::dispatch::QueryDispatcher;
use crate::errors::PipelineError;
use crate::linguistics::LinguisticResolver;
use crate::log::{append_query_log, QueryLogEntry};
use crate::prompt::truncate_chars;
use crate::reasoning::Reasoner;
use crate::retrieval::CascadingRetriever;
use crate::state::{CastContext, Entities, Passage, ProcessingState};

/// Answer used when the passage store cannot be reached at all.
pub const STORE_DOWN_ANSWER: &str =
    "The passage store is currently unavailable, so no sources could be consulted. Please try again later.";

/// One source listed in a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRef {
    /// 1-based rank in the reranked candidate list.
    pub rank: usize,
    /// Stored passage id.
    pub passage_id: String,
    /// Owning hexagram code, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_code: Option<String>,
    /// Content tag.
    pub content_type: String,
    /// Effective relevance of the passage.
    pub relevance_score: f32,
    /// Short text preview.
    pub text_preview: String,
}

/// The externally visible result of one processed question.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    /// The final answer text.
    pub answer: String,
    /// Assigned query type.
    pub query_type: String,
    /// Extracted entities.
    pub entities: Entities,
    /// Blended confidence in [0, 1].
    pub confidence: f32,
    /// Sources backing the answer, best first, capped.
    pub sources: Vec<SourceRef>,
    /// Which branch fired in each stage, in order.
    pub trace: Vec<String>,
    /// Per-stage wall time in milliseconds, plus `total`.
    pub stage_timings_ms: BTreeMap<String, f64>,
    /// False only when the final answer is empty after all fallbacks.
    pub success: bool,
}

/// The query pipeline.
pub struct QueryPipeline {
    dispatcher: QueryDispatcher,
    resolver: LinguisticResolver,
    retriever: CascadingRetriever,
    reasoner: Reasoner,
    answer_config: AnswerConfig,
    query_log_path: Option<PathBuf>,
}

impl QueryPipeline {
    /// Wire a pipeline from its collaborators.
    pub fn new(
        store: Arc<dyn PassageStore>,
        embedder: Option<Arc<dyn EmbeddingClient>>,
        relevance: Option<Arc<dyn RelevanceClient>>,
        generator: Arc<dyn GenerationClient>,
        config: PipelineConfig,
    ) -> Self {
        let dispatcher = QueryDispatcher::new(embedder.clone(), &config.classifier);
        let resolver = LinguisticResolver::new(&config.linguistics);
        let retriever = CascadingRetriever::new(store, embedder, config.retrieval.clone());
        let reasoner = Reasoner::new(relevance, generator, config.reasoning.clone());

        Self {
            dispatcher,
            resolver,
            retriever,
            reasoner,
            answer_config: config.answer.clone(),
            query_log_path: config.query_log_path.clone(),
        }
    }

    /// Process one question to completion.
    ///
    /// # Errors
    ///
    /// Only [`PipelineError::EmptyQuery`] is returned as an error; every
    /// other condition, including an unreachable store, produces a
    /// [`QueryResponse`] (with `success: false` in the unreachable-store
    /// case).
    pub fn process(
        &self,
        query: &str,
        cast_context: Option<CastContext>,
    ) -> Result<QueryResponse, PipelineError> {
        if query.trim().is_empty() {
            return Err(PipelineError::EmptyQuery);
        }

        let total_start = Instant::now();
        let mut state = ProcessingState::new(query.trim(), cast_context);

        // Stage 1: dispatch.
        let stage_start = Instant::now();
        let classification = self.dispatcher.classify(&state.query);
        state = state.with_query_type(classification.query_type);
        for entry in classification.trace {
            state = state.with_trace(entry);
        }
        state = state.with_timing("dispatch", stage_start.elapsed());

        // Stage 2: linguistics.
        let stage_start = Instant::now();
        let resolution = self.resolver.resolve(&state.query);
        state = state.with_resolution(resolution.entities, resolution.expanded_query);
        for entry in resolution.trace {
            state = state.with_trace(entry);
        }
        state = state.with_timing("linguistics", stage_start.elapsed());

        // Stage 3: retrieval. An unreachable store is the one fatal path;
        // it still produces a well-formed response for the caller.
        let stage_start = Instant::now();
        let retrieval = match self.retriever.retrieve(
            &state.query,
            &state.expanded_query,
            &state.entities,
            state.query_type,
            state.cast_context.as_ref(),
        ) {
            Ok(outcome) => outcome,
            Err(PipelineError::StoreUnavailable { reason }) => {
                warn!(%reason, "Store unavailable, returning error response");
                state = state
                    .with_trace(format!("retrieval: store unavailable ({})", reason))
                    .with_timing("retrieval", stage_start.elapsed());
                return Ok(self.error_response(query, state, total_start));
            }
            Err(other) => return Err(other),
        };
        let winning_strategy = retrieval.strategy;
        state = state.with_candidates(retrieval.candidates);
        for entry in retrieval.trace {
            state = state.with_trace(entry);
        }
        state = state.with_timing("retrieval", stage_start.elapsed());

        // Stage 4: reasoning.
        let stage_start = Instant::now();
        let reasoning = self.reasoner.reason(
            &state.query,
            state.query_type,
            state.retrieved.clone(),
            state.cast_context.as_ref(),
        );
        state = state.with_answer(reasoning.reranked, reasoning.answer, reasoning.confidence);
        for entry in reasoning.trace {
            state = state.with_trace(entry);
        }
        state = state.with_timing("reasoning", stage_start.elapsed());

        let total = total_start.elapsed();
        let response = self.build_response(state, total);

        info!(
            query_type = %response.query_type,
            confidence = response.confidence,
            sources = response.sources.len(),
            total_ms = total.as_secs_f64() * 1000.0,
            "Query processed"
        );

        self.log_query(query, &response, winning_strategy, total.as_secs_f64() * 1000.0);
        Ok(response)
    }

    /// Assemble the response from the final state.
    fn build_response(&self, state: ProcessingState, total: std::time::Duration) -> QueryResponse {
        let sources = format_sources(&state.reranked, &self.answer_config);

        let mut stage_timings_ms: BTreeMap<String, f64> = state
            .stage_timings
            .iter()
            .map(|(stage, elapsed)| (stage.clone(), elapsed.as_secs_f64() * 1000.0))
            .collect();
        stage_timings_ms.insert("total".to_string(), total.as_secs_f64() * 1000.0);

        QueryResponse {
            success: !state.answer.is_empty(),
            answer: state.answer,
            query_type: state.query_type.as_str().to_string(),
            entities: state.entities,
            confidence: state.confidence,
            sources,
            trace: state.trace,
            stage_timings_ms,
        }
    }

    /// Response for the unreachable-store path: explanatory answer,
    /// `success: false`.
    fn error_response(
        &self,
        query: &str,
        state: ProcessingState,
        total_start: Instant,
    ) -> QueryResponse {
        let mut response = self.build_response(state, total_start.elapsed());
        response.answer = STORE_DOWN_ANSWER.to_string();
        response.confidence = 0.0;
        response.success = false;
        self.log_query(query, &response, None, response.stage_timings_ms["total"]);
        response
    }

    /// Append to the query log when one is configured.
    fn log_query(
        &self,
        query: &str,
        response: &QueryResponse,
        strategy: Option<&'static str>,
        total_ms: f64,
    ) {
        let Some(path) = &self.query_log_path else {
            return;
        };

        let entry = QueryLogEntry::new(
            query.trim(),
            response.query_type.clone(),
            strategy.map(str::to_string),
            response.confidence,
            total_ms,
            response.success,
        );
        if let Err(e) = append_query_log(path, &entry) {
            warn!(error = %e, "Query log append failed");
        }
    }
}

/// Format the source list: rank, id, code, type, relevance, preview.
fn format_sources(reranked: &[Passage], config: &AnswerConfig) -> Vec<SourceRef> {
    reranked
        .iter()
        .take(config.max_sources)
        .enumerate()
        .map(|(i, passage)| SourceRef {
            rank: i + 1,
            passage_id: passage.id.clone(),
            entry_code: passage.entry_code.clone(),
            content_type: passage.content_type.clone(),
            relevance_score: passage.relevance(),
            text_preview: truncate_chars(&passage.text, config.preview_chars),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use yarrow_db::StoredPassage;

    #[test]
    fn sources_are_capped_and_ranked() {
        let passages: Vec<Passage> = (0..15)
            .map(|i| {
                let mut p = Passage::from_stored(StoredPassage::new(
                    format!("p{i}"),
                    "some passage text",
                ));
                p.rerank_score = Some(1.0 - i as f32 * 0.05);
                p
            })
            .collect();

        let sources = format_sources(&passages, &AnswerConfig::default());
        assert_eq!(sources.len(), 10);
        assert_eq!(sources[0].rank, 1);
        assert_eq!(sources[9].rank, 10);
        assert!(sources[0].relevance_score > sources[9].relevance_score);
    }

    #[test]
    fn preview_is_truncated() {
        let long = "y".repeat(500);
        let passages = vec![Passage::from_stored(StoredPassage::new("p", long))];
        let sources = format_sources(&passages, &AnswerConfig::default());
        assert_eq!(sources[0].text_preview.chars().count(), 153);
        assert!(sources[0].text_preview.ends_with("..."));
    }
}
