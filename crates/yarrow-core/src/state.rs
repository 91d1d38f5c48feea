//! Shared pipeline state.
//!
//! One [`ProcessingState`] value travels through the four stages. Stages do
//! not mutate in place: each consumes the state and returns a new value
//! with its own fields filled in, so the forward-only ownership of fields
//! is structural rather than a convention. The trace log is the one
//! append-anywhere field.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use yarrow_db::SourceMetadata;

/// Coarse intent category assigned by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    /// A cast result or request for guidance.
    Divination,
    /// A direct question about one named hexagram.
    EntrySpecific,
    /// Abstract-theory phrasing.
    Philosophy,
    /// Everything else.
    General,
    /// Not yet classified.
    #[default]
    Unset,
}

impl QueryType {
    /// Stable string form used in responses and traces.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Divination => "divination",
            Self::EntrySpecific => "entry_specific",
            Self::Philosophy => "philosophy",
            Self::General => "general",
            Self::Unset => "unset",
        }
    }
}

impl std::fmt::Display for QueryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pre-selected hexagram supplied by an upstream caster.
///
/// A priority hint only: the name is re-validated against the canonical
/// table before it short-circuits retrieval.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastContext {
    /// Display name of the cast hexagram.
    pub name: String,

    /// Machine code, if the caster already resolved one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// One-line summary of the cast.
    #[serde(default)]
    pub summary: String,

    /// Changing-line positions (1-based, bottom up).
    #[serde(default)]
    pub changing_lines: Vec<u8>,
}

/// One resolved sense for an overloaded term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenseResolution {
    /// The overloaded surface term.
    pub term: String,
    /// Winning sense: `entry`, `philosophy`, or `general`.
    pub sense: Sense,
    /// Normalized confidence in [0, 1].
    pub confidence: f32,
    /// Raw per-sense scores, kept for traces and tests.
    pub scores: BTreeMap<String, i32>,
}

/// The three senses an overloaded term can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sense {
    /// The term names a hexagram.
    Entry,
    /// The term is used as a philosophical concept.
    Philosophy,
    /// Ordinary usage.
    General,
}

impl Sense {
    /// Stable string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Philosophy => "philosophy",
            Self::General => "general",
        }
    }
}

/// What the linguistic resolver extracted from the question.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entities {
    /// Canonical hexagram names mentioned in the query.
    pub mentions: Vec<String>,
    /// Sense resolutions for overloaded terms present in the query.
    pub senses: Vec<SenseResolution>,
}

/// A candidate passage inside one request.
///
/// This is the pipeline's working view of a stored record; the score fields
/// are transient annotations attached during this request and never written
/// back to the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Passage {
    /// Stored passage id.
    pub id: String,
    /// Passage text.
    pub text: String,
    /// Owning hexagram code, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_code: Option<String>,
    /// Content tag (`preface`, `judgment`, `line`, `commentary`, `curated`).
    #[serde(default)]
    pub content_type: String,
    /// Similarity to the query embedding; present only when this candidate
    /// came from the vector strategy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_score: Option<f32>,
    /// Blended cross-encoder score; present only after reranking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
    /// Source attribution and footnotes.
    #[serde(default)]
    pub source: SourceMetadata,
}

impl Passage {
    /// Build the pipeline view of a stored record, unscored.
    pub fn from_stored(stored: yarrow_db::StoredPassage) -> Self {
        Self {
            id: stored.id,
            text: stored.text,
            entry_code: stored.entry_code,
            content_type: stored.content_type,
            vector_score: None,
            rerank_score: None,
            source: stored.source,
        }
    }

    /// Build the pipeline view with a vector similarity attached.
    pub fn from_scored(scored: yarrow_db::ScoredPassage) -> Self {
        let mut passage = Self::from_stored(scored.passage);
        passage.vector_score = Some(scored.score);
        passage
    }

    /// The effective relevance of this candidate.
    ///
    /// Resolution order is fixed: the rerank score when present, else the
    /// vector score, else 0.0.
    pub fn relevance(&self) -> f32 {
        self.rerank_score.or(self.vector_score).unwrap_or(0.0)
    }
}

/// The record threaded through all pipeline stages.
#[derive(Debug, Clone, Default)]
pub struct ProcessingState {
    /// The original question, immutable after construction.
    pub query: String,
    /// Optional pre-selected hexagram from an upstream caster.
    pub cast_context: Option<CastContext>,
    /// Intent category; written by the dispatcher.
    pub query_type: QueryType,
    /// Extracted entities; written by the linguistic resolver.
    pub entities: Entities,
    /// Query text augmented with synonyms and codes; defaults to `query`.
    pub expanded_query: String,
    /// Candidates; written by the retriever.
    pub retrieved: Vec<Passage>,
    /// Reordered subset of `retrieved`; written by the reasoner.
    pub reranked: Vec<Passage>,
    /// Final answer text; written by the reasoner.
    pub answer: String,
    /// Overall confidence in [0, 1]; written by the reasoner.
    pub confidence: f32,
    /// Append-only record of which branch fired in each stage.
    pub trace: Vec<String>,
    /// Per-stage wall time, in execution order.
    pub stage_timings: Vec<(String, Duration)>,
}

impl ProcessingState {
    /// Create the initial state for a question.
    pub fn new(query: impl Into<String>, cast_context: Option<CastContext>) -> Self {
        let query = query.into();
        Self {
            expanded_query: query.clone(),
            query,
            cast_context,
            ..Self::default()
        }
    }

    /// Append a trace entry.
    pub fn with_trace(mut self, entry: impl Into<String>) -> Self {
        self.trace.push(entry.into());
        self
    }

    /// Record a completed stage's wall time.
    pub fn with_timing(mut self, stage: &str, elapsed: Duration) -> Self {
        self.stage_timings.push((stage.to_string(), elapsed));
        self
    }

    /// Dispatcher output.
    pub fn with_query_type(mut self, query_type: QueryType) -> Self {
        self.query_type = query_type;
        self
    }

    /// Linguistic resolver output.
    pub fn with_resolution(mut self, entities: Entities, expanded_query: String) -> Self {
        self.entities = entities;
        self.expanded_query = expanded_query;
        self
    }

    /// Retriever output.
    pub fn with_candidates(mut self, retrieved: Vec<Passage>) -> Self {
        self.retrieved = retrieved;
        self
    }

    /// Reasoner output.
    pub fn with_answer(
        mut self,
        reranked: Vec<Passage>,
        answer: String,
        confidence: f32,
    ) -> Self {
        self.reranked = reranked;
        self.answer = answer;
        self.confidence = confidence;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_defaults_expanded_to_query() {
        let state = ProcessingState::new("a question", None);
        assert_eq!(state.expanded_query, "a question");
        assert_eq!(state.query_type, QueryType::Unset);
        assert!(state.trace.is_empty());
    }

    #[test]
    fn relevance_resolution_order() {
        let mut passage = Passage::from_stored(yarrow_db::StoredPassage::new("p", "text"));
        assert_eq!(passage.relevance(), 0.0);

        passage.vector_score = Some(0.4);
        assert_eq!(passage.relevance(), 0.4);

        passage.rerank_score = Some(0.9);
        assert_eq!(passage.relevance(), 0.9);
    }

    #[test]
    fn trace_is_append_only_through_stages() {
        let state = ProcessingState::new("q", None)
            .with_trace("first")
            .with_query_type(QueryType::General)
            .with_trace("second");
        assert_eq!(state.trace, vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn query_type_strings_are_stable() {
        assert_eq!(QueryType::EntrySpecific.as_str(), "entry_specific");
        assert_eq!(QueryType::default(), QueryType::Unset);
    }
}
