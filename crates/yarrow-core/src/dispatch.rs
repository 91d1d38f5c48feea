//! Query dispatcher: coarse intent classification.
//!
//! Two passes. The rule pass tests the lowercased question against ordered
//! regex template sets; the first category whose set matches wins. When no
//! rule fires, the embedding fallback compares the question against one
//! reference embedding per remaining category and accepts the argmax only
//! above a fixed similarity threshold, defaulting to `general` otherwise.
//!
//! Classification is pure with respect to state: its only side effect is
//! the trace entries it hands back.

use std::sync::Arc;

use regex::Regex;
use tracing::{debug, warn};

use yarrow_model::EmbeddingClient;

use crate::config::ClassifierConfig;
use crate::state::QueryType;

/// Per-category keyword lists for the embedding fallback.
///
/// `entry_specific` is deliberately absent: it is a syntactic pattern, not
/// a semantic neighborhood. Enumeration order breaks ties.
const FALLBACK_CATEGORIES: &[(QueryType, &[&str])] = &[
    (
        QueryType::Divination,
        &[
            "i cast a hexagram",
            "coin toss reading",
            "advice",
            "guidance",
            "fortune",
            "what should i do",
        ],
    ),
    (
        QueryType::Philosophy,
        &[
            "philosophy",
            "yin and yang",
            "doctrine",
            "theory of change",
            "cosmology",
            "book of changes",
        ],
    ),
    (
        QueryType::General,
        &["i ching", "hexagram", "oracle", "history of divination"],
    ),
];

/// One rule category: the type it assigns and its template set.
struct RuleSet {
    query_type: QueryType,
    templates: Vec<Regex>,
}

/// Result of classification.
#[derive(Debug, Clone)]
pub struct Classification {
    /// The assigned category.
    pub query_type: QueryType,
    /// Trace entries describing which branch fired.
    pub trace: Vec<String>,
}

/// The query dispatcher.
pub struct QueryDispatcher {
    rules: Vec<RuleSet>,
    embedder: Option<Arc<dyn EmbeddingClient>>,
    accept_threshold: f32,
}

impl QueryDispatcher {
    /// Build the dispatcher, compiling the rule templates once.
    pub fn new(embedder: Option<Arc<dyn EmbeddingClient>>, config: &ClassifierConfig) -> Self {
        let compile = |patterns: &[&str]| -> Vec<Regex> {
            patterns
                .iter()
                .map(|p| Regex::new(p).expect("classifier template must compile"))
                .collect()
        };

        // Order matters: first category whose set matches wins.
        let rules = vec![
            RuleSet {
                query_type: QueryType::Divination,
                templates: compile(&[
                    r"\bi (cast|drew|threw|tossed)\b",
                    r"\b(heads|tails)\b",
                    r"\badvice\b",
                    r"\bguidance\b",
                    r"\bshould i\b",
                    r"\bmy reading\b",
                ]),
            },
            RuleSet {
                query_type: QueryType::EntrySpecific,
                templates: compile(&[r"\b(hexagram|entry)\s+\w+"]),
            },
            RuleSet {
                query_type: QueryType::Philosophy,
                templates: compile(&[
                    r"\bphilosoph",
                    r"\byin\b.*\byang\b",
                    r"\bdoctrine\b",
                    r"\bmeaning of\b",
                    r"\bhow is .+ understood\b",
                ]),
            },
        ];

        Self {
            rules,
            embedder,
            accept_threshold: config.accept_threshold,
        }
    }

    /// Classify a question.
    ///
    /// The caller guarantees a non-empty query.
    pub fn classify(&self, query: &str) -> Classification {
        let lowered = query.to_lowercase();
        let lowered = lowered.trim();

        if let Some(query_type) = self.rule_pass(lowered) {
            debug!(%query_type, "Rule-based classification");
            return Classification {
                query_type,
                trace: vec![format!("dispatch: rule matched {}", query_type)],
            };
        }

        let (query_type, detail) = self.embedding_fallback(lowered);
        Classification {
            query_type,
            trace: vec![format!("dispatch: ambiguous, {}", detail)],
        }
    }

    /// First category whose template set matches wins.
    fn rule_pass(&self, query: &str) -> Option<QueryType> {
        self.rules
            .iter()
            .find(|set| set.templates.iter().any(|t| t.is_match(query)))
            .map(|set| set.query_type)
    }

    /// Embedding fallback for ambiguous questions.
    ///
    /// One reference embedding per category (its keyword list, joined),
    /// cosine argmax against the query embedding. Below the acceptance
    /// threshold, or whenever the service misbehaves, the answer is
    /// `general`.
    fn embedding_fallback(&self, query: &str) -> (QueryType, String) {
        let Some(embedder) = &self.embedder else {
            return (
                QueryType::General,
                "no embedding service, default general".to_string(),
            );
        };

        let query_embedding = match embedder.embed(query) {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "Classifier embedding failed");
                return (
                    QueryType::General,
                    format!("embedding failed ({}), default general", e),
                );
            }
        };

        let mut best: Option<(QueryType, f32)> = None;
        for (category, keywords) in FALLBACK_CATEGORIES {
            let reference = keywords.join(" ");
            let reference_embedding = match embedder.embed(&reference) {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, category = %category, "Reference embedding failed");
                    continue;
                }
            };
            let similarity = cosine_similarity(&query_embedding, &reference_embedding);
            // Strict comparison keeps the first-enumerated category on ties.
            if best.map(|(_, s)| similarity > s).unwrap_or(true) {
                best = Some((*category, similarity));
            }
        }

        match best {
            Some((category, similarity)) if similarity > self.accept_threshold => (
                category,
                format!("embedding fallback chose {} ({:.2})", category, similarity),
            ),
            Some((_, similarity)) => (
                QueryType::General,
                format!(
                    "embedding fallback below threshold ({:.2}), default general",
                    similarity
                ),
            ),
            None => (
                QueryType::General,
                "embedding fallback unavailable, default general".to_string(),
            ),
        }
    }
}

/// Cosine similarity between two vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
