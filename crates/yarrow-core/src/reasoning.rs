//! Reasoner: reranking, generation, citation handling, confidence.
//!
//! The last pipeline stage. Reranks the retrieved candidates with the
//! cross-encoder when one is available, assembles the cited prompt, calls
//! the generation service, post-processes citations, and blends the final
//! confidence. No failure escapes this stage: an empty candidate set or a
//! broken generation service both degrade to a fixed apology answer.

use std::sync::Arc;

use regex::{Captures, Regex};
use tracing::{debug, warn};

use yarrow_model::{GenerationClient, RelevanceClient};

use crate::config::ReasoningConfig;
use crate::prompt;
use crate::state::{CastContext, Passage, QueryType};

/// Answer used when retrieval produced no candidates at all.
pub const NO_RESULTS_ANSWER: &str =
    "I could not find any passages relevant to your question. Please try rephrasing it.";

/// Answer used when the generation service fails.
pub const GENERATION_FAILED_ANSWER: &str =
    "I apologize - something went wrong while composing the answer. Please try again.";

/// Confidence attached to both apology answers.
pub const FALLBACK_CONFIDENCE: f32 = 0.1;

/// One bracketed citation found in the generated answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Citation {
    /// The number as written in the answer, 1-based.
    pub number: u32,
    /// Index into the reranked candidates (`number - 1`), when valid.
    pub target_index: Option<usize>,
    /// Whether the number falls inside the reranked-candidate range.
    pub valid: bool,
    /// Footnote text substituted for the marker, when the target passage
    /// stores one under this number.
    pub resolved_footnote: Option<String>,
}

/// Outcome of the reasoning stage.
#[derive(Debug, Clone)]
pub struct ReasoningOutcome {
    /// Reranked candidates actually used for the answer.
    pub reranked: Vec<Passage>,
    /// The final answer text, citations resolved.
    pub answer: String,
    /// Blended confidence in [0, 1].
    pub confidence: f32,
    /// Citations found in the raw answer.
    pub citations: Vec<Citation>,
    /// Trace entries for this stage.
    pub trace: Vec<String>,
}

/// The reasoner.
pub struct Reasoner {
    relevance: Option<Arc<dyn RelevanceClient>>,
    generator: Arc<dyn GenerationClient>,
    config: ReasoningConfig,
    citation_pattern: Regex,
}

impl Reasoner {
    /// Build a reasoner over the generation service and an optional
    /// cross-encoder.
    pub fn new(
        relevance: Option<Arc<dyn RelevanceClient>>,
        generator: Arc<dyn GenerationClient>,
        config: ReasoningConfig,
    ) -> Self {
        Self {
            relevance,
            generator,
            config,
            citation_pattern: Regex::new(r"\[(\d+)\]").expect("citation pattern must compile"),
        }
    }

    /// Run the stage.
    pub fn reason(
        &self,
        query: &str,
        query_type: QueryType,
        candidates: Vec<Passage>,
        cast_context: Option<&CastContext>,
    ) -> ReasoningOutcome {
        if candidates.is_empty() {
            return ReasoningOutcome {
                reranked: Vec::new(),
                answer: NO_RESULTS_ANSWER.to_string(),
                confidence: FALLBACK_CONFIDENCE,
                citations: Vec::new(),
                trace: vec!["reasoning: no candidates, apology answer".to_string()],
            };
        }

        let mut trace = Vec::new();
        let retrieved_count = candidates.len();
        let reranked = self.rerank(query, candidates, &mut trace);
        trace.push(format!(
            "reasoning: reranked {} -> {} candidates",
            retrieved_count,
            reranked.len()
        ));

        let prompt_text =
            prompt::build_prompt(query, query_type, &reranked, cast_context, &self.config);

        match self.generator.generate(&prompt_text) {
            Ok(output) => {
                let (answer, citations) = self.process_citations(&output.text, &reranked);
                let confidence = compute_confidence(&reranked, &citations, output.confidence);
                trace.push(format!(
                    "reasoning: answer generated, {} citation(s), confidence {:.2}",
                    citations.len(),
                    confidence
                ));
                ReasoningOutcome {
                    reranked,
                    answer,
                    confidence,
                    citations,
                    trace,
                }
            }
            Err(e) => {
                warn!(error = %e, "Generation failed");
                trace.push(format!("reasoning: generation failed ({}), apology answer", e));
                ReasoningOutcome {
                    reranked,
                    answer: GENERATION_FAILED_ANSWER.to_string(),
                    confidence: FALLBACK_CONFIDENCE,
                    citations: Vec::new(),
                    trace,
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Reranking
    // ------------------------------------------------------------------

    /// Cross-encoder reranking with score blending.
    ///
    /// `combined = cross_weight * cross + vector_weight * vector_score`,
    /// where a candidate from a non-vector strategy contributes 0 for the
    /// vector term. Without a relevance client, or with a single
    /// candidate, the first `final_k` pass through unchanged.
    fn rerank(&self, query: &str, mut candidates: Vec<Passage>, trace: &mut Vec<String>) -> Vec<Passage> {
        let Some(relevance) = &self.relevance else {
            candidates.truncate(self.config.final_k);
            return candidates;
        };
        if candidates.len() <= 1 {
            candidates.truncate(self.config.final_k);
            return candidates;
        }

        let prefixes: Vec<String> = candidates
            .iter()
            .map(|p| prefix_chars(&p.text, self.config.rerank_prefix_chars))
            .collect();

        let cross_scores = match relevance.score_batch(query, &prefixes) {
            Ok(scores) => scores,
            Err(e) => {
                warn!(error = %e, "Cross-encoder failed, keeping retrieval order");
                trace.push(format!(
                    "reasoning: cross-encoder failed ({}), keeping retrieval order",
                    e
                ));
                candidates.truncate(self.config.final_k);
                return candidates;
            }
        };

        for (passage, cross) in candidates.iter_mut().zip(cross_scores) {
            let vector = passage.vector_score.unwrap_or(0.0);
            passage.rerank_score =
                Some(self.config.cross_weight * cross + self.config.vector_weight * vector);
        }

        candidates.sort_by(|a, b| {
            b.relevance()
                .partial_cmp(&a.relevance())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(self.config.final_k);
        debug!(kept = candidates.len(), "Reranking complete");
        candidates
    }

    // ------------------------------------------------------------------
    // Citations
    // ------------------------------------------------------------------

    /// Verify and resolve `[n]` markers in the generated answer.
    ///
    /// An in-range marker whose target passage stores footnote `n` is
    /// replaced inline with the footnote text. Out-of-range markers are
    /// left byte-identical so a reader can see the unresolved reference.
    fn process_citations(&self, answer: &str, reranked: &[Passage]) -> (String, Vec<Citation>) {
        let mut citations: Vec<Citation> = Vec::new();

        let resolved = self.citation_pattern.replace_all(answer, |caps: &Captures| {
            let raw = caps.get(0).map(|m| m.as_str().to_string()).unwrap_or_default();
            let Ok(number) = caps[1].parse::<u32>() else {
                citations.push(Citation {
                    number: 0,
                    target_index: None,
                    valid: false,
                    resolved_footnote: None,
                });
                return raw;
            };

            let in_range = number >= 1 && (number as usize) <= reranked.len();
            if !in_range {
                citations.push(Citation {
                    number,
                    target_index: None,
                    valid: false,
                    resolved_footnote: None,
                });
                return raw;
            }

            let target_index = (number - 1) as usize;
            let footnote = reranked[target_index].source.footnotes.get(&number).cloned();
            citations.push(Citation {
                number,
                target_index: Some(target_index),
                valid: true,
                resolved_footnote: footnote.clone(),
            });

            match footnote {
                Some(note) => format!(" ({}) ", note),
                None => raw,
            }
        });

        (resolved.into_owned(), citations)
    }
}

/// Blend the final confidence:
/// `0.4 * mean candidate relevance + 0.3 * valid-citation ratio + 0.3 *
/// generation confidence`, clamped to [0, 1]. The citation term is 0 when
/// the answer carries no citations at all.
pub fn compute_confidence(
    reranked: &[Passage],
    citations: &[Citation],
    generation_confidence: f32,
) -> f32 {
    let mean_relevance = if reranked.is_empty() {
        0.0
    } else {
        reranked.iter().map(Passage::relevance).sum::<f32>() / reranked.len() as f32
    };

    let citation_ratio = if citations.is_empty() {
        0.0
    } else {
        citations.iter().filter(|c| c.valid).count() as f32 / citations.len() as f32
    };

    let blended = 0.4 * mean_relevance + 0.3 * citation_ratio + 0.3 * generation_confidence;
    blended.clamp(0.0, 1.0)
}

/// First `max_chars` characters of a text, on char boundaries.
fn prefix_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
