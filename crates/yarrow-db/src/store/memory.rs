//! In-memory passage store loaded from a JSONL file.
//!
//! Vector search is a linear scan over stored embeddings; full-text search
//! goes through the BM25 index built at load time. Suitable for the corpus
//! at hand (a few thousand passages) where a dedicated vector database
//! would be overhead.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use rand::seq::SliceRandom;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::fts::TextIndex;
use crate::passage::StoredPassage;
use crate::store::{PassageStore, ScoredPassage};

/// In-memory passage store.
pub struct MemoryPassageStore {
    passages: Vec<StoredPassage>,
    /// entry code -> indices into `passages`, in insertion order
    by_entry: HashMap<String, Vec<usize>>,
    text_index: TextIndex,
    /// Embedding dimension, fixed by the first embedded passage.
    dimension: Option<usize>,
}

impl std::fmt::Debug for MemoryPassageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPassageStore")
            .field("passages", &self.passages.len())
            .field("by_entry", &self.by_entry.len())
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl MemoryPassageStore {
    /// Build a store from passage records.
    pub fn from_passages(passages: Vec<StoredPassage>) -> Self {
        let mut by_entry: HashMap<String, Vec<usize>> = HashMap::new();
        let mut text_index = TextIndex::new();
        let mut dimension = None;

        for (idx, passage) in passages.iter().enumerate() {
            if let Some(code) = &passage.entry_code {
                by_entry.entry(code.clone()).or_default().push(idx);
            }
            text_index.add_document(&passage.text);
            if dimension.is_none() {
                dimension = passage.embedding.as_ref().map(Vec::len);
            }
        }

        info!(
            passages = passages.len(),
            entries = by_entry.len(),
            "Passage store loaded"
        );

        Self {
            passages,
            by_entry,
            text_index,
            dimension,
        }
    }

    /// Load a store from a JSONL file, one passage record per line.
    pub fn load(path: &Path) -> DbResult<Self> {
        let file = File::open(path).map_err(|e| DbError::Unavailable {
            reason: format!("cannot open passage store at `{}`: {}", path.display(), e),
        })?;
        let reader = BufReader::new(file);

        let mut passages = Vec::new();
        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| DbError::StoreIo {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let passage: StoredPassage =
                serde_json::from_str(&line).map_err(|e| DbError::StoreParse {
                    path: path.to_path_buf(),
                    line: line_num + 1,
                    message: e.to_string(),
                })?;
            passages.push(passage);
        }

        debug!(path = %path.display(), count = passages.len(), "Parsed passage file");
        Ok(Self::from_passages(passages))
    }
}

impl PassageStore for MemoryPassageStore {
    fn fetch_by_entry(&self, code: &str, limit: usize) -> DbResult<Vec<StoredPassage>> {
        let hits = self
            .by_entry
            .get(code)
            .map(|indices| {
                indices
                    .iter()
                    .take(limit)
                    .map(|&idx| self.passages[idx].clone())
                    .collect()
            })
            .unwrap_or_default();
        Ok(hits)
    }

    fn vector_search(
        &self,
        embedding: &[f32],
        limit: usize,
        floor: f32,
    ) -> DbResult<Vec<ScoredPassage>> {
        if let Some(expected) = self.dimension {
            if embedding.len() != expected {
                return Err(DbError::DimensionMismatch {
                    expected,
                    actual: embedding.len(),
                });
            }
        }

        let mut scored: Vec<(f32, &StoredPassage)> = self
            .passages
            .iter()
            .filter_map(|p| {
                p.embedding
                    .as_ref()
                    .map(|e| (cosine_similarity(embedding, e), p))
            })
            .filter(|(score, _)| *score >= floor)
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(score, passage)| ScoredPassage {
                passage: passage.clone(),
                score,
            })
            .collect())
    }

    fn text_search(&self, query: &str, limit: usize) -> DbResult<Vec<ScoredPassage>> {
        let hits = self.text_index.search(query, limit);
        Ok(hits
            .into_iter()
            .map(|hit| ScoredPassage {
                passage: self.passages[hit.doc_idx].clone(),
                score: hit.score,
            })
            .collect())
    }

    fn sample(&self, count: usize) -> DbResult<Vec<StoredPassage>> {
        let mut rng = rand::thread_rng();
        Ok(self
            .passages
            .choose_multiple(&mut rng, count.min(self.passages.len()))
            .cloned()
            .collect())
    }

    fn len(&self) -> DbResult<usize> {
        Ok(self.passages.len())
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
