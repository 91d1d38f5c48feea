//! Passage store abstraction.
//!
//! The query pipeline consumes the store through four access paths and
//! never writes to it:
//!
//! - exact lookup by hexagram code,
//! - nearest-neighbor vector search with a similarity floor,
//! - full-text search over passage text,
//! - uniform random sampling (the retrieval floor that guarantees the
//!   cascade always produces candidates on a non-empty store).

mod memory;

pub use memory::MemoryPassageStore;

use crate::error::DbResult;
use crate::passage::StoredPassage;

/// A passage returned by a scoring access path.
#[derive(Debug, Clone)]
pub struct ScoredPassage {
    /// The matched record.
    pub passage: StoredPassage,
    /// Similarity (vector path) or relevance (text path) score.
    pub score: f32,
}

/// Read-only access to the passage corpus.
///
/// Implementations must be thread-safe; multiple pipeline instances query
/// one shared store concurrently.
pub trait PassageStore: Send + Sync {
    /// Fetch all passages tagged with the given hexagram code, up to `limit`.
    fn fetch_by_entry(&self, code: &str, limit: usize) -> DbResult<Vec<StoredPassage>>;

    /// Nearest-neighbor search against passage embeddings.
    ///
    /// Returns up to `limit` passages with cosine similarity >= `floor`,
    /// best first. Passages without embeddings are skipped.
    fn vector_search(
        &self,
        embedding: &[f32],
        limit: usize,
        floor: f32,
    ) -> DbResult<Vec<ScoredPassage>>;

    /// Full-text search over passage text, ranked by lexical relevance.
    fn text_search(&self, query: &str, limit: usize) -> DbResult<Vec<ScoredPassage>>;

    /// A uniform random sample of up to `count` passages.
    fn sample(&self, count: usize) -> DbResult<Vec<StoredPassage>>;

    /// Number of passages in the store.
    fn len(&self) -> DbResult<usize>;

    /// Whether the store holds no passages.
    fn is_empty(&self) -> DbResult<bool> {
        Ok(self.len()? == 0)
    }
}
