//! TTL caches shared across in-flight queries.
//!
//! Retrieval is the expensive part of a request (embedding calls, vector
//! scans), so resolved results are cached per key: hexagram code for the
//! direct-lookup strategies, literal query string for the vector and
//! full-text strategies. Cached values are store-level records; the
//! per-request score annotations on [`crate::state::Passage`] are attached
//! after the cache, never inside it.
//!
//! Writes are idempotent (same key recomputes the same value), so the
//! worst concurrent-request race is a harmless duplicate fetch.

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;

use yarrow_db::StoredPassage;

/// Code-keyed cache value: passages for one hexagram.
pub type EntryList = Vec<StoredPassage>;

/// Query-keyed cache value: ranked passages with their retrieval score.
pub type ScoredList = Vec<(StoredPassage, f32)>;

/// A concurrency-safe TTL cache of retrieval results.
pub struct TtlCache<V> {
    cache: Cache<String, Arc<V>>,
}

impl<V: Send + Sync + 'static> TtlCache<V> {
    /// Create a cache with the given capacity and per-entry TTL.
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }

    /// Look up a key.
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        self.cache.get(key)
    }

    /// Insert a value under a key, returning the shared handle.
    pub fn insert(&self, key: String, value: V) -> Arc<V> {
        let value = Arc::new(value);
        self.cache.insert(key, Arc::clone(&value));
        value
    }

    /// Number of live entries.
    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all entries.
    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}
