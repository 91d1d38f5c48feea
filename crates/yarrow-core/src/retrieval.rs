//! Cascading retriever.
//!
//! Six strategies in strict priority order; the first non-empty result
//! short-circuits the rest. The order exists to keep costly calls
//! (embedding, vector scan) behind the cheap direct lookups:
//!
//! 1. cast-context priority lookup (pre-selected hexagram from upstream),
//! 2. concept-lexicon lookup (exact substring, then fuzzy),
//! 3. explicit-entity lookup (classifier verdict or detected mentions),
//! 4. vector similarity search over the expanded query,
//! 5. full-text search,
//! 6. uniform random sample - the unconditional floor.
//!
//! The retriever never fails on "no results". The only fatal outcome is a
//! store-connectivity failure on the cascade's first store access; once
//! any strategy has reached the store, later failures degrade with a trace
//! entry.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use yarrow_db::{DbResult, PassageStore};
use yarrow_model::EmbeddingClient;

use crate::cache::{EntryList, ScoredList, TtlCache};
use crate::config::RetrievalConfig;
use crate::errors::PipelineError;
use crate::hexagrams;
use crate::lexicon::ConceptLexicon;
use crate::state::{CastContext, Entities, Passage, QueryType};

/// Outcome of one retrieval pass.
#[derive(Debug, Clone)]
pub struct RetrievalOutcome {
    /// Ranked candidates; empty only when the store itself is empty.
    pub candidates: Vec<Passage>,
    /// Name of the strategy that produced the candidates, if any.
    pub strategy: Option<&'static str>,
    /// Trace entries for every branch taken.
    pub trace: Vec<String>,
}

/// The cascading retriever.
pub struct CascadingRetriever {
    store: Arc<dyn PassageStore>,
    embedder: Option<Arc<dyn EmbeddingClient>>,
    lexicon: ConceptLexicon,
    entry_cache: TtlCache<EntryList>,
    semantic_cache: TtlCache<ScoredList>,
    text_cache: TtlCache<EntryList>,
    config: RetrievalConfig,
}

impl CascadingRetriever {
    /// Build a retriever over a store and an optional embedding client.
    pub fn new(
        store: Arc<dyn PassageStore>,
        embedder: Option<Arc<dyn EmbeddingClient>>,
        config: RetrievalConfig,
    ) -> Self {
        let entry_cache = TtlCache::new(
            config.entry_cache_capacity,
            Duration::from_secs(config.entry_cache_ttl_secs),
        );
        let semantic_cache = TtlCache::new(
            config.query_cache_capacity,
            Duration::from_secs(config.query_cache_ttl_secs),
        );
        let text_cache = TtlCache::new(
            config.query_cache_capacity,
            Duration::from_secs(config.query_cache_ttl_secs),
        );

        Self {
            store,
            embedder,
            lexicon: ConceptLexicon::new(),
            entry_cache,
            semantic_cache,
            text_cache,
            config,
        }
    }

    /// Run the cascade.
    ///
    /// `query` is the raw question (used for explicit-entity detection),
    /// `expanded_query` the resolver's augmented text (used everywhere
    /// else).
    pub fn retrieve(
        &self,
        query: &str,
        expanded_query: &str,
        entities: &Entities,
        query_type: QueryType,
        cast_context: Option<&CastContext>,
    ) -> Result<RetrievalOutcome, PipelineError> {
        let mut trace: Vec<String> = Vec::new();
        let mut store_touched = false;

        // 1. Cast-context priority lookup.
        if let Some(context) = cast_context {
            if let Some(outcome) =
                self.strategy_cast_context(context, &mut trace, &mut store_touched)?
            {
                return Ok(outcome.with_trace(trace));
            }
        }

        // 2. Concept-lexicon lookup, exact then fuzzy.
        if let Some(outcome) =
            self.strategy_lexicon(expanded_query, &mut trace, &mut store_touched)?
        {
            return Ok(outcome.with_trace(trace));
        }

        // 3. Explicit-entity lookup.
        if query_type == QueryType::EntrySpecific || !entities.mentions.is_empty() {
            if let Some(outcome) =
                self.strategy_explicit(query, entities, &mut trace, &mut store_touched)?
            {
                return Ok(outcome.with_trace(trace));
            }
        }

        // 4. Vector similarity search.
        if let Some(outcome) =
            self.strategy_vector(expanded_query, &mut trace, &mut store_touched)?
        {
            return Ok(outcome.with_trace(trace));
        }

        // 5. Full-text search.
        if let Some(outcome) = self.strategy_text(expanded_query, &mut trace, &mut store_touched)? {
            return Ok(outcome.with_trace(trace));
        }

        // 6. Uniform random sample.
        self.strategy_sample(&mut trace, &mut store_touched)
            .map(|outcome| outcome.with_trace(trace))
    }

    // ------------------------------------------------------------------
    // Strategies
    // ------------------------------------------------------------------

    /// Strategy 1: the caster already picked a hexagram; validate its name
    /// against the canonical table and fetch directly.
    fn strategy_cast_context(
        &self,
        context: &CastContext,
        trace: &mut Vec<String>,
        store_touched: &mut bool,
    ) -> Result<Option<RetrievalOutcome>, PipelineError> {
        let name = context.name.trim();
        if name.is_empty() {
            return Ok(None);
        }

        let Some(code) = hexagrams::name_to_code(name) else {
            trace.push(format!(
                "retrieval: cast context name `{}` not canonical, falling through",
                name
            ));
            return Ok(None);
        };

        let passages = self.entry_lookup(code, "cast_context", trace, store_touched)?;
        if passages.is_empty() {
            return Ok(None);
        }

        trace.push(format!(
            "retrieval: cast_context {} -> {} ({} passages)",
            name,
            code,
            passages.len()
        ));
        Ok(Some(RetrievalOutcome {
            candidates: passages,
            strategy: Some("cast_context"),
            trace: Vec::new(),
        }))
    }

    /// Strategy 2: exact keyword substring against the concept lexicon,
    /// then a fuzzy partial-similarity match of the whole query.
    fn strategy_lexicon(
        &self,
        expanded_query: &str,
        trace: &mut Vec<String>,
        store_touched: &mut bool,
    ) -> Result<Option<RetrievalOutcome>, PipelineError> {
        let resolved = if let Some(entry) = self.lexicon.lookup_exact(expanded_query) {
            Some((entry.keyword, entry.code, None))
        } else {
            self.lexicon
                .lookup_fuzzy(expanded_query, self.config.fuzzy_threshold)
                .map(|m| (m.keyword, m.code, Some(m.score)))
        };

        let Some((keyword, code, fuzzy_score)) = resolved else {
            return Ok(None);
        };

        let passages = self.entry_lookup(code, "concept", trace, store_touched)?;
        if passages.is_empty() {
            return Ok(None);
        }

        match fuzzy_score {
            Some(score) => trace.push(format!(
                "retrieval: concept fuzzy `{}` ({:.0}) -> {} ({} passages)",
                keyword,
                score,
                code,
                passages.len()
            )),
            None => trace.push(format!(
                "retrieval: concept `{}` -> {} ({} passages)",
                keyword,
                code,
                passages.len()
            )),
        }

        Ok(Some(RetrievalOutcome {
            candidates: passages,
            strategy: Some("concept"),
            trace: Vec::new(),
        }))
    }

    /// Strategy 3: direct name detection on the raw query, then on each
    /// detected mention string in turn.
    fn strategy_explicit(
        &self,
        query: &str,
        entities: &Entities,
        trace: &mut Vec<String>,
        store_touched: &mut bool,
    ) -> Result<Option<RetrievalOutcome>, PipelineError> {
        let mut code = hexagrams::detect_hexagram(query);
        if code.is_none() {
            for mention in &entities.mentions {
                code = hexagrams::detect_hexagram(mention);
                if code.is_some() {
                    break;
                }
            }
        }

        let Some(code) = code else {
            return Ok(None);
        };

        let passages = self.entry_lookup(code, "explicit", trace, store_touched)?;
        if passages.is_empty() {
            return Ok(None);
        }

        trace.push(format!(
            "retrieval: explicit entity -> {} ({} passages)",
            code,
            passages.len()
        ));
        Ok(Some(RetrievalOutcome {
            candidates: passages,
            strategy: Some("explicit"),
            trace: Vec::new(),
        }))
    }

    /// Strategy 4: embed the expanded query and scan the vector index with
    /// oversampling; the similarity floor is applied by the store.
    fn strategy_vector(
        &self,
        expanded_query: &str,
        trace: &mut Vec<String>,
        store_touched: &mut bool,
    ) -> Result<Option<RetrievalOutcome>, PipelineError> {
        // Cache hit bypasses both the embedding call and the store scan.
        if let Some(cached) = self.semantic_cache.get(expanded_query) {
            if cached.is_empty() {
                return Ok(None);
            }
            trace.push(format!(
                "retrieval: vector (cached, {} passages)",
                cached.len()
            ));
            let candidates = cached
                .iter()
                .map(|(stored, score)| {
                    let mut passage = Passage::from_stored(stored.clone());
                    passage.vector_score = Some(*score);
                    passage
                })
                .collect();
            return Ok(Some(RetrievalOutcome {
                candidates,
                strategy: Some("vector"),
                trace: Vec::new(),
            }));
        }

        let Some(embedder) = &self.embedder else {
            trace.push("retrieval: vector skipped, no embedding service".to_string());
            return Ok(None);
        };

        let embedding = match embedder.embed(expanded_query) {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "Query embedding failed");
                trace.push(format!("retrieval: vector failed ({}), continuing", e));
                return Ok(None);
            }
        };

        let oversampled = self.config.top_k * self.config.oversample;
        let result = self.guard_store(
            self.store
                .vector_search(&embedding, oversampled, self.config.similarity_floor),
            "vector",
            trace,
            store_touched,
        )?;
        let Some(hits) = result else {
            return Ok(None);
        };

        let scored: ScoredList = hits
            .into_iter()
            .take(self.config.top_k)
            .map(|s| (s.passage, s.score))
            .collect();
        self.semantic_cache
            .insert(expanded_query.to_string(), scored.clone());

        if scored.is_empty() {
            return Ok(None);
        }

        trace.push(format!("retrieval: vector ({} passages)", scored.len()));
        let candidates = scored
            .into_iter()
            .map(|(stored, score)| {
                let mut passage = Passage::from_stored(stored);
                passage.vector_score = Some(score);
                passage
            })
            .collect();
        Ok(Some(RetrievalOutcome {
            candidates,
            strategy: Some("vector"),
            trace: Vec::new(),
        }))
    }

    /// Strategy 5: full-text relevance search over passage text.
    fn strategy_text(
        &self,
        expanded_query: &str,
        trace: &mut Vec<String>,
        store_touched: &mut bool,
    ) -> Result<Option<RetrievalOutcome>, PipelineError> {
        if let Some(cached) = self.text_cache.get(expanded_query) {
            if cached.is_empty() {
                return Ok(None);
            }
            trace.push(format!("retrieval: text (cached, {} passages)", cached.len()));
            let candidates = cached
                .iter()
                .cloned()
                .map(Passage::from_stored)
                .collect();
            return Ok(Some(RetrievalOutcome {
                candidates,
                strategy: Some("text"),
                trace: Vec::new(),
            }));
        }

        let result = self.guard_store(
            self.store.text_search(expanded_query, self.config.top_k),
            "text",
            trace,
            store_touched,
        )?;
        let Some(hits) = result else {
            return Ok(None);
        };

        // The lexical score ranks candidates but is not carried on the
        // passage; only vector similarity participates in the rerank blend.
        let ranked: EntryList = hits.into_iter().map(|s| s.passage).collect();
        self.text_cache
            .insert(expanded_query.to_string(), ranked.clone());

        if ranked.is_empty() {
            return Ok(None);
        }

        trace.push(format!("retrieval: text ({} passages)", ranked.len()));
        let candidates = ranked.into_iter().map(Passage::from_stored).collect();
        Ok(Some(RetrievalOutcome {
            candidates,
            strategy: Some("text"),
            trace: Vec::new(),
        }))
    }

    /// Strategy 6: the floor. A small uniform sample, returned whatever it
    /// holds; an empty result here means the store itself is empty.
    fn strategy_sample(
        &self,
        trace: &mut Vec<String>,
        store_touched: &mut bool,
    ) -> Result<RetrievalOutcome, PipelineError> {
        let size = self.config.sample_size.min(self.config.top_k);
        let result = self.guard_store(self.store.sample(size), "sample", trace, store_touched)?;

        let passages = result.unwrap_or_default();
        if passages.is_empty() {
            trace.push("retrieval: store empty, no candidates".to_string());
            return Ok(RetrievalOutcome {
                candidates: Vec::new(),
                strategy: None,
                trace: Vec::new(),
            });
        }

        trace.push(format!(
            "retrieval: no-match, random sample ({} passages)",
            passages.len()
        ));
        Ok(RetrievalOutcome {
            candidates: passages.into_iter().map(Passage::from_stored).collect(),
            strategy: Some("sample"),
            trace: Vec::new(),
        })
    }

    // ------------------------------------------------------------------
    // Store access helpers
    // ------------------------------------------------------------------

    /// Code-keyed fetch through the entry cache.
    fn entry_lookup(
        &self,
        code: &str,
        strategy: &'static str,
        trace: &mut Vec<String>,
        store_touched: &mut bool,
    ) -> Result<Vec<Passage>, PipelineError> {
        if let Some(cached) = self.entry_cache.get(code) {
            debug!(code, "Entry cache hit");
            return Ok(cached.iter().cloned().map(Passage::from_stored).collect());
        }

        let result = self.guard_store(
            self.store.fetch_by_entry(code, self.config.top_k),
            strategy,
            trace,
            store_touched,
        )?;
        let Some(passages) = result else {
            return Ok(Vec::new());
        };

        let cached = self.entry_cache.insert(code.to_string(), passages);
        Ok(cached.iter().cloned().map(Passage::from_stored).collect())
    }

    /// Apply the failure policy to one store call.
    ///
    /// A connectivity failure on the cascade's first store access is
    /// fatal; anything later, or any non-connectivity error, degrades to
    /// `None` with a trace entry.
    fn guard_store<T>(
        &self,
        result: DbResult<T>,
        strategy: &'static str,
        trace: &mut Vec<String>,
        store_touched: &mut bool,
    ) -> Result<Option<T>, PipelineError> {
        let first_access = !*store_touched;
        *store_touched = true;

        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_connectivity() && first_access => {
                Err(PipelineError::StoreUnavailable {
                    reason: e.to_string(),
                })
            }
            Err(e) => {
                warn!(strategy, error = %e, "Store access failed, degrading");
                trace.push(format!("retrieval: {} failed ({}), continuing", strategy, e));
                Ok(None)
            }
        }
    }
}

impl RetrievalOutcome {
    fn with_trace(mut self, trace: Vec<String>) -> Self {
        self.trace = trace;
        self
    }
}
