//! Full-text search over passage text.
//!
//! A small BM25 inverted index built in memory when the store loads.
//! Scoring uses the Okapi formula with smoothed IDF:
//!
//! ```text
//! score(D, Q) = Σ IDF(q_i) * (tf * (k1 + 1)) / (tf + k1 * (1 - b + b * |D| / avgdl))
//! ```

use std::collections::{HashMap, HashSet};

use rust_stemmers::{Algorithm, Stemmer};
use unicode_segmentation::UnicodeSegmentation;

/// Term-frequency saturation parameter.
const K1: f32 = 1.2;

/// Document-length normalization parameter.
const B: f32 = 0.75;

/// Minimum token length kept by the tokenizer.
const MIN_TOKEN_LENGTH: usize = 2;

/// A scored full-text hit.
#[derive(Debug, Clone)]
pub struct TextHit {
    /// Index of the document as it was added to the index.
    pub doc_idx: usize,
    /// BM25 relevance score.
    pub score: f32,
}

/// Tokenizer for passage text: unicode word segmentation, case folding,
/// stop-word removal, English stemming.
pub struct TextTokenizer {
    stemmer: Stemmer,
    stopwords: HashSet<&'static str>,
}

impl TextTokenizer {
    /// Create a tokenizer with the corpus stop-word list.
    pub fn new() -> Self {
        Self {
            stemmer: Stemmer::create(Algorithm::English),
            stopwords: corpus_stopwords(),
        }
    }

    /// Tokenize text into processed terms.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.unicode_words()
            .filter_map(|word| self.process(word))
            .collect()
    }

    fn process(&self, word: &str) -> Option<String> {
        let lower = word.to_lowercase();
        if !lower.chars().any(|c| c.is_alphabetic()) {
            return None;
        }
        if lower.len() < MIN_TOKEN_LENGTH {
            return None;
        }
        if self.stopwords.contains(lower.as_str()) {
            return None;
        }
        let token = self.stemmer.stem(&lower).to_string();
        if token.len() < MIN_TOKEN_LENGTH {
            return None;
        }
        Some(token)
    }
}

impl Default for TextTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Stop words tuned for question-answering over this corpus.
///
/// Includes the query boilerplate words ("hexagram", "entry", "meaning")
/// that appear in nearly every question and carry no ranking signal.
fn corpus_stopwords() -> HashSet<&'static str> {
    [
        // Articles, prepositions, conjunctions
        "a", "an", "the", "in", "on", "at", "to", "of", "with", "by", "from", "as", "into",
        "through", "during", "before", "after", "above", "below", "between", "under", "over",
        "and", "or", "but", "nor", "so", "yet",
        // Pronouns and question words
        "i", "you", "he", "she", "it", "we", "they", "me", "my", "your", "his", "her", "its",
        "our", "their", "this", "that", "these", "those", "which", "who", "what", "where",
        "when", "how", "why",
        // Auxiliaries
        "is", "are", "was", "were", "be", "been", "being", "have", "has", "had", "do", "does",
        "did", "will", "would", "could", "should", "may", "might", "must", "can", "shall",
        // Query boilerplate for this corpus
        "hexagram", "entry", "meaning", "mean", "tell", "about", "please",
    ]
    .into_iter()
    .collect()
}

/// Posting entry: document index and term frequency.
#[derive(Debug, Clone)]
struct Posting {
    doc_idx: usize,
    term_freq: usize,
}

/// In-memory BM25 inverted index over passage text.
pub struct TextIndex {
    tokenizer: TextTokenizer,
    /// term -> (document frequency, postings)
    inverted: HashMap<String, (usize, Vec<Posting>)>,
    /// token length per document, indexed by doc_idx
    doc_lengths: Vec<usize>,
    total_tokens: usize,
}

impl TextIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self {
            tokenizer: TextTokenizer::new(),
            inverted: HashMap::new(),
            doc_lengths: Vec::new(),
            total_tokens: 0,
        }
    }

    /// Add a document; its index is the number of documents added before it.
    pub fn add_document(&mut self, text: &str) -> usize {
        let tokens = self.tokenizer.tokenize(text);
        let doc_len = tokens.len();

        let mut term_freqs: HashMap<String, usize> = HashMap::new();
        for token in tokens {
            *term_freqs.entry(token).or_insert(0) += 1;
        }

        let doc_idx = self.doc_lengths.len();
        self.doc_lengths.push(doc_len);
        self.total_tokens += doc_len;

        for (term, tf) in term_freqs {
            let entry = self.inverted.entry(term).or_insert((0, Vec::new()));
            entry.0 += 1;
            entry.1.push(Posting {
                doc_idx,
                term_freq: tf,
            });
        }

        doc_idx
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.doc_lengths.len()
    }

    /// Whether the index holds no documents.
    pub fn is_empty(&self) -> bool {
        self.doc_lengths.is_empty()
    }

    /// Search the index, returning up to `limit` hits sorted by score.
    pub fn search(&self, query: &str, limit: usize) -> Vec<TextHit> {
        if self.doc_lengths.is_empty() {
            return Vec::new();
        }

        let query_tokens = self.tokenizer.tokenize(query);
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let num_docs = self.doc_lengths.len();
        let avg_doc_len = self.total_tokens as f32 / num_docs as f32;

        let mut scores: HashMap<usize, f32> = HashMap::new();
        for term in &query_tokens {
            if let Some((df, postings)) = self.inverted.get(term) {
                let idf = smoothed_idf(num_docs, *df);
                for posting in postings {
                    let contribution = term_score(
                        posting.term_freq,
                        self.doc_lengths[posting.doc_idx],
                        avg_doc_len,
                        idf,
                    );
                    *scores.entry(posting.doc_idx).or_insert(0.0) += contribution;
                }
            }
        }

        let mut hits: Vec<TextHit> = scores
            .into_iter()
            .map(|(doc_idx, score)| TextHit { doc_idx, score })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        hits
    }
}

impl Default for TextIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Smoothed IDF: `ln((N - df + 0.5) / (df + 0.5) + 1)`, always positive.
#[inline]
fn smoothed_idf(num_docs: usize, doc_freq: usize) -> f32 {
    let n = num_docs as f32;
    let df = doc_freq as f32;
    ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
}

/// BM25 score contribution of one term.
#[inline]
fn term_score(term_freq: usize, doc_len: usize, avg_doc_len: f32, idf: f32) -> f32 {
    let tf = term_freq as f32;
    let dl = doc_len as f32;
    idf * (tf * (K1 + 1.0)) / (tf + K1 * (1.0 - B + B * dl / avg_doc_len))
}
