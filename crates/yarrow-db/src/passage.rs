//! Stored passage records.
//!
//! A passage is one retrievable unit of the corpus: a preface section, a
//! judgment/line interpretation tied to one of the 64 hexagrams, or a
//! curated commentary. Passages are produced by the offline ingestion
//! tooling and are read-only to the query pipeline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Source attribution for a passage, including resolvable footnotes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMetadata {
    /// Title of the source document or chapter.
    #[serde(default)]
    pub title: String,

    /// Citation reference string (edition, page, line range).
    #[serde(default)]
    pub reference: String,

    /// Footnotes keyed by citation number as used in the passage text.
    ///
    /// When the generated answer cites `[n]` and this map has key `n`, the
    /// marker is replaced inline with the footnote text.
    #[serde(default)]
    pub footnotes: BTreeMap<u32, String>,
}

/// A persisted passage record.
///
/// Embeddings are attached by the ingestion tooling; records without one are
/// still reachable through exact, full-text, and random-sample access.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredPassage {
    /// Unique passage identifier.
    pub id: String,

    /// The passage text.
    pub text: String,

    /// Code of the hexagram this passage belongs to (e.g. `HEX_REVOLUTION`),
    /// if any. Preface and general commentary passages carry no code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_code: Option<String>,

    /// Free-form content tag: `preface`, `judgment`, `line`, `commentary`,
    /// `curated`.
    #[serde(default)]
    pub content_type: String,

    /// Dense embedding of the passage text, if indexed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    /// Source attribution and footnotes.
    #[serde(default)]
    pub source: SourceMetadata,
}

impl StoredPassage {
    /// Create a minimal passage with id and text.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            entry_code: None,
            content_type: String::new(),
            embedding: None,
            source: SourceMetadata::default(),
        }
    }

    /// Set the hexagram code.
    pub fn with_entry_code(mut self, code: impl Into<String>) -> Self {
        self.entry_code = Some(code.into());
        self
    }

    /// Set the content type tag.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Set the embedding.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Set the source metadata.
    pub fn with_source(mut self, source: SourceMetadata) -> Self {
        self.source = source;
        self
    }
}
