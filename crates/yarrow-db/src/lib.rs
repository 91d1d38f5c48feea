//! # yarrow-db
//!
//! Storage layer for Yarrow: the passage store the query pipeline retrieves
//! from. The store is read-only to the pipeline; records are produced by
//! the offline ingestion tooling.
//!
//! ## Main Types
//!
//! - [`PassageStore`] – trait with the four access paths the retriever uses
//!   (exact by code, vector, full-text, random sample)
//! - [`MemoryPassageStore`] – JSONL-loaded in-memory backend
//! - [`StoredPassage`] – one retrievable unit with source metadata
//! - [`DbError`] – storage error type; [`DbError::Unavailable`] is the one
//!   class the pipeline treats as fatal

pub mod error;
pub mod fts;
pub mod passage;
pub mod store;

pub use error::{DbError, DbResult};
pub use fts::{TextHit, TextIndex, TextTokenizer};
pub use passage::{SourceMetadata, StoredPassage};
pub use store::{MemoryPassageStore, PassageStore, ScoredPassage};
