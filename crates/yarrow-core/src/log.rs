//! Query log.
//!
//! Every processed question can be appended to a JSONL log for later
//! inspection: what was asked, how it was classified, which retrieval
//! strategy answered, and with what confidence. Logging is optional and
//! never blocks a response; write failures are reported to the caller and
//! can be ignored there.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::PipelineError;

/// One processed question.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryLogEntry {
    /// Unique id of this log entry.
    pub id: Uuid,

    /// When the question finished processing.
    pub timestamp: DateTime<Utc>,

    /// The original question.
    pub query: String,

    /// Assigned query type.
    pub query_type: String,

    /// The retrieval strategy that produced the candidates, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,

    /// Final blended confidence.
    pub confidence: f32,

    /// End-to-end wall time in milliseconds.
    pub duration_ms: f64,

    /// Whether the pipeline produced a non-empty answer.
    pub success: bool,
}

impl QueryLogEntry {
    /// Create an entry stamped now.
    pub fn new(
        query: impl Into<String>,
        query_type: impl Into<String>,
        strategy: Option<String>,
        confidence: f32,
        duration_ms: f64,
        success: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            query: query.into(),
            query_type: query_type.into(),
            strategy,
            confidence,
            duration_ms,
            success,
        }
    }
}

/// Append one entry to the JSONL query log, creating parents as needed.
pub fn append_query_log(path: &Path, entry: &QueryLogEntry) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| PipelineError::LogWrite(e.to_string()))?;
    }

    let line =
        serde_json::to_string(entry).map_err(|e| PipelineError::LogWrite(e.to_string()))?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| PipelineError::LogWrite(e.to_string()))?;
    writeln!(file, "{}", line).map_err(|e| PipelineError::LogWrite(e.to_string()))?;
    Ok(())
}

/// Read back all entries from a query log.
pub fn read_query_log(path: &Path) -> Result<Vec<QueryLogEntry>, PipelineError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let raw = fs::read_to_string(path)?;
    let mut entries = Vec::new();
    for line in raw.lines() {
        if line.trim().is_empty() {
            continue;
        }
        entries.push(serde_json::from_str(line)?);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("asks").join("log.jsonl");

        let entry = QueryLogEntry::new(
            "hexagram Peace meaning?",
            "entry_specific",
            Some("concept".to_string()),
            0.8,
            42.5,
            true,
        );
        append_query_log(&path, &entry).unwrap();
        append_query_log(&path, &entry).unwrap();

        let entries = read_query_log(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].query, "hexagram Peace meaning?");
        assert_eq!(entries[0].strategy.as_deref(), Some("concept"));
    }

    #[test]
    fn missing_log_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let entries = read_query_log(&dir.path().join("absent.jsonl")).unwrap();
        assert!(entries.is_empty());
    }
}
