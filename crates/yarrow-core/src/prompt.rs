//! Prompt assembly for the generation service.
//!
//! A numbered context block of reranked passages, an optional block for a
//! cast hexagram, and one of three hand-authored templates keyed by query
//! type. Every template demands bracketed source numbers and forbids facts
//! from outside the context block; citation post-processing depends on the
//! generation service honoring the numbering.

use crate::config::ReasoningConfig;
use crate::hexagrams;
use crate::state::{CastContext, Passage, QueryType};

/// Build the numbered context block from the top reranked passages.
pub fn build_context_block(passages: &[Passage], config: &ReasoningConfig) -> String {
    let mut entries: Vec<String> = Vec::new();

    for (i, passage) in passages.iter().take(config.context_passages).enumerate() {
        let mut entry = format!("[{}] ", i + 1);
        if let Some(code) = &passage.entry_code {
            let name = hexagrams::by_code(code).map(|h| h.name).unwrap_or(code);
            entry.push_str(&format!("Hexagram {} - ", name));
        }
        if !passage.content_type.is_empty() {
            entry.push_str(&format!("({}) ", passage.content_type));
        }
        entry.push_str(&truncate_chars(&passage.text, config.context_chars));
        entries.push(entry);
    }

    entries.join("\n\n")
}

/// Build the block describing a pre-selected cast hexagram, if any.
pub fn build_cast_block(cast_context: Option<&CastContext>) -> String {
    let Some(context) = cast_context else {
        return String::new();
    };
    if context.name.trim().is_empty() {
        return String::new();
    }

    let mut block = String::from("CAST HEXAGRAM:\n");
    block.push_str(&format!("- Name: {}\n", context.name));
    if let Some(code) = &context.code {
        block.push_str(&format!("- Code: {}\n", code));
    }
    if !context.summary.is_empty() {
        block.push_str(&format!("- Summary: {}\n", context.summary));
    }
    if !context.changing_lines.is_empty() {
        let lines: Vec<String> = context
            .changing_lines
            .iter()
            .map(|l| l.to_string())
            .collect();
        block.push_str(&format!("- Changing lines: {}\n", lines.join(", ")));
    }
    block.push('\n');
    block
}

/// Assemble the full prompt for a query.
pub fn build_prompt(
    query: &str,
    query_type: QueryType,
    passages: &[Passage],
    cast_context: Option<&CastContext>,
    config: &ReasoningConfig,
) -> String {
    let context = build_context_block(passages, config);
    let cast_block = build_cast_block(cast_context);

    match query_type {
        QueryType::Divination => format!(
            "You are a seasoned consultant of the I Ching with deep practical experience.\n\n\
             CASTING QUESTION: \"{query}\"\n\n\
             {cast_block}\
             REFERENCE PASSAGES:\n{context}\n\n\
             INSTRUCTIONS:\n\
             - Interpret the hexagram in the light of the asker's situation\n\
             - Ground every factual claim with its bracketed source number [n]\n\
             - Do not introduce facts absent from the reference passages\n\
             - Close with practical, actionable advice\n\n\
             ANSWER:"
        ),
        QueryType::Philosophy => format!(
            "You are a scholar of the Book of Changes.\n\n\
             PHILOSOPHICAL QUESTION: \"{query}\"\n\n\
             {cast_block}\
             REFERENCE PASSAGES:\n{context}\n\n\
             INSTRUCTIONS:\n\
             - Explain the underlying principle in depth\n\
             - Connect it to the broader system of the sixty-four figures\n\
             - Ground every factual claim with its bracketed source number [n]\n\
             - Do not introduce facts absent from the reference passages\n\n\
             ANSWER:"
        ),
        _ => format!(
            "You are an expert on the I Ching.\n\n\
             QUESTION: \"{query}\"\n\n\
             {cast_block}\
             REFERENCE PASSAGES:\n{context}\n\n\
             INSTRUCTIONS:\n\
             - Answer precisely from the reference passages\n\
             - Ground every factual claim with its bracketed source number [n]\n\
             - Do not introduce facts absent from the reference passages\n\
             - Keep the explanation clear and accessible\n\n\
             ANSWER:"
        ),
    }
}

/// Truncate to at most `max_chars` characters, appending an ellipsis when
/// anything was cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;
    use yarrow_db::StoredPassage;

    fn passage(id: &str, text: &str, code: Option<&str>) -> Passage {
        let mut stored = StoredPassage::new(id, text).with_content_type("judgment");
        if let Some(code) = code {
            stored = stored.with_entry_code(code);
        }
        Passage::from_stored(stored)
    }

    #[test]
    fn context_block_numbers_from_one() {
        let passages = vec![
            passage("p1", "first text", Some("HEX_REVOLUTION")),
            passage("p2", "second text", None),
        ];
        let block = build_context_block(&passages, &ReasoningConfig::default());

        assert!(block.starts_with("[1] Hexagram Revolution - (judgment) first text"));
        assert!(block.contains("[2] (judgment) second text"));
    }

    #[test]
    fn context_block_respects_passage_cap() {
        let passages: Vec<Passage> = (0..20)
            .map(|i| passage(&format!("p{i}"), "text", None))
            .collect();
        let config = ReasoningConfig::default();
        let block = build_context_block(&passages, &config);

        assert!(block.contains(&format!("[{}]", config.context_passages)));
        assert!(!block.contains(&format!("[{}]", config.context_passages + 1)));
    }

    #[test]
    fn long_text_is_truncated_with_ellipsis() {
        let long = "x".repeat(1000);
        let passages = vec![passage("p1", &long, None)];
        let block = build_context_block(&passages, &ReasoningConfig::default());
        assert!(block.ends_with("..."));
        assert!(block.len() < 1000);
    }

    #[test]
    fn cast_block_renders_all_fields() {
        let context = CastContext {
            name: "Revolution".to_string(),
            code: Some("HEX_REVOLUTION".to_string()),
            summary: "Fire in the lake.".to_string(),
            changing_lines: vec![2, 5],
        };
        let block = build_cast_block(Some(&context));
        assert!(block.contains("Name: Revolution"));
        assert!(block.contains("Code: HEX_REVOLUTION"));
        assert!(block.contains("Changing lines: 2, 5"));
    }

    #[test]
    fn cast_block_empty_without_context() {
        assert!(build_cast_block(None).is_empty());
    }

    #[test]
    fn templates_select_by_query_type() {
        let passages = vec![passage("p1", "text", None)];
        let config = ReasoningConfig::default();

        let divination = build_prompt(
            "what now?",
            QueryType::Divination,
            &passages,
            None,
            &config,
        );
        assert!(divination.contains("CASTING QUESTION"));

        let philosophy = build_prompt(
            "why change?",
            QueryType::Philosophy,
            &passages,
            None,
            &config,
        );
        assert!(philosophy.contains("PHILOSOPHICAL QUESTION"));

        let general = build_prompt("what is it?", QueryType::General, &passages, None, &config);
        assert!(general.contains("QUESTION:"));
        assert!(!general.contains("CASTING"));
    }

    #[test]
    fn every_template_demands_citations() {
        let passages = vec![passage("p1", "text", None)];
        let config = ReasoningConfig::default();
        for query_type in [
            QueryType::Divination,
            QueryType::Philosophy,
            QueryType::General,
            QueryType::EntrySpecific,
        ] {
            let prompt = build_prompt("q", query_type, &passages, None, &config);
            assert!(prompt.contains("bracketed source number"));
            assert!(prompt.contains("Do not introduce facts"));
        }
    }
}
