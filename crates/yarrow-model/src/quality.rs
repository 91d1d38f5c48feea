//! Answer-quality heuristic.
//!
//! The generation API used here does not report a confidence of its own, so
//! the generation client derives one from surface features of the answer.
//! The pipeline treats this value as one untrusted input among several.

/// Keywords whose presence suggests the answer stayed inside the domain.
const DOMAIN_KEYWORDS: &[&str] = &[
    "yin",
    "yang",
    "trigram",
    "hexagram",
    "oracle",
    "judgment",
    "changing line",
];

/// Estimate a self-reported confidence for a generated answer.
///
/// Starts from 0.5 and adds fixed bonuses:
/// - +0.1 when the answer is longer than 100 characters,
/// - +0.1 when it carries at least one bracketed citation,
/// - +0.1 when it uses domain vocabulary,
/// - +0.2 when it names a hexagram present in the supplied context codes.
///
/// Capped at 1.0.
pub fn estimate_confidence(answer: &str, context_entry_codes: &[String]) -> f32 {
    let mut confidence: f32 = 0.5;
    let lower = answer.to_lowercase();

    if answer.len() > 100 {
        confidence += 0.1;
    }

    if has_bracketed_citation(answer) {
        confidence += 0.1;
    }

    if DOMAIN_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        confidence += 0.1;
    }

    if context_entry_codes
        .iter()
        .any(|code| lower.contains(&display_name(code)))
    {
        confidence += 0.2;
    }

    confidence.min(1.0)
}

/// Lowercased display form of a hexagram code: `HEX_INNER_TRUTH` -> "inner truth".
fn display_name(code: &str) -> String {
    code.trim_start_matches("HEX_")
        .replace('_', " ")
        .to_lowercase()
}

/// Whether the text contains a `[n]` citation marker.
fn has_bracketed_citation(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'[' {
            let mut j = i + 1;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            if j > i + 1 && j < bytes.len() && bytes[j] == b']' {
                return true;
            }
        }
        i += 1;
    }
    false
}
