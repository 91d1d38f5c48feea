//! Linguistic resolver: mention extraction, sense disambiguation, expansion.
//!
//! Three sub-steps, run in order:
//!
//! 1. **Mention detection** finds canonical hexagram names in the question,
//!    first via the high-precision `hexagram <Name>` pattern, then via a
//!    whole-word scan of all 64 names guarded by a context validator that
//!    rejects known common-word collisions ("as well", "peace of mind").
//! 2. **Sense disambiguation** scores a fixed list of overloaded terms
//!    against three senses with keyword co-occurrence bonuses.
//! 3. **Expansion** appends lexicon synonyms, sense synonyms, and machine
//!    code tokens to the query. Purely additive: the original question is
//!    always a prefix of the expanded text.

use std::collections::BTreeMap;

use regex::Regex;
use tracing::debug;

use crate::config::LinguisticsConfig;
use crate::hexagrams;
use crate::lexicon::ConceptLexicon;
use crate::state::{Entities, Sense, SenseResolution};

/// Keywords that indicate the question is about a hexagram entry.
const ENTRY_CONTEXT: &[&str] = &["hexagram", "entry", "i ching", "oracle", "trigram", "64"];

/// Keywords that indicate philosophical usage.
const PHILOSOPHY_CONTEXT: &[&str] = &["philosophy", "doctrine", "theory", "principle", "thought"];

/// Keywords of ordinary analytical usage.
const GENERAL_CONTEXT: &[&str] = &["explain", "analyze", "compare", "research"];

/// The overloaded terms the resolver disambiguates.
const OVERLOADED_TERMS: &[&str] = &["li", "peace", "change", "yin yang", "philosophy"];

/// Canonical names that collide with everyday English. The bare name is
/// rejected when one of these collocations is present and no entry keyword
/// backs it up.
const FALSE_POSITIVE_PATTERNS: &[(&str, &[&str])] = &[
    ("Well", &[r"\bas well\b", r"\bwell[- ]known\b", r"\bwell[- ]being\b"]),
    ("Peace", &[r"\bpeace of mind\b", r"\brest in peace\b"]),
    ("Following", &[r"\bthe following\b"]),
    ("Return", &[r"\breturn on\b", r"\btax return\b"]),
];

/// Output of the resolver.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Extracted mentions and sense resolutions.
    pub entities: Entities,
    /// The expanded query text.
    pub expanded_query: String,
    /// Trace entries describing what was found.
    pub trace: Vec<String>,
}

/// Pre-compiled patterns for one canonical name.
struct NamePattern {
    name: &'static str,
    /// Whole-word occurrence of the name.
    word: Regex,
    /// The name adjacent to an entry word, either side.
    adjacent: Regex,
}

/// The linguistic resolver.
pub struct LinguisticResolver {
    lexicon: ConceptLexicon,
    sense_threshold: f32,
    named_pattern: Regex,
    name_patterns: Vec<NamePattern>,
    false_positives: Vec<(&'static str, Vec<Regex>)>,
}

impl LinguisticResolver {
    /// Build the resolver, compiling its patterns once.
    pub fn new(config: &LinguisticsConfig) -> Self {
        let name_patterns = hexagrams::HEXAGRAMS
            .iter()
            .map(|h| {
                let escaped = regex::escape(&h.name.to_lowercase());
                NamePattern {
                    name: h.name,
                    word: Regex::new(&format!(r"\b{escaped}\b")).expect("name pattern"),
                    adjacent: Regex::new(&format!(
                        r"(?:hexagram|entry)\s+{escaped}|{escaped}\s+(?:hexagram|entry)"
                    ))
                    .expect("adjacency pattern"),
                }
            })
            .collect();

        let false_positives = FALSE_POSITIVE_PATTERNS
            .iter()
            .map(|(name, patterns)| {
                let compiled = patterns
                    .iter()
                    .map(|p| Regex::new(p).expect("false-positive pattern"))
                    .collect();
                (*name, compiled)
            })
            .collect();

        Self {
            lexicon: ConceptLexicon::new(),
            sense_threshold: config.sense_threshold,
            named_pattern: Regex::new(
                r"\b(?:hexagram|entry)\s+([A-Z][A-Za-z]*(?:\s+[A-Z][A-Za-z]*)*)",
            )
            .expect("mention pattern must compile"),
            name_patterns,
            false_positives,
        }
    }

    /// Run all three sub-steps on a question.
    pub fn resolve(&self, query: &str) -> Resolution {
        let mentions = self.detect_mentions(query);
        let senses = self.disambiguate(query, &mentions);
        let expanded_query = self.expand(query, &mentions, &senses);

        let added_terms = expanded_query.split_whitespace().count()
            - query.split_whitespace().count();
        let trace = vec![format!(
            "linguistics: {} mention(s), {} sense(s), +{} expansion term(s)",
            mentions.len(),
            senses.len(),
            added_terms
        )];
        debug!(
            mentions = mentions.len(),
            senses = senses.len(),
            added_terms, "Linguistic resolution"
        );

        Resolution {
            entities: Entities { mentions, senses },
            expanded_query,
            trace,
        }
    }

    // ------------------------------------------------------------------
    // Mention detection
    // ------------------------------------------------------------------

    /// Find canonical hexagram names mentioned in the question.
    fn detect_mentions(&self, query: &str) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();

        // Method 1: "hexagram <Name>" - high precision.
        for caps in self.named_pattern.captures_iter(query) {
            if let Some(candidate) = caps.get(1) {
                let candidate = candidate.as_str().trim();
                if hexagrams::is_canonical_name(candidate) {
                    push_unique(&mut found, canonical_form(candidate));
                }
            }
        }

        // Method 2: whole-word scan of every canonical name, with context
        // validation against common-word collisions.
        let query_lower = query.to_lowercase();
        for pattern in &self.name_patterns {
            if pattern.word.is_match(&query_lower)
                && self.validate_mention_context(&query_lower, pattern)
            {
                push_unique(&mut found, pattern.name.to_string());
            }
        }

        found
    }

    /// Decide whether a bare name occurrence really refers to the hexagram.
    fn validate_mention_context(&self, query_lower: &str, pattern: &NamePattern) -> bool {
        // Adjacent entry word is decisive.
        if pattern.adjacent.is_match(query_lower) {
            return true;
        }

        // Any entry keyword elsewhere in the question is enough support.
        if ENTRY_CONTEXT.iter().any(|kw| query_lower.contains(kw)) {
            return true;
        }

        // Known collisions are rejected without that support.
        for (colliding_name, patterns) in &self.false_positives {
            if colliding_name.eq_ignore_ascii_case(pattern.name)
                && patterns.iter().any(|re| re.is_match(query_lower))
            {
                return false;
            }
        }

        // No strong evidence against.
        true
    }

    // ------------------------------------------------------------------
    // Sense disambiguation
    // ------------------------------------------------------------------

    /// Score the three senses for every overloaded term present.
    fn disambiguate(&self, query: &str, mentions: &[String]) -> Vec<SenseResolution> {
        let query_lower = query.to_lowercase();
        let padded = padded_words(&query_lower);

        OVERLOADED_TERMS
            .iter()
            .filter(|term| padded.contains(&format!(" {} ", term)))
            .map(|term| self.score_term(term, &query_lower, mentions))
            .collect()
    }

    /// Keyword-co-occurrence scoring for one term.
    fn score_term(&self, term: &str, query_lower: &str, mentions: &[String]) -> SenseResolution {
        let mut entry_score = context_score(query_lower, ENTRY_CONTEXT);
        let mut philosophy_score = context_score(query_lower, PHILOSOPHY_CONTEXT);
        let general_score = context_score(query_lower, GENERAL_CONTEXT);

        // A detected mention pulls hard toward the entry sense.
        if !mentions.is_empty() {
            entry_score += 3;
        }

        // Term-specific hand-tuned bonuses.
        match term {
            "li" => {
                if query_lower.contains("principle") || query_lower.contains("theory") {
                    philosophy_score += 5;
                } else if query_lower.contains("hexagram") {
                    entry_score += 3;
                }
            }
            "yin yang" => philosophy_score += 4,
            "philosophy" => philosophy_score += 5,
            _ => {}
        }

        // First-enumerated sense keeps ties.
        let ranked = [
            (Sense::Entry, entry_score),
            (Sense::Philosophy, philosophy_score),
            (Sense::General, general_score),
        ];
        let mut winner = ranked[0];
        for candidate in &ranked[1..] {
            if candidate.1 > winner.1 {
                winner = *candidate;
            }
        }

        let mut scores = BTreeMap::new();
        scores.insert("entry".to_string(), entry_score);
        scores.insert("philosophy".to_string(), philosophy_score);
        scores.insert("general".to_string(), general_score);

        SenseResolution {
            term: term.to_string(),
            sense: winner.0,
            confidence: (winner.1 as f32 / 5.0).min(1.0),
            scores,
        }
    }

    // ------------------------------------------------------------------
    // Expansion
    // ------------------------------------------------------------------

    /// Append synonyms and code tokens to the question.
    fn expand(&self, query: &str, mentions: &[String], senses: &[SenseResolution]) -> String {
        let mut parts: Vec<String> = vec![query.to_string()];

        // Lexicon synonyms for every detected hexagram.
        for mention in mentions {
            if let Some(code) = hexagrams::name_to_code(mention) {
                for synonym in self.lexicon.synonyms_for(code).into_iter().take(3) {
                    parts.push(synonym.to_string());
                }
            }
        }

        // Sense synonyms above the confidence threshold.
        for resolution in senses {
            if resolution.confidence > self.sense_threshold {
                for synonym in sense_synonyms(&resolution.term, resolution.sense) {
                    parts.push(synonym.to_string());
                }
            }
        }

        // Machine codes for every detected hexagram, regardless of confidence.
        for mention in mentions {
            if let Some(code) = hexagrams::name_to_code(mention) {
                parts.push(code.to_string());
            }
        }

        parts.join(" ")
    }
}

/// Synonym tokens for a disambiguated sense.
fn sense_synonyms(term: &str, sense: Sense) -> &'static [&'static str] {
    match (term, sense) {
        ("yin yang", Sense::Philosophy) => &["duality", "balance", "polarity"],
        ("philosophy", Sense::Philosophy) => &["doctrine", "theory", "thought"],
        ("change", Sense::Philosophy) => &["transformation", "process"],
        _ => &[],
    }
}

/// +2 per context keyword present in the question.
fn context_score(query_lower: &str, keywords: &[&str]) -> i32 {
    keywords
        .iter()
        .map(|kw| if query_lower.contains(kw) { 2 } else { 0 })
        .sum()
}

/// Space-normalized text padded for whole-word containment checks.
fn padded_words(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    format!(
        " {} ",
        cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
    )
}

/// Title-case a candidate name to its canonical display form.
fn canonical_form(candidate: &str) -> String {
    hexagrams::HEXAGRAMS
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(candidate.trim()))
        .map(|h| h.name.to_string())
        .unwrap_or_else(|| candidate.trim().to_string())
}

/// Push preserving first-seen order, without duplicates.
fn push_unique(found: &mut Vec<String>, name: String) {
    if !found.iter().any(|existing| existing == &name) {
        found.push(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> LinguisticResolver {
        LinguisticResolver::new(&LinguisticsConfig::default())
    }

    #[test]
    fn named_pattern_detects_mention() {
        let r = resolver();
        let resolution = r.resolve("What does hexagram Revolution mean for me?");
        assert_eq!(resolution.entities.mentions, vec!["Revolution".to_string()]);
    }

    #[test]
    fn entry_word_variant_detects_mention() {
        let r = resolver();
        let resolution = r.resolve("entry Revolution meaning?");
        assert_eq!(resolution.entities.mentions, vec!["Revolution".to_string()]);
    }

    #[test]
    fn bare_name_with_entry_keyword_is_accepted() {
        let r = resolver();
        let resolution = r.resolve("In the I Ching, what does Peace promise?");
        assert!(resolution
            .entities
            .mentions
            .contains(&"Peace".to_string()));
    }

    #[test]
    fn common_word_collision_is_rejected() {
        let r = resolver();
        // "as well" must not produce a Well mention.
        let resolution = r.resolve("Can you explain this as well?");
        assert!(!resolution.entities.mentions.contains(&"Well".to_string()));

        // "peace of mind" must not produce a Peace mention.
        let resolution = r.resolve("I just want peace of mind");
        assert!(!resolution.entities.mentions.contains(&"Peace".to_string()));
    }

    #[test]
    fn collision_with_entry_keyword_is_still_accepted() {
        let r = resolver();
        let resolution = r.resolve("In the oracle, does Peace of mind appear? peace of mind");
        assert!(resolution.entities.mentions.contains(&"Peace".to_string()));
    }

    #[test]
    fn expansion_keeps_query_as_prefix() {
        let r = resolver();
        let query = "hexagram Revolution meaning?";
        let resolution = r.resolve(query);
        assert!(resolution.expanded_query.starts_with(query));
    }

    #[test]
    fn expansion_appends_code_token() {
        let r = resolver();
        let resolution = r.resolve("hexagram Revolution meaning?");
        assert!(resolution.expanded_query.contains("HEX_REVOLUTION"));
        // Lexicon synonyms come along too.
        assert!(resolution.expanded_query.contains("transformation"));
    }

    #[test]
    fn no_mentions_leaves_query_unchanged() {
        let r = resolver();
        let query = "tell me a story";
        let resolution = r.resolve(query);
        assert_eq!(resolution.expanded_query, query);
    }

    #[test]
    fn yin_yang_resolves_to_philosophy() {
        let r = resolver();
        let resolution = r.resolve("what does yin yang teach about balance?");
        let sense = resolution
            .entities
            .senses
            .iter()
            .find(|s| s.term == "yin yang")
            .expect("yin yang must be disambiguated");
        assert_eq!(sense.sense, Sense::Philosophy);
        assert!(sense.confidence > 0.6);
    }

    #[test]
    fn high_confidence_sense_contributes_synonyms() {
        let r = resolver();
        let resolution = r.resolve("explain yin yang");
        assert!(resolution.expanded_query.contains("duality"));
    }

    #[test]
    fn li_with_principle_is_philosophy() {
        let r = resolver();
        let resolution = r.resolve("the principle of li");
        let sense = resolution
            .entities
            .senses
            .iter()
            .find(|s| s.term == "li")
            .expect("li must be disambiguated");
        assert_eq!(sense.sense, Sense::Philosophy);
    }

    #[test]
    fn overloaded_term_requires_whole_word() {
        let r = resolver();
        // "li" inside "living" must not trigger disambiguation.
        let resolution = r.resolve("living a quiet life");
        assert!(resolution.entities.senses.iter().all(|s| s.term != "li"));
    }
}
