//! The 64 canonical hexagram entries.
//!
//! One row per entry: King Wen number, English (Wilhelm-style) name, pinyin
//! transliteration, and the machine code used throughout the corpus
//! (`HEX_<NAME_UPPER>`). Several pinyin keys are legitimately reused across
//! entries (`qian`, `kun`, `bi`, `li`, `yi`, `jian`, `jie`);
//! detection resolves them deterministically: longest keyword first, then
//! table order.

/// One canonical entry of the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hexagram {
    /// King Wen sequence number, 1..=64.
    pub number: u8,
    /// English display name.
    pub name: &'static str,
    /// Pinyin transliteration.
    pub pinyin: &'static str,
    /// Machine code used by the passage store.
    pub code: &'static str,
}

/// The full table in King Wen order.
pub const HEXAGRAMS: [Hexagram; 64] = [
    Hexagram { number: 1, name: "Creative", pinyin: "qian", code: "HEX_CREATIVE" },
    Hexagram { number: 2, name: "Receptive", pinyin: "kun", code: "HEX_RECEPTIVE" },
    Hexagram { number: 3, name: "Sprouting", pinyin: "zhun", code: "HEX_SPROUTING" },
    Hexagram { number: 4, name: "Folly", pinyin: "meng", code: "HEX_FOLLY" },
    Hexagram { number: 5, name: "Waiting", pinyin: "xu", code: "HEX_WAITING" },
    Hexagram { number: 6, name: "Conflict", pinyin: "song", code: "HEX_CONFLICT" },
    Hexagram { number: 7, name: "Army", pinyin: "shi", code: "HEX_ARMY" },
    Hexagram { number: 8, name: "Union", pinyin: "bi", code: "HEX_UNION" },
    Hexagram { number: 9, name: "Small Taming", pinyin: "xiaoxu", code: "HEX_SMALL_TAMING" },
    Hexagram { number: 10, name: "Treading", pinyin: "li", code: "HEX_TREADING" },
    Hexagram { number: 11, name: "Peace", pinyin: "tai", code: "HEX_PEACE" },
    Hexagram { number: 12, name: "Standstill", pinyin: "pi", code: "HEX_STANDSTILL" },
    Hexagram { number: 13, name: "Fellowship", pinyin: "tongren", code: "HEX_FELLOWSHIP" },
    Hexagram { number: 14, name: "Great Possession", pinyin: "dayou", code: "HEX_GREAT_POSSESSION" },
    Hexagram { number: 15, name: "Modesty", pinyin: "qian", code: "HEX_MODESTY" },
    Hexagram { number: 16, name: "Enthusiasm", pinyin: "yu", code: "HEX_ENTHUSIASM" },
    Hexagram { number: 17, name: "Following", pinyin: "sui", code: "HEX_FOLLOWING" },
    Hexagram { number: 18, name: "Decay", pinyin: "gu", code: "HEX_DECAY" },
    Hexagram { number: 19, name: "Approach", pinyin: "lin", code: "HEX_APPROACH" },
    Hexagram { number: 20, name: "Contemplation", pinyin: "guan", code: "HEX_CONTEMPLATION" },
    Hexagram { number: 21, name: "Biting Through", pinyin: "shihe", code: "HEX_BITING_THROUGH" },
    Hexagram { number: 22, name: "Grace", pinyin: "bi", code: "HEX_GRACE" },
    Hexagram { number: 23, name: "Splitting Apart", pinyin: "bo", code: "HEX_SPLITTING_APART" },
    Hexagram { number: 24, name: "Return", pinyin: "fu", code: "HEX_RETURN" },
    Hexagram { number: 25, name: "Innocence", pinyin: "wuwang", code: "HEX_INNOCENCE" },
    Hexagram { number: 26, name: "Great Taming", pinyin: "daxu", code: "HEX_GREAT_TAMING" },
    Hexagram { number: 27, name: "Nourishment", pinyin: "yi", code: "HEX_NOURISHMENT" },
    Hexagram { number: 28, name: "Great Exceeding", pinyin: "daguo", code: "HEX_GREAT_EXCEEDING" },
    Hexagram { number: 29, name: "Abyss", pinyin: "kan", code: "HEX_ABYSS" },
    Hexagram { number: 30, name: "Clinging", pinyin: "li", code: "HEX_CLINGING" },
    Hexagram { number: 31, name: "Influence", pinyin: "xian", code: "HEX_INFLUENCE" },
    Hexagram { number: 32, name: "Duration", pinyin: "heng", code: "HEX_DURATION" },
    Hexagram { number: 33, name: "Retreat", pinyin: "dun", code: "HEX_RETREAT" },
    Hexagram { number: 34, name: "Great Power", pinyin: "dazhuang", code: "HEX_GREAT_POWER" },
    Hexagram { number: 35, name: "Progress", pinyin: "jin", code: "HEX_PROGRESS" },
    Hexagram { number: 36, name: "Darkening", pinyin: "mingyi", code: "HEX_DARKENING" },
    Hexagram { number: 37, name: "Family", pinyin: "jiaren", code: "HEX_FAMILY" },
    Hexagram { number: 38, name: "Opposition", pinyin: "kui", code: "HEX_OPPOSITION" },
    Hexagram { number: 39, name: "Obstruction", pinyin: "jian", code: "HEX_OBSTRUCTION" },
    Hexagram { number: 40, name: "Deliverance", pinyin: "jie", code: "HEX_DELIVERANCE" },
    Hexagram { number: 41, name: "Decrease", pinyin: "sun", code: "HEX_DECREASE" },
    Hexagram { number: 42, name: "Increase", pinyin: "yi", code: "HEX_INCREASE" },
    Hexagram { number: 43, name: "Breakthrough", pinyin: "guai", code: "HEX_BREAKTHROUGH" },
    Hexagram { number: 44, name: "Coming to Meet", pinyin: "gou", code: "HEX_COMING_TO_MEET" },
    Hexagram { number: 45, name: "Gathering", pinyin: "cui", code: "HEX_GATHERING" },
    Hexagram { number: 46, name: "Pushing Upward", pinyin: "sheng", code: "HEX_PUSHING_UPWARD" },
    Hexagram { number: 47, name: "Oppression", pinyin: "kun", code: "HEX_OPPRESSION" },
    Hexagram { number: 48, name: "Well", pinyin: "jing", code: "HEX_WELL" },
    Hexagram { number: 49, name: "Revolution", pinyin: "ge", code: "HEX_REVOLUTION" },
    Hexagram { number: 50, name: "Cauldron", pinyin: "ding", code: "HEX_CAULDRON" },
    Hexagram { number: 51, name: "Arousing", pinyin: "zhen", code: "HEX_AROUSING" },
    Hexagram { number: 52, name: "Keeping Still", pinyin: "gen", code: "HEX_KEEPING_STILL" },
    Hexagram { number: 53, name: "Development", pinyin: "jian", code: "HEX_DEVELOPMENT" },
    Hexagram { number: 54, name: "Marrying Maiden", pinyin: "guimei", code: "HEX_MARRYING_MAIDEN" },
    Hexagram { number: 55, name: "Abundance", pinyin: "feng", code: "HEX_ABUNDANCE" },
    Hexagram { number: 56, name: "Wanderer", pinyin: "lu", code: "HEX_WANDERER" },
    Hexagram { number: 57, name: "Gentle", pinyin: "xun", code: "HEX_GENTLE" },
    Hexagram { number: 58, name: "Joyous", pinyin: "dui", code: "HEX_JOYOUS" },
    Hexagram { number: 59, name: "Dispersion", pinyin: "huan", code: "HEX_DISPERSION" },
    Hexagram { number: 60, name: "Limitation", pinyin: "jie", code: "HEX_LIMITATION" },
    Hexagram { number: 61, name: "Inner Truth", pinyin: "zhongfu", code: "HEX_INNER_TRUTH" },
    Hexagram { number: 62, name: "Small Exceeding", pinyin: "xiaoguo", code: "HEX_SMALL_EXCEEDING" },
    Hexagram { number: 63, name: "After Completion", pinyin: "jiji", code: "HEX_AFTER_COMPLETION" },
    Hexagram { number: 64, name: "Before Completion", pinyin: "weiji", code: "HEX_BEFORE_COMPLETION" },
];

/// Whether `name` is one of the 64 canonical names (case-insensitive).
pub fn is_canonical_name(name: &str) -> bool {
    let trimmed = name.trim();
    HEXAGRAMS
        .iter()
        .any(|h| h.name.eq_ignore_ascii_case(trimmed))
}

/// Map a display name to its machine code (case-insensitive).
///
/// Returns `None` for unknown names; callers treat that as a soft failure
/// and fall through to the next retrieval strategy.
pub fn name_to_code(name: &str) -> Option<&'static str> {
    let trimmed = name.trim();
    HEXAGRAMS
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(trimmed))
        .map(|h| h.code)
}

/// Look up the table row for a machine code.
pub fn by_code(code: &str) -> Option<&'static Hexagram> {
    HEXAGRAMS.iter().find(|h| h.code == code)
}

/// Detect a hexagram mentioned anywhere in free text.
///
/// The text is lowercased and punctuation-stripped, then matched against
/// every name and pinyin key as whole words. Longest keyword wins first;
/// ties fall to table order, which makes the reused pinyin keys
/// reproducible (`li` is always Treading, never Clinging).
pub fn detect_hexagram(text: &str) -> Option<&'static str> {
    if text.trim().is_empty() {
        return None;
    }

    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let padded = format!(
        " {} ",
        cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
    );

    let mut keywords: Vec<(&'static str, &'static str)> = Vec::with_capacity(128);
    for h in &HEXAGRAMS {
        keywords.push((h.name, h.code));
        keywords.push((h.pinyin, h.code));
    }
    keywords.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    for (keyword, code) in keywords {
        if contains_word(&padded, &keyword.to_lowercase()) {
            return Some(code);
        }
    }
    None
}

/// Whole-word containment over pre-padded, space-normalized text.
///
/// Multi-word keywords match as a padded substring, so "inner truth"
/// matches inside "the inner truth of it".
fn contains_word(padded_text: &str, keyword: &str) -> bool {
    let padded_keyword = format!(" {} ", keyword);
    padded_text.contains(&padded_keyword)
}
