//! Text segmentation primitives shared by the extractor and scorer.
//!
//! Everything here is a pure function of its input string: tokenization,
//! sentence and paragraph splitting, and the closed word tables (function
//! words, transition words) that the stylometric features are built on.
//! Keeping segmentation in one place guarantees the extractor and scorer
//! count the same units.

/// Closed list of high-frequency grammatical words, grouped by class.
///
/// The lists are deliberately short and fixed: feature values must be stable
/// across releases, so the tables are part of the wire contract.
pub const ARTICLES: &[&str] = &["a", "an", "the"];

pub const PRONOUNS: &[&str] = &[
    "i", "you", "he", "she", "it", "we", "they", "me", "him", "her", "us", "them", "my", "your",
    "his", "its", "our", "their", "this", "that", "these", "those",
];

pub const CONJUNCTIONS: &[&str] = &[
    "and", "but", "or", "nor", "so", "yet", "because", "although", "while", "whereas", "if",
    "unless", "since",
];

pub const PREPOSITIONS: &[&str] = &[
    "of", "in", "to", "for", "with", "on", "at", "by", "from", "about", "into", "through",
    "during", "before", "after", "above", "below", "between", "under", "over",
];

/// Transition words and connectives used by the fluency sub-metric.
pub const TRANSITIONS: &[&str] = &[
    "however", "therefore", "moreover", "furthermore", "meanwhile", "consequently", "instead",
    "nevertheless", "nonetheless", "additionally", "similarly", "likewise", "thus", "hence",
    "accordingly", "also", "finally", "then", "still", "indeed",
];

/// Auxiliary verbs that open the passive-voice pattern.
pub const PASSIVE_AUXILIARIES: &[&str] =
    &["is", "are", "was", "were", "be", "been", "being", "am"];

/// Irregular past participles not covered by the -ed/-en suffix check.
pub const IRREGULAR_PARTICIPLES: &[&str] = &[
    "done", "made", "said", "told", "found", "built", "sent", "kept", "left", "held", "brought",
    "thought", "caught", "taught", "bought", "sold", "put", "set", "read", "won", "lost", "paid",
];

/// Lowercase word tokens: alphabetic runs (apostrophes allowed mid-word).
///
/// Digits and punctuation are dropped. This is the normalized token stream
/// every per-word rate is computed over.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        if c.is_alphabetic() {
            for lc in c.to_lowercase() {
                current.push(lc);
            }
        } else if c == '\'' && !current.is_empty() {
            current.push(c);
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current).trim_matches('\'').to_string());
        }
    }
    if !current.is_empty() {
        tokens.push(current.trim_matches('\'').to_string());
    }
    tokens.retain(|t| !t.is_empty());
    tokens
}

/// Split text into sentences on terminal punctuation (., !, ?).
///
/// Consecutive terminators collapse into one boundary; sentences shorter
/// than one word are dropped. Abbreviation handling is intentionally
/// absent — the same splitter must run identically everywhere.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let bytes = text.char_indices().collect::<Vec<_>>();
    for (i, &(pos, c)) in bytes.iter().enumerate() {
        if matches!(c, '.' | '!' | '?') {
            let next_is_terminal = bytes
                .get(i + 1)
                .is_some_and(|&(_, n)| matches!(n, '.' | '!' | '?'));
            if !next_is_terminal {
                let end = pos + c.len_utf8();
                let s = text[start..end].trim();
                if s.chars().any(|ch| ch.is_alphabetic()) {
                    sentences.push(s);
                }
                start = end;
            }
        }
    }
    let tail = text[start..].trim();
    if tail.chars().any(|ch| ch.is_alphabetic()) {
        sentences.push(tail);
    }
    sentences
}

/// Split text into non-empty paragraphs on blank lines.
pub fn split_paragraphs(text: &str) -> Vec<&str> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Whether a token belongs to any function-word class.
pub fn is_function_word(token: &str) -> bool {
    ARTICLES.contains(&token)
        || PRONOUNS.contains(&token)
        || CONJUNCTIONS.contains(&token)
        || PREPOSITIONS.contains(&token)
}

/// Whether a token looks like a past participle (suffix check + irregulars).
pub fn is_participle(token: &str) -> bool {
    if IRREGULAR_PARTICIPLES.contains(&token) {
        return true;
    }
    token.len() > 3 && (token.ends_with("ed") || token.ends_with("en"))
}
