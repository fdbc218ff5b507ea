//! Stylometric feature extraction.
//!
//! Turns raw UTF-8 text into a [`FeatureVector`]: a fixed, closed set of 17
//! normalized measurements. Every feature is a deterministic pure function
//! of the input text and independent of the others, so the same text always
//! produces a bit-identical vector and features may be computed in any
//! order (or in parallel) without changing the result.
//!
//! All counts are normalized by token or sentence counts so vectors are
//! comparable across documents of different sizes. Values are clamped to
//! [0,1]; the normalization divisor for each unbounded quantity is
//! documented on its variant.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::text;

/// Mean sentence length saturates the [0,1] scale at this many words.
pub(crate) const SENTENCE_MEAN_SCALE: f64 = 40.0;
/// Sentence-length standard deviation saturates at this many words.
const SENTENCE_STD_SCALE: f64 = 20.0;
/// Burstiness (coefficient of variation) saturates at this value.
pub(crate) const BURSTINESS_SCALE: f64 = 2.0;
/// Average word length saturates at this many characters.
const WORD_LENGTH_SCALE: f64 = 10.0;
/// Sentences at or below this word count are "short" for rhythm purposes.
const SHORT_SENTENCE_WORDS: usize = 8;

/// The closed set of stylometric features.
///
/// The wire name of each variant (snake_case) is part of the persisted
/// signature format — do not reorder or rename.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Mean words per sentence / 40.
    SentenceMean,
    /// Standard deviation of words per sentence / 20.
    SentenceStdDev,
    /// Coefficient of variation of sentence length / 2.
    SentenceBurstiness,
    /// Fraction of sentences with at most 8 words.
    ShortSentenceRatio,
    /// Distinct words over total words (type-token ratio).
    LexicalDiversity,
    /// Mean characters per word / 10.
    AvgWordLength,
    /// Commas per word.
    CommaRate,
    /// Semicolons and colons per word.
    SemicolonRate,
    /// Exclamation marks per word.
    ExclamationRate,
    /// Question marks per word.
    QuestionRate,
    /// Parentheses, em/en dashes, and double hyphens per word.
    ParentheticalRate,
    /// Articles per word.
    ArticleRate,
    /// Pronouns per word.
    PronounRate,
    /// Conjunctions per word.
    ConjunctionRate,
    /// Prepositions per word.
    PrepositionRate,
    /// All function-word classes combined, per word.
    FunctionWordRate,
    /// Fraction of sentences matching the passive-voice pattern.
    PassiveVoiceRate,
}

impl Feature {
    /// Every feature, in wire order.
    pub const ALL: &'static [Feature] = &[
        Feature::SentenceMean,
        Feature::SentenceStdDev,
        Feature::SentenceBurstiness,
        Feature::ShortSentenceRatio,
        Feature::LexicalDiversity,
        Feature::AvgWordLength,
        Feature::CommaRate,
        Feature::SemicolonRate,
        Feature::ExclamationRate,
        Feature::QuestionRate,
        Feature::ParentheticalRate,
        Feature::ArticleRate,
        Feature::PronounRate,
        Feature::ConjunctionRate,
        Feature::PrepositionRate,
        Feature::FunctionWordRate,
        Feature::PassiveVoiceRate,
    ];

    /// Stable snake_case wire name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SentenceMean => "sentence_mean",
            Self::SentenceStdDev => "sentence_std_dev",
            Self::SentenceBurstiness => "sentence_burstiness",
            Self::ShortSentenceRatio => "short_sentence_ratio",
            Self::LexicalDiversity => "lexical_diversity",
            Self::AvgWordLength => "avg_word_length",
            Self::CommaRate => "comma_rate",
            Self::SemicolonRate => "semicolon_rate",
            Self::ExclamationRate => "exclamation_rate",
            Self::QuestionRate => "question_rate",
            Self::ParentheticalRate => "parenthetical_rate",
            Self::ArticleRate => "article_rate",
            Self::PronounRate => "pronoun_rate",
            Self::ConjunctionRate => "conjunction_rate",
            Self::PrepositionRate => "preposition_rate",
            Self::FunctionWordRate => "function_word_rate",
            Self::PassiveVoiceRate => "passive_voice_rate",
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Normalized stylometric measurements for one text snapshot.
///
/// Immutable once computed; every value lies in [0,1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    values: BTreeMap<Feature, f64>,
}

impl FeatureVector {
    /// Value for a feature. Extraction always populates every feature, so
    /// a missing key only occurs for vectors built by hand in tests.
    pub fn get(&self, feature: Feature) -> f64 {
        self.values.get(&feature).copied().unwrap_or(0.0)
    }

    /// Iterate features in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        self.values.iter().map(|(&f, &v)| (f, v))
    }

    /// Build a vector from explicit values. Used by the signature builder
    /// when aggregating; missing features default to 0 on `get`.
    pub fn from_values(values: BTreeMap<Feature, f64>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Per-feature measurement functions
// ---------------------------------------------------------------------------

/// Sentence-length distribution statistics.
#[derive(Debug, Clone, Serialize)]
pub struct SentenceStats {
    /// Mean words per sentence.
    pub mean: f64,
    /// Standard deviation of words per sentence.
    pub std_dev: f64,
    /// Coefficient of variation (std_dev / mean); 0 when mean is 0.
    pub burstiness: f64,
    /// Fraction of sentences with at most [`SHORT_SENTENCE_WORDS`] words.
    pub short_ratio: f64,
    /// Number of sentences counted.
    pub count: usize,
}

/// Compute sentence-length statistics over the whole text.
pub fn sentence_stats(input: &str) -> SentenceStats {
    let lengths: Vec<usize> = text::split_sentences(input)
        .iter()
        .map(|s| text::tokenize(s).len())
        .filter(|&n| n > 0)
        .collect();
    if lengths.is_empty() {
        return SentenceStats {
            mean: 0.0,
            std_dev: 0.0,
            burstiness: 0.0,
            short_ratio: 0.0,
            count: 0,
        };
    }

    let n = lengths.len() as f64;
    let mean = lengths.iter().sum::<usize>() as f64 / n;
    let var = lengths
        .iter()
        .map(|&l| (l as f64 - mean).powi(2))
        .sum::<f64>()
        / n;
    let std_dev = var.sqrt();
    let burstiness = if mean > 0.0 { std_dev / mean } else { 0.0 };
    let short = lengths.iter().filter(|&&l| l <= SHORT_SENTENCE_WORDS).count();

    SentenceStats {
        mean,
        std_dev,
        burstiness,
        short_ratio: short as f64 / n,
        count: lengths.len(),
    }
}

/// Punctuation counts per class, normalized per word.
#[derive(Debug, Clone, Serialize)]
pub struct PunctuationRates {
    pub comma: f64,
    pub semicolon: f64,
    pub exclamation: f64,
    pub question: f64,
    pub parenthetical: f64,
}

/// Count punctuation classes and normalize by word count.
pub fn punctuation_rates(input: &str, word_count: usize) -> PunctuationRates {
    let mut comma = 0usize;
    let mut semicolon = 0usize;
    let mut exclamation = 0usize;
    let mut question = 0usize;
    let mut parenthetical = 0usize;

    let mut prev_hyphen = false;
    for c in input.chars() {
        match c {
            ',' => comma += 1,
            ';' | ':' => semicolon += 1,
            '!' => exclamation += 1,
            '?' => question += 1,
            '(' | '—' | '–' => parenthetical += 1,
            '-' if prev_hyphen => {
                parenthetical += 1;
                prev_hyphen = false;
                continue;
            }
            _ => {}
        }
        prev_hyphen = c == '-';
    }

    let w = word_count.max(1) as f64;
    PunctuationRates {
        comma: (comma as f64 / w).min(1.0),
        semicolon: (semicolon as f64 / w).min(1.0),
        exclamation: (exclamation as f64 / w).min(1.0),
        question: (question as f64 / w).min(1.0),
        parenthetical: (parenthetical as f64 / w).min(1.0),
    }
}

/// Function-word usage per class, normalized per word.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionWordProfile {
    pub article: f64,
    pub pronoun: f64,
    pub conjunction: f64,
    pub preposition: f64,
    pub overall: f64,
}

/// Count function-word classes over a token stream.
pub fn function_word_profile(tokens: &[String]) -> FunctionWordProfile {
    let mut article = 0usize;
    let mut pronoun = 0usize;
    let mut conjunction = 0usize;
    let mut preposition = 0usize;

    for t in tokens {
        let t = t.as_str();
        if text::ARTICLES.contains(&t) {
            article += 1;
        } else if text::PRONOUNS.contains(&t) {
            pronoun += 1;
        } else if text::CONJUNCTIONS.contains(&t) {
            conjunction += 1;
        } else if text::PREPOSITIONS.contains(&t) {
            preposition += 1;
        }
    }

    let w = tokens.len().max(1) as f64;
    FunctionWordProfile {
        article: article as f64 / w,
        pronoun: pronoun as f64 / w,
        conjunction: conjunction as f64 / w,
        preposition: preposition as f64 / w,
        overall: (article + pronoun + conjunction + preposition) as f64 / w,
    }
}

/// Type-token ratio over the normalized token stream.
pub fn lexical_diversity(tokens: &[String]) -> f64 {
    if tokens.is_empty() {
        return 0.0;
    }
    let distinct: HashSet<&str> = tokens.iter().map(String::as_str).collect();
    distinct.len() as f64 / tokens.len() as f64
}

/// Mean characters per word.
pub fn avg_word_length(tokens: &[String]) -> f64 {
    if tokens.is_empty() {
        return 0.0;
    }
    let chars: usize = tokens.iter().map(|t| t.chars().count()).sum();
    chars as f64 / tokens.len() as f64
}

/// Fraction of sentences containing a passive-voice pattern: an auxiliary
/// ("was", "were", ...) followed later in the sentence by a
/// participle-shaped token. A surface heuristic, not a parser.
pub fn passive_voice_rate(input: &str) -> f64 {
    let sentences = text::split_sentences(input);
    if sentences.is_empty() {
        return 0.0;
    }
    let mut passive = 0usize;
    for s in &sentences {
        let tokens = text::tokenize(s);
        let mut aux_seen = false;
        for t in &tokens {
            if text::PASSIVE_AUXILIARIES.contains(&t.as_str()) {
                aux_seen = true;
            } else if aux_seen && text::is_participle(t) {
                passive += 1;
                break;
            }
        }
    }
    passive as f64 / sentences.len() as f64
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Extract the full feature vector from text.
///
/// Fails with [`Error::InvalidInput`] on empty or whitespace-only input, or
/// input with no word tokens at all.
pub fn extract(input: &str) -> Result<FeatureVector> {
    if input.trim().is_empty() {
        return Err(Error::InvalidInput("text is empty".into()));
    }
    let tokens = text::tokenize(input);
    if tokens.is_empty() {
        return Err(Error::InvalidInput("text contains no words".into()));
    }

    let sents = sentence_stats(input);
    let punct = punctuation_rates(input, tokens.len());
    let func = function_word_profile(&tokens);

    let mut values = BTreeMap::new();
    values.insert(
        Feature::SentenceMean,
        (sents.mean / SENTENCE_MEAN_SCALE).min(1.0),
    );
    values.insert(
        Feature::SentenceStdDev,
        (sents.std_dev / SENTENCE_STD_SCALE).min(1.0),
    );
    values.insert(
        Feature::SentenceBurstiness,
        (sents.burstiness / BURSTINESS_SCALE).min(1.0),
    );
    values.insert(Feature::ShortSentenceRatio, sents.short_ratio);
    values.insert(Feature::LexicalDiversity, lexical_diversity(&tokens));
    values.insert(
        Feature::AvgWordLength,
        (avg_word_length(&tokens) / WORD_LENGTH_SCALE).min(1.0),
    );
    values.insert(Feature::CommaRate, punct.comma);
    values.insert(Feature::SemicolonRate, punct.semicolon);
    values.insert(Feature::ExclamationRate, punct.exclamation);
    values.insert(Feature::QuestionRate, punct.question);
    values.insert(Feature::ParentheticalRate, punct.parenthetical);
    values.insert(Feature::ArticleRate, func.article);
    values.insert(Feature::PronounRate, func.pronoun);
    values.insert(Feature::ConjunctionRate, func.conjunction);
    values.insert(Feature::PrepositionRate, func.preposition);
    values.insert(Feature::FunctionWordRate, func.overall);
    values.insert(Feature::PassiveVoiceRate, passive_voice_rate(input));

    Ok(FeatureVector { values })
}

/// Word count of the normalized token stream (the quantity the signature
/// builder's sample threshold is measured in).
pub fn word_count(input: &str) -> usize {
    text::tokenize(input).len()
}
