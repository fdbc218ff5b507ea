//! Authorial signature construction.
//!
//! A [`SignatureBuilder`] accumulates feature vectors from one user's sample
//! texts and aggregates them into an [`AuthorialSignature`]: a word-count
//! weighted mean per feature plus a per-feature confidence weight. Low
//! cross-sample variance and many samples yield high confidence; the
//! calibration loop later uses confidence to decide how strongly to
//! penalize deviation on each feature.
//!
//! Signatures are immutable records. Re-analysis produces a new version;
//! versioning and retention live in [`crate::store`].

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::features::{self, Feature, FeatureVector};
use crate::text;

/// Minimum total sample words required to build a signature.
pub const MIN_SAMPLE_WORDS: usize = 50;

/// How strongly cross-sample variance suppresses confidence.
const SPREAD_GAIN: f64 = 40.0;

/// Most recurring phrases kept on a signature.
const MAX_COMMON_PHRASES: usize = 5;

/// A phrase must recur at least this often across the samples to count.
const PHRASE_MIN_COUNT: usize = 2;

/// Aggregated, confidence-weighted stylometric profile of one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorialSignature {
    /// Unique record id.
    pub id: String,
    /// Owning user/session id.
    pub user: String,
    /// 1-based version within the user's append-only history.
    pub version: u32,
    /// ISO-8601 creation timestamp.
    pub created_at: String,
    /// Word-count weighted mean of the input vectors.
    pub vector: FeatureVector,
    /// Per-feature confidence weight in (0,1).
    pub confidence: BTreeMap<Feature, f64>,
    /// Recurring two- and three-word phrases found across the samples,
    /// most frequent first.
    #[serde(default)]
    pub common_phrases: Vec<String>,
    /// Total words across all samples.
    pub sample_words: usize,
    /// Number of samples aggregated.
    pub sample_count: usize,
}

impl AuthorialSignature {
    /// Confidence weight for a feature (0 if absent).
    pub fn confidence(&self, feature: Feature) -> f64 {
        self.confidence.get(&feature).copied().unwrap_or(0.0)
    }
}

struct Sample {
    vector: FeatureVector,
    words: usize,
    tokens: Vec<String>,
}

/// Accumulates sample evidence for one user and builds signatures.
pub struct SignatureBuilder {
    user: String,
    samples: Vec<Sample>,
    min_words: usize,
}

impl SignatureBuilder {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            samples: Vec::new(),
            min_words: MIN_SAMPLE_WORDS,
        }
    }

    /// Override the minimum-words threshold (tests, stricter deployments).
    pub fn with_min_words(mut self, min_words: usize) -> Self {
        self.min_words = min_words;
        self
    }

    /// Extract features from a sample text and add it as evidence.
    pub fn add_text(&mut self, text: &str) -> Result<()> {
        let vector = features::extract(text)?;
        let words = features::word_count(text);
        let tokens = text::tokenize(text);
        self.samples.push(Sample {
            vector,
            words,
            tokens,
        });
        Ok(())
    }

    /// Add a pre-extracted vector with its word count. No raw text means
    /// no phrase evidence from this sample.
    pub fn add_vector(&mut self, vector: FeatureVector, words: usize) {
        self.samples.push(Sample {
            vector,
            words,
            tokens: Vec::new(),
        });
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn total_words(&self) -> usize {
        self.samples.iter().map(|s| s.words).sum()
    }

    /// Build the signature at the given version.
    ///
    /// Fails with [`Error::InsufficientSample`] when total sample words fall
    /// below the threshold — surfaced, never silently degraded.
    pub fn build(&self, version: u32) -> Result<AuthorialSignature> {
        let total_words = self.total_words();
        if total_words < self.min_words {
            return Err(Error::InsufficientSample {
                words: total_words,
                required: self.min_words,
            });
        }

        let n = self.samples.len() as f64;
        let total = total_words as f64;

        let mut values = BTreeMap::new();
        let mut confidence = BTreeMap::new();
        for &feature in Feature::ALL {
            // Word-count weighted mean.
            let mean: f64 = self
                .samples
                .iter()
                .map(|s| s.vector.get(feature) * s.words as f64)
                .sum::<f64>()
                / total;

            // Word-count weighted variance across samples.
            let variance: f64 = self
                .samples
                .iter()
                .map(|s| (s.vector.get(feature) - mean).powi(2) * s.words as f64)
                .sum::<f64>()
                / total;

            // Rises with sample count, falls with spread. Bounded (0,1).
            let weight = (n / (n + 1.0)) / (1.0 + SPREAD_GAIN * variance);

            values.insert(feature, mean);
            confidence.insert(feature, weight);
        }

        Ok(AuthorialSignature {
            id: Uuid::new_v4().to_string(),
            user: self.user.clone(),
            version,
            created_at: format_iso8601(
                SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default(),
            ),
            vector: FeatureVector::from_values(values),
            confidence,
            common_phrases: recurring_phrases(&self.samples),
            sample_words: total_words,
            sample_count: self.samples.len(),
        })
    }
}

/// Two- and three-word token phrases that recur across the samples,
/// excluding runs made entirely of function words. Most frequent first;
/// ties break alphabetically so the list is deterministic.
fn recurring_phrases(samples: &[Sample]) -> Vec<String> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for sample in samples {
        for n in 2..=3 {
            for window in sample.tokens.windows(n) {
                if window.iter().all(|t| text::is_function_word(t)) {
                    continue;
                }
                *counts.entry(window.join(" ")).or_default() += 1;
            }
        }
    }
    let mut phrases: Vec<(String, usize)> = counts
        .into_iter()
        .filter(|&(_, count)| count >= PHRASE_MIN_COUNT)
        .collect();
    phrases.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    phrases.truncate(MAX_COMMON_PHRASES);
    phrases.into_iter().map(|(phrase, _)| phrase).collect()
}

// ---------------------------------------------------------------------------
// Timestamp helpers
// ---------------------------------------------------------------------------

/// Format a duration-since-epoch as a full ISO-8601 timestamp.
/// Example: `2026-02-15T01:30:00Z`
pub(crate) fn format_iso8601(since_epoch: Duration) -> String {
    let secs = since_epoch.as_secs();
    let (year, month, day, hour, min, sec) = secs_to_utc(secs);
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        year, month, day, hour, min, sec
    )
}

/// Convert seconds since Unix epoch to (year, month, day, hour, minute,
/// second) UTC. No leap second handling.
fn secs_to_utc(secs: u64) -> (u64, u64, u64, u64, u64, u64) {
    let sec = secs % 60;
    let min = (secs / 60) % 60;
    let hour = (secs / 3600) % 24;

    let mut days = secs / 86400;
    let mut year = 1970u64;

    loop {
        let days_in_year = if is_leap(year) { 366 } else { 365 };
        if days < days_in_year {
            break;
        }
        days -= days_in_year;
        year += 1;
    }

    let months_days: [u64; 12] = if is_leap(year) {
        [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    } else {
        [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    };

    let mut month = 0u64;
    for (i, &md) in months_days.iter().enumerate() {
        if days < md {
            month = i as u64 + 1;
            break;
        }
        days -= md;
    }
    let day = days + 1;

    (year, month, day, hour, min, sec)
}

fn is_leap(year: u64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_sample(sentences: usize) -> String {
        let mut s = String::new();
        for i in 0..sentences {
            s.push_str("The quiet library held countless forgotten stories; readers came ");
            s.push_str(if i % 2 == 0 { "daily" } else { "rarely" });
            s.push_str(" to borrow them. ");
        }
        s
    }

    // -----------------------------------------------------------------------
    // Threshold tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_insufficient_sample_surfaced() {
        let mut b = SignatureBuilder::new("u1");
        b.add_text("Only a few words here.").unwrap();
        match b.build(1) {
            Err(Error::InsufficientSample { words, required }) => {
                assert!(words < required);
                assert_eq!(required, MIN_SAMPLE_WORDS);
            }
            other => panic!("expected InsufficientSample, got {other:?}"),
        }
    }

    #[test]
    fn test_sufficient_sample_builds() {
        let mut b = SignatureBuilder::new("u1");
        b.add_text(&long_sample(10)).unwrap();
        let sig = b.build(1).unwrap();
        assert_eq!(sig.user, "u1");
        assert_eq!(sig.version, 1);
        assert_eq!(sig.sample_count, 1);
        assert!(sig.sample_words >= MIN_SAMPLE_WORDS);
    }

    // -----------------------------------------------------------------------
    // Aggregation tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_aggregate_is_weighted_mean() {
        use crate::features::Feature;
        use std::collections::BTreeMap;

        let mut a = BTreeMap::new();
        a.insert(Feature::LexicalDiversity, 0.2);
        let mut c = BTreeMap::new();
        c.insert(Feature::LexicalDiversity, 0.8);

        let mut b = SignatureBuilder::new("u").with_min_words(1);
        b.add_vector(FeatureVector::from_values(a), 100);
        b.add_vector(FeatureVector::from_values(c), 300);
        let sig = b.build(1).unwrap();

        // (0.2*100 + 0.8*300) / 400 = 0.65
        assert!((sig.vector.get(Feature::LexicalDiversity) - 0.65).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_monotonic_with_consistent_samples() {
        // Identical samples: variance stays 0, confidence must only grow.
        let sample = long_sample(6);
        let mut prev = 0.0;
        for n in 1..=5 {
            let mut b = SignatureBuilder::new("u");
            for _ in 0..n {
                b.add_text(&sample).unwrap();
            }
            let sig = b.build(1).unwrap();
            let conf = sig.confidence(Feature::SentenceMean);
            assert!(
                conf > prev,
                "confidence did not grow: n={n}, {conf} <= {prev}"
            );
            prev = conf;
        }
    }

    #[test]
    fn test_confidence_falls_with_spread() {
        use std::collections::BTreeMap;

        let mk = |v: f64| {
            let mut m = BTreeMap::new();
            m.insert(Feature::CommaRate, v);
            FeatureVector::from_values(m)
        };

        let mut tight = SignatureBuilder::new("u").with_min_words(1);
        tight.add_vector(mk(0.50), 100);
        tight.add_vector(mk(0.52), 100);

        let mut loose = SignatureBuilder::new("u").with_min_words(1);
        loose.add_vector(mk(0.10), 100);
        loose.add_vector(mk(0.90), 100);

        let c_tight = tight.build(1).unwrap().confidence(Feature::CommaRate);
        let c_loose = loose.build(1).unwrap().confidence(Feature::CommaRate);
        assert!(c_tight > c_loose);
    }

    #[test]
    fn test_uniform_semicolon_sample_high_confidence() {
        // 500+ words of short, uniform, semicolon-heavy sentences must give
        // high confidence on sentence-length and punctuation features.
        let mut b = SignatureBuilder::new("u");
        let text = long_sample(60); // ~12 words/sentence, all with semicolons
        assert!(crate::features::word_count(&text) > 500);
        b.add_text(&text).unwrap();
        b.add_text(&text).unwrap();
        let sig = b.build(1).unwrap();

        assert!(sig.confidence(Feature::SentenceMean) > 0.6);
        assert!(sig.confidence(Feature::SemicolonRate) > 0.6);
        assert!(sig.vector.get(Feature::SemicolonRate) > 0.0);
    }

    // -----------------------------------------------------------------------
    // Recurring phrases
    // -----------------------------------------------------------------------

    #[test]
    fn test_common_phrases_surface_repetition() {
        let mut b = SignatureBuilder::new("u");
        let sample = long_sample(10);
        b.add_text(&sample).unwrap();
        let sig = b.build(1).unwrap();

        assert!(!sig.common_phrases.is_empty());
        assert!(sig.common_phrases.len() <= 5);
        // Every reported phrase actually occurs in the sample.
        let lowered = sample.to_lowercase();
        for phrase in &sig.common_phrases {
            assert!(lowered.contains(phrase), "phrase not in sample: {phrase}");
        }
        // And none is made purely of function words.
        for phrase in &sig.common_phrases {
            assert!(
                !phrase
                    .split(' ')
                    .all(|t| crate::text::is_function_word(t)),
                "all-function-word phrase kept: {phrase}"
            );
        }
    }

    #[test]
    fn test_common_phrases_need_recurrence() {
        // One pass of mostly unique prose: nothing repeats twice.
        let mut b = SignatureBuilder::new("u").with_min_words(1);
        b.add_text(
            "Seven cormorants crossed above the weir at dusk while barges \
             unloaded gravel downstream near an abandoned signal box.",
        )
        .unwrap();
        let sig = b.build(1).unwrap();
        assert!(sig.common_phrases.is_empty());
    }

    #[test]
    fn test_add_vector_contributes_no_phrases() {
        use std::collections::BTreeMap;
        let mut m = BTreeMap::new();
        m.insert(Feature::LexicalDiversity, 0.5);
        let mut b = SignatureBuilder::new("u").with_min_words(1);
        b.add_vector(FeatureVector::from_values(m), 200);
        let sig = b.build(1).unwrap();
        assert!(sig.common_phrases.is_empty());
    }

    // -----------------------------------------------------------------------
    // Serialization round-trip
    // -----------------------------------------------------------------------

    #[test]
    fn test_signature_json_roundtrip() {
        let mut b = SignatureBuilder::new("alice");
        b.add_text(&long_sample(10)).unwrap();
        let sig = b.build(3).unwrap();

        let json = serde_json::to_string_pretty(&sig).unwrap();
        let parsed: AuthorialSignature = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.user, "alice");
        assert_eq!(parsed.version, 3);
        assert_eq!(parsed.vector, sig.vector);
    }

    // -----------------------------------------------------------------------
    // Timestamp helpers
    // -----------------------------------------------------------------------

    #[test]
    fn test_format_iso8601_epoch() {
        assert_eq!(format_iso8601(Duration::from_secs(0)), "1970-01-01T00:00:00Z");
    }

    #[test]
    fn test_secs_to_utc_known_date() {
        // 2000-01-01 00:00:00 UTC = 946684800
        let (y, m, d, h, mi, s) = secs_to_utc(946684800);
        assert_eq!((y, m, d, h, mi, s), (2000, 1, 1, 0, 0, 0));
    }

    #[test]
    fn test_is_leap() {
        assert!(is_leap(2000));
        assert!(is_leap(2024));
        assert!(!is_leap(1900));
        assert!(!is_leap(2023));
    }
}
