//! Aegis scoring: authenticity/undetectability rating for a piece of text.
//!
//! Three independently computed sub-metrics, each bounded to [0,100]:
//!
//! - **signature_fidelity** — how close the text's feature vector sits to a
//!   reference signature, weighted by the signature's per-feature
//!   confidence. Omitted (weight redistributed) when no signature is given.
//! - **detectability_risk** — composite over features that correlate with
//!   generated-text artifacts: low sentence-length burstiness, repeated
//!   rare n-grams, compression redundancy, lexical flatness. Higher
//!   uniformity lowers the score.
//! - **fluency** — local coherence heuristic: transition-word density band
//!   plus a repetition penalty across adjacent sentences.
//!
//! The overall score is the configured weighted sum, clamped to [0,100].
//! Scoring is a pure function: same (text, signature, config) always
//! produces a bit-identical rating. The heuristics here make no claim
//! about any specific external detector.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::features::{self, Feature, FeatureVector};
use crate::signature::AuthorialSignature;
use crate::text;

/// Weighted feature distance of this magnitude or more scores 0 fidelity.
const FIDELITY_GAIN: f64 = 4.0;
/// Sentence-length CV below this reads as machine-uniform.
const BURSTINESS_FLOOR: f64 = 0.35;
/// Compression ratio below this reads as redundant/templated.
const REDUNDANCY_FLOOR: f64 = 0.45;
/// Type-token ratio below this reads as lexically flat.
const DIVERSITY_FLOOR: f64 = 0.40;
/// n-gram size for the repetition probe.
const NGRAM_N: usize = 4;

/// Sub-metrics of the Aegis rating.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SubMetric {
    SignatureFidelity,
    DetectabilityRisk,
    Fluency,
}

impl SubMetric {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SignatureFidelity => "signature_fidelity",
            Self::DetectabilityRisk => "detectability_risk",
            Self::Fluency => "fluency",
        }
    }
}

impl std::fmt::Display for SubMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Scoring configuration: sub-metric weights and acceptance threshold.
///
/// Weights are normalized over the sub-metrics actually computed, so they
/// need not sum to 1 and fidelity's weight redistributes proportionally
/// when no reference signature is supplied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreConfig {
    pub weight_fidelity: f64,
    pub weight_detectability: f64,
    pub weight_fluency: f64,
    /// A rating passes when `overall >= threshold`.
    pub threshold: f64,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            weight_fidelity: 0.40,
            weight_detectability: 0.35,
            weight_fluency: 0.25,
            threshold: 85.0,
        }
    }
}

/// Sub-metric weights as a unit, for per-request overrides.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub fidelity: f64,
    pub detectability: f64,
    pub fluency: f64,
}

impl ScoreConfig {
    /// Replace the weights, keeping the threshold.
    pub fn set_weights(&mut self, weights: ScoreWeights) {
        self.weight_fidelity = weights.fidelity;
        self.weight_detectability = weights.detectability;
        self.weight_fluency = weights.fluency;
    }
}

/// Composite authenticity rating. Never mutated after creation; always
/// derived from exactly one text and one scoring configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AegisRating {
    /// Weighted overall score in [0,100].
    pub overall: f64,
    /// Per-sub-metric scores in [0,100]. Fidelity absent when unscored.
    pub sub_scores: BTreeMap<SubMetric, f64>,
    /// Threshold the pass flag was evaluated against.
    pub threshold: f64,
    /// `overall >= threshold`, exactly.
    pub passed: bool,
}

impl AegisRating {
    pub fn sub_score(&self, m: SubMetric) -> Option<f64> {
        self.sub_scores.get(&m).copied()
    }
}

/// Score text against an optional reference signature.
///
/// Fails with `InvalidInput` on empty/wordless text (via extraction);
/// otherwise always produces a bounded rating.
pub fn score(
    input: &str,
    signature: Option<&AuthorialSignature>,
    config: &ScoreConfig,
) -> Result<AegisRating> {
    let vector = features::extract(input)?;
    Ok(score_vector(input, &vector, signature, config))
}

/// Score with a pre-extracted vector (the calibration loop measures each
/// candidate once and reuses the vector here).
pub fn score_vector(
    input: &str,
    vector: &FeatureVector,
    signature: Option<&AuthorialSignature>,
    config: &ScoreConfig,
) -> AegisRating {
    let mut sub_scores = BTreeMap::new();
    let mut weighted = 0.0;
    let mut total_weight = 0.0;

    if let Some(sig) = signature {
        let s = fidelity_score(vector, sig);
        sub_scores.insert(SubMetric::SignatureFidelity, s);
        weighted += s * config.weight_fidelity;
        total_weight += config.weight_fidelity;
    }

    let detect = detectability_score(input, vector);
    sub_scores.insert(SubMetric::DetectabilityRisk, detect);
    weighted += detect * config.weight_detectability;
    total_weight += config.weight_detectability;

    let fluency = fluency_score(input);
    sub_scores.insert(SubMetric::Fluency, fluency);
    weighted += fluency * config.weight_fluency;
    total_weight += config.weight_fluency;

    let overall = if total_weight > 0.0 {
        (weighted / total_weight).clamp(0.0, 100.0)
    } else {
        0.0
    };

    AegisRating {
        overall,
        sub_scores,
        threshold: config.threshold,
        passed: overall >= config.threshold,
    }
}

// ---------------------------------------------------------------------------
// Sub-metric: signature fidelity
// ---------------------------------------------------------------------------

/// 100 · (1 − gain · weighted Euclidean distance), clamped to [0,100].
///
/// The signature's confidence weights scale each feature's contribution:
/// deviation on a high-confidence feature costs more.
pub fn fidelity_score(vector: &FeatureVector, sig: &AuthorialSignature) -> f64 {
    let mut sum = 0.0;
    let mut weight_sum = 0.0;
    for &f in Feature::ALL {
        let w = sig.confidence(f);
        let d = vector.get(f) - sig.vector.get(f);
        sum += w * d * d;
        weight_sum += w;
    }
    if weight_sum <= 0.0 {
        return 0.0;
    }
    let distance = (sum / weight_sum).sqrt();
    (100.0 * (1.0 - FIDELITY_GAIN * distance)).clamp(0.0, 100.0)
}

// ---------------------------------------------------------------------------
// Sub-metric: detectability risk
// ---------------------------------------------------------------------------

/// Individual artifact probes, exposed for the calibration loop's feedback.
#[derive(Debug, Clone, Serialize)]
pub struct DetectabilityBreakdown {
    /// Risk from sentence lengths being too uniform (low burstiness).
    pub uniformity: f64,
    /// Risk from repeated rare n-grams.
    pub ngram_repetition: f64,
    /// Risk from compression redundancy (templated text compresses well).
    pub redundancy: f64,
    /// Risk from a flat vocabulary.
    pub lexical_flatness: f64,
}

impl DetectabilityBreakdown {
    pub fn composite(&self) -> f64 {
        (self.uniformity + self.ngram_repetition + self.redundancy + self.lexical_flatness) / 4.0
    }
}

/// Probe the text for generated-text artifacts. Each risk is in [0,1].
pub fn detectability_breakdown(input: &str, vector: &FeatureVector) -> DetectabilityBreakdown {
    let cv = vector.get(Feature::SentenceBurstiness) * features::BURSTINESS_SCALE;
    let uniformity = ((BURSTINESS_FLOOR - cv) / BURSTINESS_FLOOR).clamp(0.0, 1.0);

    let ngram_repetition = (repeated_ngram_rate(input, NGRAM_N) * 6.0).clamp(0.0, 1.0);

    let ratio = compression_ratio(input);
    let redundancy = ((REDUNDANCY_FLOOR - ratio) / REDUNDANCY_FLOOR).clamp(0.0, 1.0);

    let diversity = vector.get(Feature::LexicalDiversity);
    let lexical_flatness = ((DIVERSITY_FLOOR - diversity) / DIVERSITY_FLOOR).clamp(0.0, 1.0);

    DetectabilityBreakdown {
        uniformity,
        ngram_repetition,
        redundancy,
        lexical_flatness,
    }
}

fn detectability_score(input: &str, vector: &FeatureVector) -> f64 {
    let risk = detectability_breakdown(input, vector).composite();
    (100.0 * (1.0 - risk)).clamp(0.0, 100.0)
}

/// Fraction of n-gram occurrences that are repeats of an already-seen
/// n-gram. 0 for text shorter than n words.
pub fn repeated_ngram_rate(input: &str, n: usize) -> f64 {
    let tokens = text::tokenize(input);
    if tokens.len() < n || n == 0 {
        return 0.0;
    }
    let mut counts: HashMap<&[String], usize> = HashMap::new();
    let total = tokens.len() - n + 1;
    for window in tokens.windows(n) {
        *counts.entry(window).or_insert(0) += 1;
    }
    let repeats: usize = counts.values().map(|&c| c.saturating_sub(1)).sum();
    repeats as f64 / total as f64
}

/// Zlib compression ratio (compressed / original). Lower means more
/// redundant. 1.0 for empty input.
pub fn compression_ratio(input: &str) -> f64 {
    let bytes = input.as_bytes();
    if bytes.is_empty() {
        return 1.0;
    }
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(bytes).unwrap_or_default();
    let compressed = encoder.finish().unwrap_or_default();
    compressed.len() as f64 / bytes.len() as f64
}

// ---------------------------------------------------------------------------
// Sub-metric: fluency
// ---------------------------------------------------------------------------

/// Transition-word density band plus adjacent-sentence repetition penalty.
fn fluency_score(input: &str) -> f64 {
    let sentences = text::split_sentences(input);
    if sentences.is_empty() {
        return 0.0;
    }

    let density = transition_density(&sentences);
    // Full credit inside [0.05, 0.6] transitions per sentence; linear
    // falloff outside (none at all reads as disjointed, every sentence
    // opening with "however" reads as mechanical).
    let band = if density < 0.05 {
        density / 0.05
    } else if density > 0.6 {
        (1.0 - (density - 0.6) / 0.4).max(0.0)
    } else {
        1.0
    };

    let overlap = adjacent_overlap(&sentences);
    let repetition_penalty = (overlap * 2.0).clamp(0.0, 1.0);

    (100.0 * (band + (1.0 - repetition_penalty)) / 2.0).clamp(0.0, 100.0)
}

/// Transition words per sentence.
pub fn transition_density(sentences: &[&str]) -> f64 {
    if sentences.is_empty() {
        return 0.0;
    }
    let hits: usize = sentences
        .iter()
        .map(|s| {
            text::tokenize(s)
                .iter()
                .filter(|t| text::TRANSITIONS.contains(&t.as_str()))
                .count()
        })
        .sum();
    hits as f64 / sentences.len() as f64
}

/// Mean Jaccard overlap of content-word sets between adjacent sentences.
pub fn adjacent_overlap(sentences: &[&str]) -> f64 {
    if sentences.len() < 2 {
        return 0.0;
    }
    let sets: Vec<HashSet<String>> = sentences
        .iter()
        .map(|s| {
            text::tokenize(s)
                .into_iter()
                .filter(|t| !text::is_function_word(t))
                .collect()
        })
        .collect();

    let mut total = 0.0;
    let mut pairs = 0usize;
    for pair in sets.windows(2) {
        let inter = pair[0].intersection(&pair[1]).count();
        let union = pair[0].union(&pair[1]).count();
        if union > 0 {
            total += inter as f64 / union as f64;
            pairs += 1;
        }
    }
    if pairs == 0 { 0.0 } else { total / pairs as f64 }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
