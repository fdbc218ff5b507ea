//! Candidate generation adapter.
//!
//! The engine never talks to a text-generation backend directly. Every
//! provider implements [`CandidateGenerator`]: metadata via
//! [`GeneratorInfo`], availability checking, and a single `generate` call
//! that returns raw candidate text. The adapter performs no scoring and no
//! retries — those belong to the calibration loop, which requests multiple
//! independent candidates by varying the attempt seed.
//!
//! [`StencilGenerator`] is the built-in provider: a deterministic,
//! tone-templated composer seeded from (prompt, tone, seed). It exists so
//! the whole pipeline runs offline and so tests get bit-reproducible
//! candidates; a networked provider satisfies the same trait.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::features::{self, Feature, FeatureVector};
use crate::signature::AuthorialSignature;
use crate::text;

/// Closed set of generation tones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Formal,
    Casual,
    Persuasive,
    Narrative,
    Technical,
}

impl Tone {
    pub const ALL: &'static [Tone] = &[
        Tone::Formal,
        Tone::Casual,
        Tone::Persuasive,
        Tone::Narrative,
        Tone::Technical,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Formal => "formal",
            Self::Casual => "casual",
            Self::Persuasive => "persuasive",
            Self::Narrative => "narrative",
            Self::Technical => "technical",
        }
    }
}

impl std::fmt::Display for Tone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Tone {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "formal" => Ok(Self::Formal),
            "casual" => Ok(Self::Casual),
            "persuasive" => Ok(Self::Persuasive),
            "narrative" => Ok(Self::Narrative),
            "technical" => Ok(Self::Technical),
            other => Err(Error::InvalidTone(other.to_string())),
        }
    }
}

/// Style targets handed to the provider, derived from a signature and
/// adjusted between iterations by the calibration loop's score feedback.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StyleHints {
    /// Target mean words per sentence.
    pub sentence_words: Option<f64>,
    /// Target type-token ratio.
    pub lexical_diversity: Option<f64>,
    /// Target semicolons per word.
    pub semicolon_rate: Option<f64>,
    /// Target sentence-length coefficient of variation.
    pub burstiness: Option<f64>,
    /// Feedback nudge: vary sentence rhythm harder (detectability shortfall).
    pub vary_rhythm: bool,
    /// Feedback nudge: lean on transition words (fluency shortfall).
    pub strengthen_transitions: bool,
    /// Recurring phrases from the signature, for the provider to weave in.
    pub common_phrases: Vec<String>,
}

impl StyleHints {
    /// Derive hints from a signature's aggregate vector, de-normalizing the
    /// features the provider can act on.
    pub fn from_signature(sig: &AuthorialSignature) -> Self {
        let v: &FeatureVector = &sig.vector;
        Self {
            sentence_words: Some(v.get(Feature::SentenceMean) * features::SENTENCE_MEAN_SCALE),
            lexical_diversity: Some(v.get(Feature::LexicalDiversity)),
            semicolon_rate: Some(v.get(Feature::SemicolonRate)),
            burstiness: Some(v.get(Feature::SentenceBurstiness) * features::BURSTINESS_SCALE),
            vary_rhythm: false,
            strengthen_transitions: false,
            common_phrases: sig.common_phrases.iter().take(3).cloned().collect(),
        }
    }
}

/// One generation attempt: everything a provider needs, nothing it may
/// not have (no signature internals, no scoring state).
#[derive(Debug, Clone)]
pub struct CandidateRequest {
    pub prompt: String,
    pub tone: Tone,
    /// Upper bound on generated words.
    pub target_words: usize,
    /// Attempt seed; the loop guarantees seeds are unique per run.
    pub seed: u64,
    pub hints: StyleHints,
}

/// Metadata about a generation provider.
#[derive(Debug, Clone)]
pub struct GeneratorInfo {
    /// Unique identifier (e.g. `"stencil"`).
    pub name: &'static str,
    /// One-line human-readable description.
    pub description: &'static str,
}

/// Trait every generation provider must implement.
pub trait CandidateGenerator: Send + Sync {
    /// Provider metadata.
    fn info(&self) -> &GeneratorInfo;

    /// Check if this provider can operate right now.
    fn is_available(&self) -> bool;

    /// Produce one candidate's raw text for the request, or fail with
    /// [`Error::GenerationUnavailable`].
    fn generate(&self, req: &CandidateRequest) -> Result<String>;

    /// Convenience: name from info.
    fn name(&self) -> &'static str {
        self.info().name
    }
}

// ---------------------------------------------------------------------------
// Built-in deterministic provider
// ---------------------------------------------------------------------------

/// Deterministic tone-templated composer.
///
/// Same (prompt, tone, seed, hints) always yields the same text: the RNG is
/// seeded with SHA-256(prompt || tone || seed), and hint fields only shift
/// sampling parameters, never introduce outside state.
pub struct StencilGenerator {
    info: GeneratorInfo,
}

impl Default for StencilGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl StencilGenerator {
    pub fn new() -> Self {
        Self {
            info: GeneratorInfo {
                name: "stencil",
                description: "deterministic tone-templated composer (offline provider)",
            },
        }
    }

    fn rng_for(req: &CandidateRequest) -> StdRng {
        let mut h = Sha256::new();
        h.update(req.prompt.as_bytes());
        h.update(req.tone.name().as_bytes());
        h.update(req.seed.to_le_bytes());
        let digest: [u8; 32] = h.finalize().into();
        StdRng::from_seed(digest)
    }

    /// Content words from the prompt, cycled into sentences to stay on topic.
    fn topic_words(prompt: &str) -> Vec<String> {
        let words: Vec<String> = text::tokenize(prompt)
            .into_iter()
            .filter(|t| !text::is_function_word(t) && t.len() > 2)
            .collect();
        if words.is_empty() {
            vec!["subject".to_string()]
        } else {
            words
        }
    }
}

/// Tone-specific clause fragments. Each row is (opener, connective verb
/// phrase, closing phrase); sentence assembly samples across rows.
fn tone_bank(tone: Tone) -> (&'static [&'static str], &'static [&'static str]) {
    match tone {
        Tone::Formal => (
            &[
                "It must be acknowledged that",
                "One observes that",
                "It remains the case that",
                "Upon reflection,",
                "In careful terms,",
            ],
            &[
                "merits sustained attention",
                "warrants closer examination",
                "admits no simple summary",
                "rests on established ground",
                "invites measured judgment",
            ],
        ),
        Tone::Casual => (
            &[
                "Honestly,",
                "Look,",
                "Here's the thing:",
                "You know,",
                "Funny enough,",
            ],
            &[
                "just works that way",
                "keeps coming up",
                "is easier than it sounds",
                "surprised me too",
                "makes sense once you try it",
            ],
        ),
        Tone::Persuasive => (
            &[
                "Consider that",
                "The evidence shows that",
                "No one disputes that",
                "It follows that",
                "Ask yourself whether",
            ],
            &[
                "demands action now",
                "cannot be ignored",
                "changes the calculation",
                "deserves your support",
                "settles the question",
            ],
        ),
        Tone::Narrative => (
            &[
                "That morning,",
                "Later,",
                "For a long while,",
                "Quietly,",
                "By evening,",
            ],
            &[
                "waited in the half-light",
                "had changed without notice",
                "carried its own weight",
                "lingered at the edges",
                "settled into memory",
            ],
        ),
        Tone::Technical => (
            &[
                "In practice,",
                "Measured end to end,",
                "Under load,",
                "At the interface,",
                "By construction,",
            ],
            &[
                "behaves deterministically",
                "bounds the worst case",
                "isolates each component",
                "preserves the invariant",
                "reduces to a known problem",
            ],
        ),
    }
}

impl CandidateGenerator for StencilGenerator {
    fn info(&self) -> &GeneratorInfo {
        &self.info
    }

    fn is_available(&self) -> bool {
        true
    }

    fn generate(&self, req: &CandidateRequest) -> Result<String> {
        if req.prompt.trim().is_empty() {
            return Err(Error::InvalidInput("prompt is empty".into()));
        }
        let mut rng = Self::rng_for(req);
        let topics = Self::topic_words(&req.prompt);
        let (openers, closers) = tone_bank(req.tone);

        let target_sentence = req.hints.sentence_words.unwrap_or(14.0).clamp(4.0, 40.0);
        let semicolon_rate = req.hints.semicolon_rate.unwrap_or(0.0);
        let burst = req
            .hints
            .burstiness
            .unwrap_or(0.4)
            .max(if req.hints.vary_rhythm { 0.6 } else { 0.0 });

        let mut out = String::new();
        let mut words = 0usize;
        let mut semicolons = 0usize;
        let mut sentence_idx = 0usize;
        while words < req.target_words {
            // Alternate sentence lengths around the target; higher burstiness
            // swings wider.
            let swing = 1.0 + burst * if sentence_idx % 2 == 0 { 0.6 } else { -0.6 };
            let budget = ((target_sentence * swing).round() as usize).max(3);

            let transition = req.hints.strengthen_transitions && sentence_idx > 0
                || (sentence_idx > 0 && rng.random_range(0..4) == 0);
            let mut sentence = String::new();
            if transition {
                let t = text::TRANSITIONS[rng.random_range(0..text::TRANSITIONS.len())];
                sentence.push_str(&capitalize(t));
                sentence.push_str(", ");
            }

            let mut clause_words = 0usize;
            let mut first_clause = true;
            while clause_words < budget {
                let opener = openers[rng.random_range(0..openers.len())];
                // Each sentence leads with one of the author's recurring
                // phrases when the hints carry any, rotating through them.
                let phrases = &req.hints.common_phrases;
                let topic: &str = if first_clause && !phrases.is_empty() {
                    &phrases[sentence_idx % phrases.len()]
                } else {
                    &topics[rng.random_range(0..topics.len())]
                };
                let closer = closers[rng.random_range(0..closers.len())];

                let clause = format!("{opener} the {topic} {closer}");
                if first_clause {
                    if sentence.is_empty() {
                        sentence.push_str(&capitalize(&clause));
                    } else {
                        sentence.push_str(&clause);
                    }
                    first_clause = false;
                } else if (semicolons as f64) < semicolon_rate * (words + clause_words) as f64 {
                    // Rate controller: emit semicolons until the running
                    // per-word rate catches up with the hint.
                    sentence.push_str("; ");
                    sentence.push_str(&clause);
                    semicolons += 1;
                } else {
                    sentence.push_str(", and ");
                    sentence.push_str(&clause);
                }
                clause_words += text::tokenize(&clause).len();
            }
            sentence.push('.');

            words += text::tokenize(&sentence).len();
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&sentence);
            sentence_idx += 1;
        }

        Ok(out)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn req(seed: u64) -> CandidateRequest {
        CandidateRequest {
            prompt: "the history of mechanical clocks".to_string(),
            tone: Tone::Narrative,
            target_words: 80,
            seed,
            hints: StyleHints::default(),
        }
    }

    // -----------------------------------------------------------------------
    // Tone parsing
    // -----------------------------------------------------------------------

    #[test]
    fn test_tone_parse_roundtrip() {
        for &tone in Tone::ALL {
            let parsed: Tone = tone.name().parse().unwrap();
            assert_eq!(parsed, tone);
        }
    }

    #[test]
    fn test_tone_parse_invalid() {
        let err = "sarcastic".parse::<Tone>().unwrap_err();
        assert!(matches!(err, Error::InvalidTone(_)));
    }

    #[test]
    fn test_tone_parse_case_insensitive() {
        assert_eq!("Formal".parse::<Tone>().unwrap(), Tone::Formal);
    }

    // -----------------------------------------------------------------------
    // Stencil determinism
    // -----------------------------------------------------------------------

    #[test]
    fn test_stencil_deterministic() {
        let g = StencilGenerator::new();
        let a = g.generate(&req(7)).unwrap();
        let b = g.generate(&req(7)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_stencil_seed_varies_output() {
        let g = StencilGenerator::new();
        let a = g.generate(&req(1)).unwrap();
        let b = g.generate(&req(2)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_stencil_respects_word_budget() {
        let g = StencilGenerator::new();
        let text = g.generate(&req(3)).unwrap();
        let n = crate::features::word_count(&text);
        assert!(n >= 80, "too short: {n}");
        // One sentence of overshoot is allowed; it must not run away.
        assert!(n < 160, "too long: {n}");
    }

    #[test]
    fn test_stencil_empty_prompt_rejected() {
        let g = StencilGenerator::new();
        let mut r = req(0);
        r.prompt = "   ".to_string();
        assert!(matches!(g.generate(&r), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_stencil_uses_prompt_topic() {
        let g = StencilGenerator::new();
        let text = g.generate(&req(5)).unwrap().to_lowercase();
        assert!(
            text.contains("clocks") || text.contains("mechanical") || text.contains("history"),
            "candidate never mentions the topic"
        );
    }

    #[test]
    fn test_stencil_semicolon_hint() {
        let g = StencilGenerator::new();
        let mut r = req(11);
        r.target_words = 150;
        r.hints.semicolon_rate = Some(0.08);
        r.hints.sentence_words = Some(24.0);
        let text = g.generate(&r).unwrap();
        assert!(text.contains(';'), "semicolon hint had no effect");
    }

    #[test]
    fn test_stencil_weaves_common_phrases() {
        let g = StencilGenerator::new();
        let mut r = req(13);
        r.hints.common_phrases = vec!["winter ledger".to_string()];
        let text = g.generate(&r).unwrap().to_lowercase();
        assert!(text.contains("winter ledger"));
    }

    // -----------------------------------------------------------------------
    // Hints from signature
    // -----------------------------------------------------------------------

    #[test]
    fn test_hints_from_signature_denormalizes() {
        use crate::signature::SignatureBuilder;
        let mut b = SignatureBuilder::new("u").with_min_words(1);
        b.add_text(
            "Short lines here; always short. More short lines; still short. \
             Again short here; kept short.",
        )
        .unwrap();
        let sig = b.build(1).unwrap();
        let hints = StyleHints::from_signature(&sig);
        let mean = hints.sentence_words.unwrap();
        assert!(mean > 2.0 && mean < 12.0, "mean = {mean}");
        assert!(hints.semicolon_rate.unwrap() > 0.0);
    }

    #[test]
    fn test_hints_carry_signature_phrases() {
        use crate::signature::SignatureBuilder;
        let mut b = SignatureBuilder::new("u").with_min_words(1);
        b.add_text(
            "The winter ledger stayed open. The winter ledger never balanced. \
             The winter ledger outlived the clerk who kept it.",
        )
        .unwrap();
        let sig = b.build(1).unwrap();
        assert!(!sig.common_phrases.is_empty());

        let hints = StyleHints::from_signature(&sig);
        assert!(!hints.common_phrases.is_empty());
        assert!(hints.common_phrases.len() <= 3);
    }
}
