//! Engine facade tying the pipeline together.
//!
//! [`ScribeEngine`] owns the signature store, the generation provider, and
//! the calibration configuration, and exposes the three top-level
//! operations the CLI and server call: `analyze`, `generate`, `score`.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use serde::{Deserialize, Serialize};

use crate::calibrate::{self, CalibrationConfig, LoopState};
use crate::error::{Error, Result};
use crate::generate::{CandidateGenerator, CandidateRequest, StencilGenerator, StyleHints, Tone};
use crate::scorer::{self, AegisRating, ScoreWeights};
use crate::signature::{AuthorialSignature, SignatureBuilder};
use crate::store::{self, SignatureStore};

/// Engine-level knobs; calibration has its own nested config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Minimum total words across a user's samples before a signature is
    /// accepted.
    pub min_sample_words: usize,
    /// Word budget used when a generation request does not name one.
    pub default_target_words: usize,
    pub calibration: CalibrationConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_sample_words: crate::signature::MIN_SAMPLE_WORDS,
            default_target_words: 150,
            calibration: CalibrationConfig::default(),
        }
    }
}

/// A generation request as callers express it: user/version select the
/// signature, everything else shapes the candidates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Signature owner; `None` generates unsigned (fidelity unscored).
    pub user: Option<String>,
    /// Signature version; `None` means latest.
    pub version: Option<u32>,
    pub prompt: String,
    pub tone: Tone,
    /// Word budget; engine default applies when absent.
    pub target_words: Option<usize>,
    /// Base seed; 0 when absent, so unseeded requests are reproducible too.
    pub seed: Option<u64>,
    /// Per-request acceptance threshold override.
    pub threshold: Option<f64>,
    /// Per-request iteration budget override.
    pub max_iterations: Option<u32>,
    /// Per-request sub-metric weight override.
    pub weights: Option<ScoreWeights>,
    /// Per-request attempts-per-iteration override.
    pub breadth: Option<usize>,
    /// Per-request generation deadline override, in seconds.
    pub timeout_secs: Option<f64>,
}

/// What a finished generation run reports back.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutcome {
    pub text: String,
    pub rating: AegisRating,
    /// `Accepted` or `Exhausted`.
    pub state: LoopState,
    pub iterations_used: u32,
    /// True when the text cleared the threshold within budget. An
    /// `Exhausted` outcome still carries the best failing candidate.
    pub accepted: bool,
    /// Seed of the winning candidate.
    pub seed: u64,
    /// Provider that produced the winner.
    pub generator: String,
    /// Signature version used, when one was.
    pub signature_version: Option<u32>,
}

/// Facade over store + provider + scorer + calibration loop.
pub struct ScribeEngine {
    store: SignatureStore,
    generator: Arc<dyn CandidateGenerator>,
    config: EngineConfig,
}

impl ScribeEngine {
    pub fn new(
        store: SignatureStore,
        generator: Arc<dyn CandidateGenerator>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            generator,
            config,
        }
    }

    /// Volatile engine with the built-in deterministic provider.
    pub fn in_memory() -> Self {
        Self::new(
            SignatureStore::in_memory(),
            Arc::new(StencilGenerator::new()),
            EngineConfig::default(),
        )
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &SignatureStore {
        &self.store
    }

    pub fn generator_name(&self) -> &'static str {
        self.generator.name()
    }

    /// Extract a signature from one or more samples and append it to the
    /// store as the user's next version.
    pub fn analyze(&self, user: &str, samples: &[&str]) -> Result<AuthorialSignature> {
        store::validate_user(user)?;
        if samples.is_empty() {
            return Err(Error::InvalidInput(
                "at least one sample text is required".to_string(),
            ));
        }
        let mut builder =
            SignatureBuilder::new(user).with_min_words(self.config.min_sample_words);
        for sample in samples {
            builder.add_text(sample)?;
        }
        let version = self.store.next_version(user);
        let signature = builder.build(version)?;
        self.store.append(signature.clone())?;
        Ok(signature)
    }

    /// Run the calibration loop for a request.
    ///
    /// `cancel` lets a caller abort between iterations (Ctrl-C, dropped
    /// connection); a run cancelled after producing candidates still
    /// reports its best one.
    pub fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &AtomicBool,
    ) -> Result<GenerationOutcome> {
        if request.prompt.trim().is_empty() {
            return Err(Error::InvalidInput("prompt must not be empty".to_string()));
        }

        let signature = match &request.user {
            Some(user) => Some(self.store.get(user, request.version)?),
            None => None,
        };
        let hints = signature
            .as_ref()
            .map(StyleHints::from_signature)
            .unwrap_or_default();

        let base = CandidateRequest {
            prompt: request.prompt.clone(),
            tone: request.tone,
            target_words: request
                .target_words
                .unwrap_or(self.config.default_target_words),
            seed: request.seed.unwrap_or(0),
            hints,
        };

        let mut calibration = self.config.calibration.clone();
        if let Some(threshold) = request.threshold {
            calibration.score.threshold = threshold;
        }
        if let Some(budget) = request.max_iterations {
            calibration.max_iterations = budget;
        }
        if let Some(weights) = request.weights {
            calibration.score.set_weights(weights);
        }
        if let Some(breadth) = request.breadth {
            calibration.breadth = breadth;
        }
        if let Some(timeout) = request.timeout_secs {
            calibration.attempt_timeout_secs = timeout;
        }

        let report = calibrate::run(
            &self.generator,
            &base,
            signature.as_ref(),
            &calibration,
            cancel,
        )?;

        Ok(GenerationOutcome {
            accepted: report.accepted(),
            text: report.best.text,
            rating: report.best.rating,
            state: report.state,
            iterations_used: report.iterations_used,
            seed: report.best.seed,
            generator: report.best.generator,
            signature_version: signature.map(|s| s.version),
        })
    }

    /// Score arbitrary text, optionally against a stored signature.
    pub fn score(
        &self,
        text: &str,
        user: Option<&str>,
        version: Option<u32>,
    ) -> Result<AegisRating> {
        let signature = match user {
            Some(u) => Some(self.store.get(u, version)?),
            None => None,
        };
        scorer::score(text, signature.as_ref(), &self.config.calibration.score)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
