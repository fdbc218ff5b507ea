//! # stealthscribe-core
//!
//! **Write like you, on demand.**
//!
//! `stealthscribe-core` extracts a stylometric *authorial signature* from a
//! user's sample text, generates new text calibrated to that signature and a
//! requested tone, and scores any text with a deterministic 0–100 *Aegis
//! rating* estimating how authentically human-authored it reads.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//! use stealthscribe_core::{GenerationRequest, ScribeEngine, Tone};
//!
//! let engine = ScribeEngine::in_memory();
//!
//! // Learn a signature from a writing sample (>= 50 words).
//! let sample = "..."; // the user's own prose
//! let signature = engine.analyze("ada", &[sample])?;
//! println!("signature v{} stored", signature.version);
//!
//! // Generate calibrated text.
//! let cancel = AtomicBool::new(false);
//! let outcome = engine.generate(
//!     &GenerationRequest {
//!         user: Some("ada".to_string()),
//!         version: None,
//!         prompt: "why canal towns declined".to_string(),
//!         tone: Tone::Narrative,
//!         target_words: Some(150),
//!         seed: None,
//!         threshold: None,
//!         max_iterations: None,
//!         weights: None,
//!         breadth: None,
//!         timeout_secs: None,
//!     },
//!     &cancel,
//! )?;
//! println!("aegis {:.1} ({})", outcome.rating.overall, outcome.state.name());
//! # Ok::<(), stealthscribe_core::Error>(())
//! ```
//!
//! ## Architecture
//!
//! Samples → Signature (versioned store) → Hints → Generate → Score → Retry
//!
//! The pipeline is deterministic end to end: scoring is a pure function,
//! the built-in provider derives candidates from (prompt, tone, seed), and
//! the calibration loop assigns seeds and breaks ties by fixed rules. Same
//! request, same store state, same result.
//!
//! External providers implement the [`CandidateGenerator`] trait; the
//! calibration loop, scorer, and store never know which backend produced a
//! candidate.

pub mod calibrate;
pub mod engine;
pub mod error;
pub mod features;
pub mod generate;
pub mod scorer;
pub mod signature;
pub mod store;
pub mod text;

pub use calibrate::{
    CalibrationConfig, CalibrationReport, Candidate, DEFAULT_BREADTH, DEFAULT_MAX_ITERATIONS,
    LoopState,
};
pub use engine::{EngineConfig, GenerationOutcome, GenerationRequest, ScribeEngine};
pub use error::{Error, Result};
pub use features::{Feature, FeatureVector, SentenceStats};
pub use generate::{
    CandidateGenerator, CandidateRequest, GeneratorInfo, StencilGenerator, StyleHints, Tone,
};
pub use scorer::{AegisRating, ScoreConfig, ScoreWeights, SubMetric};
pub use signature::{AuthorialSignature, MIN_SAMPLE_WORDS, SignatureBuilder};
pub use store::SignatureStore;

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
