//! Error taxonomy for the engine.
//!
//! Every failure surfaced to a caller is one of these variants. Request
//! validation errors (`InvalidInput`, `InvalidTone`) are raised before any
//! work starts; `InsufficientSample` and `SignatureNotFound` are recoverable
//! by the caller; `GenerationUnavailable` means every generation attempt in
//! the budget failed — the loop never fabricates output in that case.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or empty input text / request fields. Rejected before any
    /// work begins, never partially processed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Not enough sample text to build a trustworthy signature. Recoverable
    /// by supplying more text.
    #[error("insufficient sample: {words} words provided, {required} required")]
    InsufficientSample { words: usize, required: usize },

    /// The external generation capability failed on every attempt within the
    /// iteration budget.
    #[error("generation unavailable: {0}")]
    GenerationUnavailable(String),

    /// Referenced signature id/version does not exist. Distinct from
    /// `InsufficientSample`.
    #[error("signature not found for user '{user}' version {version:?}")]
    SignatureNotFound {
        user: String,
        version: Option<u32>,
    },

    /// Tone string outside the closed tone set.
    #[error("invalid tone '{0}' (expected formal|casual|persuasive|narrative|technical)")]
    InvalidTone(String),

    /// Store I/O failure.
    #[error("store i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Signature record (de)serialization failure.
    #[error("record serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Stable machine-readable kind string, used by the HTTP layer and CLI.
impl Error {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::InsufficientSample { .. } => "insufficient_sample",
            Self::GenerationUnavailable(_) => "generation_unavailable",
            Self::SignatureNotFound { .. } => "signature_not_found",
            Self::InvalidTone(_) => "invalid_tone",
            Self::Io(_) => "io",
            Self::Serde(_) => "serialization",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
