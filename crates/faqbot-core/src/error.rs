//! Error taxonomy for the resolution pipeline.
//!
//! None of these escape [`ChatEngine::resolve`](crate::ChatEngine::resolve):
//! data-load failures degrade to built-in defaults, generation failures
//! advance the fallback state machine, and safety violations short-circuit
//! into a fixed response.

use std::fmt;

/// Kind of safety violation detected in user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// Input contained a word from the banned-word list.
    BannedWord,
    /// Input contained personally identifiable information (phone/email).
    Pii,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::BannedWord => write!(f, "banned_word"),
            ViolationKind::Pii => write!(f, "pii"),
        }
    }
}

/// Errors produced inside the engine.
#[derive(Debug)]
pub enum EngineError {
    /// A dataset or table file was missing or malformed. The loader
    /// substitutes a built-in default and continues; never fatal.
    DataLoad { path: String, reason: String },
    /// A generative backend (remote or local) could not produce text.
    /// Auth, rate-limit, timeout, and malformed responses all land here.
    GenerationUnavailable { backend: &'static str, reason: String },
    /// Input violated the safety policy.
    SafetyViolation(ViolationKind),
    /// Similarity search scored below the threshold with no lexical hit.
    NoConfidentMatch { best_score: f32 },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::DataLoad { path, reason } => {
                write!(f, "failed to load {}: {}", path, reason)
            }
            EngineError::GenerationUnavailable { backend, reason } => {
                write!(f, "{} generation unavailable: {}", backend, reason)
            }
            EngineError::SafetyViolation(kind) => {
                write!(f, "input rejected by safety policy: {}", kind)
            }
            EngineError::NoConfidentMatch { best_score } => {
                write!(f, "no confident match (best score {:.3})", best_score)
            }
        }
    }
}

impl std::error::Error for EngineError {}
