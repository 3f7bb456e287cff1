//! Input safety checks: banned words (word-boundary) and PII (phone or
//! email) patterns. Runs on the raw input, since normalization strips the
//! characters the PII patterns need.

use crate::error::ViolationKind;
use regex::Regex;
use std::path::Path;

const DEFAULT_BANNED_WORDS: &[&str] = &["fuck", "shit", "idiot", "bastard", "stupid"];

const BANNED_RESPONSE: &str =
    "I can't assist with that language. Please rephrase your question.";
const PII_RESPONSE: &str = "For your privacy, please don't share personal information. \
     Ask your question without including emails, phone numbers, etc.";

/// Outcome of a safety check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyVerdict {
    Allowed,
    Violation(ViolationKind),
}

/// Lexical safety checker. The original system additionally consulted a
/// toxicity classifier; that model is an external collaborator and not
/// carried here.
pub struct SafetyChecker {
    banned: Option<Regex>,
    pii: Regex,
}

impl SafetyChecker {
    /// Checker over an explicit banned-word list.
    pub fn new(banned_words: &[String]) -> Self {
        let banned = if banned_words.is_empty() {
            None
        } else {
            let alternation = banned_words
                .iter()
                .map(|w| regex::escape(w))
                .collect::<Vec<_>>()
                .join("|");
            Regex::new(&format!(r"(?i)\b(?:{})\b", alternation)).ok()
        };
        let pii = Regex::new(
            r"\b\d{10}\b|\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
        )
        .expect("pii pattern is valid");
        Self { banned, pii }
    }

    /// Checker with the banned-word list from `path` (one word per line),
    /// falling back to the built-in list when the file is absent.
    pub fn from_source(path: Option<&Path>) -> Self {
        let words = match path {
            Some(p) => match std::fs::read_to_string(p) {
                Ok(raw) => raw
                    .lines()
                    .map(|l| l.trim().to_lowercase())
                    .filter(|l| !l.is_empty() && !l.starts_with('#'))
                    .collect(),
                Err(e) => {
                    tracing::warn!(
                        target: "faqbot::safety",
                        path = %p.display(),
                        error = %e,
                        "banned-word list not loaded; using built-in list"
                    );
                    default_words()
                }
            },
            None => default_words(),
        };
        Self::new(&words)
    }

    /// Checks raw input. Banned words take precedence over PII.
    pub fn check(&self, text: &str) -> SafetyVerdict {
        if let Some(banned) = &self.banned {
            if banned.is_match(text) {
                return SafetyVerdict::Violation(ViolationKind::BannedWord);
            }
        }
        if self.pii.is_match(text) {
            return SafetyVerdict::Violation(ViolationKind::Pii);
        }
        SafetyVerdict::Allowed
    }

    /// Fixed response for each violation kind.
    pub fn response_for(kind: ViolationKind) -> &'static str {
        match kind {
            ViolationKind::BannedWord => BANNED_RESPONSE,
            ViolationKind::Pii => PII_RESPONSE,
        }
    }
}

fn default_words() -> Vec<String> {
    DEFAULT_BANNED_WORDS.iter().map(|s| s.to_string()).collect()
}
