//! faqbot-core: university FAQ resolution engine.
//!
//! A multi-stage query cascade (canned greetings, safety check, follow-up
//! rewrite, exact/substring/keyword lookup, embedding similarity with a
//! confidence gate, and a generative fallback escalation) over a small
//! read-only Q&A dataset, with bounded per-session conversation memory.

mod config;
mod embed;
mod engine;
mod error;
mod fallback;
mod knowledge;
mod logger;
mod matcher;
mod memory;
mod normalize;
mod safety;
mod variator;

pub use config::{EngineConfig, FollowUpPolicy, LexicalPriority};
pub use embed::{CachedEmbedder, Embedder, HashEmbedder};
pub use engine::{ChatEngine, Resolution, Source};
pub use error::{EngineError, ViolationKind};
pub use fallback::{
    FallbackGenerator, FallbackOutcome, FallbackState, GenerationRequest, GenerativeBackend,
    MockBackend, RemoteBackend, STATIC_FALLBACK, SYSTEM_PROMPT,
};
pub use knowledge::{Category, CategoryTable, KnowledgeBase, QaPair};
pub use logger::{Analytics, ChatLogger, LogEntry};
pub use matcher::{best_match, cosine_similarity, top_k};
pub use memory::{
    ChatMessage, ConversationContext, ConversationMemory, ConversationTurn, Role,
};
pub use normalize::Normalizer;
pub use safety::{SafetyChecker, SafetyVerdict};
pub use variator::ResponseVariator;
