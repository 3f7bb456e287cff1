//! The resolution cascade: one request/response call composing the
//! normalizer, knowledge base, matcher, memory, safety checker, and
//! fallback generator. `resolve` is total: it always returns a response,
//! whatever the input or backend state.

use crate::config::{EngineConfig, FollowUpPolicy, LexicalPriority};
use crate::embed::{CachedEmbedder, HashEmbedder};
use crate::error::EngineError;
use crate::fallback::{
    FallbackGenerator, FallbackState, GenerationRequest, GenerativeBackend, RemoteBackend,
    SYSTEM_PROMPT,
};
use crate::knowledge::{CategoryTable, KnowledgeBase, QaPair};
use crate::logger::{Analytics, ChatLogger, LogEntry};
use crate::matcher::{best_match, top_k};
use crate::memory::ConversationMemory;
use crate::normalize::Normalizer;
use crate::safety::{SafetyChecker, SafetyVerdict};
use crate::variator::ResponseVariator;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Inputs short-circuited as small talk before any lookup.
const GREETINGS: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "hi there",
    "greetings",
    "how are you",
    "how are you doing",
    "how's it going",
    "can we talk?",
    "can we have a conversation?",
    "okay",
    "i'm fine",
    "i am fine",
];

const GREETING_REPLIES: &[&str] = &[
    "Hello!",
    "Hi there!",
    "Hey!",
    "Greetings!",
    "I'm doing well, thank you!",
    "Sure pal",
    "Okay",
];

const CLARIFICATION_PROMPT: &str =
    "I'm not sure what you're referring to. Could you ask the full question?";

const CLARIFICATION_CONFIDENCE: f32 = 0.5;

/// Which stage produced the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Canned,
    Exact,
    Substring,
    Keyword,
    Semantic,
    Llm,
}

/// Result of one resolved query. Produced fresh per query; never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub answer: String,
    pub confidence: f32,
    pub source: Source,
}

/// The engine. Built once per process; read-only after construction, so it
/// is safely shared across concurrent sessions (each session brings its own
/// [`ConversationMemory`]).
pub struct ChatEngine {
    normalizer: Normalizer,
    knowledge: KnowledgeBase,
    embedder: CachedEmbedder,
    categories: CategoryTable,
    safety: SafetyChecker,
    fallback: FallbackGenerator,
    variator: ResponseVariator,
    logger: ChatLogger,
    greetings: Vec<String>,
    threshold: f32,
    top_k: usize,
    lexical_priority: LexicalPriority,
    follow_up_policy: FollowUpPolicy,
}

impl ChatEngine {
    /// Wires every component from config. Dataset and table files that fail
    /// to load degrade to built-in defaults; this constructor itself never
    /// fails.
    pub fn from_config(config: &EngineConfig) -> Self {
        let data_dir = Path::new(&config.data_dir);
        let normalizer = Normalizer::from_data_dir(data_dir);
        let embedder = CachedEmbedder::new(Box::new(HashEmbedder::new(
            config.embedding_dimensions,
        )));
        tracing::info!(
            target: "faqbot::engine",
            model = %config.embedding_model,
            dimensions = config.embedding_dimensions,
            "embedder initialized"
        );
        let knowledge = KnowledgeBase::load(data_dir, &normalizer, &embedder);
        let categories = CategoryTable::new();
        let safety =
            SafetyChecker::from_source(config.banned_words_path.as_deref().map(Path::new));

        let remote: Option<Arc<dyn GenerativeBackend>> =
            if config.remote_generation && !config.remote_api_url.is_empty() {
                Some(Arc::new(RemoteBackend::new(
                    config.remote_api_url.clone(),
                    config.remote_api_key.clone(),
                    config.remote_model.clone(),
                )))
            } else {
                None
            };
        let fallback = FallbackGenerator::new(
            categories.clone(),
            remote,
            None,
            Duration::from_secs(config.remote_timeout_secs),
        );

        let variator = ResponseVariator::new(
            config.variator_enabled,
            config.variator_seed,
            config.uncertainty_probability,
        );
        let logger = ChatLogger::new(
            config
                .conversation_log
                .then(|| data_dir.join("conversation_log.jsonl")),
        );
        let greetings = GREETINGS.iter().map(|g| normalizer.normalize(g)).collect();

        Self {
            normalizer,
            knowledge,
            embedder,
            categories,
            safety,
            fallback,
            variator,
            logger,
            greetings,
            threshold: config.similarity_threshold,
            top_k: config.semantic_top_k,
            lexical_priority: config.lexical_priority,
            follow_up_policy: config.follow_up_policy,
        }
    }

    /// Replaces the Q&A dataset (tests and embedded deployments).
    pub fn with_dataset(mut self, pairs: Vec<QaPair>) -> Self {
        self.knowledge = KnowledgeBase::from_pairs(pairs, &self.normalizer, &self.embedder);
        self
    }

    /// Injects a remote generative backend.
    pub fn with_remote_backend(mut self, backend: Arc<dyn GenerativeBackend>) -> Self {
        self.fallback = self.fallback.with_remote(backend);
        self
    }

    /// Injects a local generative backend.
    pub fn with_local_backend(mut self, backend: Arc<dyn GenerativeBackend>) -> Self {
        self.fallback = self.fallback.with_local(backend);
        self
    }

    pub fn dataset_len(&self) -> usize {
        self.knowledge.len()
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn analytics(&self) -> Analytics {
        self.logger.snapshot()
    }

    /// Resolves one query. Ordered, short-circuiting stages; every path
    /// updates the session memory exactly once with the final
    /// (user input, answer) pair.
    pub async fn resolve(&self, raw_input: &str, memory: &mut ConversationMemory) -> Resolution {
        let started = Instant::now();
        let normalized = self.normalizer.normalize(raw_input);

        // 1. canned small talk
        if !normalized.is_empty() && self.greetings.iter().any(|g| g == &normalized) {
            let reply = self.variator.pick(GREETING_REPLIES).to_string();
            return self.finish(raw_input, memory, reply, 1.0, Source::Canned, started);
        }

        // 2. safety short-circuit, on the raw input so PII patterns survive
        if let SafetyVerdict::Violation(kind) = self.safety.check(raw_input) {
            tracing::warn!(
                target: "faqbot::engine",
                kind = %kind,
                "input rejected by safety policy"
            );
            let reply = SafetyChecker::response_for(kind).to_string();
            return self.finish(raw_input, memory, reply, 1.0, Source::Canned, started);
        }

        // 3. follow-up rewrite
        let query = if memory.is_follow_up(&normalized) {
            match memory.rewrite_follow_up(&normalized) {
                Some(rewritten) => {
                    tracing::debug!(
                        target: "faqbot::engine",
                        rewritten = %rewritten,
                        "follow-up rewritten with last topic"
                    );
                    rewritten
                }
                None => match self.follow_up_policy {
                    FollowUpPolicy::AskClarification => {
                        return self.finish(
                            raw_input,
                            memory,
                            CLARIFICATION_PROMPT.to_string(),
                            CLARIFICATION_CONFIDENCE,
                            Source::Canned,
                            started,
                        );
                    }
                    FollowUpPolicy::UseUnmodified => normalized.clone(),
                },
            }
        } else {
            memory.observe_topic(&normalized);
            normalized.clone()
        };

        // 4. exact match
        if let Some(index) = self.knowledge.exact_match(&query) {
            let answer = self.knowledge.answer(index).to_string();
            return self.finish(raw_input, memory, answer, 1.0, Source::Exact, started);
        }

        // 5. lexical stage per policy
        let mut keyword_consulted = false;
        match self.lexical_priority {
            LexicalPriority::SubstringFirst => {
                if let Some(index) = self.knowledge.substring_match(&query) {
                    let answer = self.knowledge.answer(index).to_string();
                    return self.finish(raw_input, memory, answer, 0.9, Source::Substring, started);
                }
            }
            LexicalPriority::KeywordFirst => {
                keyword_consulted = true;
                if let Some((category, response)) = self.categories.keyword_match(&query) {
                    tracing::debug!(
                        target: "faqbot::engine",
                        category = category,
                        "category keyword hit ahead of semantic search"
                    );
                    let answer = response.to_string();
                    return self.finish(raw_input, memory, answer, 0.5, Source::Keyword, started);
                }
                if let Some(index) = self.knowledge.substring_match(&query) {
                    let answer = self.knowledge.answer(index).to_string();
                    return self.finish(raw_input, memory, answer, 0.9, Source::Substring, started);
                }
            }
            LexicalPriority::SemanticOnly => {}
        }

        // 6. semantic match, gated by the confidence threshold
        let query_vector = self.embedder.get_or_compute(&query);
        let corpus = self.knowledge.embeddings();
        if let Some((index, score)) = best_match(query_vector.as_slice(), corpus) {
            if score >= self.threshold {
                let answer = self
                    .variator
                    .vary_uncertain(self.knowledge.answer(index));
                return self.finish(
                    raw_input,
                    memory,
                    answer,
                    score.clamp(0.0, 1.0),
                    Source::Semantic,
                    started,
                );
            }
            tracing::debug!(
                target: "faqbot::engine",
                "{}",
                EngineError::NoConfidentMatch { best_score: score }
            );
        }

        // 7. fallback escalation
        let examples: Vec<(String, String)> = top_k(query_vector.as_slice(), corpus, self.top_k)
            .into_iter()
            .filter(|(_, score)| *score > 0.0)
            .map(|(i, _)| {
                (
                    self.knowledge.question(i).to_string(),
                    self.knowledge.answer(i).to_string(),
                )
            })
            .collect();
        let request = GenerationRequest {
            system_prompt: SYSTEM_PROMPT.to_string(),
            history: memory.prompt_messages(),
            examples,
            user_content: query,
        };
        let outcome = self.fallback.generate(&request, !keyword_consulted).await;
        let source = match outcome.state {
            FallbackState::Category => Source::Keyword,
            FallbackState::Remote | FallbackState::Local => Source::Llm,
            FallbackState::Static => Source::Canned,
        };
        self.finish(
            raw_input,
            memory,
            outcome.answer,
            outcome.confidence,
            source,
            started,
        )
    }

    fn finish(
        &self,
        raw_input: &str,
        memory: &mut ConversationMemory,
        answer: String,
        confidence: f32,
        source: Source,
        started: Instant,
    ) -> Resolution {
        memory.update(raw_input, &answer);
        let elapsed_ms = started.elapsed().as_millis() as u64;
        self.logger.record(LogEntry {
            timestamp_ms: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_millis() as i64)
                .unwrap_or(0),
            session_id: memory.session_id().map(str::to_string),
            user_input: raw_input.to_string(),
            response: answer.clone(),
            source,
            confidence,
            response_time_ms: elapsed_ms,
        });
        tracing::info!(
            target: "faqbot::engine",
            source = ?source,
            confidence,
            elapsed_ms,
            "query resolved"
        );
        Resolution {
            answer,
            confidence,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::MockBackend;

    fn test_config() -> EngineConfig {
        EngineConfig {
            data_dir: "./no-such-data-dir".to_string(),
            variator_enabled: false,
            ..EngineConfig::default()
        }
    }

    fn test_engine() -> ChatEngine {
        ChatEngine::from_config(&test_config())
    }

    #[tokio::test]
    async fn test_scenario_exact_question_returns_answer_at_full_confidence() {
        let engine = test_engine();
        let mut memory = ConversationMemory::new(10);
        let r = engine
            .resolve("What are the admission requirements?", &mut memory)
            .await;
        assert_eq!(r.answer, "Minimum 5 credits including Math and English");
        assert_eq!(r.confidence, 1.0);
        assert_eq!(r.source, Source::Exact);
    }

    #[tokio::test]
    async fn test_scenario_sms_speak_normalizes_to_exact_match() {
        let engine = test_engine();
        let mut memory = ConversationMemory::new(10);
        let r = engine.resolve("wat r d admsn requirements", &mut memory).await;
        assert_eq!(r.answer, "Minimum 5 credits including Math and English");
        assert_eq!(r.confidence, 1.0);
        assert_eq!(r.source, Source::Exact);
    }

    #[tokio::test]
    async fn test_scenario_gibberish_with_generation_disabled_reaches_static_fallback() {
        let engine = test_engine();
        let mut memory = ConversationMemory::new(10);
        let r = engine.resolve("asdkjasjdk", &mut memory).await;
        assert!(r.answer.contains("info@crescent.edu.ng"));
        assert!(r.confidence <= 0.5);
        assert_eq!(r.source, Source::Canned);
    }

    #[tokio::test]
    async fn test_scenario_banned_word_short_circuits_everything() {
        let engine = test_engine();
        let mut memory = ConversationMemory::new(10);
        let r = engine
            .resolve("what are the admission requirements you idiot", &mut memory)
            .await;
        assert_eq!(
            r.answer,
            SafetyChecker::response_for(crate::error::ViolationKind::BannedWord)
        );
        assert_eq!(r.source, Source::Canned);
    }

    #[tokio::test]
    async fn test_scenario_follow_up_rewritten_before_generation() {
        let config = EngineConfig {
            similarity_threshold: 0.99,
            lexical_priority: LexicalPriority::SemanticOnly,
            ..test_config()
        };
        let engine = ChatEngine::from_config(&config)
            .with_dataset(vec![QaPair {
                question: "When does the semester start?".to_string(),
                answer: "The semester starts in September.".to_string(),
            }])
            .with_remote_backend(Arc::new(MockBackend));
        let mut memory = ConversationMemory::new(10);

        let first = engine
            .resolve("When does the semester start?", &mut memory)
            .await;
        assert_eq!(first.source, Source::Exact);

        let r = engine.resolve("can you tell me more", &mut memory).await;
        assert_eq!(r.source, Source::Llm);
        assert!(
            r.answer
                .contains("(referring to: when does the semester start)"),
            "rewritten query should reach the backend; got: {}",
            r.answer
        );
    }

    #[tokio::test]
    async fn test_greeting_short_circuits_with_canned_reply() {
        let engine = test_engine();
        let mut memory = ConversationMemory::new(10);
        let r = engine.resolve("Hello", &mut memory).await;
        assert_eq!(r.confidence, 1.0);
        assert_eq!(r.source, Source::Canned);
        assert!(GREETING_REPLIES.contains(&r.answer.as_str()));
    }

    #[tokio::test]
    async fn test_semantic_match_above_threshold() {
        let engine = test_engine();
        let mut memory = ConversationMemory::new(10);
        let r = engine.resolve("requirements for admission", &mut memory).await;
        assert_eq!(r.source, Source::Semantic);
        assert!(r.confidence >= 0.6);
        assert_eq!(r.answer, "Minimum 5 credits including Math and English");
    }

    #[tokio::test]
    async fn test_below_threshold_never_surfaces_as_kb_answer() {
        let config = EngineConfig {
            similarity_threshold: 0.95,
            lexical_priority: LexicalPriority::SemanticOnly,
            ..test_config()
        };
        let engine = ChatEngine::from_config(&config);
        let mut memory = ConversationMemory::new(10);
        let r = engine.resolve("requirements for admission", &mut memory).await;
        assert_ne!(r.source, Source::Semantic);
        assert!(r.confidence <= 0.5);
    }

    #[tokio::test]
    async fn test_keyword_first_policy_outranks_semantic() {
        let config = EngineConfig {
            lexical_priority: LexicalPriority::KeywordFirst,
            ..test_config()
        };
        let engine = ChatEngine::from_config(&config);
        let mut memory = ConversationMemory::new(10);
        let r = engine
            .resolve("how much are the fees this semester", &mut memory)
            .await;
        assert_eq!(r.source, Source::Keyword);
        assert_eq!(r.confidence, 0.5);
        assert!(r.answer.contains("bursary@crescent.edu.ng"));
    }

    #[tokio::test]
    async fn test_clarification_policy_for_unresolved_follow_up() {
        let config = EngineConfig {
            follow_up_policy: FollowUpPolicy::AskClarification,
            ..test_config()
        };
        let engine = ChatEngine::from_config(&config);
        let mut memory = ConversationMemory::new(10);
        let r = engine.resolve("what about fees", &mut memory).await;
        assert_eq!(r.answer, CLARIFICATION_PROMPT);
        assert_eq!(r.source, Source::Canned);
    }

    #[tokio::test]
    async fn test_resolve_is_total_on_hostile_inputs() {
        let engine = test_engine();
        let long = "a".repeat(50_000);
        for input in ["", "   ", "!!!???", "🎓🎓🎓", long.as_str()] {
            let mut memory = ConversationMemory::new(10);
            let r = engine.resolve(input, &mut memory).await;
            assert!(!r.answer.is_empty(), "empty answer for input {:?}", &input[..input.len().min(20)]);
        }
    }

    #[tokio::test]
    async fn test_memory_updated_exactly_once_per_resolve() {
        let engine = test_engine();
        let mut memory = ConversationMemory::new(10);
        engine.resolve("hello", &mut memory).await;
        assert_eq!(memory.len(), 2);
        engine.resolve("asdkjasjdk", &mut memory).await;
        assert_eq!(memory.len(), 4);
        let turns: Vec<_> = memory.turns().collect();
        assert_eq!(turns[2].content, "asdkjasjdk");
    }

    #[tokio::test]
    async fn test_analytics_reflect_resolved_queries() {
        let engine = test_engine();
        let mut memory = ConversationMemory::new(10);
        engine
            .resolve("What are the admission requirements?", &mut memory)
            .await;
        engine.resolve("asdkjasjdk", &mut memory).await;
        let analytics = engine.analytics();
        assert_eq!(analytics.queries, 2);
        assert_eq!(analytics.fallbacks_used, 1);
        assert_eq!(analytics.unanswered_questions, vec!["asdkjasjdk".to_string()]);
    }
}
