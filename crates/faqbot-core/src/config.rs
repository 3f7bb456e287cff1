//! Engine configuration. Load from TOML or env; every option has a default
//! so the engine starts with nothing but the built-in tables.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which lexical check, if any, runs before semantic search.
///
/// Source variants disagree on this ordering, so it is a policy knob rather
/// than a fixed choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LexicalPriority {
    /// Substring lookup runs before semantic search; the category keyword
    /// table is consulted only inside the fallback cascade.
    SubstringFirst,
    /// The category keyword table runs before semantic search (and the
    /// fallback cascade skips its category state).
    KeywordFirst,
    /// Neither; lexical signals are reached only through the fallback.
    SemanticOnly,
}

/// What to do with a follow-up phrase when no prior topic exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpPolicy {
    /// Process the query unmodified.
    UseUnmodified,
    /// Return a fixed clarification prompt without further processing.
    AskClarification,
}

/// Global engine + gateway configuration. Constructed once and passed by
/// reference into each component's constructor; no ambient globals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Application identity shown by the gateway status endpoint.
    pub app_name: String,
    /// HTTP port for the gateway.
    pub port: u16,
    /// Directory holding the Q&A dataset, mapping tables, and logs.
    pub data_dir: String,

    /// Identifier of the sentence-embedding model behind the `Embedder` seam.
    pub embedding_model: String,
    /// Dimensionality of the embedding vectors.
    pub embedding_dimensions: usize,
    /// Cosine-similarity gate between "knowledge-base answer" and
    /// "escalate to generative fallback".
    pub similarity_threshold: f32,
    /// Number of top semantic matches passed to the generative backend as
    /// in-context examples.
    pub semantic_top_k: usize,

    /// Conversation history bound, in (user, bot) pairs.
    pub history_limit: usize,
    /// Policy for follow-ups that have no prior topic to refer to.
    pub follow_up_policy: FollowUpPolicy,
    /// Which lexical check runs before semantic search.
    pub lexical_priority: LexicalPriority,

    /// Enables the remote generative backend.
    pub remote_generation: bool,
    /// Chat-completions endpoint of the remote backend.
    pub remote_api_url: String,
    /// API key for the remote backend. Supply via `FAQBOT__REMOTE_API_KEY`.
    #[serde(default)]
    pub remote_api_key: String,
    /// Model identifier sent to the remote backend.
    pub remote_model: String,
    /// Remote call timeout; expiry is treated as generation failure.
    pub remote_timeout_secs: u64,

    /// Optional file with one banned word per line. Missing file falls back
    /// to the built-in list.
    #[serde(default)]
    pub banned_words_path: Option<String>,

    /// Enables the response variator (random greeting phrasing, occasional
    /// uncertainty prefix). Disabled, the variator is the identity.
    pub variator_enabled: bool,
    /// Fixed RNG seed for the variator; `None` seeds from entropy.
    #[serde(default)]
    pub variator_seed: Option<u64>,
    /// Probability of prefixing a semantic answer with an uncertainty phrase.
    pub uncertainty_probability: f32,

    /// Appends each resolved exchange to `<data_dir>/conversation_log.jsonl`.
    pub conversation_log: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            app_name: "Campus FAQ Gateway".to_string(),
            port: 8005,
            data_dir: "./data".to_string(),
            embedding_model: "hash-trigram-v1".to_string(),
            embedding_dimensions: 256,
            similarity_threshold: 0.6,
            semantic_top_k: 3,
            history_limit: 10,
            follow_up_policy: FollowUpPolicy::UseUnmodified,
            lexical_priority: LexicalPriority::SubstringFirst,
            remote_generation: false,
            remote_api_url: String::new(),
            remote_api_key: String::new(),
            remote_model: "gpt-4".to_string(),
            remote_timeout_secs: 10,
            banned_words_path: None,
            variator_enabled: true,
            variator_seed: None,
            uncertainty_probability: 0.2,
            conversation_log: false,
        }
    }
}

impl EngineConfig {
    /// Load config from file and environment.
    /// Precedence: env `FAQBOT_CONFIG` path > `config/faqbot.toml` > defaults,
    /// then `FAQBOT`-prefixed environment overrides (`__` separator).
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("FAQBOT_CONFIG").unwrap_or_else(|_| "config/faqbot".to_string());
        let builder = config::Config::builder()
            .set_default("app_name", "Campus FAQ Gateway")?
            .set_default("port", 8005_i64)?
            .set_default("data_dir", "./data")?
            .set_default("embedding_model", "hash-trigram-v1")?
            .set_default("embedding_dimensions", 256_i64)?
            .set_default("similarity_threshold", 0.6_f64)?
            .set_default("semantic_top_k", 3_i64)?
            .set_default("history_limit", 10_i64)?
            .set_default("follow_up_policy", "use_unmodified")?
            .set_default("lexical_priority", "substring_first")?
            .set_default("remote_generation", false)?
            .set_default("remote_api_url", "")?
            .set_default("remote_model", "gpt-4")?
            .set_default("remote_timeout_secs", 10_i64)?
            .set_default("variator_enabled", true)?
            .set_default("uncertainty_probability", 0.2_f64)?
            .set_default("conversation_log", false)?;

        let path = Path::new(&config_path);
        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(config::Environment::with_prefix("FAQBOT").separator("__"))
            .build()?;

        built.try_deserialize()
    }
}
