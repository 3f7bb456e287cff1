//! Per-session conversation memory: bounded FIFO turn history, derived
//! context (last topic, detected departments, user name), and follow-up
//! detection/rewrite. Created per session, discarded with it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};

/// Lexical markers that flag a query as referring to the previous topic.
const FOLLOW_UP_PHRASES: &[&str] = &[
    "what about",
    "how about",
    "and then",
    "next",
    "after that",
    "can you tell me more",
    "more info",
    "continue",
    "explain further",
    "go on",
    "what happened after",
];

/// Department names harvested into the context. Matched as substrings of
/// the normalized query.
const DEPARTMENT_NAMES: &[&str] = &[
    "computer science",
    "law",
    "engineering",
    "business administration",
    "accounting",
    "economics",
    "architecture",
    "microbiology",
    "mass communication",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message in the conversation, ordered and append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    pub timestamp_ms: i64,
}

/// A `(role, content)` message for generative-backend prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Derived, per-session context; not persisted across sessions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationContext {
    pub last_topic: Option<String>,
    pub known_departments: BTreeSet<String>,
    pub user_name: Option<String>,
}

/// Bounded most-recent-N history of (user, bot) turn pairs with derived
/// context. Oldest pair is evicted first.
pub struct ConversationMemory {
    turns: VecDeque<ConversationTurn>,
    max_pairs: usize,
    context: ConversationContext,
    session_id: Option<String>,
}

impl ConversationMemory {
    /// Memory bounded to `max_pairs` (user, bot) pairs.
    pub fn new(max_pairs: usize) -> Self {
        Self {
            turns: VecDeque::new(),
            max_pairs: max_pairs.max(1),
            context: ConversationContext::default(),
            session_id: None,
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Appends the final (user, bot) exchange, evicting the oldest pair
    /// once the bound is exceeded. Called exactly once per resolved query.
    pub fn update(&mut self, user: &str, bot: &str) {
        let now = now_ms();
        self.turns.push_back(ConversationTurn {
            role: Role::User,
            content: user.to_string(),
            timestamp_ms: now,
        });
        self.turns.push_back(ConversationTurn {
            role: Role::Assistant,
            content: bot.to_string(),
            timestamp_ms: now,
        });
        while self.turns.len() > self.max_pairs * 2 {
            self.turns.pop_front();
            self.turns.pop_front();
        }
    }

    /// Harvests contextual clues from a normalized standalone query and
    /// records it as the last topic.
    pub fn observe_topic(&mut self, normalized_query: &str) {
        for dept in DEPARTMENT_NAMES {
            if normalized_query.contains(dept) {
                self.context.known_departments.insert(dept.to_string());
            }
        }
        if let Some(rest) = normalized_query.split("my name is ").nth(1) {
            if let Some(name) = rest.split_whitespace().next() {
                self.context.user_name = Some(name.to_string());
            }
        }
        if !normalized_query.is_empty() {
            self.context.last_topic = Some(normalized_query.to_string());
        }
    }

    /// Purely lexical follow-up check against the fixed phrase list; no
    /// coreference resolution.
    pub fn is_follow_up(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        FOLLOW_UP_PHRASES.iter().any(|p| lower.contains(p))
    }

    /// Rewrites a follow-up query with a parenthetical reference to the
    /// last topic. `None` when the query is not a follow-up or no topic
    /// exists yet.
    pub fn rewrite_follow_up(&self, normalized_query: &str) -> Option<String> {
        if !self.is_follow_up(normalized_query) {
            return None;
        }
        self.context
            .last_topic
            .as_ref()
            .map(|topic| format!("{} (referring to: {})", normalized_query, topic))
    }

    pub fn context_snapshot(&self) -> ConversationContext {
        self.context.clone()
    }

    pub fn turns(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Converts the bounded history into ordered prompt messages.
    pub fn prompt_messages(&self) -> Vec<ChatMessage> {
        self.turns
            .iter()
            .map(|t| ChatMessage {
                role: match t.role {
                    Role::User => "user".to_string(),
                    Role::Assistant => "assistant".to_string(),
                },
                content: t.content.clone(),
            })
            .collect()
    }
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
