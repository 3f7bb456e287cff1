//! Fallback escalation: category keyword table, remote generation, local
//! generation, static canned response. Ordered states, first success wins,
//! no retries, never re-enters an earlier state; the terminal state cannot
//! fail, so the caller always receives a response.

use crate::error::EngineError;
use crate::knowledge::CategoryTable;
use crate::memory::ChatMessage;
use std::sync::Arc;
use std::time::Duration;

/// System prompt sent to generative backends.
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant for Crescent University. \
     Use past conversation context to answer clearly and politely.";

/// Terminal canned response; must carry a human contact channel.
pub const STATIC_FALLBACK: &str =
    "I couldn't process your request. Please email info@crescent.edu.ng for assistance.";

/// Everything a generative backend needs for one call: system prompt,
/// bounded prior turns, top-k semantic matches as in-context examples, and
/// the current user content.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub history: Vec<ChatMessage>,
    pub examples: Vec<(String, String)>,
    pub user_content: String,
}

impl GenerationRequest {
    /// Final user message: in-context Q/A examples followed by the question.
    pub fn user_message(&self) -> String {
        if self.examples.is_empty() {
            return self.user_content.clone();
        }
        let context = self
            .examples
            .iter()
            .map(|(q, a)| format!("Q: {}\nA: {}", q, a))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "{}\nUser's question: {}\nAnswer:",
            context, self.user_content
        )
    }
}

/// A generative text backend (remote LLM, local small model, or a test
/// mock). Failure of any kind is reported as `GenerationUnavailable`.
#[async_trait::async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Backend name for logging and error context.
    fn name(&self) -> &'static str;

    async fn generate(&self, request: &GenerationRequest) -> Result<String, EngineError>;
}

/// Remote chat-completions backend over HTTP (OpenAI-style wire shape).
/// Auth errors, rate limits, timeouts, and malformed responses all collapse
/// to `GenerationUnavailable`.
pub struct RemoteBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl RemoteBackend {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn unavailable(reason: impl Into<String>) -> EngineError {
        EngineError::GenerationUnavailable {
            backend: "remote",
            reason: reason.into(),
        }
    }
}

#[async_trait::async_trait]
impl GenerativeBackend for RemoteBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, EngineError> {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(serde_json::json!({
            "role": "system",
            "content": request.system_prompt,
        }));
        for turn in &request.history {
            messages.push(serde_json::json!({
                "role": turn.role,
                "content": turn.content,
            }));
        }
        messages.push(serde_json::json!({
            "role": "user",
            "content": request.user_message(),
        }));

        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": 0.5,
        });

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::unavailable(format!("status {}", response.status())));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Self::unavailable(e.to_string()))?;
        payload
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Self::unavailable("malformed response".to_string()))
    }
}

/// Deterministic backend for tests and offline runs: echoes the request so
/// assertions can see exactly what would have been sent.
pub struct MockBackend;

#[async_trait::async_trait]
impl GenerativeBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, EngineError> {
        Ok(format!(
            "[generated from {} prior turns, {} reference answers] {}",
            request.history.len(),
            request.examples.len(),
            request.user_content
        ))
    }
}

/// Which fallback state produced the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackState {
    Category,
    Remote,
    Local,
    Static,
}

/// Answer plus the conservative confidence of the state that produced it.
#[derive(Debug, Clone)]
pub struct FallbackOutcome {
    pub answer: String,
    pub confidence: f32,
    pub state: FallbackState,
}

const CATEGORY_CONFIDENCE: f32 = 0.5;
const REMOTE_CONFIDENCE: f32 = 0.5;
const LOCAL_CONFIDENCE: f32 = 0.4;
const STATIC_CONFIDENCE: f32 = 0.3;

/// The escalation state machine. Backends are injected; a missing backend
/// simply skips its state.
pub struct FallbackGenerator {
    categories: CategoryTable,
    remote: Option<Arc<dyn GenerativeBackend>>,
    local: Option<Arc<dyn GenerativeBackend>>,
    remote_timeout: Duration,
}

impl FallbackGenerator {
    pub fn new(
        categories: CategoryTable,
        remote: Option<Arc<dyn GenerativeBackend>>,
        local: Option<Arc<dyn GenerativeBackend>>,
        remote_timeout: Duration,
    ) -> Self {
        Self {
            categories,
            remote,
            local,
            remote_timeout,
        }
    }

    /// Replaces the remote backend (test injection and late wiring).
    pub fn with_remote(mut self, backend: Arc<dyn GenerativeBackend>) -> Self {
        self.remote = Some(backend);
        self
    }

    /// Replaces the local backend.
    pub fn with_local(mut self, backend: Arc<dyn GenerativeBackend>) -> Self {
        self.local = Some(backend);
        self
    }

    /// Runs the escalation. `include_category` is false when the cascade
    /// already consulted the keyword table ahead of semantic search.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        include_category: bool,
    ) -> FallbackOutcome {
        if include_category {
            if let Some((category, response)) = self.categories.keyword_match(&request.user_content)
            {
                tracing::debug!(
                    target: "faqbot::fallback",
                    category = category,
                    "category keyword hit"
                );
                return FallbackOutcome {
                    answer: response.to_string(),
                    confidence: CATEGORY_CONFIDENCE,
                    state: FallbackState::Category,
                };
            }
        }

        if let Some(remote) = &self.remote {
            // The remote call is the one unbounded-blocking operation in the
            // pipeline; expiry advances the state machine instead of hanging.
            let attempt = tokio::time::timeout(self.remote_timeout, remote.generate(request)).await;
            match attempt {
                Ok(Ok(text)) => {
                    return FallbackOutcome {
                        answer: text,
                        confidence: REMOTE_CONFIDENCE,
                        state: FallbackState::Remote,
                    };
                }
                Ok(Err(e)) => {
                    tracing::warn!(
                        target: "faqbot::fallback",
                        backend = remote.name(),
                        error = %e,
                        "remote generation failed"
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        target: "faqbot::fallback",
                        backend = remote.name(),
                        timeout_secs = self.remote_timeout.as_secs(),
                        "remote generation timed out"
                    );
                }
            }
        }

        if let Some(local) = &self.local {
            match local.generate(request).await {
                Ok(text) => {
                    return FallbackOutcome {
                        answer: text,
                        confidence: LOCAL_CONFIDENCE,
                        state: FallbackState::Local,
                    };
                }
                Err(e) => {
                    tracing::warn!(
                        target: "faqbot::fallback",
                        backend = local.name(),
                        error = %e,
                        "local generation failed"
                    );
                }
            }
        }

        FallbackOutcome {
            answer: STATIC_FALLBACK.to_string(),
            confidence: STATIC_CONFIDENCE,
            state: FallbackState::Static,
        }
    }
}
