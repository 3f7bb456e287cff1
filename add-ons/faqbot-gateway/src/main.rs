//! Axum-based FAQ gateway: HTTP entry point for the resolution engine.
//! Config-driven via EngineConfig. The engine is built once and shared
//! read-only across sessions; each session owns its conversation memory.

use axum::http::Method;
use axum::{
    extract::{Json, Path, State},
    response::sse::{Event, Sse},
    routing::{get, post},
    Router,
};
use dashmap::DashMap;
use faqbot_core::{ChatEngine, ConversationMemory, EngineConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::field::Visit;
use tracing_subscriber::layer::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Captures the "message" field from a tracing event.
struct MessageCollector<'a>(&'a mut String);

impl Visit for MessageCollector<'_> {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            *self.0 = value.to_string();
        }
    }
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.0 = format!("{:?}", value);
        }
    }
}

/// Sends each tracing event as a line to a broadcast channel for SSE log streaming.
#[derive(Clone)]
struct LogBroadcastLayer {
    tx: broadcast::Sender<String>,
}

impl LogBroadcastLayer {
    fn new(tx: broadcast::Sender<String>) -> Self {
        Self { tx }
    }
}

impl<S> tracing_subscriber::Layer<S> for LogBroadcastLayer
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut message = String::new();
        event.record(&mut MessageCollector(&mut message));
        let line = format!(
            "{} [{}] {}",
            event.metadata().level(),
            event.metadata().target(),
            message
        );
        let _ = self.tx.send(line);
    }
}

/// Session id -> conversation memory. The per-session mutex serializes
/// queries within a session: one query is fully resolved before the next.
type SessionMap = DashMap<String, Arc<Mutex<ConversationMemory>>>;

#[derive(Clone)]
struct AppState {
    config: Arc<EngineConfig>,
    engine: Arc<ChatEngine>,
    sessions: Arc<SessionMap>,
    log_tx: broadcast::Sender<String>,
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env::var calls)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!(
            "[faqbot-gateway] .env not loaded: {} (using system environment)",
            e
        );
    }

    let (log_tx, _) = broadcast::channel(1000);
    let log_layer = LogBroadcastLayer::new(log_tx.clone());

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(log_layer)
        .init();

    let config = Arc::new(EngineConfig::load().expect("load EngineConfig"));
    // Missing data directory is the one fatal startup error; everything
    // inside it degrades to built-in defaults.
    std::fs::create_dir_all(&config.data_dir).expect("create data directory");

    let engine = Arc::new(ChatEngine::from_config(&config));
    tracing::info!(
        dataset_size = engine.dataset_len(),
        threshold = engine.threshold(),
        "engine ready"
    );

    let app = build_app(AppState {
        config: Arc::clone(&config),
        engine,
        sessions: Arc::new(DashMap::new()),
        log_tx,
    });

    let port = config.port;
    let app_name = config.app_name.clone();
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));
    tracing::info!("{} listening on {}", app_name, addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await.unwrap(), app)
        .await
        .unwrap();
}

fn build_app(state: AppState) -> Router {
    // CORS: allow Backend/API (8001-8099) and Frontend/UI (3001-3099) port ranges.
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            |origin: &axum::http::HeaderValue, _| {
                let s = origin.to_str().unwrap_or("");
                let port = s
                    .split(':')
                    .last()
                    .and_then(|p| p.parse::<u16>().ok())
                    .unwrap_or(0);
                (3001..=3099).contains(&port) || (8001..=8099).contains(&port)
            },
        ))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any);

    Router::new()
        .route("/v1/status", get(status))
        .route("/api/v1/health", get(health))
        .route("/api/v1/chat", post(chat))
        .route("/api/v1/session/:session_id/reset", post(reset_session))
        .route("/api/v1/analytics", get(analytics))
        .route("/api/v1/logs", get(logs_stream))
        .with_state(state)
        .layer(cors)
}

/// GET /api/v1/health – liveness check for UI and scripts.
async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

/// GET /v1/status – app identity and engine parameters.
async fn status(State(state): State<AppState>) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "app_name": state.config.app_name,
        "port": state.config.port,
        "dataset_size": state.engine.dataset_len(),
        "similarity_threshold": state.engine.threshold(),
        "remote_generation": state.config.remote_generation,
        "active_sessions": state.sessions.len(),
    }))
}

/// GET /api/v1/analytics – chat-logger counters snapshot.
async fn analytics(State(state): State<AppState>) -> axum::Json<serde_json::Value> {
    let snapshot = state.engine.analytics();
    axum::Json(serde_json::to_value(snapshot).unwrap_or_else(|_| serde_json::json!({})))
}

#[derive(serde::Deserialize)]
struct ChatRequest {
    /// Omitted or empty on first contact; the gateway allocates one.
    #[serde(default)]
    session_id: Option<String>,
    message: String,
}

/// POST /api/v1/chat – resolves one query within its session.
async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> axum::Json<serde_json::Value> {
    let session_id = req
        .session_id
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let memory = {
        let entry = state
            .sessions
            .entry(session_id.clone())
            .or_insert_with(|| {
                tracing::info!(target: "faqbot::gateway", session = %session_id, "session created");
                Arc::new(Mutex::new(
                    ConversationMemory::new(state.config.history_limit)
                        .with_session_id(session_id.clone()),
                ))
            });
        Arc::clone(entry.value())
    };

    let mut guard = memory.lock().await;
    let resolution = state.engine.resolve(&req.message, &mut guard).await;
    drop(guard);

    axum::Json(serde_json::json!({
        "session_id": session_id,
        "answer": resolution.answer,
        "confidence": resolution.confidence,
        "source": resolution.source,
    }))
}

/// POST /api/v1/session/:session_id/reset – drops a session's memory.
async fn reset_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> axum::Json<serde_json::Value> {
    let removed = state.sessions.remove(&session_id).is_some();
    if removed {
        tracing::info!(target: "faqbot::gateway", session = %session_id, "session reset");
    }
    axum::Json(serde_json::json!({
        "session_id": session_id,
        "status": if removed { "reset" } else { "unknown_session" },
    }))
}

/// GET /api/v1/logs – Server-Sent Events stream of gateway logs (tracing output).
async fn logs_stream(
    State(state): State<AppState>,
) -> Sse<impl futures_util::Stream<Item = Result<Event, std::convert::Infallible>> + Send + 'static>
{
    use async_stream::stream;
    let mut rx = state.log_tx.subscribe();
    let stream = stream! {
        loop {
            tokio::select! {
                r = rx.recv() => match r {
                    Ok(line) => yield Ok(Event::default().data(line)),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        yield Ok(Event::default().data(format!("... {} log lines dropped", n)));
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = tokio::time::sleep(Duration::from_secs(15)) => {
                    yield Ok(Event::default().comment("keepalive"));
                }
            }
        }
    };
    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    )
}
