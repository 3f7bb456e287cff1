//! Conversation logging and session analytics. Log-write failures degrade
//! to warnings; the logger never fails a resolution.

use crate::engine::Source;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

/// One resolved exchange, appended as a JSONL line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub user_input: String,
    pub response: String,
    pub source: Source,
    pub confidence: f32,
    pub response_time_ms: u64,
}

/// Aggregate counters across the process lifetime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Analytics {
    pub session_start_ms: i64,
    pub queries: u64,
    pub fallbacks_used: u64,
    pub unanswered_questions: Vec<String>,
    pub average_response_time_ms: f64,
}

/// Appends exchanges to a JSONL file (when configured) and keeps in-memory
/// analytics.
pub struct ChatLogger {
    log_path: Option<PathBuf>,
    analytics: Mutex<Analytics>,
}

impl ChatLogger {
    /// `log_path: None` keeps analytics only, writing nothing to disk.
    pub fn new(log_path: Option<PathBuf>) -> Self {
        Self {
            log_path,
            analytics: Mutex::new(Analytics {
                session_start_ms: now_ms(),
                ..Analytics::default()
            }),
        }
    }

    /// Records one resolved exchange. A confidence at or below the fallback
    /// band counts as a fallback; a static canned fallback additionally
    /// records the question as unanswered.
    pub fn record(&self, entry: LogEntry) {
        if let Ok(mut analytics) = self.analytics.lock() {
            let previous_total =
                analytics.average_response_time_ms * analytics.queries as f64;
            analytics.queries += 1;
            analytics.average_response_time_ms =
                (previous_total + entry.response_time_ms as f64) / analytics.queries as f64;
            if entry.confidence <= 0.5 {
                analytics.fallbacks_used += 1;
            }
            if entry.source == Source::Canned && entry.confidence <= 0.3 {
                analytics.unanswered_questions.push(entry.user_input.clone());
            }
        }

        if let Some(path) = &self.log_path {
            if let Err(e) = append_jsonl(path, &entry) {
                tracing::warn!(
                    target: "faqbot::logger",
                    path = %path.display(),
                    error = %e,
                    "conversation log write failed"
                );
            }
        }
    }

    pub fn snapshot(&self) -> Analytics {
        self.analytics
            .lock()
            .map(|a| a.clone())
            .unwrap_or_default()
    }
}

fn append_jsonl(path: &PathBuf, entry: &LogEntry) -> std::io::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    let line = serde_json::to_string(entry).unwrap_or_default();
    writeln!(file, "{}", line)
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
