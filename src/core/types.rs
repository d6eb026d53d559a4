use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One chat message observed on a monitored session page.
///
/// Text is trimmed and guaranteed non-empty by the extraction layer;
/// ordering inside a batch is the order of appearance in the page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub session_id: String,
    pub text: String,
    pub observed_at: DateTime<Utc>,
}

impl Message {
    /// Wrap a raw extracted text into a message, trimming whitespace.
    /// Returns `None` for blank candidates so they never reach storage.
    pub fn from_raw(session_id: &str, raw: &str, observed_at: DateTime<Utc>) -> Option<Self> {
        let text = raw.trim();
        if text.is_empty() {
            return None;
        }
        Some(Self {
            session_id: session_id.to_string(),
            text: text.to_string(),
            observed_at,
        })
    }
}

/// Classified result of one scrape cycle. Produced exactly once per
/// pipeline run — either a full message batch or exactly one error tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeOutcome {
    Success(Vec<Message>),
    /// Target actively refused access (403/429 signature). Terminal for the
    /// session until an explicit restart.
    Blocked { detail: String },
    /// Neither the cascade nor the heuristic found content — markup drifted.
    StructureChanged { detail: String },
    /// Network / navigation / timeout failure; retried on the normal schedule.
    Transient { detail: String },
}

impl ScrapeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ScrapeOutcome::Success(_))
    }

    /// Short tag for logs.
    pub fn label(&self) -> &'static str {
        match self {
            ScrapeOutcome::Success(_) => "success",
            ScrapeOutcome::Blocked { .. } => "blocked",
            ScrapeOutcome::StructureChanged { .. } => "structure-changed",
            ScrapeOutcome::Transient { .. } => "transient",
        }
    }
}

/// Semantic kind of a low-level failure signal. See `scrape::classify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Blocked,
    StructureChanged,
    Transient,
}

/// Lifecycle state of a monitored session inside the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Active,
    /// Scheduling disarmed after a blocking outcome; the entry stays
    /// visible until an explicit restart or stop.
    Suspended,
}

/// Payload published to subscribers for every accepted message.
/// Field names mirror the wire contract consumed by the frontend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewMessageEvent {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub msg: String,
    pub timestamp: DateTime<Utc>,
}

impl NewMessageEvent {
    pub fn from_message(message: &Message) -> Self {
        Self {
            session_id: message.session_id.clone(),
            msg: message.text.clone(),
            timestamp: message.observed_at,
        }
    }
}
