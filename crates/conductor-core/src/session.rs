//! The session aggregate: conversation history plus execution trace.

use crate::config::HistoryConfig;
use crate::message::ChatMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Active,
    Processing,
    Completed,
    Error,
    Paused,
}

/// One timestamped record of a state change inside the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceStep {
    pub timestamp: DateTime<Utc>,
    pub component: String,
    pub event: String,
    pub details: Map<String, Value>,
}

/// History size measurements used by summarization thresholds and traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMetrics {
    pub messages: usize,
    pub chars: usize,
    pub words: usize,
    pub tokens: usize,
}

/// Persistent conversation context.
///
/// `history` and `trace` are both append-only: messages are immutable once
/// appended, and trace steps accumulate for the session's entire lifetime.
/// The summarizer is the only component that replaces `history`, and it
/// does so atomically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: Uuid,
    pub agent_name: String,
    pub status: SessionStatus,
    pub history: Vec<ChatMessage>,
    pub history_config: HistoryConfig,
    pub created_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub trace: Vec<TraceStep>,
}

impl Session {
    pub fn new(agent_name: impl Into<String>, history_config: HistoryConfig) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4(),
            agent_name: agent_name.into(),
            status: SessionStatus::Active,
            history: Vec::new(),
            history_config,
            created_at: now,
            last_message_at: now,
            updated_at: now,
            trace: Vec::new(),
        }
    }

    pub fn message_count(&self) -> usize {
        self.history.len()
    }

    pub fn char_count(&self) -> usize {
        self.history.iter().map(ChatMessage::char_count).sum()
    }

    pub fn word_count(&self) -> usize {
        self.history.iter().map(ChatMessage::word_count).sum()
    }

    /// Rough token estimate: four characters per token.
    pub fn token_estimate(&self) -> usize {
        self.char_count() / 4
    }

    pub fn metrics(&self) -> HistoryMetrics {
        HistoryMetrics {
            messages: self.message_count(),
            chars: self.char_count(),
            words: self.word_count(),
            tokens: self.token_estimate(),
        }
    }

    /// True when summarization is enabled and any threshold is reached.
    pub fn should_summarize(&self) -> bool {
        let config = &self.history_config;
        config.enabled
            && (self.message_count() >= config.message_threshold
                || self.char_count() >= config.char_threshold
                || self.word_count() >= config.word_threshold
                || self.token_estimate() >= config.token_threshold)
    }
}
