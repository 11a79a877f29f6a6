//! Request, response, and error types for the LLM layer.

use conductor_core::{AgentConfig, ChatMessage, ToolCall, ToolDefinition};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// LLM error classification.
///
/// The variants double as the retry classifier and as the source of the
/// sanitized user-facing message (see [`LLMError::safe_message`]); raw
/// provider detail stays inside the variant and is only ever written to
/// trace details, length-capped.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LLMError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("request timeout: {0}")]
    Timeout(String),
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("configuration error: {0}")]
    Config(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("provider not supported: {0}")]
    ProviderNotSupported(String),
    #[error("LLM error: {0}")]
    Other(String),
}

pub type LLMResult<T> = Result<T, LLMError>;

impl LLMError {
    /// Short classification label, used in trace details.
    pub fn error_type(&self) -> &'static str {
        match self {
            LLMError::Connection(_) => "Connection",
            LLMError::Timeout(_) => "Timeout",
            LLMError::Http { .. } => "Http",
            LLMError::Config(_) => "Config",
            LLMError::Serialization(_) => "Serialization",
            LLMError::ProviderNotSupported(_) => "ProviderNotSupported",
            LLMError::Other(_) => "Other",
        }
    }

    /// User-visible message. Never includes provider internals.
    pub fn safe_message(&self) -> &'static str {
        match self {
            LLMError::Connection(_) => "Connection error to LLM service",
            LLMError::Timeout(_) => "LLM service timeout",
            LLMError::Http { .. } => "Communication error with LLM service",
            LLMError::Config(_) | LLMError::Serialization(_) => "Configuration or data error",
            LLMError::ProviderNotSupported(_) | LLMError::Other(_) => {
                "Technical LLM service error"
            }
        }
    }
}

impl From<reqwest::Error> for LLMError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LLMError::Timeout(e.to_string())
        } else if e.is_connect() {
            LLMError::Connection(e.to_string())
        } else if let Some(status) = e.status() {
            LLMError::Http {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            LLMError::Other(e.to_string())
        }
    }
}

impl From<serde_json::Error> for LLMError {
    fn from(e: serde_json::Error) -> Self {
        LLMError::Serialization(e.to_string())
    }
}

/// Input to one orchestration-capable LLM call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationRequest {
    pub config: AgentConfig,
    pub history: Vec<ChatMessage>,
    /// Definitions for the tools the agent may call this turn.
    pub tools: Vec<ToolDefinition>,
}

impl OrchestrationRequest {
    pub fn new(config: AgentConfig, history: Vec<ChatMessage>, tools: Vec<ToolDefinition>) -> Self {
        Self {
            config,
            history,
            tools,
        }
    }

    /// Total prompt length in characters, for tracing.
    pub fn prompt_length(&self) -> usize {
        self.history.iter().map(|m| m.content.chars().count()).sum()
    }
}

/// Result of one orchestration-capable LLM call.
///
/// Contract: `tool_calls` non-empty implies `requires_tool_execution`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub provider: String,
    pub model: String,
    pub usage: Map<String, Value>,
    pub requires_tool_execution: bool,
}

impl OrchestrationResponse {
    /// Final text response with no tool work.
    pub fn text(
        content: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
        usage: Map<String, Value>,
    ) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
            provider: provider.into(),
            model: model.into(),
            usage,
            requires_tool_execution: false,
        }
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.requires_tool_execution = !tool_calls.is_empty();
        self.tool_calls = tool_calls;
        self
    }
}

/// Result of a plain single-turn chat call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    pub provider: String,
    pub model: String,
    pub usage: Map<String, Value>,
}
