//! Agent, retry, and history configuration.

use crate::sanitize::{ContentError, sanitize_content};
use crate::tool::ToolName;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;

/// Configuration validation failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("max_attempts must be within [1, 10], got {0}")]
    RetryAttemptsOutOfRange(u32),
    #[error("delay_base must be within [0.1, 60] seconds, got {0}")]
    RetryDelayOutOfRange(f64),
    #[error("{0} threshold must be strictly positive")]
    ThresholdNotPositive(&'static str),
    #[error("agent name {0:?} is not a valid identifier")]
    InvalidAgentName(String),
    #[error("system prompt rejected: {0}")]
    InvalidSystemPrompt(#[from] ContentError),
}

/// Supported LLM providers. Each knows its credential environment
/// variable; base URLs and default models live with the adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "gemini")]
    Gemini,
    #[serde(rename = "mistral")]
    Mistral,
    #[serde(rename = "grok")]
    Grok,
    #[serde(rename = "qwen")]
    Qwen,
    #[serde(rename = "deepseek")]
    DeepSeek,
    #[serde(rename = "kimi_k2")]
    KimiK2,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 8] = [
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
        ProviderKind::Gemini,
        ProviderKind::Mistral,
        ProviderKind::Grok,
        ProviderKind::Qwen,
        ProviderKind::DeepSeek,
        ProviderKind::KimiK2,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Mistral => "mistral",
            ProviderKind::Grok => "grok",
            ProviderKind::Qwen => "qwen",
            ProviderKind::DeepSeek => "deepseek",
            ProviderKind::KimiK2 => "kimi_k2",
        }
    }

    /// Environment variable holding this provider's API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
            ProviderKind::Mistral => "MISTRAL_API_KEY",
            ProviderKind::Grok => "GROK_API_KEY",
            ProviderKind::Qwen => "QWEN_API_KEY",
            ProviderKind::DeepSeek => "DEEPSEEK_API_KEY",
            ProviderKind::KimiK2 => "KIMI_K2_API_KEY",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bounded exponential-backoff retry configuration.
///
/// Attempt `k` sleeps `delay_base · 2^(k−1)` seconds before attempt `k+1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    /// Base delay in seconds.
    pub delay_base: f64,
}

impl RetryConfig {
    pub fn new(max_attempts: u32, delay_base: f64) -> Result<Self, ConfigError> {
        if !(1..=10).contains(&max_attempts) {
            return Err(ConfigError::RetryAttemptsOutOfRange(max_attempts));
        }
        if !(0.1..=60.0).contains(&delay_base) {
            return Err(ConfigError::RetryDelayOutOfRange(delay_base));
        }
        Ok(Self {
            max_attempts,
            delay_base,
        })
    }

    /// Backoff delay after a failed attempt `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        Duration::from_secs_f64(self.delay_base * 2f64.powi(attempt.saturating_sub(1) as i32))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_base: 1.0,
        }
    }
}

/// Per-agent LLM configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub provider: ProviderKind,
    pub model_version: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub tools_enabled: bool,
    /// Validated subset of the tool allow-list.
    pub available_tools: Vec<ToolName>,
    pub system_prompt: String,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenAi,
            model_version: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 1000,
            tools_enabled: true,
            available_tools: ToolName::ALL.to_vec(),
            system_prompt: String::new(),
            retry: RetryConfig::default(),
        }
    }
}

impl AgentConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_version = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn without_tools(mut self) -> Self {
        self.tools_enabled = false;
        self.available_tools.clear();
        self
    }

    /// Check the parts a constructor cannot enforce (deserialized configs).
    pub fn validate(&self) -> Result<(), ConfigError> {
        sanitize_content(&self.system_prompt)?;
        RetryConfig::new(self.retry.max_attempts, self.retry.delay_base)?;
        Ok(())
    }
}

static AGENT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("agent-name regex is valid"));

/// A named, routable agent: identifier, human description, and the
/// configuration the orchestrator runs it with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub agent_name: String,
    pub description: String,
    pub default_config: AgentConfig,
}

impl AgentDefinition {
    /// Validates the name and synthesizes a system prompt when the config
    /// carries none.
    pub fn new(
        agent_name: impl Into<String>,
        description: impl Into<String>,
        mut default_config: AgentConfig,
    ) -> Result<Self, ConfigError> {
        let agent_name = agent_name.into();
        if !AGENT_NAME.is_match(&agent_name) {
            return Err(ConfigError::InvalidAgentName(agent_name));
        }
        let description = description.into();
        if default_config.system_prompt.is_empty() {
            default_config.system_prompt = format!("You are {agent_name}. {description}");
        }
        default_config.validate()?;
        Ok(Self {
            agent_name,
            description,
            default_config,
        })
    }
}

/// History summarization configuration carried by each session.
///
/// Omitted fields deserialize to the defaults, so clients may send a
/// partial configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub enabled: bool,
    pub message_threshold: usize,
    pub token_threshold: usize,
    pub word_threshold: usize,
    pub char_threshold: usize,
    pub provider: ProviderKind,
    pub model_version: String,
    pub system_prompt: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            message_threshold: 10,
            token_threshold: 3000,
            word_threshold: 2000,
            char_threshold: 12_000,
            provider: ProviderKind::OpenAi,
            model_version: "gpt-3.5-turbo".to_string(),
            system_prompt: "You are a conversation summarizer. Condense the conversation \
                            into a short summary that preserves the essential context, \
                            decisions made, and any pending user request."
                .to_string(),
        }
    }
}

impl HistoryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.message_threshold == 0 {
            return Err(ConfigError::ThresholdNotPositive("message"));
        }
        if self.token_threshold == 0 {
            return Err(ConfigError::ThresholdNotPositive("token"));
        }
        if self.word_threshold == 0 {
            return Err(ConfigError::ThresholdNotPositive("word"));
        }
        if self.char_threshold == 0 {
            return Err(ConfigError::ThresholdNotPositive("char"));
        }
        sanitize_content(&self.system_prompt)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_config_bounds_are_enforced() {
        assert!(RetryConfig::new(0, 1.0).is_err());
        assert!(RetryConfig::new(11, 1.0).is_err());
        assert!(RetryConfig::new(3, 0.05).is_err());
        assert!(RetryConfig::new(3, 61.0).is_err());
        assert!(RetryConfig::new(1, 0.1).is_ok());
        assert!(RetryConfig::new(10, 60.0).is_ok());
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let retry = RetryConfig::new(5, 0.2).unwrap();
        assert_eq!(retry.delay_after(1), Duration::from_secs_f64(0.2));
        assert_eq!(retry.delay_after(2), Duration::from_secs_f64(0.4));
        assert_eq!(retry.delay_after(3), Duration::from_secs_f64(0.8));
    }

    #[test]
    fn agent_names_must_be_identifiers() {
        let config = AgentConfig::default();
        assert!(AgentDefinition::new("Time_Info_Agent", "tells time", config.clone()).is_ok());
        for bad in ["", "9lives", "with space", "dash-ed"] {
            assert!(
                AgentDefinition::new(bad, "x", config.clone()).is_err(),
                "expected rejection for {bad:?}"
            );
        }
    }

    #[test]
    fn empty_system_prompt_is_synthesized() {
        let agent = AgentDefinition::new(
            "Time_Info_Agent",
            "Answers questions about dates and times.",
            AgentConfig::default(),
        )
        .unwrap();
        assert_eq!(
            agent.default_config.system_prompt,
            "You are Time_Info_Agent. Answers questions about dates and times."
        );

        let explicit = AgentDefinition::new("Custom", "d", {
            let mut c = AgentConfig::default();
            c.system_prompt = "keep me".into();
            c
        })
        .unwrap();
        assert_eq!(explicit.default_config.system_prompt, "keep me");
    }

    #[test]
    fn history_thresholds_must_be_positive() {
        let mut config = HistoryConfig::default();
        assert!(config.validate().is_ok());
        config.word_threshold = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ThresholdNotPositive("word"))
        ));
    }

    #[test]
    fn provider_kind_serializes_to_wire_names() {
        assert_eq!(
            serde_json::to_string(&ProviderKind::KimiK2).unwrap(),
            r#""kimi_k2""#
        );
        assert_eq!(
            serde_json::from_str::<ProviderKind>(r#""openai""#).unwrap(),
            ProviderKind::OpenAi
        );
    }
}
