//! OpenAI-shaped provider adapter.
//!
//! One adapter serves every service speaking the OpenAI chat-completions
//! dialect: OpenAI itself plus DeepSeek, Kimi, Mistral, Grok, and Qwen.
//! The only wire divergence is Qwen, which takes the tool array under the
//! request field `functions` instead of `tools`.

use crate::provider::LLMProvider;
use crate::schema::{decode_arguments, openai_tools};
use crate::types::{ChatResponse, LLMError, LLMResult, OrchestrationRequest, OrchestrationResponse};
use async_trait::async_trait;
use conductor_core::secrets::mask_api_key;
use conductor_core::{ChatMessage, ProviderKind, ToolCall, ToolDefinition};
use serde_json::{Map, Value, json};
use std::time::Duration;
use tracing::debug;

/// Configuration for one OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleConfig {
    pub kind: ProviderKind,
    pub api_key: String,
    pub base_url: String,
    pub default_model: String,
    pub timeout_secs: u64,
}

impl OpenAiCompatibleConfig {
    /// Endpoint defaults per provider, credentials from the environment.
    pub fn from_env(kind: ProviderKind) -> Self {
        let (base_url, default_model) = match kind {
            ProviderKind::DeepSeek => ("https://api.deepseek.com/v1", "deepseek-chat"),
            ProviderKind::KimiK2 => ("https://api.moonshot.ai/v1", "kimi-k2-0711-preview"),
            ProviderKind::Mistral => ("https://api.mistral.ai/v1", "mistral-small-latest"),
            ProviderKind::Grok => ("https://api.x.ai/v1", "grok-2-latest"),
            ProviderKind::Qwen => (
                "https://dashscope.aliyuncs.com/compatible-mode/v1",
                "qwen-plus",
            ),
            _ => ("https://api.openai.com/v1", "gpt-4o-mini"),
        };
        Self {
            kind,
            api_key: std::env::var(kind.api_key_env()).unwrap_or_default(),
            base_url: base_url.to_string(),
            default_model: default_model.to_string(),
            timeout_secs: 60,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }
}

/// Provider for the OpenAI chat-completions dialect.
pub struct OpenAiCompatibleProvider {
    client: reqwest::Client,
    config: OpenAiCompatibleConfig,
}

impl OpenAiCompatibleProvider {
    pub fn new(config: OpenAiCompatibleConfig) -> LLMResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LLMError::Config(e.to_string()))?;
        debug!(
            provider = config.kind.as_str(),
            key = %mask_api_key(&config.api_key),
            "OpenAI-compatible provider ready"
        );
        Ok(Self { client, config })
    }

    pub fn from_env(kind: ProviderKind) -> LLMResult<Self> {
        Self::new(OpenAiCompatibleConfig::from_env(kind))
    }

    fn convert_messages(messages: &[ChatMessage]) -> Vec<Value> {
        messages
            .iter()
            .map(|msg| json!({"role": msg.role.as_str(), "content": msg.content}))
            .collect()
    }

    async fn post_completion(&self, body: Value) -> LLMResult<Value> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LLMError::Http {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }

    fn parse_tool_calls(message: &Value) -> Vec<ToolCall> {
        let Some(raw_calls) = message.get("tool_calls").and_then(Value::as_array) else {
            return Vec::new();
        };
        raw_calls
            .iter()
            .filter_map(|raw| {
                let id = raw.get("id").and_then(Value::as_str)?;
                let function = raw.get("function")?;
                let name = function.get("name").and_then(Value::as_str)?;
                let arguments = function
                    .get("arguments")
                    .and_then(Value::as_str)
                    .map(decode_arguments)
                    .unwrap_or_default();
                Some(ToolCall::new(id, name, arguments))
            })
            .collect()
    }

    fn parse_usage(body: &Value) -> Map<String, Value> {
        body.get("usage")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl LLMProvider for OpenAiCompatibleProvider {
    fn provider_name(&self) -> &str {
        self.config.kind.as_str()
    }

    fn available_models(&self) -> Vec<&str> {
        match self.config.kind {
            ProviderKind::DeepSeek => vec!["deepseek-chat", "deepseek-reasoner"],
            ProviderKind::KimiK2 => vec!["kimi-k2-0711-preview", "moonshot-v1-8k"],
            ProviderKind::Mistral => vec!["mistral-small-latest", "mistral-large-latest"],
            ProviderKind::Grok => vec!["grok-2-latest", "grok-3-mini"],
            ProviderKind::Qwen => vec!["qwen-plus", "qwen-turbo", "qwen-max"],
            _ => vec!["gpt-4o", "gpt-4o-mini", "gpt-3.5-turbo"],
        }
    }

    fn healthy(&self) -> bool {
        !self.config.api_key.is_empty()
    }

    async fn chat_completion(
        &self,
        messages: &[ChatMessage],
        model: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> LLMResult<ChatResponse> {
        let model = if model.is_empty() {
            self.config.default_model.as_str()
        } else {
            model
        };
        let body = json!({
            "model": model,
            "messages": Self::convert_messages(messages),
            "max_tokens": max_tokens,
            "temperature": temperature,
        });

        let response = self.post_completion(body).await?;
        let content = response["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        Ok(ChatResponse {
            content,
            provider: self.provider_name().to_string(),
            model: model.to_string(),
            usage: Self::parse_usage(&response),
        })
    }

    async fn orchestration_completion(
        &self,
        request: &OrchestrationRequest,
    ) -> LLMResult<OrchestrationResponse> {
        let config = &request.config;
        let model = if config.model_version.is_empty() {
            self.config.default_model.clone()
        } else {
            config.model_version.clone()
        };

        let mut messages = Self::convert_messages(&request.history);
        let has_system = request
            .history
            .iter()
            .any(|msg| msg.role == conductor_core::Role::System);
        if !has_system && !config.system_prompt.is_empty() {
            messages.insert(
                0,
                json!({"role": "system", "content": config.system_prompt}),
            );
        }

        let mut body = json!({
            "model": model,
            "messages": messages,
            "max_tokens": config.max_tokens,
            "temperature": config.temperature,
        });
        if config.tools_enabled && !request.tools.is_empty() {
            // Qwen's dialect takes the same array under "functions".
            let field = if self.config.kind == ProviderKind::Qwen {
                "functions"
            } else {
                "tools"
            };
            body[field] = self.format_tools(&request.tools);
        }

        let response = self.post_completion(body).await?;
        let message = &response["choices"][0]["message"];
        let content = message["content"].as_str().unwrap_or_default().to_string();
        let tool_calls = Self::parse_tool_calls(message);
        let usage = Self::parse_usage(&response);

        Ok(OrchestrationResponse::text(content, self.provider_name(), model, usage)
            .with_tool_calls(tool_calls))
    }

    fn format_tools(&self, tools: &[ToolDefinition]) -> Value {
        openai_tools(tools)
    }
}
