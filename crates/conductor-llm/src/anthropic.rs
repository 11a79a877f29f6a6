//! Anthropic Messages API adapter.
//!
//! System messages are lifted out of the history into the `system` field;
//! tool invocations surface as `tool_use` content blocks carrying
//! `{id, name, input}` with the input already a JSON object.

use crate::provider::LLMProvider;
use crate::schema::anthropic_tools;
use crate::types::{ChatResponse, LLMError, LLMResult, OrchestrationRequest, OrchestrationResponse};
use async_trait::async_trait;
use conductor_core::{ChatMessage, ProviderKind, Role, ToolCall, ToolDefinition};
use serde_json::{Map, Value, json};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub base_url: String,
    /// `anthropic-version` header value.
    pub version: String,
    pub default_model: String,
    pub timeout_secs: u64,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.anthropic.com".to_string(),
            version: "2023-06-01".to_string(),
            default_model: "claude-3-5-sonnet-20241022".to_string(),
            timeout_secs: 60,
        }
    }
}

impl AnthropicConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var(ProviderKind::Anthropic.api_key_env()).unwrap_or_default(),
            ..Default::default()
        }
    }
}

pub struct AnthropicProvider {
    client: reqwest::Client,
    config: AnthropicConfig,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicConfig) -> LLMResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LLMError::Config(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> LLMResult<Self> {
        Self::new(AnthropicConfig::from_env())
    }

    /// Split history into the system prompt and the message array.
    fn convert_messages(messages: &[ChatMessage]) -> (Option<String>, Vec<Value>) {
        let mut system_parts = Vec::new();
        let mut converted = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => system_parts.push(msg.content.clone()),
                Role::User | Role::Tool => converted.push(json!({
                    // tool results are surfaced to user role
                    "role": "user",
                    "content": [{"type": "text", "text": msg.content}],
                })),
                Role::Assistant => converted.push(json!({
                    "role": "assistant",
                    "content": [{"type": "text", "text": msg.content}],
                })),
            }
        }

        let system = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        };
        (system, converted)
    }

    async fn post_messages(&self, body: Value) -> LLMResult<Value> {
        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", &self.config.version)
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

    /// Collect text and `tool_use` blocks from a response body.
    fn parse_content(body: &Value) -> (String, Vec<ToolCall>) {
        let mut text = String::new();
        let mut tool_calls = Vec::new();

        if let Some(blocks) = body.get("content").and_then(Value::as_array) {
            for block in blocks {
                match block.get("type").and_then(Value::as_str) {
                    Some("text") => {
                        if let Some(t) = block.get("text").and_then(Value::as_str) {
                            text.push_str(t);
                        }
                    }
                    Some("tool_use") => {
                        let id = block.get("id").and_then(Value::as_str).unwrap_or_default();
                        let name = block.get("name").and_then(Value::as_str).unwrap_or_default();
                        let input = block
                            .get("input")
                            .and_then(Value::as_object)
                            .cloned()
                            .unwrap_or_default();
                        tool_calls.push(ToolCall::new(id, name, input));
                    }
                    _ => {}
                }
            }
        }

        (text, tool_calls)
    }

    fn parse_usage(body: &Value) -> Map<String, Value> {
        let mut usage = Map::new();
        if let Some(raw) = body.get("usage").and_then(Value::as_object) {
            if let Some(input) = raw.get("input_tokens") {
                usage.insert("prompt_tokens".into(), input.clone());
            }
            if let Some(output) = raw.get("output_tokens") {
                usage.insert("completion_tokens".into(), output.clone());
            }
        }
        usage
    }
}

#[async_trait]
impl LLMProvider for AnthropicProvider {
    fn provider_name(&self) -> &str {
        ProviderKind::Anthropic.as_str()
    }

    fn available_models(&self) -> Vec<&str> {
        vec![
            "claude-3-5-sonnet-20241022",
            "claude-3-5-haiku-20241022",
            "claude-3-opus-20240229",
        ]
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
            self.config.default_model.clone()
        } else {
            model.to_string()
        };
        let (system, converted) = Self::convert_messages(messages);
        let mut body = json!({
            "model": model,
            "max_tokens": max_tokens,
            "temperature": temperature,
            "messages": converted,
        });
        if let Some(system) = system {
            body["system"] = json!(system);
        }

        let response = self.post_messages(body).await?;
        let (content, _) = Self::parse_content(&response);

        Ok(ChatResponse {
            content,
            provider: self.provider_name().to_string(),
            model,
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

        let (mut system, converted) = Self::convert_messages(&request.history);
        if system.is_none() && !config.system_prompt.is_empty() {
            system = Some(config.system_prompt.clone());
        }

        let mut body = json!({
            "model": model,
            "max_tokens": config.max_tokens,
            "temperature": config.temperature,
            "messages": converted,
        });
        if let Some(system) = system {
            body["system"] = json!(system);
        }
        if config.tools_enabled && !request.tools.is_empty() {
            body["tools"] = self.format_tools(&request.tools);
        }

        let response = self.post_messages(body).await?;
        let (content, tool_calls) = Self::parse_content(&response);
        let usage = Self::parse_usage(&response);

        Ok(OrchestrationResponse::text(content, self.provider_name(), model, usage)
            .with_tool_calls(tool_calls))
    }

    fn format_tools(&self, tools: &[ToolDefinition]) -> Value {
        anthropic_tools(tools)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_messages_are_lifted_out() {
        let messages = vec![
            ChatMessage::system("You are terse.").unwrap(),
            ChatMessage::user("hi").unwrap(),
            ChatMessage::tool("Tool result: 4").unwrap(),
        ];
        let (system, converted) = AnthropicProvider::convert_messages(&messages);
        assert_eq!(system.as_deref(), Some("You are terse."));
        assert_eq!(converted.len(), 2);
        assert_eq!(converted[0]["role"], "user");
        // tool-role messages travel as user content
        assert_eq!(converted[1]["role"], "user");
    }

    #[test]
    fn tool_use_blocks_become_tool_calls() {
        let body = json!({
            "content": [
                {"type": "text", "text": "Checking the clock."},
                {"type": "tool_use", "id": "toolu_1", "name": "get_current_time",
                 "input": {"timezone": "UTC"}},
            ],
            "usage": {"input_tokens": 10, "output_tokens": 5}
        });
        let (text, calls) = AnthropicProvider::parse_content(&body);
        assert_eq!(text, "Checking the clock.");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "toolu_1");
        assert_eq!(calls[0].arguments["timezone"], json!("UTC"));

        let usage = AnthropicProvider::parse_usage(&body);
        assert_eq!(usage["prompt_tokens"], json!(10));
        assert_eq!(usage["completion_tokens"], json!(5));
    }
}
