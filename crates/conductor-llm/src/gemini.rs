//! Gemini generateContent adapter.
//!
//! Roles map to `user`/`model`; tools travel as a single element wrapping
//! all function declarations. Function calls come back without an id, so
//! one is synthesized to keep the tool-call/result correspondence uniform
//! across providers.

use crate::provider::LLMProvider;
use crate::schema::gemini_tools;
use crate::types::{ChatResponse, LLMError, LLMResult, OrchestrationRequest, OrchestrationResponse};
use async_trait::async_trait;
use conductor_core::{ChatMessage, ProviderKind, Role, ToolCall, ToolDefinition};
use serde_json::{Map, Value, json};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub default_model: String,
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            default_model: "gemini-1.5-flash".to_string(),
            timeout_secs: 60,
        }
    }
}

impl GeminiConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var(ProviderKind::Gemini.api_key_env()).unwrap_or_default(),
            ..Default::default()
        }
    }
}

pub struct GeminiProvider {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig) -> LLMResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LLMError::Config(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> LLMResult<Self> {
        Self::new(GeminiConfig::from_env())
    }

    /// Split history into a system instruction and `contents`.
    fn convert_messages(messages: &[ChatMessage]) -> (Option<String>, Vec<Value>) {
        let mut system_parts = Vec::new();
        let mut contents = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => system_parts.push(msg.content.clone()),
                Role::Assistant => contents.push(json!({
                    "role": "model",
                    "parts": [{"text": msg.content}],
                })),
                Role::User | Role::Tool => contents.push(json!({
                    "role": "user",
                    "parts": [{"text": msg.content}],
                })),
            }
        }

        let system = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        };
        (system, contents)
    }

    async fn post_generate(&self, model: &str, body: Value) -> LLMResult<Value> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.config.base_url.trim_end_matches('/'),
            model,
            self.config.api_key,
        );
        let response = self.client.post(&url).json(&body).send().await?;

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

    /// Collect text and function-call parts from the first candidate.
    fn parse_candidate(body: &Value) -> (String, Vec<ToolCall>) {
        let mut text = String::new();
        let mut tool_calls = Vec::new();

        let parts = body["candidates"][0]["content"]["parts"].as_array();
        if let Some(parts) = parts {
            for part in parts {
                if let Some(t) = part.get("text").and_then(Value::as_str) {
                    text.push_str(t);
                }
                if let Some(call) = part.get("functionCall") {
                    let name = call.get("name").and_then(Value::as_str).unwrap_or_default();
                    let args = call
                        .get("args")
                        .and_then(Value::as_object)
                        .cloned()
                        .unwrap_or_default();
                    // No wire id; synthesize one so results correlate.
                    let id = format!("call_{}", Uuid::new_v4().simple());
                    tool_calls.push(ToolCall::new(id, name, args));
                }
            }
        }

        (text, tool_calls)
    }

    fn parse_usage(body: &Value) -> Map<String, Value> {
        let mut usage = Map::new();
        if let Some(raw) = body.get("usageMetadata").and_then(Value::as_object) {
            if let Some(prompt) = raw.get("promptTokenCount") {
                usage.insert("prompt_tokens".into(), prompt.clone());
            }
            if let Some(candidates) = raw.get("candidatesTokenCount") {
                usage.insert("completion_tokens".into(), candidates.clone());
            }
        }
        usage
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    fn provider_name(&self) -> &str {
        ProviderKind::Gemini.as_str()
    }

    fn available_models(&self) -> Vec<&str> {
        vec!["gemini-1.5-flash", "gemini-1.5-pro", "gemini-2.0-flash"]
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
        let (system, contents) = Self::convert_messages(messages);
        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "temperature": temperature,
                "maxOutputTokens": max_tokens,
            },
        });
        if let Some(system) = system {
            body["systemInstruction"] = json!({"parts": [{"text": system}]});
        }

        let response = self.post_generate(&model, body).await?;
        let (content, _) = Self::parse_candidate(&response);

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

        let (mut system, contents) = Self::convert_messages(&request.history);
        if system.is_none() && !config.system_prompt.is_empty() {
            system = Some(config.system_prompt.clone());
        }

        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "temperature": config.temperature,
                "maxOutputTokens": config.max_tokens,
            },
        });
        if let Some(system) = system {
            body["systemInstruction"] = json!({"parts": [{"text": system}]});
        }
        if config.tools_enabled && !request.tools.is_empty() {
            body["tools"] = self.format_tools(&request.tools);
        }

        let response = self.post_generate(&model, body).await?;
        let (content, tool_calls) = Self::parse_candidate(&response);
        let usage = Self::parse_usage(&response);

        Ok(OrchestrationResponse::text(content, self.provider_name(), model, usage)
            .with_tool_calls(tool_calls))
    }

    fn format_tools(&self, tools: &[ToolDefinition]) -> Value {
        gemini_tools(tools)
    }
}
