//! Scripted LLM provider for end-to-end scenarios.

use async_trait::async_trait;
use conductor_core::{ChatMessage, ToolCall, ToolDefinition};
use conductor_llm::provider::LLMProvider;
use conductor_llm::types::{
    ChatResponse, LLMError, LLMResult, OrchestrationRequest, OrchestrationResponse,
};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Build a final-text turn.
pub fn text_turn(content: &str) -> LLMResult<OrchestrationResponse> {
    Ok(OrchestrationResponse::text(
        content,
        "openai",
        "scripted-model",
        Map::new(),
    ))
}

/// Build a final-text turn with token usage attached.
pub fn text_turn_with_usage(
    content: &str,
    prompt_tokens: u64,
    completion_tokens: u64,
) -> LLMResult<OrchestrationResponse> {
    let mut usage = Map::new();
    usage.insert("prompt_tokens".into(), Value::from(prompt_tokens));
    usage.insert("completion_tokens".into(), Value::from(completion_tokens));
    Ok(OrchestrationResponse::text(
        content,
        "openai",
        "scripted-model",
        usage,
    ))
}

/// Build a turn that requests the given tool calls.
pub fn tool_turn(calls: Vec<ToolCall>) -> LLMResult<OrchestrationResponse> {
    Ok(
        OrchestrationResponse::text("", "openai", "scripted-model", Map::new())
            .with_tool_calls(calls),
    )
}

/// Build a tool call with string arguments.
pub fn tool_call(id: &str, name: &str, arguments: &[(&str, &str)]) -> ToolCall {
    let arguments: Map<String, Value> = arguments
        .iter()
        .map(|(key, value)| (key.to_string(), Value::String(value.to_string())))
        .collect();
    ToolCall::new(id, name, arguments)
}

/// Plays back a fixed script of orchestration outcomes and records the
/// requests it was given.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<LLMResult<OrchestrationResponse>>>,
    seen: Mutex<Vec<OrchestrationRequest>>,
}

impl ScriptedProvider {
    pub fn new(turns: Vec<LLMResult<OrchestrationResponse>>) -> Self {
        Self {
            script: Mutex::new(turns.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Number of orchestration calls received so far.
    pub fn call_count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    /// Every request received, in order.
    pub fn seen_requests(&self) -> Vec<OrchestrationRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn available_models(&self) -> Vec<&str> {
        vec!["scripted-model"]
    }

    async fn chat_completion(
        &self,
        _messages: &[ChatMessage],
        model: &str,
        _max_tokens: u32,
        _temperature: f32,
    ) -> LLMResult<ChatResponse> {
        Ok(ChatResponse {
            content: "scripted chat reply".to_string(),
            provider: "openai".to_string(),
            model: model.to_string(),
            usage: Map::new(),
        })
    }

    async fn orchestration_completion(
        &self,
        request: &OrchestrationRequest,
    ) -> LLMResult<OrchestrationResponse> {
        self.seen.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LLMError::Other("scripted provider exhausted".into())))
    }

    fn format_tools(&self, _tools: &[ToolDefinition]) -> Value {
        Value::Null
    }
}
