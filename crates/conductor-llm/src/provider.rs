//! LLM provider trait.
//!
//! Every backend (OpenAI-compatible services, Anthropic, Gemini, stubs in
//! tests) implements this trait; the rest of the platform treats providers
//! as opaque. The only semantic contract callers rely on is that a
//! response with tool calls sets `requires_tool_execution`.

use crate::types::{ChatResponse, LLMResult, OrchestrationRequest, OrchestrationResponse};
use async_trait::async_trait;
use conductor_core::{ChatMessage, ToolDefinition};
use serde_json::Value;

#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Stable provider name (matches [`conductor_core::ProviderKind`]).
    fn provider_name(&self) -> &str;

    /// Models this provider instance can serve.
    fn available_models(&self) -> Vec<&str>;

    /// Cheap readiness check (credentials present, endpoint plausible).
    fn healthy(&self) -> bool {
        true
    }

    /// Single-turn chat completion without tools.
    async fn chat_completion(
        &self,
        messages: &[ChatMessage],
        model: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> LLMResult<ChatResponse>;

    /// Tool-capable completion used by the ReAct loop and the router.
    async fn orchestration_completion(
        &self,
        request: &OrchestrationRequest,
    ) -> LLMResult<OrchestrationResponse>;

    /// Emit tool definitions in this provider family's wire shape.
    fn format_tools(&self, tools: &[ToolDefinition]) -> Value;
}
