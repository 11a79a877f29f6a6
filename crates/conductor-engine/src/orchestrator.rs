//! The ReAct orchestrator: Reasoning → Acting → Feedback.
//!
//! Each iteration calls the resilient LLM path, then either finalizes or
//! executes the requested tools and feeds their results back into the
//! history. The loop is bounded on three axes (iterations, cumulative
//! tool calls, per-batch tool calls) and the whole tool batch runs behind
//! one umbrella timeout.
//!
//! The public contract is total: the orchestrator never returns an error.
//! Every failure path produces a well-formed [`OrchestrationResponse`]
//! whose content is prefixed with the error code and whose usage map
//! carries `{error: true, error_code}`.

use crate::executor::ToolExecutor;
use crate::summarizer::HistorySummarizer;
use crate::tools::ToolRegistry;
use conductor_core::{
    AgentConfig, ChatMessage, SessionStore, ToolCall, ToolResult, Tracer,
};
use conductor_llm::resilient::ResilientLlmService;
use conductor_llm::types::{OrchestrationRequest, OrchestrationResponse};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Iteration cap per request.
pub const MAX_ITERATIONS: u32 = 3;
/// Cumulative tool-call cap per request.
pub const MAX_TOTAL_TOOL_CALLS: usize = 10;
/// Tool-call cap per LLM turn; excess calls are dropped with a warning.
pub const MAX_TOOLS_PER_BATCH: usize = 5;
/// Umbrella timeout over one tool batch.
pub const TOOL_BATCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Error kinds visible at the orchestration boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ValidationError,
    LlmNullResponse,
    TooManyToolCalls,
    ToolExecutionCriticalFailure,
    IterationCriticalError,
    MaxIterationsExceeded,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::LlmNullResponse => "LLM_NULL_RESPONSE",
            ErrorCode::TooManyToolCalls => "TOO_MANY_TOOL_CALLS",
            ErrorCode::ToolExecutionCriticalFailure => "TOOL_EXECUTION_CRITICAL_FAILURE",
            ErrorCode::IterationCriticalError => "ITERATION_CRITICAL_ERROR",
            ErrorCode::MaxIterationsExceeded => "MAX_ITERATIONS_EXCEEDED",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct Orchestrator {
    resilient: ResilientLlmService,
    executor: ToolExecutor,
    registry: Arc<ToolRegistry>,
    store: Arc<dyn SessionStore>,
    summarizer: Option<HistorySummarizer>,
}

impl Orchestrator {
    pub fn new(
        factory: Arc<conductor_llm::factory::ProviderFactory>,
        registry: Arc<ToolRegistry>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            resilient: ResilientLlmService::new(factory),
            executor: ToolExecutor::new(registry.clone()),
            registry,
            store,
            summarizer: None,
        }
    }

    pub fn with_summarizer(mut self, summarizer: HistorySummarizer) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    /// Run the ReAct loop over `history`.
    ///
    /// Tool-call descriptions and tool results are appended to `history`
    /// before each next LLM turn, so a caller persisting the history keeps
    /// the full feedback record.
    pub async fn run(
        &self,
        config: &AgentConfig,
        history: &mut Vec<ChatMessage>,
        tracer: Option<&Tracer>,
    ) -> OrchestrationResponse {
        if let Err(e) = config.validate() {
            return self
                .error_response(
                    ErrorCode::ValidationError,
                    &format!("Validation failed: {e}"),
                    config,
                    tracer,
                )
                .await;
        }

        info!(messages = history.len(), "orchestration started");

        let tool_definitions = if config.tools_enabled {
            self.registry.definitions_for(&config.available_tools)
        } else {
            Vec::new()
        };

        let mut total_tool_calls = 0usize;

        for iteration in 1..=MAX_ITERATIONS {
            info!(iteration, max = MAX_ITERATIONS, "ReAct iteration");

            // --- Reasoning ---
            if let Some(tracer) = tracer {
                let prompt_length: usize =
                    history.iter().map(|m| m.content.chars().count()).sum();
                tracer
                    .log_llm_call(config.provider.as_str(), &config.model_version, prompt_length)
                    .await;
            }

            let request = OrchestrationRequest::new(
                config.clone(),
                history.clone(),
                tool_definitions.clone(),
            );
            let response = match self
                .resilient
                .orchestration_completion(config, &request, tracer)
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    error!("LLM path exhausted: {e}");
                    return self
                        .error_response(ErrorCode::LlmNullResponse, &e.message, config, tracer)
                        .await;
                }
            };

            if let Some(tracer) = tracer {
                tracer
                    .log_llm_response(
                        &response.provider,
                        response.content.chars().count(),
                        response.tool_calls.len(),
                    )
                    .await;
            }

            // --- Final? ---
            if !response.requires_tool_execution || response.tool_calls.is_empty() {
                info!(iteration, "final response reached");
                if let Some(tracer) = tracer {
                    tracer
                        .log_final_response(response.content.chars().count(), iteration as usize)
                        .await;
                }
                return response;
            }

            // --- Acting ---
            if iteration == MAX_ITERATIONS {
                // No LLM turn remains to consume tool results; skip the
                // batch and exhaust.
                break;
            }

            total_tool_calls += response.tool_calls.len();
            if total_tool_calls > MAX_TOTAL_TOOL_CALLS {
                warn!(total_tool_calls, "cumulative tool-call cap exceeded");
                return self
                    .error_response(
                        ErrorCode::TooManyToolCalls,
                        &format!("Tool execution limit reached ({MAX_TOTAL_TOOL_CALLS})"),
                        config,
                        tracer,
                    )
                    .await;
            }

            let mut batch = response.tool_calls.clone();
            if batch.len() > MAX_TOOLS_PER_BATCH {
                warn!(
                    requested = batch.len(),
                    cap = MAX_TOOLS_PER_BATCH,
                    "tool batch truncated"
                );
                batch.truncate(MAX_TOOLS_PER_BATCH);
            }

            let results = match tokio::time::timeout(
                TOOL_BATCH_TIMEOUT,
                self.executor.execute_batch(&batch),
            )
            .await
            {
                Ok(results) => results,
                Err(_) => {
                    error!(timeout = ?TOOL_BATCH_TIMEOUT, "tool batch timed out");
                    return self
                        .error_response(
                            ErrorCode::ToolExecutionCriticalFailure,
                            "Critical tool failure: execution timed out",
                            config,
                            tracer,
                        )
                        .await;
                }
            };

            if let Some(tracer) = tracer {
                for (call, result) in batch.iter().zip(&results) {
                    tracer
                        .log_tool_execution(&call.tool_name, result.success, None)
                        .await;
                }
            }

            // --- Feedback ---
            if let Err(e) = inject_feedback(history, &batch, &results) {
                error!("feedback injection failed: {e}");
                return self
                    .error_response(
                        ErrorCode::IterationCriticalError,
                        &format!("Critical error in iteration {iteration}"),
                        config,
                        tracer,
                    )
                    .await;
            }
            info!(results = results.len(), "tool results injected, iterating");
        }

        warn!(max = MAX_ITERATIONS, "iteration cap reached");
        self.error_response(
            ErrorCode::MaxIterationsExceeded,
            &format!(
                "Iteration limit reached ({MAX_ITERATIONS}). The agent could not \
                 converge to a final answer; this may indicate a reasoning loop."
            ),
            config,
            tracer,
        )
        .await
    }

    /// Session-aware run: summarize if needed, append the user message,
    /// run the loop against the session history, append the final
    /// assistant message, persist.
    ///
    /// Callers that may race on the same session should hold
    /// `store.lock_for(session_id)` across this call.
    pub async fn run_with_session(
        &self,
        session_id: Uuid,
        user_message: &str,
        config: Option<AgentConfig>,
        tracer: Option<&Tracer>,
    ) -> OrchestrationResponse {
        let config = config.unwrap_or_default();

        let session = match self.store.get(session_id).await {
            Ok(session) => session,
            Err(e) => {
                return self
                    .error_response(
                        ErrorCode::ValidationError,
                        &format!("Unknown session: {e}"),
                        &config,
                        tracer,
                    )
                    .await;
            }
        };

        info!(%session_id, agent = %session.agent_name, "session orchestration");
        if let Some(tracer) = tracer {
            tracer.log_orchestration_start(&session.agent_name, 1).await;
        }

        if let Some(summarizer) = &self.summarizer {
            summarizer.summarize_if_needed(session_id, tracer).await;
        }

        let user_message = match ChatMessage::user(user_message) {
            Ok(message) => message,
            Err(e) => {
                return self
                    .error_response(
                        ErrorCode::ValidationError,
                        &format!("Message rejected: {e}"),
                        &config,
                        tracer,
                    )
                    .await;
            }
        };
        if let Err(e) = self
            .append_to_session(session_id, std::iter::once(user_message))
            .await
        {
            return self
                .error_response(ErrorCode::ValidationError, &e, &config, tracer)
                .await;
        }

        // Run on a detached copy; the tracer keeps writing trace steps to
        // the stored session in the meantime.
        let mut history = match self.store.get(session_id).await {
            Ok(session) => session.history,
            Err(e) => {
                return self
                    .error_response(ErrorCode::ValidationError, &e.to_string(), &config, tracer)
                    .await;
            }
        };
        let before_run = history.len();
        let response = self.run(&config, &mut history, tracer).await;

        // Persist the feedback messages plus the final assistant turn.
        let mut appended: Vec<ChatMessage> = history.split_off(before_run);
        match ChatMessage::assistant(&response.content) {
            Ok(message) => appended.push(message),
            Err(e) => warn!("final assistant message not recorded: {e}"),
        }
        if let Err(e) = self.append_to_session(session_id, appended.into_iter()).await {
            warn!(%session_id, "session update lost: {e}");
        }

        if let Some(tracer) = tracer {
            let total_steps = self
                .store
                .get(session_id)
                .await
                .map(|s| s.trace.len())
                .unwrap_or(0);
            tracer
                .log_final_response(response.content.chars().count(), total_steps)
                .await;
        }

        response
    }

    /// Reload-append-save so concurrent trace writes are never clobbered.
    async fn append_to_session(
        &self,
        session_id: Uuid,
        messages: impl Iterator<Item = ChatMessage>,
    ) -> Result<(), String> {
        let mut session = self
            .store
            .get(session_id)
            .await
            .map_err(|e| e.to_string())?;
        session.history.extend(messages);
        self.store
            .save(&mut session)
            .await
            .map_err(|e| e.to_string())
    }

    async fn error_response(
        &self,
        code: ErrorCode,
        message: &str,
        config: &AgentConfig,
        tracer: Option<&Tracer>,
    ) -> OrchestrationResponse {
        if let Some(tracer) = tracer {
            tracer
                .log_error("AgentOrchestrator", code.as_str(), message)
                .await;
        }

        let mut usage = Map::new();
        usage.insert("error".into(), Value::Bool(true));
        usage.insert("error_code".into(), json!(code.as_str()));

        OrchestrationResponse {
            content: format!("[ORCHESTRATION_ERROR – {code}] {message}"),
            tool_calls: Vec::new(),
            provider: config.provider.as_str().to_string(),
            model: config.model_version.clone(),
            usage,
            requires_tool_execution: false,
        }
    }
}

/// Append the assistant tool-call description and one tool-role message
/// per result.
fn inject_feedback(
    history: &mut Vec<ChatMessage>,
    calls: &[ToolCall],
    results: &[ToolResult],
) -> Result<(), conductor_core::ContentError> {
    let described = calls
        .iter()
        .map(ToolCall::describe)
        .collect::<Vec<_>>()
        .join(", ");
    history.push(ChatMessage::assistant(format!("Tool call: {described}"))?);

    for result in results {
        let content = if result.success {
            format!("Tool result: {}", result.result.as_deref().unwrap_or(""))
        } else {
            format!("Tool error: {}", result.error.as_deref().unwrap_or(""))
        };
        history.push(ChatMessage::tool(content)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::{InMemorySessionStore, ProviderKind, Role, ToolDefinition};
    use conductor_llm::factory::ProviderFactory;
    use conductor_llm::provider::LLMProvider;
    use conductor_llm::types::{ChatResponse, LLMResult};
    use conductor_monitoring::MetricsCollector;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted LLM: one queued response per expected call.
    struct ScriptedLlm {
        turns: Vec<LLMResult<OrchestrationResponse>>,
        calls: AtomicUsize,
    }

    impl ScriptedLlm {
        fn new(turns: Vec<LLMResult<OrchestrationResponse>>) -> Self {
            Self {
                turns,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl LLMProvider for ScriptedLlm {
        fn provider_name(&self) -> &str {
            "openai"
        }
        fn available_models(&self) -> Vec<&str> {
            vec![]
        }
        async fn chat_completion(
            &self,
            _: &[ChatMessage],
            _: &str,
            _: u32,
            _: f32,
        ) -> LLMResult<ChatResponse> {
            unimplemented!("unused")
        }
        async fn orchestration_completion(
            &self,
            _: &OrchestrationRequest,
        ) -> LLMResult<OrchestrationResponse> {
            let index = self.calls.fetch_add(1, Ordering::SeqCst);
            self.turns
                .get(index)
                .cloned()
                .unwrap_or_else(|| Err(conductor_llm::types::LLMError::Other("script exhausted".into())))
        }
        fn format_tools(&self, _: &[ToolDefinition]) -> Value {
            Value::Null
        }
    }

    fn final_turn(content: &str) -> LLMResult<OrchestrationResponse> {
        Ok(OrchestrationResponse::text(content, "openai", "gpt-4o-mini", Map::new()))
    }

    fn tool_turn(calls: Vec<ToolCall>) -> LLMResult<OrchestrationResponse> {
        Ok(
            OrchestrationResponse::text("", "openai", "gpt-4o-mini", Map::new())
                .with_tool_calls(calls),
        )
    }

    fn time_call(id: &str) -> ToolCall {
        let mut arguments = Map::new();
        arguments.insert("timezone".into(), json!("UTC"));
        ToolCall::new(id, "get_current_time", arguments)
    }

    fn orchestrator(turns: Vec<LLMResult<OrchestrationResponse>>) -> (Orchestrator, Arc<InMemorySessionStore>) {
        let factory = Arc::new(ProviderFactory::new());
        factory.register(ProviderKind::OpenAi, Arc::new(ScriptedLlm::new(turns)));
        let store: Arc<InMemorySessionStore> = Arc::new(InMemorySessionStore::new());
        let orchestrator = Orchestrator::new(
            factory,
            Arc::new(ToolRegistry::with_builtins()),
            store.clone(),
        );
        (orchestrator, store)
    }

    fn fast_config() -> AgentConfig {
        let mut config = AgentConfig::default();
        config.retry = conductor_core::RetryConfig::new(1, 0.1).unwrap();
        config
    }

    #[tokio::test]
    async fn no_tool_turn_finalizes_in_one_iteration() {
        let (orchestrator, _) = orchestrator(vec![final_turn("All done.")]);
        let mut history = vec![ChatMessage::user("Summarize: dogs are loyal.").unwrap()];

        let response = orchestrator.run(&fast_config(), &mut history, None).await;
        assert_eq!(response.content, "All done.");
        assert!(!response.requires_tool_execution);
        assert_eq!(history.len(), 1, "no feedback messages expected");
    }

    #[tokio::test]
    async fn tool_turn_feeds_results_back_then_finalizes() {
        let (orchestrator, _) = orchestrator(vec![
            tool_turn(vec![time_call("call_1")]),
            final_turn("It is noon UTC."),
        ]);
        let mut history = vec![ChatMessage::user("What time is it in UTC?").unwrap()];

        let response = orchestrator.run(&fast_config(), &mut history, None).await;
        assert_eq!(response.content, "It is noon UTC.");

        // [user, assistant tool-call description, tool result]
        assert_eq!(history.len(), 3);
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[1].content, "Tool call: get_current_time(timezone=UTC)");
        assert_eq!(history[2].role, Role::Tool);
        assert!(history[2].content.starts_with("Tool result: Current time: "));
    }

    #[tokio::test]
    async fn iteration_cap_yields_error_code() {
        let (orchestrator, _) = orchestrator(vec![
            tool_turn(vec![time_call("c1")]),
            tool_turn(vec![time_call("c2")]),
            tool_turn(vec![time_call("c3")]),
        ]);
        let mut history = vec![ChatMessage::user("loop forever").unwrap()];

        let response = orchestrator.run(&fast_config(), &mut history, None).await;
        assert!(response
            .content
            .starts_with("[ORCHESTRATION_ERROR – MAX_ITERATIONS_EXCEEDED]"));
        assert_eq!(response.usage["error"], json!(true));
        assert_eq!(response.usage["error_code"], json!("MAX_ITERATIONS_EXCEEDED"));
        assert!(response.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn cumulative_tool_cap_yields_error_code() {
        // Two turns of six and five calls blow through the cap of ten.
        let first: Vec<ToolCall> = (0..6).map(|i| time_call(&format!("a{i}"))).collect();
        let second: Vec<ToolCall> = (0..5).map(|i| time_call(&format!("b{i}"))).collect();
        let (orchestrator, _) = orchestrator(vec![tool_turn(first), tool_turn(second)]);
        let mut history = vec![ChatMessage::user("tool storm").unwrap()];

        let response = orchestrator.run(&fast_config(), &mut history, None).await;
        assert!(response
            .content
            .starts_with("[ORCHESTRATION_ERROR – TOO_MANY_TOOL_CALLS]"));
    }

    #[tokio::test]
    async fn batch_is_capped_at_five() {
        let calls: Vec<ToolCall> = (0..7).map(|i| time_call(&format!("c{i}"))).collect();
        let (orchestrator, _) =
            orchestrator(vec![tool_turn(calls), final_turn("done")]);
        let mut history = vec![ChatMessage::user("many tools").unwrap()];

        let response = orchestrator.run(&fast_config(), &mut history, None).await;
        assert_eq!(response.content, "done");

        // One description message + five (not seven) tool results.
        let tool_messages = history.iter().filter(|m| m.role == Role::Tool).count();
        assert_eq!(tool_messages, 5);
    }

    #[tokio::test]
    async fn llm_exhaustion_yields_null_response_code() {
        let (orchestrator, _) = orchestrator(vec![
            Err(conductor_llm::types::LLMError::Timeout("down".into())),
        ]);
        let mut history = vec![ChatMessage::user("hello").unwrap()];

        let response = orchestrator.run(&fast_config(), &mut history, None).await;
        assert!(response
            .content
            .starts_with("[ORCHESTRATION_ERROR – LLM_NULL_RESPONSE]"));
        assert!(!response.content.contains("down"), "raw error must not leak");
    }

    #[tokio::test]
    async fn invalid_config_fails_validation_upfront() {
        let (orchestrator, _) = orchestrator(vec![final_turn("unused")]);
        let mut config = fast_config();
        config.retry.max_attempts = 0;
        let mut history = Vec::new();

        let response = orchestrator.run(&config, &mut history, None).await;
        assert!(response
            .content
            .starts_with("[ORCHESTRATION_ERROR – VALIDATION_ERROR]"));
    }

    #[tokio::test]
    async fn session_flow_persists_full_feedback_history() {
        let (orchestrator, store) = orchestrator(vec![
            tool_turn(vec![time_call("call_1")]),
            final_turn("It is noon UTC."),
        ]);
        let session = store.create("Time_Info_Agent", None).await.unwrap();
        let tracer = Tracer::with_metrics(
            session.session_id,
            store.clone(),
            Arc::new(MetricsCollector::new()),
        );

        let response = orchestrator
            .run_with_session(
                session.session_id,
                "What time is it in UTC?",
                Some(fast_config()),
                Some(&tracer),
            )
            .await;
        assert_eq!(response.content, "It is noon UTC.");

        let session = store.get(session.session_id).await.unwrap();
        let roles: Vec<Role> = session.history.iter().map(|m| m.role).collect();
        assert_eq!(roles, [Role::User, Role::Assistant, Role::Tool, Role::Assistant]);
        assert_eq!(session.history[3].content, "It is noon UTC.");

        let events: Vec<&str> = session.trace.iter().map(|s| s.event.as_str()).collect();
        assert!(events.contains(&"orchestration_start"));
        assert_eq!(*events.last().unwrap(), "final_response");
    }

    #[tokio::test]
    async fn unknown_session_is_a_validation_error() {
        let (orchestrator, _) = orchestrator(vec![final_turn("unused")]);
        let response = orchestrator
            .run_with_session(Uuid::new_v4(), "hello", None, None)
            .await;
        assert!(response
            .content
            .starts_with("[ORCHESTRATION_ERROR – VALIDATION_ERROR]"));
    }
}
