//! End-to-end scenarios over the engine: routing, the ReAct loop, retry,
//! summarization, tracing, and metrics, all driven by scripted providers.

use conductor_core::{
    AgentConfig, ChatMessage, HistoryConfig, InMemorySessionStore, ProviderKind, RetryConfig,
    Role, SessionStore, Tracer,
};
use conductor_engine::{
    AgentRouter, HistorySummarizer, Orchestrator, ToolRegistry, default_agents,
};
use conductor_llm::factory::ProviderFactory;
use conductor_llm::resilient::ResilientLlmService;
use conductor_llm::types::{LLMError, LLMResult, OrchestrationRequest, OrchestrationResponse};
use conductor_monitoring::MetricsCollector;
use conductor_testing::{ScriptedProvider, text_turn, text_turn_with_usage, tool_call, tool_turn};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

struct Harness {
    store: Arc<InMemorySessionStore>,
    orchestrator: Orchestrator,
    provider: Arc<ScriptedProvider>,
    factory: Arc<ProviderFactory>,
    metrics: Arc<MetricsCollector>,
}

fn harness(turns: Vec<LLMResult<OrchestrationResponse>>) -> Harness {
    let provider = Arc::new(ScriptedProvider::new(turns));
    let factory = Arc::new(ProviderFactory::new());
    factory.register(ProviderKind::OpenAi, provider.clone());

    let store = Arc::new(InMemorySessionStore::new());
    let summarizer = HistorySummarizer::new(factory.clone(), store.clone());
    let orchestrator = Orchestrator::new(
        factory.clone(),
        Arc::new(ToolRegistry::with_builtins()),
        store.clone(),
    )
    .with_summarizer(summarizer);

    Harness {
        store,
        orchestrator,
        provider,
        factory,
        metrics: Arc::new(MetricsCollector::new()),
    }
}

impl Harness {
    async fn session(&self, agent_name: &str, config: Option<HistoryConfig>) -> Uuid {
        self.store
            .create(agent_name, config)
            .await
            .unwrap()
            .session_id
    }

    fn tracer(&self, session_id: Uuid) -> Tracer {
        Tracer::with_metrics(session_id, self.store.clone(), self.metrics.clone())
    }

    async fn events(&self, session_id: Uuid) -> Vec<String> {
        self.store
            .get(session_id)
            .await
            .unwrap()
            .trace
            .iter()
            .map(|step| step.event.clone())
            .collect()
    }
}

fn agent_config(name: &str) -> AgentConfig {
    default_agents()
        .into_iter()
        .find(|agent| agent.agent_name == name)
        .unwrap()
        .default_config
}

// ---------------------------------------------------------------------------
// S1: no-tool chat
// ---------------------------------------------------------------------------

#[tokio::test]
async fn s1_no_tool_chat() {
    let h = harness(vec![text_turn_with_usage(
        "Dogs are loyal companions; that is the gist.",
        28,
        11,
    )]);
    let id = h.session("Text_Analysis_Agent", None).await;
    let tracer = h.tracer(id);

    let response = h
        .orchestrator
        .run_with_session(
            id,
            "Summarize: dogs are loyal.",
            Some(agent_config("Text_Analysis_Agent")),
            Some(&tracer),
        )
        .await;

    assert!(!response.content.is_empty());
    assert_eq!(h.provider.call_count(), 1, "exactly one LLM call");
    assert!(response.tool_calls.is_empty());

    let session = h.store.get(id).await.unwrap();
    let roles: Vec<Role> = session.history.iter().map(|m| m.role).collect();
    assert_eq!(roles, [Role::User, Role::Assistant]);

    let events = h.events(id).await;
    assert_eq!(events.last().unwrap(), "final_response");
    let start = events.iter().position(|e| e == "orchestration_start").unwrap();
    let end = events.iter().position(|e| e == "final_response").unwrap();
    assert!(start < end, "final_response implies a prior orchestration_start");

    let exported = h.metrics.export().unwrap();
    assert!(exported.contains(
        r#"llm_call_count{model="scripted-model",provider="openai",status="success"} 1"#
    ));
    assert!(exported.contains(
        r#"llm_tokens_consumed{model="scripted-model",provider="openai",token_type="prompt"} 28"#
    ));
    assert!(exported.contains(
        r#"llm_tokens_consumed{model="scripted-model",provider="openai",token_type="completion"} 11"#
    ));
}

// ---------------------------------------------------------------------------
// S2: one tool, single extra iteration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn s2_one_tool_single_iteration() {
    let agents = default_agents();

    // Routing: the router LLM picks Time_Info_Agent via select_agent.
    let router_provider = Arc::new(ScriptedProvider::new(vec![Ok(OrchestrationResponse::text(
        "",
        "openai",
        "scripted-model",
        serde_json::Map::new(),
    )
    .with_tool_calls(vec![{
        let mut arguments = serde_json::Map::new();
        arguments.insert("agent_name".into(), json!("Time_Info_Agent"));
        arguments.insert("reasoning".into(), json!("the request is about time"));
        conductor_core::ToolCall::new("call_route", "select_agent", arguments)
    }]))]));
    let router = AgentRouter::new(router_provider);
    let message = ChatMessage::user("What time is it in UTC?").unwrap();
    let selected = router.dispatch(&message, &agents, None).await.unwrap();
    assert_eq!(selected.agent_name, "Time_Info_Agent");

    // Orchestration: one tool turn, then the final answer.
    let h = harness(vec![
        tool_turn(vec![tool_call("call_1", "get_current_time", &[("timezone", "UTC")])]),
        text_turn("The time in UTC is shown by the tool above."),
    ]);
    let id = h.session("Time_Info_Agent", None).await;
    let tracer = h.tracer(id);

    let response = h
        .orchestrator
        .run_with_session(
            id,
            "What time is it in UTC?",
            Some(selected.default_config.clone()),
            Some(&tracer),
        )
        .await;

    assert_eq!(h.provider.call_count(), 2, "two LLM calls, two iterations");
    assert!(!response.content.is_empty());

    // Persisted history: user, tool-call description, tool result, final.
    let session = h.store.get(id).await.unwrap();
    let roles: Vec<Role> = session.history.iter().map(|m| m.role).collect();
    assert_eq!(roles, [Role::User, Role::Assistant, Role::Tool, Role::Assistant]);
    assert_eq!(
        session.history[1].content,
        "Tool call: get_current_time(timezone=UTC)"
    );
    assert!(session.history[2].content.starts_with("Tool result: Current time: "));

    // The second LLM turn saw the feedback messages.
    let second_request: OrchestrationRequest = h.provider.seen_requests()[1].clone();
    let seen_roles: Vec<Role> = second_request.history.iter().map(|m| m.role).collect();
    assert_eq!(seen_roles, [Role::User, Role::Assistant, Role::Tool]);
    assert!(second_request.history[2].content.contains("Current time:"));

    let events = h.events(id).await;
    assert_eq!(events.iter().filter(|e| *e == "tool_execution").count(), 1);

    let exported = h.metrics.export().unwrap();
    assert!(exported.contains(
        r#"tool_execution_count{status="success",tool_name="get_current_time"} 1"#
    ));
}

// ---------------------------------------------------------------------------
// S3: retry success on the second attempt
// ---------------------------------------------------------------------------

#[tokio::test]
async fn s3_retry_success_on_second_attempt() {
    let h = harness(vec![
        Err(LLMError::Connection("transient network failure".into())),
        text_turn("recovered"),
    ]);
    let id = h.session("Text_Analysis_Agent", None).await;
    let tracer = h.tracer(id);

    let mut config = agent_config("Text_Analysis_Agent");
    config.retry = RetryConfig::new(3, 0.2).unwrap();
    let request = OrchestrationRequest::new(
        config.clone(),
        vec![ChatMessage::user("hello").unwrap()],
        vec![],
    );

    let resilient = ResilientLlmService::new(h.factory.clone());
    let started = Instant::now();
    let response = resilient
        .orchestration_completion(&config, &request, Some(&tracer))
        .await
        .unwrap();
    let elapsed = started.elapsed().as_secs_f64();

    assert_eq!(response.content, "recovered");
    assert!(elapsed >= 0.2, "first backoff must be delay_base: {elapsed}");
    assert!(elapsed < 0.4, "first backoff must not double: {elapsed}");

    let events = h.events(id).await;
    assert_eq!(events.iter().filter(|e| *e == "retry_attempt_failed").count(), 1);
    assert_eq!(events.iter().filter(|e| *e == "llm_call_success").count(), 1);

    let exported = h.metrics.export().unwrap();
    assert!(exported.contains(
        r#"retry_attempts_count{component="ResilientLLMService",operation="orchestration_completion"} 1"#
    ));
}

// ---------------------------------------------------------------------------
// S4: retry exhaustion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn s4_retry_exhaustion() {
    let h = harness(vec![
        Err(LLMError::Connection("ECONNREFUSED 10.0.0.17:443".into())),
        Err(LLMError::Connection("ECONNREFUSED 10.0.0.17:443".into())),
        Err(LLMError::Connection("ECONNREFUSED 10.0.0.17:443".into())),
    ]);
    let id = h.session("Text_Analysis_Agent", None).await;
    let tracer = h.tracer(id);

    let mut config = agent_config("Text_Analysis_Agent");
    config.retry = RetryConfig::new(3, 0.1).unwrap();

    let response = h
        .orchestrator
        .run_with_session(id, "hello", Some(config), Some(&tracer))
        .await;

    assert!(
        response
            .content
            .starts_with("[ORCHESTRATION_ERROR – LLM_NULL_RESPONSE]"),
        "got: {}",
        response.content
    );
    assert!(
        !response.content.contains("ECONNREFUSED"),
        "underlying error must not surface"
    );
    assert_eq!(response.usage["error"], json!(true));
    assert_eq!(response.usage["error_code"], json!("LLM_NULL_RESPONSE"));

    let events = h.events(id).await;
    assert!(events.iter().any(|e| e == "max_retries_exceeded"));
}

// ---------------------------------------------------------------------------
// S5: iteration cap
// ---------------------------------------------------------------------------

#[tokio::test]
async fn s5_iteration_cap() {
    let h = harness(vec![
        tool_turn(vec![tool_call("c1", "get_current_time", &[])]),
        tool_turn(vec![tool_call("c2", "get_current_time", &[])]),
        tool_turn(vec![tool_call("c3", "get_current_time", &[])]),
    ]);
    let id = h.session("Time_Info_Agent", None).await;
    let tracer = h.tracer(id);

    let mut config = agent_config("Time_Info_Agent");
    config.retry = RetryConfig::new(1, 0.1).unwrap();

    let response = h
        .orchestrator
        .run_with_session(id, "loop please", Some(config), Some(&tracer))
        .await;

    assert_eq!(h.provider.call_count(), 3, "exactly three LLM calls");
    assert_eq!(response.usage["error_code"], json!("MAX_ITERATIONS_EXCEEDED"));
    assert!(!response.content.is_empty());

    // Tool batches ran on turns 1 and 2 only.
    let events = h.events(id).await;
    assert_eq!(events.iter().filter(|e| *e == "tool_execution").count(), 2);
}

// ---------------------------------------------------------------------------
// S6: summarization trigger
// ---------------------------------------------------------------------------

#[tokio::test]
async fn s6_summarization_trigger() {
    let h = harness(vec![text_turn("prior context established.")]);

    let history_config = HistoryConfig {
        enabled: true,
        message_threshold: 4,
        char_threshold: 1_000_000,
        word_threshold: 1_000_000,
        token_threshold: 1_000_000,
        ..HistoryConfig::default()
    };
    let id = h.session("Text_Analysis_Agent", Some(history_config)).await;

    let mut session = h.store.get(id).await.unwrap();
    for (role, content) in [
        (Role::User, "first question"),
        (Role::Assistant, "first answer"),
        (Role::User, "second question"),
        (Role::Assistant, "second answer"),
        (Role::User, "Continue."),
    ] {
        session.history.push(ChatMessage::new(role, content).unwrap());
    }
    h.store.save(&mut session).await.unwrap();

    let tracer = h.tracer(id);
    let summarizer = HistorySummarizer::new(h.factory.clone(), h.store.clone());
    summarizer.summarize_if_needed(id, Some(&tracer)).await;

    let session = h.store.get(id).await.unwrap();
    assert_eq!(session.history.len(), 2);
    assert_eq!(
        session.history[0].content,
        "[AUTOMATIC SUMMARY] prior context established."
    );
    assert_eq!(session.history[1].content, "Continue.");
    assert_eq!(session.history[1].role, Role::User);

    let events = h.events(id).await;
    assert!(events.iter().any(|e| e == "summarization_triggered"));
    assert!(events.iter().any(|e| e == "summarization_success"));
}

// ---------------------------------------------------------------------------
// Cross-cutting properties
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sensitive_values_never_persist_unmasked() {
    let h = harness(vec![]);
    let id = h.session("Text_Analysis_Agent", None).await;
    let tracer = h.tracer(id);

    tracer
        .log_step(
            "Test",
            "credentials",
            [
                ("request_api_key".to_string(), json!("sk-live-supersecret-1234")),
                ("session_token".to_string(), json!("tok-abcdef")),
                ("db_password".to_string(), json!("hunter2")),
            ]
            .into_iter()
            .collect(),
        )
        .await;

    let session = h.store.get(id).await.unwrap();
    let serialized = serde_json::to_string(&session).unwrap();
    for secret in ["sk-live-supersecret-1234", "tok-abcdef", "hunter2"] {
        assert!(!serialized.contains(secret), "leaked {secret}");
    }
    assert!(serialized.contains("***MASKED***"));
}

#[tokio::test]
async fn session_round_trips_through_serialization() {
    let h = harness(vec![]);
    let id = h.session("Text_Analysis_Agent", None).await;

    let mut session = h.store.get(id).await.unwrap();
    session
        .history
        .push(ChatMessage::user("première question — naïve?").unwrap());
    session
        .history
        .push(ChatMessage::assistant("Réponse avec café ☕").unwrap());
    h.store.save(&mut session).await.unwrap();

    let stored = h.store.get(id).await.unwrap();
    let reloaded: conductor_core::Session =
        serde_json::from_str(&serde_json::to_string(&stored).unwrap()).unwrap();

    assert_eq!(reloaded.history.len(), stored.history.len());
    for (a, b) in reloaded.history.iter().zip(&stored.history) {
        assert_eq!(a.role, b.role);
        assert_eq!(a.content, b.content);
    }
    assert_eq!(reloaded.trace.len(), stored.trace.len());
}

#[tokio::test]
async fn orchestrator_responses_are_always_nonempty() {
    // Success, LLM failure, and unknown-session paths all return content.
    let h = harness(vec![text_turn("fine")]);
    let id = h.session("Text_Analysis_Agent", None).await;
    let ok = h
        .orchestrator
        .run_with_session(id, "hi", Some(agent_config("Text_Analysis_Agent")), None)
        .await;
    assert!(!ok.content.is_empty());

    let mut config = agent_config("Text_Analysis_Agent");
    config.retry = RetryConfig::new(1, 0.1).unwrap();
    let exhausted = harness(vec![Err(LLMError::Timeout("t".into()))]);
    let id2 = exhausted.session("Text_Analysis_Agent", None).await;
    let failed = exhausted
        .orchestrator
        .run_with_session(id2, "hi", Some(config.clone()), None)
        .await;
    assert!(!failed.content.is_empty());

    let missing = exhausted
        .orchestrator
        .run_with_session(Uuid::new_v4(), "hi", Some(config), None)
        .await;
    assert!(!missing.content.is_empty());
}

#[tokio::test]
async fn per_batch_cap_drops_excess_tool_calls() {
    let calls: Vec<_> = (0..7)
        .map(|i| tool_call(&format!("c{i}"), "get_current_time", &[]))
        .collect();
    let h = harness(vec![tool_turn(calls), text_turn("done")]);
    let id = h.session("Time_Info_Agent", None).await;
    let tracer = h.tracer(id);

    let mut config = agent_config("Time_Info_Agent");
    config.retry = RetryConfig::new(1, 0.1).unwrap();

    let response = h
        .orchestrator
        .run_with_session(id, "many tools", Some(config), Some(&tracer))
        .await;
    assert_eq!(response.content, "done");

    let session = h.store.get(id).await.unwrap();
    let tool_messages = session
        .history
        .iter()
        .filter(|m| m.role == Role::Tool)
        .count();
    assert_eq!(tool_messages, 5, "batch capped at five");
}
