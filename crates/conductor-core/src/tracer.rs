//! Trace recording into the session.
//!
//! The tracer follows every step of the execution cycle
//! (Router → Orchestrator → LLM → Tools → Response) and appends each one to
//! the owning session's trace. Tracing is auxiliary: every failure is
//! swallowed after a local log line, never propagated into the main flow.

use crate::session::{HistoryMetrics, TraceStep};
use crate::store::SessionStore;
use chrono::Utc;
use conductor_monitoring::MetricsCollector;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Replacement for sensitive detail values.
pub const MASKED_VALUE: &str = "***MASKED***";

const SENSITIVE_KEYS: [&str; 5] = ["api_key", "password", "token", "secret", "credential"];
const MAX_DETAIL_STRING: usize = 100;

/// Session-bound trace writer.
pub struct Tracer {
    session_id: Uuid,
    store: Arc<dyn SessionStore>,
    metrics: Arc<MetricsCollector>,
}

impl Tracer {
    pub fn new(session_id: Uuid, store: Arc<dyn SessionStore>) -> Self {
        Self::with_metrics(session_id, store, MetricsCollector::global())
    }

    /// Bind to an explicit collector; tests use an isolated instance.
    pub fn with_metrics(
        session_id: Uuid,
        store: Arc<dyn SessionStore>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            session_id,
            store,
            metrics,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Append one step to the session trace and persist.
    ///
    /// Details are sanitized first: values under sensitive keys are masked,
    /// long string values truncated. On success the step also drives the
    /// metrics collector.
    pub async fn log_step(&self, component: &str, event: &str, details: Map<String, Value>) {
        let details = sanitize_details(details);

        let mut session = match self.store.get(self.session_id).await {
            Ok(session) => session,
            Err(e) => {
                warn!(
                    session_id = %self.session_id,
                    "trace step {component}.{event} dropped: {e}"
                );
                return;
            }
        };

        session.trace.push(TraceStep {
            timestamp: Utc::now(),
            component: component.to_string(),
            event: event.to_string(),
            details: details.clone(),
        });

        if let Err(e) = self.store.save(&mut session).await {
            warn!(
                session_id = %self.session_id,
                "trace step {component}.{event} not persisted: {e}"
            );
            return;
        }

        self.metrics.observe_trace_event(component, event, &details);
        debug!(session_id = %self.session_id, "trace step recorded: {component}.{event}");
    }

    // ------------------------------------------------------------------
    // Named-event helpers
    // ------------------------------------------------------------------

    pub async fn log_router_start(&self, request_summary: &str) {
        self.log_step(
            "AgentRouter",
            "routing_start",
            details(&[("request_summary", json!(request_summary))]),
        )
        .await;
    }

    pub async fn log_router_decision(&self, agent_name: &str, confidence: Option<f64>) {
        let mut d = details(&[("selected_agent", json!(agent_name))]);
        if let Some(confidence) = confidence {
            d.insert("confidence".into(), json!(confidence));
        }
        self.log_step("AgentRouter", "routing_decision", d).await;
    }

    pub async fn log_orchestration_start(&self, agent_name: &str, iteration: u32) {
        self.log_step(
            "AgentOrchestrator",
            "orchestration_start",
            details(&[("agent_name", json!(agent_name)), ("iteration", json!(iteration))]),
        )
        .await;
    }

    pub async fn log_llm_call(&self, provider: &str, model: &str, prompt_length: usize) {
        self.log_step(
            "LLM",
            "llm_call",
            details(&[
                ("provider", json!(provider)),
                ("model", json!(model)),
                ("prompt_length", json!(prompt_length)),
            ]),
        )
        .await;
    }

    pub async fn log_llm_response(&self, provider: &str, response_length: usize, tools_called: usize) {
        self.log_step(
            "LLM",
            "llm_response",
            details(&[
                ("provider", json!(provider)),
                ("response_length", json!(response_length)),
                ("tools_called", json!(tools_called)),
            ]),
        )
        .await;
    }

    pub async fn log_tool_execution(
        &self,
        tool_name: &str,
        success: bool,
        execution_time_ms: Option<f64>,
    ) {
        let mut d = details(&[("tool_name", json!(tool_name)), ("success", json!(success))]);
        if let Some(ms) = execution_time_ms {
            d.insert("execution_time_ms".into(), json!(ms));
        }
        self.log_step("ToolExecutor", "tool_execution", d).await;
    }

    pub async fn log_summarization_trigger(&self, reason: &str, metrics: HistoryMetrics) {
        self.log_step(
            "HistorySummarizer",
            "summarization_triggered",
            details(&[
                ("reason", json!(reason)),
                ("metrics", serde_json::to_value(metrics).unwrap_or(Value::Null)),
            ]),
        )
        .await;
    }

    pub async fn log_summarization_complete(&self, summary_length: usize, original_messages: usize) {
        self.log_step(
            "HistorySummarizer",
            "summarization_success",
            details(&[
                ("summary_length", json!(summary_length)),
                ("original_messages", json!(original_messages)),
            ]),
        )
        .await;
    }

    pub async fn log_error(&self, component: &str, error_type: &str, error_message: &str) {
        self.log_step(
            component,
            "error",
            details(&[
                ("error_type", json!(error_type)),
                ("error_message", json!(error_message)),
            ]),
        )
        .await;
    }

    pub async fn log_final_response(&self, response_length: usize, total_steps: usize) {
        self.log_step(
            "AgentOrchestrator",
            "final_response",
            details(&[
                ("response_length", json!(response_length)),
                ("total_trace_steps", json!(total_steps)),
            ]),
        )
        .await;
    }
}

fn details(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

/// Mask sensitive values and truncate oversized strings.
fn sanitize_details(details: Map<String, Value>) -> Map<String, Value> {
    details
        .into_iter()
        .map(|(key, value)| {
            let lowered = key.to_lowercase();
            if SENSITIVE_KEYS.iter().any(|s| lowered.contains(s)) {
                return (key, Value::String(MASKED_VALUE.to_string()));
            }
            if let Value::String(s) = &value
                && s.chars().count() > MAX_DETAIL_STRING
            {
                let truncated: String = s.chars().take(MAX_DETAIL_STRING).collect();
                return (key, Value::String(format!("{truncated}...")));
            }
            (key, value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemorySessionStore;

    async fn tracer_with_session() -> (Arc<InMemorySessionStore>, Tracer, Uuid) {
        let store = Arc::new(InMemorySessionStore::new());
        let session = store.create("Test_Agent", None).await.unwrap();
        let tracer = Tracer::with_metrics(
            session.session_id,
            store.clone(),
            Arc::new(MetricsCollector::new()),
        );
        (store, tracer, session.session_id)
    }

    #[tokio::test]
    async fn steps_append_in_order() {
        let (store, tracer, id) = tracer_with_session().await;

        tracer.log_router_start("what time is it").await;
        tracer.log_router_decision("Time_Info_Agent", Some(1.0)).await;
        tracer.log_final_response(42, 2).await;

        let session = store.get(id).await.unwrap();
        let events: Vec<&str> = session.trace.iter().map(|s| s.event.as_str()).collect();
        assert_eq!(events, ["routing_start", "routing_decision", "final_response"]);
    }

    #[tokio::test]
    async fn sensitive_keys_are_masked() {
        let (store, tracer, id) = tracer_with_session().await;

        tracer
            .log_step(
                "Test",
                "credentials_seen",
                details(&[
                    ("openai_api_key", json!("sk-verysecret")),
                    ("user_password", json!("hunter2")),
                    ("auth_token", json!("t0k3n")),
                    ("client_secret", json!("sssh")),
                    ("db_credential", json!("creds")),
                    ("plain", json!("visible")),
                ]),
            )
            .await;

        let session = store.get(id).await.unwrap();
        let step = &session.trace[0];
        for key in [
            "openai_api_key",
            "user_password",
            "auth_token",
            "client_secret",
            "db_credential",
        ] {
            assert_eq!(step.details[key], json!(MASKED_VALUE), "key {key}");
        }
        assert_eq!(step.details["plain"], json!("visible"));
    }

    #[tokio::test]
    async fn long_string_details_are_truncated() {
        let (store, tracer, id) = tracer_with_session().await;

        tracer
            .log_step("Test", "long", details(&[("blob", json!("y".repeat(250)))]))
            .await;

        let session = store.get(id).await.unwrap();
        let value = session.trace[0].details["blob"].as_str().unwrap();
        assert_eq!(value.chars().count(), MAX_DETAIL_STRING + 3);
        assert!(value.ends_with("..."));
    }

    #[tokio::test]
    async fn missing_session_never_panics() {
        let store: Arc<InMemorySessionStore> = Arc::new(InMemorySessionStore::new());
        let tracer = Tracer::with_metrics(
            Uuid::new_v4(),
            store,
            Arc::new(MetricsCollector::new()),
        );
        // Swallowed; nothing to assert beyond not panicking.
        tracer.log_error("Test", "NO_SESSION", "dropped").await;
    }
}
