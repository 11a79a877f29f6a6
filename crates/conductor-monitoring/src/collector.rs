//! Metrics collection and prometheus exposition.
//!
//! The collector owns one prometheus [`Registry`] and every series the
//! platform emits. A process-wide singleton is available through
//! [`MetricsCollector::global`]; tests build isolated instances with
//! [`MetricsCollector::new`] so assertions never race across test cases.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use serde_json::{Map, Value};
use std::sync::{Arc, OnceLock};
use tracing::warn;

/// Errors surfaced by metric exposition.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("metric encoding failed: {0}")]
    Encoding(String),
}

static GLOBAL_COLLECTOR: OnceLock<Arc<MetricsCollector>> = OnceLock::new();

/// Centralized metrics collector.
///
/// Series covered: LLM calls (count, latency, tokens), tool executions
/// (count, latency), orchestrator errors, retry attempts, and session
/// lifecycle (count, duration, messages, active gauge).
pub struct MetricsCollector {
    registry: Registry,

    llm_call_count: IntCounterVec,
    llm_latency_seconds: HistogramVec,
    llm_tokens_consumed: IntCounterVec,

    orchestrator_errors_count: IntCounterVec,
    retry_attempts_count: IntCounterVec,

    tool_execution_count: IntCounterVec,
    tool_execution_latency_seconds: HistogramVec,

    session_count: IntCounterVec,
    session_duration_seconds: HistogramVec,
    session_messages_count: HistogramVec,
    active_sessions_current: IntGauge,
}

impl MetricsCollector {
    /// Build a collector with its own registry.
    pub fn new() -> Self {
        let registry = Registry::new();

        let llm_call_count = IntCounterVec::new(
            Opts::new("llm_call_count", "Total number of LLM API calls"),
            &["provider", "model", "status"],
        )
        .expect("static metric definition");
        let llm_latency_seconds = HistogramVec::new(
            HistogramOpts::new("llm_latency_seconds", "Latency of LLM API calls in seconds")
                .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
            &["provider", "model"],
        )
        .expect("static metric definition");
        let llm_tokens_consumed = IntCounterVec::new(
            Opts::new("llm_tokens_consumed", "Total tokens consumed by LLM calls"),
            &["provider", "model", "token_type"],
        )
        .expect("static metric definition");

        let orchestrator_errors_count = IntCounterVec::new(
            Opts::new(
                "orchestrator_errors_count",
                "Total number of orchestrator errors",
            ),
            &["error_type", "component"],
        )
        .expect("static metric definition");
        let retry_attempts_count = IntCounterVec::new(
            Opts::new("retry_attempts_count", "Total number of retry attempts"),
            &["component", "operation"],
        )
        .expect("static metric definition");

        let tool_execution_count = IntCounterVec::new(
            Opts::new("tool_execution_count", "Total number of tool executions"),
            &["tool_name", "status"],
        )
        .expect("static metric definition");
        let tool_execution_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "tool_execution_latency_seconds",
                "Tool execution latency in seconds",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]),
            &["tool_name"],
        )
        .expect("static metric definition");

        let session_count = IntCounterVec::new(
            Opts::new("session_count", "Total number of sessions created"),
            &["agent_name"],
        )
        .expect("static metric definition");
        let session_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "session_duration_seconds",
                "Session lifetime in seconds",
            )
            .buckets(vec![1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 1800.0, 3600.0]),
            &["agent_name"],
        )
        .expect("static metric definition");
        let session_messages_count = HistogramVec::new(
            HistogramOpts::new(
                "session_messages_count",
                "Messages accumulated per session",
            )
            .buckets(vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 200.0]),
            &["agent_name"],
        )
        .expect("static metric definition");
        let active_sessions_current = IntGauge::new(
            "active_sessions_current",
            "Number of sessions currently active",
        )
        .expect("static metric definition");

        let application_info = IntGaugeVec::new(
            Opts::new("application_info", "Build and component information"),
            &["version", "component"],
        )
        .expect("static metric definition");
        application_info
            .with_label_values(&[env!("CARGO_PKG_VERSION"), "conductor"])
            .set(1);

        for metric in [
            Box::new(llm_call_count.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(llm_latency_seconds.clone()),
            Box::new(llm_tokens_consumed.clone()),
            Box::new(orchestrator_errors_count.clone()),
            Box::new(retry_attempts_count.clone()),
            Box::new(tool_execution_count.clone()),
            Box::new(tool_execution_latency_seconds.clone()),
            Box::new(session_count.clone()),
            Box::new(session_duration_seconds.clone()),
            Box::new(session_messages_count.clone()),
            Box::new(active_sessions_current.clone()),
            Box::new(application_info.clone()),
        ] {
            registry
                .register(metric)
                .expect("fresh registry accepts every series once");
        }

        Self {
            registry,
            llm_call_count,
            llm_latency_seconds,
            llm_tokens_consumed,
            orchestrator_errors_count,
            retry_attempts_count,
            tool_execution_count,
            tool_execution_latency_seconds,
            session_count,
            session_duration_seconds,
            session_messages_count,
            active_sessions_current,
        }
    }

    /// Process-wide collector shared by every component.
    pub fn global() -> Arc<MetricsCollector> {
        GLOBAL_COLLECTOR
            .get_or_init(|| Arc::new(MetricsCollector::new()))
            .clone()
    }

    // ------------------------------------------------------------------
    // Direct recording
    // ------------------------------------------------------------------

    pub fn record_llm_call(&self, provider: &str, model: &str, duration_seconds: f64, status: &str) {
        self.llm_call_count
            .with_label_values(&[provider, model, status])
            .inc();
        self.llm_latency_seconds
            .with_label_values(&[provider, model])
            .observe(duration_seconds);
    }

    pub fn record_llm_tokens(&self, provider: &str, model: &str, token_type: &str, count: u64) {
        self.llm_tokens_consumed
            .with_label_values(&[provider, model, token_type])
            .inc_by(count);
    }

    pub fn record_orchestrator_error(&self, error_type: &str, component: &str) {
        self.orchestrator_errors_count
            .with_label_values(&[error_type, component])
            .inc();
    }

    pub fn record_retry_attempt(&self, component: &str, operation: &str) {
        self.retry_attempts_count
            .with_label_values(&[component, operation])
            .inc();
    }

    pub fn record_tool_execution(&self, tool_name: &str, duration_seconds: f64, status: &str) {
        self.tool_execution_count
            .with_label_values(&[tool_name, status])
            .inc();
        self.tool_execution_latency_seconds
            .with_label_values(&[tool_name])
            .observe(duration_seconds);
    }

    pub fn record_session_created(&self, agent_name: &str) {
        self.session_count.with_label_values(&[agent_name]).inc();
        self.active_sessions_current.inc();
    }

    pub fn record_session_closed(&self, agent_name: &str, duration_seconds: f64, messages: u64) {
        self.session_duration_seconds
            .with_label_values(&[agent_name])
            .observe(duration_seconds);
        self.session_messages_count
            .with_label_values(&[agent_name])
            .observe(messages as f64);
        self.active_sessions_current.dec();
    }

    pub fn active_sessions(&self) -> i64 {
        self.active_sessions_current.get()
    }

    // ------------------------------------------------------------------
    // Trace-driven derivation
    // ------------------------------------------------------------------

    /// Derive metric updates from a trace step.
    ///
    /// The mapping is deterministic: the same (component, event, details)
    /// always increments the same series. Latency estimates are used where
    /// precise timing is not carried in the trace: responses are assumed to
    /// stream at ~500 chars/second, clamped to the histogram range.
    pub fn observe_trace_event(&self, component: &str, event: &str, details: &Map<String, Value>) {
        let str_of = |key: &str| details.get(key).and_then(Value::as_str).unwrap_or("unknown");
        let num_of = |key: &str| details.get(key).and_then(Value::as_f64);

        match (component, event) {
            ("ResilientLLMService", "llm_call_success") => {
                let provider = str_of("provider");
                let model = str_of("model");
                let response_length = num_of("response_length").unwrap_or(0.0);
                let estimated = (response_length / 500.0).clamp(0.5, 60.0);
                self.record_llm_call(provider, model, estimated, "success");
                if let Some(prompt) = num_of("prompt_tokens") {
                    self.record_llm_tokens(provider, model, "prompt", prompt as u64);
                }
                if let Some(completion) = num_of("completion_tokens") {
                    self.record_llm_tokens(provider, model, "completion", completion as u64);
                }
            }
            ("ResilientLLMService", "retry_attempt_start") => {
                // The first attempt is not a retry; count attempts 2..N.
                if num_of("attempt").unwrap_or(1.0) > 1.0 {
                    self.record_retry_attempt(component, "orchestration_completion");
                }
            }
            ("ResilientLLMService", "retry_attempt_failed")
            | ("ResilientLLMService", "max_retries_exceeded") => {
                self.record_orchestrator_error(str_of("error_type"), component);
            }
            ("ToolExecutor", "tool_execution") => {
                let status = match details.get("success").and_then(Value::as_bool) {
                    Some(false) => "failure",
                    _ => "success",
                };
                let duration = num_of("execution_time_ms")
                    .map(|ms| ms / 1000.0)
                    .unwrap_or(0.1);
                self.record_tool_execution(str_of("tool_name"), duration, status);
            }
            ("AgentOrchestrator", "final_response") => {
                // Bounded duration estimate from trace depth: two seconds
                // per recorded step.
                let steps = num_of("total_trace_steps").unwrap_or(1.0).max(1.0);
                self.session_duration_seconds
                    .with_label_values(&[str_of("agent_name")])
                    .observe((steps * 2.0).min(3600.0));
            }
            _ if event.contains("error") => {
                let error_type = details
                    .get("error_type")
                    .and_then(Value::as_str)
                    .unwrap_or(event);
                self.record_orchestrator_error(error_type, component);
            }
            _ => {}
        }
    }

    /// Render every registered series in the prometheus text format.
    pub fn export(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| MetricsError::Encoding(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| {
            warn!("metrics exposition produced invalid UTF-8: {e}");
            MetricsError::Encoding(e.to_string())
        })
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
