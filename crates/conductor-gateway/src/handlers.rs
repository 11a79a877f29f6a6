//! Request handlers.

use crate::error::{GatewayError, GatewayResult};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use conductor_core::{ChatMessage, HistoryConfig, ProviderKind, SessionStatus};
use conductor_llm::{OrchestrationResponse, ProviderFactory};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

const VERSION: &str = env!("CARGO_PKG_VERSION");

// ---------------------------------------------------------------------------
// Service info
// ---------------------------------------------------------------------------

/// `GET /` — service banner and endpoint index.
pub async fn root() -> impl IntoResponse {
    Json(json!({
        "service": "conductor",
        "version": VERSION,
        "status": "running",
        "endpoints": {
            "health": "/health",
            "metrics": "/metrics",
            "providers": "/providers",
            "chat": "/chat",
            "orchestrate": "/orchestrate",
            "sessions": "/sessions",
        },
    }))
}

/// `GET /health` — liveness probe.
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": VERSION,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// `GET /metrics` — prometheus text exposition.
pub async fn metrics(State(state): State<AppState>) -> GatewayResult<impl IntoResponse> {
    let body = state
        .metrics
        .export()
        .map_err(|e| GatewayError::Internal(e.to_string()))?;
    Ok(([(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}

/// `GET /providers` — supported providers and the default.
pub async fn providers() -> impl IntoResponse {
    let providers = ProviderFactory::provider_names();
    Json(json!({
        "providers": providers,
        "default": ProviderKind::OpenAi.as_str(),
        "count": providers.len(),
    }))
}

// ---------------------------------------------------------------------------
// Chat (single turn, no session, no tools)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub provider: Option<ProviderKind>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f32 {
    0.7
}

/// `POST /chat`.
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> GatewayResult<impl IntoResponse> {
    let message = ChatMessage::user(&request.message)
        .map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;

    let kind = request.provider.unwrap_or(ProviderKind::OpenAi);
    let provider = state
        .factory
        .provider_for(kind)
        .map_err(|e| GatewayError::Internal(e.to_string()))?;

    let response = provider
        .chat_completion(
            &[message],
            request.model.as_deref().unwrap_or(""),
            request.max_tokens,
            request.temperature,
        )
        .await
        .map_err(|e| GatewayError::Internal(e.safe_message().to_string()))?;

    Ok(Json(response))
}

// ---------------------------------------------------------------------------
// One-shot orchestration
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct OrchestrateRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct OrchestrateResponse {
    pub agent_name: String,
    #[serde(flatten)]
    pub response: OrchestrationResponse,
}

/// `POST /orchestrate` — route the message to an agent and run the ReAct
/// loop, without a session.
pub async fn orchestrate(
    State(state): State<AppState>,
    Json(request): Json<OrchestrateRequest>,
) -> GatewayResult<impl IntoResponse> {
    let message = ChatMessage::user(&request.message)
        .map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;

    let agent = state
        .router
        .dispatch(&message, &state.agents, None)
        .await
        .map_err(|e| GatewayError::Internal(e.to_string()))?;

    let mut history = vec![message];
    let response = state
        .orchestrator
        .run(&agent.default_config, &mut history, None)
        .await;

    Ok(Json(OrchestrateResponse {
        agent_name: agent.agent_name,
        response,
    }))
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SessionCreateRequest {
    pub agent_name: String,
    #[serde(default)]
    pub history_config: Option<HistoryConfig>,
}

/// `POST /sessions`.
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<SessionCreateRequest>,
) -> GatewayResult<impl IntoResponse> {
    if let Some(config) = &request.history_config {
        config
            .validate()
            .map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;
    }
    if !state.agents.iter().any(|a| a.agent_name == request.agent_name) {
        return Err(GatewayError::InvalidRequest(format!(
            "unknown agent {:?}",
            request.agent_name
        )));
    }

    let session = state
        .store
        .create(&request.agent_name, request.history_config)
        .await
        .map_err(|e| GatewayError::Internal(e.to_string()))?;
    state.metrics.record_session_created(&session.agent_name);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "session_id": session.session_id,
            "agent_name": session.agent_name,
            "status": session.status,
            "created_at": session.created_at,
        })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_list_limit")]
    pub limit: usize,
}

fn default_list_limit() -> usize {
    100
}

/// `GET /sessions` — most recent first.
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> GatewayResult<impl IntoResponse> {
    let sessions = state
        .store
        .list(query.limit)
        .await
        .map_err(|e| GatewayError::Internal(e.to_string()))?;

    let summaries: Vec<_> = sessions
        .iter()
        .map(|session| {
            json!({
                "session_id": session.session_id,
                "agent_name": session.agent_name,
                "status": session.status,
                "created_at": session.created_at,
                "messages": session.message_count(),
            })
        })
        .collect();
    Ok(Json(json!({"sessions": summaries, "count": summaries.len()})))
}

/// `GET /sessions/{id}` — session metadata.
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> GatewayResult<impl IntoResponse> {
    let session = state
        .store
        .get(id)
        .await
        .map_err(|_| GatewayError::SessionNotFound(id.to_string()))?;

    let metrics = session.metrics();
    Ok(Json(json!({
        "session_id": session.session_id,
        "agent_name": session.agent_name,
        "status": session.status,
        "created_at": session.created_at,
        "last_message_at": session.last_message_at,
        "history_metrics": metrics,
        "trace_steps": session.trace.len(),
        "should_summarize": session.should_summarize(),
    })))
}

/// `DELETE /sessions/{id}`.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> GatewayResult<impl IntoResponse> {
    let session = state
        .store
        .get(id)
        .await
        .map_err(|_| GatewayError::SessionNotFound(id.to_string()))?;

    state
        .store
        .delete(id)
        .await
        .map_err(|e| GatewayError::Internal(e.to_string()))?;
    let duration = (Utc::now() - session.created_at).num_seconds().max(0) as f64;
    state.metrics.record_session_closed(
        &session.agent_name,
        duration,
        session.message_count() as u64,
    );

    Ok(Json(json!({"deleted": true, "session_id": id})))
}

// ---------------------------------------------------------------------------
// Session-aware orchestration
// ---------------------------------------------------------------------------

/// `POST /sessions/{id}/orchestrate` — route, summarize, run the ReAct
/// loop inside the session, persist, trace.
pub async fn orchestrate_in_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<OrchestrateRequest>,
) -> GatewayResult<impl IntoResponse> {
    let message = ChatMessage::user(&request.message)
        .map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;

    // Serialize whole requests per session: readers observing the outcome
    // of this request also observe every trace step it recorded.
    let lock = state.store.lock_for(id);
    let _guard = lock.lock().await;

    state
        .store
        .get(id)
        .await
        .map_err(|_| GatewayError::SessionNotFound(id.to_string()))?;
    let tracer = state.tracer_for(id);

    let agent = state
        .router
        .dispatch(&message, &state.agents, Some(&tracer))
        .await
        .map_err(|e| GatewayError::Internal(e.to_string()))?;

    let _ = state.store.update_status(id, SessionStatus::Processing).await;
    let response = state
        .orchestrator
        .run_with_session(
            id,
            &request.message,
            Some(agent.default_config.clone()),
            Some(&tracer),
        )
        .await;
    let _ = state.store.update_status(id, SessionStatus::Active).await;

    Ok(Json(OrchestrateResponse {
        agent_name: agent.agent_name,
        response,
    }))
}
