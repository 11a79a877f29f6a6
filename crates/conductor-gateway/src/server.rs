//! Application assembly and serving.

use crate::handlers;
use crate::middleware::security_headers;
use crate::state::AppState;
use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use conductor_core::{Environment, InMemorySessionStore, SessionStore, env::cors_allowed_origins};
use conductor_engine::{
    AgentRouter, HistorySummarizer, Orchestrator, ToolRegistry, default_agents,
};
use conductor_llm::ProviderFactory;
use conductor_core::ProviderKind;
use conductor_monitoring::MetricsCollector;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

/// Build the application state with the default wiring.
pub fn default_state(environment: Environment) -> AppState {
    let factory = Arc::new(ProviderFactory::new());
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let registry = Arc::new(ToolRegistry::with_builtins());
    let metrics = MetricsCollector::global();

    let summarizer = HistorySummarizer::new(factory.clone(), store.clone());
    let orchestrator =
        Orchestrator::new(factory.clone(), registry, store.clone()).with_summarizer(summarizer);

    let router_llm = factory
        .provider_for(ProviderKind::OpenAi)
        .expect("default router provider is constructible");

    AppState {
        factory,
        store,
        router: Arc::new(AgentRouter::new(router_llm)),
        orchestrator: Arc::new(orchestrator),
        agents: Arc::new(default_agents()),
        metrics,
        environment,
    }
}

/// Build the axum [`Router`]: routes, CORS, and security headers.
pub fn build_app(state: AppState) -> Router {
    let cors = cors_layer(state.environment);

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/providers", get(handlers::providers))
        .route("/chat", post(handlers::chat))
        .route("/orchestrate", post(handlers::orchestrate))
        .route("/sessions", post(handlers::create_session).get(handlers::list_sessions))
        .route(
            "/sessions/{id}",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route("/sessions/{id}/orchestrate", post(handlers::orchestrate_in_session))
        .layer(axum::middleware::from_fn(security_headers))
        .layer(cors)
        .with_state(state)
}

/// CORS policy: a production deployment takes its origin allow-list from
/// `CORS_ALLOWED_ORIGINS`; anywhere else any origin is acceptable.
fn cors_layer(environment: Environment) -> CorsLayer {
    if environment.is_production() {
        let origins: Vec<HeaderValue> = cors_allowed_origins()
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        if origins.is_empty() {
            warn!("production environment with no CORS_ALLOWED_ORIGINS set");
        }
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Bind and serve until the process exits.
pub async fn serve(state: AppState, port: u16) -> std::io::Result<()> {
    let app = build_app(state);
    let addr = format!("0.0.0.0:{port}");
    info!(addr = %addr, "conductor gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await
}
