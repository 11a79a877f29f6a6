//! Shared application state for the gateway.

use conductor_core::{AgentDefinition, Environment, SessionStore, Tracer};
use conductor_engine::{AgentRouter, Orchestrator};
use conductor_llm::ProviderFactory;
use conductor_monitoring::MetricsCollector;
use std::sync::Arc;
use uuid::Uuid;

/// State shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub factory: Arc<ProviderFactory>,
    pub store: Arc<dyn SessionStore>,
    pub router: Arc<AgentRouter>,
    pub orchestrator: Arc<Orchestrator>,
    pub agents: Arc<Vec<AgentDefinition>>,
    pub metrics: Arc<MetricsCollector>,
    pub environment: Environment,
}

impl AppState {
    /// Tracer bound to one session, sharing this state's collector.
    pub fn tracer_for(&self, session_id: Uuid) -> Tracer {
        Tracer::with_metrics(session_id, self.store.clone(), self.metrics.clone())
    }
}
