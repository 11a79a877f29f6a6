//! Conductor Core
//!
//! Data model and shared infrastructure for the orchestration platform:
//! validated chat messages, tool calls and results, agent and retry
//! configuration, the session aggregate with its execution trace, the
//! session store, and the tracer that records every state transition.

pub mod config;
pub mod env;
pub mod message;
pub mod sanitize;
pub mod secrets;
pub mod session;
pub mod store;
pub mod tool;
pub mod tracer;

pub use config::{
    AgentConfig, AgentDefinition, ConfigError, HistoryConfig, ProviderKind, RetryConfig,
};
pub use env::Environment;
pub use message::{ChatMessage, Role};
pub use sanitize::ContentError;
pub use session::{HistoryMetrics, Session, SessionStatus, TraceStep};
pub use store::{InMemorySessionStore, SessionStore, StoreError};
pub use tool::{ToolCall, ToolDefinition, ToolName, ToolResult};
pub use tracer::Tracer;
