//! Conductor Engine
//!
//! The domain core of the orchestration service: the tool registry and
//! concurrent executor, the LLM-driven agent router, the history
//! summarizer, and the bounded ReAct orchestrator that composes them.

pub mod agents;
pub mod executor;
pub mod orchestrator;
pub mod router;
pub mod summarizer;
pub mod tools;

pub use agents::default_agents;
pub use executor::ToolExecutor;
pub use orchestrator::{ErrorCode, Orchestrator};
pub use router::{AgentRouter, RouterError};
pub use summarizer::{HistorySummarizer, SUMMARY_PREFIX};
pub use tools::{BuiltinTool, ParamSpec, ToolError, ToolRegistry};
