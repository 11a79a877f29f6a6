//! Conductor LLM
//!
//! Uniform multi-provider LLM access for the orchestration platform: a
//! polymorphic provider trait, adapters for the OpenAI-shaped,
//! Anthropic-shaped, and Gemini-shaped API families, per-family tool
//! schema emission, a caching provider factory, and the resilient
//! retry/backoff wrapper every orchestration call goes through.

pub mod anthropic;
pub mod factory;
pub mod gemini;
pub mod openai;
pub mod provider;
pub mod resilient;
pub mod schema;
pub mod types;

pub use factory::ProviderFactory;
pub use provider::LLMProvider;
pub use resilient::{AgentExecutionError, ResilientLlmService};
pub use types::{ChatResponse, LLMError, LLMResult, OrchestrationRequest, OrchestrationResponse};
