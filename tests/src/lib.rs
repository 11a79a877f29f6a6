//! Testing utilities for the conductor platform.
//!
//! The central piece is [`ScriptedProvider`], an [`LLMProvider`] that
//! plays back a queued script of responses and records every request it
//! receives, so end-to-end scenarios can assert both what the platform
//! returned and what the LLM was shown.

pub mod provider;

pub use provider::{ScriptedProvider, text_turn, text_turn_with_usage, tool_call, tool_turn};
