//! Tool registry and builtin tools.
//!
//! Registration and validation share one parameter descriptor per tool:
//! the JSON-Schema definition shown to the LLM and the argument binding
//! performed by the executor are generated from the same [`ParamSpec`]
//! slice, so the allow-list and the dispatcher cannot drift.

pub mod builtin;

use async_trait::async_trait;
use conductor_core::{ToolDefinition, ToolName};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;

/// One declared tool parameter.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// JSON Schema type, e.g. `"string"`.
    pub param_type: &'static str,
    pub required: bool,
}

/// Failures inside a tool invocation. These never escape the executor;
/// they become failing [`conductor_core::ToolResult`]s.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    #[error("required argument {0:?} is missing")]
    MissingArgument(&'static str),
    #[error("invalid argument {name:?}: {reason}")]
    InvalidArgument { name: &'static str, reason: String },
    #[error("{0}")]
    Failed(String),
}

/// A callable tool with its shared parameter descriptor.
#[async_trait]
pub trait BuiltinTool: Send + Sync {
    fn name(&self) -> ToolName;
    fn description(&self) -> &'static str;
    fn params(&self) -> &'static [ParamSpec];

    /// Run with JSON-decoded arguments. Long or blocking work must be
    /// dispatched off the async thread (see the system-info tool).
    async fn invoke(&self, arguments: &Map<String, Value>) -> Result<String, ToolError>;
}

/// Name-to-callable mapping over the tool allow-list.
pub struct ToolRegistry {
    tools: HashMap<ToolName, Arc<dyn BuiltinTool>>,
}

impl ToolRegistry {
    /// Registry with every builtin tool installed.
    pub fn with_builtins() -> Self {
        let mut tools: HashMap<ToolName, Arc<dyn BuiltinTool>> = HashMap::new();
        for tool in builtin::all() {
            tools.insert(tool.name(), tool);
        }
        Self { tools }
    }

    /// Look up by raw (LLM-supplied) name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn BuiltinTool>> {
        let parsed: ToolName = name.parse().ok()?;
        self.tools.get(&parsed).cloned()
    }

    /// Registered tool names, sorted, for unknown-tool error messages.
    pub fn registered_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> =
            self.tools.keys().map(ToolName::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Build the provider-agnostic definition from the shared descriptor.
    pub fn definition(tool: &dyn BuiltinTool) -> ToolDefinition {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in tool.params() {
            properties.insert(
                param.name.to_string(),
                json!({"type": param.param_type, "description": param.description}),
            );
            if param.required {
                required.push(Value::String(param.name.to_string()));
            }
        }
        ToolDefinition::new(
            tool.name().as_str(),
            tool.description(),
            json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        )
    }

    /// Definitions for the subset of tools an agent is allowed to use.
    pub fn definitions_for(&self, allowed: &[ToolName]) -> Vec<ToolDefinition> {
        allowed
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| Self::definition(tool.as_ref()))
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
