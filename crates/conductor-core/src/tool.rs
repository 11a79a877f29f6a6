//! Tool invocation types shared between the LLM layer and the executor.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The closed set of tools an agent may be granted.
///
/// Keeping this an enum means the allow-list in [`crate::AgentConfig`] and
/// the executor's dispatch table cannot drift apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    GetCurrentTime,
    ComplexApiCall,
    CalculateExpression,
    GetSystemInfo,
}

impl ToolName {
    pub const ALL: [ToolName; 4] = [
        ToolName::GetCurrentTime,
        ToolName::ComplexApiCall,
        ToolName::CalculateExpression,
        ToolName::GetSystemInfo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::GetCurrentTime => "get_current_time",
            ToolName::ComplexApiCall => "complex_api_call",
            ToolName::CalculateExpression => "calculate_expression",
            ToolName::GetSystemInfo => "get_system_info",
        }
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ToolName {
    type Err = UnknownToolName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| UnknownToolName(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tool name: {0:?}")]
pub struct UnknownToolName(pub String);

/// A tool invocation emitted by an LLM.
///
/// The name stays a raw string so unknown tools are representable; the
/// executor rejects them with a structured error. `id` round-trips
/// unmodified into the matching [`ToolResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub tool_name: String,
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: Map<String, Value>,
    ) -> Self {
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            arguments,
        }
    }

    /// Compact `name(k1=v1, k2=v2)` rendering for conversation feedback.
    pub fn describe(&self) -> String {
        let args = self
            .arguments
            .iter()
            .map(|(key, value)| match value {
                Value::String(s) => format!("{key}={s}"),
                other => format!("{key}={other}"),
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({args})", self.tool_name)
    }
}

/// Outcome of one tool invocation. Exactly one of `result`/`error` is
/// populated, selected by `success`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(tool_call_id: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            success: true,
            result: Some(result.into()),
            error: None,
        }
    }

    pub fn err(tool_call_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Provider-agnostic tool definition: name, description, and a JSON Schema
/// object describing the parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}
