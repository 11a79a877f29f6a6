//! Tool schema emission per provider family, and argument decoding.
//!
//! All three families carry the same semantic triple
//! `{name, description, parameters}`; only the envelope differs.

use conductor_core::ToolDefinition;
use serde_json::{Map, Value, json};
use tracing::warn;

/// OpenAI family: array of `{type: "function", function: {...}}`.
///
/// Used verbatim by OpenAI, DeepSeek, Kimi, Mistral, and Grok under the
/// request field `tools`; Qwen sends the same array under `functions`.
pub fn openai_tools(tools: &[ToolDefinition]) -> Value {
    Value::Array(
        tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    }
                })
            })
            .collect(),
    )
}

/// Anthropic family: array of `{name, description, input_schema}`.
pub fn anthropic_tools(tools: &[ToolDefinition]) -> Value {
    Value::Array(
        tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "input_schema": tool.parameters,
                })
            })
            .collect(),
    )
}

/// Gemini family: single element wrapping every declaration.
pub fn gemini_tools(tools: &[ToolDefinition]) -> Value {
    json!([{
        "function_declarations": tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.parameters,
                })
            })
            .collect::<Vec<_>>(),
    }])
}

/// Decode a provider-supplied argument string.
///
/// Arguments are strictly JSON-decoded; anything else yields an empty map
/// with a warning. Provider text is never evaluated.
pub fn decode_arguments(raw: &str) -> Map<String, Value> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            warn!("tool arguments were valid JSON but not an object: {other}");
            Map::new()
        }
        Err(e) => {
            warn!("tool arguments were not valid JSON ({e}); dropping");
            Map::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tool() -> ToolDefinition {
        ToolDefinition::new(
            "get_current_time",
            "Returns the current time",
            json!({
                "type": "object",
                "properties": {"timezone": {"type": "string"}},
                "required": []
            }),
        )
    }

    #[test]
    fn openai_shape_wraps_in_function_envelope() {
        let formatted = openai_tools(&[sample_tool()]);
        assert_eq!(formatted[0]["type"], "function");
        assert_eq!(formatted[0]["function"]["name"], "get_current_time");
        assert!(formatted[0]["function"]["parameters"].is_object());
    }

    #[test]
    fn anthropic_shape_uses_input_schema() {
        let formatted = anthropic_tools(&[sample_tool()]);
        assert_eq!(formatted[0]["name"], "get_current_time");
        assert!(formatted[0]["input_schema"].is_object());
        assert!(formatted[0].get("parameters").is_none());
    }

    #[test]
    fn gemini_shape_is_one_declarations_element() {
        let formatted = gemini_tools(&[sample_tool(), sample_tool()]);
        assert_eq!(formatted.as_array().unwrap().len(), 1);
        assert_eq!(
            formatted[0]["function_declarations"].as_array().unwrap().len(),
            2
        );
    }

    #[test]
    fn arguments_are_json_decoded_never_evaluated() {
        let decoded = decode_arguments(r#"{"timezone": "UTC"}"#);
        assert_eq!(decoded["timezone"], json!("UTC"));

        assert!(decode_arguments("__import__('os')").is_empty());
        assert!(decode_arguments(r#"["not", "an", "object"]"#).is_empty());
        assert!(decode_arguments("").is_empty());
    }
}
