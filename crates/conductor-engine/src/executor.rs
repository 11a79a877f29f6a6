//! Concurrent tool execution with per-call fault isolation.

use crate::tools::ToolRegistry;
use conductor_core::{ToolCall, ToolResult};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

/// Executes batches of tool calls against the registry.
///
/// Every failure mode (unknown tool, missing argument, tool error, task
/// panic) becomes a failing [`ToolResult`]; the executor itself never
/// errors and sibling calls always run to completion.
#[derive(Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Execute one tool call.
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        let Some(tool) = self.registry.get(&call.tool_name) else {
            return ToolResult::err(
                &call.id,
                format!(
                    "Tool {:?} not found. Registered tools: {:?}",
                    call.tool_name,
                    self.registry.registered_names()
                ),
            );
        };

        // Bind arguments against the shared descriptor before invoking:
        // missing required parameters fail here, absent optionals are
        // simply not seen by the tool.
        for param in tool.params() {
            if param.required && !call.arguments.contains_key(param.name) {
                return ToolResult::err(
                    &call.id,
                    format!(
                        "Required argument {:?} is missing for tool {:?}",
                        param.name, call.tool_name
                    ),
                );
            }
        }

        let started = Instant::now();
        match tool.invoke(&call.arguments).await {
            Ok(output) => {
                debug!(
                    tool = %call.tool_name,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "tool execution succeeded"
                );
                ToolResult::ok(&call.id, output)
            }
            Err(e) => {
                error!(tool = %call.tool_name, "tool execution failed: {e}");
                ToolResult::err(&call.id, format!("Error executing {:?}: {e}", call.tool_name))
            }
        }
    }

    /// Execute a whole batch concurrently, one spawned task per call so a
    /// panicking tool cannot take the orchestrator or its siblings down.
    /// Results come back in input order with ids preserved.
    pub async fn execute_batch(&self, calls: &[ToolCall]) -> Vec<ToolResult> {
        if calls.is_empty() {
            return Vec::new();
        }

        let handles: Vec<_> = calls
            .iter()
            .cloned()
            .map(|call| {
                let executor = self.clone();
                tokio::spawn(async move { executor.execute(&call).await })
            })
            .collect();

        join_all(handles)
            .await
            .into_iter()
            .zip(calls)
            .map(|(joined, call)| match joined {
                Ok(result) => result,
                Err(e) => {
                    error!(tool = %call.tool_name, "tool task aborted: {e}");
                    ToolResult::err(
                        &call.id,
                        format!("Tool {:?} aborted before completing", call.tool_name),
                    )
                }
            })
            .collect()
    }
}

impl Default for ToolExecutor {
    fn default() -> Self {
        Self::new(Arc::new(ToolRegistry::with_builtins()))
    }
}
