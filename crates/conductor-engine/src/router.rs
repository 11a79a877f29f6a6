//! Agent routing: one LLM function-call decision per request.
//!
//! The router presents the available agents to a fast LLM as an enum on a
//! synthetic `select_agent` tool and extracts the decision with a layered
//! fallback. It is never a hard failure mode: any internal error degrades
//! to selecting the first agent.

use conductor_core::{AgentConfig, AgentDefinition, ChatMessage, ToolDefinition, Tracer};
use conductor_llm::provider::LLMProvider;
use conductor_llm::types::{OrchestrationRequest, OrchestrationResponse};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{info, warn};

const SELECT_AGENT_TOOL: &str = "select_agent";

const ROUTER_SYSTEM_PROMPT: &str = "You are a routing engine that selects specialized agents.

Your mission: analyze the user request and choose the most appropriate agent.

Instructions:
1. Read the user request carefully
2. Review the capabilities of each available agent
3. Select the agent whose skills best match the request
4. You MUST use the select_agent function to register your choice
5. Justify your reasoning clearly and concisely

If the request is ambiguous, pick the most general-purpose agent.";

/// Routing failed before any fallback could apply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    #[error("no agents available for routing")]
    NoAgents,
}

pub struct AgentRouter {
    llm: Arc<dyn LLMProvider>,
    config: AgentConfig,
}

impl AgentRouter {
    /// Router over the given decision LLM. The decision call uses a low
    /// temperature and a small token budget; a fast model is expected.
    pub fn new(llm: Arc<dyn LLMProvider>) -> Self {
        let config = AgentConfig::default()
            .with_model("gpt-3.5-turbo".to_string())
            .with_temperature(0.1)
            .with_max_tokens(200);
        Self { llm, config }
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Select the agent for `user_message` among `agents`.
    ///
    /// Only an empty agent list is an error; everything else resolves to
    /// some agent, falling back to `agents[0]` with a traced
    /// `routing_error` when the LLM decision cannot be made.
    pub async fn dispatch(
        &self,
        user_message: &ChatMessage,
        agents: &[AgentDefinition],
        tracer: Option<&Tracer>,
    ) -> Result<AgentDefinition, RouterError> {
        if agents.is_empty() {
            return Err(RouterError::NoAgents);
        }

        if let Some(tracer) = tracer {
            tracer.log_router_start(&summarize(&user_message.content)).await;
        }

        if agents.len() == 1 {
            let selected = &agents[0];
            info!(agent = %selected.agent_name, "single agent available, selected directly");
            if let Some(tracer) = tracer {
                tracer.log_router_decision(&selected.agent_name, Some(1.0)).await;
            }
            return Ok(selected.clone());
        }

        match self.route_via_llm(user_message, agents).await {
            Ok(selected) => {
                info!(agent = %selected.agent_name, "agent selected by router LLM");
                if let Some(tracer) = tracer {
                    tracer.log_router_decision(&selected.agent_name, None).await;
                }
                Ok(selected)
            }
            Err(e) => {
                warn!("routing failed ({e}); falling back to the first agent");
                let fallback = agents[0].clone();
                if let Some(tracer) = tracer {
                    tracer
                        .log_error("AgentRouter", "routing_error", &e.to_string())
                        .await;
                    tracer.log_router_decision(&fallback.agent_name, Some(0.0)).await;
                }
                Ok(fallback)
            }
        }
    }

    async fn route_via_llm(
        &self,
        user_message: &ChatMessage,
        agents: &[AgentDefinition],
    ) -> Result<AgentDefinition, RouteFailure> {
        let messages = vec![
            ChatMessage::system(ROUTER_SYSTEM_PROMPT)?,
            ChatMessage::user(format!("Request to analyze: {}", user_message.content))?,
        ];

        let mut config = self.config.clone();
        config.system_prompt = ROUTER_SYSTEM_PROMPT.to_string();
        config.tools_enabled = true;

        let request =
            OrchestrationRequest::new(config, messages, vec![Self::selection_tool(agents)]);
        let response = self.llm.orchestration_completion(&request).await?;

        Ok(Self::extract_selected(&response, agents))
    }

    /// Synthetic tool whose `agent_name` parameter enumerates the agents.
    fn selection_tool(agents: &[AgentDefinition]) -> ToolDefinition {
        let agent_enum: Vec<Value> = agents
            .iter()
            .map(|agent| Value::String(agent.agent_name.clone()))
            .collect();
        let agent_descriptions = agents
            .iter()
            .map(|agent| format!("- {}: {}", agent.agent_name, agent.description))
            .collect::<Vec<_>>()
            .join("\n");

        ToolDefinition::new(
            SELECT_AGENT_TOOL,
            format!(
                "Selects the most appropriate agent for the user request. \
                 Available agents:\n{agent_descriptions}"
            ),
            json!({
                "type": "object",
                "properties": {
                    "agent_name": {
                        "type": "string",
                        "enum": agent_enum,
                        "description": "Name of the agent selected to handle the request"
                    },
                    "reasoning": {
                        "type": "string",
                        "description": "Explanation of the choice, for debugging and transparency"
                    }
                },
                "required": ["agent_name", "reasoning"]
            }),
        )
    }

    /// Extraction precedence: select_agent tool call with a known name,
    /// then a case-insensitive name scan of the text, then `agents[0]`.
    fn extract_selected(
        response: &OrchestrationResponse,
        agents: &[AgentDefinition],
    ) -> AgentDefinition {
        for call in &response.tool_calls {
            if call.tool_name != SELECT_AGENT_TOOL {
                continue;
            }
            let Some(selected_name) = call.arguments.get("agent_name").and_then(Value::as_str)
            else {
                continue;
            };
            if let Some(agent) = agents.iter().find(|a| a.agent_name == selected_name) {
                if let Some(reasoning) = call.arguments.get("reasoning").and_then(Value::as_str) {
                    info!(agent = %agent.agent_name, "router reasoning: {reasoning}");
                }
                return agent.clone();
            }
            warn!("router selected unknown agent {selected_name:?}");
        }

        let content_lower = response.content.to_lowercase();
        if !content_lower.is_empty()
            && let Some(agent) = agents
                .iter()
                .find(|a| content_lower.contains(&a.agent_name.to_lowercase()))
        {
            info!(agent = %agent.agent_name, "agent detected in response text");
            return agent.clone();
        }

        warn!("no clear selection; using the first available agent");
        agents[0].clone()
    }
}

fn summarize(content: &str) -> String {
    let truncated: String = content.chars().take(100).collect();
    if truncated.chars().count() < content.chars().count() {
        format!("{truncated}...")
    } else {
        truncated
    }
}

/// Internal routing failure, folded into the fallback path.
#[derive(Debug, thiserror::Error)]
enum RouteFailure {
    #[error("router prompt rejected: {0}")]
    Content(#[from] conductor_core::ContentError),
    #[error(transparent)]
    Llm(#[from] conductor_llm::types::LLMError),
}
