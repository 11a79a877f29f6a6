//! Default agent catalog.
//!
//! The agents the service exposes out of the box. Each is a plain
//! [`AgentDefinition`]; deployments can replace or extend the catalog
//! before wiring the router.

use conductor_core::{AgentConfig, AgentDefinition, ToolName};

fn tool_agent(
    name: &str,
    description: &str,
    tools: &[ToolName],
) -> AgentDefinition {
    let mut config = AgentConfig::default();
    config.available_tools = tools.to_vec();
    AgentDefinition::new(name, description, config).expect("static agent definitions are valid")
}

/// The built-in agents, router order.
pub fn default_agents() -> Vec<AgentDefinition> {
    vec![
        AgentDefinition::new(
            "Text_Analysis_Agent",
            "Summarizes, rewrites, and analyzes prose. Works from the conversation \
             alone and calls no tools.",
            AgentConfig::default().without_tools(),
        )
        .expect("static agent definitions are valid"),
        tool_agent(
            "Time_Info_Agent",
            "Answers questions about the current date and time in any timezone.",
            &[ToolName::GetCurrentTime],
        ),
        tool_agent(
            "City_Info_Agent",
            "Looks up weather, population, and timezone facts about cities.",
            &[ToolName::ComplexApiCall],
        ),
        tool_agent(
            "Calculation_Agent",
            "Evaluates arithmetic expressions and explains the results.",
            &[ToolName::CalculateExpression],
        ),
        tool_agent(
            "System_Info_Agent",
            "Reports information about the host system running the service.",
            &[ToolName::GetSystemInfo],
        ),
    ]
}
