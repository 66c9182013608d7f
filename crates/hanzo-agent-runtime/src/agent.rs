//! Agent implementation

use crate::context::RunContext;
use crate::errors::{AgentError, Result};
use crate::guardrail::Guardrail;
use crate::handoff::Handoff;
use crate::model::ToolSpec;
use crate::output::OutputSchema;
use crate::tool::{AgentTool, Tool};
use crate::types::ModelSettings;
use std::collections::HashSet;
use std::sync::Arc;

type InstructionsFn = Arc<dyn Fn(&RunContext, &Agent) -> String + Send + Sync>;

/// Instructions for the agent (system prompt)
#[derive(Clone)]
pub enum Instructions {
    /// Static instructions
    Static(String),

    /// Generated from the run context each time the agent is called
    Dynamic(InstructionsFn),
}

impl Instructions {
    /// Resolve the instructions for the current turn
    pub fn resolve(&self, ctx: &RunContext, agent: &Agent) -> String {
        match self {
            Instructions::Static(s) => s.clone(),
            Instructions::Dynamic(f) => f(ctx, agent),
        }
    }
}

impl std::fmt::Debug for Instructions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instructions::Static(s) => f.debug_tuple("Static").field(s).finish(),
            Instructions::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl From<String> for Instructions {
    fn from(s: String) -> Self {
        Instructions::Static(s)
    }
}

impl From<&str> for Instructions {
    fn from(s: &str) -> Self {
        Instructions::Static(s.to_string())
    }
}

/// An AI agent configured with instructions, tools, and settings
///
/// Agents are plain data. Behaviour is attached through tools, guardrails
/// and handoffs, and an agent is shared as `Arc<Agent>` so many runs can use
/// it at once.
#[derive(Clone)]
pub struct Agent {
    /// The name of the agent
    pub name: String,

    /// Instructions (system prompt) for the agent
    pub instructions: Option<Instructions>,

    /// The model to use (e.g., "gpt-4", "claude-3-5-sonnet")
    pub model: String,

    /// Tools available to the agent
    pub tools: Vec<Arc<dyn Tool>>,

    /// Agents this one may transfer control to
    pub handoffs: Vec<Handoff>,

    /// Checks run against the raw input before the first model call
    pub input_guardrails: Vec<Arc<dyn Guardrail>>,

    /// Checks run against the candidate final output
    pub output_guardrails: Vec<Arc<dyn Guardrail>>,

    /// Declared shape of the final output
    pub output_schema: OutputSchema,

    /// Model settings (temperature, max_tokens, etc.)
    pub model_settings: ModelSettings,

    /// Description for when this agent is used as a handoff
    pub handoff_description: Option<String>,
}

impl Agent {
    /// Create a new agent with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: None,
            model: "gpt-4".to_string(),
            tools: Vec::new(),
            handoffs: Vec::new(),
            input_guardrails: Vec::new(),
            output_guardrails: Vec::new(),
            output_schema: OutputSchema::Text,
            model_settings: ModelSettings::default(),
            handoff_description: None,
        }
    }

    /// Create a builder for the agent
    pub fn builder(name: impl Into<String>) -> AgentBuilder {
        AgentBuilder {
            agent: Agent::new(name),
        }
    }

    /// Clone the agent with modifications
    pub fn clone_with(&self) -> AgentBuilder {
        AgentBuilder {
            agent: self.clone(),
        }
    }

    /// Check that every tool and handoff pseudo-tool name is unique
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AgentError::Configuration(
                "agent name must not be empty".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        let names = self
            .tools
            .iter()
            .map(|t| t.name())
            .chain(self.handoffs.iter().map(|h| h.tool_name()));
        for name in names {
            if !seen.insert(name) {
                return Err(AgentError::Configuration(format!(
                    "duplicate tool name '{}' on agent '{}'",
                    name, self.name
                )));
            }
        }
        Ok(())
    }

    /// Resolve the system prompt for the current turn
    pub fn system_prompt(&self, ctx: &RunContext) -> Option<String> {
        self.instructions.as_ref().map(|i| i.resolve(ctx, self))
    }

    /// Every capability advertised to the model: tools first, then handoffs
    pub fn tool_specs(&self) -> Vec<ToolSpec> {
        self.tools
            .iter()
            .map(|t| ToolSpec {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.json_schema(),
                kind: t.kind(),
            })
            .chain(self.handoffs.iter().map(Handoff::spec))
            .collect()
    }

    /// Look up a tool by name
    pub fn find_tool(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// Look up a handoff by its pseudo-tool name
    pub fn find_handoff(&self, tool_name: &str) -> Option<&Handoff> {
        self.handoffs.iter().find(|h| h.tool_name() == tool_name)
    }

    /// Expose this agent as a tool another agent can call
    pub fn as_tool(
        self: &Arc<Self>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> AgentTool {
        AgentTool::new(self.clone(), name, description)
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("tools", &self.tools.len())
            .field("handoffs", &self.handoffs.len())
            .field("output_schema", &self.output_schema)
            .finish()
    }
}

/// Builder for creating agents
pub struct AgentBuilder {
    agent: Agent,
}

impl AgentBuilder {
    /// Create a new agent builder
    pub fn new(name: impl Into<String>) -> Self {
        Agent::builder(name)
    }

    /// Set the agent instructions
    pub fn instructions(mut self, instructions: impl Into<Instructions>) -> Self {
        self.agent.instructions = Some(instructions.into());
        self
    }

    /// Compute the instructions from the run context on every turn
    pub fn dynamic_instructions(
        mut self,
        f: impl Fn(&RunContext, &Agent) -> String + Send + Sync + 'static,
    ) -> Self {
        self.agent.instructions = Some(Instructions::Dynamic(Arc::new(f)));
        self
    }

    /// Set the model
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.agent.model = model.into();
        self
    }

    /// Add a tool
    pub fn tool(mut self, tool: impl Tool + 'static) -> Self {
        self.agent.tools.push(Arc::new(tool));
        self
    }

    /// Add multiple tools
    pub fn tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.agent.tools.extend(tools);
        self
    }

    /// Add a handoff target, either an `Arc<Agent>` or a configured [`Handoff`]
    pub fn handoff(mut self, handoff: impl Into<Handoff>) -> Self {
        self.agent.handoffs.push(handoff.into());
        self
    }

    /// Add an input guardrail
    pub fn input_guardrail(mut self, guardrail: impl Guardrail + 'static) -> Self {
        self.agent.input_guardrails.push(Arc::new(guardrail));
        self
    }

    /// Add an output guardrail
    pub fn output_guardrail(mut self, guardrail: impl Guardrail + 'static) -> Self {
        self.agent.output_guardrails.push(Arc::new(guardrail));
        self
    }

    /// Declare the shape of the final output
    pub fn output_schema(mut self, schema: OutputSchema) -> Self {
        self.agent.output_schema = schema;
        self
    }

    /// Set model settings
    pub fn model_settings(mut self, settings: ModelSettings) -> Self {
        self.agent.model_settings = settings;
        self
    }

    /// Set handoff description
    pub fn handoff_description(mut self, desc: impl Into<String>) -> Self {
        self.agent.handoff_description = Some(desc.into());
        self
    }

    /// Build the agent, rejecting duplicate tool names
    pub fn build(self) -> Result<Agent> {
        self.agent.validate()?;
        Ok(self.agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{FunctionTool, HostedTool, ToolKind};
    use serde_json::json;

    fn echo(name: &str) -> FunctionTool {
        FunctionTool::new(name, "echo", json!({"type": "object"}), |_ctx, args| {
            Ok(args.to_string())
        })
    }

    #[test]
    fn test_agent_builder() {
        let agent = Agent::builder("test")
            .instructions("You are a helpful assistant")
            .model("gpt-4")
            .build()
            .unwrap();

        assert_eq!(agent.name, "test");
        assert_eq!(agent.model, "gpt-4");
        assert!(agent.output_schema.is_text());

        let ctx = RunContext::new(Arc::new(agent.clone()));
        assert_eq!(
            agent.system_prompt(&ctx).as_deref(),
            Some("You are a helpful assistant")
        );
    }

    #[test]
    fn test_agent_clone_with() {
        let agent = Agent::builder("test")
            .instructions("Original instructions")
            .tool(echo("lookup"))
            .build()
            .unwrap();

        let modified = agent
            .clone_with()
            .instructions("New instructions")
            .build()
            .unwrap();

        let ctx = RunContext::new(Arc::new(agent));
        assert_eq!(modified.name, "test");
        assert_eq!(modified.tools.len(), 1);
        assert_eq!(
            modified.system_prompt(&ctx).as_deref(),
            Some("New instructions")
        );
    }

    #[test]
    fn test_dynamic_instructions_see_context() {
        let agent = Agent::builder("greeter")
            .dynamic_instructions(|ctx, agent| {
                let user = ctx.context::<String>().cloned().unwrap_or_default();
                format!("You are {}. Greet {}.", agent.name, user)
            })
            .build()
            .unwrap();
        let agent = Arc::new(agent);
        let ctx = RunContext::with_context(agent.clone(), "Ada".to_string());
        assert_eq!(
            agent.system_prompt(&ctx).as_deref(),
            Some("You are greeter. Greet Ada.")
        );
    }

    #[test]
    fn test_duplicate_tool_names_rejected() {
        let err = Agent::builder("calc")
            .tool(echo("add"))
            .tool(echo("add"))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("duplicate tool name 'add'"));
    }

    #[test]
    fn test_tool_colliding_with_handoff_rejected() {
        let billing = Arc::new(Agent::builder("billing").build().unwrap());
        let err = Agent::builder("triage")
            .tool(echo("transfer_to_billing"))
            .handoff(billing)
            .build()
            .unwrap_err();
        assert!(matches!(err, AgentError::Configuration(_)));
    }

    #[test]
    fn test_tool_specs_include_handoffs_last() {
        let billing = Arc::new(
            Agent::builder("billing")
                .handoff_description("Handles invoices")
                .build()
                .unwrap(),
        );
        let agent = Agent::builder("triage")
            .tool(echo("lookup"))
            .tool(HostedTool::new("web_search", "Search the web"))
            .handoff(billing)
            .build()
            .unwrap();

        let specs = agent.tool_specs();
        let kinds: Vec<ToolKind> = specs.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![ToolKind::Function, ToolKind::Hosted, ToolKind::Handoff]
        );
        assert!(specs[2].description.ends_with("Handles invoices"));
        assert!(agent.find_handoff("transfer_to_billing").is_some());
        assert!(agent.find_tool("lookup").is_some());
    }

    #[test]
    fn test_as_tool() {
        let spanish = Arc::new(Agent::builder("spanish").build().unwrap());
        let tool = spanish.as_tool("translate_to_spanish", "Translate to Spanish");
        assert_eq!(tool.name(), "translate_to_spanish");
        assert_eq!(tool.kind(), ToolKind::Agent);
        assert!(Arc::ptr_eq(tool.agent(), &spanish));
    }
}
