//! Tool system for agents
//!
//! Every capability an agent can call implements [`Tool`]. The runtime
//! dispatches on [`Tool::kind`]: function tools and agent tools are executed
//! locally, hosted tools are executed by the model provider and only recorded.

use crate::agent::Agent;
use crate::context::ContextData;
use crate::errors::{AgentError, Result};
use crate::output::FinalOutput;
use crate::result::RunResult;
use crate::runner::{RunOptions, Runner};
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::any::Any;
use std::sync::Arc;
use tracing::debug;

/// The kind of capability behind a tool name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Executed locally by a handler
    Function,
    /// Executed by the model provider's own infrastructure
    Hosted,
    /// Runs another agent as a nested run
    Agent,
    /// Pseudo-tool that transfers control to another agent
    Handoff,
}

/// What happens when a tool call fails validation or faults at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorPolicy {
    /// Feed the error text back to the model as the tool result
    #[default]
    ReportToModel,
    /// Fail the whole run
    Propagate,
}

/// Read-only view of the run handed to a tool invocation
#[derive(Clone)]
pub struct ToolContext {
    runner: Runner,
    context: Option<ContextData>,
    agent_name: String,
    tool_call_id: String,
    turn: usize,
}

impl ToolContext {
    pub(crate) fn new(
        runner: Runner,
        context: Option<ContextData>,
        agent_name: impl Into<String>,
        tool_call_id: impl Into<String>,
        turn: usize,
    ) -> Self {
        Self {
            runner,
            context,
            agent_name: agent_name.into(),
            tool_call_id: tool_call_id.into(),
            turn,
        }
    }

    /// Get the user context data
    pub fn context<T: Any + Send + Sync + 'static>(&self) -> Option<&T> {
        self.context.as_ref().and_then(|c| c.downcast_ref::<T>())
    }

    /// The shared user context handle
    pub fn context_handle(&self) -> Option<ContextData> {
        self.context.clone()
    }

    /// Name of the agent that issued the call
    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    /// Id the model assigned to this call
    pub fn tool_call_id(&self) -> &str {
        &self.tool_call_id
    }

    /// Turn in which the call was requested
    pub fn turn(&self) -> usize {
        self.turn
    }

    /// Runner driving the current run, used to start nested runs
    pub fn runner(&self) -> &Runner {
        &self.runner
    }
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("agent_name", &self.agent_name)
            .field("tool_call_id", &self.tool_call_id)
            .field("turn", &self.turn)
            .finish()
    }
}

/// Tool trait for agent tools
///
/// Tools have a name, description, JSON schema, and an invoke method.
/// Arguments are parsed and validated against [`Tool::json_schema`] before
/// `invoke` is called.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The name of the tool
    fn name(&self) -> &str;

    /// A description of what the tool does
    fn description(&self) -> &str;

    /// JSON schema for the tool's parameters
    fn json_schema(&self) -> Value;

    /// How the runtime dispatches this tool
    fn kind(&self) -> ToolKind {
        ToolKind::Function
    }

    /// Per-tool override of the run's error policy
    fn error_policy(&self) -> Option<ToolErrorPolicy> {
        None
    }

    /// Invoke the tool with validated arguments
    async fn invoke(&self, ctx: &ToolContext, args: Value) -> Result<String>;
}

type SyncHandler = Arc<dyn Fn(&ToolContext, Value) -> Result<String> + Send + Sync>;
type AsyncHandler =
    Arc<dyn Fn(ToolContext, Value) -> BoxFuture<'static, Result<String>> + Send + Sync>;

#[derive(Clone)]
enum Handler {
    Sync(SyncHandler),
    Async(AsyncHandler),
}

/// A function-based tool implementation
pub struct FunctionTool {
    name: String,
    description: String,
    json_schema: Value,
    handler: Handler,
    error_policy: Option<ToolErrorPolicy>,
}

impl FunctionTool {
    /// Create a new function tool
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        json_schema: Value,
        handler: impl Fn(&ToolContext, Value) -> Result<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            json_schema,
            handler: Handler::Sync(Arc::new(handler)),
            error_policy: None,
        }
    }

    /// Builder for creating function tools
    pub fn builder(name: impl Into<String>) -> FunctionToolBuilder {
        FunctionToolBuilder {
            name: name.into(),
            description: String::new(),
            json_schema: Value::Null,
            handler: None,
            error_policy: None,
        }
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn json_schema(&self) -> Value {
        self.json_schema.clone()
    }

    fn error_policy(&self) -> Option<ToolErrorPolicy> {
        self.error_policy
    }

    async fn invoke(&self, ctx: &ToolContext, args: Value) -> Result<String> {
        match &self.handler {
            Handler::Sync(f) => f(ctx, args),
            Handler::Async(f) => f(ctx.clone(), args).await,
        }
    }
}

/// Builder for FunctionTool
pub struct FunctionToolBuilder {
    name: String,
    description: String,
    json_schema: Value,
    handler: Option<Handler>,
    error_policy: Option<ToolErrorPolicy>,
}

impl FunctionToolBuilder {
    /// Set the tool description
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Set the JSON schema
    pub fn schema(mut self, schema: Value) -> Self {
        self.json_schema = schema;
        self
    }

    /// Set the handler function
    pub fn handler<F>(mut self, f: F) -> Self
    where
        F: Fn(&ToolContext, Value) -> Result<String> + Send + Sync + 'static,
    {
        self.handler = Some(Handler::Sync(Arc::new(f)));
        self
    }

    /// Set an asynchronous handler
    pub fn async_handler<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(ToolContext, Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<String>> + Send + 'static,
    {
        self.handler = Some(Handler::Async(Arc::new(
            move |ctx, args| -> BoxFuture<'static, Result<String>> { Box::pin(f(ctx, args)) },
        )));
        self
    }

    /// Override the run's error policy for this tool
    pub fn error_policy(mut self, policy: ToolErrorPolicy) -> Self {
        self.error_policy = Some(policy);
        self
    }

    /// Build the function tool
    pub fn build(self) -> Result<FunctionTool> {
        let handler = self
            .handler
            .ok_or_else(|| AgentError::Configuration("Tool handler not set".to_string()))?;

        Ok(FunctionTool {
            name: self.name,
            description: self.description,
            json_schema: self.json_schema,
            handler,
            error_policy: self.error_policy,
        })
    }
}

/// A capability executed by the model provider (web search, code interpreter, ...)
///
/// The runtime advertises it and records calls the model reports, but never
/// executes it.
#[derive(Debug, Clone)]
pub struct HostedTool {
    name: String,
    description: String,
    config: Value,
}

impl HostedTool {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            config: json!({}),
        }
    }

    /// Provider-specific configuration, advertised as the tool's parameters
    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }
}

#[async_trait]
impl Tool for HostedTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn json_schema(&self) -> Value {
        self.config.clone()
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Hosted
    }

    async fn invoke(&self, _ctx: &ToolContext, _args: Value) -> Result<String> {
        Err(AgentError::Configuration(format!(
            "hosted tool '{}' is executed by the model provider",
            self.name
        )))
    }
}

type OutputExtractor = Arc<dyn Fn(&RunResult) -> String + Send + Sync>;

/// Wraps an agent so another agent can call it as a tool.
///
/// Each invocation is an independent nested run with a fresh
/// [`RunContext`](crate::RunContext); the user context object is passed down
/// only when [`AgentTool::share_context`] is set.
pub struct AgentTool {
    agent: Arc<Agent>,
    name: String,
    description: String,
    share_context: bool,
    max_turns: Option<usize>,
    output_extractor: Option<OutputExtractor>,
}

impl AgentTool {
    pub fn new(agent: Arc<Agent>, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            agent,
            name: name.into(),
            description: description.into(),
            share_context: false,
            max_turns: None,
            output_extractor: None,
        }
    }

    /// Pass the parent's user context object to the nested run
    pub fn share_context(mut self, share: bool) -> Self {
        self.share_context = share;
        self
    }

    /// Bound the nested run independently of the parent
    pub fn max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    /// Turn the nested result into the tool's text result
    pub fn output_extractor(
        mut self,
        f: impl Fn(&RunResult) -> String + Send + Sync + 'static,
    ) -> Self {
        self.output_extractor = Some(Arc::new(f));
        self
    }

    /// The wrapped agent
    pub fn agent(&self) -> &Arc<Agent> {
        &self.agent
    }
}

#[async_trait]
impl Tool for AgentTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn json_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "input": {
                    "type": "string",
                    "description": "The input to send to the agent"
                }
            },
            "required": ["input"],
            "additionalProperties": false
        })
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Agent
    }

    async fn invoke(&self, ctx: &ToolContext, args: Value) -> Result<String> {
        let input = args["input"].as_str().unwrap_or_default().to_string();
        let mut options = RunOptions::new();
        if self.share_context {
            options.context = ctx.context_handle();
        }
        options.max_turns = self.max_turns;

        debug!(
            parent = %ctx.agent_name(),
            agent = %self.agent.name,
            "Starting nested agent run"
        );

        let runner = ctx.runner().nested();
        let result = runner
            .run_with(&self.agent, input, options)
            .await
            .map_err(|e| {
                AgentError::tool(
                    self.name.clone(),
                    format!("agent '{}' failed: {e}", self.agent.name),
                )
            })?;

        Ok(match &self.output_extractor {
            Some(extract) => extract(&result),
            None => match &result.final_output {
                FinalOutput::Text(text) => text.clone(),
                FinalOutput::Structured(value) => value.to_string(),
            },
        })
    }
}
