//! Handoffs: transferring control to another agent mid-run
//!
//! A handoff is advertised to the model as a pseudo-tool named
//! `transfer_to_<agent>`. When the model calls it, the resolver validates the
//! payload, filters the history for the receiving agent, fires the optional
//! `on_handoff` callback and swaps the active agent.

use crate::agent::Agent;
use crate::context::RunContext;
use crate::model::ToolSpec;
use crate::schema;
use crate::tool::{ToolContext, ToolKind};
use crate::types::RunItem;
use futures::future::BoxFuture;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// Transforms the history the receiving agent will see
pub type HandoffInputFilter = Arc<dyn Fn(Vec<RunItem>) -> Vec<RunItem> + Send + Sync>;

/// Side-effect callback fired when a handoff is taken
pub type OnHandoff =
    Arc<dyn Fn(ToolContext, Value) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// A control-transfer target
#[derive(Clone)]
pub struct Handoff {
    agent: Arc<Agent>,
    tool_name: String,
    tool_description: String,
    input_schema: Option<Value>,
    on_handoff: Option<OnHandoff>,
    input_filter: Option<HandoffInputFilter>,
}

impl Handoff {
    /// Hand off to `agent` under the default `transfer_to_<name>` tool name
    pub fn new(agent: Arc<Agent>) -> Self {
        let tool_name = default_tool_name(&agent.name);
        let mut tool_description = format!("Handoff to the {} agent to handle the request.", agent.name);
        if let Some(desc) = &agent.handoff_description {
            tool_description.push(' ');
            tool_description.push_str(desc);
        }
        Self {
            agent,
            tool_name,
            tool_description,
            input_schema: None,
            on_handoff: None,
            input_filter: None,
        }
    }

    pub fn with_tool_name(mut self, name: impl Into<String>) -> Self {
        self.tool_name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.tool_description = description.into();
        self
    }

    /// Fire `f` when the handoff is taken. Faults are logged, never fatal.
    pub fn on_handoff<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(ToolContext, Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_handoff = Some(Arc::new(
            move |ctx, args| -> BoxFuture<'static, anyhow::Result<()>> { Box::pin(f(ctx, args)) },
        ));
        self
    }

    /// Like [`Handoff::on_handoff`], with the model's payload validated against `schema`
    pub fn on_handoff_with_input<F, Fut>(mut self, schema: Value, f: F) -> Self
    where
        F: Fn(ToolContext, Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.input_schema = Some(schema);
        self.on_handoff(f)
    }

    /// Filter the history before the receiving agent sees it
    pub fn input_filter(
        mut self,
        f: impl Fn(Vec<RunItem>) -> Vec<RunItem> + Send + Sync + 'static,
    ) -> Self {
        self.input_filter = Some(Arc::new(f));
        self
    }

    /// The receiving agent
    pub fn agent(&self) -> &Arc<Agent> {
        &self.agent
    }

    /// Pseudo-tool name the model calls
    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    /// Pseudo-tool spec advertised to the model
    pub fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.tool_name.clone(),
            description: self.tool_description.clone(),
            parameters: self.input_schema.clone().unwrap_or_else(|| {
                json!({"type": "object", "properties": {}, "additionalProperties": false})
            }),
            kind: ToolKind::Handoff,
        }
    }
}

impl From<Arc<Agent>> for Handoff {
    fn from(agent: Arc<Agent>) -> Self {
        Handoff::new(agent)
    }
}

impl std::fmt::Debug for Handoff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handoff")
            .field("tool_name", &self.tool_name)
            .field("agent", &self.agent.name)
            .field("input_filter", &self.input_filter.is_some())
            .field("on_handoff", &self.on_handoff.is_some())
            .finish()
    }
}

/// `transfer_to_` + the agent name in snake case
pub fn default_tool_name(agent_name: &str) -> String {
    let snake: String = agent_name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("transfer_to_{}", snake)
}

/// What the resolver did with a handoff request
#[derive(Debug)]
pub(crate) enum HandoffOutcome {
    /// Control moved to the new agent; items were appended to history
    Transferred { items: Vec<RunItem> },
    /// The payload was invalid; no swap, the error is shown to the model
    Rejected { items: Vec<RunItem> },
}

/// Resolve one handoff request against the run.
///
/// The active agent is swapped only after the filter and callback ran, so a
/// run never observes a half-applied handoff. A target whose capabilities
/// collide fails the run before anything is recorded.
pub(crate) async fn resolve(
    handoff: &Handoff,
    call_id: &str,
    arguments: &str,
    ctx: &mut RunContext,
    tool_ctx: ToolContext,
) -> crate::errors::Result<HandoffOutcome> {
    handoff.agent.validate()?;
    let from = ctx.current_agent().name.clone();
    let to = handoff.agent.name.clone();

    let payload = match validate_payload(handoff, arguments) {
        Ok(payload) => payload,
        Err(message) => {
            warn!(from = %from, to = %to, error = %message, "Rejected handoff payload");
            let item = RunItem::tool_result(
                call_id,
                format!("Handoff to '{}' rejected: {}", to, message),
            );
            ctx.push(item.clone());
            return Ok(HandoffOutcome::Rejected { items: vec![item] });
        }
    };

    let mut items = vec![
        RunItem::tool_result(call_id, json!({ "assistant": to }).to_string()),
        RunItem::Handoff {
            tool_call_id: call_id.to_string(),
            from_agent: from.clone(),
            to_agent: to.clone(),
        },
    ];
    ctx.extend(items.clone());

    if let Some(filter) = &handoff.input_filter {
        let history = ctx.take_history();
        ctx.replace_history(filter(history));
    }

    if let Some(callback) = &handoff.on_handoff {
        if let Err(e) = callback(tool_ctx, payload).await {
            warn!(from = %from, to = %to, error = %e, "on_handoff callback failed");
            let note = RunItem::system_message(format!("on_handoff callback for '{}' failed: {}", to, e));
            ctx.push(note.clone());
            items.push(note);
        }
    }

    ctx.set_agent(handoff.agent.clone());
    info!(from = %from, to = %to, turn = ctx.turn(), "Handoff completed");

    Ok(HandoffOutcome::Transferred { items })
}

fn validate_payload(handoff: &Handoff, arguments: &str) -> Result<Value, String> {
    let payload = schema::parse_arguments(arguments)?;
    if let Some(input_schema) = &handoff.input_schema {
        schema::validate(input_schema, &payload)?;
    }
    Ok(payload)
}

/// Built-in history filters
pub mod filters {
    use crate::types::RunItem;

    /// Drop every tool call, tool result, hosted call and handoff marker
    pub fn remove_tool_history(history: Vec<RunItem>) -> Vec<RunItem> {
        history.into_iter().filter(|item| !item.is_tool_item()).collect()
    }

    /// Keep only the last `n` messages, dropping tool traffic
    pub fn keep_last_messages(n: usize) -> impl Fn(Vec<RunItem>) -> Vec<RunItem> + Send + Sync {
        move |history| {
            let messages = remove_tool_history(history);
            let skip = messages.len().saturating_sub(n);
            messages.into_iter().skip(skip).collect()
        }
    }
}
