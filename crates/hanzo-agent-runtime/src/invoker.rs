//! Tool dispatch for one turn
//!
//! Arguments are parsed and validated before a handler runs. Calls in a batch
//! run concurrently, bounded by `max_concurrency`, and their results come
//! back in request order.

use crate::errors::{AgentError, Result};
use crate::schema;
use crate::tool::{Tool, ToolContext, ToolErrorPolicy};
use crate::types::RunItem;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info_span, warn, Instrument};

/// One resolved tool call, ready to run
pub struct ToolCall {
    pub tool: Arc<dyn Tool>,
    pub ctx: ToolContext,
    pub arguments: String,
}

/// Executes tool calls under an error policy
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolInvoker {
    policy: ToolErrorPolicy,
    max_concurrency: Option<usize>,
}

impl ToolInvoker {
    pub fn new(policy: ToolErrorPolicy, max_concurrency: Option<usize>) -> Self {
        Self {
            policy,
            max_concurrency,
        }
    }

    /// Validate arguments and run one tool.
    ///
    /// Any error is a [`AgentError::ToolInput`] or [`AgentError::ToolExecution`];
    /// other faults raised by the handler are wrapped as execution errors.
    pub async fn invoke(&self, tool: &dyn Tool, ctx: &ToolContext, arguments: &str) -> Result<String> {
        let args = parse_and_validate(tool, arguments).map_err(|message| AgentError::ToolInput {
            tool_name: tool.name().to_string(),
            message,
        })?;

        let span = info_span!(
            "tool",
            name = %tool.name(),
            call_id = %ctx.tool_call_id(),
            agent = %ctx.agent_name()
        );
        tool.invoke(ctx, args)
            .instrument(span)
            .await
            .map_err(|e| {
                if e.is_tool_fault() {
                    e
                } else {
                    AgentError::tool(tool.name(), e.to_string())
                }
            })
    }

    /// Run a batch of calls and return one `ToolResult` item per call, in
    /// request order.
    ///
    /// Every call runs to completion before this returns. Under
    /// [`ToolErrorPolicy::ReportToModel`] a failed call yields its error text as
    /// the result; under `Propagate` the first failure in request order is
    /// returned.
    pub async fn invoke_all(&self, calls: Vec<ToolCall>) -> Result<Vec<RunItem>> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }
        let limit = self.max_concurrency.unwrap_or(calls.len()).max(1);

        let outcomes: Vec<(ToolCall, Result<String>)> = stream::iter(calls)
            .map(|call| async move {
                let outcome = self
                    .invoke(call.tool.as_ref(), &call.ctx, &call.arguments)
                    .await;
                (call, outcome)
            })
            .buffered(limit)
            .collect()
            .await;

        let mut items = Vec::with_capacity(outcomes.len());
        for (call, outcome) in outcomes {
            let content = match outcome {
                Ok(content) => content,
                Err(e) => {
                    let policy = call.tool.error_policy().unwrap_or(self.policy);
                    if policy == ToolErrorPolicy::Propagate {
                        return Err(e);
                    }
                    warn!(
                        tool = %call.tool.name(),
                        call_id = %call.ctx.tool_call_id(),
                        error = %e,
                        "Tool call failed, reporting to model"
                    );
                    format!("Error: {}", e)
                }
            };
            items.push(RunItem::tool_result(call.ctx.tool_call_id(), content));
        }
        Ok(items)
    }
}

fn parse_and_validate(tool: &dyn Tool, arguments: &str) -> std::result::Result<Value, String> {
    let args = schema::parse_arguments(arguments)?;
    schema::validate(&tool.json_schema(), &args)?;
    Ok(args)
}
