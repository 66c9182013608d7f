//! Agent execution runner
//!
//! One run drives a conversation between the model and the active agent's
//! capabilities until the agent produces a final output that passes its
//! guardrails and output schema.
//!
//! ```text
//! Start ─► input guardrails ─► AwaitingModel ─┬─► ExecutingTools ─┐
//!                                  ▲          ├─► Handoff ────────┤
//!                                  └──────────┴───────────────────┘
//!                                             └─► GuardrailCheck ─► coercion ─► Done
//! ```

use crate::agent::Agent;
use crate::context::{ContextData, RunContext};
use crate::errors::{AgentError, GuardrailKind, Result};
use crate::guardrail::{Guardrail, GuardrailEngine};
use crate::handoff::{self, Handoff, HandoffOutcome};
use crate::invoker::{ToolCall, ToolInvoker};
use crate::model::{ModelClient, ModelRequest};
use crate::result::RunResult;
use crate::tool::{Tool, ToolContext, ToolErrorPolicy, ToolKind};
use crate::types::{ModelSettings, RunInput, RunItem};
use futures::future::BoxFuture;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

/// Default maximum turns for agent execution
pub const DEFAULT_MAX_TURNS: usize = 10;

/// Default number of corrective retries after a malformed final output
pub const DEFAULT_OUTPUT_RETRIES: usize = 1;

/// Configuration for agent runs
#[derive(Clone)]
pub struct RunConfig {
    /// Maximum number of turns (model round-trips)
    pub max_turns: usize,

    /// Use this model instead of each agent's own
    pub model_override: Option<String>,

    /// Settings overlaid on each agent's model settings
    pub model_settings: Option<ModelSettings>,

    /// Error policy for tools that do not set their own
    pub tool_error_policy: ToolErrorPolicy,

    /// Maximum tool calls in flight per turn; unbounded when `None`
    pub max_tool_concurrency: Option<usize>,

    /// Corrective retries after an output fails its schema
    pub output_retries: usize,

    /// Wall-clock bound for the whole run
    pub timeout: Option<Duration>,

    /// Input guardrails applied after the agent's own
    pub input_guardrails: Vec<Arc<dyn Guardrail>>,

    /// Output guardrails applied after the agent's own
    pub output_guardrails: Vec<Arc<dyn Guardrail>>,

    /// Cooperative cancellation, checked at turn boundaries
    pub cancellation: Option<CancellationToken>,
}

impl RunConfig {
    /// Create a new run config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum turns
    pub fn with_max_turns(mut self, turns: usize) -> Self {
        self.max_turns = turns;
        self
    }

    /// Override the model of every agent
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_override = Some(model.into());
        self
    }

    /// Set global model settings
    pub fn with_model_settings(mut self, settings: ModelSettings) -> Self {
        self.model_settings = Some(settings);
        self
    }

    /// Set the error policy for tools that do not set their own
    pub fn with_tool_error_policy(mut self, policy: ToolErrorPolicy) -> Self {
        self.tool_error_policy = policy;
        self
    }

    /// Bound the tool calls in flight per turn
    pub fn with_max_tool_concurrency(mut self, limit: usize) -> Self {
        self.max_tool_concurrency = Some(limit);
        self
    }

    /// Set corrective retries after a malformed final output
    pub fn with_output_retries(mut self, retries: usize) -> Self {
        self.output_retries = retries;
        self
    }

    /// Bound the wall-clock time of the whole run
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Add a run-wide input guardrail
    pub fn with_input_guardrail(mut self, guardrail: impl Guardrail + 'static) -> Self {
        self.input_guardrails.push(Arc::new(guardrail));
        self
    }

    /// Add a run-wide output guardrail
    pub fn with_output_guardrail(mut self, guardrail: impl Guardrail + 'static) -> Self {
        self.output_guardrails.push(Arc::new(guardrail));
        self
    }

    /// Attach a cancellation token, checked at turn boundaries and before
    /// each tool batch
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            model_override: None,
            model_settings: None,
            tool_error_policy: ToolErrorPolicy::default(),
            max_tool_concurrency: None,
            output_retries: DEFAULT_OUTPUT_RETRIES,
            timeout: None,
            input_guardrails: Vec::new(),
            output_guardrails: Vec::new(),
            cancellation: None,
        }
    }
}

impl std::fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunConfig")
            .field("max_turns", &self.max_turns)
            .field("model_override", &self.model_override)
            .field("model_settings", &self.model_settings)
            .field("tool_error_policy", &self.tool_error_policy)
            .field("max_tool_concurrency", &self.max_tool_concurrency)
            .field("output_retries", &self.output_retries)
            .field("timeout", &self.timeout)
            .field("input_guardrails", &self.input_guardrails.len())
            .field("output_guardrails", &self.output_guardrails.len())
            .field("cancellation", &self.cancellation.is_some())
            .finish()
    }
}

/// Per-run options
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// User context object, visible to tools, guardrails and instructions
    pub context: Option<ContextData>,

    /// Overrides [`RunConfig::max_turns`] for this run
    pub max_turns: Option<usize>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context<T: Any + Send + Sync + 'static>(mut self, data: T) -> Self {
        self.context = Some(Arc::new(data));
        self
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = Some(max_turns);
        self
    }
}

/// Runner executes the agent loop
#[derive(Clone)]
pub struct Runner {
    model: Arc<dyn ModelClient>,
    config: RunConfig,
}

impl Runner {
    /// Create a runner over a model client with the default config
    pub fn new(model: impl ModelClient + 'static) -> Self {
        Self::from_arc(Arc::new(model))
    }

    /// Create a runner over a shared model client
    pub fn from_arc(model: Arc<dyn ModelClient>) -> Self {
        Self {
            model,
            config: RunConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Runner for a nested agent-as-tool run.
    ///
    /// Run-wide guardrails and the timeout belong to the outer run; the
    /// cancellation token is shared so cancelling the parent stops the child.
    pub(crate) fn nested(&self) -> Runner {
        let mut config = self.config.clone();
        config.input_guardrails.clear();
        config.output_guardrails.clear();
        config.timeout = None;
        Runner {
            model: self.model.clone(),
            config,
        }
    }

    /// Run the agent with the given input
    pub async fn run(&self, agent: &Arc<Agent>, input: impl Into<RunInput>) -> Result<RunResult> {
        self.run_with(agent, input, RunOptions::new()).await
    }

    /// Run the agent with a user context and per-run limits
    ///
    /// This executes the agent loop:
    /// 1. Check the input against the input guardrails
    /// 2. Send the history to the model
    /// 3. If tool calls are returned, execute them and loop
    /// 4. If a handoff is requested, switch agents and loop
    /// 5. Otherwise check and coerce the final output
    pub fn run_with<'a>(
        &'a self,
        agent: &'a Arc<Agent>,
        input: impl Into<RunInput>,
        options: RunOptions,
    ) -> BoxFuture<'a, Result<RunResult>> {
        let input = input.into();
        Box::pin(async move {
            let max_turns = options.max_turns.unwrap_or(self.config.max_turns);
            let mut ctx = RunContext::new(agent.clone()).with_shared_context(options.context);
            let span = info_span!("agent.run", agent = %agent.name);

            let Some(limit) = self.config.timeout else {
                return self.run_loop(&mut ctx, input, max_turns).instrument(span).await;
            };
            let outcome = tokio::time::timeout(
                limit,
                self.run_loop(&mut ctx, input, max_turns).instrument(span),
            )
            .await;
            match outcome {
                Ok(result) => result,
                Err(_) => {
                    let timeout_ms = limit.as_millis() as u64;
                    let agent = ctx.current_agent().name.clone();
                    warn!(agent = %agent, turn = ctx.turn(), timeout_ms, "Run timed out");
                    Err(AgentError::Timeout {
                        timeout_ms,
                        agent,
                        turn: ctx.turn(),
                    })
                }
            }
        })
    }

    /// Drive a run to completion on a dedicated current-thread runtime
    ///
    /// Must not be called from inside an async context.
    pub fn run_blocking(&self, agent: &Arc<Agent>, input: impl Into<RunInput>) -> Result<RunResult> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| AgentError::Configuration(format!("failed to start runtime: {}", e)))?;
        runtime.block_on(self.run(agent, input))
    }

    /// The turn loop. `ctx` lives outside so a timeout can still report
    /// where the run stopped.
    async fn run_loop(
        &self,
        ctx: &mut RunContext,
        input: RunInput,
        max_turns: usize,
    ) -> Result<RunResult> {
        let agent = ctx.current_agent().clone();
        agent.validate()?;

        let input_text = input.text();
        let input_items = input.into_items();
        ctx.extend(input_items.iter().cloned());

        let mut new_items: Vec<RunItem> = Vec::new();
        let mut raw_responses = Vec::new();
        let invoker = ToolInvoker::new(
            self.config.tool_error_policy,
            self.config.max_tool_concurrency,
        );
        let mut output_failures = 0;

        info!("Starting agent run: {}", agent.name);

        let input_guardrails = merged(&agent.input_guardrails, &self.config.input_guardrails);
        let mut guardrail_results =
            GuardrailEngine::run(&input_guardrails, GuardrailKind::Input, ctx, &input_text)
                .await?;

        loop {
            self.check_cancelled(ctx)?;

            let current = ctx.current_agent().clone();
            if ctx.turn() >= max_turns {
                warn!(agent = %current.name, max_turns, "Max turns exceeded");
                return Err(AgentError::MaxTurnsExceeded {
                    max_turns,
                    agent: current.name.clone(),
                });
            }
            let turn = ctx.advance_turn();
            debug!(turn, agent = %current.name, "Running turn");

            let request = self.build_request(&current, ctx);
            let response = self.model.respond(&request).await.map_err(|e| match e {
                AgentError::ModelCollaborator { .. } => e,
                other => AgentError::ModelCollaborator {
                    agent: current.name.clone(),
                    turn,
                    message: other.to_string(),
                },
            })?;
            ctx.add_usage(&response.usage);
            raw_responses.push(response.clone());

            let step = classify(&current, turn, response.output)?;
            ctx.extend(step.items.iter().cloned());
            new_items.extend(step.items);

            if !step.tool_calls.is_empty() || step.handoff.is_some() {
                output_failures = 0;

                if !step.tool_calls.is_empty() {
                    self.check_cancelled(ctx)?;
                    debug!(turn, count = step.tool_calls.len(), "Executing tool calls");
                    let calls = step
                        .tool_calls
                        .into_iter()
                        .map(|pending| ToolCall {
                            ctx: self.tool_context(ctx, &pending.id),
                            tool: pending.tool,
                            arguments: pending.arguments,
                        })
                        .collect();
                    let results = invoker
                        .invoke_all(calls)
                        .await
                        .map_err(|e| e.in_run(current.name.clone(), turn))?;
                    ctx.extend(results.iter().cloned());
                    new_items.extend(results);
                }

                if let Some(pending) = step.handoff {
                    let tool_ctx = self.tool_context(ctx, &pending.id);
                    let outcome = handoff::resolve(
                        &pending.handoff,
                        &pending.id,
                        &pending.arguments,
                        ctx,
                        tool_ctx,
                    )
                    .await?;
                    match outcome {
                        HandoffOutcome::Transferred { items } | HandoffOutcome::Rejected { items } => {
                            new_items.extend(items)
                        }
                    }
                }
                continue;
            }

            let Some(candidate) = step.text else {
                if step.hosted_calls > 0 {
                    debug!(turn, "Only hosted tool calls returned, running again");
                    continue;
                }
                return Err(AgentError::ModelCollaborator {
                    agent: current.name.clone(),
                    turn,
                    message: "Model produced no tool calls or text output".to_string(),
                });
            };

            let output_guardrails = merged(&current.output_guardrails, &self.config.output_guardrails);
            guardrail_results.extend(
                GuardrailEngine::run(&output_guardrails, GuardrailKind::Output, ctx, &candidate)
                    .await?,
            );

            match current.output_schema.coerce(&candidate) {
                Ok(final_output) => {
                    info!(agent = %current.name, turns = turn, "Agent completed with output");
                    return Ok(RunResult {
                        input: input_items,
                        new_items,
                        history: ctx.history().to_vec(),
                        raw_responses,
                        final_output,
                        last_agent: current,
                        guardrail_results,
                        usage: ctx.usage().clone(),
                        turns: ctx.turn(),
                    });
                }
                Err(diagnostic) if output_failures < self.config.output_retries => {
                    output_failures += 1;
                    warn!(
                        agent = %current.name,
                        turn,
                        attempt = output_failures,
                        error = %diagnostic,
                        "Final output failed validation, asking the model to retry"
                    );
                    let feedback = RunItem::user_message(format!(
                        "Your previous response did not match the required output schema: {}. \
                         Respond again with output that conforms to the schema.",
                        diagnostic
                    ));
                    ctx.push(feedback.clone());
                    new_items.push(feedback);
                }
                Err(diagnostic) => {
                    warn!(agent = %current.name, turn, error = %diagnostic, "Final output failed validation");
                    return Err(AgentError::OutputParse {
                        agent: current.name.clone(),
                        turn,
                        message: diagnostic,
                    });
                }
            }
        }
    }

    fn build_request(&self, agent: &Agent, ctx: &RunContext) -> ModelRequest {
        ModelRequest {
            agent_name: agent.name.clone(),
            model: self
                .config
                .model_override
                .clone()
                .unwrap_or_else(|| agent.model.clone()),
            instructions: agent.system_prompt(ctx),
            history: ctx.history().to_vec(),
            tools: agent.tool_specs(),
            output_schema: agent.output_schema.json_schema(),
            settings: agent.model_settings.resolve(self.config.model_settings.as_ref()),
        }
    }

    fn tool_context(&self, ctx: &RunContext, call_id: &str) -> ToolContext {
        ToolContext::new(
            self.clone(),
            ctx.context_handle(),
            ctx.current_agent().name.clone(),
            call_id,
            ctx.turn(),
        )
    }

    fn check_cancelled(&self, ctx: &RunContext) -> Result<()> {
        match &self.config.cancellation {
            Some(token) if token.is_cancelled() => {
                warn!(agent = %ctx.current_agent().name, turn = ctx.turn(), "Run cancelled");
                Err(AgentError::Cancelled {
                    agent: ctx.current_agent().name.clone(),
                    turn: ctx.turn(),
                })
            }
            _ => Ok(()),
        }
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn merged(own: &[Arc<dyn Guardrail>], run_wide: &[Arc<dyn Guardrail>]) -> Vec<Arc<dyn Guardrail>> {
    own.iter().chain(run_wide).cloned().collect()
}

struct PendingTool {
    id: String,
    tool: Arc<dyn Tool>,
    arguments: String,
}

struct PendingHandoff {
    id: String,
    handoff: Handoff,
    arguments: String,
}

/// A model response sorted into what the runner has to do next
struct Step {
    /// Items to append to history, in model order
    items: Vec<RunItem>,
    text: Option<String>,
    tool_calls: Vec<PendingTool>,
    handoff: Option<PendingHandoff>,
    hosted_calls: usize,
}

fn classify(agent: &Agent, turn: usize, output: Vec<RunItem>) -> Result<Step> {
    let mut step = Step {
        items: Vec::with_capacity(output.len()),
        text: None,
        tool_calls: Vec::new(),
        handoff: None,
        hosted_calls: 0,
    };
    let mut handoffs: Vec<PendingHandoff> = Vec::new();

    for item in output {
        match item {
            RunItem::Message { ref content, .. } => {
                match &mut step.text {
                    Some(text) => {
                        text.push('\n');
                        text.push_str(content);
                    }
                    None => step.text = Some(content.clone()),
                }
                step.items.push(item);
            }
            RunItem::ToolCall {
                id,
                name,
                arguments,
            } => {
                if let Some(handoff) = agent.find_handoff(&name) {
                    handoffs.push(PendingHandoff {
                        id: id.clone(),
                        handoff: handoff.clone(),
                        arguments: arguments.clone(),
                    });
                    step.items.push(RunItem::ToolCall {
                        id,
                        name,
                        arguments,
                    });
                    continue;
                }
                let Some(tool) = agent.find_tool(&name) else {
                    warn!(agent = %agent.name, tool = %name, turn, "Model requested unknown tool");
                    return Err(AgentError::UnknownTool {
                        tool_name: name,
                        agent: agent.name.clone(),
                        turn,
                    });
                };
                if tool.kind() == ToolKind::Hosted {
                    step.hosted_calls += 1;
                    step.items.push(RunItem::HostedToolCall {
                        id,
                        name,
                        arguments,
                        output: None,
                    });
                    continue;
                }
                step.tool_calls.push(PendingTool {
                    id: id.clone(),
                    tool: tool.clone(),
                    arguments: arguments.clone(),
                });
                step.items.push(RunItem::ToolCall {
                    id,
                    name,
                    arguments,
                });
            }
            RunItem::HostedToolCall { .. } => {
                step.hosted_calls += 1;
                step.items.push(item);
            }
            other => {
                warn!(agent = %agent.name, turn, item = ?other, "Ignoring unexpected item in model output");
            }
        }
    }

    if handoffs.len() > 1 {
        return Err(AgentError::AmbiguousHandoff {
            agent: agent.name.clone(),
            turn,
            targets: handoffs
                .iter()
                .map(|h| h.handoff.agent().name.clone())
                .collect(),
        });
    }
    step.handoff = handoffs.pop();
    Ok(step)
}
