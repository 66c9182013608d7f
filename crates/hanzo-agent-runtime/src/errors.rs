//! Error types for the agent runtime

use serde_json::Value;
use thiserror::Error;

/// Which side of the run a guardrail checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailKind {
    Input,
    Output,
}

impl std::fmt::Display for GuardrailKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuardrailKind::Input => write!(f, "input"),
            GuardrailKind::Output => write!(f, "output"),
        }
    }
}

/// Errors produced by an agent run.
///
/// Run-level variants carry the active agent and turn number so a failure can
/// be diagnosed without replaying the run.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("{kind} guardrail '{guardrail}' tripped on agent '{agent}' (turn {turn})")]
    GuardrailTripped {
        guardrail: String,
        kind: GuardrailKind,
        agent: String,
        turn: usize,
        output_info: Value,
    },

    #[error("{kind} guardrail '{guardrail}' failed on agent '{agent}' (turn {turn}): {message}")]
    GuardrailFailed {
        guardrail: String,
        kind: GuardrailKind,
        agent: String,
        turn: usize,
        message: String,
    },

    #[error("Invalid input for tool '{tool_name}': {message}")]
    ToolInput { tool_name: String, message: String },

    #[error("Tool error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    /// A tool fault that ended the run under [`ToolErrorPolicy::Propagate`]
    ///
    /// [`ToolErrorPolicy::Propagate`]: crate::tool::ToolErrorPolicy::Propagate
    #[error("Tool '{tool_name}' failed on agent '{agent}' (turn {turn}): {message}")]
    ToolFailed {
        tool_name: String,
        agent: String,
        turn: usize,
        message: String,
    },

    #[error("Tool '{tool_name}' is not available on agent '{agent}' (turn {turn})")]
    UnknownTool {
        tool_name: String,
        agent: String,
        turn: usize,
    },

    #[error("Output of agent '{agent}' failed validation (turn {turn}): {message}")]
    OutputParse {
        agent: String,
        turn: usize,
        message: String,
    },

    #[error("Agent '{agent}' requested {} handoffs in turn {turn}: {}", .targets.len(), .targets.join(", "))]
    AmbiguousHandoff {
        agent: String,
        turn: usize,
        targets: Vec<String>,
    },

    #[error("Max turns exceeded: {max_turns} (agent '{agent}')")]
    MaxTurnsExceeded { max_turns: usize, agent: String },

    #[error("Model error on agent '{agent}' (turn {turn}): {message}")]
    ModelCollaborator {
        agent: String,
        turn: usize,
        message: String,
    },

    #[error("Run cancelled on agent '{agent}' (turn {turn})")]
    Cancelled { agent: String, turn: usize },

    #[error("Run timed out after {timeout_ms}ms on agent '{agent}' (turn {turn})")]
    Timeout {
        timeout_ms: u64,
        agent: String,
        turn: usize,
    },

    #[error("Agent configuration error: {0}")]
    Configuration(String),

    #[error("Model API error {status}: {body}")]
    ModelApi { status: u16, body: String },

    #[error("Invalid model response: {0}")]
    InvalidModelResponse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Generic error: {0}")]
    Other(#[from] anyhow::Error),
}

impl AgentError {
    /// Shorthand for a runtime fault inside a tool handler
    pub fn tool(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        AgentError::ToolExecution {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Attach the active agent and turn to a tool fault that ends the run.
    /// Other errors pass through unchanged.
    pub fn in_run(self, agent: impl Into<String>, turn: usize) -> Self {
        match self {
            AgentError::ToolInput { tool_name, message }
            | AgentError::ToolExecution { tool_name, message } => AgentError::ToolFailed {
                tool_name,
                agent: agent.into(),
                turn,
                message,
            },
            other => other,
        }
    }

    /// Whether this error originated inside a single tool call and may be
    /// reported back to the model instead of failing the run.
    pub fn is_tool_fault(&self) -> bool {
        matches!(
            self,
            AgentError::ToolInput { .. } | AgentError::ToolExecution { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
