//! Model client contract
//!
//! The runtime never talks to a provider directly. It hands a
//! [`ModelRequest`] to a [`ModelClient`] and classifies the returned
//! [`ModelResponse`]. Retries and transport concerns live behind the trait.

pub mod openai;

use crate::errors::Result;
use crate::tool::ToolKind;
use crate::types::{ModelSettings, RunItem, Usage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use openai::OpenAiClient;

/// A capability advertised to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
    pub kind: ToolKind,
}

/// Everything the model needs for one round-trip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRequest {
    /// Agent issuing the request
    pub agent_name: String,

    /// Model identifier
    pub model: String,

    /// Resolved instructions (system prompt)
    pub instructions: Option<String>,

    /// Ordered conversation history
    pub history: Vec<RunItem>,

    /// Tools, hosted capabilities and handoffs available this turn
    pub tools: Vec<ToolSpec>,

    /// JSON schema the final output must satisfy, if any
    pub output_schema: Option<Value>,

    /// Sampling settings
    pub settings: ModelSettings,
}

/// Model response
///
/// `output` holds assistant messages, tool calls and hosted tool calls in the
/// order the model produced them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelResponse {
    /// The output items (messages, tool calls, etc.)
    pub output: Vec<RunItem>,

    /// Usage statistics
    pub usage: Usage,

    /// Response ID for reference
    pub id: Option<String>,
}

impl ModelResponse {
    /// A response carrying only final text
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            output: vec![RunItem::assistant_message(content)],
            ..Default::default()
        }
    }

    /// A response requesting tool calls, each given as `(id, name, arguments)`
    pub fn tool_calls<I, S>(calls: I) -> Self
    where
        I: IntoIterator<Item = (S, S, S)>,
        S: Into<String>,
    {
        Self {
            output: calls
                .into_iter()
                .map(|(id, name, arguments)| RunItem::ToolCall {
                    id: id.into(),
                    name: name.into(),
                    arguments: arguments.into(),
                })
                .collect(),
            ..Default::default()
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }
}

/// The external model collaborator
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Perform one round-trip
    async fn respond(&self, request: &ModelRequest) -> Result<ModelResponse>;
}
