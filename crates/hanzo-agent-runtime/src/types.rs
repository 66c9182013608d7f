//! Core types for the agent runtime

use serde::{Deserialize, Serialize};

/// One entry in the conversation history of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RunItem {
    #[serde(rename = "message")]
    Message { role: String, content: String },

    #[serde(rename = "tool_call")]
    ToolCall {
        id: String,
        name: String,
        arguments: String,
    },

    #[serde(rename = "tool_result")]
    ToolResult {
        tool_call_id: String,
        content: String,
    },

    /// A call executed by the model provider itself; recorded, never run locally
    #[serde(rename = "hosted_tool_call")]
    HostedToolCall {
        id: String,
        name: String,
        arguments: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<String>,
    },

    #[serde(rename = "handoff")]
    Handoff {
        tool_call_id: String,
        from_agent: String,
        to_agent: String,
    },
}

impl RunItem {
    /// Create a user message
    pub fn user_message(content: impl Into<String>) -> Self {
        RunItem::Message {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant_message(content: impl Into<String>) -> Self {
        RunItem::Message {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }

    /// Create a system message
    pub fn system_message(content: impl Into<String>) -> Self {
        RunItem::Message {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Create a tool result
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        RunItem::ToolResult {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }

    /// Whether this item belongs to a tool exchange (call, result, hosted call or handoff)
    pub fn is_tool_item(&self) -> bool {
        !matches!(self, RunItem::Message { .. })
    }
}

/// Input handed to a run: plain text or a prepared history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunInput {
    Text(String),
    Items(Vec<RunItem>),
}

impl RunInput {
    /// Convert the input into history items
    pub fn into_items(self) -> Vec<RunItem> {
        match self {
            RunInput::Text(text) => vec![RunItem::user_message(text)],
            RunInput::Items(items) => items,
        }
    }

    /// The text guardrails inspect: the joined content of every message
    pub fn text(&self) -> String {
        match self {
            RunInput::Text(text) => text.clone(),
            RunInput::Items(items) => items
                .iter()
                .filter_map(|item| match item {
                    RunItem::Message { content, .. } => Some(content.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl From<String> for RunInput {
    fn from(s: String) -> Self {
        RunInput::Text(s)
    }
}

impl From<&str> for RunInput {
    fn from(s: &str) -> Self {
        RunInput::Text(s.to_string())
    }
}

impl From<Vec<RunItem>> for RunInput {
    fn from(items: Vec<RunItem>) -> Self {
        RunInput::Items(items)
    }
}

/// Usage statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub requests: usize,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub total_tokens: usize,
}

impl Usage {
    /// Add usage from another instance
    pub fn add(&mut self, other: &Usage) {
        self.requests += other.requests;
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// Model settings for tuning
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
}

impl ModelSettings {
    /// Overlay `other` on top of `self`; fields set in `other` win
    pub fn resolve(&self, other: Option<&ModelSettings>) -> ModelSettings {
        let Some(other) = other else {
            return self.clone();
        };
        ModelSettings {
            temperature: other.temperature.or(self.temperature),
            top_p: other.top_p.or(self.top_p),
            max_tokens: other.max_tokens.or(self.max_tokens),
            stop: other.stop.clone().or_else(|| self.stop.clone()),
        }
    }
}
