//! Scripted model client shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use hanzo_agent_runtime::{AgentError, ModelClient, ModelRequest, ModelResponse, Result, RunItem, Usage};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

enum Script {
    Queue(VecDeque<ModelResponse>),
    Repeat(ModelResponse),
}

/// Replays canned responses per agent and records every request
#[derive(Default)]
pub struct ScriptedModel {
    scripts: Mutex<HashMap<String, Script>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Responses returned, in order, when `agent` calls the model
    pub fn script(self, agent: &str, responses: Vec<ModelResponse>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(agent.to_string(), Script::Queue(responses.into()));
        self
    }

    /// `response` returned every time `agent` calls the model
    pub fn repeat(self, agent: &str, response: ModelResponse) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(agent.to_string(), Script::Repeat(response));
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn calls_for(&self, agent: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.agent_name == agent)
            .count()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn respond(&self, request: &ModelRequest) -> Result<ModelResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let mut scripts = self.scripts.lock().unwrap();
        let response = match scripts.get_mut(&request.agent_name) {
            Some(Script::Queue(queue)) => queue.pop_front(),
            Some(Script::Repeat(response)) => Some(response.clone()),
            None => None,
        };
        response
            .map(|r| {
                r.with_usage(Usage {
                    requests: 1,
                    input_tokens: 10,
                    output_tokens: 5,
                    total_tokens: 15,
                })
            })
            .ok_or_else(|| {
                AgentError::Configuration(format!("no scripted response for '{}'", request.agent_name))
            })
    }
}

pub fn text(content: &str) -> ModelResponse {
    ModelResponse::text(content)
}

pub fn call(id: &str, name: &str, arguments: &str) -> ModelResponse {
    ModelResponse::tool_calls([(id, name, arguments)])
}

pub fn calls(calls: &[(&str, &str, &str)]) -> ModelResponse {
    ModelResponse::tool_calls(calls.iter().copied())
}

/// Tool results recorded in `items`, as `(call id, content)`
pub fn tool_results(items: &[RunItem]) -> Vec<(String, String)> {
    items
        .iter()
        .filter_map(|item| match item {
            RunItem::ToolResult {
                tool_call_id,
                content,
            } => Some((tool_call_id.clone(), content.clone())),
            _ => None,
        })
        .collect()
}
