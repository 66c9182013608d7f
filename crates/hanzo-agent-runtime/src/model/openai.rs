//! OpenAI-compatible chat completions client

use super::{ModelClient, ModelRequest, ModelResponse, ToolSpec};
use crate::errors::{AgentError, Result};
use crate::tool::ToolKind;
use crate::types::{RunItem, Usage};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

/// Default API base when `OPENAI_API_BASE` is unset
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// [`ModelClient`] for any `/chat/completions` endpoint
///
/// Hosted tools are not supported by chat completions and are left out of
/// the request.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
}

impl OpenAiClient {
    pub fn new(api_base: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into(),
            api_key,
        }
    }

    /// Read `OPENAI_API_BASE` and `OPENAI_API_KEY`
    pub fn from_env() -> Self {
        Self::new(
            std::env::var("OPENAI_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            std::env::var("OPENAI_API_KEY").ok(),
        )
    }

    /// Set the API key
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Build the request body
    fn build_body(request: &ModelRequest) -> Value {
        let mut messages = Vec::new();
        if let Some(instructions) = &request.instructions {
            messages.push(json!({"role": "system", "content": instructions}));
        }
        messages.extend(Self::items_to_openai_messages(&request.history));

        let mut body = json!({
            "model": request.model,
            "messages": messages,
        });

        let tools: Vec<Value> = request
            .tools
            .iter()
            .filter(|t| t.kind != ToolKind::Hosted)
            .map(Self::tool_to_openai)
            .collect();
        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }

        if let Some(schema) = &request.output_schema {
            body["response_format"] = json!({
                "type": "json_schema",
                "json_schema": {"name": "final_output", "schema": schema, "strict": false}
            });
        }

        let settings = &request.settings;
        if let Some(temp) = settings.temperature {
            body["temperature"] = json!(temp);
        }
        if let Some(top_p) = settings.top_p {
            body["top_p"] = json!(top_p);
        }
        if let Some(max_tokens) = settings.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(stop) = &settings.stop {
            body["stop"] = json!(stop);
        }
        body
    }

    fn tool_to_openai(tool: &ToolSpec) -> Value {
        let parameters = if tool.parameters.is_null() {
            json!({"type": "object", "properties": {}})
        } else {
            tool.parameters.clone()
        };
        json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": parameters,
            }
        })
    }

    /// Convert history to OpenAI message format.
    ///
    /// Consecutive tool calls collapse into one assistant message, as the API
    /// expects every `tool` message to answer a call of the preceding
    /// assistant turn.
    fn items_to_openai_messages(items: &[RunItem]) -> Vec<Value> {
        let mut messages: Vec<Value> = Vec::new();
        let mut pending_calls: Vec<Value> = Vec::new();

        for item in items {
            if !matches!(item, RunItem::ToolCall { .. }) && !pending_calls.is_empty() {
                messages.push(json!({
                    "role": "assistant",
                    "content": Value::Null,
                    "tool_calls": std::mem::take(&mut pending_calls),
                }));
            }
            match item {
                RunItem::ToolCall {
                    id,
                    name,
                    arguments,
                } => {
                    pending_calls.push(json!({
                        "id": id,
                        "type": "function",
                        "function": {"name": name, "arguments": arguments},
                    }));
                }
                RunItem::Message { role, content } => {
                    messages.push(json!({"role": role, "content": content}));
                }
                RunItem::ToolResult {
                    tool_call_id,
                    content,
                } => {
                    messages.push(json!({
                        "role": "tool",
                        "tool_call_id": tool_call_id,
                        "content": content,
                    }));
                }
                // Provider-side calls and handoff markers have no chat form
                RunItem::HostedToolCall { .. } | RunItem::Handoff { .. } => {}
            }
        }
        if !pending_calls.is_empty() {
            messages.push(json!({
                "role": "assistant",
                "content": Value::Null,
                "tool_calls": pending_calls,
            }));
        }
        messages
    }

    /// Parse the LLM response into a ModelResponse
    fn parse_llm_response(response: Value) -> Result<ModelResponse> {
        let choice = response["choices"]
            .get(0)
            .ok_or_else(|| AgentError::InvalidModelResponse("no choices in response".to_string()))?;

        let message = &choice["message"];
        let mut output = Vec::new();

        if let Some(content) = message["content"].as_str() {
            if !content.is_empty() {
                output.push(RunItem::assistant_message(content));
            }
        }

        if let Some(tool_calls) = message["tool_calls"].as_array() {
            for call in tool_calls {
                let id = call["id"]
                    .as_str()
                    .ok_or_else(|| AgentError::InvalidModelResponse("missing tool call id".to_string()))?;
                let function = &call["function"];
                let name = function["name"]
                    .as_str()
                    .ok_or_else(|| AgentError::InvalidModelResponse("missing tool name".to_string()))?;
                let args = function["arguments"].as_str().unwrap_or_default();

                output.push(RunItem::ToolCall {
                    id: id.to_string(),
                    name: name.to_string(),
                    arguments: args.to_string(),
                });
            }
        }

        let usage = if let Some(u) = response["usage"].as_object() {
            Usage {
                requests: 1,
                input_tokens: u["prompt_tokens"].as_u64().unwrap_or(0) as usize,
                output_tokens: u["completion_tokens"].as_u64().unwrap_or(0) as usize,
                total_tokens: u["total_tokens"].as_u64().unwrap_or(0) as usize,
            }
        } else {
            Usage {
                requests: 1,
                ..Default::default()
            }
        };

        Ok(ModelResponse {
            output,
            usage,
            id: response["id"].as_str().map(|s| s.to_string()),
        })
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    async fn respond(&self, request: &ModelRequest) -> Result<ModelResponse> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| AgentError::Configuration("API key not set".to_string()))?;

        let body = Self::build_body(request);
        debug!("Calling LLM: {}", request.model);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AgentError::ModelApi {
                status: status.as_u16(),
                body: error_text,
            });
        }

        let response_json: Value = response.json().await?;
        debug!("LLM response: {:?}", response_json);

        Self::parse_llm_response(response_json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ModelSettings;

    fn request(history: Vec<RunItem>, tools: Vec<ToolSpec>) -> ModelRequest {
        ModelRequest {
            agent_name: "assistant".into(),
            model: "gpt-4".into(),
            instructions: Some("Be brief".into()),
            history,
            tools,
            output_schema: None,
            settings: ModelSettings {
                temperature: Some(0.1),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_body_groups_tool_calls() {
        let history = vec![
            RunItem::user_message("weather?"),
            RunItem::ToolCall {
                id: "a".into(),
                name: "weather".into(),
                arguments: "{}".into(),
            },
            RunItem::ToolCall {
                id: "b".into(),
                name: "time".into(),
                arguments: "{}".into(),
            },
            RunItem::tool_result("a", "sunny"),
            RunItem::tool_result("b", "noon"),
        ];
        let body = OpenAiClient::build_body(&request(history, vec![]));
        let messages = body["messages"].as_array().unwrap();

        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[2]["tool_calls"].as_array().unwrap().len(), 2);
        assert_eq!(messages[3]["role"], "tool");
        assert_eq!(messages.len(), 5);
        assert_eq!(body["temperature"], json!(0.1f32));
    }

    #[test]
    fn test_hosted_tools_are_not_sent() {
        let tools = vec![
            ToolSpec {
                name: "web_search".into(),
                description: "search".into(),
                parameters: json!({}),
                kind: ToolKind::Hosted,
            },
            ToolSpec {
                name: "transfer_to_billing".into(),
                description: "handoff".into(),
                parameters: json!({"type": "object"}),
                kind: ToolKind::Handoff,
            },
        ];
        let body = OpenAiClient::build_body(&request(vec![], tools));
        let tools = body["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["function"]["name"], "transfer_to_billing");
    }

    #[test]
    fn test_parse_response() {
        let raw = json!({
            "id": "resp_1",
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "calculator", "arguments": "{\"a\":1}"}
                    }]
                }
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        });
        let parsed = OpenAiClient::parse_llm_response(raw).unwrap();
        assert_eq!(parsed.id.as_deref(), Some("resp_1"));
        assert_eq!(parsed.usage.total_tokens, 15);
        assert!(matches!(&parsed.output[0], RunItem::ToolCall { name, .. } if name == "calculator"));
    }

    #[test]
    fn test_malformed_response_is_not_a_configuration_error() {
        let err = OpenAiClient::parse_llm_response(json!({"choices": []})).unwrap_err();
        assert!(matches!(err, AgentError::InvalidModelResponse(_)));

        let raw = json!({"choices": [{"message": {"tool_calls": [{"function": {"name": "x"}}]}}]});
        let err = OpenAiClient::parse_llm_response(raw).unwrap_err();
        assert!(err.to_string().contains("missing tool call id"));
    }
}
