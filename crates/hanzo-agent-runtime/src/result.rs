//! Result types for agent runs

use crate::agent::Agent;
use crate::errors::Result;
use crate::guardrail::GuardrailRecord;
use crate::model::ModelResponse;
use crate::output::FinalOutput;
use crate::types::{RunItem, Usage};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Result of a successful agent run
#[derive(Debug, Clone)]
pub struct RunResult {
    /// The original input
    pub input: Vec<RunItem>,

    /// New items generated during the run
    pub new_items: Vec<RunItem>,

    /// History as the last agent saw it, after any handoff filters
    pub history: Vec<RunItem>,

    /// Raw model responses
    pub raw_responses: Vec<ModelResponse>,

    /// The final output, coerced to the last agent's output schema
    pub final_output: FinalOutput,

    /// The agent that produced the final output
    pub last_agent: Arc<Agent>,

    /// Every guardrail check that ran
    pub guardrail_results: Vec<GuardrailRecord>,

    /// Total usage statistics
    pub usage: Usage,

    /// Model round-trips taken
    pub turns: usize,
}

impl RunResult {
    /// Convert the result back to a list of input items
    ///
    /// This merges the original input with all new items,
    /// useful for continuing a conversation.
    pub fn to_input_list(&self) -> Vec<RunItem> {
        let mut items = self.input.clone();
        items.extend(self.new_items.iter().cloned());
        items
    }

    /// Get the last assistant message content from the result
    pub fn last_message(&self) -> Option<&str> {
        self.new_items.iter().rev().find_map(|item| match item {
            RunItem::Message { role, content } if role == "assistant" => Some(content.as_str()),
            _ => None,
        })
    }

    /// Deserialize the final output into a concrete type
    pub fn final_output_as<T: DeserializeOwned>(&self) -> Result<T> {
        self.final_output.parse()
    }

    /// Name of the agent that produced the final output
    pub fn last_agent_name(&self) -> &str {
        &self.last_agent.name
    }

    /// Guardrail checks that tripped. Always empty for a successful run.
    pub fn guardrail_trips(&self) -> impl Iterator<Item = &GuardrailRecord> {
        self.guardrail_results
            .iter()
            .filter(|r| r.result.tripwire_triggered)
    }

    /// Handoffs taken during the run, as `(from, to)` pairs
    pub fn handoffs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.new_items.iter().filter_map(|item| match item {
            RunItem::Handoff {
                from_agent,
                to_agent,
                ..
            } => Some((from_agent.as_str(), to_agent.as_str())),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(new_items: Vec<RunItem>, final_output: FinalOutput) -> RunResult {
        RunResult {
            input: vec![RunItem::user_message("hi")],
            new_items,
            history: Vec::new(),
            raw_responses: Vec::new(),
            final_output,
            last_agent: Arc::new(Agent::new("assistant")),
            guardrail_results: Vec::new(),
            usage: Usage::default(),
            turns: 1,
        }
    }

    #[test]
    fn test_input_list_and_last_message() {
        let result = result(
            vec![
                RunItem::assistant_message("first"),
                RunItem::tool_result("c1", "42"),
                RunItem::assistant_message("hello there"),
            ],
            FinalOutput::Text("hello there".into()),
        );
        assert_eq!(result.to_input_list().len(), 4);
        assert_eq!(result.last_message(), Some("hello there"));
        assert_eq!(result.last_agent_name(), "assistant");
        assert_eq!(result.guardrail_trips().count(), 0);
    }

    #[test]
    fn test_final_output_as() {
        let result = result(Vec::new(), FinalOutput::Structured(json!([1, 2, 3])));
        let numbers: Vec<u32> = result.final_output_as().unwrap();
        assert_eq!(numbers, vec![1, 2, 3]);
    }
}
