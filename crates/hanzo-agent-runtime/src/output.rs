//! Output coercion: turning the model's final content into a typed value

use crate::errors::{AgentError, Result};
use crate::schema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Key under which non-object outputs are wrapped when advertised to the model
const WRAPPER_KEY: &str = "response";

/// Declared shape of an agent's final output
#[derive(Debug, Clone, Default, PartialEq)]
pub enum OutputSchema {
    /// Plain text, returned as-is
    #[default]
    Text,
    /// A JSON value validated against the given JSON Schema
    Object(Value),
    /// A JSON array whose items match the given schema
    List(Value),
    /// A JSON object whose values match the given schema
    Map(Value),
}

impl OutputSchema {
    pub fn is_text(&self) -> bool {
        matches!(self, OutputSchema::Text)
    }

    /// Schema the parsed value must satisfy
    fn value_schema(&self) -> Option<Value> {
        match self {
            OutputSchema::Text => None,
            OutputSchema::Object(schema) => Some(schema.clone()),
            OutputSchema::List(items) => Some(json!({"type": "array", "items": items})),
            OutputSchema::Map(values) => {
                Some(json!({"type": "object", "additionalProperties": values}))
            }
        }
    }

    /// Schema advertised to the model. Lists and maps are wrapped in an
    /// object because providers only accept object-typed response formats.
    pub fn json_schema(&self) -> Option<Value> {
        let inner = self.value_schema()?;
        match self {
            OutputSchema::List(_) | OutputSchema::Map(_) => Some(json!({
                "type": "object",
                "properties": { WRAPPER_KEY: inner },
                "required": [WRAPPER_KEY],
                "additionalProperties": false
            })),
            _ => Some(inner),
        }
    }

    /// Parse and validate raw model output.
    ///
    /// Returns a diagnostic string suitable for showing to the model when the
    /// output does not conform.
    pub fn coerce(&self, raw: &str) -> std::result::Result<FinalOutput, String> {
        let Some(schema) = self.value_schema() else {
            return Ok(FinalOutput::Text(raw.to_string()));
        };

        let body = strip_code_fence(raw);
        let value: Value = serde_json::from_str(body)
            .map_err(|e| format!("output is not valid JSON: {e}"))?;

        if matches!(self, OutputSchema::Object(_)) {
            schema::validate(&schema, &value)?;
            return Ok(FinalOutput::Structured(value));
        }

        // Lists and maps may arrive bare or inside the advertised wrapper.
        // A bare map is tried first: `{"response": 1}` is a legitimate map.
        let bare_error = match schema::validate(&schema, &value) {
            Ok(()) => return Ok(FinalOutput::Structured(value)),
            Err(e) => e,
        };
        match unwrap_response(&value) {
            Some(inner) => {
                schema::validate(&schema, inner)?;
                Ok(FinalOutput::Structured(inner.clone()))
            }
            None => Err(bare_error),
        }
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(rest) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // drop the language tag line, if any
    match rest.find('\n') {
        Some(pos) => rest[pos + 1..].trim(),
        None => rest.trim(),
    }
}

fn unwrap_response(value: &Value) -> Option<&Value> {
    match value {
        Value::Object(map) if map.len() == 1 => map.get(WRAPPER_KEY),
        _ => None,
    }
}

/// The typed result of a successful run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FinalOutput {
    Text(String),
    Structured(Value),
}

impl FinalOutput {
    /// The text, for agents without an output schema
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FinalOutput::Text(text) => Some(text),
            FinalOutput::Structured(_) => None,
        }
    }

    /// The parsed value, for agents with an output schema
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            FinalOutput::Text(_) => None,
            FinalOutput::Structured(value) => Some(value),
        }
    }

    /// Deserialize into a concrete type
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        let value = match self {
            FinalOutput::Text(text) => Value::String(text.clone()),
            FinalOutput::Structured(value) => value.clone(),
        };
        serde_json::from_value(value).map_err(AgentError::from)
    }
}

impl std::fmt::Display for FinalOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FinalOutput::Text(text) => write!(f, "{}", text),
            FinalOutput::Structured(value) => write!(f, "{}", value),
        }
    }
}
