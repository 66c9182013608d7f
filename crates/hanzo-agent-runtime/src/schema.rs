//! JSON Schema helpers shared by tools, handoffs and output coercion

use serde_json::Value;

/// Validate `value` against `schema`.
///
/// A `null` schema accepts anything. On failure the error lists every
/// violation, joined with `"; "`, so it can be shown to the model verbatim.
pub fn validate(schema: &Value, value: &Value) -> Result<(), String> {
    if schema.is_null() {
        return Ok(());
    }
    let validator =
        jsonschema::Validator::new(schema).map_err(|e| format!("invalid schema: {e}"))?;
    if validator.is_valid(value) {
        return Ok(());
    }
    let errors: Vec<String> = validator.iter_errors(value).map(|e| e.to_string()).collect();
    Err(errors.join("; "))
}

/// Parse raw tool-call arguments. Models send `""` for argument-less calls.
pub fn parse_arguments(raw: &str) -> Result<Value, String> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(raw).map_err(|e| format!("arguments are not valid JSON: {e}"))
}
