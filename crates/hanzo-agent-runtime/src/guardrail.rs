//! Guardrails: read-only checks over a run's input or final output
//!
//! A guardrail inspects text and returns a [`GuardrailResult`]. If the
//! tripwire is triggered the run aborts with
//! [`AgentError::GuardrailTripped`].
//!
//! ```text
//! input ──► [input guardrails] ──► model loop ──► candidate ──► [output guardrails] ──► coercion
//! ```

use crate::context::RunContext;
use crate::errors::{AgentError, GuardrailKind, Result};
use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of one guardrail check
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuardrailResult {
    /// Whether the run must be aborted
    pub tripwire_triggered: bool,
    /// Diagnostic payload, surfaced in the error on a trip
    #[serde(default)]
    pub output_info: Value,
}

impl GuardrailResult {
    /// The check passed
    pub fn pass() -> Self {
        Self::default()
    }

    /// The check tripped, with a diagnostic payload
    pub fn trip(output_info: Value) -> Self {
        Self {
            tripwire_triggered: true,
            output_info,
        }
    }

    /// Attach diagnostic information
    pub fn with_info(mut self, output_info: Value) -> Self {
        self.output_info = output_info;
        self
    }
}

/// A guardrail result tagged with where it ran
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailRecord {
    pub guardrail: String,
    pub kind: GuardrailKind,
    pub agent: String,
    pub result: GuardrailResult,
}

/// A validation check over input or output text.
///
/// Guardrails only get shared references to run state; they cannot alter
/// history or the active agent.
#[async_trait]
pub trait Guardrail: Send + Sync {
    /// Name reported when the guardrail trips
    fn name(&self) -> &str;

    /// Check `content` (the raw input or the candidate final output)
    async fn check(&self, ctx: &RunContext, content: &str) -> Result<GuardrailResult>;
}

type CheckFn = Arc<dyn Fn(&RunContext, &str) -> Result<GuardrailResult> + Send + Sync>;

/// Guardrail backed by a closure
pub struct FnGuardrail {
    name: String,
    check: CheckFn,
}

impl FnGuardrail {
    pub fn new(
        name: impl Into<String>,
        check: impl Fn(&RunContext, &str) -> Result<GuardrailResult> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }
}

#[async_trait]
impl Guardrail for FnGuardrail {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, ctx: &RunContext, content: &str) -> Result<GuardrailResult> {
        (self.check)(ctx, content)
    }
}

/// Closure guardrail attached to the input side
pub type InputGuardrail = FnGuardrail;

/// Closure guardrail attached to the output side
pub type OutputGuardrail = FnGuardrail;

/// Trips when any of a set of patterns occurs in the checked text
pub struct KeywordGuardrail {
    name: String,
    patterns: Vec<Regex>,
    reason: String,
}

impl KeywordGuardrail {
    /// Match whole words, case-insensitively.
    ///
    /// `"homework"` matches "my homework" but not "homeworks"; use
    /// [`KeywordGuardrail::containing`] to match anywhere in the text.
    pub fn new(name: impl Into<String>, keywords: &[&str]) -> Result<Self> {
        let patterns: Vec<String> = keywords
            .iter()
            .map(|k| format!(r"\b{}\b", regex::escape(k)))
            .collect();
        Self::from_patterns(name, &patterns)
    }

    /// Match substrings, case-insensitively
    pub fn containing(name: impl Into<String>, keywords: &[&str]) -> Result<Self> {
        let patterns: Vec<String> = keywords.iter().map(|k| regex::escape(k)).collect();
        Self::from_patterns(name, &patterns)
    }

    /// Match raw regular expressions, case-insensitively
    pub fn from_patterns(name: impl Into<String>, patterns: &[String]) -> Result<Self> {
        let name = name.into();
        let patterns = patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| {
                        AgentError::Configuration(format!("guardrail '{}': {}", name, e))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            reason: format!("content blocked by {}", name),
            name,
            patterns,
        })
    }

    /// Reason included in the diagnostic payload
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }
}

#[async_trait]
impl Guardrail for KeywordGuardrail {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, _ctx: &RunContext, content: &str) -> Result<GuardrailResult> {
        let matched: Vec<&str> = self
            .patterns
            .iter()
            .filter_map(|p| p.find(content).map(|m| m.as_str()))
            .collect();

        if matched.is_empty() {
            return Ok(GuardrailResult::pass());
        }
        Ok(GuardrailResult::trip(json!({
            "guardrail": self.name,
            "reason": self.reason,
            "matched": matched,
        })))
    }
}

/// Runs an ordered set of guardrails
pub struct GuardrailEngine;

impl GuardrailEngine {
    /// Run every guardrail against `content`.
    ///
    /// Checks run concurrently; results are inspected in declaration order so
    /// the reported trip does not depend on completion order. Returns the
    /// records of all checks when none tripped.
    pub async fn run(
        guardrails: &[Arc<dyn Guardrail>],
        kind: GuardrailKind,
        ctx: &RunContext,
        content: &str,
    ) -> Result<Vec<GuardrailRecord>> {
        if guardrails.is_empty() {
            return Ok(Vec::new());
        }

        let agent = ctx.current_agent().name.clone();
        debug!(%kind, agent = %agent, count = guardrails.len(), "Running guardrails");

        let futs = guardrails.iter().map(|g| g.check(ctx, content));
        let outcomes = futures::future::join_all(futs).await;

        let mut records = Vec::with_capacity(outcomes.len());
        for (guardrail, outcome) in guardrails.iter().zip(outcomes) {
            let result = outcome.map_err(|e| AgentError::GuardrailFailed {
                guardrail: guardrail.name().to_string(),
                kind,
                agent: agent.clone(),
                turn: ctx.turn(),
                message: e.to_string(),
            })?;

            if result.tripwire_triggered {
                warn!(%kind, guardrail = %guardrail.name(), agent = %agent, "Guardrail tripped");
                return Err(AgentError::GuardrailTripped {
                    guardrail: guardrail.name().to_string(),
                    kind,
                    agent,
                    turn: ctx.turn(),
                    output_info: result.output_info,
                });
            }

            records.push(GuardrailRecord {
                guardrail: guardrail.name().to_string(),
                kind,
                agent: agent.clone(),
                result,
            });
        }

        Ok(records)
    }
}
