//! File and environment configuration for runs
//!
//! [`RunSettings`] is the serializable subset of [`RunConfig`]. Guardrails
//! and cancellation tokens are code, not configuration, and are attached to
//! the resulting `RunConfig` with its builder methods.
//!
//! ```toml
//! max_turns = 8
//! model = "gpt-4o-mini"
//! tool_error_policy = "propagate"
//! max_tool_concurrency = 4
//! timeout_secs = 120
//!
//! [model_settings]
//! temperature = 0.2
//! ```

use crate::errors::{AgentError, Result};
use crate::runner::{RunConfig, DEFAULT_MAX_TURNS, DEFAULT_OUTPUT_RETRIES};
use crate::tool::ToolErrorPolicy;
use crate::types::ModelSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "HANZO_AGENT_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub max_turns: usize,
    pub model: Option<String>,
    pub model_settings: Option<ModelSettings>,
    pub tool_error_policy: ToolErrorPolicy,
    pub max_tool_concurrency: Option<usize>,
    pub output_retries: usize,
    pub timeout_secs: Option<u64>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            model: None,
            model_settings: None,
            tool_error_policy: ToolErrorPolicy::default(),
            max_tool_concurrency: None,
            output_retries: DEFAULT_OUTPUT_RETRIES,
            timeout_secs: None,
        }
    }
}

impl RunSettings {
    /// Load settings from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            AgentError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "Loaded run settings");
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| AgentError::Configuration(format!("invalid run settings: {}", e)))
    }

    /// Save settings as pretty TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self)
            .map_err(|e| AgentError::Configuration(format!("cannot serialize settings: {}", e)))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AgentError::Configuration(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }
        fs::write(path, contents).map_err(|e| {
            AgentError::Configuration(format!("cannot write {}: {}", path.display(), e))
        })
    }

    /// Apply `HANZO_AGENT_*` overrides from the process environment
    pub fn apply_env(self) -> Result<Self> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply overrides read through `lookup`.
    ///
    /// Recognised keys: `MAX_TURNS`, `MODEL`, `TEMPERATURE`,
    /// `TOOL_ERROR_POLICY` (`report_to_model` | `propagate`),
    /// `MAX_TOOL_CONCURRENCY`, `OUTPUT_RETRIES`, `TIMEOUT_SECS`, each with the
    /// `HANZO_AGENT_` prefix.
    pub fn apply_env_with(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(v) = var("MAX_TURNS") {
            self.max_turns = parse_var("MAX_TURNS", &v)?;
        }
        if let Some(v) = var("MODEL") {
            self.model = Some(v);
        }
        if let Some(v) = var("TEMPERATURE") {
            let settings = self.model_settings.get_or_insert_with(ModelSettings::default);
            settings.temperature = Some(parse_var("TEMPERATURE", &v)?);
        }
        if let Some(v) = var("TOOL_ERROR_POLICY") {
            self.tool_error_policy = match v.trim().to_ascii_lowercase().as_str() {
                "report_to_model" | "report" => ToolErrorPolicy::ReportToModel,
                "propagate" => ToolErrorPolicy::Propagate,
                other => {
                    return Err(AgentError::Configuration(format!(
                        "{}TOOL_ERROR_POLICY: unknown policy '{}'",
                        ENV_PREFIX, other
                    )))
                }
            };
        }
        if let Some(v) = var("MAX_TOOL_CONCURRENCY") {
            self.max_tool_concurrency = Some(parse_var("MAX_TOOL_CONCURRENCY", &v)?);
        }
        if let Some(v) = var("OUTPUT_RETRIES") {
            self.output_retries = parse_var("OUTPUT_RETRIES", &v)?;
        }
        if let Some(v) = var("TIMEOUT_SECS") {
            self.timeout_secs = Some(parse_var("TIMEOUT_SECS", &v)?);
        }
        Ok(self)
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| {
        AgentError::Configuration(format!("{}{}: {}", ENV_PREFIX, name, e))
    })
}

impl From<RunSettings> for RunConfig {
    fn from(settings: RunSettings) -> Self {
        RunConfig {
            max_turns: settings.max_turns,
            model_override: settings.model,
            model_settings: settings.model_settings,
            tool_error_policy: settings.tool_error_policy,
            max_tool_concurrency: settings.max_tool_concurrency,
            output_retries: settings.output_retries,
            timeout: settings.timeout_secs.map(Duration::from_secs),
            ..RunConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_run_config() {
        let config: RunConfig = RunSettings::default().into();
        assert_eq!(config.max_turns, DEFAULT_MAX_TURNS);
        assert_eq!(config.output_retries, DEFAULT_OUTPUT_RETRIES);
        assert!(config.timeout.is_none());
    }

    #[test]
    fn test_from_toml() {
        let settings = RunSettings::from_toml_str(
            r#"
            max_turns = 4
            model = "gpt-4o-mini"
            tool_error_policy = "propagate"
            timeout_secs = 30

            [model_settings]
            temperature = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(settings.max_turns, 4);
        assert_eq!(settings.tool_error_policy, ToolErrorPolicy::Propagate);
        assert_eq!(settings.output_retries, DEFAULT_OUTPUT_RETRIES);

        let config = RunConfig::from(settings);
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.model_settings.unwrap().temperature, Some(0.5));
    }

    #[test]
    fn test_bad_toml_is_configuration_error() {
        let err = RunSettings::from_toml_str("max_turns = \"many\"").unwrap_err();
        assert!(matches!(err, AgentError::Configuration(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("HANZO_AGENT_MAX_TURNS", "3"),
            ("HANZO_AGENT_TOOL_ERROR_POLICY", "propagate"),
            ("HANZO_AGENT_TEMPERATURE", "0.1"),
        ]);
        let settings = RunSettings::default()
            .apply_env_with(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(settings.max_turns, 3);
        assert_eq!(settings.tool_error_policy, ToolErrorPolicy::Propagate);
        assert_eq!(settings.model_settings.unwrap().temperature, Some(0.1));
    }

    #[test]
    fn test_invalid_env_value() {
        let err = RunSettings::default()
            .apply_env_with(|key| (key == "HANZO_AGENT_MAX_TURNS").then(|| "ten".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("HANZO_AGENT_MAX_TURNS"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("hanzo-agent-settings-{}", std::process::id()));
        let path = dir.join("run.toml");
        let settings = RunSettings {
            max_turns: 6,
            max_tool_concurrency: Some(2),
            ..Default::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(RunSettings::load(&path).unwrap(), settings);
        let _ = fs::remove_dir_all(dir);
    }
}
