//! Hanzo Agent Runtime - drives agents through tools, handoffs and guardrails
//!
//! An [`Agent`] is plain data: instructions, tools, handoff targets,
//! guardrails and an output schema. A [`Runner`] drives a multi-turn
//! conversation between a [`ModelClient`] and the active agent until it
//! produces a final output that passes its guardrails and output schema.
//!
//! # Example
//!
//! ```no_run
//! use hanzo_agent_runtime::prelude::*;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let weather = FunctionTool::builder("get_weather")
//!         .description("Current weather for a city")
//!         .schema(json!({
//!             "type": "object",
//!             "properties": {"city": {"type": "string"}},
//!             "required": ["city"]
//!         }))
//!         .handler(|_ctx, args| Ok(format!("Sunny in {}", args["city"])))
//!         .build()?;
//!
//!     let agent = Arc::new(
//!         Agent::builder("assistant")
//!             .instructions("You are a helpful assistant.")
//!             .model("gpt-4")
//!             .tool(weather)
//!             .build()?,
//!     );
//!
//!     let runner = Runner::new(OpenAiClient::from_env());
//!     let result = runner.run(&agent, "What's the weather in Paris?").await?;
//!     println!("Response: {}", result.final_output);
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod config;
pub mod context;
pub mod errors;
pub mod guardrail;
pub mod handoff;
pub mod invoker;
pub mod model;
pub mod output;
pub mod result;
pub mod runner;
pub mod schema;
pub mod tool;
pub mod types;

pub use agent::{Agent, AgentBuilder, Instructions};
pub use config::RunSettings;
pub use context::{ContextData, RunContext};
pub use errors::{AgentError, GuardrailKind, Result};
pub use guardrail::{
    FnGuardrail, Guardrail, GuardrailEngine, GuardrailRecord, GuardrailResult, InputGuardrail,
    KeywordGuardrail, OutputGuardrail,
};
pub use handoff::{filters, Handoff};
pub use invoker::ToolInvoker;
pub use model::{ModelClient, ModelRequest, ModelResponse, OpenAiClient, ToolSpec};
pub use output::{FinalOutput, OutputSchema};
pub use result::RunResult;
pub use runner::{RunConfig, RunOptions, Runner};
pub use tool::{AgentTool, FunctionTool, HostedTool, Tool, ToolContext, ToolErrorPolicy, ToolKind};
pub use types::{ModelSettings, RunInput, RunItem, Usage};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::types::Usage;
    pub use crate::{
        Agent, AgentBuilder, AgentError, FinalOutput, FunctionTool, Guardrail, GuardrailResult,
        Handoff, HostedTool, InputGuardrail, KeywordGuardrail, ModelClient, OpenAiClient,
        OutputGuardrail, OutputSchema, RunConfig, RunContext, RunItem, RunOptions, RunResult,
        Runner, Tool, ToolContext, ToolErrorPolicy,
    };
}
