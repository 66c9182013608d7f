//! Basic agent example
//!
//! A triage agent that answers arithmetic with a calculator tool, hands
//! history questions to a specialist and refuses homework.
//!
//! Run with:
//! ```bash
//! export OPENAI_API_KEY=sk-...
//! cargo run --example basic_agent
//! ```

use hanzo_agent_runtime::prelude::*;
use serde_json::json;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Create a calculator tool
    let calculator = FunctionTool::builder("calculator")
        .description("Performs basic arithmetic operations: add, subtract, multiply, divide")
        .schema(json!({
            "type": "object",
            "properties": {
                "operation": {
                    "type": "string",
                    "enum": ["add", "subtract", "multiply", "divide"],
                    "description": "The arithmetic operation to perform"
                },
                "a": {
                    "type": "number",
                    "description": "The first number"
                },
                "b": {
                    "type": "number",
                    "description": "The second number"
                }
            },
            "required": ["operation", "a", "b"]
        }))
        .handler(|_ctx, args| {
            let op = args["operation"].as_str().unwrap_or_default();
            let a = args["a"].as_f64().unwrap_or_default();
            let b = args["b"].as_f64().unwrap_or_default();

            let result = match op {
                "add" => a + b,
                "subtract" => a - b,
                "multiply" => a * b,
                "divide" => {
                    if b == 0.0 {
                        return Err(AgentError::tool("calculator", "Division by zero"));
                    }
                    a / b
                }
                _ => {
                    return Err(AgentError::tool(
                        "calculator",
                        format!("Invalid operation: {}", op),
                    ))
                }
            };

            Ok(result.to_string())
        })
        .build()?;

    let historian = Arc::new(
        Agent::builder("history_tutor")
            .instructions("You answer questions about history. Be concise and cite dates.")
            .handoff_description("Specialist for historical questions")
            .build()?,
    );

    // Create the agent
    let agent = Arc::new(
        Agent::builder("math_assistant")
            .instructions(
                "You are a helpful math assistant. Use the calculator tool for all arithmetic operations. \
                 Always show your work and explain the calculation. \
                 Hand history questions to the history tutor.",
            )
            .model("gpt-4")
            .tool(calculator)
            .handoff(Handoff::new(historian).input_filter(hanzo_agent_runtime::filters::remove_tool_history))
            .input_guardrail(
                KeywordGuardrail::new("homework_check", &["homework", "assignment"])?
                    .with_reason("we don't do homework"),
            )
            .build()?,
    );

    // Configure the run
    let runner = Runner::new(OpenAiClient::from_env())
        .with_config(RunConfig::new().with_max_turns(10).with_max_tool_concurrency(4));

    // Run the agent
    println!("Running agent...\n");
    let result = runner
        .run(&agent, "What is 123 * 456? Then divide that by 2.")
        .await?;

    // Display results
    println!("\n=== Results ===");
    println!("Answered by: {}", result.last_agent_name());
    println!("Final output: {}", result.final_output);
    println!("\nUsage:");
    println!("  Turns: {}", result.turns);
    println!("  Requests: {}", result.usage.requests);
    println!("  Input tokens: {}", result.usage.input_tokens);
    println!("  Output tokens: {}", result.usage.output_tokens);
    println!("  Total tokens: {}", result.usage.total_tokens);

    println!("\n=== Generated Items ===");
    for (i, item) in result.new_items.iter().enumerate() {
        println!("{}. {:?}", i + 1, item);
    }

    Ok(())
}
