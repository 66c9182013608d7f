mod common;

use common::{call, calls, text, tool_results, ScriptedModel};
use hanzo_agent_runtime::prelude::*;
use hanzo_agent_runtime::{AgentTool, ToolKind};
use serde_json::json;
use std::sync::Arc;

fn spanish_agent() -> Arc<Agent> {
    Arc::new(
        Agent::builder("spanish_agent")
            .instructions("Translate the user's message to Spanish.")
            .build()
            .unwrap(),
    )
}

fn orchestrator(spanish: &Arc<Agent>) -> Arc<Agent> {
    Arc::new(
        Agent::builder("orchestrator")
            .instructions("Use your tools to translate. Never translate yourself.")
            .tool(spanish.as_tool("translate_to_spanish", "Translate the user's message to Spanish"))
            .build()
            .unwrap(),
    )
}

#[tokio::test]
async fn test_translation_orchestrator() {
    let model = ScriptedModel::new()
        .script(
            "orchestrator",
            vec![
                call("t1", "translate_to_spanish", r#"{"input": "Hello, how are you?"}"#),
                text("In Spanish: Hola, ¿cómo estás?"),
            ],
        )
        .script("spanish_agent", vec![text("Hola, ¿cómo estás?")])
        .shared();

    let spanish = spanish_agent();
    let result = Runner::from_arc(model.clone())
        .run(&orchestrator(&spanish), "Translate 'Hello, how are you?' to Spanish")
        .await
        .unwrap();

    assert_eq!(result.turns, 2);
    assert_eq!(result.last_agent_name(), "orchestrator");
    assert_eq!(result.handoffs().count(), 0);
    assert_eq!(
        tool_results(&result.new_items),
        vec![("t1".to_string(), "Hola, ¿cómo estás?".to_string())]
    );
    assert_eq!(model.calls_for("spanish_agent"), 1);

    let nested = model
        .requests()
        .into_iter()
        .find(|r| r.agent_name == "spanish_agent")
        .unwrap();
    assert_eq!(nested.history, vec![RunItem::user_message("Hello, how are you?")]);
    assert_eq!(model.requests()[0].tools[0].kind, ToolKind::Agent);
}

#[tokio::test]
async fn test_delegation_matches_direct_run() {
    let model = ScriptedModel::new()
        .repeat("spanish_agent", text("Buenos días"))
        .script(
            "orchestrator",
            vec![
                call("t1", "translate_to_spanish", r#"{"input": "Good morning"}"#),
                text("Buenos días"),
            ],
        )
        .shared();
    let runner = Runner::from_arc(model.clone());
    let spanish = spanish_agent();

    let direct = runner.run(&spanish, "Good morning").await.unwrap();
    let delegated = runner.run(&orchestrator(&spanish), "Good morning").await.unwrap();

    assert_eq!(
        tool_results(&delegated.new_items)[0].1,
        direct.final_output.to_string()
    );
    let spanish_requests: Vec<_> = model
        .requests()
        .into_iter()
        .filter(|r| r.agent_name == "spanish_agent")
        .collect();
    assert_eq!(spanish_requests.len(), 2);
    assert_eq!(spanish_requests[0].history, spanish_requests[1].history);
    assert_eq!(spanish_requests[0].instructions, spanish_requests[1].instructions);
}

#[tokio::test]
async fn test_parallel_agent_tools() {
    let french = Arc::new(Agent::builder("french_agent").build().unwrap());
    let spanish = spanish_agent();
    let agent = Arc::new(
        Agent::builder("orchestrator")
            .tool(spanish.as_tool("translate_to_spanish", "To Spanish"))
            .tool(french.as_tool("translate_to_french", "To French"))
            .build()
            .unwrap(),
    );
    let model = ScriptedModel::new()
        .script(
            "orchestrator",
            vec![
                calls(&[
                    ("s", "translate_to_spanish", r#"{"input": "Thanks"}"#),
                    ("f", "translate_to_french", r#"{"input": "Thanks"}"#),
                ]),
                text("Gracias / Merci"),
            ],
        )
        .script("spanish_agent", vec![text("Gracias")])
        .script("french_agent", vec![text("Merci")])
        .shared();

    let result = Runner::from_arc(model).run(&agent, "Thanks").await.unwrap();

    assert_eq!(
        tool_results(&result.new_items),
        vec![
            ("s".to_string(), "Gracias".to_string()),
            ("f".to_string(), "Merci".to_string())
        ]
    );
}

#[tokio::test]
async fn test_nested_failure_reported_to_parent() {
    let model = ScriptedModel::new()
        .script(
            "orchestrator",
            vec![
                call("t1", "translate_to_spanish", r#"{"input": "Hi"}"#),
                text("The translator is unavailable."),
            ],
        )
        .shared();

    let result = Runner::from_arc(model)
        .run(&orchestrator(&spanish_agent()), "Hi")
        .await
        .unwrap();

    let (_, content) = &tool_results(&result.new_items)[0];
    assert!(content.contains("agent 'spanish_agent' failed"));
    assert_eq!(result.final_output.as_text(), Some("The translator is unavailable."));
}

#[tokio::test]
async fn test_nested_run_has_its_own_turn_budget() {
    let looping = Arc::new(
        Agent::builder("looper")
            .tool(FunctionTool::new("noop", "Do nothing", json!({}), |_, _| Ok("ok".into())))
            .build()
            .unwrap(),
    );
    let agent = Arc::new(
        Agent::builder("orchestrator")
            .tool(looping.as_tool("loop", "Loops").max_turns(2))
            .build()
            .unwrap(),
    );
    let model = ScriptedModel::new()
        .repeat("looper", call("n", "noop", "{}"))
        .script(
            "orchestrator",
            vec![call("l1", "loop", r#"{"input": "go"}"#), text("gave up")],
        )
        .shared();

    let result = Runner::from_arc(model.clone()).run(&agent, "go").await.unwrap();

    assert_eq!(model.calls_for("looper"), 2);
    assert!(tool_results(&result.new_items)[0].1.contains("Max turns exceeded: 2"));
    assert_eq!(result.turns, 2);
}

#[tokio::test]
async fn test_shared_context_and_output_extractor() {
    struct Locale(&'static str);

    let reader = Arc::new(
        Agent::builder("locale_reader")
            .tool(FunctionTool::new("locale", "User locale", json!({}), |ctx, _| {
                Ok(ctx
                    .context::<Locale>()
                    .map(|l| l.0.to_string())
                    .unwrap_or_else(|| "unknown".to_string()))
            }))
            .build()
            .unwrap(),
    );
    let wrapper = AgentTool::new(reader.clone(), "read_locale", "Reads the locale")
        .share_context(true)
        .output_extractor(|result| format!("[{}] {}", result.last_agent_name(), result.final_output));
    let isolated = reader.as_tool("read_locale_isolated", "Reads without context");
    let agent = Arc::new(
        Agent::builder("orchestrator")
            .tool(wrapper)
            .tool(isolated)
            .build()
            .unwrap(),
    );

    let model = ScriptedModel::new()
        .script(
            "orchestrator",
            vec![
                call("a", "read_locale", r#"{"input": "which?"}"#),
                call("b", "read_locale_isolated", r#"{"input": "which?"}"#),
                text("done"),
            ],
        )
        .script(
            "locale_reader",
            vec![
                call("x", "locale", "{}"),
                text("es-ES"),
                call("y", "locale", "{}"),
                text("unknown"),
            ],
        )
        .shared();

    let result = Runner::from_arc(model.clone())
        .run_with(&agent, "Locale?", RunOptions::new().with_context(Locale("es-ES")))
        .await
        .unwrap();

    let results = tool_results(&result.new_items);
    assert_eq!(results[0].1, "[locale_reader] es-ES");
    assert_eq!(results[1].1, "unknown");

    let reader_results: Vec<String> = model
        .requests()
        .iter()
        .filter(|r| r.agent_name == "locale_reader")
        .flat_map(|r| tool_results(&r.history))
        .map(|(_, content)| content)
        .collect();
    assert_eq!(reader_results, vec!["es-ES", "unknown"]);
}
