mod common;

use common::{text, ScriptedModel};
use hanzo_agent_runtime::prelude::*;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize, PartialEq)]
struct CalendarEvent {
    name: String,
    date: String,
    participants: Vec<String>,
}

fn extractor() -> Arc<Agent> {
    Arc::new(
        Agent::builder("calendar_extractor")
            .instructions("Extract calendar events from text.")
            .output_schema(OutputSchema::Object(json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "date": {"type": "string"},
                    "participants": {"type": "array", "items": {"type": "string"}}
                },
                "required": ["name", "date", "participants"]
            })))
            .build()
            .unwrap(),
    )
}

const INPUT: &str = "Alice and Bob are going to a science fair on Friday.";

#[tokio::test]
async fn test_structured_output_parsed() {
    let model = ScriptedModel::new()
        .script(
            "calendar_extractor",
            vec![text(
                r#"{"name": "Science fair", "date": "Friday", "participants": ["Alice", "Bob"]}"#,
            )],
        )
        .shared();

    let result = Runner::from_arc(model.clone()).run(&extractor(), INPUT).await.unwrap();

    let event: CalendarEvent = result.final_output_as().unwrap();
    assert_eq!(
        event,
        CalendarEvent {
            name: "Science fair".into(),
            date: "Friday".into(),
            participants: vec!["Alice".into(), "Bob".into()],
        }
    );
    assert!(model.requests()[0].output_schema.is_some());
}

#[tokio::test]
async fn test_one_corrective_retry_then_success() {
    let model = ScriptedModel::new()
        .script(
            "calendar_extractor",
            vec![
                text(r#"{"name": "Science fair"}"#),
                text(r#"{"name": "Science fair", "date": "Friday", "participants": ["Alice", "Bob"]}"#),
            ],
        )
        .shared();

    let result = Runner::from_arc(model.clone()).run(&extractor(), INPUT).await.unwrap();

    assert_eq!(result.turns, 2);
    assert_eq!(result.final_output.as_value().unwrap()["date"], "Friday");

    let retry = &model.requests()[1];
    match retry.history.last() {
        Some(RunItem::Message { role, content }) => {
            assert_eq!(role, "user");
            assert!(content.contains("did not match the required output schema"));
        }
        other => panic!("unexpected last item: {other:?}"),
    }
}

#[tokio::test]
async fn test_second_consecutive_failure_is_fatal() {
    let model = ScriptedModel::new()
        .script(
            "calendar_extractor",
            vec![
                text("Science fair on Friday"),
                text(r#"{"name": "Science fair", "date": 5, "participants": []}"#),
                text("never requested"),
            ],
        )
        .shared();

    let err = Runner::from_arc(model.clone()).run(&extractor(), INPUT).await.unwrap_err();

    match err {
        AgentError::OutputParse { agent, turn, message } => {
            assert_eq!(agent, "calendar_extractor");
            assert_eq!(turn, 2);
            assert!(!message.is_empty());
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(model.call_count(), 2);
}

#[tokio::test]
async fn test_retries_disabled() {
    let model = ScriptedModel::new()
        .script("calendar_extractor", vec![text("not json")])
        .shared();
    let runner = Runner::from_arc(model.clone())
        .with_config(RunConfig::new().with_output_retries(0));

    let err = runner.run(&extractor(), INPUT).await.unwrap_err();
    assert!(matches!(err, AgentError::OutputParse { turn: 1, .. }));
    assert_eq!(model.call_count(), 1);
}

#[tokio::test]
async fn test_list_output_accepts_wrapper() {
    let agent = Arc::new(
        Agent::builder("tagger")
            .output_schema(OutputSchema::List(json!({"type": "string"})))
            .build()
            .unwrap(),
    );
    let model = ScriptedModel::new()
        .script("tagger", vec![text("```json\n{\"response\": [\"rust\", \"async\"]}\n```")])
        .shared();

    let result = Runner::from_arc(model.clone()).run(&agent, "Tag this post").await.unwrap();

    let tags: Vec<String> = result.final_output_as().unwrap();
    assert_eq!(tags, vec!["rust", "async"]);
    assert_eq!(
        model.requests()[0].output_schema.as_ref().unwrap()["required"],
        json!(["response"])
    );
}
