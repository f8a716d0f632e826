//! Action block handling through the capability registry.

use std::sync::Arc;

use codegen_stream::config::ParserConfig;
use codegen_stream::dispatch::ActionError;
use codegen_stream::parser::EventPayload;
use serde_json::json;

use super::{processor_with, run_chunks, task_registry, types, MemoryWriter};

#[tokio::test]
async fn invalid_then_valid_action_in_one_chunk() {
    let mut processor = processor_with(
        &ParserConfig::default(),
        Arc::new(MemoryWriter::default()),
        task_registry(),
    );

    let events = run_chunks(
        &mut processor,
        &[concat!(
            "<action module=\"tasks\" action=\"create\">[\"oops\",</action>",
            "<action module=\"tasks\" action=\"create\">[\"Buy milk\"]</action>",
        )],
    )
    .await;

    assert_eq!(
        types(&events),
        vec!["action_error", "action_start", "action_complete"]
    );
    assert_eq!(
        events[2],
        EventPayload::ActionComplete {
            module: "tasks".into(),
            action: "create".into(),
            result: json!({ "created": ["Buy milk"] }),
        }
    );
    let result = processor.result();
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("tasks.create: Malformed action payload: invalid JSON"));
}

#[tokio::test]
async fn non_array_payload_is_rejected() {
    let mut processor = processor_with(
        &ParserConfig::default(),
        Arc::new(MemoryWriter::default()),
        task_registry(),
    );

    let events = run_chunks(
        &mut processor,
        &["<action module=\"tasks\" action=\"create\">{\"title\": \"x\"}</action>"],
    )
    .await;

    assert_eq!(
        events,
        vec![EventPayload::ActionError {
            module: "tasks".into(),
            action: "create".into(),
            error: "Malformed action payload: expected a JSON array of arguments, got object"
                .into(),
        }]
    );
}

#[tokio::test]
async fn unsupported_action_reports_error() {
    let mut processor = processor_with(
        &ParserConfig::default(),
        Arc::new(MemoryWriter::default()),
        task_registry(),
    );

    let events = run_chunks(
        &mut processor,
        &["<action module=\"billing\" action=\"charge\" description=\"Charge card\">[100]</action>"],
    )
    .await;

    assert_eq!(
        events,
        vec![
            EventPayload::ActionStart {
                module: "billing".into(),
                action: "charge".into(),
                description: Some("Charge card".into()),
            },
            EventPayload::ActionError {
                module: "billing".into(),
                action: "charge".into(),
                error: "Unsupported operation: billing.charge".into(),
            },
        ]
    );
    assert_eq!(
        processor.result().errors,
        vec!["billing.charge: Unsupported operation: billing.charge"]
    );
}

#[tokio::test]
async fn handler_failure_reports_error() {
    let mut registry = task_registry();
    registry
        .register_fn("tasks", "delete", |_args| async move {
            Err(ActionError::Failed("task is locked".into()))
        })
        .expect("Should register");
    let mut processor = processor_with(
        &ParserConfig::default(),
        Arc::new(MemoryWriter::default()),
        registry,
    );

    let events = run_chunks(
        &mut processor,
        &["<action module=\"tasks\" action=\"delete\">[7]</action>"],
    )
    .await;

    assert_eq!(types(&events), vec!["action_start", "action_error"]);
    assert_eq!(
        processor.result().errors,
        vec!["tasks.delete: Action failed: task is locked"]
    );
}

#[tokio::test]
async fn action_payload_split_across_chunks() {
    let mut processor = processor_with(
        &ParserConfig::default(),
        Arc::new(MemoryWriter::default()),
        task_registry(),
    );

    let events = run_chunks(
        &mut processor,
        &[
            "<action module=\"tasks\" action=\"create\">[\"a </",
            "b>\", 2]</act",
            "ion>",
        ],
    )
    .await;

    assert_eq!(types(&events), vec!["action_start", "action_complete"]);
    assert!(matches!(
        &events[1],
        EventPayload::ActionComplete { result, .. } if *result == json!({ "created": ["a </b>", 2] })
    ));
}
