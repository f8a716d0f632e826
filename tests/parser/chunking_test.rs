//! Chunk-boundary independence of the stream parser.

use std::sync::Arc;

use codegen_stream::config::ParserConfig;
use codegen_stream::parser::{EventPayload, MAX_OPEN_TAG_LEN};

use super::{complete_events, processor_with, run_chunks, task_registry, types, MemoryWriter};

const DOCUMENT: &str = concat!(
    "Sure, here is the plan.\n",
    "<plan>\n1. Add a model\n2. Add a view\n</plan>\n",
    "<message>Creating the todo model now</message>\n",
    "<file path=\"models/todo.ts\" description=\"Todo model\">\n",
    "export interface Todo { title: string; done: boolean }\n",
    "</file>\n",
    "<action module=\"tasks\" action=\"create\" description=\"Seed\">[\"écrire\", 1]</action>\n",
    "<message>Done, enjoy ✨</message>",
);

async fn events_for(chunks: &[&str]) -> (Vec<EventPayload>, Vec<(String, String)>) {
    let writer = Arc::new(MemoryWriter::default());
    let mut processor = processor_with(
        &ParserConfig::default(),
        Arc::clone(&writer),
        task_registry(),
    );
    let events = run_chunks(&mut processor, chunks).await;
    (events, writer.written())
}

/// Char-boundary offsets of `text`, excluding 0 and the end.
fn split_points(text: &str) -> Vec<usize> {
    text.char_indices().map(|(i, _)| i).filter(|&i| i > 0).collect()
}

#[tokio::test]
async fn three_chunks_split_mid_tag() {
    let (events, written) = events_for(&[
        "<message>Hi</mess",
        "age><file path=\"a.t",
        "xt\">hello</file>",
    ])
    .await;

    assert_eq!(types(&events), vec!["message", "file_start", "file_complete"]);
    assert_eq!(events[0], EventPayload::Message { text: "Hi".into() });
    assert!(matches!(
        &events[2],
        EventPayload::FileComplete { path, content, .. } if path == "src/a.txt" && content == "hello"
    ));
    assert_eq!(written, vec![("src/a.txt".to_string(), "hello".to_string())]);
}

#[tokio::test]
async fn completed_events_do_not_depend_on_split_point() {
    let (baseline, baseline_files) = events_for(&[DOCUMENT]).await;
    let baseline = complete_events(&baseline);
    assert_eq!(
        types(&baseline),
        vec![
            "plan",
            "message",
            "file_start",
            "file_complete",
            "action_start",
            "action_complete",
            "message"
        ]
    );

    for split in split_points(DOCUMENT) {
        let (events, files) = events_for(&[&DOCUMENT[..split], &DOCUMENT[split..]]).await;
        assert_eq!(complete_events(&events), baseline, "split at byte {split}");
        assert_eq!(files, baseline_files, "split at byte {split}");
    }
}

#[tokio::test]
async fn completed_events_survive_char_by_char_delivery() {
    let (baseline, _) = events_for(&[DOCUMENT]).await;

    let chars: Vec<String> = DOCUMENT.chars().map(String::from).collect();
    let chunks: Vec<&str> = chars.iter().map(String::as_str).collect();
    let (events, files) = events_for(&chunks).await;

    assert_eq!(complete_events(&events), complete_events(&baseline));
    assert_eq!(files.len(), 1);
}

#[tokio::test]
async fn file_deltas_reconstruct_content_at_every_split() {
    let text = "<file path=\"lib.rs\">\npub fn add(a: i32, b: i32) -> i32 {\n    a + b\n}\n</file>";
    // First byte of content past the leading newline.
    let first_content = text.find('>').unwrap() + 2;

    for split in split_points(text) {
        let (events, _) = events_for(&[&text[..split], &text[split..]]).await;
        let streamed: String = events
            .iter()
            .filter_map(|e| match e {
                EventPayload::FileContentDelta { delta, .. } => Some(delta.as_str()),
                _ => None,
            })
            .collect();
        let Some(EventPayload::FileComplete { content, .. }) = events.last() else {
            panic!("Expected file_complete last, split at byte {split}");
        };
        if split > first_content {
            assert_eq!(&streamed, content, "split at byte {split}");
        } else {
            assert!(streamed.is_empty(), "split at byte {split}");
        }
    }
}

#[tokio::test]
async fn unbalanced_quote_in_prose_at_every_split() {
    let text = "I'll use a <message tag so it's visible.\n<message>Hello</message>\n<file path=\"a.txt\">hi</file>";

    let (baseline, files) = events_for(&[text]).await;
    let baseline = complete_events(&baseline);
    assert_eq!(types(&baseline), vec!["message", "file_start", "file_complete"]);
    assert_eq!(files, vec![("src/a.txt".to_string(), "hi".to_string())]);

    for split in split_points(text) {
        let (events, files) = events_for(&[&text[..split], &text[split..]]).await;
        assert_eq!(complete_events(&events), baseline, "split at byte {split}");
        assert_eq!(files.len(), 1, "split at byte {split}");
    }
}

#[tokio::test]
async fn overlong_open_tag_is_text_at_every_split() {
    let text = format!(
        "<file path=\"{}.rs\">hi</file><message>After the long tag</message>",
        "a".repeat(MAX_OPEN_TAG_LEN)
    );

    let (baseline, files) = events_for(&[&text]).await;
    let baseline = complete_events(&baseline);
    assert_eq!(
        baseline,
        vec![EventPayload::Message {
            text: "After the long tag".into()
        }]
    );
    assert!(files.is_empty());

    for split in split_points(&text) {
        let (events, files) = events_for(&[&text[..split], &text[split..]]).await;
        assert_eq!(complete_events(&events), baseline, "split at byte {split}");
        assert!(files.is_empty(), "split at byte {split}");
    }
}

#[tokio::test]
async fn message_deltas_reconstruct_text() {
    let text = "<message>  Building the dashboard layout  </message>";
    let chars: Vec<String> = text.chars().map(String::from).collect();
    let chunks: Vec<&str> = chars.iter().map(String::as_str).collect();

    let (events, _) = events_for(&chunks).await;
    let streamed: String = events
        .iter()
        .filter_map(|e| match e {
            EventPayload::MessageDelta { delta } => Some(delta.as_str()),
            _ => None,
        })
        .collect();

    assert_eq!(streamed, "Building the dashboard layout");
    assert_eq!(
        events.last(),
        Some(&EventPayload::Message {
            text: "Building the dashboard layout".into()
        })
    );
}

#[tokio::test]
async fn short_message_emits_no_deltas() {
    let (events, _) = events_for(&["<message>Ok", " then", "</message>"]).await;
    assert_eq!(types(&events), vec!["message"]);
}

#[tokio::test]
async fn plan_streams_once_past_threshold() {
    let (events, _) = events_for(&[
        "<plan>1. Scaffold",
        " the project\n2. Add",
        " routes</plan>",
    ])
    .await;

    assert_eq!(
        types(&events),
        vec!["plan_streaming", "plan_streaming", "plan_streaming", "plan"]
    );
    assert_eq!(
        events[0],
        EventPayload::PlanStreaming {
            delta: "1. Scaffold".into()
        }
    );
}
