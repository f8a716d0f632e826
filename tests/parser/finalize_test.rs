//! End-of-stream reconciliation of blocks left open.

use std::sync::Arc;

use codegen_stream::config::ParserConfig;
use codegen_stream::parser::{EventPayload, TagKind};

use super::{complete_events, processor_with, run_chunks, task_registry, types, MemoryWriter};

#[tokio::test]
async fn open_file_is_written_at_finalize() {
    let writer = Arc::new(MemoryWriter::default());
    let mut processor = processor_with(
        &ParserConfig::default(),
        Arc::clone(&writer),
        task_registry(),
    );

    processor
        .process_chunk("<file path=\"main.py\">\nprint('hi')\n</fi")
        .await;
    assert_eq!(processor.open_block(), Some(TagKind::File));

    let result = processor.finalize().await;

    assert_eq!(result.files_written, vec!["src/main.py"]);
    assert_eq!(
        writer.written(),
        vec![("src/main.py".to_string(), "print('hi')".to_string())]
    );
    assert_eq!(processor.open_block(), None);
    assert_eq!(processor.pending_text(), "");
}

#[tokio::test]
async fn empty_open_file_is_discarded() {
    let writer = Arc::new(MemoryWriter::default());
    let mut processor = processor_with(
        &ParserConfig::default(),
        Arc::clone(&writer),
        task_registry(),
    );

    let events = run_chunks(&mut processor, &["<file path=\"empty.rs\">\n  \n"]).await;

    assert_eq!(types(&events), vec!["file_start"]);
    assert!(writer.written().is_empty());
    assert_eq!(processor.result().total_files, 0);
}

#[tokio::test]
async fn open_message_and_plan_are_flushed() {
    let mut processor = processor_with(
        &ParserConfig::default(),
        Arc::new(MemoryWriter::default()),
        task_registry(),
    );

    let events = run_chunks(&mut processor, &["<message>Done soon"]).await;
    assert_eq!(
        events,
        vec![EventPayload::Message {
            text: "Done soon".into()
        }]
    );

    let mut processor = processor_with(
        &ParserConfig::default(),
        Arc::new(MemoryWriter::default()),
        task_registry(),
    );
    let events = run_chunks(&mut processor, &["<plan>1. Ship it</"]).await;
    assert_eq!(
        events.last(),
        Some(&EventPayload::Plan {
            text: "1. Ship it".into()
        })
    );
}

#[tokio::test]
async fn open_action_is_not_executed() {
    let mut processor = processor_with(
        &ParserConfig::default(),
        Arc::new(MemoryWriter::default()),
        task_registry(),
    );

    let events = run_chunks(
        &mut processor,
        &["<action module=\"tasks\" action=\"create\">[\"Buy milk\"]"],
    )
    .await;

    assert!(events.is_empty());
    assert!(!processor.result().has_errors());
}

#[tokio::test]
async fn partial_open_tag_at_end_is_dropped() {
    let writer = Arc::new(MemoryWriter::default());
    let mut processor = processor_with(
        &ParserConfig::default(),
        Arc::clone(&writer),
        task_registry(),
    );

    let events = run_chunks(
        &mut processor,
        &["<message>Hi</message>\n<file path=\"late.rs\""],
    )
    .await;

    assert_eq!(types(&events), vec!["message"]);
    assert!(writer.written().is_empty());
}

#[tokio::test]
async fn finalize_is_idempotent() {
    let writer = Arc::new(MemoryWriter::default());
    let mut processor = processor_with(
        &ParserConfig::default(),
        Arc::clone(&writer),
        task_registry(),
    );

    processor.process_chunk("<file path=\"a.rs\">x").await;
    let first = processor.finalize().await;
    let emitted = processor.sink().len();
    let second = processor.finalize().await;

    assert_eq!(first, second);
    assert_eq!(processor.sink().len(), emitted);
    assert_eq!(writer.written().len(), 1);
}

#[tokio::test]
async fn finalized_file_deltas_reconstruct_content() {
    let writer = Arc::new(MemoryWriter::default());
    let mut processor = processor_with(
        &ParserConfig::default(),
        Arc::clone(&writer),
        task_registry(),
    );

    let events = run_chunks(
        &mut processor,
        &["<file path=\"a.rs\">\nfn a", "() {}\n", "</fi"],
    )
    .await;

    let streamed: String = events
        .iter()
        .filter_map(|e| match e {
            EventPayload::FileContentDelta { delta, .. } => Some(delta.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(streamed, "fn a() {}");
    assert_eq!(
        writer.written(),
        vec![("src/a.rs".to_string(), "fn a() {}".to_string())]
    );
}

#[tokio::test]
async fn blocks_after_unfinished_tag_are_processed_at_finalize() {
    let writer = Arc::new(MemoryWriter::default());
    let mut processor = processor_with(
        &ParserConfig::default(),
        Arc::clone(&writer),
        task_registry(),
    );

    let events = run_chunks(
        &mut processor,
        &[
            "Try <file path='notes <message>Hi</message>",
            "<file path=\"b.rs\">fn b() {}</file>",
        ],
    )
    .await;

    assert_eq!(
        types(&complete_events(&events)),
        vec!["message", "file_start", "file_complete"]
    );
    assert_eq!(processor.result().files_written, vec!["src/b.rs"]);
    assert_eq!(writer.written().len(), 1);
}
