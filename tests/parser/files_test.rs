//! File block handling: streaming modes, write failures and nesting.

use std::sync::Arc;

use codegen_stream::config::{ParserConfig, StreamingMode};
use codegen_stream::dispatch::CapabilityRegistry;
use codegen_stream::parser::EventPayload;

use super::{processor_with, run_chunks, types, MemoryWriter};

#[tokio::test]
async fn delta_mode_streams_new_content_only() {
    let writer = Arc::new(MemoryWriter::default());
    let mut processor = processor_with(
        &ParserConfig::default(),
        Arc::clone(&writer),
        CapabilityRegistry::new(),
    );

    let events = run_chunks(
        &mut processor,
        &["<file path=\"a.rs\">fn a", "() {}\n", "</file>"],
    )
    .await;

    assert_eq!(
        types(&events),
        vec![
            "file_start",
            "file_content_delta",
            "file_content_delta",
            "file_complete"
        ]
    );
    assert_eq!(
        events[2],
        EventPayload::FileContentDelta {
            path: "src/a.rs".into(),
            delta: "() {}".into()
        }
    );
    assert_eq!(writer.written()[0].1, "fn a() {}");
}

#[tokio::test]
async fn snapshot_mode_reemits_whole_content() {
    let config = ParserConfig {
        streaming: StreamingMode::Snapshot,
        ..ParserConfig::default()
    };
    let writer = Arc::new(MemoryWriter::default());
    let mut processor = processor_with(&config, writer, CapabilityRegistry::new());

    let events = run_chunks(
        &mut processor,
        &["<file path=\"a.rs\">fn a", "() {}\n", "</file>"],
    )
    .await;

    assert_eq!(
        types(&events),
        vec![
            "file_start",
            "file_streaming",
            "file_streaming",
            "file_complete"
        ]
    );
    assert_eq!(
        events[2],
        EventPayload::FileStreaming {
            path: "src/a.rs".into(),
            content: "fn a() {}".into()
        }
    );
}

#[tokio::test]
async fn file_start_carries_description_and_status() {
    let writer = Arc::new(MemoryWriter::default());
    let mut processor = processor_with(
        &ParserConfig::default(),
        writer,
        CapabilityRegistry::new(),
    );

    let events = run_chunks(
        &mut processor,
        &["<file path=\"./src/app.tsx\" description=\"Root component\">x</file>"],
    )
    .await;

    assert_eq!(
        events[0],
        EventPayload::FileStart {
            path: "src/app.tsx".into(),
            description: Some("Root component".into()),
            status: "Creating src/app.tsx...".into(),
        }
    );
}

#[tokio::test]
async fn failed_write_reports_file_error_and_continues() {
    let writer = Arc::new(MemoryWriter::failing_on(&["src/locked.rs"]));
    let mut processor = processor_with(
        &ParserConfig::default(),
        Arc::clone(&writer),
        CapabilityRegistry::new(),
    );

    let events = run_chunks(
        &mut processor,
        &["<file path=\"locked.rs\">a</file><file path=\"ok.rs\">b</file>"],
    )
    .await;
    let result = processor.result();

    assert_eq!(
        types(&events),
        vec!["file_start", "file_error", "file_start", "file_complete"]
    );
    assert_eq!(result.files_written, vec!["src/ok.rs"]);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("src/locked.rs: "));
    assert!(result.errors[0].contains("read-only"));
    assert_eq!(writer.written().len(), 1);
}

#[tokio::test]
async fn escaping_path_is_rejected_without_writing() {
    let writer = Arc::new(MemoryWriter::default());
    let mut processor = processor_with(
        &ParserConfig::default(),
        Arc::clone(&writer),
        CapabilityRegistry::new(),
    );

    let events = run_chunks(&mut processor, &["<file path=\"../etc/passwd\">x</file>"]).await;

    assert_eq!(types(&events), vec!["file_start", "file_error"]);
    assert!(matches!(
        &events[1],
        EventPayload::FileError { path, error }
            if path == "../etc/passwd" && error.contains("Invalid file path")
    ));
    assert!(writer.written().is_empty());
    assert_eq!(processor.result().total_files, 0);
}

#[tokio::test]
async fn nested_file_tag_is_content() {
    let writer = Arc::new(MemoryWriter::default());
    let mut processor = processor_with(
        &ParserConfig::default(),
        Arc::clone(&writer),
        CapabilityRegistry::new(),
    );

    let events = run_chunks(
        &mut processor,
        &["<file path=\"README.md\">Use <file path=\"x\">", " tags</file>"],
    )
    .await;

    assert_eq!(
        types(&events)
            .into_iter()
            .filter(|t| *t == "file_start")
            .count(),
        1
    );
    assert_eq!(
        writer.written(),
        vec![(
            "src/README.md".to_string(),
            "Use <file path=\"x\"> tags".to_string()
        )]
    );
}

#[tokio::test]
async fn file_without_path_is_ignored() {
    let writer = Arc::new(MemoryWriter::default());
    let mut processor = processor_with(
        &ParserConfig::default(),
        Arc::clone(&writer),
        CapabilityRegistry::new(),
    );

    let events = run_chunks(&mut processor, &["<file description=\"x\">body</file>"]).await;

    assert!(events.is_empty());
    assert!(writer.written().is_empty());
}
