//! Stream parser tests driven through the public API.

mod actions_test;
mod chunking_test;
mod files_test;
mod finalize_test;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use codegen_stream::config::ParserConfig;
use codegen_stream::dispatch::{normalize_path, CapabilityRegistry, FileWriter, WriteError};
use codegen_stream::parser::{DirectiveEvent, EventPayload, StreamProcessor};

/// Writer that keeps files in memory and can be told to fail on paths.
#[derive(Default)]
pub struct MemoryWriter {
    files: Mutex<Vec<(String, String)>>,
    failing: HashSet<String>,
}

impl MemoryWriter {
    pub fn failing_on(paths: &[&str]) -> Self {
        Self {
            files: Mutex::new(Vec::new()),
            failing: paths.iter().map(|p| (*p).to_string()).collect(),
        }
    }

    pub fn written(&self) -> Vec<(String, String)> {
        self.files.lock().expect("Mutex poisoned").clone()
    }
}

#[async_trait]
impl FileWriter for MemoryWriter {
    fn resolve(&self, path: &str) -> Result<String, WriteError> {
        normalize_path(path, "src")
    }

    async fn write(&self, path: &str, content: &str) -> Result<(), WriteError> {
        if self.failing.contains(path) {
            return Err(WriteError::Io {
                path: path.into(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        self.files
            .lock()
            .expect("Mutex poisoned")
            .push((path.to_string(), content.to_string()));
        Ok(())
    }
}

/// Registry with a `tasks.create` capability echoing its arguments.
pub fn task_registry() -> CapabilityRegistry {
    let mut registry = CapabilityRegistry::new();
    registry
        .register_fn("tasks", "create", |args| async move {
            Ok(serde_json::json!({ "created": args }))
        })
        .expect("Should register");
    registry
}

pub fn processor_with(
    config: &ParserConfig,
    writer: Arc<MemoryWriter>,
    registry: CapabilityRegistry,
) -> StreamProcessor<Vec<DirectiveEvent>> {
    StreamProcessor::new(config, writer, Arc::new(registry), Vec::new())
}

/// Feed `chunks` in order, finalize, and return the events emitted.
pub async fn run_chunks(
    processor: &mut StreamProcessor<Vec<DirectiveEvent>>,
    chunks: &[&str],
) -> Vec<EventPayload> {
    for chunk in chunks {
        processor.process_chunk(chunk).await;
    }
    processor.finalize().await;
    processor.sink().iter().map(|e| e.payload.clone()).collect()
}

/// Events that finalize a block, dropping streaming progress.
pub fn complete_events(events: &[EventPayload]) -> Vec<EventPayload> {
    events
        .iter()
        .filter(|e| {
            !matches!(
                e,
                EventPayload::MessageDelta { .. }
                    | EventPayload::PlanStreaming { .. }
                    | EventPayload::FileContentDelta { .. }
                    | EventPayload::FileStreaming { .. }
            )
        })
        .cloned()
        .collect()
}

pub fn types(events: &[EventPayload]) -> Vec<&'static str> {
    events.iter().map(EventPayload::event_type).collect()
}

/// Verify the parser surface is exported from the library.
#[test]
fn test_parser_types_exported() {
    use codegen_stream::parser::{
        file_content, parse_arguments, GenerationResult, StreamBuffer, TagKind, MAX_OPEN_TAG_LEN,
    };

    let _ = StreamBuffer::new();
    let _ = GenerationResult::default();
    assert_eq!(TagKind::File.close_tag(), "</file>");
    assert_eq!(file_content("\nx\n"), "x");
    assert!(parse_arguments("[]").is_ok());
    assert!(MAX_OPEN_TAG_LEN > 0);
}
