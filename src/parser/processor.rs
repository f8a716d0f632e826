//! Incremental directive processor.
//!
//! Consumes model output as arbitrarily split text chunks and drives the
//! message, file, action and plan extractors over a single buffer. Blocks
//! are handled in document order: the earliest open tag in the buffer wins,
//! and once a block is open its content is opaque until its own close tag.

use std::sync::Arc;

use super::action::ActionExtractor;
use super::buffer::StreamBuffer;
use super::events::{EventPayload, EventSink};
use super::file::{file_content, FileExtractor};
use super::tags::{self, OpenTag, TagKind, TagScan};
use super::text::{TextExtractor, TextKind};
use super::GenerationResult;
use crate::config::ParserConfig;
use crate::dispatch::{CapabilityRegistry, FileWriter};

/// Streaming parser for one generation.
///
/// Chunks must be fed in arrival order; each call to
/// [`StreamProcessor::process_chunk`] completes its whole extraction pass,
/// including awaited side effects, before returning.
pub struct StreamProcessor<S: EventSink> {
    buffer: StreamBuffer,
    /// Kind of the block currently open, if any.
    active: Option<TagKind>,
    /// Offset in `buffer` before which the active close tag cannot start.
    close_scan_from: usize,
    message: TextExtractor,
    plan: TextExtractor,
    file: FileExtractor,
    action: ActionExtractor,
    writer: Arc<dyn FileWriter>,
    registry: Arc<CapabilityRegistry>,
    result: GenerationResult,
    sink: S,
    finished: bool,
}

impl<S: EventSink> StreamProcessor<S> {
    /// Create a processor that reports to `sink`.
    #[must_use]
    pub fn new(
        config: &ParserConfig,
        writer: Arc<dyn FileWriter>,
        registry: Arc<CapabilityRegistry>,
        sink: S,
    ) -> Self {
        Self {
            buffer: StreamBuffer::new(),
            active: None,
            close_scan_from: 0,
            message: TextExtractor::new(TextKind::Message, config.min_partial_len),
            plan: TextExtractor::new(TextKind::Plan, config.min_partial_len),
            file: FileExtractor::new(config.streaming),
            action: ActionExtractor::new(),
            writer,
            registry,
            result: GenerationResult::default(),
            sink,
            finished: false,
        }
    }

    /// Feed the next text fragment.
    pub async fn process_chunk(&mut self, chunk: &str) {
        if self.finished {
            tracing::warn!("Chunk received after the generation finished, ignoring");
            return;
        }
        if chunk.is_empty() {
            return;
        }
        self.buffer.append(chunk);
        self.extract().await;
    }

    /// Flush any block left open by the end of the stream and return the
    /// aggregate result.
    ///
    /// An open message, plan or non-empty file block is completed as if its
    /// close tag had arrived. An open action block is left unexecuted.
    /// Calling this more than once returns the same result without emitting
    /// anything further.
    pub async fn finalize(&mut self) -> GenerationResult {
        if self.finished {
            return self.result.clone();
        }
        self.finished = true;
        self.extract().await;

        if let Some(kind) = self.active.take() {
            let raw = self.unterminated_content(kind).to_string();
            match kind {
                TagKind::Action => self.action.abandon(),
                TagKind::File if file_content(&raw).is_empty() => {
                    self.buffer.clear();
                    self.file.discard();
                }
                _ => {
                    tracing::debug!(kind = %kind, "Completing unclosed block at end of stream");
                    self.buffer.clear();
                    self.complete(kind, &raw).await;
                }
            }
        }

        tracing::debug!(
            files = self.result.total_files,
            errors = self.result.errors.len(),
            "Generation finalized"
        );
        self.result.clone()
    }

    /// Report an upstream failure and stop accepting chunks.
    pub fn fail(&mut self, message: &str) {
        self.finished = true;
        self.sink.emit_payload(EventPayload::Error {
            message: message.to_string(),
        });
    }

    /// Result accumulated so far.
    #[must_use]
    pub fn result(&self) -> &GenerationResult {
        &self.result
    }

    /// Text received but not yet attributed to a completed block.
    #[must_use]
    pub fn pending_text(&self) -> &str {
        self.buffer.as_str()
    }

    /// Kind of the block currently open, if any.
    #[must_use]
    pub fn open_block(&self) -> Option<TagKind> {
        self.active
    }

    /// The event sink.
    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consume the processor, returning its sink.
    #[must_use]
    pub fn into_sink(self) -> S {
        self.sink
    }

    async fn extract(&mut self) {
        loop {
            let Some(kind) = self.active else {
                if self.open_next() {
                    continue;
                }
                break;
            };

            let close = kind.close_tag();
            if let Some(index) = tags::find_from(self.buffer.as_str(), close, self.close_scan_from)
            {
                let raw = self.buffer.as_str()[..index].to_string();
                self.buffer.consume(index + close.len());
                self.active = None;
                self.close_scan_from = 0;
                self.complete(kind, &raw).await;
            } else {
                let text = self.buffer.as_str();
                let content_end = text.len() - tags::partial_suffix_len(text, close);
                self.close_scan_from = content_end;
                self.progress(kind, content_end);
                break;
            }
        }
    }

    /// Open the earliest complete tag in the buffer. Returns whether a block
    /// was opened.
    ///
    /// Once finished, no more text will arrive, so an unfinished tag is
    /// skipped rather than waited on.
    fn open_next(&mut self) -> bool {
        let text = self.buffer.as_str();
        let scan = if self.finished {
            tags::scan_final(text)
        } else {
            tags::scan_open_tag(text)
        };
        let (consumed, tag) = match scan {
            TagScan::Complete(tag) => (tag.start, Some(tag)),
            TagScan::Pending { start } => (start, None),
            TagScan::NotFound => (self.buffer.len(), None),
        };

        let stray = self.buffer.as_str()[..consumed].trim();
        if !stray.is_empty() {
            tracing::trace!(bytes = stray.len(), "Discarding text outside directives");
        }

        match tag {
            Some(tag) => {
                self.buffer.consume(tag.end);
                self.start_block(&tag);
                true
            }
            None => {
                self.buffer.consume(consumed);
                false
            }
        }
    }

    fn start_block(&mut self, tag: &OpenTag) {
        match tag.kind {
            TagKind::Message => self.message.open(),
            TagKind::Plan => self.plan.open(),
            TagKind::File => {
                self.file.open(tag, self.writer.as_ref(), &mut self.sink);
            }
            TagKind::Action => self.action.open(tag),
        }
        self.active = Some(tag.kind);
        self.close_scan_from = 0;
    }

    fn progress(&mut self, kind: TagKind, content_end: usize) {
        let partial = &self.buffer.as_str()[..content_end];
        match kind {
            TagKind::Message => self.message.progress(partial, &mut self.sink),
            TagKind::Plan => self.plan.progress(partial, &mut self.sink),
            TagKind::File => self.file.progress(partial, &mut self.sink),
            TagKind::Action => {}
        }
    }

    async fn complete(&mut self, kind: TagKind, raw: &str) {
        match kind {
            TagKind::Message => {
                self.message.complete(raw, &mut self.sink);
            }
            TagKind::Plan => {
                self.plan.complete(raw, &mut self.sink);
            }
            TagKind::File => {
                self.file
                    .complete(raw, self.writer.as_ref(), &mut self.result, &mut self.sink)
                    .await;
            }
            TagKind::Action => {
                self.action
                    .complete(raw, &self.registry, &mut self.result, &mut self.sink)
                    .await;
            }
        }
    }

    /// Content of a block the stream ended inside, minus a dangling `</...`.
    fn unterminated_content(&self, kind: TagKind) -> &str {
        let text = self.buffer.as_str();
        match tags::partial_suffix_len(text, kind.close_tag()) {
            held if held >= 2 => &text[..text.len() - held],
            _ => text,
        }
    }
}
