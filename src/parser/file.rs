//! File block extractor.
//!
//! A file block moves Idle -> Open when its open tag arrives and back to
//! Idle when the close tag arrives (or at finalize). A failed write is
//! reported as `file_error` and still returns the extractor to Idle.

use super::events::{EventPayload, EventSink};
use super::tags::OpenTag;
use super::text::DeltaTracker;
use super::GenerationResult;
use crate::config::StreamingMode;
use crate::dispatch::FileWriter;

/// Strip the tag-format padding from raw file content.
///
/// Drops one leading run of newlines (authors write `>\n` after the open
/// tag) and all trailing whitespace.
#[must_use]
pub fn file_content(raw: &str) -> &str {
    raw.trim_start_matches(['\r', '\n']).trim_end()
}

/// State of the currently open file block.
#[derive(Debug, Clone)]
struct OpenFile {
    /// Normalized path, or the raw path if normalization failed.
    path: String,
    description: Option<String>,
    /// Why the path cannot be written, if it cannot.
    invalid: Option<String>,
}

/// Extractor for `<file path="..." description="...">` blocks.
#[derive(Debug, Clone)]
pub struct FileExtractor {
    mode: StreamingMode,
    open: Option<OpenFile>,
    tracker: DeltaTracker,
}

impl FileExtractor {
    /// Create an idle extractor.
    #[must_use]
    pub fn new(mode: StreamingMode) -> Self {
        Self {
            mode,
            open: None,
            tracker: DeltaTracker::default(),
        }
    }

    /// Transition Idle -> Open.
    ///
    /// A second open tag while a file is already open is ignored; files are
    /// never interleaved. Returns whether the block was opened.
    pub fn open(
        &mut self,
        tag: &OpenTag,
        writer: &dyn FileWriter,
        sink: &mut impl EventSink,
    ) -> bool {
        if let Some(current) = &self.open {
            tracing::debug!(open = %current.path, "Ignoring file tag while a file is open");
            return false;
        }

        let raw_path = tag.attribute("path").unwrap_or_default();
        let description = tag.attribute("description").map(str::to_string);
        let (path, invalid) = match writer.resolve(raw_path) {
            Ok(path) => (path, None),
            Err(e) => {
                tracing::warn!(path = raw_path, error = %e, "File path rejected");
                (raw_path.to_string(), Some(e.to_string()))
            }
        };

        tracing::debug!(path = %path, "File block opened");
        sink.emit_payload(EventPayload::FileStart {
            status: format!("Creating {path}..."),
            path: path.clone(),
            description: description.clone(),
        });

        self.tracker.reset();
        self.open = Some(OpenFile {
            path,
            description,
            invalid,
        });
        true
    }

    /// Report progress of the open block.
    ///
    /// `partial` is the content received so far, without any trailing text
    /// that could be the start of `</file>`.
    pub fn progress(&mut self, partial: &str, sink: &mut impl EventSink) {
        let Some(file) = &self.open else {
            return;
        };
        let stable = file_content(partial);
        let Some(delta) = self.tracker.advance(stable) else {
            return;
        };

        let payload = match self.mode {
            StreamingMode::Delta => EventPayload::FileContentDelta {
                path: file.path.clone(),
                delta: delta.to_string(),
            },
            StreamingMode::Snapshot => EventPayload::FileStreaming {
                path: file.path.clone(),
                content: stable.to_string(),
            },
        };
        sink.emit_payload(payload);
    }

    /// Transition Open -> Idle, writing the block's content.
    ///
    /// Write failures are recorded in `result` and reported as `file_error`;
    /// they never propagate.
    pub async fn complete(
        &mut self,
        raw: &str,
        writer: &dyn FileWriter,
        result: &mut GenerationResult,
        sink: &mut impl EventSink,
    ) {
        let Some(file) = self.open.take() else {
            return;
        };
        let content = file_content(raw);

        if self.mode == StreamingMode::Delta && self.tracker.emitted() > 0 {
            if let Some(delta) = self.tracker.advance(content) {
                sink.emit_payload(EventPayload::FileContentDelta {
                    path: file.path.clone(),
                    delta: delta.to_string(),
                });
            }
        }
        self.tracker.reset();

        let outcome = match file.invalid {
            Some(error) => Err(error),
            None => writer
                .write(&file.path, content)
                .await
                .map_err(|e| e.to_string()),
        };

        match outcome {
            Ok(()) => {
                result.record_file(&file.path);
                sink.emit_payload(EventPayload::FileComplete {
                    path: file.path,
                    content: content.to_string(),
                    description: file.description,
                });
            }
            Err(error) => {
                tracing::warn!(path = %file.path, error = %error, "File write failed");
                result.record_error(format!("{}: {error}", file.path));
                sink.emit_payload(EventPayload::FileError {
                    path: file.path,
                    error,
                });
            }
        }
    }

    /// Abandon the open block without writing it.
    pub fn discard(&mut self) {
        if let Some(file) = self.open.take() {
            tracing::warn!(path = %file.path, "Discarding empty unclosed file block");
        }
        self.tracker.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_content_strips_leading_newlines_only() {
        assert_eq!(file_content("\n  indented\n"), "  indented");
        assert_eq!(file_content("\r\n\r\nfn main() {}\n\n"), "fn main() {}");
        assert_eq!(file_content("hello"), "hello");
        assert_eq!(file_content("\n\n \n"), "");
    }

    #[test]
    fn test_file_content_is_idempotent() {
        let once = file_content("\n\nline one\nline two  \n\t");
        assert_eq!(file_content(once), once);
    }
}
