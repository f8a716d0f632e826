//! Message and plan extractor.
//!
//! Both directives carry free-form text and differ only in tag and event
//! names, so one extractor serves both.

use super::events::{EventPayload, EventSink};

/// Which free-form directive an extractor handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    Message,
    Plan,
}

impl TextKind {
    fn delta_event(self, delta: &str) -> EventPayload {
        let delta = delta.to_string();
        match self {
            Self::Message => EventPayload::MessageDelta { delta },
            Self::Plan => EventPayload::PlanStreaming { delta },
        }
    }

    fn complete_event(self, text: &str) -> EventPayload {
        let text = text.to_string();
        match self {
            Self::Message => EventPayload::Message { text },
            Self::Plan => EventPayload::Plan { text },
        }
    }
}

/// Tracks how much of a growing block has already been emitted.
///
/// Callers pass the *stable* content of the block (what is guaranteed to be a
/// prefix of the final content), so successive deltas never overlap or leave
/// gaps.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeltaTracker {
    emitted: usize,
}

impl DeltaTracker {
    /// Bytes of content emitted so far.
    #[must_use]
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Return the part of `stable` not yet emitted and mark it emitted.
    pub fn advance<'a>(&mut self, stable: &'a str) -> Option<&'a str> {
        if stable.len() <= self.emitted || !stable.is_char_boundary(self.emitted) {
            return None;
        }
        let delta = &stable[self.emitted..];
        self.emitted = stable.len();
        Some(delta)
    }

    /// Start counting from zero for the next block.
    pub fn reset(&mut self) {
        self.emitted = 0;
    }
}

/// Extractor for `<message>` or `<plan>` blocks.
#[derive(Debug, Clone)]
pub struct TextExtractor {
    kind: TextKind,
    min_partial_len: usize,
    tracker: DeltaTracker,
}

impl TextExtractor {
    /// Create an extractor for `kind`.
    #[must_use]
    pub fn new(kind: TextKind, min_partial_len: usize) -> Self {
        Self {
            kind,
            min_partial_len,
            tracker: DeltaTracker::default(),
        }
    }

    /// Begin a new block.
    pub fn open(&mut self) {
        tracing::debug!(kind = ?self.kind, "Text block opened");
        self.tracker.reset();
    }

    /// Report progress of the open block.
    ///
    /// `partial` is the block content received so far, without any trailing
    /// text that could be the start of the close tag.
    pub fn progress(&mut self, partial: &str, sink: &mut impl EventSink) {
        // Trailing whitespace is held back until it is followed by text,
        // since the final content is trimmed.
        let stable = partial.trim();
        if self.tracker.emitted() == 0 && stable.chars().count() <= self.min_partial_len {
            return;
        }
        if let Some(delta) = self.tracker.advance(stable) {
            sink.emit_payload(self.kind.delta_event(delta));
        }
    }

    /// Close the block with its full raw content.
    ///
    /// Returns the trimmed text if a completion event was emitted.
    pub fn complete(&mut self, raw: &str, sink: &mut impl EventSink) -> Option<String> {
        let text = raw.trim();
        if self.tracker.emitted() > 0 {
            if let Some(delta) = self.tracker.advance(text) {
                sink.emit_payload(self.kind.delta_event(delta));
            }
        }
        self.tracker.reset();

        if text.is_empty() {
            tracing::debug!(kind = ?self.kind, "Empty text block ignored");
            return None;
        }
        sink.emit_payload(self.kind.complete_event(text));
        Some(text.to_string())
    }
}
