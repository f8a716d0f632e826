//! Directive events emitted while a generation streams.
//!
//! Consumers (terminal display, polling store, SSE clients) treat the
//! emitted events as an append-only, strictly ordered log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Payload of a directive event, tagged by event type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// A complete `<message>` block.
    Message { text: String },
    /// Newly streamed text of an open `<message>` block.
    MessageDelta { delta: String },
    /// A `<file>` block was opened.
    FileStart {
        path: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        status: String,
    },
    /// Full partial content of an open `<file>` block.
    FileStreaming { path: String, content: String },
    /// Newly streamed content of an open `<file>` block.
    FileContentDelta { path: String, delta: String },
    /// A `<file>` block closed and was written.
    FileComplete {
        path: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    /// A `<file>` block could not be written.
    FileError { path: String, error: String },
    /// An `<action>` call is about to be made.
    ActionStart {
        module: String,
        action: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    /// An `<action>` call returned.
    ActionComplete {
        module: String,
        action: String,
        result: serde_json::Value,
    },
    /// An `<action>` was malformed or its call failed.
    ActionError {
        module: String,
        action: String,
        error: String,
    },
    /// A complete `<plan>` block.
    Plan { text: String },
    /// Newly streamed text of an open `<plan>` block.
    PlanStreaming { delta: String },
    /// The upstream stream failed; the generation is aborted.
    Error { message: String },
}

impl EventPayload {
    /// Event type name as seen by consumers.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::MessageDelta { .. } => "message_delta",
            Self::FileStart { .. } => "file_start",
            Self::FileStreaming { .. } => "file_streaming",
            Self::FileContentDelta { .. } => "file_content_delta",
            Self::FileComplete { .. } => "file_complete",
            Self::FileError { .. } => "file_error",
            Self::ActionStart { .. } => "action_start",
            Self::ActionComplete { .. } => "action_complete",
            Self::ActionError { .. } => "action_error",
            Self::Plan { .. } => "plan",
            Self::PlanStreaming { .. } => "plan_streaming",
            Self::Error { .. } => "error",
        }
    }

    /// Returns true for events that finalize a block.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Message { .. }
                | Self::FileComplete { .. }
                | Self::FileError { .. }
                | Self::ActionComplete { .. }
                | Self::ActionError { .. }
                | Self::Plan { .. }
        )
    }
}

/// A timestamped directive event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectiveEvent {
    /// When the event was produced.
    pub timestamp: DateTime<Utc>,
    /// Event payload.
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl DirectiveEvent {
    /// Create an event stamped with the current time.
    #[must_use]
    pub fn new(payload: EventPayload) -> Self {
        Self {
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Event type name.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        self.payload.event_type()
    }
}

/// Receiver of directive events.
///
/// Emission is fire-and-forget: a sink must not fail back into the parser.
pub trait EventSink: Send {
    /// Receive one event.
    fn emit(&mut self, event: DirectiveEvent);

    /// Convenience wrapper that stamps and emits a payload.
    fn emit_payload(&mut self, payload: EventPayload) {
        self.emit(DirectiveEvent::new(payload));
    }
}

impl EventSink for Vec<DirectiveEvent> {
    fn emit(&mut self, event: DirectiveEvent) {
        self.push(event);
    }
}

impl EventSink for mpsc::UnboundedSender<DirectiveEvent> {
    fn emit(&mut self, event: DirectiveEvent) {
        if self.send(event).is_err() {
            tracing::trace!("Event receiver dropped");
        }
    }
}
