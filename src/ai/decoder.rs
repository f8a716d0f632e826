//! Incremental server-sent-events decoder for provider text streams.
//!
//! Bytes arrive in arbitrary chunks, so lines (and multi-byte UTF-8
//! sequences) may be split anywhere. Only complete lines are decoded.

use serde_json::Value;

/// One decoded unit of a provider stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    /// A fragment of model output text.
    Text(String),
    /// The provider signalled the end of the response.
    Done,
    /// The provider reported an error mid-stream.
    Error(String),
}

/// Stateful SSE decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    event_type: Option<String>,
    data: String,
}

impl SseDecoder {
    /// Create an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning every frame completed by them.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<StreamFrame> {
        self.pending.extend_from_slice(bytes);
        let mut frames = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            self.handle_line(line.trim_end_matches(['\n', '\r']), &mut frames);
        }
        frames
    }

    /// Flush a trailing event that was not followed by a blank line.
    pub fn finish(&mut self) -> Vec<StreamFrame> {
        let mut frames = Vec::new();
        if !self.pending.is_empty() {
            let line = String::from_utf8_lossy(&self.pending).into_owned();
            self.pending.clear();
            self.handle_line(line.trim_end_matches('\r'), &mut frames);
        }
        self.dispatch(&mut frames);
        frames
    }

    fn handle_line(&mut self, line: &str, frames: &mut Vec<StreamFrame>) {
        if line.is_empty() {
            self.dispatch(frames);
        } else if let Some(value) = line.strip_prefix("event:") {
            self.event_type = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("data:") {
            if !self.data.is_empty() {
                self.data.push('\n');
            }
            self.data.push_str(value.strip_prefix(' ').unwrap_or(value));
        }
        // Comments (`:`) and unknown fields are ignored.
    }

    fn dispatch(&mut self, frames: &mut Vec<StreamFrame>) {
        let event_type = self.event_type.take();
        if self.data.is_empty() {
            return;
        }
        let data = std::mem::take(&mut self.data);
        if let Some(frame) = interpret(event_type.as_deref(), &data) {
            frames.push(frame);
        }
    }
}

/// Interpret one SSE event payload from any supported provider.
///
/// Anthropic sends `content_block_delta` events with `text_delta` deltas,
/// Gemini sends candidate parts, and OpenAI-compatible servers send
/// `choices[0].delta.content` followed by `[DONE]`.
#[must_use]
pub fn interpret(event_type: Option<&str>, data: &str) -> Option<StreamFrame> {
    let data = data.trim();
    if data == "[DONE]" {
        return Some(StreamFrame::Done);
    }
    let value: Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(error = %e, "Skipping non-JSON SSE payload");
            return None;
        }
    };

    match value.get("type").and_then(Value::as_str).or(event_type) {
        Some("content_block_delta") => value["delta"]["text"]
            .as_str()
            .map(|text| StreamFrame::Text(text.to_string())),
        Some("message_stop") => Some(StreamFrame::Done),
        Some("error") => Some(StreamFrame::Error(error_message(&value))),
        _ if value.get("error").is_some() => Some(StreamFrame::Error(error_message(&value))),
        _ => {
            if let Some(parts) = value["candidates"][0]["content"]["parts"].as_array() {
                let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
                return (!text.is_empty()).then_some(StreamFrame::Text(text));
            }
            value["choices"][0]["delta"]["content"]
                .as_str()
                .filter(|text| !text.is_empty())
                .map(|text| StreamFrame::Text(text.to_string()))
        }
    }
}

fn error_message(value: &Value) -> String {
    value["error"]["message"]
        .as_str()
        .or_else(|| value["error"].as_str())
        .unwrap_or("unknown upstream error")
        .to_string()
}
