//! Action block extractor.
//!
//! Actions are only acted on once `</action>` has arrived: a half-received
//! JSON payload cannot be partially applied.

use serde_json::Value;

use super::events::{EventPayload, EventSink};
use super::tags::OpenTag;
use super::GenerationResult;
use crate::dispatch::{ActionError, CapabilityRegistry};

#[derive(Debug, Clone)]
struct PendingAction {
    module: String,
    action: String,
    description: Option<String>,
}

/// Extractor for `<action module="..." action="...">[...]</action>` blocks.
#[derive(Debug, Clone, Default)]
pub struct ActionExtractor {
    pending: Option<PendingAction>,
}

/// Parse an action payload into positional arguments.
///
/// # Errors
///
/// Returns `ActionError::MalformedPayload` if the payload is not a JSON array.
pub fn parse_arguments(payload: &str) -> Result<Vec<Value>, ActionError> {
    match serde_json::from_str::<Value>(payload.trim()) {
        Ok(Value::Array(args)) => Ok(args),
        Ok(other) => Err(ActionError::MalformedPayload(format!(
            "expected a JSON array of arguments, got {}",
            json_type(&other)
        ))),
        Err(e) => Err(ActionError::MalformedPayload(format!("invalid JSON: {e}"))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl ActionExtractor {
    /// Create an idle extractor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the attributes of an action whose payload is still arriving.
    pub fn open(&mut self, tag: &OpenTag) {
        let pending = PendingAction {
            module: tag.attribute("module").unwrap_or_default().to_string(),
            action: tag.attribute("action").unwrap_or_default().to_string(),
            description: tag.attribute("description").map(str::to_string),
        };
        tracing::debug!(module = %pending.module, action = %pending.action, "Action block opened");
        self.pending = Some(pending);
    }

    /// Run the completed action.
    ///
    /// A malformed payload yields `action_error` without calling anything.
    /// A handler failure yields `action_error` after `action_start`. Neither
    /// propagates.
    pub async fn complete(
        &mut self,
        payload: &str,
        registry: &CapabilityRegistry,
        result: &mut GenerationResult,
        sink: &mut impl EventSink,
    ) {
        let Some(PendingAction {
            module,
            action,
            description,
        }) = self.pending.take()
        else {
            return;
        };

        let args = match parse_arguments(payload) {
            Ok(args) => args,
            Err(e) => {
                let error = e.to_string();
                tracing::warn!(%module, %action, %error, "Malformed action payload");
                result.record_error(format!("{module}.{action}: {error}"));
                sink.emit_payload(EventPayload::ActionError {
                    module,
                    action,
                    error,
                });
                return;
            }
        };

        sink.emit_payload(EventPayload::ActionStart {
            module: module.clone(),
            action: action.clone(),
            description,
        });

        match registry.invoke(&module, &action, args).await {
            Ok(value) => {
                tracing::info!(%module, %action, "Action completed");
                sink.emit_payload(EventPayload::ActionComplete {
                    module,
                    action,
                    result: value,
                });
            }
            Err(e) => {
                let error = e.to_string();
                tracing::warn!(%module, %action, %error, "Action failed");
                result.record_error(format!("{module}.{action}: {error}"));
                sink.emit_payload(EventPayload::ActionError {
                    module,
                    action,
                    error,
                });
            }
        }
    }

    /// Drop an action that never received its close tag.
    pub fn abandon(&mut self) {
        if let Some(pending) = self.pending.take() {
            tracing::warn!(
                module = %pending.module,
                action = %pending.action,
                "Unclosed action block left unexecuted"
            );
        }
    }
}
