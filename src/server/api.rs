//! Request and response types for the generation HTTP endpoints.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Query parameters for GET /api/generate.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateQuery {
    /// What to generate.
    #[serde(default)]
    pub prompt: String,
}

/// Response for GET /api/generate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    /// Id to poll or subscribe with.
    pub generation_id: Uuid,
}

/// Response for command endpoints (POST /api/generations/:id/cancel).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    /// Whether the command was successful.
    pub success: bool,
    /// Message describing the result.
    pub message: String,
    /// Optional error details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResponse {
    /// Create a success response.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            error: None,
        }
    }

    /// Create an error response.
    #[must_use]
    pub fn error(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error: Some(error.into()),
        }
    }
}
