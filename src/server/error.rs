//! Server error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

use super::api::CommandResponse;

/// Errors that can occur while running the server.
#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("Failed to bind to {address}: {source}")]
    BindError {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Server error.
    #[error("Server error: {0}")]
    ServeError(#[from] std::io::Error),
}

/// Errors returned by request handlers.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ApiError {
    /// No generation with this id is stored.
    #[error("Generation {0} not found")]
    NotFound(Uuid),

    /// The request was malformed.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = CommandResponse::error("Request failed", self.to_string());
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_error_display() {
        let io_error = std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use");
        let error = ServerError::BindError {
            address: "127.0.0.1:3000".to_string(),
            source: io_error,
        };
        assert!(error
            .to_string()
            .contains("Failed to bind to 127.0.0.1:3000"));
        assert!(error.to_string().contains("address in use"));
    }

    #[test]
    fn test_api_error_status() {
        assert_eq!(
            ApiError::NotFound(Uuid::nil()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::BadRequest("empty prompt".into())
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_not_found_display() {
        let error = ApiError::NotFound(Uuid::nil());
        assert_eq!(
            error.to_string(),
            "Generation 00000000-0000-0000-0000-000000000000 not found"
        );
    }
}
