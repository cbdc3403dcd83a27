// crates/server/src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::probe::ProbeError;
use lanscape_core::AdmissionError;

/// Structured JSON error response for API errors
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// API error types that map to HTTP status codes
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error(transparent)]
    Denied(#[from] AdmissionError),

    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            ApiError::ConnectionNotFound(id) => {
                tracing::warn!(connection_id = %id, "Connection not found");
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::new("Connection not found"),
                )
            }
            ApiError::EntityNotFound(id) => {
                tracing::warn!(entity_id = %id, "Entity not found");
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::with_details("Entity not found", id.clone()),
                )
            }
            // Unknown endpoints surface as 404, every other denial as 400
            // with the rule's reason string in the error field.
            ApiError::Denied(AdmissionError::UnknownEntity(id)) => {
                tracing::warn!(entity_id = %id, "Entity not found");
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::with_details("Entity not found", id.clone()),
                )
            }
            ApiError::Denied(reason) => {
                tracing::info!(reason = %reason, "Connection denied");
                (StatusCode::BAD_REQUEST, ErrorResponse::new(reason.to_string()))
            }
            ApiError::Probe(probe_err) => {
                tracing::error!(error = %probe_err, "Probe subsystem fault");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::with_details("Probe failed", probe_err.to_string()),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!(message = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Internal server error"),
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
