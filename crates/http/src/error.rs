//! Error handling for the shelf HTTP layer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use once_cell::sync::OnceCell;
use serde::Serialize;
use thiserror::Error;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use uuid::Uuid;

static EXPOSE_INTERNAL_DETAILS: OnceCell<bool> = OnceCell::new();

/// Decide once, at startup, whether 5xx bodies carry the underlying cause.
/// Later calls are ignored.
pub fn expose_internal_details(expose: bool) {
    let _ = EXPOSE_INTERNAL_DETAILS.set(expose);
}

fn internal_details_exposed() -> bool {
    *EXPOSE_INTERNAL_DETAILS.get_or_init(|| cfg!(debug_assertions))
}

/// Standard error response format for all HTTP errors
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub error: String,
    pub details: Vec<serde_json::Value>,
    pub trace_id: String,
    pub timestamp: String,
}

/// Application error types that map to HTTP responses
#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation error: {message}")]
    Validation {
        details: Vec<serde_json::Value>,
        code: String,
        message: String,
    },

    #[error("invalid state: {message}")]
    InvalidState { message: String, code: String },

    #[error("not found: {message}")]
    NotFound { message: String, code: String },

    #[error("store error: {message}")]
    Store {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Create a validation error
    pub fn validation(details: Vec<serde_json::Value>, message: impl Into<String>) -> Self {
        Self::Validation {
            details,
            code: "validation_error".to_string(),
            message: message.into(),
        }
    }

    /// A state transition whose precondition does not hold
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
            code: "invalid_state".to_string(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            code: "not_found".to_string(),
        }
    }

    /// Persistence or connectivity failure
    pub fn store(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Store {
            message: message.into(),
            source: source.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } | AppError::InvalidState { .. } => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Store { .. } | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.render(internal_details_exposed())
    }
}

impl AppError {
    /// Build the JSON response; `expose` decides whether 5xx bodies carry the cause.
    fn render(self, expose: bool) -> Response {
        let error_id = Uuid::new_v4();
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        let status = self.status();

        let (error_code, message, details) = match self {
            AppError::Validation {
                details,
                code,
                message,
            } => (code, message, details),
            AppError::InvalidState { message, code } | AppError::NotFound { message, code } => {
                (code, message, Vec::new())
            }
            AppError::Store { message, source } => {
                tracing::error!(error_id = %error_id, error = ?source, "store failure");
                ("store_error".to_string(), message, internal_details(&source, expose))
            }
            AppError::Internal(e) => {
                tracing::error!(error_id = %error_id, error = ?e, "unhandled failure");
                (
                    "internal_error".to_string(),
                    "An unexpected error occurred.".to_string(),
                    internal_details(&e, expose),
                )
            }
        };

        tracing::warn!(
            error_id = %error_id,
            error_code = %error_code,
            status_code = %status.as_u16(),
            "Request error"
        );

        let body = ErrorBody {
            message,
            error: error_code,
            details,
            trace_id: error_id.to_string(),
            timestamp,
        };

        (status, Json(body)).into_response()
    }
}

fn internal_details(error: &anyhow::Error, expose: bool) -> Vec<serde_json::Value> {
    if expose {
        vec![serde_json::Value::String(format!("{error:#}"))]
    } else {
        Vec::new()
    }
}

/// Fallback for routes nothing else matched
pub async fn endpoint_not_found() -> AppError {
    AppError::not_found("Endpoint not found.")
}
