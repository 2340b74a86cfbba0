//! HTTP error mapping.
//!
//! `ApiError` implements `IntoResponse` so handlers can return
//! `Result<_, ApiError>` and use `?` on core service calls. Every error body
//! has the same shape: `{ "error": kind, "message": text }`.

use crate::errors::Error;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::SqlErr;
use serde::{Deserialize, Serialize};
use tracing::error;

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable kind (e.g., `not_found`)
    pub error: String,
    /// Human-readable message
    pub message: String,
}

/// Errors returned by HTTP handlers
#[derive(Debug)]
pub enum ApiError {
    /// 400
    BadRequest(String),
    /// 404
    NotFound(String),
    /// 409
    Conflict(String),
    /// 500; the message is logged, not returned
    Internal(String),
}

impl ApiError {
    /// Creates a 400 error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Creates a 404 error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation { .. }
            | Error::Duplicate { .. }
            | Error::HasDependents { .. }
            | Error::InvalidReference { .. } => Self::BadRequest(err.to_string()),
            Error::NotFound { .. } => Self::NotFound(err.to_string()),
            Error::Database(ref db_err) => match db_err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(msg)) => {
                    Self::Conflict(format!("Unique constraint violated: {msg}"))
                }
                Some(SqlErr::ForeignKeyConstraintViolation(msg)) => {
                    Self::BadRequest(format!("Foreign key constraint violated: {msg}"))
                }
                _ => Self::Internal(err.to_string()),
            },
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            Self::Internal(msg) => {
                error!(error = %msg, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An unexpected error occurred".to_string(),
                )
            }
        };

        let body = ErrorResponse {
            error: kind.to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for handlers
pub type ApiResult<T> = std::result::Result<T, ApiError>;
