//! API error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::db::repositories::RepositoryError;
use crate::services::{MessageQueueError, ServiceError};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Message queue error: {0}")]
    MessageQueueError(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => ApiError::NotFound(format!("Item not found: {}", id)),
            RepositoryError::InvalidToken(msg) => {
                ApiError::InvalidRequest(format!("Invalid nextToken: {}", msg))
            }
            other => ApiError::DatabaseError(other.to_string()),
        }
    }
}

impl From<MessageQueueError> for ApiError {
    fn from(err: MessageQueueError) -> Self {
        ApiError::MessageQueueError(err.to_string())
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Repository(e) => e.into(),
            ServiceError::MessageQueue(e) => e.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut errors = Vec::new();
        let (status, error_type, message) = match self {
            ApiError::InvalidRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                msg,
            ),
            ApiError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                "not_found_error",
                msg,
            ),
            ApiError::Validation(messages) => {
                let message = messages.join(", ");
                errors = messages;
                (StatusCode::UNPROCESSABLE_ENTITY, "validation_error", message)
            }
            ApiError::DatabaseError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "api_error",
                msg,
            ),
            ApiError::MessageQueueError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "api_error",
                msg,
            ),
            ApiError::Internal(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "api_error",
                err.to_string(),
            ),
        };

        if status.is_server_error() {
            tracing::error!(status = %status.as_u16(), error = %message, "Request failed");
        }

        let body = Json(ErrorResponse {
            type_: "error".to_string(),
            error: ErrorDetail {
                type_: error_type.to_string(),
                message,
            },
            errors,
        });

        (status, body).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    #[serde(rename = "type")]
    type_: String,
    error: ErrorDetail,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
}

#[derive(Serialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    type_: String,
    message: String,
}
