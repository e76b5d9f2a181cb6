// SPDX-License-Identifier: MIT

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Owner not found: {0}")]
    OwnerNotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Uploaded image is blurry. Please upload a clearer image.")]
    ImageQuality,

    #[error("Uploaded file is not a readable image: {0}")]
    InvalidImageFormat(String),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Brand detection failed: {0}")]
    DetectionFailed(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::RecordNotFound(msg) => {
                (StatusCode::NOT_FOUND, "record_not_found", Some(msg.clone()))
            }
            AppError::OwnerNotFound(msg) => {
                (StatusCode::NOT_FOUND, "owner_not_found", Some(msg.clone()))
            }
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::ImageQuality => (
                StatusCode::BAD_REQUEST,
                "image_quality",
                Some(self.to_string()),
            ),
            AppError::InvalidImageFormat(msg) => (
                StatusCode::BAD_REQUEST,
                "invalid_image_format",
                Some(msg.clone()),
            ),
            AppError::InvalidStateTransition(msg) => (
                StatusCode::CONFLICT,
                "invalid_state_transition",
                Some(msg.clone()),
            ),
            AppError::Storage(msg) => {
                tracing::error!(error = %msg, "Storage error");
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error", None)
            }
            AppError::DetectionFailed(msg) => {
                // Detection normally runs in the background; a handler only sees
                // this if a synchronous detection path failed.
                tracing::error!(error = %msg, "Detection error");
                (StatusCode::BAD_GATEWAY, "detection_failed", None)
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
