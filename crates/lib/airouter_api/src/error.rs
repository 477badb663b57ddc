//! Application error types.
//!
//! Only errors raised before a generation stream opens become `AppError`s.
//! Once the relay has committed the response headers, failures are reported
//! in-band by [`crate::relay`] instead.

use airouter_core::auth::AuthError;
use airouter_core::providers::ProviderError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::relay::RelayError;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// JSON body of every pre-stream error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Streaming unsupported!")]
    StreamingUnsupported,

    #[error("Provider failure: {0}")]
    Provider(String),

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "bad_request", m.clone()),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m.clone()),
            AppError::UnsupportedPlatform(p) => (
                StatusCode::BAD_REQUEST,
                "unsupported_platform",
                format!("unsupported platform: {p}"),
            ),
            AppError::StreamingUnsupported => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "streaming_unsupported",
                "Streaming unsupported!".to_string(),
            ),
            AppError::Provider(m) => (StatusCode::BAD_GATEWAY, "provider_failure", m.clone()),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error".to_string(),
            ),
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message,
        });
        (status, body).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::TokenInvalid(msg) => AppError::Unauthorized(msg),
            AuthError::IdentityNotFound(id) => {
                AppError::Unauthorized(format!("user not found: {id}"))
            }
            AuthError::TokenError(msg) => AppError::Internal(msg),
            AuthError::DbError(e) => AppError::Internal(e.to_string()),
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<ProviderError> for AppError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::UnsupportedPlatform(p) => AppError::UnsupportedPlatform(p),
            other => AppError::Provider(other.to_string()),
        }
    }
}

impl From<RelayError> for AppError {
    fn from(e: RelayError) -> Self {
        match e {
            RelayError::StreamingUnsupported => AppError::StreamingUnsupported,
            RelayError::Disconnected => AppError::Internal(e.to_string()),
        }
    }
}
