//! Server and HTTP error types

use crate::config::ConfigError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use neon_auth::AuthError;
use neon_core::GameError;
use neon_storage::StorageError;
use serde_json::json;
use thiserror::Error;

/// Errors that stop the server from starting or running
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("server io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid listen address: {0}")]
    Address(#[from] std::net::AddrParseError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("ledger error: {0}")]
    Game(#[from] GameError),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Error returned from a handler as `{"error": message, "code": n}`
///
/// `code` is the game error code and is omitted for transport-level errors.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    code: Option<u32>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: None,
        }
    }

    fn with_code(mut self, code: u32) -> Self {
        self.code = Some(code);
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Generic 500; `details` are logged, never sent
    pub fn internal(details: impl std::fmt::Display) -> Self {
        tracing::error!("Internal error: {}", details);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> Option<u32> {
        self.code
    }
}

impl From<GameError> for ApiError {
    fn from(err: GameError) -> Self {
        if matches!(err, GameError::Storage(_) | GameError::Serialization(_)) {
            return Self::internal(err);
        }
        let api = if matches!(err, GameError::UnknownGoal(_)) {
            Self::not_found(err.client_message())
        } else if err.is_validation() {
            Self::bad_request(err.to_string())
        } else {
            // rejections normally become `success: false` bodies in the handler
            Self::bad_request(err.client_message())
        };
        api.with_code(err.code())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        if err.is_client_error() {
            Self::unauthorized("authentication required")
        } else {
            Self::internal(err)
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.code {
            Some(code) => json!({ "error": self.message, "code": code }),
            None => json!({ "error": self.message }),
        };
        (self.status, Json(body)).into_response()
    }
}
