//! Error types for the session gateway

use neon_storage::StorageError;
use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, AuthError>;

/// Authentication failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing credentials")]
    MissingCredentials,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Credentials expired")]
    Expired,

    #[error("Malformed launch data: {0}")]
    Malformed(String),

    #[error("Session storage error: {0}")]
    Storage(String),
}

impl AuthError {
    /// Failures the client can fix by re-authenticating
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }

    /// Short machine-readable reason
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingCredentials => "missing_credentials",
            Self::InvalidSignature => "invalid_signature",
            Self::Expired => "expired",
            Self::Malformed(_) => "malformed",
            Self::Storage(_) => "storage",
        }
    }
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}
