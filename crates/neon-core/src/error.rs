//! Error types for Neon Clicker game operations

use thiserror::Error;

/// Result type alias for game operations
pub type Result<T> = std::result::Result<T, GameError>;

/// Errors that can occur in game operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    // === Lookup ===
    /// Producer id is not part of the catalog
    #[error("Producer not found: {0}")]
    UnknownProducer(u32),

    /// Donation goal id is not configured
    #[error("Donation goal not found: {0}")]
    UnknownGoal(u32),

    // === Validation ===
    /// Donation percent outside the allowed set
    #[error("Invalid donation percent: {0}")]
    InvalidPercent(u32),

    // === Business rules ===
    /// Score does not cover the price
    #[error("insufficient score: need {required}, have {available}")]
    InsufficientFunds { required: u64, available: u64 },

    /// A build job already targets the same upgrade or producer
    #[error("build in progress: {time_left}s left")]
    BuildInProgress { time_left: u64 },

    /// Donation amount rounds down to zero
    #[error("nothing to donate")]
    NothingToDonate,

    // === Storage ===
    /// Ledger persistence failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Record encoding failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl GameError {
    /// Get the error code for API responses
    pub fn code(&self) -> u32 {
        match self {
            Self::UnknownProducer(_) => 1002,
            Self::UnknownGoal(_) => 1003,
            Self::InvalidPercent(_) => 1004,
            Self::InsufficientFunds { .. } => 2001,
            Self::BuildInProgress { .. } => 2002,
            Self::NothingToDonate => 2003,
            Self::Storage(_) | Self::Serialization(_) => 9999,
        }
    }

    /// Business-rule rejections are reported with `success: false`
    /// rather than an HTTP error status.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::InsufficientFunds { .. } | Self::BuildInProgress { .. } | Self::NothingToDonate
        )
    }

    /// Client-side input errors
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::UnknownProducer(_) | Self::InvalidPercent(_))
    }

    /// Message shown to the player for a rejected operation
    pub fn client_message(&self) -> &'static str {
        match self {
            Self::InsufficientFunds { .. } => "insufficient score",
            Self::BuildInProgress { .. } => "build in progress",
            Self::NothingToDonate => "nothing to donate",
            Self::UnknownGoal(_) => "not found",
            Self::UnknownProducer(_) | Self::InvalidPercent(_) => "bad request",
            Self::Storage(_) | Self::Serialization(_) => "internal error",
        }
    }
}

impl From<serde_json::Error> for GameError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value.to_string())
    }
}
