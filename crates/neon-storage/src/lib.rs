//! # Neon Clicker Storage
//!
//! Durable backing for the Player Ledger, donation goals and the session table.
//!
//! ## Storage Layout
//!
//! - `players` - one JSON record per player, keyed by user id
//! - `goals` - donation goal totals and contributions
//! - `sessions` - issued bearer sessions with expiry
//!
//! The engine keeps the authoritative copy in memory and writes through to a
//! [`LedgerStore`] before publishing a mutation, so a failed write never leaves
//! a half-applied operation behind.

pub mod memory;
pub mod sqlite;

use neon_core::{GameError, GoalState, Player, Session};
use thiserror::Error;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Result type alias for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors raised by ledger stores
#[derive(Error, Debug)]
pub enum StorageError {
    /// SQLite failure
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Record (de)serialization failure
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Backend refused the write
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<StorageError> for GameError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::Serde(err) => GameError::Serialization(err.to_string()),
            other => GameError::Storage(other.to_string()),
        }
    }
}

/// Persistence seam for the ledger
///
/// Implementations must make `commit_donation` atomic: either both the
/// player and the goal records are written, or neither is.
pub trait LedgerStore: Send + Sync {
    /// Every persisted player
    fn load_players(&self) -> Result<Vec<Player>>;

    /// Insert or replace a player record
    fn save_player(&self, player: &Player) -> Result<()>;

    /// Every persisted goal state
    fn load_goal_states(&self) -> Result<Vec<GoalState>>;

    /// Write a donor and the goal they donated to in one transaction
    fn commit_donation(&self, player: &Player, goal: &GoalState) -> Result<()>;

    /// Insert or replace a session
    fn save_session(&self, session: &Session) -> Result<()>;

    /// Look up a session by id
    fn load_session(&self, session_id: &str) -> Result<Option<Session>>;

    /// Remove a session, no-op if absent
    fn delete_session(&self, session_id: &str) -> Result<()>;

    /// Delete every session that expired before `now`, returning the count
    fn purge_expired_sessions(&self, now: i64) -> Result<usize>;
}
