//! # Neon Clicker Core
//!
//! Core data structures for the Neon Clicker game backend.
//!
//! This crate provides the fundamental building blocks:
//! - `Player` - The authoritative per-user ledger record
//! - `BuildJob` - A timed construction gating a click-power or producer purchase
//! - `ProducerSpec` - A purchasable production line from the catalog
//! - `GoalState` - Shared community donation goal with per-player contributions
//!
//! ## Build lifecycle
//!
//! Build jobs are never ticked by a background timer. Every touch of a player
//! resolves the jobs whose `completes_at` has passed, so the state a client
//! sees only depends on the server clock, not on how often it polls.
//!
//! ```text
//!            purchase                 now >= completes_at
//!   Idle ─────────────────► Building ─────────────────────► Idle (+1 applied)
//!     ▲                        │
//!     └── second purchase ─────┘  rejected with BuildInProgress
//! ```

pub mod catalog;
pub mod clock;
pub mod error;
pub mod types;

pub use catalog::*;
pub use clock::*;
pub use error::*;
pub use types::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::catalog::{default_donation_goals, default_producers};
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::error::{GameError, Result};
    pub use crate::types::*;
}
