//! # Neon Clicker Economics
//!
//! Server-authoritative game rules.
//!
//! ## Components
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | `pricing` | Producer costs, build durations, click power progression |
//! | `build_queue` | Lazy job resolution and piecewise passive production |
//! | `donations` | Donation amounts and goal views |
//! | `leaderboard` | Ranked snapshots with a freshness-bounded cache |
//! | `engine` | `GameEngine`: per-player serialization over the ledger |
//!
//! ## Operation flow
//!
//! ```text
//!   lock player ─► clone ─► settle(now) ─► apply op ─► settle(now) ─► persist ─► swap
//!                                              │
//!                                              └─ rejected: persist settlement only
//! ```

pub mod build_queue;
pub mod donations;
pub mod engine;
pub mod leaderboard;
pub mod pricing;

pub use build_queue::{settle, Settlement};
pub use donations::{donation_amount, DonationReceipt, DonorEntry, GoalDetail, GoalSummary};
pub use engine::{ClickOutcome, GameEngine, PlayerState, PowerInfo, ProducerView, PurchaseOutcome};
pub use leaderboard::{
    LeaderboardCache, LeaderboardConfig, LeaderboardEntry, LeaderboardKind, LeaderboardSnapshot,
};
pub use pricing::{build_duration, next_power, producer_cost, EconomyConfig, EconomyConfigError};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::engine::GameEngine;
    pub use crate::leaderboard::{LeaderboardConfig, LeaderboardKind};
    pub use crate::pricing::EconomyConfig;
}
