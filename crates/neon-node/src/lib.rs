//! # Neon Clicker Node
//!
//! HTTP front of the game: configuration, the axum router, the auth
//! middleware and Prometheus metrics.
//!
//! ```text
//!   request ─► TraceLayer ─► CORS ─► Timeout ─► require_auth ─► handler ─► GameEngine
//!                                                  │
//!                                                  └─ AuthGateway (Bearer / tma)
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod server;

pub use config::{LogFormat, NodeConfig};
pub use error::{ApiError, ServerError};
pub use metrics::GameMetrics;
pub use server::{open_store, router, serve, spawn_session_purge, AppState, SESSION_HEADER};
