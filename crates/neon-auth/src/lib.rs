//! # Neon Clicker Session Gateway
//!
//! Turns an `Authorization` header into a ledger identity.
//!
//! ```text
//!   Authorization: Bearer session_...   ──► SessionTable (DashMap ─► LedgerStore)
//!   Authorization: tma <launch data>    ──► HMAC-SHA256 check ─► mint session
//!   (none, guest mode on)               ──► "guest"
//! ```
//!
//! Clients that receive a 401 retry once with fresh launch data; the gateway
//! itself never retries.

pub mod error;
pub mod gateway;
pub mod session;
pub mod telegram;

pub use error::{AuthError, Result};
pub use gateway::{AuthGateway, Authenticated, GatewayConfig};
pub use session::SessionTable;
pub use telegram::{parse_init_data_unverified, sign_init_data, verify_init_data, LaunchData};
