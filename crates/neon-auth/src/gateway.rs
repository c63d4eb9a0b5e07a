//! Request authentication

use crate::error::{AuthError, Result};
use crate::session::SessionTable;
use crate::telegram::{parse_init_data_unverified, verify_init_data, LaunchData};
use neon_core::constants::{GUEST_USER_ID, INIT_DATA_MAX_AGE_SECS, SESSION_TTL_SECS};
use neon_core::{Clock, TelegramUser, UserId};
use neon_storage::LedgerStore;
use std::sync::Arc;

/// Gateway settings
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// Bot token used to verify launch data; `None` skips verification
    pub bot_token: Option<String>,
    /// Maximum launch data age in seconds (0 disables the check)
    pub init_data_max_age_secs: i64,
    /// Lifetime of minted sessions
    pub session_ttl_secs: i64,
    /// Treat credential-less requests as the shared guest player
    pub guest_mode: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            init_data_max_age_secs: INIT_DATA_MAX_AGE_SECS,
            session_ttl_secs: SESSION_TTL_SECS,
            guest_mode: false,
        }
    }
}

/// Identity resolved for one request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Authenticated {
    pub user_id: UserId,
    /// Session the client should keep using, absent for guests
    pub session_token: Option<String>,
    /// Whether `session_token` was minted by this request
    pub minted: bool,
    pub telegram_user: Option<TelegramUser>,
}

/// Session/auth gateway
pub struct AuthGateway {
    config: GatewayConfig,
    sessions: SessionTable,
    clock: Arc<dyn Clock>,
}

impl AuthGateway {
    pub fn new(config: GatewayConfig, store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>) -> Self {
        let config = GatewayConfig {
            bot_token: config.bot_token.filter(|token| !token.is_empty()),
            ..config
        };
        if config.bot_token.is_none() {
            tracing::warn!("Bot token not configured, launch data signatures will NOT be verified");
        }
        let sessions = SessionTable::new(store, config.session_ttl_secs);
        Self {
            config,
            sessions,
            clock,
        }
    }

    /// Resolve the `Authorization` header value into an identity
    ///
    /// Accepted forms are `Bearer <session_id>` and `tma <launch data>`.
    pub fn authenticate(&self, header: Option<&str>) -> Result<Authenticated> {
        let now = self.clock.now();
        let header = header.map(str::trim).filter(|h| !h.is_empty());

        match header {
            Some(value) => {
                if let Some(session_id) = value.strip_prefix("Bearer ") {
                    let session = self.sessions.resolve(session_id.trim(), now)?;
                    Ok(Authenticated {
                        user_id: session.user_id,
                        session_token: Some(session.session_id),
                        minted: false,
                        telegram_user: session.telegram_user,
                    })
                } else if let Some(raw) = value.strip_prefix("tma ") {
                    let launch = self.check_launch_data(raw.trim(), now)?;
                    let user_id = launch.user_id();
                    let session = self
                        .sessions
                        .issue(&user_id, Some(launch.user.clone()), now)?;
                    tracing::info!("Authenticated Telegram user {} via launch data", user_id);
                    Ok(Authenticated {
                        user_id,
                        session_token: Some(session.session_id),
                        minted: true,
                        telegram_user: Some(launch.user),
                    })
                } else {
                    Err(AuthError::MissingCredentials)
                }
            }
            None if self.config.guest_mode => Ok(Authenticated {
                user_id: GUEST_USER_ID.to_string(),
                session_token: None,
                minted: false,
                telegram_user: None,
            }),
            None => Err(AuthError::MissingCredentials),
        }
    }

    fn check_launch_data(&self, raw: &str, now: i64) -> Result<LaunchData> {
        match &self.config.bot_token {
            Some(token) => verify_init_data(raw, token, now, self.config.init_data_max_age_secs),
            None => {
                tracing::warn!("Skipping launch data signature check");
                parse_init_data_unverified(raw)
            }
        }
    }

    /// Purge expired sessions at the current time
    pub fn purge_expired_sessions(&self) -> Result<usize> {
        let removed = self.sessions.purge_expired(self.clock.now())?;
        if removed > 0 {
            tracing::info!(
                "Purged {} expired sessions, {} still cached",
                removed,
                self.sessions.cached()
            );
        }
        Ok(removed)
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::sign_init_data;
    use neon_core::ManualClock;
    use neon_storage::MemoryStore;

    const TOKEN: &str = "42:secret";

    fn gateway(bot_token: Option<&str>, guest_mode: bool) -> (Arc<ManualClock>, AuthGateway) {
        let clock = Arc::new(ManualClock::new(10_000));
        let config = GatewayConfig {
            bot_token: bot_token.map(str::to_string),
            guest_mode,
            ..GatewayConfig::default()
        };
        let gw = AuthGateway::new(config, Arc::new(MemoryStore::new()), clock.clone());
        (clock, gw)
    }

    fn launch_header(auth_date: i64) -> String {
        let date = auth_date.to_string();
        let raw = sign_init_data(
            &[("user", r#"{"id":777,"first_name":"Neo"}"#), ("auth_date", &date)],
            TOKEN,
        );
        format!("tma {}", raw)
    }

    #[test]
    fn test_launch_data_mints_session() {
        let (_, gw) = gateway(Some(TOKEN), false);
        let auth = gw.authenticate(Some(&launch_header(10_000))).unwrap();

        assert_eq!(auth.user_id, "777");
        assert!(auth.minted);
        let token = auth.session_token.unwrap();

        let again = gw
            .authenticate(Some(&format!("Bearer {}", token)))
            .unwrap();
        assert_eq!(again.user_id, "777");
        assert!(!again.minted);
        assert_eq!(again.telegram_user.unwrap().first_name, "Neo");
    }

    #[test]
    fn test_missing_and_unknown_credentials() {
        let (_, gw) = gateway(Some(TOKEN), false);
        assert_eq!(gw.authenticate(None).unwrap_err(), AuthError::MissingCredentials);
        assert_eq!(gw.authenticate(Some("  ")).unwrap_err(), AuthError::MissingCredentials);
        assert_eq!(
            gw.authenticate(Some("Basic Zm9vOmJhcg==")).unwrap_err(),
            AuthError::MissingCredentials
        );
        assert_eq!(
            gw.authenticate(Some("Bearer session_missing")).unwrap_err(),
            AuthError::InvalidSignature
        );
    }

    #[test]
    fn test_stale_launch_data() {
        let (_, gw) = gateway(Some(TOKEN), false);
        let header = launch_header(10_000 - INIT_DATA_MAX_AGE_SECS - 1);
        assert_eq!(gw.authenticate(Some(&header)).unwrap_err(), AuthError::Expired);
    }

    #[test]
    fn test_session_expiry() {
        let (clock, gw) = gateway(Some(TOKEN), false);
        let auth = gw.authenticate(Some(&launch_header(10_000))).unwrap();
        let bearer = format!("Bearer {}", auth.session_token.unwrap());

        clock.advance(SESSION_TTL_SECS + 1);
        assert_eq!(gw.authenticate(Some(&bearer)).unwrap_err(), AuthError::Expired);
        assert_eq!(
            gw.authenticate(Some(&bearer)).unwrap_err(),
            AuthError::InvalidSignature
        );
    }

    #[test]
    fn test_development_mode_skips_signature() {
        let (_, gw) = gateway(Some(""), false);
        assert!(gw.config().bot_token.is_none());

        let header = "tma user=%7B%22id%22%3A5%7D&auth_date=1&hash=00";
        let auth = gw.authenticate(Some(header)).unwrap();
        assert_eq!(auth.user_id, "5");
        assert!(auth.minted);
    }

    #[test]
    fn test_guest_mode() {
        let (_, gw) = gateway(Some(TOKEN), true);
        let auth = gw.authenticate(None).unwrap();
        assert_eq!(auth.user_id, GUEST_USER_ID);
        assert_eq!(auth.session_token, None);
    }

    #[test]
    fn test_purge_expired_sessions() {
        let (clock, gw) = gateway(Some(TOKEN), false);
        let token = gw
            .authenticate(Some(&launch_header(10_000)))
            .unwrap()
            .session_token
            .unwrap();
        assert_eq!(gw.purge_expired_sessions().unwrap(), 0);

        clock.advance(gw.config().session_ttl_secs + 1);
        assert_eq!(gw.purge_expired_sessions().unwrap(), 1);
        assert_eq!(gw.sessions().cached(), 0);
        assert_eq!(
            gw.authenticate(Some(&format!("Bearer {}", token))).unwrap_err(),
            AuthError::InvalidSignature
        );
    }
}
