//! Bearer session table
//!
//! Sessions are written through to the ledger store and cached in a
//! `DashMap` so the common `Bearer` path is a lock-free lookup.

use crate::error::{AuthError, Result};
use dashmap::DashMap;
use neon_core::{Session, TelegramUser};
use neon_storage::LedgerStore;
use std::sync::Arc;

/// Issued sessions with a write-through cache
pub struct SessionTable {
    store: Arc<dyn LedgerStore>,
    cache: DashMap<String, Session>,
    ttl_secs: i64,
}

impl SessionTable {
    pub fn new(store: Arc<dyn LedgerStore>, ttl_secs: i64) -> Self {
        Self {
            store,
            cache: DashMap::new(),
            ttl_secs,
        }
    }

    /// Mint and persist a new session for `user_id`
    pub fn issue(
        &self,
        user_id: &str,
        telegram_user: Option<TelegramUser>,
        now: i64,
    ) -> Result<Session> {
        let session = Session {
            session_id: format!("session_{}", uuid::Uuid::new_v4().simple()),
            user_id: user_id.to_string(),
            telegram_user,
            created_at: now,
            expires_at: now.saturating_add(self.ttl_secs),
        };
        self.store.save_session(&session)?;
        self.cache
            .insert(session.session_id.clone(), session.clone());
        tracing::debug!("Issued session for user {}", user_id);
        Ok(session)
    }

    /// Look up a live session
    ///
    /// Unknown ids are `InvalidSignature`; expired sessions are removed and
    /// reported as `Expired`.
    pub fn resolve(&self, session_id: &str, now: i64) -> Result<Session> {
        let session = match self.cache.get(session_id) {
            Some(entry) => entry.value().clone(),
            None => {
                let loaded = self
                    .store
                    .load_session(session_id)?
                    .ok_or(AuthError::InvalidSignature)?;
                self.cache.insert(session_id.to_string(), loaded.clone());
                loaded
            }
        };

        if session.is_expired(now) {
            self.revoke(session_id)?;
            return Err(AuthError::Expired);
        }
        Ok(session)
    }

    /// Forget a session everywhere
    pub fn revoke(&self, session_id: &str) -> Result<()> {
        self.cache.remove(session_id);
        self.store.delete_session(session_id)?;
        Ok(())
    }

    /// Drop expired sessions from the cache and the store
    ///
    /// Returns the number of rows removed from the store.
    pub fn purge_expired(&self, now: i64) -> Result<usize> {
        self.cache.retain(|_, session| !session.is_expired(now));
        let removed = self.store.purge_expired_sessions(now)?;
        Ok(removed)
    }

    /// Number of cached sessions
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neon_storage::MemoryStore;

    fn table() -> (Arc<MemoryStore>, SessionTable) {
        let store = Arc::new(MemoryStore::new());
        let table = SessionTable::new(store.clone(), 100);
        (store, table)
    }

    #[test]
    fn test_issue_and_resolve() {
        let (store, table) = table();
        let session = table.issue("42", None, 1_000).unwrap();

        assert!(session.session_id.starts_with("session_"));
        assert_eq!(session.expires_at, 1_100);
        assert_eq!(
            store.load_session(&session.session_id).unwrap(),
            Some(session.clone())
        );
        assert_eq!(table.resolve(&session.session_id, 1_050).unwrap(), session);
    }

    #[test]
    fn test_resolve_falls_back_to_store() {
        let (store, table) = table();
        let session = table.issue("42", None, 0).unwrap();

        // a fresh table over the same store has a cold cache
        let cold = SessionTable::new(store, 100);
        assert_eq!(cold.cached(), 0);
        assert_eq!(cold.resolve(&session.session_id, 10).unwrap().user_id, "42");
        assert_eq!(cold.cached(), 1);
    }

    #[test]
    fn test_unknown_session() {
        let (_, table) = table();
        assert_eq!(
            table.resolve("session_nope", 0).unwrap_err(),
            AuthError::InvalidSignature
        );
    }

    #[test]
    fn test_expired_session_is_removed() {
        let (store, table) = table();
        let session = table.issue("42", None, 0).unwrap();

        assert_eq!(
            table.resolve(&session.session_id, 101).unwrap_err(),
            AuthError::Expired
        );
        assert_eq!(table.cached(), 0);
        assert_eq!(store.load_session(&session.session_id).unwrap(), None);
        assert_eq!(
            table.resolve(&session.session_id, 0).unwrap_err(),
            AuthError::InvalidSignature
        );
    }

    #[test]
    fn test_purge_expired_clears_cache_and_store() {
        let (store, table) = table();
        let stale = table.issue("1", None, 0).unwrap();
        let live = table.issue("2", None, 50).unwrap();
        assert_eq!(table.cached(), 2);

        assert_eq!(table.purge_expired(120).unwrap(), 1);
        assert_eq!(table.cached(), 1);
        assert_eq!(store.load_session(&stale.session_id).unwrap(), None);
        assert_eq!(table.resolve(&live.session_id, 120).unwrap(), live);
    }
}
