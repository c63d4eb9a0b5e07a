//! In-memory ledger store
//!
//! Used by tests and by deployments that accept losing progress on restart.

use crate::{LedgerStore, Result};
use neon_core::{GoalId, GoalState, Player, Session, UserId};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Volatile store backed by hash maps
pub struct MemoryStore {
    players: RwLock<HashMap<UserId, Player>>,
    goals: RwLock<HashMap<GoalId, GoalState>>,
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            players: RwLock::new(HashMap::new()),
            goals: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored players
    pub fn player_count(&self) -> usize {
        self.players.read().len()
    }

    /// Stored copy of a player
    pub fn player(&self, user_id: &str) -> Option<Player> {
        self.players.read().get(user_id).cloned()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerStore for MemoryStore {
    fn load_players(&self) -> Result<Vec<Player>> {
        Ok(self.players.read().values().cloned().collect())
    }

    fn save_player(&self, player: &Player) -> Result<()> {
        self.players
            .write()
            .insert(player.user_id.clone(), player.clone());
        Ok(())
    }

    fn load_goal_states(&self) -> Result<Vec<GoalState>> {
        Ok(self.goals.read().values().cloned().collect())
    }

    fn commit_donation(&self, player: &Player, goal: &GoalState) -> Result<()> {
        // Both maps are locked before either write lands.
        let mut players = self.players.write();
        let mut goals = self.goals.write();
        players.insert(player.user_id.clone(), player.clone());
        goals.insert(goal.goal_id, goal.clone());
        Ok(())
    }

    fn save_session(&self, session: &Session) -> Result<()> {
        self.sessions
            .write()
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    fn load_session(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.read().get(session_id).cloned())
    }

    fn delete_session(&self, session_id: &str) -> Result<()> {
        self.sessions.write().remove(session_id);
        Ok(())
    }

    fn purge_expired_sessions(&self, now: i64) -> Result<usize> {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now));
        Ok(before - sessions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_roundtrip() {
        let store = MemoryStore::new();
        let mut player = Player::new("7", 0, 0);
        player.score = 99;
        store.save_player(&player).unwrap();

        assert_eq!(store.player_count(), 1);
        assert_eq!(store.player("7").unwrap().score, 99);
        assert_eq!(store.load_players().unwrap(), vec![player]);
    }

    #[test]
    fn test_commit_donation_writes_both() {
        let store = MemoryStore::new();
        let player = Player::new("7", 0, 0);
        let mut goal = GoalState::new(3);
        goal.record("7", 40, 0);

        store.commit_donation(&player, &goal).unwrap();

        assert!(store.player("7").is_some());
        assert_eq!(store.load_goal_states().unwrap(), vec![goal]);
    }

    #[test]
    fn test_session_lifecycle() {
        let store = MemoryStore::new();
        let session = Session {
            session_id: "session_abc".into(),
            user_id: "7".into(),
            telegram_user: None,
            created_at: 0,
            expires_at: 10,
        };
        store.save_session(&session).unwrap();
        assert_eq!(store.load_session("session_abc").unwrap(), Some(session));

        store.delete_session("session_abc").unwrap();
        assert_eq!(store.load_session("session_abc").unwrap(), None);
        store.delete_session("session_abc").unwrap();
    }

    #[test]
    fn test_purge_expired_sessions() {
        let store = MemoryStore::new();
        for (id, expires_at) in [("session_old", 10), ("session_edge", 20), ("session_new", 30)] {
            store
                .save_session(&Session {
                    session_id: id.into(),
                    user_id: "7".into(),
                    telegram_user: None,
                    created_at: 0,
                    expires_at,
                })
                .unwrap();
        }

        assert_eq!(store.purge_expired_sessions(20).unwrap(), 1);
        assert_eq!(store.load_session("session_old").unwrap(), None);
        assert!(store.load_session("session_edge").unwrap().is_some());
        assert_eq!(store.purge_expired_sessions(20).unwrap(), 0);
    }
}
