//! SQLite ledger store
//!
//! Records are stored as JSON blobs keyed by their natural id; the few columns
//! kept outside the blob exist for ad-hoc inspection and session expiry.

use crate::{LedgerStore, Result};
use neon_core::{GoalState, Player, Session};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

const SCHEMA_VERSION: i64 = 1;

/// Durable store backed by a single SQLite connection
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file and apply migrations
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        tracing::info!("Opened ledger database at {:?}", path.as_ref());
        Self::from_connection(conn)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.configure()?;
        store.migrate()?;
        Ok(store)
    }

    fn configure(&self) -> Result<()> {
        let conn = self.conn.lock();
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!("SQLite journal mode: {}", mode);
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(())
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();
        let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
        if version >= SCHEMA_VERSION {
            return Ok(());
        }

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS players (
                user_id TEXT PRIMARY KEY,
                score INTEGER NOT NULL,
                record_json TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS goals (
                goal_id INTEGER PRIMARY KEY,
                total_donated INTEGER NOT NULL,
                record_json TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                expires_at INTEGER NOT NULL,
                record_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions (expires_at);
            ",
        )?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        tracing::info!("Ledger schema migrated to version {}", SCHEMA_VERSION);
        Ok(())
    }
}

fn upsert_player(conn: &Connection, player: &Player) -> Result<()> {
    let record = serde_json::to_string(player)?;
    conn.execute(
        "INSERT INTO players (user_id, score, record_json) VALUES (?1, ?2, ?3)
         ON CONFLICT(user_id) DO UPDATE SET score = excluded.score, record_json = excluded.record_json",
        params![
            player.user_id,
            i64::try_from(player.score).unwrap_or(i64::MAX),
            record
        ],
    )?;
    Ok(())
}

fn upsert_goal(conn: &Connection, goal: &GoalState) -> Result<()> {
    let record = serde_json::to_string(goal)?;
    conn.execute(
        "INSERT INTO goals (goal_id, total_donated, record_json) VALUES (?1, ?2, ?3)
         ON CONFLICT(goal_id) DO UPDATE SET total_donated = excluded.total_donated, record_json = excluded.record_json",
        params![
            goal.goal_id,
            i64::try_from(goal.total_donated).unwrap_or(i64::MAX),
            record
        ],
    )?;
    Ok(())
}

impl LedgerStore for SqliteStore {
    fn load_players(&self) -> Result<Vec<Player>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT record_json FROM players")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut players = Vec::new();
        for row in rows {
            players.push(serde_json::from_str(&row?)?);
        }
        Ok(players)
    }

    fn save_player(&self, player: &Player) -> Result<()> {
        let conn = self.conn.lock();
        upsert_player(&conn, player)
    }

    fn load_goal_states(&self) -> Result<Vec<GoalState>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT record_json FROM goals ORDER BY goal_id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut goals = Vec::new();
        for row in rows {
            goals.push(serde_json::from_str(&row?)?);
        }
        Ok(goals)
    }

    fn commit_donation(&self, player: &Player, goal: &GoalState) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        upsert_player(&tx, player)?;
        upsert_goal(&tx, goal)?;
        tx.commit()?;
        Ok(())
    }

    fn save_session(&self, session: &Session) -> Result<()> {
        let record = serde_json::to_string(session)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO sessions (session_id, user_id, expires_at, record_json)
             VALUES (?1, ?2, ?3, ?4)",
            params![session.session_id, session.user_id, session.expires_at, record],
        )?;
        Ok(())
    }

    fn load_session(&self, session_id: &str) -> Result<Option<Session>> {
        let conn = self.conn.lock();
        let record: Option<String> = conn
            .query_row(
                "SELECT record_json FROM sessions WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()?;
        match record {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn delete_session(&self, session_id: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM sessions WHERE session_id = ?1",
            params![session_id],
        )?;
        Ok(())
    }
    fn purge_expired_sessions(&self, now: i64) -> Result<usize> {
        let conn = self.conn.lock();
        let removed = conn.execute("DELETE FROM sessions WHERE expires_at < ?1", params![now])?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neon_core::{BuildJob, BuildTarget};

    fn sample_player() -> Player {
        let mut player = Player::new("123456", 500, 1_000);
        player.total_clicks = 12;
        player.producers.insert(4, 2);
        player
            .build_jobs
            .push(BuildJob::new(BuildTarget::Producer(16), 1_000, 30));
        player
    }

    #[test]
    fn test_player_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.sqlite");

        let player = sample_player();
        {
            let store = SqliteStore::open(&path).unwrap();
            store.save_player(&player).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.load_players().unwrap(), vec![player]);
    }

    #[test]
    fn test_save_player_overwrites() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut player = sample_player();
        store.save_player(&player).unwrap();

        player.score = 1;
        store.save_player(&player).unwrap();

        let players = store.load_players().unwrap();
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].score, 1);
    }

    #[test]
    fn test_commit_donation_is_transactional() {
        let store = SqliteStore::open_in_memory().unwrap();
        let player = sample_player();
        let mut goal = GoalState::new(2);
        goal.record(&player.user_id, 250, 1_000);

        store.commit_donation(&player, &goal).unwrap();

        assert_eq!(store.load_players().unwrap(), vec![player]);
        assert_eq!(store.load_goal_states().unwrap(), vec![goal]);
    }

    #[test]
    fn test_sessions_and_purge() {
        let store = SqliteStore::open_in_memory().unwrap();
        let live = Session {
            session_id: "session_live".into(),
            user_id: "1".into(),
            telegram_user: None,
            created_at: 0,
            expires_at: 1_000,
        };
        let stale = Session {
            session_id: "session_stale".into(),
            expires_at: 10,
            ..live.clone()
        };
        store.save_session(&live).unwrap();
        store.save_session(&stale).unwrap();

        assert_eq!(store.purge_expired_sessions(500).unwrap(), 1);
        assert_eq!(store.load_session("session_live").unwrap(), Some(live));
        assert_eq!(store.load_session("session_stale").unwrap(), None);

        store.delete_session("session_live").unwrap();
        assert_eq!(store.load_session("session_live").unwrap(), None);
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.sqlite");
        SqliteStore::open(&path).unwrap();
        SqliteStore::open(&path).unwrap();
    }
}
