//! SQLite-backed store node.
//! Every process opening the same database file contends on one keyspace.
//!
//! Enable with the `sqlite` feature flag:
//! ```toml
//! redlock-core = { path = "../redlock-core", features = ["sqlite"] }
//! ```

use rusqlite::{Connection, params};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::{StoreError, StoreResult};
use crate::infrastructure::StoreClient;

// Expiry is wall-clock based since the file is shared across processes.
fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::SqliteFailure(ref err, _)
                if err.code == rusqlite::ErrorCode::DatabaseBusy
                    || err.code == rusqlite::ErrorCode::DatabaseLocked =>
            {
                StoreError::Timeout(e.to_string())
            }
            rusqlite::Error::SqliteFailure(ref err, _)
                if err.code == rusqlite::ErrorCode::CannotOpen =>
            {
                StoreError::Connection(e.to_string())
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// A store node backed by a SQLite database.
///
/// Uses WAL mode so readers do not block the single writer.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at the given path. `timeout_ms`
    /// bounds how long a write waits for the database lock.
    pub fn open(path: &str, timeout_ms: u64) -> StoreResult<Self> {
        let conn = Connection::open(path)?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        Self::init(conn, timeout_ms)
    }

    /// A private node living only as long as this client.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?, 0)
    }

    fn init(conn: Connection, timeout_ms: u64) -> StoreResult<Self> {
        conn.busy_timeout(Duration::from_millis(timeout_ms))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS locks (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            );",
        )?;
        Ok(Self { conn })
    }

    /// Current unexpired value of `key`.
    pub fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM locks WHERE key = ?1 AND expires_at > ?2")?;
        let mut rows = stmt.query(params![key, now_ms()])?;
        let value = match rows.next()? {
            Some(row) => Some(row.get(0)?),
            None => None,
        };
        Ok(value)
    }
}

impl StoreClient for SqliteStore {
    fn set_if_absent(&mut self, key: &str, value: &str, ttl_ms: u64) -> StoreResult<bool> {
        let now = now_ms();
        let expires_at = now.saturating_add(i64::try_from(ttl_ms).unwrap_or(i64::MAX));

        // One statement: the update branch only fires on an expired row, so a
        // live entry is never overwritten.
        let rows = self.conn.execute(
            "INSERT INTO locks (key, value, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at
             WHERE locks.expires_at <= ?4",
            params![key, value, expires_at, now],
        )?;
        Ok(rows > 0)
    }

    fn delete_if_matches(&mut self, key: &str, expected: &str) -> StoreResult<bool> {
        let rows = self.conn.execute(
            "DELETE FROM locks WHERE key = ?1 AND value = ?2 AND expires_at > ?3",
            params![key, expected, now_ms()],
        )?;
        Ok(rows > 0)
    }
}
