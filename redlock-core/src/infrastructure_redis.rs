//! Redis-backed store node, the canonical backend for this lock family.
//!
//! Acquisition is `SET key token NX PX ttl`; release runs a server-side
//! script so the compare and the delete cannot be interleaved with another
//! client's write.

use redis::{Client, Connection, Script};
use std::time::Duration;

use crate::error::{StoreError, StoreResult};
use crate::infrastructure::StoreClient;

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_timeout() {
            StoreError::Timeout(e.to_string())
        } else if e.is_connection_refusal() || e.is_connection_dropped() || e.is_io_error() {
            StoreError::Connection(e.to_string())
        } else {
            StoreError::Backend(e.to_string())
        }
    }
}

pub(crate) fn connection_url(host: &str, port: u16, db: Option<i64>) -> String {
    match db {
        Some(db) => format!("redis://{}:{}/{}", host, port, db),
        None => format!("redis://{}:{}", host, port),
    }
}

pub struct RedisStore {
    conn: Connection,
    release: Script,
}

impl RedisStore {
    /// Connect to one node. A non-zero `timeout_ms` bounds the connect as well
    /// as every subsequent read and write; `db` selects the logical database.
    pub fn connect(host: &str, port: u16, timeout_ms: u64, db: Option<i64>) -> StoreResult<Self> {
        let url = connection_url(host, port, db);
        let client = Client::open(url.as_str())?;

        let conn = if timeout_ms == 0 {
            client.get_connection()?
        } else {
            let timeout = Duration::from_millis(timeout_ms);
            let conn = client.get_connection_with_timeout(timeout)?;
            conn.set_read_timeout(Some(timeout))?;
            conn.set_write_timeout(Some(timeout))?;
            conn
        };

        tracing::debug!(url = %url, "Connected to redis node");

        Ok(Self {
            conn,
            release: Script::new(RELEASE_SCRIPT),
        })
    }
}

impl StoreClient for RedisStore {
    fn set_if_absent(&mut self, key: &str, value: &str, ttl_ms: u64) -> StoreResult<bool> {
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query(&mut self.conn)?;
        Ok(reply.is_some())
    }

    fn delete_if_matches(&mut self, key: &str, expected: &str) -> StoreResult<bool> {
        let deleted: i64 = self
            .release
            .key(key)
            .arg(expected)
            .invoke(&mut self.conn)?;
        Ok(deleted == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token;

    // Live tests run only when REDLOCK_TEST_REDIS names a node, e.g. "127.0.0.1:6379"
    fn live_store() -> Option<RedisStore> {
        let addr = std::env::var("REDLOCK_TEST_REDIS").ok()?;
        let (host, port) = addr.rsplit_once(':')?;
        let port = port.parse().ok()?;
        Some(RedisStore::connect(host, port, 500, None).unwrap())
    }

    fn stored(store: &mut RedisStore, key: &str) -> Option<String> {
        redis::cmd("GET").arg(key).query(&mut store.conn).unwrap()
    }

    #[test]
    fn live_set_if_absent_respects_existing_key() {
        let Some(mut store) = live_store() else { return };
        let key = format!("redlock-test-{}", token::generate());

        assert!(store.set_if_absent(&key, "first", 10_000).unwrap());
        assert!(!store.set_if_absent(&key, "second", 10_000).unwrap());
        assert_eq!(stored(&mut store, &key).as_deref(), Some("first"));

        assert!(store.delete_if_matches(&key, "first").unwrap());
    }

    #[test]
    fn live_release_script_checks_token() {
        let Some(mut store) = live_store() else { return };
        let key = format!("redlock-test-{}", token::generate());

        assert!(store.set_if_absent(&key, "owner", 10_000).unwrap());
        assert!(!store.delete_if_matches(&key, "intruder").unwrap());
        assert_eq!(stored(&mut store, &key).as_deref(), Some("owner"));

        assert!(store.delete_if_matches(&key, "owner").unwrap());
        assert_eq!(stored(&mut store, &key), None);
        assert!(!store.delete_if_matches(&key, "owner").unwrap());
    }

    #[test]
    fn live_key_expires_after_ttl() {
        let Some(mut store) = live_store() else { return };
        let key = format!("redlock-test-{}", token::generate());

        assert!(store.set_if_absent(&key, "a", 50).unwrap());
        std::thread::sleep(Duration::from_millis(120));
        assert!(store.set_if_absent(&key, "b", 10_000).unwrap());
        assert!(!store.delete_if_matches(&key, "a").unwrap());

        assert!(store.delete_if_matches(&key, "b").unwrap());
    }

    #[test]
    fn url_includes_db_when_given() {
        assert_eq!(connection_url("127.0.0.1", 6379, Some(7)), "redis://127.0.0.1:6379/7");
        assert_eq!(connection_url("cache", 6380, None), "redis://cache:6380");
    }

    #[test]
    fn refused_connection_is_a_connection_failure() {
        // Port 1 is reserved and never runs redis
        match RedisStore::connect("127.0.0.1", 1, 50, None) {
            Err(StoreError::Connection(_)) | Err(StoreError::Timeout(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected connect to fail"),
        }
    }
}
