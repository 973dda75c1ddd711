use crate::error::{StoreError, StoreResult};
use crate::infrastructure::StoreClient;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Entry {
    value: String,
    expires_at: Duration,
}

struct Node {
    // Map of key -> (token, expiry on the node clock)
    entries: HashMap<String, Entry>,
    started: Instant,
    // Added to the real elapsed time to fast-forward the node clock
    skew: Duration,
    reachable: bool,
    latency: Duration,
}

impl Node {
    fn now(&self) -> Duration {
        self.started.elapsed() + self.skew
    }
}

/// A process-local store node.
///
/// Clones share one keyspace, so several managers (or a manager and a test)
/// can talk to the same node. Each clone behaves like a separate connection.
#[derive(Clone)]
pub struct InMemoryStore {
    node: Arc<Mutex<Node>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            node: Arc::new(Mutex::new(Node {
                entries: HashMap::new(),
                started: Instant::now(),
                skew: Duration::ZERO,
                reachable: true,
                latency: Duration::ZERO,
            })),
        }
    }

    /// When unreachable, every operation fails with a connection error.
    pub fn set_reachable(&self, reachable: bool) {
        self.node.lock().reachable = reachable;
    }

    /// Delay applied to every operation before it reaches the node.
    pub fn set_latency(&self, latency: Duration) {
        self.node.lock().latency = latency;
    }

    /// Fast-forward the node clock, expiring entries as real time would.
    pub fn advance_clock(&self, by: Duration) {
        self.node.lock().skew += by;
    }

    /// Current unexpired value of `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        let node = self.node.lock();
        let now = node.now();
        node.entries
            .get(key)
            .filter(|e| e.expires_at > now)
            .map(|e| e.value.clone())
    }

    /// Number of unexpired keys on the node.
    pub fn len(&self) -> usize {
        let node = self.node.lock();
        let now = node.now();
        node.entries.values().filter(|e| e.expires_at > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn delay(&self) -> StoreResult<()> {
        let (reachable, latency) = {
            let node = self.node.lock();
            (node.reachable, node.latency)
        };
        if !latency.is_zero() {
            std::thread::sleep(latency);
        }
        if reachable {
            Ok(())
        } else {
            Err(StoreError::Connection("in-memory node is unreachable".to_string()))
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreClient for InMemoryStore {
    fn set_if_absent(&mut self, key: &str, value: &str, ttl_ms: u64) -> StoreResult<bool> {
        self.delay()?;

        let mut node = self.node.lock();
        let now = node.now();
        if let Some(existing) = node.entries.get(key) {
            if existing.expires_at > now {
                return Ok(false);
            }
        }
        node.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: now + Duration::from_millis(ttl_ms),
            },
        );
        Ok(true)
    }

    fn delete_if_matches(&mut self, key: &str, expected: &str) -> StoreResult<bool> {
        self.delay()?;

        let mut node = self.node.lock();
        let now = node.now();
        let (live, matches) = match node.entries.get(key) {
            Some(entry) => (entry.expires_at > now, entry.value == expected),
            None => return Ok(false),
        };
        if !live {
            // Lazily drop expired entries
            node.entries.remove(key);
            return Ok(false);
        }
        if matches {
            node.entries.remove(key);
        }
        Ok(matches)
    }
}
