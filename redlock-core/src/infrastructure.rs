use crate::error::{StoreError, StoreResult};
use crate::types::ServerDescriptor;

/// Defines the contract for a single store node.
///
/// Implementations hold no lock state of their own; everything lives in the
/// node behind them. Both primitives must be evaluated atomically by the node.
pub trait StoreClient: Send {
    /// Set `key = value` with an expiry of `ttl_ms`, only if `key` does not
    /// currently exist. Returns whether the key was set.
    fn set_if_absent(&mut self, key: &str, value: &str, ttl_ms: u64) -> StoreResult<bool>;

    /// Delete `key` only if its current value equals `expected`, as one
    /// indivisible operation. Returns whether the key was deleted.
    fn delete_if_matches(&mut self, key: &str, expected: &str) -> StoreResult<bool>;
}

/// Open a client for the node named by `descriptor`.
pub fn connect(descriptor: &ServerDescriptor) -> StoreResult<Box<dyn StoreClient>> {
    match descriptor {
        ServerDescriptor::Memory => Ok(Box::new(
            crate::infrastructure_in_memory::InMemoryStore::new(),
        )),
        #[cfg(feature = "redis")]
        ServerDescriptor::Redis {
            host,
            port,
            timeout_ms,
            db,
        } => {
            let store =
                crate::infrastructure_redis::RedisStore::connect(host, *port, *timeout_ms, *db)?;
            Ok(Box::new(store))
        }
        #[cfg(not(feature = "redis"))]
        ServerDescriptor::Redis { .. } => Err(StoreError::Unsupported(format!(
            "{} requested but the `redis` feature is not enabled",
            descriptor
        ))),
        #[cfg(feature = "sqlite")]
        ServerDescriptor::Sqlite { path, timeout_ms } => {
            let store = crate::infrastructure_sqlite::SqliteStore::open(path, *timeout_ms)?;
            Ok(Box::new(store))
        }
        #[cfg(not(feature = "sqlite"))]
        ServerDescriptor::Sqlite { .. } => Err(StoreError::Unsupported(format!(
            "{} requested but the `sqlite` feature is not enabled",
            descriptor
        ))),
    }
}

/// One configured node and its lazily opened client.
///
/// A slot built from a descriptor connects on first use and reconnects after
/// a connection failure. A slot built from a ready client keeps that client
/// for its whole life.
pub struct StoreSlot {
    descriptor: Option<ServerDescriptor>,
    client: Option<Box<dyn StoreClient>>,
}

impl StoreSlot {
    pub fn from_descriptor(descriptor: ServerDescriptor) -> Self {
        Self {
            descriptor: Some(descriptor),
            client: None,
        }
    }

    pub fn from_client(client: Box<dyn StoreClient>) -> Self {
        Self {
            descriptor: None,
            client: Some(client),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    /// Label used in log events.
    pub fn label(&self) -> String {
        match &self.descriptor {
            Some(d) => d.to_string(),
            None => "client".to_string(),
        }
    }

    /// Drop the client if it can be reopened later.
    pub fn close(&mut self) {
        if self.descriptor.is_some() {
            self.client = None;
        }
    }

    fn client(&mut self) -> StoreResult<&mut Box<dyn StoreClient>> {
        if self.client.is_none() {
            if let Some(descriptor) = &self.descriptor {
                self.client = Some(connect(descriptor)?);
            }
        }
        self.client.as_mut().ok_or_else(|| {
            StoreError::Connection("store client was closed".to_string())
        })
    }

    /// Conditional set on this node. Store faults count as "not acquired".
    pub fn acquire(&mut self, key: &str, value: &str, ttl_ms: u64) -> bool {
        let result = self
            .client()
            .and_then(|client| client.set_if_absent(key, value, ttl_ms));
        self.settle(result, "set")
    }

    /// Conditional delete on this node. Store faults count as "not released".
    pub fn release(&mut self, key: &str, expected: &str) -> bool {
        let result = self
            .client()
            .and_then(|client| client.delete_if_matches(key, expected));
        self.settle(result, "delete")
    }

    fn settle(&mut self, result: StoreResult<bool>, op: &str) -> bool {
        match result {
            Ok(done) => done,
            Err(e) => {
                tracing::warn!(server = %self.label(), op, error = %e, "Store operation failed");
                if matches!(e, StoreError::Connection(_)) {
                    self.close();
                }
                false
            }
        }
    }
}
