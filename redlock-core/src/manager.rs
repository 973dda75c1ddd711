//! High-level entry point that owns the store clients and the retry policy.
//! The CLI and the HTTP service both delegate to this.

use crate::acquisition::{AcquisitionAlgorithm, AttemptOutcome, FanOut};
use crate::config::{LockConfig, validate_counts};
use crate::error::{LockError, LockResult};
use crate::infrastructure::{StoreClient, StoreSlot};
use crate::scheduler::RetryScheduler;
use crate::token;
use crate::types::{Lease, ServerDescriptor};
use parking_lot::Mutex;

/// Acquires and releases locks on a set of independent store nodes.
///
/// Store clients are opened on first use and kept until `close()` or drop.
/// Methods take `&mut self`; share a manager across threads behind a mutex
/// and acquire through `lock_shared()`.
pub struct LockManager {
    slots: Vec<StoreSlot>,
    algorithm: AcquisitionAlgorithm,
    retry_delay_ms: u64,
    retry_count: u32,
}

impl LockManager {
    /// Create a manager for `servers`. Nothing is connected until the first
    /// `lock()` or `unlock()`.
    pub fn new(servers: Vec<ServerDescriptor>, retry_delay_ms: u64, retry_count: u32) -> LockResult<Self> {
        let mut config = LockConfig::new(servers);
        config.retry_delay_ms = retry_delay_ms;
        config.retry_count = retry_count;
        Self::from_config(config)
    }

    pub fn from_config(config: LockConfig) -> LockResult<Self> {
        config.validate()?;
        let slots = config
            .servers
            .into_iter()
            .map(StoreSlot::from_descriptor)
            .collect();
        Ok(Self::from_slots(
            slots,
            config.retry_delay_ms,
            config.retry_count,
            config.fan_out,
        ))
    }

    /// Create a manager over clients that are already open.
    pub fn with_clients(
        clients: Vec<Box<dyn StoreClient>>,
        retry_delay_ms: u64,
        retry_count: u32,
    ) -> LockResult<Self> {
        validate_counts(clients.len(), retry_count)?;
        let slots = clients.into_iter().map(StoreSlot::from_client).collect();
        Ok(Self::from_slots(slots, retry_delay_ms, retry_count, FanOut::default()))
    }

    fn from_slots(slots: Vec<StoreSlot>, retry_delay_ms: u64, retry_count: u32, fan_out: FanOut) -> Self {
        let algorithm = AcquisitionAlgorithm::new(slots.len(), fan_out);
        Self {
            slots,
            algorithm,
            retry_delay_ms,
            retry_count,
        }
    }

    /// Switch how attempts contact the nodes.
    pub fn with_fan_out(mut self, fan_out: FanOut) -> Self {
        self.algorithm = AcquisitionAlgorithm::new(self.slots.len(), fan_out);
        self
    }

    pub fn quorum(&self) -> usize {
        self.algorithm.quorum()
    }

    pub fn server_count(&self) -> usize {
        self.slots.len()
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn retry_delay_ms(&self) -> u64 {
        self.retry_delay_ms
    }

    /// Acquire `resource` for `ttl_ms` milliseconds.
    ///
    /// Makes up to `retry_count` attempts with a jittered pause between them.
    /// Fails with `RetriesExhausted` once every attempt has failed; no node
    /// holds the token at that point except where a release could not reach it.
    pub fn lock(&mut self, resource: &str, ttl_ms: u64) -> LockResult<Lease> {
        check_request(resource, ttl_ms)?;
        let (retry_delay_ms, retry_count) = (self.retry_delay_ms, self.retry_count);
        retry_attempts(resource, retry_delay_ms, retry_count, |token| {
            self.attempt(resource, token, ttl_ms)
        })
    }

    /// Same as `lock()` for a manager shared behind a mutex.
    ///
    /// The mutex is held only while an attempt talks to the nodes and is free
    /// during the pauses, so an `unlock()` from the current holder is not
    /// stuck behind a contender's retry loop.
    pub fn lock_shared(shared: &Mutex<Self>, resource: &str, ttl_ms: u64) -> LockResult<Lease> {
        check_request(resource, ttl_ms)?;
        let (retry_delay_ms, retry_count) = {
            let manager = shared.lock();
            (manager.retry_delay_ms, manager.retry_count)
        };
        retry_attempts(resource, retry_delay_ms, retry_count, |token| {
            shared.lock().attempt(resource, token, ttl_ms)
        })
    }

    fn attempt(&mut self, resource: &str, token: &str, ttl_ms: u64) -> AttemptOutcome {
        self.algorithm.attempt(&mut self.slots, resource, token, ttl_ms)
    }

    /// Release `lease` on every node that still holds its token.
    ///
    /// Best effort: unreachable nodes are skipped and their entry expires on
    /// its own. Calling this twice, or after the lease expired, is a no-op.
    pub fn unlock(&mut self, lease: &Lease) {
        let released = self
            .algorithm
            .release(&mut self.slots, &lease.resource, &lease.token);
        tracing::debug!(resource = %lease.resource, released, "Lock released");
    }

    /// Close every store connection. They reopen on next use.
    pub fn close(&mut self) {
        for slot in &mut self.slots {
            slot.close();
        }
    }

    /// Number of slots with an open client.
    pub fn connected_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_connected()).count()
    }
}

fn check_request(resource: &str, ttl_ms: u64) -> LockResult<()> {
    if resource.is_empty() {
        return Err(LockError::InvalidConfiguration(
            "resource name must not be empty".to_string(),
        ));
    }
    if ttl_ms == 0 {
        return Err(LockError::InvalidConfiguration(
            "ttl must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

// One token for the whole call. The pause only separates attempts, so the
// last failure returns straight away.
fn retry_attempts<F>(resource: &str, retry_delay_ms: u64, retry_count: u32, mut attempt: F) -> LockResult<Lease>
where
    F: FnMut(&str) -> AttemptOutcome,
{
    let token = token::generate();
    let mut delays = RetryScheduler::new(retry_delay_ms, retry_count);

    for n in 1..=retry_count {
        match attempt(&token) {
            AttemptOutcome::Acquired(lease) => {
                tracing::debug!(
                    resource,
                    attempt = n,
                    validity_ms = lease.validity_ms(),
                    "Lock acquired"
                );
                return Ok(lease);
            }
            AttemptOutcome::QuorumNotReached { acquired, quorum } => {
                tracing::debug!(resource, attempt = n, acquired, quorum, "Quorum not reached");
            }
            AttemptOutcome::ValidityExpired { acquired, validity_ms } => {
                tracing::debug!(resource, attempt = n, acquired, validity_ms, "Validity expired");
            }
        }

        if n < retry_count {
            if let Some(delay) = delays.next() {
                std::thread::sleep(delay);
            }
        }
    }

    tracing::info!(resource, attempts = retry_count, "Lock not acquired");
    Err(LockError::RetriesExhausted {
        resource: resource.to_string(),
        attempts: retry_count,
    })
}
