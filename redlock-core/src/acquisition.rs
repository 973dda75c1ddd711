//! Single-attempt acquisition: fan-out, timing, drift and validity math, the
//! quorum decision, and release of partial acquisitions on failure.

use crate::infrastructure::StoreSlot;
use crate::types::Lease;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Fraction of the TTL reserved for expiry-precision skew between nodes.
pub const CLOCK_DRIFT_FACTOR: f64 = 0.01;

/// Added to the drift: 1ms for node expiry precision plus a 1ms minimum drift
/// for small TTLs.
pub const DRIFT_FLOOR_MS: f64 = 2.0;

/// Number of nodes that must agree: `floor(n / 2) + 1`.
pub fn quorum(server_count: usize) -> usize {
    server_count / 2 + 1
}

pub fn drift_ms(ttl_ms: u64) -> f64 {
    ttl_ms as f64 * CLOCK_DRIFT_FACTOR + DRIFT_FLOOR_MS
}

/// What is left of the TTL once the attempt's elapsed time and the drift are
/// deducted. May be negative.
pub fn validity_ms(ttl_ms: u64, elapsed: Duration) -> f64 {
    ttl_ms as f64 - elapsed.as_secs_f64() * 1000.0 - drift_ms(ttl_ms)
}

/// How an attempt contacts the nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanOut {
    /// One node after the other
    #[default]
    Sequential,
    /// One scoped thread per node
    Parallel,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Acquired(Lease),
    /// Fewer than quorum nodes accepted the key
    QuorumNotReached { acquired: usize, quorum: usize },
    /// Quorum was met but elapsed time plus drift consumed the TTL
    ValidityExpired { acquired: usize, validity_ms: f64 },
}

impl AttemptOutcome {
    pub fn is_acquired(&self) -> bool {
        matches!(self, AttemptOutcome::Acquired(_))
    }
}

/// The quorum/validity decision for one finished attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Granted { validity_ms: f64 },
    QuorumNotReached,
    ValidityExpired { validity_ms: f64 },
}

pub struct AcquisitionAlgorithm {
    quorum: usize,
    fan_out: FanOut,
}

impl AcquisitionAlgorithm {
    pub fn new(server_count: usize, fan_out: FanOut) -> Self {
        Self {
            quorum: quorum(server_count),
            fan_out,
        }
    }

    pub fn quorum(&self) -> usize {
        self.quorum
    }

    pub fn fan_out(&self) -> FanOut {
        self.fan_out
    }

    pub fn decide(acquired: usize, quorum: usize, ttl_ms: u64, elapsed: Duration) -> Verdict {
        let validity_ms = validity_ms(ttl_ms, elapsed);
        if acquired < quorum {
            Verdict::QuorumNotReached
        } else if validity_ms <= 0.0 {
            Verdict::ValidityExpired { validity_ms }
        } else {
            Verdict::Granted { validity_ms }
        }
    }

    /// Run one attempt against every slot.
    ///
    /// Elapsed time spans the whole fan-out, from before the first request to
    /// after the last response, in both fan-out modes. On any outcome other
    /// than `Acquired` the token is released from every node before returning.
    pub fn attempt(
        &self,
        slots: &mut [StoreSlot],
        resource: &str,
        token: &str,
        ttl_ms: u64,
    ) -> AttemptOutcome {
        let start = Instant::now();
        let acquired = self.for_each(slots, |slot| slot.acquire(resource, token, ttl_ms));
        let elapsed = start.elapsed();

        let outcome = match Self::decide(acquired, self.quorum, ttl_ms, elapsed) {
            Verdict::Granted { validity_ms } => {
                return AttemptOutcome::Acquired(Lease::new(
                    resource,
                    token,
                    Duration::from_secs_f64(validity_ms / 1000.0),
                ));
            }
            Verdict::QuorumNotReached => AttemptOutcome::QuorumNotReached {
                acquired,
                quorum: self.quorum,
            },
            Verdict::ValidityExpired { validity_ms } => {
                AttemptOutcome::ValidityExpired { acquired, validity_ms }
            }
        };

        self.release(slots, resource, token);
        outcome
    }

    /// Conditional delete of `resource = token` on every slot. Returns how
    /// many nodes actually deleted the key.
    pub fn release(&self, slots: &mut [StoreSlot], resource: &str, token: &str) -> usize {
        self.for_each(slots, |slot| slot.release(resource, token))
    }

    fn for_each<F>(&self, slots: &mut [StoreSlot], op: F) -> usize
    where
        F: Fn(&mut StoreSlot) -> bool + Sync,
    {
        match self.fan_out {
            FanOut::Sequential => slots.iter_mut().map(|slot| op(slot)).filter(|ok| *ok).count(),
            FanOut::Parallel => std::thread::scope(|s| {
                let op = &op;
                let handles: Vec<_> = slots
                    .iter_mut()
                    .map(|slot| s.spawn(move || op(slot)))
                    .collect();
                handles
                    .into_iter()
                    .map(|h| h.join().unwrap_or(false))
                    .filter(|ok| *ok)
                    .count()
            }),
        }
    }
}
