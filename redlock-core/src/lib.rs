//! # redlock-core
//!
//! Distributed mutual exclusion over N independent key-value store nodes.
//! A lock is held once a quorum of nodes accepted the caller's token within
//! the TTL, less a clock-drift allowance and the time the attempt took.

pub mod acquisition;
pub mod config;
pub mod error;
pub mod infrastructure;
#[path = "infrastructure_in_memory.rs"]
pub mod infrastructure_in_memory;
#[cfg(feature = "redis")]
#[path = "infrastructure_redis.rs"]
pub mod infrastructure_redis;
#[cfg(feature = "sqlite")]
#[path = "infrastructure_sqlite.rs"]
pub mod infrastructure_sqlite;
pub mod manager;
pub mod scheduler;
pub mod token;
pub mod types;

pub use error::{LockError, LockResult, StoreError, StoreResult};
pub use manager::LockManager;

#[cfg(test)]
mod acquisition_test;
#[cfg(test)]
mod scheduler_test;
