//! Error taxonomy for store nodes and the lock manager.

/// A fault talking to a single store node.
///
/// Never fatal on its own: the attempt counts the node as not acquired and
/// carries on with the others.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("connection failure: {0}")]
    Connection(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("store error: {0}")]
    Backend(String),

    #[error("backend not supported in this build: {0}")]
    Unsupported(String),
}

/// Terminal outcomes surfaced by `LockManager`.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("could not acquire '{resource}' after {attempts} attempts")]
    RetriesExhausted { resource: String, attempts: u32 },
}

pub type StoreResult<T> = Result<T, StoreError>;
pub type LockResult<T> = Result<T, LockError>;
