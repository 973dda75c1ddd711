use crate::acquisition::FanOut;
use crate::error::{LockError, LockResult};
use crate::types::ServerDescriptor;
use serde::{Deserialize, Serialize};

pub const DEFAULT_RETRY_DELAY_MS: u64 = 200;
pub const DEFAULT_RETRY_COUNT: u32 = 3;

fn default_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY_MS
}

fn default_retry_count() -> u32 {
    DEFAULT_RETRY_COUNT
}

/// Everything needed to build a `LockManager`.
///
/// ```json
/// {
///   "servers": [
///     { "backend": "redis", "host": "127.0.0.1", "port": 6379, "db": 7 },
///     { "backend": "redis", "host": "127.0.0.1", "port": 6389, "timeout_ms": 10 },
///     { "backend": "sqlite", "path": "/var/lib/locks.db" }
///   ],
///   "retry_delay_ms": 200,
///   "retry_count": 3,
///   "fan_out": "parallel"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConfig {
    pub servers: Vec<ServerDescriptor>,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default)]
    pub fan_out: FanOut,
}

impl LockConfig {
    pub fn new(servers: Vec<ServerDescriptor>) -> Self {
        Self {
            servers,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            retry_count: DEFAULT_RETRY_COUNT,
            fan_out: FanOut::default(),
        }
    }

    pub fn from_json_str(json: &str) -> LockResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| LockError::InvalidConfiguration(format!("malformed config: {}", e)))
    }

    pub fn from_json_file(path: &str) -> LockResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            LockError::InvalidConfiguration(format!("cannot read config '{}': {}", path, e))
        })?;
        Self::from_json_str(&json)
    }

    /// Reject configurations the manager cannot run with.
    pub fn validate(&self) -> LockResult<()> {
        validate_counts(self.servers.len(), self.retry_count)
    }
}

pub(crate) fn validate_counts(server_count: usize, retry_count: u32) -> LockResult<()> {
    if server_count == 0 {
        return Err(LockError::InvalidConfiguration(
            "at least one server is required".to_string(),
        ));
    }
    if retry_count == 0 {
        return Err(LockError::InvalidConfiguration(
            "retry_count must be greater than 0".to_string(),
        ));
    }
    Ok(())
}
