use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Connect timeout used when a descriptor does not name one.
pub const DEFAULT_TIMEOUT_MS: u64 = 50;

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// Describes one independent store node and the backend used to reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum ServerDescriptor {
    /// A Redis node. `db` selects the logical database (namespace index).
    Redis {
        host: String,
        port: u16,
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
        #[serde(default)]
        db: Option<i64>,
    },
    /// A SQLite file acting as a node. Every process opening the same path
    /// contends on the same keyspace.
    Sqlite {
        path: String,
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
    },
    /// A private, process-local node
    Memory,
}

impl ServerDescriptor {
    pub fn redis(host: impl Into<String>, port: u16) -> Self {
        ServerDescriptor::Redis {
            host: host.into(),
            port,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            db: None,
        }
    }

    pub fn timeout_ms(&self) -> Option<u64> {
        match self {
            ServerDescriptor::Redis { timeout_ms, .. } | ServerDescriptor::Sqlite { timeout_ms, .. } => {
                Some(*timeout_ms)
            }
            ServerDescriptor::Memory => None,
        }
    }
}

impl fmt::Display for ServerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerDescriptor::Redis { host, port, db, .. } => match db {
                Some(db) => write!(f, "redis://{}:{}/{}", host, port, db),
                None => write!(f, "redis://{}:{}", host, port),
            },
            ServerDescriptor::Sqlite { path, .. } => write!(f, "sqlite:{}", path),
            ServerDescriptor::Memory => write!(f, "memory"),
        }
    }
}

/// Parses the textual descriptor forms accepted on the command line:
///
/// - `host:port[:timeout_ms[:db]]` for a Redis node
/// - `sqlite:<path>` for a SQLite node
/// - `memory` for a process-local node
impl FromStr for ServerDescriptor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty server descriptor".to_string());
        }
        if s.eq_ignore_ascii_case("memory") {
            return Ok(ServerDescriptor::Memory);
        }
        if let Some(path) = s.strip_prefix("sqlite:") {
            if path.is_empty() {
                return Err("sqlite descriptor needs a path, e.g. sqlite:/tmp/locks.db".to_string());
            }
            return Ok(ServerDescriptor::Sqlite {
                path: path.to_string(),
                timeout_ms: DEFAULT_TIMEOUT_MS,
            });
        }

        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() < 2 || parts.len() > 4 {
            return Err(format!(
                "Invalid server '{}'. Expected host:port[:timeout_ms[:db]], sqlite:<path> or memory",
                s
            ));
        }
        if parts[0].is_empty() {
            return Err(format!("Invalid server '{}': host is empty", s));
        }
        let port = parts[1]
            .parse::<u16>()
            .map_err(|e| format!("Invalid port '{}' in '{}': {}", parts[1], s, e))?;
        let timeout_ms = match parts.get(2) {
            Some(t) => t
                .parse::<u64>()
                .map_err(|e| format!("Invalid timeout '{}' in '{}': {}", t, s, e))?,
            None => DEFAULT_TIMEOUT_MS,
        };
        let db = match parts.get(3) {
            Some(d) => Some(
                d.parse::<i64>()
                    .map_err(|e| format!("Invalid db index '{}' in '{}': {}", d, s, e))?,
            ),
            None => None,
        };

        Ok(ServerDescriptor::Redis {
            host: parts[0].to_string(),
            port,
            timeout_ms,
            db,
        })
    }
}
