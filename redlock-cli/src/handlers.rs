use redlock_core::types::Lease;
use serde::{Deserialize, Serialize};

// ─── Validation Constants ───────────────────────────────────────────────────

/// Longest resource name accepted over HTTP.
pub const MAX_RESOURCE_LEN: usize = 512;

// ─── Request Types ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct AcquireLockRequest {
    pub resource: String,
    /// Time-to-live in milliseconds
    pub ttl: u64,
}

impl AcquireLockRequest {
    pub fn validate(&self) -> Result<(), String> {
        validate_resource(&self.resource)?;
        if self.ttl == 0 {
            return Err("ttl must be greater than 0".to_string());
        }
        Ok(())
    }
}

pub fn validate_resource(resource: &str) -> Result<(), String> {
    if resource.is_empty() {
        return Err("resource is required".to_string());
    }
    if resource.len() > MAX_RESOURCE_LEN {
        return Err(format!(
            "resource must be at most {} bytes",
            MAX_RESOURCE_LEN
        ));
    }
    Ok(())
}

// ─── Response Types ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LeaseResponse {
    pub resource: String,
    pub token: String,
    pub validity_ms: u64,
}

impl From<&Lease> for LeaseResponse {
    fn from(lease: &Lease) -> Self {
        Self {
            resource: lease.resource.clone(),
            token: lease.token.clone(),
            validity_ms: lease.validity_ms(),
        }
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub servers: usize,
    pub quorum: usize,
    pub version: String,
}
