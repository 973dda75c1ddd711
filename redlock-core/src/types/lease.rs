use std::time::Duration;

/// Proof of a successful acquisition.
///
/// Holds the resource name, the token written to the stores and how long the
/// holder may still assume exclusive ownership, measured from the moment
/// `lock()` returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    /// The locked resource (the store key)
    pub resource: String,
    /// Ownership token stored as the key's value
    pub token: String,
    /// Remaining validity after drift and elapsed time were deducted
    pub validity: Duration,
}

impl Lease {
    pub fn new(resource: impl Into<String>, token: impl Into<String>, validity: Duration) -> Self {
        Self {
            resource: resource.into(),
            token: token.into(),
            validity,
        }
    }

    /// Rebuilds a lease from a resource/token pair obtained elsewhere, so it
    /// can be handed to `unlock()`. The validity is unknown and left at zero.
    pub fn from_parts(resource: impl Into<String>, token: impl Into<String>) -> Self {
        Self::new(resource, token, Duration::ZERO)
    }

    /// Validity in whole milliseconds
    pub fn validity_ms(&self) -> u64 {
        self.validity.as_millis() as u64
    }
}
