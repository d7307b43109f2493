use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Device identity as reported by the daemon (decoded from its base58 form
/// upstream; this crate only ever sees the 32-bit value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceUid(u32);

impl DeviceUid {
    /// Create a device uid from its raw 32-bit value.
    #[must_use]
    pub fn new(uid: u32) -> Self {
        DeviceUid(uid)
    }

    /// Get the raw uid as u32.
    #[must_use]
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for DeviceUid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for DeviceUid {
    fn from(uid: u32) -> Self {
        DeviceUid(uid)
    }
}

/// Monotonic id source for auto-naming anonymous subscribers.
///
/// The original binding kept a process-wide generator behind a background
/// task; here it is an explicitly constructed counter owned by whoever needs
/// one (typically the dispatcher), which keeps tests deterministic and
/// instances independent.
#[derive(Debug, Default)]
pub struct IdGenerator {
    next: AtomicU32,
}

impl IdGenerator {
    /// Create a generator starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the next id.
    pub fn next_id(&self) -> u32 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Hand out a label like `Device 0004` for a fresh id.
    pub fn label(&self, prefix: &str) -> String {
        format!("{} {:04}", prefix, self.next_id())
    }
}

/// Fill in a generated label when the caller passed an empty id.
pub fn fallback_id(id: &str, prefix: &str, ids: &IdGenerator) -> String {
    if id.is_empty() {
        ids.label(prefix)
    } else {
        id.to_string()
    }
}
