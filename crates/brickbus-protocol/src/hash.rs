//! Routing hashes: the subscriber lookup key.
//!
//! A subscription picks which header fields participate in matching via a
//! chosen-fields bitmask, and the hash is a pure digest of the selected
//! values. That indirection is what lets "any device, this function" and
//! "this exact device and function" subscribers coexist in one registry.

use bitflags::bitflags;
use brickbus_core::DeviceUid;
use sha2::{Digest, Sha256};
use std::fmt;

bitflags! {
    /// Which header fields participate in routing-hash computation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ChosenFields: u8 {
        const FUNCTION_ID = 0b01;
        const DEVICE_UID = 0b10;
    }
}

impl ChosenFields {
    /// All four possible combinations, the probe order used during dispatch.
    #[must_use]
    pub fn combinations() -> [ChosenFields; 4] {
        [
            ChosenFields::empty(),
            ChosenFields::FUNCTION_ID,
            ChosenFields::DEVICE_UID,
            ChosenFields::FUNCTION_ID | ChosenFields::DEVICE_UID,
        ]
    }
}

/// Fixed-size digest over the chosen header fields.
///
/// Deterministic in `(chosen, uid, function_id)` alone; equality is bytewise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoutingHash([u8; 32]);

impl RoutingHash {
    /// Compute the routing hash. Omitted fields contribute nothing to the
    /// canonical token string, not a default value.
    #[must_use]
    pub fn compute(chosen: ChosenFields, uid: DeviceUid, function_id: u8) -> Self {
        let mut canonical = String::new();
        if chosen.contains(ChosenFields::FUNCTION_ID) {
            canonical.push_str(&format!("|function-id={function_id}"));
        }
        if chosen.contains(ChosenFields::DEVICE_UID) {
            canonical.push_str(&format!("|device-identity={}", uid.as_u32()));
        }
        canonical.push('|');
        RoutingHash(Sha256::digest(canonical.as_bytes()).into())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for RoutingHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0[..8] {
            write!(f, "{b:02x}")?;
        }
        write!(f, "…")
    }
}
