//! Wire-level size constants shared across the workspace.

/// Fixed size of the packet header in bytes.
pub const HEADER_LENGTH: usize = 8;

/// Maximum payload size in bytes.
pub const MAX_PAYLOAD_LENGTH: usize = 64;

/// Maximum optional-data size in bytes (beyond the payload ceiling).
pub const MAX_OPTIONAL_LENGTH: usize = 8;

/// Maximum total packet length (header + payload + optional data).
pub const MAX_PACKET_LENGTH: usize = HEADER_LENGTH + MAX_PAYLOAD_LENGTH + MAX_OPTIONAL_LENGTH;

/// Highest sequence number before wrapping back to 1.
pub const MAX_SEQUENCE: u8 = 15;
