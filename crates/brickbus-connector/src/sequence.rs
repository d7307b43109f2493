//! Per-connector sequence counter.

use brickbus_core::constants::MAX_SEQUENCE;
use std::sync::atomic::{AtomicU8, Ordering};

/// Monotonic 1..=15 counter, wrapping back to 1. One instance per connector;
/// the write pump (or locked send path) assigns the next value to every
/// outbound packet immediately before transmission.
#[derive(Debug, Default)]
pub struct SequenceNumber(AtomicU8);

impl SequenceNumber {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The next sequence number. After 15 the counter wraps to 1, never 0.
    pub fn next(&self) -> u8 {
        let prev = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v % MAX_SEQUENCE + 1)
            })
            .unwrap_or(0);
        prev % MAX_SEQUENCE + 1
    }
}
