//! Typed decode targets for response packets.

use brickbus_core::Result;
use brickbus_protocol::Packet;

/// A value that can be decoded out of a response packet.
///
/// Decoding is a pure function of the packet, so a subscriber notified more
/// than once produces a fresh value each time. Implementations should check
/// the embedded error code first and report it instead of decoding garbage.
pub trait FromPacket: Sized {
    /// Decode a value from the packet.
    ///
    /// # Errors
    /// Returns `Error::Device` for a non-OK embedded error code and
    /// `Error::Decode` when the payload does not fit the expected shape.
    fn from_packet(packet: &Packet) -> Result<Self>;
}

/// The decode target for setters and other calls whose response carries no
/// payload. Only the embedded error code matters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmptyResult;

impl FromPacket for EmptyResult {
    fn from_packet(packet: &Packet) -> Result<Self> {
        match packet.header.error_code().as_error() {
            Some(err) => Err(err),
            None => Ok(EmptyResult),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brickbus_core::{DeviceUid, Error};
    use brickbus_protocol::ErrorCode;

    #[test]
    fn test_empty_result_accepts_ok_header() {
        let packet = Packet::request(DeviceUid::new(5), 1);
        assert_eq!(EmptyResult::from_packet(&packet), Ok(EmptyResult));
    }

    #[test]
    fn test_empty_result_reports_device_error() {
        let mut packet = Packet::request(DeviceUid::new(5), 1);
        packet.header.set_error_code(ErrorCode::FunctionNotSupported);
        assert_eq!(
            EmptyResult::from_packet(&packet),
            Err(Error::Device { code: 2 })
        );
    }
}
