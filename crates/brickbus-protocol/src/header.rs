//! Fixed 8-byte packet header.
//!
//! Little-endian wire layout, bit-exact for interop with the daemon:
//!
//! ```text
//! device uid : u32
//! length     : u8   (8..=80, total packet length)
//! function id: u8
//! sequence(4) | response-expected(1) | reserved(2) : u8
//! error-code(2) | reserved(6)                      : u8
//! ```

use brickbus_core::{DeviceUid, Error, constants::HEADER_LENGTH};
use bytes::{Buf, BufMut, BytesMut};
use std::fmt;

/// Error code embedded in a response header by the device side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Ok,
    InvalidParameter,
    FunctionNotSupported,
    Unknown,
}

impl ErrorCode {
    /// Decode from the two error bits.
    #[must_use]
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => ErrorCode::Ok,
            1 => ErrorCode::InvalidParameter,
            2 => ErrorCode::FunctionNotSupported,
            _ => ErrorCode::Unknown,
        }
    }

    /// Encode back into the two error bits.
    #[must_use]
    pub fn to_bits(self) -> u8 {
        match self {
            ErrorCode::Ok => 0,
            ErrorCode::InvalidParameter => 1,
            ErrorCode::FunctionNotSupported => 2,
            ErrorCode::Unknown => 3,
        }
    }

    /// A non-OK code as a reportable error, `None` for OK.
    #[must_use]
    pub fn as_error(self) -> Option<Error> {
        match self {
            ErrorCode::Ok => None,
            other => Some(Error::Device {
                code: other.to_bits(),
            }),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Ok => write!(f, "ok"),
            ErrorCode::InvalidParameter => write!(f, "invalid parameter"),
            ErrorCode::FunctionNotSupported => write!(f, "function not supported"),
            ErrorCode::Unknown => write!(f, "unknown"),
        }
    }
}

/// Packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub uid: DeviceUid,
    pub length: u8,
    pub function_id: u8,
    pub sequence_and_options: u8,
    pub error_and_reserved: u8,
}

impl Header {
    /// Create a header for a bare (payload-less) packet.
    #[must_use]
    pub fn new(uid: DeviceUid, function_id: u8) -> Self {
        Header {
            uid,
            length: HEADER_LENGTH as u8,
            function_id,
            sequence_and_options: 0,
            error_and_reserved: 0,
        }
    }

    /// Current sequence number (upper 4 bits).
    #[must_use]
    pub fn sequence(&self) -> u8 {
        (self.sequence_and_options >> 4) & 0x0f
    }

    /// Overwrite the sequence number. The field is fully replaced, never
    /// OR-merged, so reassignment on retransmit is safe.
    pub fn set_sequence(&mut self, seq: u8) {
        self.sequence_and_options = (self.sequence_and_options & 0x0f) | ((seq & 0x0f) << 4);
    }

    /// Whether the sender expects a response packet.
    #[must_use]
    pub fn response_expected(&self) -> bool {
        (self.sequence_and_options >> 3) & 1 == 1
    }

    /// Set or clear the response-expected flag.
    pub fn set_response_expected(&mut self, expected: bool) {
        if expected {
            self.sequence_and_options |= 1 << 3;
        } else {
            self.sequence_and_options &= !(1 << 3);
        }
    }

    /// Device-side error code (upper 2 bits of the last byte).
    #[must_use]
    pub fn error_code(&self) -> ErrorCode {
        ErrorCode::from_bits((self.error_and_reserved >> 6) & 0x03)
    }

    /// Stamp a device-side error code into the header.
    pub fn set_error_code(&mut self, code: ErrorCode) {
        self.error_and_reserved = (self.error_and_reserved & 0x3f) | (code.to_bits() << 6);
    }

    /// Reserved bits kept for future protocol revisions.
    #[must_use]
    pub fn reserved(&self) -> u8 {
        self.error_and_reserved & 0x3f
    }

    /// Serialize into the wire layout.
    pub fn write_to(&self, dst: &mut BytesMut) {
        dst.put_u32_le(self.uid.as_u32());
        dst.put_u8(self.length);
        dst.put_u8(self.function_id);
        dst.put_u8(self.sequence_and_options);
        dst.put_u8(self.error_and_reserved);
    }

    /// Parse from the wire layout. The caller guarantees 8 readable bytes.
    pub fn parse(src: &mut impl Buf) -> Self {
        Header {
            uid: DeviceUid::new(src.get_u32_le()),
            length: src.get_u8(),
            function_id: src.get_u8(),
            sequence_and_options: src.get_u8(),
            error_and_reserved: src.get_u8(),
        }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Header[uid={}, length={}, fid={}, seq={}, response_expected={}, error={}]",
            self.uid,
            self.length,
            self.function_id,
            self.sequence(),
            self.response_expected(),
            self.error_code()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_sequence_is_overwritten_not_merged() {
        let mut h = Header::new(DeviceUid::new(1), 2);
        h.set_sequence(15);
        assert_eq!(h.sequence(), 15);
        h.set_sequence(1);
        assert_eq!(h.sequence(), 1);
    }

    #[test]
    fn test_sequence_does_not_clobber_options() {
        let mut h = Header::new(DeviceUid::new(1), 2);
        h.set_response_expected(true);
        h.set_sequence(7);
        assert!(h.response_expected());
        h.set_response_expected(false);
        assert_eq!(h.sequence(), 7);
        assert!(!h.response_expected());
    }

    #[rstest]
    #[case(0, ErrorCode::Ok)]
    #[case(1, ErrorCode::InvalidParameter)]
    #[case(2, ErrorCode::FunctionNotSupported)]
    #[case(3, ErrorCode::Unknown)]
    fn test_error_code_bits(#[case] bits: u8, #[case] expected: ErrorCode) {
        let mut h = Header::new(DeviceUid::new(9), 0);
        h.set_error_code(ErrorCode::from_bits(bits));
        assert_eq!(h.error_code(), expected);
        assert_eq!(expected.to_bits(), bits);
    }

    #[test]
    fn test_error_code_as_error() {
        assert_eq!(ErrorCode::Ok.as_error(), None);
        assert_eq!(
            ErrorCode::InvalidParameter.as_error(),
            Some(Error::Device { code: 1 })
        );
    }

    #[test]
    fn test_wire_roundtrip_little_endian() {
        let mut h = Header::new(DeviceUid::new(0x0102_0304), 42);
        h.set_sequence(5);
        h.set_response_expected(true);

        let mut buf = BytesMut::new();
        h.write_to(&mut buf);
        assert_eq!(&buf[..4], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(buf.len(), HEADER_LENGTH);

        let parsed = Header::parse(&mut buf.freeze());
        assert_eq!(parsed, h);
    }
}
