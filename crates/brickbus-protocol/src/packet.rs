//! Wire packet: header plus up to 64 payload bytes plus up to 8 bytes of
//! optional data beyond the payload ceiling.
//!
//! The header length field always equals `8 + payload + optional data` and is
//! recomputed whenever either buffer changes. `Clone` is a deep copy (all
//! buffers owned), which is what lets the dispatcher hand each concurrently
//! notified subscriber its own packet.

use crate::header::Header;
use brickbus_core::{
    DeviceUid, Error, Result,
    constants::{HEADER_LENGTH, MAX_OPTIONAL_LENGTH, MAX_PACKET_LENGTH, MAX_PAYLOAD_LENGTH},
};
use bytes::{Buf, BufMut, BytesMut};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: Header,
    payload: Vec<u8>,
    optional_data: Vec<u8>,
}

impl Packet {
    /// A request packet with no payload, response expected.
    #[must_use]
    pub fn request(uid: DeviceUid, function_id: u8) -> Self {
        let mut header = Header::new(uid, function_id);
        header.set_response_expected(true);
        Packet {
            header,
            payload: Vec::new(),
            optional_data: Vec::new(),
        }
    }

    /// A request packet carrying a payload, response expected.
    ///
    /// # Errors
    /// Returns `Error::InvalidPacket` if the payload exceeds 64 bytes.
    pub fn request_with_payload(uid: DeviceUid, function_id: u8, payload: Vec<u8>) -> Result<Self> {
        let mut packet = Packet::request(uid, function_id);
        packet.set_payload(payload)?;
        Ok(packet)
    }

    /// A bare packet around an existing header, e.g. for responses built by
    /// virtual responders. Length is reset to match the (empty) buffers.
    #[must_use]
    pub fn from_header(mut header: Header) -> Self {
        header.length = HEADER_LENGTH as u8;
        Packet {
            header,
            payload: Vec::new(),
            optional_data: Vec::new(),
        }
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[must_use]
    pub fn optional_data(&self) -> &[u8] {
        &self.optional_data
    }

    /// Replace the payload and recompute the header length.
    ///
    /// # Errors
    /// Returns `Error::InvalidPacket` if the payload exceeds 64 bytes.
    pub fn set_payload(&mut self, payload: Vec<u8>) -> Result<()> {
        if payload.len() > MAX_PAYLOAD_LENGTH {
            return Err(Error::InvalidPacket(format!(
                "payload of {} bytes exceeds the {MAX_PAYLOAD_LENGTH}-byte limit",
                payload.len()
            )));
        }
        self.payload = payload;
        self.header.length = self.compute_length();
        Ok(())
    }

    /// Replace the optional data and recompute the header length.
    ///
    /// # Errors
    /// Returns `Error::InvalidPacket` if the data exceeds 8 bytes.
    pub fn set_optional_data(&mut self, data: Vec<u8>) -> Result<()> {
        if data.len() > MAX_OPTIONAL_LENGTH {
            return Err(Error::InvalidPacket(format!(
                "optional data of {} bytes exceeds the {MAX_OPTIONAL_LENGTH}-byte limit",
                data.len()
            )));
        }
        self.optional_data = data;
        self.header.length = self.compute_length();
        Ok(())
    }

    /// Total packet length: header plus current payload and optional data.
    #[must_use]
    pub fn compute_length(&self) -> u8 {
        (HEADER_LENGTH + self.payload.len() + self.optional_data.len()) as u8
    }

    /// Refresh the header length field. Called by connectors right before
    /// transmission, alongside sequence assignment.
    pub fn refresh_length(&mut self) {
        self.header.length = self.compute_length();
    }

    /// Serialize the whole packet into the wire layout. The payload is
    /// written only when the length exceeds the header, optional data only
    /// when it exceeds the payload ceiling.
    pub fn write_to(&self, dst: &mut BytesMut) {
        self.header.write_to(dst);
        if usize::from(self.header.length) > HEADER_LENGTH {
            dst.put_slice(&self.payload);
        }
        if usize::from(self.header.length) > HEADER_LENGTH + MAX_PAYLOAD_LENGTH {
            dst.put_slice(&self.optional_data);
        }
    }

    /// Parse one packet. The caller guarantees that `src` holds at least the
    /// full packet as announced by the length byte; the split between payload
    /// and optional data is derived from the length, capping the payload at
    /// 64 bytes with the remainder as optional data.
    ///
    /// # Errors
    /// Returns `Error::InvalidPacket` when the announced length is outside
    /// the 8..=80 range.
    pub fn parse(src: &mut impl Buf) -> Result<Self> {
        let header = Header::parse(src);
        let total = usize::from(header.length);
        if !(HEADER_LENGTH..=MAX_PACKET_LENGTH).contains(&total) {
            return Err(Error::InvalidPacket(format!(
                "announced length {total} outside {HEADER_LENGTH}..={MAX_PACKET_LENGTH}"
            )));
        }
        let body = total - HEADER_LENGTH;
        let payload_len = body.min(MAX_PAYLOAD_LENGTH);
        let mut payload = vec![0u8; payload_len];
        src.copy_to_slice(&mut payload);
        let mut optional_data = vec![0u8; body - payload_len];
        src.copy_to_slice(&mut optional_data);
        Ok(Packet {
            header,
            payload,
            optional_data,
        })
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Packet[{}, payload={}B, optional={}B]",
            self.header,
            self.payload.len(),
            self.optional_data.len()
        )
    }
}
