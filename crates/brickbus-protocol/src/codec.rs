//! Tokio codec for packet framing over a byte stream.
//!
//! The wire format is length-prefixed binary: a fixed 8-byte header whose
//! fifth byte announces the total packet length (8..=80), followed by the
//! payload and optional data. The codec plugs into `tokio_util::codec`'s
//! `FramedRead`/`FramedWrite` the way connectors consume it.

use crate::Packet;
use brickbus_core::{
    Error, Result,
    constants::{HEADER_LENGTH, MAX_PACKET_LENGTH},
};
use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Offset of the length byte inside the header.
const LENGTH_OFFSET: usize = 4;

#[derive(Debug, Default)]
pub struct PacketCodec;

impl PacketCodec {
    #[must_use]
    pub fn new() -> Self {
        PacketCodec
    }
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>> {
        if src.len() < HEADER_LENGTH {
            return Ok(None);
        }
        let total = usize::from(src[LENGTH_OFFSET]);
        if !(HEADER_LENGTH..=MAX_PACKET_LENGTH).contains(&total) {
            return Err(Error::InvalidPacket(format!(
                "announced length {total} outside {HEADER_LENGTH}..={MAX_PACKET_LENGTH}"
            )));
        }
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }
        let mut frame = src.split_to(total).freeze();
        Packet::parse(&mut frame).map(Some)
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = Error;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<()> {
        dst.reserve(usize::from(item.header.length));
        item.write_to(dst);
        Ok(())
    }
}
