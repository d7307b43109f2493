//! The connector contract and its enum dispatch wrapper.

use crate::{BufferedConnector, DirectConnector, VirtualConnector};
use brickbus_protocol::Event;
use tokio::io::{AsyncRead, AsyncWrite};

/// Byte-stream transport a connector can drive. Blanket-implemented for
/// anything async-readable and -writable, so tests can hand in a
/// `tokio::io::duplex` half where production code hands in a `TcpStream`.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin + 'static> Transport for T {}

/// Something that can accept outbound events and produce a lazy, possibly
/// infinite sequence of inbound events.
///
/// - `send` is fire-and-forget from the caller's perspective; it may block
///   briefly on a bounded queue. The connector fixes up the packet's
///   sequence number and length before transmission.
/// - `receive` blocks until the next inbound event; it returns `None`
///   permanently once the underlying source is exhausted or closed.
/// - `close` is idempotent teardown: it releases the transport, stops the
///   pumps, and unblocks any blocked `receive` with `None`. No event is
///   delivered after `close` returns.
pub trait Connector {
    async fn send(&self, event: Event);
    async fn receive(&self) -> Option<Event>;
    async fn close(&self);
}

/// Enum dispatch over the connector variants.
///
/// Keeps the dispatcher free of trait objects while every variant stays a
/// concrete, independently testable type.
pub enum AnyConnector {
    Buffered(BufferedConnector),
    Direct(DirectConnector),
    Virtual(VirtualConnector),
}

impl Connector for AnyConnector {
    async fn send(&self, event: Event) {
        match self {
            AnyConnector::Buffered(c) => c.send(event).await,
            AnyConnector::Direct(c) => c.send(event).await,
            AnyConnector::Virtual(c) => c.send(event).await,
        }
    }

    async fn receive(&self) -> Option<Event> {
        match self {
            AnyConnector::Buffered(c) => c.receive().await,
            AnyConnector::Direct(c) => c.receive().await,
            AnyConnector::Virtual(c) => c.receive().await,
        }
    }

    async fn close(&self) {
        match self {
            AnyConnector::Buffered(c) => c.close().await,
            AnyConnector::Direct(c) => c.close().await,
            AnyConnector::Virtual(c) => c.close().await,
        }
    }
}

impl From<BufferedConnector> for AnyConnector {
    fn from(c: BufferedConnector) -> Self {
        AnyConnector::Buffered(c)
    }
}

impl From<DirectConnector> for AnyConnector {
    fn from(c: DirectConnector) -> Self {
        AnyConnector::Direct(c)
    }
}

impl From<VirtualConnector> for AnyConnector {
    fn from(c: VirtualConnector) -> Self {
        AnyConnector::Virtual(c)
    }
}
