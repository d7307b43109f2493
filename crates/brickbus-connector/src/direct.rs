//! The direct connector: one lock per direction, no internal queues.
//!
//! Trades throughput for strict request-then-response ordering on a single
//! physical link. Sends serialize on the write lock, receives on the read
//! lock; there are no pumps to supervise.

use crate::{ConnectConfig, Connector, SequenceNumber, Transport};
use brickbus_core::{Error, Result};
use brickbus_protocol::{Event, PacketCodec};
use futures::{SinkExt, StreamExt};
use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

type BoxedTransport = Box<dyn DynTransport>;

/// Object-safe alias so the connector is not generic over its transport.
trait DynTransport: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + Unpin {}
impl<T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + Unpin> DynTransport for T {}

pub struct DirectConnector {
    writer: Mutex<FramedWrite<WriteHalf<BoxedTransport>, PacketCodec>>,
    reader: Mutex<FramedRead<ReadHalf<BoxedTransport>, PacketCodec>>,
    seq: SequenceNumber,
    cancel: CancellationToken,
}

impl DirectConnector {
    /// Connect to a daemon over TCP.
    ///
    /// # Errors
    /// Returns `Error::Transport` if the connection cannot be established.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        if let Err(e) = stream.set_nodelay(true) {
            warn!(error = %e, "failed to set TCP_NODELAY");
        }
        debug!("direct connector connected");
        Ok(Self::from_stream(stream))
    }

    /// Connect with an explicit address and connect timeout.
    ///
    /// # Errors
    /// Returns `Error::Timeout` when the dial exceeds the configured timeout,
    /// `Error::Transport` on any other connection failure.
    pub async fn connect_with(connect: &ConnectConfig) -> Result<Self> {
        tokio::time::timeout(connect.connect_timeout, Self::connect(connect.addr.as_str()))
            .await
            .map_err(|_| Error::Timeout)?
    }

    /// Wrap an already-established byte stream.
    pub fn from_stream<T: Transport>(stream: T) -> Self {
        let boxed: BoxedTransport = Box::new(stream);
        let (read_half, write_half) = tokio::io::split(boxed);
        DirectConnector {
            writer: Mutex::new(FramedWrite::new(write_half, PacketCodec::new())),
            reader: Mutex::new(FramedRead::new(read_half, PacketCodec::new())),
            seq: SequenceNumber::new(),
            cancel: CancellationToken::new(),
        }
    }
}

impl Connector for DirectConnector {
    async fn send(&self, event: Event) {
        if self.cancel.is_cancelled() {
            trace!("send after close, event dropped");
            return;
        }
        let Event {
            error: None,
            packet: Some(mut packet),
            ..
        } = event
        else {
            trace!("dropping malformed outbound event");
            return;
        };
        let mut writer = self.writer.lock().await;
        packet.header.set_sequence(self.seq.next());
        packet.refresh_length();
        if let Err(e) = writer.send(packet).await {
            warn!(error = %e, "write failed");
        }
    }

    async fn receive(&self) -> Option<Event> {
        let mut reader = self.reader.lock().await;
        let frame = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return None,
            frame = reader.next() => frame?,
        };
        Some(match frame {
            Ok(packet) => Event::new(packet.header.error_code().as_error(), Some(packet)),
            Err(e) => Event::from_error(e),
        })
    }

    async fn close(&self) {
        self.cancel.cancel();
        let mut writer = self.writer.lock().await;
        if writer.close().await.is_ok() {
            debug!("direct connector closed");
        }
    }
}
