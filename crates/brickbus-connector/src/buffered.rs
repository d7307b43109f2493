//! The buffered connector: two bounded queues, each driven by its own
//! background pump.
//!
//! The write pump owns sequence assignment: every outbound packet gets the
//! next 1..15 number and a recomputed length immediately before
//! transmission, so callers never touch sequencing. Malformed outbound
//! events (error set, or no packet) are dropped instead of transmitted.
//!
//! The read pump decodes packets off the transport, wraps each as an event
//! and races the enqueue against the close signal, so a consumer that is
//! closing concurrently can never wedge the pump. On the first read failure
//! that means the connection is gone the pump stops and the inbound queue
//! closes, after which `receive` returns `None` forever.

use crate::{ConnectConfig, Connector, SequenceNumber, Transport};
use brickbus_core::{Error, Result};
use brickbus_protocol::{Event, PacketCodec};
use futures::{SinkExt, StreamExt};
use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Queue capacities for the buffered connector.
#[derive(Debug, Clone)]
pub struct BufferedConfig {
    /// Capacity of the inbound queue feeding `receive`.
    pub inbound_capacity: usize,

    /// Capacity of the outbound queue behind `send`.
    pub outbound_capacity: usize,
}

impl Default for BufferedConfig {
    fn default() -> Self {
        Self {
            inbound_capacity: 32,
            outbound_capacity: 32,
        }
    }
}

pub struct BufferedConnector {
    out_tx: mpsc::Sender<Event>,
    in_rx: Mutex<mpsc::Receiver<Event>>,
    cancel: CancellationToken,
    pumps: Mutex<Option<JoinSet<()>>>,
}

impl BufferedConnector {
    /// Connect to a daemon over TCP and start the pumps.
    ///
    /// # Errors
    /// Returns `Error::Transport` if the connection cannot be established.
    pub async fn connect(addr: impl ToSocketAddrs, config: BufferedConfig) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        // Nagle would delay small request packets behind earlier ones.
        if let Err(e) = stream.set_nodelay(true) {
            warn!(error = %e, "failed to set TCP_NODELAY");
        }
        debug!("buffered connector connected");
        Ok(Self::from_stream(stream, config))
    }

    /// Connect with an explicit address and connect timeout.
    ///
    /// # Errors
    /// Returns `Error::Timeout` when the dial exceeds the configured timeout,
    /// `Error::Transport` on any other connection failure.
    pub async fn connect_with(connect: &ConnectConfig, config: BufferedConfig) -> Result<Self> {
        tokio::time::timeout(
            connect.connect_timeout,
            Self::connect(connect.addr.as_str(), config),
        )
        .await
        .map_err(|_| Error::Timeout)?
    }

    /// Wrap an already-established byte stream. Used by tests with
    /// `tokio::io::duplex` and by callers that dial their own transport.
    pub fn from_stream<T: Transport>(stream: T, config: BufferedConfig) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        let (in_tx, in_rx) = mpsc::channel(config.inbound_capacity.max(1));
        let (out_tx, out_rx) = mpsc::channel(config.outbound_capacity.max(1));
        let cancel = CancellationToken::new();

        let mut pumps = JoinSet::new();
        pumps.spawn(read_pump(
            FramedRead::new(read_half, PacketCodec::new()),
            in_tx,
            cancel.clone(),
        ));
        pumps.spawn(write_pump(
            FramedWrite::new(write_half, PacketCodec::new()),
            out_rx,
            cancel.clone(),
        ));

        BufferedConnector {
            out_tx,
            in_rx: Mutex::new(in_rx),
            cancel,
            pumps: Mutex::new(Some(pumps)),
        }
    }
}

impl Connector for BufferedConnector {
    async fn send(&self, event: Event) {
        if self.out_tx.send(event).await.is_err() {
            trace!("send after close, event dropped");
        }
    }

    async fn receive(&self) -> Option<Event> {
        let mut in_rx = self.in_rx.lock().await;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            ev = in_rx.recv() => ev,
        }
    }

    async fn close(&self) {
        self.cancel.cancel();
        // Join the pumps so no task outlives close; a second close finds
        // them already taken and returns immediately.
        if let Some(mut pumps) = self.pumps.lock().await.take() {
            while pumps.join_next().await.is_some() {}
            debug!("buffered connector closed");
        }
    }
}

async fn read_pump<T: Transport>(
    mut source: FramedRead<ReadHalf<T>, PacketCodec>,
    in_tx: mpsc::Sender<Event>,
    cancel: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            frame = source.next() => frame,
        };
        let event = match frame {
            Some(Ok(packet)) => Event::new(packet.header.error_code().as_error(), Some(packet)),
            Some(Err(e)) => Event::from_error(e),
            None => break, // transport exhausted
        };
        // Connection gone once an event arrives without a packet.
        let fatal = event.packet.is_none();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break, // consumer closing, abandon the packet
            sent = in_tx.send(event) => {
                if sent.is_err() {
                    break;
                }
            }
        }
        if fatal {
            break;
        }
    }
    // in_tx drops here: the inbound queue closes and receive() returns None
    // forever after.
}

async fn write_pump<T: Transport>(
    mut sink: FramedWrite<WriteHalf<T>, PacketCodec>,
    mut out_rx: mpsc::Receiver<Event>,
    cancel: CancellationToken,
) {
    let seq = SequenceNumber::new();
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            ev = out_rx.recv() => ev,
        };
        let Some(ev) = next else { break };
        let Event {
            error: None,
            packet: Some(mut packet),
            ..
        } = ev
        else {
            trace!("dropping malformed outbound event");
            continue;
        };
        packet.header.set_sequence(seq.next());
        packet.refresh_length();
        if let Err(e) = sink.send(packet).await {
            warn!(error = %e, "write failed, stopping write pump");
            break;
        }
    }
    let _ = sink.close().await;
}
