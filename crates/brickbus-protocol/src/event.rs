//! The envelope connectors and the dispatcher exchange: a packet and/or an
//! error, a timestamp, and the name of the connector it arrived on or is
//! destined for.

use crate::Packet;
use brickbus_core::Error;
use chrono::{DateTime, Utc};
use std::fmt;

/// At least one of `error` and `packet` is meaningful in every event the
/// pipeline produces; end-of-stream is signalled by `Connector::receive`
/// returning `None`, not by an empty event.
#[derive(Debug, Clone)]
pub struct Event {
    pub error: Option<Error>,
    pub timestamp: DateTime<Utc>,
    pub packet: Option<Packet>,
    pub connector_name: String,
}

impl Event {
    pub fn new(error: Option<Error>, packet: Option<Packet>) -> Self {
        Event {
            error,
            timestamp: Utc::now(),
            packet,
            connector_name: String::new(),
        }
    }

    /// An event carrying only a packet.
    pub fn from_packet(packet: Packet) -> Self {
        Event::new(None, Some(packet))
    }

    /// An event carrying only an error.
    pub fn from_error(error: Error) -> Self {
        Event::new(Some(error), None)
    }

    /// Tag the event with the connector it belongs to.
    #[must_use]
    pub fn with_connector(mut self, name: &str) -> Self {
        self.connector_name = name.to_string();
        self
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Event[connector='{}'", self.connector_name)?;
        match &self.packet {
            Some(p) => write!(f, ", {p}")?,
            None => write!(f, ", packet=<none>")?,
        }
        match &self.error {
            Some(e) => write!(f, ", error={e}]"),
            None => write!(f, ", error=<none>]"),
        }
    }
}
