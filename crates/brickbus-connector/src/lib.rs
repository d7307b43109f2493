//! Connectors: the transport capability between the dispatcher and a brick
//! daemon.
//!
//! A connector accepts outbound events, produces a lazy sequence of inbound
//! events, and can be torn down idempotently. Three variants share the
//! contract:
//!
//! - [`BufferedConnector`] — the reference implementation: two bounded
//!   queues, each driven by its own background pump.
//! - [`DirectConnector`] — one lock per direction, strict request-then-
//!   response ordering on a single link, no internal queues.
//! - [`VirtualConnector`] — no transport at all; outbound events are matched
//!   against a table of responder functions, for tests and simulation.

pub mod buffered;
pub mod config;
pub mod direct;
pub mod sequence;
pub mod traits;
pub mod virtual_conn;

pub use buffered::{BufferedConfig, BufferedConnector};
pub use config::ConnectConfig;
pub use direct::DirectConnector;
pub use sequence::SequenceNumber;
pub use traits::{AnyConnector, Connector, Transport};
pub use virtual_conn::{ResponderFn, VirtualConnector};
