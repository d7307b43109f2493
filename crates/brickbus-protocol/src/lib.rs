//! Wire protocol for the brick daemon: packet layout, routing hashes,
//! subscriptions and the event envelope the connectors exchange.

pub mod codec;
pub mod event;
pub mod hash;
pub mod header;
pub mod packet;
pub mod subscription;

pub use codec::PacketCodec;
pub use event::Event;
pub use hash::{ChosenFields, RoutingHash};
pub use header::{ErrorCode, Header};
pub use packet::Packet;
pub use subscription::Subscription;
