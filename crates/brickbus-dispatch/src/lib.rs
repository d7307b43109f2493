//! Subscriber-side dispatch: typed result decoding, devices, one-shot
//! futures and the manager that routes connector events to subscribers.

pub mod device;
pub mod dispatcher;
pub mod future;
pub mod resulter;

pub use device::{Device, DeviceBuilder, Subscriber};
pub use dispatcher::{Destination, Dispatcher};
pub use future::PacketFuture;
pub use resulter::{EmptyResult, FromPacket};
