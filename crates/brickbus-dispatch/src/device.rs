//! Devices: the generic subscriber implementation.
//!
//! A [`Device<R>`] pairs a subscription with a typed handler. The dispatcher
//! talks to it through the object-safe [`Subscriber`] trait, so the registry
//! holds `Arc<dyn Subscriber>` while each device keeps its concrete decode
//! target as a type parameter.

use crate::future::PacketFuture;
use crate::resulter::FromPacket;
use brickbus_core::{DeviceUid, Error, IdGenerator, Result, fallback_id};
use brickbus_protocol::{ChosenFields, Event, Packet, Subscription};
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::oneshot;

/// The registration unit the dispatcher works with.
///
/// `notify` is synchronous and cheap; the dispatcher already runs it on a
/// dedicated task per delivery, so implementations must not block.
pub trait Subscriber: Send + Sync {
    /// Registry key within a routing-hash bucket.
    fn id(&self) -> &str;

    /// What this subscriber wants to receive.
    fn subscription(&self) -> &Subscription;

    /// Deliver one event. The subscriber owns the event copy.
    fn notify(&self, event: Event);
}

type Handler<R> = Box<dyn Fn(Result<R>) + Send + Sync>;

/// A subscriber that decodes matching packets into `R` and hands the result
/// to its handler.
///
/// Decoding happens per notification, so callback devices produce a fresh
/// value for every matching packet.
pub struct Device<R: FromPacket> {
    id: String,
    subscription: Subscription,
    handler: Handler<R>,
}

impl<R: FromPacket + 'static> Device<R> {
    /// Start building a device matching `function_id`.
    #[must_use]
    pub fn builder(function_id: u8) -> DeviceBuilder<R> {
        DeviceBuilder {
            id: String::new(),
            uid: None,
            function_id,
            request: None,
            request_payload: None,
            callback: false,
            _result: PhantomData,
        }
    }
}

impl<R: FromPacket> Subscriber for Device<R> {
    fn id(&self) -> &str {
        &self.id
    }

    fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    fn notify(&self, event: Event) {
        if let Some(err) = event.error {
            (self.handler)(Err(err));
            return;
        }
        let Some(packet) = event.packet else {
            (self.handler)(Err(Error::SubscriptionMismatch));
            return;
        };
        let chosen = self.subscription.chosen();
        if chosen.contains(ChosenFields::FUNCTION_ID)
            && packet.header.function_id != self.subscription.function_id()
        {
            (self.handler)(Err(Error::SubscriptionMismatch));
            return;
        }
        if chosen.contains(ChosenFields::DEVICE_UID) && packet.header.uid != self.subscription.uid()
        {
            (self.handler)(Err(Error::SubscriptionMismatch));
            return;
        }
        (self.handler)(R::from_packet(&packet));
    }
}

/// Builder for [`Device`]. An empty id is replaced with a generated label at
/// build time.
pub struct DeviceBuilder<R> {
    id: String,
    uid: Option<DeviceUid>,
    function_id: u8,
    request: Option<Packet>,
    request_payload: Option<Vec<u8>>,
    callback: bool,
    _result: PhantomData<fn(R)>,
}

impl<R: FromPacket + 'static> DeviceBuilder<R> {
    /// Explicit subscriber id. Without one the build falls back to a label
    /// from the dispatcher's id generator.
    #[must_use]
    pub fn id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    /// Narrow the match to one device uid. Without this the device matches
    /// its function id on any device.
    #[must_use]
    pub fn device(mut self, uid: DeviceUid) -> Self {
        self.uid = Some(uid);
        self
    }

    /// A fully formed request packet to send on subscribe.
    #[must_use]
    pub fn request(mut self, packet: Packet) -> Self {
        self.request = Some(packet);
        self
    }

    /// Build the request from a payload instead; an empty payload yields a
    /// bare getter request.
    #[must_use]
    pub fn request_payload(mut self, payload: Vec<u8>) -> Self {
        self.request_payload = Some(payload);
        self
    }

    /// Keep the subscription alive across deliveries instead of firing once.
    #[must_use]
    pub fn callback(mut self, callback: bool) -> Self {
        self.callback = callback;
        self
    }

    fn subscription(&self) -> Result<Subscription> {
        let request = match (&self.request, &self.request_payload) {
            (Some(packet), _) => Some(packet.clone()),
            (None, Some(payload)) => Some(Packet::request_with_payload(
                self.uid.unwrap_or(DeviceUid::new(0)),
                self.function_id,
                payload.clone(),
            )?),
            (None, None) => None,
        };
        Ok(match self.uid {
            Some(uid) => Subscription::for_device(uid, self.function_id, request, self.callback),
            None => Subscription::for_function(self.function_id, request, self.callback),
        })
    }

    /// Finish with a handler invoked once per delivery.
    ///
    /// # Errors
    /// Returns `Error::InvalidPacket` if the request payload exceeds the
    /// packet limits.
    pub fn build(
        self,
        ids: &IdGenerator,
        handler: impl Fn(Result<R>) + Send + Sync + 'static,
    ) -> Result<Arc<Device<R>>> {
        let subscription = self.subscription()?;
        Ok(Arc::new(Device {
            id: fallback_id(&self.id, "Device", ids),
            subscription,
            handler: Box::new(handler),
        }))
    }

    /// Finish with a one-shot future instead of a handler. The device fires
    /// once and resolves the future with the first result; callback mode is
    /// overridden since a one-shot promise cannot fire twice.
    ///
    /// # Errors
    /// As [`build`](Self::build).
    pub fn build_future(mut self, ids: &IdGenerator) -> Result<(Arc<Device<R>>, PacketFuture<R>)>
    where
        R: Send,
    {
        self.callback = false;
        let (tx, rx) = oneshot::channel();
        let tx = std::sync::Mutex::new(Some(tx));
        let device = self.build(ids, move |result| {
            let sender = tx
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .take();
            if let Some(sender) = sender {
                let _ = sender.send(result);
            }
        })?;
        Ok((device, PacketFuture::new(rx)))
    }
}
