//! The virtual connector: no transport, only responder functions.
//!
//! Each outbound event is matched by routing hash against a table of
//! registered pure functions; a function's result, if any, becomes the next
//! receivable event. This lets the whole dispatch pipeline run without
//! hardware or sockets.

use crate::{Connector, SequenceNumber};
use brickbus_protocol::{ChosenFields, Event, RoutingHash};
use std::collections::HashMap;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// A responder: takes the outbound event, optionally produces the reply that
/// will be enqueued for `receive`.
pub type ResponderFn = Box<dyn Fn(&Event) -> Option<Event> + Send + Sync>;

pub struct VirtualConnector {
    responders: std::sync::Mutex<HashMap<RoutingHash, ResponderFn>>,
    fallback: std::sync::Mutex<Option<ResponderFn>>,
    in_tx: mpsc::Sender<Event>,
    in_rx: Mutex<mpsc::Receiver<Event>>,
    seq: SequenceNumber,
    cancel: CancellationToken,
}

impl VirtualConnector {
    #[must_use]
    pub fn new() -> Self {
        let (in_tx, in_rx) = mpsc::channel(20);
        VirtualConnector {
            responders: std::sync::Mutex::new(HashMap::new()),
            fallback: std::sync::Mutex::new(None),
            in_tx,
            in_rx: Mutex::new(in_rx),
            seq: SequenceNumber::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Register a responder under a routing hash. An existing responder for
    /// the same hash is replaced.
    pub fn attach_responder(
        &self,
        hash: RoutingHash,
        f: impl Fn(&Event) -> Option<Event> + Send + Sync + 'static,
    ) {
        self.responders().insert(hash, Box::new(f));
    }

    /// Remove a responder.
    pub fn detach_responder(&self, hash: &RoutingHash) {
        self.responders().remove(hash);
    }

    /// Register the fallback responder consulted when no hash matches.
    pub fn attach_fallback(&self, f: impl Fn(&Event) -> Option<Event> + Send + Sync + 'static) {
        *self.fallback() = Some(Box::new(f));
    }

    /// Drop the fallback responder; unmatched events are then absorbed.
    pub fn detach_fallback(&self) {
        *self.fallback() = None;
    }

    fn responders(&self) -> std::sync::MutexGuard<'_, HashMap<RoutingHash, ResponderFn>> {
        self.responders
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn fallback(&self) -> std::sync::MutexGuard<'_, Option<ResponderFn>> {
        self.fallback
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Run the matching responder for this event, probing every chosen-field
    /// combination, and fall back when none matches.
    fn respond(&self, event: &Event) -> Option<Event> {
        if let Some(packet) = &event.packet {
            let responders = self.responders();
            for chosen in ChosenFields::combinations() {
                let hash =
                    RoutingHash::compute(chosen, packet.header.uid, packet.header.function_id);
                if let Some(f) = responders.get(&hash) {
                    return f(event);
                }
            }
        }
        self.fallback().as_ref().and_then(|f| f(event))
    }
}

impl Default for VirtualConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for VirtualConnector {
    async fn send(&self, event: Event) {
        if self.cancel.is_cancelled() {
            trace!("send after close, event dropped");
            return;
        }
        let mut event = event;
        if let Some(packet) = &mut event.packet {
            packet.header.set_sequence(self.seq.next());
            packet.refresh_length();
        }
        if let Some(reply) = self.respond(&event)
            && self.in_tx.send(reply).await.is_err()
        {
            trace!("virtual connector closed, reply dropped");
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
        self.responders().clear();
        self.detach_fallback();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brickbus_core::DeviceUid;
    use brickbus_protocol::{Packet, Subscription};

    fn echo_responder(uid: u32, fid: u8) -> impl Fn(&Event) -> Option<Event> + Send + Sync {
        move |_ev| {
            let mut reply = Packet::request(DeviceUid::new(uid), fid);
            reply.set_payload(vec![0xff]).unwrap();
            Some(Event::from_packet(reply))
        }
    }

    #[tokio::test]
    async fn test_matching_responder_produces_reply() {
        let conn = VirtualConnector::new();
        let sub = Subscription::for_device(DeviceUid::new(5), 1, None, false);
        conn.attach_responder(sub.hash(), echo_responder(5, 1));

        conn.send(Event::from_packet(Packet::request(DeviceUid::new(5), 1)))
            .await;
        let reply = conn.receive().await.unwrap();
        assert_eq!(reply.packet.unwrap().payload(), &[0xff]);
    }

    #[tokio::test]
    async fn test_function_only_responder_matches_any_uid() {
        let conn = VirtualConnector::new();
        let sub = Subscription::for_function(7, None, false);
        conn.attach_responder(sub.hash(), echo_responder(0, 7));

        conn.send(Event::from_packet(Packet::request(DeviceUid::new(123), 7)))
            .await;
        assert!(conn.receive().await.is_some());
    }

    #[tokio::test]
    async fn test_unmatched_event_is_absorbed_without_fallback() {
        let conn = VirtualConnector::new();
        conn.send(Event::from_packet(Packet::request(DeviceUid::new(5), 1)))
            .await;
        conn.close().await;
        assert!(conn.receive().await.is_none());
    }

    #[tokio::test]
    async fn test_fallback_responder_fires_for_unmatched() {
        let conn = VirtualConnector::new();
        conn.attach_fallback(echo_responder(1, 1));
        conn.send(Event::from_packet(Packet::request(DeviceUid::new(5), 9)))
            .await;
        assert!(conn.receive().await.is_some());
    }

    #[tokio::test]
    async fn test_sequence_assigned_to_outbound() {
        let conn = VirtualConnector::new();
        let sub = Subscription::for_device(DeviceUid::new(5), 1, None, false);
        // the responder reflects the outbound packet so the test can see the
        // sequence the connector stamped on it
        conn.attach_responder(sub.hash(), |ev| {
            ev.packet.clone().map(Event::from_packet)
        });

        for expected in 1..=3 {
            conn.send(Event::from_packet(Packet::request(DeviceUid::new(5), 1)))
                .await;
            let reply = conn.receive().await.unwrap();
            assert_eq!(reply.packet.unwrap().header.sequence(), expected);
        }
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let conn = VirtualConnector::new();
        conn.close().await;
        conn.close().await;
        assert!(conn.receive().await.is_none());
        assert!(conn.receive().await.is_none());
    }
}
