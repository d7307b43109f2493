//! The dispatcher: owns connectors, runs their consumer tasks and routes
//! inbound events to subscribers.
//!
//! # Lifecycle
//!
//! 1. Create a dispatcher.
//! 2. `attach` connectors; the first one becomes the default.
//! 3. `subscribe` devices; subscriptions carrying a request packet trigger
//!    the request immediately.
//! 4. Inbound events are matched by routing hash and fanned out, one task
//!    per delivery, each subscriber with its own event copy.
//! 5. `shutdown` closes every connector and waits for the supervised tasks,
//!    so nothing fires after it returns.

use crate::device::Subscriber;
use brickbus_connector::{AnyConnector, Connector};
use brickbus_core::{DeviceUid, Error, IdGenerator, Result};
use brickbus_protocol::{ChosenFields, Event, Packet, RoutingHash};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, trace, warn};

/// Where an outbound packet should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// A connector by its attach name.
    Connector(String),

    /// The connector a device uid was mapped to via
    /// [`Dispatcher::map_uid`]; falls back to the default connector for
    /// unmapped uids.
    Device(DeviceUid),
}

#[derive(Default)]
struct ConnectorTable {
    by_name: HashMap<String, Arc<AnyConnector>>,
    attach_order: Vec<String>,
    default_name: Option<String>,
    uid_index: HashMap<DeviceUid, String>,
}

type Registry = HashMap<RoutingHash, HashMap<String, Arc<dyn Subscriber>>>;

struct Inner {
    connectors: RwLock<ConnectorTable>,
    registry: RwLock<Registry>,
    /// Every chosen-field combination any subscriber ever registered. The
    /// set only grows; probing a combination with no remaining subscribers
    /// is a cheap registry miss.
    active: std::sync::Mutex<HashSet<ChosenFields>>,
    default_subscriber: RwLock<Option<Arc<dyn Subscriber>>>,
    ids: IdGenerator,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    #[must_use]
    pub fn new() -> Self {
        Dispatcher {
            inner: Arc::new(Inner {
                connectors: RwLock::new(ConnectorTable::default()),
                registry: RwLock::new(HashMap::new()),
                active: std::sync::Mutex::new(HashSet::new()),
                default_subscriber: RwLock::new(None),
                ids: IdGenerator::new(),
                cancel: CancellationToken::new(),
                tracker: TaskTracker::new(),
            }),
        }
    }

    /// The id source used to label anonymous devices.
    #[must_use]
    pub fn ids(&self) -> &IdGenerator {
        &self.inner.ids
    }

    /// Register a connector under a name and start consuming its events.
    /// The first attached connector becomes the default destination.
    ///
    /// The dispatcher takes exclusive ownership; `release` or `shutdown`
    /// close the connector.
    ///
    /// # Errors
    /// Returns `Error::DuplicateConnectorName` when the name is taken.
    pub async fn attach(&self, name: &str, connector: AnyConnector) -> Result<()> {
        let connector = Arc::new(connector);
        {
            let mut table = self.inner.connectors.write().await;
            if table.by_name.contains_key(name) {
                return Err(Error::DuplicateConnectorName {
                    name: name.to_string(),
                });
            }
            table.by_name.insert(name.to_string(), connector.clone());
            table.attach_order.push(name.to_string());
            if table.default_name.is_none() {
                table.default_name = Some(name.to_string());
            }
        }
        debug!(connector = name, "connector attached");

        let inner = self.inner.clone();
        let name = name.to_string();
        self.inner.tracker.spawn(async move {
            loop {
                let event = tokio::select! {
                    biased;
                    _ = inner.cancel.cancelled() => break,
                    event = connector.receive() => event,
                };
                match event {
                    Some(event) => inner.dispatch(event.with_connector(&name)).await,
                    None => {
                        debug!(connector = %name, "connector stream ended");
                        break;
                    }
                }
            }
        });
        Ok(())
    }

    /// Detach a connector and close it. If it was the default, the earliest
    /// remaining attachment is promoted.
    ///
    /// # Errors
    /// Returns `Error::UnknownConnectorName` when no connector has the name.
    pub async fn release(&self, name: &str) -> Result<()> {
        let connector = {
            let mut table = self.inner.connectors.write().await;
            let connector =
                table
                    .by_name
                    .remove(name)
                    .ok_or_else(|| Error::UnknownConnectorName {
                        name: name.to_string(),
                    })?;
            table.attach_order.retain(|n| n != name);
            table.uid_index.retain(|_, n| n != name);
            if table.default_name.as_deref() == Some(name) {
                table.default_name = table.attach_order.first().cloned();
                debug!(promoted = ?table.default_name, "default connector released");
            }
            connector
        };
        connector.close().await;
        debug!(connector = name, "connector released");
        Ok(())
    }

    /// The current default connector name, if any connector is attached.
    pub async fn default_connector(&self) -> Option<String> {
        self.inner.connectors.read().await.default_name.clone()
    }

    /// Route future `Destination::Device` sends for this uid to the named
    /// connector.
    ///
    /// # Errors
    /// Returns `Error::UnknownConnectorName` when no connector has the name.
    pub async fn map_uid(&self, uid: DeviceUid, name: &str) -> Result<()> {
        let mut table = self.inner.connectors.write().await;
        if !table.by_name.contains_key(name) {
            return Err(Error::UnknownConnectorName {
                name: name.to_string(),
            });
        }
        table.uid_index.insert(uid, name.to_string());
        Ok(())
    }

    /// Register a subscriber. If its subscription carries a request packet,
    /// the request is sent to the resolved destination; a resolution failure
    /// is routed to the default subscriber as an error event instead of
    /// failing the registration.
    ///
    /// # Errors
    /// Returns `Error::SubscriberExists` when the same id is already
    /// registered under the same routing hash.
    pub async fn subscribe(
        &self,
        subscriber: Arc<dyn Subscriber>,
        destination: Option<Destination>,
    ) -> Result<()> {
        let subscription = subscriber.subscription().clone();
        let hash = subscription.hash();
        {
            let mut registry = self.inner.registry.write().await;
            let bucket = registry.entry(hash).or_default();
            if bucket.contains_key(subscriber.id()) {
                return Err(Error::SubscriberExists {
                    id: subscriber.id().to_string(),
                });
            }
            bucket.insert(subscriber.id().to_string(), subscriber.clone());
        }
        self.inner.active(subscription.chosen());
        trace!(id = subscriber.id(), %hash, "subscriber registered");

        if let Some(request) = subscription.request()
            && let Err(err) = self.send(request.clone(), destination).await
        {
            warn!(id = subscriber.id(), error = %err, "request could not be sent");
            self.inner.deliver_unmatched(Event::from_error(err)).await;
        }
        Ok(())
    }

    /// Remove a subscriber.
    ///
    /// # Errors
    /// Returns `Error::NoSubscriberToRelease` when it is not registered.
    pub async fn unsubscribe(&self, subscriber: &dyn Subscriber) -> Result<()> {
        let hash = subscriber.subscription().hash();
        let mut registry = self.inner.registry.write().await;
        let removed = match registry.get_mut(&hash) {
            Some(bucket) => {
                let removed = bucket.remove(subscriber.id()).is_some();
                if bucket.is_empty() {
                    registry.remove(&hash);
                }
                removed
            }
            None => false,
        };
        if removed {
            Ok(())
        } else {
            Err(Error::NoSubscriberToRelease {
                id: subscriber.id().to_string(),
            })
        }
    }

    /// Install the subscriber that receives everything nothing else matched:
    /// packet-less error events and packets no routing hash claimed.
    pub async fn set_default_subscriber(&self, subscriber: Arc<dyn Subscriber>) {
        *self.inner.default_subscriber.write().await = Some(subscriber);
    }

    /// Send a packet to a connector.
    ///
    /// # Errors
    /// Returns `Error::UnknownConnectorName` when the destination names a
    /// missing connector, `Error::ConnectorClosed` when no connector is
    /// attached at all.
    pub async fn send(&self, packet: Packet, destination: Option<Destination>) -> Result<()> {
        let (name, connector) = {
            let table = self.inner.connectors.read().await;
            let name = match destination {
                Some(Destination::Connector(name)) => name,
                Some(Destination::Device(uid)) => match table.uid_index.get(&uid) {
                    Some(name) => name.clone(),
                    None => table.default_name.clone().ok_or(Error::ConnectorClosed)?,
                },
                None => table.default_name.clone().ok_or(Error::ConnectorClosed)?,
            };
            let connector =
                table
                    .by_name
                    .get(&name)
                    .cloned()
                    .ok_or_else(|| Error::UnknownConnectorName { name: name.clone() })?;
            (name, connector)
        };
        connector
            .send(Event::from_packet(packet).with_connector(&name))
            .await;
        Ok(())
    }

    /// Number of registered subscribers, across all routing hashes.
    pub async fn subscriber_count(&self) -> usize {
        self.inner
            .registry
            .read()
            .await
            .values()
            .map(HashMap::len)
            .sum()
    }

    /// Tear everything down: drop all subscribers, close and release every
    /// connector, then wait for the consumer tasks and in-flight
    /// notifications to finish. Nothing is delivered after this returns.
    pub async fn shutdown(self) {
        self.inner.cancel.cancel();
        self.inner.registry.write().await.clear();
        *self.inner.default_subscriber.write().await = None;
        let connectors = {
            let mut table = self.inner.connectors.write().await;
            table.attach_order.clear();
            table.default_name = None;
            table.uid_index.clear();
            std::mem::take(&mut table.by_name)
        };
        for (name, connector) in connectors {
            connector.close().await;
            debug!(connector = %name, "connector closed on shutdown");
        }
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        debug!("dispatcher shut down");
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn active(&self, chosen: ChosenFields) {
        self.active
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(chosen);
    }

    fn active_combinations(&self) -> Vec<ChosenFields> {
        let active = self
            .active
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        ChosenFields::combinations()
            .into_iter()
            .filter(|c| active.contains(c))
            .collect()
    }

    /// Match one inbound event against the registry and fan it out.
    ///
    /// Every active chosen combination is probed and matches accumulate, so
    /// a function-only subscriber and an exact-device subscriber both fire
    /// for the same packet. Only when no combination matched does the event
    /// fall through to the default subscriber.
    async fn dispatch(&self, event: Event) {
        let Some(packet) = &event.packet else {
            self.deliver_unmatched(event).await;
            return;
        };

        let mut matched: Vec<Arc<dyn Subscriber>> = Vec::new();
        {
            let mut registry = self.registry.write().await;
            for chosen in self.active_combinations() {
                let hash =
                    RoutingHash::compute(chosen, packet.header.uid, packet.header.function_id);
                if let Some(bucket) = registry.get_mut(&hash) {
                    // one-shot subscribers leave the registry before their
                    // notification runs, so they can never fire twice
                    bucket.retain(|_, subscriber| {
                        matched.push(subscriber.clone());
                        subscriber.subscription().is_callback()
                    });
                    if bucket.is_empty() {
                        registry.remove(&hash);
                    }
                }
            }
        }

        if matched.is_empty() {
            self.deliver_unmatched(event).await;
            return;
        }
        for subscriber in matched {
            let event = event.clone();
            self.tracker.spawn(async move {
                subscriber.notify(event);
            });
        }
    }

    async fn deliver_unmatched(&self, event: Event) {
        let fallback = self.default_subscriber.read().await.clone();
        match fallback {
            Some(subscriber) => {
                self.tracker.spawn(async move {
                    subscriber.notify(event);
                });
            }
            None => debug!(%event, "no subscriber matched, event dropped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brickbus_connector::VirtualConnector;

    #[tokio::test]
    async fn test_first_attach_becomes_default() {
        let dispatcher = Dispatcher::new();
        assert_eq!(dispatcher.default_connector().await, None);

        dispatcher
            .attach("a", VirtualConnector::new().into())
            .await
            .unwrap();
        dispatcher
            .attach("b", VirtualConnector::new().into())
            .await
            .unwrap();
        assert_eq!(dispatcher.default_connector().await, Some("a".to_string()));

        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_duplicate_attach_is_rejected() {
        let dispatcher = Dispatcher::new();
        dispatcher
            .attach("a", VirtualConnector::new().into())
            .await
            .unwrap();
        let err = dispatcher
            .attach("a", VirtualConnector::new().into())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            Error::DuplicateConnectorName {
                name: "a".to_string()
            }
        );
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_releasing_default_promotes_earliest_remaining() {
        let dispatcher = Dispatcher::new();
        for name in ["a", "b", "c"] {
            dispatcher
                .attach(name, VirtualConnector::new().into())
                .await
                .unwrap();
        }

        dispatcher.release("a").await.unwrap();
        assert_eq!(dispatcher.default_connector().await, Some("b".to_string()));

        dispatcher.release("b").await.unwrap();
        assert_eq!(dispatcher.default_connector().await, Some("c".to_string()));

        dispatcher.release("c").await.unwrap();
        assert_eq!(dispatcher.default_connector().await, None);

        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_release_unknown_connector() {
        let dispatcher = Dispatcher::new();
        assert_eq!(
            dispatcher.release("ghost").await.unwrap_err(),
            Error::UnknownConnectorName {
                name: "ghost".to_string()
            }
        );
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_map_uid_requires_known_connector() {
        let dispatcher = Dispatcher::new();
        assert!(
            dispatcher
                .map_uid(DeviceUid::new(5), "ghost")
                .await
                .is_err()
        );

        dispatcher
            .attach("a", VirtualConnector::new().into())
            .await
            .unwrap();
        dispatcher.map_uid(DeviceUid::new(5), "a").await.unwrap();
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_send_without_connector_fails() {
        let dispatcher = Dispatcher::new();
        let err = dispatcher
            .send(Packet::request(DeviceUid::new(5), 1), None)
            .await
            .unwrap_err();
        assert_eq!(err, Error::ConnectorClosed);
        dispatcher.shutdown().await;
    }
}
