//! Host notification bus.
//!
//! The host publishes [`HostEvent`]s here; consumers subscribe to the kinds
//! they care about with a channel sender and get a [`SubscriptionId`] back,
//! which they hand to [`EventBus::unsubscribe`] when they are torn down.

use crate::host::{HostEvent, HostEventKind};
use crossbeam_channel::Sender;
use std::sync::{Arc, Mutex, Weak};

/// Handle identifying one subscription on an [`EventBus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    kind: HostEventKind,
    tx: Sender<HostEvent>,
}

#[derive(Default)]
struct BusInner {
    next_id: u64,
    subscribers: Vec<Subscriber>,
}

/// Cloneable publish/subscribe hub for host notifications.
///
/// All clones share the same subscriber list.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl EventBus {
    /// Create a bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver events of `kind` to `tx` until unsubscribed.
    pub fn subscribe(&self, kind: HostEventKind, tx: Sender<HostEvent>) -> SubscriptionId {
        let mut inner = self.inner.lock().expect("Event bus lock poisoned");
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner.subscribers.push(Subscriber { id, kind, tx });
        log::trace!("[BUS] Subscribed {:?} to {:?}", id, kind);
        id
    }

    /// Remove a subscription. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.lock().expect("Event bus lock poisoned");
        let before = inner.subscribers.len();
        inner.subscribers.retain(|s| s.id != id);
        before != inner.subscribers.len()
    }

    /// Publish an event to every matching subscriber.
    ///
    /// Subscribers whose receiving end has been dropped are removed.
    /// Returns the number of subscribers that received the event.
    pub fn publish(&self, event: HostEvent) -> usize {
        let kind = event.kind();
        let mut inner = self.inner.lock().expect("Event bus lock poisoned");
        let mut delivered = 0;
        inner.subscribers.retain(|s| {
            if s.kind != kind {
                return true;
            }
            match s.tx.send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => {
                    log::debug!("[BUS] Dropping disconnected subscriber {:?}", s.id);
                    false
                }
            }
        });
        delivered
    }

    /// Handle that does not keep the bus, or its subscriber senders, alive.
    pub fn downgrade(&self) -> WeakEventBus {
        WeakEventBus {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .lock()
            .expect("Event bus lock poisoned")
            .subscribers
            .len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish_non_exhaustive()
    }
}

/// Non-owning handle to an [`EventBus`].
#[derive(Debug, Clone)]
pub struct WeakEventBus {
    inner: Weak<Mutex<BusInner>>,
}

impl WeakEventBus {
    /// The bus, if any clone of it is still alive.
    pub fn upgrade(&self) -> Option<EventBus> {
        self.inner.upgrade().map(|inner| EventBus { inner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_publish_filters_by_kind() {
        let bus = EventBus::new();
        let (tx, rx) = unbounded();
        bus.subscribe(HostEventKind::SignOut, tx);

        assert_eq!(bus.publish(HostEvent::CanvasReady { scene_id: "s".into() }), 0);
        assert_eq!(bus.publish(HostEvent::SignOut), 1);
        assert_eq!(rx.try_recv().unwrap(), HostEvent::SignOut);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let (tx, rx) = unbounded();
        let id = bus.subscribe(HostEventKind::SignOut, tx);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.publish(HostEvent::SignOut), 0);
        assert!(rx.try_recv().is_err());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_dropped_receiver_is_pruned() {
        let bus = EventBus::new();
        let (tx, rx) = unbounded();
        bus.subscribe(HostEventKind::SignOut, tx);
        drop(rx);
        assert_eq!(bus.publish(HostEvent::SignOut), 0);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_clones_share_subscribers() {
        let bus = EventBus::new();
        let publisher = bus.clone();
        let (tx, rx) = unbounded();
        bus.subscribe(HostEventKind::SignOut, tx);
        publisher.publish(HostEvent::SignOut);
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_weak_handle_does_not_keep_bus_alive() {
        let bus = EventBus::new();
        let weak = bus.downgrade();
        let (tx, rx) = unbounded();
        weak.upgrade().unwrap().subscribe(HostEventKind::SignOut, tx);
        assert_eq!(bus.subscriber_count(), 1);

        drop(bus);
        assert!(weak.upgrade().is_none());
        assert!(rx.recv().is_err());
    }
}
