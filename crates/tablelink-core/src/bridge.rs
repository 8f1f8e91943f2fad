//! Reaction to host notifications outside the regular tick.
//!
//! The [`EventBridge`] subscribes the session to the four host events it
//! cares about and decides, from the current snapshot, what each one
//! should trigger.
//!
//! The bridge only holds a weak handle on the bus: once the host drops its
//! last bus clone the event channel disconnects.

use crate::bus::{EventBus, SubscriptionId, WeakEventBus};
use crate::host::{HostEvent, HostEventKind, SessionSnapshot};
use crossbeam_channel::{unbounded, Receiver};

/// Host events the bridge listens to.
pub const BRIDGED_EVENTS: [HostEventKind; 4] = [
    HostEventKind::TokenUpdated,
    HostEventKind::CanvasReady,
    HostEventKind::UserUpdated,
    HostEventKind::SignOut,
];

/// What a host event asks the session to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeAction {
    /// Rebuild and send the full record.
    FullUpdate,
    /// Send the context blob and identity (scene changed).
    ContextAndIdentity,
    /// Send the identity only (character changed).
    Identity,
    /// Stop the timer and release the transport.
    Teardown,
    /// Not relevant to this session.
    Ignore,
}

/// Subscription of a session to host notifications.
#[derive(Debug)]
pub struct EventBridge {
    bus: WeakEventBus,
    subscriptions: Vec<SubscriptionId>,
    events: Receiver<HostEvent>,
}

impl EventBridge {
    /// Subscribe to the bridged events on `bus`.
    pub fn attach(bus: &EventBus) -> Self {
        let (tx, rx) = unbounded();
        let subscriptions = BRIDGED_EVENTS
            .iter()
            .map(|&kind| bus.subscribe(kind, tx.clone()))
            .collect();

        Self {
            bus: bus.downgrade(),
            subscriptions,
            events: rx,
        }
    }

    /// Receiver of the subscribed events.
    pub fn events(&self) -> &Receiver<HostEvent> {
        &self.events
    }

    /// Check if the bridge is still subscribed.
    pub fn is_attached(&self) -> bool {
        !self.subscriptions.is_empty()
    }

    /// Unsubscribe from the bus. Safe to call repeatedly.
    pub fn detach(&mut self) {
        let bus = self.bus.upgrade();
        for id in self.subscriptions.drain(..) {
            if let Some(bus) = &bus {
                bus.unsubscribe(id);
            }
        }
    }

    /// Decide how to react to `event` given the current snapshot.
    pub fn route(event: &HostEvent, snapshot: &SessionSnapshot) -> BridgeAction {
        match event {
            HostEvent::TokenUpdated { actor_id, .. } => {
                let own = match (actor_id, snapshot.active_character()) {
                    (Some(actor_id), Some(character)) => *actor_id == character.id,
                    _ => false,
                };
                if own {
                    BridgeAction::FullUpdate
                } else {
                    BridgeAction::Ignore
                }
            }
            HostEvent::CanvasReady { .. } => BridgeAction::ContextAndIdentity,
            HostEvent::UserUpdated {
                user_id,
                character_changed,
            } => {
                let is_current_user = snapshot
                    .user
                    .as_ref()
                    .is_some_and(|user| user.id == *user_id);
                if is_current_user && *character_changed {
                    BridgeAction::Identity
                } else {
                    BridgeAction::Ignore
                }
            }
            HostEvent::SignOut => BridgeAction::Teardown,
        }
    }
}

impl Drop for EventBridge {
    fn drop(&mut self) {
        self.detach();
    }
}
