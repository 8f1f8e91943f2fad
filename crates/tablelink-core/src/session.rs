//! Session context tying the bridge together.
//!
//! A [`Session`] exists from application-ready until sign-out. It owns the
//! transport, the update timer and the event subscriptions, and processes
//! ticks and host events on a single thread:
//!
//! - timer ticks rebuild and send the full record
//! - host events are routed through [`EventBridge::route`]
//! - sign-out tears everything down
//!
//! Each update rebuilds from a fresh snapshot, so ticks and events may
//! interleave freely; the consumer keeps whatever arrived last.

use crate::bridge::{BridgeAction, EventBridge};
use crate::builder::LinkStateBuilder;
use crate::bus::EventBus;
use crate::host::{Host, HostEvent, NotifyLevel};
use crate::record::LinkUpdate;
use crate::scheduler::{Tick, UpdateScheduler};
use crate::settings::Settings;
use crate::transport::{self, LinkTransport};
use crossbeam_channel::{select, unbounded, Receiver};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Active positional audio session.
pub struct Session {
    host: Arc<dyn Host>,
    settings: Settings,
    builder: LinkStateBuilder,
    transport: Box<dyn LinkTransport>,
    scheduler: UpdateScheduler,
    tick_rx: Receiver<Tick>,
    bridge: EventBridge,
    connect_attempted: bool,
    active: bool,
}

impl Session {
    /// Start a session: connect the transport, subscribe to host events
    /// and start the update timer.
    ///
    /// A failed connect is not an error: the user is warned once and the
    /// session keeps running with forwarding disabled. A disabled session
    /// connects the first time its settings enable it.
    pub fn start(
        host: Arc<dyn Host>,
        bus: &EventBus,
        settings: Settings,
        transport: Box<dyn LinkTransport>,
    ) -> Self {
        let (tick_tx, tick_rx) = unbounded();
        let mut session = Self {
            builder: LinkStateBuilder::new(&settings),
            scheduler: UpdateScheduler::new(tick_tx),
            bridge: EventBridge::attach(bus),
            host,
            settings,
            transport,
            tick_rx,
            connect_attempted: false,
            active: true,
        };
        if session.settings.enabled {
            session.connect_transport();
        }
        session.restart_scheduler();

        log::info!(
            "[SESSION] Started (enabled={}, rate={}ms, range={}, scale={}, transport={})",
            session.settings.enabled,
            session.settings.clamped_update_rate_ms(),
            session.settings.audio_range,
            session.settings.scale_multiplier,
            session.transport.name()
        );
        session
    }

    /// Start a session with the transport selected in `settings`.
    pub fn start_with_settings(host: Arc<dyn Host>, bus: &EventBus, settings: Settings) -> Self {
        let transport = transport::from_settings(&settings);
        Self::start(host, bus, settings, transport)
    }

    /// Current settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Check if the session has not been torn down.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Check if updates reach the consumer.
    pub fn is_forwarding(&self) -> bool {
        self.active && self.settings.enabled && self.transport.is_connected()
    }

    /// The update timer.
    pub fn scheduler(&self) -> &UpdateScheduler {
        &self.scheduler
    }

    /// Apply new settings and restart the timer.
    ///
    /// The transport is connected at most once per session: enabling a
    /// session that started disabled connects it, a failed or closed
    /// transport is not retried.
    pub fn update_settings(&mut self, settings: Settings) {
        if !self.active {
            return;
        }
        self.builder = LinkStateBuilder::new(&settings);
        self.settings = settings;
        if self.settings.enabled && !self.connect_attempted {
            self.connect_transport();
        }
        self.restart_scheduler();
    }

    fn connect_transport(&mut self) {
        self.connect_attempted = true;
        if let Err(e) = self.transport.connect() {
            log::warn!(
                "[SESSION] {} transport unavailable: {}",
                self.transport.name(),
                e
            );
            self.host.notify(
                NotifyLevel::Warning,
                &format!("Positional audio is inactive: {}", e),
            );
        }
    }

    fn restart_scheduler(&mut self) {
        if self.settings.enabled {
            self.scheduler.start(self.settings.update_interval());
        } else {
            self.scheduler.stop();
        }
    }

    /// Build and send the full record.
    pub fn full_update(&mut self) {
        let snapshot = self.host.snapshot();
        if let Some(record) = self.builder.build(&snapshot) {
            self.forward(LinkUpdate::from(record));
        }
    }

    /// Send the context blob only.
    pub fn context_update(&mut self) {
        let snapshot = self.host.snapshot();
        if let Some(update) = self.builder.build_context_update(&snapshot) {
            self.forward(update);
        }
    }

    /// Send the identity only.
    pub fn identity_update(&mut self) {
        let snapshot = self.host.snapshot();
        if let Some(update) = self.builder.build_identity_update(&snapshot) {
            self.forward(update);
        }
    }

    fn forward(&mut self, update: LinkUpdate) {
        if !self.active {
            return;
        }
        if !self.transport.is_connected() {
            log::trace!("[SESSION] Transport disconnected, dropping update");
            return;
        }
        log::trace!("[SESSION] Forwarding {:?}", update);
        self.transport.send(&update);
    }

    /// Handle one timer tick. Ticks from a cancelled timer are ignored.
    pub fn handle_tick(&mut self, tick: Tick) {
        if self.active && self.scheduler.is_current(&tick) {
            self.full_update();
        }
    }

    /// Handle one host event.
    pub fn handle_event(&mut self, event: &HostEvent) {
        if !self.active {
            return;
        }
        let action = EventBridge::route(event, &self.host.snapshot());
        log::debug!("[SESSION] {:?} -> {:?}", event.kind(), action);

        match action {
            BridgeAction::FullUpdate => self.full_update(),
            BridgeAction::ContextAndIdentity => {
                self.context_update();
                self.identity_update();
            }
            BridgeAction::Identity => self.identity_update(),
            BridgeAction::Teardown => self.teardown(),
            BridgeAction::Ignore => {}
        }
    }

    /// Process every tick and event already queued, without blocking.
    pub fn pump(&mut self) {
        while self.active {
            if let Ok(event) = self.bridge.events().try_recv() {
                self.handle_event(&event);
            } else if let Ok(tick) = self.tick_rx.try_recv() {
                self.handle_tick(tick);
            } else {
                break;
            }
        }
    }

    /// Process ticks and events until sign-out, or until every clone of the
    /// host's event bus has been dropped.
    pub fn run(mut self) {
        while self.active {
            self.step(None);
        }
    }

    /// Process ticks and events until sign-out or until `duration` elapsed.
    pub fn run_for(&mut self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while self.active {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            self.step(Some(deadline - now));
        }
    }

    fn step(&mut self, timeout: Option<Duration>) {
        let events = self.bridge.events().clone();
        let ticks = self.tick_rx.clone();
        let timeout = timeout.unwrap_or(Duration::from_secs(3600));

        select! {
            recv(events) -> event => match event {
                Ok(event) => self.handle_event(&event),
                Err(_) => {
                    log::info!("[SESSION] Host event bus closed");
                    self.teardown();
                }
            },
            recv(ticks) -> tick => {
                if let Ok(tick) = tick {
                    self.handle_tick(tick);
                }
            },
            default(timeout) => {}
        }
    }

    /// Stop the timer, release the transport and unsubscribe.
    pub fn teardown(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        self.scheduler.stop();
        self.transport.close();
        self.bridge.detach();
        log::info!("[SESSION] Torn down");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("active", &self.active)
            .field("transport", &self.transport.name())
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}
