//! tablelink-core - Token positions to Mumble Link positional audio
//!
//! Maps the position and facing of the local player's token on a virtual
//! tabletop scene into the 3D audio space of the Mumble Link protocol, and
//! pushes the result to a local consumer at a fixed rate and on scene,
//! token and character changes.
//!
//! - Scene pixels to audio-space meters, Y pinned to zero
//! - Partial JSON updates over a local WebSocket relay
//! - Binary `LinkedMem` layout for the shared-memory consumer
//! - Configurable via TOML file
//!
//! # Usage as a Library
//!
//! ```no_run
//! use std::sync::Arc;
//! use tablelink_core::{EventBus, MemoryHost, Session, SessionSnapshot, Settings};
//!
//! let bus = EventBus::new();
//! let host = MemoryHost::new(SessionSnapshot::default(), bus.clone());
//!
//! // Connects to the relay named in the config file
//! let session = Session::start_with_settings(Arc::new(host.clone()), &bus, Settings::load_or_default());
//!
//! // Runs until the host publishes a sign-out
//! std::thread::spawn(move || session.run());
//! host.sign_out();
//! ```

pub mod bridge;
pub mod builder;
pub mod bus;
pub mod error;
pub mod host;
pub mod linked_mem;
pub mod mapper;
pub mod record;
pub mod scheduler;
pub mod session;
pub mod settings;
pub mod transport;

pub use glam;

// Re-export main types
pub use bridge::{BridgeAction, EventBridge};
pub use builder::LinkStateBuilder;
pub use bus::{EventBus, SubscriptionId, WeakEventBus};
pub use error::{Error, Result};
pub use host::{
    CharacterInfo, Host, HostEvent, HostEventKind, MemoryHost, NotifyLevel, SceneInfo,
    SessionSnapshot, TokenInfo, UserInfo,
};
pub use linked_mem::{LinkedMem, WideEncoding};
pub use mapper::{AudioPose, SceneDimensions, TokenRect};
pub use record::{Identity, LinkContext, LinkRecord, LinkUpdate, CONTEXT_CAPACITY, LINK_VERSION};
pub use scheduler::{Tick, UpdateScheduler};
pub use session::Session;
pub use settings::{Settings, TransportKind};
pub use transport::{LinkTransport, NativeTransport, RelayTransport};
