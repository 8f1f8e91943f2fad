//! WebSocket relay for tablelink.
//!
//! Receives partial link updates as JSON text messages, merges them into a
//! single `LinkedMem` state and hands every encoded frame to a
//! [`LinkSink`].
//!
//! # Usage
//!
//! ```ignore
//! use tablelink_relay::{LogSink, Relay, RelayConfig};
//! use tablelink_core::WideEncoding;
//!
//! let relay = Relay::new(Box::new(LogSink), WideEncoding::native())?;
//! relay.serve(&RelayConfig::default()).await?;
//! ```

mod error;
mod sink;
mod websocket;

use axum::{routing::get, Router};
use std::sync::{Arc, Mutex, MutexGuard};
use tablelink_core::{LinkUpdate, LinkedMem, WideEncoding};
use tokio::net::TcpListener;

pub use error::{RelayError, Result};
pub use sink::{link_name, LinkSink, LogSink, MemorySink, NativeSink};

/// Default bind host.
pub const DEFAULT_HOST: &str = "localhost";
/// Default bind port.
pub const DEFAULT_PORT: u16 = 23456;

/// Address the relay listens on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

struct RelayState {
    mem: LinkedMem,
    encoding: WideEncoding,
    sink: Box<dyn LinkSink>,
    clients: usize,
    next_client: u64,
    frames: u64,
}

/// Shared relay state. Clones refer to the same link structure.
#[derive(Clone)]
pub struct Relay {
    state: Arc<Mutex<RelayState>>,
}

impl Relay {
    /// Open `sink` and create a relay writing frames in `encoding`.
    pub fn new(mut sink: Box<dyn LinkSink>, encoding: WideEncoding) -> Result<Self> {
        sink.open()?;
        log::info!(
            "[RELAY] Writing {:?} frames ({} bytes) to {} sink",
            encoding,
            LinkedMem::size(encoding),
            sink.name()
        );

        Ok(Self {
            state: Arc::new(Mutex::new(RelayState {
                mem: LinkedMem::default(),
                encoding,
                sink,
                clients: 0,
                next_client: 0,
                frames: 0,
            })),
        })
    }

    fn lock(&self) -> MutexGuard<'_, RelayState> {
        self.state.lock().expect("Relay state lock poisoned")
    }

    /// Merge one JSON update into the link state and write a frame.
    ///
    /// The state only advances once the frame has been written.
    pub fn apply_message(&self, text: &str) -> Result<()> {
        let update: LinkUpdate = serde_json::from_str(text)?;

        let mut state = self.lock();
        let mut next = state.mem.clone();
        next.apply(&update);
        next.advance_tick();

        let frame = next.encode(state.encoding)?;
        state.sink.write(&next, &frame)?;
        state.mem = next;
        state.frames += 1;

        log::debug!(
            "[RELAY] Updated link for {} (tick {})",
            state.mem.name,
            state.mem.tick
        );
        Ok(())
    }

    /// Current link state.
    pub fn snapshot(&self) -> LinkedMem {
        self.lock().mem.clone()
    }

    /// Number of connected clients.
    pub fn client_count(&self) -> usize {
        self.lock().clients
    }

    /// Number of frames written.
    pub fn frame_count(&self) -> u64 {
        self.lock().frames
    }

    pub(crate) fn client_connected(&self) -> u64 {
        let mut state = self.lock();
        state.clients += 1;
        state.next_client += 1;
        log::info!(
            "[RELAY] Client {} connected ({} total)",
            state.next_client,
            state.clients
        );
        state.next_client
    }

    pub(crate) fn client_disconnected(&self, id: u64) {
        let mut state = self.lock();
        state.clients = state.clients.saturating_sub(1);
        log::info!(
            "[RELAY] Client {} disconnected ({} remaining)",
            id,
            state.clients
        );
    }

    /// Router with the WebSocket endpoint at `/`.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(websocket::ws_handler))
            .with_state(self.clone())
    }

    /// Bind to the configured address and serve until the task is dropped.
    pub async fn serve(self, config: &RelayConfig) -> Result<()> {
        let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
        self.serve_listener(listener).await
    }

    /// Serve on an already bound listener.
    pub async fn serve_listener(self, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr()?;
        log::info!("[RELAY] Listening on ws://{}", addr);
        log::info!("[RELAY] Waiting for connections from the tabletop...");

        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("Relay")
            .field("sink", &state.sink.name())
            .field("encoding", &state.encoding)
            .field("clients", &state.clients)
            .field("frames", &state.frames)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablelink_core::glam::Vec3;

    fn relay() -> (Relay, MemorySink) {
        let sink = MemorySink::new();
        let relay = Relay::new(Box::new(sink.clone()), WideEncoding::Utf16).unwrap();
        (relay, sink)
    }

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 23456);
    }

    #[test]
    fn test_native_sink_refuses_to_start() {
        let result = Relay::new(Box::new(NativeSink), WideEncoding::Utf32);
        assert!(matches!(result, Err(RelayError::SinkUnavailable(_))));
    }

    #[test]
    fn test_messages_merge_into_state() {
        let (relay, sink) = relay();
        relay
            .apply_message(r#"{"name":"Alice","fAvatarPosition":[-35,0,-35]}"#)
            .unwrap();
        relay.apply_message(r#"{"identity":"{\"name\":\"Alice\"}"}"#).unwrap();

        let mem = relay.snapshot();
        assert_eq!(mem.name, "Alice");
        assert_eq!(mem.avatar_position, Vec3::new(-35.0, 0.0, -35.0));
        assert_eq!(mem.camera_position, mem.avatar_position);
        assert_eq!(mem.identity, r#"{"name":"Alice"}"#);
        assert_eq!(mem.tick, 2);

        assert_eq!(relay.frame_count(), 2);
        assert_eq!(sink.write_count(), 2);
        let frame = sink.last_frame().unwrap();
        assert_eq!(frame.len(), LinkedMem::size(WideEncoding::Utf16));
        assert_eq!(LinkedMem::decode(&frame, WideEncoding::Utf16).unwrap(), mem);
    }

    #[test]
    fn test_invalid_json_is_rejected_without_writing() {
        let (relay, sink) = relay();
        assert!(matches!(
            relay.apply_message("not json"),
            Err(RelayError::Decode(_))
        ));
        assert!(matches!(
            relay.apply_message(r#"{"fAvatarPosition":"north"}"#),
            Err(RelayError::Decode(_))
        ));
        assert_eq!(sink.write_count(), 0);
        assert_eq!(relay.snapshot(), LinkedMem::default());
    }

    struct FailingSink;

    impl LinkSink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }

        fn open(&mut self) -> Result<()> {
            Ok(())
        }

        fn write(&mut self, _mem: &LinkedMem, _frame: &[u8]) -> Result<()> {
            Err(RelayError::Sink("link structure unmapped".to_string()))
        }
    }

    #[test]
    fn test_failed_write_leaves_state_unchanged() {
        let relay = Relay::new(Box::new(FailingSink), WideEncoding::Utf16).unwrap();
        assert!(matches!(
            relay.apply_message(r#"{"name":"Alice"}"#),
            Err(RelayError::Sink(_))
        ));
        assert_eq!(relay.snapshot(), LinkedMem::default());
        assert_eq!(relay.snapshot().tick, 0);
        assert_eq!(relay.frame_count(), 0);
    }

    #[test]
    fn test_client_tracking() {
        let (relay, _sink) = relay();
        let first = relay.client_connected();
        let second = relay.client_connected();
        assert_ne!(first, second);
        assert_eq!(relay.client_count(), 2);

        relay.client_disconnected(first);
        relay.client_disconnected(second);
        relay.client_disconnected(second);
        assert_eq!(relay.client_count(), 0);
    }
}
