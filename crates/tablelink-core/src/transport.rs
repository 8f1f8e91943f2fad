//! Outbound channels to the positional audio consumer.
//!
//! A [`LinkTransport`] pushes [`LinkUpdate`]s to whatever process writes
//! the shared-memory link structure. Sends are fire-and-forget: no
//! acknowledgment, no retry, and a no-op while disconnected.

use crate::error::{Error, Result};
use crate::record::LinkUpdate;
use crate::settings::{Settings, TransportKind};
use std::net::TcpStream;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

/// Outbound channel for link updates.
pub trait LinkTransport: Send {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Open the channel. Failure leaves the transport disconnected.
    fn connect(&mut self) -> Result<()>;

    /// Push an update. Does nothing when not connected.
    fn send(&mut self, update: &LinkUpdate);

    /// Release the channel. Safe to call repeatedly or when never connected.
    fn close(&mut self);

    /// Check if updates are currently forwarded.
    fn is_connected(&self) -> bool;
}

/// Build the transport selected in the settings.
pub fn from_settings(settings: &Settings) -> Box<dyn LinkTransport> {
    match settings.transport {
        TransportKind::Relay => Box::new(RelayTransport::new(settings.relay_url.clone())),
        TransportKind::Native => Box::new(NativeTransport),
    }
}

/// Direct shared-memory access from the host process.
///
/// There is no native writer in this build; `connect` always reports the
/// capability as absent so the session falls back to "inactive".
#[derive(Debug, Default)]
pub struct NativeTransport;

impl LinkTransport for NativeTransport {
    fn name(&self) -> &str {
        "native"
    }

    fn connect(&mut self) -> Result<()> {
        Err(Error::Unsupported(
            "native shared-memory access is not available in this environment".to_string(),
        ))
    }

    fn send(&mut self, _update: &LinkUpdate) {}

    fn close(&mut self) {}

    fn is_connected(&self) -> bool {
        false
    }
}

enum RelayState {
    Disconnected,
    Connected(Box<WebSocket<MaybeTlsStream<TcpStream>>>),
}

/// WebSocket client for the local relay process.
pub struct RelayTransport {
    url: String,
    state: RelayState,
    sent: u64,
}

impl RelayTransport {
    /// Create a disconnected transport for the relay at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            state: RelayState::Disconnected,
            sent: 0,
        }
    }

    /// Relay endpoint.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Number of updates written since creation.
    pub fn sent_count(&self) -> u64 {
        self.sent
    }
}

impl LinkTransport for RelayTransport {
    fn name(&self) -> &str {
        "relay"
    }

    fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }

        let (socket, _response) = tungstenite::connect(self.url.as_str())
            .map_err(|e| Error::Connect(format!("{}: {}", self.url, e)))?;

        log::info!("[RELAY] Connected to {}", self.url);
        self.state = RelayState::Connected(Box::new(socket));
        Ok(())
    }

    fn send(&mut self, update: &LinkUpdate) {
        let RelayState::Connected(socket) = &mut self.state else {
            return;
        };

        let payload = match update.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                log::error!("[RELAY] Failed to encode update: {}", e);
                return;
            }
        };

        match socket.send(Message::Text(payload)) {
            Ok(()) => {
                self.sent += 1;
            }
            Err(e) => {
                log::warn!(
                    "[RELAY] Lost connection to {}: {}. Forwarding disabled",
                    self.url,
                    e
                );
                self.state = RelayState::Disconnected;
            }
        }
    }

    fn close(&mut self) {
        if let RelayState::Connected(mut socket) =
            std::mem::replace(&mut self.state, RelayState::Disconnected)
        {
            // Best effort; the relay may already be gone.
            let _ = socket.close(None);
            let _ = socket.flush();
            log::info!("[RELAY] Closed connection to {}", self.url);
        }
    }

    fn is_connected(&self) -> bool {
        matches!(self.state, RelayState::Connected(_))
    }
}

impl Drop for RelayTransport {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for RelayTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayTransport")
            .field("url", &self.url)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A port that nothing listens on.
    fn closed_port_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("ws://127.0.0.1:{}", port)
    }

    #[test]
    fn test_native_transport_is_unsupported() {
        let mut transport = NativeTransport;
        assert!(matches!(transport.connect(), Err(Error::Unsupported(_))));
        transport.send(&LinkUpdate::identity("x"));
        transport.close();
        assert!(!transport.is_connected());
    }

    #[test]
    fn test_relay_connect_failure_leaves_sends_silent() {
        let mut transport = RelayTransport::new(closed_port_url());
        assert!(matches!(transport.connect(), Err(Error::Connect(_))));
        assert!(!transport.is_connected());

        transport.send(&LinkUpdate::identity("x"));
        transport.send(&LinkUpdate::default());
        assert_eq!(transport.sent_count(), 0);
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut transport = RelayTransport::new(closed_port_url());
        transport.close();
        transport.close();
        assert!(!transport.is_connected());
    }

    #[test]
    fn test_from_settings_picks_variant() {
        let settings = Settings {
            transport: TransportKind::Native,
            ..Default::default()
        };
        assert_eq!(from_settings(&settings).name(), "native");
        assert_eq!(from_settings(&Settings::default()).name(), "relay");
    }
}
