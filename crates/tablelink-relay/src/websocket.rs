//! WebSocket handler for tabletop clients.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};

use crate::{Relay, RelayError};

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(relay): State<Relay>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, relay))
}

/// Apply every text message of one connection until it closes.
async fn handle_socket(mut socket: WebSocket, relay: Relay) {
    let id = relay.client_connected();

    while let Some(msg) = socket.recv().await {
        match msg {
            Ok(Message::Text(text)) => match relay.apply_message(&text) {
                Ok(()) => {}
                Err(RelayError::Decode(e)) => {
                    log::warn!("[RELAY] Invalid JSON received from client {}: {}", id, e);
                }
                Err(e) => {
                    log::error!("[RELAY] Error processing message: {}", e);
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                log::debug!("[RELAY] Client {} connection error: {}", id, e);
                break;
            }
        }
    }

    relay.client_disconnected(id);
}
