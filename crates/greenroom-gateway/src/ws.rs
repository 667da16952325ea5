// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket handler for the realtime surface.
//!
//! Server -> Client (JSON, tagged with `type`):
//! ```json
//! {"type": "session:state", "state": {...}}
//! {"type": "session:qr", "qrPayload": "...", "sessionId": null}
//! {"type": "message:in", "envelope": {...}}
//! ```
//!
//! The realtime surface is one-directional: commands go through the HTTP
//! endpoints, so inbound text frames are ignored.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tracing::debug;

use crate::server::GatewayState;

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<GatewayState>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle an individual dashboard connection.
///
/// Spawns a sender task forwarding broadcast events to the client and keeps
/// the read half open only to observe the close frame.
async fn handle_socket(socket: WebSocket, state: GatewayState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (ws_id, mut events) = state.broadcaster.subscribe().await;
    debug!(ws_id = %ws_id, "dashboard connected");

    let sender_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(_) => continue,
            };
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            Message::Close(_) => break,
            // Commands go through HTTP; ping/pong handled by the ws layer.
            _ => {}
        }
    }

    state.broadcaster.unsubscribe(&ws_id);
    sender_task.abort();
    debug!(ws_id = %ws_id, "dashboard disconnected");
}
