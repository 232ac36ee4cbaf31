//! WebSocket handler: relay between one socket and the engine.
//!
//! DESIGN
//! ======
//! On upgrade, registers a fresh connection with the engine and enters a
//! `select!` loop:
//! - Incoming client frames → forwarded to the engine as text
//! - Engine output for this connection → serialized and written to the socket
//!
//! The task holds no canvas state. It only translates between the socket and
//! the engine queue.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → `Connected` with a new outbound queue
//! 2. Text (or UTF-8 binary) frames → `Inbound`
//! 3. Close, socket error, or engine stop → drop the outbound queue → `Disconnected`

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::message::ServerMessage;
use crate::services::registry::ConnectionId;
use crate::state::AppState;

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    upgrade(state, ws)
}

/// Finish an accepted upgrade by running the relay on the socket.
pub fn upgrade(state: AppState, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let id = Uuid::new_v4();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<ServerMessage>();

    if state.engine.connect(id, outbound_tx).await.is_err() {
        warn!(%id, "ws: engine unavailable; closing socket");
        return;
    }
    info!(%id, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };
                let text = match msg {
                    Message::Text(text) => text.as_str().to_owned(),
                    Message::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(%id, error = %e, "ws: dropping non-utf8 binary frame");
                            continue;
                        }
                    },
                    Message::Close(_) => break,
                    _ => continue,
                };
                if forward(&state, id, text).await.is_err() {
                    break;
                }
            }
            outbound = outbound_rx.recv() => {
                let Some(message) = outbound else { break };
                if send_message(&mut socket, &message).await.is_err() {
                    break;
                }
            }
        }
    }

    // Closing the queue first marks the connection closed for any broadcast
    // still ahead of `Disconnected` in the engine queue.
    drop(outbound_rx);
    if state.engine.disconnect(id).await.is_err() {
        debug!(%id, "ws: engine already stopped");
    }
    info!(%id, "ws: client disconnected");
}

async fn forward(state: &AppState, id: ConnectionId, text: String) -> Result<(), ()> {
    state.engine.inbound(id, text).await.map_err(|e| {
        warn!(%id, error = %e, "ws: engine stopped; closing socket");
    })
}

async fn send_message(socket: &mut WebSocket, message: &ServerMessage) -> Result<(), ()> {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize message");
            return Err(());
        }
    };
    socket.send(Message::Text(json.into())).await.map_err(|e| {
        debug!(error = %e, "ws: send failed");
    })
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
