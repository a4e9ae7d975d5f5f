//! WebSocket handler — the game connection.
//!
//! DESIGN
//! ======
//! On upgrade, registers the connection and enters a `select!` loop:
//! - Incoming client text → parse + dispatch by message `type`
//! - Messages queued by other connections or the clock → forward to client
//!
//! Dispatch takes the hub lock once per message and returns the replies for
//! the sender, which are written straight to the socket. Everything addressed
//! to anyone else (including the sender's copy of room broadcasts) goes
//! through the per-connection queues.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → connection registered as `Unassigned`
//! 2. Client messages → dispatch → replies
//! 3. Close, socket error or handler panic → same cleanup as a disconnect

use std::panic::AssertUnwindSafe;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::FutureExt;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::protocol::{ClientMessage, ProtocolError, ServerMessage, parse_client_message};
use crate::services::{SessionError, challenge, lobby, room};
use crate::state::{AppState, ConnId};

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(socket: WebSocket, state: AppState) {
    let conn_id = Uuid::new_v4();

    // Per-connection queue for messages from other connections and the clock.
    let (client_tx, client_rx) = mpsc::channel::<ServerMessage>(state.settings.client_channel_capacity);
    lobby::register(&mut *state.hub.lock().await, conn_id, client_tx);
    info!(%conn_id, "ws: client connected");

    let outcome = AssertUnwindSafe(serve_connection(socket, &state, conn_id, client_rx))
        .catch_unwind()
        .await;
    if outcome.is_err() {
        error!(%conn_id, "ws: connection handler panicked");
    }

    lobby::disconnect(&state.recorder, &mut *state.hub.lock().await, conn_id);
    info!(%conn_id, "ws: client disconnected");
}

async fn serve_connection(
    mut socket: WebSocket,
    state: &AppState,
    conn_id: ConnId,
    mut client_rx: mpsc::Receiver<ServerMessage>,
) {
    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        for reply in process_inbound_text(state, conn_id, text.as_str()).await {
                            if send_message(&mut socket, &reply).await.is_err() {
                                return;
                            }
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(msg) = client_rx.recv() => {
                if send_message(&mut socket, &msg).await.is_err() {
                    break;
                }
            }
        }
    }
}

async fn send_message(socket: &mut WebSocket, msg: &ServerMessage) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(msg) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, kind = msg.kind(), "ws: failed to encode message");
            return Ok(());
        }
    };
    socket.send(Message::Text(text.into())).await
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Parse and process one inbound text message and return messages for the
/// sender.
///
/// Kept apart from the socket so tests can drive dispatch directly.
pub(crate) async fn process_inbound_text(state: &AppState, conn_id: ConnId, text: &str) -> Vec<ServerMessage> {
    let msg = match parse_client_message(text) {
        Ok(msg) => msg,
        Err(e) => {
            match &e {
                ProtocolError::UnknownType { kind } => warn!(%conn_id, ?kind, "ws: unknown message type"),
                ProtocolError::InvalidJson => warn!(%conn_id, "ws: invalid inbound message"),
            }
            return vec![ServerMessage::error(&e)];
        }
    };
    debug!(%conn_id, ?msg, "ws: recv message");

    let mut hub = state.hub.lock().await;
    let result = match msg {
        ClientMessage::JoinLobby { player } => lobby::join_lobby(&mut hub, conn_id, player),
        ClientMessage::Challenge { target_player } => challenge::challenge(&mut hub, conn_id, &target_player),
        ClientMessage::ChallengeAccept { opponent_name } => challenge::accept(state, &mut hub, conn_id, &opponent_name),
        ClientMessage::ChallengeDecline { opponent_name } => Ok(challenge::decline(&mut hub, conn_id, &opponent_name)),
        ClientMessage::Move { mv } => room::submit_move(&state.recorder, &mut hub, conn_id, mv),
        ClientMessage::OfferRematch => room::offer_rematch(state, &mut hub, conn_id),
        ClientMessage::LeaveGame => lobby::leave_game(&state.recorder, &mut hub, conn_id),
    };
    drop(hub);

    result.unwrap_or_else(|e: SessionError| {
        debug!(%conn_id, error = %e, "ws: request refused");
        vec![ServerMessage::error(&e)]
    })
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
