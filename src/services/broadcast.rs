//! Fan-out to a single connection, a room, or the whole lobby.
//!
//! DESIGN
//! ======
//! Delivery is best-effort and at-most-once: each message is queued with
//! `try_send` so callers holding the hub lock never wait on a slow socket.
//! A failed recipient is logged and skipped. Lobby fan-out additionally
//! evicts members whose channel has closed.

use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::protocol::ServerMessage;
use crate::state::{ConnId, Connections, Hub, Outbox, Room};

/// Queue `msg` for one connection. Returns false when it could not be queued.
pub fn to_conn(connections: &Connections, conn_id: ConnId, msg: ServerMessage) -> bool {
    match connections.get(&conn_id) {
        Some(conn) => deliver(conn_id, &conn.tx, msg).is_ok(),
        None => {
            debug!(%conn_id, kind = msg.kind(), "send to unknown connection skipped");
            false
        }
    }
}

/// Queue `msg` for every seated player, optionally skipping one.
pub fn to_room(connections: &Connections, room: &Room, msg: &ServerMessage, exclude: Option<ConnId>) {
    for seat in &room.seats {
        if exclude == Some(seat.conn_id) {
            continue;
        }
        to_conn(connections, seat.conn_id, msg.clone());
    }
}

/// Queue `msg` for every lobby member. Members whose channel is closed leave
/// the lobby.
pub fn to_lobby(hub: &mut Hub, msg: &ServerMessage) {
    let mut dead = Vec::new();
    for conn_id in &hub.lobby {
        let Some(conn) = hub.connections.get(conn_id) else {
            dead.push(*conn_id);
            continue;
        };
        if let Err(TrySendError::Closed(_)) = deliver(*conn_id, &conn.tx, msg.clone()) {
            dead.push(*conn_id);
        }
    }
    for conn_id in dead {
        warn!(%conn_id, "unreachable lobby member pruned");
        hub.leave_lobby(conn_id);
    }
}

/// Send the current lobby roster to the lobby.
pub fn lobby_update(hub: &mut Hub) {
    let msg = ServerMessage::LobbyUpdate { players: hub.lobby_players() };
    to_lobby(hub, &msg);
}

fn deliver(conn_id: ConnId, tx: &Outbox, msg: ServerMessage) -> Result<(), TrySendError<ServerMessage>> {
    let kind = msg.kind();
    tx.try_send(msg).inspect_err(|e| match e {
        TrySendError::Full(_) => warn!(%conn_id, kind, "client queue full; dropping message"),
        TrySendError::Closed(_) => debug!(%conn_id, kind, "client queue closed; dropping message"),
    })
}

#[cfg(test)]
#[path = "broadcast_test.rs"]
mod tests;
