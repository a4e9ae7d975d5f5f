//! Lobby service — connection registration, naming and lobby membership.
//!
//! LIFECYCLE
//! =========
//! 1. `register` on upgrade: the connection exists but is `Unassigned`.
//! 2. `join_lobby` names it and makes it visible to challengers.
//! 3. A match moves it to a room; `leave_game` brings it back.
//! 4. `disconnect` runs the leave path for wherever it is and forgets it.

use rand::Rng;
use tracing::info;

use super::persistence::GameRecorder;
use super::room::{self, Departure};
use super::{Replies, SessionError, broadcast};
use crate::protocol::ServerMessage;
use crate::state::{ConnId, Connection, Hub, Location, Outbox};

/// Attempts at drawing an unused default name before falling back to the
/// connection id.
const DEFAULT_NAME_ATTEMPTS: usize = 32;

/// Track a freshly upgraded connection.
pub fn register(hub: &mut Hub, conn_id: ConnId, tx: Outbox) {
    hub.connections.insert(conn_id, Connection { name: None, location: Location::Unassigned, tx });
}

/// Enter the lobby, optionally under a new name. Without a name the
/// connection keeps its current one or gets a generated `P<n>`.
///
/// # Errors
///
/// `AlreadyInRoom` while seated, `NameTaken` when another live connection
/// uses the requested name.
pub fn join_lobby(hub: &mut Hub, conn_id: ConnId, player: Option<String>) -> Result<Replies, SessionError> {
    let Some(conn) = hub.connections.get(&conn_id) else {
        return Err(SessionError::UnknownConnection);
    };
    if matches!(conn.location, Location::Room(_)) {
        return Err(SessionError::AlreadyInRoom);
    }

    let requested = player.map(|name| name.trim().to_owned()).filter(|name| !name.is_empty());
    let name = match requested.or_else(|| conn.name.clone()) {
        Some(name) => name,
        None => default_name(hub, conn_id),
    };
    if hub.name_taken(&name, conn_id) {
        return Err(SessionError::NameTaken(name));
    }

    let previous = hub.name_of(conn_id).map(str::to_owned);
    if let Some(previous) = previous.filter(|previous| *previous != name) {
        hub.challenges.clear_party(&previous);
    }
    if let Some(conn) = hub.connections.get_mut(&conn_id) {
        conn.name = Some(name.clone());
    }
    hub.enter_lobby(conn_id);
    broadcast::lobby_update(hub);

    info!(%conn_id, player = %name, "joined lobby");
    Ok(vec![ServerMessage::system(format!("Welcome {name} to the lobby."))])
}

/// Leave the current room (forfeiting an active game) and return to the
/// lobby. From outside a room this only restores lobby membership for a
/// named connection.
///
/// # Errors
///
/// `UnknownConnection` only; every location has a defined outcome.
pub fn leave_game(recorder: &GameRecorder, hub: &mut Hub, conn_id: ConnId) -> Result<Replies, SessionError> {
    match hub.location_of(conn_id) {
        None => Err(SessionError::UnknownConnection),
        Some(Location::Room(_)) => {
            room::leave_room(recorder, hub, conn_id, Departure::Left);
            hub.enter_lobby(conn_id);
            broadcast::lobby_update(hub);
            Ok(vec![ServerMessage::system("Returned to the lobby.")])
        }
        Some(Location::Unassigned) => {
            if hub.enter_lobby(conn_id) {
                broadcast::lobby_update(hub);
            }
            Ok(Vec::new())
        }
        Some(Location::Lobby) => Ok(Vec::new()),
    }
}

/// Forget a connection. Lobby members leave the lobby; seated players leave
/// their room, forfeiting an active game.
pub fn disconnect(recorder: &GameRecorder, hub: &mut Hub, conn_id: ConnId) {
    let Some(location) = hub.location_of(conn_id) else {
        return;
    };
    match location {
        Location::Lobby => {
            hub.leave_lobby(conn_id);
            hub.connections.remove(&conn_id);
            broadcast::lobby_update(hub);
        }
        Location::Room(_) => {
            room::leave_room(recorder, hub, conn_id, Departure::Disconnected);
            hub.connections.remove(&conn_id);
        }
        Location::Unassigned => {
            if let Some(name) = hub.name_of(conn_id).map(str::to_owned) {
                hub.challenges.clear_party(&name);
            }
            hub.connections.remove(&conn_id);
        }
    }
    info!(%conn_id, "connection forgotten");
}

fn default_name(hub: &Hub, conn_id: ConnId) -> String {
    let mut rng = rand::rng();
    (0..DEFAULT_NAME_ATTEMPTS)
        .map(|_| format!("P{}", rng.random_range(0..1000)))
        .find(|name| !hub.name_taken(name, conn_id))
        .unwrap_or_else(|| format!("P{}", conn_id.simple()))
}

#[cfg(test)]
#[path = "lobby_test.rs"]
mod tests;
