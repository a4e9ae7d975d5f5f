//! Challenge broker — pending invitations between lobby players.
//!
//! DESIGN
//! ======
//! [`ChallengeBook`] indexes each pending challenge both by target and by
//! challenger, so at most one challenge targets a given player and at most
//! one originates from one. A new challenge displaces whatever either party
//! already had pending, and both indexes are cleaned together.
//!
//! LIFECYCLE
//! =========
//! `challenge` creates the pair; `accept`, `decline`, or either party leaving
//! the lobby destroys it. Accepting moves both players into a new room with
//! the challenger playing red.

use std::collections::HashMap;

use tracing::{debug, info};
use uuid::Uuid;

use super::{Replies, SessionError, broadcast, room};
use crate::protocol::ServerMessage;
use crate::rules::Color;
use crate::state::{AppState, ConnId, Hub, Location, Room, Seat};

// =============================================================================
// BOOK
// =============================================================================

#[derive(Debug, Default)]
pub struct ChallengeBook {
    /// target -> challenger
    by_target: HashMap<String, String>,
    /// challenger -> target
    by_challenger: HashMap<String, String>,
}

impl ChallengeBook {
    /// Record `challenger -> target`, replacing any challenge already sent by
    /// `challenger` or already aimed at `target`.
    pub fn insert(&mut self, challenger: &str, target: &str) {
        if let Some(old_target) = self.by_challenger.remove(challenger) {
            self.by_target.remove(&old_target);
        }
        if let Some(old_challenger) = self.by_target.remove(target) {
            self.by_challenger.remove(&old_challenger);
        }
        self.by_target.insert(target.to_owned(), challenger.to_owned());
        self.by_challenger.insert(challenger.to_owned(), target.to_owned());
    }

    /// Who is currently challenging `target`.
    #[must_use]
    pub fn pending_for(&self, target: &str) -> Option<&str> {
        self.by_target.get(target).map(String::as_str)
    }

    /// Whom `challenger` is currently challenging.
    #[cfg(test)]
    #[must_use]
    pub fn sent_by(&self, challenger: &str) -> Option<&str> {
        self.by_challenger.get(challenger).map(String::as_str)
    }

    /// Remove the pair if it is pending. Returns whether it was.
    pub fn remove_pair(&mut self, challenger: &str, target: &str) -> bool {
        if self.pending_for(target) != Some(challenger) {
            return false;
        }
        self.by_target.remove(target);
        self.by_challenger.remove(challenger);
        true
    }

    /// Drop every challenge `name` sent or received.
    pub fn clear_party(&mut self, name: &str) {
        if let Some(target) = self.by_challenger.remove(name) {
            self.by_target.remove(&target);
        }
        if let Some(challenger) = self.by_target.remove(name) {
            self.by_challenger.remove(&challenger);
        }
    }

    #[cfg(test)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_target.len()
    }

    #[cfg(test)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_target.is_empty()
    }
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Invite `target` to a game.
///
/// # Errors
///
/// The sender must be in the lobby, may not challenge themselves, and
/// `target` must be a lobby member whose queue accepts the invitation.
pub fn challenge(hub: &mut Hub, conn_id: ConnId, target: &str) -> Result<Replies, SessionError> {
    let from = lobby_name(hub, conn_id)?;
    if from == target {
        return Err(SessionError::SelfChallenge);
    }
    let Some(target_id) = hub.find_in_lobby(target) else {
        return Err(SessionError::PlayerNotInLobby(target.to_owned()));
    };

    let invitation = ServerMessage::ChallengeReceived { from_player: from.clone() };
    if !broadcast::to_conn(&hub.connections, target_id, invitation) {
        return Err(SessionError::ChallengeUndeliverable(target.to_owned()));
    }
    hub.challenges.insert(&from, target);

    info!(%conn_id, challenger = %from, %target, "challenge sent");
    Ok(vec![ServerMessage::system(format!("Challenge sent to {target}. Waiting for a reply..."))])
}

/// Accept the pending challenge from `opponent` and start a game.
///
/// # Errors
///
/// The acceptor must be in the lobby with a pending challenge from
/// `opponent`, and `opponent` must still be in the lobby.
pub fn accept(state: &AppState, hub: &mut Hub, conn_id: ConnId, opponent: &str) -> Result<Replies, SessionError> {
    let acceptor = lobby_name(hub, conn_id)?;
    if hub.challenges.pending_for(&acceptor) != Some(opponent) {
        return Err(SessionError::NoPendingChallenge(opponent.to_owned()));
    }
    let Some(opponent_id) = hub.find_in_lobby(opponent) else {
        hub.challenges.remove_pair(opponent, &acceptor);
        return Err(SessionError::PlayerNotInLobby(opponent.to_owned()));
    };

    hub.leave_lobby(conn_id);
    hub.leave_lobby(opponent_id);

    let room_id = Uuid::new_v4();
    let red = Seat { conn_id: opponent_id, name: opponent.to_owned(), color: Color::Red };
    let black = Seat { conn_id, name: acceptor.clone(), color: Color::Black };
    let mut room = Room::new(room_id, red, black, state.settings.clock_seconds);
    for id in [opponent_id, conn_id] {
        if let Some(conn) = hub.connections.get_mut(&id) {
            conn.location = Location::Room(room_id);
        }
    }
    room::begin_game(state, &mut room);

    broadcast::to_conn(
        &hub.connections,
        opponent_id,
        ServerMessage::GameStart { room_id, color: Color::Red, opponent: acceptor.clone() },
    );
    // The acceptor's game_start is the direct reply, which reaches the socket
    // before anything queued here.
    broadcast::to_room(&hub.connections, &room, &room.state_message(), None);
    hub.rooms.insert(room_id, room);
    broadcast::lobby_update(hub);

    info!(%room_id, red = %opponent, black = %acceptor, "match started");
    Ok(vec![ServerMessage::GameStart { room_id, color: Color::Black, opponent: opponent.to_owned() }])
}

/// Refuse a challenge. Never fails: the challenger is told if they are still
/// connected, and the pair is cleared if it was pending.
pub fn decline(hub: &mut Hub, conn_id: ConnId, opponent: &str) -> Replies {
    let Some(decliner) = hub.name_of(conn_id).map(str::to_owned) else {
        return Vec::new();
    };
    if !hub.challenges.remove_pair(opponent, &decliner) {
        debug!(%conn_id, challenger = %opponent, %decliner, "decline without a pending challenge");
        return Vec::new();
    }
    info!(%conn_id, challenger = %opponent, %decliner, "challenge declined");
    if let Some(challenger_id) = hub.find_by_name(opponent) {
        let notice = ServerMessage::system(format!("{decliner} declined your challenge."));
        broadcast::to_conn(&hub.connections, challenger_id, notice);
    }
    Vec::new()
}

fn lobby_name(hub: &Hub, conn_id: ConnId) -> Result<String, SessionError> {
    let conn = hub.connections.get(&conn_id).ok_or(SessionError::UnknownConnection)?;
    match (&conn.location, &conn.name) {
        (Location::Lobby, Some(name)) => Ok(name.clone()),
        _ => Err(SessionError::NotInLobby),
    }
}

#[cfg(test)]
#[path = "challenge_test.rs"]
mod tests;
