//! Room service — moves, game endings, rematches and departures.
//!
//! DESIGN
//! ======
//! A room outlives its games: `begin_game` (re)initialises the game fields,
//! mints a game id and starts the clock, while `finish_game` stops the
//! clock, records the result and clears the game id. Every path that ends a
//! game goes through `finish_game`, so the clock can never outlive it.
//!
//! A move is checked in a fixed order: seated in a room, game still running,
//! mover's turn, then the rules engine. Leaving one's own general in check is
//! allowed; giving check is announced after the new position.

use tracing::{info, warn};
use uuid::Uuid;

use super::persistence::GameRecorder;
use super::{Replies, SessionError, broadcast, clock};
use crate::protocol::ServerMessage;
use crate::rules::{Color, Move, Piece, is_in_check, is_valid_move, winner_by_capture};
use crate::state::{AppState, ConnId, Connections, Hub, Location, Room, RoomId};

pub const GENERAL_CAPTURED: &str = "general captured";

/// Why a player is leaving their room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Departure {
    Disconnected,
    Left,
}

impl Departure {
    fn describe(self, name: &str, color: Color) -> String {
        match self {
            Self::Disconnected => format!("{name} ({color}) disconnected"),
            Self::Left => format!("{name} ({color}) left the game"),
        }
    }
}

// =============================================================================
// GAME LIFECYCLE
// =============================================================================

/// Start a fresh game in `room`: reset the board and clocks, mint a game id,
/// record the start and spawn the clock.
pub fn begin_game(state: &AppState, room: &mut Room) {
    room.stop_clock();
    room.reset_game(state.settings.clock_seconds);

    let game_id = Uuid::new_v4();
    room.game_id = Some(game_id);
    let name_of = |color| room.seat_by_color(color).map_or("", |seat| seat.name.as_str());
    state.recorder.create_game(game_id, room.id, name_of(Color::Red), name_of(Color::Black));
    room.clock = Some(clock::start(
        state.hub.clone(),
        state.recorder.clone(),
        room.id,
        game_id,
        state.settings.tick,
    ));
    info!(room_id = %room.id, %game_id, "game started");
}

/// End the running game in `room` and tell both seats. Does nothing if no
/// game is running.
pub fn finish_game(recorder: &GameRecorder, connections: &Connections, room: &mut Room, winner: Color, reason: &str) {
    let Some(game_id) = room.game_id.take() else {
        return;
    };
    room.stop_clock();
    room.rematch_offered_by = None;
    recorder.finish_game(game_id, winner);

    info!(room_id = %room.id, %game_id, %winner, reason, "game over");
    let msg = ServerMessage::GameOver { winner, reason: reason.to_owned() };
    broadcast::to_room(connections, room, &msg, None);
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Play `mv` for the sender.
///
/// # Errors
///
/// `NotInRoom`, `GameOver`, `NotYourTurn`, or the rules engine's reason, in
/// that order of precedence. A rejected move changes nothing.
pub fn submit_move(recorder: &GameRecorder, hub: &mut Hub, conn_id: ConnId, mv: Move) -> Result<Replies, SessionError> {
    let room_id = seated_room(hub, conn_id)?;
    let Some(room) = hub.rooms.get_mut(&room_id) else {
        return Err(SessionError::NotInRoom);
    };
    let Some(color) = room.seat(conn_id).map(|seat| seat.color) else {
        return Err(SessionError::NotInRoom);
    };
    let Some(game_id) = room.game_id else {
        return Err(SessionError::GameOver);
    };
    if color != room.turn {
        return Err(SessionError::NotYourTurn);
    }
    if let Err(e) = is_valid_move(&room.board, mv, color) {
        warn!(%room_id, %conn_id, ?mv, reason = %e, "move rejected");
        return Err(e.into());
    }

    let glyph = room.board.get(mv.from).map_or("", Piece::glyph);
    room.board.apply(mv);
    room.move_count += 1;
    recorder.add_move(game_id, room.move_count, mv, glyph);
    room.turn = color.opponent();

    broadcast::to_room(&hub.connections, room, &room.state_message(), None);
    if let Some(winner) = winner_by_capture(&room.board) {
        finish_game(recorder, &hub.connections, room, winner, GENERAL_CAPTURED);
    } else if is_in_check(&room.board, room.turn) {
        broadcast::to_room(&hub.connections, room, &ServerMessage::system("Check!"), None);
    }
    Ok(Vec::new())
}

/// Offer a rematch after a finished game. An offer from the other player is
/// an acceptance and starts the new game; a repeated offer re-notifies.
///
/// # Errors
///
/// `NotInRoom` outside a room, `GameNotOver` while a game is running and
/// `OpponentLeft` once the other seat is empty.
pub fn offer_rematch(state: &AppState, hub: &mut Hub, conn_id: ConnId) -> Result<Replies, SessionError> {
    let room_id = seated_room(hub, conn_id)?;
    let Some(room) = hub.rooms.get_mut(&room_id) else {
        return Err(SessionError::NotInRoom);
    };
    let Some(me) = room.seat(conn_id).map(|seat| seat.name.clone()) else {
        return Err(SessionError::NotInRoom);
    };
    if room.is_active() {
        return Err(SessionError::GameNotOver);
    }
    let Some(opponent_id) = room.opponent_of(conn_id).map(|seat| seat.conn_id) else {
        return Err(SessionError::OpponentLeft);
    };

    let accepted = room.rematch_offered_by.as_deref().is_some_and(|offerer| offerer != me);
    if accepted {
        begin_game(state, room);
        broadcast::to_room(&hub.connections, room, &room.state_message(), None);
        let notice = ServerMessage::system("Both players agreed. New game started!");
        broadcast::to_room(&hub.connections, room, &notice, None);
        info!(%room_id, "rematch agreed");
        return Ok(Vec::new());
    }

    room.rematch_offered_by = Some(me.clone());
    broadcast::to_conn(&hub.connections, opponent_id, ServerMessage::RematchOffered { from: me });
    Ok(vec![ServerMessage::system("Rematch offer sent.")])
}

/// Take the sender out of its room. An active game is forfeited to the
/// opponent; otherwise the opponent is told the player left. The room is
/// destroyed once both seats are empty. The connection ends up
/// `Unassigned`.
pub fn leave_room(recorder: &GameRecorder, hub: &mut Hub, conn_id: ConnId, departure: Departure) {
    let Ok(room_id) = seated_room(hub, conn_id) else {
        return;
    };
    if let Some(conn) = hub.connections.get_mut(&conn_id) {
        conn.location = Location::Unassigned;
    }
    let Some(room) = hub.rooms.get_mut(&room_id) else {
        return;
    };
    let Some(index) = room.seats.iter().position(|seat| seat.conn_id == conn_id) else {
        return;
    };
    let seat = room.seats.remove(index);

    if room.is_active() {
        let reason = departure.describe(&seat.name, seat.color);
        finish_game(recorder, &hub.connections, room, seat.color.opponent(), &reason);
    } else {
        let notice = ServerMessage::system(format!("{} left the room.", seat.name));
        broadcast::to_room(&hub.connections, room, &notice, None);
    }
    if room.rematch_offered_by.as_deref() == Some(seat.name.as_str()) {
        room.rematch_offered_by = None;
    }

    info!(%room_id, %conn_id, player = %seat.name, ?departure, "player left room");
    if room.seats.is_empty() {
        hub.rooms.remove(&room_id);
        info!(%room_id, "room evicted");
    }
    hub.challenges.clear_party(&seat.name);
}

fn seated_room(hub: &Hub, conn_id: ConnId) -> Result<RoomId, SessionError> {
    match hub.location_of(conn_id) {
        Some(Location::Room(room_id)) => Ok(room_id),
        Some(_) => Err(SessionError::NotInRoom),
        None => Err(SessionError::UnknownConnection),
    }
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
