//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. All
//! lobby, challenge and room state lives in one [`Hub`] behind a single
//! `tokio::sync::Mutex`; every handler and clock tick runs its whole
//! read-validate-mutate-notify step under that lock and never awaits while
//! holding it. Outbound messages leave through bounded per-connection
//! channels with `try_send`.
//!
//! INVARIANTS
//! ==========
//! - A connection at `Location::Room(id)` occupies a seat in room `id`, and
//!   every seat points back at a connection located in that room.
//! - A connection at `Location::Lobby` appears exactly once in `Hub::lobby`.
//! - `Room::game_id` is `Some` exactly while a game is being played.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use uuid::Uuid;

use crate::protocol::{BoardSnapshot, Clocks, ServerMessage};
use crate::rules::{Board, Color};
use crate::services::challenge::ChallengeBook;
use crate::services::clock::ClockHandle;
use crate::services::persistence::{GameRecorder, GameStore};

pub type ConnId = Uuid;
pub type RoomId = Uuid;

/// Sending half of a connection's outbound queue.
pub type Outbox = mpsc::Sender<ServerMessage>;

pub type Connections = HashMap<ConnId, Connection>;

// =============================================================================
// CONNECTIONS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Unassigned,
    Lobby,
    Room(RoomId),
}

pub struct Connection {
    /// Display name, set by the first `join_lobby`.
    pub name: Option<String>,
    pub location: Location,
    pub tx: Outbox,
}

// =============================================================================
// ROOM
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seat {
    pub conn_id: ConnId,
    pub name: String,
    pub color: Color,
}

/// One session between two players. Survives across rematches; destroyed when
/// both seats are empty.
pub struct Room {
    pub id: RoomId,
    pub seats: Vec<Seat>,
    pub board: Board,
    pub turn: Color,
    pub move_count: u32,
    pub clocks: Clocks,
    /// Running clock task. Dropping the handle cancels it.
    pub clock: Option<ClockHandle>,
    pub game_id: Option<Uuid>,
    pub rematch_offered_by: Option<String>,
}

impl Room {
    #[must_use]
    pub fn new(id: RoomId, red: Seat, black: Seat, clock_seconds: u32) -> Self {
        Self {
            id,
            seats: vec![red, black],
            board: Board::initial(),
            turn: Color::Red,
            move_count: 0,
            clocks: Clocks::new(clock_seconds),
            clock: None,
            game_id: None,
            rematch_offered_by: None,
        }
    }

    /// Reset the board, turn, counter and clocks for a fresh game. Seats and
    /// colors are kept.
    pub fn reset_game(&mut self, clock_seconds: u32) {
        self.board = Board::initial();
        self.turn = Color::Red;
        self.move_count = 0;
        self.clocks = Clocks::new(clock_seconds);
        self.rematch_offered_by = None;
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.game_id.is_some()
    }

    #[must_use]
    pub fn seat(&self, conn_id: ConnId) -> Option<&Seat> {
        self.seats.iter().find(|seat| seat.conn_id == conn_id)
    }

    #[must_use]
    pub fn opponent_of(&self, conn_id: ConnId) -> Option<&Seat> {
        self.seats.iter().find(|seat| seat.conn_id != conn_id)
    }

    #[must_use]
    pub fn seat_by_color(&self, color: Color) -> Option<&Seat> {
        self.seats.iter().find(|seat| seat.color == color)
    }

    /// Seated player names mapped to their colors.
    #[must_use]
    pub fn colors(&self) -> BTreeMap<String, Color> {
        self.seats.iter().map(|seat| (seat.name.clone(), seat.color)).collect()
    }

    #[must_use]
    pub fn state_message(&self) -> ServerMessage {
        ServerMessage::State {
            turn: self.turn,
            state: BoardSnapshot { board: self.board.clone() },
            colors: self.colors(),
            clocks: self.clocks,
        }
    }

    /// Cancel the clock task, if any. Safe to call repeatedly.
    pub fn stop_clock(&mut self) {
        if self.clock.take().is_some() {
            tracing::debug!(room_id = %self.id, "clock stopped");
        }
    }
}

// =============================================================================
// HUB
// =============================================================================

/// Everything guarded by the process-wide lock.
#[derive(Default)]
pub struct Hub {
    pub(crate) connections: Connections,
    /// Lobby members in join order.
    pub(crate) lobby: Vec<ConnId>,
    pub(crate) challenges: ChallengeBook,
    pub(crate) rooms: HashMap<RoomId, Room>,
}

impl Hub {
    #[must_use]
    pub fn name_of(&self, conn_id: ConnId) -> Option<&str> {
        self.connections.get(&conn_id)?.name.as_deref()
    }

    #[must_use]
    pub fn location_of(&self, conn_id: ConnId) -> Option<Location> {
        self.connections.get(&conn_id).map(|conn| conn.location)
    }

    /// Lobby member currently using `name`.
    #[must_use]
    pub fn find_in_lobby(&self, name: &str) -> Option<ConnId> {
        self.lobby
            .iter()
            .copied()
            .find(|id| self.name_of(*id) == Some(name))
    }

    /// Any live connection using `name`, wherever it is.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<ConnId> {
        self.connections
            .iter()
            .find(|(_, conn)| conn.name.as_deref() == Some(name))
            .map(|(id, _)| *id)
    }

    /// Whether a connection other than `conn_id` already holds `name`.
    #[must_use]
    pub fn name_taken(&self, name: &str, conn_id: ConnId) -> bool {
        self.find_by_name(name).is_some_and(|holder| holder != conn_id)
    }

    /// Lobby member names in join order.
    #[must_use]
    pub fn lobby_players(&self) -> Vec<String> {
        self.lobby
            .iter()
            .filter_map(|id| self.name_of(*id).map(str::to_owned))
            .collect()
    }

    /// Put a named connection into the lobby. Returns false for unknown or
    /// unnamed connections.
    pub fn enter_lobby(&mut self, conn_id: ConnId) -> bool {
        let Some(conn) = self.connections.get_mut(&conn_id) else {
            return false;
        };
        if conn.name.is_none() {
            return false;
        }
        conn.location = Location::Lobby;
        if !self.lobby.contains(&conn_id) {
            self.lobby.push(conn_id);
        }
        true
    }

    /// Drop `conn_id` from lobby membership and clear its challenges.
    pub fn leave_lobby(&mut self, conn_id: ConnId) {
        self.lobby.retain(|id| *id != conn_id);
        if let Some(conn) = self.connections.get_mut(&conn_id) {
            if conn.location == Location::Lobby {
                conn.location = Location::Unassigned;
            }
            if let Some(name) = &conn.name {
                self.challenges.clear_party(name);
            }
        }
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Per-game tuning shared by every room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameSettings {
    /// Starting seconds on each clock.
    pub clock_seconds: u32,
    /// Interval between clock ticks; one tick removes one second.
    pub tick: Duration,
    /// Capacity of each connection's outbound queue.
    pub client_channel_capacity: usize,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self { clock_seconds: 300, tick: Duration::from_secs(1), client_channel_capacity: 256 }
    }
}

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<Mutex<Hub>>,
    /// Non-blocking write path for game records.
    pub recorder: GameRecorder,
    /// Read path for the leaderboard.
    pub store: Arc<dyn GameStore>,
    pub settings: GameSettings,
}

impl AppState {
    #[must_use]
    pub fn new(recorder: GameRecorder, store: Arc<dyn GameStore>, settings: GameSettings) -> Self {
        Self { hub: Arc::new(Mutex::new(Hub::default())), recorder, store, settings }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
