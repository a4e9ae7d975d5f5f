//! Protocol — the JSON messages exchanged over the game WebSocket.
//!
//! ARCHITECTURE
//! ============
//! Every message is one JSON object with a `type` tag. Inbound messages decode
//! into the closed [`ClientMessage`] union and outbound messages are built as
//! [`ServerMessage`] values, so dispatch is an exhaustive `match` on both
//! sides.
//!
//! DESIGN
//! ======
//! Decoding is two-phase: the raw text is parsed to a JSON value first so an
//! unknown `type` can be told apart from a known type with a bad payload.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::rules::{Board, Color, Move};

// =============================================================================
// INBOUND
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    JoinLobby {
        #[serde(default)]
        player: Option<String>,
    },
    Challenge {
        target_player: String,
    },
    ChallengeAccept {
        opponent_name: String,
    },
    ChallengeDecline {
        opponent_name: String,
    },
    Move {
        #[serde(rename = "move")]
        mv: Move,
    },
    OfferRematch,
    LeaveGame,
}

impl ClientMessage {
    /// Every `type` tag the server understands.
    pub const TYPES: [&'static str; 7] = [
        "join_lobby",
        "challenge",
        "challenge_accept",
        "challenge_decline",
        "move",
        "offer_rematch",
        "leave_game",
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid_json")]
    InvalidJson,
    #[error("unknown_message_type")]
    UnknownType { kind: Option<String> },
}

/// Decode one inbound text message.
///
/// # Errors
///
/// `InvalidJson` when the text is not a JSON object or a known message has a
/// malformed payload; `UnknownType` when `type` is missing or unrecognized.
pub fn parse_client_message(text: &str) -> Result<ClientMessage, ProtocolError> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(|_| ProtocolError::InvalidJson)?;
    if !value.is_object() {
        return Err(ProtocolError::InvalidJson);
    }

    let kind = value.get("type").and_then(serde_json::Value::as_str);
    match kind {
        Some(kind) if ClientMessage::TYPES.contains(&kind) => {}
        _ => return Err(ProtocolError::UnknownType { kind: kind.map(str::to_owned) }),
    }

    serde_json::from_value(value).map_err(|_| ProtocolError::InvalidJson)
}

// =============================================================================
// OUTBOUND
// =============================================================================

/// Remaining seconds per color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Clocks {
    pub red: u32,
    pub black: u32,
}

impl Clocks {
    #[must_use]
    pub fn new(seconds: u32) -> Self {
        Self { red: seconds, black: seconds }
    }

    #[must_use]
    pub fn get(self, color: Color) -> u32 {
        match color {
            Color::Red => self.red,
            Color::Black => self.black,
        }
    }

    /// Count one second off `color`'s clock and return what is left.
    pub fn tick(&mut self, color: Color) -> u32 {
        let slot = match color {
            Color::Red => &mut self.red,
            Color::Black => &mut self.black,
        };
        *slot = slot.saturating_sub(1);
        *slot
    }
}

/// Board wrapper matching the `state.state` wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardSnapshot {
    pub board: Board,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    LobbyUpdate {
        players: Vec<String>,
    },
    System {
        text: String,
    },
    Error {
        reason: String,
    },
    ChallengeReceived {
        from_player: String,
    },
    GameStart {
        room_id: Uuid,
        color: Color,
        opponent: String,
    },
    State {
        turn: Color,
        state: BoardSnapshot,
        colors: BTreeMap<String, Color>,
        clocks: Clocks,
    },
    ClockUpdate {
        clocks: Clocks,
    },
    GameOver {
        winner: Color,
        reason: String,
    },
    RematchOffered {
        from: String,
    },
}

impl ServerMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self::System { text: text.into() }
    }

    /// Error reply carrying the error's display text as `reason`.
    pub fn error(err: &(impl std::fmt::Display + ?Sized)) -> Self {
        Self::Error { reason: err.to_string() }
    }

    /// The wire `type` tag, for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LobbyUpdate { .. } => "lobby_update",
            Self::System { .. } => "system",
            Self::Error { .. } => "error",
            Self::ChallengeReceived { .. } => "challenge_received",
            Self::GameStart { .. } => "game_start",
            Self::State { .. } => "state",
            Self::ClockUpdate { .. } => "clock_update",
            Self::GameOver { .. } => "game_over",
            Self::RematchOffered { .. } => "rematch_offered",
        }
    }
}

#[cfg(test)]
#[path = "protocol_test.rs"]
mod tests;
