//! Domain services used by the websocket route and the clock tasks.
//!
//! ARCHITECTURE
//! ============
//! Service functions take the locked [`Hub`](crate::state::Hub) and own the
//! session state machine: validate against the connection's location, mutate,
//! then queue notifications. Route handlers stay focused on protocol
//! translation.

pub mod broadcast;
pub mod challenge;
pub mod clock;
pub mod lobby;
pub mod persistence;
pub mod room;

use crate::protocol::ServerMessage;
use crate::rules::MoveError;

/// Messages returned directly to the requesting connection.
pub type Replies = Vec<ServerMessage>;

/// Request rejected because of the sender's session state. Reported back to
/// the sender as `error{reason}`; nothing is mutated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("connection is not registered")]
    UnknownConnection,
    #[error("join the lobby first")]
    NotInLobby,
    #[error("leave your game before joining the lobby")]
    AlreadyInRoom,
    #[error("name already taken")]
    NameTaken(String),
    #[error("you cannot challenge yourself")]
    SelfChallenge,
    #[error("player {0} is not in the lobby")]
    PlayerNotInLobby(String),
    #[error("could not deliver the challenge to {0}")]
    ChallengeUndeliverable(String),
    #[error("no pending challenge from {0}")]
    NoPendingChallenge(String),
    #[error("you are not in a room")]
    NotInRoom,
    #[error("the game is over")]
    GameOver,
    #[error("the game is not over yet")]
    GameNotOver,
    #[error("your opponent has left the room")]
    OpponentLeft,
    #[error("it is not your turn")]
    NotYourTurn,
    #[error(transparent)]
    IllegalMove(#[from] MoveError),
}
