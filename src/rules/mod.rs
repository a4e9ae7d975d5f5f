//! Rules engine — pure functions over a board snapshot.
//!
//! SYSTEM CONTEXT
//! ==============
//! The room service asks this module two questions per move: is it legal for
//! the mover, and did it put the opponent in check or capture a general.
//! Nothing here touches shared state.

pub mod board;
pub mod legality;

pub use board::{Board, Color, Move, Piece, PieceKind, Square};
pub use legality::{MoveError, is_in_check, is_valid_move, winner_by_capture};
