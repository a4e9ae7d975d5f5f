//! Move legality, check and flying-general detection.
//!
//! DESIGN
//! ======
//! Attack and movement share one reachability function: a square is attacked
//! when an opposing piece could legally move onto it. Capturing the general is
//! an ordinary move, so no special case exists for it.
//!
//! `is_valid_move` does not reject moves that leave the mover's own general in
//! check. It only rejects the flying-general position, and it rejects that
//! regardless of whose general ends up exposed.

use super::board::{Board, Color, Move, PieceKind, Square};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    #[error("move goes off the board")]
    OutOfBounds,
    #[error("there is no piece on that square")]
    EmptySource,
    #[error("that piece is not yours")]
    NotYourPiece,
    #[error("you cannot capture your own piece")]
    SelfCapture,
    #[error("that piece cannot move there")]
    IllegalMovement,
    #[error("the generals may not face each other")]
    FlyingGeneral,
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Validate `mv` for the player of `color`. Checks run in a fixed order and
/// the first failure wins.
///
/// # Errors
///
/// Returns the [`MoveError`] describing the first failed check.
pub fn is_valid_move(board: &Board, mv: Move, color: Color) -> Result<(), MoveError> {
    if !mv.from.in_bounds() || !mv.to.in_bounds() {
        return Err(MoveError::OutOfBounds);
    }
    let Some(piece) = board.get(mv.from) else {
        return Err(MoveError::EmptySource);
    };
    if piece.color != color {
        return Err(MoveError::NotYourPiece);
    }
    if board.get(mv.to).is_some_and(|target| target.color == color) {
        return Err(MoveError::SelfCapture);
    }
    if !can_reach(board, mv.from, mv.to) {
        return Err(MoveError::IllegalMovement);
    }
    if is_flying_general(&board.after(mv)) {
        return Err(MoveError::FlyingGeneral);
    }
    Ok(())
}

/// Whether the piece on `from` can move to `to` by its own movement rule.
/// Ignores what color stands on `to`.
#[must_use]
pub fn can_reach(board: &Board, from: Square, to: Square) -> bool {
    let Some(piece) = board.get(from) else {
        return false;
    };
    if !to.in_bounds() {
        return false;
    }
    let dx = (to.x - from.x).abs();
    let dy = (to.y - from.y).abs();

    match piece.kind {
        PieceKind::Chariot => board.count_between(from, to) == Some(0),
        PieceKind::Horse => horse_reach(board, from, to, dx, dy),
        PieceKind::Elephant => {
            dx == 2
                && dy == 2
                && piece.color.own_half(to.y)
                && board.get(midpoint(from, to)).is_none()
        }
        PieceKind::Advisor => dx == 1 && dy == 1 && piece.color.palace_contains(to),
        PieceKind::General => dx + dy == 1 && piece.color.palace_contains(to),
        PieceKind::Cannon => {
            let screens = usize::from(board.get(to).is_some());
            board.count_between(from, to) == Some(screens)
        }
        PieceKind::Soldier => soldier_reach(piece.color, from, to, dx, dy),
    }
}

fn horse_reach(board: &Board, from: Square, to: Square, dx: i32, dy: i32) -> bool {
    let leg = match (dx, dy) {
        (2, 1) => Square::new(midpoint(from, to).x, from.y),
        (1, 2) => Square::new(from.x, midpoint(from, to).y),
        _ => return false,
    };
    board.get(leg).is_none()
}

fn soldier_reach(color: Color, from: Square, to: Square, dx: i32, dy: i32) -> bool {
    if dx + dy != 1 {
        return false;
    }
    if dy == 1 {
        return to.y - from.y == color.forward();
    }
    // Sideways only after crossing the river.
    !color.own_half(from.y)
}

fn midpoint(a: Square, b: Square) -> Square {
    Square::new((a.x + b.x) / 2, (a.y + b.y) / 2)
}

// =============================================================================
// CHECK / FLYING GENERAL
// =============================================================================

/// Whether any piece of `attacker` can reach `target`.
#[must_use]
pub fn is_square_attacked(board: &Board, target: Square, attacker: Color) -> bool {
    board
        .pieces()
        .filter(|(_, piece)| piece.color == attacker)
        .any(|(square, _)| can_reach(board, square, target))
}

/// Whether `color`'s general is attacked. A missing general is not in check.
#[must_use]
pub fn is_in_check(board: &Board, color: Color) -> bool {
    board
        .find_general(color)
        .is_some_and(|general| is_square_attacked(board, general, color.opponent()))
}

/// Both generals on one file with nothing between them.
#[must_use]
pub fn is_flying_general(board: &Board) -> bool {
    let (Some(red), Some(black)) = (board.find_general(Color::Red), board.find_general(Color::Black)) else {
        return false;
    };
    red.x == black.x && board.count_between(red, black) == Some(0)
}

/// Winner decided by a captured general, if either general is gone.
#[must_use]
pub fn winner_by_capture(board: &Board) -> Option<Color> {
    match (board.find_general(Color::Red), board.find_general(Color::Black)) {
        (Some(_), Some(_)) => None,
        (Some(_), None) => Some(Color::Red),
        (None, _) => Some(Color::Black),
    }
}

#[cfg(test)]
#[path = "legality_test.rs"]
mod tests;
