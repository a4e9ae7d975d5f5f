//! Board model — colors, pieces, squares and the 9×10 grid.
//!
//! DESIGN
//! ======
//! Cells are stored row-major (`cells[y][x]`). Rank 0 is black's back rank,
//! rank 9 is red's. Pieces travel over the wire as their traditional glyphs,
//! so the grid serializes as ten rows of nine strings with `""` for empty.

use std::fmt;

use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};

/// Number of files (columns).
pub const FILES: i32 = 9;

/// Number of ranks (rows).
pub const RANKS: i32 = 10;

// =============================================================================
// COLOR
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Black,
}

impl Color {
    #[must_use]
    pub fn opponent(self) -> Self {
        match self {
            Self::Red => Self::Black,
            Self::Black => Self::Red,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Black => "black",
        }
    }

    /// Rank direction of a forward step for this color.
    #[must_use]
    pub(crate) fn forward(self) -> i32 {
        match self {
            Self::Red => -1,
            Self::Black => 1,
        }
    }

    /// Whether rank `y` lies on this color's own side of the river.
    #[must_use]
    pub(crate) fn own_half(self, y: i32) -> bool {
        match self {
            Self::Red => y >= 5,
            Self::Black => y <= 4,
        }
    }

    /// Whether `square` lies inside this color's palace.
    #[must_use]
    pub(crate) fn palace_contains(self, square: Square) -> bool {
        if !(3..=5).contains(&square.x) {
            return false;
        }
        match self {
            Self::Red => (7..=9).contains(&square.y),
            Self::Black => (0..=2).contains(&square.y),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// PIECES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PieceKind {
    Chariot,
    Horse,
    Elephant,
    Advisor,
    General,
    Cannon,
    Soldier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Piece {
    pub kind: PieceKind,
    pub color: Color,
}

const RED_GLYPHS: [(PieceKind, &str); 7] = [
    (PieceKind::Chariot, "俥"),
    (PieceKind::Horse, "傌"),
    (PieceKind::Elephant, "相"),
    (PieceKind::Advisor, "仕"),
    (PieceKind::General, "帥"),
    (PieceKind::Cannon, "炮"),
    (PieceKind::Soldier, "兵"),
];

const BLACK_GLYPHS: [(PieceKind, &str); 7] = [
    (PieceKind::Chariot, "車"),
    (PieceKind::Horse, "馬"),
    (PieceKind::Elephant, "象"),
    (PieceKind::Advisor, "士"),
    (PieceKind::General, "將"),
    (PieceKind::Cannon, "砲"),
    (PieceKind::Soldier, "卒"),
];

impl Piece {
    #[must_use]
    pub const fn new(kind: PieceKind, color: Color) -> Self {
        Self { kind, color }
    }

    /// Traditional glyph used on the wire and in the move log.
    #[must_use]
    pub fn glyph(self) -> &'static str {
        let table = match self.color {
            Color::Red => &RED_GLYPHS,
            Color::Black => &BLACK_GLYPHS,
        };
        table
            .iter()
            .find(|(kind, _)| *kind == self.kind)
            .map_or("", |(_, glyph)| glyph)
    }
}

// =============================================================================
// SQUARES AND MOVES
// =============================================================================

/// Grid coordinate. Signed so that out-of-range client input survives parsing
/// and is rejected by the bounds check rather than by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Square {
    pub x: i32,
    pub y: i32,
}

impl Square {
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn in_bounds(self) -> bool {
        (0..FILES).contains(&self.x) && (0..RANKS).contains(&self.y)
    }

    fn index(self) -> Option<(usize, usize)> {
        if !self.in_bounds() {
            return None;
        }
        Some((usize::try_from(self.x).ok()?, usize::try_from(self.y).ok()?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    pub from: Square,
    pub to: Square,
}

impl Move {
    #[must_use]
    pub const fn new(from: Square, to: Square) -> Self {
        Self { from, to }
    }
}

// =============================================================================
// BOARD
// =============================================================================

type Cells = [[Option<Piece>; 9]; 10];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    cells: Cells,
}

impl Board {
    #[must_use]
    pub fn empty() -> Self {
        Self { cells: [[None; 9]; 10] }
    }

    /// Standard opening position.
    #[must_use]
    pub fn initial() -> Self {
        use PieceKind::{Advisor, Cannon, Chariot, Elephant, General, Horse, Soldier};

        const BACK_RANK: [PieceKind; 9] =
            [Chariot, Horse, Elephant, Advisor, General, Advisor, Elephant, Horse, Chariot];

        let mut board = Self::empty();
        for (x, kind) in (0..).zip(BACK_RANK) {
            board.set(Square::new(x, 0), Some(Piece::new(kind, Color::Black)));
            board.set(Square::new(x, 9), Some(Piece::new(kind, Color::Red)));
        }
        for x in [1, 7] {
            board.set(Square::new(x, 2), Some(Piece::new(Cannon, Color::Black)));
            board.set(Square::new(x, 7), Some(Piece::new(Cannon, Color::Red)));
        }
        for x in [0, 2, 4, 6, 8] {
            board.set(Square::new(x, 3), Some(Piece::new(Soldier, Color::Black)));
            board.set(Square::new(x, 6), Some(Piece::new(Soldier, Color::Red)));
        }
        board
    }

    /// Build a board from `(x, y, piece)` placements on an empty grid.
    #[cfg(test)]
    #[must_use]
    pub fn with_pieces(placements: &[(i32, i32, Piece)]) -> Self {
        let mut board = Self::empty();
        for &(x, y, piece) in placements {
            board.set(Square::new(x, y), Some(piece));
        }
        board
    }

    /// Piece at `square`; `None` for empty or out-of-bounds squares.
    #[must_use]
    pub fn get(&self, square: Square) -> Option<Piece> {
        let (x, y) = square.index()?;
        self.cells[y][x]
    }

    /// Place or clear a cell. Out-of-bounds squares are ignored.
    pub fn set(&mut self, square: Square, piece: Option<Piece>) {
        if let Some((x, y)) = square.index() {
            self.cells[y][x] = piece;
        }
    }

    /// Move whatever stands on `from` to `to`, returning the captured piece.
    /// Performs no legality checks.
    pub fn apply(&mut self, mv: Move) -> Option<Piece> {
        let moving = self.get(mv.from);
        let captured = self.get(mv.to);
        self.set(mv.from, None);
        self.set(mv.to, moving);
        captured
    }

    /// Copy of the board with `mv` applied.
    #[must_use]
    pub fn after(&self, mv: Move) -> Self {
        let mut next = self.clone();
        next.apply(mv);
        next
    }

    /// Iterate occupied squares.
    pub fn pieces(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        (0..RANKS).flat_map(move |y| {
            (0..FILES).filter_map(move |x| {
                let square = Square::new(x, y);
                self.get(square).map(|piece| (square, piece))
            })
        })
    }

    #[must_use]
    pub fn find_general(&self, color: Color) -> Option<Square> {
        self.pieces()
            .find(|(_, piece)| piece.kind == PieceKind::General && piece.color == color)
            .map(|(square, _)| square)
    }

    /// Occupied cells strictly between two squares on the same file or rank.
    /// `None` when the squares are not aligned.
    #[must_use]
    pub fn count_between(&self, from: Square, to: Square) -> Option<usize> {
        let squares: Vec<Square> = if from.x == to.x {
            let (lo, hi) = (from.y.min(to.y), from.y.max(to.y));
            (lo + 1..hi).map(|y| Square::new(from.x, y)).collect()
        } else if from.y == to.y {
            let (lo, hi) = (from.x.min(to.x), from.x.max(to.x));
            (lo + 1..hi).map(|x| Square::new(x, from.y)).collect()
        } else {
            return None;
        };
        Some(squares.into_iter().filter(|sq| self.get(*sq).is_some()).count())
    }
}

impl Serialize for Board {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut rows = serializer.serialize_seq(Some(self.cells.len()))?;
        for row in &self.cells {
            let glyphs: Vec<&str> = row.iter().map(|cell| cell.map_or("", Piece::glyph)).collect();
            rows.serialize_element(&glyphs)?;
        }
        rows.end()
    }
}

#[cfg(test)]
#[path = "board_test.rs"]
mod tests;
