use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Board side length. Only the classic board is supported.
pub const BOARD_SIZE: u8 = 8;

/// Side a piece belongs to. White pieces start on the high ranks and move
/// toward `y = 0`, black pieces start on the low ranks and move toward
/// `y = 7`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opponent(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    /// Rank the king and rooks start on.
    pub fn home_rank(self) -> u8 {
        match self {
            Color::White => 7,
            Color::Black => 0,
        }
    }

    /// Rank the pawns start on.
    pub fn pawn_rank(self) -> u8 {
        match self {
            Color::White => 6,
            Color::Black => 1,
        }
    }

    /// Rank a pawn promotes on.
    pub fn promotion_rank(self) -> u8 {
        match self {
            Color::White => 0,
            Color::Black => 7,
        }
    }

    /// Direction pawns advance along the y axis.
    pub fn forward(self) -> i8 {
        match self {
            Color::White => -1,
            Color::Black => 1,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::White => write!(f, "white"),
            Color::Black => write!(f, "black"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl fmt::Display for PieceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PieceKind::Pawn => "pawn",
            PieceKind::Knight => "knight",
            PieceKind::Bishop => "bishop",
            PieceKind::Rook => "rook",
            PieceKind::Queen => "queen",
            PieceKind::King => "king",
        };
        write!(f, "{}", name)
    }
}

/// A piece on the board. `move_count` tracks how many times it has moved,
/// which castling eligibility depends on.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece {
    pub color: Color,
    pub kind: PieceKind,
    pub move_count: u32,
}

impl Piece {
    pub fn new(color: Color, kind: PieceKind) -> Piece {
        Piece {
            color,
            kind,
            move_count: 0,
        }
    }
}

/// A board coordinate. `x` is the file, `y` the rank; both run 0..=7.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Square {
    pub x: u8,
    pub y: u8,
}

impl Square {
    pub fn new(x: u8, y: u8) -> Square {
        Square { x, y }
    }

    /// Applies a file/rank offset, returning `None` when the result leaves
    /// the board.
    pub fn offset(self, dx: i8, dy: i8) -> Option<Square> {
        let x = self.x as i16 + dx as i16;
        let y = self.y as i16 + dy as i16;
        if (0..BOARD_SIZE as i16).contains(&x) && (0..BOARD_SIZE as i16).contains(&y) {
            Some(Square::new(x as u8, y as u8))
        } else {
            None
        }
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    #[error("unsupported board size {0}, only {BOARD_SIZE} is allowed")]
    InvalidSize(u8),
    #[error("square {0} is outside the board")]
    OutOfBounds(Square),
}

/// The playing field: a fixed grid of optional pieces stored row-major.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Board {
    size: u8,
    cells: Vec<Option<Piece>>,
}

impl Board {
    /// Creates an empty board. Any size other than the classic 8 is
    /// rejected.
    pub fn new(size: u8) -> Result<Board, BoardError> {
        if size != BOARD_SIZE {
            return Err(BoardError::InvalidSize(size));
        }
        Ok(Board {
            size,
            cells: vec![None; size as usize * size as usize],
        })
    }

    /// Creates a board with the standard starting position.
    pub fn standard() -> Board {
        let mut board = Board::new(BOARD_SIZE).expect("the classic size is valid");
        for color in [Color::White, Color::Black] {
            let home = color.home_rank();
            for (x, kind) in [
                (0, PieceKind::Rook),
                (1, PieceKind::Knight),
                (2, PieceKind::Bishop),
                (3, PieceKind::Queen),
                (4, PieceKind::King),
                (5, PieceKind::Bishop),
                (6, PieceKind::Knight),
                (7, PieceKind::Rook),
            ] {
                board.cells[Board::index(x, home)] = Some(Piece::new(color, kind));
            }
            for x in 0..BOARD_SIZE {
                board.cells[Board::index(x, color.pawn_rank())] =
                    Some(Piece::new(color, PieceKind::Pawn));
            }
        }
        board
    }

    fn index(x: u8, y: u8) -> usize {
        y as usize * BOARD_SIZE as usize + x as usize
    }

    pub fn size(&self) -> u8 {
        self.size
    }

    pub fn contains(&self, square: Square) -> bool {
        square.x < self.size && square.y < self.size
    }

    pub fn get(&self, square: Square) -> Result<Option<Piece>, BoardError> {
        if !self.contains(square) {
            return Err(BoardError::OutOfBounds(square));
        }
        Ok(self.cells[Board::index(square.x, square.y)])
    }

    pub fn set(&mut self, square: Square, piece: Option<Piece>) -> Result<(), BoardError> {
        if !self.contains(square) {
            return Err(BoardError::OutOfBounds(square));
        }
        self.cells[Board::index(square.x, square.y)] = piece;
        Ok(())
    }

    /// Iterates over every occupied square together with its piece.
    pub fn pieces(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        self.cells.iter().enumerate().filter_map(|(i, cell)| {
            cell.map(|piece| {
                let x = (i % BOARD_SIZE as usize) as u8;
                let y = (i / BOARD_SIZE as usize) as u8;
                (Square::new(x, y), piece)
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsupported_sizes() {
        assert_eq!(Board::new(10).unwrap_err(), BoardError::InvalidSize(10));
        assert_eq!(Board::new(0).unwrap_err(), BoardError::InvalidSize(0));
        assert!(Board::new(8).is_ok());
    }

    #[test]
    fn get_and_set_round_trip() {
        let mut board = Board::new(8).unwrap();
        let square = Square::new(3, 5);
        assert_eq!(board.get(square).unwrap(), None);
        let piece = Piece::new(Color::White, PieceKind::Queen);
        board.set(square, Some(piece)).unwrap();
        assert_eq!(board.get(square).unwrap(), Some(piece));
        board.set(square, None).unwrap();
        assert_eq!(board.get(square).unwrap(), None);
    }

    #[test]
    fn out_of_bounds_access_is_an_error() {
        let mut board = Board::new(8).unwrap();
        let outside = Square::new(8, 0);
        assert_eq!(
            board.get(outside).unwrap_err(),
            BoardError::OutOfBounds(outside)
        );
        assert_eq!(
            board
                .set(Square::new(0, 9), Some(Piece::new(Color::Black, PieceKind::Pawn)))
                .unwrap_err(),
            BoardError::OutOfBounds(Square::new(0, 9))
        );
    }

    #[test]
    fn standard_position_layout() {
        let board = Board::standard();
        let white_king = board.get(Square::new(4, 7)).unwrap().unwrap();
        assert_eq!(white_king.color, Color::White);
        assert_eq!(white_king.kind, PieceKind::King);
        let black_queen = board.get(Square::new(3, 0)).unwrap().unwrap();
        assert_eq!(black_queen.color, Color::Black);
        assert_eq!(black_queen.kind, PieceKind::Queen);
        for x in 0..8 {
            assert_eq!(
                board.get(Square::new(x, 6)).unwrap().map(|p| (p.color, p.kind)),
                Some((Color::White, PieceKind::Pawn))
            );
            assert_eq!(
                board.get(Square::new(x, 1)).unwrap().map(|p| (p.color, p.kind)),
                Some((Color::Black, PieceKind::Pawn))
            );
        }
        for y in 2..6 {
            for x in 0..8 {
                assert_eq!(board.get(Square::new(x, y)).unwrap(), None);
            }
        }
        assert_eq!(board.pieces().count(), 32);
    }

    #[test]
    fn square_offset_stays_on_the_board() {
        assert_eq!(Square::new(0, 0).offset(-1, 0), None);
        assert_eq!(Square::new(7, 7).offset(0, 1), None);
        assert_eq!(Square::new(4, 4).offset(1, -2), Some(Square::new(5, 2)));
    }
}
