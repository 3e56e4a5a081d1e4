use std::collections::HashSet;

use thiserror::Error;

use crate::game::board::{Board, BoardError, Color, Piece, PieceKind, Square};

const KNIGHT_OFFSETS: [(i8, i8); 8] = [
    (1, -2),
    (2, -1),
    (1, 2),
    (2, 1),
    (-1, 2),
    (-2, 1),
    (-2, -1),
    (-1, -2),
];

const STRAIGHT_DIRECTIONS: [(i8, i8); 4] = [(0, -1), (0, 1), (-1, 0), (1, 0)];

const DIAGONAL_DIRECTIONS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

const KING_OFFSETS: [(i8, i8); 8] = [
    (0, -1),
    (0, 1),
    (-1, 0),
    (1, 0),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RulesError {
    #[error("the square does not hold one of your pieces")]
    WrongOwner,
    #[error("the move does not leave its starting square")]
    NullMove,
    #[error("the piece cannot reach that square")]
    IllegalDestination,
    #[error("the move would leave your king in check")]
    SelfCheck,
    #[error("no {0} king on the board")]
    NoKing(Color),
    #[error(transparent)]
    Board(#[from] BoardError),
}

impl RulesError {
    /// Whether this is an ordinary rejection of a proposed move, as opposed
    /// to a broken position.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            RulesError::WrongOwner
                | RulesError::NullMove
                | RulesError::IllegalDestination
                | RulesError::SelfCheck
        )
    }
}

/// Squares the piece on `from` may move to. Blocking, captures and castling
/// are taken into account; leaving the own king in check is not, that is
/// what [`validate_move`] probes. An empty square yields an empty set.
pub fn legal_destinations(board: &Board, from: Square) -> Result<HashSet<Square>, RulesError> {
    match board.get(from)? {
        Some(piece) => move_cells(board, from, piece),
        None => Ok(HashSet::new()),
    }
}

/// Fully validates a move for `color`, including the self-check probe on a
/// scratch copy of the board.
pub fn validate_move(
    board: &Board,
    color: Color,
    from: Square,
    to: Square,
) -> Result<(), RulesError> {
    let piece = match board.get(from)? {
        Some(piece) if piece.color == color => piece,
        _ => return Err(RulesError::WrongOwner),
    };
    if from == to {
        return Err(RulesError::NullMove);
    }
    if !move_cells(board, from, piece)?.contains(&to) {
        return Err(RulesError::IllegalDestination);
    }
    // The probe relocates only the king even for a castling destination; the
    // rook cannot be captured in passing, so its square does not matter here.
    let mut probe = board.clone();
    probe.set(from, None)?;
    probe.set(to, Some(piece))?;
    if is_in_check(&probe, color)? {
        return Err(RulesError::SelfCheck);
    }
    Ok(())
}

/// Whether `color`'s king is attacked. A missing king is a broken position
/// and reported as [`RulesError::NoKing`].
pub fn is_in_check(board: &Board, color: Color) -> Result<bool, RulesError> {
    let king = find_king(board, color)?;
    is_cell_under_attack(board, king, color.opponent())
}

/// Whether any piece of `by` attacks `square`.
pub fn is_cell_under_attack(board: &Board, square: Square, by: Color) -> Result<bool, RulesError> {
    for (from, piece) in board.pieces() {
        if piece.color == by && attack_cells(board, from, piece)?.contains(&square) {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn find_king(board: &Board, color: Color) -> Result<Square, RulesError> {
    board
        .pieces()
        .find(|(_, piece)| piece.color == color && piece.kind == PieceKind::King)
        .map(|(square, _)| square)
        .ok_or(RulesError::NoKing(color))
}

/// Whether `color` has at least one move that passes full validation. False
/// means checkmate or stalemate depending on whether the king is in check.
pub fn has_any_legal_move(board: &Board, color: Color) -> Result<bool, RulesError> {
    for (from, piece) in board.pieces() {
        if piece.color != color {
            continue;
        }
        for to in legal_destinations(board, from)? {
            match validate_move(board, color, from, to) {
                Ok(()) => return Ok(true),
                Err(err) if err.is_rejection() => continue,
                Err(err) => return Err(err),
            }
        }
    }
    Ok(false)
}

fn move_cells(board: &Board, from: Square, piece: Piece) -> Result<HashSet<Square>, RulesError> {
    match piece.kind {
        PieceKind::Pawn => pawn_move_cells(board, from, piece.color),
        PieceKind::Knight => Ok(step_cells(board, from, piece.color, &KNIGHT_OFFSETS)),
        PieceKind::Bishop => Ok(ray_cells(board, from, piece.color, &DIAGONAL_DIRECTIONS)),
        PieceKind::Rook => Ok(ray_cells(board, from, piece.color, &STRAIGHT_DIRECTIONS)),
        PieceKind::Queen => {
            let mut cells = ray_cells(board, from, piece.color, &STRAIGHT_DIRECTIONS);
            cells.extend(ray_cells(board, from, piece.color, &DIAGONAL_DIRECTIONS));
            Ok(cells)
        }
        PieceKind::King => king_move_cells(board, from, piece),
    }
}

/// Squares the piece threatens. Differs from [`move_cells`] for pawns, whose
/// capture diagonals count as attacked even while empty, and for the king,
/// which never threatens through castling.
fn attack_cells(board: &Board, from: Square, piece: Piece) -> Result<HashSet<Square>, RulesError> {
    match piece.kind {
        PieceKind::Pawn => Ok(pawn_attack_cells(from, piece.color)),
        PieceKind::King => Ok(step_cells(board, from, piece.color, &KING_OFFSETS)),
        _ => move_cells(board, from, piece),
    }
}

/// Single-step destinations: in-bounds squares that are empty or hold an
/// opposing piece.
fn step_cells(board: &Board, from: Square, color: Color, offsets: &[(i8, i8)]) -> HashSet<Square> {
    let mut cells = HashSet::new();
    for &(dx, dy) in offsets {
        if let Some(to) = from.offset(dx, dy) {
            match board.get(to) {
                Ok(None) => {
                    cells.insert(to);
                }
                Ok(Some(other)) if other.color != color => {
                    cells.insert(to);
                }
                _ => {}
            }
        }
    }
    cells
}

/// Sliding destinations: each ray runs until the first occupied square,
/// which is included when it holds an opposing piece.
fn ray_cells(board: &Board, from: Square, color: Color, directions: &[(i8, i8)]) -> HashSet<Square> {
    let mut cells = HashSet::new();
    for &(dx, dy) in directions {
        let mut cursor = from;
        while let Some(to) = cursor.offset(dx, dy) {
            match board.get(to) {
                Ok(None) => {
                    cells.insert(to);
                    cursor = to;
                }
                Ok(Some(other)) => {
                    if other.color != color {
                        cells.insert(to);
                    }
                    break;
                }
                Err(_) => break,
            }
        }
    }
    cells
}

fn pawn_move_cells(board: &Board, from: Square, color: Color) -> Result<HashSet<Square>, RulesError> {
    let mut cells = HashSet::new();
    let forward = color.forward();
    if let Some(step) = from.offset(0, forward) {
        if board.get(step)?.is_none() {
            cells.insert(step);
            if from.y == color.pawn_rank() {
                if let Some(jump) = from.offset(0, 2 * forward) {
                    if board.get(jump)?.is_none() {
                        cells.insert(jump);
                    }
                }
            }
        }
    }
    for dx in [-1, 1] {
        if let Some(capture) = from.offset(dx, forward) {
            if matches!(board.get(capture)?, Some(other) if other.color != color) {
                cells.insert(capture);
            }
        }
    }
    Ok(cells)
}

fn pawn_attack_cells(from: Square, color: Color) -> HashSet<Square> {
    let mut cells = HashSet::new();
    for dx in [-1, 1] {
        if let Some(diagonal) = from.offset(dx, color.forward()) {
            cells.insert(diagonal);
        }
    }
    cells
}

fn king_move_cells(board: &Board, from: Square, king: Piece) -> Result<HashSet<Square>, RulesError> {
    let mut cells = step_cells(board, from, king.color, &KING_OFFSETS);
    cells.extend(castling_destinations(board, from, king)?);
    Ok(cells)
}

/// Castling destinations for a king that has never moved. Requires an
/// unmoved own rook in the corner of the home rank, an empty lane between
/// them, and that neither the king's square nor the two squares it crosses
/// are under attack.
fn castling_destinations(
    board: &Board,
    from: Square,
    king: Piece,
) -> Result<Vec<Square>, RulesError> {
    let mut cells = Vec::new();
    if king.move_count != 0 {
        return Ok(cells);
    }
    let line = king.color.home_rank();
    let enemy = king.color.opponent();
    let size = board.size();
    for (corner_x, dir) in [(0u8, -1i8), (size - 1, 1i8)] {
        let corner = Square::new(corner_x, line);
        let rook_ok = matches!(
            board.get(corner)?,
            Some(rook)
                if rook.color == king.color
                    && rook.kind == PieceKind::Rook
                    && rook.move_count == 0
        );
        if !rook_ok {
            continue;
        }
        // Lane between king and rook, both endpoints excluded.
        let mut lane_clear = true;
        let mut x = from.x as i16 + dir as i16;
        while x > 0 && x < (size - 1) as i16 {
            if board.get(Square::new(x as u8, line))?.is_some() {
                lane_clear = false;
                break;
            }
            x += dir as i16;
        }
        if !lane_clear {
            continue;
        }
        let crossed = match (from.offset(dir, 0), from.offset(2 * dir, 0)) {
            (Some(first), Some(second)) => [from, first, second],
            _ => continue,
        };
        let mut safe = true;
        for square in crossed {
            if is_cell_under_attack(board, square, enemy)? {
                safe = false;
                break;
            }
        }
        if !safe {
            continue;
        }
        cells.push(Square::new((from.x as i16 + 2 * dir as i16) as u8, line));
    }
    Ok(cells)
}
