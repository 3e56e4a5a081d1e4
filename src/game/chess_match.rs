use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::game::board::{Board, Color, Piece, PieceKind, Square};
use crate::game::rules::{self, RulesError};

/// Fraction of the opponent's rank a win is worth.
pub const SCORE_COEFFICIENT: f64 = 0.008;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error("the match is already finished")]
    AlreadyFinished,
    #[error("wait for your turn, {0} is moving now")]
    NotYourTurn(String),
    #[error("choose a piece for your promoted pawn first")]
    PromotionPending,
    #[error("a pawn cannot become a {0}, choose a queen, rook, bishop or knight")]
    BadPromotionChoice(PieceKind),
    #[error("no pawn to promote was found")]
    PawnNotFound,
    #[error("no player named '{0}' in this match")]
    NoSuchPlayer(String),
    #[error(transparent)]
    Rules(#[from] RulesError),
}

/// One seat in a match: the account it was created from plus the per-match
/// clock and draw state. `time_left_ms` may go negative when the final move
/// overshoots the budget.
#[derive(Serialize, Debug, Clone)]
pub struct MatchPlayer {
    pub name: String,
    pub color: Color,
    pub rank: u32,
    pub time_left_ms: i64,
    pub offered_draw: bool,
    pub accrued_score: u32,
}

impl MatchPlayer {
    fn new(name: String, color: Color, rank: u32, time_per_player: Duration) -> MatchPlayer {
        MatchPlayer {
            name,
            color,
            rank,
            time_left_ms: time_per_player.as_millis() as i64,
            offered_draw: false,
            accrued_score: 0,
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastMove {
    pub from: Square,
    pub to: Square,
}

/// Client-facing view of a match, sent after every accepted action.
#[derive(Serialize, Debug, Clone)]
pub struct MatchSnapshot {
    pub id: Uuid,
    pub board: Board,
    pub players: Vec<MatchPlayer>,
    pub current_player: String,
    pub choosing_promotion: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_move: Option<LastMove>,
    pub finished: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// A running or finished match between two players. White always sits at
/// index 0. All time-dependent operations take `now` explicitly so the
/// caller decides what the clock says.
#[derive(Debug, Clone)]
pub struct ChessMatch {
    id: Uuid,
    board: Board,
    players: [MatchPlayer; 2],
    current: usize,
    move_started: Instant,
    choosing_promotion: bool,
    last_move: Option<LastMove>,
    finished: bool,
    winner: Option<usize>,
    finish_reason: Option<String>,
    finished_at: Option<DateTime<Utc>>,
}

impl ChessMatch {
    pub fn new(
        id: Uuid,
        (white_name, white_rank): (String, u32),
        (black_name, black_rank): (String, u32),
        time_per_player: Duration,
        now: Instant,
    ) -> ChessMatch {
        ChessMatch {
            id,
            board: Board::standard(),
            players: [
                MatchPlayer::new(white_name, Color::White, white_rank, time_per_player),
                MatchPlayer::new(black_name, Color::Black, black_rank, time_per_player),
            ],
            current: 0,
            move_started: now,
            choosing_promotion: false,
            last_move: None,
            finished: false,
            winner: None,
            finish_reason: None,
            finished_at: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn players(&self) -> &[MatchPlayer; 2] {
        &self.players
    }

    pub fn participant_names(&self) -> [String; 2] {
        [self.players[0].name.clone(), self.players[1].name.clone()]
    }

    pub fn current_player_name(&self) -> &str {
        &self.players[self.current].name
    }

    pub fn winner_name(&self) -> Option<&str> {
        self.winner.map(|index| self.players[index].name.as_str())
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.finish_reason.as_deref()
    }

    /// Moves the mover's piece from `from` to `to`. A pawn reaching its
    /// promotion rank keeps the turn and puts the match into the
    /// choosing-promotion state; everything else passes the turn and then
    /// checks the opponent for mate or stalemate.
    pub fn move_piece(
        &mut self,
        name: &str,
        from: Square,
        to: Square,
        now: Instant,
    ) -> Result<(), MatchError> {
        let elapsed = now.saturating_duration_since(self.move_started);
        self.ensure_active(now)?;
        let mover = self.ensure_current(name)?;
        if self.choosing_promotion {
            return Err(MatchError::PromotionPending);
        }
        let color = self.players[mover].color;
        rules::validate_move(&self.board, color, from, to)?;
        self.apply_move(from, to)?;
        self.last_move = Some(LastMove { from, to });
        let landed = self.board.get(to).map_err(RulesError::from)?;
        if matches!(landed, Some(piece) if piece.kind == PieceKind::Pawn)
            && to.y == color.promotion_rank()
        {
            self.choosing_promotion = true;
            info!("Match {}: {} must choose a promotion piece", self.id, name);
            return Ok(());
        }
        self.finish_turn(mover, elapsed, now)
    }

    /// Replaces the pawn waiting on the promotion rank. Returns false when
    /// no promotion is pending, which callers treat as a quiet no-op.
    pub fn choose_promotion(
        &mut self,
        name: &str,
        kind: PieceKind,
        now: Instant,
    ) -> Result<bool, MatchError> {
        let elapsed = now.saturating_duration_since(self.move_started);
        self.ensure_active(now)?;
        let mover = self.ensure_current(name)?;
        if !self.choosing_promotion {
            return Ok(false);
        }
        if matches!(kind, PieceKind::King | PieceKind::Pawn) {
            return Err(MatchError::BadPromotionChoice(kind));
        }
        let color = self.players[mover].color;
        let line = color.promotion_rank();
        let (square, pawn) = self
            .board
            .pieces()
            .find(|(square, piece)| {
                piece.color == color && piece.kind == PieceKind::Pawn && square.y == line
            })
            .ok_or(MatchError::PawnNotFound)?;
        let mut promoted = Piece::new(color, kind);
        promoted.move_count = pawn.move_count;
        self.board.set(square, Some(promoted)).map_err(RulesError::from)?;
        self.choosing_promotion = false;
        self.finish_turn(mover, elapsed, now)?;
        Ok(true)
    }

    /// Resigns on behalf of `name`; the opponent wins. Either player may
    /// surrender, also outside their turn.
    pub fn surrender(&mut self, name: &str, now: Instant) -> Result<(), MatchError> {
        self.check_time(now);
        if self.finished {
            return Err(MatchError::AlreadyFinished);
        }
        let player = self.player_index(name)?;
        self.end(Some(1 - player), "opponent surrendered");
        Ok(())
    }

    /// Records a standing draw offer. The match ends drawn once both offers
    /// are up. Returns false when the player had already offered.
    pub fn offer_draw(&mut self, name: &str, now: Instant) -> Result<bool, MatchError> {
        self.check_time(now);
        if self.finished {
            return Err(MatchError::AlreadyFinished);
        }
        let player = self.player_index(name)?;
        if self.players[player].offered_draw {
            return Ok(false);
        }
        self.players[player].offered_draw = true;
        if self.players.iter().all(|player| player.offered_draw) {
            self.end(None, "players agreed to a draw");
        }
        Ok(true)
    }

    /// Ends the match in the opponent's favor when the current player's
    /// clock has run out. Returns true when this call finished the match.
    pub fn check_time(&mut self, now: Instant) -> bool {
        if self.finished {
            return false;
        }
        let elapsed = now.saturating_duration_since(self.move_started).as_millis() as i64;
        if self.players[self.current].time_left_ms - elapsed < 0 {
            self.end(Some(1 - self.current), "time expired");
            return true;
        }
        false
    }

    pub fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot {
            id: self.id,
            board: self.board.clone(),
            players: self.players.to_vec(),
            current_player: self.players[self.current].name.clone(),
            choosing_promotion: self.choosing_promotion,
            last_move: self.last_move,
            finished: self.finished,
            winner: self.winner_name().map(str::to_string),
            finish_reason: self.finish_reason.clone(),
            finished_at: self.finished_at,
        }
    }

    fn ensure_active(&mut self, now: Instant) -> Result<(), MatchError> {
        self.check_time(now);
        if self.finished {
            return Err(MatchError::AlreadyFinished);
        }
        Ok(())
    }

    fn ensure_current(&self, name: &str) -> Result<usize, MatchError> {
        let index = self.player_index(name)?;
        if index != self.current {
            return Err(MatchError::NotYourTurn(
                self.players[self.current].name.clone(),
            ));
        }
        Ok(index)
    }

    fn player_index(&self, name: &str) -> Result<usize, MatchError> {
        self.players
            .iter()
            .position(|player| player.name == name)
            .ok_or_else(|| MatchError::NoSuchPlayer(name.to_string()))
    }

    fn apply_move(&mut self, from: Square, to: Square) -> Result<(), MatchError> {
        let mut piece = self
            .board
            .get(from)
            .map_err(RulesError::from)?
            .ok_or(RulesError::WrongOwner)?;
        // A king stepping two files is castling; the matching rook jumps to
        // the square the king crossed.
        if piece.kind == PieceKind::King && (to.x as i16 - from.x as i16).abs() == 2 {
            let dir: i8 = if to.x > from.x { 1 } else { -1 };
            let corner_x = if dir == 1 { self.board.size() - 1 } else { 0 };
            let rook_from = Square::new(corner_x, from.y);
            if let Some(mut rook) = self.board.get(rook_from).map_err(RulesError::from)? {
                rook.move_count += 1;
                self.board.set(rook_from, None).map_err(RulesError::from)?;
                if let Some(rook_to) = from.offset(dir, 0) {
                    self.board.set(rook_to, Some(rook)).map_err(RulesError::from)?;
                }
            }
        }
        piece.move_count += 1;
        self.board.set(from, None).map_err(RulesError::from)?;
        self.board.set(to, Some(piece)).map_err(RulesError::from)?;
        Ok(())
    }

    /// Turn handover: pass the move, examine the new side for mate or
    /// stalemate, then charge the mover for the time spent. The order
    /// matters, a mating move must not first lose on time.
    fn finish_turn(
        &mut self,
        mover: usize,
        elapsed: Duration,
        now: Instant,
    ) -> Result<(), MatchError> {
        self.advance_turn(now);
        self.evaluate_position()?;
        self.players[mover].time_left_ms -= elapsed.as_millis() as i64;
        Ok(())
    }

    fn advance_turn(&mut self, now: Instant) {
        self.current = 1 - self.current;
        self.players[self.current].offered_draw = false;
        self.move_started = now;
    }

    fn evaluate_position(&mut self) -> Result<(), MatchError> {
        let color = self.players[self.current].color;
        if !rules::has_any_legal_move(&self.board, color)? {
            if rules::is_in_check(&self.board, color)? {
                self.end(Some(1 - self.current), "checkmate");
            } else {
                self.end(None, "stalemate");
            }
        }
        Ok(())
    }

    fn end(&mut self, winner: Option<usize>, reason: &str) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.finished_at = Some(Utc::now());
        self.finish_reason = Some(reason.to_string());
        match winner {
            Some(index) => {
                self.winner = Some(index);
                self.players[index].accrued_score =
                    score_share(self.players[1 - index].rank, 1.0);
                info!(
                    "Match {} finished: {} won ({})",
                    self.id, self.players[index].name, reason
                );
            }
            None => {
                let for_first = score_share(self.players[1].rank, 0.5);
                let for_second = score_share(self.players[0].rank, 0.5);
                self.players[0].accrued_score = for_first;
                self.players[1].accrued_score = for_second;
                info!("Match {} finished: draw ({})", self.id, reason);
            }
        }
    }
}

/// Score granted off an opponent's rank; a win takes the full share, a draw
/// half. Never less than one point.
pub fn score_share(opponent_rank: u32, share: f64) -> u32 {
    let score = (opponent_rank as f64 * SCORE_COEFFICIENT * share) as u32;
    score.max(1)
}
