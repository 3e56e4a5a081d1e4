use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::{debug, error, info};
use thiserror::Error;
use uuid::Uuid;

use crate::accounts::AccountStore;
use crate::game::chess_match::{ChessMatch, MatchError, MatchSnapshot};
use crate::models::messages::ActionRequest;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("'{0}' is already playing a match")]
    AlreadyPlaying(String),
    #[error(transparent)]
    Match(#[from] MatchError),
}

/// A state change of some match that the participants still have to hear
/// about.
#[derive(Debug, Clone)]
pub struct MatchUpdate {
    pub participants: [String; 2],
    pub snapshot: MatchSnapshot,
}

/// All running matches plus the player-to-match index. Finished matches are
/// settled into the account store and removed right away; snapshot updates
/// queue up for the dispatcher to deliver.
pub struct SessionManager {
    matches: HashMap<Uuid, ChessMatch>,
    by_user: HashMap<String, Uuid>,
    updates: Vec<MatchUpdate>,
    time_per_player: Duration,
    sweep_every: Duration,
    next_sweep: Instant,
}

impl SessionManager {
    pub fn new(time_per_player: Duration, sweep_every: Duration, now: Instant) -> SessionManager {
        SessionManager {
            matches: HashMap::new(),
            by_user: HashMap::new(),
            updates: Vec::new(),
            time_per_player,
            sweep_every,
            next_sweep: now + sweep_every,
        }
    }

    /// Starts a match between two free players, deciding by coin flip who
    /// takes white.
    pub fn start_match(
        &mut self,
        first: (String, u32),
        second: (String, u32),
        now: Instant,
    ) -> Result<Uuid, SessionError> {
        for (name, _) in [&first, &second] {
            if self.by_user.contains_key(name) {
                return Err(SessionError::AlreadyPlaying(name.clone()));
            }
        }
        let (white, black) = if rand::random::<bool>() {
            (first, second)
        } else {
            (second, first)
        };
        let game = ChessMatch::new(Uuid::new_v4(), white, black, self.time_per_player, now);
        let id = game.id();
        let [white_name, black_name] = game.participant_names();
        info!(
            "Match {} started: {} (white) vs {} (black)",
            id, white_name, black_name
        );
        self.by_user.insert(white_name.clone(), id);
        self.by_user.insert(black_name.clone(), id);
        self.updates.push(MatchUpdate {
            participants: [white_name, black_name],
            snapshot: game.snapshot(),
        });
        self.matches.insert(id, game);
        Ok(id)
    }

    pub fn is_playing(&self, name: &str) -> bool {
        self.by_user.contains_key(name)
    }

    pub fn current_snapshot(&self, name: &str) -> Option<MatchSnapshot> {
        self.by_user
            .get(name)
            .and_then(|id| self.matches.get(id))
            .map(|game| game.snapshot())
    }

    pub fn match_count(&self) -> usize {
        self.matches.len()
    }

    /// Applies a player's action to their match. A player with no match is
    /// quietly ignored. Either way the match may finish as a side effect,
    /// even of a rejected action when its clock has already run out; the
    /// finished match is settled here and the update queued.
    pub fn apply(
        &mut self,
        accounts: &mut AccountStore,
        name: &str,
        action: &ActionRequest,
        now: Instant,
    ) -> Result<(), SessionError> {
        let match_id = match self.by_user.get(name) {
            Some(id) => *id,
            None => {
                debug!("'{}' sent an action but is not playing", name);
                return Ok(());
            }
        };
        let game = match self.matches.get_mut(&match_id) {
            Some(game) => game,
            None => {
                self.by_user.remove(name);
                return Ok(());
            }
        };
        let was_finished = game.is_finished();
        let result = match action {
            ActionRequest::Move { from, to } => {
                game.move_piece(name, *from, *to, now).map(|_| true)
            }
            ActionRequest::ChoosePromotion { piece } => game.choose_promotion(name, *piece, now),
            ActionRequest::Surrender => game.surrender(name, now).map(|_| true),
            ActionRequest::OfferDraw => game.offer_draw(name, now),
        };
        let finished_now = !was_finished && game.is_finished();
        let changed = matches!(result, Ok(true)) || finished_now;
        if changed {
            self.updates.push(MatchUpdate {
                participants: game.participant_names(),
                snapshot: game.snapshot(),
            });
        }
        if finished_now {
            self.settle(accounts, match_id);
        }
        result.map(|_| ()).map_err(SessionError::from)
    }

    /// Ends matches whose current player ran out of time. Rate-limits
    /// itself to the configured interval.
    pub fn sweep_time(&mut self, accounts: &mut AccountStore, now: Instant) {
        if now < self.next_sweep {
            return;
        }
        self.next_sweep = now + self.sweep_every;
        let ids: Vec<Uuid> = self.matches.keys().copied().collect();
        for id in ids {
            let Some(game) = self.matches.get_mut(&id) else {
                continue;
            };
            if game.check_time(now) {
                info!(
                    "Match {}: {} ran out of time",
                    id,
                    game.current_player_name()
                );
                self.updates.push(MatchUpdate {
                    participants: game.participant_names(),
                    snapshot: game.snapshot(),
                });
                self.settle(accounts, id);
            }
        }
    }

    /// Updates queued since the last drain, in the order they happened.
    pub fn drain_updates(&mut self) -> Vec<MatchUpdate> {
        std::mem::take(&mut self.updates)
    }

    /// Writes a finished match into the account store and frees both
    /// players. Accounts that vanished mid-match are logged and skipped.
    fn settle(&mut self, accounts: &mut AccountStore, match_id: Uuid) {
        let Some(game) = self.matches.remove(&match_id) else {
            return;
        };
        for name in game.participant_names() {
            if self.by_user.get(&name) == Some(&match_id) {
                self.by_user.remove(&name);
            }
        }
        let winner = game.winner_name().map(str::to_string);
        for player in game.players() {
            let mut record = match accounts.find(&player.name) {
                Some(record) => record.clone(),
                None => {
                    error!(
                        "Cannot settle match {} for unknown account '{}'",
                        match_id, player.name
                    );
                    continue;
                }
            };
            record.rank += player.accrued_score;
            match winner.as_deref() {
                None => record.draws += 1,
                Some(name) if name == player.name => record.wins += 1,
                Some(_) => record.losses += 1,
            }
            if let Err(err) = accounts.update(record) {
                error!(
                    "Failed to persist match results for '{}': {}",
                    player.name, err
                );
            }
        }
        debug!(
            "Match {} settled ({})",
            match_id,
            game.finish_reason().unwrap_or("abandoned")
        );
    }
}
