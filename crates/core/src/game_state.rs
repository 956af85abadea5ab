//! Game state module - the session lifecycle
//!
//! A [`GameSession`] owns one board, one move history, the turn coordinator
//! and the RNG. It is a plain value: there is no global game, and any number of
//! sessions (server-hosted rooms, tests) can coexist.
//!
//! # Phases
//!
//! ```text
//! Setup --start--> Playing <--pause/resume--> Paused
//!                  Playing <--(no free pair / pair again)--> Stalemate
//!                  Playing --last pair--> Won --end--> Ended
//!         any phase except Ended --abandon--> Ended
//! ```
//!
//! `Stalemate` is re-evaluated after every mutation and still accepts play,
//! shuffle and abandon. `Won` accepts only `end`. `Ended` accepts nothing.
//!
//! # Time
//!
//! The session has no wall clock. Callers advance it with [`GameSession::tick`]
//! and moves are stamped with the session clock, which keeps replays and
//! snapshots deterministic.

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::content::ContentProvider;
use crate::error::SessionError;
use crate::history::{Move, MoveHistory};
use crate::layout::{place, LayoutPattern};
use crate::matching::{check_selectable, try_match, unpaired_class, MatchOutcome, MatchRules};
use crate::rng::SimpleRng;
use crate::scoring::{MatchContext, ScorePolicy, ScoringRule};
use crate::shuffle::{shuffle, ShuffleReport, ShuffleStrategy};
use crate::snapshot::{SessionSnapshot, SNAPSHOT_VERSION};
use crate::tileset::{generate_deck, TileProfile};
use crate::turn::{Player, TurnCoordinator};
use crate::types::{
    Phase, PlayerId, SessionMode, TileId, DEFAULT_DEAL_ATTEMPTS, DEFAULT_SHUFFLE_ATTEMPTS,
    DEFAULT_UNDO_DEPTH, MAX_PLAYERS,
};

/// Everything needed to set up a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub profile: TileProfile,
    pub layout: LayoutPattern,
    pub seed: u32,
    pub mode: SessionMode,
    pub rules: MatchRules,
    pub scoring: ScoringRule,
    /// How the initial arrangement is dealt
    pub deal: ShuffleStrategy,
    /// How `shuffle()` rearranges the remaining tiles
    pub shuffle: ShuffleStrategy,
    pub shuffle_attempts: u32,
    pub deal_attempts: u32,
    pub undo_depth: usize,
}

impl SessionConfig {
    pub fn solitaire(seed: u32) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    pub fn multiplayer(players: u8, seed: u32) -> Self {
        Self {
            seed,
            mode: SessionMode::Multiplayer { players },
            ..Self::default()
        }
    }

    pub fn with_layout(mut self, layout: LayoutPattern) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_profile(mut self, profile: TileProfile) -> Self {
        self.profile = profile;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            profile: TileProfile::standard(),
            layout: LayoutPattern::Turtle,
            seed: 1,
            mode: SessionMode::Solitaire,
            rules: MatchRules::default(),
            scoring: ScoringRule::default(),
            deal: ShuffleStrategy::Solvable,
            shuffle: ShuffleStrategy::Solvable,
            shuffle_attempts: DEFAULT_SHUFFLE_ATTEMPTS,
            deal_attempts: DEFAULT_DEAL_ATTEMPTS,
            undo_depth: DEFAULT_UNDO_DEPTH,
        }
    }
}

/// Result of a solitaire `select_tile`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// First tile of a pair is now pending
    Pending(TileId),
    /// The pending tile was selected again and toggled off
    Cancelled(TileId),
    /// The pair was removed
    Matched(Move),
    /// Both tiles free but incompatible; selection cleared
    NoMatch { first: TileId, second: TileId },
}

#[derive(Debug)]
pub struct GameSession {
    config: SessionConfig,
    phase: Phase,
    board: Board,
    history: MoveHistory,
    turns: TurnCoordinator,
    rng: SimpleRng,
    policy: Box<dyn ScorePolicy>,
    score: u32,
    elapsed_ms: u64,
    last_match_ms: Option<u64>,
    streak: u32,
    selection: Option<TileId>,
    shuffles: u32,
}

impl GameSession {
    /// Build the deck and layout; the session waits in `Setup` until [`start`](Self::start)
    pub fn new(config: SessionConfig, content: &dyn ContentProvider) -> Result<Self, SessionError> {
        let deck = generate_deck(&config.profile, content)?;
        if let Some((class, n)) = unpaired_class(&config.rules, deck.iter().map(|t| t.face())) {
            return Err(SessionError::InvalidProfile(format!(
                "profile `{}` leaves {} tiles of class {:?} under the configured rules",
                config.profile.name, n, class
            )));
        }
        let positions = place(config.layout, deck.len())?;
        let count = deck.len();
        let board = Board::new(deck, positions).map_err(|reason| {
            tracing::error!(%reason, "layout produced an unusable board");
            SessionError::LayoutMismatch {
                pattern: config.layout.as_str().to_string(),
                requested: count,
                available: config.layout.capacity(),
            }
        })?;

        let turns = match config.mode {
            SessionMode::Solitaire => TurnCoordinator::default(),
            SessionMode::Multiplayer { players } => {
                let seats = players.clamp(1, MAX_PLAYERS);
                if seats != players {
                    tracing::warn!(requested = players, seats, "player count clamped");
                }
                TurnCoordinator::seated(seats)
            }
        };

        let mut config = config;
        if let SessionMode::Multiplayer { players } = &mut config.mode {
            *players = turns.players().len() as u8;
        }

        tracing::info!(
            profile = %config.profile.name,
            layout = config.layout.as_str(),
            seed = config.seed,
            tiles = count,
            "session created"
        );

        Ok(Self {
            phase: Phase::Setup,
            board,
            history: MoveHistory::new(config.undo_depth),
            turns,
            rng: SimpleRng::new(config.seed),
            policy: config.scoring.build(),
            score: 0,
            elapsed_ms: 0,
            last_match_ms: None,
            streak: 0,
            selection: None,
            shuffles: 0,
            config,
        })
    }

    /// Replace the award policy (not persisted in snapshots)
    pub fn set_score_policy(&mut self, policy: Box<dyn ScorePolicy>) {
        self.policy = policy;
    }

    // ---- accessors ----

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn mode(&self) -> SessionMode {
        self.config.mode
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn history(&self) -> &MoveHistory {
        &self.history
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    pub fn selection(&self) -> Option<TileId> {
        self.selection
    }

    pub fn shuffles(&self) -> u32 {
        self.shuffles
    }

    pub fn players(&self) -> &[Player] {
        self.turns.players()
    }

    pub fn active_player(&self) -> Option<PlayerId> {
        self.turns.active_player()
    }

    /// Sequence number the next accepted move will carry
    pub fn next_sequence(&self) -> u64 {
        self.turns.next_sequence()
    }

    pub fn free_tiles(&self) -> Vec<TileId> {
        self.board.free_tiles()
    }

    /// A currently matchable pair, if any
    pub fn hint(&self) -> Option<(TileId, TileId)> {
        self.board.hint(&self.config.rules)
    }

    pub fn is_stalemate(&self) -> bool {
        self.phase == Phase::Stalemate
    }

    pub fn set_display_name(&mut self, player: PlayerId, name: impl Into<String>) -> bool {
        match self.turns.player_mut(player) {
            Some(p) => {
                p.display_name = name.into();
                true
            }
            None => false,
        }
    }

    // ---- lifecycle ----

    /// Deal the board and enter `Playing`
    ///
    /// Re-deals up to `deal_attempts` times until a free pair exists. Fails with
    /// `ShuffleFailed` when every deal is dead.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.phase != Phase::Setup {
            return Err(self.phase_error("start"));
        }

        let mut total = 0;
        for deal in 1..=self.config.deal_attempts.max(1) {
            let dealt = shuffle(
                &mut self.board,
                &self.config.rules,
                &mut self.rng,
                self.config.deal,
                self.config.shuffle_attempts,
            );
            match dealt {
                Ok(report) if self.board.has_free_pair(&self.config.rules) => {
                    total += report.attempts;
                    self.phase = Phase::Playing;
                    tracing::info!(deal, attempts = total, "session started");
                    return Ok(());
                }
                Ok(report) => total += report.attempts,
                Err(SessionError::ShuffleFailed { attempts }) => total += attempts,
                Err(e) => return Err(e),
            }
            tracing::debug!(deal, "dead deal, dealing again");
        }

        tracing::warn!(attempts = total, "no playable deal found");
        Err(SessionError::ShuffleFailed { attempts: total })
    }

    pub fn pause(&mut self) -> Result<(), SessionError> {
        self.ensure_playable("pause")?;
        self.phase = Phase::Paused;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), SessionError> {
        if self.phase != Phase::Paused {
            return Err(self.phase_error("resume"));
        }
        self.phase = Phase::Playing;
        self.refresh_phase();
        Ok(())
    }

    /// Advance the session clock; ignored unless play is running
    pub fn tick(&mut self, elapsed_ms: u64) {
        if self.phase.accepts_play() {
            self.elapsed_ms = self.elapsed_ms.saturating_add(elapsed_ms);
        }
    }

    /// Give up; allowed from any phase but `Ended`
    pub fn abandon(&mut self) -> Result<(), SessionError> {
        if self.phase == Phase::Ended {
            return Err(SessionError::SessionEnded);
        }
        tracing::info!(phase = self.phase.as_str(), score = self.score, "session abandoned");
        self.phase = Phase::Ended;
        self.selection = None;
        Ok(())
    }

    /// Close a won session
    pub fn end(&mut self) -> Result<(), SessionError> {
        if self.phase != Phase::Won {
            return Err(self.phase_error("end"));
        }
        self.phase = Phase::Ended;
        Ok(())
    }

    // ---- play ----

    /// Solitaire selection: the first tile becomes pending, the second
    /// attempts the match
    pub fn select_tile(&mut self, id: TileId) -> Result<Selection, SessionError> {
        self.ensure_solitaire("select_tile")?;
        self.ensure_playable("select_tile")?;

        match self.selection {
            Some(pending) if pending == id => {
                self.selection = None;
                Ok(Selection::Cancelled(id))
            }
            None => {
                check_selectable(&self.board, id)?;
                self.selection = Some(id);
                Ok(Selection::Pending(id))
            }
            Some(pending) => {
                let outcome = self.attempt(pending, id, None)?;
                self.selection = None;
                Ok(match outcome {
                    MatchOutcome::Matched(mv) => Selection::Matched(mv),
                    MatchOutcome::NoMatch => Selection::NoMatch {
                        first: pending,
                        second: id,
                    },
                })
            }
        }
    }

    /// Drop the pending selection without touching the board
    pub fn clear_selection(&mut self) -> Option<TileId> {
        self.selection.take()
    }

    /// Authoritative multiplayer submission
    ///
    /// Ownership and sequence are checked before anything else; a rejected
    /// submission never touches the board. Accepted submissions, matched or
    /// not, pass the turn and consume the sequence number.
    pub fn submit_move(
        &mut self,
        player: PlayerId,
        a: TileId,
        b: TileId,
        client_seq: u64,
    ) -> Result<MatchOutcome, SessionError> {
        if !self.config.mode.is_multiplayer() {
            return Err(SessionError::WrongMode("submit_move"));
        }
        self.ensure_playable("submit_move")?;
        self.turns.check(player, client_seq)?;

        let outcome = self.attempt(a, b, Some(player))?;
        if let MatchOutcome::Matched(mv) = &outcome {
            self.turns.credit(player, mv.score_delta);
        }
        Ok(outcome)
    }

    /// Shared match path; advances the turn on any accepted attempt
    fn attempt(
        &mut self,
        a: TileId,
        b: TileId,
        player: Option<PlayerId>,
    ) -> Result<MatchOutcome, SessionError> {
        let ctx = MatchContext {
            sequence: self.turns.next_sequence(),
            timestamp_ms: self.elapsed_ms,
            player,
            since_last_match_ms: self.last_match_ms.map(|t| self.elapsed_ms.saturating_sub(t)),
            streak: self.streak,
        };

        let outcome = try_match(
            &mut self.board,
            &mut self.history,
            &self.config.rules,
            self.policy.as_ref(),
            &ctx,
            a,
            b,
        )?;
        self.turns.advance();

        match &outcome {
            MatchOutcome::Matched(mv) => {
                self.score = self.score.saturating_add(mv.score_delta);
                self.streak += 1;
                self.last_match_ms = Some(self.elapsed_ms);
                self.refresh_phase();
            }
            MatchOutcome::NoMatch => self.streak = 0,
        }
        Ok(outcome)
    }

    /// Revert the newest match (solitaire only); `None` when history is empty
    pub fn undo(&mut self) -> Result<Option<Move>, SessionError> {
        self.ensure_solitaire("undo")?;
        self.ensure_playable("undo")?;
        self.selection = None;

        let undone = self.history.undo(&mut self.board);
        if let Some(mv) = &undone {
            self.score = self.score.saturating_sub(mv.score_delta);
            self.streak = 0;
            self.last_match_ms = None;
            self.refresh_phase();
        }
        Ok(undone)
    }

    /// Re-apply the most recently undone match (solitaire only)
    pub fn redo(&mut self) -> Result<Option<Move>, SessionError> {
        self.ensure_solitaire("redo")?;
        self.ensure_playable("redo")?;
        self.selection = None;

        let redone = self.history.redo(&mut self.board);
        if let Some(mv) = &redone {
            self.score = self.score.saturating_add(mv.score_delta);
            self.refresh_phase();
        }
        Ok(redone)
    }

    /// Rearrange the contents of the remaining tiles
    ///
    /// The pending selection is cleared first. On failure the board is left
    /// exactly as it was and the session stays playable.
    pub fn shuffle(&mut self) -> Result<ShuffleReport, SessionError> {
        self.ensure_playable("shuffle")?;
        self.selection = None;

        let report = shuffle(
            &mut self.board,
            &self.config.rules,
            &mut self.rng,
            self.config.shuffle,
            self.config.shuffle_attempts,
        )?;
        // Redo entries may name tiles whose contents just changed.
        self.history.clear_redo();
        self.shuffles += 1;
        self.refresh_phase();
        Ok(report)
    }

    // ---- snapshot ----

    pub fn snapshot_into(&self, out: &mut SessionSnapshot) {
        out.version = SNAPSHOT_VERSION;
        out.config = self.config.clone();
        out.phase = self.phase;
        out.rng = self.rng.clone();
        out.tiles.clear();
        out.tiles.extend_from_slice(self.board.tiles());
        out.positions.clear();
        out.positions.extend_from_slice(self.board.positions());
        out.matched = self.board.matched_ids();
        out.history = self.history.clone();
        out.turns = self.turns.clone();
        out.score = self.score;
        out.elapsed_ms = self.elapsed_ms;
        out.last_match_ms = self.last_match_ms;
        out.streak = self.streak;
        out.selection = self.selection;
        out.shuffles = self.shuffles;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let mut s = SessionSnapshot::default();
        self.snapshot_into(&mut s);
        s
    }

    /// Resume a session from a snapshot, validating it first
    pub fn restore(snapshot: SessionSnapshot) -> Result<Self, SessionError> {
        let board = snapshot.build_board()?;
        tracing::info!(
            tiles = board.total(),
            matched = board.matched_count(),
            phase = snapshot.phase.as_str(),
            "session restored"
        );

        Ok(Self {
            policy: snapshot.config.scoring.build(),
            config: snapshot.config,
            phase: snapshot.phase,
            board,
            history: snapshot.history,
            turns: snapshot.turns,
            rng: snapshot.rng,
            score: snapshot.score,
            elapsed_ms: snapshot.elapsed_ms,
            last_match_ms: snapshot.last_match_ms,
            streak: snapshot.streak,
            selection: snapshot.selection,
            shuffles: snapshot.shuffles,
        })
    }

    // ---- helpers ----

    /// Playing/Stalemate/Won from the board; Paused, Setup and Ended are sticky
    fn refresh_phase(&mut self) {
        if !self.phase.accepts_play() {
            return;
        }
        let next = if self.board.is_cleared() {
            Phase::Won
        } else if self.board.has_free_pair(&self.config.rules) {
            Phase::Playing
        } else {
            Phase::Stalemate
        };
        if next != self.phase {
            tracing::info!(from = self.phase.as_str(), to = next.as_str(), "phase change");
            self.phase = next;
        }
    }

    fn ensure_playable(&self, operation: &'static str) -> Result<(), SessionError> {
        if self.phase.accepts_play() {
            Ok(())
        } else {
            Err(self.phase_error(operation))
        }
    }

    fn ensure_solitaire(&self, operation: &'static str) -> Result<(), SessionError> {
        if self.config.mode.is_multiplayer() {
            Err(SessionError::WrongMode(operation))
        } else {
            Ok(())
        }
    }

    fn phase_error(&self, operation: &'static str) -> SessionError {
        match self.phase {
            Phase::Ended => SessionError::SessionEnded,
            phase => SessionError::InvalidPhase {
                operation,
                phase: phase.as_str(),
            },
        }
    }
}
