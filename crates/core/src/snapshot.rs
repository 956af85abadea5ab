//! Snapshot module - the serializable session state
//!
//! A snapshot holds everything needed to resume a session exactly: the deck
//! with its current contents, the position bindings, the matched set, both
//! history stacks, score, clock, turn state and RNG state. Restoring a snapshot
//! and snapshotting again yields an identical value.
//!
//! Restore never trusts its input. [`SessionSnapshot::build_board`] checks the
//! structural invariants and reports the first violation as
//! `CorruptedSnapshot`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::error::SessionError;
use crate::game_state::SessionConfig;
use crate::history::{Move, MoveHistory};
use crate::matching::unpaired_class;
use crate::rng::SimpleRng;
use crate::tileset::Tile;
use crate::turn::TurnCoordinator;
use crate::types::{Phase, Position, TileId};

/// Format version written into every snapshot
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub version: u32,
    pub config: SessionConfig,
    pub phase: Phase,
    pub rng: SimpleRng,
    pub tiles: Vec<Tile>,
    pub positions: Vec<Position>,
    pub matched: Vec<TileId>,
    pub history: MoveHistory,
    pub turns: TurnCoordinator,
    pub score: u32,
    pub elapsed_ms: u64,
    pub last_match_ms: Option<u64>,
    pub streak: u32,
    pub selection: Option<TileId>,
    pub shuffles: u32,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            config: SessionConfig::default(),
            phase: Phase::Setup,
            rng: SimpleRng::default(),
            tiles: Vec::new(),
            positions: Vec::new(),
            matched: Vec::new(),
            history: MoveHistory::default(),
            turns: TurnCoordinator::default(),
            score: 0,
            elapsed_ms: 0,
            last_match_ms: None,
            streak: 0,
            selection: None,
            shuffles: 0,
        }
    }
}

fn corrupt(reason: impl Into<String>) -> SessionError {
    let reason = reason.into();
    tracing::warn!(%reason, "rejected snapshot");
    SessionError::CorruptedSnapshot(reason)
}

impl SessionSnapshot {
    /// Unmatched tiles recorded in the snapshot
    pub fn remaining(&self) -> usize {
        self.tiles.len().saturating_sub(self.matched.len())
    }

    /// Validate every structural invariant and rebuild the board
    pub fn build_board(&self) -> Result<Board, SessionError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(corrupt(format!("unsupported version {}", self.version)));
        }
        if self.tiles.is_empty() || self.tiles.len() % 2 != 0 {
            return Err(corrupt(format!("tile count {} is not even", self.tiles.len())));
        }
        if let Some(tile) = self.tiles.iter().find(|t| !t.face().is_valid()) {
            return Err(corrupt(format!("tile {} has invalid face {:?}", tile.id, tile.face())));
        }

        let mut board = Board::new(self.tiles.clone(), self.positions.clone()).map_err(corrupt)?;

        let mut seen = HashSet::with_capacity(self.matched.len());
        for &id in &self.matched {
            if board.tile(id).is_none() {
                return Err(corrupt(format!("matched set names unknown tile {}", id)));
            }
            if !seen.insert(id) {
                return Err(corrupt(format!("tile {} matched twice", id)));
            }
            board.set_matched(id);
        }
        if board.remaining() % 2 != 0 {
            return Err(corrupt(format!("odd unmatched count {}", board.remaining())));
        }

        self.check_classes(&board)?;
        self.check_history(&board)?;
        self.check_turns()?;
        self.check_selection(&board)?;
        self.check_phase(&board)?;

        Ok(board)
    }

    /// Every unmatched class must still be clearable in pairs
    fn check_classes(&self, board: &Board) -> Result<(), SessionError> {
        let faces = board
            .unmatched_ids()
            .into_iter()
            .filter_map(|id| board.tile(id).map(|t| t.face()));
        match unpaired_class(&self.config.rules, faces) {
            Some((class, n)) => Err(corrupt(format!("{} unmatched tiles of class {:?}", n, class))),
            None => Ok(()),
        }
    }

    fn check_move(&self, board: &Board, mv: &Move, matched: bool) -> Result<(), SessionError> {
        if mv.tile_a == mv.tile_b {
            return Err(corrupt(format!("move {} pairs a tile with itself", mv.sequence)));
        }
        let (a, b) = match (board.tile(mv.tile_a), board.tile(mv.tile_b)) {
            (Some(a), Some(b)) => (a, b),
            _ => return Err(corrupt(format!("move {} names an unknown tile", mv.sequence))),
        };
        if board.is_matched(a.id) != matched || board.is_matched(b.id) != matched {
            return Err(corrupt(format!(
                "move {} disagrees with the matched set",
                mv.sequence
            )));
        }
        if !self.config.rules.compatible(a.face(), b.face()) {
            return Err(corrupt(format!("move {} pairs incompatible tiles", mv.sequence)));
        }
        if mv.sequence >= self.turns.next_sequence() {
            return Err(corrupt(format!(
                "move {} is ahead of the sequence counter {}",
                mv.sequence,
                self.turns.next_sequence()
            )));
        }
        Ok(())
    }

    fn check_history(&self, board: &Board) -> Result<(), SessionError> {
        let history = &self.history;
        if history.max_depth() == 0 {
            return Err(corrupt("undo depth is zero"));
        }
        if history.undo_len() > history.max_depth() {
            return Err(corrupt("undo stack exceeds its depth"));
        }

        let mut used = HashSet::new();
        for mv in history.undo_moves() {
            self.check_move(board, mv, true)?;
            if !used.insert(mv.tile_a) || !used.insert(mv.tile_b) {
                return Err(corrupt(format!("move {} reuses a tile", mv.sequence)));
            }
        }
        for mv in history.redo_moves() {
            self.check_move(board, mv, false)?;
            if !used.insert(mv.tile_a) || !used.insert(mv.tile_b) {
                return Err(corrupt(format!("redo move {} reuses a tile", mv.sequence)));
            }
        }

        let accounted = 2 * (history.undo_len() as u64 + history.dropped());
        if accounted != board.matched_count() as u64 {
            return Err(corrupt(format!(
                "history accounts for {} matched tiles, board has {}",
                accounted,
                board.matched_count()
            )));
        }

        let recorded: u64 = history.undo_moves().map(|m| m.score_delta as u64).sum();
        if recorded > self.score as u64 {
            return Err(corrupt(format!(
                "score {} is below the recorded awards {}",
                self.score, recorded
            )));
        }
        Ok(())
    }

    fn check_turns(&self) -> Result<(), SessionError> {
        self.turns.validate(self.config.mode.seats()).map_err(corrupt)?;
        if let Some(last) = self.last_match_ms {
            if last > self.elapsed_ms {
                return Err(corrupt("last match is later than the session clock"));
            }
        }
        Ok(())
    }

    fn check_selection(&self, board: &Board) -> Result<(), SessionError> {
        let Some(id) = self.selection else {
            return Ok(());
        };
        if self.config.mode.is_multiplayer() {
            return Err(corrupt("pending selection in a multiplayer session"));
        }
        if board.is_matched(id) || !board.is_free(id) {
            return Err(corrupt(format!("pending selection {} is not selectable", id)));
        }
        Ok(())
    }

    fn check_phase(&self, board: &Board) -> Result<(), SessionError> {
        let has_pair = board.has_free_pair(&self.config.rules);
        let consistent = match self.phase {
            Phase::Setup => board.matched_count() == 0 && self.history.undo_len() == 0,
            Phase::Won => board.is_cleared(),
            Phase::Playing => !board.is_cleared() && has_pair,
            Phase::Stalemate => !board.is_cleared() && !has_pair,
            Phase::Paused => !board.is_cleared(),
            Phase::Ended => true,
        };
        if consistent {
            Ok(())
        } else {
            Err(corrupt(format!(
                "phase {} does not fit a board with {} of {} tiles matched",
                self.phase.as_str(),
                board.matched_count(),
                board.total()
            )))
        }
    }
}
