//! History module - bounded undo/redo over applied matches
//!
//! A [`Move`] is the only record of a match. Undo puts both tiles back at their
//! (never moved) positions; redo retires them again. The undo stack is bounded:
//! when full, the oldest move is dropped and only the reach of undo shrinks.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::types::{PlayerId, TileId, DEFAULT_UNDO_DEPTH};

/// One applied match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub tile_a: TileId,
    pub tile_b: TileId,
    pub sequence: u64,
    pub score_delta: u32,
    /// Session clock when the match was applied
    pub timestamp_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<PlayerId>,
}

impl Move {
    pub fn tiles(&self) -> [TileId; 2] {
        [self.tile_a, self.tile_b]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveHistory {
    undo: VecDeque<Move>,
    redo: Vec<Move>,
    max_depth: usize,
    /// Moves evicted from the bottom of the undo stack
    dropped: u64,
}

impl MoveHistory {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            max_depth: max_depth.max(1),
            dropped: 0,
        }
    }

    /// Push a freshly applied move; invalidates redo
    pub fn record(&mut self, mv: Move) {
        self.redo.clear();
        self.push_undo(mv);
    }

    fn push_undo(&mut self, mv: Move) {
        if self.undo.len() == self.max_depth {
            self.undo.pop_front();
            self.dropped += 1;
        }
        self.undo.push_back(mv);
    }

    /// Revert the newest move on `board`
    ///
    /// Returns `None` (and does nothing) when there is nothing to undo.
    pub fn undo(&mut self, board: &mut Board) -> Option<Move> {
        let mv = self.undo.pop_back()?;
        board.set_unmatched(mv.tile_a);
        board.set_unmatched(mv.tile_b);
        self.redo.push(mv.clone());
        tracing::debug!(a = %mv.tile_a, b = %mv.tile_b, seq = mv.sequence, "undo");
        Some(mv)
    }

    /// Re-apply the most recently undone move on `board`
    pub fn redo(&mut self, board: &mut Board) -> Option<Move> {
        let mv = self.redo.pop()?;
        board.set_matched(mv.tile_a);
        board.set_matched(mv.tile_b);
        self.push_undo(mv.clone());
        tracing::debug!(a = %mv.tile_a, b = %mv.tile_b, seq = mv.sequence, "redo");
        Some(mv)
    }

    /// Forget undone moves; used when their tiles' contents may have changed
    pub fn clear_redo(&mut self) {
        self.redo.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn last(&self) -> Option<&Move> {
        self.undo.back()
    }

    /// Undo stack, oldest first
    pub fn undo_moves(&self) -> impl Iterator<Item = &Move> {
        self.undo.iter()
    }

    /// Redo stack, next-to-redo last
    pub fn redo_moves(&self) -> impl Iterator<Item = &Move> {
        self.redo.iter()
    }
}

impl Default for MoveHistory {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_DEPTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentRefs;
    use crate::tileset::{Tile, TileContent};
    use crate::types::{Position, Suit, TileFace};

    fn board(n: u16) -> Board {
        let tiles = (0..n)
            .map(|i| {
                let face = TileFace::new(Suit::Dragon, 1);
                Tile {
                    id: TileId(i),
                    content: TileContent {
                        face,
                        refs: ContentRefs::placeholder(face),
                    },
                }
            })
            .collect();
        let positions = (0..n as i16).map(|i| Position::new(0, i * 4, 0)).collect();
        Board::new(tiles, positions).unwrap()
    }

    fn mv(a: u16, b: u16, seq: u64) -> Move {
        Move {
            tile_a: TileId(a),
            tile_b: TileId(b),
            sequence: seq,
            score_delta: 10,
            timestamp_ms: seq * 100,
            player: None,
        }
    }

    fn apply(board: &mut Board, history: &mut MoveHistory, m: Move) {
        board.set_matched(m.tile_a);
        board.set_matched(m.tile_b);
        history.record(m);
    }

    #[test]
    fn empty_stacks_are_noops() {
        let mut b = board(2);
        let before = b.clone();
        let mut history = MoveHistory::default();
        assert_eq!(history.undo(&mut b), None);
        assert_eq!(history.redo(&mut b), None);
        assert_eq!(b, before);
    }

    #[test]
    fn undo_then_redo_restores_board() {
        let mut b = board(4);
        let mut history = MoveHistory::default();
        apply(&mut b, &mut history, mv(0, 1, 0));
        apply(&mut b, &mut history, mv(2, 3, 1));
        let after = b.clone();

        assert_eq!(history.undo(&mut b), Some(mv(2, 3, 1)));
        assert!(!b.is_matched(TileId(2)));
        assert!(b.is_matched(TileId(0)));
        assert!(history.can_redo());

        assert_eq!(history.redo(&mut b), Some(mv(2, 3, 1)));
        assert_eq!(b, after);
        assert!(!history.can_redo());
    }

    #[test]
    fn record_clears_redo() {
        let mut b = board(4);
        let mut history = MoveHistory::default();
        apply(&mut b, &mut history, mv(0, 1, 0));
        history.undo(&mut b);
        assert_eq!(history.redo_len(), 1);

        apply(&mut b, &mut history, mv(2, 3, 1));
        assert_eq!(history.redo_len(), 0);
    }

    #[test]
    fn depth_bound_drops_oldest() {
        let mut b = board(8);
        let mut history = MoveHistory::new(2);
        apply(&mut b, &mut history, mv(0, 1, 0));
        apply(&mut b, &mut history, mv(2, 3, 1));
        apply(&mut b, &mut history, mv(4, 5, 2));

        assert_eq!(history.undo_len(), 2);
        assert_eq!(history.dropped(), 1);

        history.undo(&mut b);
        history.undo(&mut b);
        assert_eq!(history.undo(&mut b), None);

        // The dropped move stays applied.
        assert!(b.is_matched(TileId(0)));
        assert!(b.is_matched(TileId(1)));
        assert_eq!(b.matched_count(), 2);
    }
}
