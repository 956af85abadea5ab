//! Matching module - pair validation under the free-tile and match-key rules
//!
//! Two tiles match when both are free and their faces fall in the same
//! [`MatchClass`]. Ordinary faces form an exact class keyed by suit and value.
//! Faces of a wildcard suit (flowers and seasons by default) carry unique keys
//! but share one class per suit, so any flower removes any other flower.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::error::{SelectionFault, SessionError};
use crate::history::{Move, MoveHistory};
use crate::scoring::{MatchContext, ScorePolicy};
use crate::types::{MatchKey, Suit, TileFace, TileId};

/// Equivalence class of faces that may be removed together
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MatchClass {
    Exact(MatchKey),
    Wildcard(Suit),
}

/// Configured compatibility rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRules {
    /// Suits whose faces all match each other regardless of value
    pub wildcard_suits: Vec<Suit>,
}

impl MatchRules {
    /// Only identical keys match
    pub fn strict() -> Self {
        Self {
            wildcard_suits: Vec::new(),
        }
    }

    #[inline]
    pub fn class_of(&self, face: TileFace) -> MatchClass {
        if self.wildcard_suits.contains(&face.suit) {
            MatchClass::Wildcard(face.suit)
        } else {
            MatchClass::Exact(MatchKey::from(face))
        }
    }

    /// Whether two faces may be removed together
    ///
    /// # Examples
    ///
    /// ```
    /// use tile_match_core::matching::MatchRules;
    /// use tile_match_core::types::{Suit, TileFace};
    ///
    /// let rules = MatchRules::default();
    /// let bamboo = TileFace::new(Suit::Bamboo, 3);
    /// assert!(rules.compatible(bamboo, bamboo));
    /// assert!(!rules.compatible(bamboo, TileFace::new(Suit::Wind, 4)));
    ///
    /// // Bonus tiles match within their suit.
    /// assert!(rules.compatible(TileFace::new(Suit::Flower, 1), TileFace::new(Suit::Flower, 3)));
    /// assert!(!MatchRules::strict()
    ///     .compatible(TileFace::new(Suit::Flower, 1), TileFace::new(Suit::Flower, 3)));
    /// ```
    #[inline]
    pub fn compatible(&self, a: TileFace, b: TileFace) -> bool {
        self.class_of(a) == self.class_of(b)
    }
}

/// First class with an odd number of faces, if any
///
/// A deck with an odd class can never be cleared under these rules.
pub fn unpaired_class<I>(rules: &MatchRules, faces: I) -> Option<(MatchClass, usize)>
where
    I: IntoIterator<Item = TileFace>,
{
    let mut counts: BTreeMap<MatchClass, usize> = BTreeMap::new();
    for face in faces {
        *counts.entry(rules.class_of(face)).or_insert(0) += 1;
    }
    counts.into_iter().find(|(_, n)| n % 2 != 0)
}

impl Default for MatchRules {
    fn default() -> Self {
        Self {
            wildcard_suits: vec![Suit::Flower, Suit::Season],
        }
    }
}

/// Result of a well-formed match attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "result")]
pub enum MatchOutcome {
    /// Both tiles left play; the recorded move is returned
    Matched(Move),
    /// Both tiles free but incompatible; nothing changed
    NoMatch,
}

impl MatchOutcome {
    pub fn is_matched(&self) -> bool {
        matches!(self, MatchOutcome::Matched(_))
    }
}

/// Check the preconditions of a single selected tile
pub fn check_selectable(board: &Board, id: TileId) -> Result<(), SessionError> {
    if board.tile(id).is_none() {
        return Err(SessionError::selection(id, SelectionFault::Unknown));
    }
    if board.is_matched(id) {
        return Err(SessionError::selection(id, SelectionFault::AlreadyMatched));
    }
    if !board.is_free(id) {
        return Err(SessionError::selection(id, SelectionFault::NotFree));
    }
    Ok(())
}

/// Attempt to remove `a` and `b`
///
/// Preconditions failures (unknown, matched, identical or blocked tiles) are
/// `InvalidSelection` errors. On `Matched` both tiles are retired, the score is
/// computed by `policy`, and the move is recorded in `history`. The board is
/// untouched in every other case.
pub fn try_match(
    board: &mut Board,
    history: &mut MoveHistory,
    rules: &MatchRules,
    policy: &dyn ScorePolicy,
    ctx: &MatchContext,
    a: TileId,
    b: TileId,
) -> Result<MatchOutcome, SessionError> {
    if a == b {
        return Err(SessionError::selection(b, SelectionFault::SameTile));
    }
    check_selectable(board, a)?;
    check_selectable(board, b)?;

    let (face_a, face_b) = match (board.tile(a), board.tile(b)) {
        (Some(ta), Some(tb)) => (ta.face(), tb.face()),
        _ => return Err(SessionError::selection(a, SelectionFault::Unknown)),
    };

    if !rules.compatible(face_a, face_b) {
        tracing::debug!(%a, %b, %face_a, %face_b, "no match");
        return Ok(MatchOutcome::NoMatch);
    }

    let mv = Move {
        tile_a: a,
        tile_b: b,
        sequence: ctx.sequence,
        score_delta: policy.match_score(ctx),
        timestamp_ms: ctx.timestamp_ms,
        player: ctx.player,
    };

    board.set_matched(a);
    board.set_matched(b);
    history.record(mv.clone());

    tracing::debug!(%a, %b, face = %face_a, score = mv.score_delta, "matched pair");
    Ok(MatchOutcome::Matched(mv))
}
