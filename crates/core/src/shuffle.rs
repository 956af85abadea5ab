//! Shuffle module - content reassignment over fixed positions
//!
//! A shuffle never moves a position. It permutes the *contents* (face and
//! display references) among the positions still held by unmatched tiles, and
//! either commits the whole new arrangement or leaves the board untouched.
//!
//! Two strategies:
//!
//! - [`ShuffleStrategy::Retry`] permutes at random until some free pair is
//!   compatible. This only promises one available move.
//! - [`ShuffleStrategy::Solvable`] builds the arrangement by reverse
//!   construction: it repeatedly picks two positions that are free among the
//!   positions not yet assigned, takes them out, and gives them a compatible
//!   content pair. The order of removal is itself a complete solution, so the
//!   remaining board can always be cleared.
//!
//! Initial deals use the same machinery on a freshly placed board.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::error::SessionError;
use crate::matching::{MatchClass, MatchRules};
use crate::rng::SimpleRng;
use crate::tileset::TileContent;
use crate::types::TileId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShuffleStrategy {
    /// Random permutation, retried until one free pair is compatible
    Retry,
    /// Reverse construction from a solved state
    Solvable,
}

impl ShuffleStrategy {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "retry" => Some(ShuffleStrategy::Retry),
            "solvable" => Some(ShuffleStrategy::Solvable),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShuffleStrategy::Retry => "retry",
            ShuffleStrategy::Solvable => "solvable",
        }
    }
}

impl Default for ShuffleStrategy {
    fn default() -> Self {
        Self::Solvable
    }
}

/// What a committed shuffle did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShuffleReport {
    pub strategy: ShuffleStrategy,
    /// Attempts used, including the successful one
    pub attempts: u32,
    /// Unmatched tiles whose content was reassigned
    pub tiles: usize,
    /// Removal order found by reverse construction (empty for `Retry`)
    pub solution: Vec<(TileId, TileId)>,
}

/// Reassign contents of all unmatched tiles
///
/// Fails with `ShuffleFailed` once `max_attempts` are exhausted; the board is
/// then exactly as it was before the call.
pub fn shuffle(
    board: &mut Board,
    rules: &MatchRules,
    rng: &mut SimpleRng,
    strategy: ShuffleStrategy,
    max_attempts: u32,
) -> Result<ShuffleReport, SessionError> {
    let ids = board.unmatched_ids();
    let contents: Vec<TileContent> = ids
        .iter()
        .filter_map(|id| board.tile(*id).map(|t| t.content.clone()))
        .collect();

    let plan = match strategy {
        ShuffleStrategy::Retry => retry_plan(board, &ids, contents, rules, rng, max_attempts),
        ShuffleStrategy::Solvable => solvable_plan(board, &ids, contents, rules, rng, max_attempts),
    };

    match plan {
        Some(plan) => {
            let tiles = plan.assignments.len();
            for (id, content) in plan.assignments {
                board.set_content(id, content);
            }
            tracing::debug!(
                strategy = strategy.as_str(),
                attempts = plan.attempts,
                tiles,
                "shuffled board"
            );
            Ok(ShuffleReport {
                strategy,
                attempts: plan.attempts,
                tiles,
                solution: plan.solution,
            })
        }
        None => {
            tracing::warn!(
                strategy = strategy.as_str(),
                attempts = max_attempts,
                remaining = ids.len(),
                "shuffle exhausted its attempts"
            );
            Err(SessionError::ShuffleFailed {
                attempts: max_attempts,
            })
        }
    }
}

struct Plan {
    assignments: Vec<(TileId, TileContent)>,
    attempts: u32,
    solution: Vec<(TileId, TileId)>,
}

fn retry_plan(
    board: &Board,
    ids: &[TileId],
    contents: Vec<TileContent>,
    rules: &MatchRules,
    rng: &mut SimpleRng,
    max_attempts: u32,
) -> Option<Plan> {
    // Freedom depends only on positions, which do not move.
    let free: Vec<usize> = ids
        .iter()
        .enumerate()
        .filter(|(_, id)| board.is_free(**id))
        .map(|(slot, _)| slot)
        .collect();

    let mut perm = contents;
    for attempt in 1..=max_attempts {
        rng.shuffle(&mut perm);

        let mut seen: Vec<MatchClass> = Vec::with_capacity(free.len());
        let playable = free.iter().any(|&slot| {
            let class = rules.class_of(perm[slot].face);
            if seen.contains(&class) {
                true
            } else {
                seen.push(class);
                false
            }
        });

        if playable {
            return Some(Plan {
                assignments: ids.iter().copied().zip(perm).collect(),
                attempts: attempt,
                solution: Vec::new(),
            });
        }
    }
    None
}

/// Split contents into compatible pairs; `None` if some class is odd
fn pair_up(contents: Vec<TileContent>, rules: &MatchRules) -> Option<Vec<(TileContent, TileContent)>> {
    let mut classes: BTreeMap<MatchClass, Vec<TileContent>> = BTreeMap::new();
    for content in contents {
        classes
            .entry(rules.class_of(content.face))
            .or_default()
            .push(content);
    }

    let mut pairs = Vec::new();
    for (_, mut group) in classes {
        if group.len() % 2 != 0 {
            return None;
        }
        while let (Some(a), Some(b)) = (group.pop(), group.pop()) {
            pairs.push((a, b));
        }
    }
    Some(pairs)
}

fn solvable_plan(
    board: &Board,
    ids: &[TileId],
    contents: Vec<TileContent>,
    rules: &MatchRules,
    rng: &mut SimpleRng,
    max_attempts: u32,
) -> Option<Plan> {
    let mut pairs = pair_up(contents, rules)?;

    for attempt in 1..=max_attempts {
        rng.shuffle(&mut pairs);

        let mut occupancy = board.occupancy().clone();
        let mut assignments = Vec::with_capacity(ids.len());
        let mut solution = Vec::with_capacity(pairs.len());
        let mut stuck = false;

        for (first, second) in &pairs {
            let free = occupancy.free_ids();
            if free.len() < 2 {
                stuck = true;
                break;
            }
            let i = rng.next_index(free.len());
            let mut j = rng.next_index(free.len() - 1);
            if j >= i {
                j += 1;
            }
            let (a, b) = (free[i], free[j]);
            occupancy.remove(a);
            occupancy.remove(b);
            assignments.push((a, first.clone()));
            assignments.push((b, second.clone()));
            solution.push((a, b));
        }

        if !stuck {
            assignments.sort_by_key(|(id, _)| *id);
            return Some(Plan {
                assignments,
                attempts: attempt,
                solution,
            });
        }
        tracing::trace!(attempt, "reverse construction got stuck, retrying");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::PlaceholderContent;
    use crate::layout::{place, LayoutPattern};
    use crate::tileset::{generate_deck, TileProfile};
    use crate::types::{Position, TileFace};

    fn board_for(pattern: LayoutPattern) -> Board {
        let deck = generate_deck(&TileProfile::standard(), &PlaceholderContent).unwrap();
        Board::new(deck, place(pattern, 144).unwrap()).unwrap()
    }

    fn sorted_faces(board: &Board) -> Vec<TileFace> {
        let mut faces: Vec<TileFace> = board.tiles().iter().map(|t| t.face()).collect();
        faces.sort();
        faces
    }

    /// Replay a solution, checking each pair is free and compatible when taken
    fn replay(board: &mut Board, rules: &MatchRules, solution: &[(TileId, TileId)]) {
        for &(a, b) in solution {
            assert!(board.is_free(a) && board.is_free(b), "{} / {} not free", a, b);
            let fa = board.tile(a).unwrap().face();
            let fb = board.tile(b).unwrap().face();
            assert!(rules.compatible(fa, fb), "{} / {} incompatible", fa, fb);
            board.set_matched(a);
            board.set_matched(b);
        }
    }

    #[test]
    fn positions_never_move() {
        let mut board = board_for(LayoutPattern::Turtle);
        let positions = board.positions().to_vec();
        let mut rng = SimpleRng::new(5);
        shuffle(&mut board, &MatchRules::default(), &mut rng, ShuffleStrategy::Solvable, 64).unwrap();
        assert_eq!(board.positions(), positions.as_slice());
    }

    #[test]
    fn shuffle_preserves_the_content_multiset() {
        let rules = MatchRules::default();
        for strategy in [ShuffleStrategy::Retry, ShuffleStrategy::Solvable] {
            let mut board = board_for(LayoutPattern::Turtle);
            let before = sorted_faces(&board);
            let mut rng = SimpleRng::new(77);
            shuffle(&mut board, &rules, &mut rng, strategy, 64).unwrap();
            assert_eq!(sorted_faces(&board), before);
        }
    }

    #[test]
    fn retry_guarantees_a_free_pair() {
        let rules = MatchRules::default();
        for seed in 1..20 {
            let mut board = board_for(LayoutPattern::Turtle);
            let mut rng = SimpleRng::new(seed);
            let report = shuffle(&mut board, &rules, &mut rng, ShuffleStrategy::Retry, 64).unwrap();
            assert!(board.has_free_pair(&rules), "seed {}", seed);
            assert!(report.solution.is_empty());
        }
    }

    #[test]
    fn solvable_construction_is_a_full_solution() {
        let rules = MatchRules::default();
        for pattern in [LayoutPattern::Turtle, LayoutPattern::Flat] {
            for seed in 1..6 {
                let mut board = board_for(pattern);
                let mut rng = SimpleRng::new(seed);
                let report =
                    shuffle(&mut board, &rules, &mut rng, ShuffleStrategy::Solvable, 64).unwrap();
                assert_eq!(report.solution.len(), 72);

                replay(&mut board, &rules, &report.solution);
                assert!(board.is_cleared(), "{:?} seed {}", pattern, seed);
            }
        }
    }

    #[test]
    fn reshuffle_mid_game_touches_only_unmatched_tiles() {
        let rules = MatchRules::default();
        let mut board = board_for(LayoutPattern::Turtle);
        let mut rng = SimpleRng::new(3);
        let report = shuffle(&mut board, &rules, &mut rng, ShuffleStrategy::Solvable, 64).unwrap();

        replay(&mut board, &rules, &report.solution[..10]);
        let retired: Vec<_> = board
            .matched_ids()
            .into_iter()
            .map(|id| (id, board.tile(id).unwrap().content.clone()))
            .collect();

        let again = shuffle(&mut board, &rules, &mut rng, ShuffleStrategy::Solvable, 64).unwrap();
        assert_eq!(again.tiles, 124);
        for (id, content) in retired {
            assert!(board.is_matched(id));
            assert_eq!(board.tile(id).unwrap().content, content);
        }

        replay(&mut board, &rules, &again.solution);
        assert!(board.is_cleared());
    }

    #[test]
    fn stacked_pair_cannot_be_shuffled() {
        // bamboo-1 x2, bamboo-2 x2; tile 1 rests on tiles 0 and 2.
        let deck = generate_deck(&TileProfile::new("tiny", 4, 2), &PlaceholderContent).unwrap();
        let positions = vec![
            Position::new(0, 0, 0),
            Position::new(1, 1, 0),
            Position::new(0, 2, 0),
            Position::new(0, 8, 0),
        ];
        let mut board = Board::new(deck, positions).unwrap();
        board.set_matched(TileId(2));
        board.set_matched(TileId(3));
        let before = board.clone();

        let rules = MatchRules::default();
        let mut rng = SimpleRng::new(1);
        for strategy in [ShuffleStrategy::Retry, ShuffleStrategy::Solvable] {
            let err = shuffle(&mut board, &rules, &mut rng, strategy, 8).unwrap_err();
            assert_eq!(err, SessionError::ShuffleFailed { attempts: 8 });
            assert_eq!(board, before);
        }
    }

    #[test]
    fn strategy_names() {
        assert_eq!(ShuffleStrategy::from_str("Retry"), Some(ShuffleStrategy::Retry));
        assert_eq!(ShuffleStrategy::default().as_str(), "solvable");
        assert_eq!(ShuffleStrategy::from_str("magic"), None);
    }
}
