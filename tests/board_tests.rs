//! Board tests - deck, layout and free-tile rules

use std::collections::{HashMap, HashSet};

use tile_match::core::layout::validate_layout;
use tile_match::core::{
    generate_deck, place, Board, GameSession, GlyphContent, LayoutPattern, MatchRules,
    PlaceholderContent, SessionConfig, TileProfile,
};
use tile_match::types::{Position, TileId};

/// Brute-force free check straight from the rule, for comparison with the index
fn free_by_rule(board: &Board, id: TileId) -> bool {
    let Some(pos) = board.position(id) else {
        return false;
    };
    let others: Vec<Position> = board
        .unmatched_ids()
        .into_iter()
        .filter(|other| *other != id)
        .filter_map(|other| board.position(other))
        .collect();

    let covered = others.iter().any(|o| o.layer > pos.layer && o.overlaps(&pos));
    let left = others
        .iter()
        .any(|o| o.layer == pos.layer && o.x == pos.x - 2 && (o.y - pos.y).abs() < 2);
    let right = others
        .iter()
        .any(|o| o.layer == pos.layer && o.x == pos.x + 2 && (o.y - pos.y).abs() < 2);
    !covered && !(left && right)
}

fn assert_index_matches_rule(board: &Board) {
    for id in board.unmatched_ids() {
        assert_eq!(
            board.is_free(id),
            free_by_rule(board, id),
            "free mismatch for tile {} at {:?}",
            id,
            board.position(id)
        );
    }
}

#[test]
fn test_decks_are_even_and_grouped() {
    let rules = MatchRules::default();
    for name in ["standard", "medium", "small", "pairs"] {
        let profile = TileProfile::named(name).unwrap();
        let deck = generate_deck(&profile, &GlyphContent).unwrap();
        assert_eq!(deck.len(), profile.total as usize);
        assert_eq!(deck.len() % 2, 0, "{} deck is odd", name);

        let mut groups: HashMap<_, usize> = HashMap::new();
        for tile in &deck {
            *groups.entry(rules.class_of(tile.face())).or_insert(0) += 1;
        }
        for (class, size) in groups {
            assert_eq!(
                size % profile.multiplicity as usize,
                0,
                "{}: class {:?} has {} tiles",
                name,
                class,
                size
            );
        }
    }
}

#[test]
fn test_deck_ids_are_stable_and_unique() {
    let deck = generate_deck(&TileProfile::standard(), &PlaceholderContent).unwrap();
    for (i, tile) in deck.iter().enumerate() {
        assert_eq!(tile.id, TileId(i as u16));
    }
}

#[test]
fn test_layouts_produce_exact_unique_positions() {
    for (pattern, count) in [
        (LayoutPattern::Turtle, 144),
        (LayoutPattern::Turtle, 72),
        (LayoutPattern::Pyramid, 120),
        (LayoutPattern::Flat, 144),
        (LayoutPattern::Flat, 2),
    ] {
        let positions = place(pattern, count).unwrap();
        assert_eq!(positions.len(), count);
        let unique: HashSet<_> = positions.iter().collect();
        assert_eq!(unique.len(), count, "{} has duplicate positions", pattern.as_str());
        validate_layout(&positions).unwrap();
    }
}

#[test]
fn test_layout_rejects_impossible_counts() {
    assert!(place(LayoutPattern::Pyramid, 144).is_err());
    assert!(place(LayoutPattern::Turtle, 143).is_err());
    assert!(place(LayoutPattern::Turtle, 0).is_err());
}

#[test]
fn test_covered_and_sandwiched_tiles_are_never_free() {
    for seed in [1, 7, 99] {
        let mut session =
            GameSession::new(SessionConfig::solitaire(seed), &PlaceholderContent).unwrap();
        session.start().unwrap();
        assert_index_matches_rule(session.board());

        // Keep checking as tiles leave the board and come back.
        for _ in 0..10 {
            let Some((a, b)) = session.hint() else { break };
            session.select_tile(a).unwrap();
            session.select_tile(b).unwrap();
            assert_index_matches_rule(session.board());
        }
        session.undo().unwrap();
        session.undo().unwrap();
        assert_index_matches_rule(session.board());
    }
}

#[test]
fn test_turtle_crown_blocks_the_four_beneath() {
    let positions = place(LayoutPattern::Turtle, 144).unwrap();
    let deck = generate_deck(&TileProfile::standard(), &PlaceholderContent).unwrap();
    let board = Board::new(deck, positions).unwrap();

    let crown = board.tile_at(Position::new(4, 13, 7)).unwrap();
    assert!(board.is_free(crown));

    let beneath: Vec<TileId> = board
        .unmatched_ids()
        .into_iter()
        .filter(|id| board.position(*id).unwrap().layer == 3)
        .collect();
    assert_eq!(beneath.len(), 4);
    assert!(beneath.iter().all(|id| !board.is_free(*id)));
}

#[test]
fn test_free_tiles_are_sorted_and_unmatched() {
    let session = {
        let mut s = GameSession::new(SessionConfig::default(), &GlyphContent).unwrap();
        s.start().unwrap();
        s
    };
    let free = session.free_tiles();
    assert!(!free.is_empty());
    assert!(free.windows(2).all(|w| w[0] < w[1]));
    assert!(free.iter().all(|id| !session.board().is_matched(*id)));
}
