//! Session tests - full game flows through the public API

use tile_match::core::{
    ContentRefs, GameSession, GlyphContent, PlaceholderContent, Selection, SessionConfig,
    SessionError, SessionSnapshot, Tile, TileContent,
};
use tile_match::types::{Phase, Position, Suit, TileFace, TileId};

fn started(seed: u32) -> GameSession {
    let mut session = GameSession::new(SessionConfig::solitaire(seed), &GlyphContent).unwrap();
    session.start().unwrap();
    session
}

fn match_hint(session: &mut GameSession) {
    let (a, b) = session.hint().expect("a free pair");
    session.select_tile(a).unwrap();
    assert!(matches!(session.select_tile(b).unwrap(), Selection::Matched(_)));
}

/// A hand-built solitaire session: one tile per `(face, position)`
fn custom(tiles: &[(TileFace, Position)], phase: Phase) -> GameSession {
    let snapshot = SessionSnapshot {
        phase,
        tiles: tiles
            .iter()
            .enumerate()
            .map(|(i, (face, _))| Tile {
                id: TileId(i as u16),
                content: TileContent {
                    face: *face,
                    refs: ContentRefs::placeholder(*face),
                },
            })
            .collect(),
        positions: tiles.iter().map(|(_, pos)| *pos).collect(),
        ..SessionSnapshot::default()
    };
    GameSession::restore(snapshot).unwrap()
}

fn face(suit: Suit, value: u8) -> TileFace {
    TileFace::new(suit, value)
}

fn row(faces: &[TileFace]) -> Vec<(TileFace, Position)> {
    faces
        .iter()
        .enumerate()
        .map(|(i, f)| (*f, Position::new(0, 2 * i as i16, 0)))
        .collect()
}

#[test]
fn test_standard_turtle_setup() {
    let session = started(2024);
    let board = session.board();
    assert_eq!(board.total(), 144);
    assert_eq!(board.positions().len(), 144);
    let mut positions = board.positions().to_vec();
    positions.sort();
    positions.dedup();
    assert_eq!(positions.len(), 144);
    assert_eq!(session.phase(), Phase::Playing);
    assert!(session.hint().is_some());
}

#[test]
fn test_matching_pair_scores() {
    let mut session = started(3);
    let (a, b) = session.hint().unwrap();
    assert_eq!(
        session.board().tile(a).unwrap().match_key(),
        session.board().tile(b).unwrap().match_key()
    );

    session.select_tile(a).unwrap();
    match session.select_tile(b).unwrap() {
        Selection::Matched(mv) => {
            assert_eq!((mv.tile_a, mv.tile_b), (a, b));
            assert!(mv.score_delta > 0);
        }
        other => panic!("expected match, got {:?}", other),
    }
    assert_eq!(session.board().matched_count(), 2);
    assert!(session.score() > 0);
}

#[test]
fn test_mismatched_pair_clears_selection() {
    let mut session = started(3);
    let rules = session.config().rules.clone();
    let free = session.free_tiles();
    let (a, c) = free
        .iter()
        .flat_map(|a| free.iter().map(move |c| (*a, *c)))
        .find(|(a, c)| {
            let fa = session.board().tile(*a).unwrap().face();
            let fc = session.board().tile(*c).unwrap().face();
            a != c && !rules.compatible(fa, fc)
        })
        .unwrap();

    session.select_tile(a).unwrap();
    assert_eq!(
        session.select_tile(c).unwrap(),
        Selection::NoMatch { first: a, second: c }
    );
    assert_eq!(session.board().matched_count(), 0);
    assert_eq!(session.selection(), None);
    assert_eq!(session.score(), 0);
}

#[test]
fn test_undo_twice_redo_twice_restores_fifth_match() {
    let mut session = started(77);
    for _ in 0..5 {
        match_hint(&mut session);
    }
    let board = session.board().clone();
    let score = session.score();
    let moves: Vec<_> = session.history().undo_moves().cloned().collect();

    session.undo().unwrap().unwrap();
    session.undo().unwrap().unwrap();
    assert_eq!(session.board().matched_count(), 6);
    session.redo().unwrap().unwrap();
    session.redo().unwrap().unwrap();

    assert_eq!(session.board(), &board);
    assert_eq!(session.score(), score);
    let replayed: Vec<_> = session.history().undo_moves().cloned().collect();
    assert_eq!(replayed, moves);
    assert_eq!(session.redo().unwrap(), None);
}

#[test]
fn test_last_pair_wins() {
    let bamboo = face(Suit::Bamboo, 3);
    let wind = face(Suit::Wind, 4);
    let mut session = custom(&row(&[bamboo, wind, wind, bamboo]), Phase::Playing);

    session.select_tile(TileId(0)).unwrap();
    session.select_tile(TileId(3)).unwrap();
    assert_eq!(session.phase(), Phase::Playing);

    session.select_tile(TileId(1)).unwrap();
    assert!(matches!(session.select_tile(TileId(2)).unwrap(), Selection::Matched(_)));
    assert_eq!(session.phase(), Phase::Won);
    assert!(session.board().is_cleared());

    // Won only accepts `end`.
    assert!(session.undo().is_err());
    session.end().unwrap();
    assert_eq!(session.phase(), Phase::Ended);
}

#[test]
fn test_never_won_before_the_last_pair() {
    let bamboo = face(Suit::Bamboo, 3);
    let wind = face(Suit::Wind, 4);
    let mut session = custom(&row(&[bamboo, wind, wind, bamboo]), Phase::Playing);
    session.select_tile(TileId(0)).unwrap();
    session.select_tile(TileId(3)).unwrap();
    assert_ne!(session.phase(), Phase::Won);
    assert_eq!(session.board().remaining(), 2);
}

#[test]
fn test_stalemate_shuffle_finds_a_pair() {
    // Only the two ends of a row are free, and they never share a face.
    let faces: Vec<TileFace> = (1..=5).chain(1..=5).map(|v| face(Suit::Circles, v)).collect();
    let mut session = custom(&row(&faces), Phase::Stalemate);
    assert!(session.is_stalemate());
    assert!(session.hint().is_none());

    let positions = session.board().positions().to_vec();
    let mut before: Vec<TileFace> = session.board().tiles().iter().map(|t| t.face()).collect();

    let report = session.shuffle().unwrap();
    assert_eq!(report.tiles, 10);
    assert_eq!(session.phase(), Phase::Playing);
    assert!(session.hint().is_some());
    assert_eq!(session.board().positions(), &positions[..]);

    let mut after: Vec<TileFace> = session.board().tiles().iter().map(|t| t.face()).collect();
    before.sort();
    after.sort();
    assert_eq!(before, after);
}

#[test]
fn test_hopeless_stalemate_shuffle_fails_atomically() {
    // One tile stacked on another: only one tile can ever be free.
    let dragon = face(Suit::Dragon, 1);
    let mut session = custom(
        &[
            (dragon, Position::new(0, 0, 0)),
            (dragon, Position::new(1, 0, 0)),
        ],
        Phase::Stalemate,
    );
    let board = session.board().clone();

    assert!(matches!(session.shuffle(), Err(SessionError::ShuffleFailed { .. })));
    assert_eq!(session.board(), &board);
    assert_eq!(session.phase(), Phase::Stalemate);

    session.abandon().unwrap();
    assert_eq!(session.phase(), Phase::Ended);
}

#[test]
fn test_stalemate_still_accepts_play() {
    let faces: Vec<TileFace> = (1..=5).chain(1..=5).map(|v| face(Suit::Circles, v)).collect();
    let mut session = custom(&row(&faces), Phase::Stalemate);
    // Both ends are free but differ: a legal attempt that simply fails.
    session.select_tile(TileId(0)).unwrap();
    assert!(matches!(
        session.select_tile(TileId(9)).unwrap(),
        Selection::NoMatch { .. }
    ));
}

#[test]
fn test_blocked_tile_never_mutates_board() {
    let mut session = started(5);
    let (a, _) = session.hint().unwrap();
    let blocked = session
        .board()
        .unmatched_ids()
        .into_iter()
        .find(|id| !session.board().is_free(*id))
        .unwrap();
    let board = session.board().clone();

    session.select_tile(a).unwrap();
    assert!(matches!(
        session.select_tile(blocked),
        Err(SessionError::InvalidSelection { .. })
    ));
    assert_eq!(session.board(), &board);
}

#[test]
fn test_matched_tile_cannot_be_selected_again() {
    let mut session = started(5);
    let (a, b) = session.hint().unwrap();
    session.select_tile(a).unwrap();
    session.select_tile(b).unwrap();
    assert!(matches!(
        session.select_tile(a),
        Err(SessionError::InvalidSelection { .. })
    ));
}

#[test]
fn test_sessions_are_independent() {
    let mut one = started(10);
    let two = started(10);
    assert_eq!(one.board(), two.board());

    match_hint(&mut one);
    assert_eq!(two.board().matched_count(), 0);
    assert_ne!(one.board(), two.board());
}

#[test]
fn test_content_provider_failure_falls_back() {
    let session = GameSession::new(SessionConfig::solitaire(1), &PlaceholderContent).unwrap();
    for tile in session.board().tiles() {
        assert!(tile.content.refs.primary.starts_with("tile:"));
        assert!(!tile.content.refs.fallback.is_empty());
    }
}
