//! Multiplayer tests - ownership and ordering of submitted moves

use tile_match::core::{GameSession, MatchOutcome, PlaceholderContent, SessionConfig, SessionError};
use tile_match::types::{Phase, PlayerId, TileId};

fn room(players: u8) -> GameSession {
    let mut session =
        GameSession::new(SessionConfig::multiplayer(players, 17), &PlaceholderContent).unwrap();
    session.start().unwrap();
    session
}

#[test]
fn test_non_active_player_never_mutates() {
    let mut session = room(3);
    let (a, b) = session.hint().unwrap();
    let before = session.snapshot();

    let err = session.submit_move(PlayerId(2), a, b, 0).unwrap_err();
    assert_eq!(
        err,
        SessionError::NotYourTurn {
            player: PlayerId(2),
            active: Some(PlayerId(1))
        }
    );
    assert!(err.is_recoverable());
    assert_eq!(session.snapshot(), before);
}

#[test]
fn test_stale_sequence_never_mutates() {
    let mut session = room(2);
    let (a, b) = session.hint().unwrap();
    session.submit_move(PlayerId(1), a, b, 0).unwrap();
    let before = session.snapshot();

    // Replaying the same sequence number, and jumping ahead, are both stale.
    let (c, d) = session.hint().unwrap();
    for seq in [0, 5] {
        assert_eq!(
            session.submit_move(PlayerId(2), c, d, seq),
            Err(SessionError::StaleMove { got: seq, expected: 1 })
        );
    }
    assert_eq!(session.snapshot(), before);
}

#[test]
fn test_turn_passes_on_match_and_on_miss() {
    let mut session = room(2);
    let rules = session.config().rules.clone();

    let (a, b) = session.hint().unwrap();
    let outcome = session.submit_move(PlayerId(1), a, b, 0).unwrap();
    assert!(outcome.is_matched());
    assert_eq!(session.active_player(), Some(PlayerId(2)));

    let free = session.free_tiles();
    let (x, y) = free
        .iter()
        .flat_map(|x| free.iter().map(move |y| (*x, *y)))
        .find(|(x, y)| {
            let fx = session.board().tile(*x).unwrap().face();
            let fy = session.board().tile(*y).unwrap().face();
            x != y && !rules.compatible(fx, fy)
        })
        .unwrap();
    assert_eq!(
        session.submit_move(PlayerId(2), x, y, 1).unwrap(),
        MatchOutcome::NoMatch
    );
    assert_eq!(session.active_player(), Some(PlayerId(1)));
    assert_eq!(session.next_sequence(), 2);
    assert_eq!(session.board().matched_count(), 2);
}

#[test]
fn test_invalid_selection_keeps_turn_and_sequence() {
    let mut session = room(2);
    let blocked = session
        .board()
        .unmatched_ids()
        .into_iter()
        .find(|id| !session.board().is_free(*id))
        .unwrap();
    let (a, _) = session.hint().unwrap();

    assert!(matches!(
        session.submit_move(PlayerId(1), a, blocked, 0),
        Err(SessionError::InvalidSelection { .. })
    ));
    assert_eq!(session.active_player(), Some(PlayerId(1)));
    assert_eq!(session.next_sequence(), 0);
}

#[test]
fn test_scores_are_credited_per_player() {
    let mut session = room(2);
    for seq in 0..4 {
        let active = session.active_player().unwrap();
        let (a, b) = session.hint().unwrap();
        session.submit_move(active, a, b, seq).unwrap();
    }
    let total: u32 = session.players().iter().map(|p| p.score).sum();
    assert_eq!(total, session.score());
    assert!(session.players().iter().all(|p| p.score > 0));
}

#[test]
fn test_ended_session_rejects_submissions() {
    let mut session = room(2);
    session.abandon().unwrap();
    assert_eq!(session.phase(), Phase::Ended);
    assert_eq!(
        session.submit_move(PlayerId(1), TileId(0), TileId(1), 0),
        Err(SessionError::SessionEnded)
    );
}
