//! Turn module - turn ownership and move sequencing
//!
//! The coordinator holds the player ring, the active seat and the next expected
//! sequence number. A submission must come from the active player and carry
//! exactly `next_sequence`; anything else is rejected before the board is
//! looked at, and the rejection carries the values a client needs to resync.
//!
//! Every accepted submission, matched or not, advances the turn and the
//! sequence. Solitaire sessions use the same counter with an empty player ring.

use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::types::PlayerId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub display_name: String,
    pub score: u32,
    pub turn_order: u8,
}

impl Player {
    pub fn new(id: PlayerId, display_name: impl Into<String>, turn_order: u8) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            score: 0,
            turn_order,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnCoordinator {
    players: Vec<Player>,
    active: usize,
    next_sequence: u64,
}

impl TurnCoordinator {
    /// Seat `count` players as `p1..pN` in turn order
    pub fn seated(count: u8) -> Self {
        let players = (0..count)
            .map(|i| Player::new(PlayerId(i as u32 + 1), format!("Player {}", i + 1), i))
            .collect();
        Self::with_players(players)
    }

    pub fn with_players(mut players: Vec<Player>) -> Self {
        players.sort_by_key(|p| p.turn_order);
        Self {
            players,
            active: 0,
            next_sequence: 0,
        }
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn active_player(&self) -> Option<PlayerId> {
        self.players.get(self.active).map(|p| p.id)
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Ownership and ordering check for a submission
    ///
    /// # Examples
    ///
    /// ```
    /// use tile_match_core::turn::TurnCoordinator;
    /// use tile_match_core::types::PlayerId;
    /// use tile_match_core::SessionError;
    ///
    /// let mut turns = TurnCoordinator::seated(2);
    /// assert!(turns.check(PlayerId(1), 0).is_ok());
    /// assert_eq!(
    ///     turns.check(PlayerId(2), 0),
    ///     Err(SessionError::NotYourTurn { player: PlayerId(2), active: Some(PlayerId(1)) })
    /// );
    /// assert_eq!(
    ///     turns.check(PlayerId(1), 3),
    ///     Err(SessionError::StaleMove { got: 3, expected: 0 })
    /// );
    ///
    /// turns.advance();
    /// assert_eq!(turns.active_player(), Some(PlayerId(2)));
    /// assert_eq!(turns.next_sequence(), 1);
    /// ```
    pub fn check(&self, player: PlayerId, client_seq: u64) -> Result<(), SessionError> {
        let active = self.active_player();
        if active != Some(player) {
            return Err(SessionError::NotYourTurn { player, active });
        }
        if client_seq != self.next_sequence {
            return Err(SessionError::StaleMove {
                got: client_seq,
                expected: self.next_sequence,
            });
        }
        Ok(())
    }

    /// Consume the sequence number and pass the turn on
    pub fn advance(&mut self) {
        self.next_sequence += 1;
        if !self.players.is_empty() {
            self.active = (self.active + 1) % self.players.len();
        }
    }

    pub(crate) fn credit(&mut self, id: PlayerId, points: u32) {
        if let Some(player) = self.player_mut(id) {
            player.score = player.score.saturating_add(points);
        }
    }

    /// Structural self-check used when restoring
    pub(crate) fn validate(&self, seats: u8) -> Result<(), String> {
        if self.players.len() != seats as usize {
            return Err(format!(
                "{} players seated for {} seats",
                self.players.len(),
                seats
            ));
        }
        if !self.players.is_empty() && self.active >= self.players.len() {
            return Err(format!("active seat {} out of range", self.active));
        }
        for (i, a) in self.players.iter().enumerate() {
            if self.players[i + 1..].iter().any(|b| b.id == a.id) {
                return Err(format!("player {} seated twice", a.id));
            }
        }
        Ok(())
    }
}

impl Default for TurnCoordinator {
    fn default() -> Self {
        Self::with_players(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_rotates_through_all_players() {
        let mut turns = TurnCoordinator::seated(3);
        let order: Vec<_> = (0..6)
            .map(|_| {
                let p = turns.active_player().unwrap();
                turns.advance();
                p
            })
            .collect();
        assert_eq!(
            order,
            vec![
                PlayerId(1),
                PlayerId(2),
                PlayerId(3),
                PlayerId(1),
                PlayerId(2),
                PlayerId(3)
            ]
        );
        assert_eq!(turns.next_sequence(), 6);
    }

    #[test]
    fn unknown_player_is_not_your_turn() {
        let turns = TurnCoordinator::seated(2);
        assert!(matches!(
            turns.check(PlayerId(42), 0),
            Err(SessionError::NotYourTurn { .. })
        ));
    }

    #[test]
    fn solitaire_counter_still_advances() {
        let mut turns = TurnCoordinator::default();
        assert_eq!(turns.active_player(), None);
        turns.advance();
        turns.advance();
        assert_eq!(turns.next_sequence(), 2);
    }

    #[test]
    fn ownership_is_checked_before_sequence() {
        let turns = TurnCoordinator::seated(2);
        // Wrong player and wrong sequence: ownership wins.
        assert!(matches!(
            turns.check(PlayerId(2), 9),
            Err(SessionError::NotYourTurn { .. })
        ));
    }

    #[test]
    fn credit_only_touches_named_player() {
        let mut turns = TurnCoordinator::seated(2);
        turns.credit(PlayerId(2), 15);
        assert_eq!(turns.player(PlayerId(1)).unwrap().score, 0);
        assert_eq!(turns.player(PlayerId(2)).unwrap().score, 15);
    }

    #[test]
    fn validate_catches_bad_seating() {
        assert!(TurnCoordinator::seated(2).validate(2).is_ok());
        assert!(TurnCoordinator::seated(2).validate(3).is_err());

        let dup = TurnCoordinator::with_players(vec![
            Player::new(PlayerId(1), "a", 0),
            Player::new(PlayerId(1), "b", 1),
        ]);
        assert!(dup.validate(2).is_err());
    }
}
