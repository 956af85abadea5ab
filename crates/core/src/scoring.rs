//! Scoring module - pluggable award policy for successful matches
//!
//! The engine never hard-codes points. A [`ScorePolicy`] receives a
//! [`MatchContext`] describing the match (session clock, time since the previous
//! match, current streak) and returns the award stored in the move's
//! `score_delta`. Undo subtracts exactly that delta, so any policy is reversible.

use serde::{Deserialize, Serialize};

use crate::types::{
    PlayerId, BASE_MATCH_SCORE, QUICK_MATCH_BONUS, QUICK_MATCH_WINDOW_MS, STREAK_BONUS,
};

/// What a policy may look at when pricing a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchContext {
    /// Sequence number the move will carry
    pub sequence: u64,
    /// Session clock at the time of the match
    pub timestamp_ms: u64,
    /// Submitting player (multiplayer only)
    pub player: Option<PlayerId>,
    /// Milliseconds since the previous successful match, if any
    pub since_last_match_ms: Option<u64>,
    /// Consecutive successful matches before this one
    pub streak: u32,
}

/// Award policy for a successful match
pub trait ScorePolicy: std::fmt::Debug + Send + Sync {
    fn match_score(&self, ctx: &MatchContext) -> u32;
}

/// Base award plus quick-match and streak bonuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardScoring {
    pub base: u32,
    pub quick_bonus: u32,
    pub quick_window_ms: u64,
    pub streak_bonus: u32,
}

impl Default for StandardScoring {
    fn default() -> Self {
        Self {
            base: BASE_MATCH_SCORE,
            quick_bonus: QUICK_MATCH_BONUS,
            quick_window_ms: QUICK_MATCH_WINDOW_MS,
            streak_bonus: STREAK_BONUS,
        }
    }
}

impl ScorePolicy for StandardScoring {
    fn match_score(&self, ctx: &MatchContext) -> u32 {
        let quick = match ctx.since_last_match_ms {
            Some(gap) if gap <= self.quick_window_ms => self.quick_bonus,
            _ => 0,
        };
        self.base
            .saturating_add(quick)
            .saturating_add(self.streak_bonus.saturating_mul(ctx.streak))
    }
}

/// Constant award per match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatScoring(pub u32);

impl ScorePolicy for FlatScoring {
    fn match_score(&self, _ctx: &MatchContext) -> u32 {
        self.0
    }
}

/// Serializable choice of built-in policy, stored in the session config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ScoringRule {
    Standard(StandardScoring),
    Flat { points: u32 },
}

impl ScoringRule {
    pub fn build(&self) -> Box<dyn ScorePolicy> {
        match *self {
            ScoringRule::Standard(policy) => Box::new(policy),
            ScoringRule::Flat { points } => Box::new(FlatScoring(points)),
        }
    }
}

impl Default for ScoringRule {
    fn default() -> Self {
        Self::Standard(StandardScoring::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_match_earns_base() {
        let policy = StandardScoring::default();
        assert_eq!(policy.match_score(&MatchContext::default()), BASE_MATCH_SCORE);
    }

    #[test]
    fn quick_match_bonus_respects_window() {
        let policy = StandardScoring::default();
        let quick = MatchContext {
            since_last_match_ms: Some(QUICK_MATCH_WINDOW_MS),
            ..Default::default()
        };
        let slow = MatchContext {
            since_last_match_ms: Some(QUICK_MATCH_WINDOW_MS + 1),
            ..Default::default()
        };
        assert_eq!(policy.match_score(&quick), BASE_MATCH_SCORE + QUICK_MATCH_BONUS);
        assert_eq!(policy.match_score(&slow), BASE_MATCH_SCORE);
    }

    #[test]
    fn streak_bonus_scales() {
        let policy = StandardScoring::default();
        let ctx = MatchContext {
            streak: 3,
            ..Default::default()
        };
        assert_eq!(policy.match_score(&ctx), BASE_MATCH_SCORE + 3 * STREAK_BONUS);
    }

    #[test]
    fn flat_rule_ignores_context() {
        let policy = ScoringRule::Flat { points: 7 }.build();
        let ctx = MatchContext {
            streak: 10,
            since_last_match_ms: Some(0),
            ..Default::default()
        };
        assert_eq!(policy.match_score(&ctx), 7);
    }

    #[test]
    fn rule_round_trips_through_json() {
        let rule = ScoringRule::default();
        let json = serde_json::to_string(&rule).unwrap();
        assert!(json.contains("\"kind\":\"standard\""));
        let back: ScoringRule = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rule);
    }
}
