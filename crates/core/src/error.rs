//! Engine error values
//!
//! Every fallible operation returns one of these before touching the board, so a
//! failed call never leaves a half-applied mutation behind.

use thiserror::Error;

use crate::types::{PlayerId, TileId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Tile unknown, already matched, paired with itself, or not currently free
    #[error("invalid selection of tile {tile}: {reason}")]
    InvalidSelection { tile: TileId, reason: SelectionFault },

    /// The tile-count profile cannot be built from its group multiplicity
    #[error("invalid tile profile: {0}")]
    InvalidProfile(String),

    /// The layout pattern cannot hold exactly the requested tile count
    #[error("layout `{pattern}` cannot place {requested} tiles ({available} cells)")]
    LayoutMismatch {
        pattern: String,
        requested: usize,
        available: usize,
    },

    /// Bounded shuffle retries ran out; the board was left untouched
    #[error("shuffle failed after {attempts} attempts")]
    ShuffleFailed { attempts: u32 },

    /// A multiplayer move came from a player who does not hold the turn
    #[error("player {player} moved out of turn (active: {active:?})")]
    NotYourTurn {
        player: PlayerId,
        active: Option<PlayerId>,
    },

    /// A multiplayer move carried the wrong sequence number
    #[error("stale move: got sequence {got}, expected {expected}")]
    StaleMove { got: u64, expected: u64 },

    /// A restored snapshot failed a structural invariant
    #[error("corrupted snapshot: {0}")]
    CorruptedSnapshot(String),

    /// Operation not available in this session mode
    #[error("`{0}` is not available in this session mode")]
    WrongMode(&'static str),

    /// Operation not available in the current phase
    #[error("`{operation}` is not available while {phase}")]
    InvalidPhase {
        operation: &'static str,
        phase: &'static str,
    },

    /// The session has ended and accepts no further mutation
    #[error("session has ended")]
    SessionEnded,
}

/// Why a selection was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionFault {
    Unknown,
    AlreadyMatched,
    NotFree,
    SameTile,
}

impl SelectionFault {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionFault::Unknown => "unknown tile",
            SelectionFault::AlreadyMatched => "already matched",
            SelectionFault::NotFree => "not free",
            SelectionFault::SameTile => "same tile twice",
        }
    }
}

impl std::fmt::Display for SelectionFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SessionError {
    pub(crate) fn selection(tile: TileId, reason: SelectionFault) -> Self {
        Self::InvalidSelection { tile, reason }
    }

    /// Recoverable errors leave the session playable; the caller may retry
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            SessionError::InvalidProfile(_)
                | SessionError::LayoutMismatch { .. }
                | SessionError::CorruptedSnapshot(_)
        )
    }
}
