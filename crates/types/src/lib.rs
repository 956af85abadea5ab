//! Core types module - shared data structures and constants
//!
//! This module defines the fundamental types used throughout the engine.
//! All types are plain data with no behaviour beyond parsing and geometry,
//! making them usable in any context (core logic, snapshots, wire protocol).
//!
//! # Board Geometry
//!
//! Positions use half-tile units so that layouts can offset a tile by half a
//! tile (the classic turtle's end pieces and crown):
//!
//! - A tile at `(layer, x, y)` covers the unit cells `x..=x+1` and `y..=y+1`
//! - Two tiles on adjacent layers overlap when `|dx| <= 1 && |dy| <= 1`
//! - Lateral neighbours sit on the same layer at `x - 2` / `x + 2` with `|dy| <= 1`
//!
//! # Deck Constants
//!
//! | Constant | Value | Description |
//! |----------|-------|-------------|
//! | `STANDARD_DECK_SIZE` | 144 | Tiles in the standard profile |
//! | `DEFAULT_MULTIPLICITY` | 4 | Copies per matching group |
//! | `CANONICAL_GROUPS` | 36 | Groups available to a profile |
//! | `DEFAULT_UNDO_DEPTH` | 256 | Moves kept on the undo stack |
//! | `DEFAULT_SHUFFLE_ATTEMPTS` | 64 | Bounded retries per shuffle |
//!
//! # Examples
//!
//! ```
//! use tile_match_types::{Position, Suit, TileFace};
//!
//! let face = TileFace::new(Suit::Bamboo, 3);
//! assert_eq!(face.label(), "bamboo-3");
//!
//! let parsed = Suit::from_str("WIND").unwrap();
//! assert_eq!(parsed, Suit::Wind);
//!
//! let below = Position::new(0, 4, 4);
//! let above = Position::new(1, 5, 5);
//! assert!(above.covers(&below));
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Tiles in the standard 144-tile profile
pub const STANDARD_DECK_SIZE: u16 = 144;

/// Copies per matching group in the standard profile
pub const DEFAULT_MULTIPLICITY: u8 = 4;

/// Number of matching groups in the canonical group list
/// (27 suited + 4 winds + 3 dragons + flowers + seasons)
pub const CANONICAL_GROUPS: usize = 36;

/// Width and height of a tile footprint in half-tile units
pub const TILE_SPAN: i16 = 2;

/// Largest absolute `x` or `y` a board position may use
pub const MAX_COORD: i16 = 1024;

/// Maximum number of moves kept on the undo stack
pub const DEFAULT_UNDO_DEPTH: usize = 256;

/// Bounded retries for a shuffle before it reports failure
pub const DEFAULT_SHUFFLE_ATTEMPTS: u32 = 64;

/// Bounded re-deals during session setup
pub const DEFAULT_DEAL_ATTEMPTS: u32 = 8;

/// Base points for a successful match
pub const BASE_MATCH_SCORE: u32 = 10;

/// A match within this window of the previous one earns the quick bonus
pub const QUICK_MATCH_WINDOW_MS: u64 = 3_000;

/// Bonus points for a quick match
pub const QUICK_MATCH_BONUS: u32 = 5;

/// Bonus points per step of an unbroken match streak
pub const STREAK_BONUS: u32 = 2;

/// Upper bound on players in a multiplayer session
pub const MAX_PLAYERS: u8 = 8;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_deck_defaults() {
        assert_eq!(STANDARD_DECK_SIZE as usize, CANONICAL_GROUPS * DEFAULT_MULTIPLICITY as usize);
        assert_eq!(TILE_SPAN, 2);
        assert!(DEFAULT_SHUFFLE_ATTEMPTS > 0);
    }

    #[test]
    fn face_labels() {
        assert_eq!(TileFace::new(Suit::Characters, 9).label(), "characters-9");
        assert_eq!(TileFace::new(Suit::Wind, 4).label(), "wind-N");
        assert_eq!(TileFace::new(Suit::Dragon, 1).label(), "dragon-red");
        assert_eq!(TileFace::new(Suit::Season, 2).label(), "season-2");
    }

    #[test]
    fn position_geometry() {
        let a = Position::new(0, 4, 4);
        assert!(Position::new(1, 3, 5).covers(&a));
        assert!(!Position::new(1, 6, 4).covers(&a));
        assert!(!Position::new(0, 4, 4).covers(&a));

        assert!(Position::new(0, 2, 5).is_left_of(&a));
        assert!(Position::new(0, 6, 3).is_right_of(&a));
        assert!(!Position::new(0, 6, 6).is_right_of(&a));
        assert!(!Position::new(1, 6, 4).is_right_of(&a));
    }

    #[test]
    fn extreme_positions_do_not_overflow() {
        let far = Position::new(0, i16::MAX, i16::MIN);
        let near = Position::new(0, i16::MIN, i16::MAX);
        assert!(!far.overlaps(&near));
        assert!(!far.is_left_of(&near));
        assert!(!near.is_right_of(&far));
        assert_eq!(far.footprint()[3], (i16::MAX as i32 + 1, i16::MIN as i32 + 1));
        assert!(!far.in_bounds());
        assert!(Position::new(3, -MAX_COORD, MAX_COORD).in_bounds());
    }
}

/// Stable tile identity, assigned in deck order and never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileId(pub u16);

impl TileId {
    /// Index into per-tile tables
    #[inline(always)]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Multiplayer participant identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// Tile suits
///
/// - **Bamboo / Characters / Circles**: suited tiles, values 1-9
/// - **Wind**: 1 = East, 2 = South, 3 = West, 4 = North
/// - **Dragon**: 1 = Red, 2 = Green, 3 = White
/// - **Flower / Season**: bonus tiles, values 1-4, each face unique
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Suit {
    Bamboo,
    Characters,
    Circles,
    Wind,
    Dragon,
    Flower,
    Season,
}

impl Suit {
    /// All suits in canonical deck order
    pub const ALL: [Suit; 7] = [
        Suit::Bamboo,
        Suit::Characters,
        Suit::Circles,
        Suit::Wind,
        Suit::Dragon,
        Suit::Flower,
        Suit::Season,
    ];

    /// Parse suit from string (case-insensitive)
    ///
    /// # Examples
    ///
    /// ```
    /// use tile_match_types::Suit;
    ///
    /// assert_eq!(Suit::from_str("bamboo"), Some(Suit::Bamboo));
    /// assert_eq!(Suit::from_str("Dragon"), Some(Suit::Dragon));
    /// assert_eq!(Suit::from_str("joker"), None);
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "bamboo" => Some(Suit::Bamboo),
            "characters" => Some(Suit::Characters),
            "circles" => Some(Suit::Circles),
            "wind" => Some(Suit::Wind),
            "dragon" => Some(Suit::Dragon),
            "flower" => Some(Suit::Flower),
            "season" => Some(Suit::Season),
            _ => None,
        }
    }

    /// Convert to lowercase string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Suit::Bamboo => "bamboo",
            Suit::Characters => "characters",
            Suit::Circles => "circles",
            Suit::Wind => "wind",
            Suit::Dragon => "dragon",
            Suit::Flower => "flower",
            Suit::Season => "season",
        }
    }

    /// Highest face value in this suit (values start at 1)
    pub fn max_value(&self) -> u8 {
        match self {
            Suit::Bamboo | Suit::Characters | Suit::Circles => 9,
            Suit::Wind | Suit::Flower | Suit::Season => 4,
            Suit::Dragon => 3,
        }
    }

    /// Bonus suits hold one-of-a-kind faces that only match through a wildcard rule
    pub fn is_bonus(&self) -> bool {
        matches!(self, Suit::Flower | Suit::Season)
    }
}

/// The printed face of a tile: abstract suit and value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileFace {
    pub suit: Suit,
    pub value: u8,
}

impl TileFace {
    pub fn new(suit: Suit, value: u8) -> Self {
        Self { suit, value }
    }

    /// Whether `value` lies in `1..=suit.max_value()`
    pub fn is_valid(&self) -> bool {
        self.value >= 1 && self.value <= self.suit.max_value()
    }

    /// Human-readable label, also the textual match key (`"bamboo-3"`, `"wind-N"`)
    pub fn label(&self) -> String {
        match self.suit {
            Suit::Wind => {
                let dir = match self.value {
                    1 => "E",
                    2 => "S",
                    3 => "W",
                    4 => "N",
                    _ => "?",
                };
                format!("wind-{dir}")
            }
            Suit::Dragon => {
                let color = match self.value {
                    1 => "red",
                    2 => "green",
                    3 => "white",
                    _ => "?",
                };
                format!("dragon-{color}")
            }
            _ => format!("{}-{}", self.suit.as_str(), self.value),
        }
    }
}

impl fmt::Display for TileFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Derived identity shared by exactly the tiles that may be removed together
/// under the strict rule. Bonus faces each get a unique key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MatchKey {
    pub suit: Suit,
    pub value: u8,
}

impl From<TileFace> for MatchKey {
    fn from(face: TileFace) -> Self {
        Self {
            suit: face.suit,
            value: face.value,
        }
    }
}

impl fmt::Display for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        TileFace::new(self.suit, self.value).fmt(f)
    }
}

/// Board coordinate: stacking layer plus half-tile grid position
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub layer: u8,
    pub x: i16,
    pub y: i16,
}

impl Position {
    pub const fn new(layer: u8, x: i16, y: i16) -> Self {
        Self { layer, x, y }
    }

    /// Whether both coordinates lie within `MAX_COORD`
    #[inline]
    pub fn in_bounds(&self) -> bool {
        self.x.unsigned_abs() <= MAX_COORD as u16 && self.y.unsigned_abs() <= MAX_COORD as u16
    }

    /// Whether the two footprints share at least one unit cell (ignores layer)
    #[inline]
    pub fn overlaps(&self, other: &Position) -> bool {
        span(self.x, other.x) < TILE_SPAN as i32 && span(self.y, other.y) < TILE_SPAN as i32
    }

    /// `self` sits on a higher layer and overlaps `other`'s footprint
    #[inline]
    pub fn covers(&self, other: &Position) -> bool {
        self.layer > other.layer && self.overlaps(other)
    }

    /// `self` is a same-layer neighbour touching `other`'s left edge
    #[inline]
    pub fn is_left_of(&self, other: &Position) -> bool {
        self.layer == other.layer
            && self.x as i32 == other.x as i32 - TILE_SPAN as i32
            && span(self.y, other.y) < TILE_SPAN as i32
    }

    /// `self` is a same-layer neighbour touching `other`'s right edge
    #[inline]
    pub fn is_right_of(&self, other: &Position) -> bool {
        self.layer == other.layer
            && self.x as i32 == other.x as i32 + TILE_SPAN as i32
            && span(self.y, other.y) < TILE_SPAN as i32
    }

    /// The four unit cells of this tile's footprint
    pub fn footprint(&self) -> [(i32, i32); 4] {
        let (x, y) = (self.x as i32, self.y as i32);
        [(x, y), (x + 1, y), (x, y + 1), (x + 1, y + 1)]
    }
}

#[inline]
fn span(a: i16, b: i16) -> i32 {
    (a as i32 - b as i32).abs()
}

/// Session mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SessionMode {
    Solitaire,
    Multiplayer { players: u8 },
}

impl SessionMode {
    pub fn is_multiplayer(&self) -> bool {
        matches!(self, SessionMode::Multiplayer { .. })
    }

    /// Number of player seats (zero in solitaire)
    pub fn seats(&self) -> u8 {
        match self {
            SessionMode::Solitaire => 0,
            SessionMode::Multiplayer { players } => *players,
        }
    }
}

impl Default for SessionMode {
    fn default() -> Self {
        Self::Solitaire
    }
}

/// Session lifecycle phase
///
/// `Stalemate` is non-terminal: it only reports that no free matching pair
/// exists right now. Play, shuffle and abandon are all still available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Setup,
    Playing,
    Paused,
    Stalemate,
    Won,
    Ended,
}

impl Phase {
    /// Convert to snake_case string
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Setup => "setup",
            Phase::Playing => "playing",
            Phase::Paused => "paused",
            Phase::Stalemate => "stalemate",
            Phase::Won => "won",
            Phase::Ended => "ended",
        }
    }

    /// Whether tiles may currently be selected or matched
    pub fn accepts_play(&self) -> bool {
        matches!(self, Phase::Playing | Phase::Stalemate)
    }
}
