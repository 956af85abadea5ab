//! Core engine module - pure, deterministic, and testable
//!
//! This crate contains all puzzle rules, state management and the session
//! lifecycle. It has **no dependencies** on rendering, networking or I/O:
//!
//! - **Deterministic**: the same config and seed deal the same board
//! - **Testable**: every rule is a plain function over plain data
//! - **Portable**: sessions are owned values with no global state
//!
//! # Module Structure
//!
//! - [`tileset`]: deck construction from a tile-count profile
//! - [`layout`]: named patterns mapped to stacked positions
//! - [`board`]: tile bindings and the incremental occupancy index
//! - [`matching`]: match classes, wildcard rules and `try_match`
//! - [`scoring`]: pluggable award policies
//! - [`shuffle`]: retrying and solvable (reverse construction) shuffles
//! - [`history`]: bounded undo/redo
//! - [`turn`]: multiplayer turn ownership and sequencing
//! - [`content`]: content provider contract and placeholder fallback
//! - [`game_state`]: the session state machine
//! - [`snapshot`]: serializable session state and restore validation
//!
//! # Rules
//!
//! - A tile is **free** when nothing unmatched rests on it and at least one of
//!   its left/right sides is open
//! - Two free tiles match when their faces share a match class
//! - Matched tiles leave play but keep their position for undo
//! - A shuffle moves contents, never positions
//!
//! # Example
//!
//! ```
//! use tile_match_core::{GameSession, GlyphContent, Selection, SessionConfig};
//! use tile_match_core::types::Phase;
//!
//! let mut session = GameSession::new(SessionConfig::solitaire(42), &GlyphContent).unwrap();
//! session.start().unwrap();
//! assert_eq!(session.phase(), Phase::Playing);
//!
//! let (a, b) = session.hint().unwrap();
//! assert_eq!(session.select_tile(a).unwrap(), Selection::Pending(a));
//! assert!(matches!(session.select_tile(b).unwrap(), Selection::Matched(_)));
//! assert!(session.score() > 0);
//!
//! session.undo().unwrap();
//! assert_eq!(session.score(), 0);
//! ```

pub mod board;
pub mod content;
pub mod error;
pub mod game_state;
pub mod history;
pub mod layout;
pub mod matching;
pub mod rng;
pub mod scoring;
pub mod shuffle;
pub mod snapshot;
pub mod tileset;
pub mod turn;

pub use tile_match_types as types;

// Re-export commonly used types for convenience
pub use board::{Board, OccupancyIndex};
pub use content::{ContentProvider, ContentRefs, GlyphContent, PlaceholderContent};
pub use error::{SelectionFault, SessionError};
pub use game_state::{GameSession, Selection, SessionConfig};
pub use history::{Move, MoveHistory};
pub use layout::{place, LayoutPattern};
pub use matching::{try_match, unpaired_class, MatchClass, MatchOutcome, MatchRules};
pub use rng::SimpleRng;
pub use scoring::{FlatScoring, MatchContext, ScorePolicy, ScoringRule, StandardScoring};
pub use shuffle::{shuffle, ShuffleReport, ShuffleStrategy};
pub use snapshot::{SessionSnapshot, SNAPSHOT_VERSION};
pub use tileset::{generate_deck, Tile, TileContent, TileProfile};
pub use turn::{Player, TurnCoordinator};
