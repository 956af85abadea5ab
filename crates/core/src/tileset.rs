//! Tileset module - deck construction from a tile-count profile
//!
//! The canonical group list holds 36 matching groups in a fixed order:
//! bamboo 1-9, characters 1-9, circles 1-9, the four winds, the three dragons,
//! then the flower and season groups. A profile takes the first
//! `total / multiplicity` groups. Ordinary groups are `multiplicity` identical
//! copies; bonus groups are `multiplicity` distinct faces that only match each
//! other through the wildcard rule.

use serde::{Deserialize, Serialize};

use crate::content::{resolve_or_placeholder, ContentProvider, ContentRefs};
use crate::error::SessionError;
use crate::types::{
    MatchKey, Suit, TileFace, TileId, CANONICAL_GROUPS, DEFAULT_MULTIPLICITY, STANDARD_DECK_SIZE,
};

/// Everything that moves when a tile is shuffled: the face and its display references
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileContent {
    pub face: TileFace,
    pub refs: ContentRefs,
}

/// A tile in play. The id is permanent; the content may be reassigned by a shuffle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub id: TileId,
    pub content: TileContent,
}

impl Tile {
    pub fn face(&self) -> TileFace {
        self.content.face
    }

    pub fn match_key(&self) -> MatchKey {
        MatchKey::from(self.content.face)
    }
}

/// Named tile-count profile
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileProfile {
    pub name: String,
    pub total: u16,
    pub multiplicity: u8,
}

impl TileProfile {
    pub fn new(name: impl Into<String>, total: u16, multiplicity: u8) -> Self {
        Self {
            name: name.into(),
            total,
            multiplicity,
        }
    }

    /// Classic 144-tile deck: 36 groups of 4
    pub fn standard() -> Self {
        Self::new("standard", STANDARD_DECK_SIZE, DEFAULT_MULTIPLICITY)
    }

    /// Look up a built-in profile by name (case-insensitive)
    ///
    /// # Examples
    ///
    /// ```
    /// use tile_match_core::tileset::TileProfile;
    ///
    /// assert_eq!(TileProfile::named("standard").unwrap().total, 144);
    /// assert_eq!(TileProfile::named("Pairs").unwrap().multiplicity, 2);
    /// assert!(TileProfile::named("huge").is_none());
    /// ```
    pub fn named(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "standard" => Some(Self::standard()),
            "medium" => Some(Self::new("medium", 120, 4)),
            "small" => Some(Self::new("small", 72, 4)),
            "pairs" => Some(Self::new("pairs", 72, 2)),
            _ => None,
        }
    }

    /// Number of matching groups this profile draws from the canonical list
    pub fn group_count(&self) -> usize {
        if self.multiplicity == 0 {
            return 0;
        }
        self.total as usize / self.multiplicity as usize
    }

    /// Check that the profile can be built from its multiplicity
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.total == 0 {
            return Err(SessionError::InvalidProfile(format!(
                "profile `{}` has no tiles",
                self.name
            )));
        }
        if self.total % 2 != 0 {
            return Err(SessionError::InvalidProfile(format!(
                "profile `{}` has an odd tile count ({})",
                self.name, self.total
            )));
        }
        if self.multiplicity == 0 || self.multiplicity % 2 != 0 {
            return Err(SessionError::InvalidProfile(format!(
                "profile `{}` needs an even, non-zero multiplicity (got {})",
                self.name, self.multiplicity
            )));
        }
        if self.total % self.multiplicity as u16 != 0 {
            return Err(SessionError::InvalidProfile(format!(
                "profile `{}`: {} tiles do not split into groups of {}",
                self.name, self.total, self.multiplicity
            )));
        }
        if self.group_count() > CANONICAL_GROUPS {
            return Err(SessionError::InvalidProfile(format!(
                "profile `{}` needs {} groups, only {} exist",
                self.name,
                self.group_count(),
                CANONICAL_GROUPS
            )));
        }
        Ok(())
    }
}

impl Default for TileProfile {
    fn default() -> Self {
        Self::standard()
    }
}

/// One entry of the canonical group list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Group {
    /// `multiplicity` identical copies of one face
    Same(TileFace),
    /// `multiplicity` distinct faces of a bonus suit
    Bonus(Suit),
}

fn canonical_groups() -> Vec<Group> {
    let mut groups = Vec::with_capacity(CANONICAL_GROUPS);
    for suit in Suit::ALL {
        if suit.is_bonus() {
            groups.push(Group::Bonus(suit));
        } else {
            for value in 1..=suit.max_value() {
                groups.push(Group::Same(TileFace::new(suit, value)));
            }
        }
    }
    groups
}

/// Faces of the deck in group order, without content resolution
pub fn deck_faces(profile: &TileProfile) -> Result<Vec<TileFace>, SessionError> {
    profile.validate()?;

    let copies = profile.multiplicity as usize;
    let mut faces = Vec::with_capacity(profile.total as usize);
    for group in canonical_groups().into_iter().take(profile.group_count()) {
        match group {
            Group::Same(face) => faces.extend(std::iter::repeat(face).take(copies)),
            Group::Bonus(suit) => {
                let max = suit.max_value() as usize;
                faces.extend((0..copies).map(|i| TileFace::new(suit, (i % max) as u8 + 1)));
            }
        }
    }
    Ok(faces)
}

/// Build the full deck for `profile`
///
/// Ids are assigned `0..total` in group order; each face is resolved through
/// `provider` exactly once, with the placeholder as fallback.
pub fn generate_deck(
    profile: &TileProfile,
    provider: &dyn ContentProvider,
) -> Result<Vec<Tile>, SessionError> {
    let faces = deck_faces(profile)?;

    let mut resolved: Vec<(TileFace, ContentRefs)> = Vec::new();
    let deck = faces
        .into_iter()
        .enumerate()
        .map(|(i, face)| {
            let refs = match resolved.iter().find(|(f, _)| *f == face) {
                Some((_, refs)) => refs.clone(),
                None => {
                    let refs = resolve_or_placeholder(provider, face);
                    resolved.push((face, refs.clone()));
                    refs
                }
            };
            Tile {
                id: TileId(i as u16),
                content: TileContent { face, refs },
            }
        })
        .collect::<Vec<_>>();

    tracing::debug!(profile = %profile.name, tiles = deck.len(), "generated deck");
    Ok(deck)
}
