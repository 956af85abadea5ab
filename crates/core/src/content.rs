//! Content module - display references for tile faces
//!
//! The engine never renders anything. It asks a [`ContentProvider`] once per
//! tile, at deck construction, for an opaque primary reference (an image URL, a
//! sprite name, a glyph) plus a fallback. When the provider has nothing to say
//! the engine substitutes [`ContentRefs::placeholder`], so deck construction can
//! never fail or block on content.

use serde::{Deserialize, Serialize};

use crate::types::{Suit, TileFace};

/// Resolved display references for one face
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentRefs {
    pub primary: String,
    pub fallback: String,
}

impl ContentRefs {
    pub fn new(primary: impl Into<String>, fallback: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            fallback: fallback.into(),
        }
    }

    /// Always-available reference used when a provider fails: `tile:<label>`
    pub fn placeholder(face: TileFace) -> Self {
        let label = format!("tile:{}", face.label());
        Self {
            primary: label.clone(),
            fallback: label,
        }
    }
}

/// External collaborator mapping abstract faces to display content
pub trait ContentProvider {
    /// Resolve a face; `None` means the lookup failed
    fn resolve_content(&self, face: TileFace) -> Option<ContentRefs>;
}

/// Resolve through `provider`, falling back to the placeholder contract
pub fn resolve_or_placeholder(provider: &dyn ContentProvider, face: TileFace) -> ContentRefs {
    match provider.resolve_content(face) {
        Some(refs) if !refs.primary.is_empty() => {
            if refs.fallback.is_empty() {
                ContentRefs {
                    fallback: ContentRefs::placeholder(face).fallback,
                    ..refs
                }
            } else {
                refs
            }
        }
        _ => {
            tracing::debug!(face = %face, "content provider had no entry, using placeholder");
            ContentRefs::placeholder(face)
        }
    }
}

/// Provider that always defers to the placeholder
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderContent;

impl ContentProvider for PlaceholderContent {
    fn resolve_content(&self, _face: TileFace) -> Option<ContentRefs> {
        None
    }
}

/// Unicode mahjong glyphs (U+1F000 block) with the text label as fallback
#[derive(Debug, Clone, Copy, Default)]
pub struct GlyphContent;

impl GlyphContent {
    /// Glyph for a face, if the face is valid
    pub fn glyph(face: TileFace) -> Option<char> {
        if !face.is_valid() {
            return None;
        }
        let offset = (face.value - 1) as u32;
        let base = match face.suit {
            Suit::Wind => 0x1F000,
            Suit::Dragon => 0x1F004,
            Suit::Characters => 0x1F007,
            Suit::Bamboo => 0x1F010,
            Suit::Circles => 0x1F019,
            Suit::Flower => 0x1F022,
            Suit::Season => 0x1F026,
        };
        char::from_u32(base + offset)
    }
}

impl ContentProvider for GlyphContent {
    fn resolve_content(&self, face: TileFace) -> Option<ContentRefs> {
        Self::glyph(face).map(|g| ContentRefs::new(g.to_string(), face.label()))
    }
}
