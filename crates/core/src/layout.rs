//! Layout module - named board patterns mapped to stacked positions
//!
//! Patterns produce cells bottom layer first, row by row. Coordinates are in
//! half-tile units (see [`Position`]), which lets the turtle offset its end
//! pieces and crown by half a tile.
//!
//! # Count policy
//!
//! When a pattern has more cells than requested tiles, the cell list is
//! truncated from the end. Because cells are ordered bottom layer first, this
//! strips the highest layers before anything they rest on, so no tile is ever
//! left floating. A pattern with fewer cells than requested, or an odd request,
//! is a `LayoutMismatch`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::types::{Position, MAX_COORD, TILE_SPAN};

/// Named, deterministic board pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutPattern {
    /// Classic five-layer turtle, 144 cells
    Turtle,
    /// Four square layers stepping in by one tile, 120 cells
    Pyramid,
    /// One layer of 18 x 8 tiles, 144 cells
    Flat,
}

impl LayoutPattern {
    /// Parse pattern from string (case-insensitive)
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "turtle" => Some(LayoutPattern::Turtle),
            "pyramid" => Some(LayoutPattern::Pyramid),
            "flat" => Some(LayoutPattern::Flat),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutPattern::Turtle => "turtle",
            LayoutPattern::Pyramid => "pyramid",
            LayoutPattern::Flat => "flat",
        }
    }

    /// All cells of the pattern, bottom layer first
    pub fn cells(&self) -> Vec<Position> {
        match self {
            LayoutPattern::Turtle => turtle_cells(),
            LayoutPattern::Pyramid => pyramid_cells(),
            LayoutPattern::Flat => grid(0, 0, 0, 18, 8),
        }
    }

    pub fn capacity(&self) -> usize {
        self.cells().len()
    }
}

impl Default for LayoutPattern {
    fn default() -> Self {
        Self::Turtle
    }
}

/// A `cols x rows` block of whole tiles starting at `(x0, y0)`
fn grid(layer: u8, x0: i16, y0: i16, cols: i16, rows: i16) -> Vec<Position> {
    let mut out = Vec::with_capacity((cols * rows) as usize);
    for row in 0..rows {
        for col in 0..cols {
            out.push(Position::new(
                layer,
                x0 + col * TILE_SPAN,
                y0 + row * TILE_SPAN,
            ));
        }
    }
    out
}

fn row(layer: u8, y: i16, x_from: i16, x_to: i16) -> impl Iterator<Item = Position> {
    (x_from..=x_to)
        .step_by(TILE_SPAN as usize)
        .map(move |x| Position::new(layer, x, y))
}

fn turtle_cells() -> Vec<Position> {
    let mut cells = Vec::with_capacity(144);

    // Layer 0: 84 body tiles, one left end piece and two right end pieces.
    cells.extend(row(0, 0, 2, 24));
    cells.extend(row(0, 2, 6, 20));
    cells.extend(row(0, 4, 4, 22));
    cells.extend(row(0, 6, 2, 24));
    cells.push(Position::new(0, 0, 7));
    cells.extend(row(0, 8, 2, 24));
    cells.push(Position::new(0, 26, 7));
    cells.push(Position::new(0, 28, 7));
    cells.extend(row(0, 10, 4, 22));
    cells.extend(row(0, 12, 6, 20));
    cells.extend(row(0, 14, 2, 24));

    cells.extend(grid(1, 8, 2, 6, 6));
    cells.extend(grid(2, 10, 4, 4, 4));
    cells.extend(grid(3, 12, 6, 2, 2));

    // Crown, offset by half a tile so it rests on all four layer-3 tiles.
    cells.push(Position::new(4, 13, 7));

    cells
}

fn pyramid_cells() -> Vec<Position> {
    let mut cells = Vec::with_capacity(120);
    for layer in 0..4u8 {
        let inset = layer as i16 * TILE_SPAN;
        let side = 8 - 2 * layer as i16;
        cells.extend(grid(layer, inset, inset, side, side));
    }
    cells
}

/// Positions for exactly `count` tiles using `pattern`
///
/// # Examples
///
/// ```
/// use tile_match_core::layout::{place, LayoutPattern};
///
/// let positions = place(LayoutPattern::Turtle, 144).unwrap();
/// assert_eq!(positions.len(), 144);
///
/// // Smaller decks drop the top layers first.
/// let low = place(LayoutPattern::Turtle, 72).unwrap();
/// assert!(low.iter().all(|p| p.layer == 0));
///
/// assert!(place(LayoutPattern::Pyramid, 144).is_err());
/// ```
pub fn place(pattern: LayoutPattern, count: usize) -> Result<Vec<Position>, SessionError> {
    let mut cells = pattern.cells();
    let available = cells.len();

    if count == 0 || count % 2 != 0 || count > available {
        return Err(SessionError::LayoutMismatch {
            pattern: pattern.as_str().to_string(),
            requested: count,
            available,
        });
    }

    cells.truncate(count);
    tracing::debug!(
        pattern = pattern.as_str(),
        count,
        dropped = available - count,
        "placed layout"
    );
    Ok(cells)
}

/// Structural check shared by layout generation and snapshot restore:
/// coordinates within `MAX_COORD`, unique positions, no same-layer overlap,
/// every raised tile fully supported.
pub fn validate_layout(positions: &[Position]) -> Result<(), String> {
    let mut seen = HashSet::with_capacity(positions.len());
    for p in positions {
        if !p.in_bounds() {
            return Err(format!("position {:?} lies outside +/-{}", p, MAX_COORD));
        }
        if !seen.insert(*p) {
            return Err(format!("duplicate position {:?}", p));
        }
    }

    for (i, a) in positions.iter().enumerate() {
        for b in &positions[i + 1..] {
            if a.layer == b.layer && a.overlaps(b) {
                return Err(format!("positions {:?} and {:?} overlap", a, b));
            }
        }
    }

    let mut cells_by_layer: Vec<HashSet<(i32, i32)>> = Vec::new();
    for p in positions {
        let layer = p.layer as usize;
        if cells_by_layer.len() <= layer {
            cells_by_layer.resize_with(layer + 1, HashSet::new);
        }
        cells_by_layer[layer].extend(p.footprint());
    }

    for p in positions.iter().filter(|p| p.layer > 0) {
        let below = &cells_by_layer[p.layer as usize - 1];
        if let Some(cell) = p.footprint().iter().find(|c| !below.contains(c)) {
            return Err(format!("position {:?} floats over unit cell {:?}", p, cell));
        }
    }

    Ok(())
}
