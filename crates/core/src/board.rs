//! Board module - tile bindings and the occupancy index
//!
//! The board binds every tile id to one fixed [`Position`] and tracks which
//! tiles have been matched. Freedom is answered by an [`OccupancyIndex`] built
//! once from the positions:
//!
//! - per tile, the tiles it covers and its left/right neighbours are
//!   precomputed
//! - per tile, counters hold how many *unmatched* tiles cover it and sit on
//!   each side
//!
//! Matching or un-matching a tile only touches the counters of its own
//! neighbourhood, so `is_free` is O(1) and updates are O(neighbours).

use std::collections::{BTreeMap, HashMap};

use arrayvec::ArrayVec;

use crate::layout::validate_layout;
use crate::matching::{MatchClass, MatchRules};
use crate::tileset::{Tile, TileContent};
use crate::types::{Position, TileId};

/// Precomputed neighbourhood of one tile
#[derive(Debug, Clone, PartialEq, Eq)]
struct Links {
    /// Tiles on lower layers whose footprint this tile overlaps
    covers: Vec<TileId>,
    /// Same-layer tiles touching the left edge (at most two, half-offset rows)
    left: ArrayVec<TileId, 2>,
    /// Same-layer tiles touching the right edge
    right: ArrayVec<TileId, 2>,
}

/// Incremental free-tile index over a fixed set of positions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyIndex {
    links: Vec<Links>,
    removed: Vec<bool>,
    covered_by: Vec<u16>,
    left_blockers: Vec<u8>,
    right_blockers: Vec<u8>,
}

impl OccupancyIndex {
    /// Build the index for `positions`, all occupied
    ///
    /// Positions must already be structurally valid (no same-layer overlap),
    /// which bounds each lateral side to two neighbours.
    pub fn new(positions: &[Position]) -> Result<Self, String> {
        let n = positions.len();
        let mut links: Vec<Links> = (0..n)
            .map(|_| Links {
                covers: Vec::new(),
                left: ArrayVec::new(),
                right: ArrayVec::new(),
            })
            .collect();

        for (i, a) in positions.iter().enumerate() {
            for (j, b) in positions.iter().enumerate() {
                if i == j {
                    continue;
                }
                let other = TileId(j as u16);
                if a.covers(b) {
                    links[i].covers.push(other);
                }
                if b.is_left_of(a) && links[i].left.try_push(other).is_err() {
                    return Err(format!("position {:?} has more than two left neighbours", a));
                }
                if b.is_right_of(a) && links[i].right.try_push(other).is_err() {
                    return Err(format!("position {:?} has more than two right neighbours", a));
                }
            }
        }

        let mut covered_by = vec![0u16; n];
        for link in &links {
            for below in &link.covers {
                covered_by[below.index()] += 1;
            }
        }
        let left_blockers = links.iter().map(|l| l.left.len() as u8).collect();
        let right_blockers = links.iter().map(|l| l.right.len() as u8).collect();

        Ok(Self {
            links,
            removed: vec![false; n],
            covered_by,
            left_blockers,
            right_blockers,
        })
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    #[inline]
    pub fn is_removed(&self, id: TileId) -> bool {
        self.removed.get(id.index()).copied().unwrap_or(true)
    }

    /// Occupied, nothing on top, and at least one lateral side open
    #[inline]
    pub fn is_free(&self, id: TileId) -> bool {
        let i = id.index();
        if self.is_removed(id) {
            return false;
        }
        self.covered_by[i] == 0 && (self.left_blockers[i] == 0 || self.right_blockers[i] == 0)
    }

    /// Take a tile out of the index; no-op when already removed
    pub fn remove(&mut self, id: TileId) {
        if self.is_removed(id) {
            return;
        }
        let i = id.index();
        self.removed[i] = true;
        let link = &self.links[i];
        for below in &link.covers {
            self.covered_by[below.index()] -= 1;
        }
        // A tile on our right sees us as its left neighbour, and vice versa.
        for r in &link.right {
            self.left_blockers[r.index()] -= 1;
        }
        for l in &link.left {
            self.right_blockers[l.index()] -= 1;
        }
    }

    /// Put a removed tile back; no-op when already present
    pub fn restore(&mut self, id: TileId) {
        let i = id.index();
        if i >= self.removed.len() || !self.removed[i] {
            return;
        }
        self.removed[i] = false;
        let link = &self.links[i];
        for below in &link.covers {
            self.covered_by[below.index()] += 1;
        }
        for r in &link.right {
            self.left_blockers[r.index()] += 1;
        }
        for l in &link.left {
            self.right_blockers[l.index()] += 1;
        }
    }

    /// All free tiles in ascending id order
    pub fn free_ids(&self) -> Vec<TileId> {
        (0..self.links.len())
            .map(|i| TileId(i as u16))
            .filter(|&id| self.is_free(id))
            .collect()
    }
}

/// The full set of tile/position bindings plus the matched set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    tiles: Vec<Tile>,
    positions: Vec<Position>,
    matched: Vec<bool>,
    matched_count: usize,
    by_position: HashMap<Position, TileId>,
    index: OccupancyIndex,
}

impl Board {
    /// Bind `tiles[i]` to `positions[i]`, all tiles unmatched
    ///
    /// Tile ids must equal their index, and positions must pass
    /// [`validate_layout`].
    pub fn new(tiles: Vec<Tile>, positions: Vec<Position>) -> Result<Self, String> {
        if tiles.len() != positions.len() {
            return Err(format!(
                "{} tiles but {} positions",
                tiles.len(),
                positions.len()
            ));
        }
        if tiles.len() > u16::MAX as usize {
            return Err(format!("{} tiles exceed the id space", tiles.len()));
        }
        if let Some((i, tile)) = tiles
            .iter()
            .enumerate()
            .find(|(i, t)| t.id.index() != *i)
        {
            return Err(format!("tile {} stored at index {}", tile.id, i));
        }
        validate_layout(&positions)?;

        let index = OccupancyIndex::new(&positions)?;
        let by_position = positions
            .iter()
            .enumerate()
            .map(|(i, p)| (*p, TileId(i as u16)))
            .collect();

        Ok(Self {
            matched: vec![false; tiles.len()],
            matched_count: 0,
            tiles,
            positions,
            by_position,
            index,
        })
    }

    /// Total tiles, matched or not
    pub fn total(&self) -> usize {
        self.tiles.len()
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn tile(&self, id: TileId) -> Option<&Tile> {
        self.tiles.get(id.index())
    }

    pub fn position(&self, id: TileId) -> Option<Position> {
        self.positions.get(id.index()).copied()
    }

    /// Tile bound to `position`, matched or not
    pub fn tile_at(&self, position: Position) -> Option<TileId> {
        self.by_position.get(&position).copied()
    }

    pub fn is_matched(&self, id: TileId) -> bool {
        self.matched.get(id.index()).copied().unwrap_or(false)
    }

    pub fn matched_count(&self) -> usize {
        self.matched_count
    }

    /// Unmatched tiles left on the board
    pub fn remaining(&self) -> usize {
        self.total() - self.matched_count
    }

    pub fn is_cleared(&self) -> bool {
        self.matched_count == self.total()
    }

    /// Matched ids in ascending order
    pub fn matched_ids(&self) -> Vec<TileId> {
        self.ids().filter(|&id| self.is_matched(id)).collect()
    }

    /// Unmatched ids in ascending order
    pub fn unmatched_ids(&self) -> Vec<TileId> {
        self.ids().filter(|&id| !self.is_matched(id)).collect()
    }

    fn ids(&self) -> impl Iterator<Item = TileId> {
        (0..self.tiles.len()).map(|i| TileId(i as u16))
    }

    pub fn occupancy(&self) -> &OccupancyIndex {
        &self.index
    }

    #[inline]
    pub fn is_free(&self, id: TileId) -> bool {
        self.index.is_free(id)
    }

    /// Free tiles in ascending id order
    pub fn free_tiles(&self) -> Vec<TileId> {
        self.index.free_ids()
    }

    /// Free tiles grouped by match class, in class order
    fn free_by_class(&self, rules: &MatchRules) -> BTreeMap<MatchClass, Vec<TileId>> {
        let mut groups: BTreeMap<MatchClass, Vec<TileId>> = BTreeMap::new();
        for id in self.free_tiles() {
            groups
                .entry(rules.class_of(self.tiles[id.index()].face()))
                .or_default()
                .push(id);
        }
        groups
    }

    /// Every pair of free tiles that could be matched right now
    pub fn free_pairs(&self, rules: &MatchRules) -> Vec<(TileId, TileId)> {
        let mut pairs = Vec::new();
        for ids in self.free_by_class(rules).values() {
            for (i, &a) in ids.iter().enumerate() {
                for &b in &ids[i + 1..] {
                    pairs.push((a, b));
                }
            }
        }
        pairs
    }

    /// A deterministic matchable pair, if any
    pub fn hint(&self, rules: &MatchRules) -> Option<(TileId, TileId)> {
        self.free_by_class(rules)
            .into_values()
            .filter(|ids| ids.len() >= 2)
            .map(|ids| (ids[0], ids[1]))
            .min()
    }

    pub fn has_free_pair(&self, rules: &MatchRules) -> bool {
        self.free_by_class(rules).values().any(|ids| ids.len() >= 2)
    }

    /// Retire a tile; no-op when already matched
    pub(crate) fn set_matched(&mut self, id: TileId) {
        if let Some(flag) = self.matched.get_mut(id.index()) {
            if !*flag {
                *flag = true;
                self.matched_count += 1;
                self.index.remove(id);
            }
        }
    }

    /// Return a retired tile to its position; no-op when unmatched
    pub(crate) fn set_unmatched(&mut self, id: TileId) {
        if let Some(flag) = self.matched.get_mut(id.index()) {
            if *flag {
                *flag = false;
                self.matched_count -= 1;
                self.index.restore(id);
            }
        }
    }

    /// Reassign the content held at `id`'s position
    pub(crate) fn set_content(&mut self, id: TileId, content: TileContent) {
        if let Some(tile) = self.tiles.get_mut(id.index()) {
            tile.content = content;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentRefs;
    use crate::layout::{place, LayoutPattern};
    use crate::types::{Suit, TileFace};

    fn tiles(n: usize) -> Vec<Tile> {
        (0..n)
            .map(|i| {
                let face = TileFace::new(Suit::Circles, (i / 2 % 9) as u8 + 1);
                Tile {
                    id: TileId(i as u16),
                    content: TileContent {
                        face,
                        refs: ContentRefs::placeholder(face),
                    },
                }
            })
            .collect()
    }

    fn board_at(positions: Vec<Position>) -> Board {
        Board::new(tiles(positions.len()), positions).unwrap()
    }

    #[test]
    fn single_row_only_ends_are_free() {
        let board = board_at((0..5).map(|i| Position::new(0, i * 2, 0)).collect());
        assert_eq!(board.free_tiles(), vec![TileId(0), TileId(4)]);
    }

    #[test]
    fn removing_an_end_frees_its_neighbour() {
        let mut board = board_at((0..4).map(|i| Position::new(0, i * 2, 0)).collect());
        assert!(!board.is_free(TileId(1)));
        board.set_matched(TileId(0));
        assert!(board.is_free(TileId(1)));
        board.set_unmatched(TileId(0));
        assert!(!board.is_free(TileId(1)));
        assert!(board.is_free(TileId(0)));
    }

    #[test]
    fn stacked_tile_blocks_the_one_below() {
        let mut board = board_at(vec![
            Position::new(0, 0, 0),
            Position::new(0, 2, 0),
            Position::new(1, 1, 0),
        ]);
        assert!(!board.is_free(TileId(0)));
        assert!(!board.is_free(TileId(1)));
        assert!(board.is_free(TileId(2)));

        board.set_matched(TileId(2));
        assert!(board.is_free(TileId(0)));
        assert!(board.is_free(TileId(1)));
    }

    #[test]
    fn half_offset_neighbours_block() {
        // Tile 2 sits half a row lower, touching both tile 0 and tile 1's right edges.
        let board = board_at(vec![
            Position::new(0, 0, 0),
            Position::new(0, 0, 2),
            Position::new(0, 2, 1),
            Position::new(0, 4, 1),
        ]);
        assert!(board.is_free(TileId(0)));
        assert!(board.is_free(TileId(1)));
        assert!(!board.is_free(TileId(2)));
        assert!(board.is_free(TileId(3)));
    }

    #[test]
    fn incremental_index_matches_rescan() {
        let positions = place(LayoutPattern::Turtle, 144).unwrap();
        let mut board = board_at(positions.clone());

        // Retire every third tile, then compare against a fresh rescan.
        for i in (0..144).step_by(3) {
            board.set_matched(TileId(i));
        }
        for id in board.unmatched_ids() {
            let pos = positions[id.index()];
            let live = |other: &Position| {
                board
                    .tile_at(*other)
                    .map(|o| !board.is_matched(o))
                    .unwrap_or(false)
            };
            let covered = positions.iter().any(|p| p.covers(&pos) && live(p));
            let left = positions.iter().any(|p| p.is_left_of(&pos) && live(p));
            let right = positions.iter().any(|p| p.is_right_of(&pos) && live(p));
            assert_eq!(board.is_free(id), !covered && (!left || !right), "{}", id);
        }
    }

    #[test]
    fn turtle_start_free_set() {
        let board = board_at(place(LayoutPattern::Turtle, 144).unwrap());
        let free = board.free_tiles();
        let crown = board.tile_at(Position::new(4, 13, 7)).unwrap();
        let left_end = board.tile_at(Position::new(0, 0, 7)).unwrap();
        let right_end = board.tile_at(Position::new(0, 28, 7)).unwrap();
        let inner_end = board.tile_at(Position::new(0, 26, 7)).unwrap();

        assert!(free.contains(&crown));
        assert!(free.contains(&left_end));
        assert!(free.contains(&right_end));
        assert!(!free.contains(&inner_end));

        // Top and bottom rows are open at both ends.
        assert!(free.contains(&board.tile_at(Position::new(0, 2, 0)).unwrap()));
        assert!(free.contains(&board.tile_at(Position::new(0, 24, 14)).unwrap()));
    }

    #[test]
    fn matched_tiles_are_never_free() {
        let mut board = board_at((0..2).map(|i| Position::new(0, i * 4, 0)).collect());
        board.set_matched(TileId(0));
        assert!(!board.is_free(TileId(0)));
        assert_eq!(board.remaining(), 1);
        assert!(!board.is_cleared());
        board.set_matched(TileId(1));
        assert!(board.is_cleared());
    }

    #[test]
    fn pairs_and_hint() {
        let board = board_at((0..4).map(|i| Position::new(0, i * 4, 0)).collect());
        let rules = MatchRules::default();
        // Faces: circles-1, circles-1, circles-2, circles-2, all free.
        assert_eq!(
            board.free_pairs(&rules),
            vec![(TileId(0), TileId(1)), (TileId(2), TileId(3))]
        );
        assert_eq!(board.hint(&rules), Some((TileId(0), TileId(1))));
        assert!(board.has_free_pair(&rules));
    }

    #[test]
    fn rejects_bad_inputs() {
        assert!(Board::new(tiles(2), vec![Position::new(0, 0, 0)]).is_err());
        assert!(Board::new(
            tiles(2),
            vec![Position::new(0, 0, 0), Position::new(0, 0, 0)]
        )
        .is_err());
    }
}
