use std::collections::BTreeMap;

use livemap_netproto::constants::LEAF_SHIFT;
use livemap_netproto::types::{FloorSpan, Position, TileRecord};

/// A 4x4 column of tiles across all floors.
#[derive(Debug, Clone, Default)]
pub struct Leaf {
    grid_x: u16,
    grid_y: u16,
    tiles: BTreeMap<Position, TileRecord>,
}

impl Leaf {
    pub fn new(grid_x: u16, grid_y: u16) -> Self {
        Self {
            grid_x,
            grid_y,
            tiles: BTreeMap::new(),
        }
    }

    pub fn grid(&self) -> (u16, u16) {
        (self.grid_x, self.grid_y)
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.x >> LEAF_SHIFT == self.grid_x && pos.y >> LEAF_SHIFT == self.grid_y
    }

    pub fn tile(&self, pos: Position) -> Option<&TileRecord> {
        self.tiles.get(&pos)
    }

    /// Stores `tile`, removing the slot if the record is empty.
    /// Returns the previous contents.
    pub fn set_tile(&mut self, tile: TileRecord) -> Option<TileRecord> {
        debug_assert!(self.contains(tile.position));
        if tile.is_empty() {
            self.tiles.remove(&tile.position)
        } else {
            self.tiles.insert(tile.position, tile)
        }
    }

    /// Non-empty tiles on the given floors, in position order.
    pub fn tiles_on(&self, floors: FloorSpan) -> Vec<TileRecord> {
        self.tiles
            .values()
            .filter(|t| floors.contains(t.position.z))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}
