//! In-memory editor used by the standalone server and tests.

use std::collections::HashMap;

use livemap_netproto::constants::LEAF_SHIFT;
use livemap_netproto::types::{Position, TileRecord};

use crate::action::{Action, ActionKind, Change};
use crate::leaf::Leaf;
use crate::traits::{ActionQueue, LiveEditor, LiveMap};

#[derive(Debug, Default)]
pub struct MemoryMap {
    name: String,
    width: u16,
    height: u16,
    leaves: HashMap<(u16, u16), Leaf>,
}

impl MemoryMap {
    pub fn new(name: impl Into<String>, width: u16, height: u16) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            leaves: HashMap::new(),
        }
    }

    /// Stores `tile` and returns what it replaced (an empty record if nothing).
    pub fn replace_tile(&mut self, tile: TileRecord) -> TileRecord {
        let pos = tile.position;
        self.get_or_create_leaf(pos.x >> LEAF_SHIFT, pos.y >> LEAF_SHIFT)
            .set_tile(tile)
            .unwrap_or_else(|| TileRecord::empty(pos))
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    pub fn tile_count(&self) -> usize {
        self.leaves.values().map(Leaf::len).sum()
    }
}

impl LiveMap for MemoryMap {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn width(&self) -> u16 {
        self.width
    }

    fn set_width(&mut self, width: u16) {
        self.width = width;
    }

    fn height(&self) -> u16 {
        self.height
    }

    fn set_height(&mut self, height: u16) {
        self.height = height;
    }

    fn tile(&self, pos: Position) -> Option<&TileRecord> {
        self.leaf(pos.x >> LEAF_SHIFT, pos.y >> LEAF_SHIFT)?.tile(pos)
    }

    fn leaf(&self, grid_x: u16, grid_y: u16) -> Option<&Leaf> {
        self.leaves.get(&(grid_x, grid_y))
    }

    fn get_or_create_leaf(&mut self, grid_x: u16, grid_y: u16) -> &mut Leaf {
        self.leaves
            .entry((grid_x, grid_y))
            .or_insert_with(|| Leaf::new(grid_x, grid_y))
    }
}

struct Committed {
    action: Action,
    previous: Vec<TileRecord>,
}

#[derive(Default)]
pub struct MemoryEditor {
    map: MemoryMap,
    history: Vec<Committed>,
}

impl MemoryEditor {
    pub fn new(map: MemoryMap) -> Self {
        Self {
            map,
            history: Vec::new(),
        }
    }

    pub fn memory_map(&self) -> &MemoryMap {
        &self.map
    }

    /// Committed actions, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &Action> {
        self.history.iter().map(|c| &c.action)
    }

    /// Reverts the most recent action.
    pub fn undo(&mut self) -> Option<Action> {
        let committed = self.history.pop()?;
        for tile in committed.previous.into_iter().rev() {
            self.map.replace_tile(tile);
        }
        Some(committed.action)
    }
}

impl ActionQueue for MemoryEditor {
    fn create_action(&mut self, kind: ActionKind) -> Action {
        Action::new(kind)
    }

    fn add_action(&mut self, action: Action) {
        if action.is_empty() {
            return;
        }
        let previous = action
            .changes()
            .iter()
            .map(|Change { tile }| self.map.replace_tile(tile.clone()))
            .collect();
        self.history.push(Committed { action, previous });
    }
}

impl LiveEditor for MemoryEditor {
    fn map(&self) -> &dyn LiveMap {
        &self.map
    }

    fn map_mut(&mut self) -> &mut dyn LiveMap {
        &mut self.map
    }

    fn action_queue(&mut self) -> &mut dyn ActionQueue {
        self
    }
}
