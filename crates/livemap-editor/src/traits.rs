use livemap_netproto::NodeKey;
use livemap_netproto::types::{Position, TileRecord};
use thiserror::Error;

use crate::action::{Action, ActionKind};
use crate::leaf::Leaf;

/// Map storage as seen by a live session.
pub trait LiveMap: Send {
    fn name(&self) -> &str;
    fn set_name(&mut self, name: String);
    fn width(&self) -> u16;
    fn set_width(&mut self, width: u16);
    fn height(&self) -> u16;
    fn set_height(&mut self, height: u16);

    fn tile(&self, pos: Position) -> Option<&TileRecord>;

    fn leaf(&self, grid_x: u16, grid_y: u16) -> Option<&Leaf>;

    fn get_or_create_leaf(&mut self, grid_x: u16, grid_y: u16) -> &mut Leaf;

    /// Tiles addressed by `key`, creating the leaf if it does not exist yet.
    fn node_tiles(&mut self, key: NodeKey) -> Vec<TileRecord> {
        self.get_or_create_leaf(key.grid_x(), key.grid_y())
            .tiles_on(key.floors())
    }
}

/// Undo/redo history.
pub trait ActionQueue {
    fn create_action(&mut self, kind: ActionKind) -> Action;

    /// Commits `action`. All of its changes become visible together.
    fn add_action(&mut self, action: Action);
}

pub trait LiveEditor: Send {
    fn map(&self) -> &dyn LiveMap;
    fn map_mut(&mut self) -> &mut dyn LiveMap;
    fn action_queue(&mut self) -> &mut dyn ActionQueue;
}

#[derive(Debug, Error)]
#[error("failed to load assets for version {version}: {reason}")]
pub struct AssetLoadError {
    pub version: u32,
    pub reason: String,
}

/// Switches the editor's item and sprite data to another client version.
pub trait AssetLoader {
    fn current_version(&self) -> u32;
    fn load_version(&mut self, version: u32) -> Result<(), AssetLoadError>;
}
