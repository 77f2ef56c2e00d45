//! Turns a received batch of tile records into one attributed action.

use std::collections::BTreeSet;

use livemap_netproto::NodeKey;
use livemap_netproto::types::{ClientId, TileRecord};
use tracing::debug;

use crate::action::{ActionKind, Change};
use crate::traits::LiveEditor;

/// What a committed batch touched.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AppliedBatch {
    pub changes: usize,
    /// Every leaf and floor span holding a changed tile.
    pub nodes: BTreeSet<NodeKey>,
}

impl AppliedBatch {
    pub fn is_empty(&self) -> bool {
        self.changes == 0
    }
}

/// Commits `tiles` as a single remote action owned by `owner`.
///
/// Tiles are applied in batch order; a later record for the same position
/// overwrites an earlier one. An empty batch commits nothing.
pub fn apply_remote_tiles(
    editor: &mut dyn LiveEditor,
    owner: Option<ClientId>,
    tiles: Vec<TileRecord>,
) -> AppliedBatch {
    if tiles.is_empty() {
        return AppliedBatch::default();
    }

    let queue = editor.action_queue();
    let mut action = queue.create_action(ActionKind::Remote);
    action.set_owner(owner);

    let mut nodes = BTreeSet::new();
    for tile in tiles {
        nodes.insert(NodeKey::containing(tile.position));
        action.add_change(Change::new(tile));
    }

    let changes = action.len();
    queue.add_action(action);
    debug!(?owner, changes, nodes = nodes.len(), "remote action committed");

    AppliedBatch { changes, nodes }
}
