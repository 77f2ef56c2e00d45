use livemap_netproto::types::{ClientId, TileRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Edit made by the local user.
    Local,
    /// Edit received over a live session.
    Remote,
}

/// Replacement of one tile's contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub tile: TileRecord,
}

impl Change {
    pub fn new(tile: TileRecord) -> Self {
        Self { tile }
    }
}

/// An ordered group of changes applied as one undoable unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    kind: ActionKind,
    owner: Option<ClientId>,
    changes: Vec<Change>,
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            owner: None,
            changes: Vec::new(),
        }
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    /// Client that produced the action, if it arrived over the network.
    pub fn owner(&self) -> Option<ClientId> {
        self.owner
    }

    pub fn set_owner(&mut self, owner: Option<ClientId>) {
        self.owner = owner;
    }

    pub fn add_change(&mut self, change: Change) {
        self.changes.push(change);
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}
