use std::collections::BTreeSet;

use livemap_netproto::NodeKey;
use parking_lot::Mutex;

/// Node keys waiting for the next batched request.
#[derive(Debug, Default)]
pub struct PendingNodeRequests {
    keys: Mutex<BTreeSet<NodeKey>>,
}

impl PendingNodeRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if `key` was already pending.
    pub fn insert(&self, key: NodeKey) -> bool {
        self.keys.lock().insert(key)
    }

    /// Empties the set, returning its keys in key order.
    pub fn take(&self) -> Vec<NodeKey> {
        std::mem::take(&mut *self.keys.lock()).into_iter().collect()
    }

    /// Puts keys back after a failed flush.
    pub fn restore(&self, keys: impl IntoIterator<Item = NodeKey>) {
        self.keys.lock().extend(keys);
    }

    pub fn len(&self) -> usize {
        self.keys.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_key_is_requested_once() {
        let pending = PendingNodeRequests::new();
        let key = NodeKey::for_tile(10, 20, false);
        assert!(pending.insert(key));
        assert!(!pending.insert(key));
        assert!(pending.insert(NodeKey::for_tile(10, 20, true)));
        assert_eq!(pending.len(), 2);

        let taken = pending.take();
        assert_eq!(taken.len(), 2);
        assert!(pending.is_empty());
    }

    #[test]
    fn tiles_in_one_leaf_share_a_key() {
        let pending = PendingNodeRequests::new();
        for x in 8..12 {
            for y in 4..8 {
                pending.insert(NodeKey::for_tile(x, y, false));
            }
        }
        assert_eq!(pending.take(), vec![NodeKey::new(2, 1, false).unwrap()]);
    }

    #[test]
    fn restored_keys_merge_with_new_ones() {
        let pending = PendingNodeRequests::new();
        let a = NodeKey::for_tile(0, 0, false);
        let b = NodeKey::for_tile(100, 0, false);
        pending.insert(a);
        let taken = pending.take();
        pending.insert(a);
        pending.insert(b);
        pending.restore(taken);
        assert_eq!(pending.take(), vec![a, b]);
    }
}
