//! B-tree - deletion and underflow repair.
//!
//! Removing an entry can leave a leaf below its minimum. The repair walks
//! upward with an explicit work stack:
//!
//! ```text
//! REMOVE_LOCAL ──▶ done
//!       │
//!       ▼
//! UNDERFLOW_CHECK ──▶ ROTATE_LEFT / ROTATE_RIGHT ──▶ done
//!       │  ▲
//!       │  └── MERGE (parent lost a child, check parent)
//!       ▼
//! ROOT_COLLAPSE ──▶ done
//! ```
//!
//! Siblings are always tried left first, then right.

use tracing::debug;

use crate::common::{Address, Error, Result};
use crate::storage::BlockStore;

use super::node::{Key, Node};
use super::tree::BTree;

/// Result of [`BTree::delete`].
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The key was present; carries the value it held.
    Deleted(String),
    /// The key was absent; the tree was not modified.
    KeyNotFound,
}

impl DeleteOutcome {
    #[inline]
    pub fn is_deleted(&self) -> bool {
        matches!(self, DeleteOutcome::Deleted(_))
    }
}

/// What a node queued for repair must end up with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Need {
    /// At least the configured minimum occupancy.
    Minimum,
    /// At least two children, so that a child has a sibling to trade with.
    /// Only arises with `M = 2`, where one-child internal nodes are legal.
    Sibling,
}

fn empty_donor(address: Address) -> Error {
    Error::InvariantViolation {
        address,
        reason: "sibling with surplus has nothing to give".to_string(),
    }
}

impl<K: Key, S: BlockStore> BTree<K, S> {
    /// Remove `key` and its value.
    ///
    /// Absence is not an error: the tree is left untouched and
    /// [`DeleteOutcome::KeyNotFound`] is returned.
    pub fn delete(&mut self, key: &K) -> Result<DeleteOutcome> {
        let mut leaf = self.find_leaf(key)?;
        let Some(value) = leaf.remove_local(key) else {
            debug!(?key, "btree.delete.key_not_found");
            return Ok(DeleteOutcome::KeyNotFound);
        };
        leaf.write_back(&mut self.store)?;

        if !leaf.is_root() && self.is_deficient(&leaf) {
            self.repair_underflow(leaf.address())?;
        }
        Ok(DeleteOutcome::Deleted(value))
    }

    /// Restore minimum occupancy from `start` upward.
    ///
    /// Every queued entry is re-read from the store before it is examined, so
    /// earlier repairs that moved it under a new parent are picked up.
    fn repair_underflow(&mut self, start: Address) -> Result<()> {
        let mut pending = vec![(start, Need::Minimum)];

        while let Some((address, need)) = pending.pop() {
            let mut node: Node<K> = self.store.read(address)?;

            let Some(parent_addr) = node.parent_address() else {
                let absorbed = self.collapse_root()?;
                for entry in pending.iter_mut() {
                    if absorbed.contains(&entry.0) {
                        entry.0 = self.root;
                    }
                }
                continue;
            };

            let deficient = match need {
                Need::Minimum => self.is_deficient(&node),
                Need::Sibling => self.is_deficient(&node) || node.children.len() < 2,
            };
            if !deficient {
                continue;
            }

            let mut parent: Node<K> = self.store.read(parent_addr)?;
            if parent.children.len() < 2 {
                // No sibling to trade with: give the parent a second child first.
                pending.push((address, need));
                pending.push((parent_addr, Need::Sibling));
                continue;
            }

            if self.borrow_from_sibling(&mut node, &mut parent)? {
                continue;
            }
            self.merge_with_sibling(node, parent)?;
            pending.push((parent_addr, Need::Minimum));
        }
        Ok(())
    }

    // ========================================================================
    // Rotation
    // ========================================================================

    /// Move one entry (leaf) or child (internal) into `node` from an adjacent
    /// sibling that has more than its minimum, left sibling first.
    ///
    /// Returns `false` without touching anything if neither sibling can spare one.
    pub(super) fn borrow_from_sibling(
        &mut self,
        node: &mut Node<K>,
        parent: &mut Node<K>,
    ) -> Result<bool> {
        let slot = node.slot_in(parent)?;

        if slot > 0 {
            let mut left: Node<K> = self.store.read(parent.children[slot - 1])?;
            if self.has_surplus(&left) {
                self.rotate_from_left(&mut left, node, parent, slot - 1)?;
                return Ok(true);
            }
        }

        if slot + 1 < parent.children.len() {
            let mut right: Node<K> = self.store.read(parent.children[slot + 1])?;
            if self.has_surplus(&right) {
                self.rotate_from_right(node, &mut right, parent, slot)?;
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Shift the last entry/child of `left` to the front of `node`.
    ///
    /// `sep` is the index of the separator between the two in `parent`.
    fn rotate_from_left(
        &mut self,
        left: &mut Node<K>,
        node: &mut Node<K>,
        parent: &mut Node<K>,
        sep: usize,
    ) -> Result<()> {
        if node.is_leaf() {
            let (Some(key), Some(value)) = (left.keys.pop(), left.data.pop()) else {
                return Err(empty_donor(left.address));
            };
            parent.keys[sep] = key.clone();
            node.keys.insert(0, key);
            node.data.insert(0, value);
        } else {
            let (Some(key), Some(child)) = (left.keys.pop(), left.children.pop()) else {
                return Err(empty_donor(left.address));
            };
            let lowered = std::mem::replace(&mut parent.keys[sep], key);
            node.keys.insert(0, lowered);
            node.children.insert(0, child);
        }

        let mut batch = self.batch();
        batch.stage(left)?;
        batch.stage(node)?;
        batch.stage(parent)?;
        self.stage_relinks(&mut batch, node, 0)?;
        batch.commit(&mut self.store)?;

        debug!(
            from = %left.address,
            to = %node.address,
            leaf = node.is_leaf(),
            "btree.rotate_from_left"
        );
        Ok(())
    }

    /// Shift the first entry/child of `right` to the back of `node`.
    ///
    /// `sep` is the index of the separator between the two in `parent`.
    fn rotate_from_right(
        &mut self,
        node: &mut Node<K>,
        right: &mut Node<K>,
        parent: &mut Node<K>,
        sep: usize,
    ) -> Result<()> {
        if right.keys.is_empty() {
            return Err(empty_donor(right.address));
        }

        if node.is_leaf() {
            let key = right.keys.remove(0);
            let value = right.data.remove(0);
            let next = right
                .keys
                .first()
                .cloned()
                .ok_or_else(|| empty_donor(right.address))?;
            parent.keys[sep] = next;
            node.keys.push(key);
            node.data.push(value);
        } else {
            let key = right.keys.remove(0);
            let child = right.children.remove(0);
            let lowered = std::mem::replace(&mut parent.keys[sep], key);
            node.keys.push(lowered);
            node.children.push(child);
        }

        let mut batch = self.batch();
        batch.stage(right)?;
        batch.stage(node)?;
        batch.stage(parent)?;
        self.stage_relinks(&mut batch, node, node.children.len().saturating_sub(1))?;
        self.stage_relinks(&mut batch, right, 0)?;
        batch.commit(&mut self.store)?;

        debug!(
            from = %right.address,
            to = %node.address,
            leaf = node.is_leaf(),
            "btree.rotate_from_right"
        );
        Ok(())
    }

    // ========================================================================
    // Merge
    // ========================================================================

    /// Fold `node` into its left sibling, or its right sibling into `node`
    /// when it is the leftmost child. The parent loses one child.
    fn merge_with_sibling(&mut self, node: Node<K>, parent: Node<K>) -> Result<()> {
        let slot = node.slot_in(&parent)?;
        if slot > 0 {
            let left: Node<K> = self.store.read(parent.children[slot - 1])?;
            self.merge_nodes(left, node, parent, slot - 1)
        } else {
            let right: Node<K> = self.store.read(parent.children[slot + 1])?;
            self.merge_nodes(node, right, parent, slot)
        }
    }

    /// Append `from` (child `sep + 1` of `parent`) to `into` (child `sep`).
    ///
    /// The block of `from` is no longer referenced afterwards.
    fn merge_nodes(
        &mut self,
        mut into: Node<K>,
        from: Node<K>,
        mut parent: Node<K>,
        sep: usize,
    ) -> Result<()> {
        let separator = parent.keys.remove(sep);
        parent.children.remove(sep + 1);

        let first_moved = into.children.len();
        if into.is_leaf() {
            into.keys.extend(from.keys);
            into.data.extend(from.data);
        } else {
            into.keys.push(separator);
            into.keys.extend(from.keys);
            into.children.extend(from.children);
        }

        let mut batch = self.batch();
        batch.stage(&into)?;
        batch.stage(&parent)?;
        self.stage_relinks(&mut batch, &into, first_moved)?;
        self.stage_relinks(&mut batch, &parent, sep + 1)?;
        batch.commit(&mut self.store)?;

        debug!(
            into = %into.address,
            from = %from.address,
            parent = %parent.address,
            leaf = into.is_leaf(),
            "btree.merge"
        );
        Ok(())
    }

    // ========================================================================
    // Root collapse
    // ========================================================================

    /// While the root is internal with a single child, pull that child's
    /// contents into the root block.
    ///
    /// The root address never changes; when the absorbed child is a leaf the
    /// root becomes a leaf. Returns the addresses whose contents moved into
    /// the root.
    fn collapse_root(&mut self) -> Result<Vec<Address>> {
        let mut absorbed = Vec::new();
        let mut root: Node<K> = self.store.read(self.root)?;

        while !root.is_leaf() && root.children.len() == 1 {
            let child: Node<K> = root.get_child(&mut self.store, 0)?;
            absorbed.push(child.address);

            root.is_leaf = child.is_leaf;
            root.keys = child.keys;
            root.children = child.children;
            root.data = child.data;

            let mut batch = self.batch();
            batch.stage(&root)?;
            self.stage_relinks(&mut batch, &root, 0)?;
            batch.commit(&mut self.store)?;

            debug!(
                root = %root.address,
                absorbed = %child.address,
                leaf = root.is_leaf(),
                "btree.collapse_root"
            );
        }
        Ok(absorbed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryDisk;

    fn tree_with(
        fanout: usize,
        leaf_capacity: usize,
        keys: impl IntoIterator<Item = i32>,
    ) -> BTree<i32, MemoryDisk> {
        let mut tree = BTree::in_memory(fanout, leaf_capacity).unwrap();
        for k in keys {
            tree.insert(k, k).unwrap();
        }
        tree
    }

    fn root_of(tree: &mut BTree<i32, MemoryDisk>) -> Node<i32> {
        let root = tree.root_address();
        tree.read_node(root).unwrap()
    }

    fn leaf_keys(tree: &mut BTree<i32, MemoryDisk>) -> Vec<Vec<i32>> {
        let root = root_of(tree);
        root.children_addresses()
            .iter()
            .map(|&a| tree.read_node(a).unwrap().keys().to_vec())
            .collect()
    }

    #[test]
    fn test_delete_missing_key_is_noop() {
        let mut tree = tree_with(3, 3, 0..5);
        let before = tree.store().stored_bytes();

        assert_eq!(tree.delete(&42).unwrap(), DeleteOutcome::KeyNotFound);
        assert!(!DeleteOutcome::KeyNotFound.is_deleted());
        assert_eq!(tree.store().stored_bytes(), before);
        assert_eq!(leaf_keys(&mut tree), vec![vec![0, 1], vec![2, 3, 4]]);
    }

    #[test]
    fn test_delete_from_empty_tree() {
        let mut tree = tree_with(3, 3, []);
        assert_eq!(tree.delete(&1).unwrap(), DeleteOutcome::KeyNotFound);
    }

    #[test]
    fn test_rotate_leaf_from_left() {
        // leaves [0 1] [2 3] -> fill left, then drain right
        let mut tree = tree_with(3, 3, [0, 1, 2, 3, -1]);
        assert_eq!(leaf_keys(&mut tree), vec![vec![-1, 0, 1], vec![2, 3]]);

        assert!(tree.delete(&3).unwrap().is_deleted());
        assert_eq!(leaf_keys(&mut tree), vec![vec![-1, 0], vec![1, 2]]);
        assert_eq!(root_of(&mut tree).keys(), &[1]);
    }

    #[test]
    fn test_rotate_leaf_from_right() {
        let mut tree = tree_with(3, 3, 0..5);
        assert_eq!(leaf_keys(&mut tree), vec![vec![0, 1], vec![2, 3, 4]]);

        tree.delete(&0).unwrap();
        assert_eq!(leaf_keys(&mut tree), vec![vec![1, 2], vec![3, 4]]);
        assert_eq!(root_of(&mut tree).keys(), &[3]);
        assert_eq!(tree.find(&2).unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn test_merge_collapses_root_in_place() {
        let mut tree = tree_with(3, 3, 0..4);
        let root_addr = tree.root_address();

        tree.delete(&3).unwrap();
        tree.delete(&2).unwrap();

        let root = root_of(&mut tree);
        assert_eq!(tree.root_address(), root_addr);
        assert!(root.is_leaf());
        assert!(root.children_addresses().is_empty());
        assert_eq!(root.keys(), &[0, 1]);
    }

    #[test]
    fn test_internal_merge_reparents_grandchildren() {
        let mut tree = tree_with(3, 2, 0..16);
        for k in (4..16).rev() {
            tree.delete(&k).unwrap();
        }

        let root = root_of(&mut tree);
        for (slot, &child_addr) in root.children_addresses().iter().enumerate() {
            let child = tree.read_node(child_addr).unwrap();
            assert_eq!(child.parent_address(), Some(root.address()));
            assert_eq!(child.index_in_parent(), Some(slot));
        }
        for k in 0..4 {
            assert_eq!(tree.find(&k).unwrap(), Some(k.to_string()));
        }
        for k in 4..16 {
            assert_eq!(tree.find(&k).unwrap(), None);
        }
    }

    #[test]
    fn test_fanout_two_drains_completely() {
        let mut tree = tree_with(2, 1, 0..32);
        for k in 0..32 {
            assert_eq!(tree.delete(&k).unwrap(), DeleteOutcome::Deleted(k.to_string()));
            for rest in (k + 1)..32 {
                assert_eq!(tree.find(&rest).unwrap(), Some(rest.to_string()));
            }
        }

        let root = root_of(&mut tree);
        assert!(root.is_leaf());
        assert!(root.keys().is_empty());
    }
}
