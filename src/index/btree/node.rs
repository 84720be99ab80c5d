//! B-tree node - the record stored in one block.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::common::{Address, Error, Result};
use crate::storage::BlockStore;

/// Bound satisfied by every key type a tree can index.
///
/// Keys need a total order and must survive a trip through a block, so any
/// `Ord + Clone + Serialize + DeserializeOwned` type qualifies (integers,
/// `String`, tuples of those, ...).
pub trait Key: Ord + Clone + Debug + Serialize + DeserializeOwned {}

impl<T> Key for T where T: Ord + Clone + Debug + Serialize + DeserializeOwned {}

/// One B-tree node as persisted in a block.
///
/// Nodes never reference each other directly: parent and children are
/// [`Address`]es that must be resolved through a [`BlockStore`]. A node read
/// from a store is a private snapshot; changes become visible to others only
/// after [`write_back`](Self::write_back).
///
/// # Layout
/// ```text
/// Internal:  keys      [ k0 | k1 | k2 ]
///            children [ c0 | c1 | c2 | c3 ]     c_i < k_i <= c_{i+1}
///
/// Leaf:      keys      [ k0 | k1 | k2 ]
///            data      [ v0 | v1 | v2 ]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node<K> {
    pub(super) address: Address,
    pub(super) parent_address: Option<Address>,
    pub(super) index_in_parent: Option<usize>,
    pub(super) is_leaf: bool,
    pub(super) keys: Vec<K>,
    pub(super) children: Vec<Address>,
    pub(super) data: Vec<String>,
}

impl<K: Key> Node<K> {
    /// Create an empty leaf.
    pub fn new_leaf(
        address: Address,
        parent_address: Option<Address>,
        index_in_parent: Option<usize>,
    ) -> Self {
        Self {
            address,
            parent_address,
            index_in_parent,
            is_leaf: true,
            keys: Vec::new(),
            children: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Create a parentless internal node.
    ///
    /// `children.len()` must be `keys.len() + 1`.
    pub fn new_internal(address: Address, keys: Vec<K>, children: Vec<Address>) -> Self {
        debug_assert_eq!(children.len(), keys.len() + 1);
        Self {
            address,
            parent_address: None,
            index_in_parent: None,
            is_leaf: false,
            keys,
            children,
            data: Vec::new(),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// The block this node lives in.
    #[inline]
    pub fn address(&self) -> Address {
        self.address
    }

    /// Address of the parent, `None` for the root.
    #[inline]
    pub fn parent_address(&self) -> Option<Address> {
        self.parent_address
    }

    /// Position of this node in its parent's child list, `None` for the root.
    #[inline]
    pub fn index_in_parent(&self) -> Option<usize> {
        self.index_in_parent
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.is_leaf
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent_address.is_none()
    }

    /// Sorted keys.
    #[inline]
    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    /// Child addresses (empty for leaves).
    #[inline]
    pub fn children_addresses(&self) -> &[Address] {
        &self.children
    }

    /// Stored values, parallel to `keys` (empty for internal nodes).
    #[inline]
    pub fn data(&self) -> &[String] {
        &self.data
    }

    /// Size measure used for capacity checks: entries for a leaf, children
    /// for an internal node.
    #[inline]
    pub fn occupancy(&self) -> usize {
        if self.is_leaf {
            self.keys.len()
        } else {
            self.children.len()
        }
    }

    // ========================================================================
    // Local search and update
    // ========================================================================

    /// Leftmost position where `key` could be inserted keeping `keys` sorted.
    pub fn find_index(&self, key: &K) -> usize {
        self.keys.partition_point(|k| k < key)
    }

    /// Child slot to descend into when looking for `key`.
    ///
    /// A separator equal to `key` routes right, since separators are the
    /// smallest key of their right subtree.
    pub fn child_slot(&self, key: &K) -> usize {
        let idx = self.find_index(key);
        if idx == self.keys.len() || *key < self.keys[idx] {
            idx
        } else {
            idx + 1
        }
    }

    /// Value stored for `key`. Only valid on leaves.
    pub fn find_data(&self, key: &K) -> Option<&str> {
        debug_assert!(self.is_leaf, "find_data on internal node");
        let idx = self.find_index(key);
        if idx < self.keys.len() && self.keys[idx] == *key {
            Some(&self.data[idx])
        } else {
            None
        }
    }

    /// Insert or overwrite `key` in this leaf, keeping keys sorted.
    ///
    /// Returns the previous value when `key` was already present. Overflow is
    /// left for the caller to resolve.
    pub fn insert_local(&mut self, key: K, value: String) -> Option<String> {
        debug_assert!(self.is_leaf, "insert_local on internal node");
        let idx = self.find_index(&key);
        if idx < self.keys.len() && self.keys[idx] == key {
            Some(std::mem::replace(&mut self.data[idx], value))
        } else {
            self.keys.insert(idx, key);
            self.data.insert(idx, value);
            None
        }
    }

    /// Remove `key` from this leaf, returning its value.
    pub fn remove_local(&mut self, key: &K) -> Option<String> {
        debug_assert!(self.is_leaf, "remove_local on internal node");
        let idx = self.find_index(key);
        if idx < self.keys.len() && self.keys[idx] == *key {
            self.keys.remove(idx);
            Some(self.data.remove(idx))
        } else {
            None
        }
    }

    // ========================================================================
    // Store access
    // ========================================================================

    /// Read child `slot` from the store.
    pub fn get_child<S: BlockStore>(&self, store: &mut S, slot: usize) -> Result<Node<K>> {
        let address = self
            .children
            .get(slot)
            .copied()
            .ok_or_else(|| Error::InvariantViolation {
                address: self.address,
                reason: format!("no child at slot {slot} of {}", self.children.len()),
            })?;
        store.read(address)
    }

    /// Read the parent from the store, `None` for the root.
    pub fn get_parent<S: BlockStore>(&self, store: &mut S) -> Result<Option<Node<K>>> {
        self.parent_address
            .map(|address| store.read(address))
            .transpose()
    }

    /// Persist this node to its own block.
    pub fn write_back<S: BlockStore>(&self, store: &mut S) -> Result<()> {
        store.write(self.address, self)
    }

    // ========================================================================
    // Structural helpers (used by the tree)
    // ========================================================================

    pub(super) fn set_parent(&mut self, parent: Address, slot: usize) {
        self.parent_address = Some(parent);
        self.index_in_parent = Some(slot);
    }

    /// Slot of this node in `parent`, failing unless both sides of the link agree.
    pub(super) fn slot_in(&self, parent: &Node<K>) -> Result<usize> {
        match self.index_in_parent {
            Some(slot) if parent.children.get(slot) == Some(&self.address) => Ok(slot),
            _ => Err(Error::BrokenLink(self.address)),
        }
    }

    /// Move entries `at..` into a new leaf at `sibling`.
    ///
    /// Returns the separator (the sibling's first key) and the sibling, which
    /// shares this node's parent but has no slot yet.
    pub(super) fn split_leaf(&mut self, sibling: Address, at: usize) -> (K, Node<K>) {
        debug_assert!(self.is_leaf && at > 0 && at < self.keys.len());
        let mut right = Node::new_leaf(sibling, self.parent_address, None);
        right.keys = self.keys.split_off(at);
        right.data = self.data.split_off(at);
        let separator = right.keys[0].clone();
        (separator, right)
    }

    /// Move keys after `at` and children after `at` into a new internal node.
    ///
    /// `keys[at]` is removed and returned as the separator to push upward.
    pub(super) fn split_internal(&mut self, sibling: Address, at: usize) -> (K, Node<K>) {
        debug_assert!(!self.is_leaf && at < self.keys.len());
        let mut right_keys = self.keys.split_off(at);
        let separator = right_keys.remove(0);
        let right_children = self.children.split_off(at + 1);

        let mut right = Node::new_internal(sibling, right_keys, right_children);
        right.parent_address = self.parent_address;
        (separator, right)
    }
}
