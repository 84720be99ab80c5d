//! B-tree - lookup, insertion and node splitting.

use std::fmt::Display;
use std::marker::PhantomData;

use tracing::debug;

use crate::common::{Address, Error, Result, TreeConfig};
use crate::storage::{BlockStore, MemoryDisk};

use super::node::{Key, Node};

/// A B-tree whose nodes live in the blocks of a [`BlockStore`].
///
/// The tree itself holds only its shape parameters (`M`, `L`) and the
/// address of the root; every node is read from the store on demand and
/// written back after each change. Values are stored as text.
///
/// # Structure
/// ```text
///                  ┌───────────────┐
///                  │ root [ 20 ]   │  internal: separators + child addresses
///                  └───┬───────┬───┘
///                      │       │
///          ┌───────────┘       └───────────┐
///   ┌──────▼───────┐               ┌───────▼──────┐
///   │ leaf [10 15] │               │ leaf [20 30] │  leaves: keys + values
///   └──────────────┘               └──────────────┘
/// ```
/// Separators equal the smallest key of the right subtree when created.
///
/// # Example
/// ```
/// use blocktree::{BTree, DeleteOutcome};
///
/// let mut tree = BTree::in_memory(3, 3).unwrap();
/// for i in 0..5 {
///     tree.insert(i, i * 10).unwrap();
/// }
/// assert_eq!(tree.find(&3).unwrap().as_deref(), Some("30"));
///
/// assert_eq!(tree.delete(&3).unwrap(), DeleteOutcome::Deleted("30".to_string()));
/// assert_eq!(tree.delete(&3).unwrap(), DeleteOutcome::KeyNotFound);
/// assert_eq!(tree.find(&3).unwrap(), None);
/// ```
pub struct BTree<K, S> {
    pub(super) store: S,
    pub(super) config: TreeConfig,
    pub(super) root: Address,
    _key: PhantomData<fn() -> K>,
}

impl<K: Key> BTree<K, MemoryDisk> {
    /// Create a tree on a fresh [`MemoryDisk`].
    ///
    /// # Errors
    /// Returns `Error::InvalidConfig` if `fanout < 2` or `leaf_capacity < 1`.
    pub fn in_memory(fanout: usize, leaf_capacity: usize) -> Result<Self> {
        Self::new(MemoryDisk::new(), TreeConfig::new(fanout, leaf_capacity)?)
    }
}

impl<K: Key, S: BlockStore> BTree<K, S> {
    /// Create an empty tree: allocates one block holding an empty root leaf.
    pub fn new(mut store: S, config: TreeConfig) -> Result<Self> {
        let root = store.allocate()?;
        Node::<K>::new_leaf(root, None, None).write_back(&mut store)?;

        debug!(
            root = %root,
            fanout = config.fanout(),
            leaf_capacity = config.leaf_capacity(),
            "btree.create"
        );
        Ok(Self {
            store,
            config,
            root,
            _key: PhantomData,
        })
    }

    /// Reattach to a tree previously built in `store` with root at `root`.
    ///
    /// # Errors
    /// - `Error::NotRoot` if the node at `root` has a parent
    /// - Store errors if `root` does not hold a node
    pub fn open(mut store: S, config: TreeConfig, root: Address) -> Result<Self> {
        let node: Node<K> = store.read(root)?;
        if !node.is_root() {
            return Err(Error::NotRoot(root));
        }

        debug!(root = %root, "btree.open");
        Ok(Self {
            store,
            config,
            root,
            _key: PhantomData,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Address of the current root node.
    #[inline]
    pub fn root_address(&self) -> Address {
        self.root
    }

    #[inline]
    pub fn config(&self) -> TreeConfig {
        self.config
    }

    #[inline]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Give up the tree and return its store.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Read any node of this tree by address.
    pub fn read_node(&mut self, address: Address) -> Result<Node<K>> {
        self.store.read(address)
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Descend from the root to the leaf responsible for `key`.
    pub fn find_leaf(&mut self, key: &K) -> Result<Node<K>> {
        let mut node: Node<K> = self.store.read(self.root)?;
        while !node.is_leaf() {
            let slot = node.child_slot(key);
            node = node.get_child(&mut self.store, slot)?;
        }
        Ok(node)
    }

    /// Value stored for `key`, or `None` if absent.
    pub fn find(&mut self, key: &K) -> Result<Option<String>> {
        let leaf = self.find_leaf(key)?;
        Ok(leaf.find_data(key).map(str::to_owned))
    }

    // ========================================================================
    // Insertion
    // ========================================================================

    /// Insert `key`, or overwrite its value if already present.
    ///
    /// `value` is stored in its textual form (`value.to_string()`).
    pub fn insert(&mut self, key: K, value: impl Display) -> Result<()> {
        let mut leaf = self.find_leaf(&key)?;
        let replaced = leaf.insert_local(key, value.to_string());

        if replaced.is_some() || leaf.keys.len() <= self.config.leaf_capacity() {
            return leaf.write_back(&mut self.store);
        }
        self.split(leaf)
    }

    /// Split an overflowing node, propagating upward until every node fits.
    ///
    /// Each round splits `node`, links the new right sibling into the parent
    /// (or a new root) and continues with the parent if it now overflows.
    fn split(&mut self, mut node: Node<K>) -> Result<()> {
        loop {
            let sibling_addr = self.store.allocate()?;
            let (separator, mut sibling) = if node.is_leaf() {
                let at = (self.config.leaf_capacity() + 1) / 2;
                node.split_leaf(sibling_addr, at)
            } else {
                let at = self.config.fanout() / 2;
                node.split_internal(sibling_addr, at)
            };

            debug!(
                node = %node.address(),
                sibling = %sibling_addr,
                leaf = node.is_leaf(),
                left = node.occupancy(),
                right = sibling.occupancy(),
                "btree.split"
            );

            let Some(parent_addr) = node.parent_address() else {
                return self.grow_root(node, separator, sibling);
            };

            let mut parent: Node<K> = self.store.read(parent_addr)?;
            let slot = node.slot_in(&parent)?;
            parent.keys.insert(slot, separator);
            parent.children.insert(slot + 1, sibling_addr);
            sibling.set_parent(parent_addr, slot + 1);

            let mut batch = self.batch();
            batch.stage(&node)?;
            batch.stage(&sibling)?;
            batch.stage(&parent)?;
            self.stage_relinks(&mut batch, &sibling, 0)?;
            self.stage_relinks(&mut batch, &parent, slot + 2)?;
            batch.commit(&mut self.store)?;

            if parent.children.len() > self.config.fanout() {
                node = parent;
                continue;
            }

            // A parent at its minimum only gains children here, so with the
            // ceil(M/2) minimum this repairs nothing in a well-formed tree.
            if !parent.is_root() && self.is_deficient(&parent) {
                self.redistribute_children(parent)?;
            }
            return Ok(());
        }
    }

    /// Put a new root above `left` and `right` after the old root split.
    fn grow_root(&mut self, mut left: Node<K>, separator: K, mut right: Node<K>) -> Result<()> {
        let root_addr = self.store.allocate()?;
        let root = Node::new_internal(root_addr, vec![separator], vec![left.address, right.address]);
        left.set_parent(root_addr, 0);
        right.set_parent(root_addr, 1);

        let mut batch = self.batch();
        batch.stage(&left)?;
        batch.stage(&right)?;
        batch.stage(&root)?;
        self.stage_relinks(&mut batch, &right, 0)?;
        batch.commit(&mut self.store)?;

        debug!(old_root = %self.root, new_root = %root_addr, "btree.grow_root");
        self.root = root_addr;
        Ok(())
    }

    /// Top up an under-filled internal node from an adjacent sibling.
    ///
    /// Borrows one child (left sibling first) if a sibling has one to spare;
    /// otherwise the node is left as it is.
    fn redistribute_children(&mut self, mut node: Node<K>) -> Result<()> {
        let Some(mut parent) = node.get_parent(&mut self.store)? else {
            return Ok(());
        };
        if !self.borrow_from_sibling(&mut node, &mut parent)? {
            debug!(node = %node.address(), "btree.redistribute.no_donor");
        }
        Ok(())
    }

    // ========================================================================
    // Occupancy
    // ========================================================================

    /// Whether a non-root node holds fewer entries (leaf) or children
    /// (internal) than the configured minimum.
    pub(super) fn is_deficient(&self, node: &Node<K>) -> bool {
        let minimum = if node.is_leaf() {
            self.config.min_leaf_entries()
        } else {
            self.config.min_children()
        };
        node.occupancy() < minimum
    }

    /// Whether `node` can give one entry or child away and stay at minimum.
    pub(super) fn has_surplus(&self, node: &Node<K>) -> bool {
        let minimum = if node.is_leaf() {
            self.config.min_leaf_entries()
        } else {
            self.config.min_children()
        };
        node.occupancy() > minimum
    }
}
