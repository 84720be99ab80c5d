//! Staged node writes for one structural change.
//!
//! A split, rotation or merge touches several nodes. Every touched node is
//! encoded and size-checked into a [`WriteBatch`] first; only when all of
//! them fit are the frames written. A node that cannot be stored therefore
//! fails the operation before any block changes.

use std::collections::BTreeMap;

use tracing::trace;

use crate::common::{Address, Error, Result};
use crate::storage::block::encode_node;
use crate::storage::BlockStore;

use super::node::{Key, Node};
use super::tree::BTree;

/// Encoded frames waiting to be written, keyed by address.
///
/// Staging the same address twice keeps only the last frame.
#[derive(Debug)]
pub(super) struct WriteBatch {
    frames: BTreeMap<Address, Vec<u8>>,
    /// Largest frame the store accepts, if it has a limit.
    capacity: Option<usize>,
}

impl WriteBatch {
    pub(super) fn new(capacity: Option<usize>) -> Self {
        Self {
            frames: BTreeMap::new(),
            capacity,
        }
    }

    /// Encode `node` and hold its frame.
    ///
    /// # Errors
    /// Returns `Error::BlockOverflow` if the frame exceeds the store's block.
    pub(super) fn stage<K: Key>(&mut self, node: &Node<K>) -> Result<()> {
        let frame = encode_node(node)?;
        if let Some(limit) = self.capacity {
            if frame.len() > limit {
                return Err(Error::BlockOverflow {
                    address: node.address(),
                    size: frame.len(),
                    limit,
                });
            }
        }
        self.frames.insert(node.address(), frame);
        Ok(())
    }

    pub(super) fn len(&self) -> usize {
        self.frames.len()
    }

    /// Write every staged frame in address order.
    pub(super) fn commit<S: BlockStore>(self, store: &mut S) -> Result<()> {
        let count = self.len();
        for (address, frame) in self.frames {
            store.write_block(address, &frame)?;
        }
        trace!(frames = count, "btree.batch.commit");
        Ok(())
    }
}

impl<K: Key, S: BlockStore> BTree<K, S> {
    /// An empty batch sized to this tree's store.
    pub(super) fn batch(&self) -> WriteBatch {
        WriteBatch::new(self.store.block_capacity())
    }

    /// Stage children `from..` of `parent` with links pointing back at it.
    ///
    /// Children are read from the store and staged only when their link
    /// changes.
    pub(super) fn stage_relinks(
        &mut self,
        batch: &mut WriteBatch,
        parent: &Node<K>,
        from: usize,
    ) -> Result<()> {
        if parent.is_leaf() {
            return Ok(());
        }
        for (slot, &child_addr) in parent.children.iter().enumerate().skip(from) {
            let mut child: Node<K> = self.store.read(child_addr)?;
            if child.parent_address != Some(parent.address) || child.index_in_parent != Some(slot)
            {
                child.set_parent(parent.address, slot);
                batch.stage(&child)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::BLOCK_SIZE;
    use crate::storage::block::BlockType;
    use crate::storage::MemoryDisk;

    #[test]
    fn test_oversized_node_stops_batch_before_writing() {
        let mut disk = MemoryDisk::new();
        let small_addr = disk.allocate().unwrap();
        let big_addr = disk.allocate().unwrap();

        let mut small = Node::<u32>::new_leaf(small_addr, None, None);
        small.insert_local(1, "one".to_string());
        let mut big = Node::<u32>::new_leaf(big_addr, None, None);
        big.insert_local(2, "x".repeat(BLOCK_SIZE));

        let mut batch = WriteBatch::new(Some(BLOCK_SIZE));
        batch.stage(&small).unwrap();
        assert!(matches!(
            batch.stage(&big),
            Err(Error::BlockOverflow { address, limit, .. })
                if address == big_addr && limit == BLOCK_SIZE
        ));
        drop(batch);

        assert!(matches!(
            disk.read::<u32>(small_addr),
            Err(Error::TypeMismatch { found: BlockType::Empty, .. })
        ));
    }

    #[test]
    fn test_restaging_keeps_last_frame() {
        let mut disk = MemoryDisk::new();
        let addr = disk.allocate().unwrap();

        let mut node = Node::<u32>::new_leaf(addr, None, None);
        let mut batch = WriteBatch::new(None);
        batch.stage(&node).unwrap();
        node.insert_local(9, "nine".to_string());
        batch.stage(&node).unwrap();
        assert_eq!(batch.len(), 1);

        batch.commit(&mut disk).unwrap();
        let stored: Node<u32> = disk.read(addr).unwrap();
        assert_eq!(stored.find_data(&9), Some("nine"));
    }

    #[test]
    fn test_unlimited_store_accepts_large_nodes() {
        let mut disk = MemoryDisk::new();
        let addr = disk.allocate().unwrap();

        let mut node = Node::<u32>::new_leaf(addr, None, None);
        node.insert_local(1, "y".repeat(2 * BLOCK_SIZE));
        let mut batch = WriteBatch::new(disk.block_capacity());
        batch.stage(&node).unwrap();
        batch.commit(&mut disk).unwrap();

        let stored: Node<u32> = disk.read(addr).unwrap();
        assert_eq!(stored.find_data(&1).map(str::len), Some(2 * BLOCK_SIZE));
    }
}
