//! Storage layer - the block store a B-tree lives on.
//!
//! This module handles block-addressed storage:
//! - [`BlockStore`] - The allocate/read/write contract consumed by the tree
//! - [`MemoryDisk`] - Blocks held in memory
//! - [`FileDisk`] - Fixed-size blocks in a single file
//! - [`SharedDisk`] - A cloneable handle letting several trees share one store
//! - [`block`] - The on-block frame format

pub mod block;
mod file_disk;
mod memory_disk;
mod shared_disk;

pub use file_disk::FileDisk;
pub use memory_disk::MemoryDisk;
pub use shared_disk::SharedDisk;

use crate::common::{Address, Error, Result};
use crate::index::btree::{Key, Node};

/// An address-indexed block medium.
///
/// Implementors only move raw frames around; the provided [`read`](Self::read)
/// and [`write`](Self::write) methods convert between frames and nodes.
///
/// # Contract
/// - `allocate()` returns a fresh, never-before-returned address whose block
///   is empty (reads of it fail with `Error::TypeMismatch` until written).
/// - Reading or writing an address never returned by `allocate()` fails with
///   `Error::UnallocatedAddress`.
/// - Blocks are never freed; addresses are never reused.
///
/// A store is single-client: callers needing concurrent access must wrap it
/// (see [`SharedDisk`]).
pub trait BlockStore {
    /// Allocate a new, empty block.
    fn allocate(&mut self) -> Result<Address>;

    /// Read the raw frame stored at `address`.
    fn read_block(&mut self, address: Address) -> Result<Vec<u8>>;

    /// Replace the raw frame stored at `address`.
    fn write_block(&mut self, address: Address, frame: &[u8]) -> Result<()>;

    /// Number of blocks allocated so far.
    fn block_count(&self) -> usize;

    /// Largest frame a single block can hold, `None` if unbounded.
    fn block_capacity(&self) -> Option<usize> {
        None
    }

    /// Read and decode the node stored at `address`.
    ///
    /// The returned node is an independent snapshot.
    fn read<K: Key>(&mut self, address: Address) -> Result<Node<K>> {
        let frame = self.read_block(address)?;
        block::decode_node(address, &frame)
    }

    /// Encode `node` and store it at `address`.
    ///
    /// # Errors
    /// Returns `Error::MisplacedNode` if `node` belongs to another address.
    fn write<K: Key>(&mut self, address: Address, node: &Node<K>) -> Result<()> {
        if node.address() != address {
            return Err(Error::MisplacedNode {
                block: address,
                node: node.address(),
            });
        }
        let frame = block::encode_node(node)?;
        self.write_block(address, &frame)
    }
}
