//! In-memory block store.

use tracing::trace;

use crate::common::{Address, Error, Result};

use super::BlockStore;

/// Blocks held in a growable vector.
///
/// Each block stores an encoded frame, so reads always hand back a fresh
/// copy of the node and never alias the stored state.
///
/// # Example
/// ```
/// use blocktree::storage::{BlockStore, MemoryDisk};
///
/// let mut disk = MemoryDisk::new();
/// let addr = disk.allocate().unwrap();
/// assert_eq!(addr.index(), 0);
/// assert_eq!(disk.block_count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryDisk {
    blocks: Vec<Vec<u8>>,
}

impl MemoryDisk {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total bytes held across all blocks.
    pub fn stored_bytes(&self) -> usize {
        self.blocks.iter().map(Vec::len).sum()
    }
}

/// Address for the block appended after `count` existing blocks.
fn next_address(count: usize) -> Result<Address> {
    Address::from_index(count)
        .ok_or_else(|| Error::AddressSpaceExhausted(Address::new(u32::MAX)))
}

impl BlockStore for MemoryDisk {
    fn allocate(&mut self) -> Result<Address> {
        let address = next_address(self.blocks.len())?;
        self.blocks.push(Vec::new());
        trace!(address = %address, "memory_disk.allocate");
        Ok(address)
    }

    fn read_block(&mut self, address: Address) -> Result<Vec<u8>> {
        self.blocks
            .get(address.index())
            .cloned()
            .ok_or(Error::UnallocatedAddress(address))
    }

    fn write_block(&mut self, address: Address, frame: &[u8]) -> Result<()> {
        let block = self
            .blocks
            .get_mut(address.index())
            .ok_or(Error::UnallocatedAddress(address))?;
        block.clear();
        block.extend_from_slice(frame);
        Ok(())
    }

    fn block_count(&self) -> usize {
        self.blocks.len()
    }
}
