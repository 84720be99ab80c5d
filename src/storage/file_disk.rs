//! File Disk - fixed-size blocks in a single file.
//!
//! The [`FileDisk`] handles all direct file operations:
//! - Reading and writing block frames
//! - Allocating new blocks
//! - Managing the backing file

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, trace};

use crate::common::config::BLOCK_SIZE;
use crate::common::{Address, Error, Result};

use super::BlockStore;

/// Stores blocks in a single file.
///
/// # File Layout
/// Blocks are laid out sequentially:
/// ```text
/// ┌──────────┬──────────┬──────────┬─────────┬──────────┐
/// │ Block 0  │ Block 1  │ Block 2  │  ...    │ Block N  │
/// │ (4KB)    │ (4KB)    │ (4KB)    │         │ (4KB)    │
/// └──────────┴──────────┴──────────┴─────────┴──────────┘
/// Offset:  0       4096      8192     ...     N×4096
/// ```
///
/// Block N is located at file offset `N × BLOCK_SIZE`. A frame shorter than
/// a block is zero-padded; a longer one is rejected.
///
/// # Durability
/// Writes go through the OS page cache. Call [`sync`](Self::sync) to force
/// them to stable storage.
#[derive(Debug)]
pub struct FileDisk {
    file: File,
    /// Number of blocks in the file.
    block_count: u32,
}

impl FileDisk {
    /// Create a new block file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;

        debug!(path = %path.as_ref().display(), "file_disk.create");
        Ok(Self {
            file,
            block_count: 0,
        })
    }

    /// Open an existing block file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        // Calculate block count from file size
        let file_size = file.metadata()?.len();
        let block_count = u32::try_from(file_size / BLOCK_SIZE as u64)
            .map_err(|_| Error::AddressSpaceExhausted(Address::new(u32::MAX)))?;

        debug!(path = %path.as_ref().display(), block_count, "file_disk.open");
        Ok(Self { file, block_count })
    }

    /// Open an existing block file, or create it if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    /// Flush all written blocks to stable storage.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Get the total size of the block file in bytes.
    #[inline]
    pub fn file_size(&self) -> u64 {
        (self.block_count as u64) * (BLOCK_SIZE as u64)
    }

    fn check_allocated(&self, address: Address) -> Result<u64> {
        if address.0 >= self.block_count {
            return Err(Error::UnallocatedAddress(address));
        }
        Ok((address.0 as u64) * (BLOCK_SIZE as u64))
    }
}

impl BlockStore for FileDisk {
    /// Extend the file with a zeroed block.
    fn allocate(&mut self) -> Result<Address> {
        let address = Address::new(self.block_count);
        let next = address
            .successor()
            .ok_or(Error::AddressSpaceExhausted(address))?;

        let offset = (address.0 as u64) * (BLOCK_SIZE as u64);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&[0u8; BLOCK_SIZE])?;

        self.block_count = next.0;
        trace!(address = %address, "file_disk.allocate");
        Ok(address)
    }

    fn read_block(&mut self, address: Address) -> Result<Vec<u8>> {
        let offset = self.check_allocated(address)?;
        self.file.seek(SeekFrom::Start(offset))?;

        let mut block = vec![0u8; BLOCK_SIZE];
        self.file.read_exact(&mut block)?;
        Ok(block)
    }

    fn write_block(&mut self, address: Address, frame: &[u8]) -> Result<()> {
        let offset = self.check_allocated(address)?;
        if frame.len() > BLOCK_SIZE {
            return Err(Error::BlockOverflow {
                address,
                size: frame.len(),
                limit: BLOCK_SIZE,
            });
        }

        let mut block = vec![0u8; BLOCK_SIZE];
        block[..frame.len()].copy_from_slice(frame);

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&block)?;
        Ok(())
    }

    fn block_count(&self) -> usize {
        self.block_count as usize
    }

    fn block_capacity(&self) -> Option<usize> {
        Some(BLOCK_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::btree::Node;
    use tempfile::tempdir;

    #[test]
    fn test_create_new_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.blocks");

        let disk = FileDisk::create(&path).unwrap();
        assert_eq!(disk.block_count(), 0);
        assert_eq!(disk.file_size(), 0);
    }

    #[test]
    fn test_create_existing_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.blocks");

        FileDisk::create(&path).unwrap();
        assert!(FileDisk::create(&path).is_err());
    }

    #[test]
    fn test_open_nonexistent_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nonexistent.blocks");

        assert!(matches!(FileDisk::open(&path), Err(Error::Io(_))));
    }

    #[test]
    fn test_allocate_extends_file() {
        let dir = tempdir().unwrap();
        let mut disk = FileDisk::create(dir.path().join("test.blocks")).unwrap();

        assert_eq!(disk.allocate().unwrap(), Address::new(0));
        assert_eq!(disk.allocate().unwrap(), Address::new(1));
        assert_eq!(disk.block_count(), 2);
        assert_eq!(disk.file_size(), 2 * BLOCK_SIZE as u64);

        let block = disk.read_block(Address::new(1)).unwrap();
        assert!(block.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_node_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.blocks");

        {
            let mut disk = FileDisk::create(&path).unwrap();
            let addr = disk.allocate().unwrap();
            let mut node = Node::new_leaf(addr, None, None);
            node.insert_local(42u64, "answer".to_string());
            disk.write(addr, &node).unwrap();
            disk.sync().unwrap();
        }

        {
            let mut disk = FileDisk::open(&path).unwrap();
            assert_eq!(disk.block_count(), 1);
            let node: Node<u64> = disk.read(Address::new(0)).unwrap();
            assert_eq!(node.find_data(&42), Some("answer"));
        }
    }

    #[test]
    fn test_allocate_stops_at_last_address() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.blocks");
        let mut disk = FileDisk::create(&path).unwrap();
        disk.block_count = u32::MAX;

        assert!(matches!(
            disk.allocate(),
            Err(Error::AddressSpaceExhausted(a)) if a == Address::new(u32::MAX)
        ));
        assert_eq!(disk.block_count, u32::MAX);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn test_unallocated_access_fails() {
        let dir = tempdir().unwrap();
        let mut disk = FileDisk::create(dir.path().join("test.blocks")).unwrap();
        disk.allocate().unwrap();

        assert!(matches!(
            disk.read_block(Address::new(1)),
            Err(Error::UnallocatedAddress(_))
        ));
        assert!(matches!(
            disk.write_block(Address::new(3), &[1, 2, 3]),
            Err(Error::UnallocatedAddress(_))
        ));
    }

    #[test]
    fn test_oversized_frame_is_rejected() {
        let dir = tempdir().unwrap();
        let mut disk = FileDisk::create(dir.path().join("test.blocks")).unwrap();
        let addr = disk.allocate().unwrap();

        let result = disk.write_block(addr, &vec![1u8; BLOCK_SIZE + 1]);
        assert!(matches!(
            result,
            Err(Error::BlockOverflow { size, .. }) if size == BLOCK_SIZE + 1
        ));
    }

    #[test]
    fn test_open_or_create() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.blocks");

        {
            let mut disk = FileDisk::open_or_create(&path).unwrap();
            assert_eq!(disk.block_count(), 0);
            disk.allocate().unwrap();
        }

        {
            let disk = FileDisk::open_or_create(&path).unwrap();
            assert_eq!(disk.block_count(), 1);
        }
    }
}
