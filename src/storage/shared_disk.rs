//! Shared handle over a block store.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::{Address, Result};

use super::BlockStore;

/// A cloneable handle to one block store.
///
/// Every clone refers to the same underlying store, so several trees can be
/// built on a single medium, each owning its own handle. Each block
/// operation holds the lock only for its own duration; a tree operation as a
/// whole is not atomic with respect to other handles.
///
/// # Example
/// ```
/// use blocktree::storage::{MemoryDisk, SharedDisk};
/// use blocktree::{BTree, TreeConfig};
///
/// let disk = SharedDisk::new(MemoryDisk::new());
/// let config = TreeConfig::new(4, 4).unwrap();
///
/// let mut users: BTree<u32, _> = BTree::new(disk.clone(), config).unwrap();
/// let mut tags: BTree<String, _> = BTree::new(disk.clone(), config).unwrap();
///
/// users.insert(1, "ada").unwrap();
/// tags.insert("rust".to_string(), 7).unwrap();
///
/// assert_eq!(users.find(&1).unwrap().as_deref(), Some("ada"));
/// assert_eq!(tags.find(&"rust".to_string()).unwrap().as_deref(), Some("7"));
/// ```
#[derive(Debug, Default)]
pub struct SharedDisk<S> {
    inner: Arc<Mutex<S>>,
}

impl<S> SharedDisk<S> {
    /// Wrap a store in a shared handle.
    pub fn new(store: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Run `f` with exclusive access to the underlying store.
    pub fn with<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut *guard)
    }
}

impl<S> Clone for SharedDisk<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: BlockStore> BlockStore for SharedDisk<S> {
    fn allocate(&mut self) -> Result<Address> {
        self.inner.lock().allocate()
    }

    fn read_block(&mut self, address: Address) -> Result<Vec<u8>> {
        self.inner.lock().read_block(address)
    }

    fn write_block(&mut self, address: Address, frame: &[u8]) -> Result<()> {
        self.inner.lock().write_block(address, frame)
    }

    fn block_count(&self) -> usize {
        self.inner.lock().block_count()
    }

    fn block_capacity(&self) -> Option<usize> {
        self.inner.lock().block_capacity()
    }
}
