//! Block address type.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies a block in a [`BlockStore`](crate::storage::BlockStore).
///
/// Addresses are handed out sequentially by `allocate()` and are never
/// reused: once a block is allocated its address stays valid for the
/// lifetime of the store, even after the tree stops referencing it.
///
/// Using `u32` matches the on-disk layout of [`FileDisk`](crate::storage::FileDisk),
/// where block N lives at offset `N × BLOCK_SIZE`.
///
/// # Example
/// ```
/// use blocktree::Address;
///
/// let addr = Address::new(42);
/// assert_eq!(addr.index(), 42);
/// assert_eq!(addr.to_string(), "Block(42)");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub u32);

impl Address {
    /// Create a new Address.
    #[inline]
    pub fn new(id: u32) -> Self {
        Address(id)
    }

    /// Address of the block at position `index`, if it fits in a `u32`.
    #[inline]
    pub fn from_index(index: usize) -> Option<Self> {
        u32::try_from(index).ok().map(Address)
    }

    /// Address following this one, `None` past `u32::MAX`.
    #[inline]
    pub fn successor(&self) -> Option<Self> {
        self.0.checked_add(1).map(Address)
    }

    /// Position of the block in the store, usable as a vector index.
    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Block({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_new() {
        let addr = Address::new(42);
        assert_eq!(addr.0, 42);
        assert_eq!(addr.index(), 42);
    }

    #[test]
    fn test_address_ordering() {
        assert!(Address::new(1) < Address::new(2));
        assert!(Address::new(5) > Address::new(3));
    }

    #[test]
    fn test_address_limits() {
        assert_eq!(Address::from_index(7), Some(Address::new(7)));
        assert_eq!(Address::from_index(u32::MAX as usize), Some(Address::new(u32::MAX)));
        assert_eq!(Address::new(3).successor(), Some(Address::new(4)));
        assert_eq!(Address::new(u32::MAX).successor(), None);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_index_beyond_u32_has_no_address() {
        assert_eq!(Address::from_index(u32::MAX as usize + 1), None);
    }

    #[test]
    fn test_address_display() {
        assert_eq!(format!("{}", Address::new(7)), "Block(7)");
    }
}
