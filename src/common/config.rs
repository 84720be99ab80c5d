//! Configuration constants and tree shape parameters.

use crate::common::{Error, Result};

/// Size of a block in a [`FileDisk`](crate::storage::FileDisk) (4KB).
///
/// Matches the OS page size on most systems. An encoded node must fit in a
/// single block; larger nodes are rejected with `Error::BlockOverflow`.
pub const BLOCK_SIZE: usize = 4096;

/// Smallest permitted branching factor `M`.
pub const MIN_FANOUT: usize = 2;

/// Smallest permitted leaf capacity `L`.
pub const MIN_LEAF_CAPACITY: usize = 1;

/// Shape parameters of a B-tree.
///
/// - `fanout` (`M`): maximum number of children of an internal node.
/// - `leaf_capacity` (`L`): maximum number of entries in a leaf.
///
/// Together with the root address these are the only state a
/// [`BTree`](crate::BTree) keeps outside the store.
///
/// # Example
/// ```
/// use blocktree::TreeConfig;
///
/// let config = TreeConfig::new(5, 3).unwrap();
/// assert_eq!(config.min_children(), 3);
/// assert_eq!(config.min_leaf_entries(), 2);
///
/// assert!(TreeConfig::new(1, 3).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeConfig {
    fanout: usize,
    leaf_capacity: usize,
}

impl TreeConfig {
    /// Create a validated configuration.
    ///
    /// # Errors
    /// Returns `Error::InvalidConfig` if `fanout < 2` or `leaf_capacity < 1`.
    pub fn new(fanout: usize, leaf_capacity: usize) -> Result<Self> {
        if fanout < MIN_FANOUT {
            return Err(Error::InvalidConfig(format!(
                "fanout must be at least {MIN_FANOUT}, got {fanout}"
            )));
        }
        if leaf_capacity < MIN_LEAF_CAPACITY {
            return Err(Error::InvalidConfig(format!(
                "leaf capacity must be at least {MIN_LEAF_CAPACITY}, got {leaf_capacity}"
            )));
        }
        Ok(Self {
            fanout,
            leaf_capacity,
        })
    }

    /// Maximum number of children of an internal node (`M`).
    #[inline]
    pub fn fanout(&self) -> usize {
        self.fanout
    }

    /// Maximum number of entries in a leaf (`L`).
    #[inline]
    pub fn leaf_capacity(&self) -> usize {
        self.leaf_capacity
    }

    /// Minimum number of children of a non-root internal node: `ceil(M/2)`.
    #[inline]
    pub fn min_children(&self) -> usize {
        (self.fanout + 1) / 2
    }

    /// Minimum number of entries of a non-root leaf: `ceil(L/2)`.
    #[inline]
    pub fn min_leaf_entries(&self) -> usize {
        (self.leaf_capacity + 1) / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_size_is_power_of_two() {
        assert!(BLOCK_SIZE.is_power_of_two());
        assert_eq!(BLOCK_SIZE, 4096);
    }

    #[test]
    fn test_smallest_config() {
        let config = TreeConfig::new(2, 1).unwrap();
        assert_eq!(config.fanout(), 2);
        assert_eq!(config.leaf_capacity(), 1);
        assert_eq!(config.min_children(), 1);
        assert_eq!(config.min_leaf_entries(), 1);
    }

    #[test]
    fn test_minimums_round_up() {
        let even = TreeConfig::new(6, 6).unwrap();
        assert_eq!(even.min_children(), 3);
        assert_eq!(even.min_leaf_entries(), 3);

        let odd = TreeConfig::new(5, 3).unwrap();
        assert_eq!(odd.min_children(), 3);
        assert_eq!(odd.min_leaf_entries(), 2);
    }

    #[test]
    fn test_rejects_small_values() {
        assert!(matches!(TreeConfig::new(1, 4), Err(Error::InvalidConfig(_))));
        assert!(matches!(TreeConfig::new(4, 0), Err(Error::InvalidConfig(_))));
    }
}
