//! Tree-wide structural checks and in-order scanning.

use crate::common::{Address, Error, Result};
use crate::storage::BlockStore;

use super::node::{Key, Node};
use super::tree::BTree;

/// Shape summary produced by [`BTree::validate`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TreeStats {
    /// Number of levels; a lone root leaf has height 1.
    pub height: usize,
    /// Nodes reachable from the root.
    pub nodes: usize,
    /// Leaves reachable from the root.
    pub leaves: usize,
    /// Key/value entries stored in the leaves.
    pub entries: usize,
}

/// A node still to be checked, with what its parent expects of it.
struct Pending<K> {
    address: Address,
    link: Option<(Address, usize)>,
    lower: Option<K>,
    upper: Option<K>,
    depth: usize,
}

fn violation(address: Address, reason: impl Into<String>) -> Error {
    Error::InvariantViolation {
        address,
        reason: reason.into(),
    }
}

impl<K: Key, S: BlockStore> BTree<K, S> {
    /// Walk every reachable node and check the structural invariants.
    ///
    /// Checked per node:
    /// - keys strictly ascending
    /// - leaf: no children, one value per key, at most `L` entries
    /// - internal: no values, `children == keys + 1`, at most `M` children
    /// - root: no parent link; at least two children if internal
    /// - non-root: parent address and slot match the parent's child list,
    ///   occupancy at or above the minimum
    /// - every key lies within the range its ancestors' separators allow
    /// - all leaves at the same depth
    ///
    /// # Errors
    /// Returns `Error::InvariantViolation` describing the first failure, or a
    /// store error if a node cannot be read.
    pub fn validate(&mut self) -> Result<TreeStats> {
        let mut stats = TreeStats::default();
        let mut leaf_depth: Option<usize> = None;
        let block_limit = self.store.block_count();

        let mut stack = vec![Pending {
            address: self.root,
            link: None,
            lower: None,
            upper: None,
            depth: 1,
        }];

        while let Some(item) = stack.pop() {
            stats.nodes += 1;
            if stats.nodes > block_limit {
                return Err(violation(item.address, "node reachable more than once"));
            }

            let node: Node<K> = self.store.read(item.address)?;
            self.check_node(&node, &item)?;

            if node.is_leaf() {
                stats.leaves += 1;
                stats.entries += node.keys.len();
                match leaf_depth {
                    None => leaf_depth = Some(item.depth),
                    Some(depth) if depth != item.depth => {
                        return Err(violation(
                            node.address,
                            format!("leaf at depth {} but others at depth {depth}", item.depth),
                        ));
                    }
                    Some(_) => {}
                }
                continue;
            }

            for (slot, &child) in node.children.iter().enumerate() {
                let lower = if slot == 0 {
                    item.lower.clone()
                } else {
                    Some(node.keys[slot - 1].clone())
                };
                let upper = if slot == node.keys.len() {
                    item.upper.clone()
                } else {
                    Some(node.keys[slot].clone())
                };
                stack.push(Pending {
                    address: child,
                    link: Some((node.address, slot)),
                    lower,
                    upper,
                    depth: item.depth + 1,
                });
            }
        }

        stats.height = leaf_depth.unwrap_or(0);
        Ok(stats)
    }

    fn check_node(&self, node: &Node<K>, item: &Pending<K>) -> Result<()> {
        let address = node.address;

        if node.keys.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(violation(address, "keys not strictly ascending"));
        }

        if node.is_leaf() {
            if !node.children.is_empty() {
                return Err(violation(address, "leaf has children"));
            }
            if node.data.len() != node.keys.len() {
                return Err(violation(address, "leaf value count differs from key count"));
            }
            if node.keys.len() > self.config.leaf_capacity() {
                return Err(violation(address, "leaf over capacity"));
            }
        } else {
            if !node.data.is_empty() {
                return Err(violation(address, "internal node holds values"));
            }
            if node.children.len() != node.keys.len() + 1 {
                return Err(violation(address, "child count is not key count + 1"));
            }
            if node.children.len() > self.config.fanout() {
                return Err(violation(address, "internal node over fanout"));
            }
        }

        match item.link {
            None => {
                if node.parent_address.is_some() || node.index_in_parent.is_some() {
                    return Err(violation(address, "root has a parent link"));
                }
                if !node.is_leaf() && node.children.len() < 2 {
                    return Err(violation(address, "internal root has fewer than two children"));
                }
            }
            Some((parent, slot)) => {
                if node.parent_address != Some(parent) {
                    return Err(violation(
                        address,
                        format!("parent is {:?}, expected {parent}", node.parent_address),
                    ));
                }
                if node.index_in_parent != Some(slot) {
                    return Err(violation(
                        address,
                        format!("index in parent is {:?}, expected {slot}", node.index_in_parent),
                    ));
                }
                if self.is_deficient(node) {
                    return Err(violation(address, "non-root node below minimum occupancy"));
                }
            }
        }

        // Leaf keys sit in [lower, upper); separators may equal either bound.
        let out_of_range = node.keys.iter().any(|key| {
            let below = item.lower.as_ref().is_some_and(|lower| key < lower);
            let above = item.upper.as_ref().is_some_and(|upper| {
                if node.is_leaf() {
                    key >= upper
                } else {
                    key > upper
                }
            });
            below || above
        });
        if out_of_range {
            return Err(violation(address, "key outside the range allowed by ancestors"));
        }

        Ok(())
    }

    /// All entries in ascending key order.
    pub fn entries(&mut self) -> Result<Vec<(K, String)>> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];

        while let Some(address) = stack.pop() {
            let node: Node<K> = self.store.read(address)?;
            if node.is_leaf() {
                out.extend(node.keys.into_iter().zip(node.data));
            } else {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryDisk;

    #[test]
    fn test_empty_tree_stats() {
        let mut tree: BTree<u32, MemoryDisk> = BTree::in_memory(4, 4).unwrap();
        let stats = tree.validate().unwrap();
        assert_eq!(
            stats,
            TreeStats {
                height: 1,
                nodes: 1,
                leaves: 1,
                entries: 0
            }
        );
        assert!(tree.entries().unwrap().is_empty());
    }

    #[test]
    fn test_stats_after_growth() {
        let mut tree = BTree::in_memory(3, 3).unwrap();
        for i in 0..5u32 {
            tree.insert(i, i).unwrap();
        }
        let stats = tree.validate().unwrap();
        assert_eq!(stats.height, 2);
        assert_eq!(stats.nodes, 3);
        assert_eq!(stats.leaves, 2);
        assert_eq!(stats.entries, 5);
    }

    #[test]
    fn test_entries_are_sorted() {
        let mut tree = BTree::in_memory(4, 2).unwrap();
        for i in [5u32, 1, 9, 3, 7, 2, 8, 0, 6, 4] {
            tree.insert(i, i * 100).unwrap();
        }
        let entries = tree.entries().unwrap();
        let keys: Vec<u32> = entries.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, (0..10).collect::<Vec<_>>());
        assert_eq!(entries[3].1, "300");
    }

    #[test]
    fn test_detects_broken_parent_link() {
        let mut tree = BTree::in_memory(3, 3).unwrap();
        for i in 0..5u32 {
            tree.insert(i, i).unwrap();
        }
        let root_addr = tree.root_address();
        let root = tree.read_node(root_addr).unwrap();
        let mut right = tree.read_node(root.children_addresses()[1]).unwrap();
        right.index_in_parent = Some(0);
        right.write_back(&mut tree.store).unwrap();

        assert!(matches!(
            tree.validate(),
            Err(Error::InvariantViolation { address, .. }) if address == right.address()
        ));
    }

    #[test]
    fn test_detects_key_out_of_range() {
        let mut tree = BTree::in_memory(3, 3).unwrap();
        for i in 0..5u32 {
            tree.insert(i, i).unwrap();
        }
        let root_addr = tree.root_address();
        let root = tree.read_node(root_addr).unwrap();
        let mut left = tree.read_node(root.children_addresses()[0]).unwrap();
        left.insert_local(10, "10".to_string());
        left.write_back(&mut tree.store).unwrap();

        assert!(matches!(
            tree.validate(),
            Err(Error::InvariantViolation { .. })
        ));
    }

    #[test]
    fn test_detects_underfull_leaf() {
        let mut tree = BTree::in_memory(3, 4).unwrap();
        for i in 0..5u32 {
            tree.insert(i, i).unwrap();
        }
        let root_addr = tree.root_address();
        let root = tree.read_node(root_addr).unwrap();
        let mut left = tree.read_node(root.children_addresses()[0]).unwrap();
        left.remove_local(&0);
        left.write_back(&mut tree.store).unwrap();

        let err = tree.validate().unwrap_err();
        assert!(err.to_string().contains("below minimum occupancy"));
    }
}
