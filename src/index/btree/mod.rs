//! B-tree index stored block-by-block.
//!
//! - [`Node`] - one block's worth of keys plus values or child addresses
//! - [`BTree`] - lookup, insertion with splitting, deletion with
//!   rotation/merge, and a tree-wide invariant checker
//!
//! Nodes refer to each other only by [`Address`](crate::Address); every hop
//! between nodes is a read from the [`BlockStore`](crate::storage::BlockStore).

mod batch;
mod node;
mod rebalance;
mod tree;
mod validate;

pub use node::{Key, Node};
pub use rebalance::DeleteOutcome;
pub use tree::BTree;
pub use validate::TreeStats;
