//! Error types for blocktree.

use thiserror::Error;

use crate::common::Address;
use crate::storage::block::BlockType;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in blocktree.
///
/// Store-level variants signal a broken invariant or caller misuse and are
/// propagated untouched. Logical absence of a key is never an error: `find`
/// returns `None` and `delete` returns
/// [`DeleteOutcome::KeyNotFound`](crate::DeleteOutcome::KeyNotFound).
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from a file-backed store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A node could not be encoded into, or decoded from, a block payload.
    #[error("codec error: {0}")]
    Codec(#[from] postcard::Error),

    /// Read or write of an address that `allocate()` never returned.
    ///
    /// This indicates a dangling reference inside the tree.
    #[error("{0} has not been allocated")]
    UnallocatedAddress(Address),

    /// The block does not hold a node (never written, or its type tag
    /// disagrees with its contents).
    #[error("{address} holds no B-tree node (block type: {found})")]
    TypeMismatch {
        /// Block that was read.
        address: Address,
        /// What the block header claims to hold.
        found: BlockType,
    },

    /// A node was written to, or read from, a block other than its own.
    #[error("node {node} does not belong in {block}")]
    MisplacedNode {
        /// Block being accessed.
        block: Address,
        /// Address recorded inside the node.
        node: Address,
    },

    /// Stored checksum does not match the block contents.
    #[error("checksum mismatch in {0}")]
    ChecksumMismatch(Address),

    /// Encoded node does not fit in a fixed-size block.
    #[error("node for {address} needs {size} bytes, exceeding the {limit}-byte block")]
    BlockOverflow {
        /// Block being written.
        address: Address,
        /// Encoded frame size.
        size: usize,
        /// Block size limit.
        limit: usize,
    },

    /// Every address a `u32` can express has been handed out.
    #[error("block store is full: no address left after {0}")]
    AddressSpaceExhausted(Address),

    /// Tree shape parameters are out of range.
    #[error("invalid tree configuration: {0}")]
    InvalidConfig(String),

    /// A non-root node is missing its parent address or index in parent.
    #[error("{0} is not linked to a parent")]
    BrokenLink(Address),

    /// `BTree::open` was pointed at a block that has a parent.
    #[error("{0} is not a root node")]
    NotRoot(Address),

    /// The tree-wide checker found a node violating a structural invariant.
    #[error("invariant violated at {address}: {reason}")]
    InvariantViolation {
        /// Offending node.
        address: Address,
        /// Human-readable description of the violation.
        reason: String,
    },
}
