//! blocktree - A B-tree index whose nodes live as addressable blocks.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           blocktree                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Index Layer (index/btree/)                  │   │
//! │  │   BTree: find · insert + split · delete + rotate/merge   │   │
//! │  │   Node:  keys + values | keys + child addresses          │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                   ↓ allocate / read / write                     │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Storage Layer (storage/)                    │   │
//! │  │   BlockStore: MemoryDisk | FileDisk | SharedDisk<S>      │   │
//! │  │   Block frame: header (type, CRC32, length) + payload    │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! No node holds a reference to another node: every parent/child link is an
//! [`Address`] resolved through the store, and every modified node is
//! written back before an operation returns.
//!
//! # Modules
//! - [`common`] - Shared primitives (Address, TreeConfig, Error)
//! - [`storage`] - Block stores and the on-block frame format
//! - [`index`] - The B-tree
//!
//! # Quick Start
//! ```
//! use blocktree::{BTree, DeleteOutcome};
//!
//! let mut tree = BTree::in_memory(4, 3).unwrap();
//! tree.insert("apple".to_string(), 3).unwrap();
//! tree.insert("pear".to_string(), 5).unwrap();
//!
//! assert_eq!(tree.find(&"apple".to_string()).unwrap().as_deref(), Some("3"));
//! assert_eq!(
//!     tree.delete(&"plum".to_string()).unwrap(),
//!     DeleteOutcome::KeyNotFound
//! );
//! tree.validate().unwrap();
//! ```

pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::BLOCK_SIZE;
pub use common::{Address, Error, Result, TreeConfig};

pub use index::btree::{BTree, DeleteOutcome, Key, Node, TreeStats};
pub use storage::{BlockStore, FileDisk, MemoryDisk, SharedDisk};
