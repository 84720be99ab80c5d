//! On-block frame format.
//!
//! This module contains:
//! - [`BlockHeader`] - Metadata at the start of every written block
//! - [`BlockType`] - Discriminator for empty, leaf and internal blocks
//! - [`encode_node`] / [`decode_node`] - Node ⇄ frame conversion

mod frame;
mod header;

pub use frame::{decode_node, encode_node};
pub use header::{BlockHeader, BlockType};
