//! Conversion between [`Node`]s and block frames.
//!
//! A frame is a [`BlockHeader`] followed by the postcard-encoded node.
//! Decoding always produces a fresh, independent node: mutating it has no
//! effect on the stored block until it is written back.

use tracing::trace;

use crate::common::{Address, Error, Result};
use crate::index::btree::{Key, Node};

use super::header::{BlockHeader, BlockType};

/// Encode a node into a checksummed frame.
pub fn encode_node<K: Key>(node: &Node<K>) -> Result<Vec<u8>> {
    let payload = postcard::to_allocvec(node)?;
    let block_type = if node.is_leaf() {
        BlockType::Leaf
    } else {
        BlockType::Internal
    };

    let payload_len = u32::try_from(payload.len()).map_err(|_| Error::BlockOverflow {
        address: node.address(),
        size: payload.len(),
        limit: u32::MAX as usize,
    })?;

    let mut frame = vec![0u8; BlockHeader::SIZE + payload.len()];
    let mut header = BlockHeader::new(block_type, payload_len);
    header.write_to(&mut frame);
    frame[BlockHeader::SIZE..].copy_from_slice(&payload);

    header.checksum = BlockHeader::compute_checksum(&frame);
    header.write_to(&mut frame);

    trace!(address = %node.address(), bytes = frame.len(), "block.encode");
    Ok(frame)
}

/// Decode the node stored in `address` from its frame.
///
/// Trailing bytes past the payload (fixed-size block padding) are ignored.
///
/// # Errors
/// - `Error::TypeMismatch` if the block holds no node, or the node's kind
///   disagrees with the header
/// - `Error::ChecksumMismatch` if the frame is truncated or corrupted
/// - `Error::MisplacedNode` if the node records a different address
/// - `Error::Codec` if the payload cannot be decoded
pub fn decode_node<K: Key>(address: Address, frame: &[u8]) -> Result<Node<K>> {
    if frame.len() < BlockHeader::SIZE {
        return Err(Error::TypeMismatch {
            address,
            found: BlockType::Empty,
        });
    }

    let header = BlockHeader::from_bytes(frame);
    if !header.block_type.is_node() {
        return Err(Error::TypeMismatch {
            address,
            found: header.block_type,
        });
    }

    let end = BlockHeader::SIZE + header.payload_len as usize;
    if end > frame.len() || !header.verify_checksum(&frame[..end]) {
        return Err(Error::ChecksumMismatch(address));
    }

    let node: Node<K> = postcard::from_bytes(&frame[BlockHeader::SIZE..end])?;
    if node.is_leaf() != (header.block_type == BlockType::Leaf) {
        return Err(Error::TypeMismatch {
            address,
            found: header.block_type,
        });
    }
    if node.address() != address {
        return Err(Error::MisplacedNode {
            block: address,
            node: node.address(),
        });
    }

    Ok(node)
}
