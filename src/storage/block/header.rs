//! Block header and type definitions.
//!
//! Every written block starts with a [`BlockHeader`] containing:
//! - [`BlockType`] discriminator
//! - CRC32 checksum for integrity
//! - Length of the encoded node payload

use std::fmt;

/// Type of content stored in a block.
///
/// Uses `#[repr(u8)]` to guarantee a 1-byte representation for serialization.
/// A freshly allocated block is all zeros and therefore reads as `Empty`.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    /// Allocated but never written.
    #[default]
    Empty = 0,
    /// B-tree leaf node.
    Leaf = 1,
    /// B-tree internal (non-leaf) node.
    Internal = 2,
    /// Unrecognized tag (corrupted block).
    Unknown = 255,
}

impl BlockType {
    /// Convert from u8, returning Unknown for unrecognized values.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => BlockType::Empty,
            1 => BlockType::Leaf,
            2 => BlockType::Internal,
            _ => BlockType::Unknown,
        }
    }

    /// Whether this block holds a B-tree node.
    #[inline]
    pub fn is_node(&self) -> bool {
        matches!(self, BlockType::Leaf | BlockType::Internal)
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BlockType::Empty => "empty",
            BlockType::Leaf => "leaf",
            BlockType::Internal => "internal",
            BlockType::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Metadata stored at the beginning of every written block.
///
/// # Layout (9 bytes)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       1     block_type (BlockType as u8)
/// 1       4     checksum (CRC32, little-endian)
/// 5       4     payload_len (little-endian)
/// ```
///
/// # Checksum
/// The checksum covers the header and payload with the checksum field itself
/// set to zero. Bytes past `SIZE + payload_len` (block padding) are not covered.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// Type of this block.
    pub block_type: BlockType,
    /// CRC32 checksum of the frame.
    pub checksum: u32,
    /// Number of payload bytes following the header.
    pub payload_len: u32,
}

impl BlockHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = 9;

    /// Offset of each field within the header.
    pub const OFFSET_BLOCK_TYPE: usize = 0;
    pub const OFFSET_CHECKSUM: usize = 1;
    pub const OFFSET_PAYLOAD_LEN: usize = 5;

    /// Create a new header. The checksum starts at zero.
    pub fn new(block_type: BlockType, payload_len: u32) -> Self {
        Self {
            block_type,
            checksum: 0,
            payload_len,
        }
    }

    /// Read a header from the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < BlockHeader::SIZE`.
    pub fn from_bytes(data: &[u8]) -> Self {
        assert!(data.len() >= Self::SIZE, "buffer too small for BlockHeader");

        let block_type = BlockType::from_u8(data[Self::OFFSET_BLOCK_TYPE]);

        let checksum = u32::from_le_bytes([
            data[Self::OFFSET_CHECKSUM],
            data[Self::OFFSET_CHECKSUM + 1],
            data[Self::OFFSET_CHECKSUM + 2],
            data[Self::OFFSET_CHECKSUM + 3],
        ]);

        let payload_len = u32::from_le_bytes([
            data[Self::OFFSET_PAYLOAD_LEN],
            data[Self::OFFSET_PAYLOAD_LEN + 1],
            data[Self::OFFSET_PAYLOAD_LEN + 2],
            data[Self::OFFSET_PAYLOAD_LEN + 3],
        ]);

        Self {
            block_type,
            checksum,
            payload_len,
        }
    }

    /// Write this header to the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < BlockHeader::SIZE`.
    pub fn write_to(&self, data: &mut [u8]) {
        assert!(data.len() >= Self::SIZE, "buffer too small for BlockHeader");

        data[Self::OFFSET_BLOCK_TYPE] = self.block_type as u8;
        data[Self::OFFSET_CHECKSUM..Self::OFFSET_CHECKSUM + 4]
            .copy_from_slice(&self.checksum.to_le_bytes());
        data[Self::OFFSET_PAYLOAD_LEN..Self::OFFSET_PAYLOAD_LEN + 4]
            .copy_from_slice(&self.payload_len.to_le_bytes());
    }

    /// Compute the CRC32 checksum of a frame (header + payload).
    ///
    /// The checksum field (bytes 1-4) is hashed as zeros so the checksum
    /// doesn't include itself.
    pub fn compute_checksum(frame: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&frame[..Self::OFFSET_CHECKSUM]);
        hasher.update(&[0u8; 4]);
        hasher.update(&frame[Self::OFFSET_CHECKSUM + 4..]);
        hasher.finalize()
    }

    /// Verify that the stored checksum matches the frame contents.
    pub fn verify_checksum(&self, frame: &[u8]) -> bool {
        self.checksum == Self::compute_checksum(frame)
    }
}

// ============================================================================
// TESTS
// ============================================================================
