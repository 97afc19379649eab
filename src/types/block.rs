//! Block header and block payload types.
//!
//! ## Layout
//!
//! A block image is exactly [`BLOCK_SIZE`] bytes:
//!
//! ```text
//! +----------------+----------------+---------------------------+
//! | offset (u64 LE)| cle (u64 LE)   | payload (PAYLOAD_SIZE)    |
//! +----------------+----------------+---------------------------+
//!   cle = count | length << 28 | exponent << 56
//! ```
//!
//! - `offset`: number of values in the series before this block
//! - `count`: values encoded in this block (28 bits)
//! - `length`: encoded payload length in bytes (28 bits)
//! - `exponent`: decimal places shared by every value in the block (5 bits)
//!
//! Sealed blocks never change. They are shared as `Arc<Block>` between the
//! cache and the storage backend.

use std::sync::Arc;

/// Opaque series handle, assigned by the block cache.
pub type SeriesId = u32;

/// Size of a full block image (header + payload), in bytes.
pub const BLOCK_SIZE: usize = 1460;

/// Size of the serialized [`BlockHdr`], in bytes.
pub const HDR_SIZE: usize = 16;

/// Payload capacity of a block, in bytes.
pub const PAYLOAD_SIZE: usize = BLOCK_SIZE - HDR_SIZE;

const COUNT_MASK: u64 = 0x0fff_ffff;
const LENGTH_SHIFT: u32 = 28;
const EXPONENT_MASK: u64 = 0x1f;
const EXPONENT_SHIFT: u32 = 56;

// ============================================================================
// BlockHdr
// ============================================================================

/// Block metadata, loadable without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct BlockHdr {
    /// Series offset (value count) of the first value in this block
    pub offset: u64,

    /// Number of values in this block
    pub count: u32,

    /// Encoded payload length in bytes
    pub length: u32,

    /// Decimal places of every value in this block
    pub exponent: u8,
}

impl BlockHdr {
    /// Largest representable value count
    pub const COUNT_MAX: u32 = COUNT_MASK as u32;

    /// Largest representable exponent
    pub const EXPONENT_MAX: u8 = EXPONENT_MASK as u8;

    /// Create an empty header for a block starting at `offset`.
    pub fn new(offset: u64, exponent: u8) -> Self {
        Self {
            offset,
            count: 0,
            length: 0,
            exponent,
        }
    }

    /// Series offset one past the last value of this block
    #[inline]
    pub fn end(&self) -> u64 {
        self.offset + self.count as u64
    }

    /// True if `offset` falls inside this block
    #[inline]
    pub fn contains(&self, offset: u64) -> bool {
        offset >= self.offset && offset < self.end()
    }

    /// Serialize to the 16-byte little-endian wire form.
    pub fn to_bytes(&self) -> [u8; HDR_SIZE] {
        let cle = (self.count as u64 & COUNT_MASK)
            | ((self.length as u64 & COUNT_MASK) << LENGTH_SHIFT)
            | ((self.exponent as u64 & EXPONENT_MASK) << EXPONENT_SHIFT);
        let mut out = [0u8; HDR_SIZE];
        out[..8].copy_from_slice(&self.offset.to_le_bytes());
        out[8..].copy_from_slice(&cle.to_le_bytes());
        out
    }

    /// Parse the 16-byte wire form.
    ///
    /// Returns `None` if `bytes` is shorter than [`HDR_SIZE`].
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let offset = u64::from_le_bytes(bytes.get(..8)?.try_into().ok()?);
        let cle = u64::from_le_bytes(bytes.get(8..HDR_SIZE)?.try_into().ok()?);
        Some(Self {
            offset,
            count: (cle & COUNT_MASK) as u32,
            length: ((cle >> LENGTH_SHIFT) & COUNT_MASK) as u32,
            exponent: ((cle >> EXPONENT_SHIFT) & EXPONENT_MASK) as u8,
        })
    }
}

// ============================================================================
// Block
// ============================================================================

/// Cache/backend address of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockKey {
    /// Owning series
    pub series: SeriesId,
    /// Absolute block index within the series
    pub index: u32,
}

impl BlockKey {
    /// Create a block key
    #[inline]
    pub fn new(series: SeriesId, index: u32) -> Self {
        Self { series, index }
    }
}

/// A sealed (or snapshotted) block: header plus encoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    key: BlockKey,
    hdr: BlockHdr,
    payload: Box<[u8]>,
}

impl Block {
    /// Build a block from its header and encoded bytes.
    ///
    /// `hdr.length` is taken from `payload.len()`.
    pub fn new(key: BlockKey, mut hdr: BlockHdr, payload: &[u8]) -> Self {
        hdr.length = payload.len() as u32;
        Self {
            key,
            hdr,
            payload: payload.into(),
        }
    }

    /// Parse a full block image as written by [`Block::to_image`].
    ///
    /// Returns `None` if the image is truncated or its length field
    /// exceeds the payload capacity.
    pub fn from_image(key: BlockKey, image: &[u8]) -> Option<Self> {
        let hdr = BlockHdr::from_bytes(image)?;
        let length = hdr.length as usize;
        if length > PAYLOAD_SIZE {
            return None;
        }
        let payload = image.get(HDR_SIZE..HDR_SIZE + length)?;
        Some(Self {
            key,
            hdr,
            payload: payload.into(),
        })
    }

    /// Full zero-padded [`BLOCK_SIZE`] image.
    pub fn to_image(&self) -> Vec<u8> {
        let mut image = vec![0u8; BLOCK_SIZE];
        image[..HDR_SIZE].copy_from_slice(&self.hdr.to_bytes());
        image[HDR_SIZE..HDR_SIZE + self.payload.len()].copy_from_slice(&self.payload);
        image
    }

    /// Block address
    #[inline]
    pub fn key(&self) -> BlockKey {
        self.key
    }

    /// Owning series
    #[inline]
    pub fn series(&self) -> SeriesId {
        self.key.series
    }

    /// Absolute block index
    #[inline]
    pub fn index(&self) -> u32 {
        self.key.index
    }

    /// Block header
    #[inline]
    pub fn hdr(&self) -> &BlockHdr {
        &self.hdr
    }

    /// Encoded payload
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// Shared payload view, so decoders can own a reference to a cached block.
#[derive(Debug, Clone)]
pub struct Payload(pub Arc<Block>);

impl AsRef<[u8]> for Payload {
    fn as_ref(&self) -> &[u8] {
        self.0.payload()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
