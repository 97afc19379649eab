//! Per-series state held by the store.
//!
//! ## Design
//!
//! A series is a sequence of blocks addressed by absolute index. The store
//! keeps the header of every retained block in memory, so offsets, counts
//! and block boundaries never require a backend round trip. Payloads live
//! in the block cache (sealed blocks) or in the series itself (the tail).
//!
//! ```text
//! first_block          first_block + hdrs.len()
//!      |                        |
//!      v                        v
//!   [hdr][hdr][hdr] ... [hdr] [tail]
//!    sealed, immutable         open, owned by the writer
//! ```

use std::sync::Arc;

use crate::codec::{CodecKind, Encode};
use crate::types::{Block, BlockHdr, BlockKey, SeriesId, PAYLOAD_SIZE};

/// The open block of a series.
pub struct Tail {
    /// Absolute block index
    pub index: u32,

    /// Header, `count` kept current on every write
    pub hdr: BlockHdr,

    /// Encoder owning the payload buffer
    pub encoder: Box<dyn Encode>,
}

impl std::fmt::Debug for Tail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tail")
            .field("index", &self.index)
            .field("hdr", &self.hdr)
            .field("pos", &self.encoder.pos())
            .finish()
    }
}

impl Tail {
    /// Start an empty block
    pub fn new(codec: CodecKind, index: u32, offset: u64, exponent: u8) -> Self {
        Self {
            index,
            hdr: BlockHdr::new(offset, exponent),
            encoder: codec.encoder(vec![0u8; PAYLOAD_SIZE]),
        }
    }

    /// Append a mantissa; `false` if the block is full.
    pub fn write(&mut self, mantissa: i64) -> bool {
        if self.hdr.count >= BlockHdr::COUNT_MAX || !self.encoder.write(mantissa) {
            return false;
        }
        self.hdr.count += 1;
        true
    }

    /// Immutable copy of the block as written so far
    pub fn snapshot(&self, series: SeriesId) -> Block {
        Block::new(BlockKey::new(series, self.index), self.hdr, self.encoder.encoded())
    }
}

/// State of one allocated series.
#[derive(Debug)]
pub struct Series {
    /// Value codec for every block
    pub codec: CodecKind,

    /// Bumped on close, so stale open completions can be recognised
    pub generation: u64,

    /// `(parent, name)` once opened
    pub path: Option<(String, String)>,

    /// Absolute index of `hdrs[0]`
    pub first_block: u32,

    /// Headers of retained sealed blocks
    pub hdrs: Vec<BlockHdr>,

    /// Open block, if any
    pub tail: Option<Tail>,

    /// Total values ever written, purged ones included
    pub count: u64,
}

impl Series {
    /// Create an empty series
    pub fn new(codec: CodecKind) -> Self {
        Self {
            codec,
            generation: 0,
            path: None,
            first_block: 0,
            hdrs: Vec::new(),
            tail: None,
            count: 0,
        }
    }

    /// Check if the series holds no blocks
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.hdrs.is_empty() && self.tail.is_none()
    }

    /// Number of retained blocks, tail included
    #[inline]
    pub fn block_count(&self) -> usize {
        self.hdrs.len() + self.tail.is_some() as usize
    }

    /// Absolute index one past the last block
    #[inline]
    pub fn end_block(&self) -> u32 {
        self.first_block + self.block_count() as u32
    }

    /// Absolute index the next tail will get
    #[inline]
    pub fn next_index(&self) -> u32 {
        self.first_block + self.hdrs.len() as u32
    }

    /// Header of absolute block `index`, sealed or tail
    pub fn hdr(&self, index: u32) -> Option<BlockHdr> {
        if let Some(tail) = &self.tail {
            if tail.index == index {
                return Some(tail.hdr);
            }
        }
        let rel = index.checked_sub(self.first_block)? as usize;
        self.hdrs.get(rel).copied()
    }

    /// Series offset of the first retained value
    pub fn first_offset(&self) -> u64 {
        self.hdrs
            .first()
            .or(self.tail.as_ref().map(|t| &t.hdr))
            .map_or(self.count, |hdr| hdr.offset)
    }

    /// Absolute index of the block holding `offset`.
    ///
    /// Offsets before the first retained value map to the first block;
    /// offsets at or past the end map to the last block.
    pub fn find_block(&self, offset: u64) -> Option<u32> {
        if self.is_empty() {
            return None;
        }
        if let Some(tail) = &self.tail {
            if offset >= tail.hdr.offset {
                return Some(tail.index);
            }
        }
        // first block whose end is past offset
        let rel = self.hdrs.partition_point(|hdr| hdr.end() <= offset);
        let rel = rel.min(self.hdrs.len().saturating_sub(1));
        Some(self.first_block + rel as u32)
    }

    /// Close the tail, returning it as a sealed block
    pub fn seal(&mut self, id: SeriesId) -> Option<Arc<Block>> {
        let tail = self.tail.take()?;
        let block = Arc::new(tail.snapshot(id));
        self.hdrs.push(*block.hdr());
        Some(block)
    }

    /// Drop the oldest `n` sealed blocks.
    ///
    /// Returns the new first block index.
    pub fn drop_front(&mut self, n: usize) -> u32 {
        let n = n.min(self.hdrs.len());
        self.hdrs.drain(..n);
        self.first_block += n as u32;
        self.first_block
    }

    /// Replace the block list with headers loaded from storage
    pub fn restore(&mut self, first_block: u32, hdrs: Vec<BlockHdr>) {
        self.count = hdrs.last().map_or(0, |hdr| hdr.end());
        self.first_block = first_block;
        self.hdrs = hdrs;
        self.tail = None;
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn hdr(offset: u64, count: u32) -> BlockHdr {
        BlockHdr {
            offset,
            count,
            length: 1,
            exponent: 0,
        }
    }

    fn series() -> Series {
        let mut s = Series::new(CodecKind::Delta);
        s.restore(5, vec![hdr(100, 10), hdr(110, 10), hdr(120, 5)]);
        s
    }

    #[test]
    fn test_restore() {
        let s = series();
        assert_eq!(s.count, 125);
        assert_eq!(s.block_count(), 3);
        assert_eq!(s.end_block(), 8);
        assert_eq!(s.first_offset(), 100);
        assert_eq!(s.hdr(6).unwrap().offset, 110);
        assert_eq!(s.hdr(4), None);
        assert_eq!(s.hdr(8), None);
    }

    #[test]
    fn test_find_block() {
        let mut s = series();
        assert_eq!(s.find_block(0), Some(5));
        assert_eq!(s.find_block(109), Some(5));
        assert_eq!(s.find_block(110), Some(6));
        assert_eq!(s.find_block(124), Some(7));
        assert_eq!(s.find_block(500), Some(7));

        s.tail = Some(Tail::new(CodecKind::Delta, 8, 125, 0));
        assert_eq!(s.find_block(125), Some(8));
        assert_eq!(s.find_block(124), Some(7));

        assert_eq!(Series::new(CodecKind::Raw).find_block(0), None);
    }

    #[test]
    fn test_tail_seal() {
        let mut s = Series::new(CodecKind::Delta);
        let mut tail = Tail::new(s.codec, s.next_index(), 0, 2);
        assert!(tail.write(4301));
        assert!(tail.write(4302));
        s.tail = Some(tail);
        s.count = 2;
        assert_eq!(s.block_count(), 1);
        assert_eq!(s.hdr(0).unwrap().count, 2);

        let block = s.seal(3).unwrap();
        assert_eq!(block.key(), BlockKey::new(3, 0));
        assert_eq!(block.hdr().count, 2);
        assert_eq!(block.hdr().exponent, 2);
        assert!(s.tail.is_none());
        assert_eq!(s.hdrs.len(), 1);
        assert_eq!(s.next_index(), 1);
        assert!(s.seal(3).is_none());
    }

    #[test]
    fn test_drop_front() {
        let mut s = series();
        assert_eq!(s.drop_front(2), 7);
        assert_eq!(s.first_offset(), 120);
        assert_eq!(s.drop_front(10), 8);
        assert!(s.is_empty());
        assert_eq!(s.first_offset(), 125);
    }
}
