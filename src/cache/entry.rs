//! Cache entry for slab-based storage.
//!
//! ## Design
//!
//! `CacheEntry` wraps a sealed block with doubly-linked list pointers into
//! the global LRU list. The pointers are slab keys (`usize`), so removal
//! from anywhere in the list is O(1) once the key is known.
//!
//! The owning series is identified by the block's `(series, index)` key,
//! never by a reference to the series itself.

use std::sync::Arc;

use crate::types::{Block, BlockKey, SeriesId};

/// Entry stored in the cache slab.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The cached block, shared with the storage backend
    pub block: Arc<Block>,

    /// Next entry towards the most-recently-used end (slab key)
    pub next: Option<usize>,

    /// Previous entry towards the least-recently-used end (slab key)
    pub prev: Option<usize>,
}

impl CacheEntry {
    /// Create a new, unlinked entry
    #[inline]
    pub fn new(block: Arc<Block>) -> Self {
        Self {
            block,
            next: None,
            prev: None,
        }
    }

    /// Check if this entry is unlinked
    #[inline]
    pub fn is_unlinked(&self) -> bool {
        self.next.is_none() && self.prev.is_none()
    }

    /// Block address
    #[inline]
    pub fn key(&self) -> BlockKey {
        self.block.key()
    }

    /// Owning series
    #[inline]
    pub fn series(&self) -> SeriesId {
        self.block.series()
    }

    /// Absolute block index
    #[inline]
    pub fn index(&self) -> u32 {
        self.block.index()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
