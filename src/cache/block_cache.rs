//! Bounded block cache with a single global LRU list.
//!
//! ## Architecture
//!
//! - **Slab**: entry storage, O(1) insert/remove by key
//! - **LruList**: intrusive list through the entries, least recent first
//! - **HashMap**: `(series, index)` to slab key, for lookups by address
//! - **Unload registry**: one eviction callback per series, indexed by id
//!
//! ## Eviction
//!
//! At most `max_bufs` entries are resident across all series. When an
//! insert exceeds the bound, entries are evicted from the least recently
//! used end and handed to their series' unload callback. A busy series can
//! evict the cold blocks of any other series; there are no per-series
//! quotas.
//!
//! `free`, `purge` and `remove` drop entries without calling the
//! callback: the caller already owns or has discarded the payload.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use ticktape::cache::BlockCache;
//! use ticktape::types::{Block, BlockHdr, BlockKey};
//!
//! let mut cache = BlockCache::new(1);
//! let series = cache.alloc(Box::new(|block| println!("evicted {:?}", block.key())));
//!
//! let block = |i| Arc::new(Block::new(BlockKey::new(series, i), BlockHdr::new(0, 0), &[]));
//! cache.insert(block(0));
//! cache.insert(block(1)); // evicts block 0
//!
//! assert_eq!(cache.len(), 1);
//! assert!(cache.lookup(BlockKey::new(series, 0)).is_none());
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use slab::Slab;
use tracing::{debug, trace};

use crate::cache::{CacheEntry, LruList};
use crate::types::{Block, BlockKey, SeriesId};

/// Slots reserved up front, however large the budget
const PREALLOC_MAX: usize = 4096;

/// Eviction callback, invoked with each block evicted from its series
pub type UnloadFn = Box<dyn FnMut(Arc<Block>)>;

/// Global LRU block cache.
pub struct BlockCache {
    /// Resident entries
    entries: Slab<CacheEntry>,

    /// Recency order over `entries`
    lru: LruList,

    /// Block address to slab key
    index: HashMap<BlockKey, usize>,

    /// Unload callbacks, indexed by series id; `None` once freed
    unload: Vec<Option<UnloadFn>>,

    /// Maximum resident entries
    max_bufs: usize,

    /// Total evictions since creation
    evictions: u64,
}

impl std::fmt::Debug for BlockCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockCache")
            .field("len", &self.entries.len())
            .field("max_bufs", &self.max_bufs)
            .field("series", &self.unload.len())
            .field("evictions", &self.evictions)
            .finish()
    }
}

impl BlockCache {
    /// Create a cache holding at most `max_bufs` blocks (at least one).
    pub fn new(max_bufs: usize) -> Self {
        let max_bufs = max_bufs.max(1);
        let prealloc = max_bufs.min(PREALLOC_MAX);
        Self {
            entries: Slab::with_capacity(prealloc),
            lru: LruList::new(),
            index: HashMap::with_capacity(prealloc),
            unload: Vec::new(),
            max_bufs,
            evictions: 0,
        }
    }

    // ========================================================================
    // Capacity and Size
    // ========================================================================

    /// Number of resident blocks
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no blocks are resident
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resident block bound
    #[inline]
    pub fn max_bufs(&self) -> usize {
        self.max_bufs
    }

    /// Total evictions so far
    #[inline]
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    /// Number of series ids handed out
    #[inline]
    pub fn series_count(&self) -> usize {
        self.unload.len()
    }

    /// Change the bound, evicting immediately if the cache is now over it.
    pub fn set_max_bufs(&mut self, max_bufs: usize) {
        self.max_bufs = max_bufs.max(1);
        self.shrink();
    }

    // ========================================================================
    // Series Registry
    // ========================================================================

    /// Register a series and its eviction callback.
    ///
    /// Ids are assigned in increasing order and never reused.
    pub fn alloc(&mut self, unload: UnloadFn) -> SeriesId {
        let id = self.unload.len() as SeriesId;
        self.unload.push(Some(unload));
        debug!(series = id, "allocated series");
        id
    }

    /// Check if a series id is allocated and not freed
    pub fn is_live(&self, series: SeriesId) -> bool {
        matches!(self.unload.get(series as usize), Some(Some(_)))
    }

    /// Drop every resident block of `series` without calling its callback,
    /// and retire the callback.
    ///
    /// Returns the number of blocks dropped.
    pub fn free(&mut self, series: SeriesId) -> usize {
        let removed = self.drop_where(|key| key.series == series);
        if let Some(slot) = self.unload.get_mut(series as usize) {
            *slot = None;
        }
        debug!(series, removed, "freed series");
        removed
    }

    /// Drop resident blocks of `series` with index below `index`, without
    /// calling the callback.
    ///
    /// Returns the number of blocks dropped.
    pub fn purge(&mut self, series: SeriesId, index: u32) -> usize {
        let removed = self.drop_where(|key| key.series == series && key.index < index);
        debug!(series, index, removed, "purged series");
        removed
    }

    // ========================================================================
    // Entry Management
    // ========================================================================

    /// Slab key of a resident block
    #[inline]
    pub fn lookup(&self, key: BlockKey) -> Option<usize> {
        self.index.get(&key).copied()
    }

    /// Resident block by slab key
    #[inline]
    pub fn get(&self, key: usize) -> Option<&Arc<Block>> {
        self.entries.get(key).map(|entry| &entry.block)
    }

    /// Check if a block is resident
    #[inline]
    pub fn contains(&self, key: BlockKey) -> bool {
        self.index.contains_key(&key)
    }

    /// Mark a resident block as most recently used.
    pub fn touch(&mut self, key: usize) {
        self.lru.move_to_back(key, &mut self.entries);
    }

    /// Look up a block by address and touch it.
    pub fn fetch(&mut self, key: BlockKey) -> Option<Arc<Block>> {
        let slab_key = self.lookup(key)?;
        self.touch(slab_key);
        self.get(slab_key).cloned()
    }

    /// Insert a block at the most-recently-used end.
    ///
    /// A resident block with the same address is replaced in place. If the
    /// cache is now over its bound, least recently used blocks are evicted
    /// through their series' callbacks.
    ///
    /// # Returns
    ///
    /// The slab key of the inserted block
    pub fn insert(&mut self, block: Arc<Block>) -> usize {
        let key = block.key();
        if let Some(slab_key) = self.lookup(key) {
            if let Some(entry) = self.entries.get_mut(slab_key) {
                entry.block = block;
            }
            self.touch(slab_key);
            return slab_key;
        }

        let slab_key = self.entries.insert(CacheEntry::new(block));
        self.lru.push_back(slab_key, &mut self.entries);
        self.index.insert(key, slab_key);
        trace!(series = key.series, index = key.index, "cached block");

        self.shrink();
        slab_key
    }

    /// Remove a block without calling its series' callback.
    pub fn remove(&mut self, key: usize) -> Option<Arc<Block>> {
        if !self.lru.remove(key, &mut self.entries) {
            return None;
        }
        let entry = self.entries.remove(key);
        self.index.remove(&entry.key());
        Some(entry.block)
    }

    /// Iterate resident blocks from least to most recently used
    pub fn iter_lru(&self) -> impl Iterator<Item = &Arc<Block>> + '_ {
        let mut cursor = self.lru.head;
        std::iter::from_fn(move || {
            let entry = self.entries.get(cursor?)?;
            cursor = entry.next;
            Some(&entry.block)
        })
    }

    // ========================================================================
    // Eviction
    // ========================================================================

    fn shrink(&mut self) {
        while self.entries.len() > self.max_bufs {
            if !self.evict_lru() {
                break;
            }
        }
    }

    /// Evict the least recently used block through its unload callback.
    fn evict_lru(&mut self) -> bool {
        let Some(slab_key) = self.lru.pop_front(&mut self.entries) else {
            return false;
        };
        let entry = self.entries.remove(slab_key);
        let key = entry.key();
        self.index.remove(&key);
        self.evictions += 1;
        trace!(series = key.series, index = key.index, "evicting block");

        if let Some(Some(unload)) = self.unload.get_mut(key.series as usize) {
            unload(entry.block);
        }
        true
    }

    fn drop_where(&mut self, pred: impl Fn(&BlockKey) -> bool) -> usize {
        let doomed: Vec<usize> = self
            .index
            .iter()
            .filter(|(key, _)| pred(key))
            .map(|(_, &slab_key)| slab_key)
            .collect();
        for &slab_key in &doomed {
            self.remove(slab_key);
        }
        doomed.len()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
