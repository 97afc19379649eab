//! Series store: writers, readers, cache and backend wired together.
//!
//! ## Design
//!
//! The store owns the [`BlockCache`], one [`StorageBackend`] and the state
//! of every allocated series. It runs on a single owning thread; nothing
//! in here is `Sync`.
//!
//! - **Writes** append to the series' tail block. The tail is sealed when
//!   its encoder runs out of room or when a value arrives with a different
//!   number of decimal places. Sealed blocks are inserted into the cache
//!   and saved to the backend.
//! - **Reads** go through [`Reader`]. A sealed block is taken from the
//!   cache, or loaded from the backend on a miss and cached. The tail is
//!   read from a snapshot.
//! - **Opens** complete through a channel. The backend may call the open
//!   callback from any thread; [`Store::poll`] applies completions on the
//!   owning thread. Each series carries a generation so completions that
//!   arrive after a close are dropped.
//!
//! ## Example
//!
//! ```
//! use ticktape::{CodecKind, NullBackend, Store, StoreConfig};
//! use ticktape::types::decimal::parse;
//!
//! let mut store = Store::new(StoreConfig::default(), NullBackend::new()).unwrap();
//! let px = store.alloc(CodecKind::Delta, Box::new(|_| {}));
//! store.open(px, "feed", "px").unwrap();
//!
//! for s in ["100.25", "100.50", "100.50"] {
//!     store.write(px, parse(s).unwrap()).unwrap();
//! }
//!
//! let mut reader = store.index(px, parse("100.3").unwrap());
//! assert_eq!(reader.offset(), 1);
//! assert_eq!(reader.read(&mut store), parse("100.50"));
//! ```

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rust_decimal::Decimal;
use tracing::{debug, trace, warn};

use crate::backend::{meta, SeriesSchema, StorageBackend};
use crate::cache::{BlockCache, UnloadFn};
use crate::codec::{CodecKind, Decode};
use crate::config::StoreConfig;
use crate::engine::series::{Series, Tail};
use crate::engine::Reader;
use crate::error::{Result, StoreError};
use crate::types::{decimal, Block, BlockHdr, BlockKey, Payload, SeriesId, BLOCK_SIZE};

/// Largest metadata file `load_schema` accepts
pub const MAX_SCHEMA_FILE_SIZE: u64 = 4096;

/// Open completion marshaled back to the owning thread
#[derive(Debug, Clone, Copy)]
struct Completion {
    series: SeriesId,
    generation: u64,
    first_block: u32,
}

/// Embedded time-series store.
pub struct Store<B: StorageBackend> {
    config: StoreConfig,
    cache: BlockCache,
    backend: B,
    series: Vec<Option<Series>>,
    completions_tx: Sender<Completion>,
    completions_rx: Receiver<Completion>,
}

impl<B: StorageBackend> std::fmt::Debug for Store<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .field("series", &self.series.iter().flatten().count())
            .finish()
    }
}

impl<B: StorageBackend> Store<B> {
    /// Create a store over `backend`.
    ///
    /// Validates `config` and initializes the backend.
    pub fn new(config: StoreConfig, mut backend: B) -> Result<Self> {
        config.validate()?;
        backend.init()?;
        let (completions_tx, completions_rx) = mpsc::channel();
        Ok(Self {
            cache: BlockCache::new(config.max_bufs),
            config,
            backend,
            series: Vec::new(),
            completions_tx,
            completions_rx,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Store configuration
    #[inline]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Block cache
    #[inline]
    pub fn cache(&self) -> &BlockCache {
        &self.cache
    }

    /// Storage backend
    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Storage backend, mutable
    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    fn get(&self, series: SeriesId) -> Option<&Series> {
        self.series.get(series as usize)?.as_ref()
    }

    /// Check if a series is allocated
    #[inline]
    pub fn contains(&self, series: SeriesId) -> bool {
        self.get(series).is_some()
    }

    /// Codec of a series
    pub fn codec(&self, series: SeriesId) -> Option<CodecKind> {
        self.get(series).map(|s| s.codec)
    }

    /// Number of values written to a series, purged ones included
    pub fn count(&self, series: SeriesId) -> u64 {
        self.get(series).map_or(0, |s| s.count)
    }

    /// Number of retained blocks, the open tail included
    pub fn block_count(&self, series: SeriesId) -> usize {
        self.get(series).map_or(0, Series::block_count)
    }

    /// Absolute index of the oldest retained block
    pub fn first_block(&self, series: SeriesId) -> u32 {
        self.get(series).map_or(0, |s| s.first_block)
    }

    /// Absolute index one past the newest block
    pub fn end_block(&self, series: SeriesId) -> u32 {
        self.get(series).map_or(0, Series::end_block)
    }

    /// Header of absolute block `index`
    pub fn block_hdr(&self, series: SeriesId, index: u32) -> Option<BlockHdr> {
        self.get(series)?.hdr(index)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Allocate a series.
    ///
    /// `unload` is called with each of the series' blocks evicted from the
    /// cache.
    pub fn alloc(&mut self, codec: CodecKind, unload: UnloadFn) -> SeriesId {
        let id = self.cache.alloc(unload);
        let slot = id as usize;
        if self.series.len() <= slot {
            self.series.resize_with(slot + 1, || None);
        }
        self.series[slot] = Some(Series::new(codec));
        id
    }

    /// Open a series' storage under `parent/name`.
    ///
    /// Block headers present in the backend are loaded once the backend
    /// completes the open. Completions already delivered are applied before
    /// this returns.
    pub fn open(&mut self, series: SeriesId, parent: &str, name: &str) -> Result<()> {
        let Some(Some(state)) = self.series.get_mut(series as usize) else {
            return Err(StoreError::UnknownSeries(series));
        };
        state.path = Some((parent.to_string(), name.to_string()));
        let generation = state.generation;

        let tx = self.completions_tx.clone();
        self.backend.open(
            series,
            parent,
            name,
            Box::new(move |first_block| {
                let completion = Completion {
                    series,
                    generation,
                    first_block,
                };
                // receiver gone means the store was dropped
                let _ = tx.send(completion);
            }),
        )?;
        self.poll();
        Ok(())
    }

    /// Apply pending open completions.
    ///
    /// Returns the number of completions processed, dropped ones included.
    pub fn poll(&mut self) -> usize {
        let mut n = 0;
        while let Ok(completion) = self.completions_rx.try_recv() {
            self.complete_open(completion);
            n += 1;
        }
        n
    }

    fn complete_open(&mut self, completion: Completion) {
        let Completion {
            series,
            generation,
            first_block,
        } = completion;
        let Some(Some(state)) = self.series.get_mut(series as usize) else {
            debug!(series, "dropping open completion for freed series");
            return;
        };
        if state.generation != generation {
            debug!(
                series,
                generation,
                current = state.generation,
                "dropping stale open completion"
            );
            return;
        }
        if !state.is_empty() {
            debug!(series, "series already holds blocks, keeping them");
            return;
        }

        let mut hdrs = Vec::new();
        let mut index = first_block;
        while let Some(hdr) = self.backend.load_hdr(series, index) {
            hdrs.push(hdr);
            index += 1;
        }
        debug!(series, first_block, blocks = hdrs.len(), "loaded block headers");
        state.restore(first_block, hdrs);
    }

    /// Seal and save the tail, then close the series' storage.
    ///
    /// Open completions still in flight for the series are dropped.
    pub fn close(&mut self, series: SeriesId) -> Result<()> {
        let Some(Some(state)) = self.series.get_mut(series as usize) else {
            return Err(StoreError::UnknownSeries(series));
        };
        state.generation += 1;
        let sealed = state.seal(series);
        let result = match sealed {
            Some(block) => self.store_sealed(block),
            None => Ok(()),
        };
        self.backend.close(series);
        debug!(series, "closed series");
        result
    }

    /// Release a series without saving its tail.
    ///
    /// Resident blocks are dropped without calling the unload callback.
    pub fn free(&mut self, series: SeriesId) {
        let Some(slot) = self.series.get_mut(series as usize) else {
            return;
        };
        if slot.take().is_none() {
            return;
        }
        self.cache.free(series);
        self.backend.close(series);
    }

    /// Close every open series and shut the backend down.
    pub fn finish(&mut self) -> Result<()> {
        let mut result = Ok(());
        for id in 0..self.series.len() as SeriesId {
            let opened = self.get(id).is_some_and(|s| s.path.is_some());
            if opened {
                if let Err(e) = self.close(id) {
                    warn!(series = id, error = %e, "close failed during shutdown");
                    result = Err(e);
                }
            }
        }
        self.backend.finish();
        result
    }

    // ========================================================================
    // Writing
    // ========================================================================

    /// Append a value.
    ///
    /// # Errors
    ///
    /// - `UnknownSeries` if the series is not allocated
    /// - `OutOfRange` if the mantissa does not fit in `i64`
    /// - any error from saving a sealed block; the value is still written.
    ///   A file backed series that was never opened, or was closed, fails
    ///   here with `NotFound` once its first block is sealed
    pub fn write(&mut self, series: SeriesId, value: Decimal) -> Result<()> {
        let (mantissa, exponent) = decimal::to_fixed(value)
            .ok_or_else(|| StoreError::OutOfRange(format!("{} does not fit a block", value)))?;
        let Some(Some(state)) = self.series.get_mut(series as usize) else {
            return Err(StoreError::UnknownSeries(series));
        };

        if let Some(tail) = state.tail.as_mut() {
            if tail.hdr.exponent == exponent && tail.write(mantissa) {
                state.count += 1;
                return Ok(());
            }
        }

        let sealed = state.seal(series);
        let mut tail = Tail::new(state.codec, state.next_index(), state.count, exponent);
        if !tail.write(mantissa) {
            return Err(StoreError::NoSpace);
        }
        trace!(series, index = tail.index, exponent, "started block");
        state.tail = Some(tail);
        state.count += 1;

        match sealed {
            Some(block) => self.store_sealed(block),
            None => Ok(()),
        }
    }

    /// Save a snapshot of the tail block to the backend.
    pub fn sync(&mut self, series: SeriesId) -> Result<()> {
        let state = self.get(series).ok_or(StoreError::UnknownSeries(series))?;
        let Some(tail) = state.tail.as_ref() else {
            return Ok(());
        };
        let snapshot = Arc::new(tail.snapshot(series));
        self.backend.save(snapshot)
    }

    fn store_sealed(&mut self, block: Arc<Block>) -> Result<()> {
        let key = block.key();
        debug!(
            series = key.series,
            index = key.index,
            count = block.hdr().count,
            length = block.hdr().length,
            "sealed block"
        );
        self.cache.insert(Arc::clone(&block));
        self.backend.save(block).map_err(|e| {
            warn!(series = key.series, index = key.index, error = %e, "block save failed");
            e
        })
    }

    // ========================================================================
    // Reading
    // ========================================================================

    /// Reader positioned at series offset `offset`.
    ///
    /// Offsets before the first retained value start at the first retained
    /// value. Offsets past the end start at the end.
    pub fn reader(&self, series: SeriesId, offset: u64) -> Reader {
        let Some(state) = self.get(series) else {
            return Reader::new(series, 0, 0, 0);
        };
        let Some(block) = state.find_block(offset) else {
            return Reader::new(series, state.first_block, 0, state.count);
        };
        let hdr = state.hdr(block).unwrap_or_default();
        let offset = offset.clamp(hdr.offset, hdr.end());
        Reader::new(series, block, (offset - hdr.offset) as u32, offset)
    }

    /// Reader positioned at the first value `>= value`.
    ///
    /// Assumes the series is non-decreasing. If every value is smaller,
    /// the reader starts at the end of the series.
    ///
    /// Blocks that can no longer be loaded are treated as lying past the
    /// target. If the search lands on such a block the returned reader is
    /// positioned at its start and reads nothing until it becomes loadable.
    pub fn index(&mut self, series: SeriesId, value: Decimal) -> Reader {
        let (first, end) = match self.get(series) {
            Some(state) => (state.first_block, state.end_block()),
            None => return Reader::new(series, 0, 0, 0),
        };

        // last block whose first value is < value; an equal value may
        // still end the block before it
        let (mut lo, mut hi) = (first, end);
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            match self.first_value(series, mid) {
                Some(v) if v < value => lo = mid,
                _ => hi = mid,
            }
        }

        let offset = self.block_hdr(series, lo).map_or(0, |hdr| hdr.offset);
        let mut reader = Reader::new(series, lo, 0, offset);
        while let Some(v) = reader.read(self) {
            if v >= value {
                reader.unread(v);
                break;
            }
        }
        reader
    }

    fn first_value(&mut self, series: SeriesId, index: u32) -> Option<Decimal> {
        let (mut decoder, exponent) = self.decoder(series, index)?;
        decimal::from_fixed(decoder.read()?, exponent)
    }

    /// Decoder over absolute block `index`, with the block's exponent.
    ///
    /// Sealed blocks come from the cache or, on a miss, the backend. The
    /// tail is decoded from a snapshot.
    pub(crate) fn decoder(&mut self, series: SeriesId, index: u32) -> Option<(Box<dyn Decode>, u8)> {
        let block = self.load_block(series, index)?;
        let codec = self.codec(series)?;
        let exponent = block.hdr().exponent;
        Some((codec.decoder(Payload(block)), exponent))
    }

    fn load_block(&mut self, series: SeriesId, index: u32) -> Option<Arc<Block>> {
        let state = self.get(series)?;
        if let Some(tail) = state.tail.as_ref().filter(|t| t.index == index) {
            return Some(Arc::new(tail.snapshot(series)));
        }
        state.hdr(index)?;

        let key = BlockKey::new(series, index);
        if let Some(block) = self.cache.fetch(key) {
            return Some(block);
        }

        let mut image = vec![0u8; BLOCK_SIZE];
        if !self.backend.load(series, index, &mut image) {
            debug!(series, index, "block missing from backend");
            return None;
        }
        let Some(block) = Block::from_image(key, &image) else {
            warn!(series, index, "discarding malformed block image");
            return None;
        };
        let block = Arc::new(block);
        self.cache.insert(Arc::clone(&block));
        Some(block)
    }

    // ========================================================================
    // Retention
    // ========================================================================

    /// Drop the oldest `index` sealed blocks of a series.
    ///
    /// Resident blocks are dropped from the cache without calling the
    /// unload callback, and the backend is told they are no longer needed.
    /// The open tail is never purged.
    pub fn purge(&mut self, series: SeriesId, index: u32) {
        let Some(Some(state)) = self.series.get_mut(series as usize) else {
            return;
        };
        if index == 0 || state.hdrs.is_empty() {
            return;
        }
        let first = state.drop_front(index as usize);
        let dropped = self.cache.purge(series, first);
        self.backend.purge(series, first);
        debug!(series, first_block = first, dropped, "purged series");
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    fn schema_file(&self, series: SeriesId) -> Result<String> {
        let state = self.get(series).ok_or(StoreError::UnknownSeries(series))?;
        let (parent, name) = state
            .path
            .as_ref()
            .ok_or_else(|| StoreError::NotFound(format!("series {} has not been opened", series)))?;
        Ok(format!("{}/{}", parent, name))
    }

    /// Persist the series' schema next to its block files.
    pub fn save_schema(&mut self, series: SeriesId) -> Result<()> {
        let file = self.schema_file(series)?;
        let state = self.get(series).ok_or(StoreError::UnknownSeries(series))?;
        let name = state.path.as_ref().map_or("", |(_, name)| name.as_str());
        let exponent = state
            .tail
            .as_ref()
            .map(|t| t.hdr.exponent)
            .or_else(|| state.hdrs.last().map(|h| h.exponent))
            .unwrap_or(0);
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as u64);

        let mut schema = SeriesSchema::new(name, state.codec, exponent, created_at)?;
        schema.count = state.count;
        let image = meta::encode(&schema)?;
        self.backend.save_file(&file, &image)
    }

    /// Load the series' schema saved by [`Store::save_schema`].
    pub fn load_schema(&mut self, series: SeriesId) -> Result<SeriesSchema> {
        let file = self.schema_file(series)?;
        let mut schema = None;
        self.backend.load_file(
            &file,
            &mut |data: &[u8]| -> Result<()> {
                schema = Some(meta::decode(data)?);
                Ok(())
            },
            MAX_SCHEMA_FILE_SIZE,
        )?;
        schema.ok_or_else(|| StoreError::Corrupt(format!("{} produced no schema", file)))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
