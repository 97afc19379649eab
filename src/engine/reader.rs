//! Forward cursor over a series.
//!
//! A `Reader` holds a position (absolute block index plus values consumed
//! in that block) and a decoder over the current block. It does not borrow
//! the store: every `read` takes the store explicitly, so readers and
//! writers can be interleaved on the owning thread.
//!
//! When the current block runs out, the reader checks the block's header
//! again. If more values have been written since (the block was the tail),
//! it reopens the block and skips what it has already returned. Otherwise
//! it moves to the next block.

use rust_decimal::Decimal;

use crate::backend::StorageBackend;
use crate::codec::Decode;
use crate::engine::Store;
use crate::types::{decimal, SeriesId};

/// Forward cursor over the values of one series.
pub struct Reader {
    series: SeriesId,
    block: u32,
    consumed: u32,
    offset: u64,
    exponent: u8,
    decoder: Option<Box<dyn Decode>>,
    pending: Option<Decimal>,
}

impl std::fmt::Debug for Reader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("series", &self.series)
            .field("block", &self.block)
            .field("consumed", &self.consumed)
            .field("offset", &self.offset)
            .field("pending", &self.pending)
            .finish()
    }
}

impl Reader {
    /// Position at value `consumed` of absolute block `block`
    pub(crate) fn new(series: SeriesId, block: u32, consumed: u32, offset: u64) -> Self {
        Self {
            series,
            block,
            consumed,
            offset,
            exponent: 0,
            decoder: None,
            pending: None,
        }
    }

    /// Put back a value already read, so the next `read` returns it
    pub(crate) fn unread(&mut self, value: Decimal) {
        self.pending = Some(value);
        self.offset -= 1;
    }

    /// Series being read
    #[inline]
    pub fn series(&self) -> SeriesId {
        self.series
    }

    /// Series offset of the next value `read` will return
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Absolute index of the current block
    #[inline]
    pub fn block(&self) -> u32 {
        self.block
    }

    /// Next value, or `None` at the end of the series.
    ///
    /// `None` is also returned when a block can no longer be loaded (evicted
    /// from the cache and absent from the backend). A later call retries.
    pub fn read<B: StorageBackend>(&mut self, store: &mut Store<B>) -> Option<Decimal> {
        if let Some(value) = self.pending.take() {
            self.offset += 1;
            return Some(value);
        }
        loop {
            let fresh = self.decoder.is_none();
            if fresh && !self.load(store) {
                return None;
            }
            if let Some(decoder) = self.decoder.as_mut() {
                if let Some(mantissa) = decoder.read() {
                    self.consumed += 1;
                    self.offset += 1;
                    return decimal::from_fixed(mantissa, self.exponent);
                }
            }

            // current block exhausted
            self.decoder = None;
            let count = store.block_hdr(self.series, self.block).map(|hdr| hdr.count);
            match count {
                // payload holds fewer values than its header claims
                Some(count) if self.consumed < count && fresh => return None,
                Some(count) if self.consumed < count => continue,
                _ if self.block + 1 < store.end_block(self.series) => {
                    self.block += 1;
                    self.consumed = 0;
                }
                _ => return None,
            }
        }
    }

    /// Move to series offset `offset`, clamped like [`Store::reader`].
    ///
    /// Any value put back by `unread` is discarded.
    pub fn seek<B: StorageBackend>(&mut self, store: &Store<B>, offset: u64) {
        *self = store.reader(self.series, offset);
    }

    /// Move to the first value `>= value`, as [`Store::index`] does.
    pub fn seek_value<B: StorageBackend>(&mut self, store: &mut Store<B>, value: Decimal) {
        *self = store.index(self.series, value);
    }

    /// Drop every block of the series before the current one.
    pub fn purge<B: StorageBackend>(&self, store: &mut Store<B>) {
        let first = store.first_block(self.series);
        store.purge(self.series, self.block.saturating_sub(first));
    }

    /// Open a decoder at the current position
    fn load<B: StorageBackend>(&mut self, store: &mut Store<B>) -> bool {
        let first = store.first_block(self.series);
        if self.block < first {
            self.block = first;
            self.consumed = 0;
        }
        let Some(hdr) = store.block_hdr(self.series, self.block) else {
            return false;
        };
        let Some((mut decoder, exponent)) = store.decoder(self.series, self.block) else {
            return false;
        };
        if !decoder.seek(self.consumed as usize) {
            return false;
        }
        self.offset = hdr.offset + self.consumed as u64;
        self.exponent = exponent;
        self.decoder = Some(decoder);
        true
    }
}
