//! Storage backends.
//!
//! ## Design
//!
//! The store talks to persistent storage through [`StorageBackend`]. A
//! backend stores fixed-size block images addressed by `(series, index)`
//! and whole metadata files addressed by name.
//!
//! Misses are not errors: `load` and `load_hdr` return `false`/`None` when
//! a block is absent or unreadable, and the store treats the block as not
//! present. Only `open`, `save` and the metadata file operations return
//! [`StoreError`](crate::StoreError).
//!
//! `open` reports readiness through a `Send` callback, so a backend may
//! complete it from another thread. The store marshals completions back to
//! its own thread.
//!
//! ## Implementations
//!
//! - [`NullBackend`]: accepts everything, stores nothing
//! - [`FileBackend`]: block files on local disk, with cold-storage purge

use std::sync::Arc;

use crate::error::Result;
use crate::types::{Block, BlockHdr, SeriesId};

pub mod file;
pub mod meta;
pub mod null;

pub use file::FileBackend;
pub use meta::SeriesSchema;
pub use null::NullBackend;

/// Open completion, called with the absolute index of the oldest block
/// still present
pub type OpenFn = Box<dyn FnOnce(u32) + Send>;

/// Metadata file consumer, called once with the whole file contents
pub type DecodeFn<'a> = &'a mut dyn FnMut(&[u8]) -> Result<()>;

/// Persistent block and metadata storage.
pub trait StorageBackend {
    /// Prepare the backend for use
    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    /// Release every resource held by the backend
    fn finish(&mut self) {}

    /// Prepare storage for `series`, stored under `parent/name`.
    ///
    /// `open_fn` is called once storage is ready; synchronous backends call
    /// it before returning.
    fn open(&mut self, series: SeriesId, parent: &str, name: &str, open_fn: OpenFn)
        -> Result<()>;

    /// Release per-series resources
    fn close(&mut self, series: SeriesId);

    /// Header of block `index`, or `None` on a miss
    fn load_hdr(&mut self, series: SeriesId, index: u32) -> Option<BlockHdr>;

    /// Fill `buf` (at least `BLOCK_SIZE` bytes) with the image of block
    /// `index`. Returns `false` on a miss, leaving `buf` untouched.
    fn load(&mut self, series: SeriesId, index: u32, buf: &mut [u8]) -> bool;

    /// Persist a block image
    fn save(&mut self, block: Arc<Block>) -> Result<()>;

    /// Blocks of `series` below `index` are no longer needed
    fn purge(&mut self, _series: SeriesId, _index: u32) {}

    /// Read the metadata file `name` and pass its contents to `decode`.
    ///
    /// Fails with `FileTooLarge` before reading if the file is larger than
    /// `max_file_size`.
    fn load_file(&mut self, name: &str, decode: DecodeFn<'_>, max_file_size: u64) -> Result<()>;

    /// Write the metadata file `name`
    fn save_file(&mut self, name: &str, payload: &[u8]) -> Result<()>;
}

impl<B: StorageBackend + ?Sized> StorageBackend for Box<B> {
    fn init(&mut self) -> Result<()> {
        (**self).init()
    }
    fn finish(&mut self) {
        (**self).finish()
    }
    fn open(&mut self, series: SeriesId, parent: &str, name: &str, open_fn: OpenFn) -> Result<()> {
        (**self).open(series, parent, name, open_fn)
    }
    fn close(&mut self, series: SeriesId) {
        (**self).close(series)
    }
    fn load_hdr(&mut self, series: SeriesId, index: u32) -> Option<BlockHdr> {
        (**self).load_hdr(series, index)
    }
    fn load(&mut self, series: SeriesId, index: u32, buf: &mut [u8]) -> bool {
        (**self).load(series, index, buf)
    }
    fn save(&mut self, block: Arc<Block>) -> Result<()> {
        (**self).save(block)
    }
    fn purge(&mut self, series: SeriesId, index: u32) {
        (**self).purge(series, index)
    }
    fn load_file(&mut self, name: &str, decode: DecodeFn<'_>, max_file_size: u64) -> Result<()> {
        (**self).load_file(name, decode, max_file_size)
    }
    fn save_file(&mut self, name: &str, payload: &[u8]) -> Result<()> {
        (**self).save_file(name, payload)
    }
}
