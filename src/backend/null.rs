//! Backend that persists nothing.
//!
//! Every series opens immediately at block 0, every load misses and every
//! save is dropped. A store over a `NullBackend` is a pure in-memory
//! store bounded by its cache: evicted blocks are gone.

use std::sync::Arc;

use crate::backend::{DecodeFn, OpenFn, StorageBackend};
use crate::error::{Result, StoreError};
use crate::types::{Block, BlockHdr, SeriesId};

/// In-memory only backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBackend;

impl NullBackend {
    /// Create a null backend
    pub fn new() -> Self {
        Self
    }
}

impl StorageBackend for NullBackend {
    fn open(&mut self, _series: SeriesId, _parent: &str, _name: &str, open_fn: OpenFn) -> Result<()> {
        open_fn(0);
        Ok(())
    }

    fn close(&mut self, _series: SeriesId) {}

    fn load_hdr(&mut self, _series: SeriesId, _index: u32) -> Option<BlockHdr> {
        None
    }

    fn load(&mut self, _series: SeriesId, _index: u32, _buf: &mut [u8]) -> bool {
        false
    }

    fn save(&mut self, _block: Arc<Block>) -> Result<()> {
        Ok(())
    }

    fn load_file(&mut self, name: &str, _decode: DecodeFn<'_>, _max_file_size: u64) -> Result<()> {
        Err(StoreError::NotFound(name.to_string()))
    }

    fn save_file(&mut self, name: &str, _payload: &[u8]) -> Result<()> {
        Err(StoreError::NotFound(name.to_string()))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
