//! # ticktape
//!
//! Embeddable time-series block store for fixed-point decimal data.
//!
//! ## Architecture
//!
//! - **Codec**: bit-packed runs of signed 64-bit values, with delta and
//!   delta-of-delta transforms
//! - **Cache**: slab-backed global LRU of sealed blocks, bounded across
//!   every series
//! - **Backend**: pluggable block persistence (in-memory or local files)
//!   plus integrity-checked metadata files
//! - **Engine**: series writers and readers over cache and backend
//! - **Stats**: order-statistics tree for running aggregates
//!
//! ## Design Principles
//!
//! 1. **No floating point in storage**: values are mantissa + exponent
//! 2. **Fixed-size blocks**: every block image is exactly `BLOCK_SIZE` bytes
//! 3. **Single owner**: run-to-completion on one thread, no locks
//! 4. **Misses are not errors**: absent blocks end reads, they don't fail them

// ============================================================================
// Module declarations
// ============================================================================

/// Core data types: block headers, blocks, decimal helpers
pub mod types;

/// Bit-packed value codec
pub mod codec;

/// Block cache: slab storage with a global LRU list
pub mod cache;

/// Storage backends and metadata files
pub mod backend;

/// Series store and readers
pub mod engine;

/// Order-statistics aggregation
pub mod stats;

/// Configuration structs
pub mod config;

/// Error types
pub mod error;

// ============================================================================
// Re-exports for convenience
// ============================================================================

pub use backend::{FileBackend, NullBackend, SeriesSchema, StorageBackend};
pub use cache::{BlockCache, UnloadFn};
pub use codec::{CodecKind, Decode, Encode};
pub use config::{FileBackendConfig, StoreConfig};
pub use engine::{Reader, Store};
pub use error::{Result, StoreError};
pub use stats::StatsTree;
pub use types::{Block, BlockHdr, BlockKey, SeriesId, BLOCK_SIZE};
