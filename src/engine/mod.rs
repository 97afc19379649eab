//! Series store module.
//!
//! ## Design Principles
//!
//! 1. **Single owner**: one thread owns the store; no locks on any path
//! 2. **Fixed-point values**: decimals are split into mantissa and block
//!    exponent, never converted to floating point
//! 3. **Headers stay resident**: block boundaries and offsets are always
//!    answerable from memory
//! 4. **Misses degrade**: a block that cannot be loaded ends a read, it
//!    does not fail it
//!
//! ## Components
//!
//! - [`Store`]: allocation, open/close, write, purge, metadata
//! - [`Reader`]: forward cursor by offset or by value
//! - [`Series`]: per-series block list and open tail

pub mod reader;
pub mod series;
pub mod store;

pub use reader::Reader;
pub use series::{Series, Tail};
pub use store::{Store, MAX_SCHEMA_FILE_SIZE};
