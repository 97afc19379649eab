//! Core data types for ticktape
//!
//! ## Types
//!
//! - [`BlockHdr`]: block metadata (offset, count, length, exponent)
//! - [`Block`]: sealed block, header plus encoded payload
//! - [`BlockKey`]: `(series, index)` address of a block
//! - [`SeriesId`]: opaque series handle
//!
//! ## Fixed-Point Values
//!
//! Series values are `rust_decimal::Decimal`; see [`decimal`] for the
//! mantissa/exponent split stored in blocks.

mod block;
pub mod decimal;

pub use block::{Block, BlockHdr, BlockKey, Payload, SeriesId, BLOCK_SIZE, HDR_SIZE, PAYLOAD_SIZE};
