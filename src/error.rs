//! Error and Result types for ticktape.
//!
//! Routine conditions on hot paths (block full, end of block, cache miss)
//! are reported through `bool` and `Option`. `StoreError` covers the rest:
//! backend I/O, oversized or corrupt metadata files and bad configuration.
//!
//! Every variant maps to a platform-style error code via [`StoreError::code`].

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::SeriesId;

/// A convenience `Result` type for ticktape operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// POSIX `ENOENT`
pub const ENOENT: i32 = 2;
/// POSIX `EIO`
pub const EIO: i32 = 5;
/// POSIX `EINVAL`
pub const EINVAL: i32 = 22;
/// POSIX `EFBIG`
pub const EFBIG: i32 = 27;
/// POSIX `ENOSPC`
pub const ENOSPC: i32 = 28;

/// The error type for store, backend and metadata operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The named file or series does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The series handle is not allocated (never allocated, or freed).
    #[error("unknown series: {0}")]
    UnknownSeries(SeriesId),

    /// A file exceeded the caller's size limit; checked before allocation.
    #[error("file {path:?} is {size} bytes, limit is {max}")]
    FileTooLarge {
        /// Offending file.
        path: PathBuf,
        /// Actual size in bytes.
        size: u64,
        /// Caller-supplied limit.
        max: u64,
    },

    /// Metadata envelope failed validation.
    #[error("corrupt metadata: {0}")]
    Corrupt(String),

    /// A value cannot be represented in a block (mantissa or exponent range).
    #[error("value out of range: {0}")]
    OutOfRange(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A block did not fit into an empty block buffer.
    #[error("block buffer exhausted")]
    NoSpace,

    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    /// Platform-style error code for this error.
    ///
    /// I/O errors report the OS error number when one is available.
    pub fn code(&self) -> i32 {
        match self {
            StoreError::NotFound(_) | StoreError::UnknownSeries(_) => ENOENT,
            StoreError::FileTooLarge { .. } => EFBIG,
            StoreError::Corrupt(_) => EIO,
            StoreError::OutOfRange(_) | StoreError::Config(_) => EINVAL,
            StoreError::NoSpace => ENOSPC,
            StoreError::Io(e) => match e.raw_os_error() {
                Some(code) => code,
                None if e.kind() == io::ErrorKind::NotFound => ENOENT,
                None => EIO,
            },
        }
    }

    /// True for "does not exist" conditions.
    pub fn is_not_found(&self) -> bool {
        self.code() == ENOENT
    }
}
