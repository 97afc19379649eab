//! Bit-packed compression for signed 64-bit sequences.
//!
//! ## Format
//!
//! Every value has a width class: the minimal number of bits needed to hold
//! it in two's complement (`0` has width 0, `-1` width 1, `1` width 2,
//! `i64::MIN` width 64). Consecutive values are grouped into runs:
//!
//! ```text
//! +-------+-----------+---------------------------------------------+
//! | width | length-1  | length fields of `width` bits, LSB first    |
//! +-------+-----------+---------------------------------------------+
//!   u8      u8          ceil(length * width / 8) bytes
//! ```
//!
//! A run holds at most [`MAX_RUN`] values. A value up to [`RUN_SLACK`]
//! bits narrower than the open run joins it; anything else opens a new run.
//! Runs of zeros carry no payload bits at all, which is what repeated
//! values look like after a [`DeltaEncoder`].
//!
//! ## Composition
//!
//! [`DeltaEncoder`] / [`DeltaDecoder`] wrap any [`Encode`] / [`Decode`]
//! and store first differences. Nesting them twice gives delta-of-delta:
//!
//! ```
//! use ticktape::codec::{Decode, Decoder, DeltaDecoder, DeltaEncoder, Encode, Encoder};
//!
//! let mut buf = [0u8; 64];
//! let mut w = DeltaEncoder::new(DeltaEncoder::new(Encoder::new(&mut buf[..])));
//! for ts in [1000, 1010, 1020, 1030] {
//!     assert!(w.write(ts));
//! }
//! let len = w.pos();
//!
//! let mut r = DeltaDecoder::new(DeltaDecoder::new(Decoder::new(&buf[..len])));
//! assert_eq!(r.read(), Some(1000));
//! assert_eq!(r.read(), Some(1010));
//! ```
//!
//! [`CodecKind`] picks one of the three compositions at runtime for the
//! series layer.

mod decoder;
mod delta;
mod encoder;

pub use decoder::Decoder;
pub use delta::{DeltaDecoder, DeltaEncoder};
pub use encoder::Encoder;

/// Maximum number of values in one run
pub const MAX_RUN: usize = 256;

/// Run header size in bytes
pub const RUN_HDR_SIZE: usize = 2;

/// How many bits narrower than the open run a value may be and still join it
pub const RUN_SLACK: u8 = 8;

// ============================================================================
// Traits
// ============================================================================

/// Forward-only value writer over a fixed byte range.
pub trait Encode {
    /// Append a value.
    ///
    /// Returns `false`, writing nothing, when the buffer has no room left.
    fn write(&mut self, value: i64) -> bool;

    /// Number of values written
    fn count(&self) -> usize;

    /// Byte offset one past the encoded data
    fn pos(&self) -> usize;

    /// Last value written (0 before the first write)
    fn last(&self) -> i64;

    /// Encoded bytes so far
    fn encoded(&self) -> &[u8];
}

/// Forward-only value reader over encoded bytes.
pub trait Decode {
    /// Next value in write order, or `None` at the end of the data.
    ///
    /// Returning `None` never moves the reader.
    fn read(&mut self) -> Option<i64>;

    /// Number of values read
    fn count(&self) -> usize;

    /// Byte offset of the read cursor
    fn pos(&self) -> usize;

    /// Skip `n` values; `false` if the data ran out first.
    fn seek(&mut self, n: usize) -> bool {
        for _ in 0..n {
            if self.read().is_none() {
                return false;
            }
        }
        true
    }
}

impl<E: Encode + ?Sized> Encode for Box<E> {
    fn write(&mut self, value: i64) -> bool {
        (**self).write(value)
    }
    fn count(&self) -> usize {
        (**self).count()
    }
    fn pos(&self) -> usize {
        (**self).pos()
    }
    fn last(&self) -> i64 {
        (**self).last()
    }
    fn encoded(&self) -> &[u8] {
        (**self).encoded()
    }
}

impl<D: Decode + ?Sized> Decode for Box<D> {
    fn read(&mut self) -> Option<i64> {
        (**self).read()
    }
    fn count(&self) -> usize {
        (**self).count()
    }
    fn pos(&self) -> usize {
        (**self).pos()
    }
    fn seek(&mut self, n: usize) -> bool {
        (**self).seek(n)
    }
}

// ============================================================================
// Width helpers
// ============================================================================

/// Minimal two's complement width of `value`, 0 for zero.
#[inline]
pub fn width(value: i64) -> u8 {
    if value == 0 {
        return 0;
    }
    let magnitude = if value < 0 { !value } else { value };
    (65 - magnitude.leading_zeros()) as u8
}

/// Sign-extend the low `width` bits of `raw`.
#[inline]
pub(crate) fn sign_extend(raw: u64, width: u8) -> i64 {
    if width == 0 {
        return 0;
    }
    let shift = 64 - width as u32;
    ((raw << shift) as i64) >> shift
}

/// Bytes needed to hold `bits` bits
#[inline]
pub(crate) fn bytes_for(bits: usize) -> usize {
    (bits + 7) / 8
}

// ============================================================================
// CodecKind
// ============================================================================

/// Runtime choice of codec composition for a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CodecKind {
    /// Values stored as-is
    Raw,
    /// First differences (prices, counters)
    #[default]
    Delta,
    /// Second differences (timestamps, regular sequences)
    DoubleDelta,
}

impl CodecKind {
    /// Convert to u8 for serialization
    pub fn to_u8(self) -> u8 {
        match self {
            CodecKind::Raw => 0,
            CodecKind::Delta => 1,
            CodecKind::DoubleDelta => 2,
        }
    }

    /// Convert from u8 for deserialization
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(CodecKind::Raw),
            1 => Some(CodecKind::Delta),
            2 => Some(CodecKind::DoubleDelta),
            _ => None,
        }
    }

    /// Encoder owning `buf`
    pub fn encoder(self, buf: Vec<u8>) -> Box<dyn Encode> {
        match self {
            CodecKind::Raw => Box::new(Encoder::new(buf)),
            CodecKind::Delta => Box::new(DeltaEncoder::new(Encoder::new(buf))),
            CodecKind::DoubleDelta => {
                Box::new(DeltaEncoder::new(DeltaEncoder::new(Encoder::new(buf))))
            }
        }
    }

    /// Decoder owning `buf`
    pub fn decoder<B>(self, buf: B) -> Box<dyn Decode>
    where
        B: AsRef<[u8]> + 'static,
    {
        match self {
            CodecKind::Raw => Box::new(Decoder::new(buf)),
            CodecKind::Delta => Box::new(DeltaDecoder::new(Decoder::new(buf))),
            CodecKind::DoubleDelta => {
                Box::new(DeltaDecoder::new(DeltaDecoder::new(Decoder::new(buf))))
            }
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width() {
        assert_eq!(width(0), 0);
        assert_eq!(width(-1), 1);
        assert_eq!(width(1), 2);
        assert_eq!(width(-2), 2);
        assert_eq!(width(2), 3);
        assert_eq!(width(127), 8);
        assert_eq!(width(-128), 8);
        assert_eq!(width(128), 9);
        assert_eq!(width(i64::MAX), 64);
        assert_eq!(width(i64::MIN), 64);
    }

    #[test]
    fn test_sign_extend() {
        assert_eq!(sign_extend(0, 0), 0);
        assert_eq!(sign_extend(0b1, 1), -1);
        assert_eq!(sign_extend(0b01, 2), 1);
        assert_eq!(sign_extend(0x80, 8), -128);
        assert_eq!(sign_extend(u64::MAX, 64), -1);
        assert_eq!(sign_extend(i64::MIN as u64, 64), i64::MIN);
    }

    #[test]
    fn test_codec_kind_conversion() {
        for kind in [CodecKind::Raw, CodecKind::Delta, CodecKind::DoubleDelta] {
            assert_eq!(CodecKind::from_u8(kind.to_u8()), Some(kind));
        }
        assert_eq!(CodecKind::from_u8(3), None);
    }

    #[test]
    fn test_codec_kind_dispatch() {
        let values = [5i64, 7, 9, 11, 11, 11, -3];
        for kind in [CodecKind::Raw, CodecKind::Delta, CodecKind::DoubleDelta] {
            let mut enc = kind.encoder(vec![0u8; 128]);
            for &v in &values {
                assert!(enc.write(v));
            }
            assert_eq!(enc.count(), values.len());
            assert_eq!(enc.last(), -3);

            let bytes = enc.encoded().to_vec();
            let mut dec = kind.decoder(bytes);
            let decoded: Vec<i64> = std::iter::from_fn(|| dec.read()).collect();
            assert_eq!(decoded, values, "{:?}", kind);
        }
    }
}
