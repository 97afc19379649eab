//! First-difference transform over any encoder/decoder.
//!
//! The first value is stored relative to zero, every later one relative to
//! its predecessor. Differences use wrapping arithmetic so that any `i64`
//! sequence round-trips, including jumps between `i64::MIN` and `i64::MAX`.

use super::{Decode, Encode};

/// Writes `value - previous` through the inner encoder.
#[derive(Debug)]
pub struct DeltaEncoder<E> {
    inner: E,
    base: i64,
}

impl<E: Encode> DeltaEncoder<E> {
    /// Wrap an encoder
    pub fn new(inner: E) -> Self {
        Self { inner, base: 0 }
    }

    /// Inner encoder
    pub fn inner(&self) -> &E {
        &self.inner
    }

    /// Release the inner encoder
    pub fn into_inner(self) -> E {
        self.inner
    }
}

impl<E: Encode> Encode for DeltaEncoder<E> {
    fn write(&mut self, value: i64) -> bool {
        if !self.inner.write(value.wrapping_sub(self.base)) {
            return false;
        }
        self.base = value;
        true
    }

    #[inline]
    fn count(&self) -> usize {
        self.inner.count()
    }

    #[inline]
    fn pos(&self) -> usize {
        self.inner.pos()
    }

    #[inline]
    fn last(&self) -> i64 {
        self.base
    }

    fn encoded(&self) -> &[u8] {
        self.inner.encoded()
    }
}

/// Accumulates differences read from the inner decoder.
#[derive(Debug, Clone)]
pub struct DeltaDecoder<D> {
    inner: D,
    base: i64,
}

impl<D: Decode> DeltaDecoder<D> {
    /// Wrap a decoder
    pub fn new(inner: D) -> Self {
        Self { inner, base: 0 }
    }

    /// Release the inner decoder
    pub fn into_inner(self) -> D {
        self.inner
    }
}

impl<D: Decode> Decode for DeltaDecoder<D> {
    fn read(&mut self) -> Option<i64> {
        let delta = self.inner.read()?;
        self.base = self.base.wrapping_add(delta);
        Some(self.base)
    }

    #[inline]
    fn count(&self) -> usize {
        self.inner.count()
    }

    #[inline]
    fn pos(&self) -> usize {
        self.inner.pos()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Decoder, Encoder};

    #[test]
    fn test_delta_stores_differences() {
        let mut enc = DeltaEncoder::new(Encoder::new(vec![0u8; 64]));
        for v in [100, 101, 102, 102] {
            assert!(enc.write(v));
        }
        assert_eq!(enc.last(), 102);

        let mut raw = Decoder::new(enc.encoded().to_vec());
        let deltas: Vec<i64> = std::iter::from_fn(|| raw.read()).collect();
        assert_eq!(deltas, vec![100, 1, 1, 0]);
    }

    #[test]
    fn test_delta_roundtrip_extremes() {
        let values = [i64::MIN, i64::MAX, 0, i64::MIN, -1, 1];
        let mut enc = DeltaEncoder::new(Encoder::new(vec![0u8; 256]));
        for &v in &values {
            assert!(enc.write(v));
        }
        let mut dec = DeltaDecoder::new(Decoder::new(enc.encoded().to_vec()));
        for &v in &values {
            assert_eq!(dec.read(), Some(v));
        }
        assert_eq!(dec.read(), None);
    }

    #[test]
    fn test_double_delta_regular_sequence_is_compact() {
        let mut enc = DeltaEncoder::new(DeltaEncoder::new(Encoder::new(vec![0u8; 64])));
        for i in 0..200i64 {
            assert!(enc.write(1_700_000_000_000 + i * 1000));
        }
        // first value, first step, then 198 zeros
        assert!(enc.pos() < 16, "pos = {}", enc.pos());

        let mut dec = DeltaDecoder::new(DeltaDecoder::new(Decoder::new(enc.encoded().to_vec())));
        for i in 0..200i64 {
            assert_eq!(dec.read(), Some(1_700_000_000_000 + i * 1000));
        }
        assert_eq!(dec.read(), None);
        assert_eq!(dec.count(), 200);
    }

    #[test]
    fn test_delta_full_buffer_keeps_base() {
        let mut enc = DeltaEncoder::new(Encoder::new(vec![0u8; 4]));
        assert!(enc.write(3));
        assert!(!enc.write(1 << 50));
        assert_eq!(enc.last(), 3);
        assert!(enc.write(4));

        let mut dec = DeltaDecoder::new(Decoder::new(enc.encoded().to_vec()));
        assert_eq!(dec.read(), Some(3));
        assert_eq!(dec.read(), Some(4));
    }
}
