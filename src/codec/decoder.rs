//! Base run-length bit-packing decoder.

use bitvec::prelude::*;

use super::{bytes_for, sign_extend, Decode, RUN_HDR_SIZE};

/// Decoder over encoded bytes.
///
/// The buffer must end exactly at the encoded length (see
/// [`Encode::pos`](super::Encode::pos)); bytes past the last run would be
/// read as further runs.
#[derive(Debug, Clone)]
pub struct Decoder<B> {
    buf: B,
    /// Byte offset of the next run header
    next: usize,
    /// Bit cursor inside the current run
    bit: usize,
    /// Values left in the current run
    remaining: usize,
    width: u8,
    count: usize,
}

impl<B: AsRef<[u8]>> Decoder<B> {
    /// Create a decoder reading from the start of `buf`
    pub fn new(buf: B) -> Self {
        Self {
            buf,
            next: 0,
            bit: 0,
            remaining: 0,
            width: 0,
            count: 0,
        }
    }

    /// Length of the encoded data
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.as_ref().len()
    }

    /// True if there is no encoded data at all
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load the next run header. `false` at the end or on a truncated run.
    fn next_run(&mut self) -> bool {
        let buf = self.buf.as_ref();
        let Some(hdr) = buf.get(self.next..self.next + RUN_HDR_SIZE) else {
            return false;
        };
        let width = hdr[0];
        if width > 64 {
            return false;
        }
        let len = hdr[1] as usize + 1;
        let start = self.next + RUN_HDR_SIZE;
        let end = start + bytes_for(len * width as usize);
        if end > buf.len() {
            return false;
        }
        self.width = width;
        self.remaining = len;
        self.bit = start * 8;
        self.next = end;
        true
    }
}

impl<B: AsRef<[u8]>> Decode for Decoder<B> {
    fn read(&mut self) -> Option<i64> {
        if self.remaining == 0 && !self.next_run() {
            return None;
        }
        // zero-width runs carry no bits
        let raw = match self.width as usize {
            0 => 0,
            w => self.buf.as_ref().view_bits::<Lsb0>()[self.bit..self.bit + w].load_le::<u64>(),
        };
        self.bit += self.width as usize;
        self.remaining -= 1;
        self.count += 1;
        Some(sign_extend(raw, self.width))
    }

    #[inline]
    fn count(&self) -> usize {
        self.count
    }

    fn pos(&self) -> usize {
        if self.remaining > 0 {
            bytes_for(self.bit)
        } else {
            self.next
        }
    }

    fn seek(&mut self, mut n: usize) -> bool {
        while n > 0 {
            if self.remaining == 0 && !self.next_run() {
                return false;
            }
            let skip = n.min(self.remaining);
            self.bit += skip * self.width as usize;
            self.remaining -= skip;
            self.count += skip;
            n -= skip;
        }
        true
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
