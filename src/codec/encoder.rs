//! Base run-length bit-packing encoder.

use bitvec::prelude::*;

use super::{bytes_for, width, Encode, MAX_RUN, RUN_HDR_SIZE, RUN_SLACK};

/// Open run state
#[derive(Debug, Clone, Copy)]
struct Run {
    /// Byte offset of the run header
    hdr: usize,
    /// Field width in bits
    width: u8,
    /// Values in the run
    len: usize,
}

impl Run {
    #[inline]
    fn data_start(&self) -> usize {
        self.hdr + RUN_HDR_SIZE
    }

    #[inline]
    fn bits(&self) -> usize {
        self.len * self.width as usize
    }
}

/// Encoder over a caller-supplied buffer.
///
/// `B` is anything that derefs to a byte slice: `&mut [u8]` for a borrowed
/// range, `Vec<u8>` when the encoder should own its block buffer.
///
/// ## Example
///
/// ```
/// use ticktape::codec::{Encode, Encoder};
///
/// let mut buf = [0u8; 4];
/// let mut enc = Encoder::new(&mut buf[..]);
/// assert!(enc.write(1));          // header + 1 byte
/// assert!(enc.write(-1));         // joins the run
/// assert!(!enc.write(1 << 40));   // needs a new 8-byte run: block full
/// assert_eq!(enc.count(), 2);
/// ```
#[derive(Debug)]
pub struct Encoder<B> {
    buf: B,
    pos: usize,
    count: usize,
    last: i64,
    run: Option<Run>,
}

impl<B> Encoder<B>
where
    B: AsRef<[u8]> + AsMut<[u8]>,
{
    /// Create an encoder writing from the start of `buf`
    pub fn new(buf: B) -> Self {
        Self {
            buf,
            pos: 0,
            count: 0,
            last: 0,
            run: None,
        }
    }

    /// Buffer capacity in bytes
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.as_ref().len()
    }

    /// Release the underlying buffer
    pub fn into_inner(self) -> B {
        self.buf
    }

    /// Try to append to the open run.
    ///
    /// `None` means the value does not belong in the open run; `Some(false)`
    /// means it does but there is no room.
    fn extend_run(&mut self, value: i64, w: u8) -> Option<bool> {
        let run = self.run.as_mut()?;
        if run.len >= MAX_RUN || w > run.width || run.width - w > RUN_SLACK {
            return None;
        }
        let end = run.data_start() + bytes_for(run.bits() + run.width as usize);
        if end > self.buf.as_ref().len() {
            return Some(false);
        }
        let buf = self.buf.as_mut();
        if run.width > 0 {
            let start = run.data_start() * 8 + run.bits();
            buf.view_bits_mut::<Lsb0>()[start..start + run.width as usize].store_le(value as u64);
        }
        run.len += 1;
        buf[run.hdr + 1] = (run.len - 1) as u8;
        self.pos = end;
        Some(true)
    }

    fn open_run(&mut self, value: i64, w: u8) -> bool {
        let hdr = self.pos;
        let end = hdr + RUN_HDR_SIZE + bytes_for(w as usize);
        if end > self.buf.as_ref().len() {
            return false;
        }
        let buf = self.buf.as_mut();
        buf[hdr] = w;
        buf[hdr + 1] = 0;
        if w > 0 {
            let start = (hdr + RUN_HDR_SIZE) * 8;
            buf.view_bits_mut::<Lsb0>()[start..start + w as usize].store_le(value as u64);
        }
        self.run = Some(Run { hdr, width: w, len: 1 });
        self.pos = end;
        true
    }
}

impl<B> Encode for Encoder<B>
where
    B: AsRef<[u8]> + AsMut<[u8]>,
{
    fn write(&mut self, value: i64) -> bool {
        let w = width(value);
        let written = match self.extend_run(value, w) {
            Some(written) => written,
            None => self.open_run(value, w),
        };
        if written {
            self.count += 1;
            self.last = value;
        }
        written
    }

    #[inline]
    fn count(&self) -> usize {
        self.count
    }

    #[inline]
    fn pos(&self) -> usize {
        self.pos
    }

    #[inline]
    fn last(&self) -> i64 {
        self.last
    }

    fn encoded(&self) -> &[u8] {
        &self.buf.as_ref()[..self.pos]
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
