//! Bitmap codecs: presence indicators for optional sibling fields.

use crate::{error::Error, util::take};
use bytes::{Buf, BufMut};
use std::fmt::Debug;

/// Strategy for encoding which children of a bitmap container are present.
pub trait BitmapCodec: Debug + Send + Sync {
    /// The fixed byte width of the bitmap word.
    fn width(&self) -> usize;

    /// Encodes presence flags, one per child position.
    fn write(&self, bits: &[bool], buf: &mut dyn BufMut) -> Result<(), Error>;

    /// Decodes the bitmap word into one flag per position.
    fn read(&self, buf: &mut dyn Buf) -> Result<Vec<bool>, Error>;
}

/// Fixed-width bitmap, ISO-8583 bit order: position 0 is the most
/// significant bit of the first byte.
#[derive(Debug, Clone, Copy)]
pub struct FixedBitmap {
    pub width: usize,
}

impl FixedBitmap {
    pub const fn new(width: usize) -> Self {
        Self { width }
    }

    /// The number of child positions this bitmap can describe.
    pub const fn capacity(&self) -> usize {
        self.width * 8
    }
}

impl BitmapCodec for FixedBitmap {
    fn width(&self) -> usize {
        self.width
    }

    fn write(&self, bits: &[bool], buf: &mut dyn BufMut) -> Result<(), Error> {
        if bits.len() > self.capacity() {
            return Err(Error::invalid(format!(
                "{} positions exceed bitmap capacity {}",
                bits.len(),
                self.capacity()
            )));
        }
        let mut word = vec![0u8; self.width];
        for (i, set) in bits.iter().enumerate() {
            if *set {
                word[i / 8] |= 0x80 >> (i % 8);
            }
        }
        buf.put_slice(&word);
        Ok(())
    }

    fn read(&self, buf: &mut dyn Buf) -> Result<Vec<bool>, Error> {
        let word = take(buf, self.width)?;
        let mut bits = Vec::with_capacity(self.capacity());
        for byte in word.iter() {
            for shift in (0..8).rev() {
                bits.push(byte >> shift & 1 == 1);
            }
        }
        Ok(bits)
    }
}
