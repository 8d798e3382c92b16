//! Length codecs: how a variable field's length prefix is rendered.

use crate::{
    error::Error,
    util::{at_least, decimal_digits, fold_decimal, pack_nibbles, take, unpack_nibbles},
};
use bytes::{Buf, BufMut};
use std::fmt::Debug;

/// Strategy for encoding and decoding a body-length prefix.
///
/// The width of the length field itself may depend on the value (see
/// [`HexLength`]), so [`LengthCodec::encode_size`] reports it per length.
pub trait LengthCodec: Debug + Send + Sync {
    /// Encodes `len` as a length prefix.
    fn write(&self, len: usize, buf: &mut dyn BufMut) -> Result<(), Error>;

    /// Decodes a body length, consuming the prefix bytes.
    fn read(&self, buf: &mut dyn Buf) -> Result<usize, Error>;

    /// The number of bytes [`LengthCodec::write`] will produce for `len`.
    fn encode_size(&self, len: usize) -> Result<usize, Error>;
}

/// Packed-decimal length prefix of a fixed width (1 to 5 bytes).
///
/// Length 123 in width 2 is `01 23`.
#[derive(Debug, Clone, Copy)]
pub struct BcdLength {
    pub width: usize,
}

impl BcdLength {
    pub const fn new(width: usize) -> Self {
        Self { width }
    }

    fn checked_width(&self) -> Result<usize, Error> {
        if !(1..=5).contains(&self.width) {
            return Err(Error::invalid(format!(
                "BCD length width {} is outside 1..=5",
                self.width
            )));
        }
        Ok(self.width)
    }
}

impl LengthCodec for BcdLength {
    fn write(&self, len: usize, buf: &mut dyn BufMut) -> Result<(), Error> {
        let width = self.checked_width()?;
        let digits = decimal_digits(len as u64, width * 2)?;
        buf.put_slice(&pack_nibbles(&digits));
        Ok(())
    }

    fn read(&self, buf: &mut dyn Buf) -> Result<usize, Error> {
        let bytes = take(buf, self.checked_width()?)?;
        Ok(fold_decimal(&unpack_nibbles(&bytes))? as usize)
    }

    fn encode_size(&self, _len: usize) -> Result<usize, Error> {
        self.checked_width()
    }
}

/// EBCDIC-decimal length prefix of a fixed width, one `F`-nibbled digit per
/// byte. Length 42 in width 3 is `F0 F4 F2`.
#[derive(Debug, Clone, Copy)]
pub struct EbcdicLength {
    pub width: usize,
}

impl EbcdicLength {
    pub const fn new(width: usize) -> Self {
        Self { width }
    }
}

impl LengthCodec for EbcdicLength {
    fn write(&self, len: usize, buf: &mut dyn BufMut) -> Result<(), Error> {
        for digit in decimal_digits(len as u64, self.width)? {
            buf.put_u8(0xF0 | digit);
        }
        Ok(())
    }

    fn read(&self, buf: &mut dyn Buf) -> Result<usize, Error> {
        let bytes = take(buf, self.width)?;
        let mut value: usize = 0;
        for &byte in bytes.iter() {
            if byte & 0xF0 != 0xF0 || byte & 0x0F > 9 {
                return Err(Error::invalid(format!(
                    "byte {byte:#04x} is not an EBCDIC decimal digit"
                )));
            }
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add((byte & 0x0F) as usize))
                .ok_or_else(|| Error::invalid("length overflows usize"))?;
        }
        Ok(value)
    }

    fn encode_size(&self, _len: usize) -> Result<usize, Error> {
        Ok(self.width)
    }
}

/// Self-describing hex length, BER style.
///
/// Values up to 127 encode as a single byte; 128 to 255 as `81` plus one
/// byte; 256 to 65535 as `82` plus two big-endian bytes. Larger values fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct HexLength;

impl LengthCodec for HexLength {
    fn write(&self, len: usize, buf: &mut dyn BufMut) -> Result<(), Error> {
        match len {
            0..=0x7F => buf.put_u8(len as u8),
            0x80..=0xFF => {
                buf.put_u8(0x81);
                buf.put_u8(len as u8);
            }
            0x100..=0xFFFF => {
                buf.put_u8(0x82);
                buf.put_u16(len as u16);
            }
            _ => {
                return Err(Error::LengthExceeded {
                    field: String::new(),
                    len,
                    max: 0xFFFF,
                })
            }
        }
        Ok(())
    }

    fn read(&self, buf: &mut dyn Buf) -> Result<usize, Error> {
        at_least(buf, 1)?;
        match buf.get_u8() {
            flag @ 0..=0x7F => Ok(flag as usize),
            0x81 => {
                at_least(buf, 1)?;
                Ok(buf.get_u8() as usize)
            }
            0x82 => {
                at_least(buf, 2)?;
                Ok(buf.get_u16() as usize)
            }
            flag => Err(Error::invalid(format!(
                "unsupported length flag {flag:#04x}"
            ))),
        }
    }

    fn encode_size(&self, len: usize) -> Result<usize, Error> {
        match len {
            0..=0x7F => Ok(1),
            0x80..=0xFF => Ok(2),
            0x100..=0xFFFF => Ok(3),
            _ => Err(Error::LengthExceeded {
                field: String::new(),
                len,
                max: 0xFFFF,
            }),
        }
    }
}
