//! Body codecs: packed decimal, EBCDIC, ASCII, and raw passthrough.

use super::{Body, BodyCodec};
use crate::{
    error::Error,
    util::{decimal_digits, fold_decimal, pack_nibbles, take, to_digits, unpack_nibbles},
};
use bytes::{Buf, BufMut};

/// Padding policy for the [`Bcd`] codec.
///
/// BCD packs two decimal digits per byte, so an odd digit count needs one pad
/// nibble (or is rejected outright).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BcdPadding {
    /// No padding: an odd digit count is an error.
    None,
    /// Pad odd values with a leading `0` nibble.
    LeftZero,
    /// Pad odd values with a leading `F` nibble.
    LeftF,
    /// Pad odd values with a trailing `F` nibble.
    RightF,
}

/// Binary-coded decimal body codec over [`Body::Text`] digit strings.
///
/// Decoding strips exactly one pad nibble when the policy's pad is present at
/// its position, so `encode("123")` under [`BcdPadding::LeftZero`] yields
/// `01 23` and decodes back to `"123"`.
#[derive(Debug, Clone, Copy)]
pub struct Bcd {
    pub padding: BcdPadding,
}

impl Bcd {
    pub const fn new(padding: BcdPadding) -> Self {
        Self { padding }
    }
}

impl BodyCodec for Bcd {
    fn write(&self, value: &Body, buf: &mut dyn BufMut) -> Result<(), Error> {
        let mut nibbles = to_digits(value.as_text()?)?;
        if nibbles.len() % 2 != 0 {
            match self.padding {
                BcdPadding::None => {
                    return Err(Error::invalid(format!(
                        "odd digit count {} with no padding",
                        nibbles.len()
                    )))
                }
                BcdPadding::LeftZero => nibbles.insert(0, 0x0),
                BcdPadding::LeftF => nibbles.insert(0, 0xF),
                BcdPadding::RightF => nibbles.push(0xF),
            }
        }
        buf.put_slice(&pack_nibbles(&nibbles));
        Ok(())
    }

    fn read(&self, buf: &mut dyn Buf, len: usize) -> Result<Body, Error> {
        let bytes = take(buf, len)?;
        let mut nibbles = unpack_nibbles(&bytes);
        match self.padding {
            BcdPadding::None => {}
            BcdPadding::LeftZero => {
                if nibbles.first() == Some(&0x0) {
                    nibbles.remove(0);
                }
            }
            BcdPadding::LeftF => {
                if nibbles.first() == Some(&0xF) {
                    nibbles.remove(0);
                }
            }
            BcdPadding::RightF => {
                if nibbles.last() == Some(&0xF) {
                    nibbles.pop();
                }
            }
        }
        let mut text = String::with_capacity(nibbles.len());
        for nibble in nibbles {
            if nibble > 9 {
                return Err(Error::invalid(format!(
                    "nibble {nibble:#x} is not a decimal digit"
                )));
            }
            text.push(char::from(b'0' + nibble));
        }
        Ok(Body::Text(text))
    }

    fn encode_size(&self, value: &Body) -> Result<usize, Error> {
        let digits = value.as_text()?.len();
        if digits % 2 != 0 && self.padding == BcdPadding::None {
            return Err(Error::invalid(format!(
                "odd digit count {digits} with no padding"
            )));
        }
        Ok(digits.div_ceil(2))
    }
}

/// Fixed-width packed integer codec over [`Body::Int`].
///
/// Always left-zero-padded to `width` bytes (`2 * width` decimal digits).
#[derive(Debug, Clone, Copy)]
pub struct BcdInt {
    pub width: usize,
}

impl BcdInt {
    pub const fn new(width: usize) -> Self {
        Self { width }
    }
}

impl BodyCodec for BcdInt {
    fn write(&self, value: &Body, buf: &mut dyn BufMut) -> Result<(), Error> {
        let digits = decimal_digits(value.as_int()?, self.width * 2)?;
        buf.put_slice(&pack_nibbles(&digits));
        Ok(())
    }

    fn read(&self, buf: &mut dyn Buf, len: usize) -> Result<Body, Error> {
        let bytes = take(buf, len)?;
        let value = fold_decimal(&unpack_nibbles(&bytes))?;
        Ok(Body::Int(value))
    }

    fn encode_size(&self, value: &Body) -> Result<usize, Error> {
        value.as_int()?;
        Ok(self.width)
    }
}

/// EBCDIC (code page 1047) to Unicode, one entry per EBCDIC byte.
///
/// CP1047 maps onto exactly the ISO-8859-1 repertoire, so the table is a
/// permutation of 0x00..=0xFF and inverts cleanly.
const EBCDIC_TO_LATIN1: [u8; 256] = [
    0x00, 0x01, 0x02, 0x03, 0x9C, 0x09, 0x86, 0x7F, 0x97, 0x8D, 0x8E, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F,
    0x10, 0x11, 0x12, 0x13, 0x9D, 0x85, 0x08, 0x87, 0x18, 0x19, 0x92, 0x8F, 0x1C, 0x1D, 0x1E, 0x1F,
    0x80, 0x81, 0x82, 0x83, 0x84, 0x0A, 0x17, 0x1B, 0x88, 0x89, 0x8A, 0x8B, 0x8C, 0x05, 0x06, 0x07,
    0x90, 0x91, 0x16, 0x93, 0x94, 0x95, 0x96, 0x04, 0x98, 0x99, 0x9A, 0x9B, 0x14, 0x15, 0x9E, 0x1A,
    0x20, 0xA0, 0xE2, 0xE4, 0xE0, 0xE1, 0xE3, 0xE5, 0xE7, 0xF1, 0xA2, 0x2E, 0x3C, 0x28, 0x2B, 0x7C,
    0x26, 0xE9, 0xEA, 0xEB, 0xE8, 0xED, 0xEE, 0xEF, 0xEC, 0xDF, 0x21, 0x24, 0x2A, 0x29, 0x3B, 0x5E,
    0x2D, 0x2F, 0xC2, 0xC4, 0xC0, 0xC1, 0xC3, 0xC5, 0xC7, 0xD1, 0xA6, 0x2C, 0x25, 0x5F, 0x3E, 0x3F,
    0xF8, 0xC9, 0xCA, 0xCB, 0xC8, 0xCD, 0xCE, 0xCF, 0xCC, 0x60, 0x3A, 0x23, 0x40, 0x27, 0x3D, 0x22,
    0xD8, 0x61, 0x62, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68, 0x69, 0xAB, 0xBB, 0xF0, 0xFD, 0xFE, 0xB1,
    0xB0, 0x6A, 0x6B, 0x6C, 0x6D, 0x6E, 0x6F, 0x70, 0x71, 0x72, 0xAA, 0xBA, 0xE6, 0xB8, 0xC6, 0xA4,
    0xB5, 0x7E, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7A, 0xA1, 0xBF, 0xD0, 0x5B, 0xDE, 0xAE,
    0xAC, 0xA3, 0xA5, 0xB7, 0xA9, 0xA7, 0xB6, 0xBC, 0xBD, 0xBE, 0xDD, 0xA8, 0xAF, 0x5D, 0xB4, 0xD7,
    0x7B, 0x41, 0x42, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x49, 0xAD, 0xF4, 0xF6, 0xF2, 0xF3, 0xF5,
    0x7D, 0x4A, 0x4B, 0x4C, 0x4D, 0x4E, 0x4F, 0x50, 0x51, 0x52, 0xB9, 0xFB, 0xFC, 0xF9, 0xFA, 0xFF,
    0x5C, 0xF7, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5A, 0xB2, 0xD4, 0xD6, 0xD2, 0xD3, 0xD5,
    0x30, 0x31, 0x32, 0x33, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0xB3, 0xDB, 0xDC, 0xD9, 0xDA, 0x9F,
];

const fn invert(table: [u8; 256]) -> [u8; 256] {
    let mut inverse = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        inverse[table[i] as usize] = i as u8;
        i += 1;
    }
    inverse
}

const LATIN1_TO_EBCDIC: [u8; 256] = invert(EBCDIC_TO_LATIN1);

/// EBCDIC body codec over [`Body::Text`], mapping ISO-8859-1 characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ebcdic;

impl BodyCodec for Ebcdic {
    fn write(&self, value: &Body, buf: &mut dyn BufMut) -> Result<(), Error> {
        for c in value.as_text()?.chars() {
            let code = u32::from(c);
            if code > 0xFF {
                return Err(Error::invalid(format!(
                    "character {c:?} is outside ISO-8859-1"
                )));
            }
            buf.put_u8(LATIN1_TO_EBCDIC[code as usize]);
        }
        Ok(())
    }

    fn read(&self, buf: &mut dyn Buf, len: usize) -> Result<Body, Error> {
        let bytes = take(buf, len)?;
        let text = bytes
            .iter()
            .map(|&b| char::from(EBCDIC_TO_LATIN1[b as usize]))
            .collect();
        Ok(Body::Text(text))
    }

    fn encode_size(&self, value: &Body) -> Result<usize, Error> {
        Ok(value.as_text()?.chars().count())
    }
}

/// ASCII body codec over [`Body::Text`], one byte per character.
///
/// An odd byte count is rejected on both encode and decode.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ascii;

impl BodyCodec for Ascii {
    fn write(&self, value: &Body, buf: &mut dyn BufMut) -> Result<(), Error> {
        let text = value.as_text()?;
        if !text.is_ascii() {
            return Err(Error::invalid("non-ASCII character in text body"));
        }
        if text.len() % 2 != 0 {
            return Err(Error::invalid(format!(
                "odd ASCII body length {}",
                text.len()
            )));
        }
        buf.put_slice(text.as_bytes());
        Ok(())
    }

    fn read(&self, buf: &mut dyn Buf, len: usize) -> Result<Body, Error> {
        if len % 2 != 0 {
            return Err(Error::invalid(format!("odd ASCII body length {len}")));
        }
        let bytes = take(buf, len)?;
        if !bytes.is_ascii() {
            return Err(Error::invalid("non-ASCII byte in body"));
        }
        // The bytes were just checked to be ASCII.
        let text = String::from_utf8(bytes.to_vec())
            .map_err(|_| Error::invalid("non-ASCII byte in body"))?;
        Ok(Body::Text(text))
    }

    fn encode_size(&self, value: &Body) -> Result<usize, Error> {
        let len = value.as_text()?.len();
        if len % 2 != 0 {
            return Err(Error::invalid(format!("odd ASCII body length {len}")));
        }
        Ok(len)
    }
}

/// Raw byte passthrough over [`Body::Raw`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Literal;

impl BodyCodec for Literal {
    fn write(&self, value: &Body, buf: &mut dyn BufMut) -> Result<(), Error> {
        buf.put_slice(value.as_raw()?);
        Ok(())
    }

    fn read(&self, buf: &mut dyn Buf, len: usize) -> Result<Body, Error> {
        Ok(Body::Raw(take(buf, len)?))
    }

    fn encode_size(&self, value: &Body) -> Result<usize, Error> {
        Ok(value.as_raw()?.len())
    }
}
