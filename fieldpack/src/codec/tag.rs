//! Tag codecs: how a field's header tag is rendered on the wire.

use crate::{
    error::Error,
    util::{decimal_digits, fold_be, take},
};
use bytes::{Buf, BufMut, Bytes};
use std::fmt::Debug;

/// A field's header tag: either a plain number or literal header bytes.
///
/// Both forms compare by [`Tag::number`], folding literal bytes big-endian,
/// so a schema declared with literals still matches tags decoded as numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tag {
    Num(u64),
    Literal(Bytes),
}

impl Tag {
    /// The numeric value of the tag.
    pub fn number(&self) -> u64 {
        match self {
            Self::Num(n) => *n,
            // Literal tags longer than eight bytes are rejected at encode
            // time; saturate here rather than panic.
            Self::Literal(bytes) => fold_be(bytes).unwrap_or(u64::MAX),
        }
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.number())
    }
}

impl From<u64> for Tag {
    fn from(n: u64) -> Self {
        Self::Num(n)
    }
}

/// Strategy for encoding and decoding a header tag of a fixed width.
pub trait TagCodec: Debug + Send + Sync {
    /// Encodes `tag` into exactly `width` bytes.
    fn write(&self, tag: &Tag, width: usize, buf: &mut dyn BufMut) -> Result<(), Error>;

    /// Decodes a tag number from the next `width` bytes of `buf`.
    fn read(&self, buf: &mut dyn Buf, width: usize) -> Result<u64, Error>;
}

fn write_be(n: u64, width: usize, buf: &mut dyn BufMut) -> Result<(), Error> {
    if width > 8 || (width < 8 && n >= 1u64 << (8 * width)) {
        return Err(Error::invalid(format!(
            "tag {n} does not fit in {width} bytes"
        )));
    }
    for i in (0..width).rev() {
        buf.put_u8((n >> (8 * i)) as u8);
    }
    Ok(())
}

/// Tag number written big-endian: tag `0x90` in width 1 is the byte `90`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HexTag;

impl TagCodec for HexTag {
    fn write(&self, tag: &Tag, width: usize, buf: &mut dyn BufMut) -> Result<(), Error> {
        write_be(tag.number(), width, buf)
    }

    fn read(&self, buf: &mut dyn Buf, width: usize) -> Result<u64, Error> {
        fold_be(&take(buf, width)?)
    }
}

/// EBCDIC-decimal tag: each decimal digit emitted with a high `F` nibble,
/// left-zero-padded to the width. Tag 90 in width 2 is `F9 F0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EbcdicTag;

impl TagCodec for EbcdicTag {
    fn write(&self, tag: &Tag, width: usize, buf: &mut dyn BufMut) -> Result<(), Error> {
        for digit in decimal_digits(tag.number(), width)? {
            buf.put_u8(0xF0 | digit);
        }
        Ok(())
    }

    fn read(&self, buf: &mut dyn Buf, width: usize) -> Result<u64, Error> {
        let bytes = take(buf, width)?;
        let mut value: u64 = 0;
        for &byte in bytes.iter() {
            if byte & 0xF0 != 0xF0 || byte & 0x0F > 9 {
                return Err(Error::invalid(format!(
                    "byte {byte:#04x} is not an EBCDIC decimal digit"
                )));
            }
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add(u64::from(byte & 0x0F)))
                .ok_or_else(|| Error::invalid("tag value overflows u64"))?;
        }
        Ok(value)
    }
}

/// Literal passthrough: a [`Tag::Literal`] is emitted verbatim, and decoded
/// tags are the raw bytes folded big-endian. A [`Tag::Num`] falls back to
/// big-endian rendering.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiteralTag;

impl TagCodec for LiteralTag {
    fn write(&self, tag: &Tag, width: usize, buf: &mut dyn BufMut) -> Result<(), Error> {
        match tag {
            Tag::Literal(bytes) => {
                if bytes.len() != width {
                    return Err(Error::invalid(format!(
                        "literal tag is {} bytes, declared width is {width}",
                        bytes.len()
                    )));
                }
                buf.put_slice(bytes);
                Ok(())
            }
            Tag::Num(n) => write_be(*n, width, buf),
        }
    }

    fn read(&self, buf: &mut dyn Buf, width: usize) -> Result<u64, Error> {
        fold_be(&take(buf, width)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    fn encode(codec: &dyn TagCodec, tag: &Tag, width: usize) -> Vec<u8> {
        let mut buf = BytesMut::new();
        codec.write(tag, width, &mut buf).unwrap();
        assert_eq!(buf.len(), width);
        buf.to_vec()
    }

    #[test]
    fn test_hex_tag() {
        let encoded = encode(&HexTag, &Tag::Num(0x9F26), 2);
        assert_eq!(encoded, vec![0x9F, 0x26]);
        assert_eq!(HexTag.read(&mut &encoded[..], 2).unwrap(), 0x9F26);
    }

    #[test]
    fn test_hex_tag_overflow() {
        assert!(HexTag
            .write(&Tag::Num(0x100), 1, &mut BytesMut::new())
            .is_err());
    }

    #[test]
    fn test_ebcdic_tag_90() {
        let encoded = encode(&EbcdicTag, &Tag::Num(90), 2);
        assert_eq!(encoded, vec![0xF9, 0xF0]);
        assert_eq!(EbcdicTag.read(&mut &encoded[..], 2).unwrap(), 90);
    }

    #[test]
    fn test_ebcdic_tag_rejects_bad_nibbles() {
        assert!(EbcdicTag.read(&mut &[0x90, 0xF0][..], 2).is_err());
        assert!(EbcdicTag.read(&mut &[0xFA][..], 1).is_err());
    }

    #[test]
    fn test_ebcdic_tag_width_overflow() {
        assert!(EbcdicTag
            .write(&Tag::Num(100), 2, &mut BytesMut::new())
            .is_err());
    }

    #[test]
    fn test_literal_tag_round_trip() {
        let tag = Tag::Literal(Bytes::from_static(&[0xDF, 0x01]));
        let encoded = encode(&LiteralTag, &tag, 2);
        assert_eq!(encoded, vec![0xDF, 0x01]);
        assert_eq!(LiteralTag.read(&mut &encoded[..], 2).unwrap(), tag.number());
    }

    #[test]
    fn test_literal_tag_width_mismatch() {
        let tag = Tag::Literal(Bytes::from_static(&[0x01]));
        assert!(LiteralTag.write(&tag, 2, &mut BytesMut::new()).is_err());
    }

    #[test]
    fn test_truncated_tag() {
        assert!(matches!(
            HexTag.read(&mut &[0x01u8][..], 2),
            Err(Error::EndOfBuffer { need: 2, have: 1, .. })
        ));
    }
}
