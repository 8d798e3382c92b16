//! Pluggable codec strategies for field bodies, tags, lengths, and bitmaps.
//!
//! Every codec is a stateless, immutable value shared behind an `Arc` by any
//! number of schema trees and threads. Codecs operate on [`bytes::Buf`] /
//! [`bytes::BufMut`] trait objects so a schema node can select its strategy
//! at runtime. Errors produced here carry no field path; the engine and
//! validator attach one.

use crate::error::Error;
use bytes::{Buf, BufMut, Bytes};
use std::fmt::Debug;

pub mod bitmap;
pub mod body;
pub mod length;
pub mod tag;

pub use bitmap::{BitmapCodec, FixedBitmap};
pub use body::{Ascii, Bcd, BcdInt, BcdPadding, Ebcdic, Literal};
pub use length::{BcdLength, EbcdicLength, HexLength, LengthCodec};
pub use tag::{EbcdicTag, HexTag, LiteralTag, Tag, TagCodec};

/// A decoded (or to-be-encoded) field body.
///
/// A closed sum: each body codec accepts and produces exactly one variant,
/// checked up front rather than discovered mid-encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Character data (digit strings, alphanumeric fields).
    Text(String),
    /// An unsigned integer (fixed-width packed numerics).
    Int(u64),
    /// Opaque bytes passed through untouched.
    Raw(Bytes),
}

impl Body {
    /// The variant name, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Int(_) => "integer",
            Self::Raw(_) => "raw",
        }
    }

    /// Returns the text content, or a [`Error::WrongKind`] error.
    pub fn as_text(&self) -> Result<&str, Error> {
        match self {
            Self::Text(s) => Ok(s),
            other => Err(wrong_kind("text", other)),
        }
    }

    /// Returns the integer content, or a [`Error::WrongKind`] error.
    pub fn as_int(&self) -> Result<u64, Error> {
        match self {
            Self::Int(v) => Ok(*v),
            other => Err(wrong_kind("integer", other)),
        }
    }

    /// Returns the raw bytes, or a [`Error::WrongKind`] error.
    pub fn as_raw(&self) -> Result<&Bytes, Error> {
        match self {
            Self::Raw(b) => Ok(b),
            other => Err(wrong_kind("raw", other)),
        }
    }
}

impl std::fmt::Display for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Raw(b) => {
                for byte in b.iter() {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }
    }
}

fn wrong_kind(expected: &'static str, found: &Body) -> Error {
    Error::WrongKind {
        field: String::new(),
        expected,
        found: found.kind(),
    }
}

/// Strategy for encoding and decoding a field body.
pub trait BodyCodec: Debug + Send + Sync {
    /// Encodes `value` by writing to `buf`.
    fn write(&self, value: &Body, buf: &mut dyn BufMut) -> Result<(), Error>;

    /// Decodes a body from the next `len` bytes of `buf`.
    fn read(&self, buf: &mut dyn Buf, len: usize) -> Result<Body, Error>;

    /// The exact number of bytes [`BodyCodec::write`] will produce for `value`.
    fn encode_size(&self, value: &Body) -> Result<usize, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_kind_mismatch() {
        let body = Body::Int(42);
        assert!(matches!(
            body.as_text(),
            Err(Error::WrongKind {
                expected: "text",
                found: "integer",
                ..
            })
        ));
        assert_eq!(body.as_int().unwrap(), 42);
    }

    #[test]
    fn test_body_display() {
        assert_eq!(Body::Text("123".into()).to_string(), "\"123\"");
        assert_eq!(Body::Int(90).to_string(), "90");
        assert_eq!(Body::Raw(Bytes::from_static(&[0xAB, 0x01])).to_string(), "ab01");
    }
}
