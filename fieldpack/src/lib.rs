//! Schema-driven packing and unpacking of TLV/LTV financial messages.
//!
//! # Overview
//!
//! A binary message library for ISO-8583-style formats: declare a recursive
//! field schema (names, tags, lengths, nested sub-fields, pluggable byte
//! encodings), then deterministically serialize a matching value tree to
//! bytes and deserialize bytes back into a value tree. Tags the schema does
//! not know about are preserved as undefined children rather than failing,
//! so newer messages decode against older schemas.
//!
//! A [`Schema`] is built once, validated once with [`Schema::validate`], and
//! then shared read-only across any number of threads; every codec strategy
//! is an immutable value behind an `Arc`. Each in-flight message gets its
//! own [`Packer`], which owns the value tree and a cursor over it.
//!
//! # Example
//!
//! ```
//! use fieldpack::{
//!     Ascii, BcdLength, FieldKind, HexTag, Packer, SchemaBuilder,
//! };
//! use std::sync::Arc;
//!
//! // A message of TLV fields: one-byte hex tags, one-byte BCD lengths.
//! let schema = SchemaBuilder::root(FieldKind::Message)
//!     .name("auth")
//!     .children_tag_codec(Arc::new(HexTag))
//!     .children_len_codec(Arc::new(BcdLength::new(1)))
//!     .children_tag_width(1)
//!     .child(FieldKind::TagLengthValue)
//!     .name("pan")
//!     .tag(2)
//!     .body(Arc::new(Ascii))
//!     .up()?
//!     .child(FieldKind::TagLengthValue)
//!     .name("amount")
//!     .tag(4)
//!     .body(Arc::new(Ascii))
//!     .build();
//! schema.validate()?;
//!
//! // Populate and pack.
//! let mut message = Packer::new(&schema);
//! message.at("pan")?.set_text("4111111111111111");
//! message.at("amount")?.set_text("001000");
//! message.validate_data()?;
//! let wire = message.pack()?;
//!
//! // Unpack and read back.
//! let decoded = Packer::unpack(&schema, &wire[..])?;
//! assert_eq!(decoded.text("pan")?, "4111111111111111");
//! assert_eq!(decoded.text("amount")?, "001000");
//! # Ok::<(), fieldpack::Error>(())
//! ```

pub mod builder;
pub mod codec;
pub mod engine;
pub mod error;
pub mod navigator;
pub mod schema;
mod util;
pub mod validate;
pub mod value;

// Re-export main types and traits.
pub use builder::SchemaBuilder;
pub use codec::{
    Ascii, Bcd, BcdInt, BcdLength, BcdPadding, BitmapCodec, Body, BodyCodec, Ebcdic, EbcdicLength,
    EbcdicTag, FixedBitmap, HexLength, HexTag, LengthCodec, Literal, LiteralTag, Tag, TagCodec,
};
pub use engine::Packer;
pub use error::Error;
pub use schema::{FieldId, FieldKind, Schema, SchemaNode};
pub use validate::validate_structure;
pub use value::{UndefinedChild, ValueId, ValueNode, Values};
