//! Error types for schema, codec, and packing operations.

use thiserror::Error;

/// Error type for all schema, codec, and packing operations.
///
/// Every variant carries the full path of the offending field. Codecs do not
/// know where in a tree they are invoked, so they construct errors with an
/// empty path and the caller attaches it with [`Error::at`].
#[derive(Error, Debug)]
pub enum Error {
    /// Not enough bytes remained to decode a tag, length, or body.
    #[error("unexpected end of buffer in {field} at offset {offset}: need {need} bytes, {have} remaining")]
    EndOfBuffer {
        field: String,
        offset: usize,
        need: usize,
        have: usize,
    },

    /// Malformed bytes or an out-of-domain value.
    #[error("invalid data in {field}: {message}")]
    InvalidData { field: String, message: String },

    /// A body codec was handed the wrong [`crate::codec::Body`] variant.
    #[error("wrong value kind in {field}: expected {expected}, found {found}")]
    WrongKind {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A length exceeded what the codec or schema allows.
    #[error("length {len} exceeds limit {max} in {field}")]
    LengthExceeded {
        field: String,
        len: usize,
        max: usize,
    },

    /// A name, tag, path, or codec lookup failed.
    #[error("unresolved lookup in {field}: {message}")]
    Unresolved { field: String, message: String },

    /// A structural rule violation found by schema validation.
    #[error("invalid schema at {field}: {message}")]
    InvalidSchema { field: String, message: String },

    /// A mandatory field had no value before packing.
    #[error("missing value for {field}")]
    MissingValue { field: String },

    /// The encoded body size disagreed with the declared fixed length.
    #[error("fixed length mismatch in {field}: declared {declared}, encoded {encoded}")]
    FixedLengthMismatch {
        field: String,
        declared: usize,
        encoded: usize,
    },
}

impl Error {
    /// Shorthand for [`Error::EndOfBuffer`] with no path or offset context.
    pub(crate) fn end_of_buffer(need: usize, have: usize) -> Self {
        Self::EndOfBuffer {
            field: String::new(),
            offset: 0,
            need,
            have,
        }
    }

    /// Shorthand for [`Error::InvalidData`] with no path context.
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidData {
            field: String::new(),
            message: message.into(),
        }
    }

    /// Attaches a field path to the error if it does not already carry one.
    ///
    /// The deepest context wins: re-wrapping an error that already names a
    /// field leaves it untouched.
    pub(crate) fn at(mut self, path: impl AsRef<str>) -> Self {
        let field = match &mut self {
            Self::EndOfBuffer { field, .. }
            | Self::InvalidData { field, .. }
            | Self::WrongKind { field, .. }
            | Self::LengthExceeded { field, .. }
            | Self::Unresolved { field, .. }
            | Self::InvalidSchema { field, .. }
            | Self::MissingValue { field }
            | Self::FixedLengthMismatch { field, .. } => field,
        };
        if field.is_empty() {
            *field = path.as_ref().to_string();
        }
        self
    }

    /// Shifts the buffer offset of an [`Error::EndOfBuffer`] by `base`.
    ///
    /// Codecs report offsets relative to the slice they were handed; the
    /// engine rebases them onto the whole message.
    pub(crate) fn offset(mut self, base: usize) -> Self {
        if let Self::EndOfBuffer { offset, .. } = &mut self {
            *offset += base;
        }
        self
    }
}
