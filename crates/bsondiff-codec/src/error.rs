//! Error types for the codec crate.

use std::fmt;

use bsondiff_types::{ElementType, TypeError};

/// Errors raised while turning input into the document model.
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    /// The top-level value is not a document.
    #[error("expected a document at the root, got {0}")]
    NotADocument(ElementType),

    /// A map key serialized to something other than a string.
    #[error("map keys must be strings, got {0}")]
    NonStringKey(&'static str),

    /// An unsigned integer does not fit the signed 64-bit range.
    #[error("integer {0} does not fit in a signed 64-bit value")]
    IntegerOutOfRange(u64),

    /// A `$`-wrapper map produced by serialization was malformed.
    #[error("invalid typed value: {0}")]
    InvalidTypedValue(#[from] TypeError),

    /// The input ended before the current element was complete.
    #[error("unexpected end of input at offset {0}")]
    UnexpectedEof(usize),

    #[error("unknown element type 0x{tag:02x} at offset {offset}")]
    UnknownElementType { tag: u8, offset: usize },

    #[error("invalid UTF-8 at offset {0}")]
    InvalidUtf8(usize),

    /// Structural damage: bad lengths, missing terminators, trailing bytes.
    #[error("malformed document at offset {offset}: {reason}")]
    Malformed { offset: usize, reason: String },

    #[error("documents nested deeper than {0} levels")]
    TooDeep(usize),

    /// Free-form error raised by a `Serialize` implementation.
    #[error("{0}")]
    Custom(String),
}

impl serde::ser::Error for EncodingError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        EncodingError::Custom(msg.to_string())
    }
}

/// Errors raised while turning the document model into an output form.
#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    /// BSON C-strings (field names, regex parts) cannot hold NUL bytes.
    #[error("{0:?} contains a NUL byte and cannot be written as a C-string")]
    NulInCString(String),

    #[error("encoded size {0} exceeds the maximum document size")]
    TooLarge(usize),

    #[error("JSON conversion failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias for encoding results.
pub type EncodingResult<T> = Result<T, EncodingError>;

/// Convenience alias for serialization results.
pub type SerializationResult<T> = Result<T, SerializationError>;
