use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid decimal128 literal: {0}")]
    InvalidDecimal(String),

    #[error("invalid extended JSON {kind}: {detail}")]
    InvalidExtendedJson { kind: &'static str, detail: String },
}

impl TypeError {
    pub(crate) fn ext(kind: &'static str, detail: impl Into<String>) -> Self {
        Self::InvalidExtendedJson {
            kind,
            detail: detail.into(),
        }
    }
}
