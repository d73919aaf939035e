//! Error types for the diff crate.

use std::path::PathBuf;

use bsondiff_codec::{EncodingError, SerializationError};

/// Errors that can occur during diff operations.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// An input could not be turned into a document.
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// The patch could not be converted to its output representation.
    #[error("serialization error: {0}")]
    Serialization(#[from] SerializationError),

    /// A document does not have the shape of a `$set`/`$unset` patch.
    #[error("invalid patch: {0}")]
    InvalidPatch(String),

    /// A configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configuration file could not be parsed.
    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;
