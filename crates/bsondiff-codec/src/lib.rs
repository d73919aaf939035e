//! Codecs for bsondiff documents.
//!
//! # Key Types
//!
//! - [`bson::encode_document`] / [`bson::decode_document`] -- BSON binary form
//! - [`ser::to_document`] / [`ser::to_value`] -- serde adapter from any `Serialize`
//! - [`EncodingError`] -- input could not become a document
//! - [`SerializationError`] -- a document could not be written out
//!
//! Extended JSON lives with the document model in
//! [`bsondiff_types::extjson`] and is re-exported here for convenience.

pub mod bson;
pub mod error;
pub mod ser;

pub use bson::{decode_document, encode_document};
pub use bsondiff_types::extjson::{
    document_from_extended_json, document_to_extended_json, from_extended_json, to_extended_json,
};
pub use error::{EncodingError, EncodingResult, SerializationError, SerializationResult};
pub use ser::{from_document, to_document, to_value};
