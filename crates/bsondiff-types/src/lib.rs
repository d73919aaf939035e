//! Document model for bsondiff.
//!
//! This crate provides the canonical, typed, hierarchical representation all
//! diff logic operates over. Every other bsondiff crate depends on
//! `bsondiff-types`.
//!
//! # Key Types
//!
//! - [`Document`] -- Insertion-ordered field map with unique names
//! - [`Value`] -- Tagged union of scalar kinds plus `Document` and `Array`
//! - [`ElementType`] -- Wire tag of a value, used for type-exact equality
//! - [`ObjectId`] -- 12-byte document identifier
//! - [`Timestamp`] -- Replication timestamp (seconds + increment)
//! - [`Decimal128`] -- IEEE 754-2008 decimal floating point
//!
//! The [`extjson`] module converts between values and MongoDB Extended JSON.

pub mod decimal128;
pub mod document;
pub mod error;
pub mod extjson;
pub mod object_id;
pub mod timestamp;
pub mod value;

pub use decimal128::Decimal128;
pub use document::Document;
pub use error::TypeError;
pub use extjson::ExtJsonMode;
pub use object_id::ObjectId;
pub use timestamp::Timestamp;
pub use value::{Binary, CodeWithScope, DbPointer, ElementType, Regex, Value};
