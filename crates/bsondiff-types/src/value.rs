//! The typed value model.
//!
//! Equality is type-exact: two values are equal only when they carry the same
//! [`ElementType`] and the same payload. `Int32(5)`, `Int64(5)` and
//! `Double(5.0)` are three different values, doubles compare by bit pattern,
//! and embedded documents compare independently of field order.

use std::fmt;

use crate::decimal128::Decimal128;
use crate::document::Document;
use crate::object_id::ObjectId;
use crate::timestamp::Timestamp;

/// Wire tag of each value kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ElementType {
    Double = 0x01,
    String = 0x02,
    Document = 0x03,
    Array = 0x04,
    Binary = 0x05,
    Undefined = 0x06,
    ObjectId = 0x07,
    Boolean = 0x08,
    DateTime = 0x09,
    Null = 0x0a,
    RegularExpression = 0x0b,
    DbPointer = 0x0c,
    JavaScriptCode = 0x0d,
    Symbol = 0x0e,
    JavaScriptCodeWithScope = 0x0f,
    Int32 = 0x10,
    Timestamp = 0x11,
    Int64 = 0x12,
    Decimal128 = 0x13,
    MaxKey = 0x7f,
    MinKey = 0xff,
}

impl ElementType {
    /// Map a wire tag back to its element type.
    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0x01 => Self::Double,
            0x02 => Self::String,
            0x03 => Self::Document,
            0x04 => Self::Array,
            0x05 => Self::Binary,
            0x06 => Self::Undefined,
            0x07 => Self::ObjectId,
            0x08 => Self::Boolean,
            0x09 => Self::DateTime,
            0x0a => Self::Null,
            0x0b => Self::RegularExpression,
            0x0c => Self::DbPointer,
            0x0d => Self::JavaScriptCode,
            0x0e => Self::Symbol,
            0x0f => Self::JavaScriptCodeWithScope,
            0x10 => Self::Int32,
            0x11 => Self::Timestamp,
            0x12 => Self::Int64,
            0x13 => Self::Decimal128,
            0x7f => Self::MaxKey,
            0xff => Self::MinKey,
            _ => return None,
        })
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Double => "double",
            Self::String => "string",
            Self::Document => "document",
            Self::Array => "array",
            Self::Binary => "binary",
            Self::Undefined => "undefined",
            Self::ObjectId => "objectId",
            Self::Boolean => "bool",
            Self::DateTime => "date",
            Self::Null => "null",
            Self::RegularExpression => "regex",
            Self::DbPointer => "dbPointer",
            Self::JavaScriptCode => "javascript",
            Self::Symbol => "symbol",
            Self::JavaScriptCodeWithScope => "javascriptWithScope",
            Self::Int32 => "int",
            Self::Timestamp => "timestamp",
            Self::Int64 => "long",
            Self::Decimal128 => "decimal",
            Self::MaxKey => "maxKey",
            Self::MinKey => "minKey",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Binary payload with its subtype byte.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Binary {
    pub subtype: u8,
    pub bytes: Vec<u8>,
}

impl Binary {
    pub const GENERIC: u8 = 0x00;
    pub const UUID: u8 = 0x04;

    pub fn new(subtype: u8, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            subtype,
            bytes: bytes.into(),
        }
    }

    /// Generic (subtype 0) binary data.
    pub fn generic(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(Self::GENERIC, bytes)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Regex {
    pub pattern: String,
    /// Option letters, kept sorted as the wire format requires.
    pub options: String,
}

impl Regex {
    pub fn new(pattern: impl Into<String>, options: impl AsRef<str>) -> Self {
        let mut chars: Vec<char> = options.as_ref().chars().collect();
        chars.sort_unstable();
        Self {
            pattern: pattern.into(),
            options: chars.into_iter().collect(),
        }
    }
}

/// Deprecated reference to a document in another collection.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DbPointer {
    pub namespace: String,
    pub id: ObjectId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodeWithScope {
    pub code: String,
    pub scope: Document,
}

/// A typed document value.
#[derive(Clone, Debug)]
pub enum Value {
    Double(f64),
    String(String),
    Document(Document),
    /// Opaque ordered list. The diff engine never descends into arrays.
    Array(Vec<Value>),
    Binary(Binary),
    Undefined,
    ObjectId(ObjectId),
    Boolean(bool),
    /// Milliseconds since the UNIX epoch.
    DateTime(i64),
    Null,
    RegularExpression(Regex),
    DbPointer(DbPointer),
    JavaScriptCode(String),
    Symbol(String),
    JavaScriptCodeWithScope(CodeWithScope),
    Int32(i32),
    Timestamp(Timestamp),
    Int64(i64),
    Decimal128(Decimal128),
    MaxKey,
    MinKey,
}

impl Value {
    pub fn element_type(&self) -> ElementType {
        match self {
            Value::Double(_) => ElementType::Double,
            Value::String(_) => ElementType::String,
            Value::Document(_) => ElementType::Document,
            Value::Array(_) => ElementType::Array,
            Value::Binary(_) => ElementType::Binary,
            Value::Undefined => ElementType::Undefined,
            Value::ObjectId(_) => ElementType::ObjectId,
            Value::Boolean(_) => ElementType::Boolean,
            Value::DateTime(_) => ElementType::DateTime,
            Value::Null => ElementType::Null,
            Value::RegularExpression(_) => ElementType::RegularExpression,
            Value::DbPointer(_) => ElementType::DbPointer,
            Value::JavaScriptCode(_) => ElementType::JavaScriptCode,
            Value::Symbol(_) => ElementType::Symbol,
            Value::JavaScriptCodeWithScope(_) => ElementType::JavaScriptCodeWithScope,
            Value::Int32(_) => ElementType::Int32,
            Value::Timestamp(_) => ElementType::Timestamp,
            Value::Int64(_) => ElementType::Int64,
            Value::Decimal128(_) => ElementType::Decimal128,
            Value::MaxKey => ElementType::MaxKey,
            Value::MinKey => ElementType::MinKey,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_document_mut(&mut self) -> Option<&mut Document> {
        match self {
            Value::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_document(&self) -> bool {
        matches!(self, Value::Document(_))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Document(a), Value::Document(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Binary(a), Value::Binary(b)) => a == b,
            (Value::Undefined, Value::Undefined) => true,
            (Value::ObjectId(a), Value::ObjectId(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::RegularExpression(a), Value::RegularExpression(b)) => a == b,
            (Value::DbPointer(a), Value::DbPointer(b)) => a == b,
            (Value::JavaScriptCode(a), Value::JavaScriptCode(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::JavaScriptCodeWithScope(a), Value::JavaScriptCodeWithScope(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Decimal128(a), Value::Decimal128(b)) => a == b,
            (Value::MaxKey, Value::MaxKey) => true,
            (Value::MinKey, Value::MinKey) => true,
            _ => false,
        }
    }
}

// Bitwise double comparison keeps equality reflexive, NaN included.
impl Eq for Value {}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Document> for Value {
    fn from(v: Document) -> Self {
        Value::Document(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl From<ObjectId> for Value {
    fn from(v: ObjectId) -> Self {
        Value::ObjectId(v)
    }
}

impl From<Timestamp> for Value {
    fn from(v: Timestamp) -> Self {
        Value::Timestamp(v)
    }
}

impl From<Binary> for Value {
    fn from(v: Binary) -> Self {
        Value::Binary(v)
    }
}

impl From<Decimal128> for Value {
    fn from(v: Decimal128) -> Self {
        Value::Decimal128(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn integer_widths_are_distinct() {
        assert_ne!(Value::Int32(5), Value::Int64(5));
        assert_ne!(Value::Int64(5), Value::Double(5.0));
        assert_ne!(Value::Int32(5), Value::Double(5.0));
    }

    #[test]
    fn doubles_compare_by_bits() {
        assert_eq!(Value::Double(f64::NAN), Value::Double(f64::NAN));
        assert_ne!(Value::Double(0.0), Value::Double(-0.0));
    }

    #[test]
    fn documents_ignore_field_order() {
        let a = Value::Document(doc! { "x": 1, "y": 2 });
        let b = Value::Document(doc! { "y": 2, "x": 1 });
        assert_eq!(a, b);
    }

    #[test]
    fn arrays_are_positional() {
        let a = Value::from(vec![1, 2]);
        let b = Value::from(vec![2, 1]);
        assert_ne!(a, b);
    }

    #[test]
    fn null_and_undefined_differ() {
        assert_ne!(Value::Null, Value::Undefined);
    }

    #[test]
    fn regex_options_sorted() {
        let re = Regex::new("^a", "xmi");
        assert_eq!(re.options, "imx");
    }

    #[test]
    fn element_tags_roundtrip() {
        for tag in [0x01u8, 0x02, 0x03, 0x04, 0x10, 0x12, 0x13, 0x7f, 0xff] {
            let ty = ElementType::from_tag(tag).unwrap();
            assert_eq!(ty.tag(), tag);
        }
        assert!(ElementType::from_tag(0x20).is_none());
    }
}
