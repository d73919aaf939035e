//! serde adapter: any `Serialize` value into the document model.
//!
//! Integer widths are preserved where the data model allows it: 8-, 16- and
//! 32-bit signed plus 8- and 16-bit unsigned integers become `Int32`;
//! `i64`, `u32` and in-range `u64` become `Int64`. Byte buffers become
//! generic `Binary`. Maps serialized with an Extended JSON wrapper key
//! (`$oid`, `$numberLong`, ...) are decoded back into the typed value, so a
//! [`Value`] survives a trip through the adapter unchanged.

use bsondiff_types::extjson::{
    document_to_extended_json, from_extended_json, is_wrapper_keys, to_extended_json,
};
use bsondiff_types::{Binary, Document, ExtJsonMode, Value};
use serde::de::DeserializeOwned;
use serde::ser::{self, Serialize, Serializer as _};
use serde_json::{Map, Value as Json};

use crate::error::{EncodingError, EncodingResult, SerializationResult};

/// Serialize `value` into a [`Value`].
pub fn to_value<T: Serialize + ?Sized>(value: &T) -> EncodingResult<Value> {
    value.serialize(ValueSerializer)
}

/// Serialize `value` into a [`Document`]; the root must be map-like.
pub fn to_document<T: Serialize + ?Sized>(value: &T) -> EncodingResult<Document> {
    match to_value(value)? {
        Value::Document(doc) => Ok(doc),
        other => Err(EncodingError::NotADocument(other.element_type())),
    }
}

/// Deserialize a `T` from a document through its relaxed Extended JSON form.
pub fn from_document<T: DeserializeOwned>(doc: &Document) -> SerializationResult<T> {
    let json = Json::Object(document_to_extended_json(doc, ExtJsonMode::Relaxed));
    Ok(serde_json::from_value(json)?)
}

/// Turn a finished map into a document, or into the typed value it wraps.
fn finish_map(doc: Document) -> EncodingResult<Value> {
    if !is_wrapper_keys(doc.keys().map(String::as_str)) {
        return Ok(Value::Document(doc));
    }
    let json = Json::Object(wrapper_body(&doc));
    Ok(from_extended_json(&json)?)
}

// Wrapper payloads carry plain JSON numbers (`$timestamp.t`, `$minKey`),
// which the adapter has already widened into typed integers. Those go back
// out as plain numbers. `$scope` holds user data and stays canonical.
fn wrapper_body(doc: &Document) -> Map<String, Json> {
    doc.iter()
        .map(|(key, value)| {
            let json = if key == "$scope" {
                to_extended_json(value, ExtJsonMode::Canonical)
            } else {
                wrapper_json(value)
            };
            (key.clone(), json)
        })
        .collect()
}

fn wrapper_json(value: &Value) -> Json {
    match value {
        Value::Int32(i) => Json::from(*i),
        Value::Int64(i) => Json::from(*i),
        Value::Document(doc) => Json::Object(wrapper_body(doc)),
        other => to_extended_json(other, ExtJsonMode::Canonical),
    }
}

/// Serializer whose output is a [`Value`].
pub struct ValueSerializer;

impl ser::Serializer for ValueSerializer {
    type Ok = Value;
    type Error = EncodingError;

    type SerializeSeq = SeqSerializer;
    type SerializeTuple = SeqSerializer;
    type SerializeTupleStruct = SeqSerializer;
    type SerializeTupleVariant = VariantSerializer<SeqSerializer>;
    type SerializeMap = MapSerializer;
    type SerializeStruct = MapSerializer;
    type SerializeStructVariant = VariantSerializer<MapSerializer>;

    fn serialize_bool(self, v: bool) -> EncodingResult<Value> {
        Ok(Value::Boolean(v))
    }

    fn serialize_i8(self, v: i8) -> EncodingResult<Value> {
        Ok(Value::Int32(v.into()))
    }

    fn serialize_i16(self, v: i16) -> EncodingResult<Value> {
        Ok(Value::Int32(v.into()))
    }

    fn serialize_i32(self, v: i32) -> EncodingResult<Value> {
        Ok(Value::Int32(v))
    }

    fn serialize_i64(self, v: i64) -> EncodingResult<Value> {
        Ok(Value::Int64(v))
    }

    fn serialize_u8(self, v: u8) -> EncodingResult<Value> {
        Ok(Value::Int32(v.into()))
    }

    fn serialize_u16(self, v: u16) -> EncodingResult<Value> {
        Ok(Value::Int32(v.into()))
    }

    fn serialize_u32(self, v: u32) -> EncodingResult<Value> {
        Ok(Value::Int64(v.into()))
    }

    fn serialize_u64(self, v: u64) -> EncodingResult<Value> {
        i64::try_from(v)
            .map(Value::Int64)
            .map_err(|_| EncodingError::IntegerOutOfRange(v))
    }

    fn serialize_f32(self, v: f32) -> EncodingResult<Value> {
        Ok(Value::Double(v.into()))
    }

    fn serialize_f64(self, v: f64) -> EncodingResult<Value> {
        Ok(Value::Double(v))
    }

    fn serialize_char(self, v: char) -> EncodingResult<Value> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> EncodingResult<Value> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> EncodingResult<Value> {
        Ok(Value::Binary(Binary::generic(v)))
    }

    fn serialize_none(self) -> EncodingResult<Value> {
        Ok(Value::Null)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> EncodingResult<Value> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> EncodingResult<Value> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> EncodingResult<Value> {
        Ok(Value::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> EncodingResult<Value> {
        Ok(Value::String(variant.to_string()))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> EncodingResult<Value> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> EncodingResult<Value> {
        let mut doc = Document::with_capacity(1);
        doc.insert(variant, value.serialize(self)?);
        Ok(Value::Document(doc))
    }

    fn serialize_seq(self, len: Option<usize>) -> EncodingResult<SeqSerializer> {
        Ok(SeqSerializer {
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> EncodingResult<SeqSerializer> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> EncodingResult<SeqSerializer> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> EncodingResult<VariantSerializer<SeqSerializer>> {
        Ok(VariantSerializer {
            variant,
            inner: self.serialize_seq(Some(len))?,
        })
    }

    fn serialize_map(self, len: Option<usize>) -> EncodingResult<MapSerializer> {
        Ok(MapSerializer {
            doc: Document::with_capacity(len.unwrap_or(0)),
            pending_key: None,
        })
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> EncodingResult<MapSerializer> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> EncodingResult<VariantSerializer<MapSerializer>> {
        Ok(VariantSerializer {
            variant,
            inner: self.serialize_map(Some(len))?,
        })
    }
}

pub struct SeqSerializer {
    items: Vec<Value>,
}

impl ser::SerializeSeq for SeqSerializer {
    type Ok = Value;
    type Error = EncodingError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> EncodingResult<()> {
        self.items.push(value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> EncodingResult<Value> {
        Ok(Value::Array(self.items))
    }
}

impl ser::SerializeTuple for SeqSerializer {
    type Ok = Value;
    type Error = EncodingError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> EncodingResult<()> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> EncodingResult<Value> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleStruct for SeqSerializer {
    type Ok = Value;
    type Error = EncodingError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> EncodingResult<()> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> EncodingResult<Value> {
        ser::SerializeSeq::end(self)
    }
}

pub struct MapSerializer {
    doc: Document,
    pending_key: Option<String>,
}

impl ser::SerializeMap for MapSerializer {
    type Ok = Value;
    type Error = EncodingError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> EncodingResult<()> {
        match key.serialize(ValueSerializer)? {
            Value::String(s) => {
                self.pending_key = Some(s);
                Ok(())
            }
            other => Err(EncodingError::NonStringKey(other.element_type().name())),
        }
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> EncodingResult<()> {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| EncodingError::Custom("map value without a key".into()))?;
        self.doc.insert(key, value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> EncodingResult<Value> {
        finish_map(self.doc)
    }
}

impl ser::SerializeStruct for MapSerializer {
    type Ok = Value;
    type Error = EncodingError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> EncodingResult<()> {
        self.doc.insert(key, value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> EncodingResult<Value> {
        finish_map(self.doc)
    }
}

/// Externally tagged enum variant: `{ variant: inner }`.
pub struct VariantSerializer<S> {
    variant: &'static str,
    inner: S,
}

impl<S> VariantSerializer<S> {
    fn wrap(variant: &'static str, inner: Value) -> Value {
        let mut doc = Document::with_capacity(1);
        doc.insert(variant, inner);
        Value::Document(doc)
    }
}

impl ser::SerializeTupleVariant for VariantSerializer<SeqSerializer> {
    type Ok = Value;
    type Error = EncodingError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> EncodingResult<()> {
        ser::SerializeSeq::serialize_element(&mut self.inner, value)
    }

    fn end(self) -> EncodingResult<Value> {
        let inner = ser::SerializeSeq::end(self.inner)?;
        Ok(Self::wrap(self.variant, inner))
    }
}

impl ser::SerializeStructVariant for VariantSerializer<MapSerializer> {
    type Ok = Value;
    type Error = EncodingError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> EncodingResult<()> {
        ser::SerializeStruct::serialize_field(&mut self.inner, key, value)
    }

    fn end(self) -> EncodingResult<Value> {
        let inner = ser::SerializeStruct::end(self.inner)?;
        Ok(Self::wrap(self.variant, inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bsondiff_types::{doc, Decimal128, ObjectId, Timestamp};
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::collections::BTreeMap;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Account {
        name: String,
        age: u8,
        balance: i64,
        tags: Vec<String>,
        nickname: Option<String>,
    }

    #[test]
    fn struct_becomes_document() {
        let acct = Account {
            name: "ada".into(),
            age: 36,
            balance: -10,
            tags: vec!["x".into()],
            nickname: None,
        };
        let doc = to_document(&acct).unwrap();
        assert_eq!(
            doc,
            doc! {
                "name": "ada",
                "age": 36,
                "balance": -10i64,
                "tags": vec!["x"],
                "nickname": Value::Null,
            }
        );
        let back: Account = from_document(&doc).unwrap();
        assert_eq!(back, acct);
    }

    #[test]
    fn integer_widths() {
        assert_eq!(to_value(&7i16).unwrap(), Value::Int32(7));
        assert_eq!(to_value(&7u16).unwrap(), Value::Int32(7));
        assert_eq!(to_value(&7u32).unwrap(), Value::Int64(7));
        assert_eq!(to_value(&7u64).unwrap(), Value::Int64(7));
        assert!(matches!(
            to_value(&u64::MAX),
            Err(EncodingError::IntegerOutOfRange(u64::MAX))
        ));
    }

    #[test]
    fn scalar_root_rejected() {
        let err = to_document(&"just a string").unwrap_err();
        assert!(matches!(err, EncodingError::NotADocument(_)));
        let err = to_document(&json!([1, 2])).unwrap_err();
        assert!(matches!(err, EncodingError::NotADocument(_)));
    }

    #[test]
    fn non_string_keys_rejected() {
        let mut map = BTreeMap::new();
        map.insert(1, "one");
        let err = to_document(&map).unwrap_err();
        assert!(matches!(err, EncodingError::NonStringKey("int")));
    }

    #[test]
    fn typed_values_roundtrip() {
        let original = doc! {
            "id": ObjectId::from_bytes([3; 12]),
            "small": 1,
            "big": 1i64,
            "ratio": 1.0,
            "ts": Timestamp::new(7, 9),
            "when": Value::DateTime(-1),
            "price": "9.99".parse::<Decimal128>().unwrap(),
            "blob": Binary::new(0x80, vec![1, 2]),
            "low": Value::MinKey,
            "code": Value::JavaScriptCodeWithScope(bsondiff_types::CodeWithScope {
                code: "f()".into(),
                scope: doc! { "n": 2i64 },
            }),
        };
        assert_eq!(to_document(&original).unwrap(), original);
    }

    #[test]
    fn plain_json_maps_to_document() {
        let doc = to_document(&json!({ "a": { "b": "c" }, "n": -3, "f": 0.5 })).unwrap();
        assert_eq!(
            doc,
            doc! { "a": doc! { "b": "c" }, "n": -3i64, "f": 0.5 }
        );
    }

    #[test]
    fn enum_variants() {
        #[derive(Serialize)]
        enum Shape {
            Empty,
            Circle(f64),
            Rect { w: i32, h: i32 },
        }
        assert_eq!(to_value(&Shape::Empty).unwrap(), Value::String("Empty".into()));
        assert_eq!(
            to_value(&Shape::Circle(1.5)).unwrap(),
            Value::Document(doc! { "Circle": 1.5 })
        );
        assert_eq!(
            to_value(&Shape::Rect { w: 1, h: 2 }).unwrap(),
            Value::Document(doc! { "Rect": doc! { "w": 1, "h": 2 } })
        );
    }

    #[test]
    fn malformed_wrapper_is_an_error() {
        let err = to_document(&json!({ "x": { "$oid": "nothex" } })).unwrap_err();
        assert!(matches!(err, EncodingError::InvalidTypedValue(_)));
    }
}
