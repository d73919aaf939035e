//! MongoDB Extended JSON v2.
//!
//! Converts between [`Value`] and `serde_json::Value`. Both canonical and
//! relaxed forms are accepted on input; output mode is chosen by the caller.
//! The legacy v1 `$binary`/`$type` and `$regex`/`$options` shapes are also
//! accepted on input.
//!
//! `Value` and `Document` implement `Serialize` (canonical form),
//! `Deserialize` (either form) and `Display` (relaxed form) through this
//! module.

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, SecondsFormat};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Number, Value as Json};

use crate::decimal128::Decimal128;
use crate::document::Document;
use crate::error::TypeError;
use crate::object_id::ObjectId;
use crate::timestamp::Timestamp;
use crate::value::{Binary, CodeWithScope, DbPointer, Regex, Value};

/// Largest date (9999-12-31T23:59:59.999Z) printed as an ISO string in
/// relaxed mode.
const MAX_ISO_DATE_MS: i64 = 253_402_300_799_999;

/// Keys that mark an object as a typed-value wrapper rather than a document.
const WRAPPER_KEYS: &[&str] = &[
    "$oid",
    "$numberInt",
    "$numberLong",
    "$numberDouble",
    "$numberDecimal",
    "$binary",
    "$uuid",
    "$date",
    "$timestamp",
    "$regularExpression",
    "$regex",
    "$dbPointer",
    "$code",
    "$symbol",
    "$minKey",
    "$maxKey",
    "$undefined",
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExtJsonMode {
    /// Lossless: every non-JSON-native type, numbers included, is wrapped.
    #[default]
    Canonical,
    /// Human-oriented: numbers and in-range dates use native JSON forms.
    Relaxed,
}

/// Returns `true` when the object keys denote a typed-value wrapper.
pub fn is_wrapper_keys<'a>(mut keys: impl Iterator<Item = &'a str>) -> bool {
    keys.next().is_some_and(|k| WRAPPER_KEYS.contains(&k))
}

// ---------------------------------------------------------------------------
// Encoding

pub fn to_extended_json(value: &Value, mode: ExtJsonMode) -> Json {
    let relaxed = mode == ExtJsonMode::Relaxed;
    match value {
        Value::Double(f) => {
            if relaxed && f.is_finite() {
                if let Some(n) = Number::from_f64(*f) {
                    return Json::Number(n);
                }
            }
            json!({ "$numberDouble": format_double(*f) })
        }
        Value::String(s) => Json::String(s.clone()),
        Value::Document(doc) => Json::Object(document_to_extended_json(doc, mode)),
        Value::Array(items) => {
            Json::Array(items.iter().map(|v| to_extended_json(v, mode)).collect())
        }
        Value::Binary(bin) => json!({
            "$binary": {
                "base64": BASE64.encode(&bin.bytes),
                "subType": format!("{:02x}", bin.subtype),
            }
        }),
        Value::Undefined => json!({ "$undefined": true }),
        Value::ObjectId(id) => json!({ "$oid": id.to_hex() }),
        Value::Boolean(b) => Json::Bool(*b),
        Value::DateTime(ms) => {
            if relaxed && (0..=MAX_ISO_DATE_MS).contains(ms) {
                if let Some(dt) = DateTime::from_timestamp_millis(*ms) {
                    return json!({ "$date": dt.to_rfc3339_opts(SecondsFormat::Millis, true) });
                }
            }
            json!({ "$date": { "$numberLong": ms.to_string() } })
        }
        Value::Null => Json::Null,
        Value::RegularExpression(re) => json!({
            "$regularExpression": { "pattern": re.pattern, "options": re.options }
        }),
        Value::DbPointer(ptr) => json!({
            "$dbPointer": { "$ref": ptr.namespace, "$id": { "$oid": ptr.id.to_hex() } }
        }),
        Value::JavaScriptCode(code) => json!({ "$code": code }),
        Value::Symbol(sym) => json!({ "$symbol": sym }),
        Value::JavaScriptCodeWithScope(cws) => json!({
            "$code": cws.code,
            "$scope": Json::Object(document_to_extended_json(&cws.scope, mode)),
        }),
        Value::Int32(i) => {
            if relaxed {
                Json::from(*i)
            } else {
                json!({ "$numberInt": i.to_string() })
            }
        }
        Value::Timestamp(ts) => json!({ "$timestamp": { "t": ts.time, "i": ts.increment } }),
        Value::Int64(i) => {
            if relaxed {
                Json::from(*i)
            } else {
                json!({ "$numberLong": i.to_string() })
            }
        }
        Value::Decimal128(d) => json!({ "$numberDecimal": d.to_string() }),
        Value::MaxKey => json!({ "$maxKey": 1 }),
        Value::MinKey => json!({ "$minKey": 1 }),
    }
}

pub fn document_to_extended_json(doc: &Document, mode: ExtJsonMode) -> Map<String, Json> {
    doc.iter()
        .map(|(k, v)| (k.clone(), to_extended_json(v, mode)))
        .collect()
}

fn format_double(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        format!("{f:?}")
    }
}

// ---------------------------------------------------------------------------
// Decoding

pub fn from_extended_json(json: &Json) -> Result<Value, TypeError> {
    Ok(match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Boolean(*b),
        Json::Number(n) => number_value(n),
        Json::String(s) => Value::String(s.clone()),
        Json::Array(items) => Value::Array(
            items
                .iter()
                .map(from_extended_json)
                .collect::<Result<_, _>>()?,
        ),
        Json::Object(map) => {
            if is_wrapper_keys(map.keys().map(String::as_str)) {
                parse_wrapper(map)?
            } else {
                Value::Document(document_from_map(map)?)
            }
        }
    })
}

/// Decode a JSON object into a document; any other JSON kind is an error.
pub fn document_from_extended_json(json: &Json) -> Result<Document, TypeError> {
    match json {
        Json::Object(map) if !is_wrapper_keys(map.keys().map(String::as_str)) => {
            document_from_map(map)
        }
        other => Err(TypeError::ext(
            "document",
            format!("expected a JSON object, got {}", json_kind(other)),
        )),
    }
}

fn document_from_map(map: &Map<String, Json>) -> Result<Document, TypeError> {
    let mut doc = Document::with_capacity(map.len());
    for (k, v) in map {
        doc.insert(k.clone(), from_extended_json(v)?);
    }
    Ok(doc)
}

fn number_value(n: &Number) -> Value {
    if let Some(i) = n.as_i64() {
        match i32::try_from(i) {
            Ok(small) => Value::Int32(small),
            Err(_) => Value::Int64(i),
        }
    } else {
        // u64 beyond i64::MAX or a float.
        Value::Double(n.as_f64().unwrap_or(f64::NAN))
    }
}

fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

fn exact_keys(map: &Map<String, Json>, kind: &'static str, keys: &[&str]) -> Result<(), TypeError> {
    if map.len() == keys.len() && keys.iter().all(|k| map.contains_key(*k)) {
        Ok(())
    } else {
        Err(TypeError::ext(kind, format!("expected exactly the keys {keys:?}")))
    }
}

fn str_field<'a>(map: &'a Map<String, Json>, key: &str, kind: &'static str) -> Result<&'a str, TypeError> {
    map.get(key)
        .and_then(Json::as_str)
        .ok_or_else(|| TypeError::ext(kind, format!("`{key}` must be a string")))
}

fn object_field<'a>(
    map: &'a Map<String, Json>,
    key: &str,
    kind: &'static str,
) -> Result<&'a Map<String, Json>, TypeError> {
    map.get(key)
        .and_then(Json::as_object)
        .ok_or_else(|| TypeError::ext(kind, format!("`{key}` must be an object")))
}

fn parse_wrapper(map: &Map<String, Json>) -> Result<Value, TypeError> {
    let Some(first) = map.keys().next() else {
        return Err(TypeError::ext("wrapper", "empty object"));
    };
    match first.as_str() {
        "$oid" => {
            exact_keys(map, "ObjectId", &["$oid"])?;
            Ok(Value::ObjectId(parse_oid(map)?))
        }
        "$numberInt" => {
            exact_keys(map, "Int32", &["$numberInt"])?;
            let s = str_field(map, "$numberInt", "Int32")?;
            s.parse::<i32>()
                .map(Value::Int32)
                .map_err(|e| TypeError::ext("Int32", e.to_string()))
        }
        "$numberLong" => {
            exact_keys(map, "Int64", &["$numberLong"])?;
            let s = str_field(map, "$numberLong", "Int64")?;
            s.parse::<i64>()
                .map(Value::Int64)
                .map_err(|e| TypeError::ext("Int64", e.to_string()))
        }
        "$numberDouble" => {
            exact_keys(map, "Double", &["$numberDouble"])?;
            let f = match str_field(map, "$numberDouble", "Double")? {
                "Infinity" => f64::INFINITY,
                "-Infinity" => f64::NEG_INFINITY,
                "NaN" => f64::NAN,
                other => other
                    .parse::<f64>()
                    .map_err(|e| TypeError::ext("Double", e.to_string()))?,
            };
            Ok(Value::Double(f))
        }
        "$numberDecimal" => {
            exact_keys(map, "Decimal128", &["$numberDecimal"])?;
            let s = str_field(map, "$numberDecimal", "Decimal128")?;
            Ok(Value::Decimal128(s.parse::<Decimal128>()?))
        }
        "$binary" => parse_binary(map),
        "$uuid" => {
            exact_keys(map, "UUID", &["$uuid"])?;
            let s = str_field(map, "$uuid", "UUID")?;
            let hex_digits: String = s.chars().filter(|c| *c != '-').collect();
            if hex_digits.len() != 32 || s.len() != 36 {
                return Err(TypeError::ext("UUID", format!("malformed uuid {s:?}")));
            }
            let bytes = hex::decode(&hex_digits).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
            Ok(Value::Binary(Binary::new(Binary::UUID, bytes)))
        }
        "$date" => {
            exact_keys(map, "Date", &["$date"])?;
            parse_date(&map["$date"]).map(Value::DateTime)
        }
        "$timestamp" => {
            exact_keys(map, "Timestamp", &["$timestamp"])?;
            let inner = object_field(map, "$timestamp", "Timestamp")?;
            exact_keys(inner, "Timestamp", &["t", "i"])?;
            let part = |key: &str| {
                inner[key]
                    .as_u64()
                    .and_then(|v| u32::try_from(v).ok())
                    .ok_or_else(|| TypeError::ext("Timestamp", format!("`{key}` must be a u32")))
            };
            Ok(Value::Timestamp(Timestamp::new(part("t")?, part("i")?)))
        }
        "$regularExpression" => {
            exact_keys(map, "RegularExpression", &["$regularExpression"])?;
            let inner = object_field(map, "$regularExpression", "RegularExpression")?;
            exact_keys(inner, "RegularExpression", &["pattern", "options"])?;
            Ok(Value::RegularExpression(Regex::new(
                str_field(inner, "pattern", "RegularExpression")?,
                str_field(inner, "options", "RegularExpression")?,
            )))
        }
        "$regex" => {
            exact_keys(map, "RegularExpression", &["$regex", "$options"])?;
            Ok(Value::RegularExpression(Regex::new(
                str_field(map, "$regex", "RegularExpression")?,
                str_field(map, "$options", "RegularExpression")?,
            )))
        }
        "$dbPointer" => {
            exact_keys(map, "DBPointer", &["$dbPointer"])?;
            let inner = object_field(map, "$dbPointer", "DBPointer")?;
            exact_keys(inner, "DBPointer", &["$ref", "$id"])?;
            let namespace = str_field(inner, "$ref", "DBPointer")?.to_string();
            let id = match from_extended_json(&inner["$id"])? {
                Value::ObjectId(id) => id,
                _ => return Err(TypeError::ext("DBPointer", "`$id` must be an ObjectId")),
            };
            Ok(Value::DbPointer(DbPointer { namespace, id }))
        }
        "$code" => {
            let code = str_field(map, "$code", "Code")?.to_string();
            if map.contains_key("$scope") {
                exact_keys(map, "CodeWithScope", &["$code", "$scope"])?;
                let scope = document_from_map(object_field(map, "$scope", "CodeWithScope")?)?;
                Ok(Value::JavaScriptCodeWithScope(CodeWithScope { code, scope }))
            } else {
                exact_keys(map, "Code", &["$code"])?;
                Ok(Value::JavaScriptCode(code))
            }
        }
        "$symbol" => {
            exact_keys(map, "Symbol", &["$symbol"])?;
            Ok(Value::Symbol(str_field(map, "$symbol", "Symbol")?.to_string()))
        }
        "$minKey" => {
            exact_keys(map, "MinKey", &["$minKey"])?;
            expect_one(&map["$minKey"], "MinKey")?;
            Ok(Value::MinKey)
        }
        "$maxKey" => {
            exact_keys(map, "MaxKey", &["$maxKey"])?;
            expect_one(&map["$maxKey"], "MaxKey")?;
            Ok(Value::MaxKey)
        }
        "$undefined" => {
            exact_keys(map, "Undefined", &["$undefined"])?;
            if map["$undefined"] != Json::Bool(true) {
                return Err(TypeError::ext("Undefined", "`$undefined` must be true"));
            }
            Ok(Value::Undefined)
        }
        other => Err(TypeError::ext("wrapper", format!("unknown wrapper key {other}"))),
    }
}

fn expect_one(json: &Json, kind: &'static str) -> Result<(), TypeError> {
    if json.as_i64() == Some(1) {
        Ok(())
    } else {
        Err(TypeError::ext(kind, "value must be 1"))
    }
}

fn parse_oid(map: &Map<String, Json>) -> Result<ObjectId, TypeError> {
    ObjectId::from_hex(str_field(map, "$oid", "ObjectId")?)
}

fn parse_binary(map: &Map<String, Json>) -> Result<Value, TypeError> {
    let (b64, subtype) = match map.get("$binary") {
        Some(Json::Object(inner)) => {
            exact_keys(map, "Binary", &["$binary"])?;
            exact_keys(inner, "Binary", &["base64", "subType"])?;
            (
                str_field(inner, "base64", "Binary")?,
                str_field(inner, "subType", "Binary")?,
            )
        }
        Some(Json::String(b64)) => {
            exact_keys(map, "Binary", &["$binary", "$type"])?;
            (b64.as_str(), str_field(map, "$type", "Binary")?)
        }
        _ => return Err(TypeError::ext("Binary", "`$binary` must be an object or string")),
    };
    let bytes = BASE64
        .decode(b64)
        .map_err(|e| TypeError::ext("Binary", e.to_string()))?;
    if subtype.is_empty() || subtype.len() > 2 {
        return Err(TypeError::ext("Binary", format!("bad subtype {subtype:?}")));
    }
    let subtype =
        u8::from_str_radix(subtype, 16).map_err(|e| TypeError::ext("Binary", e.to_string()))?;
    Ok(Value::Binary(Binary::new(subtype, bytes)))
}

fn parse_date(json: &Json) -> Result<i64, TypeError> {
    match json {
        Json::String(iso) => DateTime::parse_from_rfc3339(iso)
            .map(|dt| dt.timestamp_millis())
            .map_err(|e| TypeError::ext("Date", e.to_string())),
        Json::Number(n) => n
            .as_i64()
            .ok_or_else(|| TypeError::ext("Date", "milliseconds must be an integer")),
        Json::Object(inner) => match from_extended_json(json)? {
            Value::Int64(ms) => Ok(ms),
            Value::Int32(ms) => Ok(i64::from(ms)),
            _ => Err(TypeError::ext(
                "Date",
                format!("unexpected inner object with keys {:?}", inner.keys().collect::<Vec<_>>()),
            )),
        },
        other => Err(TypeError::ext(
            "Date",
            format!("unexpected {}", json_kind(other)),
        )),
    }
}

// ---------------------------------------------------------------------------
// serde and Display

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        to_extended_json(self, ExtJsonMode::Canonical).serialize(serializer)
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        document_to_extended_json(self, ExtJsonMode::Canonical).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = Json::deserialize(deserializer)?;
        from_extended_json(&json).map_err(serde::de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = Json::deserialize(deserializer)?;
        document_from_extended_json(&json).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", to_extended_json(self, ExtJsonMode::Relaxed))
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Json::Object(document_to_extended_json(self, ExtJsonMode::Relaxed)))
    }
}
