//! BSON binary codec.
//!
//! BSON is little-endian throughout. A document is
//! `[i32 total size][elements...][0x00]`, an element is
//! `[u8 type][cstring name][payload]`, and arrays are documents keyed
//! `"0"`, `"1"`, ... in order.

use bsondiff_types::{
    Binary, CodeWithScope, DbPointer, Decimal128, Document, ElementType, ObjectId, Regex,
    Timestamp, Value,
};
use tracing::trace;

use crate::error::{EncodingError, EncodingResult, SerializationError, SerializationResult};

/// Maximum nesting accepted by the decoder.
pub const MAX_NESTING_DEPTH: usize = 512;

const MIN_DOCUMENT_SIZE: usize = 5;

// ---------------------------------------------------------------------------
// Encoding

/// Encode a document to BSON bytes.
pub fn encode_document(doc: &Document) -> SerializationResult<Vec<u8>> {
    let mut buf = Vec::new();
    write_document(&mut buf, doc.iter())?;
    trace!(len = buf.len(), "encoded document");
    Ok(buf)
}

fn write_document<'a, K: AsRef<str>>(
    buf: &mut Vec<u8>,
    fields: impl Iterator<Item = (K, &'a Value)>,
) -> SerializationResult<()> {
    let start = buf.len();
    buf.extend_from_slice(&[0u8; 4]); // size placeholder
    for (key, value) in fields {
        buf.push(value.element_type().tag());
        write_cstring(buf, key.as_ref())?;
        write_payload(buf, value)?;
    }
    buf.push(0);
    patch_length(buf, start)
}

fn patch_length(buf: &mut [u8], start: usize) -> SerializationResult<()> {
    let len = buf.len() - start;
    let len32 = i32::try_from(len).map_err(|_| SerializationError::TooLarge(len))?;
    buf[start..start + 4].copy_from_slice(&len32.to_le_bytes());
    Ok(())
}

fn write_payload(buf: &mut Vec<u8>, value: &Value) -> SerializationResult<()> {
    match value {
        Value::Double(f) => buf.extend_from_slice(&f.to_le_bytes()),
        Value::String(s) | Value::JavaScriptCode(s) | Value::Symbol(s) => write_string(buf, s)?,
        Value::Document(doc) => write_document(buf, doc.iter())?,
        Value::Array(items) => {
            write_document(buf, items.iter().enumerate().map(|(i, v)| (i.to_string(), v)))?
        }
        Value::Binary(bin) => {
            let len = i32::try_from(bin.bytes.len())
                .map_err(|_| SerializationError::TooLarge(bin.bytes.len()))?;
            buf.extend_from_slice(&len.to_le_bytes());
            buf.push(bin.subtype);
            buf.extend_from_slice(&bin.bytes);
        }
        Value::Undefined | Value::Null | Value::MinKey | Value::MaxKey => {}
        Value::ObjectId(id) => buf.extend_from_slice(&id.bytes()),
        Value::Boolean(b) => buf.push(u8::from(*b)),
        Value::DateTime(ms) => buf.extend_from_slice(&ms.to_le_bytes()),
        Value::RegularExpression(re) => {
            write_cstring(buf, &re.pattern)?;
            write_cstring(buf, &re.options)?;
        }
        Value::DbPointer(ptr) => {
            write_string(buf, &ptr.namespace)?;
            buf.extend_from_slice(&ptr.id.bytes());
        }
        Value::JavaScriptCodeWithScope(cws) => {
            let start = buf.len();
            buf.extend_from_slice(&[0u8; 4]);
            write_string(buf, &cws.code)?;
            write_document(buf, cws.scope.iter())?;
            patch_length(buf, start)?;
        }
        Value::Int32(i) => buf.extend_from_slice(&i.to_le_bytes()),
        Value::Timestamp(ts) => buf.extend_from_slice(&ts.to_u64().to_le_bytes()),
        Value::Int64(i) => buf.extend_from_slice(&i.to_le_bytes()),
        Value::Decimal128(d) => buf.extend_from_slice(&d.bytes()),
    }
    Ok(())
}

fn write_cstring(buf: &mut Vec<u8>, s: &str) -> SerializationResult<()> {
    if s.as_bytes().contains(&0) {
        return Err(SerializationError::NulInCString(s.to_string()));
    }
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);
    Ok(())
}

fn write_string(buf: &mut Vec<u8>, s: &str) -> SerializationResult<()> {
    let len = i32::try_from(s.len() + 1).map_err(|_| SerializationError::TooLarge(s.len()))?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);
    Ok(())
}

// ---------------------------------------------------------------------------
// Decoding

/// Decode exactly one BSON document from `data`.
///
/// Duplicate field names keep the last value.
pub fn decode_document(data: &[u8]) -> EncodingResult<Document> {
    let mut reader = Reader { data, pos: 0 };
    let doc = reader.read_document(0)?;
    if reader.pos != data.len() {
        return Err(EncodingError::Malformed {
            offset: reader.pos,
            reason: format!("{} trailing bytes after document", data.len() - reader.pos),
        });
    }
    trace!(len = data.len(), fields = doc.len(), "decoded document");
    Ok(doc)
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> EncodingResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or(EncodingError::UnexpectedEof(self.pos))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> EncodingResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> EncodingResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn i32(&mut self) -> EncodingResult<i32> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    fn i64(&mut self) -> EncodingResult<i64> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    fn malformed(&self, offset: usize, reason: impl Into<String>) -> EncodingError {
        EncodingError::Malformed {
            offset,
            reason: reason.into(),
        }
    }

    fn length(&mut self, min: usize) -> EncodingResult<usize> {
        let offset = self.pos;
        let len = self.i32()?;
        usize::try_from(len)
            .ok()
            .filter(|l| *l >= min)
            .ok_or_else(|| self.malformed(offset, format!("invalid length {len}")))
    }

    fn utf8(&self, bytes: &'a [u8], offset: usize) -> EncodingResult<String> {
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| EncodingError::InvalidUtf8(offset))
    }

    fn cstring(&mut self) -> EncodingResult<String> {
        let start = self.pos;
        let nul = self.data[start..]
            .iter()
            .position(|b| *b == 0)
            .ok_or(EncodingError::UnexpectedEof(self.data.len()))?;
        let bytes = self.take(nul)?;
        self.pos += 1;
        self.utf8(bytes, start)
    }

    fn string(&mut self) -> EncodingResult<String> {
        let len = self.length(1)?;
        let start = self.pos;
        let bytes = self.take(len)?;
        if bytes[len - 1] != 0 {
            return Err(self.malformed(start + len - 1, "string is not NUL-terminated"));
        }
        self.utf8(&bytes[..len - 1], start)
    }

    fn read_document(&mut self, depth: usize) -> EncodingResult<Document> {
        let mut doc = Document::new();
        self.read_elements(depth, |key, value| {
            doc.insert(key, value);
        })?;
        Ok(doc)
    }

    fn read_array(&mut self, depth: usize) -> EncodingResult<Vec<Value>> {
        let mut items = Vec::new();
        self.read_elements(depth, |_, value| items.push(value))?;
        Ok(items)
    }

    fn read_elements(
        &mut self,
        depth: usize,
        mut sink: impl FnMut(String, Value),
    ) -> EncodingResult<()> {
        if depth > MAX_NESTING_DEPTH {
            return Err(EncodingError::TooDeep(MAX_NESTING_DEPTH));
        }
        let start = self.pos;
        let size = self.length(MIN_DOCUMENT_SIZE)?;
        let end = start
            .checked_add(size)
            .filter(|end| *end <= self.data.len())
            .ok_or(EncodingError::UnexpectedEof(start))?;
        if self.data[end - 1] != 0 {
            return Err(self.malformed(end - 1, "document is not NUL-terminated"));
        }

        while self.pos < end - 1 {
            let tag_offset = self.pos;
            let tag = self.u8()?;
            let ty = ElementType::from_tag(tag).ok_or(EncodingError::UnknownElementType {
                tag,
                offset: tag_offset,
            })?;
            let key = self.cstring()?;
            let value = self.read_value(ty, depth)?;
            if self.pos > end - 1 {
                return Err(self.malformed(tag_offset, "element overruns its document"));
            }
            sink(key, value);
        }
        self.pos = end;
        Ok(())
    }

    fn read_value(&mut self, ty: ElementType, depth: usize) -> EncodingResult<Value> {
        Ok(match ty {
            ElementType::Double => Value::Double(f64::from_le_bytes(self.array()?)),
            ElementType::String => Value::String(self.string()?),
            ElementType::Document => Value::Document(self.read_document(depth + 1)?),
            ElementType::Array => Value::Array(self.read_array(depth + 1)?),
            ElementType::Binary => {
                let len = self.length(0)?;
                let subtype = self.u8()?;
                Value::Binary(Binary::new(subtype, self.take(len)?))
            }
            ElementType::Undefined => Value::Undefined,
            ElementType::ObjectId => Value::ObjectId(ObjectId::from_bytes(self.array()?)),
            ElementType::Boolean => {
                let offset = self.pos;
                match self.u8()? {
                    0 => Value::Boolean(false),
                    1 => Value::Boolean(true),
                    other => return Err(self.malformed(offset, format!("invalid boolean {other}"))),
                }
            }
            ElementType::DateTime => Value::DateTime(self.i64()?),
            ElementType::Null => Value::Null,
            ElementType::RegularExpression => {
                let pattern = self.cstring()?;
                let options = self.cstring()?;
                Value::RegularExpression(Regex::new(pattern, options))
            }
            ElementType::DbPointer => {
                let namespace = self.string()?;
                let id = ObjectId::from_bytes(self.array()?);
                Value::DbPointer(DbPointer { namespace, id })
            }
            ElementType::JavaScriptCode => Value::JavaScriptCode(self.string()?),
            ElementType::Symbol => Value::Symbol(self.string()?),
            ElementType::JavaScriptCodeWithScope => {
                let start = self.pos;
                let total = self.length(14)?;
                let code = self.string()?;
                let scope = self.read_document(depth + 1)?;
                if self.pos - start != total {
                    return Err(self.malformed(start, "code-with-scope length mismatch"));
                }
                Value::JavaScriptCodeWithScope(CodeWithScope { code, scope })
            }
            ElementType::Int32 => Value::Int32(self.i32()?),
            ElementType::Timestamp => {
                Value::Timestamp(Timestamp::from_u64(u64::from_le_bytes(self.array()?)))
            }
            ElementType::Int64 => Value::Int64(self.i64()?),
            ElementType::Decimal128 => Value::Decimal128(Decimal128::from_bytes(self.array()?)),
            ElementType::MaxKey => Value::MaxKey,
            ElementType::MinKey => Value::MinKey,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bsondiff_types::doc;

    #[test]
    fn hello_world_bytes() {
        // The canonical example from the BSON specification.
        let bytes = encode_document(&doc! { "hello": "world" }).unwrap();
        assert_eq!(
            bytes,
            b"\x16\x00\x00\x00\x02hello\x00\x06\x00\x00\x00world\x00\x00".to_vec()
        );
    }

    #[test]
    fn empty_document_is_five_bytes() {
        let bytes = encode_document(&Document::new()).unwrap();
        assert_eq!(bytes, vec![5, 0, 0, 0, 0]);
        assert_eq!(decode_document(&bytes).unwrap(), Document::new());
    }

    #[test]
    fn every_type_survives() {
        let d = doc! {
            "double": 1.5,
            "string": "s",
            "doc": doc! { "x": 1 },
            "array": vec![Value::Int32(1), Value::String("two".into())],
            "binary": Binary::new(0x80, vec![9, 8, 7]),
            "undefined": Value::Undefined,
            "oid": ObjectId::from_bytes([7; 12]),
            "bool": true,
            "date": Value::DateTime(-5),
            "null": Value::Null,
            "regex": Value::RegularExpression(Regex::new("^a", "i")),
            "dbptr": Value::DbPointer(DbPointer { namespace: "db.c".into(), id: ObjectId::from_bytes([1; 12]) }),
            "code": Value::JavaScriptCode("f()".into()),
            "symbol": Value::Symbol("sym".into()),
            "cws": Value::JavaScriptCodeWithScope(CodeWithScope { code: "g()".into(), scope: doc! { "v": 1 } }),
            "int32": 32,
            "ts": Timestamp::new(100, 1),
            "int64": 64i64,
            "dec": "3.14".parse::<Decimal128>().unwrap(),
            "max": Value::MaxKey,
            "min": Value::MinKey,
        };
        let bytes = encode_document(&d).unwrap();
        assert_eq!(decode_document(&bytes).unwrap(), d);
    }

    #[test]
    fn nul_in_key_rejected() {
        let err = encode_document(&doc! { "a\0b": 1 }).unwrap_err();
        assert!(matches!(err, SerializationError::NulInCString(_)));
    }

    #[test]
    fn truncated_input_rejected() {
        let bytes = encode_document(&doc! { "hello": "world" }).unwrap();
        let err = decode_document(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(matches!(err, EncodingError::UnexpectedEof(_)));
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut bytes = encode_document(&doc! { "a": 1 }).unwrap();
        bytes.push(0);
        assert!(matches!(
            decode_document(&bytes),
            Err(EncodingError::Malformed { .. })
        ));
    }

    #[test]
    fn unknown_type_rejected() {
        let bytes = b"\x0c\x00\x00\x00\x20a\x00\x00\x00\x00\x00\x00".to_vec();
        let err = decode_document(&bytes).unwrap_err();
        assert!(matches!(err, EncodingError::UnknownElementType { tag: 0x20, offset: 4 }));
    }

    #[test]
    fn invalid_boolean_rejected() {
        let bytes = b"\x09\x00\x00\x00\x08a\x00\x02\x00".to_vec();
        assert!(matches!(
            decode_document(&bytes),
            Err(EncodingError::Malformed { .. })
        ));
    }

    #[test]
    fn duplicate_keys_keep_last() {
        // {"a": 1, "a": 2} written by hand.
        let bytes = b"\x13\x00\x00\x00\x10a\x00\x01\x00\x00\x00\x10a\x00\x02\x00\x00\x00\x00".to_vec();
        let doc = decode_document(&bytes).unwrap();
        assert_eq!(doc, doc! { "a": 2 });
    }

    #[test]
    fn nesting_limit_enforced() {
        let mut doc = Document::new();
        for _ in 0..(MAX_NESTING_DEPTH + 2) {
            doc = doc! { "n": doc };
        }
        let bytes = encode_document(&doc).unwrap();
        assert!(matches!(
            decode_document(&bytes),
            Err(EncodingError::TooDeep(_))
        ));
    }
}
