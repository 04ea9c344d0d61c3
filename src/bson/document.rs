use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Write;

use super::value::{tag, Value};
use crate::error::{MdbError, MdbResult};

/// An ordered BSON document.
///
/// Backed by a `Vec` of pairs rather than a map: the wire encoding of
/// a command document requires the command's own key to be written
/// first, so key order is a property callers must be able to see and
/// control, not an implementation detail a hash map would hide.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Document {
    fields: Vec<(String, Value)>,
}

impl Document {
    #[must_use]
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    #[must_use]
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.get_f64("ok").map(|v| v != 0.0).unwrap_or(false)
    }

    #[must_use]
    pub fn errmsg(&self) -> Option<&str> {
        self.get_str("errmsg")
    }

    #[must_use]
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Encodes this document, writing `first_key`'s pair ahead of the
    /// rest if it is present. Commands rely on this to place the
    /// command name first on the wire.
    pub(crate) fn encode_with_first_key(&self, first_key: Option<&str>) -> MdbResult<Vec<u8>> {
        let mut buf = Vec::new();
        buf.write_i32::<LittleEndian>(0)?; // length placeholder

        if let Some(fk) = first_key {
            if let Some(v) = self.get(fk) {
                encode_element(&mut buf, fk, v)?;
            }
        }
        for (k, v) in &self.fields {
            if Some(k.as_str()) == first_key {
                continue;
            }
            encode_element(&mut buf, k, v)?;
        }
        buf.write_u8(0x00)?;

        let len = i32::try_from(buf.len())
            .map_err(|_| MdbError::encode("document too large to encode"))?;
        buf[0..4].copy_from_slice(&len.to_le_bytes());
        Ok(buf)
    }

    pub fn encode(&self) -> MdbResult<Vec<u8>> {
        self.encode_with_first_key(None)
    }

    /// Decodes one document starting at `bytes[0]`. Returns the
    /// document and the unconsumed remainder of `bytes`.
    pub(crate) fn decode(bytes: &[u8]) -> MdbResult<(Self, &[u8])> {
        if bytes.len() < 5 {
            return Err(MdbError::decode("truncated document: fewer than 5 bytes"));
        }
        let total_len = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let total_len = usize::try_from(total_len)
            .map_err(|_| MdbError::decode("negative document length"))?;
        if total_len < 5 || total_len > bytes.len() {
            return Err(MdbError::decode("document length out of range"));
        }
        if bytes[total_len - 1] != 0x00 {
            return Err(MdbError::decode("document is missing its terminating 0x00"));
        }

        let mut cursor = &bytes[4..total_len - 1];
        let mut doc = Self::new();
        while !cursor.is_empty() {
            let type_tag = cursor[0];
            cursor = &cursor[1..];
            let name = read_cstring(&mut cursor)?;
            let value = decode_value(type_tag, &mut cursor)?;
            doc.fields.push((name, value));
        }

        Ok((doc, &bytes[total_len..]))
    }

    /// Builds an array-shaped document from an ordered sequence of
    /// values, using "0", "1", … as keys.
    pub(crate) fn from_array(values: &[Value]) -> Self {
        let mut doc = Self::new();
        for (i, v) in values.iter().enumerate() {
            doc.insert(i.to_string(), v.clone());
        }
        doc
    }

    fn into_array(self) -> Vec<Value> {
        let mut indexed: Vec<(usize, Value)> = self
            .fields
            .into_iter()
            .map(|(k, v)| (k.parse::<usize>().unwrap_or(usize::MAX), v))
            .collect();
        indexed.sort_by_key(|(i, _)| *i);
        indexed.into_iter().map(|(_, v)| v).collect()
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;
    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Builds a [`Document`] from `key => value` pairs, mirroring the
/// ergonomics of the wider BSON ecosystem's own `doc!` macro.
#[macro_export]
macro_rules! doc {
    () => {
        $crate::bson::Document::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut doc = $crate::bson::Document::new();
        $(doc.insert($key, $value);)+
        doc
    }};
}

fn encode_element(buf: &mut Vec<u8>, name: &str, value: &Value) -> MdbResult<()> {
    if name.contains('\0') {
        return Err(MdbError::encode("field name must not contain NUL"));
    }
    buf.write_u8(value.type_tag())?;
    write_cstring(buf, name)?;
    encode_value_body(buf, value)?;
    Ok(())
}

fn write_cstring(buf: &mut Vec<u8>, s: &str) -> MdbResult<()> {
    buf.write_all(s.as_bytes())?;
    buf.write_u8(0x00)?;
    Ok(())
}

fn write_bson_string(buf: &mut Vec<u8>, s: &str) -> MdbResult<()> {
    let len = i32::try_from(s.len() + 1).map_err(|_| MdbError::encode("string too long"))?;
    buf.write_i32::<LittleEndian>(len)?;
    buf.write_all(s.as_bytes())?;
    buf.write_u8(0x00)?;
    Ok(())
}

fn encode_value_body(buf: &mut Vec<u8>, value: &Value) -> MdbResult<()> {
    match value {
        Value::Double(d) => buf.write_f64::<LittleEndian>(*d)?,
        Value::String(s) | Value::JavaScriptCode(s) => write_bson_string(buf, s)?,
        Value::Document(d) => buf.extend_from_slice(&d.encode()?),
        Value::Array(items) => buf.extend_from_slice(&Document::from_array(items).encode()?),
        Value::Binary(subtype, bytes) => {
            let len =
                i32::try_from(bytes.len()).map_err(|_| MdbError::encode("binary too long"))?;
            buf.write_i32::<LittleEndian>(len)?;
            buf.write_u8(*subtype)?;
            buf.write_all(bytes)?;
        }
        Value::ObjectId(id) => buf.extend_from_slice(id.bytes()),
        Value::Bool(b) => buf.write_u8(u8::from(*b))?,
        Value::DateTime(ms) => buf.write_i64::<LittleEndian>(*ms)?,
        Value::Null => {}
        Value::Int32(n) => buf.write_i32::<LittleEndian>(*n)?,
        Value::Timestamp(bytes) => buf.extend_from_slice(bytes),
        Value::Int64(n) => buf.write_i64::<LittleEndian>(*n)?,
        Value::Decimal128(d) => buf.extend_from_slice(&d.to_bytes()),
    }
    Ok(())
}

fn read_cstring(cursor: &mut &[u8]) -> MdbResult<String> {
    let nul = cursor
        .iter()
        .position(|&b| b == 0x00)
        .ok_or_else(|| MdbError::decode("unterminated cstring"))?;
    let s = std::str::from_utf8(&cursor[..nul])
        .map_err(|_| MdbError::decode("cstring is not valid UTF-8"))?
        .to_owned();
    *cursor = &cursor[nul + 1..];
    Ok(s)
}

fn read_bson_string(cursor: &mut &[u8]) -> MdbResult<String> {
    let len = cursor
        .read_i32::<LittleEndian>()
        .map_err(|_| MdbError::decode("truncated string length"))?;
    let len = usize::try_from(len).map_err(|_| MdbError::decode("negative string length"))?;
    if len == 0 || len > cursor.len() {
        return Err(MdbError::decode("string length out of range"));
    }
    let (body, rest) = cursor.split_at(len);
    *cursor = rest;
    if body[len - 1] != 0x00 {
        return Err(MdbError::decode("string is missing its terminating 0x00"));
    }
    std::str::from_utf8(&body[..len - 1])
        .map(ToOwned::to_owned)
        .map_err(|_| MdbError::decode("string is not valid UTF-8"))
}

fn decode_value(type_tag: u8, cursor: &mut &[u8]) -> MdbResult<Value> {
    Ok(match type_tag {
        tag::DOUBLE => Value::Double(
            cursor
                .read_f64::<LittleEndian>()
                .map_err(|_| MdbError::decode("truncated double"))?,
        ),
        tag::STRING => Value::String(read_bson_string(cursor)?),
        tag::DOCUMENT => {
            let (doc, rest) = Document::decode(cursor)?;
            *cursor = rest;
            Value::Document(doc)
        }
        tag::ARRAY => {
            let (doc, rest) = Document::decode(cursor)?;
            *cursor = rest;
            Value::Array(doc.into_array())
        }
        tag::BINARY => {
            let len = cursor
                .read_i32::<LittleEndian>()
                .map_err(|_| MdbError::decode("truncated binary length"))?;
            let len = usize::try_from(len).map_err(|_| MdbError::decode("negative binary length"))?;
            let subtype = cursor
                .read_u8()
                .map_err(|_| MdbError::decode("truncated binary subtype"))?;
            if len > cursor.len() {
                return Err(MdbError::decode("binary length out of range"));
            }
            let (body, rest) = cursor.split_at(len);
            *cursor = rest;
            Value::Binary(subtype, body.to_vec())
        }
        tag::UNDEFINED => Value::Null,
        tag::OBJECT_ID => {
            if cursor.len() < 12 {
                return Err(MdbError::decode("truncated ObjectId"));
            }
            let (body, rest) = cursor.split_at(12);
            *cursor = rest;
            let mut raw = [0_u8; 12];
            raw.copy_from_slice(body);
            Value::ObjectId(super::object_id::ObjectId::from_bytes(raw))
        }
        tag::BOOL => Value::Bool(
            cursor
                .read_u8()
                .map_err(|_| MdbError::decode("truncated bool"))?
                != 0,
        ),
        tag::DATETIME => Value::DateTime(
            cursor
                .read_i64::<LittleEndian>()
                .map_err(|_| MdbError::decode("truncated datetime"))?,
        ),
        tag::NULL => Value::Null,
        tag::JAVASCRIPT => Value::JavaScriptCode(read_bson_string(cursor)?),
        tag::INT32 => Value::Int32(
            cursor
                .read_i32::<LittleEndian>()
                .map_err(|_| MdbError::decode("truncated int32"))?,
        ),
        tag::TIMESTAMP => {
            if cursor.len() < 8 {
                return Err(MdbError::decode("truncated timestamp"));
            }
            let (body, rest) = cursor.split_at(8);
            *cursor = rest;
            let mut raw = [0_u8; 8];
            raw.copy_from_slice(body);
            Value::Timestamp(raw)
        }
        tag::INT64 => Value::Int64(
            cursor
                .read_i64::<LittleEndian>()
                .map_err(|_| MdbError::decode("truncated int64"))?,
        ),
        tag::DECIMAL128 => {
            if cursor.len() < 16 {
                return Err(MdbError::decode("truncated decimal128"));
            }
            let (body, rest) = cursor.split_at(16);
            *cursor = rest;
            let mut raw = [0_u8; 16];
            raw.copy_from_slice(body);
            Value::Decimal128(super::decimal128::Decimal128::from_bytes(raw)?)
        }
        other => return Err(MdbError::decode(format!("unsupported BSON type tag 0x{other:02x}"))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_five_bytes() {
        let doc = Document::new();
        assert_eq!(doc.encode().unwrap(), vec![0x05, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn round_trips_scalar_fields() {
        let mut doc = Document::new();
        doc.insert("name", "Kitty")
            .insert("age", 0_i32)
            .insert("weight", 4.2_f64)
            .insert("active", true)
            .insert("nickname", Value::Null);

        let encoded = doc.encode().unwrap();
        let (decoded, rest) = Document::decode(&encoded).unwrap();
        assert!(rest.is_empty());
        assert_eq!(decoded, doc);
    }

    #[test]
    fn round_trips_nested_document_and_array() {
        let mut inner = Document::new();
        inner.insert("x", 1_i64 << 40);
        let mut doc = Document::new();
        doc.insert("nested", inner);
        doc.insert("list", vec![Value::Int32(1), Value::Int32(2), Value::Int32(3)]);

        let encoded = doc.encode().unwrap();
        let (decoded, rest) = Document::decode(&encoded).unwrap();
        assert!(rest.is_empty());
        assert_eq!(decoded, doc);
    }

    #[test]
    fn first_key_is_hoisted() {
        let mut doc = Document::new();
        doc.insert("b", 1_i32).insert("a", 2_i32);
        let encoded = doc.encode_with_first_key(Some("a")).unwrap();
        // skip length prefix, first field's type tag is at index 4, name starts at 5
        assert_eq!(&encoded[5..6], b"a");
    }

    #[test]
    fn rejects_embedded_nul_in_key() {
        let mut doc = Document::new();
        doc.insert("bad\0key", 1_i32);
        assert!(doc.encode().is_err());
    }

    #[test]
    fn rejects_truncated_document() {
        let mut doc = Document::new();
        doc.insert("a", 1_i32);
        let mut encoded = doc.encode().unwrap();
        encoded.truncate(encoded.len() - 2);
        assert!(Document::decode(&encoded).is_err());
    }
}
