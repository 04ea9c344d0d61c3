use super::decimal128::Decimal128;
use super::document::Document;
use super::object_id::ObjectId;

/// BSON type tags, in the order the format defines them.
///
/// Kept as plain constants rather than a fieldless enum because the
/// decoder needs to match on a byte read straight off the wire; see
/// [`Value::type_tag`] for the inverse mapping.
pub(crate) mod tag {
    pub const DOUBLE: u8 = 0x01;
    pub const STRING: u8 = 0x02;
    pub const DOCUMENT: u8 = 0x03;
    pub const ARRAY: u8 = 0x04;
    pub const BINARY: u8 = 0x05;
    pub const UNDEFINED: u8 = 0x06;
    pub const OBJECT_ID: u8 = 0x07;
    pub const BOOL: u8 = 0x08;
    pub const DATETIME: u8 = 0x09;
    pub const NULL: u8 = 0x0a;
    pub const JAVASCRIPT: u8 = 0x0d;
    pub const INT32: u8 = 0x10;
    pub const TIMESTAMP: u8 = 0x11;
    pub const INT64: u8 = 0x12;
    pub const DECIMAL128: u8 = 0x13;
}

/// A single BSON value.
///
/// `Document` is deliberately not `HashMap`-backed; see
/// [`Document`](super::document::Document) for why.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Double(f64),
    String(String),
    Document(Document),
    Array(Vec<Value>),
    /// Generic (subtype 0x00) binary data. Subtype is preserved on
    /// decode but this crate only ever produces subtype 0x00.
    Binary(u8, Vec<u8>),
    ObjectId(ObjectId),
    Bool(bool),
    /// Milliseconds since the Unix epoch.
    DateTime(i64),
    Null,
    JavaScriptCode(String),
    Int32(i32),
    /// Opaque 8-byte replication timestamp; not interpreted further.
    Timestamp([u8; 8]),
    Int64(i64),
    Decimal128(Decimal128),
}

impl Value {
    pub(crate) fn type_tag(&self) -> u8 {
        match self {
            Self::Double(_) => tag::DOUBLE,
            Self::String(_) => tag::STRING,
            Self::Document(_) => tag::DOCUMENT,
            Self::Array(_) => tag::ARRAY,
            Self::Binary(_, _) => tag::BINARY,
            Self::ObjectId(_) => tag::OBJECT_ID,
            Self::Bool(_) => tag::BOOL,
            Self::DateTime(_) => tag::DATETIME,
            Self::Null => tag::NULL,
            Self::JavaScriptCode(_) => tag::JAVASCRIPT,
            Self::Int32(_) => tag::INT32,
            Self::Timestamp(_) => tag::TIMESTAMP,
            Self::Int64(_) => tag::INT64,
            Self::Decimal128(_) => tag::DECIMAL128,
        }
    }

    /// Builds the narrowest of `Int32`/`Int64` for a signed integer,
    /// following the true `i32` range rather than the wider threshold
    /// a literal reading of some legacy drivers would suggest (see
    /// `DESIGN.md`).
    #[must_use]
    pub fn from_i64(n: i64) -> Self {
        match i32::try_from(n) {
            Ok(n32) => Self::Int32(n32),
            Err(_) => Self::Int64(n),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Self::Document(d) => Some(d),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(d) => Some(*d),
            Self::Int32(i) => Some(f64::from(*i)),
            #[allow(clippy::cast_precision_loss)]
            Self::Int64(i) => Some(*i as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int32(i) => Some(i64::from(*i)),
            Self::Int64(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object_id(&self) -> Option<&ObjectId> {
        match self {
            Self::ObjectId(id) => Some(id),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}
impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}
impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Self::Double(d)
    }
}
impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Int32(n)
    }
}
impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::from_i64(n)
    }
}
impl From<Document> for Value {
    fn from(d: Document) -> Self {
        Self::Document(d)
    }
}
impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Self::ObjectId(id)
    }
}
impl From<Decimal128> for Value {
    fn from(d: Decimal128) -> Self {
        Self::Decimal128(d)
    }
}
impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::Array(v.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_width_selection_follows_true_i32_range() {
        assert_eq!(Value::from_i64(0), Value::Int32(0));
        assert_eq!(Value::from_i64(i64::from(i32::MAX)), Value::Int32(i32::MAX));
        assert_eq!(
            Value::from_i64(i64::from(i32::MAX) + 1),
            Value::Int64(i64::from(i32::MAX) + 1)
        );
        assert_eq!(Value::from_i64(i64::from(i32::MIN)), Value::Int32(i32::MIN));
        assert_eq!(
            Value::from_i64(i64::from(i32::MIN) - 1),
            Value::Int64(i64::from(i32::MIN) - 1)
        );
    }
}
