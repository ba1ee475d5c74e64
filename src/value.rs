use std::fmt;

use crate::marker::Marker;
use crate::scalar::Scalar;

/// A decoded, self-describing wire value, before any schema has been applied.
///
/// Maps keep their key/value pairs in wire order; keys may be floats, so no hashing is done here.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Void,
    Scalar(Scalar),
    F32(f32),
    F64(f64),
    Str(String),
    Array(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Oneof(Oneof),
    Struct(EncodedStruct),
}

/// The wire form of a tagged union: which member is populated, and its value.
#[derive(Clone, Debug, PartialEq)]
pub struct Oneof {
    pub index: u64,
    pub value: Box<Value>,
}

impl Oneof {
    pub fn new(index: u64, value: Value) -> Self {
        Self {
            index,
            value: Box::new(value),
        }
    }
}

/// The untyped, positional form of a structure: its type identifier and its field values in
/// index order. Gaps and absent optionals show up as [`Value::Void`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EncodedStruct {
    pub id: u64,
    pub fields: Vec<Value>,
}

impl EncodedStruct {
    pub fn new(id: u64, fields: Vec<Value>) -> Self {
        Self { id, fields }
    }
}

impl Value {
    pub fn marker(&self) -> Marker {
        match self {
            Value::Void => Marker::Void,
            Value::Scalar(_) => Marker::Scalar,
            Value::F32(_) | Value::F64(_) => Marker::Float,
            Value::Str(_) => Marker::String,
            Value::Array(_) => Marker::Array,
            Value::Map(_) => Marker::Map,
            Value::Oneof(_) => Marker::Oneof,
            Value::Struct(_) => Marker::Struct,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Value::Void)
    }

    pub fn as_scalar(&self) -> Option<Scalar> {
        match *self {
            Value::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.as_scalar().and_then(|v| v.as_u64())
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_scalar().and_then(|v| v.as_i64())
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_scalar().and_then(|v| v.as_bool())
    }

    /// Either float width, widened to `f64`.
    pub fn as_floating(&self) -> Option<f64> {
        match *self {
            Value::F32(v) => Some(v as f64),
            Value::F64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn as_oneof(&self) -> Option<&Oneof> {
        match self {
            Value::Oneof(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&EncodedStruct> {
        match self {
            Value::Struct(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Void => f.write_str("void"),
            Value::Scalar(v) => fmt::Display::fmt(v, f),
            Value::F32(v) => fmt::Display::fmt(v, f),
            Value::F64(v) => fmt::Display::fmt(v, f),
            Value::Str(v) => write!(f, "{:?}", v),
            Value::Array(v) => write!(f, "array({})", v.len()),
            Value::Map(v) => write!(f, "map({})", v.len()),
            Value::Oneof(v) => write!(f, "oneof({}: {})", v.index, v.value),
            Value::Struct(v) => write!(f, "struct(0x{:016x}, {} fields)", v.id, v.fields.len()),
        }
    }
}

impl From<Scalar> for Value {
    fn from(v: Scalar) -> Self {
        Value::Scalar(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::F32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<EncodedStruct> for Value {
    fn from(v: EncodedStruct) -> Self {
        Value::Struct(v)
    }
}

impl From<Oneof> for Value {
    fn from(v: Oneof) -> Self {
        Value::Oneof(v)
    }
}
