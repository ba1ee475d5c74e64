//! Encoding into the wire format.
//!
//! Every value starts with a header byte whose top 3 bits give its kind. Composite values carry
//! their body length in the rest of the header (as a variable-length scalar), so a reader can
//! always skip them without understanding their contents.

use crate::error::{Error, Result};
use crate::marker::{Marker, FLOAT64_FLAG, FLOAT_ZERO_FLAG};
use crate::registry::Registry;
use crate::scalar::{encode_boolean, encode_integer, encode_length};
use crate::schema::Record;
use crate::typed::TypedValue;
use crate::types::Type;
use crate::value::Value;
use crate::SIZE_LIMIT;

pub fn encode_void(buf: &mut Vec<u8>) {
    buf.push(Marker::Void.into_u8());
}

/// An empty array, map, or oneof: just the header, with a length of zero.
pub fn encode_empty(buf: &mut Vec<u8>, marker: Marker) {
    buf.push(marker.into_u8());
}

pub fn encode_empty_oneof(buf: &mut Vec<u8>) {
    encode_empty(buf, Marker::Oneof);
}

/// A 32-bit float. Zero is encoded by the header alone.
pub fn encode_f32(buf: &mut Vec<u8>, v: f32) {
    if v == 0.0 {
        buf.push(Marker::Float.into_u8() | FLOAT_ZERO_FLAG);
    } else {
        buf.push(Marker::Float.into_u8());
        buf.extend_from_slice(&v.to_bits().to_le_bytes());
    }
}

/// A 64-bit float. Zero is encoded by the header alone.
pub fn encode_f64(buf: &mut Vec<u8>, v: f64) {
    if v == 0.0 {
        buf.push(Marker::Float.into_u8() | FLOAT64_FLAG | FLOAT_ZERO_FLAG);
    } else {
        buf.push(Marker::Float.into_u8() | FLOAT64_FLAG);
        buf.extend_from_slice(&v.to_bits().to_le_bytes());
    }
}

pub fn encode_string(buf: &mut Vec<u8>, v: &str) -> Result<()> {
    encode_sized(buf, Marker::String, v.as_bytes())
}

/// Refuse a body length no decoder would accept.
fn check_size(len: usize, limit: u64) -> Result<()> {
    if len as u64 >= limit {
        return Err(Error::SizeTooLarge {
            max: limit,
            actual: len as u64,
        });
    }
    Ok(())
}

/// Header carrying the body length, then the body.
fn encode_sized(buf: &mut Vec<u8>, marker: Marker, body: &[u8]) -> Result<()> {
    check_size(body.len(), SIZE_LIMIT)?;
    encode_length(buf, marker, body.len());
    buf.extend_from_slice(body);
    Ok(())
}

/// Map body: the byte length of the key run, the keys, the byte length of the value run, the
/// values. Both lengths are plain unsigned integer scalars.
pub(crate) fn encode_map_runs(buf: &mut Vec<u8>, keys: &[u8], values: &[u8]) -> Result<()> {
    let mut body = Vec::with_capacity(keys.len() + values.len() + 8);
    encode_integer(&mut body, keys.len() as u64, false);
    body.extend_from_slice(keys);
    encode_integer(&mut body, values.len() as u64, false);
    body.extend_from_slice(values);
    encode_sized(buf, Marker::Map, &body)
}

/// Structure framing around an already-encoded field body. The length covers the 8-byte
/// little-endian type identifier as well as the body.
pub(crate) fn encode_struct_body(buf: &mut Vec<u8>, id: u64, body: &[u8]) -> Result<()> {
    encode_struct_within(buf, id, body, SIZE_LIMIT)
}

fn encode_struct_within(buf: &mut Vec<u8>, id: u64, body: &[u8], limit: u64) -> Result<()> {
    check_size(body.len() + 8, limit)?;
    encode_length(buf, Marker::Struct, body.len() + 8);
    buf.extend_from_slice(&id.to_le_bytes());
    buf.extend_from_slice(body);
    Ok(())
}

/// A populated oneof: the member index, then the member value encoded as its declared type.
pub fn encode_oneof(
    buf: &mut Vec<u8>,
    index: u64,
    value: &TypedValue,
    ty: &Type,
    registry: &Registry,
) -> Result<()> {
    let mut body = Vec::new();
    encode_integer(&mut body, index, false);
    encode_as(&mut body, value, ty, registry)?;
    encode_sized(buf, Marker::Oneof, &body)
}

pub fn encode_record(buf: &mut Vec<u8>, record: &Record, registry: &Registry) -> Result<()> {
    record.schema().encode_record(buf, record, registry)
}

/// Encode `value` as the declared type `ty`, converting it first if needed.
pub fn encode_as(buf: &mut Vec<u8>, value: &TypedValue, ty: &Type, registry: &Registry) -> Result<()> {
    match ty {
        Type::Array(of) => {
            let items = value
                .as_array()
                .ok_or_else(|| Error::unconvertible(value, ty))?;
            if items.is_empty() {
                encode_empty(buf, Marker::Array);
                return Ok(());
            }
            let mut body = Vec::new();
            for item in items {
                encode_as(&mut body, item, of, registry)?;
            }
            encode_sized(buf, Marker::Array, &body)
        }
        Type::Map(key, val) => {
            let pairs = value.as_map().ok_or_else(|| Error::unconvertible(value, ty))?;
            if pairs.is_empty() {
                encode_empty(buf, Marker::Map);
                return Ok(());
            }
            let mut keys = Vec::new();
            let mut values = Vec::new();
            for (k, v) in pairs {
                encode_as(&mut keys, k, key, registry)?;
                encode_as(&mut values, v, val, registry)?;
            }
            encode_map_runs(buf, &keys, &values)
        }
        Type::Struct(id) => match value {
            TypedValue::Struct(record) if record.type_id() == *id => {
                encode_record(buf, record, registry)
            }
            v => match v.clone().coerce(ty, registry)? {
                TypedValue::Struct(record) => encode_record(buf, &record, registry),
                v => Err(Error::unconvertible(v, ty)),
            },
        },
        _ => encode_leaf(buf, &value.clone().coerce(ty, registry)?),
    }
}

/// Encode a value by its own kind. Only scalars, floats, strings, booleans, null, and records
/// are accepted; arrays and maps need a declared element type.
pub fn encode_detect(buf: &mut Vec<u8>, value: &TypedValue, registry: &Registry) -> Result<()> {
    match value {
        TypedValue::Null => {
            encode_void(buf);
            Ok(())
        }
        TypedValue::Struct(record) => encode_record(buf, record, registry),
        TypedValue::Array(_) | TypedValue::Map(_) => {
            Err(Error::unconvertible(value, "a self-describing type"))
        }
        v => encode_leaf(buf, v),
    }
}

fn encode_leaf(buf: &mut Vec<u8>, value: &TypedValue) -> Result<()> {
    match value {
        TypedValue::Null => encode_void(buf),
        TypedValue::Bool(v) => encode_boolean(buf, *v),
        TypedValue::Uint(v) => encode_integer(buf, *v, false),
        TypedValue::Int(v) => encode_integer(buf, *v as u64, true),
        TypedValue::F32(v) => encode_f32(buf, *v),
        TypedValue::F64(v) => encode_f64(buf, *v),
        TypedValue::Str(v) => encode_string(buf, v)?,
        v => return Err(Error::unconvertible(v, "a leaf type")),
    }
    Ok(())
}

/// Re-encode a decoded value exactly as it describes itself.
pub fn encode_value(buf: &mut Vec<u8>, value: &Value) -> Result<()> {
    match value {
        Value::Void => encode_void(buf),
        Value::Scalar(v) => encode_integer(buf, v.as_bits(), v.is_signed()),
        Value::F32(v) => encode_f32(buf, *v),
        Value::F64(v) => encode_f64(buf, *v),
        Value::Str(v) => encode_string(buf, v)?,
        Value::Array(items) if items.is_empty() => encode_empty(buf, Marker::Array),
        Value::Array(items) => {
            let mut body = Vec::new();
            for item in items {
                encode_value(&mut body, item)?;
            }
            encode_sized(buf, Marker::Array, &body)?;
        }
        Value::Map(pairs) if pairs.is_empty() => encode_empty(buf, Marker::Map),
        Value::Map(pairs) => {
            let mut keys = Vec::new();
            let mut values = Vec::new();
            for (k, v) in pairs {
                encode_value(&mut keys, k)?;
                encode_value(&mut values, v)?;
            }
            encode_map_runs(buf, &keys, &values)?;
        }
        Value::Oneof(oneof) => {
            let mut body = Vec::new();
            encode_integer(&mut body, oneof.index, false);
            encode_value(&mut body, &oneof.value)?;
            encode_sized(buf, Marker::Oneof, &body)?;
        }
        Value::Struct(es) => {
            let mut body = Vec::new();
            for field in &es.fields {
                encode_value(&mut body, field)?;
            }
            encode_struct_body(buf, es.id, &body)?;
        }
    }
    Ok(())
}
