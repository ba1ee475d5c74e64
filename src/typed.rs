//! Values after a declared type has been applied, and the conversions between declared types.
//!
//! Decoded [`Value`]s become [`TypedValue`]s through [`specialize`]. Application values headed
//! for the wire go through [`TypedValue::coerce`]. Both follow the same table:
//!
//! - Integers convert between widths when the value fits the target range.
//! - Floats truncate into integers, and integers widen into floats.
//! - Integers and floats render into strings.
//! - Booleans only come from booleans (on the wire, a zero-magnitude scalar).
//! - Structures come from records (or encoded structures) of exactly the target type. A typed
//!   map with string keys builds one by field name, and a typed array builds one by position.

use std::fmt;

use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::schema::Record;
use crate::types::Type;
use crate::value::Value;

/// A value carrying the type it was declared or converted as.
#[derive(Clone, Debug, PartialEq)]
pub enum TypedValue {
    Null,
    Bool(bool),
    Uint(u64),
    Int(i64),
    F32(f32),
    F64(f64),
    Str(String),
    Array(Vec<TypedValue>),
    Map(Vec<(TypedValue, TypedValue)>),
    Struct(Record),
}

impl TypedValue {
    pub fn is_null(&self) -> bool {
        matches!(self, TypedValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            TypedValue::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            TypedValue::Uint(v) => Some(v),
            TypedValue::Int(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            TypedValue::Int(v) => Some(v),
            TypedValue::Uint(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            TypedValue::F32(v) => Some(v as f64),
            TypedValue::F64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::Str(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[TypedValue]> {
        match self {
            TypedValue::Array(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(TypedValue, TypedValue)]> {
        match self {
            TypedValue::Map(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            TypedValue::Struct(v) => Some(v),
            _ => None,
        }
    }

    /// Convert into the declared type `ty`, building records for structure types.
    pub fn coerce(self, ty: &Type, registry: &Registry) -> Result<TypedValue> {
        self.conform(ty, Some(registry))
    }

    /// [`TypedValue::coerce`], where building a record from a map or an array needs a
    /// registry to find the schema. Without one, structure types only take records.
    pub(crate) fn conform(self, ty: &Type, registry: Option<&Registry>) -> Result<TypedValue> {
        match ty {
            Type::Bool => match self {
                TypedValue::Bool(_) => Ok(self),
                v => Err(Error::unconvertible(v, ty)),
            },
            Type::String => match self {
                TypedValue::Str(_) => Ok(self),
                TypedValue::Uint(v) => Ok(TypedValue::Str(v.to_string())),
                TypedValue::Int(v) => Ok(TypedValue::Str(v.to_string())),
                TypedValue::F32(v) => Ok(TypedValue::Str(v.to_string())),
                TypedValue::F64(v) => Ok(TypedValue::Str(v.to_string())),
                v => Err(Error::unconvertible(v, ty)),
            },
            Type::Float32 | Type::Float64 => {
                let f = match self {
                    TypedValue::F32(v) => v as f64,
                    TypedValue::F64(v) => v,
                    TypedValue::Uint(v) => v as f64,
                    TypedValue::Int(v) => v as f64,
                    v => return Err(Error::unconvertible(v, ty)),
                };
                Ok(float(ty, f))
            }
            t if t.is_integer() => {
                let wide = match self {
                    TypedValue::Uint(v) => Some(v as i128),
                    TypedValue::Int(v) => Some(v as i128),
                    TypedValue::F32(v) => truncate(v as f64),
                    TypedValue::F64(v) => truncate(v),
                    _ => None,
                };
                wide.and_then(|v| integer(ty, v))
                    .ok_or_else(|| Error::unconvertible(&self, ty))
            }
            Type::Array(of) => match self {
                TypedValue::Array(items) => items
                    .into_iter()
                    .map(|item| item.conform(of, registry))
                    .collect::<Result<Vec<_>>>()
                    .map(TypedValue::Array),
                v => Err(Error::unconvertible(v, ty)),
            },
            Type::Map(key, value) => match self {
                TypedValue::Map(pairs) => pairs
                    .into_iter()
                    .map(|(k, v)| Ok((k.conform(key, registry)?, v.conform(value, registry)?)))
                    .collect::<Result<Vec<_>>>()
                    .map(TypedValue::Map),
                v => Err(Error::unconvertible(v, ty)),
            },
            Type::Struct(id) => {
                let id = *id;
                match self {
                    TypedValue::Struct(record) if record.type_id() == id => {
                        Ok(TypedValue::Struct(record))
                    }
                    TypedValue::Map(pairs) => {
                        let registry = registry.ok_or_else(|| Error::unconvertible("map", ty))?;
                        let schema = registry.schema(id)?;
                        let mut named = Vec::with_capacity(pairs.len());
                        for (k, v) in pairs {
                            match k {
                                TypedValue::Str(name) => named.push((name, v)),
                                k => return Err(Error::unconvertible(k, "field name")),
                            }
                        }
                        let policy = registry.config().unknown_fields;
                        Record::build_named(schema, named, policy, Some(registry))
                            .map(TypedValue::Struct)
                    }
                    TypedValue::Array(items) => {
                        let registry = registry.ok_or_else(|| Error::unconvertible("array", ty))?;
                        let schema = registry.schema(id)?;
                        Record::build_positional(schema, items, Some(registry))
                            .map(TypedValue::Struct)
                    }
                    v => Err(Error::unconvertible(v, ty)),
                }
            }
            _ => Err(Error::unconvertible(&self, ty)),
        }
    }
}

/// Convert a decoded value into the declared type `ty`.
pub fn specialize(value: &Value, ty: &Type, registry: &Registry) -> Result<TypedValue> {
    match ty {
        Type::Bool => value
            .as_bool()
            .map(TypedValue::Bool)
            .ok_or_else(|| Error::unconvertible(value, ty)),
        Type::String => match value {
            Value::Str(v) => Ok(TypedValue::Str(v.clone())),
            Value::Scalar(v) => Ok(TypedValue::Str(v.to_string())),
            Value::F32(v) => Ok(TypedValue::Str(v.to_string())),
            Value::F64(v) => Ok(TypedValue::Str(v.to_string())),
            v => Err(Error::unconvertible(v, ty)),
        },
        Type::Float32 | Type::Float64 => {
            let f = match value {
                Value::F32(v) => *v as f64,
                Value::F64(v) => *v,
                Value::Scalar(v) => v.as_f64(),
                v => return Err(Error::unconvertible(v, ty)),
            };
            Ok(float(ty, f))
        }
        t if t.is_integer() => {
            let wide = match value {
                Value::Scalar(v) if v.is_signed() => Some(v.as_bits() as i64 as i128),
                Value::Scalar(v) => Some(v.as_bits() as i128),
                Value::F32(v) => truncate(*v as f64),
                Value::F64(v) => truncate(*v),
                _ => None,
            };
            wide.and_then(|v| integer(ty, v))
                .ok_or_else(|| Error::unconvertible(value, ty))
        }
        Type::Array(of) => match value {
            Value::Array(items) => items
                .iter()
                .map(|item| specialize(item, of, registry))
                .collect::<Result<Vec<_>>>()
                .map(TypedValue::Array),
            v => Err(Error::unconvertible(v, ty)),
        },
        Type::Map(key, val) => match value {
            Value::Map(pairs) => pairs
                .iter()
                .map(|(k, v)| Ok((specialize(k, key, registry)?, specialize(v, val, registry)?)))
                .collect::<Result<Vec<_>>>()
                .map(TypedValue::Map),
            v => Err(Error::unconvertible(v, ty)),
        },
        Type::Struct(id) => match value {
            Value::Struct(es) if es.id == *id => {
                registry.specialize(es).map(TypedValue::Struct)
            }
            v => Err(Error::unconvertible(v, ty)),
        },
        _ => Err(Error::unconvertible(value, ty)),
    }
}

fn float(ty: &Type, v: f64) -> TypedValue {
    if *ty == Type::Float32 {
        TypedValue::F32(v as f32)
    } else {
        TypedValue::F64(v)
    }
}

fn truncate(v: f64) -> Option<i128> {
    if v.is_finite() {
        Some(v.trunc() as i128)
    } else {
        None
    }
}

/// Range-check a widened integer against an integer type.
fn integer(ty: &Type, v: i128) -> Option<TypedValue> {
    let (min, max) = match ty {
        Type::Uint8 => (0, u8::MAX as i128),
        Type::Uint16 => (0, u16::MAX as i128),
        Type::Uint32 => (0, u32::MAX as i128),
        Type::Uint64 => (0, u64::MAX as i128),
        Type::Int8 => (i8::MIN as i128, i8::MAX as i128),
        Type::Int16 => (i16::MIN as i128, i16::MAX as i128),
        Type::Int32 => (i32::MIN as i128, i32::MAX as i128),
        Type::Int64 => (i64::MIN as i128, i64::MAX as i128),
        _ => return None,
    };
    if v < min || v > max {
        return None;
    }
    if ty.is_signed() {
        Some(TypedValue::Int(v as i64))
    } else {
        Some(TypedValue::Uint(v as u64))
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TypedValue::Null => f.write_str("null"),
            TypedValue::Bool(v) => fmt::Display::fmt(v, f),
            TypedValue::Uint(v) => fmt::Display::fmt(v, f),
            TypedValue::Int(v) => fmt::Display::fmt(v, f),
            TypedValue::F32(v) => fmt::Display::fmt(v, f),
            TypedValue::F64(v) => fmt::Display::fmt(v, f),
            TypedValue::Str(v) => write!(f, "{:?}", v),
            TypedValue::Array(v) => write!(f, "array({})", v.len()),
            TypedValue::Map(v) => write!(f, "map({})", v.len()),
            TypedValue::Struct(v) => write!(f, "{}", v.schema().full_name()),
        }
    }
}

impl From<bool> for TypedValue {
    fn from(v: bool) -> Self {
        TypedValue::Bool(v)
    }
}

macro_rules! impl_from_int {
    ($variant: ident, $wide: ty, $($t: ty),*) => {
        $(
            impl From<$t> for TypedValue {
                fn from(v: $t) -> Self {
                    TypedValue::$variant(v as $wide)
                }
            }
        )*
    };
}

impl_from_int!(Uint, u64, u8, u16, u32, u64);
impl_from_int!(Int, i64, i8, i16, i32, i64);

impl From<f32> for TypedValue {
    fn from(v: f32) -> Self {
        TypedValue::F32(v)
    }
}

impl From<f64> for TypedValue {
    fn from(v: f64) -> Self {
        TypedValue::F64(v)
    }
}

impl From<&str> for TypedValue {
    fn from(v: &str) -> Self {
        TypedValue::Str(v.to_string())
    }
}

impl From<String> for TypedValue {
    fn from(v: String) -> Self {
        TypedValue::Str(v)
    }
}

impl From<Record> for TypedValue {
    fn from(v: Record) -> Self {
        TypedValue::Struct(v)
    }
}

impl<T: Into<TypedValue>> From<Vec<T>> for TypedValue {
    fn from(v: Vec<T>) -> Self {
        TypedValue::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<TypedValue>> From<Option<T>> for TypedValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(TypedValue::Null, Into::into)
    }
}
