use std::fmt;

use crate::error::{Error, Result};
use crate::marker::Marker;

/// A declared wire type, as used by field descriptors and typed encoding.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Int8,
    Int16,
    Int32,
    Int64,
    Bool,
    Float32,
    Float64,
    String,
    Array(Box<Type>),
    Map(Box<Type>, Box<Type>),
    /// A structure, named by its registered type identifier.
    Struct(u64),
}

impl Type {
    /// Build an array type.
    pub fn array(of: Type) -> Type {
        Type::Array(Box::new(of))
    }

    /// Build a map type. Fails unless the key type is a string, integer, or float.
    pub fn map(key: Type, value: Type) -> Result<Type> {
        if !key.is_valid_map_key() {
            return Err(Error::InvalidMapKey(key.to_string()));
        }
        Ok(Type::Map(Box::new(key), Box::new(value)))
    }

    pub fn is_valid_map_key(&self) -> bool {
        self.is_integer() || self.is_float() || matches!(self, Type::String)
    }

    pub fn is_integer(&self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, Type::Int8 | Type::Int16 | Type::Int32 | Type::Int64)
    }

    pub fn is_unsigned(&self) -> bool {
        matches!(self, Type::Uint8 | Type::Uint16 | Type::Uint32 | Type::Uint64)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Type::Float32 | Type::Float64)
    }

    /// The wire kind values of this type are encoded with.
    pub fn marker(&self) -> Marker {
        match self {
            Type::Uint8
            | Type::Uint16
            | Type::Uint32
            | Type::Uint64
            | Type::Int8
            | Type::Int16
            | Type::Int32
            | Type::Int64
            | Type::Bool => Marker::Scalar,
            Type::Float32 | Type::Float64 => Marker::Float,
            Type::String => Marker::String,
            Type::Array(_) => Marker::Array,
            Type::Map(_, _) => Marker::Map,
            Type::Struct(_) => Marker::Struct,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Type::Uint8 => f.write_str("uint8"),
            Type::Uint16 => f.write_str("uint16"),
            Type::Uint32 => f.write_str("uint32"),
            Type::Uint64 => f.write_str("uint64"),
            Type::Int8 => f.write_str("int8"),
            Type::Int16 => f.write_str("int16"),
            Type::Int32 => f.write_str("int32"),
            Type::Int64 => f.write_str("int64"),
            Type::Bool => f.write_str("bool"),
            Type::Float32 => f.write_str("float32"),
            Type::Float64 => f.write_str("float64"),
            Type::String => f.write_str("string"),
            Type::Array(t) => write!(f, "array<{}>", t),
            Type::Map(k, v) => write!(f, "map<{}, {}>", k, v),
            Type::Struct(id) => write!(f, "struct<0x{:016x}>", id),
        }
    }
}
