use crate::encode;
use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::schema::{OneofDescriptor, Record};
use crate::typed::{self, TypedValue};
use crate::types::Type;
use crate::value::Value;

/// One positional field of a structure.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldDescriptor {
    /// A scalar, float, or string field. Optional fields encode as void when absent.
    Primitive {
        name: String,
        index: u64,
        ty: Type,
        optional: bool,
    },
    /// An array of a single declared element type. Absent arrays encode as empty.
    Array { name: String, index: u64, of: Type },
    /// A map with declared key and value types. Absent maps encode as empty.
    Map {
        name: String,
        index: u64,
        key: Type,
        value: Type,
    },
    /// A tagged union of member fields, occupying one position.
    Oneof {
        index: u64,
        descriptor: OneofDescriptor,
    },
    /// A nested structure, named by its type identifier.
    Struct {
        name: String,
        index: u64,
        target: u64,
        optional: bool,
    },
}

impl FieldDescriptor {
    pub fn primitive(name: impl Into<String>, ty: Type, index: u64) -> FieldDescriptor {
        FieldDescriptor::Primitive {
            name: name.into(),
            index,
            ty,
            optional: false,
        }
    }

    pub fn array(name: impl Into<String>, of: Type, index: u64) -> FieldDescriptor {
        FieldDescriptor::Array {
            name: name.into(),
            index,
            of,
        }
    }

    /// Map field. Fails unless the key type is a string, integer, or float.
    pub fn map(name: impl Into<String>, key: Type, value: Type, index: u64) -> Result<FieldDescriptor> {
        if !key.is_valid_map_key() {
            return Err(Error::InvalidMapKey(key.to_string()));
        }
        Ok(FieldDescriptor::Map {
            name: name.into(),
            index,
            key,
            value,
        })
    }

    pub fn oneof(descriptor: OneofDescriptor, index: u64) -> FieldDescriptor {
        FieldDescriptor::Oneof { index, descriptor }
    }

    pub fn structure(name: impl Into<String>, target: u64, index: u64) -> FieldDescriptor {
        FieldDescriptor::Struct {
            name: name.into(),
            index,
            target,
            optional: false,
        }
    }

    /// Mark a primitive or structure field optional. Other kinds are returned unchanged.
    pub fn optional(mut self) -> FieldDescriptor {
        match &mut self {
            FieldDescriptor::Primitive { optional, .. } | FieldDescriptor::Struct { optional, .. } => {
                *optional = true
            }
            _ => (),
        }
        self
    }

    pub fn index(&self) -> u64 {
        match self {
            FieldDescriptor::Primitive { index, .. }
            | FieldDescriptor::Array { index, .. }
            | FieldDescriptor::Map { index, .. }
            | FieldDescriptor::Oneof { index, .. }
            | FieldDescriptor::Struct { index, .. } => *index,
        }
    }

    /// Field name. A oneof has no name of its own; its members do.
    pub fn name(&self) -> Option<&str> {
        match self {
            FieldDescriptor::Primitive { name, .. }
            | FieldDescriptor::Array { name, .. }
            | FieldDescriptor::Map { name, .. }
            | FieldDescriptor::Struct { name, .. } => Some(name.as_str()),
            FieldDescriptor::Oneof { .. } => None,
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(
            self,
            FieldDescriptor::Primitive { optional: true, .. }
                | FieldDescriptor::Struct { optional: true, .. }
        )
    }

    /// The declared type of a named field, or `None` for a oneof.
    pub fn field_type(&self) -> Option<Type> {
        match self {
            FieldDescriptor::Primitive { ty, .. } => Some(ty.clone()),
            FieldDescriptor::Array { of, .. } => Some(Type::array(of.clone())),
            FieldDescriptor::Map { key, value, .. } => {
                Some(Type::Map(Box::new(key.clone()), Box::new(value.clone())))
            }
            FieldDescriptor::Struct { target, .. } => Some(Type::Struct(*target)),
            FieldDescriptor::Oneof { .. } => None,
        }
    }

    pub fn as_oneof(&self) -> Option<&OneofDescriptor> {
        match self {
            FieldDescriptor::Oneof { descriptor, .. } => Some(descriptor),
            _ => None,
        }
    }

    /// Name and declared type, for every kind but a oneof.
    fn named(&self) -> Option<(&str, Type)> {
        Some((self.name()?, self.field_type()?))
    }

    /// Write this field's slot of a structure body, taking its value from `record`.
    pub(crate) fn encode(&self, buf: &mut Vec<u8>, record: &Record, registry: &Registry) -> Result<()> {
        let Some((name, ty)) = self.named() else {
            return self.encode_oneof(buf, record, registry);
        };
        let value = record.get(name).filter(|v| !v.is_null());
        match (self, value) {
            (_, Some(v)) => encode::encode_as(buf, v, &ty, registry).map_err(|e| Error::BadField {
                field: name.to_string(),
                reason: e.to_string(),
            }),
            (FieldDescriptor::Array { .. }, None) | (FieldDescriptor::Map { .. }, None) => {
                encode::encode_empty(buf, ty.marker());
                Ok(())
            }
            (f, None) if f.is_optional() => {
                encode::encode_void(buf);
                Ok(())
            }
            (_, None) => Err(Error::BadField {
                field: name.to_string(),
                reason: "missing value for non-optional field".into(),
            }),
        }
    }

    /// The first member set on the record wins; with none set, the oneof is empty.
    fn encode_oneof(&self, buf: &mut Vec<u8>, record: &Record, registry: &Registry) -> Result<()> {
        let descriptor = match self {
            FieldDescriptor::Oneof { descriptor, .. } => descriptor,
            _ => return Err(Error::InvalidState("not a oneof field")),
        };
        for member in descriptor.fields() {
            let (name, ty) = member
                .named()
                .ok_or_else(|| Error::NestedOneof(format!("index {}", member.index())))?;
            if let Some(value) = record.get(name).filter(|v| !v.is_null()) {
                return encode::encode_oneof(buf, member.index(), value, &ty, registry);
            }
        }
        encode::encode_empty_oneof(buf);
        Ok(())
    }

    /// Convert this field's decoded slot into a named typed value.
    ///
    /// Returns `Ok(None)` when the slot holds nothing to set: an empty oneof.
    pub(crate) fn specialize(
        &self,
        value: &Value,
        registry: &Registry,
    ) -> Result<Option<(String, TypedValue)>> {
        let Some((name, ty)) = self.named() else {
            return self.specialize_oneof(value, registry);
        };
        let typed = match (self, value) {
            (f, Value::Void) if f.is_optional() => TypedValue::Null,
            (FieldDescriptor::Array { .. }, Value::Void) => TypedValue::Array(Vec::new()),
            (FieldDescriptor::Map { .. }, Value::Void) => TypedValue::Map(Vec::new()),
            _ => typed::specialize(value, &ty, registry)?,
        };
        Ok(Some((name.to_string(), typed)))
    }

    fn specialize_oneof(&self, value: &Value, registry: &Registry) -> Result<Option<(String, TypedValue)>> {
        let descriptor = match self {
            FieldDescriptor::Oneof { descriptor, .. } => descriptor,
            _ => return Err(Error::InvalidState("not a oneof field")),
        };
        let oneof = match value {
            Value::Void => return Ok(None),
            Value::Oneof(o) => o,
            v => return Err(Error::unconvertible(v, "oneof")),
        };
        let (name, ty) = descriptor
            .by_index(oneof.index)
            .and_then(|member| member.named())
            .ok_or_else(|| Error::unconvertible(value, "oneof member"))?;
        let typed = typed::specialize(&oneof.value, &ty, registry)?;
        Ok(Some((name.to_string(), typed)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn optional_only_applies_to_primitives_and_structs() {
        assert!(FieldDescriptor::primitive("a", Type::Int8, 0).optional().is_optional());
        assert!(FieldDescriptor::structure("b", 7, 1).optional().is_optional());
        assert!(!FieldDescriptor::array("c", Type::Int8, 2).optional().is_optional());
    }

    #[test]
    fn declared_types() {
        let f = FieldDescriptor::map("m", Type::String, Type::array(Type::Bool), 3).unwrap();
        assert_eq!(f.name(), Some("m"));
        assert_eq!(f.index(), 3);
        assert_eq!(f.field_type().unwrap().to_string(), "map<string, array<bool>>");
        assert!(FieldDescriptor::map("m", Type::Bool, Type::Bool, 0).is_err());
        let o = FieldDescriptor::oneof(OneofDescriptor::new(), 4);
        assert_eq!(o.name(), None);
        assert_eq!(o.field_type(), None);
    }
}
