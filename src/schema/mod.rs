//! Structure schemas: positional field descriptors, and the conversions between records and
//! their encoded form.

mod field;
mod oneof;
mod record;
mod unknown;

pub use self::field::FieldDescriptor;
pub use self::oneof::OneofDescriptor;
pub use self::record::{Record, Structure};
pub use self::unknown::UnknownField;

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config::UnknownFieldPolicy;
use crate::encode;
use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::types::Type;
use crate::value::EncodedStruct;

/// The declared shape of a structure type.
///
/// Field indices must start at 0 and run without gaps; [`Schema::validate`] checks this and the
/// registry refuses schemas that fail it.
#[derive(Clone, Debug, PartialEq)]
pub struct Schema {
    id: u64,
    package: String,
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl Schema {
    pub fn new(id: u64, package: impl Into<String>, name: impl Into<String>) -> Schema {
        Schema {
            id,
            package: package.into(),
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Add a field. Nothing is checked until [`Schema::validate`].
    pub fn field(mut self, field: FieldDescriptor) -> Schema {
        self.fields.push(field);
        self.fields.sort_by_key(|f| f.index());
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `package.Name`, or just the name when there's no package.
    pub fn full_name(&self) -> String {
        if self.package.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.package, self.name)
        }
    }

    /// Fields, ordered by index.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field_at(&self, index: u64) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.index() == index)
    }

    /// Whether `name` is a field, or a member of one of the oneofs.
    pub fn has_field_name(&self, name: &str) -> bool {
        self.fields.iter().any(|f| match f {
            FieldDescriptor::Oneof { descriptor, .. } => descriptor.by_name(name).is_some(),
            f => f.name() == Some(name),
        })
    }

    /// Declared type of the field or oneof member called `name`.
    pub fn type_of(&self, name: &str) -> Option<Type> {
        self.fields.iter().find_map(|f| match f {
            FieldDescriptor::Oneof { descriptor, .. } => {
                descriptor.by_name(name).and_then(|m| m.field_type())
            }
            f if f.name() == Some(name) => f.field_type(),
            _ => None,
        })
    }

    /// The oneof that has a member called `name`, if any.
    pub fn oneof_containing(&self, name: &str) -> Option<&OneofDescriptor> {
        self.fields
            .iter()
            .filter_map(|f| f.as_oneof())
            .find(|o| o.by_name(name).is_some())
    }

    pub fn validate(&self) -> Result<()> {
        let mut expected = 0u64;
        for field in &self.fields {
            let index = field.index();
            if index < expected {
                return Err(Error::DuplicateIndex(index));
            }
            if index > expected {
                return Err(if expected == 0 {
                    Error::MinFieldNotZero(self.full_name())
                } else {
                    Error::FieldGap {
                        structure: self.full_name(),
                        index,
                    }
                });
            }
            expected += 1;
        }

        let mut names = BTreeSet::new();
        for field in &self.fields {
            match field {
                FieldDescriptor::Oneof { descriptor, .. } => {
                    descriptor.validate()?;
                    for member in descriptor.fields() {
                        let name = member.name().unwrap_or_default();
                        if !names.insert(name) {
                            return Err(Error::DuplicateName(name.to_string()));
                        }
                    }
                }
                FieldDescriptor::Map { key, .. } if !key.is_valid_map_key() => {
                    return Err(Error::InvalidMapKey(key.to_string()));
                }
                f => {
                    let name = f.name().unwrap_or_default();
                    if !names.insert(name) {
                        return Err(Error::DuplicateName(name.to_string()));
                    }
                }
            }
        }
        Ok(())
    }

    /// Encode `record` under this schema: the structure header, the type identifier, then one
    /// slot per field index.
    pub fn encode_record(&self, buf: &mut Vec<u8>, record: &Record, registry: &Registry) -> Result<()> {
        let mut body = Vec::new();
        for field in &self.fields {
            field.encode(&mut body, record, registry)?;
        }
        encode::encode_struct_body(buf, self.id, &body)
    }

    /// Turn an encoded structure of this type into a record.
    ///
    /// Slots without a descriptor, and slots whose value doesn't fit the declared type, become
    /// unknown fields. The registry's policy decides whether they're kept quietly, kept with a
    /// warning, or refused.
    pub fn specialize(
        self: &Arc<Self>,
        encoded: &EncodedStruct,
        registry: &Registry,
    ) -> Result<Record> {
        let policy = registry.config().unknown_fields;
        let mut record = Record::new(Arc::clone(self));
        for (index, value) in encoded.fields.iter().enumerate() {
            let index = index as u64;
            let unknown = match self.field_at(index) {
                None => UnknownField::new(None, value.clone(), Some(index)),
                Some(field) => match field.specialize(value, registry) {
                    Ok(Some((name, typed))) => {
                        record.set(&name, typed)?;
                        continue;
                    }
                    Ok(None) => continue,
                    Err(e) => {
                        tracing::debug!(field = index, error = %e, "Field didn't convert to its declared type");
                        UnknownField::new(Some(field.clone()), value.clone(), Some(index))
                    }
                },
            };
            match policy {
                UnknownFieldPolicy::Raise => {
                    return Err(Error::UnknownField {
                        structure: self.full_name(),
                        index: unknown.wire_index,
                    })
                }
                UnknownFieldPolicy::Warn => tracing::warn!(
                    structure = %self.full_name(),
                    index,
                    "Unknown field while specializing"
                ),
                UnknownFieldPolicy::Ignore => (),
            }
            record.push_unknown(unknown);
        }
        Ok(record)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Config;
    use crate::scalar::Scalar;
    use crate::types::Type;
    use crate::typed::TypedValue;
    use crate::value::{Oneof, Value};

    fn sample() -> Schema {
        let oneof = OneofDescriptor::new()
            .primitive("text", Type::String, 0)
            .and_then(|o| o.array("numbers", Type::Uint8, 1))
            .unwrap();
        Schema::new(0x0102030405060708, "test", "Sample")
            .field(FieldDescriptor::primitive("id", Type::Int64, 0))
            .field(FieldDescriptor::primitive("name", Type::String, 1).optional())
            .field(FieldDescriptor::oneof(oneof, 2))
            .field(FieldDescriptor::array("tags", Type::String, 3))
    }

    fn registry(policy: UnknownFieldPolicy) -> Registry {
        let mut reg = Registry::with_config(Config {
            unknown_fields: policy,
            ..Config::default()
        });
        reg.register(sample()).unwrap();
        reg
    }

    mod validate {
        use super::*;

        #[test]
        fn good() {
            assert!(sample().validate().is_ok());
            assert!(Schema::new(1, "", "Empty").validate().is_ok());
        }

        #[test]
        fn min_not_zero() {
            let s = Schema::new(1, "p", "S").field(FieldDescriptor::primitive("a", Type::Int8, 1));
            assert_eq!(s.validate(), Err(Error::MinFieldNotZero("p.S".into())));
        }

        #[test]
        fn gap() {
            let s = Schema::new(1, "p", "S")
                .field(FieldDescriptor::primitive("a", Type::Int8, 0))
                .field(FieldDescriptor::primitive("b", Type::Int8, 2));
            assert_eq!(
                s.validate(),
                Err(Error::FieldGap {
                    structure: "p.S".into(),
                    index: 2
                })
            );
        }

        #[test]
        fn duplicates() {
            let s = Schema::new(1, "p", "S")
                .field(FieldDescriptor::primitive("a", Type::Int8, 0))
                .field(FieldDescriptor::primitive("b", Type::Int8, 0));
            assert_eq!(s.validate(), Err(Error::DuplicateIndex(0)));
            let s = Schema::new(1, "p", "S")
                .field(FieldDescriptor::primitive("a", Type::Int8, 0))
                .field(FieldDescriptor::primitive("a", Type::Int8, 1));
            assert_eq!(s.validate(), Err(Error::DuplicateName("a".into())));
            let oneof = OneofDescriptor::new().primitive("a", Type::Bool, 0).unwrap();
            let s = Schema::new(1, "p", "S")
                .field(FieldDescriptor::primitive("a", Type::Int8, 0))
                .field(FieldDescriptor::oneof(oneof, 1));
            assert_eq!(s.validate(), Err(Error::DuplicateName("a".into())));
        }
    }

    #[test]
    fn encode_layout() {
        let reg = registry(UnknownFieldPolicy::Raise);
        let schema = reg.schema(0x0102030405060708).unwrap();
        let rec = Record::new(schema.clone()).with("id", 3i64).unwrap();
        let mut buf = Vec::new();
        schema.encode_record(&mut buf, &rec, &reg).unwrap();
        let expected = vec![
            0x81, 0x18, // struct, 12 bytes
            0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01, // id, little-endian
            0x36, // id = 3, signed
            0x00, // name absent
            0xe0, // empty oneof
            0x60, // empty tags
        ];
        assert_eq!(buf, expected);
    }

    #[test]
    fn missing_required() {
        let reg = registry(UnknownFieldPolicy::Raise);
        let schema = reg.schema(0x0102030405060708).unwrap();
        let rec = Record::new(schema.clone());
        let mut buf = Vec::new();
        assert!(matches!(
            schema.encode_record(&mut buf, &rec, &reg),
            Err(Error::BadField { .. })
        ));
    }

    #[test]
    fn specialize_fields() {
        let reg = registry(UnknownFieldPolicy::Raise);
        let schema = reg.schema(0x0102030405060708).unwrap();
        let encoded = EncodedStruct::new(
            schema.id(),
            vec![
                Value::Scalar(Scalar::from(-4i64)),
                Value::Void,
                Value::Oneof(Oneof::new(0, Value::from("hi"))),
                Value::Array(vec![Value::from("a")]),
            ],
        );
        let rec = schema.specialize(&encoded, &reg).unwrap();
        assert_eq!(rec.get_i64("id"), Ok(-4));
        assert_eq!(rec.get("name"), Some(&TypedValue::Null));
        assert_eq!(rec.get_str("text"), Ok("hi"));
        assert!(!rec.has("numbers"));
        assert_eq!(rec.get("tags"), Some(&TypedValue::Array(vec![TypedValue::from("a")])));
        assert!(rec.unknown_fields().is_empty());
    }

    #[test]
    fn unknown_policies() {
        let encoded = EncodedStruct::new(
            0x0102030405060708,
            vec![
                Value::from("not a number"),
                Value::Void,
                Value::Void,
                Value::Void,
                Value::F64(1.0),
            ],
        );

        let reg = registry(UnknownFieldPolicy::Ignore);
        let schema = reg.schema(encoded.id).unwrap();
        let rec = schema.specialize(&encoded, &reg).unwrap();
        assert_eq!(rec.unknown_fields().len(), 2);
        assert!(rec.unknown_fields()[0].has_descriptor());
        assert_eq!(rec.unknown_fields()[0].wire_index, Some(0));
        assert!(!rec.unknown_fields()[1].has_descriptor());
        assert_eq!(rec.unknown_fields()[1].value, Value::F64(1.0));

        let reg = registry(UnknownFieldPolicy::Warn);
        assert_eq!(schema.specialize(&encoded, &reg).unwrap().unknown_fields().len(), 2);

        let reg = registry(UnknownFieldPolicy::Raise);
        assert_eq!(
            schema.specialize(&encoded, &reg).unwrap_err(),
            Error::UnknownField {
                structure: "test.Sample".into(),
                index: Some(0)
            }
        );
    }
}
