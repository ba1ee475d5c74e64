use std::collections::BTreeMap;
use std::sync::Arc;

use educe::Educe;

use crate::config::UnknownFieldPolicy;
use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::schema::{Schema, UnknownField};
use crate::typed::TypedValue;

/// A structure instance: named field values under a registered schema.
///
/// Fields are addressed by name. Setting a oneof member clears the other members of the same
/// oneof, so at most one is ever populated. Slots that couldn't be mapped while decoding are kept
/// aside in [`Record::unknown_fields`] and don't take part in equality.
#[derive(Clone, Debug, Educe)]
#[educe(PartialEq)]
pub struct Record {
    schema: Arc<Schema>,
    values: BTreeMap<String, TypedValue>,
    #[educe(PartialEq(ignore))]
    unknown_fields: Vec<UnknownField>,
}

impl Record {
    /// An empty record: every field unset.
    pub fn new(schema: Arc<Schema>) -> Record {
        Record {
            schema,
            values: BTreeMap::new(),
            unknown_fields: Vec::new(),
        }
    }

    /// Build a record from field names. Names the schema lacks are handled by `policy`.
    pub fn from_named<K, I>(schema: Arc<Schema>, pairs: I, policy: UnknownFieldPolicy) -> Result<Record>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, TypedValue)>,
    {
        Record::build_named(schema, pairs, policy, None)
    }

    pub(crate) fn build_named<K, I>(
        schema: Arc<Schema>,
        pairs: I,
        policy: UnknownFieldPolicy,
        registry: Option<&Registry>,
    ) -> Result<Record>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, TypedValue)>,
    {
        let mut record = Record::new(schema);
        for (name, value) in pairs {
            let name = name.into();
            if record.schema.has_field_name(&name) {
                record.insert(name, value, registry)?;
                continue;
            }
            match policy {
                UnknownFieldPolicy::Raise => {
                    return Err(Error::UnknownFieldInitialization {
                        structure: record.schema.full_name(),
                        field: name,
                    })
                }
                UnknownFieldPolicy::Warn => tracing::warn!(
                    structure = %record.schema.full_name(),
                    field = %name,
                    "Attempt to set unknown field"
                ),
                UnknownFieldPolicy::Ignore => (),
            }
        }
        Ok(record)
    }

    /// Build a record from values in field index order.
    ///
    /// A oneof position can only take a null value, since a bare value doesn't say which member
    /// it belongs to.
    pub fn from_positional(schema: Arc<Schema>, values: Vec<TypedValue>) -> Result<Record> {
        Record::build_positional(schema, values, None)
    }

    pub(crate) fn build_positional(
        schema: Arc<Schema>,
        values: Vec<TypedValue>,
        registry: Option<&Registry>,
    ) -> Result<Record> {
        let mut record = Record::new(schema);
        for (index, value) in values.into_iter().enumerate() {
            let schema = Arc::clone(&record.schema);
            let field = schema.field_at(index as u64).ok_or_else(|| {
                Error::UnknownFieldInitialization {
                    structure: schema.full_name(),
                    field: format!("#{}", index),
                }
            })?;
            match field.name() {
                Some(name) => record.insert(name.to_string(), value, registry)?,
                None if value.is_null() => (),
                None => {
                    return Err(Error::BadField {
                        field: format!("#{}", index),
                        reason: "a positional value can't select a oneof member".into(),
                    })
                }
            }
        }
        Ok(record)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn type_id(&self) -> u64 {
        self.schema.id()
    }

    /// Set a field by name, converting the value to the field's declared type. Fails if the
    /// schema has no such field or the value doesn't convert.
    ///
    /// A structure-typed field takes a record of its type; use [`TypedValue::coerce`] first to
    /// build one from a map or an array.
    pub fn set(&mut self, name: &str, value: impl Into<TypedValue>) -> Result<()> {
        if !self.schema.has_field_name(name) {
            return Err(Error::UnknownFieldInitialization {
                structure: self.schema.full_name(),
                field: name.to_string(),
            });
        }
        self.insert(name.to_string(), value.into(), None)
    }

    /// Builder form of [`Record::set`].
    pub fn with(mut self, name: &str, value: impl Into<TypedValue>) -> Result<Record> {
        self.set(name, value)?;
        Ok(self)
    }

    fn insert(&mut self, name: String, value: TypedValue, registry: Option<&Registry>) -> Result<()> {
        let value = match self.schema.type_of(&name) {
            Some(ty) if !value.is_null() => {
                value.conform(&ty, registry).map_err(|e| Error::BadField {
                    field: name.clone(),
                    reason: e.to_string(),
                })?
            }
            _ => value,
        };
        if !value.is_null() {
            if let Some(oneof) = self.schema.oneof_containing(&name) {
                for member in oneof.fields() {
                    if let Some(other) = member.name() {
                        if other != name {
                            self.values.remove(other);
                        }
                    }
                }
            }
        }
        self.values.insert(name, value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&TypedValue> {
        self.values.get(name)
    }

    /// Whether a field holds a non-null value.
    pub fn has(&self, name: &str) -> bool {
        self.values.get(name).map_or(false, |v| !v.is_null())
    }

    pub fn remove(&mut self, name: &str) -> Option<TypedValue> {
        self.values.remove(name)
    }

    /// Set fields and their values, ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypedValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn unknown_fields(&self) -> &[UnknownField] {
        &self.unknown_fields
    }

    pub(crate) fn push_unknown(&mut self, field: UnknownField) {
        self.unknown_fields.push(field);
    }

    /// Get a field that must be present and non-null.
    pub fn require(&self, name: &str) -> Result<&TypedValue> {
        self.values
            .get(name)
            .filter(|v| !v.is_null())
            .ok_or_else(|| Error::BadField {
                field: name.to_string(),
                reason: "field is not set".into(),
            })
    }

    pub fn get_str(&self, name: &str) -> Result<&str> {
        let v = self.require(name)?;
        v.as_str().ok_or_else(|| Error::unconvertible(v, "string"))
    }

    pub fn get_i64(&self, name: &str) -> Result<i64> {
        let v = self.require(name)?;
        v.as_i64().ok_or_else(|| Error::unconvertible(v, "int64"))
    }

    pub fn get_u64(&self, name: &str) -> Result<u64> {
        let v = self.require(name)?;
        v.as_u64().ok_or_else(|| Error::unconvertible(v, "uint64"))
    }

    pub fn get_bool(&self, name: &str) -> Result<bool> {
        let v = self.require(name)?;
        v.as_bool().ok_or_else(|| Error::unconvertible(v, "bool"))
    }

    pub fn get_f64(&self, name: &str) -> Result<f64> {
        let v = self.require(name)?;
        v.as_f64().ok_or_else(|| Error::unconvertible(v, "float64"))
    }

    /// Convert into a concrete structure type, checking the type identifier first.
    pub fn to_structure<T: Structure>(&self) -> Result<T> {
        if self.type_id() != T::ID {
            return Err(Error::unconvertible(self.schema.full_name(), T::schema().full_name()));
        }
        T::from_record(self)
    }
}

/// A Rust type with a wire schema.
///
/// Implementors describe their schema once and convert to and from [`Record`]s; the registry
/// does the rest.
pub trait Structure: Sized {
    /// The structure's type identifier.
    const ID: u64;

    fn schema() -> Schema;

    /// Fill a record created from this type's registered schema.
    fn fill_record(&self, record: &mut Record) -> Result<()>;

    fn from_record(record: &Record) -> Result<Self>;
}
