use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::schema::{Record, Schema, Structure};
use crate::server::MethodHandle;
use crate::value::EncodedStruct;

/// Structure schemas by type identifier, and method handlers by method identifier.
///
/// Built once at startup and then shared read-only, usually inside a
/// [`Context`](crate::server::Context). Registering a second schema or method under an
/// identifier replaces the first.
#[derive(Default)]
pub struct Registry {
    config: Config,
    structures: HashMap<u64, Arc<Schema>>,
    methods: HashMap<u64, Arc<MethodHandle>>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry::default()
    }

    pub fn with_config(config: Config) -> Registry {
        Registry {
            config,
            ..Registry::default()
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Validate and register a structure schema.
    pub fn register(&mut self, schema: Schema) -> Result<Arc<Schema>> {
        schema.validate()?;
        let schema = Arc::new(schema);
        if self.structures.insert(schema.id(), Arc::clone(&schema)).is_some() {
            tracing::debug!(id = schema.id(), name = %schema.full_name(), "Replaced structure");
        }
        Ok(schema)
    }

    /// Register the schema of a [`Structure`] type.
    pub fn register_structure<T: Structure>(&mut self) -> Result<Arc<Schema>> {
        let schema = T::schema();
        if schema.id() != T::ID {
            return Err(Error::BadField {
                field: schema.full_name(),
                reason: format!("schema id 0x{:016x} doesn't match 0x{:016x}", schema.id(), T::ID),
            });
        }
        self.register(schema)
    }

    pub fn register_method(&mut self, id: u64, method: MethodHandle) -> Arc<MethodHandle> {
        let method = Arc::new(method);
        self.methods.insert(id, Arc::clone(&method));
        method
    }

    pub fn by_type_id(&self, id: u64) -> Option<&Arc<Schema>> {
        self.structures.get(&id)
    }

    pub fn by_method_id(&self, id: u64) -> Option<&Arc<MethodHandle>> {
        self.methods.get(&id)
    }

    /// Like [`Registry::by_type_id`], failing for unregistered identifiers.
    pub fn schema(&self, id: u64) -> Result<Arc<Schema>> {
        self.structures
            .get(&id)
            .cloned()
            .ok_or(Error::UnknownStructure(id))
    }

    /// Turn an encoded structure into a record of its registered type.
    pub fn specialize(&self, encoded: &EncodedStruct) -> Result<Record> {
        self.schema(encoded.id)?.specialize(encoded, self)
    }

    /// Convert a [`Structure`] value into a record under its registered schema.
    pub fn record_of<T: Structure>(&self, value: &T) -> Result<Record> {
        let mut record = Record::new(self.schema(T::ID)?);
        value.fill_record(&mut record)?;
        Ok(record)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::schema::FieldDescriptor;
    use crate::types::Type;

    #[test]
    fn register_validates() {
        let mut reg = Registry::new();
        let bad = Schema::new(2, "p", "Bad").field(FieldDescriptor::primitive("a", Type::Int8, 3));
        assert!(reg.register(bad).is_err());
        assert!(reg.by_type_id(2).is_none());

        let good = Schema::new(2, "p", "Good").field(FieldDescriptor::primitive("a", Type::Int8, 0));
        reg.register(good).unwrap();
        assert_eq!(reg.by_type_id(2).map(|s| s.name()), Some("Good"));
    }

    #[test]
    fn unregistered() {
        let reg = Registry::new();
        assert_eq!(
            reg.specialize(&EncodedStruct::new(99, Vec::new())).unwrap_err(),
            Error::UnknownStructure(99)
        );
        assert!(reg.by_method_id(1).is_none());
    }
}
