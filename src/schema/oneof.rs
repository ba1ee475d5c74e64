use crate::error::{Error, Result};
use crate::schema::FieldDescriptor;
use crate::types::Type;

/// The members of a oneof field. Only primitive, array, and map members are allowed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OneofDescriptor {
    fields: Vec<FieldDescriptor>,
}

impl OneofDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member, rejecting repeated names or indices and nested oneofs or structures.
    pub fn add(&mut self, field: FieldDescriptor) -> Result<()> {
        let name = match &field {
            FieldDescriptor::Primitive { name, .. }
            | FieldDescriptor::Array { name, .. }
            | FieldDescriptor::Map { name, .. } => name.clone(),
            FieldDescriptor::Struct { name, .. } => return Err(Error::NestedOneof(name.clone())),
            FieldDescriptor::Oneof { index, .. } => {
                return Err(Error::NestedOneof(format!("oneof at index {}", index)))
            }
        };
        if self.by_name(&name).is_some() {
            return Err(Error::DuplicateName(name));
        }
        if self.by_index(field.index()).is_some() {
            return Err(Error::DuplicateIndex(field.index()));
        }
        self.fields.push(field);
        self.fields.sort_by_key(|f| f.index());
        Ok(())
    }

    pub fn primitive(mut self, name: impl Into<String>, ty: Type, index: u64) -> Result<Self> {
        self.add(FieldDescriptor::primitive(name, ty, index))?;
        Ok(self)
    }

    pub fn array(mut self, name: impl Into<String>, of: Type, index: u64) -> Result<Self> {
        self.add(FieldDescriptor::array(name, of, index))?;
        Ok(self)
    }

    pub fn map(mut self, name: impl Into<String>, key: Type, value: Type, index: u64) -> Result<Self> {
        self.add(FieldDescriptor::map(name, key, value, index)?)?;
        Ok(self)
    }

    /// Members, ordered by index.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn by_index(&self, index: u64) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.index() == index)
    }

    pub fn by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name() == Some(name))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Re-check every member, for descriptors assembled without [`OneofDescriptor::add`].
    pub(crate) fn validate(&self) -> Result<()> {
        let mut check = OneofDescriptor::new();
        for field in &self.fields {
            if let FieldDescriptor::Map { key, .. } = field {
                if !key.is_valid_map_key() {
                    return Err(Error::InvalidMapKey(key.to_string()));
                }
            }
            check.add(field.clone())?;
        }
        Ok(())
    }
}
