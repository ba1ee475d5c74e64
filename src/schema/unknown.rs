use crate::schema::FieldDescriptor;
use crate::value::Value;

/// A decoded slot that couldn't be mapped onto a declared field.
///
/// Either the structure has no field at that index (no descriptor), or the field exists but the
/// wire value didn't convert into its declared type.
#[derive(Clone, Debug, PartialEq)]
pub struct UnknownField {
    pub descriptor: Option<FieldDescriptor>,
    pub value: Value,
    pub wire_index: Option<u64>,
}

impl UnknownField {
    pub fn new(descriptor: Option<FieldDescriptor>, value: Value, wire_index: Option<u64>) -> Self {
        Self {
            descriptor,
            value,
            wire_index,
        }
    }

    pub fn has_descriptor(&self) -> bool {
        self.descriptor.is_some()
    }
}
