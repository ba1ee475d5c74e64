use educe::Educe;
use serde::{Deserialize, Serialize};

use crate::{MAX_DEPTH, SIZE_LIMIT};

/// What to do with fields that don't match a structure's schema.
///
/// Applies both when decoding (a slot with no descriptor, or a value that doesn't fit its
/// declared type) and when building a record from field names.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownFieldPolicy {
    /// Keep the field aside silently.
    Ignore,
    /// Keep the field aside and log a warning.
    #[default]
    Warn,
    /// Fail the operation.
    Raise,
}

/// Process settings shared by the registry, decoders, and connection drivers.
///
/// Deserializes from any serde format; missing keys take their defaults and unrecognized keys are
/// refused.
#[derive(Educe, Clone, Debug, Serialize, Deserialize)]
#[educe(PartialEq, Default)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    pub unknown_fields: UnknownFieldPolicy,
    /// Declared lengths at or above this are refused before anything is allocated for them.
    #[educe(Default = SIZE_LIMIT)]
    pub size_limit: u64,
    /// How deeply values may nest inside arrays, maps, oneofs, and structures.
    #[educe(Default = MAX_DEPTH)]
    pub max_depth: usize,
}
