//! yarp is a compact, self-describing binary format for remote procedure calls.
//!
//! Every value starts with a header byte naming its kind, and composite values carry their byte
//! length up front, so any value can be read (or skipped) without knowing its schema:
//!
//! - Scalars: variable-length integers with a signed flag. Booleans are zero-magnitude scalars.
//! - Floats: 32 or 64 bits, little-endian, with zero encoded by the header alone.
//! - Strings: UTF-8 bytes.
//! - Arrays, maps, and oneofs (tagged unions).
//! - Structures: an 8-byte type identifier followed by positional fields.
//!
//! On top of the value format sit:
//!
//! - A schema layer, turning encoded structures into [`Record`]s of registered types and back.
//! - Incremental parsers in [`parser`], which accept input one byte at a time and can be driven
//!   by any byte stream.
//! - Request, response, and error frames in [`message`].
//! - A per-connection [`server::Driver`] that reads a request, dispatches it to a registered
//!   handler, and writes the result (or an error) back.

pub mod config;
pub mod decode;
pub mod encode;
mod error;
mod marker;
pub mod message;
pub mod parser;
mod registry;
pub mod scalar;
pub mod schema;
pub mod server;
mod timestamp;
mod typed;
mod types;
mod value;

pub use self::config::{Config, UnknownFieldPolicy};
pub use self::error::{Error, Result};
pub use self::marker::Marker;
pub use self::message::{ErrorKind, Headers, ProtocolError, Request, Response};
pub use self::registry::Registry;
pub use self::scalar::Scalar;
pub use self::schema::{FieldDescriptor, OneofDescriptor, Record, Schema, Structure, UnknownField};
pub use self::timestamp::Timestamp;
pub use self::typed::{specialize, TypedValue};
pub use self::types::Type;
pub use self::value::{EncodedStruct, Oneof, Value};

/// Declared lengths at or above this many bytes are refused, before anything is allocated for
/// them.
pub const SIZE_LIMIT: u64 = 2_000_000_000;

/// Maximum nesting depth of arrays, maps, oneofs, and structures when decoding.
pub const MAX_DEPTH: usize = 100;
