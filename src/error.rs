use thiserror::Error;

use crate::message::{ErrorKind, ProtocolError};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum Error {
    /// Framing magic didn't match, or a frame's declared length disagreed with its content.
    #[error("Corrupt stream: {0}")]
    CorruptStream(String),
    /// A declared length was at or above the size ceiling.
    #[error("Declared size {actual} is at or above the limit of {max} bytes")]
    SizeTooLarge { max: u64, actual: u64 },
    /// A header byte's kind bits don't name a known wire kind.
    #[error("Invalid type in stream (header byte 0x{0:02x})")]
    InvalidTag(u8),
    /// Data ended before a value was complete.
    #[error("Expected {expected} more bytes, but only {actual} remained on step [{step}]")]
    LengthTooShort {
        step: &'static str,
        actual: usize,
        expected: usize,
    },
    /// A map's key run and value run decoded to different item counts.
    #[error("Uneven map values: {keys} keys, {values} values")]
    UnevenMap { keys: usize, values: usize },
    /// A scalar carried more value bits than fit in 64 bits.
    #[error("Scalar value overflows 64 bits")]
    ScalarOverflow,
    /// A string's bytes weren't valid UTF-8.
    #[error("String is not valid UTF-8: {0}")]
    BadUtf8(String),
    /// A value couldn't be converted into the requested type.
    #[error("Cannot convert {value} to {target}")]
    Unconvertible { value: String, target: String },
    /// A parser that already delivered its value was fed again without a reset.
    #[error("Parser was fed after completion")]
    ParserFinished,
    /// Values were nested deeper than the decoder allows.
    #[error("Parser limit exceeded: {0}")]
    ParseLimit(String),
    /// The first field of a structure doesn't have index 0.
    #[error("Structure {0} doesn't start at field index 0")]
    MinFieldNotZero(String),
    /// A structure's field indices aren't contiguous.
    #[error("Structure {structure} has a gap before field index {index}")]
    FieldGap { structure: String, index: u64 },
    /// A oneof or structure declared the same name twice.
    #[error("Duplicated name {0}")]
    DuplicateName(String),
    /// A oneof or structure declared the same index twice.
    #[error("Duplicated index {0}")]
    DuplicateIndex(u64),
    /// A oneof was declared inside another oneof (or a struct member was used in one).
    #[error("Invalid nested field {0} in oneof")]
    NestedOneof(String),
    /// Map keys must be strings, integers, or floats.
    #[error("Unsupported map key type {0}")]
    InvalidMapKey(String),
    /// A structure was encoded with a field value missing or of the wrong shape.
    #[error("Cannot encode field {field}: {reason}")]
    BadField { field: String, reason: String },
    /// Specialization hit a field without a matching descriptor, and the policy is to raise.
    #[error("Unknown field at index {index:?} while specializing {structure}")]
    UnknownField {
        structure: String,
        index: Option<u64>,
    },
    /// A record was given a field name its schema doesn't have, and the policy is to raise.
    #[error("Attempt to set unknown field {field} for {structure}")]
    UnknownFieldInitialization { structure: String, field: String },
    /// No structure with this type id has been registered.
    #[error("Unregistered structure 0x{0:016x}")]
    UnknownStructure(u64),
    /// A handler tried to stream on a method that doesn't stream responses.
    #[error("Method being invoked does not stream responses")]
    NonStreamable,
    /// The driver was asked to do something its current state doesn't allow.
    #[error("Invalid driver state: {0}")]
    InvalidState(&'static str),
    /// Writing to the connection failed.
    #[error("Connection write failed: {0}")]
    Io(String),
    /// A protocol error, to be relayed to the peer.
    #[error("Protocol error: {0}")]
    Protocol(ProtocolError),
}

impl Error {
    pub(crate) fn unconvertible(value: impl std::fmt::Debug, target: impl std::fmt::Display) -> Self {
        Error::Unconvertible {
            value: format!("{:?}", value),
            target: target.to_string(),
        }
    }

    /// Whether this fault came from reading bytes rather than from schema or handler code.
    pub fn is_decode_fault(&self) -> bool {
        matches!(
            self,
            Error::CorruptStream(_)
                | Error::SizeTooLarge { .. }
                | Error::InvalidTag(_)
                | Error::LengthTooShort { .. }
                | Error::UnevenMap { .. }
                | Error::ScalarOverflow
                | Error::BadUtf8(_)
                | Error::ParserFinished
                | Error::ParseLimit(_)
        )
    }

    /// Translate into the nearest protocol error that can be sent to the peer.
    pub fn to_protocol(&self) -> ProtocolError {
        match self {
            Error::Protocol(err) => err.clone(),
            e if e.is_decode_fault() => ProtocolError::new(ErrorKind::BadRequest),
            Error::Unconvertible { .. }
            | Error::UnknownField { .. }
            | Error::UnknownFieldInitialization { .. }
            | Error::UnknownStructure(_) => ProtocolError::new(ErrorKind::TypeMismatch),
            _ => ProtocolError::new(ErrorKind::InternalError),
        }
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
