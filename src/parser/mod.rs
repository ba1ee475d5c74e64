//! Byte-at-a-time parsers.
//!
//! Each parser is a small state machine: feed it one byte at a time, and it answers `Ok(None)`
//! while it needs more, or `Ok(Some(value))` on the byte that completes the value. Feeding a
//! parser after it has completed is an error until it is [reset](Feed::reset).
//!
//! Every parser consumes its own header byte. Composite parsers track how many bytes of their
//! declared length remain, and fail if that budget runs out while an element is still
//! incomplete, or if an element needs more bytes than are left.

mod array;
mod encoded_struct;
mod error;
mod float;
mod map;
mod oneof;
mod request;
mod response;
mod scalar;
mod string;

pub use self::array::ArrayParser;
pub use self::encoded_struct::EncodedStructParser;
pub use self::error::ErrorParser;
pub use self::float::FloatParser;
pub use self::map::MapParser;
pub use self::oneof::OneofParser;
pub use self::request::RequestParser;
pub use self::response::ResponseParser;
pub use self::scalar::ScalarParser;
pub use self::string::StringParser;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::marker::Marker;
use crate::scalar::check_length;
use crate::value::Value;
use crate::{MAX_DEPTH, SIZE_LIMIT};

/// An incremental parser.
pub trait Feed {
    type Output;

    /// Consume one byte. Returns the finished value on the byte that completes it.
    fn feed(&mut self, byte: u8) -> Result<Option<Self::Output>>;

    /// Return to the initial state, ready for a new value.
    fn reset(&mut self);

    /// Feed bytes until a value completes. Returns the value and how many bytes it took, or
    /// `None` if `data` ran out first.
    fn feed_slice(&mut self, data: &[u8]) -> Result<Option<(Self::Output, usize)>> {
        for (i, &byte) in data.iter().enumerate() {
            if let Some(out) = self.feed(byte)? {
                return Ok(Some((out, i + 1)));
            }
        }
        Ok(None)
    }
}

/// Limits applied by every parser: the size ceiling for declared lengths, and how deeply
/// composite values may nest.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limits {
    pub size_limit: u64,
    pub max_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            size_limit: SIZE_LIMIT,
            max_depth: MAX_DEPTH,
        }
    }
}

impl From<&Config> for Limits {
    fn from(config: &Config) -> Self {
        Limits {
            size_limit: config.size_limit,
            max_depth: config.max_depth,
        }
    }
}

/// A length prefix: a scalar, checked against the size ceiling once complete.
#[derive(Clone, Debug)]
pub(crate) struct LengthPrefix {
    scalar: ScalarParser,
    limit: u64,
}

impl LengthPrefix {
    pub(crate) fn new(limit: u64) -> Self {
        Self {
            scalar: ScalarParser::new(),
            limit,
        }
    }

    pub(crate) fn feed(&mut self, byte: u8) -> Result<Option<usize>> {
        match self.scalar.feed(byte)? {
            Some(v) => check_length(v.as_bits(), self.limit).map(Some),
            None => Ok(None),
        }
    }
}

/// Bytes remaining in a composite value's declared length.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Budget(usize);

impl Budget {
    pub(crate) fn new(len: usize) -> Self {
        Budget(len)
    }

    /// Account for one byte of the body.
    pub(crate) fn spend(&mut self, what: &str) -> Result<()> {
        if self.0 == 0 {
            return Err(Error::CorruptStream(format!(
                "{} ran past its declared length",
                what
            )));
        }
        self.0 -= 1;
        Ok(())
    }

    pub(crate) fn is_spent(&self) -> bool {
        self.0 == 0
    }
}

/// A frame's 3-byte magic, checked as each byte arrives.
#[derive(Clone, Debug)]
pub(crate) struct Magic {
    expected: &'static [u8; 3],
    frame: &'static str,
    pos: usize,
}

impl Magic {
    pub(crate) fn new(expected: &'static [u8; 3], frame: &'static str) -> Self {
        Self {
            expected,
            frame,
            pos: 0,
        }
    }

    /// Returns true once the whole magic has matched.
    pub(crate) fn feed(&mut self, byte: u8) -> Result<bool> {
        if self.expected[self.pos] != byte {
            return Err(Error::CorruptStream(format!("missing {} magic", self.frame)));
        }
        self.pos += 1;
        Ok(self.pos == self.expected.len())
    }
}

/// Check that a frame field starts with the expected kind of value.
pub(crate) fn expect_kind(byte: u8, marker: Marker, what: &str) -> Result<()> {
    match Marker::try_from_u8(byte) {
        Some(m) if m == marker => Ok(()),
        Some(m) => Err(Error::CorruptStream(format!(
            "{} should be a {}, found a {}",
            what,
            marker.name(),
            m.name()
        ))),
        None => Err(Error::InvalidTag(byte)),
    }
}

pub(crate) fn truncated(what: &str) -> Error {
    Error::CorruptStream(format!("{} ended in the middle of an element", what))
}

enum State {
    Start,
    Scalar(ScalarParser),
    Float(FloatParser),
    String(StringParser),
    Array(Box<ArrayParser>),
    Map(Box<MapParser>),
    Oneof(Box<OneofParser>),
    Struct(Box<EncodedStructParser>),
    Done,
}

/// Parses any self-describing value, choosing the concrete parser from the header byte.
pub struct ValueParser {
    limits: Limits,
    depth: usize,
    state: State,
}

impl Default for ValueParser {
    fn default() -> Self {
        Self::new(Limits::default())
    }
}

impl ValueParser {
    pub fn new(limits: Limits) -> Self {
        Self::nested(limits, 0)
    }

    pub(crate) fn nested(limits: Limits, depth: usize) -> Self {
        Self {
            limits,
            depth,
            state: State::Start,
        }
    }

    fn start(&mut self, byte: u8) -> Result<Option<Value>> {
        if self.depth > self.limits.max_depth {
            return Err(Error::ParseLimit(format!(
                "values nested deeper than {}",
                self.limits.max_depth
            )));
        }
        let marker = Marker::try_from_u8(byte).ok_or(Error::InvalidTag(byte))?;
        let (limits, depth) = (self.limits, self.depth);
        self.state = match marker {
            Marker::Void => {
                self.state = State::Done;
                return Ok(Some(Value::Void));
            }
            Marker::Scalar => State::Scalar(ScalarParser::new()),
            Marker::Float => State::Float(FloatParser::new()),
            Marker::String => State::String(StringParser::new(limits.size_limit)),
            Marker::Array => State::Array(Box::new(ArrayParser::nested(limits, depth))),
            Marker::Map => State::Map(Box::new(MapParser::nested(limits, depth))),
            Marker::Oneof => State::Oneof(Box::new(OneofParser::nested(limits, depth))),
            Marker::Struct => State::Struct(Box::new(EncodedStructParser::nested(limits, depth))),
        };
        Ok(None)
    }
}

impl Feed for ValueParser {
    type Output = Value;

    fn feed(&mut self, byte: u8) -> Result<Option<Value>> {
        if let State::Start = self.state {
            if let Some(v) = self.start(byte)? {
                return Ok(Some(v));
            }
        }
        let out = match &mut self.state {
            State::Scalar(p) => p.feed(byte)?.map(Value::Scalar),
            State::Float(p) => p.feed(byte)?,
            State::String(p) => p.feed(byte)?.map(Value::Str),
            State::Array(p) => p.feed(byte)?.map(Value::Array),
            State::Map(p) => p.feed(byte)?.map(Value::Map),
            State::Oneof(p) => p.feed(byte)?.map(|v| v.map_or(Value::Void, Value::Oneof)),
            State::Struct(p) => p.feed(byte)?.map(|v| v.map_or(Value::Void, Value::Struct)),
            State::Done => return Err(Error::ParserFinished),
            State::Start => return Err(Error::InvalidState("value parser didn't start")),
        };
        if out.is_some() {
            self.state = State::Done;
        }
        Ok(out)
    }

    fn reset(&mut self) {
        self.state = State::Start;
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::decode::decode_any;
    use crate::encode::encode_value;
    use crate::scalar::Scalar;
    use crate::value::{EncodedStruct, Oneof};

    /// Feed every byte, checking the value completes on exactly the last one.
    pub(crate) fn feed_exact<P: Feed>(parser: &mut P, data: &[u8]) -> Result<P::Output> {
        let (last, init) = data.split_last().expect("non-empty input");
        for &byte in init {
            assert!(parser.feed(byte)?.is_none(), "completed before the last byte");
        }
        Ok(parser.feed(*last)?.expect("should complete on the last byte"))
    }

    fn sample() -> Value {
        Value::Array(vec![
            Value::Void,
            Value::Scalar(Scalar::from(-300i32)),
            Value::F32(1.25),
            Value::F64(0.0),
            Value::from("text"),
            Value::Map(vec![(Value::from("k"), Value::Array(Vec::new()))]),
            Value::Oneof(Oneof::new(2, Value::Scalar(Scalar::from(7u8)))),
            Value::Struct(EncodedStruct::new(
                0xdead_beef,
                vec![Value::Void, Value::from("x"), Value::Map(Vec::new())],
            )),
        ])
    }

    #[test]
    fn agrees_with_decoder() {
        let mut buf = Vec::new();
        encode_value(&mut buf, &sample()).unwrap();
        let mut parser = ValueParser::default();
        let parsed = feed_exact(&mut parser, &buf).unwrap();
        assert_eq!(parsed, sample());
        assert_eq!(decode_any(&mut &buf[..]).unwrap(), parsed);
    }

    #[test]
    fn finished_until_reset() {
        let mut parser = ValueParser::default();
        assert_eq!(parser.feed(0x22).unwrap(), Some(Value::Scalar(Scalar::from(1u8))));
        assert_eq!(parser.feed(0x22), Err(Error::ParserFinished));
        parser.reset();
        assert_eq!(parser.feed(0x00).unwrap(), Some(Value::Void));
    }

    #[test]
    fn invalid_tag() {
        let mut parser = ValueParser::default();
        assert_eq!(parser.feed(0x1f), Err(Error::InvalidTag(0x1f)));
    }

    #[test]
    fn feed_slice_stops_at_value() {
        let mut parser = ValueParser::default();
        let data = [0xa4u8, b'h', b'i', 0x22];
        let (value, used) = parser.feed_slice(&data).unwrap().unwrap();
        assert_eq!(value, Value::from("hi"));
        assert_eq!(used, 3);
    }

    #[test]
    fn depth_limit() {
        let limits = Limits {
            max_depth: 3,
            ..Limits::default()
        };
        let mut value = Value::Array(Vec::new());
        for _ in 0..5 {
            value = Value::Array(vec![value]);
        }
        let mut buf = Vec::new();
        encode_value(&mut buf, &value).unwrap();
        let mut parser = ValueParser::new(limits);
        assert!(matches!(parser.feed_slice(&buf), Err(Error::ParseLimit(_))));
    }
}
