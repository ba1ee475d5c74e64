use crate::error::{Error, Result};
use crate::marker::Marker;
use crate::message::{headers_from_pairs, ErrorKind, Headers, ProtocolError, ERROR_MAGIC};

use super::{expect_kind, Feed, Limits, Magic, MapParser, ScalarParser, StringParser};

enum State {
    Magic(Magic),
    Kind(Option<ScalarParser>),
    Headers(ProtocolError, Option<Box<MapParser>>),
    Identifier(ProtocolError, Option<StringParser>),
    UserData(ProtocolError, Option<Box<MapParser>>),
    Done,
}

/// Parses an error frame: magic, the error kind, headers, an identifier, and user data.
pub struct ErrorParser {
    limits: Limits,
    state: State,
}

impl Default for ErrorParser {
    fn default() -> Self {
        Self::new(Limits::default())
    }
}

fn feed_headers(
    parser: Option<Box<MapParser>>,
    byte: u8,
    limits: Limits,
    what: &str,
) -> Result<std::result::Result<Headers, Box<MapParser>>> {
    let mut parser = match parser {
        Some(p) => p,
        None => {
            expect_kind(byte, Marker::Map, what)?;
            Box::new(MapParser::new(limits))
        }
    };
    match parser.feed(byte)? {
        Some(pairs) => Ok(Ok(headers_from_pairs(pairs)?)),
        None => Ok(Err(parser)),
    }
}

impl ErrorParser {
    pub fn new(limits: Limits) -> Self {
        Self {
            limits,
            state: State::Magic(Magic::new(&ERROR_MAGIC, "error")),
        }
    }
}

impl Feed for ErrorParser {
    type Output = ProtocolError;

    fn feed(&mut self, byte: u8) -> Result<Option<ProtocolError>> {
        let limits = self.limits;
        self.state = match std::mem::replace(&mut self.state, State::Done) {
            State::Magic(mut magic) => {
                if magic.feed(byte)? {
                    State::Kind(None)
                } else {
                    State::Magic(magic)
                }
            }
            State::Kind(kind) => {
                let mut kind = match kind {
                    Some(k) => k,
                    None => {
                        expect_kind(byte, Marker::Scalar, "error kind")?;
                        ScalarParser::new()
                    }
                };
                match kind.feed(byte)? {
                    Some(k) => {
                        let err = ProtocolError::new(ErrorKind::from_u64(k.as_bits()));
                        State::Headers(err, None)
                    }
                    None => State::Kind(Some(kind)),
                }
            }
            State::Headers(mut err, parser) => {
                match feed_headers(parser, byte, limits, "error headers")? {
                    Ok(headers) => {
                        err.headers = headers;
                        State::Identifier(err, None)
                    }
                    Err(parser) => State::Headers(err, Some(parser)),
                }
            }
            State::Identifier(mut err, parser) => {
                let mut parser = match parser {
                    Some(p) => p,
                    None => {
                        expect_kind(byte, Marker::String, "error identifier")?;
                        StringParser::new(limits.size_limit)
                    }
                };
                match parser.feed(byte)? {
                    Some(identifier) => {
                        err.identifier = identifier;
                        State::UserData(err, None)
                    }
                    None => State::Identifier(err, Some(parser)),
                }
            }
            State::UserData(mut err, parser) => {
                match feed_headers(parser, byte, limits, "error user data")? {
                    Ok(user_data) => {
                        err.user_data = user_data;
                        return Ok(Some(err));
                    }
                    Err(parser) => State::UserData(err, Some(parser)),
                }
            }
            State::Done => return Err(Error::ParserFinished),
        };
        Ok(None)
    }

    fn reset(&mut self) {
        self.state = State::Magic(Magic::new(&ERROR_MAGIC, "error"));
    }
}
