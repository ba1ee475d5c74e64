use crate::error::{Error, Result};
use crate::marker::Marker;
use crate::message::{headers_from_pairs, Request, REQUEST_MAGIC};

use super::{
    expect_kind, truncated, Budget, Feed, LengthPrefix, Limits, Magic, MapParser, ScalarParser,
};

enum State {
    Magic(Magic),
    Length(LengthPrefix),
    Method(Budget, Option<ScalarParser>),
    Headers(Budget, u64, Option<Box<MapParser>>),
    Done,
}

/// Parses a request frame: magic, the byte length of the rest, the method id, and headers.
pub struct RequestParser {
    limits: Limits,
    state: State,
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new(Limits::default())
    }
}

impl RequestParser {
    pub fn new(limits: Limits) -> Self {
        Self {
            limits,
            state: State::Magic(Magic::new(&REQUEST_MAGIC, "request")),
        }
    }

    /// True once the magic has been seen, so the peer has committed to sending a request.
    pub fn is_started(&self) -> bool {
        !matches!(self.state, State::Magic(_))
    }
}

impl Feed for RequestParser {
    type Output = Request;

    fn feed(&mut self, byte: u8) -> Result<Option<Request>> {
        let limits = self.limits;
        match std::mem::replace(&mut self.state, State::Done) {
            State::Magic(mut magic) => {
                self.state = if magic.feed(byte)? {
                    State::Length(LengthPrefix::new(limits.size_limit))
                } else {
                    State::Magic(magic)
                };
                Ok(None)
            }
            State::Length(mut prefix) => {
                match prefix.feed(byte)? {
                    None => self.state = State::Length(prefix),
                    Some(0) => {
                        return Err(Error::CorruptStream("empty request body".into()));
                    }
                    Some(len) => self.state = State::Method(Budget::new(len), None),
                }
                Ok(None)
            }
            State::Method(mut budget, method) => {
                budget.spend("request")?;
                let mut method = match method {
                    Some(m) => m,
                    None => {
                        expect_kind(byte, Marker::Scalar, "request method")?;
                        ScalarParser::new()
                    }
                };
                match method.feed(byte)? {
                    _ if budget.is_spent() => Err(truncated("request")),
                    None => {
                        self.state = State::Method(budget, Some(method));
                        Ok(None)
                    }
                    Some(id) => {
                        self.state = State::Headers(budget, id.as_bits(), None);
                        Ok(None)
                    }
                }
            }
            State::Headers(mut budget, method_id, headers) => {
                budget.spend("request")?;
                let mut headers = match headers {
                    Some(h) => h,
                    None => {
                        expect_kind(byte, Marker::Map, "request headers")?;
                        Box::new(MapParser::new(limits))
                    }
                };
                match headers.feed(byte)? {
                    None if budget.is_spent() => Err(truncated("request")),
                    None => {
                        self.state = State::Headers(budget, method_id, Some(headers));
                        Ok(None)
                    }
                    Some(_) if !budget.is_spent() => Err(Error::CorruptStream(
                        "request length doesn't match its content".into(),
                    )),
                    Some(pairs) => Ok(Some(Request::new(method_id, headers_from_pairs(pairs)?))),
                }
            }
            State::Done => Err(Error::ParserFinished),
        }
    }

    fn reset(&mut self) {
        self.state = State::Magic(Magic::new(&REQUEST_MAGIC, "request"));
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::message::Headers;
    use crate::parser::test::feed_exact;

    fn sample() -> Request {
        let mut headers = Headers::new();
        headers.insert("RequestID".into(), "Hello!".into());
        headers.insert("Other".into(), "thing".into());
        Request::new(0x10_2030, headers)
    }

    #[test]
    fn golden() {
        let mut data = vec![0x79u8, 0x79, 0x72, 0x21, 0x34, 0x20, 0xc1, 0x2e, 0x21, 0x16, 0xa1, 0x12];
        data.extend_from_slice(b"RequestID");
        data.extend_from_slice(&[0x21, 0x10, 0xa1, 0x0c]);
        data.extend_from_slice(b"Hello!");
        let mut parser = RequestParser::default();
        let req = feed_exact(&mut parser, &data).unwrap();
        assert_eq!(req.method_id, 0);
        assert_eq!(req.headers.get("RequestID").map(String::as_str), Some("Hello!"));
        assert_eq!(parser.feed(0x79), Err(Error::ParserFinished));
    }

    #[test]
    fn agrees_with_encoder() {
        let mut buf = Vec::new();
        sample().encode(&mut buf).unwrap();
        let mut parser = RequestParser::default();
        assert_eq!(feed_exact(&mut parser, &buf).unwrap(), sample());
        parser.reset();
        assert_eq!(feed_exact(&mut parser, &buf).unwrap(), sample());
    }

    #[test]
    fn bad_magic_fails_fast() {
        let mut parser = RequestParser::default();
        assert!(!parser.is_started());
        assert!(matches!(parser.feed(b'0'), Err(Error::CorruptStream(_))));
    }

    #[test]
    fn started_after_magic() {
        let mut parser = RequestParser::default();
        parser.feed_slice(&REQUEST_MAGIC[..2]).unwrap();
        assert!(!parser.is_started());
        parser.feed(REQUEST_MAGIC[2]).unwrap();
        assert!(parser.is_started());
    }

    #[test]
    fn length_mismatch() {
        let mut buf = Vec::new();
        sample().encode(&mut buf).unwrap();
        let mut long = buf.clone();
        // The length scalar's continuation byte carries the low bits: add one byte, and supply it.
        long[4] += 2;
        long.push(0x00);
        let mut parser = RequestParser::default();
        assert!(matches!(
            parser.feed_slice(&long),
            Err(Error::CorruptStream(_))
        ));
        let mut short = buf;
        short[4] -= 2;
        parser.reset();
        assert!(matches!(
            parser.feed_slice(&short),
            Err(Error::CorruptStream(_))
        ));
    }

    #[test]
    fn empty_body() {
        let mut parser = RequestParser::default();
        assert!(matches!(
            parser.feed_slice(&[0x79, 0x79, 0x72, 0x20]),
            Err(Error::CorruptStream(_))
        ));
    }

    #[test]
    fn headers_must_be_strings() {
        // Body: method 0, then a map of {1: 2}.
        let data = [0x79u8, 0x79, 0x72, 0x2c, 0x20, 0xc8, 0x22, 0x22, 0x22, 0x24];
        let mut parser = RequestParser::default();
        assert!(matches!(
            parser.feed_slice(&data),
            Err(Error::Unconvertible { .. })
        ));
    }
}
