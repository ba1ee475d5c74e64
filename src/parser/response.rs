use crate::error::{Error, Result};
use crate::marker::Marker;
use crate::message::{headers_from_pairs, Headers, Response, RESPONSE_MAGIC};

use super::{expect_kind, Feed, Limits, Magic, MapParser, ScalarParser};

enum State {
    Magic(Magic),
    Headers(Option<Box<MapParser>>),
    Stream(Headers, ScalarParser),
    Done,
}

/// Parses a response frame: magic, headers, and whether a stream of values follows.
pub struct ResponseParser {
    limits: Limits,
    state: State,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new(Limits::default())
    }
}

impl ResponseParser {
    pub fn new(limits: Limits) -> Self {
        Self {
            limits,
            state: State::Magic(Magic::new(&RESPONSE_MAGIC, "response")),
        }
    }
}

impl Feed for ResponseParser {
    type Output = Response;

    fn feed(&mut self, byte: u8) -> Result<Option<Response>> {
        let limits = self.limits;
        match std::mem::replace(&mut self.state, State::Done) {
            State::Magic(mut magic) => {
                self.state = if magic.feed(byte)? {
                    State::Headers(None)
                } else {
                    State::Magic(magic)
                };
                Ok(None)
            }
            State::Headers(headers) => {
                let mut headers = match headers {
                    Some(h) => h,
                    None => {
                        expect_kind(byte, Marker::Map, "response headers")?;
                        Box::new(MapParser::new(limits))
                    }
                };
                self.state = match headers.feed(byte)? {
                    Some(pairs) => State::Stream(headers_from_pairs(pairs)?, ScalarParser::new()),
                    None => State::Headers(Some(headers)),
                };
                Ok(None)
            }
            State::Stream(headers, mut flag) => {
                expect_kind(byte, Marker::Scalar, "response stream flag")?;
                let flag = flag.feed(byte)?;
                match flag.and_then(|s| s.as_bool()) {
                    Some(stream) => Ok(Some(Response::new(headers, stream))),
                    None => Err(Error::CorruptStream(
                        "response stream flag isn't a boolean".into(),
                    )),
                }
            }
            State::Done => Err(Error::ParserFinished),
        }
    }

    fn reset(&mut self) {
        self.state = State::Magic(Magic::new(&RESPONSE_MAGIC, "response"));
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parser::test::feed_exact;

    #[test]
    fn golden() {
        let mut data = vec![0x79u8, 0x79, 0x52, 0xc1, 0x26, 0x21, 0x10, 0xa1, 0x0c];
        data.extend_from_slice(b"Header");
        data.extend_from_slice(&[0x21, 0x0e, 0xa1, 0x0a]);
        data.extend_from_slice(b"Value");
        data.push(0x30);
        let mut parser = ResponseParser::default();
        let resp = feed_exact(&mut parser, &data).unwrap();
        assert!(resp.stream);
        assert_eq!(resp.headers.get("Header").map(String::as_str), Some("Value"));
    }

    #[test]
    fn no_headers() {
        let mut parser = ResponseParser::default();
        let resp = feed_exact(&mut parser, &[0x79, 0x79, 0x52, 0xc0, 0x20]).unwrap();
        assert_eq!(resp, Response::new(Headers::new(), false));
    }

    #[test]
    fn flag_must_be_boolean() {
        let mut parser = ResponseParser::default();
        assert!(matches!(
            parser.feed_slice(&[0x79, 0x79, 0x52, 0xc0, 0x22]),
            Err(Error::CorruptStream(_))
        ));
    }

    #[test]
    fn request_magic_rejected() {
        let mut parser = ResponseParser::default();
        assert_eq!(parser.feed(0x79).unwrap(), None);
        assert_eq!(parser.feed(0x79).unwrap(), None);
        assert!(matches!(parser.feed(0x72), Err(Error::CorruptStream(_))));
    }
}
