use crate::error::{Error, Result};
use crate::marker::{CONTINUATION_FLAG, SIGNED_FLAG};
use crate::scalar::{header_bits, push_group, Scalar};

use super::Feed;

/// Parses a variable-length scalar, starting from its header byte.
///
/// The kind bits of the header aren't checked, so the same parser reads the length prefixes
/// carried in string, array, map, oneof, and structure headers.
#[derive(Clone, Debug, Default)]
pub struct ScalarParser {
    value: u64,
    signed: bool,
    started: bool,
    done: bool,
}

impl ScalarParser {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Feed for ScalarParser {
    type Output = Scalar;

    fn feed(&mut self, byte: u8) -> Result<Option<Scalar>> {
        if self.done {
            return Err(Error::ParserFinished);
        }
        if self.started {
            self.value = push_group(self.value, byte)?;
        } else {
            self.started = true;
            self.value = header_bits(byte);
            self.signed = (byte & SIGNED_FLAG) != 0;
        }
        if (byte & CONTINUATION_FLAG) != 0 {
            return Ok(None);
        }
        self.done = true;
        Ok(Some(Scalar::new(self.signed, self.value)))
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parser::test::feed_exact;
    use crate::scalar::encode_integer;

    #[test]
    fn single_byte() {
        let mut parser = ScalarParser::new();
        assert_eq!(parser.feed(0x26).unwrap(), Some(Scalar::from(3u8)));
        assert_eq!(parser.feed(0x26), Err(Error::ParserFinished));
    }

    #[test]
    fn matches_encoder() {
        let cases: Vec<(u64, bool)> = vec![
            (0, false),
            (4, false),
            (128, false),
            (0xdead_beef, false),
            (u64::MAX, false),
            (-1i64 as u64, true),
            (i64::MIN as u64, true),
        ];
        let mut parser = ScalarParser::new();
        for (bits, signed) in cases {
            let mut buf = Vec::new();
            encode_integer(&mut buf, bits, signed);
            parser.reset();
            let out = feed_exact(&mut parser, &buf).unwrap();
            assert_eq!(out, Scalar::new(signed, bits));
        }
    }

    #[test]
    fn booleans() {
        let mut parser = ScalarParser::new();
        assert_eq!(parser.feed(0x30).unwrap().and_then(|s| s.as_bool()), Some(true));
        parser.reset();
        assert_eq!(parser.feed(0x20).unwrap().and_then(|s| s.as_bool()), Some(false));
    }

    #[test]
    fn overflow() {
        let mut parser = ScalarParser::new();
        let mut result = parser.feed(0x2f);
        for _ in 0..10 {
            result = parser.feed(0xff);
            if result.is_err() {
                break;
            }
        }
        assert_eq!(result, Err(Error::ScalarOverflow));
    }
}
