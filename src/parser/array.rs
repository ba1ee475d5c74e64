use crate::error::{Error, Result};
use crate::value::Value;

use super::{truncated, Budget, Feed, LengthPrefix, Limits, ValueParser};

enum State {
    Length(LengthPrefix),
    Body(Budget),
    Done,
}

/// Parses an array: a length-carrying header, then values filling exactly that many bytes.
pub struct ArrayParser {
    limits: Limits,
    depth: usize,
    state: State,
    current: Option<ValueParser>,
    items: Vec<Value>,
}

impl Default for ArrayParser {
    fn default() -> Self {
        Self::new(Limits::default())
    }
}

impl ArrayParser {
    pub fn new(limits: Limits) -> Self {
        Self::nested(limits, 0)
    }

    pub(crate) fn nested(limits: Limits, depth: usize) -> Self {
        Self {
            limits,
            depth,
            state: State::Length(LengthPrefix::new(limits.size_limit)),
            current: None,
            items: Vec::new(),
        }
    }

    fn finish(&mut self) -> Option<Vec<Value>> {
        self.state = State::Done;
        Some(std::mem::take(&mut self.items))
    }
}

impl Feed for ArrayParser {
    type Output = Vec<Value>;

    fn feed(&mut self, byte: u8) -> Result<Option<Vec<Value>>> {
        match &mut self.state {
            State::Length(prefix) => {
                let Some(len) = prefix.feed(byte)? else {
                    return Ok(None);
                };
                if len == 0 {
                    return Ok(self.finish());
                }
                self.state = State::Body(Budget::new(len));
                Ok(None)
            }
            State::Body(budget) => {
                budget.spend("array")?;
                let spent = budget.is_spent();
                let (limits, depth) = (self.limits, self.depth + 1);
                let current = self
                    .current
                    .get_or_insert_with(|| ValueParser::nested(limits, depth));
                if let Some(item) = current.feed(byte)? {
                    self.current = None;
                    self.items.push(item);
                }
                if !spent {
                    return Ok(None);
                }
                if self.current.is_some() {
                    return Err(truncated("array"));
                }
                Ok(self.finish())
            }
            State::Done => Err(Error::ParserFinished),
        }
    }

    fn reset(&mut self) {
        self.state = State::Length(LengthPrefix::new(self.limits.size_limit));
        self.current = None;
        self.items.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::encode::encode_value;
    use crate::parser::test::feed_exact;
    use crate::scalar::Scalar;

    #[test]
    fn empty() {
        let mut parser = ArrayParser::default();
        assert_eq!(parser.feed(0x60).unwrap(), Some(Vec::new()));
        assert_eq!(parser.feed(0x60), Err(Error::ParserFinished));
    }

    #[test]
    fn nested() {
        let value = Value::Array(vec![
            Value::from("a"),
            Value::Array(vec![Value::Void, Value::Scalar(Scalar::from(500u32))]),
            Value::Array(Vec::new()),
            Value::F64(2.5),
        ]);
        let mut buf = Vec::new();
        encode_value(&mut buf, &value).unwrap();
        let mut parser = ArrayParser::default();
        let items = feed_exact(&mut parser, &buf).unwrap();
        assert_eq!(Value::Array(items), value);
    }

    #[test]
    fn element_outruns_length() {
        // Declares 2 bytes, but the string inside needs 3.
        let data = [0x64u8, 0xa4, b'h', b'i'];
        let mut parser = ArrayParser::default();
        assert!(matches!(
            parser.feed_slice(&data),
            Err(Error::CorruptStream(_))
        ));
    }

    #[test]
    fn reset_reuses() {
        let mut parser = ArrayParser::default();
        assert_eq!(
            parser.feed_slice(&[0x62, 0x00]).unwrap(),
            Some((vec![Value::Void], 2))
        );
        parser.reset();
        assert_eq!(
            parser.feed_slice(&[0x64, 0x22, 0x24]).unwrap(),
            Some((
                vec![
                    Value::Scalar(Scalar::from(1u8)),
                    Value::Scalar(Scalar::from(2u8))
                ],
                3
            ))
        );
    }

    #[test]
    fn size_limit() {
        let limits = Limits {
            size_limit: 4,
            ..Limits::default()
        };
        let mut header = Vec::new();
        crate::scalar::encode_length(&mut header, crate::marker::Marker::Array, 4);
        let mut parser = ArrayParser::new(limits);
        assert!(matches!(
            parser.feed_slice(&header),
            Err(Error::SizeTooLarge { max: 4, actual: 4 })
        ));
    }
}
