use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};
use crate::value::{EncodedStruct, Value};

use super::{truncated, Budget, Feed, LengthPrefix, Limits, ValueParser};

const ID_LEN: usize = 8;

enum State {
    Length(LengthPrefix),
    Id(Budget),
    Fields(Budget),
    Done,
}

/// Parses a structure: a length-carrying header, the 8-byte little-endian type identifier,
/// then positional field values filling the rest of the length.
///
/// A zero-length structure completes as `None`.
pub struct EncodedStructParser {
    limits: Limits,
    depth: usize,
    state: State,
    id: [u8; ID_LEN],
    id_len: usize,
    current: Option<ValueParser>,
    fields: Vec<Value>,
}

impl Default for EncodedStructParser {
    fn default() -> Self {
        Self::new(Limits::default())
    }
}

impl EncodedStructParser {
    pub fn new(limits: Limits) -> Self {
        Self::nested(limits, 0)
    }

    pub(crate) fn nested(limits: Limits, depth: usize) -> Self {
        Self {
            limits,
            depth,
            state: State::Length(LengthPrefix::new(limits.size_limit)),
            id: [0; ID_LEN],
            id_len: 0,
            current: None,
            fields: Vec::new(),
        }
    }

    fn finish(&mut self) -> Option<Option<EncodedStruct>> {
        self.state = State::Done;
        let id = LittleEndian::read_u64(&self.id);
        Some(Some(EncodedStruct::new(id, std::mem::take(&mut self.fields))))
    }
}

impl Feed for EncodedStructParser {
    type Output = Option<EncodedStruct>;

    fn feed(&mut self, byte: u8) -> Result<Option<Option<EncodedStruct>>> {
        match &mut self.state {
            State::Length(prefix) => {
                let Some(len) = prefix.feed(byte)? else {
                    return Ok(None);
                };
                if len == 0 {
                    self.state = State::Done;
                    return Ok(Some(None));
                }
                if len < ID_LEN {
                    return Err(Error::LengthTooShort {
                        step: "parse struct id",
                        actual: len,
                        expected: ID_LEN,
                    });
                }
                self.state = State::Id(Budget::new(len));
                Ok(None)
            }
            State::Id(budget) => {
                budget.spend("struct")?;
                self.id[self.id_len] = byte;
                self.id_len += 1;
                if self.id_len < ID_LEN {
                    return Ok(None);
                }
                if budget.is_spent() {
                    return Ok(self.finish());
                }
                let budget = *budget;
                self.state = State::Fields(budget);
                Ok(None)
            }
            State::Fields(budget) => {
                budget.spend("struct")?;
                let spent = budget.is_spent();
                let (limits, depth) = (self.limits, self.depth + 1);
                let current = self
                    .current
                    .get_or_insert_with(|| ValueParser::nested(limits, depth));
                if let Some(field) = current.feed(byte)? {
                    self.current = None;
                    self.fields.push(field);
                }
                if !spent {
                    return Ok(None);
                }
                if self.current.is_some() {
                    return Err(truncated("struct"));
                }
                Ok(self.finish())
            }
            State::Done => Err(Error::ParserFinished),
        }
    }

    fn reset(&mut self) {
        self.state = State::Length(LengthPrefix::new(self.limits.size_limit));
        self.id = [0; ID_LEN];
        self.id_len = 0;
        self.current = None;
        self.fields.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::encode::encode_value;
    use crate::parser::test::feed_exact;
    use crate::scalar::Scalar;

    #[test]
    fn zero_size() {
        let mut parser = EncodedStructParser::default();
        assert_eq!(parser.feed(0x80).unwrap(), Some(None));
        assert_eq!(parser.feed(0x80), Err(Error::ParserFinished));
    }

    #[test]
    fn id_only() {
        let data = [0x81u8, 0x10, 8, 7, 6, 5, 4, 3, 2, 1];
        let mut parser = EncodedStructParser::default();
        let out = feed_exact(&mut parser, &data).unwrap().unwrap();
        assert_eq!(out.id, 0x0102_0304_0506_0708);
        assert!(out.fields.is_empty());
    }

    #[test]
    fn fields() {
        let value = EncodedStruct::new(
            0x0102_0304_0506_0708,
            vec![
                Value::Scalar(Scalar::from(-2i8)),
                Value::Void,
                Value::Array(vec![Value::from("x")]),
            ],
        );
        let mut buf = Vec::new();
        encode_value(&mut buf, &Value::Struct(value.clone())).unwrap();
        let mut parser = EncodedStructParser::default();
        assert_eq!(feed_exact(&mut parser, &buf).unwrap(), Some(value));
    }

    #[test]
    fn short_id() {
        let mut parser = EncodedStructParser::default();
        assert!(matches!(
            parser.feed(0x88),
            Err(Error::LengthTooShort { expected: 8, .. })
        ));
    }

    #[test]
    fn size_limit() {
        let limits = Limits {
            size_limit: 4,
            ..Limits::default()
        };
        let mut header = Vec::new();
        crate::scalar::encode_length(&mut header, crate::marker::Marker::Struct, 4);
        let mut parser = EncodedStructParser::new(limits);
        assert!(matches!(
            parser.feed_slice(&header),
            Err(Error::SizeTooLarge { max: 4, actual: 4 })
        ));
    }
}
