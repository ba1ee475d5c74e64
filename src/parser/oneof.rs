use crate::error::{Error, Result};
use crate::value::Oneof;

use super::{truncated, Budget, Feed, LengthPrefix, Limits, ScalarParser, ValueParser};

enum State {
    Length(LengthPrefix),
    Index(Budget, ScalarParser),
    Value(Budget, u64, ValueParser),
    Done,
}

/// Parses a oneof: a length-carrying header, then the member index and its value.
///
/// A zero-length oneof has no member set, and completes as `None`.
pub struct OneofParser {
    limits: Limits,
    depth: usize,
    state: State,
}

impl Default for OneofParser {
    fn default() -> Self {
        Self::new(Limits::default())
    }
}

impl OneofParser {
    pub fn new(limits: Limits) -> Self {
        Self::nested(limits, 0)
    }

    pub(crate) fn nested(limits: Limits, depth: usize) -> Self {
        Self {
            limits,
            depth,
            state: State::Length(LengthPrefix::new(limits.size_limit)),
        }
    }
}

impl Feed for OneofParser {
    type Output = Option<Oneof>;

    fn feed(&mut self, byte: u8) -> Result<Option<Option<Oneof>>> {
        let (limits, depth) = (self.limits, self.depth + 1);
        match std::mem::replace(&mut self.state, State::Done) {
            State::Length(mut prefix) => match prefix.feed(byte)? {
                None => {
                    self.state = State::Length(prefix);
                    Ok(None)
                }
                Some(0) => Ok(Some(None)),
                Some(len) => {
                    self.state = State::Index(Budget::new(len), ScalarParser::new());
                    Ok(None)
                }
            },
            State::Index(mut budget, mut index) => {
                budget.spend("oneof")?;
                match index.feed(byte)? {
                    Some(_) if budget.is_spent() => Err(truncated("oneof")),
                    Some(index) => {
                        let value = ValueParser::nested(limits, depth);
                        self.state = State::Value(budget, index.as_bits(), value);
                        Ok(None)
                    }
                    None if budget.is_spent() => Err(truncated("oneof")),
                    None => {
                        self.state = State::Index(budget, index);
                        Ok(None)
                    }
                }
            }
            State::Value(mut budget, index, mut value) => {
                budget.spend("oneof")?;
                match value.feed(byte)? {
                    Some(_) if !budget.is_spent() => Err(Error::CorruptStream(
                        "bytes left over after oneof value".into(),
                    )),
                    Some(value) => Ok(Some(Some(Oneof::new(index, value)))),
                    None if budget.is_spent() => Err(truncated("oneof")),
                    None => {
                        self.state = State::Value(budget, index, value);
                        Ok(None)
                    }
                }
            }
            State::Done => Err(Error::ParserFinished),
        }
    }

    fn reset(&mut self) {
        self.state = State::Length(LengthPrefix::new(self.limits.size_limit));
    }
}
