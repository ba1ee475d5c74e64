use crate::error::{Error, Result};
use crate::value::Value;

use super::{truncated, Budget, Feed, LengthPrefix, Limits, ValueParser};

enum Stage {
    KeyLength(LengthPrefix),
    Keys(Budget),
    ValueLength(LengthPrefix),
    Values(Budget),
}

enum State {
    Length(LengthPrefix),
    Body(Budget, Stage),
    Done,
}

/// Parses a map.
///
/// The body holds two runs, each a byte length followed by values filling exactly that many
/// bytes: first every key, then every value. Keys pair with values by position.
pub struct MapParser {
    limits: Limits,
    depth: usize,
    state: State,
    current: Option<ValueParser>,
    keys: Vec<Value>,
    values: Vec<Value>,
}

impl Default for MapParser {
    fn default() -> Self {
        Self::new(Limits::default())
    }
}

impl MapParser {
    pub fn new(limits: Limits) -> Self {
        Self::nested(limits, 0)
    }

    pub(crate) fn nested(limits: Limits, depth: usize) -> Self {
        Self {
            limits,
            depth,
            state: State::Length(LengthPrefix::new(limits.size_limit)),
            current: None,
            keys: Vec::new(),
            values: Vec::new(),
        }
    }

    fn finish(&mut self) -> Result<Option<Vec<(Value, Value)>>> {
        self.state = State::Done;
        let keys = std::mem::take(&mut self.keys);
        let values = std::mem::take(&mut self.values);
        if keys.len() != values.len() {
            return Err(Error::UnevenMap {
                keys: keys.len(),
                values: values.len(),
            });
        }
        Ok(Some(keys.into_iter().zip(values).collect()))
    }

    /// Feed one byte of a run. Returns true once the run is complete.
    fn feed_run(&mut self, run: &mut Budget, byte: u8, keys: bool) -> Result<bool> {
        run.spend("map run")?;
        let (limits, depth) = (self.limits, self.depth + 1);
        let current = self
            .current
            .get_or_insert_with(|| ValueParser::nested(limits, depth));
        if let Some(item) = current.feed(byte)? {
            self.current = None;
            if keys {
                self.keys.push(item);
            } else {
                self.values.push(item);
            }
        }
        if !run.is_spent() {
            return Ok(false);
        }
        if self.current.is_some() {
            return Err(truncated("map run"));
        }
        Ok(true)
    }

    /// Advance the body by one byte, returning the stage that follows, or `None` once the value
    /// run has completed.
    fn advance(&mut self, stage: Stage, byte: u8) -> Result<Option<Stage>> {
        let limit = self.limits.size_limit;
        Ok(match stage {
            Stage::KeyLength(mut prefix) => match prefix.feed(byte)? {
                None => Some(Stage::KeyLength(prefix)),
                Some(0) => Some(Stage::ValueLength(LengthPrefix::new(limit))),
                Some(len) => Some(Stage::Keys(Budget::new(len))),
            },
            Stage::Keys(mut run) => {
                if self.feed_run(&mut run, byte, true)? {
                    Some(Stage::ValueLength(LengthPrefix::new(limit)))
                } else {
                    Some(Stage::Keys(run))
                }
            }
            Stage::ValueLength(mut prefix) => match prefix.feed(byte)? {
                None => Some(Stage::ValueLength(prefix)),
                Some(0) => None,
                Some(len) => Some(Stage::Values(Budget::new(len))),
            },
            Stage::Values(mut run) => {
                if self.feed_run(&mut run, byte, false)? {
                    None
                } else {
                    Some(Stage::Values(run))
                }
            }
        })
    }
}

impl Feed for MapParser {
    type Output = Vec<(Value, Value)>;

    fn feed(&mut self, byte: u8) -> Result<Option<Vec<(Value, Value)>>> {
        match std::mem::replace(&mut self.state, State::Done) {
            State::Length(mut prefix) => match prefix.feed(byte)? {
                None => {
                    self.state = State::Length(prefix);
                    Ok(None)
                }
                Some(0) => self.finish(),
                Some(len) => {
                    let limit = self.limits.size_limit;
                    self.state =
                        State::Body(Budget::new(len), Stage::KeyLength(LengthPrefix::new(limit)));
                    Ok(None)
                }
            },
            State::Body(mut total, stage) => {
                total.spend("map")?;
                match self.advance(stage, byte)? {
                    Some(_) if total.is_spent() => Err(truncated("map")),
                    Some(next) => {
                        self.state = State::Body(total, next);
                        Ok(None)
                    }
                    None if !total.is_spent() => Err(Error::CorruptStream(
                        "bytes left over after map values".into(),
                    )),
                    None => self.finish(),
                }
            }
            State::Done => Err(Error::ParserFinished),
        }
    }

    fn reset(&mut self) {
        self.state = State::Length(LengthPrefix::new(self.limits.size_limit));
        self.current = None;
        self.keys.clear();
        self.values.clear();
    }
}
