use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};
use crate::marker::{FLOAT64_FLAG, FLOAT_ZERO_FLAG};
use crate::value::Value;

use super::Feed;

/// Parses a 32 or 64-bit float. A zero float completes on its header byte.
#[derive(Clone, Debug, Default)]
pub struct FloatParser {
    wide: bool,
    started: bool,
    done: bool,
    data: [u8; 8],
    len: usize,
}

impl FloatParser {
    pub fn new() -> Self {
        Self::default()
    }

    fn width(&self) -> usize {
        if self.wide {
            8
        } else {
            4
        }
    }

    fn finish(&mut self, value: Value) -> Option<Value> {
        self.done = true;
        Some(value)
    }
}

impl Feed for FloatParser {
    type Output = Value;

    fn feed(&mut self, byte: u8) -> Result<Option<Value>> {
        if self.done {
            return Err(Error::ParserFinished);
        }
        if !self.started {
            self.started = true;
            self.wide = (byte & FLOAT64_FLAG) != 0;
            if (byte & FLOAT_ZERO_FLAG) != 0 {
                let zero = if self.wide {
                    Value::F64(0.0)
                } else {
                    Value::F32(0.0)
                };
                return Ok(self.finish(zero));
            }
            return Ok(None);
        }
        self.data[self.len] = byte;
        self.len += 1;
        if self.len < self.width() {
            return Ok(None);
        }
        let value = if self.wide {
            Value::F64(LittleEndian::read_f64(&self.data))
        } else {
            Value::F32(LittleEndian::read_f32(&self.data[..4]))
        };
        Ok(self.finish(value))
    }

    fn reset(&mut self) {
        self.wide = false;
        self.started = false;
        self.done = false;
        self.len = 0;
    }
}
