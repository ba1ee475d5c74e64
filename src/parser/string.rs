use crate::error::{Error, Result};

use super::{Feed, LengthPrefix};

/// Don't trust a declared string length for more than this much up-front allocation.
const MAX_RESERVE: usize = 1 << 16;

#[derive(Clone, Debug)]
enum State {
    Length(LengthPrefix),
    Data(usize),
    Done,
}

/// Parses a UTF-8 string: a length-carrying header, then that many bytes.
#[derive(Clone, Debug)]
pub struct StringParser {
    limit: u64,
    state: State,
    data: Vec<u8>,
}

impl Default for StringParser {
    fn default() -> Self {
        Self::new(crate::SIZE_LIMIT)
    }
}

impl StringParser {
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            state: State::Length(LengthPrefix::new(limit)),
            data: Vec::new(),
        }
    }

    fn finish(&mut self) -> Result<Option<String>> {
        self.state = State::Done;
        let data = std::mem::take(&mut self.data);
        String::from_utf8(data)
            .map(Some)
            .map_err(|e| Error::BadUtf8(e.utf8_error().to_string()))
    }
}

impl Feed for StringParser {
    type Output = String;

    fn feed(&mut self, byte: u8) -> Result<Option<String>> {
        match &mut self.state {
            State::Length(prefix) => {
                let Some(len) = prefix.feed(byte)? else {
                    return Ok(None);
                };
                if len == 0 {
                    return self.finish();
                }
                self.data.reserve(len.min(MAX_RESERVE));
                self.state = State::Data(len);
                Ok(None)
            }
            State::Data(len) => {
                let len = *len;
                self.data.push(byte);
                if self.data.len() < len {
                    return Ok(None);
                }
                self.finish()
            }
            State::Done => Err(Error::ParserFinished),
        }
    }

    fn reset(&mut self) {
        self.state = State::Length(LengthPrefix::new(self.limit));
        self.data.clear();
    }
}
