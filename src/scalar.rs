use std::convert::TryFrom;
use std::fmt::{self, Debug, Display};

use byteorder::ReadBytesExt;

use crate::error::{Error, Result};
use crate::marker::{Marker, CONTINUATION_FLAG, SIGNED_FLAG};

/// Scratch space for an encoded scalar. A 64-bit value needs at most 10 bytes.
const MAX_LEN: usize = 16;

/// A decoded variable-length integer: 64 bits of magnitude, plus whether the sender marked it
/// as signed.
///
/// Signed scalars are the two's-complement reinterpretation of the magnitude bits; the sign never
/// changes how those bits are encoded. A zero-magnitude scalar doubles as a boolean, with the
/// signed flag carrying the value.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Scalar {
    signed: bool,
    bits: u64,
}

impl Scalar {
    pub fn new(signed: bool, bits: u64) -> Scalar {
        Scalar { signed, bits }
    }

    pub fn from_bool(v: bool) -> Scalar {
        Scalar {
            signed: v,
            bits: 0,
        }
    }

    #[inline]
    pub fn is_signed(&self) -> bool {
        self.signed
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.bits == 0
    }

    /// The raw 64 magnitude bits, ignoring sign.
    #[inline]
    pub fn as_bits(&self) -> u64 {
        self.bits
    }

    /// Returns the value as `u64`, if it is unsigned or a non-negative signed value.
    pub fn as_u64(&self) -> Option<u64> {
        if self.signed && (self.bits as i64) < 0 {
            None
        } else {
            Some(self.bits)
        }
    }

    /// Returns the value as `i64`, if it is signed or an unsigned value that fits.
    pub fn as_i64(&self) -> Option<i64> {
        if self.signed {
            Some(self.bits as i64)
        } else {
            i64::try_from(self.bits).ok()
        }
    }

    /// Returns the value as `f64`, possibly losing precision.
    pub fn as_f64(&self) -> f64 {
        if self.signed {
            self.bits as i64 as f64
        } else {
            self.bits as f64
        }
    }

    /// Interpret as a boolean. Only zero-magnitude scalars are booleans.
    pub fn as_bool(&self) -> Option<bool> {
        if self.bits == 0 {
            Some(self.signed)
        } else {
            None
        }
    }
}

impl Debug for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.signed {
            write!(f, "Scalar({}i)", self.bits as i64)
        } else {
            write!(f, "Scalar({}u)", self.bits)
        }
    }
}

impl Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.signed {
            Display::fmt(&(self.bits as i64), f)
        } else {
            Display::fmt(&self.bits, f)
        }
    }
}

macro_rules! impl_from_unsigned {
    ($t: ty) => {
        impl From<$t> for Scalar {
            fn from(n: $t) -> Self {
                Scalar {
                    signed: false,
                    bits: n as u64,
                }
            }
        }
    };
}

macro_rules! impl_from_signed {
    ($t: ty) => {
        impl From<$t> for Scalar {
            fn from(n: $t) -> Self {
                Scalar {
                    signed: true,
                    bits: n as i64 as u64,
                }
            }
        }
    };
}

impl_from_unsigned!(u8);
impl_from_unsigned!(u16);
impl_from_unsigned!(u32);
impl_from_unsigned!(u64);
impl_from_signed!(i8);
impl_from_signed!(i16);
impl_from_signed!(i32);
impl_from_signed!(i64);

macro_rules! impl_try_from {
    ($t: ty) => {
        impl TryFrom<Scalar> for $t {
            type Error = Scalar;
            fn try_from(v: Scalar) -> Result<Self, Self::Error> {
                if v.signed {
                    TryFrom::try_from(v.bits as i64).map_err(|_| v)
                } else {
                    TryFrom::try_from(v.bits).map_err(|_| v)
                }
            }
        }
    };
}

impl_try_from!(u8);
impl_try_from!(u16);
impl_try_from!(u32);
impl_try_from!(u64);
impl_try_from!(i8);
impl_try_from!(i16);
impl_try_from!(i32);
impl_try_from!(i64);

/// The encoded form of a scalar's magnitude.
///
/// Groups of 7 bits are taken from the low end of the value and written into the scratch buffer
/// from its end, so only the occupied suffix is emitted. Every byte but the last has its
/// continuation bit set. The first byte keeps its top 4 bits free for the kind and signed flag,
/// which the caller ORs in.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VarScalar {
    n: [u8; MAX_LEN],
    start: usize,
}

impl VarScalar {
    pub fn from_u64(value: u64) -> VarScalar {
        let mut n = [0u8; MAX_LEN];
        let mut pos = MAX_LEN - 1;
        let mut value = value;
        while value > 3 {
            n[pos] = ((value & 0x7f) as u8) << 1;
            if pos != MAX_LEN - 1 {
                n[pos] |= CONTINUATION_FLAG;
            }
            pos -= 1;
            value >>= 7;
        }
        n[pos] = ((value as u8) << 1) & 0x7;
        if pos < MAX_LEN - 1 {
            n[pos] |= CONTINUATION_FLAG;
        }
        VarScalar { n, start: pos }
    }

    pub fn len(&self) -> usize {
        MAX_LEN - self.start
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.n[self.start..]
    }

    /// Write out, OR-ing `header` into the first byte.
    pub fn write(&self, buf: &mut Vec<u8>, header: u8) {
        buf.push(self.n[self.start] | header);
        buf.extend_from_slice(&self.n[self.start + 1..]);
    }
}

/// Append one continuation byte's 7 value bits to an accumulated magnitude.
pub(crate) fn push_group(value: u64, byte: u8) -> Result<u64> {
    if value > (u64::MAX >> 7) {
        return Err(Error::ScalarOverflow);
    }
    Ok((value << 7) | (byte >> 1) as u64)
}

/// The value bits carried by a header byte.
#[inline]
pub(crate) fn header_bits(header: u8) -> u64 {
    ((header & 0x0e) >> 1) as u64
}

/// Decode a scalar whose header byte has already been read.
pub fn decode(header: u8, buf: &mut &[u8]) -> Result<Scalar> {
    let mut value = header_bits(header);
    let signed = (header & SIGNED_FLAG) == SIGNED_FLAG;
    if (header & CONTINUATION_FLAG) == CONTINUATION_FLAG {
        loop {
            let byte = buf.read_u8().map_err(|_| Error::LengthTooShort {
                step: "decode scalar continuation",
                actual: 0,
                expected: 1,
            })?;
            value = push_group(value, byte)?;
            if (byte & CONTINUATION_FLAG) == 0 {
                break;
            }
        }
    }
    Ok(Scalar::new(signed, value))
}

/// Decode a length prefix: a scalar that may not reach `limit`.
pub(crate) fn decode_length(header: u8, buf: &mut &[u8], limit: u64) -> Result<usize> {
    let len = decode(header, buf)?.as_bits();
    check_length(len, limit)
}

pub(crate) fn check_length(len: u64, limit: u64) -> Result<usize> {
    if len >= limit {
        return Err(Error::SizeTooLarge {
            max: limit,
            actual: len,
        });
    }
    usize::try_from(len).map_err(|_| Error::SizeTooLarge {
        max: limit,
        actual: len,
    })
}

/// Encode a self-describing integer scalar.
pub fn encode_integer(buf: &mut Vec<u8>, value: u64, signed: bool) {
    let header = Marker::Scalar.into_u8() | if signed { SIGNED_FLAG } else { 0 };
    VarScalar::from_u64(value).write(buf, header);
}

/// Encode a boolean as a zero-magnitude scalar.
pub fn encode_boolean(buf: &mut Vec<u8>, value: bool) {
    buf.push(Marker::Scalar.into_u8() | if value { SIGNED_FLAG } else { 0 });
}

/// Encode a length prefix for a value of the given kind.
pub fn encode_length(buf: &mut Vec<u8>, marker: Marker, len: usize) {
    VarScalar::from_u64(len as u64).write(buf, marker.into_u8());
}

/// Length of a self-describing integer scalar, without encoding it.
pub fn encoded_len(value: u64) -> usize {
    VarScalar::from_u64(value).len()
}
