use std::fmt;

/// Wire kinds, selected by the top 3 bits of every value's header byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Marker {
    Void,
    Scalar,
    Float,
    Array,
    Struct,
    String,
    Map,
    Oneof,
}

/// Scalar header: set when the scalar is signed (or, for booleans, when it is true).
pub const SIGNED_FLAG: u8 = 0x10;
/// Float header: set for 64-bit floats, clear for 32-bit.
pub const FLOAT64_FLAG: u8 = 0x10;
/// Float header: the value is exactly 0.0 and no data bytes follow.
pub const FLOAT_ZERO_FLAG: u8 = 0x08;
/// Scalar bytes: another byte follows.
pub const CONTINUATION_FLAG: u8 = 0x01;

impl Marker {
    /// Read the kind out of a header byte. Every 3-bit pattern maps to a kind, so this can't
    /// fail; [`Marker::try_from_u8`] is the checked entry point the decoders use.
    pub fn from_u8(n: u8) -> Marker {
        match n >> 5 {
            0 => Marker::Void,
            1 => Marker::Scalar,
            2 => Marker::Float,
            3 => Marker::Array,
            4 => Marker::Struct,
            5 => Marker::String,
            6 => Marker::Map,
            _ => Marker::Oneof,
        }
    }

    /// Read the kind out of a header byte, rejecting bytes that don't start a value.
    ///
    /// A void value is exactly the zero byte; any other byte with void kind bits is invalid.
    pub fn try_from_u8(n: u8) -> Option<Marker> {
        match Marker::from_u8(n) {
            Marker::Void if n != 0 => None,
            m => Some(m),
        }
    }

    /// The kind bits, already shifted into place for OR-ing into a header byte.
    pub fn into_u8(self) -> u8 {
        let kind = match self {
            Marker::Void => 0,
            Marker::Scalar => 1,
            Marker::Float => 2,
            Marker::Array => 3,
            Marker::Struct => 4,
            Marker::String => 5,
            Marker::Map => 6,
            Marker::Oneof => 7,
        };
        kind << 5
    }

    pub fn name(&self) -> &'static str {
        match self {
            Marker::Void => "void",
            Marker::Scalar => "scalar",
            Marker::Float => "float",
            Marker::Array => "array",
            Marker::Struct => "struct",
            Marker::String => "string",
            Marker::Map => "map",
            Marker::Oneof => "oneof",
        }
    }
}

impl From<Marker> for u8 {
    fn from(val: Marker) -> u8 {
        val.into_u8()
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn kinds() {
        let expected = [
            (0x00, Marker::Void),
            (0x20, Marker::Scalar),
            (0x40, Marker::Float),
            (0x60, Marker::Array),
            (0x80, Marker::Struct),
            (0xa0, Marker::String),
            (0xc0, Marker::Map),
            (0xe0, Marker::Oneof),
        ];
        for (byte, marker) in expected {
            assert_eq!(Marker::try_from_u8(byte), Some(marker));
            assert_eq!(u8::from(marker), byte);
        }
    }

    #[test]
    fn low_bits_ignored() {
        assert_eq!(Marker::from_u8(0x3f), Marker::Scalar);
        assert_eq!(Marker::from_u8(0xc1), Marker::Map);
    }

    #[test]
    fn invalid_void() {
        for byte in 1..0x20u8 {
            assert!(Marker::try_from_u8(byte).is_none(), "0x{:x} should be invalid", byte);
        }
    }
}
