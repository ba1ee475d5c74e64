//! Decoding of complete, in-memory buffers.
//!
//! These read from a `&mut &[u8]`, advancing it past each value. For input that arrives a byte
//! at a time, use the incremental parsers in [`crate::parser`] instead; both accept exactly the
//! same encodings.

use byteorder::{LittleEndian, ReadBytesExt};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::marker::{Marker, FLOAT64_FLAG, FLOAT_ZERO_FLAG};
use crate::registry::Registry;
use crate::scalar::{self, decode_length};
use crate::typed::{self, TypedValue};
use crate::types::Type;
use crate::value::{EncodedStruct, Oneof, Value};
use crate::{MAX_DEPTH, SIZE_LIMIT};

/// Decode one self-describing value with the default limits.
pub fn decode_any(buf: &mut &[u8]) -> Result<Value> {
    Decoder::default().read_value(buf)
}

/// Decode one value and convert it into the declared type `ty`, using the registry's limits.
pub fn decode_as(buf: &mut &[u8], ty: &Type, registry: &Registry) -> Result<TypedValue> {
    Decoder::from_config(registry.config()).read_as(buf, ty, registry)
}

/// Decoder settings: the size ceiling and the nesting limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decoder {
    limit: u64,
    max_depth: usize,
}

impl Default for Decoder {
    fn default() -> Self {
        Self {
            limit: SIZE_LIMIT,
            max_depth: MAX_DEPTH,
        }
    }
}

fn take<'a>(buf: &mut &'a [u8], len: usize, step: &'static str) -> Result<&'a [u8]> {
    if buf.len() < len {
        return Err(Error::LengthTooShort {
            step,
            actual: buf.len(),
            expected: len,
        });
    }
    let data: &'a [u8] = *buf;
    let (head, tail) = data.split_at(len);
    *buf = tail;
    Ok(head)
}

fn read_header(buf: &mut &[u8], step: &'static str) -> Result<u8> {
    buf.read_u8().map_err(|_| Error::LengthTooShort {
        step,
        actual: 0,
        expected: 1,
    })
}

impl Decoder {
    pub fn new(limit: u64, max_depth: usize) -> Self {
        Self { limit, max_depth }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.size_limit, config.max_depth)
    }

    pub fn read_value(&self, buf: &mut &[u8]) -> Result<Value> {
        self.read_at(buf, 0)
    }

    /// Decode one value and convert it into the declared type `ty`.
    ///
    /// The header's kind must match the declared type before anything else is read.
    pub fn read_as(&self, buf: &mut &[u8], ty: &Type, registry: &Registry) -> Result<TypedValue> {
        let header = *buf.first().ok_or(Error::LengthTooShort {
            step: "decode header",
            actual: 0,
            expected: 1,
        })?;
        let marker = Marker::try_from_u8(header).ok_or(Error::InvalidTag(header))?;
        if marker != ty.marker() {
            return Err(Error::unconvertible(marker, ty));
        }
        let value = self.read_value(buf)?;
        typed::specialize(&value, ty, registry)
    }

    fn read_at(&self, buf: &mut &[u8], depth: usize) -> Result<Value> {
        if depth > self.max_depth {
            return Err(Error::ParseLimit(format!(
                "values nested deeper than {}",
                self.max_depth
            )));
        }
        let header = read_header(buf, "decode header")?;
        let marker = Marker::try_from_u8(header).ok_or(Error::InvalidTag(header))?;
        Ok(match marker {
            Marker::Void => Value::Void,
            Marker::Scalar => Value::Scalar(scalar::decode(header, buf)?),
            Marker::Float => read_float(header, buf)?,
            Marker::String => {
                let len = decode_length(header, buf, self.limit)?;
                let raw = take(buf, len, "decode string")?;
                let s = std::str::from_utf8(raw).map_err(|e| Error::BadUtf8(e.to_string()))?;
                Value::Str(s.to_string())
            }
            Marker::Array => {
                let len = decode_length(header, buf, self.limit)?;
                let mut body = take(buf, len, "decode array")?;
                let mut items = Vec::new();
                while !body.is_empty() {
                    items.push(self.read_at(&mut body, depth + 1)?);
                }
                Value::Array(items)
            }
            Marker::Map => {
                let len = decode_length(header, buf, self.limit)?;
                if len == 0 {
                    return Ok(Value::Map(Vec::new()));
                }
                let mut body = take(buf, len, "decode map")?;
                let keys = self.read_run(&mut body, depth, "decode map keys")?;
                let values = self.read_run(&mut body, depth, "decode map values")?;
                if !body.is_empty() {
                    return Err(Error::CorruptStream(format!(
                        "{} bytes left over after map values",
                        body.len()
                    )));
                }
                if keys.len() != values.len() {
                    return Err(Error::UnevenMap {
                        keys: keys.len(),
                        values: values.len(),
                    });
                }
                Value::Map(keys.into_iter().zip(values).collect())
            }
            Marker::Oneof => {
                let len = decode_length(header, buf, self.limit)?;
                if len == 0 {
                    return Ok(Value::Void);
                }
                let mut body = take(buf, len, "decode oneof")?;
                let h = read_header(&mut body, "decode oneof index")?;
                let index = scalar::decode(h, &mut body)?.as_bits();
                let value = self.read_at(&mut body, depth + 1)?;
                if !body.is_empty() {
                    return Err(Error::CorruptStream(format!(
                        "{} bytes left over after oneof value",
                        body.len()
                    )));
                }
                Value::Oneof(Oneof::new(index, value))
            }
            Marker::Struct => {
                let len = decode_length(header, buf, self.limit)?;
                if len == 0 {
                    return Ok(Value::Void);
                }
                let mut body = take(buf, len, "decode struct")?;
                let id = body
                    .read_u64::<LittleEndian>()
                    .map_err(|_| Error::LengthTooShort {
                        step: "decode struct id",
                        actual: len,
                        expected: 8,
                    })?;
                let mut fields = Vec::new();
                while !body.is_empty() {
                    fields.push(self.read_at(&mut body, depth + 1)?);
                }
                Value::Struct(EncodedStruct::new(id, fields))
            }
        })
    }

    /// A map run: its byte length as a scalar, then values filling exactly that many bytes.
    fn read_run(&self, buf: &mut &[u8], depth: usize, step: &'static str) -> Result<Vec<Value>> {
        let h = read_header(buf, step)?;
        let len = decode_length(h, buf, self.limit)?;
        let mut run = take(buf, len, step)?;
        let mut items = Vec::new();
        while !run.is_empty() {
            items.push(self.read_at(&mut run, depth + 1)?);
        }
        Ok(items)
    }
}

fn read_float(header: u8, buf: &mut &[u8]) -> Result<Value> {
    let wide = (header & FLOAT64_FLAG) != 0;
    if (header & FLOAT_ZERO_FLAG) != 0 {
        return Ok(if wide { Value::F64(0.0) } else { Value::F32(0.0) });
    }
    if wide {
        let v = buf.read_f64::<LittleEndian>().map_err(|_| Error::LengthTooShort {
            step: "decode f64",
            actual: buf.len(),
            expected: 8,
        })?;
        Ok(Value::F64(v))
    } else {
        let v = buf.read_f32::<LittleEndian>().map_err(|_| Error::LengthTooShort {
            step: "decode f32",
            actual: buf.len(),
            expected: 4,
        })?;
        Ok(Value::F32(v))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::encode::{encode_as, encode_value};
    use crate::scalar::Scalar;
    use rand::prelude::*;

    fn roundtrip(value: Value) {
        let mut buf = Vec::new();
        encode_value(&mut buf, &value).unwrap();
        let mut data = &buf[..];
        assert_eq!(decode_any(&mut data).unwrap(), value);
        assert!(data.is_empty());
    }

    #[test]
    fn void() {
        roundtrip(Value::Void);
        assert_eq!(decode_any(&mut &[0x05u8][..]), Err(Error::InvalidTag(0x05)));
    }

    #[test]
    fn empty_input() {
        assert!(matches!(
            decode_any(&mut &[][..]),
            Err(Error::LengthTooShort { .. })
        ));
    }

    mod float {
        use super::*;

        #[test]
        fn zero_forms() {
            assert_eq!(decode_any(&mut &[0x48u8][..]), Ok(Value::F32(0.0)));
            assert_eq!(decode_any(&mut &[0x58u8][..]), Ok(Value::F64(0.0)));
        }

        #[test]
        fn roundtrip_random() {
            let mut rng = rand::thread_rng();
            for _ in 0..100 {
                roundtrip(Value::F32(rng.gen_range(-1e6f32..1e6f32)));
                roundtrip(Value::F64(rng.gen::<f64>() * 1e300));
            }
        }

        #[test]
        fn truncated() {
            assert!(matches!(
                decode_any(&mut &[0x50u8, 0, 0, 0][..]),
                Err(Error::LengthTooShort { .. })
            ));
        }
    }

    mod string {
        use super::*;

        #[test]
        fn spec() {
            let mut data = vec![0xa1, 0x0c];
            data.extend_from_slice(b"Hello!");
            assert_eq!(decode_any(&mut &data[..]), Ok(Value::from("Hello!")));
        }

        #[test]
        fn bad_utf8() {
            let data = [0xa4u8, 0xc3, 0x28];
            assert!(matches!(decode_any(&mut &data[..]), Err(Error::BadUtf8(_))));
        }

        #[test]
        fn too_short() {
            let data = [0xa6u8, b'a'];
            assert!(matches!(
                decode_any(&mut &data[..]),
                Err(Error::LengthTooShort { .. })
            ));
        }

        #[test]
        fn size_limit() {
            let mut data = Vec::new();
            crate::scalar::encode_length(&mut data, Marker::String, SIZE_LIMIT as usize);
            assert_eq!(
                decode_any(&mut &data[..]),
                Err(Error::SizeTooLarge {
                    max: SIZE_LIMIT,
                    actual: SIZE_LIMIT
                })
            );
            let small = Decoder::new(4, MAX_DEPTH);
            let data = [0xa8u8, b'a', b'b', b'c', b'd'];
            assert!(matches!(
                small.read_value(&mut &data[..]),
                Err(Error::SizeTooLarge { max: 4, actual: 4 })
            ));
        }
    }

    mod array {
        use super::*;

        #[test]
        fn mixed() {
            roundtrip(Value::Array(vec![
                Value::Void,
                Value::Scalar(Scalar::from(-9i32)),
                Value::from("x"),
                Value::Array(Vec::new()),
                Value::F64(2.5),
            ]));
        }

        #[test]
        fn element_overruns_length() {
            // Declares 2 bytes, but the string inside needs 3.
            let data = [0x64u8, 0xa4, b'a', b'b'];
            assert!(matches!(
                decode_any(&mut &data[..]),
                Err(Error::LengthTooShort { .. })
            ));
        }

        #[test]
        fn depth_limit() {
            let mut value = Value::Array(Vec::new());
            for _ in 0..(MAX_DEPTH + 5) {
                value = Value::Array(vec![value]);
            }
            let mut buf = Vec::new();
            encode_value(&mut buf, &value).unwrap();
            assert!(matches!(decode_any(&mut &buf[..]), Err(Error::ParseLimit(_))));
        }
    }

    mod map {
        use super::*;

        #[test]
        fn spec() {
            let mut data = vec![0xc1, 0x26, 0x21, 0x10, 0xa1, 0x0c];
            data.extend_from_slice(b"Header");
            data.extend_from_slice(&[0x21, 0x0e, 0xa1, 0x0a]);
            data.extend_from_slice(b"Value");
            assert_eq!(
                decode_any(&mut &data[..]),
                Ok(Value::Map(vec![(Value::from("Header"), Value::from("Value"))]))
            );
        }

        #[test]
        fn float_keys() {
            roundtrip(Value::Map(vec![
                (Value::F32(1.5), Value::Scalar(Scalar::from(1u8))),
                (Value::F32(-3.0), Value::Scalar(Scalar::from(2u8))),
            ]));
        }

        #[test]
        fn uneven() {
            // Two keys, one value.
            let data = [0xc1u8, 0x0a, 0x24, 0x22, 0x24, 0x22, 0x20];
            assert_eq!(
                decode_any(&mut &data[..]),
                Err(Error::UnevenMap { keys: 2, values: 1 })
            );
        }
    }

    mod oneof {
        use super::*;

        #[test]
        fn empty_is_void() {
            assert_eq!(decode_any(&mut &[0xe0u8][..]), Ok(Value::Void));
        }

        #[test]
        fn populated() {
            roundtrip(Value::Oneof(Oneof::new(3, Value::from("member"))));
            roundtrip(Value::Oneof(Oneof::new(0, Value::Void)));
        }
    }

    mod structure {
        use super::*;

        #[test]
        fn id_is_little_endian() {
            let value = Value::Struct(EncodedStruct::new(
                0x0102030405060708,
                vec![Value::Scalar(Scalar::from(1u8))],
            ));
            let mut buf = Vec::new();
            encode_value(&mut buf, &value).unwrap();
            assert_eq!(&buf[2..10], &[8, 7, 6, 5, 4, 3, 2, 1]);
            roundtrip(value);
        }

        #[test]
        fn zero_size_is_void() {
            assert_eq!(decode_any(&mut &[0x80u8][..]), Ok(Value::Void));
        }

        #[test]
        fn short_id() {
            let data = [0x86u8, 1, 2, 3];
            assert!(matches!(
                decode_any(&mut &data[..]),
                Err(Error::LengthTooShort { .. })
            ));
        }
    }

    mod declared {
        use super::*;

        #[test]
        fn decode_as_checks_kind() {
            let reg = Registry::new();
            let mut buf = Vec::new();
            encode_as(&mut buf, &TypedValue::Int(-20), &Type::Int32, &reg).unwrap();
            assert_eq!(decode_as(&mut &buf[..], &Type::Int8, &reg), Ok(TypedValue::Int(-20)));
            assert!(matches!(
                decode_as(&mut &buf[..], &Type::String, &reg),
                Err(Error::Unconvertible { .. })
            ));
            assert!(decode_as(&mut &buf[..], &Type::Uint8, &reg).is_err());
        }
    }

    #[test]
    fn composite_size_limit() {
        let small = Decoder::new(4, MAX_DEPTH);
        for marker in [Marker::Array, Marker::Map, Marker::Oneof, Marker::Struct] {
            let mut data = Vec::new();
            crate::scalar::encode_length(&mut data, marker, 4);
            data.extend_from_slice(&[0x00; 4]);
            assert_eq!(
                small.read_value(&mut &data[..]),
                Err(Error::SizeTooLarge { max: 4, actual: 4 }),
                "{:?}",
                marker
            );
            let mut data = Vec::new();
            crate::scalar::encode_length(&mut data, marker, SIZE_LIMIT as usize);
            assert!(matches!(
                decode_any(&mut &data[..]),
                Err(Error::SizeTooLarge { .. })
            ));
        }
    }
}
