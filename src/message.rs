//! Request, response, and error frames.
//!
//! Each frame opens with a 3-byte magic. A request carries a method identifier and string
//! headers. A response carries string headers and whether the result will be streamed; the
//! result value (or stream of values) follows it. An error carries its kind, headers, an
//! identifier, and string user data.

use std::collections::BTreeMap;
use std::fmt;

use byteorder::ReadBytesExt;

use crate::decode::Decoder;
use crate::encode::{encode_empty, encode_map_runs, encode_string};
use crate::error::{Error, Result};
use crate::marker::Marker;
use crate::scalar::{self, encode_boolean, encode_integer};
use crate::value::Value;

pub const REQUEST_MAGIC: [u8; 3] = [0x79, 0x79, 0x72];
pub const RESPONSE_MAGIC: [u8; 3] = [0x79, 0x79, 0x52];
pub const ERROR_MAGIC: [u8; 3] = [0x79, 0x79, 0x65];

/// String-to-string headers, as carried by every frame.
pub type Headers = BTreeMap<String, String>;

pub(crate) fn encode_headers(buf: &mut Vec<u8>, headers: &Headers) -> Result<()> {
    if headers.is_empty() {
        encode_empty(buf, Marker::Map);
        return Ok(());
    }
    let mut keys = Vec::new();
    let mut values = Vec::new();
    for (k, v) in headers {
        encode_string(&mut keys, k)?;
        encode_string(&mut values, v)?;
    }
    encode_map_runs(buf, &keys, &values)
}

/// Convert a decoded map into headers. Every key and value must be a string.
pub(crate) fn headers_from_pairs(pairs: Vec<(Value, Value)>) -> Result<Headers> {
    pairs
        .into_iter()
        .map(|pair| match pair {
            (Value::Str(k), Value::Str(v)) => Ok((k, v)),
            (k, v) => Err(Error::unconvertible((k, v), "string header")),
        })
        .collect()
}

fn decode_headers(buf: &mut &[u8]) -> Result<Headers> {
    match Decoder::default().read_value(buf)? {
        Value::Map(pairs) => headers_from_pairs(pairs),
        v => Err(Error::CorruptStream(format!("expected a header map, found {}", v))),
    }
}

fn check_magic(buf: &mut &[u8], magic: &[u8; 3], frame: &str) -> Result<()> {
    let data: &[u8] = *buf;
    if data.len() < magic.len() || &data[..magic.len()] != magic {
        return Err(Error::CorruptStream(format!("missing {} magic", frame)));
    }
    *buf = &data[magic.len()..];
    Ok(())
}

fn read_scalar(buf: &mut &[u8], step: &'static str) -> Result<scalar::Scalar> {
    let header = buf.read_u8().map_err(|_| Error::LengthTooShort {
        step,
        actual: 0,
        expected: 1,
    })?;
    scalar::decode(header, buf)
}

/// A call to a method, identified by number.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Request {
    pub method_id: u64,
    pub headers: Headers,
}

impl Request {
    pub fn new(method_id: u64, headers: Headers) -> Self {
        Self { method_id, headers }
    }

    /// Magic, then the byte length of the rest of the frame, then the method id and headers.
    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        let mut body = Vec::new();
        encode_integer(&mut body, self.method_id, false);
        encode_headers(&mut body, &self.headers)?;
        buf.extend_from_slice(&REQUEST_MAGIC);
        encode_integer(buf, body.len() as u64, false);
        buf.extend_from_slice(&body);
        Ok(())
    }

    pub fn decode(buf: &mut &[u8]) -> Result<Self> {
        check_magic(buf, &REQUEST_MAGIC, "request")?;
        let len = scalar::check_length(read_scalar(buf, "request length")?.as_bits(), crate::SIZE_LIMIT)?;
        if buf.len() < len {
            return Err(Error::LengthTooShort {
                step: "request body",
                actual: buf.len(),
                expected: len,
            });
        }
        let data: &[u8] = *buf;
        let (mut body, rest) = data.split_at(len);
        let method_id = read_scalar(&mut body, "request method")?.as_bits();
        let headers = decode_headers(&mut body)?;
        if !body.is_empty() {
            return Err(Error::CorruptStream(
                "request length doesn't match its content".into(),
            ));
        }
        *buf = rest;
        Ok(Self { method_id, headers })
    }
}

/// Opens a successful response. The result value, or the stream of result values, follows.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Response {
    pub headers: Headers,
    pub stream: bool,
}

impl Response {
    pub fn new(headers: Headers, stream: bool) -> Self {
        Self { headers, stream }
    }

    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(&RESPONSE_MAGIC);
        encode_headers(buf, &self.headers)?;
        encode_boolean(buf, self.stream);
        Ok(())
    }

    pub fn decode(buf: &mut &[u8]) -> Result<Self> {
        check_magic(buf, &RESPONSE_MAGIC, "response")?;
        let headers = decode_headers(buf)?;
        let stream = read_scalar(buf, "response stream flag")?
            .as_bool()
            .ok_or_else(|| Error::CorruptStream("response stream flag isn't a boolean".into()))?;
        Ok(Self { headers, stream })
    }
}

/// The kinds of failure a peer can report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InternalError,
    ManagedError,
    RequestTimeout,
    UnimplementedMethod,
    TypeMismatch,
    Unauthorized,
    BadRequest,
    /// A kind this implementation doesn't know about.
    Other(u64),
}

impl ErrorKind {
    pub fn from_u64(v: u64) -> ErrorKind {
        match v {
            0 => ErrorKind::InternalError,
            1 => ErrorKind::ManagedError,
            2 => ErrorKind::RequestTimeout,
            3 => ErrorKind::UnimplementedMethod,
            4 => ErrorKind::TypeMismatch,
            5 => ErrorKind::Unauthorized,
            6 => ErrorKind::BadRequest,
            v => ErrorKind::Other(v),
        }
    }

    pub fn as_u64(&self) -> u64 {
        match *self {
            ErrorKind::InternalError => 0,
            ErrorKind::ManagedError => 1,
            ErrorKind::RequestTimeout => 2,
            ErrorKind::UnimplementedMethod => 3,
            ErrorKind::TypeMismatch => 4,
            ErrorKind::Unauthorized => 5,
            ErrorKind::BadRequest => 6,
            ErrorKind::Other(v) => v,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::InternalError => "internal_error",
            ErrorKind::ManagedError => "managed_error",
            ErrorKind::RequestTimeout => "request_timeout",
            ErrorKind::UnimplementedMethod => "unimplemented_method",
            ErrorKind::TypeMismatch => "type_mismatch",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::Other(_) => "invalid",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A failure reported to (or by) a peer, in place of a response.
///
/// Handlers return these to fail a call; the connection driver sends them as error frames.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtocolError {
    pub kind: ErrorKind,
    pub headers: Headers,
    pub identifier: String,
    pub user_data: Headers,
}

impl ProtocolError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            headers: Headers::new(),
            identifier: String::new(),
            user_data: Headers::new(),
        }
    }

    pub fn internal_error() -> Self {
        Self::new(ErrorKind::InternalError)
    }

    /// An application-defined failure, named by `identifier`.
    pub fn managed(identifier: impl Into<String>) -> Self {
        Self::new(ErrorKind::ManagedError).with_identifier(identifier)
    }

    pub fn request_timeout() -> Self {
        Self::new(ErrorKind::RequestTimeout)
    }

    pub fn unimplemented_method() -> Self {
        Self::new(ErrorKind::UnimplementedMethod)
    }

    pub fn type_mismatch() -> Self {
        Self::new(ErrorKind::TypeMismatch)
    }

    pub fn unauthorized() -> Self {
        Self::new(ErrorKind::Unauthorized)
    }

    pub fn bad_request() -> Self {
        Self::new(ErrorKind::BadRequest)
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_user_data(mut self, user_data: Headers) -> Self {
        self.user_data = user_data;
        self
    }

    pub fn is_internal_error(&self) -> bool {
        self.kind == ErrorKind::InternalError
    }

    pub fn is_managed_error(&self) -> bool {
        self.kind == ErrorKind::ManagedError
    }

    pub fn is_request_timeout(&self) -> bool {
        self.kind == ErrorKind::RequestTimeout
    }

    pub fn is_unimplemented_method(&self) -> bool {
        self.kind == ErrorKind::UnimplementedMethod
    }

    pub fn is_type_mismatch(&self) -> bool {
        self.kind == ErrorKind::TypeMismatch
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind == ErrorKind::Unauthorized
    }

    pub fn is_bad_request(&self) -> bool {
        self.kind == ErrorKind::BadRequest
    }

    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(&ERROR_MAGIC);
        encode_integer(buf, self.kind.as_u64(), false);
        encode_headers(buf, &self.headers)?;
        encode_string(buf, &self.identifier)?;
        encode_headers(buf, &self.user_data)
    }

    pub fn decode(buf: &mut &[u8]) -> Result<Self> {
        check_magic(buf, &ERROR_MAGIC, "error")?;
        let kind = ErrorKind::from_u64(read_scalar(buf, "error kind")?.as_bits());
        let headers = decode_headers(buf)?;
        let identifier = match Decoder::default().read_value(buf)? {
            Value::Str(s) => s,
            v => return Err(Error::CorruptStream(format!("expected an error identifier, found {}", v))),
        };
        let user_data = decode_headers(buf)?;
        Ok(Self {
            kind,
            headers,
            identifier,
            user_data,
        })
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if !self.identifier.is_empty() {
            write!(f, " ({})", self.identifier)?;
        }
        Ok(())
    }
}

impl std::error::Error for ProtocolError {}

impl From<Error> for ProtocolError {
    fn from(e: Error) -> Self {
        e.to_protocol()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> Headers {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn bytes(parts: &[&[u8]]) -> Vec<u8> {
        parts.concat()
    }

    #[test]
    fn request() {
        let req = Request::new(0, headers(&[("RequestID", "Hello!")]));
        let mut buf = Vec::new();
        req.encode(&mut buf).unwrap();
        let expected = bytes(&[
            &[0x79, 0x79, 0x72, 0x21, 0x34, 0x20, 0xc1, 0x2e, 0x21, 0x16, 0xa1, 0x12],
            b"RequestID",
            &[0x21, 0x10, 0xa1, 0x0c],
            b"Hello!",
        ]);
        assert_eq!(buf, expected);
        let mut data = &buf[..];
        assert_eq!(Request::decode(&mut data).unwrap(), req);
        assert!(data.is_empty());
    }

    #[test]
    fn request_length_mismatch() {
        let req = Request::new(5, headers(&[("a", "b")]));
        let mut buf = Vec::new();
        req.encode(&mut buf).unwrap();
        // Claim one more byte than the body holds (10 -> 11), and supply it.
        buf[4] += 2;
        buf.push(0x00);
        assert!(matches!(
            Request::decode(&mut &buf[..]),
            Err(Error::CorruptStream(_))
        ));
    }

    #[test]
    fn bad_magic() {
        assert!(matches!(
            Request::decode(&mut &b"000"[..]),
            Err(Error::CorruptStream(_))
        ));
        assert!(matches!(
            Response::decode(&mut &REQUEST_MAGIC[..]),
            Err(Error::CorruptStream(_))
        ));
    }

    #[test]
    fn response() {
        let resp = Response::new(headers(&[("Header", "Value")]), true);
        let mut buf = Vec::new();
        resp.encode(&mut buf).unwrap();
        let expected = bytes(&[
            &[0x79, 0x79, 0x52, 0xc1, 0x26, 0x21, 0x10, 0xa1, 0x0c],
            b"Header",
            &[0x21, 0x0e, 0xa1, 0x0a],
            b"Value",
            &[0x30],
        ]);
        assert_eq!(buf, expected);
        assert_eq!(Response::decode(&mut &buf[..]).unwrap(), resp);
    }

    #[test]
    fn error() {
        let err = ProtocolError::internal_error()
            .with_headers(headers(&[("Header", "Value")]))
            .with_identifier("Identifier");
        let mut buf = Vec::new();
        err.encode(&mut buf).unwrap();
        let expected = bytes(&[
            &[0x79, 0x79, 0x65, 0x20, 0xc1, 0x26, 0x21, 0x10, 0xa1, 0x0c],
            b"Header",
            &[0x21, 0x0e, 0xa1, 0x0a],
            b"Value",
            &[0xa1, 0x14],
            b"Identifier",
            &[0xc0],
        ]);
        assert_eq!(buf, expected);
        assert_eq!(ProtocolError::decode(&mut &buf[..]).unwrap(), err);
    }

    #[test]
    fn kinds() {
        for v in 0..7 {
            assert_eq!(ErrorKind::from_u64(v).as_u64(), v);
        }
        assert_eq!(ErrorKind::from_u64(42), ErrorKind::Other(42));
        assert!(ProtocolError::unimplemented_method().is_unimplemented_method());
        assert!(ProtocolError::request_timeout().is_request_timeout());
        assert!(ProtocolError::managed("boom!").is_managed_error());
        assert_eq!(ProtocolError::managed("boom!").to_string(), "managed_error (boom!)");
        assert!(!ProtocolError::bad_request().is_unauthorized());
    }
}
