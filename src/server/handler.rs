use std::fmt;
use std::sync::Arc;

use crate::encode::{encode_as, encode_detect};
use crate::error::{Error, Result};
use crate::message::{Headers, ProtocolError, Request, Response};
use crate::registry::Registry;
use crate::schema::Record;
use crate::typed::TypedValue;
use crate::types::Type;

use super::Connection;

/// Serves one method. Receives the call context and the request body, already specialized
/// into a record when the method takes one.
///
/// Any `Fn(&mut Call, Option<Record>) -> Result<TypedValue, ProtocolError>` closure is a
/// handler.
pub trait Handler: Send + Sync {
    fn call(&self, call: &mut Call<'_>, body: Option<Record>) -> Result<TypedValue, ProtocolError>;
}

impl<F> Handler for F
where
    F: Fn(&mut Call<'_>, Option<Record>) -> Result<TypedValue, ProtocolError> + Send + Sync,
{
    fn call(&self, call: &mut Call<'_>, body: Option<Record>) -> Result<TypedValue, ProtocolError> {
        self(call, body)
    }
}

/// Runs before or after a handler. Returning an error aborts the call, and the error is sent
/// to the peer instead of a response.
pub type Callback = Arc<dyn Fn(&mut Call<'_>) -> Result<(), ProtocolError> + Send + Sync>;

/// A registered method: its handler, what it receives and returns, and its callbacks.
#[derive(Clone)]
pub struct MethodHandle {
    pub name: String,
    /// Type id of the structure the method takes, or `None` for a void body.
    pub receives: Option<u64>,
    /// Type id of the structure the method returns, or `None` for a void result.
    pub returns: Option<u64>,
    /// Whether results go out as a stream of values.
    pub streams: bool,
    handler: Arc<dyn Handler>,
    before: Option<Callback>,
    after: Option<Callback>,
}

impl MethodHandle {
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut Call<'_>, Option<Record>) -> Result<TypedValue, ProtocolError>
            + Send
            + Sync
            + 'static,
    {
        Self::from_handler(name, Arc::new(handler))
    }

    pub fn from_handler(name: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        Self {
            name: name.into(),
            receives: None,
            returns: None,
            streams: false,
            handler,
            before: None,
            after: None,
        }
    }

    pub fn receives(mut self, type_id: u64) -> Self {
        self.receives = Some(type_id);
        self
    }

    pub fn returns(mut self, type_id: u64) -> Self {
        self.returns = Some(type_id);
        self
    }

    pub fn streaming(mut self) -> Self {
        self.streams = true;
        self
    }

    pub fn before<F>(mut self, callback: F) -> Self
    where
        F: Fn(&mut Call<'_>) -> Result<(), ProtocolError> + Send + Sync + 'static,
    {
        self.before = Some(Arc::new(callback));
        self
    }

    pub fn after<F>(mut self, callback: F) -> Self
    where
        F: Fn(&mut Call<'_>) -> Result<(), ProtocolError> + Send + Sync + 'static,
    {
        self.after = Some(Arc::new(callback));
        self
    }

    pub(crate) fn handler(&self) -> &dyn Handler {
        self.handler.as_ref()
    }

    pub(crate) fn before_callback(&self) -> Option<&Callback> {
        self.before.as_ref()
    }

    pub(crate) fn after_callback(&self) -> Option<&Callback> {
        self.after.as_ref()
    }

    /// The declared result type, if the method returns a structure.
    pub fn return_type(&self) -> Option<Type> {
        self.returns.map(Type::Struct)
    }
}

impl fmt::Debug for MethodHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MethodHandle")
            .field("name", &self.name)
            .field("receives", &self.receives)
            .field("returns", &self.returns)
            .field("streams", &self.streams)
            .finish_non_exhaustive()
    }
}

/// The context of one method call, as seen by callbacks and the handler.
pub struct Call<'a> {
    request: &'a Request,
    method: &'a MethodHandle,
    registry: &'a Registry,
    conn: &'a mut dyn Connection,
    response_headers: Headers,
    streaming: bool,
}

impl<'a> Call<'a> {
    pub(crate) fn new(
        request: &'a Request,
        method: &'a MethodHandle,
        registry: &'a Registry,
        conn: &'a mut dyn Connection,
    ) -> Self {
        Self {
            request,
            method,
            registry,
            conn,
            response_headers: Headers::new(),
            streaming: false,
        }
    }

    pub fn request(&self) -> &Request {
        self.request
    }

    /// Request headers.
    pub fn headers(&self) -> &Headers {
        &self.request.headers
    }

    pub fn method(&self) -> &MethodHandle {
        self.method
    }

    pub fn registry(&self) -> &Registry {
        self.registry
    }

    pub fn response_headers(&self) -> &Headers {
        &self.response_headers
    }

    /// Add or replace one response header. Has no effect once streaming has begun.
    pub fn add_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        if self.streaming {
            tracing::warn!(
                method = %self.method.name,
                "add_header called after streaming data. Headers must be set before streaming."
            );
            return;
        }
        self.response_headers.insert(key.into(), value.into());
    }

    /// Replace every response header. Has no effect once streaming has begun.
    pub fn set_headers(&mut self, headers: Headers) {
        if self.streaming {
            tracing::warn!(
                method = %self.method.name,
                "set_headers called after streaming data. Headers must be set before streaming."
            );
            return;
        }
        self.response_headers = headers;
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Send one value of a streaming response. The first call sends the response header.
    ///
    /// Items that can't be converted into the method's return type are skipped with a warning.
    pub fn stream(&mut self, item: impl Into<TypedValue>) -> Result<()> {
        if !self.method.streams {
            return Err(Error::NonStreamable);
        }
        let mut buf = Vec::new();
        if !self.streaming {
            Response::new(self.response_headers.clone(), true).encode(&mut buf)?;
            self.streaming = true;
        }
        let item: TypedValue = item.into();
        let mut item_buf = Vec::new();
        let encoded = match self.method.return_type() {
            Some(ty) => item
                .coerce(&ty, self.registry)
                .and_then(|v| encode_as(&mut item_buf, &v, &ty, self.registry)),
            None => encode_detect(&mut item_buf, &item, self.registry),
        };
        match encoded {
            Ok(()) => buf.extend_from_slice(&item_buf),
            Err(e) => {
                tracing::warn!(method = %self.method.name, error = %e, "Skipping stream item due to invalid type");
            }
        }
        if buf.is_empty() {
            return Ok(());
        }
        self.conn.write(&buf)?;
        Ok(())
    }

    pub(crate) fn into_response_headers(self) -> Headers {
        self.response_headers
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::schema::{FieldDescriptor, Schema};

    #[derive(Default)]
    struct Sink {
        data: Vec<u8>,
    }

    impl Connection for Sink {
        fn write(&mut self, data: &[u8]) -> std::io::Result<()> {
            self.data.extend_from_slice(data);
            Ok(())
        }

        fn close(&mut self, _flush: bool) {}
    }

    fn registry() -> Registry {
        let mut reg = Registry::new();
        reg.register(
            Schema::new(7, "test", "Item").field(FieldDescriptor::primitive("n", Type::Uint8, 0)),
        )
        .unwrap();
        reg
    }

    fn noop(_: &mut Call<'_>, _: Option<Record>) -> Result<TypedValue, ProtocolError> {
        Ok(TypedValue::Null)
    }

    #[test]
    fn non_streaming_refuses_items() {
        let reg = registry();
        let method = MethodHandle::new("plain", noop);
        let request = Request::default();
        let mut sink = Sink::default();
        let mut call = Call::new(&request, &method, &reg, &mut sink);
        assert_eq!(call.stream(1u8), Err(Error::NonStreamable));
        assert!(!call.is_streaming());
        drop(call);
        assert!(sink.data.is_empty());
    }

    #[test]
    fn headers_freeze_once_streaming() {
        let reg = registry();
        let method = MethodHandle::new("items", noop).returns(7).streaming();
        let request = Request::default();
        let mut sink = Sink::default();
        let mut call = Call::new(&request, &method, &reg, &mut sink);
        call.add_header("a", "1");
        call.stream(vec![TypedValue::Uint(3)]).unwrap();
        call.add_header("b", "2");
        call.set_headers(Headers::new());
        assert!(call.is_streaming());
        assert_eq!(call.response_headers().len(), 1);

        // Not convertible to the item structure: skipped, nothing written.
        call.stream("nope").unwrap();
        drop(call);

        let mut data = &sink.data[..];
        let response = Response::decode(&mut data).unwrap();
        assert!(response.stream);
        assert_eq!(response.headers.get("a").map(String::as_str), Some("1"));
        let item = crate::decode::decode_as(&mut data, &Type::Struct(7), &reg).unwrap();
        assert_eq!(item.as_record().map(|r| r.get_u64("n").unwrap()), Some(3));
        assert!(data.is_empty());
    }

    #[test]
    fn closures_are_handlers() {
        let method = MethodHandle::new("echo", |call: &mut Call<'_>, _body| {
            Ok(TypedValue::from(call.headers().len() as u64))
        })
        .before(|call: &mut Call<'_>| {
            call.add_header("seen", "yes");
            Ok(())
        });
        assert!(method.before_callback().is_some());
        assert!(method.after_callback().is_none());
        assert!(format!("{:?}", method).contains("echo"));
    }
}
