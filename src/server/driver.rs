use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::encode::{encode_as, encode_void};
use crate::error::{Error, Result};
use crate::message::{ProtocolError, Request, Response};
use crate::parser::{Feed, Limits, RequestParser, ValueParser};
use crate::schema::Record;
use crate::timestamp::Timestamp;
use crate::value::Value;

use super::{Call, Connection, Context, MethodHandle};

/// Where a connection is in its single request/response exchange.
///
/// States are ordered: every state past [`State::WritingResponse`] means bytes of a response
/// may already be on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum State {
    New,
    WaitingHeaders,
    ReceivedHeaders,
    ReceivingBody,
    ReceivedBody,
    WritingResponse,
    WroteResponse,
    Errored,
    Closed,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::New => "new",
            State::WaitingHeaders => "waiting_headers",
            State::ReceivedHeaders => "received_headers",
            State::ReceivingBody => "receiving_body",
            State::ReceivedBody => "received_body",
            State::WritingResponse => "writing_response",
            State::WroteResponse => "wrote_response",
            State::Errored => "errored",
            State::Closed => "closed",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runs one connection: parses the request header and body from bytes as they arrive, calls
/// the registered method, and writes the result to the connection.
pub struct Driver<C: Connection> {
    context: Arc<Context>,
    conn: C,
    state: State,
    id: Uuid,
    span: tracing::Span,
    clock: fn() -> Timestamp,
    connected_at: Timestamp,
    headers_at: Option<Timestamp>,
    request_parser: RequestParser,
    request: Option<Request>,
    method: Option<Arc<MethodHandle>>,
    body_parser: Option<ValueParser>,
}

impl<C: Connection> Driver<C> {
    pub fn new(context: Arc<Context>, conn: C) -> Self {
        Self::with_clock(context, conn, Timestamp::now_utc)
    }

    /// Create a driver that reads the time from `clock`.
    pub fn with_clock(context: Arc<Context>, conn: C, clock: fn() -> Timestamp) -> Self {
        let id = Uuid::new_v4();
        let span = tracing::info_span!("yarp_transaction", request_id = %id);
        let limits = Limits::from(context.registry().config());
        let driver = Self {
            context,
            conn,
            state: State::New,
            id,
            span,
            clock,
            connected_at: clock(),
            headers_at: None,
            request_parser: RequestParser::new(limits),
            request: None,
            method: None,
            body_parser: None,
        };
        driver.span.in_scope(|| info!("Transaction started"));
        driver
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The request header, once it has been received.
    pub fn request(&self) -> Option<&Request> {
        self.request.as_ref()
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.conn
    }

    /// Feed one byte received from the peer.
    ///
    /// Failures are handled here: the peer gets an error frame if no response has been started,
    /// and the connection is closed.
    pub fn dispatch_byte(&mut self, byte: u8) {
        let span = self.span.clone();
        let _enter = span.enter();
        if self.state >= State::WroteResponse {
            trace!(state = %self.state, "Ignoring byte received after the exchange");
            return;
        }
        let result = if self.request.is_none() {
            self.feed_request_parser(byte)
        } else {
            self.feed_request_body(byte)
        };
        if let Err(e) = result {
            self.handle_error(e);
        }
    }

    /// Feed every byte of `data`, stopping early once the exchange is over.
    pub fn dispatch(&mut self, data: &[u8]) {
        for &byte in data {
            if self.state >= State::WroteResponse {
                break;
            }
            self.dispatch_byte(byte);
        }
    }

    /// Note that the transport closed the connection, and log the transaction statistics.
    pub fn unbind(&mut self) {
        let _enter = self.span.enter();
        let now = (self.clock)();
        let headers_in = self.headers_at.map(|t| t.since(self.connected_at));
        info!(
            started_at = %self.connected_at,
            duration_sec = now.since(self.connected_at),
            headers_received_in_sec = ?headers_in,
            "Transaction statistics"
        );
        self.state = State::Closed;
    }

    fn feed_request_parser(&mut self, byte: u8) -> Result<()> {
        self.state = State::WaitingHeaders;
        let started = self.request_parser.is_started();
        let request = match self.request_parser.feed(byte) {
            Ok(None) => return Ok(()),
            Ok(Some(request)) => request,
            Err(e) if !started => {
                error!(error = %e, "Corrupt stream during request parsing");
                self.drop_connection(false);
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        self.state = State::ReceivedHeaders;
        self.headers_at = Some((self.clock)());
        debug!(method_id = request.method_id, "Received request headers");
        let method_id = request.method_id;
        self.request = Some(request);
        self.determine_handler(method_id)
    }

    fn determine_handler(&mut self, method_id: u64) -> Result<()> {
        match self.context.registry().by_method_id(method_id) {
            Some(method) => {
                debug!(method = %method.name, "Resolved handler");
                self.method = Some(Arc::clone(method));
                Ok(())
            }
            None => {
                warn!(method_id, "No handler registered for method");
                Err(ProtocolError::unimplemented_method().into())
            }
        }
    }

    fn feed_request_body(&mut self, byte: u8) -> Result<()> {
        self.state = State::ReceivingBody;
        let limits = Limits::from(self.context.registry().config());
        let parser = self
            .body_parser
            .get_or_insert_with(|| ValueParser::new(limits));
        match parser.feed(byte)? {
            Some(body) => {
                self.state = State::ReceivedBody;
                self.prepare_request_body(body)
            }
            None => Ok(()),
        }
    }

    fn prepare_request_body(&mut self, body: Value) -> Result<()> {
        let method = self
            .method
            .clone()
            .ok_or(Error::InvalidState("request body without a method"))?;
        let registry = self.context.registry();
        let record = match (&body, method.receives) {
            (Value::Void, None) => None,
            (Value::Struct(encoded), Some(id)) if encoded.id == id => {
                let record = registry.specialize(encoded).map_err(|e| {
                    warn!(error = %e, "Rejecting request body that doesn't specialize");
                    ProtocolError::type_mismatch()
                })?;
                Some(record)
            }
            (body, wants) => {
                let received = match body {
                    Value::Struct(encoded) => format!("struct 0x{:016x}", encoded.id),
                    v => v.marker().name().to_string(),
                };
                warn!(
                    wants = ?wants,
                    received = %received,
                    "Rejecting request due to inconsistent request body type"
                );
                return Err(ProtocolError::type_mismatch().into());
            }
        };
        self.invoke_handler(&method, record)
    }

    fn invoke_handler(&mut self, method: &MethodHandle, body: Option<Record>) -> Result<()> {
        let context = Arc::clone(&self.context);
        let registry = context.registry();
        let request = self
            .request
            .as_ref()
            .ok_or(Error::InvalidState("handler invoked without a request"))?;
        let mut call = Call::new(request, method, registry, &mut self.conn);
        let result = context.run(&mut call, method, body);
        let streamed = call.is_streaming();
        let headers = call.into_response_headers();
        if streamed {
            self.state = State::WritingResponse;
        }
        let result = result?;

        if method.streams {
            if !streamed {
                self.state = State::WritingResponse;
                let mut buf = Vec::new();
                Response::new(headers, true).encode(&mut buf)?;
                self.conn.write(&buf)?;
            }
            self.state = State::WroteResponse;
            self.drop_connection(true);
            return Ok(());
        }

        let mut buf = Vec::new();
        Response::new(headers, false).encode(&mut buf)?;
        match method.return_type() {
            Some(ty) => {
                let value = result.coerce(&ty, registry).map_err(|e| {
                    error!(error = %e, method = %method.name, "Could not convert handler result to its return type");
                    ProtocolError::internal_error()
                })?;
                encode_as(&mut buf, &value, &ty, registry)?;
            }
            None => encode_void(&mut buf),
        }
        self.state = State::WritingResponse;
        self.conn.write(&buf)?;
        self.state = State::WroteResponse;
        Ok(())
    }

    fn handle_error(&mut self, e: Error) {
        error!(error = %e, "Invoked error handler");
        if self.state >= State::WritingResponse {
            error!(state = %self.state, "Not sending error payload due to current connection state");
            self.state = State::Errored;
            self.drop_connection(false);
            return;
        }
        self.state = State::Errored;
        let mut buf = Vec::new();
        let written = e
            .to_protocol()
            .encode(&mut buf)
            .and_then(|()| self.conn.write(&buf).map_err(Error::from));
        if let Err(e) = written {
            error!(error = %e, "Failed to send error payload");
        }
        self.drop_connection(true);
    }

    fn drop_connection(&mut self, flush: bool) {
        if self.state < State::WroteResponse {
            self.state = State::Errored;
        }
        self.conn.close(flush);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn states_are_ordered() {
        assert!(State::New < State::WaitingHeaders);
        assert!(State::ReceivedBody < State::WritingResponse);
        assert!(State::WritingResponse < State::WroteResponse);
        assert!(State::Errored > State::WritingResponse);
        assert_eq!(State::ReceivedHeaders.to_string(), "received_headers");
    }
}
