//! Serving requests.
//!
//! A [`Driver`] runs one connection: it is fed the bytes received from the peer, parses the
//! request header and body, dispatches to the method registered in the shared [`Context`], and
//! writes the response (or an error) back through the [`Connection`]. Transports are left to
//! the host: anything that can implement [`Connection`] and feed received bytes to
//! [`Driver::dispatch_byte`] can serve requests.

mod driver;
mod handler;

pub use self::driver::{Driver, State};
pub use self::handler::{Call, Callback, Handler, MethodHandle};

use std::io;
use std::sync::Arc;

use crate::message::ProtocolError;
use crate::registry::Registry;
use crate::schema::Record;
use crate::typed::TypedValue;

/// The write side of a connection, as seen by a driver.
pub trait Connection {
    /// Send bytes to the peer.
    fn write(&mut self, data: &[u8]) -> io::Result<()>;

    /// Close the connection, after sending anything already written if `flush` is set.
    fn close(&mut self, flush: bool);
}

/// Everything shared by the connections of one server: the registry, and callbacks run around
/// every call.
#[derive(Default)]
pub struct Context {
    registry: Registry,
    before_any: Option<Callback>,
    after_any: Option<Callback>,
}

impl Context {
    pub fn new(registry: Registry) -> Context {
        Context {
            registry,
            ..Context::default()
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run `callback` before every call, ahead of the method's own callback.
    pub fn before_any<F>(mut self, callback: F) -> Self
    where
        F: Fn(&mut Call<'_>) -> Result<(), ProtocolError> + Send + Sync + 'static,
    {
        self.before_any = Some(Arc::new(callback));
        self
    }

    /// Run `callback` after every successful call, following the method's own callback.
    pub fn after_any<F>(mut self, callback: F) -> Self
    where
        F: Fn(&mut Call<'_>) -> Result<(), ProtocolError> + Send + Sync + 'static,
    {
        self.after_any = Some(Arc::new(callback));
        self
    }

    pub fn into_shared(self) -> Arc<Context> {
        Arc::new(self)
    }

    /// Run the callbacks and handler of `method`, in order: the global before callback, the
    /// method's before callback, the handler, the method's after callback, and the global after
    /// callback. The first error stops the chain.
    pub(crate) fn run(
        &self,
        call: &mut Call<'_>,
        method: &MethodHandle,
        body: Option<Record>,
    ) -> Result<TypedValue, ProtocolError> {
        if let Some(cb) = &self.before_any {
            cb(call)?;
        }
        if let Some(cb) = method.before_callback() {
            cb(call)?;
        }
        let result = method.handler().call(call, body)?;
        if let Some(cb) = method.after_callback() {
            cb(call)?;
        }
        if let Some(cb) = &self.after_any {
            cb(call)?;
        }
        Ok(result)
    }
}
