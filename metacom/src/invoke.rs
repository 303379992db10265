use std::{sync::Arc, time::Duration};

use futures_util::{FutureExt, future::BoxFuture};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Call, HttpSocket, Result, State, Target, ws::WebSocket};

/// How a call reaches the server.
#[derive(Clone, Debug)]
pub(crate) enum Route {
    Socket {
        state: Arc<State>,
        socket: WebSocket,
        timeout: Option<Duration>,
    },
    Http(Arc<HttpSocket>),
}

/// A remote method bound to its target and transport.
///
/// Cheap to clone. Every call is independent and may run concurrently with
/// any other call.
#[derive(Clone, Debug)]
pub struct Invocable {
    target: Arc<Target>,
    route: Route,
}

impl Invocable {
    pub(crate) fn new(target: Target, route: Route) -> Self {
        Self {
            target: Arc::new(target),
            route,
        }
    }

    #[must_use]
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Calls the method with `args`.
    ///
    /// For the websocket route the call id is allocated and registered right
    /// here, before the returned future is first polled. Dropping the future
    /// abandons the call.
    pub fn call(&self, args: Value) -> BoxFuture<'static, Result<Value>> {
        match &self.route {
            Route::Socket {
                state,
                socket,
                timeout,
            } => {
                let (call_id, rx) = state.waiter.alloc();
                let frame = Call::new(call_id, Target::clone(&self.target), args).to_frame();
                let socket = socket.clone();
                let timeout = *timeout;
                async move {
                    socket.send(frame?).await?;
                    rx.recv(timeout).await
                }
                .boxed()
            }
            Route::Http(http) => {
                let http = http.clone();
                let path = self.target.http_path();
                async move { http.call(&path, &args).await }.boxed()
            }
        }
    }

    /// Calls the method with an empty argument object.
    pub fn invoke(&self) -> BoxFuture<'static, Result<Value>> {
        self.call(Value::Object(serde_json::Map::new()))
    }

    /// Typed call: serializes `req` and deserializes the result.
    ///
    /// # Errors
    ///
    /// Fails like [`Invocable::call`], or with [`crate::ErrorKind::SerdeJsonError`]
    /// if `req` or the result does not convert.
    pub async fn request<Req, Rsp>(&self, req: &Req) -> Result<Rsp>
    where
        Req: Serialize,
        Rsp: for<'c> Deserialize<'c>,
    {
        let value = self.call(serde_json::to_value(req)?).await?;
        Ok(serde_json::from_value(value)?)
    }
}

/// Builds invocables for the methods of one interface version.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    interface: String,
    version: Option<String>,
    route: Route,
}

impl Dispatcher {
    pub(crate) fn new(interface: &str, version: Option<&str>, route: Route) -> Self {
        Self {
            interface: interface.to_string(),
            version: version.map(str::to_owned),
            route,
        }
    }

    #[must_use]
    pub fn method(&self, method: &str) -> Invocable {
        let target = Target::new(self.interface.as_str(), self.version.as_deref(), method);
        Invocable::new(target, self.route.clone())
    }
}
