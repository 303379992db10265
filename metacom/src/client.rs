use serde::{Deserialize, Serialize};
use serde_inline_default::serde_inline_default;
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::DropGuard;

use crate::{
    Api, Dispatcher, HttpSocket, Interface, Introspection, Result, State,
    invoke::Route,
    ws::{self, WebSocket},
};

/// Transport used for a group of calls.
#[derive(Deserialize, Serialize, Debug, PartialEq, Eq, Clone, Copy, clap::ValueEnum)]
pub enum Transport {
    /// Persistent websocket channel.
    Socket,
    /// One HTTP `POST` per call.
    Http,
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

#[serde_inline_default]
#[derive(Deserialize, Serialize, Debug, PartialEq, Eq, Clone)]
pub struct ClientConfig {
    /// Server `host:port`.
    #[serde_inline_default("127.0.0.1:8000".to_string())]
    pub host: String,
    /// Use `wss://` for the websocket.
    ///
    /// Off by default, so a bare config talks plain `ws://`, which suits a
    /// local server. Deployed metacom servers usually accept only `wss://`
    /// and need this set. HTTP calls stay plain HTTP either way.
    #[serde_inline_default(false)]
    pub secure: bool,
    /// Give up on websocket calls after this long. Calls wait forever if unset.
    #[serde_inline_default(None)]
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,
    #[serde_inline_default(Transport::Http)]
    pub introspect_transport: Transport,
    #[serde_inline_default(Transport::Socket)]
    pub call_transport: Transport,
    /// Outbound frames buffered before `send` waits.
    #[serde_inline_default(1024)]
    pub channel_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        serde_json::from_value(Value::Object(serde_json::Map::default())).unwrap()
    }
}

impl ClientConfig {
    #[must_use]
    pub fn socket_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{scheme}://{}", self.host)
    }
}

/// Client of one metacom server.
///
/// Owns the websocket, the pending-call waiter and the interface table. The
/// websocket loops stop when the client is dropped.
pub struct Client {
    config: ClientConfig,
    state: Arc<State>,
    socket: WebSocket,
    http: Arc<HttpSocket>,
    api: Api,
    _drop_guard: Option<DropGuard>,
}

impl Client {
    /// Connects the websocket to `config.host`.
    ///
    /// # Errors
    ///
    /// Fails if the websocket handshake fails.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let state = Arc::new(State::default());
        let (socket, drop_guard) =
            ws::connect(&config.socket_url(), &state, config.channel_capacity).await?;
        Ok(Self::create(config, state, socket, Some(drop_guard)))
    }

    /// Builds a client over an existing channel.
    ///
    /// Frames written by calls go to `socket`; inbound frames must be fed
    /// through [`Client::handle_frame`].
    #[must_use]
    pub fn with_socket(config: ClientConfig, socket: WebSocket) -> Self {
        Self::create(config, Arc::default(), socket, None)
    }

    fn create(
        config: ClientConfig,
        state: Arc<State>,
        socket: WebSocket,
        drop_guard: Option<DropGuard>,
    ) -> Self {
        let http = Arc::new(HttpSocket::new(config.host.as_str()));
        Self {
            config,
            state,
            socket,
            http,
            api: Api::default(),
            _drop_guard: drop_guard,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Loaded interfaces.
    #[must_use]
    pub fn api(&self) -> &Api {
        &self.api
    }

    #[must_use]
    pub fn interface(&self, name: &str) -> Option<Interface> {
        self.api.interface(name)
    }

    /// Feeds one inbound frame, e.g. from a channel set up with [`Client::with_socket`].
    pub fn handle_frame(&self, frame: &str) {
        self.state.handle_frame(frame);
    }

    /// Number of websocket calls still waiting for a reply.
    #[must_use]
    pub fn pending_calls(&self) -> usize {
        self.state.waiter.len()
    }

    /// Calls on `interface` (optionally `interface.version`) over the websocket.
    #[must_use]
    pub fn socket_call(&self, interface: &str, version: Option<&str>) -> Dispatcher {
        self.dispatcher(Transport::Socket, interface, version)
    }

    /// Calls on `interface` (optionally `interface.version`) over HTTP.
    #[must_use]
    pub fn http_call(&self, interface: &str, version: Option<&str>) -> Dispatcher {
        self.dispatcher(Transport::Http, interface, version)
    }

    #[must_use]
    pub fn dispatcher(
        &self,
        transport: Transport,
        interface: &str,
        version: Option<&str>,
    ) -> Dispatcher {
        let route = match transport {
            Transport::Socket => Route::Socket {
                state: self.state.clone(),
                socket: self.socket.clone(),
                timeout: self.config.timeout,
            },
            Transport::Http => Route::Http(self.http.clone()),
        };
        Dispatcher::new(interface, version, route)
    }

    /// Asks the server which of `interfaces` it exposes.
    ///
    /// # Errors
    ///
    /// Fails with the transport error of the `system/introspect` call, or
    /// with [`crate::ErrorKind::SerdeJsonError`] if its result is not a descriptor.
    pub async fn introspect<I, S>(&self, interfaces: I) -> Result<Introspection>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = interfaces.into_iter().map(Into::into).collect();
        self.dispatcher(self.config.introspect_transport, "system", None)
            .method("introspect")
            .request(&names)
            .await
    }

    /// Loads `interfaces` into [`Client::api`].
    ///
    /// Interfaces the server does not expose are skipped. Each loaded
    /// interface replaces its previous entry; other entries stay.
    ///
    /// # Errors
    ///
    /// Fails, loading nothing, if the introspection call fails.
    pub async fn load<I, S>(&self, interfaces: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = interfaces.into_iter().map(Into::into).collect();
        let introspection = self.introspect(names.iter().cloned()).await?;

        for name in &names {
            let Some(methods) = introspection.methods(name) else {
                tracing::debug!("interface {name} is not available");
                continue;
            };
            let dispatcher = self.dispatcher(self.config.call_transport, name, None);
            let methods = methods.map(|method| (method.to_string(), dispatcher.method(method)));
            self.api.insert(Interface::new(name.as_str(), methods));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("host", &self.config.host)
            .field("api", &self.api)
            .field("pending_calls", &self.pending_calls())
            .finish()
    }
}
