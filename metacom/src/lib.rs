//! Client for metacom servers.
//!
//! Calls go out either over one persistent websocket, where replies arrive
//! unordered and are matched to their calls by id, or as one HTTP `POST` per
//! call. [`Client::load`] asks the server which interfaces it exposes and
//! builds a table of callable methods from the answer.

#![forbid(unsafe_code)]

mod error;
pub use error::{Error, ErrorKind, Result};

mod packet;
pub use packet::{Call, Correlation, RemoteError, Reply, Target};

mod waiter;
pub use waiter::{Waiter, WaiterCleaner};

mod receiver;
pub use receiver::Receiver;

mod state;
pub use state::State;

pub mod http;
pub use http::HttpSocket;

pub mod ws;

mod invoke;
pub use invoke::{Dispatcher, Invocable};

mod introspect;
pub use introspect::Introspection;

mod api;
pub use api::{Api, Interface};

mod client;
pub use client::{Client, ClientConfig, Transport};
