use serde_json::Value;
use std::time::Duration;
use tokio::sync::oneshot;

use crate::{Error, ErrorKind, Result, waiter::WaiterCleaner};

/// Receiving half of one pending websocket call.
///
/// Dropping it before the reply arrives removes the call from the waiter.
pub struct Receiver {
    rx: oneshot::Receiver<Result<Value>>,
    _cleaner: WaiterCleaner,
}

impl Receiver {
    pub(crate) fn new(rx: oneshot::Receiver<Result<Value>>, cleaner: WaiterCleaner) -> Self {
        Self {
            rx,
            _cleaner: cleaner,
        }
    }

    /// Waits for the call outcome, at most `timeout` if one is given.
    ///
    /// # Errors
    ///
    /// Returns the remote error, [`ErrorKind::Timeout`] once `timeout`
    /// elapses, or [`ErrorKind::Cancelled`] if the waiter went away.
    pub async fn recv(self, timeout: Option<Duration>) -> Result<Value> {
        let Self { rx, _cleaner } = self;
        let received = match timeout {
            Some(timeout) => tokio::time::timeout(timeout, rx)
                .await
                .map_err(|_| Error::kind(ErrorKind::Timeout))?,
            None => rx.await,
        };
        received.map_err(|e| Error::new(ErrorKind::Cancelled, e.to_string()))?
    }
}
