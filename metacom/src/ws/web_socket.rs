use tokio::sync::mpsc;

use crate::error::{Error, ErrorKind, Result};

/// Sending half of the persistent channel.
///
/// Frames pushed here are written by the connection's send loop. Any
/// `mpsc` receiver can stand in for a real connection.
#[derive(Debug, Clone)]
pub struct WebSocket {
    stream: mpsc::Sender<String>,
}

impl WebSocket {
    pub fn new(stream: mpsc::Sender<String>) -> Self {
        Self { stream }
    }

    /// # Errors
    ///
    /// Fails with [`ErrorKind::WebSocketSendFailed`] once the connection is closed.
    pub async fn send(&self, frame: String) -> Result<()> {
        self.stream
            .send(frame)
            .await
            .map_err(|e| Error::new(ErrorKind::WebSocketSendFailed, e.to_string()))
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.stream.is_closed()
    }
}
