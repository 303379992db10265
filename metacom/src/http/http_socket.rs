use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{
    StatusCode,
    client::conn::http1::SendRequest,
    header::{CONTENT_TYPE, HOST},
};
use hyper_util::rt::TokioIo;
use serde_json::Value;
use tokio::{net::TcpStream, sync::Mutex};

use crate::{Error, ErrorKind, Result};

/// Request-response transport: one `POST` per call.
///
/// Idle HTTP/1 connections to the host are kept and reused.
#[derive(Debug)]
pub struct HttpSocket {
    host: String,
    idle: Mutex<Vec<SendRequest<Full<Bytes>>>>,
}

impl HttpSocket {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            idle: Mutex::default(),
        }
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Posts `args` as JSON to `path` and returns the parsed JSON reply.
    ///
    /// An empty reply body is read as `null`.
    ///
    /// # Errors
    ///
    /// Any status outside 2xx fails with [`ErrorKind::HttpStatus`] and the
    /// message `Status Code: <status>`.
    pub async fn call(&self, path: &str, args: &Value) -> Result<Value> {
        let body = Bytes::from(serde_json::to_vec(args)?);
        let (status, bytes) = self.post(path, body).await?;
        if !status.is_success() {
            return Err(Error::new(
                ErrorKind::HttpStatus,
                format!("Status Code: {}", status.as_u16()),
            ));
        }
        if bytes.is_empty() {
            Ok(Value::Null)
        } else {
            Ok(serde_json::from_slice(&bytes)?)
        }
    }

    /// Posts `body` as JSON to `path` on a pooled connection.
    ///
    /// # Returns
    ///
    /// The reply status and body. The connection goes back to the pool once
    /// the body is read.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::TcpConnectFailed`] or
    /// [`ErrorKind::HttpHandshakeFailed`] when no connection can be opened,
    /// and with [`ErrorKind::HttpBuildReqFailed`],
    /// [`ErrorKind::HttpSendReqFailed`] or [`ErrorKind::HttpWaitRspFailed`]
    /// when the exchange itself fails.
    pub async fn post(&self, path: &str, body: Bytes) -> Result<(StatusCode, Bytes)> {
        // 1. acquire connection.
        let mut sender = match self.take_idle().await {
            Some(sender) => sender,
            None => self.connect().await?,
        };

        // 2. build request.
        let req = hyper::Request::builder()
            .uri(path)
            .method(hyper::Method::POST)
            .header(HOST, self.host.as_str())
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(body))
            .map_err(|e| Error::new(ErrorKind::HttpBuildReqFailed, e.to_string()))?;

        // 3. send request.
        let rsp = sender
            .send_request(req)
            .await
            .map_err(|e| Error::new(ErrorKind::HttpSendReqFailed, e.to_string()))?;
        let status = rsp.status();

        // 4. collect body bytes.
        let body_bytes = rsp
            .into_body()
            .collect()
            .await
            .map_err(|e| Error::new(ErrorKind::HttpWaitRspFailed, e.to_string()))?
            .to_bytes();

        // 5. restore connection.
        if !sender.is_closed() {
            self.idle.lock().await.push(sender);
        }

        Ok((status, body_bytes))
    }

    async fn take_idle(&self) -> Option<SendRequest<Full<Bytes>>> {
        let mut idle = self.idle.lock().await;
        while let Some(sender) = idle.pop() {
            if !sender.is_closed() {
                return Some(sender);
            }
        }
        None
    }

    async fn connect(&self) -> Result<SendRequest<Full<Bytes>>> {
        let stream = TcpStream::connect(self.host.as_str())
            .await
            .map_err(|e| Error::new(ErrorKind::TcpConnectFailed, format!("{}: {e}", self.host)))?;

        let (sender, conn) =
            hyper::client::conn::http1::handshake::<_, Full<Bytes>>(TokioIo::new(stream))
                .await
                .map_err(|e| Error::new(ErrorKind::HttpHandshakeFailed, e.to_string()))?;
        let host = self.host.clone();
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::error!("http connection to {host} failed: {e}");
            }
        });
        Ok(sender)
    }
}
