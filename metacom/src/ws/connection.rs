use std::sync::Arc;

use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use tokio::{net::TcpStream, sync::mpsc};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite};
use tokio_util::sync::{CancellationToken, DropGuard};

use super::WebSocket;
use crate::{
    State,
    error::{Error, ErrorKind, Result},
};

type Stream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens the persistent channel to `url`.
///
/// Spawns a send loop fed by the returned [`WebSocket`] and a receive loop
/// that hands every inbound frame to `state`. Both loops stop when the
/// returned guard is dropped or the peer closes the connection; pending
/// calls are then failed with [`ErrorKind::WebSocketClosed`].
///
/// # Errors
///
/// Fails with [`ErrorKind::WebSocketConnectFailed`] if the TCP connect, the
/// TLS handshake (for `wss://`) or the websocket handshake fails.
pub async fn connect(
    url: &str,
    state: &Arc<State>,
    capacity: usize,
) -> Result<(WebSocket, DropGuard)> {
    if url.starts_with("wss://") {
        install_crypto_provider();
    }
    let (stream, _) = connect_async(url)
        .await
        .map_err(|e| Error::new(ErrorKind::WebSocketConnectFailed, format!("{url}: {e}")))?;
    tracing::debug!("websocket connected to {url}");

    let (send_stream, recv_stream) = stream.split();
    let (sender, receiver) = mpsc::channel(capacity);
    let stop = CancellationToken::new();

    tokio::spawn({
        let stop = stop.clone();
        async move {
            tokio::select! {
                () = stop.cancelled() => {},
                r = start_send_loop(send_stream, receiver) => {
                    if let Err(e) = r {
                        tracing::error!("send loop failed: {e}");
                    }
                }
            }
        }
    });

    tokio::spawn({
        let stop = stop.clone();
        let state = state.clone();
        let url = url.to_string();
        async move {
            tokio::select! {
                () = stop.cancelled() => {
                    tracing::debug!("websocket to {url} stopped");
                },
                r = start_recv_loop(recv_stream, &state) => {
                    if let Err(e) = r {
                        tracing::error!("recv loop for {url} failed: {e}");
                    }
                    stop.cancel();
                }
            }
            let rejected = state
                .waiter
                .reject_all(&Error::new(ErrorKind::WebSocketClosed, url.clone()));
            if rejected > 0 {
                tracing::warn!("{rejected} pending calls failed, websocket to {url} is closed");
            }
        }
    });

    Ok((WebSocket::new(sender), stop.drop_guard()))
}

/// Makes `ring` the process-wide rustls provider unless one is set already.
fn install_crypto_provider() {
    if rustls::crypto::CryptoProvider::get_default().is_none()
        && rustls::crypto::ring::default_provider()
            .install_default()
            .is_err()
    {
        tracing::debug!("rustls crypto provider was installed concurrently");
    }
}

async fn start_recv_loop(mut recv_stream: SplitStream<Stream>, state: &Arc<State>) -> Result<()> {
    while let Some(msg) = recv_stream.next().await {
        let msg = msg.map_err(|e| Error::new(ErrorKind::WebSocketRecvFailed, e.to_string()))?;
        match msg {
            tungstenite::Message::Text(text) => state.handle_frame(text.as_str()),
            tungstenite::Message::Binary(bytes) => match std::str::from_utf8(&bytes) {
                Ok(text) => state.handle_frame(text),
                Err(e) => tracing::error!("drop non-utf8 binary frame: {e}"),
            },
            tungstenite::Message::Close(_) => {
                return Err(Error::kind(ErrorKind::WebSocketClosed));
            }
            _ => {}
        }
    }
    Ok(())
}

async fn start_send_loop(
    mut send_stream: SplitSink<Stream, tungstenite::Message>,
    mut receiver: mpsc::Receiver<String>,
) -> Result<()> {
    while let Some(frame) = receiver.recv().await {
        send_stream
            .send(tungstenite::Message::text(frame))
            .await
            .map_err(|e| Error::new(ErrorKind::WebSocketSendFailed, e.to_string()))?;
    }
    Ok(())
}
