#![forbid(unsafe_code)]

use std::{convert::Infallible, net::SocketAddr, time::Duration};

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use http_body_util::{BodyExt, Full};
use hyper::{Request, Response, body::Incoming, server::conn::http1::Builder};
use hyper_tungstenite::tungstenite::Message;
use hyper_util::rt::TokioIo;
use metacom::{Call, Client, ClientConfig, ErrorKind, Reply, Transport};
use serde_json::{Value, json};
use tokio::net::TcpListener;

fn exposed() -> Value {
    json!({
        "math": {"add": {}, "fail": {}, "push": {}},
        "text": {"upper": {}},
    })
}

fn answer(call: &Call) -> Vec<Reply> {
    let args = &call.args;
    match call.target.to_string().as_str() {
        "math/add" | "math.2/add" => {
            let sum = args["a"].as_i64().unwrap_or(0) + args["b"].as_i64().unwrap_or(0);
            vec![Reply::result(call.id, json!(sum))]
        }
        "math/fail" => vec![Reply::error(call.id, json!("E1"), "bad")],
        "math/push" => vec![
            Reply::event("ticker", json!("ignored")),
            Reply::event(call.id, json!("pushed")),
        ],
        "text/upper" => {
            let text = args["text"].as_str().unwrap_or_default().to_uppercase();
            vec![Reply::result(call.id, json!(text))]
        }
        other => vec![Reply::error(call.id, json!(404), format!("{other} not found"))],
    }
}

fn respond(status: u16, body: Vec<u8>) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

async fn handle_request(mut req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    if hyper_tungstenite::is_upgrade_request(&req) {
        let (response, websocket) = hyper_tungstenite::upgrade(&mut req, None).unwrap();
        tokio::spawn(async move {
            let Ok(mut websocket) = websocket.await else {
                return;
            };
            while let Some(Ok(msg)) = websocket.next().await {
                if !msg.is_text() {
                    continue;
                }
                let call = Call::parse(msg.to_text().unwrap()).unwrap();
                if call.target.to_string() == "math/hangup" {
                    let _ = websocket.send(Message::Close(None)).await;
                    return;
                }
                for reply in answer(&call) {
                    let frame = reply.to_frame().unwrap();
                    if websocket.send(Message::text(frame)).await.is_err() {
                        return;
                    }
                }
            }
        });
        return Ok(response);
    }

    let path = req.uri().path().to_string();
    let body = req.into_body().collect().await.unwrap().to_bytes();
    let rsp = match path.as_str() {
        "/api/system/introspect" => {
            let names: Vec<String> = serde_json::from_slice(&body).unwrap();
            if names.iter().any(|name| name == "explode") {
                respond(500, b"{}".to_vec())
            } else {
                let exposed = exposed();
                let available: serde_json::Map<String, Value> = names
                    .into_iter()
                    .filter_map(|name| exposed.get(&name).map(|v| (name, v.clone())))
                    .collect();
                respond(200, serde_json::to_vec(&available).unwrap())
            }
        }
        "/api/echo/json" => respond(200, body.to_vec()),
        "/api/echo.1/empty" => respond(200, Vec::new()),
        "/api/math/add" => {
            let args: Value = serde_json::from_slice(&body).unwrap();
            let call = Call::new(0, metacom::Target::parse("math/add").unwrap(), args);
            let reply = answer(&call).remove(0);
            respond(200, serde_json::to_vec(&reply.outcome.unwrap()).unwrap())
        }
        _ => respond(500, b"{}".to_vec()),
    };
    Ok(rsp)
}

async fn start_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = Builder::new()
                    .serve_connection(
                        TokioIo::new(stream),
                        hyper::service::service_fn(handle_request),
                    )
                    .with_upgrades()
                    .await;
            });
        }
    });
    addr
}

async fn connect(addr: SocketAddr) -> Client {
    let config = ClientConfig {
        host: addr.to_string(),
        timeout: Some(Duration::from_secs(5)),
        ..Default::default()
    };
    Client::connect(config).await.unwrap()
}

#[tokio::test]
async fn test_load_and_call() {
    let _ = tracing_subscriber::fmt().try_init();

    let addr = start_server().await;
    let client = connect(addr).await;

    client.load(["math", "missing"]).await.unwrap();
    assert!(client.api().contains("math"));
    assert!(!client.api().contains("missing"));

    let math = client.interface("math").unwrap();
    let mut methods: Vec<_> = math.method_names().collect();
    methods.sort_unstable();
    assert_eq!(methods, ["add", "fail", "push"]);

    let sum = math.call("add", json!({"a": 2, "b": 3})).await.unwrap();
    assert_eq!(sum, json!(5));

    let error = client
        .api()
        .call("math", "fail", json!({}))
        .await
        .unwrap_err();
    assert_eq!(error.kind, ErrorKind::Remote);
    assert_eq!(error.code(), Some(&json!("E1")));
    assert_eq!(error.msg, "bad");

    // An event keyed by the call id settles that call.
    let pushed = math.method("push").unwrap().invoke().await.unwrap();
    assert_eq!(pushed, json!("pushed"));
    assert_eq!(client.pending_calls(), 0);
}

#[tokio::test]
async fn test_concurrent_socket_calls() {
    let addr = start_server().await;
    let client = connect(addr).await;
    let add = client.socket_call("math", Some("2")).method("add");

    let handles: Vec<_> = (0..64)
        .map(|i| tokio::spawn(add.call(json!({"a": i, "b": 1000}))))
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap(), Ok(json!(i + 1000)));
    }
    assert_eq!(client.pending_calls(), 0);
}

#[tokio::test]
async fn test_load_merges_per_interface() {
    let addr = start_server().await;
    let client = connect(addr).await;

    client.load(["math"]).await.unwrap();
    client.load(["text", "missing"]).await.unwrap();
    assert!(client.api().contains("math"));
    assert!(client.api().contains("text"));

    let upper = client
        .api()
        .call("text", "upper", json!({"text": "abc"}))
        .await
        .unwrap();
    assert_eq!(upper, json!("ABC"));
}

#[tokio::test]
async fn test_load_failure_propagates() {
    let addr = start_server().await;
    let client = connect(addr).await;

    let error = client.load(["math", "explode"]).await.unwrap_err();
    assert_eq!(error.kind, ErrorKind::HttpStatus);
    assert!(error.msg.contains("500"));
    assert!(client.api().is_empty());
}

#[tokio::test]
async fn test_http_calls() {
    let addr = start_server().await;
    let client = connect(addr).await;

    let echo = client.http_call("echo", None).method("json");
    assert_eq!(echo.call(json!({"x": 1})).await, Ok(json!({"x": 1})));
    // The pooled connection is reused for the next call.
    assert_eq!(echo.call(json!([1, 2])).await, Ok(json!([1, 2])));

    let empty = client.http_call("echo", Some("1")).method("empty");
    assert_eq!(empty.invoke().await, Ok(Value::Null));

    let error = client
        .http_call("status", None)
        .method("fail")
        .invoke()
        .await
        .unwrap_err();
    assert_eq!(error.kind, ErrorKind::HttpStatus);
    assert!(error.msg.contains("500"));
    assert!(error.code().is_none());
}

#[tokio::test]
async fn test_load_with_http_calls() {
    let addr = start_server().await;
    let config = ClientConfig {
        host: addr.to_string(),
        call_transport: Transport::Http,
        ..Default::default()
    };
    let client = Client::connect(config).await.unwrap();

    client.load(["math"]).await.unwrap();
    let sum: i64 = client
        .interface("math")
        .unwrap()
        .method("add")
        .unwrap()
        .request(&json!({"a": 40, "b": 2}))
        .await
        .unwrap();
    assert_eq!(sum, 42);
}

#[tokio::test]
async fn test_connect_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = ClientConfig {
        host: addr.to_string(),
        ..Default::default()
    };
    let error = Client::connect(config).await.unwrap_err();
    assert_eq!(error.kind, ErrorKind::WebSocketConnectFailed);
}

#[tokio::test]
async fn test_server_hangs_up_mid_call() {
    let addr = start_server().await;
    let client = connect(addr).await;

    let add = client.socket_call("math", None).method("add");
    assert_eq!(add.call(json!({"a": 1, "b": 1})).await, Ok(json!(2)));

    let error = client
        .socket_call("math", None)
        .method("hangup")
        .invoke()
        .await
        .unwrap_err();
    assert_eq!(error.kind, ErrorKind::WebSocketClosed);
    assert_eq!(client.pending_calls(), 0);
}

#[tokio::test]
async fn test_secure_connect_fails_cleanly() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        // Not a TLS server: every handshake sees the connection drop.
        while let Ok((stream, _)) = listener.accept().await {
            drop(stream);
        }
    });

    let config = ClientConfig {
        host: addr.to_string(),
        secure: true,
        ..Default::default()
    };
    assert_eq!(config.socket_url(), format!("wss://{addr}"));

    let connecting = tokio::spawn(Client::connect(config));
    let result = tokio::time::timeout(Duration::from_secs(5), connecting)
        .await
        .unwrap()
        .expect("connect must not panic");
    let error = result.err().unwrap();
    assert_eq!(error.kind, ErrorKind::WebSocketConnectFailed);
    assert!(error.msg.starts_with("wss://"));
}
