#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::ws::Message;
use axum::http::{Request, Response};
use axum::Router;
use futures::{SinkExt, StreamExt};
use http_body_util::BodyExt;
use relaydeck_core::ConsoleHost;
use relaydeck_worker::ExitHandler;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tower::ServiceExt;

use relaydeck_api::config::{ServerConfig, TransportMode};
use relaydeck_api::server::{self, Deck};

/// Upper bound for any single expected frame.
pub const FRAME_TIMEOUT: Duration = Duration::from_secs(2);

/// Build a test `ServerConfig` bound to loopback with ephemeral ports.
pub fn test_config(mode: TransportMode, dir: &Path) -> ServerConfig {
    ServerConfig {
        mode,
        host: "127.0.0.1".to_string(),
        ws_port: 0,
        http_port: 0,
        jobs_dir: dir.join("scripts"),
        ui_dir: dir.join("ui"),
        ..ServerConfig::default()
    }
}

/// Records `EXIT` instead of terminating the test process.
#[derive(Default)]
pub struct RecordingExit {
    called: AtomicBool,
}

impl RecordingExit {
    pub fn called(&self) -> bool {
        self.called.load(Ordering::SeqCst)
    }
}

impl ExitHandler for RecordingExit {
    fn exit(&self) {
        self.called.store(true, Ordering::SeqCst);
    }
}

pub async fn deck(config: ServerConfig, exit: Arc<RecordingExit>) -> Deck {
    server::assemble(config, Arc::new(ConsoleHost), exit).await
}

/// Write a job script into `<dir>/scripts`.
pub fn write_script(dir: &Path, name: &str, body: &str) {
    let scripts = dir.join("scripts");
    std::fs::create_dir_all(&scripts).unwrap();
    std::fs::write(scripts.join(format!("{name}.json")), body).unwrap();
}

/// A script that idles until stopped.
pub const IDLE_SCRIPT: &str = r#"{"loop": [{"op": "wait", "ms": 20}]}"#;

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

// ---------------------------------------------------------------------------
// Broker channel helpers
// ---------------------------------------------------------------------------

/// Next queued frame on a broker connection channel, parsed as JSON.
pub async fn next_frame(rx: &mut UnboundedReceiver<Message>) -> Value {
    let message = tokio::time::timeout(FRAME_TIMEOUT, rx.recv())
        .await
        .expect("frame within timeout")
        .expect("channel open");
    match message {
        Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("expected a text frame, got {other:?}"),
    }
}

/// Assert nothing is queued on `rx`.
pub fn assert_idle(rx: &mut UnboundedReceiver<Message>) {
    if let Ok(message) = rx.try_recv() {
        panic!("unexpected frame: {message:?}");
    }
}

// ---------------------------------------------------------------------------
// Socket helpers
// ---------------------------------------------------------------------------

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Serve `app` on an ephemeral loopback port.
pub async fn serve(app: Router) -> SocketAddr {
    let listener = server::bind("127.0.0.1", 0).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

pub async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/"))
        .await
        .unwrap();
    client
}

pub async fn send(client: &mut Client, frame: Value) {
    client
        .send(tokio_tungstenite::tungstenite::Message::Text(frame.to_string()))
        .await
        .unwrap();
}

pub async fn send_raw(client: &mut Client, text: &str) {
    client
        .send(tokio_tungstenite::tungstenite::Message::Text(text.to_string()))
        .await
        .unwrap();
}

/// Next text frame from the server, parsed as JSON.
pub async fn recv(client: &mut Client) -> Value {
    loop {
        let message = tokio::time::timeout(FRAME_TIMEOUT, client.next())
            .await
            .expect("frame within timeout")
            .expect("socket open")
            .unwrap();
        if let tokio_tungstenite::tungstenite::Message::Text(text) = message {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Read frames until one has `type == tag`.
pub async fn recv_tag(client: &mut Client, tag: &str) -> Value {
    loop {
        let frame = recv(client).await;
        if frame["type"] == tag {
            return frame;
        }
    }
}

/// Assert no text frame arrives within `window`.
pub async fn assert_quiet(client: &mut Client, window: Duration) {
    if let Ok(Some(Ok(tokio_tungstenite::tungstenite::Message::Text(text)))) =
        tokio::time::timeout(window, client.next()).await
    {
        panic!("unexpected frame: {text}");
    }
}
