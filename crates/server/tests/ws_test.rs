//! Integration tests for the live progress channel.
//!
//! The app is served on an ephemeral port so real WebSocket clients can
//! connect; uploads go through the same router with `oneshot`.

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use docflow_db::Database;
use docflow_server::{create_app, AppState, Settings};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tower::ServiceExt;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const BOUNDARY: &str = "docflow-ws-boundary";

async fn serve(settings: Settings) -> (SocketAddr, Router) {
    let db = Database::new_in_memory().await.expect("in-memory DB for tests");
    let app = create_app(AppState::new(db, settings));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let served = app.clone();
    tokio::spawn(async move {
        axum::serve(listener, served).await.unwrap();
    });
    (addr, app)
}

async fn connect(addr: SocketAddr, session_id: &str) -> Client {
    let (client, _) = connect_async(format!("ws://{addr}/api/ws/{session_id}"))
        .await
        .expect("websocket handshake");
    client
}

/// Next text frame, skipping protocol frames. Panics after `wait`.
async fn next_text(client: &mut Client, wait: Duration) -> String {
    loop {
        let frame = tokio::time::timeout(wait, client.next())
            .await
            .expect("frame before timeout")
            .expect("stream still open")
            .expect("valid frame");
        match frame {
            Message::Text(text) => return text.as_str().to_string(),
            Message::Close(_) => panic!("connection closed"),
            _ => continue,
        }
    }
}

async fn next_json(client: &mut Client) -> Value {
    let text = next_text(client, Duration::from_secs(5)).await;
    serde_json::from_str(&text).expect("JSON frame")
}

#[tokio::test]
async fn test_connect_receives_connected_frame() {
    let (addr, _) = serve(Settings::default()).await;
    let mut client = connect(addr, "s-1").await;

    let frame = next_json(&mut client).await;
    assert_eq!(frame["type"], "connected");
    assert_eq!(frame["session_id"], "s-1");
    assert_eq!(frame["message"], "WebSocket connection established");
}

#[tokio::test]
async fn test_text_ping_is_answered_with_pong() {
    let (addr, _) = serve(Settings::default()).await;
    let mut client = connect(addr, "s-1").await;
    next_json(&mut client).await;

    client.send(Message::text("ping")).await.unwrap();
    let reply = next_text(&mut client, Duration::from_secs(5)).await;
    assert_eq!(reply, "pong");

    // Other client text is ignored.
    client.send(Message::text("hello")).await.unwrap();
    client.send(Message::text("ping")).await.unwrap();
    assert_eq!(next_text(&mut client, Duration::from_secs(5)).await, "pong");
}

#[tokio::test]
async fn test_idle_connection_gets_keepalive_ping() {
    let settings = Settings {
        ws_idle_timeout_secs: 1,
        ..Settings::default()
    };
    let (addr, _) = serve(settings).await;
    let mut client = connect(addr, "s-1").await;
    next_json(&mut client).await;

    let ping: Value = serde_json::from_str(&next_text(&mut client, Duration::from_secs(5)).await)
        .unwrap();
    assert_eq!(ping, serde_json::json!({"type": "ping"}));
}

async fn live_connections(app: &Router) -> u64 {
    let response = app
        .clone()
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let health: Value = serde_json::from_slice(&bytes).unwrap();
    health["live_connections"].as_u64().unwrap()
}

#[tokio::test]
async fn test_vanished_client_is_unregistered_after_idle_timeout() {
    let settings = Settings {
        ws_idle_timeout_secs: 1,
        ..Settings::default()
    };
    let (addr, app) = serve(settings).await;
    let mut client = connect(addr, "s-gone").await;
    next_json(&mut client).await;
    assert_eq!(live_connections(&app).await, 1);

    // Drop the TCP stream without a close frame.
    drop(client);
    tokio::time::sleep(Duration::from_millis(2500)).await;

    let mut remaining = live_connections(&app).await;
    for _ in 0..50 {
        if remaining == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        remaining = live_connections(&app).await;
    }
    assert_eq!(remaining, 0);

    // The session can connect again afterwards.
    let mut again = connect(addr, "s-gone").await;
    assert_eq!(next_json(&mut again).await["type"], "connected");
    assert_eq!(live_connections(&app).await, 1);
}

#[tokio::test]
async fn test_new_connection_replaces_old_one() {
    let (addr, _) = serve(Settings::default()).await;
    let mut first = connect(addr, "s-1").await;
    next_json(&mut first).await;

    let mut second = connect(addr, "s-1").await;
    next_json(&mut second).await;

    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match first.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "first connection should be closed");

    second.send(Message::text("ping")).await.unwrap();
    assert_eq!(next_text(&mut second, Duration::from_secs(5)).await, "pong");
}

#[tokio::test]
async fn test_upload_progress_is_pushed_to_session() {
    let dir = TempDir::new().unwrap();
    let settings = Settings {
        upload_dir: Some(dir.path().to_path_buf()),
        ..Settings::default()
    };
    let (addr, app) = serve(settings).await;
    let mut client = connect(addr, "s-live").await;
    next_json(&mut client).await;

    let content = "Overview\n\nEverything shipped on time.\n\n| a | b |\n";
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"session_id\"\r\n\r\ns-live\r\n\
         --{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"status.md\"\r\n\r\n{content}\r\n\
         --{BOUNDARY}--\r\n"
    );
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/upload")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let upload: Value = serde_json::from_slice(&bytes).unwrap();
    let document_id = upload["document_id"].as_str().unwrap().to_string();

    let mut frames = Vec::new();
    loop {
        let frame = next_json(&mut client).await;
        assert_eq!(frame["type"], "progress");
        assert_eq!(frame["document_id"], document_id.as_str());
        let done = frame["stage"] == "completed" || frame["status"] == "error";
        frames.push(frame);
        if done {
            break;
        }
    }

    assert_eq!(frames[0]["stage"], "uploading");
    assert_eq!(frames[0]["progress"], 100);
    let stages: Vec<&str> = frames.iter().map(|f| f["stage"].as_str().unwrap()).collect();
    for stage in ["partitioning", "chunking", "vectorization"] {
        assert!(stages.contains(&stage), "missing {stage} in {stages:?}");
    }

    let last = frames.last().unwrap();
    assert_eq!(last["status"], "completed");
    assert_eq!(last["progress"], 100);
    assert_eq!(last["details"]["filename"], "status.md");
    assert_eq!(last["details"]["elements_count"], 3);
    assert!(last["details"]["chunk_details"].is_array());
}
