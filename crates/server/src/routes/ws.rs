// crates/server/src/routes/ws.rs
//! GET /api/ws/{session_id} - live progress channel for one session.
//!
//! On connect the server reaps stale registrations, registers this socket
//! (closing any previous one for the session) and sends a `connected` frame.
//! Client text `ping` is answered with `pong`; other client frames are
//! ignored. After the idle timeout without client frames the server sends
//! `{"type":"ping"}`; if that cannot be queued the socket is torn down.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::registry::{LiveMessage, Outbound, SubscriberRegistry};
use crate::state::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, session_id, state))
}

async fn handle_socket(socket: WebSocket, session_id: String, state: Arc<AppState>) {
    let (mut sink, mut stream) = socket.split();

    state
        .registry
        .reap_stale(state.settings.stale_connection());

    // Queue `connected` before registering so it precedes any progress frame.
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();
    let connected = LiveMessage::Connected {
        session_id: &session_id,
        message: "WebSocket connection established",
    };
    if let Ok(text) = connected.to_json() {
        let _ = tx.send(Outbound::Text(text));
    }
    let connection_id = state.registry.register(&session_id, tx.clone());

    // Writer: drain queued frames into the socket.
    let forward_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            match frame {
                Outbound::Text(text) => {
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    serve_connection(
        &mut stream,
        &tx,
        &state.registry,
        &session_id,
        connection_id,
        state.settings.ws_idle_timeout(),
    )
    .await;
    forward_task.abort();
}

/// Read client frames until the socket ends or the keep-alive ping cannot be
/// queued, then drop this connection's registration.
async fn serve_connection<S>(
    stream: &mut S,
    tx: &mpsc::UnboundedSender<Outbound>,
    registry: &SubscriberRegistry,
    session_id: &str,
    connection_id: u64,
    idle: Duration,
) where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    loop {
        match tokio::time::timeout(idle, stream.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                if text.as_str() == "ping" && tx.send(Outbound::Text("pong".into())).is_err() {
                    break;
                }
            }
            Ok(Some(Ok(Message::Close(_)))) | Ok(Some(Err(_))) | Ok(None) => break,
            // Binary and protocol ping/pong frames are ignored; axum answers pings.
            Ok(Some(Ok(_))) => {}
            Err(_) => {
                let ping = match LiveMessage::Ping.to_json() {
                    Ok(ping) => ping,
                    Err(_) => break,
                };
                if tx.send(Outbound::Text(ping)).is_err() {
                    debug!(session_id, "Keep-alive ping failed");
                    break;
                }
            }
        }
    }

    registry.unregister_connection(session_id, connection_id);
    info!(session_id, connection_id, "Live connection ended");
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/ws/{session_id}", get(ws_handler))
}
