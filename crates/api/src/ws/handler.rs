use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};

use crate::state::AppState;
use crate::ws::broker::Broker;

/// HTTP handler that upgrades the connection to WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let write_timeout = state.config.write_timeout;
    ws.on_upgrade(move |socket| handle_socket(socket, state.broker, write_timeout))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the connection with the broker, which queues its greeting.
///   2. Spawns a writer task that drains the broker channel, bounding each
///      write by `write_timeout`.
///   3. Feeds inbound text frames to the broker on the current task.
///   4. Cleans up when either side ends.
async fn handle_socket(socket: WebSocket, broker: Arc<Broker>, write_timeout: Duration) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, "WebSocket connected");

    let mut rx = broker.accept(conn_id.clone()).await;

    let (mut sink, mut stream) = socket.split();

    let writer_conn_id = conn_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            match tokio::time::timeout(write_timeout, sink.send(msg)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::debug!(conn_id = %writer_conn_id, error = %e, "WebSocket sink closed");
                    break;
                }
                Err(_) => {
                    tracing::warn!(conn_id = %writer_conn_id, "WebSocket write timed out");
                    break;
                }
            }
            if closing {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => broker.on_message(&conn_id, text.as_str()).await,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                    break;
                }
            },
            _ = &mut send_task => break,
        }
    }

    broker.on_close(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "WebSocket disconnected");
}
