//! WebSocket connection loop.
//!
//! Forwards every WAL record from the event hub to the client in publish
//! order. The stream is live-only: a new subscriber sees only records
//! appended after it connected, and a lagging client loses its oldest
//! unread records rather than stalling the append path.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{WsMessage, WsMessageType};
use crate::wal::WalRecord;

/// Runs the read/write loop for a single WebSocket connection.
pub async fn run_connection(socket: WebSocket, mut event_rx: broadcast::Receiver<WalRecord>) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            // Incoming message from client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(_))) => {
                        // The event stream is read-only.
                        let err = WsMessage {
                            id: uuid::Uuid::new_v4().to_string(),
                            msg_type: WsMessageType::Error,
                            timestamp: chrono::Utc::now(),
                            payload: serde_json::json!({
                                "code": 400,
                                "message": "event stream accepts no commands"
                            }),
                        };
                        let json = serde_json::to_string(&err).unwrap_or_default();
                        if ws_tx.send(Message::text(json)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
            // Record from the event hub
            event = event_rx.recv() => {
                match event {
                    Ok(record) => {
                        let msg = WsMessage {
                            id: uuid::Uuid::new_v4().to_string(),
                            msg_type: WsMessageType::Event,
                            timestamp: chrono::Utc::now(),
                            payload: serde_json::to_value(&record).unwrap_or_default(),
                        };
                        let json = serde_json::to_string(&msg).unwrap_or_default();
                        if ws_tx.send(Message::text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "ws client lagged behind event hub");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!("ws connection closed");
}
