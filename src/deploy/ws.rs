use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

use super::models::Deployment;

/// How often to send WebSocket Ping frames.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// How long after an unanswered Ping the connection is dropped.
const PONG_TIMEOUT: Duration = Duration::from_secs(60);

// ── WebSocket message types ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    DeploymentCreated { deployment: Deployment },
    DeploymentUpdated { deployment: Deployment },
    DeploymentDeleted { deployment_id: String },
}

// ── Handler ──────────────────────────────────────────────────────────

/// Upgrade to a WebSocket that streams every broadcast deployment event.
pub async fn ws_handler_with_sender(
    ws: WebSocketUpgrade,
    tx: broadcast::Sender<String>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, tx))
}

async fn handle_socket(socket: WebSocket, tx: broadcast::Sender<String>) {
    stream_events(socket, tx.subscribe()).await;
}

/// True once a ping has gone unanswered past its deadline.
fn pong_overdue(deadline: Option<Instant>, now: Instant) -> bool {
    deadline.is_some_and(|d| now >= d)
}

/// Push deployment events to one client until it leaves or stops answering pings.
async fn stream_events(socket: WebSocket, mut events: broadcast::Receiver<String>) {
    let (mut outbound, mut inbound) = socket.split();
    let mut heartbeat = tokio::time::interval_at(Instant::now() + PING_INTERVAL, PING_INTERVAL);
    // Set by the first unanswered ping, cleared by any pong.
    let mut pong_deadline: Option<Instant> = None;

    let reason = loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                if pong_overdue(pong_deadline, Instant::now()) {
                    break "pong timeout";
                }
                if outbound.send(Message::Ping(Default::default())).await.is_err() {
                    break "ping send failed";
                }
                pong_deadline.get_or_insert_with(|| Instant::now() + PONG_TIMEOUT);
            }

            event = events.recv() => match event {
                Ok(json) => {
                    if outbound.send(Message::Text(json.into())).await.is_err() {
                        break "event send failed";
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "WebSocket client lagged behind deployment events");
                }
                Err(broadcast::error::RecvError::Closed) => break "event channel closed",
            },

            frame = inbound.next() => match frame {
                Some(Ok(Message::Pong(_))) => pong_deadline = None,
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break "client closed",
                Some(Ok(_)) => {}
            },
        }
    };

    tracing::debug!(reason, "Closing deployment event socket");
    let _ = outbound.send(Message::Close(None)).await;
}

// ── Broadcast helper ─────────────────────────────────────────────────

/// Serialize and broadcast a WsMessage to all connected clients.
/// Having no subscribers is not an error.
pub fn broadcast_message(tx: &broadcast::Sender<String>, msg: &WsMessage) {
    match serde_json::to_string(msg) {
        Ok(json) => {
            let _ = tx.send(json);
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize WsMessage");
        }
    }
}
