use std::time::Duration;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink, stream::SplitStream};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::pipeline::models::{Lead, LeadId, StageId};

/// How often to send WebSocket Ping frames.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// How long to wait for a Pong before the connection is considered dead.
const PONG_TIMEOUT: Duration = Duration::from_secs(60);

// ── WebSocket message types ──────────────────────────────────────────

/// Lead events pushed to every connected board. Each carries the company it
/// belongs to; clients drop events for other companies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    #[serde(rename_all = "camelCase")]
    LeadCreated { company_id: String, lead: Lead },
    #[serde(rename_all = "camelCase")]
    LeadUpdated { company_id: String, lead: Lead },
    #[serde(rename_all = "camelCase")]
    LeadMoved {
        company_id: String,
        lead_id: LeadId,
        from_stage_id: StageId,
        to_stage_id: StageId,
        version: i64,
    },
}

pub async fn ws_handler_with_sender(
    ws: WebSocketUpgrade,
    tx: broadcast::Sender<String>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, tx))
}

async fn handle_socket(socket: WebSocket, tx: broadcast::Sender<String>) {
    let (sender, receiver) = socket.split();
    let rx = tx.subscribe();
    tracing::debug!(subscribers = tx.receiver_count(), "WebSocket client connected");
    run_socket_loop(sender, receiver, rx).await;
    tracing::debug!("WebSocket client disconnected");
}

/// Forward broadcasts to one client, with ping/pong keepalive.
///
/// Exits when the client closes, errors, or misses a pong for longer than
/// [`PONG_TIMEOUT`].
async fn run_socket_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    mut rx: broadcast::Receiver<String>,
) {
    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    // First tick fires immediately.
    ping_interval.tick().await;

    let mut last_pong = Instant::now();
    let mut awaiting_pong = false;

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if awaiting_pong && last_pong.elapsed() > PONG_TIMEOUT {
                    tracing::debug!("WebSocket pong timeout");
                    break;
                }
                if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
                awaiting_pong = true;
            }

            result = rx.recv() => {
                match result {
                    Ok(msg) => {
                        if sender.send(Message::Text(msg.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "WebSocket client lagging; events dropped");
                        continue;
                    }
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        last_pong = Instant::now();
                        awaiting_pong = false;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    let _ = sender.send(Message::Close(None)).await;
}

// ── Broadcast helper ─────────────────────────────────────────────────

/// Serialize and broadcast a message to all connected clients. No receivers
/// is not an error.
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::models::NewLead;

    fn lead() -> Lead {
        Lead::from_new(LeadId::new("L1"), StageId::from(1), NewLead {
            name: "Asha".into(),
            ..Default::default()
        })
    }

    #[test]
    fn test_lead_created_serialization() {
        let msg = WsMessage::LeadCreated {
            company_id: "acme".into(),
            lead: lead(),
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "LeadCreated");
        assert_eq!(json["data"]["companyId"], "acme");
        assert_eq!(json["data"]["lead"]["leadId"], "L1");
    }

    #[test]
    fn test_lead_moved_serialization() {
        let msg = WsMessage::LeadMoved {
            company_id: "acme".into(),
            lead_id: LeadId::new("L1"),
            from_stage_id: StageId::from(1),
            to_stage_id: StageId::from(4),
            version: 3,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"LeadMoved\""));
        assert!(json.contains("\"fromStageId\":1"));
        assert!(json.contains("\"toStageId\":4"));

        let back: WsMessage = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, WsMessage::LeadMoved { version: 3, .. }));
    }

    #[test]
    fn test_broadcast_reaches_subscribers() {
        let (tx, mut rx) = broadcast::channel(4);
        broadcast_message(&tx, &WsMessage::LeadUpdated {
            company_id: "acme".into(),
            lead: lead(),
        });
        let got = rx.try_recv().unwrap();
        assert!(got.contains("LeadUpdated"));
    }

    #[test]
    fn test_broadcast_without_subscribers_is_silent() {
        let (tx, rx) = broadcast::channel::<String>(4);
        drop(rx);
        broadcast_message(&tx, &WsMessage::LeadUpdated {
            company_id: "acme".into(),
            lead: lead(),
        });
    }
}
