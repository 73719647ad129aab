//! WebSocket endpoint streaming task events to subscribers.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::{IntoResponse, Json};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tracing::{debug, warn};

use super::AppState;
use crate::domain::models::{ClientMessage, ServerMessage};

/// Body of `/ws/health`.
#[derive(Debug, Serialize)]
pub struct RealtimeHealth {
    /// Open WebSocket connections.
    pub connections: usize,
    /// Always `ok`.
    pub status: &'static str,
}

/// `GET /ws/health`
pub async fn ws_health(State(state): State<AppState>) -> Json<RealtimeHealth> {
    Json(RealtimeHealth {
        connections: state.dispatcher.streams().connection_count().await,
        status: "ok",
    })
}

/// `GET /ws`: upgrade and stream events for subscribed tasks.
pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let streams = state.dispatcher.streams().clone();
    let (id, mut outbound) = streams.connect().await;
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Outbound pump: ends when the stream manager drops the connection.
    let mut pump = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to encode realtime message");
                    continue;
                }
            };
            if ws_tx.send(WsMessage::Text(json.into())).await.is_err() {
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    loop {
        tokio::select! {
            _ = &mut pump => break,
            frame = ws_rx.next() => {
                let text = match frame {
                    Some(Ok(WsMessage::Text(text))) => text,
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => {
                        debug!(connection_id = %id, error = %err, "websocket receive error");
                        break;
                    }
                };

                match serde_json::from_str::<ClientMessage>(text.as_str()) {
                    Ok(ClientMessage::Subscribe { task_id }) => {
                        streams.subscribe(id, task_id).await;
                    }
                    Ok(ClientMessage::Unsubscribe { task_id }) => {
                        streams.unsubscribe(id, task_id).await;
                    }
                    Err(err) => {
                        let reply = ServerMessage::Error {
                            message: format!("invalid message: {err}"),
                        };
                        streams.send_to(id, reply).await;
                    }
                }
            }
        }
    }

    streams.remove_connection(id).await;
    pump.abort();
}
