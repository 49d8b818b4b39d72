//! Agent endpoints: listing and the OpAMP WebSocket

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use futures::{SinkExt, StreamExt};

use crate::agent::{AgentRegistry, AgentSummary, AgentToServer};
use crate::server::state::AppState;

/// GET /agents - Connected agents and their harvested records.
pub async fn list_handler(State(state): State<AppState>) -> Json<Vec<AgentSummary>> {
    Json(state.agents.list())
}

/// GET /v1/opamp - Agent WebSocket upgrade.
pub async fn opamp_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let registry = state.agents.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, registry))
}

async fn handle_socket(socket: WebSocket, registry: Arc<AgentRegistry>) {
    let connection_id = uuid::Uuid::new_v4().to_string();
    let cancel = registry.on_connected(&connection_id);
    let (mut sender, mut receiver) = socket.split();

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = receiver.next() => frame,
        };

        let data = match frame {
            Some(Ok(Message::Text(text))) => text.into_bytes(),
            Some(Ok(Message::Binary(bytes))) => bytes,
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                tracing::debug!(connection_id = %connection_id, error = %e, "Agent socket error");
                break;
            }
        };

        let msg: AgentToServer = match serde_json::from_slice(&data) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(connection_id = %connection_id, error = %e, "Malformed agent frame");
                continue;
            }
        };

        let reply = registry.on_message(&connection_id, &msg).await;
        if let Ok(json) = serde_json::to_string(&reply) {
            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }

        if msg.agent_disconnect.is_some() {
            let _ = sender.send(Message::Close(None)).await;
            break;
        }
    }

    registry.on_connection_close(&connection_id);
}
