//! services/api/src/web/ws_handler.rs
//!
//! Entry point and control loop for a live notification connection. Each
//! socket is registered under the authenticated user until it closes.

use crate::web::{
    extract::CurrentUser,
    protocol::{ClientMessage, ServerMessage},
    state::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// The handler for upgrading HTTP requests to WebSocket connections.
#[utoipa::path(
    get,
    path = "/ws",
    responses(
        (status = 101, description = "Switching to the live notification protocol"),
        (status = 401, description = "Not authenticated")
    ),
    tag = "Realtime"
)]
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, user.id))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, user_id: Uuid) {
    info!("New WebSocket connection established for user: {}", user_id);

    let (mut sink, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    // --- 1. Registration ---
    let connection = app_state.connections.register(user_id, tx.clone());
    if tx.send(ServerMessage::Registered { user_id }).is_err() {
        app_state.connections.unregister(connection);
        return;
    }

    // --- 2. Outbound Pump ---
    // Everything addressed to this socket goes through the channel, so the
    // registry never touches the sink directly.
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize server message: {:?}", e);
                    continue;
                }
            };
            if sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // --- 3. Inbound Loop ---
    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => handle_text_message(text.as_str(), &tx),
            Ok(Message::Close(_)) => {
                info!("Client sent close message.");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket error for user {}: {}", user_id, e);
                break;
            }
        }
    }

    // --- 4. Cleanup ---
    app_state.connections.unregister(connection);
    writer.abort();
    info!("WebSocket connection closed for user: {}", user_id);
}

fn handle_text_message(text: &str, tx: &mpsc::UnboundedSender<ServerMessage>) {
    let reply = match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Ping) => ServerMessage::Pong,
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
            ServerMessage::Error {
                message: "Unrecognized message".to_string(),
            }
        }
    };
    // The pump only stops once the socket is gone.
    let _ = tx.send(reply);
}
