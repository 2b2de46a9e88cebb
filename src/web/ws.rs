use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::debug;

use crate::registry::OUTBOUND_BUFFER;
use crate::web::AppState;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    /// Caller-supplied client identifier; reconnecting with the same id
    /// replaces the previous session.
    pub client_id: String,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params.client_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, client_id: String) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Message>(OUTBOUND_BUFFER);

    state.registry.register(&client_id, tx.clone()).await;
    debug!(client_id = %client_id, "websocket connected");

    // Writer task: forwards queued frames to the socket. A close frame
    // (eviction by a newer session) ends the stream.
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if ws_sender.send(message).await.is_err() || closing {
                break;
            }
        }
    });

    // Inbound loop: "ping" gets a pong with the live client count,
    // everything else is ignored.
    while let Some(message) = ws_receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                if text == "ping" {
                    let reply = json!({
                        "type": "pong",
                        "message": "Connected",
                        "client_id": client_id,
                        "total_clients": state.registry.client_count().await,
                    });
                    if tx.send(Message::Text(reply.to_string())).await.is_err() {
                        break;
                    }
                }
            }
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    state.registry.remove(&client_id, &tx).await;
    writer.abort();
    debug!(client_id = %client_id, "websocket disconnected");
}
