pub mod handlers;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::{game, AppState};

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // The connection id doubles as the player id for its lifetime
    let player_id = ulid::Ulid::new().to_string();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    state.register_connection(&player_id, tx).await;

    tracing::info!("connection established: {}", player_id);

    let greeting = ServerMessage::ConnectionEstablished {
        player_id: player_id.clone(),
        server_now: chrono::Utc::now().to_rfc3339(),
        stats: *state.stats.read().await,
    };
    if let Ok(msg) = serde_json::to_string(&greeting) {
        if sender.send(Message::Text(msg.into())).await.is_err() {
            tracing::error!("failed to send greeting to {}", player_id);
            state.disconnect(&player_id).await;
            return;
        }
    }

    loop {
        tokio::select! {
            // Outbound: room broadcasts and private notices queued for us
            outbound = rx.recv() => {
                match outbound {
                    Some(msg) => {
                        if let Ok(json) = serde_json::to_string(&msg) {
                            if sender.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    None => break,
                }
            }

            // Inbound: client messages
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("received message: {}", text);

                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                if let Some(response) =
                                    handlers::handle_message(client_msg, &player_id, &state).await
                                {
                                    if let Ok(json) = serde_json::to_string(&response) {
                                        if sender.send(Message::Text(json.into())).await.is_err() {
                                            tracing::error!("failed to send response");
                                            break;
                                        }
                                    }
                                }
                            }
                            Err(e) => {
                                tracing::error!("failed to parse client message: {}", e);
                                let error = ServerMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    msg: format!("invalid message format: {}", e),
                                };
                                if let Ok(json) = serde_json::to_string(&error) {
                                    let _ = sender.send(Message::Text(json.into())).await;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("websocket closed by {}", player_id);
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("websocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    // Dropping out of a running game may complete a vote or cancel a
    // pending hunter shot; the effects tell us whether a timer is due.
    if let Some((room_id, effects)) = state.disconnect(&player_id).await {
        if let Some(epoch) = effects.shot_armed {
            game::spawn_shot_timer(state.clone(), room_id, epoch);
        }
    }

    tracing::info!("connection closed: {}", player_id);
}
