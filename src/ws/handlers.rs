//! WebSocket message dispatch
//!
//! The main entry point for handling client messages. Room and game
//! mutations live on `AppState`; this layer routes, maps engine errors to
//! private rejection notices, and arms shot timers once locks are
//! released.

use crate::protocol::{ClientMessage, PlayerInfo, RoomSnapshot, ServerMessage};
use crate::state::{game, ActionError, AppState, Effects};
use std::sync::Arc;

/// Handle client messages and return optional response
pub async fn handle_message(
    msg: ClientMessage,
    player_id: &str,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::CreateRoom {
            name,
            password,
            player_count,
        } => match state.create_room(player_id, name, password, player_count).await {
            Ok(handle) => {
                let room = handle.lock().await;
                let you = room.player(player_id).map(PlayerInfo::from)?;
                Some(ServerMessage::RoomCreated {
                    room: RoomSnapshot::from(&*room),
                    you,
                })
            }
            Err(msg) => Some(error("CREATE_FAILED", msg)),
        },

        ClientMessage::JoinRoom {
            room_id,
            password,
            username,
        } => match state.join_room(player_id, &room_id, password, username).await {
            Ok((room, you)) => Some(ServerMessage::RoomJoined { room, you }),
            Err(msg) => Some(error("JOIN_FAILED", msg)),
        },

        ClientMessage::LeaveRoom { room_id } => {
            if let Some(effects) = state.leave_room(player_id, &room_id).await {
                arm_timers(state, &room_id, effects);
            }
            None
        }

        ClientMessage::ToggleReady { room_id, is_ready } => {
            state.toggle_ready(player_id, &room_id, is_ready).await;
            None
        }

        ClientMessage::StartGame { room_id } => {
            match state.start_game(player_id, &room_id).await {
                Ok(()) => None,
                Err(msg) => Some(error("START_REJECTED", msg)),
            }
        }

        ClientMessage::AdvanceToVote { room_id } => {
            match state.advance_to_vote(player_id, &room_id).await {
                Ok(()) => None,
                Err(e) => reject(e),
            }
        }

        ClientMessage::GameAction { room_id, action } => {
            match state.apply_game_action(player_id, &room_id, action).await {
                Ok(effects) => {
                    arm_timers(state, &room_id, effects);
                    None
                }
                Err(e) => reject(e),
            }
        }

        ClientMessage::ChatMessage { room_id, message } => {
            handle_chat(state, player_id, &room_id, message).await
        }

        ClientMessage::Heartbeat => Some(ServerMessage::HeartbeatAck {
            ts: chrono::Utc::now().to_rfc3339(),
        }),

        ClientMessage::GetServerStatus => {
            let (rooms_count, active_games) = state.room_counts().await;
            Some(ServerMessage::ServerStatus {
                server_now: chrono::Utc::now().to_rfc3339(),
                stats: *state.stats.read().await,
                rooms_count,
                active_games,
            })
        }
    }
}

async fn handle_chat(
    state: &Arc<AppState>,
    player_id: &str,
    room_id: &str,
    message: String,
) -> Option<ServerMessage> {
    let handle = state.get_room(room_id).await?;
    let mut room = handle.lock().await;
    if room.player(player_id).is_none() {
        return Some(error("NOT_IN_ROOM", "you are not in this room"));
    }
    room.touch();

    let msg = ServerMessage::ChatMessage {
        player_id: player_id.to_string(),
        player_name: room.player_name(player_id),
        message,
        ts: chrono::Utc::now().to_rfc3339(),
    };
    state.notify_room(&room, msg).await;
    None
}

/// Engine rejections become private notices; a terminal game stays silent.
fn reject(err: ActionError) -> Option<ServerMessage> {
    match err {
        ActionError::TerminalState => None,
        e => Some(ServerMessage::Error {
            code: e.code().to_string(),
            msg: e.to_string(),
        }),
    }
}

fn error(code: &str, msg: impl Into<String>) -> ServerMessage {
    ServerMessage::Error {
        code: code.to_string(),
        msg: msg.into(),
    }
}

fn arm_timers(state: &Arc<AppState>, room_id: &str, effects: Effects) {
    if let Some(epoch) = effects.shot_armed {
        game::spawn_shot_timer(state.clone(), room_id.to_string(), epoch);
    }
}
