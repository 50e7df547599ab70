pub mod game;
mod night;
mod room;
mod vote;
pub mod win;

use crate::config::GameRules;
use crate::protocol::ServerMessage;
use crate::types::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::time::Instant;

pub use game::Effects;

/// A room behind its own mutex. Action events for one room are serialized
/// by this lock; distinct rooms proceed in parallel.
pub type RoomHandle = Arc<Mutex<Room>>;

/// Why a client event was ignored. None of these are fatal; they all
/// degrade to no-ops, most with a private rejection notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("action is not valid for your role in the current phase")]
    InvalidTransition,
    #[error("that single-use ability has already been spent")]
    ResourceExhausted,
    #[error("target is not a member of this room")]
    UnknownTarget,
    #[error("the game has already ended")]
    TerminalState,
    #[error("no game is running in this room")]
    NotInGame,
    #[error("dead players cannot act")]
    Dead,
}

impl ActionError {
    pub fn code(&self) -> &'static str {
        match self {
            ActionError::InvalidTransition => "INVALID_TRANSITION",
            ActionError::ResourceExhausted => "RESOURCE_EXHAUSTED",
            ActionError::UnknownTarget => "UNKNOWN_TARGET",
            ActionError::TerminalState => "TERMINAL_STATE",
            ActionError::NotInGame => "NO_GAME",
            ActionError::Dead => "DEAD",
        }
    }
}

/// What a successfully applied action wants the caller to send out.
#[derive(Debug, Default)]
pub struct ActionOutcome {
    /// Room-visible announcements, in order
    pub messages: Vec<String>,
    /// Messages for exactly one recipient (seer result, hunter prompt)
    pub private: Vec<(PlayerId, ServerMessage)>,
    /// A hunter shot was armed with this epoch; the caller must start the
    /// timeout timer after releasing the room lock
    pub shot_armed: Option<u64>,
}

impl ActionOutcome {
    pub fn say(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }
}

/// Shared application state: the room registry, one outbound channel per
/// connection, and connection counters.
pub struct AppState {
    pub rules: GameRules,
    pub rooms: RwLock<HashMap<RoomId, RoomHandle>>,
    pub connections: RwLock<HashMap<PlayerId, mpsc::UnboundedSender<ServerMessage>>>,
    pub stats: RwLock<ConnectionStats>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_rules(GameRules::default())
    }

    pub fn with_rules(rules: GameRules) -> Self {
        Self {
            rules,
            rooms: RwLock::new(HashMap::new()),
            connections: RwLock::new(HashMap::new()),
            stats: RwLock::new(ConnectionStats::default()),
            started_at: Instant::now(),
        }
    }

    /// Send to a single connection. Disconnected recipients are dropped
    /// silently; the disconnect path cleans up the registry.
    pub async fn notify_player(&self, player_id: &str, msg: ServerMessage) {
        if let Some(tx) = self.connections.read().await.get(player_id) {
            let _ = tx.send(msg);
        }
    }

    /// Broadcast to every member of a room.
    pub async fn notify_room(&self, room: &Room, msg: ServerMessage) {
        let connections = self.connections.read().await;
        for player in &room.players {
            if let Some(tx) = connections.get(&player.id) {
                let _ = tx.send(msg.clone());
            }
        }
    }

    /// Broadcast to every member except one (typically the event's actor,
    /// who gets a direct response instead).
    pub async fn notify_room_except(&self, room: &Room, except: &str, msg: ServerMessage) {
        let connections = self.connections.read().await;
        for player in room.players.iter().filter(|p| p.id != except) {
            if let Some(tx) = connections.get(&player.id) {
                let _ = tx.send(msg.clone());
            }
        }
    }

    /// Send everything an ActionOutcome collected, then the state snapshot.
    pub async fn flush_outcome(&self, room: &Room, outcome: &ActionOutcome) {
        for message in &outcome.messages {
            self.notify_room(
                room,
                ServerMessage::GameMessage {
                    message: message.clone(),
                    ts: chrono::Utc::now().to_rfc3339(),
                },
            )
            .await;
        }
        for (player_id, msg) in &outcome.private {
            self.notify_player(player_id, msg.clone()).await;
        }
        self.notify_room(
            room,
            ServerMessage::GameStateUpdated {
                room: crate::protocol::RoomSnapshot::from(room),
            },
        )
        .await;
    }

    /// (total rooms, rooms with a started, unfinished game)
    pub async fn room_counts(&self) -> (usize, usize) {
        let rooms = self.rooms.read().await;
        let total = rooms.len();
        let mut active = 0;
        for handle in rooms.values() {
            let room = handle.lock().await;
            if room.is_game_started && !room.is_game_over {
                active += 1;
            }
        }
        (total, active)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use crate::types::{GameState, Player, Role};

    /// Build a started room with the given roles, bypassing the lobby
    /// handshake. Player ids are "p0", "p1", … in role order.
    pub async fn started_room(state: &AppState, roles: &[Role]) -> RoomHandle {
        let handle = state
            .create_room("p0", None, None, Some(roles.len().max(6)))
            .await
            .expect("create_room");
        {
            let mut room = handle.lock().await;
            room.players.clear();
            for (i, role) in roles.iter().enumerate() {
                let mut p = Player::new(format!("p{}", i), format!("player-{}", i));
                p.is_host = i == 0;
                p.is_ready = true;
                p.role = Some(*role);
                room.players.push(p);
            }
            room.is_game_started = true;
            room.game = Some(GameState::new());
        }
        handle
    }

    pub async fn room_id(handle: &RoomHandle) -> RoomId {
        handle.lock().await.id.clone()
    }
}
