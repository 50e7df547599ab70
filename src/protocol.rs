use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    CreateRoom {
        name: Option<String>,
        password: Option<String>,
        player_count: Option<usize>,
    },
    JoinRoom {
        room_id: RoomId,
        password: Option<String>,
        username: Option<String>,
    },
    LeaveRoom {
        room_id: RoomId,
    },
    ToggleReady {
        room_id: RoomId,
        is_ready: bool,
    },
    /// Host command: assign roles and enter the first night
    StartGame {
        room_id: RoomId,
    },
    /// Host command: close the day discussion and open voting
    AdvanceToVote {
        room_id: RoomId,
    },
    GameAction {
        room_id: RoomId,
        #[serde(flatten)]
        action: PlayerAction,
    },
    ChatMessage {
        room_id: RoomId,
        message: String,
    },
    Heartbeat,
    GetServerStatus,
}

/// Role/vote actions consumed by the game engine. The actor is always the
/// authenticated connection; targets are roster member ids.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum PlayerAction {
    WolfKill { target_id: PlayerId },
    SeerCheck { target_id: PlayerId },
    WitchHeal,
    WitchPoison { target_id: PlayerId },
    /// Witch passes (or is finished with her potions) for this night
    WitchDone,
    GuardProtect { target_id: PlayerId },
    Vote { target_id: PlayerId },
    HunterShoot { target_id: PlayerId },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    ConnectionEstablished {
        player_id: PlayerId,
        server_now: String,
        stats: ConnectionStats,
    },
    RoomCreated {
        room: RoomSnapshot,
        you: PlayerInfo,
    },
    RoomJoined {
        room: RoomSnapshot,
        you: PlayerInfo,
    },
    PlayerJoined {
        player: PlayerInfo,
        room: RoomSnapshot,
    },
    PlayerLeft {
        player_id: PlayerId,
        room: RoomSnapshot,
    },
    PlayerReadyChanged {
        player_id: PlayerId,
        is_ready: bool,
    },
    HostChanged {
        player_id: PlayerId,
    },
    GameStarted {
        room: RoomSnapshot,
    },
    /// Private: your role for this game
    RoleAssigned {
        role: Role,
    },
    /// Human-readable announcement broadcast to the room
    GameMessage {
        message: String,
        ts: String,
    },
    GameStateUpdated {
        room: RoomSnapshot,
    },
    /// Private: result of the seer's inspection
    SeerResult {
        target_id: PlayerId,
        target_name: String,
        is_wolf: bool,
    },
    /// Private: you may fire a retaliatory shot before the phase advances
    HunterPrompt {
        timeout_secs: u64,
    },
    GameOver {
        winner: Winner,
        room: RoomSnapshot,
    },
    ChatMessage {
        player_id: PlayerId,
        player_name: String,
        message: String,
        ts: String,
    },
    HeartbeatAck {
        ts: String,
    },
    ServerStatus {
        server_now: String,
        stats: ConnectionStats,
        rooms_count: usize,
        active_games: usize,
    },
    Error {
        code: String,
        msg: String,
    },
}

/// Public roster entry; the role stays server-side until the game ends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: PlayerId,
    pub name: String,
    pub is_host: bool,
    pub is_ready: bool,
    pub is_alive: bool,
}

impl From<&Player> for PlayerInfo {
    fn from(p: &Player) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            is_host: p.is_host,
            is_ready: p.is_ready,
            is_alive: p.is_alive,
        }
    }
}

/// The publicly visible slice of a room's GameState
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GamePublic {
    pub phase: GamePhase,
    pub night_step: NightStep,
    pub day_count: u32,
    pub votes: HashMap<PlayerId, PlayerId>,
    pub waiting_for_hunter: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<Winner>,
}

impl From<&GameState> for GamePublic {
    fn from(g: &GameState) -> Self {
        Self {
            phase: g.phase,
            night_step: g.night_step,
            day_count: g.day_count,
            votes: g.votes.clone(),
            waiting_for_hunter: g.pending_shot.is_some(),
            winner: g.winner,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub id: RoomId,
    pub name: String,
    pub capacity: usize,
    pub has_password: bool,
    pub players: Vec<PlayerInfo>,
    pub is_game_started: bool,
    pub is_game_over: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game: Option<GamePublic>,
}

impl From<&Room> for RoomSnapshot {
    fn from(room: &Room) -> Self {
        Self {
            id: room.id.clone(),
            name: room.name.clone(),
            capacity: room.capacity,
            has_password: room.password.is_some(),
            players: room.players.iter().map(PlayerInfo::from).collect(),
            is_game_started: room.is_game_started,
            is_game_over: room.is_game_over,
            game: room.game.as_ref().map(GamePublic::from),
        }
    }
}
