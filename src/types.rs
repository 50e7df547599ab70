use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::time::Instant;

/// Opaque ID types for type safety
pub type PlayerId = String;
pub type RoomId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Wolf,
    Seer,
    Witch,
    Hunter,
    Guard,
    Villager,
}

impl Role {
    /// Seer, witch, hunter and guard form the clergy; their extinction
    /// factors into the wolves' parity win.
    pub fn is_clergy(&self) -> bool {
        matches!(self, Role::Seer | Role::Witch | Role::Hunter | Role::Guard)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GamePhase {
    Night,
    Day,
    Vote,
}

/// Night sub-phase. Steps run in the fixed order wolf → seer → witch →
/// guard; `None` outside of night.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NightStep {
    Wolf,
    Seer,
    Witch,
    Guard,
    None,
}

impl NightStep {
    /// The role whose turn it is during this step.
    pub fn actor(&self) -> Option<Role> {
        match self {
            NightStep::Wolf => Some(Role::Wolf),
            NightStep::Seer => Some(Role::Seer),
            NightStep::Witch => Some(Role::Witch),
            NightStep::Guard => Some(Role::Guard),
            NightStep::None => None,
        }
    }

    pub fn next(&self) -> NightStep {
        match self {
            NightStep::Wolf => NightStep::Seer,
            NightStep::Seer => NightStep::Witch,
            NightStep::Witch => NightStep::Guard,
            NightStep::Guard | NightStep::None => NightStep::None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Village,
    Wolves,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub is_host: bool,
    pub is_ready: bool,
    /// Assigned at game start; never included in public snapshots
    pub role: Option<Role>,
    pub is_alive: bool,
}

impl Player {
    pub fn new(id: PlayerId, name: String) -> Self {
        Self {
            id,
            name,
            is_host: false,
            is_ready: false,
            role: None,
            is_alive: true,
        }
    }
}

/// Where phase progression continues once a pending hunter shot is
/// resolved (fired or timed out).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeTo {
    /// Stay in the current night step (hunter was poisoned mid-night)
    Night,
    /// Finish night resolution and enter day
    Day,
    /// Finish vote resolution and enter the next night
    NextNight,
}

/// A death made the hunter eligible for a retaliatory shot; phase
/// progression is suspended until the shot arrives or the timer fires.
#[derive(Debug, Clone)]
pub struct PendingShot {
    pub hunter_id: PlayerId,
    pub resume: ResumeTo,
    /// Guards the timeout task against resolving a trigger it did not arm
    pub epoch: u64,
}

/// Per-room authoritative game state, created at game start and discarded
/// when the game ends or the room is deleted.
#[derive(Debug, Clone)]
pub struct GameState {
    pub phase: GamePhase,
    pub night_step: NightStep,
    pub day_count: u32,
    pub votes: HashMap<PlayerId, PlayerId>,
    /// Tonight's guard target
    pub last_guard: Option<PlayerId>,
    /// Last night's guard target; the repeat-protection rule checks this
    pub prev_guard: Option<PlayerId>,
    pub witch_heal_used: bool,
    pub witch_poison_used: bool,
    pub seer_checked: Option<PlayerId>,
    /// Tonight's wolf nomination; nulled by a witch heal
    pub wolf_killed: Option<PlayerId>,
    pub pending_shot: Option<PendingShot>,
    pub shot_epoch: u64,
    pub winner: Option<Winner>,
}

impl GameState {
    pub fn new() -> Self {
        Self {
            phase: GamePhase::Night,
            night_step: NightStep::Wolf,
            day_count: 1,
            votes: HashMap::new(),
            last_guard: None,
            prev_guard: None,
            witch_heal_used: false,
            witch_poison_used: false,
            seer_checked: None,
            wolf_killed: None,
            pending_shot: None,
            shot_epoch: 0,
            winner: None,
        }
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

/// One isolated game session with its own roster and GameState.
#[derive(Debug)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub password: Option<String>,
    /// Maximum roster size chosen at creation
    pub capacity: usize,
    pub players: Vec<Player>,
    pub is_game_started: bool,
    pub is_game_over: bool,
    pub game: Option<GameState>,
    pub created_at: Instant,
    pub last_activity: Instant,
}

impl Room {
    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn player_name(&self, id: &str) -> String {
        self.player(id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }

    pub fn alive_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_alive).count()
    }

    /// Is any living player holding this role?
    pub fn has_living(&self, role: Role) -> bool {
        self.players
            .iter()
            .any(|p| p.is_alive && p.role == Some(role))
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}

/// Connection counters reported by /health, /status and the ws greeting
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ConnectionStats {
    pub total_connections: u64,
    pub active_connections: u64,
}
