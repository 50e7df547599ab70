//! Server and rules configuration, loaded from the environment.

use std::time::Duration;

/// Tunable game rules. Everything here has a sensible default so the
/// server runs without any environment at all.
#[derive(Debug, Clone)]
pub struct GameRules {
    /// How long a dying hunter gets to pick a retaliation target
    pub hunter_shot_timeout: Duration,
    /// Whether the guard may protect the same target on consecutive nights
    pub allow_repeat_guard: bool,
    /// Empty rooms are evicted after this much inactivity
    pub empty_room_ttl: Duration,
    /// Started games are evicted after this much inactivity
    pub idle_game_ttl: Duration,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            hunter_shot_timeout: Duration::from_secs(30),
            allow_repeat_guard: false,
            empty_room_ttl: Duration::from_secs(300),
            idle_game_ttl: Duration::from_secs(1800),
        }
    }
}

impl GameRules {
    /// Load rules from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let hunter_secs = std::env::var("HUNTER_SHOT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.hunter_shot_timeout.as_secs());

        let allow_repeat_guard = std::env::var("ALLOW_REPEAT_GUARD")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(defaults.allow_repeat_guard);

        let empty_secs = std::env::var("EMPTY_ROOM_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.empty_room_ttl.as_secs());

        let idle_secs = std::env::var("IDLE_GAME_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.idle_game_ttl.as_secs());

        Self {
            hunter_shot_timeout: Duration::from_secs(hunter_secs),
            allow_repeat_guard,
            empty_room_ttl: Duration::from_secs(empty_secs),
            idle_game_ttl: Duration::from_secs(idle_secs),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3000);
        Self { port }
    }
}
