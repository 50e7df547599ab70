use super::{AppState, Effects, RoomHandle};
use crate::protocol::{PlayerInfo, RoomSnapshot, ServerMessage};
use crate::types::*;
use rand::Rng;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;

/// Rooms are addressed by a 6-digit numeric code, like the original's
/// party-line style join codes.
fn generate_room_code() -> String {
    rand::rng().random_range(100_000..1_000_000u32).to_string()
}

/// Friendly default for players who join without picking a name
fn default_display_name() -> String {
    petname::petname(2, "-").unwrap_or_else(|| "wanderer".to_string())
}

impl AppState {
    /// Register a freshly connected client.
    pub async fn register_connection(
        &self,
        player_id: &str,
        tx: mpsc::UnboundedSender<ServerMessage>,
    ) {
        self.connections
            .write()
            .await
            .insert(player_id.to_string(), tx);

        let mut stats = self.stats.write().await;
        stats.total_connections += 1;
        stats.active_connections += 1;
    }

    pub async fn get_room(&self, room_id: &str) -> Option<RoomHandle> {
        self.rooms.read().await.get(room_id).cloned()
    }

    /// Find the room a player currently sits in.
    pub async fn find_room_of(&self, player_id: &str) -> Option<(RoomId, RoomHandle)> {
        let rooms = self.rooms.read().await;
        for (id, handle) in rooms.iter() {
            if handle.lock().await.player(player_id).is_some() {
                return Some((id.clone(), handle.clone()));
            }
        }
        None
    }

    /// Create a room with the creator installed as its ready host.
    pub async fn create_room(
        &self,
        creator_id: &str,
        name: Option<String>,
        password: Option<String>,
        capacity: Option<usize>,
    ) -> Result<RoomHandle, String> {
        if self.find_room_of(creator_id).await.is_some() {
            return Err("already in a room".to_string());
        }

        let mut host = Player::new(creator_id.to_string(), default_display_name());
        host.is_host = true;
        host.is_ready = true;

        let mut rooms = self.rooms.write().await;
        let room_id = loop {
            let candidate = generate_room_code();
            if !rooms.contains_key(&candidate) {
                break candidate;
            }
        };

        let now = Instant::now();
        let room = Room {
            id: room_id.clone(),
            name: name.unwrap_or_else(|| "unnamed room".to_string()),
            password: password.filter(|p| !p.is_empty()),
            capacity: capacity.unwrap_or(6).max(6),
            players: vec![host],
            is_game_started: false,
            is_game_over: false,
            game: None,
            created_at: now,
            last_activity: now,
        };

        tracing::info!("room {} created by {}", room_id, creator_id);
        let handle = Arc::new(Mutex::new(room));
        rooms.insert(room_id, handle.clone());
        Ok(handle)
    }

    /// Join an existing room; the usual lobby checks apply.
    pub async fn join_room(
        &self,
        player_id: &str,
        room_id: &str,
        password: Option<String>,
        username: Option<String>,
    ) -> Result<(RoomSnapshot, PlayerInfo), String> {
        let handle = self
            .get_room(room_id)
            .await
            .ok_or_else(|| "room does not exist".to_string())?;

        let mut room = handle.lock().await;

        if room.password.is_some() && room.password != password.filter(|p| !p.is_empty()) {
            return Err("wrong password".to_string());
        }
        if room.players.len() >= room.capacity {
            return Err("room is full".to_string());
        }
        if room.is_game_started {
            return Err("game already started".to_string());
        }
        if room.player(player_id).is_some() {
            return Err("already in this room".to_string());
        }

        let name = username
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(default_display_name);
        let player = Player::new(player_id.to_string(), name);
        room.players.push(player.clone());
        room.touch();

        let snapshot = RoomSnapshot::from(&*room);
        let you = PlayerInfo::from(&player);

        self.notify_room_except(
            &room,
            player_id,
            ServerMessage::PlayerJoined {
                player: you.clone(),
                room: snapshot.clone(),
            },
        )
        .await;

        tracing::info!("{} joined room {}", player_id, room_id);
        Ok((snapshot, you))
    }

    /// Remove a player from a room: transfer the host seat if needed,
    /// delete the room once empty, and let the game engine react to the
    /// roster change if a game is running.
    pub async fn leave_room(&self, player_id: &str, room_id: &str) -> Option<Effects> {
        let handle = self.get_room(room_id).await?;

        let mut effects = Effects::default();
        let mut delete_room = false;
        {
            let mut room = handle.lock().await;
            let idx = room.players.iter().position(|p| p.id == player_id)?;
            let leaver = room.players.remove(idx);
            room.touch();

            if room.players.is_empty() {
                delete_room = true;
            } else {
                if leaver.is_host {
                    let new_host_id = {
                        let next = &mut room.players[0];
                        next.is_host = true;
                        next.id.clone()
                    };
                    self.notify_room(
                        &room,
                        ServerMessage::HostChanged {
                            player_id: new_host_id,
                        },
                    )
                    .await;
                }

                self.notify_room(
                    &room,
                    ServerMessage::PlayerLeft {
                        player_id: leaver.id.clone(),
                        room: RoomSnapshot::from(&*room),
                    },
                )
                .await;

                if room.is_game_started && !room.is_game_over {
                    effects = self.roster_changed(&mut room, &leaver).await;
                }
            }
        }

        if delete_room {
            self.rooms.write().await.remove(room_id);
            tracing::info!("room {} deleted (empty)", room_id);
        }

        tracing::info!("{} left room {}", player_id, room_id);
        Some(effects)
    }

    pub async fn toggle_ready(&self, player_id: &str, room_id: &str, is_ready: bool) {
        let Some(handle) = self.get_room(room_id).await else {
            return;
        };
        let mut room = handle.lock().await;
        let Some(player) = room.player_mut(player_id) else {
            return;
        };
        player.is_ready = is_ready;
        room.touch();

        self.notify_room(
            &room,
            ServerMessage::PlayerReadyChanged {
                player_id: player_id.to_string(),
                is_ready,
            },
        )
        .await;
    }

    /// Full teardown for a dropped connection: forget the outbound
    /// channel, fix the counters, and leave whatever room the player was
    /// in.
    pub async fn disconnect(&self, player_id: &str) -> Option<(RoomId, Effects)> {
        self.connections.write().await.remove(player_id);
        {
            let mut stats = self.stats.write().await;
            stats.active_connections = stats.active_connections.saturating_sub(1);
        }

        let (room_id, _) = self.find_room_of(player_id).await?;
        let effects = self.leave_room(player_id, &room_id).await?;
        Some((room_id, effects))
    }

    /// Evict empty rooms and long-idle games. Runs from the background
    /// reaper task.
    pub async fn reap_idle_rooms(&self) -> usize {
        let mut stale = Vec::new();
        {
            let rooms = self.rooms.read().await;
            for (id, handle) in rooms.iter() {
                let room = handle.lock().await;
                let idle = room.last_activity.elapsed();
                let empty_expired =
                    room.players.is_empty() && idle > self.rules.empty_room_ttl;
                let game_expired = room.is_game_started && idle > self.rules.idle_game_ttl;
                if empty_expired || game_expired {
                    stale.push(id.clone());
                }
            }
        }

        if stale.is_empty() {
            return 0;
        }

        let mut rooms = self.rooms.write().await;
        for id in &stale {
            rooms.remove(id);
            tracing::info!("room {} reaped (idle)", id);
        }
        stale.len()
    }
}
