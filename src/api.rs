//! HTTP endpoints for liveness and monitoring.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;
use crate::types::ConnectionStats;

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub server_now: String,
    pub connections: ConnectionStats,
    pub rooms_count: usize,
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let (rooms_count, _) = state.room_counts().await;
    Json(HealthResponse {
        status: "healthy",
        server_now: chrono::Utc::now().to_rfc3339(),
        connections: *state.stats.read().await,
        rooms_count,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomsStatus {
    pub total: usize,
    pub active_games: usize,
    pub waiting_rooms: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub uptime_secs: u64,
    pub connections: ConnectionStats,
    pub rooms: RoomsStatus,
}

/// GET /status
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let (total, active_games) = state.room_counts().await;
    Json(StatusResponse {
        uptime_secs: state.started_at.elapsed().as_secs(),
        connections: *state.stats.read().await,
        rooms: RoomsStatus {
            total,
            active_games,
            waiting_rooms: total - active_games,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_reports_room_count() {
        let state = Arc::new(AppState::new());
        state.create_room("host", None, None, None).await.unwrap();

        let Json(response) = health(State(state)).await;
        assert_eq!(response.status, "healthy");
        assert_eq!(response.rooms_count, 1);
    }

    #[tokio::test]
    async fn status_splits_waiting_and_active() {
        let state = Arc::new(AppState::new());
        state.create_room("a", None, None, None).await.unwrap();
        let handle = state.create_room("b", None, None, None).await.unwrap();
        {
            let mut room = handle.lock().await;
            room.is_game_started = true;
            room.game = Some(crate::types::GameState::new());
        }

        let Json(response) = status(State(state)).await;
        assert_eq!(response.rooms.total, 2);
        assert_eq!(response.rooms.active_games, 1);
        assert_eq!(response.rooms.waiting_rooms, 1);
    }
}
