use crate::state::AppState;
use std::sync::Arc;
use std::time::Duration;

/// Spawn a background task that periodically evicts idle rooms: empty
/// rooms past their grace period and started games nobody has touched in
/// a long while.
pub fn spawn_room_reaper(state: Arc<AppState>) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(60)).await;

            let reaped = state.reap_idle_rooms().await;
            if reaped > 0 {
                tracing::info!("reaped {} idle room(s)", reaped);
            }
        }
    });
}
