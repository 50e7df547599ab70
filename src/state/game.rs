//! Game phase sequencing: night → day → vote → night, the hunter's
//! pending-shot trigger, and the terminal state.
//!
//! All mutations for one room happen under its mutex; the only thing that
//! escapes the lock is the [`Effects`] value telling the caller to start a
//! shot-timeout timer.

use super::win;
use super::{ActionError, ActionOutcome, AppState};
use crate::config::GameRules;
use crate::protocol::{PlayerAction, RoomSnapshot, ServerMessage};
use crate::roles;
use crate::types::*;
use std::sync::Arc;

/// Follow-up work the caller must do after the room lock is released.
#[derive(Debug, Default, Clone, Copy)]
pub struct Effects {
    /// A hunter shot was armed; start its timeout timer for this epoch
    pub shot_armed: Option<u64>,
}

impl Room {
    /// Mark a player dead. Dying is one-way; killing a corpse is a no-op.
    /// A dying hunter arms the pending retaliation trigger, which suspends
    /// phase progression until the shot lands or times out.
    pub(super) fn kill(
        &mut self,
        target_id: &str,
        resume: ResumeTo,
        rules: &GameRules,
        out: &mut ActionOutcome,
    ) {
        let Some(target) = self.player_mut(target_id) else {
            return;
        };
        if !target.is_alive {
            return;
        }
        target.is_alive = false;
        let was_hunter = target.role == Some(Role::Hunter);
        let name = target.name.clone();

        if was_hunter {
            if let Some(game) = self.game.as_mut() {
                game.shot_epoch += 1;
                let epoch = game.shot_epoch;
                game.pending_shot = Some(PendingShot {
                    hunter_id: target_id.to_string(),
                    resume,
                    epoch,
                });
                out.shot_armed = Some(epoch);
            }
            out.private.push((
                target_id.to_string(),
                ServerMessage::HunterPrompt {
                    timeout_secs: rules.hunter_shot_timeout.as_secs(),
                },
            ));
            out.say(format!("{} was the hunter and reaches for a final shot...", name));
        }
    }

    pub(super) fn enter_day(&mut self) {
        if let Some(game) = self.game.as_mut() {
            game.phase = GamePhase::Day;
            game.night_step = NightStep::None;
        }
    }

    /// Vote aftermath: next night begins, day counter moves.
    pub(super) fn begin_night(&mut self, out: &mut ActionOutcome) {
        if let Some(game) = self.game.as_mut() {
            game.day_count += 1;
            game.phase = GamePhase::Night;
            game.night_step = NightStep::Wolf;
            out.say(format!("Night {} falls. The wolves awaken.", game.day_count));
        }
    }

    pub(super) fn continue_after_shot(&mut self, resume: ResumeTo, out: &mut ActionOutcome) {
        match resume {
            // Night keeps running at the step it was parked on
            ResumeTo::Night => {}
            ResumeTo::Day => self.enter_day(),
            ResumeTo::NextNight => self.begin_night(out),
        }
    }

    /// The pending hunter fires. The caller has already verified that a
    /// shot is pending for this actor.
    fn hunter_shoot(
        &mut self,
        actor_id: &str,
        target_id: &str,
        rules: &GameRules,
        out: &mut ActionOutcome,
    ) -> Result<(), ActionError> {
        let target = self.player(target_id).ok_or(ActionError::UnknownTarget)?;
        if !target.is_alive || target_id == actor_id {
            return Err(ActionError::InvalidTransition);
        }
        let target_name = target.name.clone();
        let hunter_name = self.player_name(actor_id);

        // The shot victim can never be the hunter, so no re-arming here
        self.kill(target_id, ResumeTo::Night, rules, out);
        out.say(format!("{} fired a final shot at {}.", hunter_name, target_name));

        let resume = self
            .game
            .as_mut()
            .and_then(|g| g.pending_shot.take())
            .map(|p| p.resume);
        if let Some(resume) = resume {
            self.continue_after_shot(resume, out);
        }
        Ok(())
    }

    /// Resolve the pending trigger to "no shot": timeout fired or the
    /// hunter left the room.
    pub(super) fn resolve_shot_as_passed(&mut self, out: &mut ActionOutcome) {
        let Some(pending) = self.game.as_mut().and_then(|g| g.pending_shot.take()) else {
            return;
        };
        out.say("The hunter did not fire.");
        self.continue_after_shot(pending.resume, out);
    }
}

impl AppState {
    /// Host starts the game: roles are dealt, the first night begins.
    /// Failures are structured rejections for the requester, never state
    /// mutations.
    pub async fn start_game(&self, actor_id: &str, room_id: &str) -> Result<(), String> {
        let handle = self
            .get_room(room_id)
            .await
            .ok_or_else(|| "room does not exist".to_string())?;
        let mut room = handle.lock().await;
        room.touch();

        let actor = room
            .player(actor_id)
            .ok_or_else(|| "you are not in this room".to_string())?;
        if !actor.is_host {
            return Err("only the host can start the game".to_string());
        }
        if room.is_game_started && !room.is_game_over {
            return Err("game already running".to_string());
        }
        if room.players.len() < 6 {
            return Err(format!(
                "at least 6 players required, {} present",
                room.players.len()
            ));
        }
        let unready = room
            .players
            .iter()
            .filter(|p| !p.is_ready && !p.is_host)
            .count();
        if unready > 0 {
            return Err(format!("{} players are not ready", unready));
        }

        let deck = roles::allocate(room.players.len());
        for (player, role) in room.players.iter_mut().zip(deck) {
            player.role = Some(role);
            player.is_alive = true;
        }
        room.game = Some(GameState::new());
        room.is_game_started = true;
        room.is_game_over = false;

        tracing::info!("room {}: game started with {} players", room_id, room.players.len());

        self.notify_room(
            &room,
            ServerMessage::GameStarted {
                room: RoomSnapshot::from(&*room),
            },
        )
        .await;
        for player in &room.players {
            if let Some(role) = player.role {
                self.notify_player(&player.id, ServerMessage::RoleAssigned { role })
                    .await;
            }
        }
        self.notify_room(
            &room,
            ServerMessage::GameMessage {
                message: "Night 1 falls. The wolves awaken.".to_string(),
                ts: chrono::Utc::now().to_rfc3339(),
            },
        )
        .await;

        Ok(())
    }

    /// Host closes the day discussion and opens voting.
    pub async fn advance_to_vote(&self, actor_id: &str, room_id: &str) -> Result<(), ActionError> {
        let handle = self.get_room(room_id).await.ok_or(ActionError::NotInGame)?;
        let mut room = handle.lock().await;
        room.touch();

        if !room.is_game_started || room.game.is_none() {
            return Err(ActionError::NotInGame);
        }
        if room.is_game_over {
            return Err(ActionError::TerminalState);
        }
        let actor = room.player(actor_id).ok_or(ActionError::UnknownTarget)?;
        if !actor.is_host {
            return Err(ActionError::InvalidTransition);
        }

        {
            let game = room.game.as_ref().ok_or(ActionError::NotInGame)?;
            if game.phase != GamePhase::Day || game.pending_shot.is_some() {
                return Err(ActionError::InvalidTransition);
            }
        }
        if let Some(game) = room.game.as_mut() {
            game.phase = GamePhase::Vote;
        }

        let mut out = ActionOutcome::default();
        out.say("The village gathers to vote.");
        self.after_mutation(&mut room, out).await;
        Ok(())
    }

    /// Route one action event into the engine. Everything here runs under
    /// the room's mutex; concurrent events for the same room serialize.
    pub async fn apply_game_action(
        &self,
        actor_id: &str,
        room_id: &str,
        action: PlayerAction,
    ) -> Result<Effects, ActionError> {
        let handle = self.get_room(room_id).await.ok_or(ActionError::NotInGame)?;
        let mut room = handle.lock().await;
        room.touch();

        if !room.is_game_started || room.game.is_none() {
            return Err(ActionError::NotInGame);
        }
        if room.is_game_over {
            return Err(ActionError::TerminalState);
        }
        let actor_alive = match room.player(actor_id) {
            Some(p) => p.is_alive,
            None => return Err(ActionError::UnknownTarget),
        };

        let mut out = ActionOutcome::default();

        // While a shot is pending, the hunter's shot is the only action in
        // the world
        let pending_hunter = room
            .game
            .as_ref()
            .and_then(|g| g.pending_shot.as_ref())
            .map(|p| p.hunter_id.clone());
        if let Some(hunter_id) = pending_hunter {
            match action {
                PlayerAction::HunterShoot { ref target_id } if hunter_id == actor_id => {
                    room.hunter_shoot(actor_id, target_id, &self.rules, &mut out)?;
                }
                _ => return Err(ActionError::InvalidTransition),
            }
            return Ok(self.after_mutation(&mut room, out).await);
        }

        if !actor_alive {
            return Err(ActionError::Dead);
        }

        match action {
            PlayerAction::Vote { ref target_id } => {
                room.cast_vote(actor_id, target_id, &self.rules, &mut out)?;
            }
            // Without a pending trigger there is nothing to shoot at
            PlayerAction::HunterShoot { .. } => return Err(ActionError::InvalidTransition),
            ref night_action => {
                room.apply_night_action(actor_id, night_action, &self.rules, &mut out)?;
            }
        }

        Ok(self.after_mutation(&mut room, out).await)
    }

    /// Timeout path for the pending shot. Ignored unless the armed epoch
    /// is still current — a fired shot bumps the trigger away first.
    pub async fn resolve_shot_timeout(&self, room_id: &str, epoch: u64) {
        let Some(handle) = self.get_room(room_id).await else {
            return;
        };
        let mut room = handle.lock().await;
        if room.is_game_over {
            return;
        }
        let current = room
            .game
            .as_ref()
            .and_then(|g| g.pending_shot.as_ref())
            .map(|p| p.epoch == epoch)
            .unwrap_or(false);
        if !current {
            return;
        }

        tracing::info!("room {}: hunter shot timed out", room_id);
        let mut out = ActionOutcome::default();
        room.resolve_shot_as_passed(&mut out);
        self.after_mutation(&mut room, out).await;
    }

    /// A player left a running game: cancel their pending shot, drop their
    /// votes, unblock a night step waiting on a role nobody holds anymore,
    /// and re-check vote completion and the win conditions.
    pub(super) async fn roster_changed(&self, room: &mut Room, leaver: &Player) -> Effects {
        let mut out = ActionOutcome::default();

        let hunter_left = room
            .game
            .as_ref()
            .and_then(|g| g.pending_shot.as_ref())
            .map(|p| p.hunter_id == leaver.id)
            .unwrap_or(false);
        if hunter_left {
            room.resolve_shot_as_passed(&mut out);
        }

        if let Some(game) = room.game.as_mut() {
            game.votes.remove(&leaver.id);
            game.votes.retain(|_, target| *target != leaver.id);
        }

        let (phase, step, pending) = match room.game.as_ref() {
            Some(g) => (g.phase, g.night_step, g.pending_shot.is_some()),
            None => return Effects::default(),
        };

        if !pending {
            match phase {
                GamePhase::Night => {
                    // The current step may now be waiting on nobody
                    if let Some(role) = step.actor() {
                        if !room.has_living(role) {
                            room.advance_night_step(&self.rules, &mut out);
                        }
                    }
                }
                GamePhase::Vote => {
                    let alive = room.alive_count();
                    let votes = room.game.as_ref().map(|g| g.votes.len()).unwrap_or(0);
                    if alive > 0 && votes == alive {
                        room.resolve_votes(&self.rules, &mut out);
                    }
                }
                GamePhase::Day => {}
            }
        }

        self.after_mutation(room, out).await
    }

    /// Send out everything an action produced, then evaluate the win
    /// conditions. Evaluation is deferred while a shot is pending: the
    /// death that armed the trigger is not complete until the hunter has
    /// answered it.
    async fn after_mutation(&self, room: &mut Room, out: ActionOutcome) -> Effects {
        let effects = Effects {
            shot_armed: out.shot_armed,
        };
        self.flush_outcome(room, &out).await;

        let suspended = room
            .game
            .as_ref()
            .map(|g| g.pending_shot.is_some())
            .unwrap_or(false);
        if !suspended && !room.is_game_over {
            if let Some(winner) = win::evaluate(&room.players).winner() {
                if let Some(game) = room.game.as_mut() {
                    game.winner = Some(winner);
                }
                room.is_game_over = true;
                tracing::info!("room {}: game over, winner {:?}", room.id, winner);
                self.notify_room(
                    room,
                    ServerMessage::GameOver {
                        winner,
                        room: RoomSnapshot::from(&*room),
                    },
                )
                .await;
            }
        }

        effects
    }
}

/// Arm the bounded timeout for a pending hunter shot. Spawned after the
/// room lock is released so the timer cannot hold the room hostage.
pub fn spawn_shot_timer(state: Arc<AppState>, room_id: RoomId, epoch: u64) {
    let timeout = state.rules.hunter_shot_timeout;
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        state.resolve_shot_timeout(&room_id, epoch).await;
    });
}

#[cfg(test)]
mod tests {
    use super::super::test_util::{room_id, started_room};
    use super::*;
    use crate::state::ActionError;

    fn six_roles() -> Vec<Role> {
        vec![
            Role::Wolf,
            Role::Wolf,
            Role::Seer,
            Role::Witch,
            Role::Hunter,
            Role::Villager,
        ]
    }

    async fn vote(state: &AppState, rid: &str, voter: &str, target: &str) -> Result<Effects, ActionError> {
        state
            .apply_game_action(
                voter,
                rid,
                PlayerAction::Vote {
                    target_id: target.to_string(),
                },
            )
            .await
    }

    /// Drive the engine through a full night with no casualties.
    async fn quiet_night(state: &AppState, rid: &str) {
        state
            .apply_game_action(
                "p0",
                rid,
                PlayerAction::WolfKill {
                    target_id: "p5".into(),
                },
            )
            .await
            .unwrap();
        state
            .apply_game_action(
                "p2",
                rid,
                PlayerAction::SeerCheck {
                    target_id: "p0".into(),
                },
            )
            .await
            .unwrap();
        state
            .apply_game_action("p3", rid, PlayerAction::WitchHeal)
            .await
            .unwrap();
        state
            .apply_game_action("p3", rid, PlayerAction::WitchDone)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn start_game_requires_host_and_quorum() {
        let state = AppState::new();
        let handle = state.create_room("host", None, None, Some(8)).await.unwrap();
        let rid = room_id(&handle).await;

        let err = state.start_game("host", &rid).await.unwrap_err();
        assert!(err.contains("at least 6 players"), "{}", err);

        for id in ["a", "b", "c", "d", "e"] {
            state.join_room(id, &rid, None, None).await.unwrap();
        }
        let err = state.start_game("a", &rid).await.unwrap_err();
        assert!(err.contains("only the host"), "{}", err);

        let err = state.start_game("host", &rid).await.unwrap_err();
        assert!(err.contains("not ready"), "{}", err);

        for id in ["a", "b", "c", "d", "e"] {
            state.toggle_ready(id, &rid, true).await;
        }
        state.start_game("host", &rid).await.unwrap();

        let room = handle.lock().await;
        assert!(room.is_game_started);
        let game = room.game.as_ref().unwrap();
        assert_eq!(game.phase, GamePhase::Night);
        assert_eq!(game.night_step, NightStep::Wolf);
        assert_eq!(game.day_count, 1);
        assert!(room.players.iter().all(|p| p.role.is_some() && p.is_alive));
    }

    #[tokio::test]
    async fn vote_cycle_increments_day_and_reenters_night() {
        let state = AppState::new();
        let handle = started_room(&state, &six_roles()).await;
        let rid = room_id(&handle).await;

        quiet_night(&state, &rid).await;
        {
            let room = handle.lock().await;
            assert_eq!(room.game.as_ref().unwrap().phase, GamePhase::Day);
        }

        state.advance_to_vote("p0", &rid).await.unwrap();

        // Everyone piles on the villager
        for voter in ["p0", "p1", "p2", "p3", "p4"] {
            vote(&state, &rid, voter, "p5").await.unwrap();
        }
        vote(&state, &rid, "p5", "p0").await.unwrap();

        let room = handle.lock().await;
        assert!(!room.player("p5").unwrap().is_alive);
        let game = room.game.as_ref().unwrap();
        assert_eq!(game.phase, GamePhase::Night);
        assert_eq!(game.night_step, NightStep::Wolf);
        assert_eq!(game.day_count, 2);
        assert!(game.votes.is_empty());
    }

    #[tokio::test]
    async fn advance_to_vote_is_host_only_and_day_only() {
        let state = AppState::new();
        let handle = started_room(&state, &six_roles()).await;
        let rid = room_id(&handle).await;

        // Still night
        assert_eq!(
            state.advance_to_vote("p0", &rid).await.unwrap_err(),
            ActionError::InvalidTransition
        );

        quiet_night(&state, &rid).await;
        assert_eq!(
            state.advance_to_vote("p1", &rid).await.unwrap_err(),
            ActionError::InvalidTransition
        );
        state.advance_to_vote("p0", &rid).await.unwrap();
    }

    #[tokio::test]
    async fn voted_out_hunter_suspends_the_night_flip_until_the_shot() {
        let state = AppState::new();
        let handle = started_room(&state, &six_roles()).await;
        let rid = room_id(&handle).await;

        quiet_night(&state, &rid).await;
        state.advance_to_vote("p0", &rid).await.unwrap();

        // Everyone votes out the hunter (p4)
        for voter in ["p0", "p1", "p2", "p3", "p5"] {
            vote(&state, &rid, voter, "p4").await.unwrap();
        }
        let effects = vote(&state, &rid, "p4", "p0").await.unwrap();
        assert!(effects.shot_armed.is_some(), "shot timer must be armed");

        {
            let room = handle.lock().await;
            assert!(!room.player("p4").unwrap().is_alive);
            let game = room.game.as_ref().unwrap();
            assert!(game.pending_shot.is_some());
            // The flip to night waits for the hunter
            assert_eq!(game.phase, GamePhase::Vote);
        }

        // Nobody else may act while the shot is pending
        assert_eq!(
            vote(&state, &rid, "p0", "p5").await.unwrap_err(),
            ActionError::InvalidTransition
        );

        // The dead hunter fires at a wolf
        state
            .apply_game_action(
                "p4",
                &rid,
                PlayerAction::HunterShoot {
                    target_id: "p1".into(),
                },
            )
            .await
            .unwrap();

        let room = handle.lock().await;
        assert!(!room.player("p1").unwrap().is_alive);
        let game = room.game.as_ref().unwrap();
        assert!(game.pending_shot.is_none());
        assert_eq!(game.phase, GamePhase::Night);
        assert_eq!(game.day_count, 2);
    }

    #[tokio::test]
    async fn shot_timeout_resolves_to_no_shot() {
        let state = AppState::new();
        let handle = started_room(&state, &six_roles()).await;
        let rid = room_id(&handle).await;

        quiet_night(&state, &rid).await;
        state.advance_to_vote("p0", &rid).await.unwrap();
        for voter in ["p0", "p1", "p2", "p3", "p5"] {
            vote(&state, &rid, voter, "p4").await.unwrap();
        }
        let effects = vote(&state, &rid, "p4", "p0").await.unwrap();
        let epoch = effects.shot_armed.unwrap();

        // A stale epoch does nothing
        state.resolve_shot_timeout(&rid, epoch + 1).await;
        assert!(handle.lock().await.game.as_ref().unwrap().pending_shot.is_some());

        state.resolve_shot_timeout(&rid, epoch).await;
        let room = handle.lock().await;
        let game = room.game.as_ref().unwrap();
        assert!(game.pending_shot.is_none());
        assert_eq!(game.phase, GamePhase::Night);
        // Nobody died to the phantom shot
        assert_eq!(room.alive_count(), 5);
    }

    #[tokio::test]
    async fn terminal_state_ignores_everything() {
        let state = AppState::new();
        let handle = started_room(&state, &six_roles()).await;
        let rid = room_id(&handle).await;

        {
            let mut room = handle.lock().await;
            room.is_game_over = true;
        }
        assert_eq!(
            vote(&state, &rid, "p0", "p5").await.unwrap_err(),
            ActionError::TerminalState
        );
        assert_eq!(
            state.advance_to_vote("p0", &rid).await.unwrap_err(),
            ActionError::TerminalState
        );
    }

    #[tokio::test]
    async fn dead_players_cannot_act() {
        let state = AppState::new();
        let handle = started_room(&state, &six_roles()).await;
        let rid = room_id(&handle).await;

        handle.lock().await.player_mut("p0").unwrap().is_alive = false;
        assert_eq!(
            state
                .apply_game_action(
                    "p0",
                    &rid,
                    PlayerAction::WolfKill {
                        target_id: "p5".into()
                    }
                )
                .await
                .unwrap_err(),
            ActionError::Dead
        );
    }

    #[tokio::test]
    async fn win_is_declared_after_the_deciding_death() {
        let state = AppState::new();
        // One wolf left vs one villager and the seer: voting out the wolf
        // ends it
        let handle = started_room(&state, &six_roles()).await;
        let rid = room_id(&handle).await;
        {
            let mut room = handle.lock().await;
            room.player_mut("p1").unwrap().is_alive = false;
            room.player_mut("p3").unwrap().is_alive = false;
            room.player_mut("p4").unwrap().is_alive = false;
            if let Some(game) = room.game.as_mut() {
                game.phase = GamePhase::Vote;
            }
        }

        vote(&state, &rid, "p2", "p0").await.unwrap();
        vote(&state, &rid, "p5", "p0").await.unwrap();
        vote(&state, &rid, "p0", "p5").await.unwrap();

        let room = handle.lock().await;
        assert!(room.is_game_over);
        assert_eq!(room.game.as_ref().unwrap().winner, Some(Winner::Village));
    }

    #[tokio::test]
    async fn leaving_hunter_resolves_pending_shot() {
        let state = AppState::new();
        let handle = started_room(&state, &six_roles()).await;
        let rid = room_id(&handle).await;

        quiet_night(&state, &rid).await;
        state.advance_to_vote("p0", &rid).await.unwrap();
        for voter in ["p0", "p1", "p2", "p3", "p5"] {
            vote(&state, &rid, voter, "p4").await.unwrap();
        }
        vote(&state, &rid, "p4", "p0").await.unwrap();
        assert!(handle.lock().await.game.as_ref().unwrap().pending_shot.is_some());

        state.leave_room("p4", &rid).await.unwrap();

        let room = handle.lock().await;
        let game = room.game.as_ref().unwrap();
        assert!(game.pending_shot.is_none());
        assert_eq!(game.phase, GamePhase::Night);
        assert_eq!(game.day_count, 2);
    }
}
