//! Night action processing.
//!
//! One linear pass per night over the sub-phases wolf → seer → witch →
//! guard. Every action is validated against both the actor's live role and
//! the current sub-phase; anything else is rejected without touching state.
//! Steps whose role has no living holder are skipped, and running past the
//! guard step resolves the night.

use super::{ActionError, ActionOutcome};
use crate::config::GameRules;
use crate::protocol::{PlayerAction, ServerMessage};
use crate::types::*;

impl Room {
    pub(super) fn apply_night_action(
        &mut self,
        actor_id: &str,
        action: &PlayerAction,
        rules: &GameRules,
        out: &mut ActionOutcome,
    ) -> Result<(), ActionError> {
        match action {
            PlayerAction::WolfKill { target_id } => {
                self.require_step(actor_id, NightStep::Wolf)?;
                self.require_living(target_id)?;
                let name = self.player_name(target_id);
                if let Some(game) = self.game.as_mut() {
                    game.wolf_killed = Some(target_id.clone());
                }
                out.say(format!("The wolves have chosen to kill {}.", name));
                self.advance_night_step(rules, out);
                Ok(())
            }

            PlayerAction::SeerCheck { target_id } => {
                self.require_step(actor_id, NightStep::Seer)?;
                self.require_living(target_id)?;
                let target = self
                    .player(target_id)
                    .ok_or(ActionError::UnknownTarget)?;
                let is_wolf = target.role == Some(Role::Wolf);
                let target_name = target.name.clone();

                if let Some(game) = self.game.as_mut() {
                    game.seer_checked = Some(target_id.clone());
                }
                // The verdict goes to the seer alone
                out.private.push((
                    actor_id.to_string(),
                    ServerMessage::SeerResult {
                        target_id: target_id.clone(),
                        target_name: target_name.clone(),
                        is_wolf,
                    },
                ));
                out.say(format!("The seer has inspected {}.", target_name));
                self.advance_night_step(rules, out);
                Ok(())
            }

            PlayerAction::WitchHeal => {
                self.require_step(actor_id, NightStep::Witch)?;
                let game = self.game.as_mut().ok_or(ActionError::NotInGame)?;
                if game.witch_heal_used {
                    return Err(ActionError::ResourceExhausted);
                }
                game.witch_heal_used = true;
                game.wolf_killed = None;
                out.say("The witch has used her antidote on the wolves' victim.");
                Ok(())
            }

            PlayerAction::WitchPoison { target_id } => {
                self.require_step(actor_id, NightStep::Witch)?;
                if self
                    .game
                    .as_ref()
                    .map(|g| g.witch_poison_used)
                    .unwrap_or(true)
                {
                    return Err(ActionError::ResourceExhausted);
                }
                self.require_living(target_id)?;
                if let Some(game) = self.game.as_mut() {
                    game.witch_poison_used = true;
                }
                let name = self.player_name(target_id);
                out.say(format!("The witch has poisoned {}.", name));
                self.kill(target_id, ResumeTo::Night, rules, out);
                Ok(())
            }

            PlayerAction::WitchDone => {
                self.require_step(actor_id, NightStep::Witch)?;
                self.advance_night_step(rules, out);
                Ok(())
            }

            PlayerAction::GuardProtect { target_id } => {
                self.require_step(actor_id, NightStep::Guard)?;
                self.require_living(target_id)?;
                if !rules.allow_repeat_guard {
                    let repeated = self
                        .game
                        .as_ref()
                        .map(|g| g.prev_guard.as_deref() == Some(target_id.as_str()))
                        .unwrap_or(false);
                    if repeated {
                        return Err(ActionError::InvalidTransition);
                    }
                }
                let name = self.player_name(target_id);
                if let Some(game) = self.game.as_mut() {
                    game.last_guard = Some(target_id.clone());
                }
                out.say(format!("The guard is watching over {}.", name));
                self.resolve_night(rules, out);
                Ok(())
            }

            // Votes and hunter shots are dispatched before this point
            PlayerAction::Vote { .. } | PlayerAction::HunterShoot { .. } => {
                Err(ActionError::InvalidTransition)
            }
        }
    }

    /// Both sub-phase and live role must match.
    fn require_step(&self, actor_id: &str, step: NightStep) -> Result<(), ActionError> {
        let game = self.game.as_ref().ok_or(ActionError::NotInGame)?;
        if game.phase != GamePhase::Night || game.night_step != step {
            return Err(ActionError::InvalidTransition);
        }
        let actor = self.player(actor_id).ok_or(ActionError::UnknownTarget)?;
        if !actor.is_alive {
            return Err(ActionError::Dead);
        }
        if actor.role != step.actor() {
            return Err(ActionError::InvalidTransition);
        }
        Ok(())
    }

    fn require_living(&self, target_id: &str) -> Result<(), ActionError> {
        let target = self.player(target_id).ok_or(ActionError::UnknownTarget)?;
        if !target.is_alive {
            return Err(ActionError::InvalidTransition);
        }
        Ok(())
    }

    /// Move to the next sub-phase, skipping steps with no living holder of
    /// the acting role. Running past the guard step resolves the night.
    pub(super) fn advance_night_step(&mut self, rules: &GameRules, out: &mut ActionOutcome) {
        let mut step = match self.game.as_ref() {
            Some(game) if game.phase == GamePhase::Night => game.night_step,
            _ => return,
        };

        loop {
            step = step.next();
            match step.actor() {
                Some(role) if self.has_living(role) => break,
                Some(_) => continue,
                None => break,
            }
        }

        if let Some(game) = self.game.as_mut() {
            game.night_step = step;
        }
        if step == NightStep::None {
            self.resolve_night(rules, out);
        }
    }

    /// End of night: apply the wolves' nomination unless it was healed or
    /// guarded, rotate the guard memory, and (unless a hunter shot is now
    /// pending) enter the day.
    pub(super) fn resolve_night(&mut self, rules: &GameRules, out: &mut ActionOutcome) {
        let (victim, guarded) = match self.game.as_ref() {
            Some(game) => (game.wolf_killed.clone(), game.last_guard.clone()),
            None => return,
        };

        let mut death = None;
        if let Some(victim_id) = victim {
            let saved = guarded.as_deref() == Some(victim_id.as_str());
            let alive = self
                .player(&victim_id)
                .map(|p| p.is_alive)
                .unwrap_or(false);
            if !saved && alive {
                death = Some(self.player_name(&victim_id));
                self.kill(&victim_id, ResumeTo::Day, rules, out);
            }
        }

        match death {
            Some(name) => out.say(format!("Dawn breaks. {} did not survive the night.", name)),
            None => out.say("Dawn breaks. The night has passed without a death."),
        }

        if let Some(game) = self.game.as_mut() {
            game.wolf_killed = None;
            game.prev_guard = game.last_guard.take();
            game.night_step = NightStep::None;
        }

        let suspended = self
            .game
            .as_ref()
            .map(|g| g.pending_shot.is_some())
            .unwrap_or(false);
        if !suspended {
            self.enter_day();
        }
    }
}
