//! Day vote collection and resolution.

use super::{ActionError, ActionOutcome};
use crate::config::GameRules;
use crate::types::*;
use rand::seq::IndexedRandom;
use std::collections::HashMap;

impl Room {
    /// Record one living player's vote. Recasting overwrites; the phase
    /// resolves automatically once every living player has voted.
    pub(super) fn cast_vote(
        &mut self,
        voter_id: &str,
        target_id: &str,
        rules: &GameRules,
        out: &mut ActionOutcome,
    ) -> Result<(), ActionError> {
        {
            let game = self.game.as_ref().ok_or(ActionError::NotInGame)?;
            if game.phase != GamePhase::Vote {
                return Err(ActionError::InvalidTransition);
            }
        }
        let target = self.player(target_id).ok_or(ActionError::UnknownTarget)?;
        if !target.is_alive {
            return Err(ActionError::InvalidTransition);
        }

        let voter_name = self.player_name(voter_id);
        let target_name = self.player_name(target_id);
        let (cast, alive) = {
            let alive = self.alive_count();
            let game = self.game.as_mut().ok_or(ActionError::NotInGame)?;
            game.votes
                .insert(voter_id.to_string(), target_id.to_string());
            (game.votes.len(), alive)
        };
        out.say(format!("{} voted for {}.", voter_name, target_name));

        if cast == alive {
            self.resolve_votes(rules, out);
        }
        Ok(())
    }

    /// Tally the ballot: highest count is eliminated, ties break uniformly
    /// at random. Afterwards the votes clear and the next night begins
    /// (deferred if the eliminated hunter still owes a shot). Zero votes
    /// eliminate nobody.
    pub(super) fn resolve_votes(&mut self, rules: &GameRules, out: &mut ActionOutcome) {
        let eliminated = {
            let Some(game) = self.game.as_ref() else {
                return;
            };
            let mut counts: HashMap<&String, u32> = HashMap::new();
            for target in game.votes.values() {
                *counts.entry(target).or_insert(0) += 1;
            }

            let max = counts.values().copied().max().unwrap_or(0);
            let front: Vec<&String> = counts
                .iter()
                .filter(|(_, count)| **count == max)
                .map(|(target, _)| *target)
                .collect();
            front.choose(&mut rand::rng()).map(|id| (*id).clone())
        };

        if let Some(target_id) = eliminated {
            let name = self.player_name(&target_id);
            out.say(format!("{} was voted out by the village.", name));
            self.kill(&target_id, ResumeTo::NextNight, rules, out);
        }

        if let Some(game) = self.game.as_mut() {
            game.votes.clear();
        }

        let suspended = self
            .game
            .as_ref()
            .map(|g| g.pending_shot.is_some())
            .unwrap_or(false);
        if !suspended {
            self.begin_night(out);
        }
    }
}
