//! Win condition evaluation.

use crate::types::{Player, Role, Winner};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Ongoing,
    WolvesWin,
    VillageWins,
}

impl Verdict {
    pub fn winner(&self) -> Option<Winner> {
        match self {
            Verdict::Ongoing => None,
            Verdict::WolvesWin => Some(Winner::Wolves),
            Verdict::VillageWins => Some(Winner::Village),
        }
    }
}

/// Pure function of the current roster. Checked in order:
/// 1. no living wolf → village wins;
/// 2. no living non-wolf → wolves win;
/// 3. no living clergy and wolves have parity with villagers → wolves win.
pub fn evaluate(players: &[Player]) -> Verdict {
    let alive = |p: &&Player| p.is_alive;

    let wolves = players
        .iter()
        .filter(alive)
        .filter(|p| p.role == Some(Role::Wolf))
        .count();
    if wolves == 0 {
        return Verdict::VillageWins;
    }

    let good = players
        .iter()
        .filter(alive)
        .filter(|p| p.role != Some(Role::Wolf))
        .count();
    if good == 0 {
        return Verdict::WolvesWin;
    }

    let clergy = players
        .iter()
        .filter(alive)
        .filter(|p| p.role.map(|r| r.is_clergy()).unwrap_or(false))
        .count();
    let villagers = players
        .iter()
        .filter(alive)
        .filter(|p| p.role == Some(Role::Villager))
        .count();
    if clergy == 0 && wolves >= villagers {
        return Verdict::WolvesWin;
    }

    Verdict::Ongoing
}
