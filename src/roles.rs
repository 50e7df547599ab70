//! Role allocation by player count.

use crate::types::Role;
use rand::seq::SliceRandom;

/// Role counts for a roster size. Wolves and the guard scale with the
/// player count; seer, witch and hunter are always single.
///
/// | players | wolves | guard |
/// |---------|--------|-------|
/// | < 9     | 2      | 0     |
/// | 9–11    | 3      | 1     |
/// | >= 12   | 4      | 1     |
fn role_counts(player_count: usize) -> [(Role, usize); 6] {
    let (wolves, guards) = match player_count {
        n if n >= 12 => (4, 1),
        n if n >= 9 => (3, 1),
        _ => (2, 0),
    };
    let villagers = player_count - wolves - guards - 3;

    [
        (Role::Wolf, wolves),
        (Role::Seer, 1),
        (Role::Witch, 1),
        (Role::Hunter, 1),
        (Role::Guard, guards),
        (Role::Villager, villagers),
    ]
}

/// Produce a uniformly shuffled role assignment for `player_count` players.
///
/// Callers must enforce the 6-player minimum before the game starts; below
/// that the villager remainder would go negative.
pub fn allocate(player_count: usize) -> Vec<Role> {
    let mut roles = Vec::with_capacity(player_count);
    for (role, count) in role_counts(player_count) {
        for _ in 0..count {
            roles.push(role);
        }
    }

    roles.shuffle(&mut rand::rng());
    roles
}
