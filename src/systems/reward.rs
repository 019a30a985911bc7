//! Reward apportionment (spec.md §4.5). Grounded on `original_source`'s
//! `RewardManager.cpp`: `addDamage`/`awardAllAwardees`/`removeAllAwardees`/
//! `update` map directly onto the generic [`SortedRefList`](crate::refs)
//! from spec.md §3's universal reference pattern, with damage dealt as the
//! score. Idle awardees are pruned after `AWARDEE_IDLE_TIMEOUT_MS`
//! (spec.md §8 scenario 5).

use crate::clock::SimClock;
use crate::config::AWARDEE_IDLE_TIMEOUT_MS;
use crate::refs::SortedRefList;
use bevy_ecs::prelude::*;
use std::collections::HashMap;

/// Tracks who has damaged a particular attackable object this "life", for
/// apportioning the eventual kill/destroy reward. One per attackable
/// entity.
#[derive(Component, Debug, Default)]
pub struct RewardManager {
    damage: SortedRefList,
    last_contribution_ms: HashMap<Entity, u64>,
}

impl RewardManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_damage(&mut self, attacker: Entity, amount: f32, now_ms: u64) {
        if amount <= 0.0 {
            return;
        }
        let existing = self.damage.iter().find(|e| e.target == attacker).map(|e| e.score).unwrap_or(0.0);
        self.damage.upsert(attacker, existing + amount);
        self.last_contribution_ms.insert(attacker, now_ms);
    }

    /// The current top contributor, i.e. the "champion" awardee, or `None`
    /// if nobody has contributed damage.
    pub fn champion(&self) -> Option<Entity> {
        self.damage
            .iter()
            .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal))
            .map(|e| e.target)
    }

    pub fn total_damage(&self) -> f32 {
        self.damage.iter().map(|e| e.score).sum()
    }

    /// Split `total_reward` proportionally across every contributor with
    /// positive damage, descending by share, then clear the ledger
    /// (`RewardManager::awardAllAwardees` + implicit reset).
    pub fn award_all(&mut self, total_reward: f32) -> Vec<(Entity, f32)> {
        let mut entries: Vec<_> = self.damage.iter().copied().collect();
        entries.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        let total_damage: f32 = entries.iter().map(|e| e.score).sum();

        let mut awards = Vec::new();
        if total_damage > 0.0 {
            for e in &entries {
                if e.score <= 0.0 {
                    continue;
                }
                awards.push((e.target, total_reward * (e.score / total_damage)));
            }
        }
        self.remove_all();
        awards
    }

    pub fn remove_all(&mut self) {
        self.damage.clear();
        self.last_contribution_ms.clear();
    }

    /// Drop awardees that haven't contributed damage for longer than
    /// `AWARDEE_IDLE_TIMEOUT_MS` (spec.md §4.5's dirty-driven prune).
    pub fn prune_idle(&mut self, now_ms: u64) {
        let stale: Vec<Entity> = self
            .last_contribution_ms
            .iter()
            .filter(|&(_, &t)| now_ms.saturating_sub(t) > AWARDEE_IDLE_TIMEOUT_MS)
            .map(|(&e, _)| e)
            .collect();
        for e in stale {
            self.damage.remove(e);
            self.last_contribution_ms.remove(&e);
        }
    }
}

pub fn reward_prune_system(clock: Res<SimClock>, mut q: Query<&mut RewardManager>) {
    for mut rm in q.iter_mut() {
        rm.prune_idle(clock.time_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy_ecs::prelude::World;

    #[test]
    fn sixty_forty_damage_split_awards_proportionally() {
        let mut world = World::new();
        let a = world.spawn_empty().id();
        let b = world.spawn_empty().id();

        let mut rm = RewardManager::new();
        rm.add_damage(a, 60.0, 0);
        rm.add_damage(b, 40.0, 0);
        assert_eq!(rm.champion(), Some(a));

        let awards = rm.award_all(100.0);
        let a_award = awards.iter().find(|(e, _)| *e == a).unwrap().1;
        let b_award = awards.iter().find(|(e, _)| *e == b).unwrap().1;
        assert!((a_award - 60.0).abs() < 1e-4);
        assert!((b_award - 40.0).abs() < 1e-4);
        assert!(rm.total_damage() == 0.0); // ledger cleared after award
    }

    #[test]
    fn idle_awardee_is_pruned_after_timeout() {
        let mut world = World::new();
        let a = world.spawn_empty().id();
        let mut rm = RewardManager::new();
        rm.add_damage(a, 10.0, 0);
        rm.prune_idle(AWARDEE_IDLE_TIMEOUT_MS + 1);
        assert_eq!(rm.total_damage(), 0.0);
    }

    #[test]
    fn no_damage_awards_nothing() {
        let mut rm = RewardManager::new();
        assert!(rm.award_all(100.0).is_empty());
    }
}
