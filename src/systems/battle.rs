//! Battle lifecycle state machine and shrinking safe zone (spec.md §4.8).
//! Grounded on `original_source`'s `BattleMap.cpp/.h` `BattleState` enum and
//! `updateBattleState`/`updateSafeZone`; the gating shape (a small resource
//! with an `update` method that flips state once its own timer passes)
//! follows the teacher's `SimTick`/LOD resource idiom.

use crate::clock::SimClock;
use crate::components::{PlayerState, UnitCore};
use crate::config::SimConfig;
use crate::map::waypoints::WaypointGraph;
use crate::protocol::{BattleState, BattleUpdate, BattleUpdateFlags};
use crate::systems::spawn::SpawnManager;
use bevy_ecs::prelude::*;

/// Battle-wide state machine (`BattleMap::updateBattleState`). `PREPARING`
/// is skipped entirely on training maps (spec.md §4.8 edge case).
#[derive(Resource, Debug, Clone)]
pub struct BattleManager {
    state: BattleState,
    state_started_ms: u64,
    pub safe_zone_radius: f32,
    pub alive_count: u32,
    pub magicbean_count: u32,
    pending_flags: BattleUpdateFlags,
    /// Set exactly once when the safe zone first crosses `danger_alert_radius`
    /// (spec.md §4.8). Callers read this to fire a one-shot alert to players.
    pub danger_alert_triggered: bool,
}

impl BattleManager {
    pub fn new(config: &SimConfig) -> Self {
        let state = if config.is_training_map {
            BattleState::InProgress
        } else {
            BattleState::None
        };
        Self {
            state,
            state_started_ms: 0,
            safe_zone_radius: config.initial_safe_zone_radius,
            alive_count: 0,
            magicbean_count: 0,
            pending_flags: BattleUpdateFlags::STATE,
            danger_alert_triggered: false,
        }
    }

    pub fn state(&self) -> BattleState {
        self.state
    }

    pub fn elapsed_in_state_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.state_started_ms)
    }

    fn transition(&mut self, next: BattleState, now_ms: u64) {
        tracing::debug!(from = ?self.state, to = ?next, now_ms, "battle state transition");
        self.state = next;
        self.state_started_ms = now_ms;
        self.pending_flags.set(BattleUpdateFlags::STATE);
    }

    /// Advance the state machine and recompute the safe-zone radius. Returns
    /// `true` exactly on the tick `IN_PROGRESS` is entered, so callers know
    /// to arm per-battle bookkeeping (spawn manager reset, etc.).
    ///
    /// `queue_empty` and `all_players_withdrawn` gate the `Ending`
    /// transition per spec.md §4.8: "all players withdrew, or alive <= 1
    /// and all pending players arrived" — a wipe with players still queued
    /// to spawn shouldn't end the battle early.
    pub fn update(&mut self, config: &SimConfig, now_ms: u64, queue_empty: bool, all_players_withdrawn: bool) -> bool {
        let mut entered_in_progress = false;
        match self.state {
            BattleState::None => {
                self.transition(BattleState::Preparing, now_ms);
            }
            BattleState::Preparing => {
                if self.elapsed_in_state_ms(now_ms) >= config.preparation_duration_ms {
                    self.transition(BattleState::InProgress, now_ms);
                    entered_in_progress = true;
                }
            }
            BattleState::InProgress => {
                let elapsed = self.elapsed_in_state_ms(now_ms);
                if !config.is_training_map {
                    let fraction = (elapsed as f32 / config.battle_duration_ms as f32).clamp(0.0, 1.0);
                    let shrink = (config.initial_safe_zone_radius * fraction).floor();
                    self.safe_zone_radius = config.initial_safe_zone_radius - shrink;
                    if !self.danger_alert_triggered && self.safe_zone_radius <= config.danger_alert_radius {
                        self.danger_alert_triggered = true;
                        self.pending_flags.set(BattleUpdateFlags::STATE);
                        tracing::warn!(radius = self.safe_zone_radius, "safe zone entered danger alert range");
                    }
                    let time_expired = elapsed >= config.battle_duration_ms;
                    let wiped_out = self.alive_count <= 1 && queue_empty;
                    if time_expired || all_players_withdrawn || wiped_out {
                        self.transition(BattleState::Ending, now_ms);
                    }
                }
            }
            BattleState::Ending => {
                // one tick grace period to let the delta flush carry the final state change
                self.transition(BattleState::Ended, now_ms);
            }
            BattleState::Ended => {}
        }
        entered_in_progress
    }

    pub fn take_update(&mut self, config: &SimConfig, now_ms: u64) -> Option<BattleUpdate> {
        if self.pending_flags.0 == 0 {
            return None;
        }
        let flags = self.pending_flags;
        self.pending_flags = BattleUpdateFlags::empty();
        Some(BattleUpdate {
            flags,
            state: Some(self.state),
            preparation_duration_ms: Some(config.preparation_duration_ms),
            battle_duration_ms: Some(config.battle_duration_ms),
            start_time_ms: Some(self.state_started_ms),
            alive_count: Some(self.alive_count),
            magicbean_count: Some(self.magicbean_count),
        })
    }

    pub fn mark_alive_count_dirty(&mut self, alive_count: u32) {
        if alive_count != self.alive_count {
            self.alive_count = alive_count;
            self.pending_flags.set(BattleUpdateFlags::ALIVE_COUNT);
        }
    }
}

/// Drive the battle state machine and shrink the waypoint graph's reachable
/// set to match the current safe-zone radius (spec.md §2 Housekeeping).
/// Alive count and withdrawal state are recomputed from live ECS state
/// every tick rather than trusted to whatever last called
/// `mark_alive_count_dirty` directly.
pub fn battle_state_system(
    clock: Res<SimClock>,
    config: Res<SimConfig>,
    spawner: Res<SpawnManager>,
    mut battle: ResMut<BattleManager>,
    mut graph: ResMut<WaypointGraph>,
    units: Query<&UnitCore>,
    players: Query<&PlayerState>,
) {
    let alive_count = units.iter().filter(|u| u.is_alive()).count() as u32;
    battle.mark_alive_count_dirty(alive_count);

    let mut any_player = false;
    let mut all_withdrawn = true;
    for player in players.iter() {
        any_player = true;
        if !player.withdrawn {
            all_withdrawn = false;
            break;
        }
    }
    let all_players_withdrawn = any_player && all_withdrawn;
    let queue_empty = spawner.is_queue_empty();

    battle.update(&config, clock.time_ms, queue_empty, all_players_withdrawn);
    if battle.state() == BattleState::InProgress {
        graph.shrink_safe_zone(battle.safe_zone_radius, config.safe_distance);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn training_map_starts_in_progress_and_never_shrinks() {
        let config = SimConfig { is_training_map: true, ..SimConfig::default() };
        let mut battle = BattleManager::new(&config);
        assert_eq!(battle.state(), BattleState::InProgress);
        battle.update(&config, 999_999_999, true, false);
        assert_eq!(battle.state(), BattleState::InProgress);
        assert_eq!(battle.safe_zone_radius, config.initial_safe_zone_radius);
    }

    #[test]
    fn battle_map_progresses_through_full_lifecycle() {
        let config = SimConfig {
            preparation_duration_ms: 1000,
            battle_duration_ms: 10_000,
            ..SimConfig::default()
        };
        let mut battle = BattleManager::new(&config);
        assert_eq!(battle.state(), BattleState::None);
        battle.update(&config, 0, true, false);
        assert_eq!(battle.state(), BattleState::Preparing);
        battle.alive_count = 5;
        let entered = battle.update(&config, 1500, true, false);
        assert!(entered);
        assert_eq!(battle.state(), BattleState::InProgress);
        battle.update(&config, 6500, true, false);
        assert!(battle.safe_zone_radius < config.initial_safe_zone_radius);
        battle.update(&config, 10_500, true, false);
        assert_eq!(battle.state(), BattleState::Ending);
        battle.update(&config, 10_600, true, false);
        assert_eq!(battle.state(), BattleState::Ended);
    }

    #[test]
    fn danger_alert_triggers_once_when_safe_zone_shrinks_past_radius() {
        let config = SimConfig {
            preparation_duration_ms: 0,
            battle_duration_ms: 10_000,
            initial_safe_zone_radius: 1000.0,
            danger_alert_radius: 500.0,
            ..SimConfig::default()
        };
        let mut battle = BattleManager::new(&config);
        battle.update(&config, 0, true, false); // -> Preparing
        battle.alive_count = 5;
        battle.update(&config, 1, true, false); // -> InProgress
        assert!(!battle.danger_alert_triggered);
        battle.update(&config, 6000, true, false); // 60% elapsed, radius = 400 <= 500
        assert!(battle.danger_alert_triggered);
        battle.update(&config, 6100, true, false);
        assert!(battle.danger_alert_triggered, "stays latched once triggered");
    }

    #[test]
    fn sole_survivor_ends_battle_early() {
        let config = SimConfig {
            preparation_duration_ms: 0,
            battle_duration_ms: 180_000,
            ..SimConfig::default()
        };
        let mut battle = BattleManager::new(&config);
        battle.update(&config, 0, true, false); // -> Preparing
        battle.alive_count = 1;
        battle.update(&config, 1, true, false); // -> InProgress
        battle.update(&config, 2, true, false);
        assert_eq!(battle.state(), BattleState::Ending);
    }

    #[test]
    fn sole_survivor_does_not_end_battle_while_players_still_queued() {
        let config = SimConfig {
            preparation_duration_ms: 0,
            battle_duration_ms: 180_000,
            ..SimConfig::default()
        };
        let mut battle = BattleManager::new(&config);
        battle.update(&config, 0, false, false); // -> Preparing
        battle.alive_count = 1;
        battle.update(&config, 1, false, false); // -> InProgress
        battle.update(&config, 2, false, false);
        assert_eq!(battle.state(), BattleState::InProgress, "a pending player still hasn't arrived");
    }

    #[test]
    fn all_players_withdrawn_ends_battle_immediately() {
        let config = SimConfig {
            preparation_duration_ms: 0,
            battle_duration_ms: 180_000,
            ..SimConfig::default()
        };
        let mut battle = BattleManager::new(&config);
        battle.update(&config, 0, true, false); // -> Preparing
        battle.alive_count = 5;
        battle.update(&config, 1, true, false); // -> InProgress
        battle.update(&config, 2, true, true);
        assert_eq!(battle.state(), BattleState::Ending);
    }
}
