//! Bot AI actors (spec.md §2 responsibility table; detailed in
//! SPEC_FULL.md's Sparring/Training supplement). Grounded on
//! `original_source`'s `SparringRobotAI.h`/`TrainingRobotAI.h` (both reduce
//! to "priority chain picks an action, applies combat motion against the
//! chosen target") and the teacher's `systems/ai.rs`
//! `determine_behavior_state`/`ai_order_system` split between a pure
//! decision function and a thin system wrapper.

use crate::components::{DangerState, Position, UnitCore};
use crate::map::tile::MapData;
use crate::systems::battle::BattleManager;
use crate::systems::managers::{TargetSelector, ThreatManager, WishManager};
use crate::systems::motion::{DodgeDirection, MotionMaster, MovementGenerator};
use bevy_ecs::prelude::*;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Seeded RNG shared by every tick-local dice roll (dodge imperfection,
/// reaction-timer jitter, random step generator). Never `thread_rng()` —
/// determinism given a seed is load-bearing for spec.md §8 scenario 1.
#[derive(Resource)]
pub struct SimRng(pub ChaCha8Rng);

/// Per-robot dodge/reaction skill, scoped by combat proficiency level
/// (spec.md §4.3 "Smart chase"): `effective_dodge_chance` is the
/// probability the bot picks the physically-correct dodge direction
/// instead of flipping it.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RobotProficiency {
    pub effective_dodge_chance: f32,
    pub min_dodge_reaction_ms: u64,
    pub max_dodge_reaction_ms: u64,
    /// Distance at which this bot considers its target in range and
    /// switches `SmartChase` from closing in to circling (spec.md §4.3
    /// step 3).
    pub attack_range: f32,
    /// Radius of the circle a `SmartChase` bot holds around its target
    /// while circling (spec.md §4.3 "optimal dodge distance").
    pub optimal_dodge_distance: f32,
}

impl Default for RobotProficiency {
    fn default() -> Self {
        Self {
            effective_dodge_chance: 0.5,
            min_dodge_reaction_ms: 200,
            max_dodge_reaction_ms: 600,
            attack_range: 300.0,
            optimal_dodge_distance: 150.0,
        }
    }
}

impl RobotProficiency {
    pub fn sample_reaction_ms(&self, rng: &mut impl Rng) -> u64 {
        if self.max_dodge_reaction_ms <= self.min_dodge_reaction_ms {
            self.min_dodge_reaction_ms
        } else {
            rng.gen_range(self.min_dodge_reaction_ms..=self.max_dodge_reaction_ms)
        }
    }
}

/// With probability `chance` keep `physically_correct`, otherwise flip it
/// (spec.md §4.3 step 1: "deliberately imperfect dodging").
pub fn roll_effective_dodge(rng: &mut impl Rng, physically_correct: DodgeDirection, chance: f32) -> DodgeDirection {
    if rng.gen::<f32>() < chance.clamp(0.0, 1.0) {
        physically_correct
    } else {
        physically_correct.flip()
    }
}

/// Priority-chain action a bot pursues this tick (`SparringRobotAI`'s
/// `updateCollect`/`updateHide`/`updateCombat`/`updateUnlock`/`updateExplore`
/// chain, `TrainingRobotAI`'s combat-only chain).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotAction {
    Combat,
    Collect,
    Unlock,
    Explore,
    Idle,
}

/// Which behaviour chain a bot actor runs. Training bots only ever fight;
/// Sparring bots also collect/unlock/hide/explore (`original_source`'s two
/// concrete `RobotAI` subclasses).
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AiPolicy {
    Sparring,
    Training,
}

impl AiPolicy {
    /// Pure decision function (`determine_behavior_state` analogue): given
    /// which target buckets currently have an eligible entry, pick the
    /// action this tick's motion master should drive.
    pub fn decide(self, has_combat_target: bool, has_collect_wish: bool, has_unlock_wish: bool) -> BotAction {
        match self {
            AiPolicy::Training => {
                if has_combat_target {
                    BotAction::Combat
                } else {
                    BotAction::Idle
                }
            }
            AiPolicy::Sparring => {
                if has_combat_target {
                    BotAction::Combat
                } else if has_collect_wish {
                    BotAction::Collect
                } else if has_unlock_wish {
                    BotAction::Unlock
                } else {
                    BotAction::Explore
                }
            }
        }
    }
}

/// Drive every bot's action-priority chain, then push the corresponding
/// movement generator onto its motion master (spec.md §2 Decision phase).
/// Targets are pulled from the same-tick manager state rather than
/// recomputed here — `target_selector_refresh_system` runs earlier in
/// Phase 1/2.
pub fn bot_ai_system(
    mut rng: ResMut<SimRng>,
    mut bots: Query<(
        &AiPolicy,
        &RobotProficiency,
        &mut TargetSelector,
        &mut ThreatManager,
        &mut WishManager,
        &mut MotionMaster,
        &UnitCore,
    )>,
) {
    for (policy, proficiency, mut targets, mut threats, mut wishes, mut motion, unit) in bots.iter_mut() {
        if !unit.is_alive() {
            motion.clear_to_idle();
            continue;
        }

        let combat_target = targets.select(|_| Some(true)).or_else(|| threats.top(|_| true));
        let collect_wish = wishes.best_item_wish(|_| true);
        let unlock_wish = wishes.best_itembox_wish(|_| true);
        let action = policy.decide(combat_target.is_some(), collect_wish.is_some(), unlock_wish.is_some());

        match action {
            BotAction::Combat => {
                if let Some(target) = combat_target {
                    if !matches!(motion.top(), MovementGenerator::SmartChase { target: t, .. } if *t == target) {
                        let reaction_ms = proficiency.sample_reaction_ms(&mut rng.0);
                        motion.clear_to_idle();
                        motion.push(MovementGenerator::smart_chase(
                            target,
                            reaction_ms,
                            proficiency.max_dodge_reaction_ms.max(reaction_ms),
                        ));
                    }
                }
            }
            BotAction::Collect => {
                if let Some(target) = collect_wish {
                    if !matches!(motion.top(), MovementGenerator::SimpleChase { target: t } if *t == target) {
                        motion.clear_to_idle();
                        motion.push(MovementGenerator::SimpleChase { target });
                    }
                }
            }
            BotAction::Unlock => {
                if let Some(target) = unlock_wish {
                    if !matches!(motion.top(), MovementGenerator::SimpleChase { target: t } if *t == target) {
                        motion.clear_to_idle();
                        motion.push(MovementGenerator::SimpleChase { target });
                    }
                }
            }
            BotAction::Explore => {
                if matches!(motion.top(), MovementGenerator::Idle) {
                    motion.push(MovementGenerator::Explore);
                }
            }
            BotAction::Idle => {
                motion.clear_to_idle();
            }
        }
    }
}

/// Push `Escape` onto any bot the shrinking safe zone has reached, and pop
/// it again once the bot is back inside (spec.md §4.3 generator catalogue,
/// §8 scenario 2 — units must actually flee a closing zone rather than
/// stand in it). Runs after `bot_ai_system` so it overrides whatever the
/// priority chain picked this tick: escaping takes precedence over combat.
///
/// `Escape { away_from }` flees directly away from a point; to make a bot
/// move toward the safe-zone centre rather than away from it, `away_from`
/// is set to the point diametrically opposite the bot across the centre
/// (`2*pos - centre`), so the flee vector `pos - away_from` reduces to
/// `centre - pos`.
pub fn bot_danger_escape_system(map: Res<MapData>, battle: Res<BattleManager>, mut bots: Query<(&Position, &mut UnitCore, &mut MotionMaster)>) {
    if !battle.danger_alert_triggered {
        return;
    }
    let (cx, cy) = map.tile_to_world(map.width / 2, map.height / 2);
    let centre = Position::new(cx, cy);

    for (pos, mut unit, mut motion) in bots.iter_mut() {
        if !unit.is_alive() {
            continue;
        }
        let outside_zone = pos.distance(&centre) > battle.safe_zone_radius;
        if outside_zone {
            unit.danger_state = DangerState::InDanger;
            if !matches!(motion.top(), MovementGenerator::Escape { .. }) {
                let away_from = Position::new(2.0 * pos.x - centre.x, 2.0 * pos.y - centre.y);
                motion.clear_to_idle();
                motion.push(MovementGenerator::Escape { away_from });
            }
        } else {
            unit.danger_state = DangerState::Safe;
            if matches!(motion.top(), MovementGenerator::Escape { .. }) {
                motion.pop();
            }
        }
    }
}
