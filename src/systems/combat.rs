//! Combat-power scoring, projectile launch, and damage resolution
//! (spec.md §4.4/§4.5, glossary "combat power"). Grounded on
//! `original_source`'s `CombatManager.cpp` (`calcCombatPower`,
//! `launchProjectile`, `resolveProjectileHit`) and the teacher's
//! two-phase collect-then-apply pattern already used by
//! [`crate::systems::projectile`] for gathering hits under a read-only
//! query before mutating.

use crate::components::{
    AttackableState, Position, ProjectileBundle, ProjectileState, ProjectileStatus, ProjectileType, Stat, StatModifiers, ThreatModifiers,
    UnitCore, WorldObjectBundle, WorldObjectHeader,
};
use crate::config::{SimConfig, COMBAT_POWER_MAX};
use crate::guid::{GuidAllocator, ObjectTypeId};
use crate::spatial::SpatialGrid;
use crate::systems::managers::{ThreatManager, ThreatSample};
use crate::systems::projectile::{apply_projectile_hits, collect_projectile_hits};
use crate::systems::reward::RewardManager;
use bevy_ecs::prelude::*;

/// Projectile/unit overlaps gathered this tick by [`collect_hits_system`],
/// consumed by [`apply_hits_system`] (spec.md §2 Combat & reward phase).
/// A resource rather than a return value because the collect/apply split
/// must cross a system boundary: both halves need a `Query` over
/// `ProjectileState`, one read-only and one mutable, which cannot coexist
/// as two parameters of the same system.
#[derive(Resource, Debug, Default)]
pub struct PendingProjectileHits(pub Vec<(Entity, Entity)>);

pub fn collect_hits_system(
    grid: Res<SpatialGrid>,
    config: Res<SimConfig>,
    projectiles: Query<(Entity, &ProjectileState, &Position)>,
    mut pending: ResMut<PendingProjectileHits>,
) {
    pending.0 = collect_projectile_hits(&grid, &projectiles, config.object_max_size);
}

pub fn apply_hits_system(
    mut pending: ResMut<PendingProjectileHits>,
    mut projectiles: Query<(&mut ProjectileState, Option<&mut AttackableState>)>,
) {
    let hits = std::mem::take(&mut pending.0);
    apply_projectile_hits(hits, &mut projectiles);
}

/// Weights for the combat-power weighted sum (spec.md glossary). Kept as
/// plain constants rather than config fields since the spec treats them
/// as fixed classification weights, not battle tunables.
const COMBAT_POWER_ATTACK_WEIGHT: f32 = 0.6;
const COMBAT_POWER_DEFENSE_WEIGHT: f32 = 0.4;

/// Normalise a unit's attack/defense stats into `[0, COMBAT_POWER_MAX]`
/// (spec.md glossary: "a normalised scalar ... derived from unit stats
/// via weighted sum, used to classify bots into combat grades").
pub fn combat_power(stats: &StatModifiers, base_attack: f32, base_defense: f32) -> f32 {
    let attack = stats.apply(Stat::AttackPower, base_attack);
    let defense = stats.apply(Stat::Defense, base_defense);
    (attack * COMBAT_POWER_ATTACK_WEIGHT + defense * COMBAT_POWER_DEFENSE_WEIGHT).clamp(0.0, COMBAT_POWER_MAX)
}

/// Recoverable launch outcomes (spec.md §7.6); never wrapped in
/// `SimError` since a refused launch is an ordinary game-logic result,
/// not an invariant violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchStatus {
    Ok,
    /// The launcher has no stamina/charge available for an attack.
    InsufficientStamina,
    /// The launcher is already dead.
    LauncherDead,
}

/// Recoverable pickup outcomes (spec.md §7.5). `PICKUP_STATUS_*`
/// equivalents from `original_source`, collapsed to one enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickupStatus {
    Ok,
    /// Another unit's pickup already claimed the item this tick
    /// (spec.md §9 open question: later winner is authoritative).
    AlreadyClaimed,
    TargetNotFound,
    TooFar,
    InventoryFull,
}

const PICKUP_RANGE: f32 = 48.0;

/// Attempt to pick up a floor item into the first free inventory slot.
/// The later call wins any same-tick race (spec.md §9 decision) since
/// this simply overwrites `holder` without checking a prior claim from
/// earlier in the same tick.
pub fn attempt_pickup(
    picker_pos: Position,
    picker_items: &mut crate::components::ItemSlots,
    item_pos: Position,
    item: &mut crate::components::ItemState,
) -> PickupStatus {
    if item.holder.is_some() {
        return PickupStatus::AlreadyClaimed;
    }
    if picker_pos.distance(&item_pos) > PICKUP_RANGE {
        return PickupStatus::TooFar;
    }
    let Some(slot) = picker_items.0.iter().position(|s| s.is_none()) else {
        return PickupStatus::InventoryFull;
    };
    picker_items.0[slot] = Some(crate::components::CarriedItem {
        item_template_id: item.item_template_id,
        level: 0,
        count: item.stack_count,
        slot: slot as u8,
        cooldown_duration_ms: 0,
    });
    PickupStatus::Ok
}

/// Spawn a projectile entity along the launcher -> target Bézier curve
/// (`CombatManager::launchProjectile`). Returns the launch outcome; on
/// anything but `Ok` no entity is spawned.
#[allow(clippy::too_many_arguments)]
pub fn launch_projectile(
    commands: &mut Commands,
    guids: &mut GuidAllocator,
    launcher: Entity,
    launcher_alive: bool,
    can_attack: bool,
    origin: Position,
    target: Position,
    attack_range: f32,
    damage_bonus_ratio: f32,
    kind: ProjectileType,
    duration_ms: u64,
) -> LaunchStatus {
    if !launcher_alive {
        return LaunchStatus::LauncherDead;
    }
    if !can_attack {
        return LaunchStatus::InsufficientStamina;
    }
    let Ok(guid) = guids.allocate(ObjectTypeId::Projectile) else {
        return LaunchStatus::InsufficientStamina;
    };
    commands.spawn(ProjectileBundle {
        world: WorldObjectBundle {
            header: WorldObjectHeader::new(guid),
            position: origin,
            observer_refs: Default::default(),
        },
        attackable: AttackableState::default(),
        state: ProjectileState {
            launcher,
            origin,
            attack_range,
            launch_center: target,
            launch_radius: 0.0,
            kind,
            damage_bonus_ratio,
            elapsed_ms: 0,
            duration_ms,
            scale: 0.0,
            status: ProjectileStatus::InFlight,
            collided_objects: Default::default(),
        },
        orientation: Default::default(),
    });
    LaunchStatus::Ok
}

/// Damage resolution glue (spec.md §2 Combat & reward phase): for every
/// projectile `apply_projectile_hits` marked collided this tick, apply
/// damage to each collided target and feed the attacker's
/// [`RewardManager`] and the target's [`ThreatManager`]. Drains each
/// projectile's `collided_objects` set as it resolves it, so a
/// projectile that has already been resolved (but not yet despawned by
/// the caller) is never double-applied.
pub fn resolve_combat_damage(
    mut projectiles: Query<(Entity, &mut ProjectileState)>,
    mut targets: Query<(&mut UnitCore, Option<&StatModifiers>, Option<&mut RewardManager>, Option<&mut ThreatManager>, Option<&ThreatModifiers>)>,
    attackers: Query<&StatModifiers>,
    clock: Res<crate::clock::SimClock>,
) {
    for (_proj_entity, mut proj) in projectiles.iter_mut() {
        if proj.collided_objects.is_empty() {
            continue;
        }
        let hit_targets: Vec<Entity> = proj.collided_objects.drain().collect();
        let launcher = proj.launcher;
        let damage_bonus_ratio = proj.damage_bonus_ratio;
        let attack_power = attackers.get(launcher).map(|s| s.apply(Stat::AttackPower, 10.0)).unwrap_or(10.0);

        for target in hit_targets {
            let Ok((mut unit, target_stats, reward, threat, threat_mods)) = targets.get_mut(target) else { continue };
            if !unit.is_alive() {
                continue;
            }
            let defense = target_stats.map(|s| s.apply(Stat::Defense, 0.0)).unwrap_or(0.0);
            let amount = (attack_power * damage_bonus_ratio - defense).max(0.0).min(COMBAT_POWER_MAX);
            unit.damage(amount);

            if let Some(mut reward) = reward {
                reward.add_damage(launcher, amount, clock.time_ms);
            }
            if let (Some(mut threat), Some(mods)) = (threat, threat_mods) {
                threat.update_threat(launcher, ThreatSample { distance: 0.0, damage: amount, charged_power: 0.0 }, mods, 0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::StatModifier;

    #[test]
    fn combat_power_clamps_to_max() {
        let mut stats = StatModifiers::default();
        stats.0[Stat::AttackPower as usize] = StatModifier { value: 100_000.0, percent: 1.0 };
        let power = combat_power(&stats, 1.0, 1.0);
        assert_eq!(power, COMBAT_POWER_MAX);
    }

    #[test]
    fn combat_power_zero_stats_is_zero() {
        let stats = StatModifiers::default();
        let power = combat_power(&stats, 0.0, 0.0);
        assert_eq!(power, 0.0);
    }

    #[test]
    fn pickup_fails_when_already_claimed() {
        let mut items = crate::components::ItemSlots::default();
        let mut item = crate::components::ItemState {
            holder: Some(Entity::PLACEHOLDER),
            ..Default::default()
        };
        let status = attempt_pickup(Position::new(0.0, 0.0), &mut items, Position::new(1.0, 1.0), &mut item);
        assert_eq!(status, PickupStatus::AlreadyClaimed);
    }

    #[test]
    fn pickup_fails_when_too_far() {
        let mut items = crate::components::ItemSlots::default();
        let mut item = crate::components::ItemState::default();
        let status = attempt_pickup(Position::new(0.0, 0.0), &mut items, Position::new(1000.0, 0.0), &mut item);
        assert_eq!(status, PickupStatus::TooFar);
    }

    #[test]
    fn pickup_succeeds_into_first_free_slot() {
        let mut items = crate::components::ItemSlots::default();
        let mut item = crate::components::ItemState { item_template_id: 5, stack_count: 2, ..Default::default() };
        let status = attempt_pickup(Position::new(0.0, 0.0), &mut items, Position::new(1.0, 1.0), &mut item);
        assert_eq!(status, PickupStatus::Ok);
        assert!(items.0[0].is_some());
    }
}
