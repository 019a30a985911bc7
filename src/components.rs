//! Component catalogue for the entity taxonomy of spec.md §3
//! (WorldObject / AttackableObject / Unit / Player / Robot / ItemBox /
//! Item / CarriedItem / Projectile / LocatorObject). Follows the
//! teacher's one-component-per-concern style (`components.rs`): small
//! derive-heavy structs, pure helper methods on each, a handful of
//! Bundle structs grouping the components an entity kind needs.

use crate::guid::ObjectGuid;
use crate::systems::ai::{AiPolicy, RobotProficiency};
use crate::systems::managers::{TargetSelector, ThreatManager, WishManager};
use crate::systems::motion::MotionMaster;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Tiny macro standing in for a `bitflags!`-shaped type without pulling in
/// the `bitflags` crate for a handful of narrow bitsets.
macro_rules! bitflags_like {
    (
        $(#[$meta:meta])*
        pub struct $name:ident: $ty:ty {
            $(const $flag:ident = $value:expr;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
        pub struct $name(pub $ty);

        impl $name {
            $(pub const $flag: $ty = $value;)*

            pub fn empty() -> Self {
                Self(0)
            }

            pub fn contains(&self, flag: $ty) -> bool {
                (self.0 & flag) == flag
            }

            pub fn set(&mut self, flag: $ty) {
                self.0 |= flag;
            }

            pub fn unset(&mut self, flag: $ty) {
                self.0 &= !flag;
            }
        }
    };
}

// ============================ CORE / SPATIAL ============================

#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Velocity {
    pub x: f32,
    pub y: f32,
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Orientation(pub f32);

bitflags_like! {
    /// Notification flags on every `WorldObject` (spec.md §4.1). Set by
    /// relocation/state changes, cleared by the per-tick notifier sweep.
    pub struct NotifyFlags: u8 {
        const VISIBILITY_CHANGED = 1 << 0;
        const TRACEABILITY_CHANGED = 1 << 1;
        const SAFETY_CHANGED = 1 << 2;
    }
}

/// Header shared by every spatial `WorldObject`.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WorldObjectHeader {
    pub guid: ObjectGuid,
    pub notify_flags: NotifyFlags,
    pub in_world: bool,
    pub object_updated: bool,
    pub visible: bool,
}

impl WorldObjectHeader {
    pub fn new(guid: ObjectGuid) -> Self {
        Self {
            guid,
            notify_flags: NotifyFlags::empty(),
            in_world: false,
            object_updated: false,
            visible: true,
        }
    }

    pub fn mark_updated(&mut self) {
        self.object_updated = true;
    }

    pub fn clear_updated(&mut self) {
        self.object_updated = false;
    }
}

/// Incoming "someone is observing me" refs, keyed by observer entity.
#[derive(Component, Debug, Clone, Default)]
pub struct ObserverRefs {
    pub observers: HashSet<Entity>,
}

// ========================= ATTACKABLE / UNIT =============================

#[derive(Component, Debug, Clone, Default)]
pub struct AttackableState {
    pub attackers: HashSet<Entity>,
    pub watchers: HashSet<Entity>,
}

bitflags_like! {
    pub struct UnitStateFlags: u16 {
        const MOVING = 1 << 0;
        const IN_COMBAT = 1 << 1;
        const ATTACKING = 1 << 2;
        const IN_COLLECTION = 1 << 3;
        const PICKING_UP = 1 << 4;
        const HIDING = 1 << 5;
        const SEEKING = 1 << 6;
        const CHARGING = 1 << 7;
        const IN_EXPLORATION = 1 << 8;
        const IN_UNLOCK = 1 << 9;
    }
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DeathState {
    #[default]
    Alive,
    Dead,
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DangerState {
    #[default]
    Safe,
    InDanger,
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(usize)]
pub enum Stat {
    MaxHealth = 0,
    MoveSpeed = 1,
    AttackPower = 2,
    Defense = 3,
}
pub const STAT_COUNT: usize = 4;

#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StatModifier {
    pub value: f32,
    pub percent: f32,
}
impl Default for StatModifier {
    fn default() -> Self {
        Self { value: 0.0, percent: 1.0 }
    }
}

/// `m_stat_modifiers[stat][modifier]` flattened to a fixed-size array
/// indexed by `Stat` discriminant (spec.md §9 design note: "many-keyed
/// multidim tables" become flat fixed-size arrays).
#[derive(Component, Debug, Clone, Copy)]
pub struct StatModifiers(pub [StatModifier; STAT_COUNT]);

impl Default for StatModifiers {
    fn default() -> Self {
        Self([StatModifier::default(); STAT_COUNT])
    }
}

impl StatModifiers {
    pub fn apply(&self, stat: Stat, base: f32) -> f32 {
        let m = self.0[stat as usize];
        (base + m.value) * m.percent
    }
}

/// Simple countdown timer, used for health-regen/loss, unsay-smiley,
/// conceal, withdrawal, danger-state, slow-move, and pickup timers
/// (spec.md §3 Unit header, §5 "Cancellation/timeout semantics").
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Timer {
    pub current_ms: u64,
    pub duration_ms: u64,
}

impl Timer {
    pub fn with_duration(duration_ms: u64) -> Self {
        Self { current_ms: 0, duration_ms }
    }

    pub fn update(&mut self, diff_ms: u64) {
        self.current_ms = self.current_ms.saturating_add(diff_ms);
    }

    pub fn passed(&self) -> bool {
        self.duration_ms > 0 && self.current_ms >= self.duration_ms
    }

    pub fn reset(&mut self) {
        self.current_ms = 0;
    }

    pub fn set_passed(&mut self) {
        self.current_ms = self.duration_ms;
    }
}

#[derive(Component, Debug, Clone, Default)]
pub struct UnitCore {
    pub state: UnitStateFlags,
    pub death_state: DeathState,
    pub danger_state: DangerState,
    pub health: f32,
    pub max_health: f32,
    pub pickup_target: Option<Entity>,
    pub unlock_target: Option<Entity>,
}

impl UnitCore {
    pub fn is_alive(&self) -> bool {
        self.death_state == DeathState::Alive
    }

    pub fn damage(&mut self, amount: f32) {
        self.health = (self.health - amount).max(0.0);
        if self.health <= 0.0 {
            self.death_state = DeathState::Dead;
        }
    }

    pub fn heal(&mut self, amount: f32) {
        self.health = (self.health + amount).min(self.max_health);
    }

    pub fn health_fraction(&self) -> f32 {
        if self.max_health <= 0.0 {
            0.0
        } else {
            self.health / self.max_health
        }
    }
}

pub const ITEM_SLOT_COUNT: usize = 6;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CarriedItem {
    pub item_template_id: u32,
    pub level: u16,
    pub count: u32,
    pub slot: u8,
    pub cooldown_duration_ms: u64,
}

#[derive(Component, Debug, Clone, Default)]
pub struct ItemSlots(pub [Option<CarriedItem>; ITEM_SLOT_COUNT]);

// =============================== PLAYER ===================================

#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    /// spec.md §4.1: visible range is viewport + object_max_size on each axis.
    pub fn visible_range(&self, object_max_size: f32) -> (f32, f32) {
        (self.width + object_max_size, self.height + object_max_size)
    }
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ConcealmentState {
    #[default]
    Visible,
    Concealed,
}

#[derive(Component, Debug, Clone, Default)]
pub struct PlayerState {
    pub is_gm: bool,
    pub kill_count: u32,
    pub experience: u64,
    pub money: u64,
    pub client_known_objects: HashSet<Entity>,
    /// Set once the player has left the battle for good (spec.md §4.8
    /// ending condition: "all players withdrew"). Distinct from death —
    /// a dead player hasn't necessarily withdrawn.
    pub withdrawn: bool,
}

// =============================== ROBOT ====================================

#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RobotTemplate {
    pub template_id: u32,
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CombatGrade {
    #[default]
    Chase,
    Escape,
}

/// `[combat_state x threat_type]` modifier matrix flattened, spec.md §4.4.
pub const THREAT_TYPE_COUNT: usize = 3; // distance, damage, charged_power
#[derive(Component, Debug, Clone, Copy)]
pub struct ThreatModifiers(pub [[f32; THREAT_TYPE_COUNT]; 2]);

impl Default for ThreatModifiers {
    fn default() -> Self {
        Self([[1.0; THREAT_TYPE_COUNT]; 2])
    }
}

// =============================== ITEMBOX ===================================

#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ItemBoxState {
    pub template_id: u32,
    pub max_health: f32,
    pub current_health: f32,
    pub direction: f32,
    pub spawn_tile: (i32, i32),
    pub loot_id: u32,
}

impl ItemBoxState {
    pub fn is_destroyed(&self) -> bool {
        self.current_health <= 0.0
    }
}

// ================================= ITEM ====================================

/// Item-class bucket used by the wish manager's priority formula (spec.md
/// §4.4: `priority[class] ∈ {none:0, gold:1, consumable_other:2,
/// magic_bean:3, equipment:4, first_aid:5}`).
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ItemClass {
    #[default]
    None,
    Gold,
    ConsumableOther,
    MagicBean,
    Equipment,
    FirstAid,
}

impl ItemClass {
    pub fn bucket_priority(self) -> f32 {
        match self {
            ItemClass::None => 0.0,
            ItemClass::Gold => 1.0,
            ItemClass::ConsumableOther => 2.0,
            ItemClass::MagicBean => 3.0,
            ItemClass::Equipment => 4.0,
            ItemClass::FirstAid => 5.0,
        }
    }
}

#[derive(Component, Debug, Clone, Copy, Default)]
pub struct ItemState {
    pub item_template_id: u32,
    pub stack_count: u32,
    pub class: ItemClass,
    pub level: u16,
    pub holder: Option<Entity>,
    pub drop_duration_ms: u64,
    pub drop_elapsed_ms: u64,
}

#[derive(Component, Debug, Clone, Default)]
pub struct ItemCollisionRefs {
    pub standing_units: HashSet<Entity>,
}

// =============================== PROJECTILE ================================

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ProjectileType {
    #[default]
    Normal,
    Charged,
    Intensified,
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ProjectileStatus {
    #[default]
    InFlight,
    Collided,
    Inactivating,
}

#[derive(Component, Debug, Clone)]
pub struct ProjectileState {
    pub launcher: Entity,
    pub origin: Position,
    pub attack_range: f32,
    pub launch_center: Position,
    pub launch_radius: f32,
    pub kind: ProjectileType,
    pub damage_bonus_ratio: f32,
    pub elapsed_ms: u64,
    pub duration_ms: u64,
    pub scale: f32,
    pub status: ProjectileStatus,
    pub collided_objects: HashSet<Entity>,
}

impl ProjectileState {
    pub fn progress(&self) -> f32 {
        if self.duration_ms == 0 {
            1.0
        } else {
            (self.elapsed_ms as f32 / self.duration_ms as f32).min(1.0)
        }
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed_ms >= self.duration_ms
    }
}

// =============================== LOCATOR ===================================

#[derive(Component, Debug, Clone, Copy)]
pub struct LocatorState {
    pub tracked: Entity,
}

// ================================ BUNDLES ===================================

#[derive(Bundle)]
pub struct WorldObjectBundle {
    pub header: WorldObjectHeader,
    pub position: Position,
    pub observer_refs: ObserverRefs,
}

#[derive(Bundle)]
pub struct PlayerBundle {
    pub world: WorldObjectBundle,
    pub attackable: AttackableState,
    pub unit: UnitCore,
    pub velocity: Velocity,
    pub orientation: Orientation,
    pub viewport: Viewport,
    pub concealment: ConcealmentState,
    pub stats: StatModifiers,
    pub items: ItemSlots,
    pub player: PlayerState,
}

#[derive(Bundle)]
pub struct RobotBundle {
    pub world: WorldObjectBundle,
    pub attackable: AttackableState,
    pub unit: UnitCore,
    pub velocity: Velocity,
    pub orientation: Orientation,
    pub template: RobotTemplate,
    pub stats: StatModifiers,
    pub threat_modifiers: ThreatModifiers,
    pub items: ItemSlots,
    pub ai_policy: AiPolicy,
    pub proficiency: RobotProficiency,
    pub motion: MotionMaster,
    pub targets: TargetSelector,
    pub threats: ThreatManager,
    pub wishes: WishManager,
}

#[derive(Bundle)]
pub struct ItemBoxBundle {
    pub world: WorldObjectBundle,
    pub attackable: AttackableState,
    pub state: ItemBoxState,
}

#[derive(Bundle)]
pub struct ItemBundle {
    pub world: WorldObjectBundle,
    pub state: ItemState,
    pub collisions: ItemCollisionRefs,
}

#[derive(Bundle)]
pub struct ProjectileBundle {
    pub world: WorldObjectBundle,
    pub attackable: AttackableState,
    pub state: ProjectileState,
    pub orientation: Orientation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_core_damage_transitions_to_dead_at_zero_health() {
        let mut unit = UnitCore {
            health: 10.0,
            max_health: 10.0,
            ..Default::default()
        };
        unit.damage(10.0);
        assert_eq!(unit.death_state, DeathState::Dead);
        assert_eq!(unit.health, 0.0);
    }

    #[test]
    fn timer_reset_then_passed_is_false() {
        let mut t = Timer::with_duration(1000);
        t.update(1000);
        assert!(t.passed());
        t.reset();
        assert!(!t.passed());
    }

    #[test]
    fn timer_with_zero_duration_never_passes() {
        let t = Timer::default();
        assert!(!t.passed());
    }

    #[test]
    fn notify_flags_set_and_unset() {
        let mut flags = NotifyFlags::empty();
        flags.set(NotifyFlags::VISIBILITY_CHANGED);
        assert!(flags.contains(NotifyFlags::VISIBILITY_CHANGED));
        flags.unset(NotifyFlags::VISIBILITY_CHANGED);
        assert!(!flags.contains(NotifyFlags::VISIBILITY_CHANGED));
    }

    #[test]
    fn stat_modifiers_apply_value_then_percent() {
        let mut mods = StatModifiers::default();
        mods.0[Stat::AttackPower as usize] = StatModifier { value: 5.0, percent: 2.0 };
        assert_eq!(mods.apply(Stat::AttackPower, 10.0), 30.0);
    }
}
