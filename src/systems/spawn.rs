//! Spawn manager (spec.md §2 responsibility table; detailed in
//! SPEC_FULL.md's spawn-manager supplement): player join/leave queue,
//! robot-fill-to-capacity, item-box loot draw, and floor-item respawn
//! timers. Grounded on `original_source`'s `SpawnManager.h`
//! (`addPlayerToQueue`/`processPendingPlayers`/`fillRobotsIfNeeded`/
//! `rollItemBoxLoot`) and the teacher's `spawn_ai_squad`/`spawn_mass_squads`
//! grid-formation spawn helpers in `api.rs`.

use crate::components::{
    AttackableState, ConcealmentState, ItemBoxBundle, ItemBoxState, ItemClass, ItemSlots, ItemState, Orientation, PlayerBundle, PlayerState,
    Position, RobotBundle, RobotTemplate, StatModifiers, ThreatModifiers, UnitCore, Velocity, Viewport, WorldObjectBundle, WorldObjectHeader,
};
use crate::config::SimConfig;
use crate::guid::{GuidAllocator, ObjectTypeId};
use bevy_ecs::prelude::*;
use std::collections::VecDeque;

/// A loot entry in an item box's loot table: template id plus a stack
/// count, drawn verbatim (no weighting logic lives in this crate — loot
/// table *authoring* stays out of scope per spec.md §1).
#[derive(Debug, Clone, Copy)]
pub struct LootEntry {
    pub item_template_id: u32,
    pub count: u32,
    pub class: ItemClass,
    pub level: u16,
}

/// Player join/leave queue, robot population target, and the item-box loot
/// tables this battle draws from (`SpawnManager::m_itemBoxItemListStore`
/// equivalent, pre-loaded and immutable for the battle's lifetime).
#[derive(Resource, Debug, Default)]
pub struct SpawnManager {
    pending_players: VecDeque<String>,
    pub robot_capacity: u32,
    pub loot_tables: Vec<Vec<LootEntry>>,
    spawn_points: Vec<(f32, f32)>,
    next_spawn_point: usize,
}

impl SpawnManager {
    pub fn new(robot_capacity: u32, spawn_points: Vec<(f32, f32)>) -> Self {
        Self {
            pending_players: VecDeque::new(),
            robot_capacity,
            loot_tables: Vec::new(),
            spawn_points,
            next_spawn_point: 0,
        }
    }

    pub fn queue_player(&mut self, player_id: String) {
        self.pending_players.push_back(player_id);
    }

    pub fn remove_from_queue(&mut self, player_id: &str) {
        self.pending_players.retain(|p| p != player_id);
    }

    pub fn is_queue_empty(&self) -> bool {
        self.pending_players.is_empty()
    }

    fn next_spawn_point(&mut self) -> (f32, f32) {
        if self.spawn_points.is_empty() {
            return (0.0, 0.0);
        }
        let point = self.spawn_points[self.next_spawn_point % self.spawn_points.len()];
        self.next_spawn_point += 1;
        point
    }

    /// Draw the loot entries for item box template `loot_id`, or an empty
    /// list if the id is out of range (`rollItemBoxLoot` falling through
    /// when a template has no configured loot).
    pub fn roll_loot(&self, loot_id: u32) -> &[LootEntry] {
        self.loot_tables.get(loot_id as usize).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

/// Pop every queued player and spawn a `PlayerBundle` for them
/// (`SpawnManager::processPendingPlayers`).
pub fn player_queue_spawn_system(mut commands: Commands, mut spawner: ResMut<SpawnManager>, mut guids: ResMut<GuidAllocator>) {
    while !spawner.is_queue_empty() {
        let Some(_player_id) = spawner.pending_players.pop_front() else { break };
        let Ok(guid) = guids.allocate(ObjectTypeId::Player) else { break };
        let (x, y) = spawner.next_spawn_point();
        commands.spawn(PlayerBundle {
            world: WorldObjectBundle {
                header: WorldObjectHeader::new(guid),
                position: Position::new(x, y),
                observer_refs: Default::default(),
            },
            attackable: AttackableState::default(),
            unit: UnitCore { health: 100.0, max_health: 100.0, ..Default::default() },
            velocity: Velocity::default(),
            orientation: Orientation::default(),
            viewport: Viewport::default(),
            concealment: ConcealmentState::default(),
            stats: StatModifiers::default(),
            items: ItemSlots::default(),
            player: PlayerState::default(),
        });
    }
}

/// Spawn robots up to `robot_capacity` (`SpawnManager::fillRobotsIfNeeded`).
/// Each new robot gets the full AI/motion component set so `bot_ai_system`
/// and `motion_step_system` pick it up starting the tick it appears.
pub fn robot_fill_system(
    mut commands: Commands,
    mut spawner: ResMut<SpawnManager>,
    mut guids: ResMut<GuidAllocator>,
    config: Res<SimConfig>,
    robots: Query<(), With<RobotTemplate>>,
) {
    let current = robots.iter().count() as u32;
    let deficit = spawner.robot_capacity.saturating_sub(current);
    let ai_policy = if config.is_training_map {
        crate::systems::ai::AiPolicy::Training
    } else {
        crate::systems::ai::AiPolicy::Sparring
    };
    for _ in 0..deficit {
        let Ok(guid) = guids.allocate(ObjectTypeId::Robot) else { break };
        let (x, y) = spawner.next_spawn_point();
        commands.spawn(RobotBundle {
            world: WorldObjectBundle {
                header: WorldObjectHeader::new(guid),
                position: Position::new(x, y),
                observer_refs: Default::default(),
            },
            attackable: AttackableState::default(),
            unit: UnitCore { health: 100.0, max_health: 100.0, ..Default::default() },
            velocity: Velocity::default(),
            orientation: Orientation::default(),
            template: RobotTemplate::default(),
            stats: StatModifiers::default(),
            threat_modifiers: ThreatModifiers::default(),
            items: ItemSlots::default(),
            ai_policy,
            proficiency: crate::systems::ai::RobotProficiency::default(),
            motion: crate::systems::motion::MotionMaster::default(),
            targets: crate::systems::managers::TargetSelector::default(),
            threats: crate::systems::managers::ThreatManager::default(),
            wishes: crate::systems::managers::WishManager::default(),
        });
    }
}

/// Spawn one item box and seed its loot list onto its `ItemBoxState`
/// (`addSimpleItemBoxToGrid` + `rollItemBoxLoot`).
pub fn spawn_item_box(commands: &mut Commands, guids: &mut GuidAllocator, template_id: u32, loot_id: u32, max_health: f32, x: f32, y: f32) -> Option<Entity> {
    let guid = guids.allocate(ObjectTypeId::ItemBox).ok()?;
    let entity = commands
        .spawn(ItemBoxBundle {
            world: WorldObjectBundle {
                header: WorldObjectHeader::new(guid),
                position: Position::new(x, y),
                observer_refs: Default::default(),
            },
            attackable: AttackableState::default(),
            state: ItemBoxState {
                template_id,
                max_health,
                current_health: max_health,
                direction: 0.0,
                spawn_tile: (0, 0),
                loot_id,
            },
        })
        .id();
    Some(entity)
}

/// Drop loose items from a destroyed item box's loot table
/// (`createItemBoxItem`), one entity per loot entry.
pub fn drop_loot(commands: &mut Commands, guids: &mut GuidAllocator, loot: &[LootEntry], at: Position, respawn_duration_ms: u64) {
    for entry in loot {
        let Ok(guid) = guids.allocate(ObjectTypeId::Item) else { continue };
        commands.spawn((
            WorldObjectBundle {
                header: WorldObjectHeader::new(guid),
                position: at,
                observer_refs: Default::default(),
            },
            ItemState {
                item_template_id: entry.item_template_id,
                stack_count: entry.count,
                class: entry.class,
                level: entry.level,
                holder: None,
                drop_duration_ms: respawn_duration_ms,
                drop_elapsed_ms: 0,
            },
        ));
    }
}

/// Advance every floor item's despawn/respawn timer; returns the set of
/// entities whose drop duration has elapsed (piped into
/// [`item_respawn_system`], which despawns + requeues a fresh drop via
/// `drop_loot`).
pub fn item_respawn_tick_system(config: Res<SimConfig>, mut items: Query<(Entity, &mut ItemState)>) -> Vec<Entity> {
    let diff_ms = (config.fixed_timestep * 1000.0) as u64;
    let mut expired = Vec::new();
    for (entity, mut item) in items.iter_mut() {
        if item.drop_duration_ms == 0 {
            continue;
        }
        item.drop_elapsed_ms = item.drop_elapsed_ms.saturating_add(diff_ms);
        if item.drop_elapsed_ms >= item.drop_duration_ms {
            expired.push(entity);
        }
    }
    expired
}

/// Consume `item_respawn_tick_system`'s expired list: despawn each item and
/// drop a fresh copy of itself in its place (spec.md spawn-manager
/// floor-item respawn).
pub fn item_respawn_system(
    In(expired): In<Vec<Entity>>,
    mut commands: Commands,
    mut guids: ResMut<GuidAllocator>,
    items: Query<(&Position, &ItemState)>,
) {
    for entity in expired {
        let Ok((pos, item)) = items.get(entity) else { continue };
        let at = *pos;
        let entry = LootEntry {
            item_template_id: item.item_template_id,
            count: item.stack_count,
            class: item.class,
            level: item.level,
        };
        let duration_ms = item.drop_duration_ms;
        commands.entity(entity).despawn();
        drop_loot(&mut commands, &mut guids, &[entry], at, duration_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queued_players_drain_in_fifo_order() {
        let mut spawner = SpawnManager::new(0, vec![]);
        spawner.queue_player("a".into());
        spawner.queue_player("b".into());
        assert!(!spawner.is_queue_empty());
        spawner.remove_from_queue("a");
        assert_eq!(spawner.pending_players.front().map(String::as_str), Some("b"));
    }

    #[test]
    fn spawn_points_cycle_round_robin() {
        let mut spawner = SpawnManager::new(0, vec![(0.0, 0.0), (1.0, 1.0)]);
        assert_eq!(spawner.next_spawn_point(), (0.0, 0.0));
        assert_eq!(spawner.next_spawn_point(), (1.0, 1.0));
        assert_eq!(spawner.next_spawn_point(), (0.0, 0.0));
    }

    #[test]
    fn roll_loot_out_of_range_returns_empty() {
        let spawner = SpawnManager::new(0, vec![]);
        assert!(spawner.roll_loot(99).is_empty());
    }
}
