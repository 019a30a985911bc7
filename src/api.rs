//! The embedder-facing simulation handle: owns the `bevy_ecs` `World`
//! plus a fixed set of per-phase `Schedule`s, and advances them on a
//! fixed timestep (spec.md §5). Grounded on the teacher's `SimWorld`
//! (`new`/`step`/`fixed_update` accumulator pattern, `snapshot`/
//! `snapshot_json`), generalized from its single combined schedule to
//! the five separately-scheduled phases this spec's tick pipeline needs
//! (spec.md §2): the projectile-hit collect/apply split forces a
//! resource hand-off that can't live inside one `Schedule::add_systems`
//! call, so Phase 4 runs as its own `Schedule`.

use crate::clock::SimClock;
use crate::components::*;
use crate::config::SimConfig;
use crate::error::Result;
use crate::guid::{GuidAllocator, ObjectTypeId};
use crate::map::jps::PrecomputedJumpMap;
use crate::map::tile::MapData;
use crate::map::waypoints::WaypointGraph;
use crate::spatial::{spatial_grid_sync_system, SpatialGrid};
use crate::systems::ai::{bot_ai_system, bot_danger_escape_system, SimRng};
use crate::systems::battle::{battle_state_system, BattleManager};
use crate::systems::combat::{apply_hits_system, collect_hits_system, resolve_combat_damage, PendingProjectileHits};
use crate::systems::managers::{item_wish_refresh_system, target_selector_refresh_system, TargetSelector, WishManager};
use crate::systems::motion::motion_step_system;
use crate::systems::projectile::projectile_motion_system;
use crate::systems::reward::reward_prune_system;
use crate::systems::spawn::{item_respawn_system, item_respawn_tick_system, player_queue_spawn_system, robot_fill_system, SpawnManager};
use crate::systems::stamina::{stamina_update_system, StaminaSyncQueue};
use crate::visibility::{clear_notify_flags_system, delta_flush_system, visibility_update_system, UpdateObjectTracker, VisibilityState};
use crate::world::Snapshot;
use bevy_ecs::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// The simulation's embedder-facing handle. Holds the ECS `World`
/// together with the five phase schedules described in spec.md §2,
/// advanced one fixed tick at a time by [`SimWorld::fixed_update`].
pub struct SimWorld {
    world: World,
    phase1_perception: Schedule,
    phase2_decision: Schedule,
    phase3_motion: Schedule,
    phase4_combat: Schedule,
    phase5_housekeeping: Schedule,
    time_accumulator: f32,
}

impl SimWorld {
    /// Build a fresh battle on `map`, tuned by `config`. The waypoint
    /// graph starts empty — callers seed it via [`SimWorld::waypoints_mut`]
    /// once the map's authored waypoint data is available.
    pub fn new(config: SimConfig, map: MapData) -> Self {
        let mut world = World::new();

        let jump_map = PrecomputedJumpMap::new(&map);
        let rng_seed = config.rng_seed;
        let default_sight_distance = config.default_sight_distance;
        let battle = BattleManager::new(&config);

        world.insert_resource(GuidAllocator::new());
        world.insert_resource(SpatialGrid::new());
        world.insert_resource(VisibilityState::default());
        world.insert_resource(UpdateObjectTracker::default());
        world.insert_resource(SimClock::default());
        world.insert_resource(battle);
        world.insert_resource(WaypointGraph::new());
        world.insert_resource(SpawnManager::new(0, Vec::new()));
        world.insert_resource(PendingProjectileHits::default());
        world.insert_resource(StaminaSyncQueue::default());
        world.insert_resource(SimRng(ChaCha8Rng::seed_from_u64(rng_seed)));
        world.insert_resource(jump_map);
        world.insert_resource(map);
        world.insert_resource(config);

        let mut phase1_perception = Schedule::default();
        phase1_perception.add_systems((spatial_grid_sync_system, visibility_update_system).chain());
        phase1_perception.add_systems(
            move |selectors: Query<(Entity, &Position, &mut TargetSelector)>,
                  candidates: Query<(Entity, &Position, &UnitCore), With<AttackableState>>| {
                target_selector_refresh_system(selectors, candidates, default_sight_distance);
            },
        );
        phase1_perception.add_systems(
            move |bots: Query<(Entity, &Position, &mut WishManager)>,
                  items: Query<(Entity, &Position, &ItemState)>,
                  item_boxes: Query<(Entity, &Position, &ItemBoxState)>| {
                item_wish_refresh_system(bots, items, item_boxes, default_sight_distance);
            },
        );

        let mut phase2_decision = Schedule::default();
        phase2_decision.add_systems((bot_ai_system, bot_danger_escape_system).chain());

        let mut phase3_motion = Schedule::default();
        phase3_motion.add_systems((motion_step_system, projectile_motion_system).chain());

        let mut phase4_combat = Schedule::default();
        phase4_combat.add_systems((collect_hits_system, apply_hits_system, resolve_combat_damage, stamina_update_system, reward_prune_system).chain());

        let mut phase5_housekeeping = Schedule::default();
        phase5_housekeeping.add_systems((battle_state_system, player_queue_spawn_system, robot_fill_system).chain());
        phase5_housekeeping.add_systems(item_respawn_tick_system.pipe(item_respawn_system));
        phase5_housekeeping.add_systems((delta_flush_system, clear_notify_flags_system).chain());

        Self {
            world,
            phase1_perception,
            phase2_decision,
            phase3_motion,
            phase4_combat,
            phase5_housekeeping,
            time_accumulator: 0.0,
        }
    }

    /// Build a default small-scale test world: an open 32x32 map and
    /// default `SimConfig`, with no entities spawned.
    pub fn new_default_test_world() -> Self {
        Self::new(SimConfig::default(), MapData::new(32, 32, 64.0))
    }

    /// Run the five-phase tick pipeline once, advancing the clock by
    /// `diff_ms` (spec.md §2's per-tick control flow, adapted to the
    /// ECS scheduling this crate uses instead of the original's direct
    /// method-call chain).
    fn tick_once(&mut self, diff_ms: u64) {
        self.world.resource_mut::<SimClock>().advance(diff_ms);
        tracing::trace!(tick = self.world.resource::<SimClock>().tick, "tick start");

        self.phase1_perception.run(&mut self.world);
        self.phase2_decision.run(&mut self.world);
        self.phase3_motion.run(&mut self.world);
        self.phase4_combat.run(&mut self.world);
        self.phase5_housekeeping.run(&mut self.world);

        self.despawn_dead();
    }

    /// Remove dead units and finished projectiles (spec.md §2:
    /// "remove dead objects"). Runs after the schedules so every system
    /// this tick still saw a consistent, pre-removal world.
    fn despawn_dead(&mut self) {
        let mut dead = Vec::new();
        let mut dead_query = self.world.query::<(Entity, &UnitCore)>();
        for (entity, unit) in dead_query.iter(&self.world) {
            if !unit.is_alive() {
                dead.push(entity);
            }
        }
        let mut finished_query = self.world.query::<(Entity, &ProjectileState)>();
        for (entity, proj) in finished_query.iter(&self.world) {
            if proj.is_finished() {
                dead.push(entity);
            }
        }
        for entity in dead {
            self.world.resource_mut::<SpatialGrid>().remove(entity);
            if self.world.get_entity(entity).is_some() {
                self.world.despawn(entity);
            }
        }
    }

    /// Fixed-timestep accumulator: advance by `dt` seconds of wall time,
    /// running as many whole `fixed_timestep`-sized ticks as have
    /// accumulated (spec.md §5: tick-driven, no client-paced suspension).
    pub fn fixed_update(&mut self, dt: f32) {
        self.time_accumulator += dt;
        let fixed = self.world.resource::<SimConfig>().fixed_timestep;
        let diff_ms = (fixed * 1000.0) as u64;
        while self.time_accumulator >= fixed {
            self.time_accumulator -= fixed;
            self.tick_once(diff_ms);
        }
    }

    /// Advance exactly one tick, ignoring the fixed-timestep accumulator.
    /// Useful for tests that want deterministic single-tick control.
    pub fn step(&mut self, diff_ms: u64) {
        self.tick_once(diff_ms);
    }

    pub fn tick(&self) -> u64 {
        self.world.resource::<SimClock>().tick
    }

    pub fn time_ms(&self) -> u64 {
        self.world.resource::<SimClock>().time_ms
    }

    pub fn config(&self) -> &SimConfig {
        self.world.resource::<SimConfig>()
    }

    pub fn waypoints_mut(&mut self) -> Mut<'_, WaypointGraph> {
        self.world.resource_mut::<WaypointGraph>()
    }

    pub fn spawner_mut(&mut self) -> Mut<'_, SpawnManager> {
        self.world.resource_mut::<SpawnManager>()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Queue a player for the next tick's spawn pass
    /// (`SpawnManager::addPlayerToQueue`).
    pub fn queue_player(&mut self, player_id: String) {
        self.world.resource_mut::<SpawnManager>().queue_player(player_id);
    }

    /// Spawn a robot directly, bypassing `robot_fill_system`'s capacity
    /// target — used by tests and scripted scenarios that want an exact
    /// robot count regardless of `robot_capacity`.
    pub fn spawn_robot(&mut self, x: f32, y: f32, stats: StatModifiers) -> Result<Entity> {
        let guid = self.world.resource_mut::<GuidAllocator>().allocate(ObjectTypeId::Robot)?;
        let ai_policy = if self.world.resource::<SimConfig>().is_training_map {
            crate::systems::ai::AiPolicy::Training
        } else {
            crate::systems::ai::AiPolicy::Sparring
        };
        let entity = self
            .world
            .spawn(RobotBundle {
                world: WorldObjectBundle {
                    header: WorldObjectHeader::new(guid),
                    position: Position::new(x, y),
                    observer_refs: ObserverRefs::default(),
                },
                attackable: AttackableState::default(),
                unit: UnitCore { health: 100.0, max_health: 100.0, ..Default::default() },
                velocity: Velocity::default(),
                orientation: Orientation::default(),
                template: RobotTemplate::default(),
                stats,
                threat_modifiers: ThreatModifiers::default(),
                items: ItemSlots::default(),
                ai_policy,
                proficiency: crate::systems::ai::RobotProficiency::default(),
                motion: crate::systems::motion::MotionMaster::default(),
                targets: crate::systems::managers::TargetSelector::default(),
                threats: crate::systems::managers::ThreatManager::default(),
                wishes: crate::systems::managers::WishManager::default(),
            })
            .id();
        self.world.resource_mut::<SpatialGrid>().insert(entity, x, y)?;
        Ok(entity)
    }

    /// Spawn a player directly, bypassing the join queue — used by tests
    /// that want a player entity available on tick 1.
    pub fn spawn_player(&mut self, x: f32, y: f32) -> Result<Entity> {
        let guid = self.world.resource_mut::<GuidAllocator>().allocate(ObjectTypeId::Player)?;
        let entity = self
            .world
            .spawn(PlayerBundle {
                world: WorldObjectBundle {
                    header: WorldObjectHeader::new(guid),
                    position: Position::new(x, y),
                    observer_refs: ObserverRefs::default(),
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
            })
            .id();
        self.world.resource_mut::<SpatialGrid>().insert(entity, x, y)?;
        Ok(entity)
    }

    /// Place an item box (`addSimpleItemBoxToGrid`).
    pub fn spawn_item_box(&mut self, template_id: u32, loot_id: u32, max_health: f32, x: f32, y: f32) -> Result<Entity> {
        let guid = self.world.resource_mut::<GuidAllocator>().allocate(ObjectTypeId::ItemBox)?;
        let entity = self
            .world
            .spawn(ItemBoxBundle {
                world: WorldObjectBundle {
                    header: WorldObjectHeader::new(guid),
                    position: Position::new(x, y),
                    observer_refs: ObserverRefs::default(),
                },
                attackable: AttackableState::default(),
                state: ItemBoxState {
                    template_id,
                    max_health,
                    current_health: max_health,
                    loot_id,
                    ..Default::default()
                },
            })
            .id();
        self.world.resource_mut::<SpatialGrid>().insert(entity, x, y)?;
        Ok(entity)
    }

    pub fn snapshot(&mut self) -> Snapshot {
        let tick = self.tick();
        let time_ms = self.time_ms();
        let battle_state = self.world.resource::<BattleManager>().state();
        Snapshot::from_world(&mut self.world, tick, time_ms, Some(battle_state))
    }

    pub fn snapshot_json(&mut self) -> serde_json::Result<String> {
        self.snapshot().to_json()
    }
}

/// Re-exported so downstream crates can match on battle phase without
/// reaching into `protocol` directly.
pub use crate::protocol::BattleState as SimBattleState;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_world_starts_at_tick_zero() {
        let world = SimWorld::new_default_test_world();
        assert_eq!(world.tick(), 0);
        assert_eq!(world.time_ms(), 0);
    }

    #[test]
    fn stepping_advances_clock_by_diff_ms() {
        let mut world = SimWorld::new_default_test_world();
        world.step(33);
        assert_eq!(world.tick(), 1);
        assert_eq!(world.time_ms(), 33);
    }

    #[test]
    fn fixed_update_runs_whole_ticks_only() {
        let mut world = SimWorld::new_default_test_world();
        let fixed = world.config().fixed_timestep;
        world.fixed_update(fixed * 2.5);
        assert_eq!(world.tick(), 2);
    }

    #[test]
    fn spawned_robot_appears_in_snapshot() {
        let mut world = SimWorld::new_default_test_world();
        world.spawn_robot(100.0, 100.0, StatModifiers::default()).unwrap();
        world.step(33);
        let snap = world.snapshot();
        assert_eq!(snap.robots.len(), 1);
    }

    #[test]
    fn queued_player_spawns_on_next_tick() {
        let mut world = SimWorld::new_default_test_world();
        world.queue_player("p1".into());
        world.step(33);
        let snap = world.snapshot();
        assert_eq!(snap.players.len(), 1);
    }

    #[test]
    fn dead_robot_is_removed_from_next_snapshot() {
        let mut world = SimWorld::new_default_test_world();
        let robot = world.spawn_robot(0.0, 0.0, StatModifiers::default()).unwrap();
        world.world_mut().get_mut::<UnitCore>(robot).unwrap().damage(1000.0);
        world.step(33);
        let snap = world.snapshot();
        assert!(snap.robots.is_empty());
    }

    #[test]
    fn snapshot_json_round_trips_tick_and_time() {
        let mut world = SimWorld::new_default_test_world();
        world.step(33);
        let json = world.snapshot_json().unwrap();
        assert!(json.contains("\"tick\":1"));
        assert!(json.contains("\"time_ms\":33"));
    }
}
