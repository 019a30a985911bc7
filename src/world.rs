//! Simulation snapshot types: a serializable view over the battle's
//! current entities, for inspection/testing (spec.md §6). Mirrors the
//! teacher's `Snapshot`/`to_json`/`to_json_pretty` path, generalized from a
//! single squad taxonomy to this spec's Player/Robot/ItemBox/Item/
//! Projectile taxonomy.

use crate::components::*;
use crate::protocol::BattleState;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub guid: u32,
    pub x: f32,
    pub y: f32,
    pub health: f32,
    pub max_health: f32,
    pub kill_count: u32,
    pub is_alive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotSnapshot {
    pub guid: u32,
    pub x: f32,
    pub y: f32,
    pub health: f32,
    pub max_health: f32,
    pub template_id: u32,
    pub is_alive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemBoxSnapshot {
    pub guid: u32,
    pub x: f32,
    pub y: f32,
    pub current_health: f32,
    pub max_health: f32,
    pub is_destroyed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemSnapshot {
    pub guid: u32,
    pub x: f32,
    pub y: f32,
    pub item_template_id: u32,
    pub stack_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectileSnapshot {
    pub guid: u32,
    pub x: f32,
    pub y: f32,
    pub kind: String,
    pub progress: f32,
}

/// Complete battle state snapshot (spec.md §6 external-interface record
/// shape), serializable for test assertions and embedder inspection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u64,
    pub time_ms: u64,
    pub battle_state: Option<String>,
    pub players: Vec<PlayerSnapshot>,
    pub robots: Vec<RobotSnapshot>,
    pub item_boxes: Vec<ItemBoxSnapshot>,
    pub items: Vec<ItemSnapshot>,
    pub projectiles: Vec<ProjectileSnapshot>,
}

impl Snapshot {
    pub fn from_world(world: &mut World, tick: u64, time_ms: u64, battle_state: Option<BattleState>) -> Self {
        let mut players = Vec::new();
        let mut player_query = world.query::<(&WorldObjectHeader, &Position, &UnitCore, &PlayerState)>();
        for (header, pos, unit, player) in player_query.iter(world) {
            players.push(PlayerSnapshot {
                guid: header.guid.raw(),
                x: pos.x,
                y: pos.y,
                health: unit.health,
                max_health: unit.max_health,
                kill_count: player.kill_count,
                is_alive: unit.is_alive(),
            });
        }

        let mut robots = Vec::new();
        let mut robot_query = world.query::<(&WorldObjectHeader, &Position, &UnitCore, &RobotTemplate)>();
        for (header, pos, unit, template) in robot_query.iter(world) {
            robots.push(RobotSnapshot {
                guid: header.guid.raw(),
                x: pos.x,
                y: pos.y,
                health: unit.health,
                max_health: unit.max_health,
                template_id: template.template_id,
                is_alive: unit.is_alive(),
            });
        }

        let mut item_boxes = Vec::new();
        let mut item_box_query = world.query::<(&WorldObjectHeader, &Position, &ItemBoxState)>();
        for (header, pos, state) in item_box_query.iter(world) {
            item_boxes.push(ItemBoxSnapshot {
                guid: header.guid.raw(),
                x: pos.x,
                y: pos.y,
                current_health: state.current_health,
                max_health: state.max_health,
                is_destroyed: state.is_destroyed(),
            });
        }

        let mut items = Vec::new();
        let mut item_query = world.query::<(&WorldObjectHeader, &Position, &ItemState)>();
        for (header, pos, state) in item_query.iter(world) {
            items.push(ItemSnapshot {
                guid: header.guid.raw(),
                x: pos.x,
                y: pos.y,
                item_template_id: state.item_template_id,
                stack_count: state.stack_count,
            });
        }

        let mut projectiles = Vec::new();
        let mut projectile_query = world.query::<(&WorldObjectHeader, &Position, &ProjectileState)>();
        for (header, pos, state) in projectile_query.iter(world) {
            projectiles.push(ProjectileSnapshot {
                guid: header.guid.raw(),
                x: pos.x,
                y: pos.y,
                kind: format!("{:?}", state.kind),
                progress: state.progress(),
            });
        }

        Self {
            tick,
            time_ms,
            battle_state: battle_state.map(|s| format!("{:?}", s)),
            players,
            robots,
            item_boxes,
            items,
            projectiles,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guid::{GuidAllocator, ObjectTypeId};

    #[test]
    fn snapshot_collects_every_taxonomy_branch() {
        let mut world = World::new();
        let mut guids = GuidAllocator::new();

        let player_guid = guids.allocate(ObjectTypeId::Player).unwrap();
        world.spawn((
            WorldObjectHeader::new(player_guid),
            Position::new(1.0, 2.0),
            UnitCore { health: 80.0, max_health: 100.0, ..Default::default() },
            PlayerState::default(),
        ));

        let robot_guid = guids.allocate(ObjectTypeId::Robot).unwrap();
        world.spawn((
            WorldObjectHeader::new(robot_guid),
            Position::new(3.0, 4.0),
            UnitCore::default(),
            RobotTemplate { template_id: 7 },
        ));

        let snapshot = Snapshot::from_world(&mut world, 1, 33, Some(BattleState::InProgress));
        assert_eq!(snapshot.players.len(), 1);
        assert_eq!(snapshot.robots.len(), 1);
        assert_eq!(snapshot.robots[0].template_id, 7);
        assert_eq!(snapshot.battle_state.as_deref(), Some("InProgress"));

        let json = snapshot.to_json().unwrap();
        assert!(json.contains("\"tick\":1"));
    }
}
