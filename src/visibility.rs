//! Visibility / update pipeline: per-observer `client_known_objects` set,
//! relocation notifiers, and coalesced per-tick delta emission (spec.md
//! §4.1). Grounded on the teacher's `SpatialGrid::query_radius`/
//! `query_enemies` queries generalized with the notify-flag bitset and
//! the `UpdateObject` batching the teacher's domain does not need.

use crate::components::{NotifyFlags, Position, Viewport, WorldObjectHeader};
use crate::config::SimConfig;
use crate::protocol::{FieldUpdateMask, UpdateBlock, UpdateObjectBatch, UpdateType};
use crate::spatial::SpatialGrid;
use bevy_ecs::prelude::*;
use std::collections::{HashMap, HashSet};

/// The map's `updateObjects` set: entities whose mutable data changed
/// this tick and must be flushed to their observers at tick end.
#[derive(Resource, Debug, Default)]
pub struct UpdateObjectTracker {
    dirty: HashSet<Entity>,
}

impl UpdateObjectTracker {
    pub fn notify_data_updated(&mut self, header: &mut WorldObjectHeader, entity: Entity) {
        if !header.object_updated {
            header.mark_updated();
            self.dirty.insert(entity);
        }
    }

    pub fn take_dirty(&mut self) -> Vec<Entity> {
        self.dirty.drain().collect()
    }
}

/// Per-player known-object sets and pending outgoing batches, flushed as
/// one `SMSG_UPDATE_OBJECT` opcode per observer at tick end.
#[derive(Resource, Debug, Default)]
pub struct VisibilityState {
    pub client_known: HashMap<Entity, HashSet<Entity>>,
    pub pending_batches: HashMap<Entity, UpdateObjectBatch>,
}

impl VisibilityState {
    fn batch_for(&mut self, observer: Entity) -> &mut UpdateObjectBatch {
        self.pending_batches.entry(observer).or_default()
    }
}

/// Pure visibility predicate (spec.md §4.1): target must be flagged
/// visible and fall inside the observer's visible rectangle centred on
/// its own position.
pub fn can_see_or_detect(
    observer_pos: Position,
    visible_range: (f32, f32),
    target_pos: Position,
    target_visible: bool,
) -> bool {
    target_visible
        && (target_pos.x - observer_pos.x).abs() <= visible_range.0
        && (target_pos.y - observer_pos.y).abs() <= visible_range.1
}

/// Recompute `max_visible_range` as the element-wise max over present
/// players' visible range, padded by `visible_range_step_padding *
/// max_step_length` (spec.md §4.1).
pub fn recompute_max_visible_range(
    config: &SimConfig,
    players: &[(f32, f32)], // (viewport width/height already summed with object_max_size)
    max_step_length: f32,
) -> (f32, f32) {
    let pad = config.visible_range_step_padding * max_step_length;
    players.iter().fold((0.0_f32, 0.0_f32), |acc, &(w, h)| {
        (acc.0.max(w + pad), acc.1.max(h + pad))
    })
}

pub fn visibility_update_system(
    config: Res<SimConfig>,
    grid: Res<SpatialGrid>,
    mut state: ResMut<VisibilityState>,
    players: Query<(Entity, &Position, &Viewport)>,
    objects: Query<(&Position, &WorldObjectHeader)>,
) {
    for (observer, obs_pos, viewport) in players.iter() {
        let visible_range = viewport.visible_range(config.object_max_size);
        let candidates = grid.query_radius(obs_pos.x, obs_pos.y, visible_range.0.max(visible_range.1));

        let known = state.client_known.entry(observer).or_default();
        let mut still_visible = HashSet::new();

        for (candidate, _dist) in candidates {
            if candidate == observer {
                continue;
            }
            let Ok((pos, header)) = objects.get(candidate) else { continue };
            if can_see_or_detect(*obs_pos, visible_range, *pos, header.visible) {
                still_visible.insert(candidate);
                if !known.contains(&candidate) {
                    let batch = state.pending_batches.entry(observer).or_default();
                    batch.blocks.push(UpdateBlock {
                        update_type: UpdateType::Create,
                        flags: 0,
                        guid: header.guid.raw(),
                        type_id: Some(header.guid.type_discriminant()),
                        field_mask: FieldUpdateMask::with_field_count(8),
                        changed_field_values: vec![],
                    });
                }
            }
        }

        let newly_out_of_range: Vec<Entity> = known.difference(&still_visible).copied().collect();
        if !newly_out_of_range.is_empty() {
            let batch = state.pending_batches.entry(observer).or_default();
            for gone in &newly_out_of_range {
                if let Ok((_, header)) = objects.get(*gone) {
                    batch.out_of_range.guids.push(header.guid.raw());
                }
            }
        }

        *known = still_visible;
    }
}

/// Coalesced delta emission: for every entity marked dirty this tick,
/// append a VALUES block to every current observer's batch (spec.md
/// §4.1). Field mask carries only the position fields in this
/// implementation; an object with no field changes gets no block at all,
/// matching the "unchanged object has empty field mask" round-trip
/// property (spec.md §8).
pub fn delta_flush_system(
    mut tracker: ResMut<UpdateObjectTracker>,
    mut state: ResMut<VisibilityState>,
    headers: Query<&WorldObjectHeader>,
) {
    let dirty = tracker.take_dirty();
    for entity in dirty {
        let Ok(header) = headers.get(entity) else { continue };
        let observers: Vec<Entity> = state
            .client_known
            .iter()
            .filter(|(_, known)| known.contains(&entity))
            .map(|(observer, _)| *observer)
            .collect();
        for observer in observers {
            let mut mask = FieldUpdateMask::with_field_count(8);
            mask.mark(0);
            mask.mark(1);
            let batch = state.batch_for(observer);
            batch.blocks.push(UpdateBlock {
                update_type: UpdateType::Values,
                flags: 0,
                guid: header.guid.raw(),
                type_id: None,
                field_mask: mask,
                changed_field_values: vec![],
            });
        }
    }
}

/// Clear notify flags after the per-tick sweep has consumed them.
pub fn clear_notify_flags_system(mut headers: Query<&mut WorldObjectHeader>) {
    for mut header in headers.iter_mut() {
        header.notify_flags = NotifyFlags::empty();
        header.clear_updated();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_see_requires_visible_flag_and_rectangle_containment() {
        let observer = Position::new(0.0, 0.0);
        let range = (100.0, 100.0);
        assert!(can_see_or_detect(observer, range, Position::new(50.0, 50.0), true));
        assert!(!can_see_or_detect(observer, range, Position::new(150.0, 0.0), true));
        assert!(!can_see_or_detect(observer, range, Position::new(50.0, 50.0), false));
    }

    #[test]
    fn visibility_hysteresis_creates_then_ranges_out() {
        let mut world = World::new();
        world.insert_resource(SimConfig::default());
        world.insert_resource(SpatialGrid::new());
        world.insert_resource(VisibilityState::default());

        let bot_guid = crate::guid::ObjectGuid::new(crate::guid::ObjectTypeId::Robot, 1);
        let bot = world
            .spawn((
                Position::new(1000.0, 0.0),
                WorldObjectHeader::new(bot_guid),
            ))
            .id();

        let player = world
            .spawn((
                Position::new(0.0, 0.0),
                Viewport { width: 50.0, height: 50.0 },
            ))
            .id();

        {
            let mut grid = world.resource_mut::<SpatialGrid>();
            grid.insert(bot, 1000.0, 0.0).unwrap();
            grid.insert(player, 0.0, 0.0).unwrap();
        }

        let mut schedule = Schedule::default();
        schedule.add_systems(visibility_update_system);
        schedule.run(&mut world);
        {
            let state = world.resource::<VisibilityState>();
            assert!(!state.client_known.get(&player).unwrap().contains(&bot));
        }

        // Player walks into range.
        {
            let mut pos = world.get_mut::<Position>(player).unwrap();
            pos.x = 980.0;
        }
        {
            let mut grid = world.resource_mut::<SpatialGrid>();
            grid.relocate(player, 980.0, 0.0).unwrap();
        }
        world.resource_mut::<VisibilityState>().pending_batches.clear();
        schedule.run(&mut world);
        {
            let state = world.resource::<VisibilityState>();
            assert!(state.client_known.get(&player).unwrap().contains(&bot));
            let batch = state.pending_batches.get(&player).unwrap();
            assert!(batch.blocks.iter().any(|b| b.update_type == UpdateType::Create));
        }

        // Player walks back out.
        {
            let mut pos = world.get_mut::<Position>(player).unwrap();
            pos.x = 0.0;
        }
        {
            let mut grid = world.resource_mut::<SpatialGrid>();
            grid.relocate(player, 0.0, 0.0).unwrap();
        }
        world.resource_mut::<VisibilityState>().pending_batches.clear();
        schedule.run(&mut world);
        {
            let state = world.resource::<VisibilityState>();
            assert!(!state.client_known.get(&player).unwrap().contains(&bot));
            let batch = state.pending_batches.get(&player).unwrap();
            assert!(!batch.out_of_range.guids.is_empty());
            assert!(!batch.blocks.iter().any(|b| b.update_type == UpdateType::Create));
        }
    }
}
