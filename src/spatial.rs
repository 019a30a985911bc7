//! Sparse 23x23 spatial grid with per-cell typed object lists (spec.md
//! §4.1). Grounded on the teacher's `spatial.rs` `SpatialGrid` resource
//! (`HashMap<(i32,i32), Vec<SpatialEntry>>`, `query_radius`/
//! `query_enemies`/`nearest_enemy`), generalized from an unbounded hash
//! grid to the fixed `SPATIAL_GRID_DIM x SPATIAL_GRID_DIM` array the spec
//! mandates, with lazy per-cell allocation (`object_data_loaded`).

use crate::components::Position;
use crate::config::{GRID_SIZE, SPATIAL_GRID_DIM};
use crate::error::SimError;
use bevy_ecs::prelude::*;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridCoord {
    pub cx: i32,
    pub cy: i32,
}

#[derive(Debug, Clone, Copy)]
pub struct SpatialEntry {
    pub entity: Entity,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Default)]
pub struct GridCell {
    pub object_data_loaded: bool,
    pub entries: Vec<SpatialEntry>,
}

/// The 23x23 sparse spatial index. Cells are allocated lazily the first
/// time an object's position falls in them.
#[derive(Resource, Debug, Default)]
pub struct SpatialGrid {
    cells: HashMap<GridCoord, GridCell>,
    entity_cell: HashMap<Entity, GridCoord>,
    /// Recomputed each tick: element-wise max over present players'
    /// visible range, padded by `visible_range_step_padding * max_step`
    /// (spec.md §4.1). Bounds grid iteration for visibility work.
    pub max_visible_range: (f32, f32),
}

impl SpatialGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn world_to_cell(x: f32, y: f32) -> GridCoord {
        GridCoord {
            cx: (x / GRID_SIZE).floor() as i32,
            cy: (y / GRID_SIZE).floor() as i32,
        }
    }

    pub fn cell_in_bounds(coord: GridCoord) -> bool {
        coord.cx >= 0
            && coord.cy >= 0
            && coord.cx < SPATIAL_GRID_DIM
            && coord.cy < SPATIAL_GRID_DIM
    }

    pub fn insert(&mut self, entity: Entity, x: f32, y: f32) -> Result<(), SimError> {
        let coord = Self::world_to_cell(x, y);
        if !Self::cell_in_bounds(coord) {
            tracing::error!(cx = coord.cx, cy = coord.cy, "grid bounds violation on insert");
            return Err(SimError::GridBoundsViolation {
                cx: coord.cx,
                cy: coord.cy,
                size: SPATIAL_GRID_DIM,
            });
        }
        let cell = self.cells.entry(coord).or_default();
        cell.object_data_loaded = true;
        cell.entries.push(SpatialEntry { entity, x, y });
        self.entity_cell.insert(entity, coord);
        Ok(())
    }

    pub fn remove(&mut self, entity: Entity) {
        if let Some(coord) = self.entity_cell.remove(&entity) {
            if let Some(cell) = self.cells.get_mut(&coord) {
                cell.entries.retain(|e| e.entity != entity);
            }
        }
    }

    /// Relocate an already-tracked entity; returns `true` if its grid
    /// cell changed (spec.md §4.1 relocation sequence step 2/3).
    pub fn relocate(&mut self, entity: Entity, x: f32, y: f32) -> Result<bool, SimError> {
        let new_coord = Self::world_to_cell(x, y);
        if !Self::cell_in_bounds(new_coord) {
            return Err(SimError::GridBoundsViolation {
                cx: new_coord.cx,
                cy: new_coord.cy,
                size: SPATIAL_GRID_DIM,
            });
        }
        let old_coord = self.entity_cell.get(&entity).copied();
        match old_coord {
            Some(old) if old == new_coord => {
                if let Some(cell) = self.cells.get_mut(&old) {
                    if let Some(entry) = cell.entries.iter_mut().find(|e| e.entity == entity) {
                        entry.x = x;
                        entry.y = y;
                    }
                }
                Ok(false)
            }
            Some(old) => {
                if let Some(cell) = self.cells.get_mut(&old) {
                    cell.entries.retain(|e| e.entity != entity);
                }
                let cell = self.cells.entry(new_coord).or_default();
                cell.object_data_loaded = true;
                cell.entries.push(SpatialEntry { entity, x, y });
                self.entity_cell.insert(entity, new_coord);
                Ok(true)
            }
            None => {
                self.insert(entity, x, y)?;
                Ok(true)
            }
        }
    }

    pub fn cell_of(&self, entity: Entity) -> Option<GridCoord> {
        self.entity_cell.get(&entity).copied()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn total_count(&self) -> usize {
        self.entity_cell.len()
    }

    /// Entities within `radius` of `(x, y)`, sorted nearest-first, scanning
    /// only the cells that could contain them.
    pub fn query_radius(&self, x: f32, y: f32, radius: f32) -> Vec<(Entity, f32)> {
        let centre = Self::world_to_cell(x, y);
        let cell_radius = (radius / GRID_SIZE).ceil() as i32 + 1;
        let mut found = Vec::new();
        for dcy in -cell_radius..=cell_radius {
            for dcx in -cell_radius..=cell_radius {
                let coord = GridCoord { cx: centre.cx + dcx, cy: centre.cy + dcy };
                let Some(cell) = self.cells.get(&coord) else { continue };
                for entry in &cell.entries {
                    let dx = entry.x - x;
                    let dy = entry.y - y;
                    let dist = (dx * dx + dy * dy).sqrt();
                    if dist <= radius {
                        found.push((entry.entity, dist));
                    }
                }
            }
        }
        found.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        found
    }

    /// Grid cells within `max_visible_range` of `(x, y)`, for the
    /// relocation-notifier sweep (spec.md §4.1).
    pub fn cells_in_range(&self, x: f32, y: f32, range_x: f32, range_y: f32) -> Vec<GridCoord> {
        let centre = Self::world_to_cell(x, y);
        let cell_radius_x = (range_x / GRID_SIZE).ceil() as i32 + 1;
        let cell_radius_y = (range_y / GRID_SIZE).ceil() as i32 + 1;
        let mut coords = Vec::new();
        for dcy in -cell_radius_y..=cell_radius_y {
            for dcx in -cell_radius_x..=cell_radius_x {
                let coord = GridCoord { cx: centre.cx + dcx, cy: centre.cy + dcy };
                if self.cells.contains_key(&coord) {
                    coords.push(coord);
                }
            }
        }
        coords
    }

    pub fn entries_in_cell(&self, coord: GridCoord) -> &[SpatialEntry] {
        self.cells.get(&coord).map(|c| c.entries.as_slice()).unwrap_or(&[])
    }

    pub fn all_loaded_cells(&self) -> impl Iterator<Item = &GridCoord> {
        self.cells.keys()
    }
}

/// Keep the grid in sync with every `Position`-bearing entity: relocate
/// (or first-insert) anyone who moved this tick, and drop anyone whose
/// `Position` was removed (despawned or stripped mid-tick). Runs first
/// in Phase 1 so `visibility_update_system`/`target_selector_refresh_system`
/// see this tick's positions (spec.md §2: "relocate objects to new grids").
pub fn spatial_grid_sync_system(
    mut grid: ResMut<SpatialGrid>,
    moved: Query<(Entity, &Position), Changed<Position>>,
    mut removed: RemovedComponents<Position>,
) {
    for entity in removed.read() {
        grid.remove(entity);
    }
    for (entity, pos) in moved.iter() {
        let _ = grid.relocate(entity, pos.x, pos.y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_query_radius_returns_sorted_by_distance() {
        let mut world = World::new();
        let a = world.spawn_empty().id();
        let b = world.spawn_empty().id();
        let mut grid = SpatialGrid::new();
        grid.insert(a, 10.0, 10.0).unwrap();
        grid.insert(b, 100.0, 100.0).unwrap();

        let found = grid.query_radius(0.0, 0.0, 500.0);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].0, a);
    }

    #[test]
    fn relocate_within_same_cell_does_not_change_cell() {
        let mut world = World::new();
        let a = world.spawn_empty().id();
        let mut grid = SpatialGrid::new();
        grid.insert(a, 10.0, 10.0).unwrap();
        let changed = grid.relocate(a, 20.0, 20.0).unwrap();
        assert!(!changed);
    }

    #[test]
    fn relocate_across_cell_boundary_moves_entity() {
        let mut world = World::new();
        let a = world.spawn_empty().id();
        let mut grid = SpatialGrid::new();
        grid.insert(a, 10.0, 10.0).unwrap();
        let before = grid.cell_of(a).unwrap();
        let changed = grid.relocate(a, 10.0 + GRID_SIZE * 2.0, 10.0).unwrap();
        assert!(changed);
        assert_ne!(grid.cell_of(a).unwrap(), before);
    }

    #[test]
    fn out_of_bounds_insert_is_an_error() {
        let mut world = World::new();
        let a = world.spawn_empty().id();
        let mut grid = SpatialGrid::new();
        let far = GRID_SIZE * (SPATIAL_GRID_DIM as f32) * 4.0;
        assert!(grid.insert(a, far, far).is_err());
    }

    #[test]
    fn remove_drops_entity_from_its_cell() {
        let mut world = World::new();
        let a = world.spawn_empty().id();
        let mut grid = SpatialGrid::new();
        grid.insert(a, 1.0, 1.0).unwrap();
        grid.remove(a);
        assert_eq!(grid.total_count(), 0);
        assert!(grid.query_radius(1.0, 1.0, 10.0).is_empty());
    }
}
