//! Immutable tile-map data: walls, concealable tiles, ground type,
//! district ids, and the waypoint-graph seed used by the battle
//! controller. Loaded once from external (TMX-parsed) template data and
//! never mutated by the core — only the *derived* jump-point table and
//! waypoint-graph reachability (recomputed on safe-zone shrink) change at
//! runtime. Grounded on the teacher's `TerrainGrid` row-major cell-array
//! conventions (`world_to_grid`/`grid_to_world`, bounds checks), adapted
//! from a deformable heightmap to an immutable wall/district grid.

use bevy_ecs::prelude::Resource;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GroundType {
    #[default]
    Normal,
    Water,
    Ice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TileCell {
    /// True when the tile blocks movement and line of sight.
    pub closed: bool,
    /// True when a unit standing on this tile can enter the "hiding" state.
    pub concealable: bool,
    pub ground: GroundType,
    pub district_id: u16,
}

pub const NO_DISTRICT: u16 = u16::MAX;

#[derive(Debug, Clone, Resource)]
pub struct MapData {
    pub width: i32,
    pub height: i32,
    pub tile_size: f32,
    pub origin_x: f32,
    pub origin_y: f32,
    cells: Vec<TileCell>,
}

impl MapData {
    pub fn new(width: i32, height: i32, tile_size: f32) -> Self {
        Self {
            width,
            height,
            tile_size,
            origin_x: 0.0,
            origin_y: 0.0,
            cells: vec![TileCell::default(); (width * height).max(0) as usize],
        }
    }

    #[inline]
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> usize {
        (y * self.width + x) as usize
    }

    pub fn get(&self, x: i32, y: i32) -> Option<&TileCell> {
        if self.in_bounds(x, y) {
            Some(&self.cells[self.index(x, y)])
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, x: i32, y: i32) -> Option<&mut TileCell> {
        if self.in_bounds(x, y) {
            let idx = self.index(x, y);
            Some(&mut self.cells[idx])
        } else {
            None
        }
    }

    pub fn is_walkable(&self, x: i32, y: i32) -> bool {
        self.get(x, y).map(|c| !c.closed).unwrap_or(false)
    }

    pub fn set_closed(&mut self, x: i32, y: i32, closed: bool) -> bool {
        if let Some(cell) = self.get_mut(x, y) {
            if cell.closed != closed {
                cell.closed = closed;
                return true; // tile-flag toggled: caller must dirty the jump map
            }
        }
        false
    }

    pub fn world_to_tile(&self, wx: f32, wy: f32) -> (i32, i32) {
        (
            ((wx - self.origin_x) / self.tile_size).floor() as i32,
            ((wy - self.origin_y) / self.tile_size).floor() as i32,
        )
    }

    pub fn tile_to_world(&self, tx: i32, ty: i32) -> (f32, f32) {
        (
            self.origin_x + (tx as f32 + 0.5) * self.tile_size,
            self.origin_y + (ty as f32 + 0.5) * self.tile_size,
        )
    }

    /// Nearest walkable tile to `(x, y)` by a ring-expanding search,
    /// matching the "nearest-open table" described in spec.md §2. Returns
    /// `None` if the whole map is closed.
    pub fn nearest_open(&self, x: i32, y: i32) -> Option<(i32, i32)> {
        if self.is_walkable(x, y) {
            return Some((x, y));
        }
        let max_radius = self.width.max(self.height);
        for radius in 1..=max_radius {
            for dx in -radius..=radius {
                for dy in -radius..=radius {
                    if dx.abs() != radius && dy.abs() != radius {
                        continue;
                    }
                    let (nx, ny) = (x + dx, y + dy);
                    if self.is_walkable(nx, ny) {
                        return Some((nx, ny));
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_tile_conversion_round_trips_centre() {
        let map = MapData::new(10, 10, 32.0);
        let (wx, wy) = map.tile_to_world(3, 4);
        assert_eq!(map.world_to_tile(wx, wy), (3, 4));
    }

    #[test]
    fn set_closed_reports_change_only_on_toggle() {
        let mut map = MapData::new(4, 4, 32.0);
        assert!(map.set_closed(1, 1, true));
        assert!(!map.set_closed(1, 1, true));
        assert!(map.set_closed(1, 1, false));
    }

    #[test]
    fn nearest_open_finds_closest_walkable_ring() {
        let mut map = MapData::new(5, 5, 32.0);
        map.set_closed(2, 2, true);
        let found = map.nearest_open(2, 2).unwrap();
        assert_ne!(found, (2, 2));
        assert!(map.is_walkable(found.0, found.1));
    }
}
