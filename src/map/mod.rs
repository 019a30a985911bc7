//! Immutable map data, JPS+ pathfinding, and the safe-zone-driven
//! waypoint graph (spec.md §2 "Map data", §4.2, §4.8).

pub mod jps;
pub mod tile;
pub mod waypoints;

pub use jps::{find_path, PrecomputedJumpMap};
pub use tile::MapData;
pub use waypoints::{WaypointGraph, WaypointId, WaypointNode};
