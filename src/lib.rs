//! arena_sim - Battle Arena Simulation Core
//!
//! A deterministic, fixed-timestep `bevy_ecs` simulation of a shrinking-zone
//! multi-agent battle arena: spatial index & visibility, JPS+ pathfinding,
//! motion-master-driven bot AI, combat/stamina/reward arbitration, and
//! battle lifecycle management. No rendering, transport, or persistence
//! layer — those are an embedder's concern.

pub mod api;
pub mod clock;
pub mod components;
pub mod config;
pub mod error;
pub mod guid;
pub mod map;
pub mod protocol;
pub mod refs;
pub mod spatial;
pub mod systems;
pub mod visibility;
pub mod world;

pub use api::SimWorld;
pub use clock::SimClock;
pub use components::*;
pub use config::SimConfig;
pub use error::{Result, SimError};
pub use guid::{GuidAllocator, ObjectGuid, ObjectTypeId};
pub use map::{find_path, MapData, PrecomputedJumpMap, WaypointGraph, WaypointId, WaypointNode};
pub use refs::{RefEntry, SortedRefList};
pub use spatial::{SpatialEntry, SpatialGrid};
pub use world::Snapshot;
