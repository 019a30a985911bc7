//! Load-time-immutable tunables shared by reference across a battle's
//! systems. Mirrors the teacher's `SimConfig` resource, extended with the
//! spatial/safe-zone/sight parameters this spec needs.

use bevy_ecs::prelude::Resource;
use serde::{Deserialize, Serialize};

pub const FIELD_UPDATE_MASK_BITS: u32 = 32;

/// Number of cells on a side of the sparse spatial grid (spec.md §4.1: 23x23).
pub const SPATIAL_GRID_DIM: i32 = 23;

/// Map units covered by one spatial grid cell.
pub const GRID_SIZE: f32 = 256.0;

/// Fixed-point octile heuristic multiplier used by the pathfinder (1.0 == this value).
pub const JPS_FIXED_POINT_MULTIPLIER: i32 = 2378;
pub const JPS_SQRT_2: i32 = 3363;
pub const JPS_SQRT_2_MINUS_ONE: i32 = 985;

/// Stamina sync broadcast cadence in milliseconds.
pub const STAMINA_SYNC_INTERVAL_MS: u32 = 200;

/// Idle timeout before an awardee reference is pruned, in milliseconds.
pub const AWARDEE_IDLE_TIMEOUT_MS: u64 = 30_000;

/// Max normalised combat power value (spec.md glossary).
pub const COMBAT_POWER_MAX: f32 = 1000.0;

/// Arc length (map units) a circling `SmartChase` bot advances along its
/// dodge circle each motion tick (spec.md §4.3 step 3: `arc_step =
/// DODGE_DISTANCE / radius` radians).
pub const DODGE_DISTANCE: f32 = 40.0;

/// Denominator of the wish manager's equipment-quality `normalize` term
/// (spec.md §4.4: `level / equipment_level_max`).
pub const EQUIPMENT_LEVEL_MAX: u16 = 100;

/// Stack-count bucket ceiling for the wish manager's gold/magic-bean
/// `normalize` term (spec.md §4.4: "stack-size bucket").
pub const WISH_STACK_BUCKET_MAX: u32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize, Resource)]
pub struct SimConfig {
    /// Fixed simulation timestep in seconds (spec.md §5: tick-driven, no suspension).
    pub fixed_timestep: f32,
    /// Default sight distance used by target-selector weighting (spec.md §4.4).
    pub default_sight_distance: f32,
    /// Object-size padding added to a player's viewport to get its visible range.
    pub object_max_size: f32,
    /// Multiplier applied to the bot's max step length when padding max_visible_range.
    pub visible_range_step_padding: f32,
    /// Battle preparation phase duration in milliseconds (skipped on training maps).
    pub preparation_duration_ms: u64,
    /// Battle duration in milliseconds; the safe zone shrinks to 0 exactly at this point.
    pub battle_duration_ms: u64,
    /// Initial safe-zone radius in map units.
    pub initial_safe_zone_radius: f32,
    /// Internal buffer distance (in map units) kept inside the safe-zone boundary.
    pub safe_distance: f32,
    /// Radius (map units) at which crossing triggers a one-shot danger alert.
    pub danger_alert_radius: f32,
    /// RNG seed for this battle; identical seeds reproduce identical outcomes.
    pub rng_seed: u64,
    /// Whether this map is a training ground (skips PREPARING, no sole-survivor win).
    pub is_training_map: bool,
    /// Map units moved per second by a step generator (spec.md §4.3 motion step).
    pub default_move_speed: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            fixed_timestep: 1.0 / 30.0,
            default_sight_distance: 600.0,
            object_max_size: 32.0,
            visible_range_step_padding: 4.0,
            preparation_duration_ms: 10_000,
            battle_duration_ms: 180_000,
            initial_safe_zone_radius: 2048.0,
            safe_distance: 64.0,
            danger_alert_radius: 512.0,
            rng_seed: 0,
            is_training_map: false,
            default_move_speed: 160.0,
        }
    }
}

impl SimConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
