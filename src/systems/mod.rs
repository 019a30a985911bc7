//! Systems for the arena simulation, organized by the five-phase tick
//! schedule described in SPEC_FULL.md §2.
//!
//! ### Phase 1: Perception & patrol
//!
//! | System | Reads | Writes |
//! |--------|-------|--------|
//! | `visibility_update_system` | SpatialGrid, Position, Viewport | UpdateObjectTracker, NotifyFlags |
//! | `target_selector_refresh_system` | Position, AttackableState, UnitCore | TargetSelector |
//!
//! ### Phase 2: Decision
//!
//! Bot AI (Sparring/Training) and manager refresh (target/threat/wish)
//! decide what each unit's motion master and attack intent should be this
//! tick. See `ai` and `managers`.
//!
//! ### Phase 3: Motion
//!
//! | System | Reads | Writes |
//! |--------|-------|--------|
//! | `motion_step_system` | MapData, PrecomputedJumpMap, MotionMaster | Position, Velocity, UnitCore |
//! | `projectile_motion_system` | ProjectileState | Position |
//!
//! ### Phase 4: Combat & reward
//!
//! | System | Reads | Writes |
//! |--------|-------|--------|
//! | `collect_projectile_hits` / `apply_projectile_hits` | SpatialGrid, ProjectileState | UnitCore, RewardManager |
//! | `resolve_combat_damage` | ProjectileState, StatModifiers | UnitCore, RewardManager, ThreatManager |
//! | `stamina_update_system` | Timer, SimConfig | StaminaState, StaminaSyncQueue |
//! | `reward_prune_system` | SimClock | RewardManager |
//!
//! ### Phase 5: Housekeeping
//!
//! Battle lifecycle (`battle`), safe-zone shrink, spawn bookkeeping
//! (`spawn`), and the visibility delta flush that turns this tick's
//! accumulated `NotifyFlags` into an `UpdateObjectBatch`.

pub mod ai;
pub mod battle;
pub mod combat;
pub mod managers;
pub mod motion;
pub mod projectile;
pub mod reward;
pub mod spawn;
pub mod stamina;

pub use ai::*;
pub use battle::*;
pub use combat::*;
pub use managers::*;
pub use motion::*;
pub use projectile::*;
pub use reward::*;
pub use spawn::*;
pub use stamina::*;
