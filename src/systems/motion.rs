//! Movement generators, step generators, and the motion master stack
//! (spec.md §4.3). The teacher drives motion with a flat `Order` enum; this
//! subsystem is genuinely new, grounded on `original_source`'s
//! `MotionMaster.cpp` (push/pop generator stack over an "active" top
//! generator) and `SmartChaseMovementGenerator.cpp` (reaction-timed dodge
//! direction selection against an incoming projectile, built in the
//! teacher's free-function-over-`Query` system idiom rather than an OOP
//! class hierarchy).

use crate::components::{Orientation, Position, Timer, UnitCore, UnitStateFlags, Velocity};
use crate::config::{SimConfig, DODGE_DISTANCE};
use crate::map::jps::{find_path, PrecomputedJumpMap};
use crate::map::tile::MapData;
use crate::systems::ai::{roll_effective_dodge, RobotProficiency, SimRng};
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DodgeDirection {
    #[default]
    None,
    Clockwise,
    AntiClockwise,
}

impl DodgeDirection {
    pub fn flip(self) -> Self {
        match self {
            DodgeDirection::Clockwise => DodgeDirection::AntiClockwise,
            DodgeDirection::AntiClockwise => DodgeDirection::Clockwise,
            DodgeDirection::None => DodgeDirection::None,
        }
    }
}

/// One entry on a unit's motion-master stack (spec.md §4.3's generator
/// catalogue). Only the top entry drives movement each tick; `finish()` in
/// the source corresponds to popping back to the entry beneath.
#[derive(Debug, Clone)]
pub enum MovementGenerator {
    Idle,
    /// Move straight to a fixed world point and then finish.
    Point { goal: Position },
    /// Hold a ranged distance from `target`, closing in if too far.
    Seek { target: Entity, desired_range: f32 },
    /// Walk the shortest JPS+ path directly toward `target`'s tile.
    SimpleChase { target: Entity },
    /// Chase with reaction-timed dodge behaviour against incoming fire
    /// (`SmartChaseMovementGenerator`).
    SmartChase {
        target: Entity,
        reaction_timer: Timer,
        dodge_timer: Timer,
        current_dodge: DodgeDirection,
        next_dodge: DodgeDirection,
        locked: bool,
    },
    /// Flee directly away from a point, e.g. out of the shrinking safe zone.
    Escape { away_from: Position },
    /// Wander the reachable waypoint graph at random, re-rolling at path end.
    Explore,
}

impl MovementGenerator {
    pub fn smart_chase(target: Entity, reaction_min_ms: u64, reaction_max_ms: u64) -> Self {
        MovementGenerator::SmartChase {
            target,
            reaction_timer: Timer::with_duration(reaction_min_ms.max(1)),
            dodge_timer: {
                let mut t = Timer::with_duration(reaction_max_ms.max(reaction_min_ms).max(1));
                t.set_passed();
                t
            },
            current_dodge: DodgeDirection::None,
            next_dodge: DodgeDirection::None,
            locked: false,
        }
    }
}

/// Push/pop stack of active movement generators, mirroring `MotionMaster`.
/// The bottom of the stack is always `Idle`.
#[derive(Component, Debug, Clone)]
pub struct MotionMaster {
    stack: Vec<MovementGenerator>,
    cached_goal_tile: Option<(i32, i32)>,
    cached_path: Vec<(i32, i32)>,
    path_index: usize,
}

impl Default for MotionMaster {
    fn default() -> Self {
        Self {
            stack: vec![MovementGenerator::Idle],
            cached_goal_tile: None,
            cached_path: Vec::new(),
            path_index: 0,
        }
    }
}

impl MotionMaster {
    pub fn push(&mut self, generator: MovementGenerator) {
        self.stack.push(generator);
        self.invalidate_path();
    }

    pub fn pop(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
        self.invalidate_path();
    }

    pub fn clear_to_idle(&mut self) {
        self.stack.truncate(1);
        self.invalidate_path();
    }

    pub fn top(&self) -> &MovementGenerator {
        self.stack.last().expect("motion master stack always has an Idle floor")
    }

    pub fn top_mut(&mut self) -> &mut MovementGenerator {
        self.stack.last_mut().expect("motion master stack always has an Idle floor")
    }

    fn invalidate_path(&mut self) {
        self.cached_goal_tile = None;
        self.cached_path.clear();
        self.path_index = 0;
    }

    /// Target step generator (spec.md §4.3): returns the next tile to step
    /// into toward `goal`, caching the JPS+ path until the goal tile
    /// changes.
    fn target_step(&mut self, map: &MapData, jump_map: &PrecomputedJumpMap, from: (i32, i32), goal: (i32, i32)) -> Option<(i32, i32)> {
        if self.cached_goal_tile != Some(goal) || self.path_index >= self.cached_path.len() {
            self.cached_path = find_path(map, jump_map, from, goal);
            self.cached_goal_tile = Some(goal);
            self.path_index = 0;
        }
        let next = self.cached_path.get(self.path_index).copied();
        if next.is_some() {
            self.path_index += 1;
        }
        next
    }
}

/// Random step generator (spec.md §4.3): one open neighbour tile, chosen
/// deterministically from the caller's RNG.
pub fn random_step(map: &MapData, from: (i32, i32), rng: &mut impl rand::Rng) -> Option<(i32, i32)> {
    let mut candidates = Vec::new();
    for dx in -1..=1 {
        for dy in -1..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let (nx, ny) = (from.0 + dx, from.1 + dy);
            if map.is_walkable(nx, ny) {
                candidates.push((nx, ny));
            }
        }
    }
    if candidates.is_empty() {
        return None;
    }
    Some(candidates[rng.gen_range(0..candidates.len())])
}

/// Choose a dodge direction perpendicular to the line from the unit's
/// position to the incoming projectile's launch line
/// (`calcDodgeDirection(Projectile*)`).
pub fn calc_dodge_direction_from_projectile(pos: Position, launch_origin: Position, launch_end: Position) -> DodgeDirection {
    let side = (launch_end.x - launch_origin.x) * (pos.y - launch_origin.y)
        - (launch_end.y - launch_origin.y) * (pos.x - launch_origin.x);
    if side > 0.0 {
        DodgeDirection::Clockwise
    } else {
        DodgeDirection::AntiClockwise
    }
}

/// Advance the motion master's reaction/dodge timers for a `SmartChase`
/// generator; returns `true` if a new dodge direction should be committed
/// this tick (spec.md §8 dodge-probability scenario drives `effective_dodge_chance`
/// upstream of this call).
pub fn smart_chase_reaction_tick(
    reaction_timer: &mut Timer,
    dodge_timer: &mut Timer,
    current: &mut DodgeDirection,
    next: DodgeDirection,
    diff_ms: u64,
) -> bool {
    reaction_timer.update(diff_ms);
    if !reaction_timer.passed() {
        return false;
    }
    reaction_timer.reset();
    if *current == next || next == DodgeDirection::None {
        return false;
    }
    *current = next;
    dodge_timer.reset();
    true
}

/// Drive every unit's top motion generator one step (spec.md §2 Motion
/// phase). Only `SimpleChase`/`SmartChase`/`Point`/`Escape` consume the
/// pathfinder; `Idle`/`Explore` are handled by the caller's higher-level
/// bot-AI/explore bookkeeping. `SmartChase` is handled separately from the
/// rest: in range it circles its target (spec.md §4.3 step 3), out of range
/// it falls back to the same pathfinding chase as `SimpleChase` (step 4).
pub fn motion_step_system(
    map: Res<MapData>,
    jump_map: Res<PrecomputedJumpMap>,
    config: Res<SimConfig>,
    mut rng: ResMut<SimRng>,
    mut set: ParamSet<(
        Query<(Entity, &Position, &Orientation)>,
        Query<(&mut MotionMaster, &mut Position, &mut Velocity, &mut UnitCore, &RobotProficiency)>,
    )>,
) {
    let snapshot: HashMap<Entity, (Position, Orientation)> = set.p0().iter().map(|(e, p, o)| (e, (*p, *o))).collect();
    let speed = config.default_move_speed;
    let diff_ms = (config.fixed_timestep * 1000.0) as u64;

    for (mut master, mut pos, mut vel, mut unit, proficiency) in set.p1().iter_mut() {
        let from = map.world_to_tile(pos.x, pos.y);

        if matches!(master.top(), MovementGenerator::SmartChase { .. }) {
            smart_chase_step(&mut master, &mut pos, &mut vel, &mut unit, proficiency, &snapshot, &map, &jump_map, &mut rng.0, speed, diff_ms, from);
            continue;
        }

        let goal_tile = match master.top() {
            MovementGenerator::Point { goal } => Some(map.world_to_tile(goal.x, goal.y)),
            MovementGenerator::Seek { target, .. } | MovementGenerator::SimpleChase { target } => {
                snapshot.get(target).map(|(p, _)| map.world_to_tile(p.x, p.y))
            }
            MovementGenerator::SmartChase { .. } => unreachable!("handled above"),
            MovementGenerator::Escape { away_from } => {
                let dx = pos.x - away_from.x;
                let dy = pos.y - away_from.y;
                let len = (dx * dx + dy * dy).sqrt().max(1.0);
                let flee = (pos.x + dx / len * speed, pos.y + dy / len * speed);
                Some(map.world_to_tile(flee.0, flee.1))
            }
            MovementGenerator::Idle | MovementGenerator::Explore => None,
        };

        let Some(goal_tile) = goal_tile else {
            unit.state.unset(UnitStateFlags::MOVING);
            continue;
        };
        if from == goal_tile {
            unit.state.unset(UnitStateFlags::MOVING);
            continue;
        }

        if let Some(next_tile) = master.target_step(&map, &jump_map, from, goal_tile) {
            let (tx, ty) = map.tile_to_world(next_tile.0, next_tile.1);
            let dx = tx - pos.x;
            let dy = ty - pos.y;
            let dist = (dx * dx + dy * dy).sqrt().max(1e-6);
            vel.x = dx / dist * speed;
            vel.y = dy / dist * speed;
            pos.x = tx;
            pos.y = ty;
            unit.state.set(UnitStateFlags::MOVING);
        } else {
            unit.state.unset(UnitStateFlags::MOVING);
        }
    }
}

/// One tick of the `SmartChase` generator (spec.md §4.3 "Smart chase").
/// Re-rolls the dodge direction at each reaction-timer boundary against the
/// target's facing line, then either circles the target at the bot's
/// optimal dodge distance (in range) or chases it via the pathfinder step
/// generator (out of range), exactly like `SimpleChase`.
#[allow(clippy::too_many_arguments)]
fn smart_chase_step(
    master: &mut MotionMaster,
    pos: &mut Position,
    vel: &mut Velocity,
    unit: &mut UnitCore,
    proficiency: &RobotProficiency,
    snapshot: &HashMap<Entity, (Position, Orientation)>,
    map: &MapData,
    jump_map: &PrecomputedJumpMap,
    rng: &mut impl rand::Rng,
    speed: f32,
    diff_ms: u64,
    from: (i32, i32),
) {
    let MovementGenerator::SmartChase { target, reaction_timer, dodge_timer, current_dodge, .. } = master.top() else {
        unreachable!("caller already matched SmartChase");
    };
    let target = *target;
    let mut reaction_timer = *reaction_timer;
    let mut dodge_timer = *dodge_timer;
    let mut current_dodge = *current_dodge;

    let Some(&(target_pos, target_orientation)) = snapshot.get(&target) else {
        unit.state.unset(UnitStateFlags::MOVING);
        return;
    };

    let dx = pos.x - target_pos.x;
    let dy = pos.y - target_pos.y;
    let distance = (dx * dx + dy * dy).sqrt();

    // "Physically correct" side is whichever side of the target's facing
    // line the bot currently stands on; imperfect dodging flips it with
    // probability `1 - effective_dodge_chance`.
    let facing = (target_orientation.0.cos(), target_orientation.0.sin());
    let ahead = Position { x: target_pos.x + facing.0, y: target_pos.y + facing.1 };
    let physically_correct = calc_dodge_direction_from_projectile(*pos, target_pos, ahead);
    let rolled = roll_effective_dodge(rng, physically_correct, proficiency.effective_dodge_chance);
    smart_chase_reaction_tick(&mut reaction_timer, &mut dodge_timer, &mut current_dodge, rolled, diff_ms);

    if let MovementGenerator::SmartChase { reaction_timer: rt, dodge_timer: dt, current_dodge: cd, next_dodge, .. } = master.top_mut() {
        *rt = reaction_timer;
        *dt = dodge_timer;
        *cd = current_dodge;
        *next_dodge = rolled;
    }

    if distance <= proficiency.attack_range {
        let direction = if current_dodge == DodgeDirection::None { DodgeDirection::Clockwise } else { current_dodge };
        let radius = distance.min(proficiency.optimal_dodge_distance).max(1.0);
        let arc_step = DODGE_DISTANCE / radius;
        let angle = dy.atan2(dx);
        let signed_step = match direction {
            DodgeDirection::Clockwise => -arc_step,
            DodgeDirection::AntiClockwise => arc_step,
            DodgeDirection::None => 0.0,
        };
        let new_angle = angle + signed_step;
        let next = (target_pos.x + radius * new_angle.cos(), target_pos.y + radius * new_angle.sin());
        let ddx = next.0 - pos.x;
        let ddy = next.1 - pos.y;
        let step_dist = (ddx * ddx + ddy * ddy).sqrt().max(1e-6);
        vel.x = ddx / step_dist * speed;
        vel.y = ddy / step_dist * speed;
        pos.x = next.0;
        pos.y = next.1;
        unit.state.set(UnitStateFlags::MOVING);
        return;
    }

    let goal_tile = map.world_to_tile(target_pos.x, target_pos.y);
    if from == goal_tile {
        unit.state.unset(UnitStateFlags::MOVING);
        return;
    }
    if let Some(next_tile) = master.target_step(map, jump_map, from, goal_tile) {
        let (tx, ty) = map.tile_to_world(next_tile.0, next_tile.1);
        let ddx = tx - pos.x;
        let ddy = ty - pos.y;
        let step_dist = (ddx * ddx + ddy * ddy).sqrt().max(1e-6);
        vel.x = ddx / step_dist * speed;
        vel.y = ddy / step_dist * speed;
        pos.x = tx;
        pos.y = ty;
        unit.state.set(UnitStateFlags::MOVING);
    } else {
        unit.state.unset(UnitStateFlags::MOVING);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn motion_master_starts_idle_and_pushes_pop_symmetrically() {
        let mut mm = MotionMaster::default();
        assert!(matches!(mm.top(), MovementGenerator::Idle));
        mm.push(MovementGenerator::Explore);
        assert!(matches!(mm.top(), MovementGenerator::Explore));
        mm.pop();
        assert!(matches!(mm.top(), MovementGenerator::Idle));
    }

    #[test]
    fn pop_on_idle_floor_is_a_no_op() {
        let mut mm = MotionMaster::default();
        mm.pop();
        assert!(matches!(mm.top(), MovementGenerator::Idle));
    }

    #[test]
    fn dodge_direction_flip_is_involutive() {
        let d = DodgeDirection::Clockwise;
        assert_eq!(d.flip().flip(), d);
    }

    #[test]
    fn reaction_tick_commits_new_direction_only_after_timer_passes() {
        let mut reaction = Timer::with_duration(100);
        let mut dodge = Timer::with_duration(1000);
        let mut current = DodgeDirection::None;
        let committed = smart_chase_reaction_tick(&mut reaction, &mut dodge, &mut current, DodgeDirection::Clockwise, 50);
        assert!(!committed);
        let committed = smart_chase_reaction_tick(&mut reaction, &mut dodge, &mut current, DodgeDirection::Clockwise, 60);
        assert!(committed);
        assert_eq!(current, DodgeDirection::Clockwise);
    }

    #[test]
    fn target_step_caches_path_until_goal_changes() {
        let map = MapData::new(10, 10, 32.0);
        let jm = PrecomputedJumpMap::new(&map);
        let mut mm = MotionMaster::default();
        let step1 = mm.target_step(&map, &jm, (0, 0), (5, 5));
        assert!(step1.is_some());
        assert_eq!(mm.cached_goal_tile, Some((5, 5)));
    }
}
