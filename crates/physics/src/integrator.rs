//! Per-step missile integrator for both guidance laws.

use engine_core::orientation_from_velocity;
use glam::Vec3;
use std::f32::consts::PI;

use crate::protocol::{
    from_triple, to_triple, MissileKind, MissileStepRequest, MissileStepResponse, Waypoints,
};

/// Gravity during a cruise missile's unpowered drop.
pub const GRAVITY: f32 = 9.81;
/// Detonation distance to the target point.
pub const PROXIMITY_FUSE: f32 = 5.0;
/// Peak vertical bow of the cruise path.
const PATH_VERTICAL_BOW: f32 = 50.0;
/// Lateral weave amplitude as a fraction of the path length.
const PATH_WEAVE_FACTOR: f32 = 0.2;

/// Desired cruise-missile position at path parameter `t`:
/// `lerp(start, end, t) + (A·sin 2πt, 50·sin πt, A·cos 1.5πt)`, `A = 0.2·|end − start|`.
pub fn cruise_path_point(start: Vec3, end: Vec3, t: f32) -> Vec3 {
    let amplitude = PATH_WEAVE_FACTOR * (end - start).length();
    start.lerp(end, t)
        + Vec3::new(
            amplitude * (2.0 * PI * t).sin(),
            PATH_VERTICAL_BOW * (PI * t).sin(),
            amplitude * (1.5 * PI * t).cos(),
        )
}

/// Integrate one step. Pure: the result depends only on `req`.
pub fn step_missile(req: &MissileStepRequest) -> MissileStepResponse {
    let position = from_triple(req.position);
    let target = from_triple(req.target_position);

    if req.exploded {
        return MissileStepResponse {
            id: req.id,
            seq: req.seq,
            position: req.position,
            velocity: req.velocity,
            rotation: req.rotation,
            path_time: req.path_time,
            reached_target: false,
            should_explode: true,
            distance_to_target: (target - position).length(),
        };
    }

    let dt = if req.delta_time.is_finite() { req.delta_time.max(0.0) } else { 0.0 };
    let mut velocity = from_triple(req.velocity);
    let mut path_time = req.path_time;

    match req.kind {
        MissileKind::Tomahawk if !req.launched => {
            velocity.y -= GRAVITY * dt;
        }
        MissileKind::Tomahawk => {
            path_time += dt * req.path_speed;
            velocity = cruise_velocity(req, position, target, velocity, path_time, dt);
        }
        MissileKind::Defense => {
            let dir = (target - position).normalize_or_zero();
            if dir != Vec3::ZERO {
                velocity = dir * req.speed;
            }
        }
    }

    let distance_before = (target - position).length();
    let travel = velocity * dt;
    let new_position = position + travel;
    let distance = (target - new_position).length();

    // A step long enough to pass the target counts as arrival.
    let powered = req.launched || req.kind == MissileKind::Defense;
    let reached = powered && (distance <= PROXIMITY_FUSE || travel.length() >= distance_before);
    let expired = req.max_life_time > 0.0 && req.life_time + dt >= req.max_life_time;
    let grounded = req.kind == MissileKind::Tomahawk && new_position.y <= 0.0;

    let rotation = match orientation_from_velocity(velocity) {
        Some((pitch, yaw)) => [pitch, yaw, req.rotation[2]],
        None => req.rotation,
    };

    MissileStepResponse {
        id: req.id,
        seq: req.seq,
        position: to_triple(new_position),
        velocity: to_triple(velocity),
        rotation,
        path_time,
        reached_target: reached,
        should_explode: reached || expired || grounded,
        distance_to_target: distance,
    }
}

/// Commanded velocity for a powered cruise missile: ease toward the curved path
/// while `t ≤ 1`, then point straight at the target.
fn cruise_velocity(
    req: &MissileStepRequest,
    position: Vec3,
    target: Vec3,
    velocity: Vec3,
    path_time: f32,
    dt: f32,
) -> Vec3 {
    match req.waypoints {
        Some(Waypoints { start, end }) if path_time <= 1.0 => {
            let desired = cruise_path_point(from_triple(start), from_triple(end), path_time);
            let commanded = (desired - position).normalize_or_zero() * req.speed;
            let blend = (req.turn_rate * dt).clamp(0.0, 1.0);
            velocity.lerp(commanded, blend)
        }
        _ => {
            let dir = (target - position).normalize_or_zero();
            if dir == Vec3::ZERO {
                velocity
            } else {
                dir * req.speed
            }
        }
    }
}
