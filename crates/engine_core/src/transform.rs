//! Pose type and orientation helpers.
//!
//! Yaw is measured from +Z toward +X, so a heading of `yaw` moves along
//! `(sin yaw, 0, cos yaw)`. Pitch is positive nose-up, roll is the bank angle.

use glam::{Quat, Vec3};

/// Below this speed a velocity carries no usable heading.
const MIN_HEADING_SPEED_SQ: f32 = 1e-8;

/// Position plus Euler orientation of a simulated body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            pitch: 0.0,
            yaw: 0.0,
            roll: 0.0,
        }
    }
}

impl Pose {
    /// Create a level pose at the given position.
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Orientation as a plain `[pitch, yaw, roll]` triple.
    pub fn euler(&self) -> [f32; 3] {
        [self.pitch, self.yaw, self.roll]
    }

    /// Re-derive pitch and yaw from a velocity. A (near) zero velocity leaves the
    /// orientation untouched.
    pub fn face_velocity(&mut self, velocity: Vec3) {
        if let Some((pitch, yaw)) = orientation_from_velocity(velocity) {
            self.pitch = pitch;
            self.yaw = yaw;
        }
    }

    /// Convert a body-local offset (x right, y up, z forward) to world space,
    /// ignoring pitch and roll.
    pub fn local_to_world_flat(&self, offset: Vec3) -> Vec3 {
        self.position + Quat::from_rotation_y(self.yaw) * offset
    }
}

/// `(pitch, yaw)` for a velocity: yaw = atan2(vx, vz), pitch = atan2(vy, |v_xz|).
/// Returns `None` for a zero-length velocity so callers keep their previous value.
pub fn orientation_from_velocity(velocity: Vec3) -> Option<(f32, f32)> {
    if !velocity.is_finite() || velocity.length_squared() < MIN_HEADING_SPEED_SQ {
        return None;
    }
    let horizontal = (velocity.x * velocity.x + velocity.z * velocity.z).sqrt();
    Some((velocity.y.atan2(horizontal), velocity.x.atan2(velocity.z)))
}
