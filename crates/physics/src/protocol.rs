//! Messages exchanged with the missile-physics worker.
//!
//! Vectors cross the thread boundary as plain `[f32; 3]` triples; the simulation
//! converts to and from `glam::Vec3` at the edge. A request carries the whole
//! authoritative state of one missile, so the worker needs no memory of its own.

use glam::Vec3;

/// A vector on the wire.
pub type Triple = [f32; 3];

#[inline]
pub fn to_triple(v: Vec3) -> Triple {
    v.to_array()
}

#[inline]
pub fn from_triple(t: Triple) -> Vec3 {
    Vec3::from_array(t)
}

/// Simulation-wide missile identifier. Allocated monotonically, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MissileId(pub u64);

/// Which guidance law the integrator applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MissileKind {
    /// Player cruise missile: curved path, then direct homing.
    Tomahawk,
    /// Launcher SAM: constant-speed linear pursuit of a fixed point.
    Defense,
}

impl MissileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissileKind::Tomahawk => "tomahawk",
            MissileKind::Defense => "defense",
        }
    }
}

/// Start and end of a cruise missile's curved path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoints {
    pub start: Triple,
    pub end: Triple,
}

/// One integration step for one missile.
#[derive(Debug, Clone, PartialEq)]
pub struct MissileStepRequest {
    pub id: MissileId,
    /// Monotonic per-missile sequence number; the response echoes it.
    pub seq: u64,
    pub position: Triple,
    pub velocity: Triple,
    /// `[pitch, yaw, roll]`.
    pub rotation: Triple,
    pub target_position: Triple,
    pub speed: f32,
    pub turn_rate: f32,
    pub delta_time: f32,
    pub path_time: f32,
    pub path_speed: f32,
    pub waypoints: Option<Waypoints>,
    /// False while a cruise missile is still in its unpowered drop.
    pub launched: bool,
    pub exploded: bool,
    /// Age before this step.
    pub life_time: f32,
    /// Zero disables the lifetime fuse.
    pub max_life_time: f32,
    pub kind: MissileKind,
}

/// The integrated state after a step.
#[derive(Debug, Clone, PartialEq)]
pub struct MissileStepResponse {
    pub id: MissileId,
    pub seq: u64,
    pub position: Triple,
    pub velocity: Triple,
    pub rotation: Triple,
    pub path_time: f32,
    pub reached_target: bool,
    pub should_explode: bool,
    pub distance_to_target: f32,
}
