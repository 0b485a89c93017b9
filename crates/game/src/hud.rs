//! Radar model for the HUD.
//! A pure function of the bomber pose, nearby buildings, live missiles and a
//! few counters; painting it is the HUD collaborator's job.

use engine_core::Pose;
use glam::{Vec2, Vec3};
use procgen::Role;

use crate::building::Building;
use crate::camera::CameraMode;
use crate::error::LaunchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Target,
    Defense,
    Sam,
    Cruise,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadarMarker {
    pub kind: MarkerKind,
    /// World-space XZ.
    pub world_xz: Vec2,
}

/// Weapon readiness in `[0, 1]` (1 = ready).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Cooldowns {
    pub bomb: f32,
    pub missile: f32,
}

/// Everything the HUD shows for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RadarModel {
    pub bomber_yaw: f32,
    pub bomber_xz: Vec2,
    pub markers: Vec<RadarMarker>,
    pub cooldowns: Cooldowns,
    pub destroyed_targets: u32,
    pub camera_mode: CameraMode,
    /// Hull integrity in `[0, 1]`.
    pub health: f32,
    /// Why the last launch request was refused, until the next success.
    pub launch_error: Option<LaunchError>,
}

/// Inputs to [`RadarModel::derive`].
pub struct RadarInputs<'a> {
    pub bomber: Pose,
    pub range: f32,
    pub buildings: &'a [&'a Building],
    /// `(kind, position)` of every live missile.
    pub missiles: &'a [(MarkerKind, Vec3)],
    pub cooldowns: Cooldowns,
    pub destroyed_targets: u32,
    pub camera_mode: CameraMode,
    pub health: f32,
    pub launch_error: Option<LaunchError>,
}

fn xz(v: Vec3) -> Vec2 {
    Vec2::new(v.x, v.z)
}

impl RadarModel {
    pub fn derive(inputs: &RadarInputs<'_>) -> Self {
        let center = xz(inputs.bomber.position);
        let in_range = |p: Vec2| p.distance(center) <= inputs.range;

        let buildings = inputs.buildings.iter().filter(|b| !b.is_destroyed()).filter_map(|b| {
            let kind = match b.role() {
                Role::Target => MarkerKind::Target,
                Role::DefenseLauncher => MarkerKind::Defense,
                Role::Plain => return None,
            };
            Some(RadarMarker {
                kind,
                world_xz: xz(b.spec.position),
            })
        });
        let missiles = inputs.missiles.iter().map(|&(kind, p)| RadarMarker {
            kind,
            world_xz: xz(p),
        });

        Self {
            bomber_yaw: inputs.bomber.yaw,
            bomber_xz: center,
            markers: buildings.chain(missiles).filter(|m| in_range(m.world_xz)).collect(),
            cooldowns: Cooldowns {
                bomb: inputs.cooldowns.bomb.clamp(0.0, 1.0),
                missile: inputs.cooldowns.missile.clamp(0.0, 1.0),
            },
            destroyed_targets: inputs.destroyed_targets,
            camera_mode: inputs.camera_mode,
            health: inputs.health.clamp(0.0, 1.0),
            launch_error: inputs.launch_error.clone(),
        }
    }

    pub fn count(&self, kind: MarkerKind) -> usize {
        self.markers.iter().filter(|m| m.kind == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::building::BuildingId;
    use engine_core::MeshHandle;
    use procgen::{Archetype, BuildingSpec, ChunkKey};

    fn building(id: u64, x: f32, z: f32, role: Role) -> Building {
        let spec = BuildingSpec {
            position: Vec3::new(x, 0.0, z),
            width: 10.0,
            depth: 10.0,
            height: 10.0,
            archetype: Archetype::Residential,
            role,
        };
        Building::new(BuildingId(id), ChunkKey::new(0, 0), spec, MeshHandle(id), 100.0, 8.0)
    }

    #[test]
    fn markers_by_role_and_range() {
        let target = building(1, 100.0, 0.0, Role::Target);
        let launcher = building(2, 0.0, 300.0, Role::DefenseLauncher);
        let plain = building(3, 10.0, 10.0, Role::Plain);
        let far = building(4, 0.0, 900.0, Role::Target);
        let mut dead = building(5, 20.0, 0.0, Role::DefenseLauncher);
        dead.apply_damage(1000.0);
        let buildings = [&target, &launcher, &plain, &far, &dead];
        let missiles = [(MarkerKind::Sam, Vec3::new(0.0, 80.0, 50.0)), (MarkerKind::Cruise, Vec3::new(5000.0, 0.0, 0.0))];

        let model = RadarModel::derive(&RadarInputs {
            bomber: Pose::from_position(Vec3::new(0.0, 100.0, 0.0)),
            range: 800.0,
            buildings: &buildings,
            missiles: &missiles,
            cooldowns: Cooldowns { bomb: 1.5, missile: 0.25 },
            destroyed_targets: 3,
            camera_mode: CameraMode::Chase,
            health: 0.8,
            launch_error: Some(LaunchError::NoTarget),
        });

        assert_eq!(model.count(MarkerKind::Target), 1);
        assert_eq!(model.count(MarkerKind::Defense), 1);
        assert_eq!(model.count(MarkerKind::Sam), 1);
        assert_eq!(model.count(MarkerKind::Cruise), 0);
        assert_eq!(model.cooldowns.bomb, 1.0);
        assert_eq!(model.destroyed_targets, 3);
        assert_eq!(model.launch_error, Some(LaunchError::NoTarget));
    }
}
