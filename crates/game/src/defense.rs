//! Ground defenses: the launcher substate carried by DefenseLauncher buildings
//! and the SAMs they fire.
//!
//! A SAM snapshots the bomber's position at launch, adds a per-axis aim error,
//! and flies at constant speed toward that fixed point. It never updates its aim.

use engine_core::Cooldown;
use glam::Vec3;
use physics::{MissileId, MissileKind, MissileStepResponse};
use rand::Rng;

use crate::building::BuildingId;
use crate::config::DefenseConfig;
use crate::missiles::{Guidance, MissileBody};

/// Height above the roof where a SAM leaves the rail.
const RAIL_HEIGHT: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamPhase {
    /// Fired; no step applied yet.
    Launched,
    Flying,
    Exploded,
}

#[derive(Debug, Clone)]
pub struct DefensiveMissile {
    pub body: MissileBody,
    pub phase: SamPhase,
    /// Aim point fixed at launch.
    pub target: Vec3,
    pub owner: BuildingId,
}

impl DefensiveMissile {
    pub fn launch(id: MissileId, owner: BuildingId, origin: Vec3, target: Vec3, speed: f32) -> Self {
        let velocity = (target - origin).normalize_or_zero() * speed;
        Self {
            body: MissileBody::new(id, MissileKind::Defense, origin, velocity),
            phase: SamPhase::Launched,
            target,
            owner,
        }
    }

    pub fn id(&self) -> MissileId {
        self.body.id
    }

    pub fn is_exploded(&self) -> bool {
        self.phase == SamPhase::Exploded
    }

    pub fn guidance(&self, config: &DefenseConfig) -> Guidance {
        Guidance {
            target: self.target,
            speed: config.missile_speed,
            turn_rate: 0.0,
            path_time: 0.0,
            path_speed: 0.0,
            waypoints: None,
            launched: true,
            max_life_time: config.max_life,
        }
    }

    /// Apply a step. Returns whether the response was accepted.
    pub fn apply(&mut self, res: &MissileStepResponse) -> bool {
        if !self.body.apply(res) {
            return false;
        }
        if self.phase == SamPhase::Launched {
            self.phase = SamPhase::Flying;
        }
        true
    }

    pub fn explode(&mut self) {
        self.body.explode();
        self.phase = SamPhase::Exploded;
    }
}

/// Bomber position plus uniform error in `[-inaccuracy, inaccuracy]` on each axis.
pub fn aim_point<R: Rng + ?Sized>(bomber: Vec3, inaccuracy: f32, rng: &mut R) -> Vec3 {
    if inaccuracy <= 0.0 {
        return bomber;
    }
    let mut axis = || rng.gen_range(-inaccuracy..=inaccuracy);
    bomber + Vec3::new(axis(), axis(), axis())
}

/// Launcher substate of a DefenseLauncher building. Owns the SAMs it fired.
#[derive(Debug, Clone)]
pub struct LauncherState {
    pub cooldown: Cooldown,
    pub missiles: Vec<DefensiveMissile>,
}

impl LauncherState {
    pub fn new(launch_interval: f32) -> Self {
        Self {
            cooldown: Cooldown::new(launch_interval as f64),
            missiles: Vec::new(),
        }
    }

    /// Whether a launcher on `roof` would fire at a bomber at `bomber` right now.
    pub fn can_fire(&self, now: f64, roof: Vec3, bomber: Vec3, radar_range: f32) -> bool {
        self.cooldown.is_ready(now) && roof.distance(bomber) <= radar_range
    }

    /// Put a SAM on the rail aimed at `aim`. Restarts the cooldown.
    pub fn fire(&mut self, now: f64, id: MissileId, owner: BuildingId, roof: Vec3, aim: Vec3, speed: f32) -> &DefensiveMissile {
        self.cooldown.trigger(now);
        let origin = roof + Vec3::Y * RAIL_HEIGHT;
        self.missiles.push(DefensiveMissile::launch(id, owner, origin, aim, speed));
        log::info!("Launcher {:?} fired SAM {:?}", owner, id);
        &self.missiles[self.missiles.len() - 1]
    }

    pub fn missile_mut(&mut self, id: MissileId) -> Option<&mut DefensiveMissile> {
        self.missiles.iter_mut().find(|m| m.id() == id)
    }

    pub fn remove_missile(&mut self, id: MissileId) -> Option<DefensiveMissile> {
        let index = self.missiles.iter().position(|m| m.id() == id)?;
        Some(self.missiles.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use physics::step_missile;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn config() -> DefenseConfig {
        DefenseConfig::default()
    }

    /// Aim error stays inside the per-axis box.
    #[test]
    fn aim_error_is_bounded() {
        let mut rng = StdRng::seed_from_u64(3);
        let bomber = Vec3::new(100.0, 120.0, -40.0);
        for _ in 0..200 {
            let aim = aim_point(bomber, 10.0, &mut rng);
            let d = (aim - bomber).abs();
            assert!(d.x <= 10.0 && d.y <= 10.0 && d.z <= 10.0);
        }
    }

    /// A SAM aimed far away self-destructs once its lifetime runs out.
    #[test]
    fn sam_times_out_within_ten_seconds() {
        let cfg = config();
        let mut sam = DefensiveMissile::launch(
            MissileId(1),
            BuildingId(1),
            Vec3::ZERO,
            Vec3::new(0.0, 0.0, 10_000.0),
            cfg.missile_speed,
        );
        let dt = 1.0 / 16.0;
        let mut t = 0.0;
        let mut now = 0.0;
        while !sam.is_exploded() && t < 12.0 {
            sam.body.age(dt);
            t += dt;
            now += dt as f64;
            let req = sam.body.next_request(now, 0.25, &sam.guidance(&cfg)).unwrap();
            let res = step_missile(&req);
            assert!(sam.apply(&res));
            if res.should_explode {
                sam.explode();
            }
        }
        assert!(sam.is_exploded());
        assert!(t <= 10.0, "exploded at {t}");
        // Flew straight at constant speed the whole time.
        assert!((sam.body.position().z - 80.0 * t).abs() < 1.0);
    }

    #[test]
    fn sam_detonates_near_aim_point() {
        let cfg = config();
        let mut sam = DefensiveMissile::launch(MissileId(2), BuildingId(1), Vec3::ZERO, Vec3::new(0.0, 40.0, 0.0), 80.0);
        let mut now = 0.0;
        for _ in 0..60 {
            sam.body.age(0.05);
            now += 0.05;
            let req = sam.body.next_request(now, 0.25, &sam.guidance(&cfg)).unwrap();
            let res = step_missile(&req);
            sam.apply(&res);
            if res.should_explode {
                sam.explode();
                break;
            }
        }
        assert!(sam.is_exploded());
        assert!(sam.body.life_time < 1.0);
    }

    /// One launch per interval, and only inside radar range.
    #[test]
    fn launcher_respects_interval_and_range() {
        let mut launcher = LauncherState::new(8.0);
        let roof = Vec3::new(0.0, 20.0, 0.0);
        assert!(!launcher.can_fire(0.0, roof, Vec3::new(0.0, 100.0, 400.0), 300.0));
        assert!(launcher.can_fire(0.0, roof, Vec3::new(0.0, 100.0, 200.0), 300.0));

        launcher.fire(0.0, MissileId(5), BuildingId(9), roof, Vec3::new(0.0, 100.0, 200.0), 80.0);
        assert!(!launcher.can_fire(7.9, roof, Vec3::new(0.0, 100.0, 200.0), 300.0));
        assert!(launcher.can_fire(8.0, roof, Vec3::new(0.0, 100.0, 200.0), 300.0));
        assert_eq!(launcher.missiles.len(), 1);
        assert!(launcher.remove_missile(MissileId(5)).is_some());
    }
}
