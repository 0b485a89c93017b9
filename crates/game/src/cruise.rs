//! Player cruise missile: guidance state and seeker.
//!
//! After release the missile drops unpowered for the ignition delay. Then it
//! follows a curved path from the ignition point to its target and finally
//! homes directly. Its seeker is seduced by any flare within range and falls
//! back to the original building when none is.

use glam::Vec3;
use physics::{MissileId, MissileKind, MissileStepResponse};

use crate::building::BuildingId;
use crate::config::CruiseConfig;
use crate::flares::{FlareField, FlareId};
use crate::missiles::{Guidance, MissileBody};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CruisePhase {
    /// Unpowered drop off the rail.
    Launched,
    /// Following the curved path (`path_time <= 1`).
    Cruising,
    /// Direct homing.
    Terminal,
    Exploded,
}

/// What the seeker is currently tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekerTarget {
    Building(BuildingId),
    Flare(FlareId),
}

#[derive(Debug, Clone)]
pub struct CruiseMissile {
    pub body: MissileBody,
    pub phase: CruisePhase,
    pub path_time: f32,
    pub waypoints: Option<(Vec3, Vec3)>,
    pub original_target: BuildingId,
    /// Last known centre of the original target. Kept once the building is gone.
    pub target_anchor: Vec3,
    /// Point the seeker is steering at this tick.
    pub target_point: Vec3,
    pub seeker: SeekerTarget,
    pub lock_progress: f32,
    pub lock_announced: bool,
}

impl CruiseMissile {
    pub fn launch(id: MissileId, target: BuildingId, target_point: Vec3, position: Vec3, velocity: Vec3) -> Self {
        Self {
            body: MissileBody::new(id, MissileKind::Tomahawk, position, velocity),
            phase: CruisePhase::Launched,
            path_time: 0.0,
            waypoints: None,
            original_target: target,
            target_anchor: target_point,
            target_point,
            seeker: SeekerTarget::Building(target),
            lock_progress: 0.0,
            lock_announced: false,
        }
    }

    pub fn id(&self) -> MissileId {
        self.body.id
    }

    pub fn is_exploded(&self) -> bool {
        self.phase == CruisePhase::Exploded
    }

    /// Pick this tick's target and accrue lock. `target_centre` is the original
    /// building's centre while it still stands.
    ///
    /// Returns true on the tick lock is first established.
    pub fn update_seeker(
        &mut self,
        dt: f32,
        flares: &FlareField,
        target_centre: Option<Vec3>,
        config: &CruiseConfig,
    ) -> bool {
        if self.is_exploded() {
            return false;
        }
        if let Some(centre) = target_centre {
            self.target_anchor = centre;
        }

        let position = self.body.position();
        match flares.nearest_within(position, config.flare_detection_range) {
            Some(flare) => {
                if self.seeker != SeekerTarget::Flare(flare.id) {
                    log::debug!("Missile {:?} seduced by flare {:?}", self.id(), flare.id);
                }
                self.seeker = SeekerTarget::Flare(flare.id);
                self.target_point = flare.position;
            }
            None => {
                self.seeker = SeekerTarget::Building(self.original_target);
                self.target_point = self.target_anchor;
            }
        }

        if position.distance(self.target_point) <= config.lock_range {
            self.lock_progress += dt;
            if !self.lock_announced && self.lock_progress >= config.lock_time {
                self.lock_announced = true;
                return true;
            }
        } else {
            self.lock_progress = 0.0;
        }
        false
    }

    /// Light the motor once the drop has lasted long enough. The curved path
    /// runs from here to the current target point.
    pub fn ignite_if_due(&mut self, config: &CruiseConfig) -> bool {
        if self.phase != CruisePhase::Launched || self.body.life_time < config.ignition_delay {
            return false;
        }
        self.waypoints = Some((self.body.position(), self.target_point));
        self.path_time = 0.0;
        self.phase = CruisePhase::Cruising;
        true
    }

    pub fn guidance(&self, config: &CruiseConfig) -> Guidance {
        Guidance {
            target: self.target_point,
            speed: config.speed,
            turn_rate: config.turn_rate,
            path_time: self.path_time,
            path_speed: config.path_speed,
            waypoints: self.waypoints,
            launched: self.phase != CruisePhase::Launched,
            max_life_time: config.max_life,
        }
    }

    pub fn apply(&mut self, res: &MissileStepResponse) -> bool {
        if !self.body.apply(res) {
            return false;
        }
        if self.phase != CruisePhase::Launched {
            self.path_time = res.path_time;
        }
        if self.phase == CruisePhase::Cruising && self.path_time > 1.0 {
            self.phase = CruisePhase::Terminal;
        }
        true
    }

    pub fn explode(&mut self) {
        self.body.explode();
        self.phase = CruisePhase::Exploded;
    }
}

/// Bomber damage from a detonation `distance` away: `max(10, 30 − d)` inside
/// `radius`, nothing outside.
pub fn blast_damage_to_bomber(distance: f32, radius: f32) -> f32 {
    if distance <= radius {
        (30.0 - distance).max(10.0)
    } else {
        0.0
    }
}
