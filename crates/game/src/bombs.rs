//! Gravity bombs and the bomb bay.
//!
//! A release request opens the bay; the bomb only drops once the bay has
//! finished opening, and the bay closes again a moment after the drop. The
//! timing itself lives in the simulation's deferred queue.

use engine_core::Cooldown;
use glam::Vec3;

use crate::building::BuildingId;
use crate::error::BombError;
use crate::terrain::{horizontal_distance, TerrainManager};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BayState {
    #[default]
    Closed,
    Opening,
    Open,
}

#[derive(Debug, Clone)]
pub struct BombBay {
    state: BayState,
    cooldown: Cooldown,
}

impl BombBay {
    pub fn new(cooldown: f32) -> Self {
        Self {
            state: BayState::Closed,
            cooldown: Cooldown::new(cooldown as f64),
        }
    }

    pub fn state(&self) -> BayState {
        self.state
    }

    /// Start a release cycle.
    pub fn request_release(&mut self, now: f64) -> Result<(), BombError> {
        if !self.cooldown.is_ready(now) {
            return Err(BombError::CoolingDown {
                remaining: self.cooldown.remaining(now) as f32,
            });
        }
        if self.state != BayState::Closed {
            return Err(BombError::BayBusy);
        }
        self.cooldown.trigger(now);
        self.state = BayState::Opening;
        Ok(())
    }

    /// The doors finished opening. Returns whether a bomb should drop now.
    pub fn finish_opening(&mut self) -> bool {
        if self.state == BayState::Opening {
            self.state = BayState::Open;
            true
        } else {
            false
        }
    }

    pub fn close(&mut self) {
        self.state = BayState::Closed;
    }

    pub fn fraction_ready(&self, now: f64) -> f32 {
        self.cooldown.fraction_ready(now)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Bomb {
    pub id: u64,
    pub position: Vec3,
    pub velocity: Vec3,
}

impl Bomb {
    pub fn step(&mut self, dt: f32, gravity: f32) {
        self.velocity.y -= gravity * dt;
        self.position += self.velocity * dt;
    }
}

/// What a falling bomb hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Impact {
    Ground,
    Building(BuildingId),
}

/// Whether the bomb has hit a standing building or the ground.
pub fn find_impact(bomb: &Bomb, terrain: &TerrainManager) -> Option<Impact> {
    let p = bomb.position;
    let roof_hit = terrain
        .ready_chunks_near(p, 0.0)
        .flat_map(|c| c.buildings.iter())
        .find(|b| !b.is_destroyed() && b.spec.footprint_contains(p.x, p.z) && p.y <= b.spec.roof().y);
    if let Some(b) = roof_hit {
        return Some(Impact::Building(b.id));
    }
    if p.y <= terrain.height_at(p.x, p.z) {
        return Some(Impact::Ground);
    }
    None
}

/// Linear falloff: full damage at the centre, none at `radius`.
pub fn falloff_damage(distance: f32, radius: f32, damage: f32) -> f32 {
    if radius <= 0.0 || distance >= radius {
        return 0.0;
    }
    damage * (1.0 - distance / radius)
}

/// Standing buildings whose footprint centre is within `radius` (horizontally)
/// of `point`, with the damage each takes.
pub fn blast_targets(terrain: &TerrainManager, point: Vec3, radius: f32, damage: f32) -> Vec<(BuildingId, f32)> {
    terrain
        .ready_chunks_near(point, radius)
        .flat_map(|c| c.buildings.iter())
        .filter(|b| !b.is_destroyed())
        .map(|b| (b.id, falloff_damage(horizontal_distance(b.spec.position, point), radius, damage)))
        .filter(|(_, dmg)| *dmg > 0.0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DefenseConfig, WorkerMode, WorldConfig};
    use procgen::{Archetype, BuildingSpec, Role};

    #[test]
    fn bay_cycle_and_cooldown() {
        let mut bay = BombBay::new(2.0);
        assert!(bay.request_release(0.0).is_ok());
        assert_eq!(bay.state(), BayState::Opening);
        assert!(matches!(bay.request_release(0.1), Err(BombError::CoolingDown { .. })));
        assert!(bay.finish_opening());
        assert!(!bay.finish_opening());
        bay.close();
        assert!(matches!(bay.request_release(1.9), Err(BombError::CoolingDown { .. })));
        assert!(bay.request_release(2.0).is_ok());
    }

    #[test]
    fn falloff_is_linear() {
        assert_eq!(falloff_damage(0.0, 30.0, 120.0), 120.0);
        assert_eq!(falloff_damage(15.0, 30.0, 120.0), 60.0);
        assert_eq!(falloff_damage(30.0, 30.0, 120.0), 0.0);
    }

    /// A bomb dropped over a building stops on its roof.
    #[test]
    fn bomb_hits_roof_before_ground() {
        let world = WorldConfig {
            building_seed: Some(2),
            ..Default::default()
        };
        let mut terrain = TerrainManager::new(&world, &DefenseConfig::default(), WorkerMode::Inline);
        terrain.stream(0.0, Vec3::ZERO);
        terrain.poll();
        let id = terrain
            .place_building(BuildingSpec {
                // Outside the band generated buildings can reach.
                position: Vec3::new(600.0, 0.0, 240.0),
                width: 20.0,
                depth: 20.0,
                height: 30.0,
                archetype: Archetype::Commercial,
                role: Role::Target,
            })
            .unwrap();
        let roof = terrain.building(id).unwrap().spec.roof().y;

        let mut bomb = Bomb {
            id: 1,
            position: Vec3::new(600.0, roof + 50.0, 240.0),
            velocity: Vec3::ZERO,
        };
        let mut impact = None;
        for _ in 0..200 {
            bomb.step(0.02, 9.81);
            impact = find_impact(&bomb, &terrain);
            if impact.is_some() {
                break;
            }
        }
        assert_eq!(impact, Some(Impact::Building(id)));
        assert!(bomb.position.y > roof - 1.0);
        assert!(blast_targets(&terrain, bomb.position, 30.0, 120.0).iter().any(|(b, _)| *b == id));
    }
}
