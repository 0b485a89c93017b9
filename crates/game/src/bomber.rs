//! The player's bomber: flight model, damage, and cruise-missile launching.

use engine_core::{Cooldown, Health, Pose};
use glam::Vec3;
use input::{InputSource, KeyCode};
use physics::MissileId;

use crate::building::BuildingId;
use crate::config::{CruiseConfig, FlightConfig};
use crate::cruise::CruiseMissile;
use crate::error::LaunchError;
use crate::missiles::MissileIds;
use crate::spatial::SpatialQuery;
use crate::terrain::TerrainManager;

/// Steering demand for one tick, each axis in `[-1, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlightControls {
    /// +1 turns left (yaw increases), -1 turns right.
    pub turn: f32,
    /// +1 climbs, -1 dives.
    pub climb: f32,
}

impl FlightControls {
    /// Read steering keys. While Shift is held the arrows belong to the camera
    /// rig and the bomber gets no input.
    pub fn from_input(input: &dyn InputSource) -> Self {
        if input.is_shift_held() {
            return Self::default();
        }
        let held = |a: KeyCode, b: KeyCode| input.is_key_down(a) || input.is_key_down(b);
        let axis = |pos: bool, neg: bool| (pos as i32 - neg as i32) as f32;
        Self {
            turn: axis(
                held(KeyCode::KeyA, KeyCode::ArrowLeft),
                held(KeyCode::KeyD, KeyCode::ArrowRight),
            ),
            climb: axis(
                held(KeyCode::KeyW, KeyCode::ArrowUp),
                held(KeyCode::KeyS, KeyCode::ArrowDown),
            ),
        }
    }
}

/// `sin`/`cos` of the heading, recomputed only when yaw moves past a threshold.
#[derive(Debug, Clone, Copy, Default)]
struct TrigCache {
    yaw: f32,
    sin: f32,
    cos: f32,
    valid: bool,
}

impl TrigCache {
    fn get(&mut self, yaw: f32, epsilon: f32) -> (f32, f32) {
        if !self.valid || (yaw - self.yaw).abs() > epsilon {
            let (sin, cos) = yaw.sin_cos();
            *self = Self {
                yaw,
                sin,
                cos,
                valid: true,
            };
        }
        (self.sin, self.cos)
    }
}

/// Cached result of the nearest-launcher search.
#[derive(Debug, Clone, Copy)]
struct TargetCache {
    target: Option<BuildingId>,
    at: f64,
    from: Vec3,
    epoch: u64,
}

pub struct Bomber {
    flight: FlightConfig,
    cruise: CruiseConfig,
    position: Vec3,
    yaw: f32,
    bank: f32,
    target_bank: f32,
    /// Commanded altitude; the pose's Y.
    altitude: f32,
    /// Latest floor handed to `set_minimum_altitude`.
    floor: f32,
    velocity: Vec3,
    trig: TrigCache,
    health: Health,
    missile_cooldown: Cooldown,
    left_hardpoint_next: bool,
    target_cache: Option<TargetCache>,
    /// Cruise missiles in flight (and exploded ones awaiting disposal).
    pub missiles: Vec<CruiseMissile>,
}

impl Bomber {
    pub fn new(spawn: Vec3, flight: &FlightConfig, cruise: &CruiseConfig) -> Self {
        let altitude = spawn.y.clamp(flight.altitude_min, flight.altitude_max);
        Self {
            flight: flight.clone(),
            cruise: cruise.clone(),
            position: Vec3::new(spawn.x, altitude, spawn.z),
            yaw: 0.0,
            bank: 0.0,
            target_bank: 0.0,
            altitude,
            floor: f32::NEG_INFINITY,
            velocity: Vec3::ZERO,
            trig: TrigCache::default(),
            health: Health::new(flight.max_health),
            missile_cooldown: Cooldown::new(cruise.cooldown as f64),
            left_hardpoint_next: true,
            target_cache: None,
            missiles: Vec::new(),
        }
    }

    // --- flight ---------------------------------------------------------------

    /// Lowest altitude currently allowed.
    fn altitude_floor(&self) -> f32 {
        self.flight
            .altitude_min
            .max(self.floor + self.flight.floor_margin)
            .min(self.flight.altitude_max)
    }

    /// Integrate one tick of flight. A downed bomber keeps its last pose.
    pub fn update(&mut self, dt: f32, controls: FlightControls) {
        if self.is_down() {
            self.velocity = Vec3::ZERO;
            return;
        }
        let f = &self.flight;

        self.yaw += controls.turn * f.turn_rate * dt;
        self.target_bank = if controls.turn != 0.0 {
            controls.turn * f.bank_max
        } else if controls.climb != 0.0 {
            controls.climb * f.climb_bank_max
        } else {
            0.0
        };
        let ease = (f.bank_speed * dt).clamp(0.0, 1.0);
        self.bank += (self.target_bank - self.bank) * ease;

        self.altitude += controls.climb * f.climb_rate * dt;
        self.altitude = self.altitude.clamp(self.altitude_floor(), self.flight.altitude_max);

        let (sin, cos) = self.trig.get(self.yaw, self.flight.trig_cache_epsilon);
        self.velocity = Vec3::new(sin * self.flight.speed, 0.0, cos * self.flight.speed);
        self.position += self.velocity * dt;
        self.position.y = self.altitude;
    }

    /// Raise the floor to `floor` plus the clearance margin, lifting the bomber
    /// at once if it is below.
    pub fn set_minimum_altitude(&mut self, floor: f32) {
        if !floor.is_finite() {
            return;
        }
        self.floor = floor;
        self.altitude = self.altitude.max(self.altitude_floor());
        self.position.y = self.altitude;
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    /// Pitch is always level; roll is the current bank.
    pub fn pose(&self) -> Pose {
        Pose {
            position: self.position,
            pitch: 0.0,
            yaw: self.yaw,
            roll: self.bank,
        }
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn bank(&self) -> f32 {
        self.bank
    }

    pub fn altitude(&self) -> f32 {
        self.altitude
    }

    // --- damage ---------------------------------------------------------------

    pub fn take_damage(&mut self, amount: f32) {
        let was_down = self.is_down();
        self.health.take_damage(amount);
        if !was_down && self.is_down() {
            log::warn!("Bomber down at {:.0}", self.position);
        }
    }

    pub fn health(&self) -> Health {
        self.health
    }

    pub fn is_down(&self) -> bool {
        self.health.is_dead()
    }

    // --- weapons --------------------------------------------------------------

    pub fn missile_ready_fraction(&self, now: f64) -> f32 {
        self.missile_cooldown.fraction_ready(now)
    }

    /// Nearest standing launcher within `defense_range`, cached briefly.
    pub fn find_closest_defense_building(
        &mut self,
        now: f64,
        terrain: &TerrainManager,
        spatial: &mut SpatialQuery,
    ) -> Option<BuildingId> {
        let range = self.cruise.defense_range;
        if let Some(cache) = self.target_cache {
            let fresh = now - cache.at < self.cruise.target_cache_time as f64
                && self.position.distance(cache.from) <= self.cruise.target_cache_move
                && cache.epoch == terrain.epoch();
            let alive = cache
                .target
                .map_or(true, |id| terrain.building(id).is_some_and(|b| b.is_active_launcher()));
            if fresh && alive {
                return cache.target;
            }
        }

        let from = self.position;
        let target = spatial
            .buildings_in_radius(terrain, from, range, now)
            .into_iter()
            .filter_map(|id| terrain.building(id))
            .filter(|b| b.is_active_launcher())
            .map(|b| (b.id, b.spec.center().distance(from)))
            .filter(|(_, d)| *d <= range)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id);

        self.target_cache = Some(TargetCache {
            target,
            at: now,
            from,
            epoch: terrain.epoch(),
        });
        target
    }

    /// Drop the cached target so the next search runs fresh.
    pub fn invalidate_target_cache(&mut self) {
        self.target_cache = None;
    }

    /// Fire a cruise missile at the nearest launcher.
    pub fn launch_missile(
        &mut self,
        now: f64,
        terrain: &TerrainManager,
        spatial: &mut SpatialQuery,
        ids: &mut MissileIds,
    ) -> Result<MissileId, LaunchError> {
        if self.is_down() {
            return Err(LaunchError::BomberDown);
        }
        if !self.missile_cooldown.is_ready(now) {
            return Err(LaunchError::CoolingDown {
                remaining: self.missile_cooldown.remaining(now) as f32,
            });
        }
        let target = self
            .find_closest_defense_building(now, terrain, spatial)
            .ok_or(LaunchError::NoTarget)?;
        let aim = terrain.building(target).ok_or(LaunchError::NoTarget)?.spec.center();

        let [x, y, z] = self.cruise.hardpoint;
        let side = if self.left_hardpoint_next { x } else { -x };
        self.left_hardpoint_next = !self.left_hardpoint_next;
        let origin = self.pose().local_to_world_flat(Vec3::new(side, y, z));

        let id = ids.allocate();
        self.missiles
            .push(CruiseMissile::launch(id, target, aim, origin, self.velocity));
        self.missile_cooldown.trigger(now);
        log::info!("Cruise missile {:?} launched at launcher {:?}", id, target);
        Ok(id)
    }

    pub fn missile(&self, id: MissileId) -> Option<&CruiseMissile> {
        self.missiles.iter().find(|m| m.id() == id)
    }

    pub fn missile_mut(&mut self, id: MissileId) -> Option<&mut CruiseMissile> {
        self.missiles.iter_mut().find(|m| m.id() == id)
    }

    pub fn remove_missile(&mut self, id: MissileId) -> Option<CruiseMissile> {
        let index = self.missiles.iter().position(|m| m.id() == id)?;
        Some(self.missiles.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DefenseConfig, WorkerMode, WorldConfig};
    use input::InputState;
    use procgen::{Archetype, BuildingSpec, Role};
    use std::f32::consts::PI;

    fn bomber() -> Bomber {
        Bomber::new(Vec3::new(0.0, 100.0, 0.0), &FlightConfig::default(), &CruiseConfig::default())
    }

    fn climb(c: f32) -> FlightControls {
        FlightControls { turn: 0.0, climb: c }
    }

    #[test]
    fn level_flight_moves_along_heading() {
        let mut b = bomber();
        for _ in 0..10 {
            b.update(0.1, FlightControls::default());
        }
        assert!((b.position() - Vec3::new(0.0, 100.0, 25.0)).length() < 1e-3);
        assert_eq!(b.velocity(), Vec3::new(0.0, 0.0, 25.0));
    }

    /// Altitude never leaves [30, 300] whatever the input.
    #[test]
    fn altitude_is_clamped() {
        let mut b = bomber();
        for _ in 0..200 {
            b.update(0.1, climb(1.0));
            assert!(b.altitude() <= 300.0);
        }
        assert_eq!(b.altitude(), 300.0);
        for _ in 0..400 {
            b.update(0.1, climb(-1.0));
            assert!(b.altitude() >= 30.0);
        }
        assert_eq!(b.altitude(), 30.0);
    }

    /// With the floor at 90 the bomber stays at or above 100 even while diving.
    #[test]
    fn minimum_altitude_overrides_dive() {
        let mut b = bomber();
        b.update(0.1, climb(-1.0));
        b.set_minimum_altitude(90.0);
        assert!(b.altitude() >= 100.0);
        for _ in 0..50 {
            b.update(0.1, climb(-1.0));
            assert!(b.altitude() >= 100.0);
            assert_eq!(b.position().y, b.altitude());
        }
    }

    #[test]
    fn bank_eases_toward_turn_target() {
        let mut b = bomber();
        b.update(0.1, FlightControls { turn: 1.0, climb: 0.0 });
        assert!(b.bank() > 0.0 && b.bank() < PI / 6.0);
        for _ in 0..100 {
            b.update(0.1, FlightControls { turn: 1.0, climb: 0.0 });
        }
        assert!((b.bank() - PI / 6.0).abs() < 1e-3);
        for _ in 0..100 {
            b.update(0.1, climb(1.0));
        }
        assert!((b.bank() - PI / 12.0).abs() < 1e-3);
        assert!(b.yaw() > 0.0);
    }

    /// Small yaw changes reuse the cached sine and cosine.
    #[test]
    fn trig_cache_threshold() {
        let mut cache = TrigCache::default();
        let first = cache.get(0.0, 0.01);
        assert_eq!(first, (0.0, 1.0));
        assert_eq!(cache.get(0.005, 0.01), first);
        let moved = cache.get(0.5, 0.01);
        assert_eq!(moved, 0.5f32.sin_cos());
    }

    #[test]
    fn shift_routes_arrows_away_from_flight() {
        let mut input = InputState::new();
        input.press(KeyCode::ArrowUp);
        input.press(KeyCode::KeyA);
        assert_eq!(FlightControls::from_input(&input), FlightControls { turn: 1.0, climb: 1.0 });
        input.press(KeyCode::ShiftLeft);
        assert_eq!(FlightControls::from_input(&input), FlightControls::default());
    }

    #[test]
    fn downed_bomber_refuses_launch_and_holds_pose() {
        let mut b = bomber();
        b.take_damage(1000.0);
        assert!(b.is_down());
        let before = b.position();
        b.update(0.1, FlightControls::default());
        assert_eq!(b.position(), before);

        let world = WorldConfig::default();
        let terrain = TerrainManager::new(&world, &DefenseConfig::default(), WorkerMode::Inline);
        let mut spatial = SpatialQuery::new(&world);
        let mut ids = MissileIds::default();
        assert_eq!(
            b.launch_missile(0.0, &terrain, &mut spatial, &mut ids),
            Err(LaunchError::BomberDown)
        );
    }

    /// Cooldown, alternating hardpoints, and no-target refusal.
    #[test]
    fn launch_rules() {
        let world = WorldConfig {
            building_seed: Some(9),
            ..Default::default()
        };
        let mut terrain = TerrainManager::new(&world, &DefenseConfig::default(), WorkerMode::Inline);
        terrain.stream(0.0, Vec3::ZERO);
        terrain.poll();
        let mut spatial = SpatialQuery::new(&world);
        let mut ids = MissileIds::default();
        let mut b = bomber();

        terrain
            .place_building(BuildingSpec {
                position: Vec3::new(0.0, 0.0, 120.0),
                width: 12.0,
                depth: 12.0,
                height: 20.0,
                archetype: Archetype::Industrial,
                role: Role::DefenseLauncher,
            })
            .unwrap();

        let first = b.launch_missile(0.0, &terrain, &mut spatial, &mut ids).unwrap();
        assert!(matches!(
            b.launch_missile(5.0, &terrain, &mut spatial, &mut ids),
            Err(LaunchError::CoolingDown { .. })
        ));
        let second = b.launch_missile(10.1, &terrain, &mut spatial, &mut ids).unwrap();
        let x1 = b.missile(first).unwrap().body.position().x;
        let x2 = b.missile(second).unwrap().body.position().x;
        assert!(x1 * x2 < 0.0, "hardpoints alternate sides");

        // Nothing standing in range.
        let ids_in_range: Vec<_> = terrain.buildings().filter(|b| b.is_active_launcher()).map(|b| b.id).collect();
        for id in ids_in_range {
            terrain.damage_building(id, 1000.0);
        }
        assert_eq!(
            b.launch_missile(20.2, &terrain, &mut spatial, &mut ids),
            Err(LaunchError::NoTarget)
        );
    }

    /// A destroyed cached target is never returned again.
    #[test]
    fn destroyed_target_leaves_cache() {
        let world = WorldConfig {
            building_seed: Some(4),
            ..Default::default()
        };
        let mut terrain = TerrainManager::new(&world, &DefenseConfig::default(), WorkerMode::Inline);
        terrain.stream(0.0, Vec3::ZERO);
        terrain.poll();
        let mut spatial = SpatialQuery::new(&world);
        let mut b = bomber();
        terrain
            .place_building(BuildingSpec {
                position: Vec3::new(10.0, 0.0, 10.0),
                width: 12.0,
                depth: 12.0,
                height: 20.0,
                archetype: Archetype::Industrial,
                role: Role::DefenseLauncher,
            })
            .unwrap();

        let cached = b.find_closest_defense_building(0.0, &terrain, &mut spatial).unwrap();
        terrain.damage_building(cached, 1000.0);
        assert_ne!(b.find_closest_defense_building(0.1, &terrain, &mut spatial), Some(cached));
    }
}
