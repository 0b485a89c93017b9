//! The simulation tick.
//!
//! Everything runs on one logical thread, driven by `tick`. Within a tick the
//! order is fixed: input, flight, deferred actions, chunk streaming, altitude
//! floor, acquisition and launches, flares and bombs, seekers, missile step
//! dispatch, applying worker responses, and finally the radar model and frame
//! snapshot handed to the sinks.

use engine_core::{Cooldown, Time};
use glam::Vec3;
use input::{InputSource, KeyCode};
use physics::{MissileId, MissileKind, MissileStepResponse};
use procgen::Role;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::bomber::{Bomber, FlightControls};
use crate::bombs::{blast_targets, find_impact, Bomb, BombBay, Impact};
use crate::building::{Building, BuildingId};
use crate::camera::CameraRig;
use crate::config::SimConfig;
use crate::cruise::blast_damage_to_bomber;
use crate::deferred::DeferredQueue;
use crate::error::{BombError, LaunchError};
use crate::flares::FlareField;
use crate::hud::{Cooldowns, MarkerKind, RadarInputs, RadarModel};
use crate::missiles::{MissileDispatcher, MissileIds};
use crate::sink::{EmitterMount, ExplosionKind, FrameSnapshot, HudSink, MissilePose, SceneEvent, SceneSink};
use crate::spatial::SpatialQuery;
use crate::terrain::{Destroyed, TerrainManager};

/// Bombs leave the bay this far below the bomber's centre.
const BOMB_DROP_OFFSET: f32 = 2.0;

/// Work that completes some time after it was started.
#[derive(Debug, Clone, Copy)]
enum Deferred {
    /// Bay doors finished opening.
    ReleaseBomb,
    CloseBay,
    /// The explosion finished lingering; the trail stops and the body goes.
    DisposeMissile(MissileId, MissileKind),
}

/// Running totals for a sortie.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortieStats {
    pub cruise_launched: u32,
    pub sams_fired: u32,
    pub bombs_dropped: u32,
    pub flares_deployed: u32,
    pub buildings_destroyed: u32,
    pub targets_destroyed: u32,
    pub launchers_destroyed: u32,
}

pub struct Simulation {
    config: SimConfig,
    time: Time,
    bomber: Bomber,
    terrain: TerrainManager,
    spatial: SpatialQuery,
    dispatcher: MissileDispatcher,
    ids: MissileIds,
    flares: FlareField,
    flare_cooldown: Cooldown,
    bay: BombBay,
    bombs: Vec<Bomb>,
    next_bomb: u64,
    deferred: DeferredQueue<Deferred>,
    camera: CameraRig,
    rng: StdRng,
    launch_error: Option<LaunchError>,
    stats: SortieStats,
    /// Scene events accumulated during the current tick.
    events: Vec<SceneEvent>,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Self {
        let spawn = Vec3::new(0.0, config.flight.spawn_altitude, 0.0);
        let rng = match config.world.building_seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
            None => StdRng::from_entropy(),
        };
        log::info!(
            "Simulation: terrain worker {:?}, physics worker {:?}, spawn {:.0}",
            config.workers.terrain,
            config.workers.physics,
            spawn
        );

        Self {
            time: Time::new(config.timing.max_dt),
            bomber: Bomber::new(spawn, &config.flight, &config.cruise),
            terrain: TerrainManager::new(&config.world, &config.defense, config.workers.terrain),
            spatial: SpatialQuery::new(&config.world),
            dispatcher: MissileDispatcher::new(config.workers.physics),
            ids: MissileIds::default(),
            flares: FlareField::new(),
            flare_cooldown: Cooldown::new(config.bombs.flare_cooldown as f64),
            bay: BombBay::new(config.bombs.cooldown),
            bombs: Vec::new(),
            next_bomb: 0,
            deferred: DeferredQueue::new(),
            camera: CameraRig::default(),
            rng,
            launch_error: None,
            stats: SortieStats::default(),
            events: Vec::new(),
            config,
        }
    }

    /// Advance the world by `raw_dt` seconds (clamped to `max_dt`).
    pub fn tick(
        &mut self,
        raw_dt: f32,
        input: &mut dyn InputSource,
        scene: &mut dyn SceneSink,
        hud: &mut dyn HudSink,
    ) {
        let dt = self.time.advance(raw_dt);
        let now = self.time.now();

        // Input. Virtual triggers are consumed even when the key is also down.
        self.camera.update(input, dt, self.config.flight.camera_pitch_rate);
        let controls = FlightControls::from_input(input);
        let bomb = input.take_bomb_trigger() | input.is_key_pressed(KeyCode::Space);
        let missile = input.take_missile_trigger() | input.is_key_pressed(KeyCode::KeyM);
        let flare = input.is_key_pressed(KeyCode::KeyF);

        self.bomber.update(dt, controls);
        if bomb {
            if let Err(e) = self.request_bomb(now) {
                log::debug!("Bomb refused: {}", e);
            }
        }
        if flare {
            self.deploy_flare(now);
        }
        self.run_deferred(now);

        self.terrain.stream(now, self.bomber.position());
        self.terrain.poll();
        self.apply_altitude_floor();
        self.pull_terrain_events();

        if missile {
            // Refusals are kept for the HUD.
            let _ = self.launch_missile();
        }
        if !self.bomber.is_down() {
            let fired = self.terrain.fire_launchers(
                now,
                self.bomber.position(),
                &self.config.defense,
                &mut self.ids,
                &mut self.rng,
            );
            self.stats.sams_fired += fired.len() as u32;
        }

        self.update_flares(dt);
        self.update_bombs(dt);
        self.update_seekers(dt);
        self.step_missiles(dt, now);
        self.pull_terrain_events();

        let radar = self.radar(now);
        let frame = self.snapshot(now);
        scene.submit(&frame, &self.events);
        self.events.clear();
        hud.update(&radar);
    }

    // ---------------------------------------------------------------------
    // Weapons
    // ---------------------------------------------------------------------

    /// Fire a cruise missile at the nearest defense launcher.
    pub fn launch_missile(&mut self) -> Result<MissileId, LaunchError> {
        let now = self.time.now();
        match self
            .bomber
            .launch_missile(now, &self.terrain, &mut self.spatial, &mut self.ids)
        {
            Ok(id) => {
                self.launch_error = None;
                self.stats.cruise_launched += 1;
                self.events.push(SceneEvent::MissileSpawned {
                    id,
                    kind: MissileKind::Tomahawk,
                });
                self.events.push(SceneEvent::EmitterStarted {
                    mount: EmitterMount::MissileTrail(id),
                });
                Ok(id)
            }
            Err(e) => {
                log::info!("Launch refused: {}", e);
                self.launch_error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Have a standing launcher fire one SAM at a fixed point.
    pub fn fire_sam(&mut self, launcher: BuildingId, aim: Vec3) -> Option<MissileId> {
        let id = self.terrain.launch_sam(
            launcher,
            self.time.now(),
            aim,
            self.config.defense.missile_speed,
            &mut self.ids,
        )?;
        self.stats.sams_fired += 1;
        Some(id)
    }

    fn request_bomb(&mut self, now: f64) -> Result<(), BombError> {
        if self.bomber.is_down() {
            return Err(BombError::BomberDown);
        }
        self.bay.request_release(now)?;
        self.events.push(SceneEvent::BombBayOpened);
        self.deferred
            .schedule(now + self.config.bombs.bay_open_time as f64, Deferred::ReleaseBomb);
        Ok(())
    }

    fn deploy_flare(&mut self, now: f64) {
        if self.bomber.is_down() || !self.flare_cooldown.is_ready(now) {
            return;
        }
        self.flare_cooldown.trigger(now);
        let position = self.bomber.position();
        let id = self.flares.deploy(position, self.config.bombs.flare_lifetime);
        self.stats.flares_deployed += 1;
        log::debug!("Flare {:?} deployed at {:.0}", id, position);
        self.events.push(SceneEvent::FlareDeployed { id, position });
        self.events.push(SceneEvent::EmitterStarted {
            mount: EmitterMount::Flare(id),
        });
    }

    fn run_deferred(&mut self, now: f64) {
        for action in self.deferred.drain_due(now) {
            match action {
                Deferred::ReleaseBomb => {
                    if !self.bay.finish_opening() {
                        continue;
                    }
                    let position = self.bomber.position() - Vec3::Y * BOMB_DROP_OFFSET;
                    self.next_bomb += 1;
                    self.bombs.push(Bomb {
                        id: self.next_bomb,
                        position,
                        velocity: self.bomber.velocity(),
                    });
                    self.stats.bombs_dropped += 1;
                    self.events.push(SceneEvent::BombReleased { position });
                    self.deferred
                        .schedule(now + self.config.bombs.bay_close_delay as f64, Deferred::CloseBay);
                }
                Deferred::CloseBay => {
                    self.bay.close();
                    self.events.push(SceneEvent::BombBayClosed);
                }
                Deferred::DisposeMissile(id, MissileKind::Tomahawk) => {
                    if self.bomber.remove_missile(id).is_some() {
                        self.events.push(SceneEvent::EmitterStopped {
                            mount: EmitterMount::MissileTrail(id),
                        });
                        self.events.push(SceneEvent::MissileDisposed { id });
                    }
                }
                Deferred::DisposeMissile(id, MissileKind::Defense) => {
                    // Gone already if its chunk was evicted while it lingered.
                    if self.terrain.sam(id).is_some() {
                        self.events.push(SceneEvent::EmitterStopped {
                            mount: EmitterMount::MissileTrail(id),
                        });
                        self.terrain.remove_sam(id);
                    }
                }
            }
        }
        self.pull_terrain_events();
    }

    // ---------------------------------------------------------------------
    // World
    // ---------------------------------------------------------------------

    /// Keep the bomber clear of the ground and of nearby roofs.
    fn apply_altitude_floor(&mut self) {
        let p = self.bomber.position();
        let ground = self.terrain.height_at(p.x, p.z);
        let roof = self
            .terrain
            .tallest_roof_near(p, self.config.world.floor_probe_radius)
            .unwrap_or(ground);
        self.bomber.set_minimum_altitude(ground.max(roof));
    }

    /// Damage a building, keeping score and caches in step with the result.
    pub fn damage_building(&mut self, id: BuildingId, amount: f32) -> Option<Destroyed> {
        let destroyed = self.terrain.damage_building(id, amount)?;
        self.stats.buildings_destroyed += 1;
        match destroyed.role {
            Role::Target => self.stats.targets_destroyed += 1,
            Role::DefenseLauncher => {
                self.stats.launchers_destroyed += 1;
                self.spatial.invalidate();
                self.bomber.invalidate_target_cache();
            }
            Role::Plain => {}
        }
        Some(destroyed)
    }

    pub fn find_closest_defense_building(&mut self) -> Option<BuildingId> {
        self.bomber
            .find_closest_defense_building(self.time.now(), &self.terrain, &mut self.spatial)
    }

    fn pull_terrain_events(&mut self) {
        self.events.extend(self.terrain.take_events());
    }

    // ---------------------------------------------------------------------
    // Flares, bombs, seekers
    // ---------------------------------------------------------------------

    fn update_flares(&mut self, dt: f32) {
        for id in self.flares.update(dt, self.config.bombs.flare_fall_speed) {
            self.events.push(SceneEvent::FlareExpired { id });
            self.events.push(SceneEvent::EmitterStopped {
                mount: EmitterMount::Flare(id),
            });
        }
    }

    fn update_bombs(&mut self, dt: f32) {
        let gravity = self.config.bombs.gravity;
        let mut impacts = Vec::new();
        for bomb in &mut self.bombs {
            bomb.step(dt, gravity);
            if let Some(impact) = find_impact(bomb, &self.terrain) {
                impacts.push((bomb.id, bomb.position, impact));
            }
        }
        self.bombs.retain(|b| !impacts.iter().any(|(id, ..)| *id == b.id));
        for (_, position, impact) in impacts {
            self.explode_bomb(position, impact);
        }
    }

    fn explode_bomb(&mut self, position: Vec3, impact: Impact) {
        log::info!("Bomb impact ({:?}) at {:.0}", impact, position);
        self.events.push(SceneEvent::Explosion {
            position,
            kind: ExplosionKind::Bomb,
        });
        let radius = self.config.bombs.blast_radius;
        let damage = self.config.bombs.damage;
        let mut targets = blast_targets(&self.terrain, position, radius, damage);
        // A direct hit on a wide roof can land outside the radius of its centre.
        if let Impact::Building(hit) = impact {
            if !targets.iter().any(|(id, _)| *id == hit) {
                targets.push((hit, damage));
            }
        }
        for (id, amount) in targets {
            self.damage_building(id, amount);
        }
    }

    fn update_seekers(&mut self, dt: f32) {
        let cruise = &self.config.cruise;
        for m in self.bomber.missiles.iter_mut().filter(|m| !m.is_exploded()) {
            let centre = self
                .terrain
                .building(m.original_target)
                .filter(|b| !b.is_destroyed())
                .map(|b| b.spec.center());
            if m.update_seeker(dt, &self.flares, centre, cruise) {
                log::info!("Missile {:?} locked on", m.id());
                self.events.push(SceneEvent::LockEstablished { missile: m.id() });
            }
            if m.ignite_if_due(cruise) {
                log::debug!("Missile {:?} ignited at {:.0}", m.id(), m.body.position());
            }
        }
    }

    // ---------------------------------------------------------------------
    // Missile physics
    // ---------------------------------------------------------------------

    fn step_missiles(&mut self, dt: f32, now: f64) {
        let timeout = self.config.workers.missile_request_timeout;
        let mut requests = Vec::new();
        let mut overdue = Vec::new();
        for m in &mut self.bomber.missiles {
            m.body.age(dt);
            if m.body.overdue(self.config.cruise.max_life, timeout) {
                overdue.push((m.id(), MissileKind::Tomahawk, m.body.position()));
                continue;
            }
            let guidance = m.guidance(&self.config.cruise);
            requests.extend(m.body.next_request(now, timeout, &guidance));
        }
        for sam in self.terrain.sams_mut() {
            sam.body.age(dt);
            if sam.body.overdue(self.config.defense.max_life, timeout) {
                overdue.push((sam.id(), MissileKind::Defense, sam.body.position()));
                continue;
            }
            let guidance = sam.guidance(&self.config.defense);
            requests.extend(sam.body.next_request(now, timeout, &guidance));
        }
        self.dispatcher.dispatch(requests);

        for res in self.dispatcher.collect() {
            self.apply_step(&res, now);
        }

        // Lifetime fuse for missiles the worker has stopped answering.
        for (id, kind, position) in overdue {
            let flying = match kind {
                MissileKind::Tomahawk => self.bomber.missile(id).is_some_and(|m| !m.is_exploded()),
                MissileKind::Defense => self.terrain.sam(id).is_some_and(|s| !s.is_exploded()),
            };
            if flying {
                log::warn!("{} {:?} outlived its fuse without a step answer", kind.as_str(), id);
                self.detonate(id, kind, position, now);
            }
        }
    }

    fn apply_step(&mut self, res: &MissileStepResponse, now: f64) {
        let applied = if let Some(m) = self.bomber.missile_mut(res.id) {
            m.apply(res).then(|| (MissileKind::Tomahawk, m.body.position()))
        } else if let Some(sam) = self.terrain.sam_mut(res.id) {
            sam.apply(res).then(|| (MissileKind::Defense, sam.body.position()))
        } else {
            log::debug!("Dropping step for unknown missile {:?}", res.id);
            None
        };
        let Some((kind, position)) = applied else {
            return;
        };
        let grounded = position.y <= self.terrain.height_at(position.x, position.z);
        if res.should_explode || grounded {
            self.detonate(res.id, kind, position, now);
        }
    }

    fn detonate(&mut self, id: MissileId, kind: MissileKind, position: Vec3, now: f64) {
        let explosion = match kind {
            MissileKind::Tomahawk => {
                if let Some(m) = self.bomber.missile_mut(id) {
                    m.explode();
                }
                ExplosionKind::Cruise
            }
            MissileKind::Defense => {
                if let Some(sam) = self.terrain.sam_mut(id) {
                    sam.explode();
                }
                ExplosionKind::Sam
            }
        };
        log::info!("{} {:?} exploded at {:.0}", kind.as_str(), id, position);
        self.events.push(SceneEvent::Explosion {
            position,
            kind: explosion,
        });

        let distance = position.distance(self.bomber.position());
        let damage = blast_damage_to_bomber(distance, self.config.cruise.aoe_radius);
        if damage > 0.0 && !self.bomber.is_down() {
            log::info!("Bomber hit for {:.0} ({:.1} u from blast)", damage, distance);
            self.bomber.take_damage(damage);
        }

        if kind == MissileKind::Tomahawk {
            let blast = self.config.cruise.blast_damage;
            for (building, _) in self.terrain.buildings_within(position, self.config.cruise.blast_radius) {
                self.damage_building(building, blast);
            }
        }

        self.deferred.schedule(
            now + self.config.timing.explosion_linger as f64,
            Deferred::DisposeMissile(id, kind),
        );
    }

    // ---------------------------------------------------------------------
    // Outputs
    // ---------------------------------------------------------------------

    fn radar(&mut self, now: f64) -> RadarModel {
        let position = self.bomber.position();
        let nearby = self
            .spatial
            .buildings_in_radius(&self.terrain, position, self.config.timing.radar_range, now);
        let buildings: Vec<&Building> = nearby.iter().filter_map(|id| self.terrain.building(*id)).collect();
        let cruise = self
            .bomber
            .missiles
            .iter()
            .filter(|m| !m.is_exploded())
            .map(|m| (MarkerKind::Cruise, m.body.position()));
        let sams = self
            .terrain
            .sams()
            .filter(|s| !s.is_exploded())
            .map(|s| (MarkerKind::Sam, s.body.position()));
        let missiles: Vec<(MarkerKind, Vec3)> = cruise.chain(sams).collect();

        RadarModel::derive(&RadarInputs {
            bomber: self.bomber.pose(),
            range: self.config.timing.radar_range,
            buildings: &buildings,
            missiles: &missiles,
            cooldowns: Cooldowns {
                bomb: self.bay.fraction_ready(now),
                missile: self.bomber.missile_ready_fraction(now),
            },
            destroyed_targets: self.stats.targets_destroyed,
            camera_mode: self.camera.mode,
            health: self.bomber.health().percentage(),
            launch_error: self.launch_error.clone(),
        })
    }

    fn snapshot(&self, now: f64) -> FrameSnapshot {
        let cruise = self.bomber.missiles.iter().map(|m| MissilePose {
            id: m.id(),
            kind: m.body.kind,
            pose: m.body.pose,
            exploded: m.is_exploded(),
        });
        let sams = self.terrain.sams().map(|s| MissilePose {
            id: s.id(),
            kind: s.body.kind,
            pose: s.body.pose,
            exploded: s.is_exploded(),
        });
        FrameSnapshot {
            time: now,
            bomber: self.bomber.pose(),
            bomber_velocity: self.bomber.velocity(),
            missiles: cruise.chain(sams).collect(),
            bombs: self.bombs.iter().map(|b| b.position).collect(),
            flares: self.flares.iter().map(|f| (f.id, f.position)).collect(),
            bomb_bay: self.bay.state(),
            view_distance: self.config.world.view_distance,
        }
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    pub fn now(&self) -> f64 {
        self.time.now()
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn bomber(&self) -> &Bomber {
        &self.bomber
    }

    pub fn terrain(&self) -> &TerrainManager {
        &self.terrain
    }

    pub fn terrain_mut(&mut self) -> &mut TerrainManager {
        &mut self.terrain
    }

    pub fn flares(&self) -> &FlareField {
        &self.flares
    }

    pub fn flares_mut(&mut self) -> &mut FlareField {
        &mut self.flares
    }

    pub fn camera(&self) -> &CameraRig {
        &self.camera
    }

    pub fn stats(&self) -> &SortieStats {
        &self.stats
    }

    pub fn bombs_in_flight(&self) -> usize {
        self.bombs.len()
    }

    /// Radius-query cache `(hits, misses)`.
    pub fn query_cache_stats(&self) -> (u64, u64) {
        self.spatial.stats()
    }

    /// Whether missile steps run on the worker thread.
    pub fn physics_threaded(&self) -> bool {
        self.dispatcher.is_threaded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraMode;
    use crate::cruise::SeekerTarget;
    use crate::sink::RecordingSink;
    use crate::terrain::ChunkPhase;
    use input::InputState;
    use crate::bombs::BayState;
    use procgen::{Archetype, BuildingSpec, ChunkKey};
    use std::collections::HashMap;
    use std::time::Duration;

    /// Inline workers, fixed city, launchers that never fire on their own.
    fn quiet_config(seed: u64) -> SimConfig {
        let mut config = SimConfig::inline();
        config.world.building_seed = Some(seed);
        config.defense.radar_scan_range = 0.0;
        config
    }

    struct Harness {
        sim: Simulation,
        input: InputState,
        scene: RecordingSink,
        hud: RecordingSink,
    }

    impl Harness {
        fn new(config: SimConfig) -> Self {
            Self {
                sim: Simulation::new(config),
                input: InputState::new(),
                scene: RecordingSink::new(),
                hud: RecordingSink::new(),
            }
        }

        fn tick(&mut self, dt: f32) {
            self.sim.tick(dt, &mut self.input, &mut self.scene, &mut self.hud);
            self.input.begin_frame();
        }

        fn place(&mut self, x: f32, z: f32, height: f32, role: Role) -> BuildingId {
            self.sim
                .terrain_mut()
                .place_building(BuildingSpec {
                    position: Vec3::new(x, 0.0, z),
                    width: 12.0,
                    depth: 12.0,
                    height,
                    archetype: Archetype::Industrial,
                    role,
                })
                .expect("chunk under the building should be ready")
        }

        fn radar(&self) -> &RadarModel {
            self.hud.radar.as_ref().expect("radar published")
        }
    }

    /// Flying +Z for five seconds streams the chunks ahead, never holds more
    /// than the cap, and keeps Ready chunks within three of the bomber's.
    #[test]
    fn streaming_follows_the_bomber() {
        let mut h = Harness::new(quiet_config(1));
        for _ in 0..50 {
            h.tick(0.1);
            let terrain = h.sim.terrain();
            let p = h.sim.bomber().position();
            let centre = terrain.key_at(p.x, p.z);
            assert!(terrain.chunk_count() <= 25);
            for key in terrain.ready_keys() {
                assert!(key.manhattan(centre) <= 3, "{:?} ready too far from {:?}", key, centre);
            }
        }
        assert!((h.sim.bomber().position().z - 125.0).abs() < 0.5);
        for cz in 0..=2 {
            for cx in -1..=1 {
                assert_eq!(
                    h.sim.terrain().chunk_phase(ChunkKey::new(cx, cz)),
                    ChunkPhase::Ready,
                    "chunk ({cx}, {cz})"
                );
            }
        }
        assert!(h.scene.count(|e| matches!(e, SceneEvent::ChunkMeshRequested { .. })) >= 12);
    }

    /// One cruise launch per ten seconds.
    #[test]
    fn missile_cooldown_gates_launches() {
        let mut h = Harness::new(quiet_config(2));
        h.tick(0.0);
        for z in [150.0, 190.0, 230.0] {
            h.place(0.0, z, 20.0, Role::DefenseLauncher);
        }
        assert!(h.sim.launch_missile().is_ok());

        for _ in 0..50 {
            h.tick(0.1);
        }
        assert!(matches!(h.sim.launch_missile(), Err(LaunchError::CoolingDown { .. })));

        for _ in 0..51 {
            h.tick(0.1);
        }
        assert!(h.sim.now() >= 10.1);
        assert!(h.sim.launch_missile().is_ok());
        assert_eq!(h.sim.stats().cruise_launched, 2);
    }

    /// A flare in front of a cruise missile takes its seeker; once the flare is
    /// gone the missile goes back to its building.
    #[test]
    fn flare_decoys_cruise_missile() {
        let mut h = Harness::new(quiet_config(3));
        h.tick(0.0);
        h.place(0.0, 200.0, 20.0, Role::DefenseLauncher);
        let id = h.sim.launch_missile().unwrap();
        h.tick(0.1);

        let m = h.sim.bomber().missile(id).unwrap();
        let decoy = m.body.position() + m.body.velocity.normalize_or_zero() * 40.0;
        let flare = h.sim.flares_mut().deploy(decoy, 4.0);
        h.tick(0.1);

        let flare_position = h.sim.flares().get(flare).unwrap().position;
        let m = h.sim.bomber().missile(id).unwrap();
        assert_eq!(m.seeker, SeekerTarget::Flare(flare));
        assert_eq!(m.target_point, flare_position);

        h.sim.flares_mut().remove(flare);
        h.tick(0.1);
        let m = h.sim.bomber().missile(id).unwrap();
        assert_eq!(m.seeker, SeekerTarget::Building(m.original_target));
        assert_eq!(m.target_point, m.target_anchor);
    }

    /// A SAM aimed 10 000 u away self-destructs within ten seconds, and its
    /// position is frozen from the tick it explodes.
    #[test]
    fn sam_self_destructs_and_freezes() {
        let dt = 1.0 / 16.0;
        let mut h = Harness::new(quiet_config(4));
        h.tick(dt);
        let launcher = h.place(0.0, 150.0, 20.0, Role::DefenseLauncher);
        let roof = h.sim.terrain().building(launcher).unwrap().spec.roof();
        let sam = h.sim.fire_sam(launcher, roof + Vec3::new(-10_000.0, 0.0, 0.0)).unwrap();
        let launched_at = h.sim.now();

        let mut exploded = None;
        for _ in 0..200 {
            h.tick(dt);
            let s = h.sim.terrain().sam(sam).expect("SAM lingers after exploding");
            if s.is_exploded() {
                exploded = Some((h.sim.now() - launched_at, s.body.position()));
                break;
            }
        }
        let (elapsed, position) = exploded.expect("SAM never exploded");
        assert!(elapsed <= 10.0, "exploded after {elapsed}s");

        h.tick(dt);
        assert_eq!(h.sim.terrain().sam(sam).unwrap().body.position(), position);
        assert_eq!(h.scene.count(|e| matches!(e, SceneEvent::Explosion { kind: ExplosionKind::Sam, .. })), 1);
    }

    /// A launcher with the bomber in radar range fires once per interval:
    /// three SAMs in twenty seconds, never closer than eight seconds apart.
    #[test]
    fn launchers_respect_launch_interval() {
        let mut config = quiet_config(13);
        config.defense.radar_scan_range = 300.0;
        config.flight.max_health = 1.0e6;
        let interval = config.defense.launch_interval as f64;
        let mut h = Harness::new(config);
        h.tick(0.0);
        let launcher = h.place(0.0, 200.0, 20.0, Role::DefenseLauncher);

        let mut launches: HashMap<BuildingId, Vec<f64>> = HashMap::new();
        let mut seen = Vec::new();
        for _ in 0..200 {
            h.tick(0.1);
            for sam in h.sim.terrain().sams() {
                if !seen.contains(&sam.id()) {
                    seen.push(sam.id());
                    launches.entry(sam.owner).or_default().push(h.sim.now());
                }
            }
        }

        assert_eq!(launches.get(&launcher).map(Vec::len), Some(3));
        for (owner, times) in &launches {
            assert!(times.len() <= 3, "{:?} fired {} times", owner, times.len());
            for pair in times.windows(2) {
                assert!(pair[1] - pair[0] >= interval - 1e-6, "{:?} fired at {:?}", owner, times);
            }
        }
    }

    /// A missile past its lifetime with no answered step is fused on the
    /// simulation thread where it stands.
    #[test]
    fn overdue_sam_detonates_without_a_step() {
        let mut h = Harness::new(quiet_config(14));
        h.tick(0.1);
        let launcher = h.place(0.0, 150.0, 20.0, Role::DefenseLauncher);
        let roof = h.sim.terrain().building(launcher).unwrap().spec.roof();
        let sam = h.sim.fire_sam(launcher, roof + Vec3::new(-10_000.0, 0.0, 0.0)).unwrap();
        h.tick(0.1);

        let stalled_at = {
            let s = h.sim.terrain_mut().sam_mut(sam).unwrap();
            s.body.life_time = 20.0;
            s.body.position()
        };
        h.tick(0.1);

        let s = h.sim.terrain().sam(sam).expect("SAM lingers after exploding");
        assert!(s.is_exploded());
        assert_eq!(s.body.position(), stalled_at);
        assert_eq!(h.scene.count(|e| matches!(e, SceneEvent::Explosion { kind: ExplosionKind::Sam, .. })), 1);
    }

    /// Destroying the cached launcher removes it from the next search.
    #[test]
    fn destroyed_target_is_not_returned() {
        let mut h = Harness::new(quiet_config(5));
        h.tick(0.1);
        h.place(0.0, 120.0, 20.0, Role::DefenseLauncher);
        let first = h.sim.find_closest_defense_building().unwrap();
        let destroyed = h.sim.damage_building(first, 1_000.0).unwrap();
        assert_eq!(destroyed.role, Role::DefenseLauncher);
        assert_ne!(h.sim.find_closest_defense_building(), Some(first));
        assert_eq!(h.sim.stats().launchers_destroyed, 1);
    }

    /// A 90 u roof under the bomber holds it at 100 u or more while diving.
    #[test]
    fn altitude_floor_beats_dive() {
        let mut h = Harness::new(quiet_config(6));
        h.tick(0.1);
        let site = Vec3::new(0.0, 0.0, 30.0);
        let ground = h.sim.terrain().height_at(site.x, site.z);
        h.place(site.x, site.z, 150.0 - ground, Role::Plain);

        h.input.press(KeyCode::KeyS);
        for _ in 0..10 {
            h.tick(0.1);
            let altitude = h.sim.bomber().altitude();
            assert!(altitude >= 160.0 - 1e-3, "altitude {altitude}");
            assert!(altitude <= 300.0);
        }
    }

    /// Space opens the bay, the bomb drops once it is open, the bay closes
    /// after the drop, and the bomb explodes on impact.
    #[test]
    fn bomb_run() {
        let mut h = Harness::new(quiet_config(7));
        h.tick(0.1);
        h.input.press(KeyCode::Space);
        h.tick(0.1);
        assert_eq!(h.scene.count(|e| matches!(e, SceneEvent::BombBayOpened)), 1);
        assert_eq!(h.scene.count(|e| matches!(e, SceneEvent::BombReleased { .. })), 0);
        assert_eq!(h.scene.last_frame().unwrap().bomb_bay, BayState::Opening);

        for _ in 0..100 {
            h.tick(0.1);
        }
        assert_eq!(h.scene.count(|e| matches!(e, SceneEvent::BombReleased { .. })), 1);
        assert_eq!(h.scene.count(|e| matches!(e, SceneEvent::BombBayClosed)), 1);
        assert_eq!(
            h.scene.count(|e| matches!(e, SceneEvent::Explosion { kind: ExplosionKind::Bomb, .. })),
            1
        );
        assert_eq!(h.sim.bombs_in_flight(), 0);
        assert_eq!(h.sim.stats().bombs_dropped, 1);
        let frame = h.scene.last_frame().unwrap();
        assert_eq!(frame.bomb_bay, BayState::Closed);
        assert_eq!(frame.view_distance, h.sim.config().world.view_distance);
    }

    #[test]
    fn flares_deploy_and_burn_out() {
        let mut h = Harness::new(quiet_config(8));
        h.input.press(KeyCode::KeyF);
        h.tick(0.1);
        assert_eq!(h.sim.flares().len(), 1);
        assert_eq!(h.scene.count(|e| matches!(e, SceneEvent::FlareDeployed { .. })), 1);

        for _ in 0..50 {
            h.tick(0.1);
        }
        assert!(h.sim.flares().is_empty());
        assert_eq!(h.scene.count(|e| matches!(e, SceneEvent::FlareExpired { .. })), 1);
    }

    /// Launch without a target leaves the HUD in the no-target state; C flips the camera.
    #[test]
    fn hud_reports_refusal_and_camera() {
        let mut config = quiet_config(9);
        config.cruise.defense_range = 0.0;
        let mut h = Harness::new(config);
        h.input.press(KeyCode::KeyM);
        h.input.press(KeyCode::KeyC);
        h.tick(0.1);

        let radar = h.radar();
        assert_eq!(radar.launch_error, Some(LaunchError::NoTarget));
        assert_eq!(radar.camera_mode, CameraMode::Orbit);
        assert_eq!(radar.cooldowns.missile, 1.0);
        assert_eq!(radar.health, 1.0);
        assert_eq!(h.sim.stats().cruise_launched, 0);
    }

    /// Destroying a Target scores once.
    #[test]
    fn target_destruction_scores() {
        let mut h = Harness::new(quiet_config(10));
        h.tick(0.1);
        let target = h.place(60.0, 60.0, 30.0, Role::Target);
        assert!(h.sim.damage_building(target, 500.0).is_some());
        assert!(h.sim.damage_building(target, 500.0).is_none());
        h.tick(0.1);
        assert_eq!(h.radar().destroyed_targets, 1);
        assert_eq!(h.scene.count(|e| matches!(e, SceneEvent::BuildingDestroyed { id, .. } if *id == target)), 1);
    }

    /// A cruise missile always ends in an explosion and is disposed after lingering.
    #[test]
    fn cruise_missile_lifecycle() {
        let mut h = Harness::new(quiet_config(11));
        h.tick(0.0);
        h.place(0.0, 250.0, 20.0, Role::DefenseLauncher);
        let id = h.sim.launch_missile().unwrap();
        for _ in 0..400 {
            h.tick(0.1);
        }
        assert_eq!(
            h.scene.count(|e| matches!(e, SceneEvent::Explosion { kind: ExplosionKind::Cruise, .. })),
            1
        );
        assert_eq!(h.scene.count(|e| matches!(e, SceneEvent::MissileDisposed { id: d } if *d == id)), 1);
        assert!(h.sim.bomber().missile(id).is_none());
    }

    /// Both workers on their threads: chunks arrive and a SAM moves.
    #[test]
    fn threaded_workers_smoke() {
        let mut config = SimConfig::default();
        config.world.building_seed = Some(12);
        config.defense.radar_scan_range = 0.0;
        let mut h = Harness::new(config);

        for _ in 0..300 {
            h.tick(0.02);
            if h.sim.terrain().chunk_phase(ChunkKey::new(0, 0)) == ChunkPhase::Ready {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(h.sim.terrain().chunk_phase(ChunkKey::new(0, 0)), ChunkPhase::Ready);

        let launcher = h.place(40.0, 0.0, 20.0, Role::DefenseLauncher);
        let origin = h.sim.terrain().building(launcher).unwrap().spec.roof() + Vec3::Y * 2.0;
        let sam = h.sim.fire_sam(launcher, origin + Vec3::new(0.0, 200.0, 0.0)).unwrap();
        let mut moved = false;
        for _ in 0..400 {
            h.tick(0.02);
            if h.sim.terrain().sam(sam).is_some_and(|s| s.body.position() != origin) {
                moved = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(moved, "no physics response arrived");
    }
}
