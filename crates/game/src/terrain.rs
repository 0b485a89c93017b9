//! Chunk streamer and building registry.
//!
//! The manager owns every resident chunk, every chunk owns its buildings, and
//! every launcher building owns the SAMs it fired. Chunks move through
//! Missing → Pending → Ready → Evicting. Generation runs on the terrain worker
//! (or inline when configured or when the worker is gone); responses are only
//! accepted for the request id a Pending slot is still waiting on.

use std::collections::HashMap;
use std::sync::Arc;

use engine_core::MeshHandle;
use glam::Vec3;
use physics::MissileId;
use procgen::{BuildingSpec, ChunkKey, HeightField, Heightmap, Role};
use rand::rngs::StdRng;
use rand::Rng;

use crate::building::{Building, BuildingId};
use crate::config::{DefenseConfig, WorkerMode, WorldConfig};
use crate::defense::{aim_point, DefensiveMissile};
use crate::missiles::MissileIds;
use crate::sink::{EmitterMount, SceneEvent};
use crate::terrain_worker::{placement_rng, run_request, ChunkRequest, ChunkResponse, ChunkWorker};

/// Slack on the streamer interval so float drift in the clock never skips a pass.
const PASS_INTERVAL_SLACK: f64 = 1e-6;

/// Displacement below which the bomber has no travel direction for prefetch.
const MIN_PREFETCH_TRAVEL: f32 = 1e-3;
/// Chunks prefetched ahead along the dominant axis.
const PREFETCH_AHEAD: i32 = 2;

/// Where a chunk is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkPhase {
    Missing,
    Pending,
    Ready,
    Evicting,
}

/// A resident chunk.
#[derive(Debug)]
pub struct Chunk {
    pub key: ChunkKey,
    pub heightmap: Arc<Heightmap>,
    pub mesh: MeshHandle,
    pub buildings: Vec<Building>,
}

#[derive(Debug)]
enum ChunkSlot {
    Pending { request_id: u64, requested_at: f64 },
    Ready(Chunk),
    Evicting(Chunk),
}

impl ChunkSlot {
    fn phase(&self) -> ChunkPhase {
        match self {
            ChunkSlot::Pending { .. } => ChunkPhase::Pending,
            ChunkSlot::Ready(_) => ChunkPhase::Ready,
            ChunkSlot::Evicting(_) => ChunkPhase::Evicting,
        }
    }

    fn chunk(&self) -> Option<&Chunk> {
        match self {
            ChunkSlot::Ready(c) | ChunkSlot::Evicting(c) => Some(c),
            ChunkSlot::Pending { .. } => None,
        }
    }

    fn chunk_mut(&mut self) -> Option<&mut Chunk> {
        match self {
            ChunkSlot::Ready(c) | ChunkSlot::Evicting(c) => Some(c),
            ChunkSlot::Pending { .. } => None,
        }
    }
}

/// Outcome of a building taking lethal damage.
#[derive(Debug, Clone, Copy)]
pub struct Destroyed {
    pub id: BuildingId,
    pub role: Role,
    pub position: Vec3,
}

pub struct TerrainManager {
    field: HeightField,
    config: WorldConfig,
    launch_interval: f32,
    slots: HashMap<ChunkKey, ChunkSlot>,
    worker: Option<ChunkWorker>,
    inline_rng: StdRng,
    inline_results: Vec<ChunkResponse>,
    next_request_id: u64,
    next_mesh: u64,
    next_building: u64,
    building_index: HashMap<BuildingId, ChunkKey>,
    sam_index: HashMap<MissileId, BuildingId>,
    /// Time and bomber position of the last streamer pass.
    last_pass: Option<(f64, Vec3)>,
    /// Bumped whenever cached building queries may be wrong.
    epoch: u64,
    events: Vec<SceneEvent>,
}

impl TerrainManager {
    pub fn new(config: &WorldConfig, defense: &DefenseConfig, mode: WorkerMode) -> Self {
        let field = HeightField::new(config.seed);
        let worker = match mode {
            WorkerMode::Inline => None,
            WorkerMode::Threaded => match ChunkWorker::spawn(field, config.building_seed) {
                Ok(w) => Some(w),
                Err(e) => {
                    log::warn!("{}; generating chunks on the simulation thread", e);
                    None
                }
            },
        };
        log::info!(
            "Terrain streamer: seed {}, chunk {} u, {} subdivisions, {} worker",
            config.seed,
            config.chunk_size,
            config.subdivisions,
            if worker.is_some() { "threaded" } else { "inline" }
        );

        Self {
            field,
            config: config.clone(),
            launch_interval: defense.launch_interval,
            slots: HashMap::new(),
            worker,
            inline_rng: placement_rng(config.building_seed),
            inline_results: Vec::new(),
            next_request_id: 0,
            next_mesh: 0,
            next_building: 0,
            building_index: HashMap::new(),
            sam_index: HashMap::new(),
            last_pass: None,
            epoch: 0,
            events: Vec::new(),
        }
    }

    pub fn chunk_size(&self) -> f32 {
        self.config.chunk_size
    }

    pub fn field(&self) -> &HeightField {
        &self.field
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn key_at(&self, x: f32, z: f32) -> ChunkKey {
        ChunkKey::from_world(x, z, self.config.chunk_size)
    }

    /// Scene events produced since the last call.
    pub fn take_events(&mut self) -> Vec<SceneEvent> {
        std::mem::take(&mut self.events)
    }

    // ---------------------------------------------------------------------
    // Streaming
    // ---------------------------------------------------------------------

    /// One streamer pass around `bomber`. Rate-limited to `chunk_tick_interval`.
    pub fn stream(&mut self, now: f64, bomber: Vec3) {
        if let Some((last, _)) = self.last_pass {
            if now - last + PASS_INTERVAL_SLACK < self.config.chunk_tick_interval as f64 {
                return;
            }
        }
        let travel = self.last_pass.map(|(_, p)| bomber - p).unwrap_or(Vec3::ZERO);
        self.last_pass = Some((now, bomber));

        let center = self.key_at(bomber.x, bomber.z);
        self.evict_far(center);
        for key in self.wanted_chunks(center, bomber, travel) {
            self.request(key, now);
        }
        self.resend_stale(now);
    }

    /// Own chunk first, then the 3×3 when near an edge, then the prefetch strips.
    fn wanted_chunks(&self, center: ChunkKey, bomber: Vec3, travel: Vec3) -> Vec<ChunkKey> {
        let size = self.config.chunk_size;
        let mut wanted = vec![center];

        let (ox, oz) = center.center(size);
        let half = size * 0.5;
        let edge_distance = (half - (bomber.x - ox).abs()).min(half - (bomber.z - oz).abs());
        if edge_distance < self.config.generation_threshold {
            for dz in -1..=1 {
                for dx in -1..=1 {
                    if dx != 0 || dz != 0 {
                        wanted.push(center.offset(dx, dz));
                    }
                }
            }
        }

        if let Some((ax, az)) = dominant_axis(travel) {
            for ahead in 1..=PREFETCH_AHEAD {
                for side in -1..=1 {
                    let key = if ax != 0 {
                        center.offset(ax * ahead, side)
                    } else {
                        center.offset(side, az * ahead)
                    };
                    if !wanted.contains(&key) {
                        wanted.push(key);
                    }
                }
            }
        }
        wanted
    }

    /// Ask for a chunk. Returns false when it was dropped at the cap.
    fn request(&mut self, key: ChunkKey, now: f64) -> bool {
        if self.slots.contains_key(&key) {
            return true;
        }
        if self.slots.len() >= self.config.max_chunks {
            log::debug!("Chunk cap {} reached, skipping {:?}", self.config.max_chunks, key);
            return false;
        }
        self.next_request_id += 1;
        let request_id = self.next_request_id;
        self.slots.insert(key, ChunkSlot::Pending { request_id, requested_at: now });
        self.send(ChunkRequest {
            key,
            request_id,
            chunk_size: self.config.chunk_size,
            subdivisions: self.config.subdivisions,
        });
        true
    }

    fn send(&mut self, req: ChunkRequest) {
        if let Some(worker) = &self.worker {
            match worker.send(req) {
                Ok(()) => return,
                Err(e) => {
                    log::warn!("{}; generating chunks on the simulation thread", e);
                    self.worker = None;
                }
            }
        }
        let res = run_request(&self.field, &req, &mut self.inline_rng);
        self.inline_results.push(res);
    }

    /// Re-issue Pending requests that have waited too long, under a new id.
    fn resend_stale(&mut self, now: f64) {
        let timeout = self.config.chunk_request_timeout as f64;
        let stale: Vec<ChunkKey> = self
            .slots
            .iter()
            .filter_map(|(key, slot)| match slot {
                ChunkSlot::Pending { requested_at, .. } if now - requested_at >= timeout => Some(*key),
                _ => None,
            })
            .collect();
        for key in stale {
            self.next_request_id += 1;
            let request_id = self.next_request_id;
            log::debug!("Chunk {:?} timed out, re-requesting as #{}", key, request_id);
            self.slots.insert(key, ChunkSlot::Pending { request_id, requested_at: now });
            self.send(ChunkRequest {
                key,
                request_id,
                chunk_size: self.config.chunk_size,
                subdivisions: self.config.subdivisions,
            });
        }
    }

    /// Demote far Ready chunks, cancel far Pending ones, and dispose a bounded
    /// number of Evicting chunks. Evicting chunks that come back in range are
    /// promoted again.
    fn evict_far(&mut self, center: ChunkKey) {
        let limit = self.config.evict_manhattan;
        let keys: Vec<ChunkKey> = self.slots.keys().copied().collect();
        for key in keys {
            let far = key.manhattan(center) > limit;
            let Some(slot) = self.slots.remove(&key) else {
                continue;
            };
            match slot {
                ChunkSlot::Pending { request_id, .. } if far => {
                    log::debug!("Cancelled chunk {:?} (request #{})", key, request_id);
                }
                ChunkSlot::Ready(chunk) if far => {
                    self.slots.insert(key, ChunkSlot::Evicting(chunk));
                }
                ChunkSlot::Evicting(chunk) if !far => {
                    self.slots.insert(key, ChunkSlot::Ready(chunk));
                }
                other => {
                    self.slots.insert(key, other);
                }
            }
        }

        let mut evicting: Vec<ChunkKey> = self
            .slots
            .iter()
            .filter(|(_, s)| matches!(s, ChunkSlot::Evicting(_)))
            .map(|(k, _)| *k)
            .collect();
        evicting.sort_by_key(|k| std::cmp::Reverse(k.manhattan(center)));
        for key in evicting.into_iter().take(self.config.max_chunks_to_process_per_frame) {
            if let Some(ChunkSlot::Evicting(chunk)) = self.slots.remove(&key) {
                self.dispose_chunk(chunk);
            }
        }
    }

    /// Dispose a chunk with everything it owns.
    fn dispose_chunk(&mut self, chunk: Chunk) {
        for building in chunk.buildings {
            if let Some(launcher) = building.launcher {
                for sam in launcher.missiles {
                    self.sam_index.remove(&sam.id());
                    self.events.push(SceneEvent::EmitterStopped {
                        mount: EmitterMount::MissileTrail(sam.id()),
                    });
                    self.events.push(SceneEvent::MissileDisposed { id: sam.id() });
                }
            }
            self.building_index.remove(&building.id);
            self.events.push(SceneEvent::BuildingDisposed {
                id: building.id,
                mesh: building.mesh,
            });
        }
        self.events.push(SceneEvent::ChunkMeshDisposed {
            key: chunk.key,
            mesh: chunk.mesh,
        });
        log::debug!("Evicted chunk {:?}", chunk.key);
    }

    /// Apply every generation result that has arrived. Never blocks.
    pub fn poll(&mut self) {
        let mut responses = std::mem::take(&mut self.inline_results);
        if let Some(worker) = &self.worker {
            while let Some(res) = worker.try_recv() {
                responses.push(res);
            }
        }
        for res in responses {
            self.accept(res);
        }
    }

    fn accept(&mut self, res: ChunkResponse) {
        match self.slots.get(&res.key) {
            Some(ChunkSlot::Pending { request_id, .. }) if *request_id == res.request_id => {}
            _ => {
                log::debug!("Dropping stale chunk response {:?} #{}", res.key, res.request_id);
                return;
            }
        }

        let key = res.key;
        let mesh = self.alloc_mesh();
        let heightmap = Arc::new(res.generated.heightmap);
        let mut buildings = Vec::with_capacity(res.generated.buildings.len());
        for spec in res.generated.buildings {
            buildings.push(self.make_building(key, spec));
        }
        log::debug!("Chunk {:?} ready with {} buildings", key, buildings.len());

        self.events.push(SceneEvent::ChunkMeshRequested {
            key,
            mesh,
            heightmap: Arc::clone(&heightmap),
        });
        self.slots.insert(
            key,
            ChunkSlot::Ready(Chunk {
                key,
                heightmap,
                mesh,
                buildings,
            }),
        );
    }

    fn alloc_mesh(&mut self) -> MeshHandle {
        self.next_mesh += 1;
        MeshHandle(self.next_mesh)
    }

    fn make_building(&mut self, key: ChunkKey, spec: BuildingSpec) -> Building {
        self.next_building += 1;
        let id = BuildingId(self.next_building);
        let mesh = self.alloc_mesh();
        self.building_index.insert(id, key);
        self.events.push(SceneEvent::BuildingSpawned { id, mesh, spec });
        Building::new(id, key, spec, mesh, self.config.building_max_health, self.launch_interval)
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    pub fn chunk_phase(&self, key: ChunkKey) -> ChunkPhase {
        self.slots.get(&key).map(ChunkSlot::phase).unwrap_or(ChunkPhase::Missing)
    }

    /// Ready + Pending + Evicting.
    pub fn chunk_count(&self) -> usize {
        self.slots.len()
    }

    pub fn ready_keys(&self) -> Vec<ChunkKey> {
        self.slots
            .iter()
            .filter(|(_, s)| matches!(s, ChunkSlot::Ready(_)))
            .map(|(k, _)| *k)
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.slots.values().filter(|s| matches!(s, ChunkSlot::Pending { .. })).count()
    }

    pub fn ready_chunk(&self, key: ChunkKey) -> Option<&Chunk> {
        match self.slots.get(&key) {
            Some(ChunkSlot::Ready(c)) => Some(c),
            _ => None,
        }
    }

    /// Terrain height: the resident heightmap when there is one, the analytic
    /// formula otherwise.
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        match self.slots.get(&self.key_at(x, z)).and_then(ChunkSlot::chunk) {
            Some(chunk) => chunk.heightmap.sample(x, z),
            None => self.field.height_at(x, z),
        }
    }

    pub fn building(&self, id: BuildingId) -> Option<&Building> {
        let key = self.building_index.get(&id)?;
        self.slots
            .get(key)?
            .chunk()?
            .buildings
            .iter()
            .find(|b| b.id == id)
    }

    pub fn building_mut(&mut self, id: BuildingId) -> Option<&mut Building> {
        let key = self.building_index.get(&id)?;
        self.slots
            .get_mut(key)?
            .chunk_mut()?
            .buildings
            .iter_mut()
            .find(|b| b.id == id)
    }

    /// Every building in resident chunks.
    pub fn buildings(&self) -> impl Iterator<Item = &Building> {
        self.slots
            .values()
            .filter_map(ChunkSlot::chunk)
            .flat_map(|c| c.buildings.iter())
    }

    /// Ready chunks whose square may intersect the disc of `radius` around `p`.
    pub fn ready_chunks_near(&self, p: Vec3, radius: f32) -> impl Iterator<Item = &Chunk> {
        let size = self.config.chunk_size;
        let lo = self.key_at(p.x - radius, p.z - radius);
        let hi = self.key_at(p.x + radius, p.z + radius);
        (lo.cz..=hi.cz)
            .flat_map(move |cz| (lo.cx..=hi.cx).map(move |cx| ChunkKey::new(cx, cz)))
            .filter_map(move |key| self.ready_chunk(key))
            .filter(move |c| {
                // Distance from `p` to the chunk's square, zero inside it.
                let (cx, cz) = c.key.center(size);
                let half = size * 0.5;
                let dx = ((cx - p.x).abs() - half).max(0.0);
                let dz = ((cz - p.z).abs() - half).max(0.0);
                dx * dx + dz * dz <= radius * radius
            })
    }

    /// Highest standing roof within `radius` (horizontal) of `p`.
    pub fn tallest_roof_near(&self, p: Vec3, radius: f32) -> Option<f32> {
        self.ready_chunks_near(p, radius)
            .flat_map(|c| c.buildings.iter())
            .filter(|b| !b.is_destroyed())
            .filter(|b| horizontal_distance(b.spec.position, p) <= radius)
            .map(|b| b.spec.roof().y)
            .reduce(f32::max)
    }

    // ---------------------------------------------------------------------
    // Damage and placement
    // ---------------------------------------------------------------------

    /// Damage a building. Returns what was destroyed, if this call destroyed it.
    pub fn damage_building(&mut self, id: BuildingId, amount: f32) -> Option<Destroyed> {
        let building = self.building_mut(id)?;
        if !building.apply_damage(amount) {
            return None;
        }
        let destroyed = Destroyed {
            id,
            role: building.role(),
            position: building.spec.center(),
        };
        if destroyed.role == Role::DefenseLauncher {
            self.epoch += 1;
        }
        log::info!("Building {:?} ({:?}) destroyed", id, destroyed.role);
        self.events.push(SceneEvent::BuildingDestroyed {
            id,
            position: destroyed.position,
        });
        Some(destroyed)
    }

    /// Standing buildings whose volume centre is within `radius` of `point`.
    pub fn buildings_within(&self, point: Vec3, radius: f32) -> Vec<(BuildingId, f32)> {
        self.ready_chunks_near(point, radius)
            .flat_map(|c| c.buildings.iter())
            .filter(|b| !b.is_destroyed())
            .map(|b| (b.id, b.spec.center().distance(point)))
            .filter(|(_, d)| *d <= radius)
            .collect()
    }

    /// Add a building to the Ready chunk under it. `None` if that chunk is not Ready.
    pub fn place_building(&mut self, mut spec: BuildingSpec) -> Option<BuildingId> {
        let key = self.key_at(spec.position.x, spec.position.z);
        if self.ready_chunk(key).is_none() {
            return None;
        }
        spec.position.y = self.height_at(spec.position.x, spec.position.z);
        let building = self.make_building(key, spec);
        let id = building.id;
        if let Some(ChunkSlot::Ready(chunk)) = self.slots.get_mut(&key) {
            chunk.buildings.push(building);
        }
        self.epoch += 1;
        Some(id)
    }

    // ---------------------------------------------------------------------
    // Launchers and SAMs
    // ---------------------------------------------------------------------

    /// Fire every standing launcher in Ready chunks that has the bomber in range
    /// and is off cooldown. Returns the new SAM ids.
    pub fn fire_launchers<R: Rng + ?Sized>(
        &mut self,
        now: f64,
        bomber: Vec3,
        config: &DefenseConfig,
        ids: &mut MissileIds,
        rng: &mut R,
    ) -> Vec<MissileId> {
        let ready: Vec<BuildingId> = self
            .slots
            .values()
            .filter_map(|s| match s {
                ChunkSlot::Ready(c) => Some(c),
                _ => None,
            })
            .flat_map(|c| c.buildings.iter())
            .filter(|b| b.is_active_launcher())
            .filter(|b| {
                b.launcher
                    .as_ref()
                    .is_some_and(|l| l.can_fire(now, b.spec.roof(), bomber, config.radar_scan_range))
            })
            .map(|b| b.id)
            .collect();

        let mut fired = Vec::new();
        for building in ready {
            let aim = aim_point(bomber, config.inaccuracy, rng);
            if let Some(id) = self.launch_sam(building, now, aim, config.missile_speed, ids) {
                fired.push(id);
            }
        }
        fired
    }

    /// Fire one SAM from a standing launcher at a fixed aim point.
    pub fn launch_sam(
        &mut self,
        building: BuildingId,
        now: f64,
        aim: Vec3,
        speed: f32,
        ids: &mut MissileIds,
    ) -> Option<MissileId> {
        let b = self.building_mut(building)?;
        if b.is_destroyed() {
            return None;
        }
        let roof = b.spec.roof();
        let launcher = b.launcher.as_mut()?;
        let id = ids.allocate();
        launcher.fire(now, id, building, roof, aim, speed);

        self.sam_index.insert(id, building);
        self.events.push(SceneEvent::MissileSpawned {
            id,
            kind: physics::MissileKind::Defense,
        });
        self.events.push(SceneEvent::EmitterStarted {
            mount: EmitterMount::MissileTrail(id),
        });
        Some(id)
    }

    pub fn sam(&self, id: MissileId) -> Option<&DefensiveMissile> {
        let owner = self.sam_index.get(&id)?;
        self.building(*owner)?
            .launcher
            .as_ref()?
            .missiles
            .iter()
            .find(|m| m.id() == id)
    }

    pub fn sam_mut(&mut self, id: MissileId) -> Option<&mut DefensiveMissile> {
        let owner = *self.sam_index.get(&id)?;
        self.building_mut(owner)?.launcher.as_mut()?.missile_mut(id)
    }

    pub fn sams(&self) -> impl Iterator<Item = &DefensiveMissile> {
        self.buildings()
            .filter_map(|b| b.launcher.as_ref())
            .flat_map(|l| l.missiles.iter())
    }

    pub fn sams_mut(&mut self) -> impl Iterator<Item = &mut DefensiveMissile> {
        self.slots
            .values_mut()
            .filter_map(ChunkSlot::chunk_mut)
            .flat_map(|c| c.buildings.iter_mut())
            .filter_map(|b| b.launcher.as_mut())
            .flat_map(|l| l.missiles.iter_mut())
    }

    /// Remove a SAM from its launcher.
    pub fn remove_sam(&mut self, id: MissileId) -> Option<DefensiveMissile> {
        let owner = self.sam_index.remove(&id)?;
        let sam = self.building_mut(owner)?.launcher.as_mut()?.remove_missile(id)?;
        self.events.push(SceneEvent::MissileDisposed { id });
        Some(sam)
    }

    /// Block until generation results arrive or `timeout` passes (drivers and tests).
    pub fn wait_for_worker(&mut self, timeout: std::time::Duration) {
        if let Some(worker) = &self.worker {
            if let Some(res) = worker.recv_timeout(timeout) {
                self.inline_results.push(res);
            }
        }
        self.poll();
    }
}

/// Sign of the axis that dominates `travel` (at least twice the other), if any.
fn dominant_axis(travel: Vec3) -> Option<(i32, i32)> {
    let (ax, az) = (travel.x.abs(), travel.z.abs());
    if ax.max(az) < MIN_PREFETCH_TRAVEL {
        return None;
    }
    if az >= 2.0 * ax {
        Some((0, if travel.z > 0.0 { 1 } else { -1 }))
    } else if ax >= 2.0 * az {
        Some((if travel.x > 0.0 { 1 } else { -1 }, 0))
    } else {
        None
    }
}

pub fn horizontal_distance(a: Vec3, b: Vec3) -> f32 {
    ((a.x - b.x).powi(2) + (a.z - b.z).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use procgen::Archetype;
    use std::time::Duration;

    fn world() -> WorldConfig {
        WorldConfig {
            building_seed: Some(11),
            ..Default::default()
        }
    }

    fn inline_manager() -> TerrainManager {
        TerrainManager::new(&world(), &DefenseConfig::default(), WorkerMode::Inline)
    }

    fn pass(m: &mut TerrainManager, now: f64, p: Vec3) {
        m.stream(now, p);
        m.poll();
    }

    fn launcher_spec(x: f32, z: f32) -> BuildingSpec {
        BuildingSpec {
            position: Vec3::new(x, 0.0, z),
            width: 12.0,
            depth: 12.0,
            height: 20.0,
            archetype: Archetype::Industrial,
            role: Role::DefenseLauncher,
        }
    }

    #[test]
    fn first_pass_loads_neighbourhood() {
        let mut m = inline_manager();
        pass(&mut m, 0.0, Vec3::new(0.0, 100.0, 0.0));
        // At the chunk centre every edge is 250 u away, inside the 300 u threshold.
        assert_eq!(m.ready_keys().len(), 9);
        assert_eq!(m.chunk_phase(ChunkKey::new(1, 1)), ChunkPhase::Ready);
        assert_eq!(m.chunk_phase(ChunkKey::new(2, 0)), ChunkPhase::Missing);
    }

    /// Passes closer together than the tick interval do nothing.
    #[test]
    fn streamer_is_rate_limited() {
        let mut m = inline_manager();
        pass(&mut m, 0.0, Vec3::ZERO);
        let before = m.chunk_count();
        pass(&mut m, 0.05, Vec3::new(0.0, 0.0, 2.0));
        assert_eq!(m.chunk_count(), before);
        pass(&mut m, 0.1, Vec3::new(0.0, 0.0, 4.0));
        assert!(m.chunk_count() > before, "prefetch strip ahead should be requested");
        assert_eq!(m.chunk_phase(ChunkKey::new(1, 2)), ChunkPhase::Ready);

        // A clock a hair short of the interval still gets its pass.
        let drifted = 0.2 - 1e-9;
        pass(&mut m, drifted, Vec3::new(0.0, 0.0, 6.0));
        assert_eq!(m.last_pass.map(|(t, _)| t), Some(drifted));
    }

    /// A point just inside a chunk corner still finds that chunk.
    #[test]
    fn chunk_corner_finds_its_own_chunk() {
        let mut m = inline_manager();
        pass(&mut m, 0.0, Vec3::ZERO);
        let corner = Vec3::new(249.0, 0.0, 249.0);
        assert_eq!(m.key_at(corner.x, corner.z), ChunkKey::new(0, 0));
        let keys: Vec<ChunkKey> = m.ready_chunks_near(corner, 0.0).map(|c| c.key).collect();
        assert_eq!(keys, vec![ChunkKey::new(0, 0)]);

        let near: Vec<ChunkKey> = m.ready_chunks_near(corner, 5.0).map(|c| c.key).collect();
        assert_eq!(near.len(), 4);
    }

    /// Far chunks leave Ready at once and are disposed at most two per pass.
    #[test]
    fn eviction_is_bounded_per_pass() {
        let mut m = inline_manager();
        pass(&mut m, 0.0, Vec3::ZERO);
        m.take_events();

        let far = Vec3::new(0.0, 100.0, 2500.0);
        pass(&mut m, 1.0, far);
        let center = m.key_at(far.x, far.z);
        assert!(m.ready_keys().iter().all(|k| k.manhattan(center) <= 3));
        let disposed = m
            .take_events()
            .iter()
            .filter(|e| matches!(e, SceneEvent::ChunkMeshDisposed { .. }))
            .count();
        assert_eq!(disposed, 2);

        for i in 0..10 {
            pass(&mut m, 2.0 + i as f64, far);
        }
        assert!(m.chunk_count() <= 25);
        assert_eq!(m.chunk_phase(ChunkKey::new(0, 0)), ChunkPhase::Missing);
    }

    /// Grid nodes sampled through the manager match the analytic height.
    #[test]
    fn resident_height_matches_formula_at_nodes() {
        let mut m = inline_manager();
        pass(&mut m, 0.0, Vec3::ZERO);
        let chunk = m.ready_chunk(ChunkKey::new(0, 0)).unwrap();
        let hm = Arc::clone(&chunk.heightmap);
        for (ix, iz) in [(0, 0), (10, 40), (64, 64), (33, 7)] {
            let (x, z) = hm.node_position(ix, iz);
            assert!((m.height_at(x, z) - m.field().height_at(x, z)).abs() < 1e-4);
        }
        // Not resident: analytic fallback.
        assert_eq!(m.height_at(9000.0, 9000.0), m.field().height_at(9000.0, 9000.0));
    }

    /// A response for a request the slot no longer waits on is dropped.
    #[test]
    fn stale_chunk_response_dropped() {
        let mut m = inline_manager();
        let key = ChunkKey::new(5, 5);
        assert!(m.request(key, 0.0));
        let stale = m.inline_results.pop().unwrap();
        // Timeout re-issues with a new id; the old answer must not land.
        m.resend_stale(10.0);
        m.inline_results.clear();
        m.accept(stale);
        assert_eq!(m.chunk_phase(key), ChunkPhase::Pending);
    }

    #[test]
    fn destroying_launcher_bumps_epoch_and_stops_firing() {
        let mut m = inline_manager();
        pass(&mut m, 0.0, Vec3::ZERO);
        let id = m.place_building(launcher_spec(20.0, 20.0)).unwrap();
        let epoch = m.epoch();
        let destroyed = m.damage_building(id, 500.0).expect("destroyed");
        assert_eq!(destroyed.role, Role::DefenseLauncher);
        assert!(m.epoch() > epoch);
        assert!(m.damage_building(id, 500.0).is_none());

        let mut ids = MissileIds::default();
        let mut rng = placement_rng(Some(1));
        assert!(m.launch_sam(id, 0.0, Vec3::new(0.0, 100.0, 0.0), 80.0, &mut ids).is_none());
        let fired = m.fire_launchers(0.0, Vec3::new(20.0, 60.0, 20.0), &DefenseConfig::default(), &mut ids, &mut rng);
        assert!(m.sams().all(|s| s.owner != id));
        assert!(fired.iter().all(|sam| m.sam(*sam).map(|s| s.owner) != Some(id)));
    }

    /// Evicting a chunk disposes its buildings and their SAMs.
    #[test]
    fn eviction_cascades_to_sams() {
        let mut m = inline_manager();
        pass(&mut m, 0.0, Vec3::ZERO);
        let launcher = m.place_building(launcher_spec(-30.0, 10.0)).unwrap();
        let mut ids = MissileIds::default();
        let sam = m.launch_sam(launcher, 0.0, Vec3::new(0.0, 100.0, 0.0), 80.0, &mut ids).unwrap();
        assert!(m.sam(sam).is_some());

        for i in 0..20 {
            pass(&mut m, 1.0 + i as f64, Vec3::new(0.0, 100.0, 5000.0));
        }
        assert!(m.building(launcher).is_none());
        assert!(m.sam(sam).is_none());
        assert!(m.sam_mut(sam).is_none());
    }

    #[test]
    fn threaded_worker_fills_chunks() {
        let mut m = TerrainManager::new(&world(), &DefenseConfig::default(), WorkerMode::Threaded);
        m.stream(0.0, Vec3::ZERO);
        for _ in 0..200 {
            if m.ready_keys().len() == 9 {
                break;
            }
            m.wait_for_worker(Duration::from_millis(50));
        }
        assert_eq!(m.ready_keys().len(), 9);
        assert_eq!(m.pending_count(), 0);
    }
}
