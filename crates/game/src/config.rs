//! Simulation configuration. Every constant and tuning value lives here and is
//! handed to `Simulation::new`; nothing reads process-wide state.
//!
//! Loaded from a RON file (`sim.ron` by default). Missing fields take their defaults.

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::path::Path;

use crate::error::ConfigError;

/// Where a worker's job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WorkerMode {
    /// Background thread, results polled each tick.
    #[default]
    Threaded,
    /// Same pure function on the simulation thread (fallback path; deterministic tests).
    Inline,
}

/// Top-level simulation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub world: WorldConfig,
    pub flight: FlightConfig,
    pub cruise: CruiseConfig,
    pub defense: DefenseConfig,
    pub bombs: BombConfig,
    pub workers: WorkerConfig,
    pub timing: TimingConfig,
}

/// Terrain, streaming, and spatial-query settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Heightfield seed.
    pub seed: u32,
    /// Seed for building placement. `None` draws from entropy so each run's cities differ.
    pub building_seed: Option<u64>,
    pub chunk_size: f32,
    pub subdivisions: usize,
    /// Render-side view distance, carried on every `FrameSnapshot`.
    pub view_distance: f32,
    /// Cap on Ready + Pending chunks.
    pub max_chunks: usize,
    /// Ready chunks farther than this (Manhattan, chunk space) are evicted.
    pub evict_manhattan: i32,
    /// Distance to a chunk edge that triggers 3×3 generation.
    pub generation_threshold: f32,
    /// Seconds between streamer passes.
    pub chunk_tick_interval: f32,
    /// Evictions per streamer pass.
    pub max_chunks_to_process_per_frame: usize,
    /// Seconds before a Pending chunk's request is re-sent.
    pub chunk_request_timeout: f32,
    pub building_max_health: f32,
    /// Radius-query cache lifetime.
    pub query_cache_time: f32,
    /// Radius-query cache cell size.
    pub query_cell: f32,
    /// Radius around the bomber scanned for the tallest building (altitude floor).
    pub floor_probe_radius: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: 1337,
            building_seed: None,
            chunk_size: procgen::CHUNK_SIZE,
            subdivisions: procgen::SUBDIVISIONS,
            view_distance: 800.0,
            max_chunks: 25,
            evict_manhattan: 3,
            generation_threshold: 300.0,
            chunk_tick_interval: 0.1,
            max_chunks_to_process_per_frame: 2,
            chunk_request_timeout: 2.0,
            building_max_health: 100.0,
            query_cache_time: 1.0,
            query_cell: 50.0,
            floor_probe_radius: 100.0,
        }
    }
}

/// Bomber flight model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightConfig {
    pub speed: f32,
    pub climb_rate: f32,
    /// Yaw rate while a turn key is held (rad/s).
    pub turn_rate: f32,
    pub altitude_min: f32,
    pub altitude_max: f32,
    pub spawn_altitude: f32,
    /// Bank while turning.
    pub bank_max: f32,
    /// Bank while only climbing or diving.
    pub climb_bank_max: f32,
    pub bank_speed: f32,
    /// Clearance kept above `set_minimum_altitude`'s floor.
    pub floor_margin: f32,
    /// Yaw change that invalidates the cached sin/cos.
    pub trig_cache_epsilon: f32,
    pub max_health: f32,
    /// Camera rig pitch rate while Shift+Up/Down is held (rad/s).
    pub camera_pitch_rate: f32,
}

impl Default for FlightConfig {
    fn default() -> Self {
        Self {
            speed: 25.0,
            climb_rate: 20.0,
            turn_rate: 0.5,
            altitude_min: 30.0,
            altitude_max: 300.0,
            spawn_altitude: 100.0,
            bank_max: PI / 6.0,
            climb_bank_max: PI / 12.0,
            bank_speed: 2.5,
            floor_margin: 10.0,
            trig_cache_epsilon: 0.01,
            max_health: 100.0,
            camera_pitch_rate: 1.0,
        }
    }
}

/// Player cruise missile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CruiseConfig {
    pub speed: f32,
    pub turn_rate: f32,
    pub path_speed: f32,
    pub lock_range: f32,
    pub lock_time: f32,
    pub flare_detection_range: f32,
    pub max_life: f32,
    /// Unpowered drop before the motor lights.
    pub ignition_delay: f32,
    pub cooldown: f32,
    /// Acquisition range for defense launchers.
    pub defense_range: f32,
    /// Bomber within this distance of a detonation takes damage.
    pub aoe_radius: f32,
    /// Buildings within this distance of a detonation are destroyed.
    pub blast_radius: f32,
    pub blast_damage: f32,
    pub target_cache_time: f32,
    pub target_cache_move: f32,
    /// Hardpoint offset from the bomber centre (x is mirrored left/right).
    pub hardpoint: [f32; 3],
}

impl Default for CruiseConfig {
    fn default() -> Self {
        Self {
            speed: 60.0,
            turn_rate: 2.0,
            path_speed: 0.4,
            lock_range: 400.0,
            lock_time: 1.0,
            flare_detection_range: 50.0,
            max_life: 30.0,
            ignition_delay: 0.5,
            cooldown: 10.0,
            defense_range: 300.0,
            aoe_radius: 25.0,
            blast_radius: 20.0,
            blast_damage: 150.0,
            target_cache_time: 0.5,
            target_cache_move: 50.0,
            hardpoint: [3.0, -1.5, 0.5],
        }
    }
}

/// Ground-based SAM launchers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefenseConfig {
    pub missile_speed: f32,
    pub launch_interval: f32,
    pub radar_scan_range: f32,
    pub max_life: f32,
    /// Per-axis uniform aim error at launch.
    pub inaccuracy: f32,
}

impl Default for DefenseConfig {
    fn default() -> Self {
        Self {
            missile_speed: 80.0,
            launch_interval: 8.0,
            radar_scan_range: 300.0,
            max_life: 10.0,
            inaccuracy: 10.0,
        }
    }
}

/// Bombs, bomb bay, and flares.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BombConfig {
    pub cooldown: f32,
    pub bay_open_time: f32,
    pub bay_close_delay: f32,
    pub blast_radius: f32,
    pub damage: f32,
    pub gravity: f32,
    pub flare_lifetime: f32,
    pub flare_cooldown: f32,
    pub flare_fall_speed: f32,
}

impl Default for BombConfig {
    fn default() -> Self {
        Self {
            cooldown: 2.0,
            bay_open_time: 0.5,
            bay_close_delay: 1.0,
            blast_radius: 30.0,
            damage: 120.0,
            gravity: 9.81,
            flare_lifetime: 4.0,
            flare_cooldown: 1.0,
            flare_fall_speed: 3.0,
        }
    }
}

/// Worker placement and recovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub terrain: WorkerMode,
    pub physics: WorkerMode,
    /// Seconds before an unanswered missile step is re-submitted.
    pub missile_request_timeout: f32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            terrain: WorkerMode::Threaded,
            physics: WorkerMode::Threaded,
            missile_request_timeout: 0.25,
        }
    }
}

/// Loop timing and effect lingering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Upper bound on a tick's delta.
    pub max_dt: f32,
    /// Seconds an explosion lingers before the missile's render resources go.
    pub explosion_linger: f32,
    /// Radar display radius.
    pub radar_range: f32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            max_dt: 0.1,
            explosion_linger: 2.0,
            radar_range: 800.0,
        }
    }
}

impl SimConfig {
    /// Both workers inline: fully deterministic scheduling.
    pub fn inline() -> Self {
        let mut config = Self::default();
        config.workers.terrain = WorkerMode::Inline;
        config.workers.physics = WorkerMode::Inline;
        config
    }

    /// Parse and validate a RON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = ron::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the generators and integrators cannot work with
    /// (non-finite numbers, empty ranges, non-positive sizes).
    pub fn validate(&self) -> Result<(), ConfigError> {
        let w = &self.world;
        positive("world.chunk_size", w.chunk_size)?;
        positive("world.query_cell", w.query_cell)?;
        positive("world.building_max_health", w.building_max_health)?;
        non_negative("world.view_distance", w.view_distance)?;
        non_negative("world.generation_threshold", w.generation_threshold)?;
        non_negative("world.chunk_tick_interval", w.chunk_tick_interval)?;
        non_negative("world.chunk_request_timeout", w.chunk_request_timeout)?;
        non_negative("world.query_cache_time", w.query_cache_time)?;
        non_negative("world.floor_probe_radius", w.floor_probe_radius)?;
        at_least("world.subdivisions", w.subdivisions as f64, 1.0)?;
        at_least("world.max_chunks", w.max_chunks as f64, 1.0)?;
        at_least("world.evict_manhattan", w.evict_manhattan as f64, 1.0)?;

        let f = &self.flight;
        non_negative("flight.speed", f.speed)?;
        non_negative("flight.climb_rate", f.climb_rate)?;
        non_negative("flight.turn_rate", f.turn_rate)?;
        non_negative("flight.altitude_min", f.altitude_min)?;
        at_least("flight.altitude_max", f.altitude_max as f64, f.altitude_min as f64)?;
        non_negative("flight.bank_max", f.bank_max)?;
        non_negative("flight.climb_bank_max", f.climb_bank_max)?;
        non_negative("flight.bank_speed", f.bank_speed)?;
        non_negative("flight.floor_margin", f.floor_margin)?;
        positive("flight.max_health", f.max_health)?;
        finite("flight.spawn_altitude", f.spawn_altitude)?;

        let c = &self.cruise;
        positive("cruise.speed", c.speed)?;
        non_negative("cruise.turn_rate", c.turn_rate)?;
        non_negative("cruise.path_speed", c.path_speed)?;
        positive("cruise.max_life", c.max_life)?;
        non_negative("cruise.ignition_delay", c.ignition_delay)?;
        non_negative("cruise.cooldown", c.cooldown)?;
        non_negative("cruise.lock_range", c.lock_range)?;
        non_negative("cruise.lock_time", c.lock_time)?;
        non_negative("cruise.flare_detection_range", c.flare_detection_range)?;
        non_negative("cruise.defense_range", c.defense_range)?;
        non_negative("cruise.aoe_radius", c.aoe_radius)?;
        non_negative("cruise.blast_radius", c.blast_radius)?;
        non_negative("cruise.blast_damage", c.blast_damage)?;
        for v in c.hardpoint {
            finite("cruise.hardpoint", v)?;
        }

        let d = &self.defense;
        positive("defense.missile_speed", d.missile_speed)?;
        non_negative("defense.launch_interval", d.launch_interval)?;
        non_negative("defense.radar_scan_range", d.radar_scan_range)?;
        positive("defense.max_life", d.max_life)?;
        non_negative("defense.inaccuracy", d.inaccuracy)?;

        let b = &self.bombs;
        non_negative("bombs.cooldown", b.cooldown)?;
        non_negative("bombs.bay_open_time", b.bay_open_time)?;
        non_negative("bombs.bay_close_delay", b.bay_close_delay)?;
        non_negative("bombs.blast_radius", b.blast_radius)?;
        non_negative("bombs.damage", b.damage)?;
        non_negative("bombs.gravity", b.gravity)?;
        non_negative("bombs.flare_lifetime", b.flare_lifetime)?;
        non_negative("bombs.flare_cooldown", b.flare_cooldown)?;
        non_negative("bombs.flare_fall_speed", b.flare_fall_speed)?;

        positive("workers.missile_request_timeout", self.workers.missile_request_timeout)?;

        let t = &self.timing;
        positive("timing.max_dt", t.max_dt)?;
        non_negative("timing.explosion_linger", t.explosion_linger)?;
        non_negative("timing.radar_range", t.radar_range)?;
        Ok(())
    }

    /// Load config; a missing or invalid file yields defaults.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            log::info!("No config at {:?}, using defaults", path);
            return Self::default();
        }
        match Self::load(path) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("{}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save current config as pretty RON.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let s = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|source| ConfigError::Serialize { source })?;
        std::fs::write(path, s).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn finite(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value: value as f64,
            rule: "must be finite",
        })
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    finite(field, value)?;
    at_least(field, value as f64, 0.0)
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    finite(field, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value: value as f64,
            rule: "must be greater than zero",
        })
    }
}

fn at_least(field: &'static str, value: f64, min: f64) -> Result<(), ConfigError> {
    if value >= min {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            rule: "is below its minimum",
        })
    }
}
