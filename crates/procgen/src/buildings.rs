//! Per-chunk building placement.
//!
//! Slot count scales with chunk area, each slot lands somewhere in the inner 80%
//! of the chunk, and slots on steep ground are rejected. Unlike the heightfield,
//! placement draws from a caller-supplied RNG, so each run's cities differ.

use glam::Vec3;
use rand::Rng;

use crate::terrain::{ChunkKey, HeightField, Heightmap};

/// Candidate slots per unit of chunk area.
const SLOT_DENSITY: f32 = 5e-5;
/// Fraction of the chunk side that buildings may occupy (centred).
const INNER_FRACTION: f32 = 0.8;
/// Offset used when probing the 4-neighbourhood for slope.
const SLOPE_PROBE: f32 = 5.0;
/// Largest height difference to a probe point that still counts as buildable.
const MAX_SLOPE_DELTA: f32 = 8.0;
/// Chance a building is a designated target.
const TARGET_CHANCE: f32 = 0.10;
/// Chance a non-target building hosts a defense launcher.
const LAUNCHER_CHANCE: f32 = 0.15;

/// Building archetype; each has its own size distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Archetype {
    Residential,
    Commercial,
    Industrial,
    Skyscraper,
}

impl Archetype {
    pub const ALL: [Archetype; 4] = [
        Archetype::Residential,
        Archetype::Commercial,
        Archetype::Industrial,
        Archetype::Skyscraper,
    ];

    /// `(width, height, depth)` ranges.
    fn dimension_ranges(self) -> [(f32, f32); 3] {
        match self {
            Archetype::Residential => [(8.0, 14.0), (6.0, 15.0), (8.0, 14.0)],
            Archetype::Commercial => [(15.0, 25.0), (12.0, 30.0), (15.0, 25.0)],
            Archetype::Industrial => [(20.0, 40.0), (8.0, 18.0), (20.0, 35.0)],
            Archetype::Skyscraper => [(12.0, 20.0), (40.0, 90.0), (12.0, 20.0)],
        }
    }
}

/// What a building means to the game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Role {
    #[default]
    Plain,
    /// Marked for the player to destroy.
    Target,
    /// Fires SAMs at the bomber.
    DefenseLauncher,
}

/// Immutable configuration of a generated building.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuildingSpec {
    /// Footprint centre on the terrain surface.
    pub position: Vec3,
    pub width: f32,
    pub depth: f32,
    pub height: f32,
    pub archetype: Archetype,
    pub role: Role,
}

impl BuildingSpec {
    /// Centre of the building volume.
    pub fn center(&self) -> Vec3 {
        self.position + Vec3::Y * (self.height * 0.5)
    }

    /// Centre of the roof.
    pub fn roof(&self) -> Vec3 {
        self.position + Vec3::Y * self.height
    }

    /// Whether a horizontal point is inside the footprint.
    pub fn footprint_contains(&self, x: f32, z: f32) -> bool {
        (x - self.position.x).abs() <= self.width * 0.5 && (z - self.position.z).abs() <= self.depth * 0.5
    }
}

/// Pick a role: targets first, then launchers among the rest.
pub fn roll_role<R: Rng + ?Sized>(rng: &mut R) -> Role {
    if rng.gen::<f32>() < TARGET_CHANCE {
        Role::Target
    } else if rng.gen::<f32>() < LAUNCHER_CHANCE {
        Role::DefenseLauncher
    } else {
        Role::Plain
    }
}

/// Local slope at `(x, z)`: the largest |Δh| to the four probes at ±5 u.
pub fn local_slope(heightmap: &Heightmap, x: f32, z: f32) -> f32 {
    let h = heightmap.sample(x, z);
    [
        (SLOPE_PROBE, 0.0),
        (-SLOPE_PROBE, 0.0),
        (0.0, SLOPE_PROBE),
        (0.0, -SLOPE_PROBE),
    ]
    .iter()
    .map(|&(dx, dz)| (heightmap.sample(x + dx, z + dz) - h).abs())
    .fold(0.0, f32::max)
}

/// Place buildings on a chunk.
pub fn generate_buildings<R: Rng + ?Sized>(heightmap: &Heightmap, rng: &mut R) -> Vec<BuildingSpec> {
    let size = heightmap.chunk_size;
    let area = size * size;
    let slots = (area * SLOT_DENSITY * (0.5 + rng.gen::<f32>() * 0.8)).floor() as usize;
    let (ox, oz) = heightmap.key.center(size);
    let half_inner = size * INNER_FRACTION * 0.5;

    let mut buildings = Vec::with_capacity(slots);
    for _ in 0..slots {
        let x = ox + rng.gen_range(-half_inner..=half_inner);
        let z = oz + rng.gen_range(-half_inner..=half_inner);
        if local_slope(heightmap, x, z) > MAX_SLOPE_DELTA {
            continue;
        }

        let archetype = Archetype::ALL[rng.gen_range(0..Archetype::ALL.len())];
        let [w, h, d] = archetype.dimension_ranges();
        let width = rng.gen_range(w.0..=w.1);
        let height = rng.gen_range(h.0..=h.1);
        let depth = rng.gen_range(d.0..=d.1);

        buildings.push(BuildingSpec {
            position: Vec3::new(x, heightmap.sample(x, z), z),
            width,
            depth,
            height,
            archetype,
            role: roll_role(rng),
        });
    }
    log::trace!(
        "Chunk ({}, {}): {} of {} building slots accepted",
        heightmap.key.cx,
        heightmap.key.cz,
        buildings.len(),
        slots
    );
    buildings
}

/// Everything a chunk needs, produced off the simulation thread.
#[derive(Debug, Clone)]
pub struct GeneratedChunk {
    pub heightmap: Heightmap,
    pub buildings: Vec<BuildingSpec>,
}

/// Generate heightmap and buildings for one chunk.
pub fn generate_chunk<R: Rng + ?Sized>(
    field: &HeightField,
    key: ChunkKey,
    chunk_size: f32,
    subdivisions: usize,
    rng: &mut R,
) -> GeneratedChunk {
    let heightmap = field.generate_heightmap(key, chunk_size, subdivisions);
    let buildings = generate_buildings(&heightmap, rng);
    GeneratedChunk { heightmap, buildings }
}
