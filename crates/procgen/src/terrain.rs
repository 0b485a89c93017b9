//! Terrain heightfield and per-chunk heightmaps.
//!
//! **Seed-based determinism:** the height at a world position is a pure function of
//! the seed and `(x, z)`. A chunk heightmap is just that function sampled on the
//! chunk grid, so the analytic fallback and a resident chunk agree exactly at grid
//! nodes, regardless of chunk load order.

use crate::noise_field::ValueNoise;

/// Side length of a chunk in world units.
pub const CHUNK_SIZE: f32 = 500.0;
/// Grid cells per chunk side (so 65×65 samples).
pub const SUBDIVISIONS: usize = 64;
/// Terrain heights are clamped to `[0, MAX_TERRAIN_HEIGHT]`.
pub const MAX_TERRAIN_HEIGHT: f32 = 60.0;

/// `(amplitude, frequency, octaves)` for each layer of the height formula.
const HEIGHT_LAYERS: [(f64, f64, u32); 4] = [
    (25.0, 0.005, 4),
    (15.0, 0.015, 3),
    (8.0, 0.030, 2),
    (3.0, 0.080, 1),
];

/// Integer chunk coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkKey {
    pub cx: i32,
    pub cz: i32,
}

impl ChunkKey {
    pub const fn new(cx: i32, cz: i32) -> Self {
        Self { cx, cz }
    }

    /// Map a world-space X or Z coordinate to the chunk index that contains it.
    /// Chunks are CENTERED at (cx * chunk_size), spanning [cx*cs - cs/2, cx*cs + cs/2],
    /// so we offset by half a chunk before flooring.
    pub fn axis_index(coord: f32, chunk_size: f32) -> i32 {
        (coord / chunk_size + 0.5).floor() as i32
    }

    /// The chunk whose region contains world `(x, z)`.
    pub fn from_world(x: f32, z: f32, chunk_size: f32) -> Self {
        Self::new(Self::axis_index(x, chunk_size), Self::axis_index(z, chunk_size))
    }

    /// World-space centre of the chunk.
    pub fn center(&self, chunk_size: f32) -> (f32, f32) {
        (self.cx as f32 * chunk_size, self.cz as f32 * chunk_size)
    }

    /// Manhattan distance in chunk space.
    pub fn manhattan(&self, other: ChunkKey) -> i32 {
        (self.cx - other.cx).abs() + (self.cz - other.cz).abs()
    }

    pub fn offset(&self, dx: i32, dz: i32) -> Self {
        Self::new(self.cx + dx, self.cz + dz)
    }
}

/// The terrain height function, seeded.
#[derive(Debug, Clone, Copy)]
pub struct HeightField {
    noise: ValueNoise,
}

impl HeightField {
    pub fn new(seed: u32) -> Self {
        Self {
            noise: ValueNoise::new(seed),
        }
    }

    pub fn seed(&self) -> u32 {
        self.noise.seed()
    }

    /// Analytic terrain height at world `(x, z)`.
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        let (x, z) = (x as f64, z as f64);
        let sum: f64 = HEIGHT_LAYERS
            .iter()
            .map(|&(amplitude, frequency, octaves)| {
                amplitude * self.noise.fractal(frequency * x, frequency * z, octaves)
            })
            .sum();
        (sum as f32).clamp(0.0, MAX_TERRAIN_HEIGHT)
    }

    /// Sample the height function on a chunk's grid.
    pub fn generate_heightmap(&self, key: ChunkKey, chunk_size: f32, subdivisions: usize) -> Heightmap {
        let subdivisions = subdivisions.max(1);
        let grid = subdivisions + 1;
        let mut heights = Vec::with_capacity(grid * grid);
        let mut map = Heightmap {
            key,
            chunk_size,
            subdivisions,
            heights: Vec::new(),
        };
        for iz in 0..grid {
            for ix in 0..grid {
                let (x, z) = map.node_position(ix, iz);
                heights.push(self.height_at(x, z));
            }
        }
        map.heights = heights;
        map
    }
}

/// A chunk's heights on a `(subdivisions+1)²` grid, row-major with Z as the
/// major axis: `h[iz * (subdivisions + 1) + ix]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Heightmap {
    pub key: ChunkKey,
    pub chunk_size: f32,
    pub subdivisions: usize,
    pub heights: Vec<f32>,
}

impl Heightmap {
    /// Samples per side.
    pub fn grid(&self) -> usize {
        self.subdivisions + 1
    }

    /// Distance between neighbouring samples.
    pub fn step(&self) -> f32 {
        self.chunk_size / self.subdivisions as f32
    }

    /// World `(x, z)` of grid node `(ix, iz)`.
    pub fn node_position(&self, ix: usize, iz: usize) -> (f32, f32) {
        let (ox, oz) = self.key.center(self.chunk_size);
        let half = self.chunk_size * 0.5;
        let step = self.step();
        (ox - half + ix as f32 * step, oz - half + iz as f32 * step)
    }

    /// Stored height at a grid node.
    pub fn node(&self, ix: usize, iz: usize) -> f32 {
        self.heights[iz * self.grid() + ix]
    }

    /// Check if a world position is within this chunk's bounds.
    pub fn contains(&self, x: f32, z: f32) -> bool {
        let (ox, oz) = self.key.center(self.chunk_size);
        let half = self.chunk_size * 0.5;
        x >= ox - half && x <= ox + half && z >= oz - half && z <= oz + half
    }

    /// Bilinear height at world `(x, z)`. Positions outside the chunk clamp to its edge.
    pub fn sample(&self, x: f32, z: f32) -> f32 {
        let grid = self.grid();
        let (ox, oz) = self.key.center(self.chunk_size);
        let half = self.chunk_size * 0.5;
        let step = self.step();

        let gx = ((x - ox + half) / step).clamp(0.0, self.subdivisions as f32);
        let gz = ((z - oz + half) / step).clamp(0.0, self.subdivisions as f32);

        let x0 = (gx.floor() as usize).min(self.subdivisions - 1);
        let z0 = (gz.floor() as usize).min(self.subdivisions - 1);
        let fx = gx - x0 as f32;
        let fz = gz - z0 as f32;

        let h00 = self.heights[z0 * grid + x0];
        let h10 = self.heights[z0 * grid + x0 + 1];
        let h01 = self.heights[(z0 + 1) * grid + x0];
        let h11 = self.heights[(z0 + 1) * grid + x0 + 1];

        let top = h00 + (h10 - h00) * fx;
        let bottom = h01 + (h11 - h01) * fx;
        top + (bottom - top) * fz
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Same seed must produce bitwise-identical heightmaps (replayability).
    #[test]
    fn heightmap_deterministic_same_seed() {
        let a = HeightField::new(98765).generate_heightmap(ChunkKey::new(3, -2), CHUNK_SIZE, SUBDIVISIONS);
        let b = HeightField::new(98765).generate_heightmap(ChunkKey::new(3, -2), CHUNK_SIZE, SUBDIVISIONS);
        assert_eq!(a.heights.len(), (SUBDIVISIONS + 1) * (SUBDIVISIONS + 1));
        for (i, (&ha, &hb)) in a.heights.iter().zip(b.heights.iter()).enumerate() {
            assert_eq!(ha.to_bits(), hb.to_bits(), "heightmap[{}] should match for same seed", i);
        }
    }

    #[test]
    fn different_seed_different_heights() {
        let a = HeightField::new(11111).generate_heightmap(ChunkKey::new(0, 0), CHUNK_SIZE, SUBDIVISIONS);
        let b = HeightField::new(22222).generate_heightmap(ChunkKey::new(0, 0), CHUNK_SIZE, SUBDIVISIONS);
        assert_ne!(a.heights, b.heights);
    }

    /// Sampling at a grid node returns the analytic height with no interpolation error.
    #[test]
    fn nodes_match_analytic_height() {
        let field = HeightField::new(1337);
        for key in [ChunkKey::new(0, 0), ChunkKey::new(-1, 2), ChunkKey::new(5, -7)] {
            let map = field.generate_heightmap(key, CHUNK_SIZE, SUBDIVISIONS);
            for iz in (0..map.grid()).step_by(4) {
                for ix in (0..map.grid()).step_by(4) {
                    let (x, z) = map.node_position(ix, iz);
                    let analytic = field.height_at(x, z);
                    assert!((map.sample(x, z) - analytic).abs() < 1e-4, "{:?} node ({}, {})", key, ix, iz);
                    assert_eq!(map.node(ix, iz), analytic);
                }
            }
        }
    }

    /// Neighbouring chunks share their border samples.
    #[test]
    fn shared_edges_agree() {
        let field = HeightField::new(5);
        let a = field.generate_heightmap(ChunkKey::new(0, 0), CHUNK_SIZE, SUBDIVISIONS);
        let b = field.generate_heightmap(ChunkKey::new(1, 0), CHUNK_SIZE, SUBDIVISIONS);
        for iz in 0..a.grid() {
            assert_eq!(a.node(SUBDIVISIONS, iz), b.node(0, iz));
        }
    }

    #[test]
    fn heights_are_clamped() {
        let field = HeightField::new(77);
        for i in 0..400 {
            let h = field.height_at(i as f32 * 37.1 - 5000.0, i as f32 * -11.3 + 900.0);
            assert!((0.0..=MAX_TERRAIN_HEIGHT).contains(&h));
        }
    }

    #[test]
    fn world_to_chunk_is_centered() {
        assert_eq!(ChunkKey::from_world(0.0, 0.0, CHUNK_SIZE), ChunkKey::new(0, 0));
        assert_eq!(ChunkKey::from_world(249.0, -249.0, CHUNK_SIZE), ChunkKey::new(0, 0));
        assert_eq!(ChunkKey::from_world(251.0, -251.0, CHUNK_SIZE), ChunkKey::new(1, -1));
        assert_eq!(ChunkKey::new(1, -1).manhattan(ChunkKey::new(-1, 1)), 4);
    }

    /// Bilinear sampling between nodes stays within the range of the cell's corners.
    #[test]
    fn interpolation_is_bounded() {
        let field = HeightField::new(3);
        let map = field.generate_heightmap(ChunkKey::new(0, 0), CHUNK_SIZE, SUBDIVISIONS);
        let (x, z) = map.node_position(10, 20);
        let step = map.step();
        let corners = [map.node(10, 20), map.node(11, 20), map.node(10, 21), map.node(11, 21)];
        let lo = corners.iter().copied().fold(f32::MAX, f32::min);
        let hi = corners.iter().copied().fold(f32::MIN, f32::max);
        let h = map.sample(x + step * 0.3, z + step * 0.6);
        assert!(h >= lo - 1e-4 && h <= hi + 1e-4);
    }
}
