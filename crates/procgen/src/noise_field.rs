//! Seeded value noise on an integer lattice with cosine interpolation.
//!
//! Lattice values come from a sine hash of the corner coordinates and the seed,
//! so the field is a pure function of `(seed, x, y)` with no permutation tables
//! to build. `ValueNoise` plugs into the `noise` crate through `NoiseFn`.

use noise::NoiseFn;
use std::f64::consts::PI;

/// Deterministic 2D value-noise field with output in `[0, 1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueNoise {
    seed: u32,
    /// Phase added inside the hash; derived from the seed.
    phase: f64,
}

impl ValueNoise {
    pub fn new(seed: u32) -> Self {
        // Fold the seed into a bounded phase so large seeds keep sin() precise.
        let phase = (seed as f64 * 0.618_033_988_75).fract() * 1000.0 + (seed % 1024) as f64;
        Self { seed, phase }
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Pseudorandom value in `[0, 1)` at an integer lattice point.
    #[inline]
    fn lattice(&self, ix: f64, iy: f64) -> f64 {
        let s = (ix * 12.9898 + iy * 78.233 + self.phase).sin() * 43_758.545_3;
        s - s.floor()
    }

    /// Single-octave sample.
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        let x0 = x.floor();
        let y0 = y.floor();
        let tx = cosine_ease(x - x0);
        let ty = cosine_ease(y - y0);

        let v00 = self.lattice(x0, y0);
        let v10 = self.lattice(x0 + 1.0, y0);
        let v01 = self.lattice(x0, y0 + 1.0);
        let v11 = self.lattice(x0 + 1.0, y0 + 1.0);

        let top = lerp(v00, v10, tx);
        let bottom = lerp(v01, v11, tx);
        lerp(top, bottom, ty)
    }

    /// Fractal sum of `octaves` octaves: octave `i` has amplitude 2⁻ⁱ and
    /// frequency 2ⁱ. Normalised by the total amplitude so the result stays in `[0, 1]`.
    pub fn fractal(&self, x: f64, y: f64, octaves: u32) -> f64 {
        let mut value = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut total = 0.0;

        for _ in 0..octaves.max(1) {
            value += self.sample(x * frequency, y * frequency) * amplitude;
            total += amplitude;
            amplitude *= 0.5;
            frequency *= 2.0;
        }

        (value / total).clamp(0.0, 1.0)
    }
}

impl NoiseFn<f64, 2> for ValueNoise {
    fn get(&self, point: [f64; 2]) -> f64 {
        self.sample(point[0], point[1])
    }
}

#[inline]
fn cosine_ease(t: f64) -> f64 {
    (1.0 - (t * PI).cos()) * 0.5
}

#[inline]
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a * (1.0 - t) + b * t
}
