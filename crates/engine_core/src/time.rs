//! Time management for the simulation loop.
//!
//! The simulation runs on its own clock: every tick advances it by the real
//! elapsed time, clamped so a long frame (window drag, debugger pause) cannot
//! blow up the integrators. Everything downstream reads `now()` from here, never
//! from the wall clock, so scripted runs and tests are reproducible.

use std::time::Instant;

/// Default upper bound for a single tick's delta (seconds).
pub const DEFAULT_MAX_DELTA: f32 = 0.1;

/// Manages simulation timing and delta time calculation.
#[derive(Debug)]
pub struct Time {
    /// Wall-clock instant of the last `update()` call.
    last_frame: Instant,
    /// Clamped delta of the last tick, in seconds.
    delta: f32,
    /// Simulation seconds elapsed since start.
    elapsed: f64,
    /// Tick count since start.
    frame_count: u64,
    /// Largest delta a single tick may consume.
    max_delta: f32,
}

impl Default for Time {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DELTA)
    }
}

impl Time {
    /// Create a new clock at t = 0.
    pub fn new(max_delta: f32) -> Self {
        Self {
            last_frame: Instant::now(),
            delta: 0.0,
            elapsed: 0.0,
            frame_count: 0,
            max_delta: max_delta.max(f32::EPSILON),
        }
    }

    /// Advance from the wall clock. Returns the clamped delta.
    pub fn update(&mut self) -> f32 {
        let now = Instant::now();
        let raw = now - self.last_frame;
        self.last_frame = now;
        self.advance(raw.as_secs_f32())
    }

    /// Advance by an explicit amount (scripted runs, tests). Returns the clamped delta.
    ///
    /// Negative or non-finite inputs count as zero.
    pub fn advance(&mut self, raw_delta: f32) -> f32 {
        let dt = if raw_delta.is_finite() { raw_delta.clamp(0.0, self.max_delta) } else { 0.0 };
        if raw_delta > self.max_delta {
            log::debug!("Clamped tick delta {:.3}s to {:.3}s", raw_delta, self.max_delta);
        }
        self.delta = dt;
        self.elapsed += dt as f64;
        self.frame_count += 1;
        dt
    }

    /// Clamped delta of the last tick in seconds.
    pub fn delta_seconds(&self) -> f32 {
        self.delta
    }

    /// Simulation time in seconds.
    pub fn now(&self) -> f64 {
        self.elapsed
    }

    /// Get the current tick count.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A frame hitch must not feed a huge step into the integrators.
    #[test]
    fn advance_clamps_long_frames() {
        let mut time = Time::new(0.1);
        assert_eq!(time.advance(2.5), 0.1);
        assert!((time.now() - 0.1).abs() < 1e-9);
        assert_eq!(time.frame_count(), 1);
    }

    #[test]
    fn advance_ignores_garbage() {
        let mut time = Time::new(0.1);
        assert_eq!(time.advance(-1.0), 0.0);
        assert_eq!(time.advance(f32::NAN), 0.0);
        assert_eq!(time.now(), 0.0);
    }

    #[test]
    fn update_reads_wall_clock_and_clamps() {
        let mut time = Time::new(0.02);
        std::thread::sleep(std::time::Duration::from_millis(30));
        let dt = time.update();
        assert_eq!(dt, 0.02);
        assert_eq!(time.delta_seconds(), dt);
        let dt = time.update();
        assert!(dt >= 0.0 && dt <= 0.02);
        assert_eq!(time.frame_count(), 2);
    }
}
