//! Small value components shared by the simulation systems.

/// Health for damageable bodies (bomber, buildings).
///
/// Accumulated damage saturates at `max`; once `current` reaches zero it stays there.
#[derive(Debug, Clone, Copy)]
pub struct Health {
    pub current: f32,
    pub max: f32,
}

impl Health {
    pub fn new(max: f32) -> Self {
        Self { current: max, max }
    }

    /// Apply damage. Negative or non-finite amounts are ignored.
    pub fn take_damage(&mut self, amount: f32) {
        if amount.is_finite() && amount > 0.0 {
            self.current = (self.current - amount).max(0.0);
        }
    }

    /// Total damage taken so far, in `[0, max]`.
    pub fn damage_taken(&self) -> f32 {
        self.max - self.current
    }

    pub fn is_dead(&self) -> bool {
        self.current <= 0.0
    }

    pub fn percentage(&self) -> f32 {
        if self.max > 0.0 {
            self.current / self.max
        } else {
            0.0
        }
    }
}

impl Default for Health {
    fn default() -> Self {
        Self::new(100.0)
    }
}

/// Deadline-based cooldown on the simulation clock.
#[derive(Debug, Clone, Copy)]
pub struct Cooldown {
    pub duration: f64,
    ready_at: f64,
}

impl Cooldown {
    /// A cooldown that is ready immediately.
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            ready_at: f64::NEG_INFINITY,
        }
    }

    pub fn is_ready(&self, now: f64) -> bool {
        now >= self.ready_at
    }

    /// Start the cooldown at `now`.
    pub fn trigger(&mut self, now: f64) {
        self.ready_at = now + self.duration;
    }

    /// Seconds until ready (0 when ready).
    pub fn remaining(&self, now: f64) -> f64 {
        (self.ready_at - now).max(0.0)
    }

    /// Readiness in `[0, 1]`: 1 when ready, 0 right after triggering.
    pub fn fraction_ready(&self, now: f64) -> f32 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        (1.0 - self.remaining(now) / self.duration).clamp(0.0, 1.0) as f32
    }
}

/// Countdown for temporary things (flares, lingering effects).
#[derive(Debug, Clone, Copy)]
pub struct Lifetime {
    pub remaining: f32,
}

impl Lifetime {
    pub fn new(seconds: f32) -> Self {
        Self { remaining: seconds }
    }

    /// Tick down; returns true once expired.
    pub fn update(&mut self, dt: f32) -> bool {
        self.remaining -= dt;
        self.remaining <= 0.0
    }
}

/// Opaque handle to a render-side resource. The core never looks inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshHandle(pub u64);
