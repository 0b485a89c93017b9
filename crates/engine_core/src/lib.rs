//! Core engine types and utilities for the bomber simulation.
//!
//! This crate provides the foundational types used across all simulation systems:
//! - Pose (position + yaw/pitch/roll) and orientation helpers
//! - Simulation clock with clamped delta time
//! - Small value components (health, cooldowns, lifetimes, opaque mesh handles)

pub mod components;
pub mod time;
pub mod transform;

pub use components::*;
pub use time::*;
pub use transform::*;

// Re-export commonly used types
pub use glam::{Quat, Vec2, Vec3};
