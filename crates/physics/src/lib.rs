//! Missile physics for the bomber simulation.
//!
//! The integrator is a pure function of a [`MissileStepRequest`]; the
//! [`MissileWorker`] runs it on a background thread so the simulation thread
//! never integrates missiles itself unless it chooses the inline fallback.

pub mod integrator;
pub mod protocol;
pub mod worker;

pub use integrator::*;
pub use protocol::*;
pub use worker::*;
