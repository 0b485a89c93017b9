//! Procedural generation for the streamed world: value noise, heightfields, and
//! building placement.
//!
//! Everything here is a pure function of its inputs (plus an explicit RNG for
//! buildings) so it can run on a worker thread without touching simulation state.

pub mod buildings;
pub mod noise_field;
pub mod terrain;

pub use buildings::*;
pub use noise_field::*;
pub use terrain::*;
