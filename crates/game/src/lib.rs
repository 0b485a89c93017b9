//! Stealth-bomber combat simulation core.
//!
//! The crate is headless: rendering, input devices and the HUD are reached
//! only through the capability traits in [`sink`] and [`input::InputSource`].
//! [`Simulation`] owns every subsystem and advances them in a fixed order each tick.

pub mod bomber;
pub mod bombs;
pub mod building;
pub mod camera;
pub mod config;
pub mod cruise;
pub mod defense;
pub mod deferred;
pub mod error;
pub mod flares;
pub mod hud;
pub mod missiles;
pub mod simulation;
pub mod sink;
pub mod spatial;
pub mod terrain;
pub mod terrain_worker;

pub use bomber::{Bomber, FlightControls};
pub use building::{Building, BuildingId};
pub use camera::{CameraMode, CameraRig};
pub use config::{SimConfig, WorkerMode};
pub use error::{BombError, ConfigError, LaunchError};
pub use hud::{MarkerKind, RadarModel};
pub use simulation::{Simulation, SortieStats};
pub use sink::{FrameSnapshot, HudSink, LogSink, RecordingSink, SceneEvent, SceneSink};
pub use terrain::{ChunkPhase, TerrainManager};
