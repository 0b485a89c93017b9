//! Capability interfaces toward the outside world: the scene (rendering side)
//! and the HUD. The simulation only ever talks to these traits.

use std::sync::Arc;

use engine_core::{MeshHandle, Pose};
use glam::Vec3;
use physics::{MissileId, MissileKind};
use procgen::{BuildingSpec, ChunkKey, Heightmap};

use crate::bombs::BayState;
use crate::building::BuildingId;
use crate::flares::FlareId;
use crate::hud::RadarModel;

/// What blew up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplosionKind {
    Cruise,
    Sam,
    Bomb,
}

/// Where a particle emitter is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitterMount {
    /// Exhaust trail behind a missile.
    MissileTrail(MissileId),
    /// Glow around a decoy flare.
    Flare(FlareId),
}

/// One lifecycle change the scene must mirror.
#[derive(Debug, Clone)]
pub enum SceneEvent {
    ChunkMeshRequested {
        key: ChunkKey,
        mesh: MeshHandle,
        heightmap: Arc<Heightmap>,
    },
    ChunkMeshDisposed {
        key: ChunkKey,
        mesh: MeshHandle,
    },
    BuildingSpawned {
        id: BuildingId,
        mesh: MeshHandle,
        spec: BuildingSpec,
    },
    BuildingDestroyed {
        id: BuildingId,
        position: Vec3,
    },
    BuildingDisposed {
        id: BuildingId,
        mesh: MeshHandle,
    },
    MissileSpawned {
        id: MissileId,
        kind: MissileKind,
    },
    MissileDisposed {
        id: MissileId,
    },
    Explosion {
        position: Vec3,
        kind: ExplosionKind,
    },
    BombBayOpened,
    BombBayClosed,
    BombReleased {
        position: Vec3,
    },
    EmitterStarted {
        mount: EmitterMount,
    },
    EmitterStopped {
        mount: EmitterMount,
    },
    LockEstablished {
        missile: MissileId,
    },
    FlareDeployed {
        id: FlareId,
        position: Vec3,
    },
    FlareExpired {
        id: FlareId,
    },
}

/// Pose of one live missile.
#[derive(Debug, Clone, Copy)]
pub struct MissilePose {
    pub id: MissileId,
    pub kind: MissileKind,
    pub pose: Pose,
    pub exploded: bool,
}

/// Authoritative state of everything that moves, for this frame.
#[derive(Debug, Clone, Default)]
pub struct FrameSnapshot {
    pub time: f64,
    pub bomber: Pose,
    pub bomber_velocity: Vec3,
    pub missiles: Vec<MissilePose>,
    pub bombs: Vec<Vec3>,
    pub flares: Vec<(FlareId, Vec3)>,
    /// Bay door state, for the door animation.
    pub bomb_bay: BayState,
    /// Far plane for terrain and buildings; the simulation itself never culls by it.
    pub view_distance: f32,
}

/// Rendering collaborator.
pub trait SceneSink {
    fn submit(&mut self, frame: &FrameSnapshot, events: &[SceneEvent]);
}

/// HUD collaborator.
pub trait HudSink {
    fn update(&mut self, radar: &RadarModel);
}

/// Keeps everything it is handed. Used by tests and tooling.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub frames: Vec<FrameSnapshot>,
    pub events: Vec<SceneEvent>,
    pub radar: Option<RadarModel>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_frame(&self) -> Option<&FrameSnapshot> {
        self.frames.last()
    }

    pub fn count(&self, pred: impl Fn(&SceneEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl SceneSink for RecordingSink {
    fn submit(&mut self, frame: &FrameSnapshot, events: &[SceneEvent]) {
        self.frames.push(frame.clone());
        self.events.extend_from_slice(events);
    }
}

impl HudSink for RecordingSink {
    fn update(&mut self, radar: &RadarModel) {
        self.radar = Some(radar.clone());
    }
}

/// Logs combat events and periodic radar summaries. The headless driver's sink.
#[derive(Debug, Default)]
pub struct LogSink {
    radar_updates: u64,
    /// Log a radar summary every this many updates (0 disables it).
    pub radar_every: u64,
}

impl LogSink {
    pub fn new(radar_every: u64) -> Self {
        Self {
            radar_updates: 0,
            radar_every,
        }
    }
}

impl SceneSink for LogSink {
    fn submit(&mut self, frame: &FrameSnapshot, events: &[SceneEvent]) {
        for event in events {
            match event {
                SceneEvent::ChunkMeshRequested { key, .. } => log::debug!("chunk {:?} ready", key),
                SceneEvent::ChunkMeshDisposed { key, .. } => log::debug!("chunk {:?} evicted", key),
                SceneEvent::Explosion { position, kind } => {
                    log::info!("[{:7.2}] {:?} explosion at {:.0}", frame.time, kind, position)
                }
                SceneEvent::BuildingDestroyed { id, .. } => {
                    log::info!("[{:7.2}] building {:?} destroyed", frame.time, id)
                }
                SceneEvent::LockEstablished { missile } => {
                    log::info!("[{:7.2}] missile {:?} locked", frame.time, missile)
                }
                SceneEvent::MissileSpawned { id, kind } => {
                    log::info!("[{:7.2}] {} {:?} away", frame.time, kind.as_str(), id)
                }
                _ => log::trace!("{:?}", event),
            }
        }
    }
}

impl HudSink for LogSink {
    fn update(&mut self, radar: &RadarModel) {
        self.radar_updates += 1;
        if self.radar_every > 0 && self.radar_updates % self.radar_every == 0 {
            log::info!(
                "radar: {} contacts, bomb {:.0}%, missile {:.0}%, targets destroyed {}, hull {:.0}%",
                radar.markers.len(),
                radar.cooldowns.bomb * 100.0,
                radar.cooldowns.missile * 100.0,
                radar.destroyed_targets,
                radar.health * 100.0
            );
        }
    }
}
