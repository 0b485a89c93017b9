//! Runtime buildings: an immutable generated spec plus damage state.

use engine_core::{Health, MeshHandle};
use procgen::{BuildingSpec, ChunkKey, Role};

use crate::defense::LauncherState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BuildingId(pub u64);

/// A building placed in a chunk.
#[derive(Debug, Clone)]
pub struct Building {
    pub id: BuildingId,
    pub chunk: ChunkKey,
    pub spec: BuildingSpec,
    pub mesh: MeshHandle,
    pub health: Health,
    destroyed: bool,
    /// Present only for DefenseLauncher buildings.
    pub launcher: Option<LauncherState>,
}

impl Building {
    pub fn new(id: BuildingId, chunk: ChunkKey, spec: BuildingSpec, mesh: MeshHandle, max_health: f32, launch_interval: f32) -> Self {
        let launcher = (spec.role == Role::DefenseLauncher).then(|| LauncherState::new(launch_interval));
        Self {
            id,
            chunk,
            spec,
            mesh,
            health: Health::new(max_health),
            destroyed: false,
            launcher,
        }
    }

    pub fn role(&self) -> Role {
        self.spec.role
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// A launcher that is still standing.
    pub fn is_active_launcher(&self) -> bool {
        !self.destroyed && self.launcher.is_some()
    }

    /// Damage saturates at max health. Returns true only on the call that destroys it.
    pub fn apply_damage(&mut self, amount: f32) -> bool {
        if self.destroyed {
            return false;
        }
        self.health.take_damage(amount);
        if self.health.is_dead() {
            self.destroyed = true;
            return true;
        }
        false
    }
}
