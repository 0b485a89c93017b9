//! Camera rig state. The core only tracks the mode and rig pitch; placing the
//! actual camera is the renderer's business.

use input::{InputSource, KeyCode};

/// Rig pitch limits (radians).
const MIN_PITCH: f32 = -1.2;
const MAX_PITCH: f32 = 0.6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CameraMode {
    /// Behind and above the bomber.
    #[default]
    Chase,
    /// Free orbit around the bomber.
    Orbit,
}

impl CameraMode {
    pub fn toggled(self) -> Self {
        match self {
            CameraMode::Chase => CameraMode::Orbit,
            CameraMode::Orbit => CameraMode::Chase,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CameraRig {
    pub mode: CameraMode,
    pub pitch: f32,
}

impl CameraRig {
    /// C toggles the mode; Shift+Up/Down tilts the rig.
    pub fn update(&mut self, input: &dyn InputSource, dt: f32, pitch_rate: f32) {
        if input.is_key_pressed(KeyCode::KeyC) {
            self.mode = self.mode.toggled();
            log::debug!("Camera mode {:?}", self.mode);
        }
        let tilt = (input.is_shift_up() as i32 - input.is_shift_down() as i32) as f32;
        self.pitch = (self.pitch + tilt * pitch_rate * dt).clamp(MIN_PITCH, MAX_PITCH);
    }
}
