//! Keyboard input for the bomber: a query-style capability plus the concrete
//! per-frame key state that backs it.

use std::collections::HashSet;

/// What the simulation needs from an input device.
///
/// Read once per tick; the simulation never holds on to it.
pub trait InputSource {
    /// Check if a key is currently held.
    fn is_key_down(&self, key: KeyCode) -> bool;

    /// Check if a key went down this frame.
    fn is_key_pressed(&self, key: KeyCode) -> bool;

    /// Consume a synthesized bomb press (e.g. from a HUD button).
    fn take_bomb_trigger(&mut self) -> bool {
        false
    }

    /// Consume a synthesized missile press.
    fn take_missile_trigger(&mut self) -> bool {
        false
    }

    /// Check if either Shift key is held.
    fn is_shift_held(&self) -> bool {
        self.is_key_down(KeyCode::ShiftLeft) || self.is_key_down(KeyCode::ShiftRight)
    }

    /// Shift + Up: camera pitch up.
    fn is_shift_up(&self) -> bool {
        self.is_shift_held() && self.is_key_down(KeyCode::ArrowUp)
    }

    /// Shift + Down: camera pitch down.
    fn is_shift_down(&self) -> bool {
        self.is_shift_held() && self.is_key_down(KeyCode::ArrowDown)
    }
}

/// Manages key state for the current frame.
#[derive(Debug, Default)]
pub struct InputState {
    /// Keys currently held down.
    keys_held: HashSet<KeyCode>,
    /// Keys pressed this frame.
    keys_pressed: HashSet<KeyCode>,
    /// Keys released this frame.
    keys_released: HashSet<KeyCode>,
    /// Pending virtual bomb press.
    bomb_trigger: bool,
    /// Pending virtual missile press.
    missile_trigger: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear per-frame state. Call at the start of each frame.
    pub fn begin_frame(&mut self) {
        self.keys_pressed.clear();
        self.keys_released.clear();
    }

    /// Process a keyboard event.
    pub fn process_keyboard(&mut self, key: KeyCode, state: ElementState) {
        match state {
            ElementState::Pressed => {
                if !self.keys_held.contains(&key) {
                    self.keys_pressed.insert(key);
                }
                self.keys_held.insert(key);
            }
            ElementState::Released => {
                self.keys_held.remove(&key);
                self.keys_released.insert(key);
            }
        }
    }

    /// Shorthand for a press event.
    pub fn press(&mut self, key: KeyCode) {
        self.process_keyboard(key, ElementState::Pressed);
    }

    /// Shorthand for a release event.
    pub fn release(&mut self, key: KeyCode) {
        self.process_keyboard(key, ElementState::Released);
    }

    /// Check if a key was released this frame.
    pub fn is_key_released(&self, key: KeyCode) -> bool {
        self.keys_released.contains(&key)
    }

    /// Synthesize a bomb press; consumed by the next tick.
    pub fn trigger_bomb_key_press(&mut self) {
        log::debug!("Virtual bomb press");
        self.bomb_trigger = true;
    }

    /// Synthesize a missile press; consumed by the next tick.
    pub fn trigger_missile_key_press(&mut self) {
        log::debug!("Virtual missile press");
        self.missile_trigger = true;
    }
}

impl InputSource for InputState {
    fn is_key_down(&self, key: KeyCode) -> bool {
        self.keys_held.contains(&key)
    }

    fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.keys_pressed.contains(&key)
    }

    fn take_bomb_trigger(&mut self) -> bool {
        std::mem::take(&mut self.bomb_trigger)
    }

    fn take_missile_trigger(&mut self) -> bool {
        std::mem::take(&mut self.missile_trigger)
    }
}

// Re-export for convenience
pub use winit::event::ElementState;
pub use winit::keyboard::KeyCode;
