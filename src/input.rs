//! Keyboard and mouse state for the fly camera.

use bitflags::bitflags;
use winit::event::{ElementState, MouseScrollDelta};
use winit::keyboard::{KeyCode, PhysicalKey};

use crate::scene::{Camera, CameraMovement};

bitflags! {
    /// Movement keys currently held.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct MovementKeys: u8 {
        const FORWARD = 1 << 0;
        const BACKWARD = 1 << 1;
        const LEFT = 1 << 2;
        const RIGHT = 1 << 3;
        const UP = 1 << 4;
        const DOWN = 1 << 5;
    }
}

impl MovementKeys {
    const DIRECTIONS: [(MovementKeys, CameraMovement); 6] = [
        (MovementKeys::FORWARD, CameraMovement::Forward),
        (MovementKeys::BACKWARD, CameraMovement::Backward),
        (MovementKeys::LEFT, CameraMovement::Left),
        (MovementKeys::RIGHT, CameraMovement::Right),
        (MovementKeys::UP, CameraMovement::Up),
        (MovementKeys::DOWN, CameraMovement::Down),
    ];

    fn from_key(key: PhysicalKey) -> Option<Self> {
        match key {
            PhysicalKey::Code(KeyCode::KeyW) | PhysicalKey::Code(KeyCode::ArrowUp) => {
                Some(Self::FORWARD)
            }
            PhysicalKey::Code(KeyCode::KeyS) | PhysicalKey::Code(KeyCode::ArrowDown) => {
                Some(Self::BACKWARD)
            }
            PhysicalKey::Code(KeyCode::KeyA) | PhysicalKey::Code(KeyCode::ArrowLeft) => {
                Some(Self::LEFT)
            }
            PhysicalKey::Code(KeyCode::KeyD) | PhysicalKey::Code(KeyCode::ArrowRight) => {
                Some(Self::RIGHT)
            }
            PhysicalKey::Code(KeyCode::Space) => Some(Self::UP),
            PhysicalKey::Code(KeyCode::ShiftLeft) | PhysicalKey::Code(KeyCode::ShiftRight) => {
                Some(Self::DOWN)
            }
            _ => None,
        }
    }
}

/// Accumulates input between frames and applies it to a camera once per frame.
#[derive(Debug, Default)]
pub struct InputState {
    held: MovementKeys,
    mouse_delta: (f32, f32),
    scroll: f32,
    mouse_look: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the key is a movement key.
    pub fn process_key(&mut self, key: PhysicalKey, state: ElementState) -> bool {
        let Some(flag) = MovementKeys::from_key(key) else {
            return false;
        };
        self.held.set(flag, state == ElementState::Pressed);
        true
    }

    /// Raw device motion; only counted while mouse look is active.
    pub fn process_mouse_motion(&mut self, dx: f64, dy: f64) {
        if self.mouse_look {
            self.mouse_delta.0 += dx as f32;
            self.mouse_delta.1 += dy as f32;
        }
    }

    pub fn process_scroll(&mut self, delta: MouseScrollDelta) {
        self.scroll += match delta {
            MouseScrollDelta::LineDelta(_, y) => y,
            MouseScrollDelta::PixelDelta(position) => position.y as f32 / 20.0,
        };
    }

    pub fn set_mouse_look(&mut self, enabled: bool) {
        self.mouse_look = enabled;
        self.mouse_delta = (0.0, 0.0);
    }

    pub fn mouse_look(&self) -> bool {
        self.mouse_look
    }

    pub fn held(&self) -> MovementKeys {
        self.held
    }

    /// Moves and turns `camera` by everything gathered since the last call.
    pub fn apply(&mut self, camera: &mut Camera, delta_time: f32) {
        for (flag, movement) in MovementKeys::DIRECTIONS {
            if self.held.contains(flag) {
                camera.process_keyboard(movement, delta_time);
            }
        }

        let (dx, dy) = std::mem::take(&mut self.mouse_delta);
        if dx != 0.0 || dy != 0.0 {
            // Screen y grows downwards.
            camera.process_mouse_movement(dx, -dy, true);
        }

        let scroll = std::mem::take(&mut self.scroll);
        if scroll != 0.0 {
            camera.process_mouse_scroll(scroll);
        }
    }

    /// Releases everything, e.g. when the window loses focus.
    pub fn reset(&mut self) {
        self.held = MovementKeys::empty();
        self.mouse_delta = (0.0, 0.0);
        self.scroll = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn movement_keys_are_tracked() {
        let mut input = InputState::new();
        assert!(input.process_key(PhysicalKey::Code(KeyCode::KeyW), ElementState::Pressed));
        assert!(input.process_key(PhysicalKey::Code(KeyCode::Space), ElementState::Pressed));
        assert!(!input.process_key(PhysicalKey::Code(KeyCode::KeyQ), ElementState::Pressed));
        assert_eq!(input.held(), MovementKeys::FORWARD | MovementKeys::UP);

        input.process_key(PhysicalKey::Code(KeyCode::KeyW), ElementState::Released);
        assert_eq!(input.held(), MovementKeys::UP);
    }

    #[test]
    fn apply_moves_the_camera() {
        let mut input = InputState::new();
        let mut camera = Camera::new(Vec3::ZERO);
        camera.movement_speed = 2.0;
        input.process_key(PhysicalKey::Code(KeyCode::KeyW), ElementState::Pressed);

        input.apply(&mut camera, 0.5);
        assert!(camera.position.abs_diff_eq(Vec3::NEG_Z, 1e-5));
    }

    #[test]
    fn mouse_motion_needs_mouse_look() {
        let mut input = InputState::new();
        let mut camera = Camera::new(Vec3::ZERO);
        let yaw = camera.yaw();

        input.process_mouse_motion(50.0, 0.0);
        input.apply(&mut camera, 0.016);
        assert_eq!(camera.yaw(), yaw);

        input.set_mouse_look(true);
        input.process_mouse_motion(50.0, 0.0);
        input.apply(&mut camera, 0.016);
        assert!(camera.yaw() > yaw);
    }

    #[test]
    fn scroll_is_consumed_once() {
        let mut input = InputState::new();
        let mut camera = Camera::new(Vec3::ZERO);
        input.process_scroll(MouseScrollDelta::LineDelta(0.0, 5.0));

        input.apply(&mut camera, 0.016);
        let zoom = camera.zoom;
        input.apply(&mut camera, 0.016);
        assert_eq!(camera.zoom, zoom);
        assert_eq!(zoom, 40.0);
    }

    #[test]
    fn reset_releases_keys() {
        let mut input = InputState::new();
        input.process_key(PhysicalKey::Code(KeyCode::KeyA), ElementState::Pressed);
        input.reset();
        assert!(input.held().is_empty());
    }
}
