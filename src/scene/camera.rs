use glam::{Mat4, Vec3};

pub const DEFAULT_YAW: f32 = -90.0;
pub const DEFAULT_PITCH: f32 = 0.0;
pub const DEFAULT_SPEED: f32 = 2.5;
pub const DEFAULT_SENSITIVITY: f32 = 0.1;
pub const DEFAULT_ZOOM: f32 = 45.0;

const PITCH_LIMIT: f32 = 89.0;
const MIN_ZOOM: f32 = 1.0;
const MAX_ZOOM: f32 = 90.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraMovement {
    Forward,
    Backward,
    Left,
    Right,
    Up,
    Down,
}

/// Fly camera driven by Euler angles (degrees).
#[derive(Clone, Debug)]
pub struct Camera {
    pub position: Vec3,
    pub world_up: Vec3,
    pub movement_speed: f32,
    pub mouse_sensitivity: f32,
    /// Vertical field of view in degrees.
    pub zoom: f32,
    pub near: f32,
    pub far: f32,
    yaw: f32,
    pitch: f32,
    front: Vec3,
    up: Vec3,
    right: Vec3,
    start_position: Vec3,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 0.0, 3.0))
    }
}

impl Camera {
    pub fn new(position: Vec3) -> Self {
        let mut camera = Self {
            position,
            world_up: Vec3::Y,
            movement_speed: DEFAULT_SPEED,
            mouse_sensitivity: DEFAULT_SENSITIVITY,
            zoom: DEFAULT_ZOOM,
            near: 0.01,
            far: 100.0,
            yaw: DEFAULT_YAW,
            pitch: DEFAULT_PITCH,
            front: Vec3::NEG_Z,
            up: Vec3::Y,
            right: Vec3::X,
            start_position: position,
        };
        camera.update_vectors();
        camera
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front, self.up)
    }

    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.zoom.to_radians(), aspect.max(1e-4), self.near, self.far)
    }

    pub fn front(&self) -> Vec3 {
        self.front
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn right(&self) -> Vec3 {
        self.right
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn set_orientation(&mut self, yaw: f32, pitch: f32) {
        self.yaw = yaw;
        self.pitch = pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.update_vectors();
    }

    pub fn process_keyboard(&mut self, direction: CameraMovement, delta_time: f32) {
        let velocity = self.movement_speed * delta_time;
        let offset = match direction {
            CameraMovement::Forward => self.front,
            CameraMovement::Backward => -self.front,
            CameraMovement::Left => -self.right,
            CameraMovement::Right => self.right,
            CameraMovement::Up => self.world_up,
            CameraMovement::Down => -self.world_up,
        };
        self.position += offset * velocity;
    }

    pub fn process_mouse_movement(&mut self, x_offset: f32, y_offset: f32, constrain_pitch: bool) {
        self.yaw += x_offset * self.mouse_sensitivity;
        self.pitch += y_offset * self.mouse_sensitivity;

        if constrain_pitch {
            self.pitch = self.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
        }
        self.update_vectors();
    }

    pub fn process_mouse_scroll(&mut self, y_offset: f32) {
        self.zoom = (self.zoom - y_offset).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// Restores the start position and default orientation, speed and zoom.
    pub fn reset(&mut self) {
        self.position = self.start_position;
        self.yaw = DEFAULT_YAW;
        self.pitch = DEFAULT_PITCH;
        self.zoom = DEFAULT_ZOOM;
        self.movement_speed = DEFAULT_SPEED;
        self.mouse_sensitivity = DEFAULT_SENSITIVITY;
        self.update_vectors();
    }

    fn update_vectors(&mut self) {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        self.front = Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos())
            .normalize();
        self.right = self.front.cross(self.world_up).normalize();
        self.up = self.right.cross(self.front).normalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_looks_down_negative_z() {
        let cam = Camera::default();
        assert!(cam.front().abs_diff_eq(Vec3::NEG_Z, 1e-6));
        assert!(cam.right().abs_diff_eq(Vec3::X, 1e-6));
    }

    #[test]
    fn view_proj_is_reasonable() {
        let cam = Camera::default();
        let vp = cam.projection(16.0 / 9.0) * cam.view_matrix();
        let inv = vp.inverse();
        assert!((vp * inv).abs_diff_eq(Mat4::IDENTITY, 1e-4));
    }

    #[test]
    fn pitch_is_constrained() {
        let mut cam = Camera::default();
        cam.process_mouse_movement(0.0, 10_000.0, true);
        assert_eq!(cam.pitch(), 89.0);

        cam.process_mouse_movement(0.0, -20_000.0, true);
        assert_eq!(cam.pitch(), -89.0);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut cam = Camera::default();
        cam.process_mouse_scroll(100.0);
        assert_eq!(cam.zoom, 1.0);
        cam.process_mouse_scroll(-500.0);
        assert_eq!(cam.zoom, 90.0);
    }

    #[test]
    fn keyboard_moves_along_front() {
        let mut cam = Camera::new(Vec3::ZERO);
        cam.process_keyboard(CameraMovement::Forward, 2.0);
        assert!(cam.position.abs_diff_eq(Vec3::new(0.0, 0.0, -5.0), 1e-5));
    }

    #[test]
    fn reset_restores_start_pose() {
        let mut cam = Camera::new(Vec3::new(1.0, 2.0, 3.0));
        cam.process_keyboard(CameraMovement::Right, 1.0);
        cam.process_mouse_movement(300.0, 100.0, true);
        cam.process_mouse_scroll(10.0);

        cam.reset();
        assert_eq!(cam.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(cam.yaw(), DEFAULT_YAW);
        assert_eq!(cam.zoom, DEFAULT_ZOOM);
        assert!(cam.front().abs_diff_eq(Vec3::NEG_Z, 1e-6));
    }
}
