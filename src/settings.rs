use glam::Vec3;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::lights::LightCapacity;
use crate::scene::Camera;

pub const SETTINGS_PATH: &str = "settings.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default)]
    pub present_mode: PresentModeSetting,
    #[serde(default = "RenderSettings::default_clear_color")]
    pub clear_color: [f32; 4],
    #[serde(default)]
    pub light_capacity: LightCapacity,
    #[serde(default)]
    pub camera: CameraSettings,
    #[serde(default = "RenderSettings::default_start_position")]
    pub start_position: [f32; 3],
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            present_mode: PresentModeSetting::default(),
            clear_color: Self::default_clear_color(),
            light_capacity: LightCapacity::default(),
            camera: CameraSettings::default(),
            start_position: Self::default_start_position(),
        }
    }
}

impl RenderSettings {
    pub fn load() -> Self {
        Self::load_from_path(SETTINGS_PATH)
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Self {
        use std::fs;

        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RenderSettings>(&contents) {
                Ok(settings) => {
                    info!("Loaded render settings from {:?}", path);
                    settings.validate()
                }
                Err(err) => {
                    warn!(
                        "Failed to parse {:?} ({}). Falling back to default render settings.",
                        path, err
                    );
                    RenderSettings::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "Render settings file {:?} not found. Using default settings.",
                    path
                );
                RenderSettings::default()
            }
            Err(err) => {
                warn!(
                    "Failed to read {:?} ({}). Falling back to default render settings.",
                    path, err
                );
                RenderSettings::default()
            }
        }
    }

    pub fn validate(mut self) -> Self {
        if self.resolution.width == 0 || self.resolution.height == 0 {
            warn!("Resolution must be greater than zero. Using default resolution.");
            self.resolution = Resolution::default();
        }

        if self.clear_color.iter().any(|c| !c.is_finite()) {
            warn!("Clear color must be finite. Using black.");
            self.clear_color = Self::default_clear_color();
        }

        if self.start_position.iter().any(|c| !c.is_finite()) {
            warn!("Start position must be finite. Using default position.");
            self.start_position = Self::default_start_position();
        }

        self.light_capacity = self.light_capacity.clamped();
        self.camera = self.camera.validate();
        self
    }

    pub fn present_mode(&self, available: &[wgpu::PresentMode]) -> wgpu::PresentMode {
        let desired = self.present_mode.to_wgpu();
        if available.contains(&desired) {
            return desired;
        }

        warn!(
            "Requested present mode {:?} is not supported. Falling back to FIFO.",
            desired
        );

        if available.contains(&wgpu::PresentMode::Fifo) {
            wgpu::PresentMode::Fifo
        } else {
            available
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo)
        }
    }

    /// Camera at `start_position` with the configured lens and controls.
    pub fn camera(&self) -> Camera {
        let mut camera = Camera::new(Vec3::from_array(self.start_position));
        self.camera.apply(&mut camera);
        camera
    }

    const fn default_clear_color() -> [f32; 4] {
        [0.0, 0.0, 0.0, 1.0]
    }

    const fn default_start_position() -> [f32; 3] {
        [0.0, 5.0, 3.0]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub near: f32,
    pub far: f32,
    pub speed: f32,
    pub sensitivity: f32,
    /// Initial vertical field of view in degrees.
    pub fov: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            near: 0.1,
            far: 1000.0,
            speed: 10.0,
            sensitivity: 0.1,
            fov: 45.0,
        }
    }
}

impl CameraSettings {
    fn validate(mut self) -> Self {
        let defaults = Self::default();
        if !(self.near > 0.0 && self.far > self.near) {
            warn!(
                "Camera clip range {}..{} is invalid. Using {}..{}.",
                self.near, self.far, defaults.near, defaults.far
            );
            self.near = defaults.near;
            self.far = defaults.far;
        }
        if !(self.speed > 0.0) {
            warn!("Camera speed must be positive. Using default value.");
            self.speed = defaults.speed;
        }
        if !(self.sensitivity > 0.0) {
            warn!("Mouse sensitivity must be positive. Using default value.");
            self.sensitivity = defaults.sensitivity;
        }
        if !(1.0..=90.0).contains(&self.fov) {
            warn!("Field of view {} is outside 1..=90. Using default value.", self.fov);
            self.fov = defaults.fov;
        }
        self
    }

    /// Writes lens and control settings onto `camera`, leaving its pose.
    pub fn apply(&self, camera: &mut Camera) {
        camera.near = self.near;
        camera.far = self.far;
        camera.movement_speed = self.speed;
        camera.mouse_sensitivity = self.sensitivity;
        camera.zoom = self.fov;
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentModeSetting {
    #[default]
    Fifo,
    FifoRelaxed,
    Immediate,
    Mailbox,
    AutoVsync,
    AutoNoVsync,
}

impl PresentModeSetting {
    fn to_wgpu(&self) -> wgpu::PresentMode {
        match self {
            PresentModeSetting::Fifo => wgpu::PresentMode::Fifo,
            PresentModeSetting::FifoRelaxed => wgpu::PresentMode::FifoRelaxed,
            PresentModeSetting::Immediate => wgpu::PresentMode::Immediate,
            PresentModeSetting::Mailbox => wgpu::PresentMode::Mailbox,
            PresentModeSetting::AutoVsync => wgpu::PresentMode::AutoVsync,
            PresentModeSetting::AutoNoVsync => wgpu::PresentMode::AutoNoVsync,
        }
    }
}
