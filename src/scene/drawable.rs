use std::any::Any;

use glam::{Mat4, Vec3};

use super::camera::Camera;
use crate::gpu::{Gpu, GpuError, ProgramId};

/// Per-frame camera state handed to every drawable.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameContext {
    pub view: Mat4,
    pub projection: Mat4,
    pub camera_position: Vec3,
}

impl FrameContext {
    pub fn new(view: Mat4, projection: Mat4, camera_position: Vec3) -> Self {
        Self {
            view,
            projection,
            camera_position,
        }
    }

    pub fn from_camera(camera: &Camera, aspect: f32) -> Self {
        Self::new(camera.view_matrix(), camera.projection(aspect), camera.position)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

impl Default for FrameContext {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Mat4::IDENTITY, Vec3::ZERO)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TransformOp {
    Rotate { degrees: f32, axis: Vec3 },
    Translate(Vec3),
    Scale(Vec3),
}

pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Anything the renderer can set up once and draw every frame.
pub trait Drawable: AsAny {
    /// Uploads GPU data. Called once by the renderer during initialization.
    fn setup_object(&mut self, gpu: &mut dyn Gpu) -> Result<(), GpuError>;

    /// Issues the draw calls for this object. Does nothing before set-up.
    fn draw_object(&self, gpu: &mut dyn Gpu, frame: &FrameContext);

    /// Frees everything uploaded by `setup_object`.
    fn release(&mut self, gpu: &mut dyn Gpu);

    fn apply_transform(&mut self, _op: TransformOp) {}

    /// Programs this object draws with; they get the shared matrices block.
    fn programs(&self) -> Vec<ProgramId> {
        Vec::new()
    }

    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
