//! Immediate-mode graphics interface.
//!
//! Scene objects talk to the GPU exclusively through the [`Gpu`] trait: they
//! create resources, bind them, set uniforms by name and issue draw calls.
//! [`WgpuGpu`] renders through wgpu; [`RecordingGpu`] keeps a command log and
//! is what the tests drive.

mod handle;
mod layout;
mod pool;
mod program;
mod recording;
mod wgpu_backend;

use bitflags::bitflags;
use glam::{Mat4, Vec3};

/// Marker types naming each kind of GPU resource.
pub mod kind {
    pub use super::handle::{Program, Texture, UniformBuffer, VertexArray};
}

pub use handle::{
    BufferId, GpuResource, Handle, ProgramId, ResourceKind, TextureId, VertexArrayId,
};
pub use layout::{LayoutBuilder, StructDef, UniformField, UniformKind, UniformLayout};
pub use pool::ResourcePool;
pub use program::{
    ProgramSource, TextureSlot, MATRICES_BLOCK, MAX_DIRECTIONAL_LIGHTS, MAX_POINT_LIGHTS,
    MAX_SPOT_LIGHTS,
};
pub use recording::{GpuCall, RecordingGpu};
pub use wgpu_backend::WgpuGpu;

#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("no suitable GPU adapter: {0}")]
    Adapter(String),
    #[error("failed to create device: {0}")]
    Device(String),
    #[error("surface error: {0}")]
    Surface(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("unknown {kind} handle #{index}")]
    UnknownHandle { kind: &'static str, index: usize },
    #[error("cubemap faces must be square and share dimensions")]
    MismatchedCubeFaces,
    #[error("image data holds {actual} bytes, expected {expected}")]
    ImageSize { expected: usize, actual: usize },
    #[error("program {label}: {message}")]
    Program { label: String, message: String },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec3(Vec3),
    Mat4(Mat4),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Int(_) => UniformKind::Int,
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Mat4(_) => UniformKind::Mat4,
        }
    }

    /// Bytes as laid out in a uniform block.
    pub fn write_to(&self, dst: &mut [u8]) {
        match self {
            UniformValue::Int(v) => dst[..4].copy_from_slice(&v.to_ne_bytes()),
            UniformValue::Float(v) => dst[..4].copy_from_slice(&v.to_ne_bytes()),
            UniformValue::Vec3(v) => {
                dst[..12].copy_from_slice(bytemuck::cast_slice(&v.to_array()))
            }
            UniformValue::Mat4(m) => {
                dst[..64].copy_from_slice(bytemuck::cast_slice(&m.to_cols_array()))
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DepthCompare {
    Less,
    LessEqual,
    Always,
}

/// Fixed-function state applied to subsequent draws until changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DrawState {
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare: DepthCompare,
    pub cull_back_faces: bool,
    pub blend: bool,
}

impl DrawState {
    /// Opaque geometry: depth tested and written with `Less`.
    pub const fn standard() -> Self {
        Self {
            depth_test: true,
            depth_write: true,
            depth_compare: DepthCompare::Less,
            cull_back_faces: false,
            blend: false,
        }
    }

    /// Background drawn at the far plane behind everything already drawn.
    pub const fn skybox() -> Self {
        Self {
            depth_test: true,
            depth_write: false,
            depth_compare: DepthCompare::LessEqual,
            cull_back_faces: false,
            blend: false,
        }
    }

    pub const fn overlay_blended() -> Self {
        Self {
            depth_test: true,
            depth_write: false,
            depth_compare: DepthCompare::Less,
            cull_back_faces: false,
            blend: true,
        }
    }
}

impl Default for DrawState {
    fn default() -> Self {
        Self::standard()
    }
}

bitflags! {
    /// Vertex attributes present in a vertex array.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct AttributeMask: u8 {
        const POSITION = 1 << 0;
        const NORMAL = 1 << 1;
        const TEX_COORD = 1 << 2;
        const INDICES = 1 << 3;
    }
}

/// Vertex attribute streams for one vertex array. Absent streams are not
/// uploaded; shaders see zeros for them.
#[derive(Clone, Copy, Debug, Default)]
pub struct VertexData<'a> {
    pub positions: &'a [[f32; 3]],
    pub normals: Option<&'a [[f32; 3]]>,
    pub tex_coords: Option<&'a [[f32; 2]]>,
    pub indices: Option<&'a [u32]>,
}

impl VertexData<'_> {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn mask(&self) -> AttributeMask {
        let mut mask = AttributeMask::POSITION;
        mask.set(AttributeMask::NORMAL, self.normals.is_some());
        mask.set(AttributeMask::TEX_COORD, self.tex_coords.is_some());
        mask.set(AttributeMask::INDICES, self.indices.is_some());
        mask
    }
}

/// Decoded RGBA8 pixels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl ImageData {
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self {
            width: 1,
            height: 1,
            pixels: rgba.to_vec(),
        }
    }

    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    pub fn check(&self) -> Result<(), GpuError> {
        if self.pixels.len() != self.expected_len() {
            return Err(GpuError::ImageSize {
                expected: self.expected_len(),
                actual: self.pixels.len(),
            });
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum WrapMode {
    #[default]
    Repeat,
    MirrorRepeat,
    ClampToEdge,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    #[default]
    Linear,
    Nearest,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Sampling {
    pub wrap: WrapMode,
    pub filter: FilterMode,
    pub mipmaps: bool,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            wrap: WrapMode::Repeat,
            filter: FilterMode::Linear,
            mipmaps: true,
        }
    }
}

impl Sampling {
    pub fn clamped() -> Self {
        Self {
            wrap: WrapMode::ClampToEdge,
            filter: FilterMode::Linear,
            mipmaps: false,
        }
    }
}

/// Immediate-mode graphics API.
///
/// Calls are issued in order and take effect on the draws that follow them.
/// Operations on unknown handles are ignored and reported through
/// [`Gpu::take_errors`].
pub trait Gpu {
    fn create_vertex_array(&mut self, data: &VertexData<'_>) -> Result<VertexArrayId, GpuError>;
    fn delete_vertex_array(&mut self, id: VertexArrayId);

    fn create_texture(&mut self, image: &ImageData, sampling: Sampling)
        -> Result<TextureId, GpuError>;
    /// Faces in order +X, -X, +Y, -Y, +Z, -Z.
    fn create_cubemap(&mut self, faces: &[ImageData; 6]) -> Result<TextureId, GpuError>;
    fn delete_texture(&mut self, id: TextureId);

    fn create_program(&mut self, source: &ProgramSource) -> Result<ProgramId, GpuError>;
    fn delete_program(&mut self, id: ProgramId);
    fn use_program(&mut self, program: ProgramId);
    /// Unknown names are ignored.
    fn set_uniform(&mut self, program: ProgramId, name: &str, value: UniformValue);

    fn uniform_block_index(&self, program: ProgramId, name: &str) -> Option<u32>;
    fn bind_uniform_block(&mut self, program: ProgramId, block: u32, binding: u32);
    fn create_uniform_buffer(&mut self, size: usize) -> Result<BufferId, GpuError>;
    fn bind_uniform_buffer(&mut self, buffer: BufferId, binding: u32);
    fn write_uniform_buffer(&mut self, buffer: BufferId, offset: usize, bytes: &[u8]);
    fn delete_uniform_buffer(&mut self, id: BufferId);

    fn bind_texture(&mut self, unit: u32, texture: TextureId);
    fn set_draw_state(&mut self, state: DrawState);
    fn draw_arrays(&mut self, vao: VertexArrayId, first: u32, count: u32);
    fn draw_elements(&mut self, vao: VertexArrayId, count: u32);

    /// Starts a frame and resets the draw state to [`DrawState::standard`].
    fn begin_frame(&mut self, clear: [f32; 4]);
    fn end_frame(&mut self);
    fn take_errors(&mut self) -> Vec<GpuError>;
}

/// Chained uniform setter for one program.
pub struct Uniforms<'a> {
    gpu: &'a mut dyn Gpu,
    program: ProgramId,
}

impl<'a> Uniforms<'a> {
    pub fn new(gpu: &'a mut dyn Gpu, program: ProgramId) -> Self {
        Self { gpu, program }
    }

    pub fn set_int(&mut self, name: &str, value: i32) -> &mut Self {
        self.gpu
            .set_uniform(self.program, name, UniformValue::Int(value));
        self
    }

    pub fn set_float(&mut self, name: &str, value: f32) -> &mut Self {
        self.gpu
            .set_uniform(self.program, name, UniformValue::Float(value));
        self
    }

    pub fn set_vec3(&mut self, name: &str, value: Vec3) -> &mut Self {
        self.gpu
            .set_uniform(self.program, name, UniformValue::Vec3(value));
        self
    }

    pub fn set_mat4(&mut self, name: &str, value: Mat4) -> &mut Self {
        self.gpu
            .set_uniform(self.program, name, UniformValue::Mat4(value));
        self
    }
}
