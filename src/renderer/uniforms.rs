// renderer/uniforms.rs
use bytemuck::{Pod, Zeroable};
use glam::Mat4;

/// Binding point of the shared view/projection buffer.
pub const MATRICES_BINDING: u32 = 0;

/// Contents of the shared `Matrices` block: view, then projection.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, PartialEq, Debug)]
pub struct MatricesUniform {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
}

impl MatricesUniform {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn new(view: Mat4, projection: Mat4) -> Self {
        Self {
            view: view.to_cols_array_2d(),
            projection: projection.to_cols_array_2d(),
        }
    }
}

impl Default for MatricesUniform {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Mat4::IDENTITY)
    }
}
