use glam::{Mat4, Vec3};

/// Accumulated model matrix.
///
/// Every operation right-multiplies the current matrix (`M = M * Op`), so the
/// most recently applied operation acts on vertices first.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    matrix: Mat4,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            matrix: Mat4::IDENTITY,
        }
    }
}

impl Transform {
    pub fn from_matrix(matrix: Mat4) -> Self {
        Self { matrix }
    }

    pub fn at(position: Vec3) -> Self {
        Self::from_matrix(Mat4::from_translation(position))
    }

    pub fn matrix(&self) -> Mat4 {
        self.matrix
    }

    /// Rotation about `axis` by `degrees`. A zero axis leaves the matrix unchanged.
    pub fn rotate(&mut self, degrees: f32, axis: Vec3) -> &mut Self {
        if let Some(axis) = axis.try_normalize() {
            self.matrix *= Mat4::from_axis_angle(axis, degrees.to_radians());
        }
        self
    }

    pub fn translate(&mut self, offset: Vec3) -> &mut Self {
        self.matrix *= Mat4::from_translation(offset);
        self
    }

    pub fn scale(&mut self, factors: Vec3) -> &mut Self {
        self.matrix *= Mat4::from_scale(factors);
        self
    }

    pub fn reset(&mut self) {
        self.matrix = Mat4::IDENTITY;
    }
}
