use std::rc::Rc;

use glam::{Mat4, Vec3};

use super::drawable::{Drawable, FrameContext, TransformOp};
use super::material::Material;
use super::texture::{self, Texture};
use super::transform::Transform;
use crate::gpu::{
    kind, AttributeMask, Gpu, GpuError, GpuResource, ProgramId, Uniforms, VertexData,
};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MeshError {
    #[error("{attribute} buffer holds {len} floats, not a multiple of {components}")]
    MalformedBuffer {
        attribute: &'static str,
        len: usize,
        components: usize,
    },
    #[error("{attribute} has {actual} entries, expected {expected}")]
    AttributeCountMismatch {
        attribute: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: u32, vertex_count: usize },
}

/// Collects vertex streams and settings for a [`Mesh`].
///
/// Attribute buffers are flat float slices (`x, y, z, x, y, z, ...`); they are
/// checked against each other in [`MeshBuilder::build`].
#[derive(Debug, Clone)]
pub struct MeshBuilder {
    program: ProgramId,
    positions: Vec<f32>,
    normals: Option<Vec<f32>>,
    tex_coords: Option<Vec<f32>>,
    indices: Option<Vec<u32>>,
    material: Material,
    transform: Transform,
}

impl MeshBuilder {
    pub fn new(positions: &[f32], program: ProgramId) -> Self {
        Self {
            program,
            positions: positions.to_vec(),
            normals: None,
            tex_coords: None,
            indices: None,
            material: Material::default(),
            transform: Transform::default(),
        }
    }

    pub fn from_positions(positions: &[[f32; 3]], program: ProgramId) -> Self {
        Self::new(bytemuck::cast_slice(positions), program)
    }

    pub fn with_normals(mut self, normals: &[f32]) -> Self {
        self.normals = Some(normals.to_vec());
        self
    }

    pub fn with_tex_coords(mut self, tex_coords: &[f32]) -> Self {
        self.tex_coords = Some(tex_coords.to_vec());
        self
    }

    pub fn with_indices(mut self, indices: &[u32]) -> Self {
        self.indices = Some(indices.to_vec());
        self
    }

    pub fn with_texture(mut self, texture: Rc<Texture>) -> Self {
        self.material.add_texture(texture);
        self
    }

    /// Replaces the material. Textures added earlier are kept in front of the
    /// material's own.
    pub fn with_material(mut self, mut material: Material) -> Self {
        let mut textures = self.material.take_textures();
        textures.extend(material.take_textures());
        for texture in textures {
            material.add_texture(texture);
        }
        self.material = material;
        self
    }

    /// Starts the model matrix as a translation to `position`.
    pub fn at(mut self, position: Vec3) -> Self {
        self.transform = Transform::at(position);
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn build(self) -> Result<Mesh, MeshError> {
        let positions: Vec<[f32; 3]> = chunk("positions", &self.positions)?;
        let vertex_count = positions.len();

        let normals = self
            .normals
            .as_deref()
            .map(|n| chunk::<3>("normals", n))
            .transpose()?;
        let tex_coords = self
            .tex_coords
            .as_deref()
            .map(|t| chunk::<2>("tex_coords", t))
            .transpose()?;

        if let Some(normals) = &normals {
            check_count("normals", vertex_count, normals.len())?;
        }
        if let Some(tex_coords) = &tex_coords {
            check_count("tex_coords", vertex_count, tex_coords.len())?;
        }
        if let Some(indices) = &self.indices {
            if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertex_count) {
                return Err(MeshError::IndexOutOfRange {
                    index,
                    vertex_count,
                });
            }
        }

        Ok(Mesh {
            positions,
            normals,
            tex_coords,
            indices: self.indices,
            material: self.material,
            program: self.program,
            transform: self.transform,
            vertex_array: None,
            attributes: AttributeMask::empty(),
        })
    }
}

fn chunk<const N: usize>(attribute: &'static str, data: &[f32]) -> Result<Vec<[f32; N]>, MeshError> {
    if data.len() % N != 0 {
        return Err(MeshError::MalformedBuffer {
            attribute,
            len: data.len(),
            components: N,
        });
    }
    Ok(data
        .chunks_exact(N)
        .map(|c| {
            let mut out = [0.0; N];
            out.copy_from_slice(c);
            out
        })
        .collect())
}

fn check_count(attribute: &'static str, expected: usize, actual: usize) -> Result<(), MeshError> {
    if expected != actual {
        return Err(MeshError::AttributeCountMismatch {
            attribute,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Vertex data, material and model matrix drawn with one program.
#[derive(Debug)]
pub struct Mesh {
    positions: Vec<[f32; 3]>,
    normals: Option<Vec<[f32; 3]>>,
    tex_coords: Option<Vec<[f32; 2]>>,
    indices: Option<Vec<u32>>,
    material: Material,
    program: ProgramId,
    transform: Transform,
    vertex_array: Option<GpuResource<kind::VertexArray>>,
    attributes: AttributeMask,
}

impl Mesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn index_count(&self) -> Option<usize> {
        self.indices.as_ref().map(Vec::len)
    }

    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    pub fn normals(&self) -> Option<&[[f32; 3]]> {
        self.normals.as_deref()
    }

    pub fn tex_coords(&self) -> Option<&[[f32; 2]]> {
        self.tex_coords.as_deref()
    }

    pub fn program(&self) -> ProgramId {
        self.program
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn material_mut(&mut self) -> &mut Material {
        &mut self.material
    }

    pub fn model_matrix(&self) -> Mat4 {
        self.transform.matrix()
    }

    pub fn transform_mut(&mut self) -> &mut Transform {
        &mut self.transform
    }

    /// Attributes uploaded by the last `setup_object`, empty before that.
    pub fn attributes(&self) -> AttributeMask {
        self.attributes
    }

    pub fn is_set_up(&self) -> bool {
        self.vertex_array.is_some()
    }

    pub fn rotate(&mut self, degrees: f32, axis: Vec3) -> &mut Self {
        self.transform.rotate(degrees, axis);
        self
    }

    pub fn translate(&mut self, offset: Vec3) -> &mut Self {
        self.transform.translate(offset);
        self
    }

    pub fn scale(&mut self, factors: Vec3) -> &mut Self {
        self.transform.scale(factors);
        self
    }
}

impl Drawable for Mesh {
    fn setup_object(&mut self, gpu: &mut dyn Gpu) -> Result<(), GpuError> {
        if self.is_set_up() {
            log::debug!("Mesh already set up, skipping");
            return Ok(());
        }

        let data = VertexData {
            positions: &self.positions,
            normals: self.normals.as_deref(),
            tex_coords: self.tex_coords.as_deref(),
            indices: self.indices.as_deref(),
        };
        let id = gpu.create_vertex_array(&data)?;
        self.attributes = data.mask();
        self.vertex_array = Some(GpuResource::new(id));

        for texture in self.material.textures() {
            texture.upload(gpu)?;
        }
        Ok(())
    }

    fn draw_object(&self, gpu: &mut dyn Gpu, _frame: &FrameContext) {
        let Some(vertex_array) = &self.vertex_array else {
            return;
        };

        gpu.use_program(self.program);
        for (unit, texture) in self.material.textures().iter().enumerate() {
            if let Some(id) = texture.gpu_id() {
                gpu.bind_texture(unit as u32, id);
            }
        }
        Uniforms::new(gpu, self.program).set_mat4("model", self.transform.matrix());
        self.material.apply(gpu, self.program);

        match &self.indices {
            Some(indices) => gpu.draw_elements(vertex_array.id(), indices.len() as u32),
            None => gpu.draw_arrays(vertex_array.id(), 0, self.positions.len() as u32),
        }
    }

    fn release(&mut self, gpu: &mut dyn Gpu) {
        if let Some(vertex_array) = self.vertex_array.take() {
            vertex_array.release(gpu);
        }
        for texture in self.material.take_textures() {
            texture::release_shared(texture, gpu);
        }
        self.attributes = AttributeMask::empty();
    }

    fn apply_transform(&mut self, op: TransformOp) {
        match op {
            TransformOp::Rotate { degrees, axis } => self.rotate(degrees, axis),
            TransformOp::Translate(offset) => self.translate(offset),
            TransformOp::Scale(factors) => self.scale(factors),
        };
    }

    fn programs(&self) -> Vec<ProgramId> {
        vec![self.program]
    }

    fn name(&self) -> &'static str {
        "Mesh"
    }
}
