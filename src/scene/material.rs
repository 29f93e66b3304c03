use std::rc::Rc;

use glam::Vec3;

use super::texture::{Texture, TextureRole};
use crate::gpu::{Gpu, ProgramId, Uniforms};

/// Phong material. Textures are bound to consecutive units in the order they
/// were added.
#[derive(Debug, Clone)]
pub struct Material {
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub shininess: f32,
    textures: Vec<Rc<Texture>>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            ambient: Vec3::ONE,
            diffuse: Vec3::ONE,
            specular: Vec3::splat(0.5),
            shininess: 32.0,
            textures: Vec::new(),
        }
    }
}

impl Material {
    pub fn new(ambient: Vec3, diffuse: Vec3, specular: Vec3, shininess: f32) -> Self {
        Self {
            ambient,
            diffuse,
            specular,
            shininess,
            textures: Vec::new(),
        }
    }

    pub fn with_texture(mut self, texture: Rc<Texture>) -> Self {
        self.textures.push(texture);
        self
    }

    pub fn with_shininess(mut self, shininess: f32) -> Self {
        self.shininess = shininess;
        self
    }

    pub fn add_texture(&mut self, texture: Rc<Texture>) {
        self.textures.push(texture);
    }

    pub fn textures(&self) -> &[Rc<Texture>] {
        &self.textures
    }

    pub fn texture(&self, role: TextureRole) -> Option<&Rc<Texture>> {
        self.textures.iter().find(|texture| texture.role() == role)
    }

    pub(crate) fn take_textures(&mut self) -> Vec<Rc<Texture>> {
        std::mem::take(&mut self.textures)
    }

    pub(crate) fn apply(&self, gpu: &mut dyn Gpu, program: ProgramId) {
        Uniforms::new(gpu, program)
            .set_vec3("material.ambient", self.ambient)
            .set_vec3("material.diffuse", self.diffuse)
            .set_vec3("material.specular", self.specular)
            .set_float("material.shininess", self.shininess);
    }
}
