use std::path::Path;

use super::{GpuError, StructDef, UniformKind, UniformLayout};

/// Name of the shared view/projection uniform block.
pub const MATRICES_BLOCK: &str = "Matrices";

pub const MAX_DIRECTIONAL_LIGHTS: usize = 4;
pub const MAX_POINT_LIGHTS: usize = 16;
pub const MAX_SPOT_LIGHTS: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    D2,
    Cube,
}

/// Everything a backend needs to build a shader program.
///
/// Bind group 0 holds the shared `blocks` in declaration order, group 1 the
/// program's own `uniforms`, group 2 one texture/sampler pair per slot
/// (texture at binding `2k`, sampler at `2k + 1`).
#[derive(Clone, Debug)]
pub struct ProgramSource {
    pub label: String,
    pub wgsl: String,
    pub uniforms: UniformLayout,
    pub blocks: Vec<String>,
    pub textures: Vec<TextureSlot>,
}

impl ProgramSource {
    pub fn new(label: impl Into<String>, wgsl: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            wgsl: wgsl.into(),
            uniforms: UniformLayout::empty(),
            blocks: Vec::new(),
            textures: Vec::new(),
        }
    }

    pub fn from_wgsl_file(label: &str, path: impl AsRef<Path>) -> Result<Self, GpuError> {
        let path = path.as_ref();
        let wgsl = std::fs::read_to_string(path).map_err(|e| GpuError::Program {
            label: label.to_string(),
            message: format!("failed to read {}: {e}", path.display()),
        })?;
        log::info!("Loaded shader source {:?}", path);
        Ok(Self::new(label, wgsl))
    }

    pub fn with_uniforms(mut self, layout: UniformLayout) -> Self {
        self.uniforms = layout;
        self
    }

    pub fn with_block(mut self, name: &str) -> Self {
        self.blocks.push(name.to_string());
        self
    }

    pub fn with_texture(mut self, slot: TextureSlot) -> Self {
        self.textures.push(slot);
        self
    }

    /// Lit meshes. Texture unit 0 is the diffuse map, unit 1 the specular map.
    pub fn phong() -> Self {
        Self::new("phong", include_str!("../shaders/phong.wgsl"))
            .with_uniforms(phong_layout())
            .with_block(MATRICES_BLOCK)
            .with_texture(TextureSlot::D2)
            .with_texture(TextureSlot::D2)
    }

    pub fn skybox() -> Self {
        Self::new("skybox", include_str!("../shaders/skybox.wgsl"))
            .with_uniforms(
                UniformLayout::builder()
                    .field("view", UniformKind::Mat4)
                    .build(),
            )
            .with_block(MATRICES_BLOCK)
            .with_texture(TextureSlot::Cube)
    }

    pub fn grid() -> Self {
        Self::new("grid", include_str!("../shaders/grid.wgsl"))
            .with_uniforms(
                UniformLayout::builder()
                    .field("inverseViewProjection", UniformKind::Mat4)
                    .build(),
            )
            .with_block(MATRICES_BLOCK)
    }
}

fn phong_layout() -> UniformLayout {
    let material = StructDef::new()
        .field("ambient", UniformKind::Vec3)
        .field("diffuse", UniformKind::Vec3)
        .field("specular", UniformKind::Vec3)
        .field("shininess", UniformKind::Float);

    let directional = StructDef::new()
        .field("direction", UniformKind::Vec3)
        .field("ambient", UniformKind::Vec3)
        .field("diffuse", UniformKind::Vec3)
        .field("specular", UniformKind::Vec3);

    let point = StructDef::new()
        .field("position", UniformKind::Vec3)
        .field("ambient", UniformKind::Vec3)
        .field("diffuse", UniformKind::Vec3)
        .field("specular", UniformKind::Vec3)
        .field("constant", UniformKind::Float)
        .field("linear", UniformKind::Float)
        .field("quadratic", UniformKind::Float);

    let spot = StructDef::new()
        .field("position", UniformKind::Vec3)
        .field("direction", UniformKind::Vec3)
        .field("ambient", UniformKind::Vec3)
        .field("diffuse", UniformKind::Vec3)
        .field("specular", UniformKind::Vec3)
        .field("constant", UniformKind::Float)
        .field("linear", UniformKind::Float)
        .field("quadratic", UniformKind::Float)
        .field("cutOff", UniformKind::Float)
        .field("outerCutOff", UniformKind::Float);

    UniformLayout::builder()
        .field("model", UniformKind::Mat4)
        .field("viewPos", UniformKind::Vec3)
        .field("dirLightCount", UniformKind::Int)
        .field("pointLightCount", UniformKind::Int)
        .field("spotLightCount", UniformKind::Int)
        .structure("material", &material)
        .struct_array("dirLights", MAX_DIRECTIONAL_LIGHTS, &directional)
        .struct_array("pointLights", MAX_POINT_LIGHTS, &point)
        .struct_array("spotLights", MAX_SPOT_LIGHTS, &spot)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phong_layout_matches_wgsl_struct() {
        let layout = ProgramSource::phong().uniforms;
        let offset = |name: &str| layout.field(name).unwrap().offset;

        assert_eq!(offset("model"), 0);
        assert_eq!(offset("viewPos"), 64);
        assert_eq!(offset("dirLightCount"), 76);
        assert_eq!(offset("spotLightCount"), 84);
        assert_eq!(offset("material.ambient"), 96);
        assert_eq!(offset("material.shininess"), 140);
        assert_eq!(offset("dirLights[0].direction"), 144);
        assert_eq!(offset("dirLights[3].specular"), 144 + 3 * 64 + 48);
        assert_eq!(offset("pointLights[0].position"), 400);
        assert_eq!(offset("pointLights[15].quadratic"), 400 + 15 * 80 + 68);
        assert_eq!(offset("spotLights[0].position"), 1680);
        assert_eq!(offset("spotLights[7].outerCutOff"), 1680 + 7 * 96 + 92);
        assert_eq!(layout.size(), 2448);
    }

    #[test]
    fn builtins_declare_shared_matrices() {
        for source in [
            ProgramSource::phong(),
            ProgramSource::skybox(),
            ProgramSource::grid(),
        ] {
            assert_eq!(source.blocks, vec![MATRICES_BLOCK.to_string()]);
            assert!(source.wgsl.contains("fn vs_main"));
            assert!(source.wgsl.contains("fn fs_main"));
        }
        assert_eq!(ProgramSource::skybox().textures, vec![TextureSlot::Cube]);
        assert!(ProgramSource::grid().textures.is_empty());
    }
}
