use std::path::Path;

use glam::{Mat3, Mat4};

use super::drawable::{Drawable, FrameContext};
use super::primitives;
use super::texture;
use crate::gpu::{
    kind, DrawState, Gpu, GpuError, GpuResource, ImageData, ProgramId, TextureId, Uniforms,
    VertexData,
};
use crate::io::AssetError;

/// Face file stems in upload order (+X, -X, +Y, -Y, +Z, -Z).
pub const FACE_NAMES: [&str; 6] = ["right", "left", "top", "bottom", "front", "back"];

/// Six square images of equal size sampled as a cube.
#[derive(Debug)]
pub struct Cubemap {
    label: String,
    faces: [ImageData; 6],
    gpu: Option<GpuResource<kind::Texture>>,
}

impl Cubemap {
    pub fn from_faces(label: impl Into<String>, faces: [ImageData; 6]) -> Result<Self, AssetError> {
        let size = faces[0].width;
        for (name, face) in FACE_NAMES.iter().zip(&faces) {
            if face.width != size || face.height != size {
                return Err(AssetError::CubeFace {
                    face: (*name).to_string(),
                    width: face.width,
                    height: face.height,
                    expected: size,
                });
            }
        }
        Ok(Self {
            label: label.into(),
            faces,
            gpu: None,
        })
    }

    /// Loads `right.<ext>`, `left.<ext>`, ... from `directory`.
    pub fn from_directory(directory: impl AsRef<Path>, extension: &str) -> Result<Self, AssetError> {
        let directory = directory.as_ref();
        log::info!("Loading cubemap from {:?}", directory);

        let mut faces: [ImageData; 6] = std::array::from_fn(|_| ImageData::solid([0; 4]));
        for (face, name) in faces.iter_mut().zip(FACE_NAMES) {
            *face = texture::decode_image(&directory.join(format!("{name}.{extension}")), false)?;
        }
        Self::from_faces(directory.to_string_lossy(), faces)
    }

    /// Uniform colour on every face.
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self {
            label: format!("solid {rgba:?}"),
            faces: std::array::from_fn(|_| ImageData::solid(rgba)),
            gpu: None,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn size(&self) -> u32 {
        self.faces[0].width
    }

    pub fn faces(&self) -> &[ImageData; 6] {
        &self.faces
    }

    pub fn gpu_id(&self) -> Option<TextureId> {
        self.gpu.as_ref().map(GpuResource::id)
    }

    pub fn upload(&mut self, gpu: &mut dyn Gpu) -> Result<TextureId, GpuError> {
        if let Some(id) = self.gpu_id() {
            return Ok(id);
        }
        let id = gpu.create_cubemap(&self.faces)?;
        self.gpu = Some(GpuResource::new(id));
        Ok(id)
    }

    pub fn release(&mut self, gpu: &mut dyn Gpu) {
        if let Some(resource) = self.gpu.take() {
            resource.release(gpu);
        }
    }
}

/// Background cube drawn around the camera.
#[derive(Debug)]
pub struct Skybox {
    program: ProgramId,
    cubemap: Cubemap,
    vertex_array: Option<GpuResource<kind::VertexArray>>,
    visible: bool,
}

impl Skybox {
    pub fn new(program: ProgramId, cubemap: Cubemap) -> Self {
        Self {
            program,
            cubemap,
            vertex_array: None,
            visible: true,
        }
    }

    pub fn cubemap(&self) -> &Cubemap {
        &self.cubemap
    }

    /// Swaps the faces. The previous upload is released; the new one happens
    /// now if the skybox is already set up, otherwise during set-up.
    pub fn set_cubemap(&mut self, gpu: &mut dyn Gpu, cubemap: Cubemap) -> Result<(), GpuError> {
        let mut old = std::mem::replace(&mut self.cubemap, cubemap);
        old.release(gpu);
        if self.vertex_array.is_some() {
            self.cubemap.upload(gpu)?;
        }
        log::info!("Skybox now shows {}", self.cubemap.label());
        Ok(())
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }
}

impl Drawable for Skybox {
    fn setup_object(&mut self, gpu: &mut dyn Gpu) -> Result<(), GpuError> {
        if self.vertex_array.is_some() {
            return Ok(());
        }
        let positions = primitives::skybox_positions();
        let id = gpu.create_vertex_array(&VertexData {
            positions: &positions,
            ..Default::default()
        })?;
        self.vertex_array = Some(GpuResource::new(id));
        self.cubemap.upload(gpu)?;
        Ok(())
    }

    fn draw_object(&self, gpu: &mut dyn Gpu, frame: &FrameContext) {
        let (Some(vertex_array), Some(texture)) = (&self.vertex_array, self.cubemap.gpu_id()) else {
            return;
        };
        if !self.visible {
            return;
        }

        // Rotation only, so the cube stays centred on the camera.
        let view = Mat4::from_mat3(Mat3::from_mat4(frame.view));

        gpu.set_draw_state(DrawState::skybox());
        gpu.use_program(self.program);
        gpu.bind_texture(0, texture);
        Uniforms::new(gpu, self.program).set_mat4("view", view);
        gpu.draw_arrays(vertex_array.id(), 0, primitives::CUBE_VERTEX_COUNT as u32);
        gpu.set_draw_state(DrawState::standard());
    }

    fn release(&mut self, gpu: &mut dyn Gpu) {
        if let Some(vertex_array) = self.vertex_array.take() {
            vertex_array.release(gpu);
        }
        self.cubemap.release(gpu);
    }

    fn programs(&self) -> Vec<ProgramId> {
        vec![self.program]
    }

    fn name(&self) -> &'static str {
        "Skybox"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{GpuCall, ProgramSource, RecordingGpu, UniformValue};
    use glam::Vec3;

    fn setup() -> (RecordingGpu, ProgramId, Skybox) {
        let mut gpu = RecordingGpu::new();
        let program = gpu.create_program(&ProgramSource::skybox()).unwrap();
        let mut skybox = Skybox::new(program, Cubemap::solid([0, 0, 255, 255]));
        skybox.setup_object(&mut gpu).unwrap();
        gpu.clear_calls();
        (gpu, program, skybox)
    }

    #[test]
    fn mismatched_faces_are_rejected() {
        let mut faces: [ImageData; 6] = std::array::from_fn(|_| ImageData::solid([0; 4]));
        faces[3] = ImageData {
            width: 2,
            height: 2,
            pixels: vec![0; 16],
        };
        let err = Cubemap::from_faces("bad", faces).unwrap_err();
        assert!(matches!(err, AssetError::CubeFace { ref face, .. } if face == "bottom"));
    }

    #[test]
    fn missing_directory_fails() {
        assert!(Cubemap::from_directory("img/skybox/none", "jpg").is_err());
    }

    #[test]
    fn draw_overrides_state_and_strips_translation() {
        let (mut gpu, program, skybox) = setup();
        let frame = FrameContext::new(
            Mat4::look_at_rh(Vec3::new(5.0, 2.0, 1.0), Vec3::ZERO, Vec3::Y),
            Mat4::IDENTITY,
            Vec3::new(5.0, 2.0, 1.0),
        );
        skybox.draw_object(&mut gpu, &frame);

        let calls = gpu.calls();
        assert_eq!(calls.first(), Some(&GpuCall::SetDrawState(DrawState::skybox())));
        assert_eq!(calls.last(), Some(&GpuCall::SetDrawState(DrawState::standard())));

        let Some(UniformValue::Mat4(view)) = gpu.last_uniform(program, "view") else {
            panic!("view not set");
        };
        assert_eq!(view.w_axis, glam::Vec4::W);
        assert!(matches!(gpu.draw_calls()[..], [GpuCall::DrawArrays { count: 36, .. }]));
    }

    #[test]
    fn hidden_skybox_draws_nothing() {
        let (mut gpu, _, mut skybox) = setup();
        skybox.set_visible(false);
        skybox.draw_object(&mut gpu, &FrameContext::default());
        assert!(gpu.calls().is_empty());
    }

    #[test]
    fn set_cubemap_releases_previous_upload() {
        let (mut gpu, _, mut skybox) = setup();
        let before = skybox.cubemap().gpu_id().unwrap();

        skybox
            .set_cubemap(&mut gpu, Cubemap::solid([255, 0, 0, 255]))
            .unwrap();
        assert!(gpu.calls().contains(&GpuCall::DeleteTexture(before)));
        assert_eq!(gpu.live_textures(), 1);
        assert_ne!(skybox.cubemap().gpu_id(), None);

        skybox.release(&mut gpu);
        assert_eq!(gpu.live_resources(), 1); // the program
    }
}
