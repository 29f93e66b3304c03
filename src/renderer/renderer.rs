use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;

use super::uniforms::{MatricesUniform, MATRICES_BINDING};
use crate::gpu::{kind, BufferId, Gpu, GpuError, GpuResource, ProgramId, Uniforms, MATRICES_BLOCK};
use crate::io::AssetError;
use crate::lights::{Light, LightCapacity, LightError, LightHandle, LightManager};
use crate::scene::{Drawable, FrameContext, ImportError, MeshError};

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Gpu(#[from] GpuError),
    #[error(transparent)]
    Light(#[from] LightError),
    #[error(transparent)]
    Mesh(#[from] MeshError),
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error(transparent)]
    Import(#[from] ImportError),
}

/// Typed index of an object owned by a [`Renderer`].
pub struct ObjectHandle<D> {
    index: usize,
    _marker: PhantomData<fn() -> D>,
}

impl<D> Clone for ObjectHandle<D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D> Copy for ObjectHandle<D> {}

impl<D> PartialEq for ObjectHandle<D> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<D> Eq for ObjectHandle<D> {}

impl<D> fmt::Debug for ObjectHandle<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectHandle#{}", self.index)
    }
}

impl<D> ObjectHandle<D> {
    /// Position in registration order.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Collects objects and lights before any GPU work happens.
pub struct RendererBuilder {
    lighting_program: ProgramId,
    objects: Vec<Box<dyn Drawable>>,
    lights: LightManager,
    shared_programs: Vec<ProgramId>,
}

impl RendererBuilder {
    /// `lighting_program` receives `viewPos` and the light arrays every frame.
    pub fn new(lighting_program: ProgramId) -> Self {
        Self {
            lighting_program,
            objects: Vec::new(),
            lights: LightManager::default(),
            shared_programs: Vec::new(),
        }
    }

    /// Replaces the per-kind light limits. Lights registered earlier are kept
    /// in order; those that no longer fit are dropped with a warning.
    pub fn with_light_capacity(mut self, capacity: LightCapacity) -> Self {
        let previous = std::mem::replace(&mut self.lights, LightManager::new(capacity));
        for (_, light) in previous.iter() {
            if let Err(err) = self.lights.add_light(light.clone()) {
                log::warn!("Dropping light: {}", err);
            }
        }
        self
    }

    pub fn add_object(mut self, object: impl Drawable + 'static) -> Self {
        self.insert_object(object);
        self
    }

    pub fn insert_object<D: Drawable + 'static>(&mut self, object: D) -> ObjectHandle<D> {
        self.objects.push(Box::new(object));
        ObjectHandle {
            index: self.objects.len() - 1,
            _marker: PhantomData,
        }
    }

    pub fn add_light(mut self, light: impl Into<Light>) -> Result<Self, LightError> {
        self.lights.add_light(light)?;
        Ok(self)
    }

    pub fn insert_light(&mut self, light: impl Into<Light>) -> Result<LightHandle, LightError> {
        self.lights.add_light(light)
    }

    /// Binds the shared matrices block of a program no registered object uses.
    pub fn share_matrices_with(mut self, program: ProgramId) -> Self {
        self.shared_programs.push(program);
        self
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Creates the shared matrices buffer, wires every known program to it
    /// and sets up each object once, in registration order.
    pub fn init(self, gpu: &mut dyn Gpu) -> Result<Renderer, RenderError> {
        let RendererBuilder {
            lighting_program,
            mut objects,
            lights,
            shared_programs,
        } = self;

        let buffer = gpu.create_uniform_buffer(MatricesUniform::SIZE)?;
        gpu.bind_uniform_buffer(buffer, MATRICES_BINDING);
        gpu.write_uniform_buffer(buffer, 0, bytemuck::bytes_of(&MatricesUniform::default()));
        let matrices = GpuResource::new(buffer);

        let mut seen = HashSet::new();
        let programs = std::iter::once(lighting_program)
            .chain(shared_programs)
            .chain(objects.iter().flat_map(|object| object.programs()))
            .filter(|program| seen.insert(*program))
            .collect::<Vec<_>>();
        for program in programs {
            match gpu.uniform_block_index(program, MATRICES_BLOCK) {
                Some(block) => gpu.bind_uniform_block(program, block, MATRICES_BINDING),
                None => log::debug!("{:?} has no {} block", program, MATRICES_BLOCK),
            }
        }

        for index in 0..objects.len() {
            if let Err(err) = objects[index].setup_object(gpu) {
                log::error!(
                    "Failed to set up {} #{}: {}",
                    objects[index].name(),
                    index,
                    err
                );
                for object in objects[..=index].iter_mut().rev() {
                    object.release(gpu);
                }
                matrices.release(gpu);
                return Err(err.into());
            }
        }

        log::info!(
            "Renderer initialised: {} objects, {} lights",
            objects.len(),
            lights.len()
        );
        Ok(Renderer {
            lighting_program,
            objects,
            lights,
            matrices: Some(matrices),
        })
    }
}

/// Owns the scene's drawables and lights and draws them every frame.
pub struct Renderer {
    lighting_program: ProgramId,
    objects: Vec<Box<dyn Drawable>>,
    lights: LightManager,
    matrices: Option<GpuResource<kind::UniformBuffer>>,
}

impl Renderer {
    /// Uploads the camera matrices, re-sends every light and draws all
    /// objects in registration order. Objects are not sorted, so blended
    /// objects must be registered after what they blend over.
    pub fn render(&self, gpu: &mut dyn Gpu, frame: &FrameContext) {
        if let Some(matrices) = &self.matrices {
            let uniform = MatricesUniform::new(frame.view, frame.projection);
            gpu.write_uniform_buffer(matrices.id(), 0, bytemuck::bytes_of(&uniform));
        }

        Uniforms::new(gpu, self.lighting_program).set_vec3("viewPos", frame.camera_position);
        self.lights.push(gpu, self.lighting_program);

        for object in &self.objects {
            object.draw_object(gpu, frame);
        }
    }

    pub fn object<D: Drawable + 'static>(&self, handle: ObjectHandle<D>) -> Option<&D> {
        let object: &dyn Drawable = &**self.objects.get(handle.index)?;
        object.as_any().downcast_ref()
    }

    pub fn object_mut<D: Drawable + 'static>(&mut self, handle: ObjectHandle<D>) -> Option<&mut D> {
        let object: &mut dyn Drawable = &mut **self.objects.get_mut(handle.index)?;
        object.as_any_mut().downcast_mut()
    }

    pub fn objects(&self) -> impl Iterator<Item = &dyn Drawable> + '_ {
        self.objects.iter().map(|object| &**object)
    }

    pub fn lights(&self) -> &LightManager {
        &self.lights
    }

    pub fn lights_mut(&mut self) -> &mut LightManager {
        &mut self.lights
    }

    pub fn lighting_program(&self) -> ProgramId {
        self.lighting_program
    }

    pub fn matrices_buffer(&self) -> Option<BufferId> {
        self.matrices.as_ref().map(GpuResource::id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Releases objects in reverse registration order, then the shared buffer.
    pub fn shutdown(mut self, gpu: &mut dyn Gpu) {
        for object in self.objects.iter_mut().rev() {
            object.release(gpu);
        }
        if let Some(matrices) = self.matrices.take() {
            matrices.release(gpu);
        }
        log::info!("Renderer shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{GpuCall, ProgramSource, RecordingGpu};
    use crate::scene::{Cubemap, Grid, MeshBuilder, Skybox};

    #[test]
    fn init_binds_matrices_block_once_per_program() {
        let mut gpu = RecordingGpu::new();
        let phong = gpu.create_program(&ProgramSource::phong()).unwrap();
        let skybox = gpu.create_program(&ProgramSource::skybox()).unwrap();
        let grid = gpu.create_program(&ProgramSource::grid()).unwrap();

        let renderer = RendererBuilder::new(phong)
            .add_object(Skybox::new(skybox, Cubemap::solid([0; 4])))
            .add_object(MeshBuilder::new(&[0.0; 9], phong).build().unwrap())
            .share_matrices_with(grid)
            .init(&mut gpu)
            .unwrap();

        let bound: Vec<ProgramId> = gpu
            .calls()
            .iter()
            .filter_map(|call| match call {
                GpuCall::BindUniformBlock {
                    program,
                    block: 0,
                    binding: MATRICES_BINDING,
                } => Some(*program),
                _ => None,
            })
            .collect();
        assert_eq!(bound, vec![phong, grid, skybox]);
        assert!(gpu.calls().contains(&GpuCall::BindUniformBuffer {
            buffer: renderer.matrices_buffer().unwrap(),
            binding: MATRICES_BINDING
        }));
        renderer.shutdown(&mut gpu);
    }

    #[test]
    fn render_writes_matrices_then_draws() {
        let mut gpu = RecordingGpu::new();
        let phong = gpu.create_program(&ProgramSource::phong()).unwrap();
        let grid = gpu.create_program(&ProgramSource::grid()).unwrap();
        let renderer = RendererBuilder::new(phong)
            .add_object(Grid::new(grid))
            .init(&mut gpu)
            .unwrap();
        gpu.clear_calls();

        let frame = FrameContext::new(
            glam::Mat4::from_translation(glam::Vec3::Z),
            glam::Mat4::IDENTITY,
            glam::Vec3::ONE,
        );
        renderer.render(&mut gpu, &frame);

        let buffer = renderer.matrices_buffer().unwrap();
        assert!(matches!(
            gpu.calls().first(),
            Some(GpuCall::WriteUniformBuffer { offset: 0, len: 128, .. })
        ));
        let contents = gpu.buffer_contents(buffer).unwrap();
        assert_eq!(
            contents,
            bytemuck::bytes_of(&MatricesUniform::new(frame.view, frame.projection))
        );
        assert_eq!(gpu.draw_calls().len(), 1);
        renderer.shutdown(&mut gpu);
    }

    #[test]
    fn typed_handles_reach_their_object() {
        let mut gpu = RecordingGpu::new();
        let grid_program = gpu.create_program(&ProgramSource::grid()).unwrap();
        let mut builder = RendererBuilder::new(ProgramId::new(99));
        let grid = builder.insert_object(Grid::new(grid_program));
        let mut renderer = builder.init(&mut gpu).unwrap();

        renderer.object_mut(grid).unwrap().set_visible(false);
        assert!(!renderer.object(grid).unwrap().is_visible());

        let wrong: ObjectHandle<Skybox> = ObjectHandle {
            index: grid.index(),
            _marker: PhantomData,
        };
        assert!(renderer.object(wrong).is_none());
        renderer.shutdown(&mut gpu);
    }

    #[test]
    fn light_capacity_change_keeps_fitting_lights() {
        use crate::lights::{Attenuation, LightColor, PointLight};

        let light = || {
            PointLight::new(
                LightColor::white(0.1, 0.5, 1.0),
                glam::Vec3::ZERO,
                Attenuation::default(),
            )
        };
        let builder = RendererBuilder::new(ProgramId::new(0))
            .add_light(light())
            .unwrap()
            .add_light(light())
            .unwrap()
            .with_light_capacity(LightCapacity {
                point: 1,
                ..Default::default()
            });

        let mut gpu = RecordingGpu::new();
        let renderer = builder.init(&mut gpu).unwrap();
        assert_eq!(renderer.lights().len(), 1);
        renderer.shutdown(&mut gpu);
    }
}
