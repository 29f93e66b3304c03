//! [`Gpu`] implementation on wgpu.
//!
//! Immediate-mode calls are recorded into [`DrawCommand`]s during the frame.
//! Program uniforms live in a CPU staging block per program; each draw
//! snapshots that block into a per-frame arena bound with a dynamic offset.
//! `end_frame` uploads the arena and replays the commands in one render pass.

mod context;
mod depth;
mod frame;
mod pipeline;
mod texture;
mod vertex;

use std::collections::{HashMap, HashSet};
use std::num::NonZeroU64;
use std::sync::Arc;

use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use super::handle::{Program, Texture, UniformBuffer, VertexArray};
use super::{
    BufferId, DrawState, Gpu, GpuError, Handle, ImageData, ProgramId, ProgramSource,
    ResourceKind, ResourcePool, Sampling, TextureId, TextureSlot, UniformValue, VertexArrayId,
    VertexData,
};
use context::GpuContext;
use frame::{DrawCommand, DrawRange, UniformArena};
use pipeline::GpuProgram;
use texture::{GpuTexture, MipGenerator};

const INITIAL_ARENA_SIZE: usize = 256 * 1024;

struct GpuMesh {
    vertices: wgpu::Buffer,
    indices: Option<wgpu::Buffer>,
    vertex_count: u32,
    index_count: u32,
}

#[derive(Default)]
struct BindingState {
    program: Option<ProgramId>,
    draw_state: DrawState,
    units: Vec<Option<TextureId>>,
    uniform_buffers: HashMap<u32, BufferId>,
}

pub struct WgpuGpu {
    context: GpuContext,
    mipmaps: MipGenerator,
    fallback_2d: GpuTexture,
    fallback_cube: GpuTexture,
    vertex_arrays: ResourcePool<VertexArray, GpuMesh>,
    textures: ResourcePool<Texture, GpuTexture>,
    programs: ResourcePool<Program, GpuProgram>,
    buffers: ResourcePool<UniformBuffer, wgpu::Buffer>,
    arena: UniformArena,
    state: BindingState,
    commands: Vec<DrawCommand>,
    clear: wgpu::Color,
    frame_open: bool,
    errors: Vec<GpuError>,
    unknown_uniforms: HashSet<(usize, String)>,
}

impl WgpuGpu {
    /// `choose_present_mode` picks from the modes the surface supports.
    pub async fn new(
        window: Arc<Window>,
        choose_present_mode: impl FnOnce(&[wgpu::PresentMode]) -> wgpu::PresentMode,
    ) -> Result<Self, GpuError> {
        let context = GpuContext::new(window, choose_present_mode).await?;
        // Validation errors are collected here until the next take_errors().
        context.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let mipmaps = MipGenerator::new(&context.device);
        let white = ImageData::solid([255, 255, 255, 255]);
        let fallback_2d = GpuTexture::from_image(
            &context.device,
            &context.queue,
            &mipmaps,
            &white,
            Sampling {
                mipmaps: false,
                ..Default::default()
            },
        )?;
        let faces: [ImageData; 6] = std::array::from_fn(|_| white.clone());
        let fallback_cube = GpuTexture::cubemap(&context.device, &context.queue, &faces)?;
        let arena = UniformArena::new(&context.device, INITIAL_ARENA_SIZE);

        Ok(Self {
            context,
            mipmaps,
            fallback_2d,
            fallback_cube,
            vertex_arrays: ResourcePool::new(),
            textures: ResourcePool::new(),
            programs: ResourcePool::new(),
            buffers: ResourcePool::new(),
            arena,
            state: BindingState::default(),
            commands: Vec::new(),
            clear: wgpu::Color::BLACK,
            frame_open: false,
            errors: Vec::new(),
            unknown_uniforms: HashSet::new(),
        })
    }

    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        self.context.resize(size);
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    pub fn aspect_ratio(&self) -> f32 {
        let size = self.context.size;
        size.width.max(1) as f32 / size.height.max(1) as f32
    }

    fn unknown<T: ResourceKind>(&mut self, handle: Handle<T>) {
        log::warn!("Call on unknown {:?}", handle);
        self.errors.push(GpuError::UnknownHandle {
            kind: T::LABEL,
            index: handle.index(),
        });
    }

    fn record_draw(&mut self, vao: VertexArrayId, range: DrawRange) {
        if !self.frame_open {
            log::warn!("Draw of {:?} outside begin_frame/end_frame ignored", vao);
            return;
        }
        let Some(program_id) = self.state.program else {
            self.errors
                .push(GpuError::Validation("draw without a program in use".into()));
            return;
        };
        let Some(mesh) = self.vertex_arrays.get(vao) else {
            self.unknown(vao);
            return;
        };

        let (needed, available) = match range {
            DrawRange::Arrays { first, count } => (first + count, mesh.vertex_count),
            DrawRange::Elements { count } => (count, mesh.index_count),
        };
        if needed > available {
            self.errors.push(GpuError::Validation(format!(
                "draw of {needed} elements from {vao:?} holding {available}"
            )));
            return;
        }
        if needed == 0 {
            return;
        }
        let vertices = mesh.vertices.clone();
        let indices = mesh.indices.clone();

        let Some(program) = self.programs.get_mut(program_id) else {
            self.unknown(program_id);
            return;
        };

        let mut shared = Vec::with_capacity(program.blocks.len());
        for (block, binding) in program.blocks.iter().zip(&program.block_bindings) {
            match binding.and_then(|b| self.state.uniform_buffers.get(&b).copied()) {
                Some(buffer) => shared.push(buffer),
                None => {
                    self.errors.push(GpuError::Validation(format!(
                        "block {block} of program {} has no buffer bound",
                        program.label
                    )));
                    return;
                }
            }
        }

        let uniform_offset =
            (!program.staging.is_empty()).then(|| self.arena.push(&program.staging));
        let textures = (0..program.textures.len())
            .map(|unit| self.state.units.get(unit).copied().flatten())
            .collect();
        let pipeline = program.pipeline(
            &self.context.device,
            self.context.config.format,
            self.state.draw_state,
        );

        self.commands.push(DrawCommand {
            program: program_id,
            pipeline,
            uniform_offset,
            shared,
            textures,
            vertices,
            indices,
            range,
        });
    }

    /// Resolves the three bind groups of a recorded draw, reusing cached groups.
    fn bind_groups_for(&mut self, command: &DrawCommand) -> Option<[wgpu::BindGroup; 3]> {
        let device = &self.context.device;
        let program = self.programs.get_mut(command.program)?;

        let shared = match &program.shared_group {
            Some((key, group)) if *key == command.shared => group.clone(),
            _ => {
                let mut entries = Vec::with_capacity(command.shared.len());
                for (binding, id) in command.shared.iter().enumerate() {
                    let Some(buffer) = self.buffers.get(*id) else {
                        self.errors.push(GpuError::UnknownHandle {
                            kind: UniformBuffer::LABEL,
                            index: id.index(),
                        });
                        return None;
                    };
                    entries.push(wgpu::BindGroupEntry {
                        binding: binding as u32,
                        resource: buffer.as_entire_binding(),
                    });
                }
                let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("SharedBlocks"),
                    layout: &program.shared_layout,
                    entries: &entries,
                });
                program.shared_group = Some((command.shared.clone(), group.clone()));
                group
            }
        };

        let generation = self.arena.generation();
        let uniforms = match &program.uniform_group {
            Some((key, group)) if *key == generation => group.clone(),
            _ => {
                let entries: Vec<_> = NonZeroU64::new(program.uniforms.size() as u64)
                    .map(|size| wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                            buffer: &self.arena.buffer,
                            offset: 0,
                            size: Some(size),
                        }),
                    })
                    .into_iter()
                    .collect();
                let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("ProgramUniforms"),
                    layout: &program.uniform_layout,
                    entries: &entries,
                });
                program.uniform_group = Some((generation, group.clone()));
                group
            }
        };

        let textures = match program.texture_groups.get(&command.textures) {
            Some(group) => group.clone(),
            None => {
                let mut entries = Vec::with_capacity(program.textures.len() * 2);
                for (unit, slot) in program.textures.iter().enumerate() {
                    let wants_cube = *slot == TextureSlot::Cube;
                    let fallback = if wants_cube {
                        &self.fallback_cube
                    } else {
                        &self.fallback_2d
                    };
                    let texture = command.textures[unit]
                        .and_then(|id| self.textures.get(id))
                        .filter(|texture| texture.is_cube() == wants_cube)
                        .unwrap_or(fallback);
                    entries.push(wgpu::BindGroupEntry {
                        binding: unit as u32 * 2,
                        resource: wgpu::BindingResource::TextureView(&texture.view),
                    });
                    entries.push(wgpu::BindGroupEntry {
                        binding: unit as u32 * 2 + 1,
                        resource: wgpu::BindingResource::Sampler(&texture.sampler),
                    });
                }
                let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("ProgramTextures"),
                    layout: &program.texture_layout,
                    entries: &entries,
                });
                program
                    .texture_groups
                    .insert(command.textures.clone(), group.clone());
                group
            }
        };

        Some([shared, uniforms, textures])
    }

    fn invalidate_bind_groups(&mut self) {
        for program in self.programs.values_mut() {
            program.invalidate_bind_groups();
        }
    }
}

impl Gpu for WgpuGpu {
    fn create_vertex_array(&mut self, data: &VertexData<'_>) -> Result<VertexArrayId, GpuError> {
        let mut vertices = vertex::interleave(data);
        let vertex_count = vertices.len() as u32;
        // Zero-sized buffers cannot be bound.
        if vertices.is_empty() {
            vertices.push(bytemuck::Zeroable::zeroed());
        }

        let vertex_buffer =
            self.context
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("VertexBuffer"),
                    contents: bytemuck::cast_slice(&vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                });

        let (index_buffer, index_count) = match data.indices {
            Some(indices) if !indices.is_empty() => {
                let buffer =
                    self.context
                        .device
                        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                            label: Some("IndexBuffer"),
                            contents: bytemuck::cast_slice(indices),
                            usage: wgpu::BufferUsages::INDEX,
                        });
                (Some(buffer), indices.len() as u32)
            }
            _ => (None, 0),
        };

        let id = self.vertex_arrays.insert(GpuMesh {
            vertices: vertex_buffer,
            indices: index_buffer,
            vertex_count,
            index_count,
        });
        log::debug!(
            "Created {:?}: {} vertices, {} indices, {:?}",
            id,
            vertex_count,
            index_count,
            data.mask()
        );
        Ok(id)
    }

    fn delete_vertex_array(&mut self, id: VertexArrayId) {
        if self.vertex_arrays.remove(id).is_none() {
            self.unknown(id);
        }
    }

    fn create_texture(
        &mut self,
        image: &ImageData,
        sampling: Sampling,
    ) -> Result<TextureId, GpuError> {
        let texture = GpuTexture::from_image(
            &self.context.device,
            &self.context.queue,
            &self.mipmaps,
            image,
            sampling,
        )?;
        Ok(self.textures.insert(texture))
    }

    fn create_cubemap(&mut self, faces: &[ImageData; 6]) -> Result<TextureId, GpuError> {
        let texture = GpuTexture::cubemap(&self.context.device, &self.context.queue, faces)?;
        Ok(self.textures.insert(texture))
    }

    fn delete_texture(&mut self, id: TextureId) {
        if self.textures.remove(id).is_none() {
            self.unknown(id);
            return;
        }
        for unit in self.state.units.iter_mut() {
            if *unit == Some(id) {
                *unit = None;
            }
        }
        self.invalidate_bind_groups();
    }

    fn create_program(&mut self, source: &ProgramSource) -> Result<ProgramId, GpuError> {
        let program = GpuProgram::new(&self.context.device, source);
        let id = self.programs.insert(program);
        log::info!(
            "Created program {} ({} uniform bytes, {} texture slots)",
            source.label,
            source.uniforms.size(),
            source.textures.len()
        );
        Ok(id)
    }

    fn delete_program(&mut self, id: ProgramId) {
        if self.programs.remove(id).is_none() {
            self.unknown(id);
            return;
        }
        if self.state.program == Some(id) {
            self.state.program = None;
        }
    }

    fn use_program(&mut self, program: ProgramId) {
        if self.programs.get(program).is_none() {
            self.unknown(program);
            return;
        }
        self.state.program = Some(program);
    }

    fn set_uniform(&mut self, program_id: ProgramId, name: &str, value: UniformValue) {
        let Some(program) = self.programs.get_mut(program_id) else {
            self.unknown(program_id);
            return;
        };
        match program.uniforms.field(name) {
            Some(field) if field.kind == value.kind() => {
                value.write_to(&mut program.staging[field.offset..]);
            }
            Some(field) => log::debug!(
                "Uniform {} of {} is {:?}, ignoring {:?}",
                name,
                program.label,
                field.kind,
                value.kind()
            ),
            None => {
                if self
                    .unknown_uniforms
                    .insert((program_id.index(), name.to_string()))
                {
                    log::debug!("Program {} has no uniform {}", program.label, name);
                }
            }
        }
    }

    fn uniform_block_index(&self, program: ProgramId, name: &str) -> Option<u32> {
        let program = self.programs.get(program)?;
        program
            .blocks
            .iter()
            .position(|block| block == name)
            .map(|index| index as u32)
    }

    fn bind_uniform_block(&mut self, program_id: ProgramId, block: u32, binding: u32) {
        let Some(program) = self.programs.get_mut(program_id) else {
            self.unknown(program_id);
            return;
        };
        match program.block_bindings.get_mut(block as usize) {
            Some(slot) => {
                *slot = Some(binding);
                program.shared_group = None;
            }
            None => self.errors.push(GpuError::Validation(format!(
                "program {} has no uniform block {block}",
                program.label
            ))),
        }
    }

    fn create_uniform_buffer(&mut self, size: usize) -> Result<BufferId, GpuError> {
        let buffer = self.context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("UniformBuffer"),
            size: size as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Ok(self.buffers.insert(buffer))
    }

    fn bind_uniform_buffer(&mut self, buffer: BufferId, binding: u32) {
        if self.buffers.get(buffer).is_none() {
            self.unknown(buffer);
            return;
        }
        self.state.uniform_buffers.insert(binding, buffer);
    }

    fn write_uniform_buffer(&mut self, buffer: BufferId, offset: usize, bytes: &[u8]) {
        match self.buffers.get(buffer) {
            Some(target) => self
                .context
                .queue
                .write_buffer(target, offset as u64, bytes),
            None => self.unknown(buffer),
        }
    }

    fn delete_uniform_buffer(&mut self, id: BufferId) {
        if self.buffers.remove(id).is_none() {
            self.unknown(id);
            return;
        }
        self.state.uniform_buffers.retain(|_, bound| *bound != id);
        self.invalidate_bind_groups();
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        if self.textures.get(texture).is_none() {
            self.unknown(texture);
            return;
        }
        let unit = unit as usize;
        if self.state.units.len() <= unit {
            self.state.units.resize(unit + 1, None);
        }
        self.state.units[unit] = Some(texture);
    }

    fn set_draw_state(&mut self, state: DrawState) {
        self.state.draw_state = state;
    }

    fn draw_arrays(&mut self, vao: VertexArrayId, first: u32, count: u32) {
        self.record_draw(vao, DrawRange::Arrays { first, count });
    }

    fn draw_elements(&mut self, vao: VertexArrayId, count: u32) {
        self.record_draw(vao, DrawRange::Elements { count });
    }

    fn begin_frame(&mut self, clear: [f32; 4]) {
        if self.frame_open {
            log::warn!("begin_frame called twice; discarding {} draws", self.commands.len());
        }
        self.frame_open = true;
        self.commands.clear();
        self.arena.begin_frame();
        self.state.draw_state = DrawState::standard();
        self.clear = wgpu::Color {
            r: clear[0] as f64,
            g: clear[1] as f64,
            b: clear[2] as f64,
            a: clear[3] as f64,
        };
    }

    fn end_frame(&mut self) {
        if !self.frame_open {
            return;
        }
        self.frame_open = false;

        let commands = std::mem::take(&mut self.commands);
        self.arena
            .flush(&self.context.device, &self.context.queue);

        let frame = match self.context.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.context.reconfigure();
                self.errors
                    .push(GpuError::Surface("surface lost, reconfigured".into()));
                return;
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Surface timeout, skipping frame");
                return;
            }
            Err(e) => {
                self.errors.push(GpuError::Surface(e.to_string()));
                return;
            }
        };

        let mut prepared = Vec::with_capacity(commands.len());
        for command in commands {
            if let Some(groups) = self.bind_groups_for(&command) {
                prepared.push((command, groups));
            }
        }

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Encoder"),
                });

        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("ScenePass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.context.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for (command, groups) in &prepared {
                rpass.set_pipeline(&command.pipeline);
                rpass.set_bind_group(0, &groups[0], &[]);
                let offsets = command.uniform_offset.as_slice();
                rpass.set_bind_group(1, &groups[1], offsets);
                rpass.set_bind_group(2, &groups[2], &[]);
                rpass.set_vertex_buffer(0, command.vertices.slice(..));

                match command.range {
                    DrawRange::Arrays { first, count } => rpass.draw(first..first + count, 0..1),
                    DrawRange::Elements { count } => {
                        if let Some(indices) = &command.indices {
                            rpass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                            rpass.draw_indexed(0..count, 0, 0..1);
                        }
                    }
                }
            }
        }

        self.context.queue.submit(Some(encoder.finish()));
        frame.present();
    }

    fn take_errors(&mut self) -> Vec<GpuError> {
        if let Some(error) = pollster::block_on(self.context.device.pop_error_scope()) {
            self.errors.push(GpuError::Validation(error.to_string()));
        }
        self.context
            .device
            .push_error_scope(wgpu::ErrorFilter::Validation);
        std::mem::take(&mut self.errors)
    }
}
