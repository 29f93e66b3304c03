use std::collections::HashMap;
use std::num::NonZeroU64;

use super::depth::DEPTH_FORMAT;
use super::vertex::Vertex;
use crate::gpu::{BufferId, DepthCompare, DrawState, ProgramSource, TextureId, TextureSlot, UniformLayout};

/// Builder for render pipelines with the defaults every program shares.
pub(crate) struct PipelineBuilder<'a> {
    device: &'a wgpu::Device,
    label: Option<&'a str>,
    layout: &'a wgpu::PipelineLayout,
    shader: &'a wgpu::ShaderModule,
    vertex_buffers: Vec<wgpu::VertexBufferLayout<'a>>,
    color_targets: Vec<Option<wgpu::ColorTargetState>>,
    depth_stencil: Option<wgpu::DepthStencilState>,
    primitive: wgpu::PrimitiveState,
}

impl<'a> PipelineBuilder<'a> {
    pub(crate) fn new(
        device: &'a wgpu::Device,
        layout: &'a wgpu::PipelineLayout,
        shader: &'a wgpu::ShaderModule,
    ) -> Self {
        Self {
            device,
            label: None,
            layout,
            shader,
            vertex_buffers: Vec::new(),
            color_targets: Vec::new(),
            depth_stencil: None,
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Back),
                front_face: wgpu::FrontFace::Ccw,
                polygon_mode: wgpu::PolygonMode::Fill,
                ..Default::default()
            },
        }
    }

    pub(crate) fn with_label(mut self, label: &'a str) -> Self {
        self.label = Some(label);
        self
    }

    pub(crate) fn with_vertex_buffer(mut self, layout: wgpu::VertexBufferLayout<'a>) -> Self {
        self.vertex_buffers.push(layout);
        self
    }

    pub(crate) fn with_color_target(
        mut self,
        format: wgpu::TextureFormat,
        blend: Option<wgpu::BlendState>,
    ) -> Self {
        self.color_targets.push(Some(wgpu::ColorTargetState {
            format,
            blend,
            write_mask: wgpu::ColorWrites::ALL,
        }));
        self
    }

    pub(crate) fn with_depth_stencil(
        mut self,
        format: wgpu::TextureFormat,
        depth_write: bool,
        depth_compare: wgpu::CompareFunction,
    ) -> Self {
        self.depth_stencil = Some(wgpu::DepthStencilState {
            format,
            depth_write_enabled: depth_write,
            depth_compare,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });
        self
    }

    pub(crate) fn with_no_culling(mut self) -> Self {
        self.primitive.cull_mode = None;
        self
    }

    pub(crate) fn build(self) -> wgpu::RenderPipeline {
        self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: self.label,
            layout: Some(self.layout),
            vertex: wgpu::VertexState {
                module: self.shader,
                entry_point: Some("vs_main"),
                buffers: &self.vertex_buffers,
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: self.shader,
                entry_point: Some("fs_main"),
                targets: &self.color_targets,
                compilation_options: Default::default(),
            }),
            primitive: self.primitive,
            depth_stencil: self.depth_stencil,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    }
}

/// A compiled program with its bind group layouts and per-draw-state pipelines.
pub(crate) struct GpuProgram {
    pub(crate) label: String,
    pub(crate) uniforms: UniformLayout,
    pub(crate) staging: Vec<u8>,
    pub(crate) blocks: Vec<String>,
    /// Binding point assigned to each block, by block index.
    pub(crate) block_bindings: Vec<Option<u32>>,
    pub(crate) textures: Vec<TextureSlot>,
    shader: wgpu::ShaderModule,
    pub(crate) shared_layout: wgpu::BindGroupLayout,
    pub(crate) uniform_layout: wgpu::BindGroupLayout,
    pub(crate) texture_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: HashMap<DrawState, wgpu::RenderPipeline>,
    pub(crate) shared_group: Option<(Vec<BufferId>, wgpu::BindGroup)>,
    pub(crate) uniform_group: Option<(u64, wgpu::BindGroup)>,
    pub(crate) texture_groups: HashMap<Vec<Option<TextureId>>, wgpu::BindGroup>,
}

impl GpuProgram {
    pub(crate) fn new(device: &wgpu::Device, source: &ProgramSource) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&source.label),
            source: wgpu::ShaderSource::Wgsl(source.wgsl.as_str().into()),
        });

        let shared_entries: Vec<_> = (0..source.blocks.len() as u32)
            .map(|binding| wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            })
            .collect();
        let shared_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("SharedBlocksLayout"),
            entries: &shared_entries,
        });

        let uniform_entries: Vec<_> = NonZeroU64::new(source.uniforms.size() as u64)
            .map(|size| wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: Some(size),
                },
                count: None,
            })
            .into_iter()
            .collect();
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ProgramUniformsLayout"),
            entries: &uniform_entries,
        });

        let texture_entries: Vec<_> = source
            .textures
            .iter()
            .enumerate()
            .flat_map(|(unit, slot)| {
                let view_dimension = match slot {
                    TextureSlot::D2 => wgpu::TextureViewDimension::D2,
                    TextureSlot::Cube => wgpu::TextureViewDimension::Cube,
                };
                [
                    wgpu::BindGroupLayoutEntry {
                        binding: unit as u32 * 2,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: unit as u32 * 2 + 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ]
            })
            .collect();
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ProgramTexturesLayout"),
            entries: &texture_entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&source.label),
            bind_group_layouts: &[&shared_layout, &uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        Self {
            label: source.label.clone(),
            uniforms: source.uniforms.clone(),
            staging: vec![0; source.uniforms.size()],
            blocks: source.blocks.clone(),
            block_bindings: vec![None; source.blocks.len()],
            textures: source.textures.clone(),
            shader,
            shared_layout,
            uniform_layout,
            texture_layout,
            pipeline_layout,
            pipelines: HashMap::new(),
            shared_group: None,
            uniform_group: None,
            texture_groups: HashMap::new(),
        }
    }

    pub(crate) fn pipeline(
        &mut self,
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        state: DrawState,
    ) -> wgpu::RenderPipeline {
        if let Some(pipeline) = self.pipelines.get(&state) {
            return pipeline.clone();
        }

        log::debug!("Creating pipeline for {} with {:?}", self.label, state);

        let (depth_write, depth_compare) = if state.depth_test {
            let compare = match state.depth_compare {
                DepthCompare::Less => wgpu::CompareFunction::Less,
                DepthCompare::LessEqual => wgpu::CompareFunction::LessEqual,
                DepthCompare::Always => wgpu::CompareFunction::Always,
            };
            (state.depth_write, compare)
        } else {
            (false, wgpu::CompareFunction::Always)
        };

        let blend = state.blend.then_some(wgpu::BlendState::ALPHA_BLENDING);

        let mut builder = PipelineBuilder::new(device, &self.pipeline_layout, &self.shader)
            .with_label(&self.label)
            .with_vertex_buffer(Vertex::layout())
            .with_color_target(color_format, blend)
            .with_depth_stencil(DEPTH_FORMAT, depth_write, depth_compare);
        if !state.cull_back_faces {
            builder = builder.with_no_culling();
        }

        let pipeline = builder.build();
        self.pipelines.insert(state, pipeline.clone());
        pipeline
    }

    pub(crate) fn invalidate_bind_groups(&mut self) {
        self.shared_group = None;
        self.uniform_group = None;
        self.texture_groups.clear();
    }
}
