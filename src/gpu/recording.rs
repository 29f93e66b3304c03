use std::collections::HashSet;

use super::handle::{Program, Texture, UniformBuffer, VertexArray};
use super::{
    AttributeMask, BufferId, DrawState, Gpu, GpuError, Handle, ImageData, ProgramId,
    ProgramSource, ResourceKind, ResourcePool, Sampling, TextureId, UniformLayout,
    UniformValue, VertexArrayId, VertexData,
};

/// One call made against a [`RecordingGpu`].
#[derive(Clone, Debug, PartialEq)]
pub enum GpuCall {
    CreateVertexArray {
        id: VertexArrayId,
        vertex_count: usize,
        index_count: Option<usize>,
        mask: AttributeMask,
    },
    DeleteVertexArray(VertexArrayId),
    CreateTexture {
        id: TextureId,
        width: u32,
        height: u32,
    },
    CreateCubemap {
        id: TextureId,
        size: u32,
    },
    DeleteTexture(TextureId),
    CreateProgram {
        id: ProgramId,
        label: String,
    },
    DeleteProgram(ProgramId),
    UseProgram(ProgramId),
    SetUniform {
        program: ProgramId,
        name: String,
        value: UniformValue,
    },
    BindUniformBlock {
        program: ProgramId,
        block: u32,
        binding: u32,
    },
    CreateUniformBuffer {
        id: BufferId,
        size: usize,
    },
    BindUniformBuffer {
        buffer: BufferId,
        binding: u32,
    },
    WriteUniformBuffer {
        buffer: BufferId,
        offset: usize,
        len: usize,
    },
    DeleteUniformBuffer(BufferId),
    BindTexture {
        unit: u32,
        texture: TextureId,
    },
    SetDrawState(DrawState),
    DrawArrays {
        vao: VertexArrayId,
        first: u32,
        count: u32,
    },
    DrawElements {
        vao: VertexArrayId,
        count: u32,
    },
    BeginFrame,
    EndFrame,
}

impl GpuCall {
    pub fn is_draw(&self) -> bool {
        matches!(self, GpuCall::DrawArrays { .. } | GpuCall::DrawElements { .. })
    }
}

struct RecordedProgram {
    label: String,
    layout: UniformLayout,
    blocks: Vec<String>,
}

struct RecordedVertexArray {
    vertex_count: usize,
    index_count: Option<usize>,
}

/// Headless [`Gpu`] that logs every call instead of rendering.
///
/// Resource bookkeeping mirrors a real backend closely enough to catch leaks,
/// double frees and draws with stale handles.
#[derive(Default)]
pub struct RecordingGpu {
    calls: Vec<GpuCall>,
    errors: Vec<GpuError>,
    vertex_arrays: ResourcePool<VertexArray, RecordedVertexArray>,
    textures: ResourcePool<Texture, (u32, u32)>,
    programs: ResourcePool<Program, RecordedProgram>,
    buffers: ResourcePool<UniformBuffer, Vec<u8>>,
    unknown_uniforms: HashSet<(usize, String)>,
    in_frame: bool,
}

impl RecordingGpu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[GpuCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn draw_calls(&self) -> Vec<&GpuCall> {
        self.calls.iter().filter(|call| call.is_draw()).collect()
    }

    /// `(name, value)` of every `set_uniform` whose name starts with `prefix`.
    pub fn uniform_writes(&self, prefix: &str) -> Vec<(&str, UniformValue)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                GpuCall::SetUniform { name, value, .. } if name.starts_with(prefix) => {
                    Some((name.as_str(), *value))
                }
                _ => None,
            })
            .collect()
    }

    /// Most recent value written to `name` on `program`.
    pub fn last_uniform(&self, program: ProgramId, name: &str) -> Option<UniformValue> {
        self.calls.iter().rev().find_map(|call| match call {
            GpuCall::SetUniform {
                program: p,
                name: n,
                value,
            } if *p == program && n == name => Some(*value),
            _ => None,
        })
    }

    pub fn buffer_contents(&self, buffer: BufferId) -> Option<&[u8]> {
        self.buffers.get(buffer).map(Vec::as_slice)
    }

    pub fn live_resources(&self) -> usize {
        self.vertex_arrays.len() + self.textures.len() + self.programs.len() + self.buffers.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_vertex_arrays(&self) -> usize {
        self.vertex_arrays.len()
    }

    fn unknown<T: ResourceKind>(&mut self, handle: Handle<T>) {
        log::warn!("Call on unknown {:?}", handle);
        self.errors.push(GpuError::UnknownHandle {
            kind: T::LABEL,
            index: handle.index(),
        });
    }

    fn check_draw(&mut self, vao: VertexArrayId, count: u32, indexed: bool) {
        let Some(recorded) = self.vertex_arrays.get(vao) else {
            self.unknown(vao);
            return;
        };
        let available = if indexed {
            recorded.index_count.unwrap_or(0)
        } else {
            recorded.vertex_count
        };
        if count as usize > available {
            self.errors.push(GpuError::Validation(format!(
                "draw of {count} elements from {vao:?} holding {available}"
            )));
        }
        if !self.in_frame {
            log::debug!("Draw of {:?} outside begin_frame/end_frame", vao);
        }
    }
}

impl Gpu for RecordingGpu {
    fn create_vertex_array(&mut self, data: &VertexData<'_>) -> Result<VertexArrayId, GpuError> {
        let id = self.vertex_arrays.insert(RecordedVertexArray {
            vertex_count: data.vertex_count(),
            index_count: data.indices.map(<[u32]>::len),
        });
        self.calls.push(GpuCall::CreateVertexArray {
            id,
            vertex_count: data.vertex_count(),
            index_count: data.indices.map(<[u32]>::len),
            mask: data.mask(),
        });
        Ok(id)
    }

    fn delete_vertex_array(&mut self, id: VertexArrayId) {
        if self.vertex_arrays.remove(id).is_none() {
            self.unknown(id);
        }
        self.calls.push(GpuCall::DeleteVertexArray(id));
    }

    fn create_texture(
        &mut self,
        image: &ImageData,
        _sampling: Sampling,
    ) -> Result<TextureId, GpuError> {
        image.check()?;
        let id = self.textures.insert((image.width, image.height));
        self.calls.push(GpuCall::CreateTexture {
            id,
            width: image.width,
            height: image.height,
        });
        Ok(id)
    }

    fn create_cubemap(&mut self, faces: &[ImageData; 6]) -> Result<TextureId, GpuError> {
        let size = faces[0].width;
        for face in faces {
            face.check()?;
            if face.width != size || face.height != size {
                return Err(GpuError::MismatchedCubeFaces);
            }
        }
        let id = self.textures.insert((size, size));
        self.calls.push(GpuCall::CreateCubemap { id, size });
        Ok(id)
    }

    fn delete_texture(&mut self, id: TextureId) {
        if self.textures.remove(id).is_none() {
            self.unknown(id);
        }
        self.calls.push(GpuCall::DeleteTexture(id));
    }

    fn create_program(&mut self, source: &ProgramSource) -> Result<ProgramId, GpuError> {
        let id = self.programs.insert(RecordedProgram {
            label: source.label.clone(),
            layout: source.uniforms.clone(),
            blocks: source.blocks.clone(),
        });
        self.calls.push(GpuCall::CreateProgram {
            id,
            label: source.label.clone(),
        });
        Ok(id)
    }

    fn delete_program(&mut self, id: ProgramId) {
        if self.programs.remove(id).is_none() {
            self.unknown(id);
        }
        self.calls.push(GpuCall::DeleteProgram(id));
    }

    fn use_program(&mut self, program: ProgramId) {
        if self.programs.get(program).is_none() {
            self.unknown(program);
        }
        self.calls.push(GpuCall::UseProgram(program));
    }

    fn set_uniform(&mut self, program: ProgramId, name: &str, value: UniformValue) {
        match self.programs.get(program) {
            None => self.unknown(program),
            Some(recorded) => {
                if recorded.layout.field(name).is_none()
                    && self.unknown_uniforms.insert((program.index(), name.to_string()))
                {
                    log::debug!("Program {} has no uniform {}", recorded.label, name);
                }
            }
        }
        self.calls.push(GpuCall::SetUniform {
            program,
            name: name.to_string(),
            value,
        });
    }

    fn uniform_block_index(&self, program: ProgramId, name: &str) -> Option<u32> {
        let recorded = self.programs.get(program)?;
        recorded
            .blocks
            .iter()
            .position(|block| block == name)
            .map(|index| index as u32)
    }

    fn bind_uniform_block(&mut self, program: ProgramId, block: u32, binding: u32) {
        if self.programs.get(program).is_none() {
            self.unknown(program);
        }
        self.calls.push(GpuCall::BindUniformBlock {
            program,
            block,
            binding,
        });
    }

    fn create_uniform_buffer(&mut self, size: usize) -> Result<BufferId, GpuError> {
        let id = self.buffers.insert(vec![0; size]);
        self.calls.push(GpuCall::CreateUniformBuffer { id, size });
        Ok(id)
    }

    fn bind_uniform_buffer(&mut self, buffer: BufferId, binding: u32) {
        if self.buffers.get(buffer).is_none() {
            self.unknown(buffer);
        }
        self.calls.push(GpuCall::BindUniformBuffer { buffer, binding });
    }

    fn write_uniform_buffer(&mut self, buffer: BufferId, offset: usize, bytes: &[u8]) {
        match self.buffers.get_mut(buffer) {
            Some(contents) if offset + bytes.len() <= contents.len() => {
                contents[offset..offset + bytes.len()].copy_from_slice(bytes);
            }
            Some(contents) => {
                let size = contents.len();
                self.errors.push(GpuError::Validation(format!(
                    "write of {} bytes at {offset} overruns {buffer:?} of {size} bytes",
                    bytes.len()
                )));
            }
            None => self.unknown(buffer),
        }
        self.calls.push(GpuCall::WriteUniformBuffer {
            buffer,
            offset,
            len: bytes.len(),
        });
    }

    fn delete_uniform_buffer(&mut self, id: BufferId) {
        if self.buffers.remove(id).is_none() {
            self.unknown(id);
        }
        self.calls.push(GpuCall::DeleteUniformBuffer(id));
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        if self.textures.get(texture).is_none() {
            self.unknown(texture);
        }
        self.calls.push(GpuCall::BindTexture { unit, texture });
    }

    fn set_draw_state(&mut self, state: DrawState) {
        self.calls.push(GpuCall::SetDrawState(state));
    }

    fn draw_arrays(&mut self, vao: VertexArrayId, first: u32, count: u32) {
        self.check_draw(vao, first + count, false);
        self.calls.push(GpuCall::DrawArrays { vao, first, count });
    }

    fn draw_elements(&mut self, vao: VertexArrayId, count: u32) {
        self.check_draw(vao, count, true);
        self.calls.push(GpuCall::DrawElements { vao, count });
    }

    fn begin_frame(&mut self, _clear: [f32; 4]) {
        self.in_frame = true;
        self.calls.push(GpuCall::BeginFrame);
    }

    fn end_frame(&mut self) {
        self.in_frame = false;
        self.calls.push(GpuCall::EndFrame);
    }

    fn take_errors(&mut self) -> Vec<GpuError> {
        std::mem::take(&mut self.errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::MATRICES_BLOCK;

    #[test]
    fn draw_with_deleted_vertex_array_is_reported() {
        let mut gpu = RecordingGpu::new();
        let positions = [[0.0; 3]; 3];
        let vao = gpu
            .create_vertex_array(&VertexData {
                positions: &positions,
                ..Default::default()
            })
            .unwrap();

        gpu.draw_arrays(vao, 0, 3);
        assert!(gpu.take_errors().is_empty());

        gpu.delete_vertex_array(vao);
        gpu.draw_arrays(vao, 0, 3);
        let errors = gpu.take_errors();
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            GpuError::UnknownHandle {
                kind: "VertexArray",
                ..
            }
        ));
    }

    #[test]
    fn uniform_block_index_follows_declaration_order() {
        let mut gpu = RecordingGpu::new();
        let program = gpu
            .create_program(&ProgramSource::new("p", "").with_block("Other").with_block(MATRICES_BLOCK))
            .unwrap();

        assert_eq!(gpu.uniform_block_index(program, MATRICES_BLOCK), Some(1));
        assert_eq!(gpu.uniform_block_index(program, "Missing"), None);
    }

    #[test]
    fn buffer_writes_land_at_offset() {
        let mut gpu = RecordingGpu::new();
        let buffer = gpu.create_uniform_buffer(8).unwrap();
        gpu.write_uniform_buffer(buffer, 4, &[1, 2, 3, 4]);
        assert_eq!(gpu.buffer_contents(buffer).unwrap(), &[0, 0, 0, 0, 1, 2, 3, 4]);

        gpu.write_uniform_buffer(buffer, 6, &[9, 9, 9, 9]);
        assert_eq!(gpu.take_errors().len(), 1);
    }

    #[test]
    fn mismatched_cube_faces_are_rejected() {
        let mut gpu = RecordingGpu::new();
        let mut faces: [ImageData; 6] = std::array::from_fn(|_| ImageData::solid([0; 4]));
        faces[4] = ImageData {
            width: 2,
            height: 2,
            pixels: vec![0; 16],
        };
        assert!(matches!(
            gpu.create_cubemap(&faces),
            Err(GpuError::MismatchedCubeFaces)
        ));
        assert_eq!(gpu.live_textures(), 0);
    }
}
