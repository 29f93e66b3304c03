use crate::gpu::{BufferId, ProgramId, TextureId};

/// Minimum dynamic uniform offset alignment guaranteed by wgpu's default limits.
const UNIFORM_ALIGNMENT: usize = 256;

/// Per-frame uniform storage. Every draw appends a snapshot of its program's
/// uniforms and binds it with a dynamic offset.
pub(crate) struct UniformArena {
    pub(crate) buffer: wgpu::Buffer,
    capacity: usize,
    generation: u64,
    scratch: Vec<u8>,
}

impl UniformArena {
    pub(crate) fn new(device: &wgpu::Device, capacity: usize) -> Self {
        Self {
            buffer: Self::create_buffer(device, capacity),
            capacity,
            generation: 0,
            scratch: Vec::with_capacity(capacity),
        }
    }

    fn create_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("UniformArena"),
            size: capacity as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    pub(crate) fn begin_frame(&mut self) {
        self.scratch.clear();
    }

    pub(crate) fn push(&mut self, bytes: &[u8]) -> u32 {
        let offset = self.scratch.len();
        let reserved = reserved_len(bytes.len());
        self.scratch.extend_from_slice(bytes);
        self.scratch.resize(offset + reserved, 0);
        offset as u32
    }

    /// Uploads this frame's snapshots, growing the buffer first if needed.
    pub(crate) fn flush(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        let required = self.scratch.len();
        if required > self.capacity {
            let new_capacity = required.max(self.capacity * 2);
            log::info!(
                "Growing uniform arena: {} -> {} bytes",
                self.capacity,
                new_capacity
            );
            self.buffer = Self::create_buffer(device, new_capacity);
            self.capacity = new_capacity;
            self.generation += 1;
        }

        if !self.scratch.is_empty() {
            queue.write_buffer(&self.buffer, 0, &self.scratch);
        }
    }

    /// Changes whenever the underlying buffer is replaced.
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }
}

fn reserved_len(len: usize) -> usize {
    len.div_ceil(UNIFORM_ALIGNMENT).max(1) * UNIFORM_ALIGNMENT
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum DrawRange {
    Arrays { first: u32, count: u32 },
    Elements { count: u32 },
}

/// A draw captured with the bindings in effect when it was issued.
pub(crate) struct DrawCommand {
    pub(crate) program: ProgramId,
    pub(crate) pipeline: wgpu::RenderPipeline,
    pub(crate) uniform_offset: Option<u32>,
    pub(crate) shared: Vec<BufferId>,
    pub(crate) textures: Vec<Option<TextureId>>,
    pub(crate) vertices: wgpu::Buffer,
    pub(crate) indices: Option<wgpu::Buffer>,
    pub(crate) range: DrawRange,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshots_keep_dynamic_offsets_aligned() {
        assert_eq!(reserved_len(0), 256);
        assert_eq!(reserved_len(64), 256);
        assert_eq!(reserved_len(256), 256);
        assert_eq!(reserved_len(2448), 2560);
    }
}
