use bytemuck::{Pod, Zeroable};
use std::mem;

use crate::gpu::VertexData;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub(crate) struct Vertex {
    pub(crate) pos: [f32; 3],
    pub(crate) normal: [f32; 3],
    pub(crate) uv: [f32; 2],
}

impl Vertex {
    pub(crate) const ATTRS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Float32x2
    ];

    pub(crate) fn layout<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

/// Packs separate attribute streams into one buffer; missing streams are zero.
pub(crate) fn interleave(data: &VertexData<'_>) -> Vec<Vertex> {
    data.positions
        .iter()
        .enumerate()
        .map(|(i, &pos)| Vertex {
            pos,
            normal: data
                .normals
                .and_then(|normals| normals.get(i).copied())
                .unwrap_or_default(),
            uv: data
                .tex_coords
                .and_then(|uvs| uvs.get(i).copied())
                .unwrap_or_default(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_stride_matches_struct_size() {
        assert_eq!(
            Vertex::layout().array_stride,
            std::mem::size_of::<Vertex>() as wgpu::BufferAddress
        );
    }

    #[test]
    fn interleave_zero_fills_missing_streams() {
        let positions = [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let uvs = [[0.5, 0.25], [1.0, 1.0]];
        let vertices = interleave(&VertexData {
            positions: &positions,
            tex_coords: Some(&uvs),
            ..Default::default()
        });

        assert_eq!(vertices.len(), 2);
        assert_eq!(vertices[1].pos, [4.0, 5.0, 6.0]);
        assert_eq!(vertices[1].normal, [0.0; 3]);
        assert_eq!(vertices[0].uv, [0.5, 0.25]);
    }
}
