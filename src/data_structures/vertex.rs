//! Vertex formats and the stream layouts the device binds them with.
//!
//! Meshes use one interleaved stream of [`MeshVertex`]. Lines use two
//! parallel streams, positions and colours.

use std::mem;

/// One vertex of a textured mesh: position, texture coordinate and normal.
///
/// This is the layout loaders must produce: 8 consecutive `f32`s per vertex.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
}

impl MeshVertex {
    /// Number of floats per vertex.
    pub const FLOATS: usize = 8;
    /// Bytes per vertex.
    pub const STRIDE: usize = mem::size_of::<MeshVertex>();

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: Self::STRIDE as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 5]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Position stream of a line segment.
pub fn line_position_desc() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[wgpu::VertexAttribute {
            offset: 0,
            shader_location: 0,
            format: wgpu::VertexFormat::Float32x3,
        }],
    }
}

/// RGBA colour stream of a line segment, parallel to the position stream.
pub fn line_colour_desc() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[wgpu::VertexAttribute {
            offset: 0,
            shader_location: 1,
            format: wgpu::VertexFormat::Float32x4,
        }],
    }
}

/// How a drawable's buffers map onto vertex input locations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VertexLayout {
    /// One interleaved [`MeshVertex`] stream: locations 0, 1, 2.
    Mesh,
    /// Positions at location 0 and colours at location 1, one stream each.
    Line,
}

impl VertexLayout {
    pub fn buffers(&self) -> Vec<wgpu::VertexBufferLayout<'static>> {
        match self {
            VertexLayout::Mesh => vec![MeshVertex::desc()],
            VertexLayout::Line => vec![line_position_desc(), line_colour_desc()],
        }
    }

    pub fn stream_count(&self) -> usize {
        match self {
            VertexLayout::Mesh => 1,
            VertexLayout::Line => 2,
        }
    }

    pub fn provides(&self, location: u32) -> bool {
        self.buffers()
            .iter()
            .flat_map(|buffer| buffer.attributes.iter())
            .any(|attribute| attribute.shader_location == location)
    }
}
