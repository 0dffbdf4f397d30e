use flow_scene::{
    config::Config,
    context::RenderContext,
    data_structures::vertex::MeshVertex,
    resources::{MeshData, TextureData},
};

use super::recording_gpu::RecordingGpu;

pub const RED: [f32; 4] = [1.0, 0.0, 0.0, 1.0];
pub const BLUE: [f32; 4] = [0.0, 0.0, 1.0, 1.0];

/// A context on a fresh recording backend with the built-in programs.
pub fn recording_context() -> RenderContext<RecordingGpu> {
    RenderContext::new(RecordingGpu::new(), Config::default())
        .expect("built-in shaders must compile")
}

/// `triangles` triangles of a flat, textured quad strip.
pub fn mesh_with_triangles(triangles: usize) -> MeshData {
    let vertices: Vec<MeshVertex> = (0..triangles * 3)
        .map(|i| MeshVertex {
            position: [i as f32, (i % 3) as f32, 0.0],
            tex_coords: [(i % 2) as f32, ((i + 1) % 2) as f32],
            normal: [0.0, 0.0, 1.0],
        })
        .collect();
    MeshData::from_vertices(&vertices)
}

pub fn checker_texture() -> TextureData {
    let mut rgba = Vec::with_capacity(4 * 4 * 4);
    for i in 0..16 {
        let v = if i % 2 == 0 { 255 } else { 0 };
        rgba.extend_from_slice(&[v, v, v, 255]);
    }
    TextureData {
        width: 4,
        height: 4,
        rgba,
    }
}

pub fn assert_matrix_eq(a: cgmath::Matrix4<f32>, b: cgmath::Matrix4<f32>) {
    for col in 0..4 {
        for row in 0..4 {
            assert!(
                (a[col][row] - b[col][row]).abs() < 1e-5,
                "matrices differ at [{col}][{row}]:\n{a:?}\n{b:?}"
            );
        }
    }
}
