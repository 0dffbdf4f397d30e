use std::{
    io::{BufRead, BufReader, Cursor},
    path::Path,
};

use crate::{data_structures::vertex::MeshVertex, resources::load_string};

/// Interleaved mesh data as the registry expects it.
///
/// `vertices` holds position(3) + tex_coords(2) + normal(3) per vertex, already
/// de-indexed, so it can be drawn as a plain triangle list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<f32>,
    pub vertex_count: u32,
}

impl MeshData {
    pub fn from_vertices(vertices: &[MeshVertex]) -> Self {
        Self {
            vertices: bytemuck::cast_slice(vertices).to_vec(),
            vertex_count: vertices.len() as u32,
        }
    }
}

/// Load a Wavefront OBJ file and flatten all of its models into one mesh.
pub async fn load_mesh_obj(path: impl AsRef<Path>, scale: f32) -> anyhow::Result<MeshData> {
    let path = path.as_ref();
    let obj_text = load_string(path).await?;
    let mut reader = BufReader::new(Cursor::new(obj_text));
    let mesh = parse_obj(&mut reader, scale).await?;
    log::info!("loaded {} ({} vertices)", path.display(), mesh.vertex_count);
    Ok(mesh)
}

/// Parse OBJ text. Materials are ignored; textures are loaded separately.
pub async fn parse_obj<B: BufRead>(reader: &mut B, scale: f32) -> anyhow::Result<MeshData> {
    let (models, _materials) = tobj::load_obj_buf_async(
        reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        |_| async move { Err(tobj::LoadError::OpenFileFailed) },
    )
    .await?;

    let vertices: Vec<MeshVertex> = models
        .iter()
        .flat_map(|m| {
            let mesh = &m.mesh;
            mesh.indices.iter().map(move |&index| {
                let i = index as usize;
                MeshVertex {
                    position: [
                        mesh.positions[i * 3] * scale,
                        mesh.positions[i * 3 + 1] * scale,
                        mesh.positions[i * 3 + 2] * scale,
                    ],
                    // OBJ puts the texture origin bottom-left, wgpu top-left.
                    tex_coords: [
                        mesh.texcoords.get(i * 2).map_or(0.0, |f| *f),
                        1.0 - mesh.texcoords.get(i * 2 + 1).map_or(0.0, |f| *f),
                    ],
                    normal: [
                        mesh.normals.get(i * 3).map_or(0.0, |f| *f),
                        mesh.normals.get(i * 3 + 1).map_or(0.0, |f| *f),
                        mesh.normals.get(i * 3 + 2).map_or(0.0, |f| *f),
                    ],
                }
            })
        })
        .collect();

    if vertices.is_empty() {
        anyhow::bail!("OBJ data contains no faces");
    }
    Ok(MeshData::from_vertices(&vertices))
}
