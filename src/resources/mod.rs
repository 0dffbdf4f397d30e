/**
 * Loading mesh and texture data from files.
 *
 * Nothing in here touches the GPU: loaders hand back plain vertex and pixel
 * data, and the registry decides what to upload.
 */
use std::path::Path;

pub mod mesh;
pub mod texture;

pub use mesh::{MeshData, load_mesh_obj, parse_obj};
pub use texture::{TextureData, load_texture};

pub async fn load_string(path: impl AsRef<Path>) -> anyhow::Result<String> {
    let path = path.as_ref();
    let txt = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow::anyhow!("could not read {}: {e}", path.display()))?;
    Ok(txt)
}

pub async fn load_binary(path: impl AsRef<Path>) -> anyhow::Result<Vec<u8>> {
    let path = path.as_ref();
    let data = tokio::fs::read(path)
        .await
        .map_err(|e| anyhow::anyhow!("could not read {}: {e}", path.display()))?;
    Ok(data)
}
