//! GPU resource registry.
//!
//! Every drawable is one record behind an opaque [`DrawableHandle`]: its
//! buffers, its texture, how to draw it and where it sits in the world.
//! Buffers are sized once at creation and never touched again. Records are
//! kept in registration order, which is also the draw order.

use cgmath::Vector3;

use crate::{
    data_structures::{
        transform::Transform,
        vertex::{MeshVertex, VertexLayout},
    },
    error::{DrawError, ResourceError},
    gpu::{BufferId, Gpu, TextureDesc, TextureId},
    pipelines::UniformSetter,
    resources::{MeshData, TextureData},
};

/// Stable handle of a registered drawable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DrawableHandle(usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawableKind {
    Mesh,
    Line,
}

#[derive(Clone, Debug)]
pub enum DrawableResources {
    Mesh {
        vertices: BufferId,
        texture: TextureId,
    },
    Line {
        positions: BufferId,
        colours: BufferId,
    },
}

impl DrawableResources {
    pub fn kind(&self) -> DrawableKind {
        match self {
            DrawableResources::Mesh { .. } => DrawableKind::Mesh,
            DrawableResources::Line { .. } => DrawableKind::Line,
        }
    }

    fn layout(&self) -> VertexLayout {
        match self {
            DrawableResources::Mesh { .. } => VertexLayout::Mesh,
            DrawableResources::Line { .. } => VertexLayout::Line,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Drawable {
    name: String,
    resources: DrawableResources,
    vertex_count: u32,
    topology: wgpu::PrimitiveTopology,
    pub transform: Transform,
}

impl Drawable {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> DrawableKind {
        self.resources.kind()
    }

    pub fn resources(&self) -> &DrawableResources {
        &self.resources
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn topology(&self) -> wgpu::PrimitiveTopology {
        self.topology
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    drawables: Vec<Drawable>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upload an interleaved mesh and its texture.
    pub fn create_mesh(
        &mut self,
        gpu: &mut dyn Gpu,
        name: &str,
        mesh: &MeshData,
        texture: &TextureData,
    ) -> Result<DrawableHandle, ResourceError> {
        let vertex_count = validate_mesh(name, mesh)?;
        if !texture.is_consistent() {
            return Err(ResourceError::BadTexture {
                name: name.to_string(),
                width: texture.width,
                height: texture.height,
                len: texture.rgba.len(),
            });
        }

        let vertices = gpu
            .create_vertex_buffer(name, bytemuck::cast_slice(&mesh.vertices))
            .map_err(|source| ResourceError::Gpu {
                name: name.to_string(),
                source,
            })?;
        let texture = match gpu.create_texture(&TextureDesc {
            label: name,
            width: texture.width,
            height: texture.height,
            rgba: &texture.rgba,
        }) {
            Ok(texture) => texture,
            Err(source) => {
                gpu.release_buffer(vertices);
                return Err(ResourceError::Gpu {
                    name: name.to_string(),
                    source,
                });
            }
        };

        log::info!("registered mesh `{name}` ({vertex_count} vertices)");
        Ok(self.push(Drawable {
            name: name.to_string(),
            resources: DrawableResources::Mesh { vertices, texture },
            vertex_count,
            topology: wgpu::PrimitiveTopology::TriangleList,
            transform: Transform::new(),
        }))
    }

    /// A single coloured segment from `p1` to `p2`.
    pub fn create_line(
        &mut self,
        gpu: &mut dyn Gpu,
        name: &str,
        p1: Vector3<f32>,
        p2: Vector3<f32>,
        colour1: [f32; 4],
        colour2: [f32; 4],
    ) -> Result<DrawableHandle, ResourceError> {
        let positions: [[f32; 3]; 2] = [p1.into(), p2.into()];
        let colours = [colour1, colour2];

        let gpu_err = |source| ResourceError::Gpu {
            name: name.to_string(),
            source,
        };
        let positions = gpu
            .create_vertex_buffer(&format!("{name} positions"), bytemuck::cast_slice(&positions))
            .map_err(gpu_err)?;
        let colours = match gpu
            .create_vertex_buffer(&format!("{name} colours"), bytemuck::cast_slice(&colours))
        {
            Ok(colours) => colours,
            Err(source) => {
                gpu.release_buffer(positions);
                return Err(gpu_err(source));
            }
        };

        log::debug!("registered line `{name}`");
        Ok(self.push(Drawable {
            name: name.to_string(),
            resources: DrawableResources::Line { positions, colours },
            vertex_count: 2,
            topology: wgpu::PrimitiveTopology::LineList,
            transform: Transform::new(),
        }))
    }

    fn push(&mut self, drawable: Drawable) -> DrawableHandle {
        let handle = DrawableHandle(self.drawables.len());
        self.drawables.push(drawable);
        handle
    }

    /// Bind the drawable's streams and texture, hand its model matrix to
    /// `setter`, draw, and unbind again, whether or not the draw succeeded.
    pub fn bind_and_draw(
        &self,
        gpu: &mut dyn Gpu,
        handle: DrawableHandle,
        setter: &mut dyn UniformSetter,
    ) -> Result<(), DrawError> {
        let drawable = self.get(handle).ok_or(DrawError::UnknownHandle(handle))?;
        let result = draw(gpu, drawable, setter);
        gpu.unbind();
        result.map_err(DrawError::from)
    }

    pub fn get(&self, handle: DrawableHandle) -> Option<&Drawable> {
        self.drawables.get(handle.0)
    }

    pub fn transform_mut(&mut self, handle: DrawableHandle) -> Option<&mut Transform> {
        self.drawables.get_mut(handle.0).map(|d| &mut d.transform)
    }

    /// Drawables in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (DrawableHandle, &Drawable)> + '_ {
        self.drawables
            .iter()
            .enumerate()
            .map(|(i, d)| (DrawableHandle(i), d))
    }

    pub fn handles_of(&self, kind: DrawableKind) -> impl Iterator<Item = DrawableHandle> + '_ {
        self.iter()
            .filter(move |(_, d)| d.kind() == kind)
            .map(|(h, _)| h)
    }

    pub fn len(&self) -> usize {
        self.drawables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drawables.is_empty()
    }

    /// Free every buffer and texture. The registry is empty afterwards.
    pub fn release(&mut self, gpu: &mut dyn Gpu) {
        for drawable in self.drawables.drain(..) {
            match drawable.resources {
                DrawableResources::Mesh { vertices, texture } => {
                    gpu.release_buffer(vertices);
                    gpu.release_texture(texture);
                }
                DrawableResources::Line { positions, colours } => {
                    gpu.release_buffer(positions);
                    gpu.release_buffer(colours);
                }
            }
        }
    }
}

fn draw(
    gpu: &mut dyn Gpu,
    drawable: &Drawable,
    setter: &mut dyn UniformSetter,
) -> Result<(), crate::gpu::GpuError> {
    let layout = drawable.resources.layout();
    match &drawable.resources {
        DrawableResources::Mesh { vertices, texture } => {
            gpu.bind_vertex_streams(layout, &[*vertices])?;
            gpu.bind_texture(*texture)?;
        }
        DrawableResources::Line { positions, colours } => {
            gpu.bind_vertex_streams(layout, &[*positions, *colours])?;
        }
    }
    setter.set_model(gpu, &drawable.transform.to_matrix())?;
    gpu.draw(drawable.topology, drawable.vertex_count)
}

/// Check an interleaved buffer and return its vertex count.
fn validate_mesh(name: &str, mesh: &MeshData) -> Result<u32, ResourceError> {
    if mesh.vertices.is_empty() {
        return Err(ResourceError::EmptyBuffer {
            name: name.to_string(),
        });
    }
    if mesh.vertices.len() % MeshVertex::FLOATS != 0 {
        return Err(ResourceError::BadStride {
            name: name.to_string(),
            bytes: mesh.vertices.len() * std::mem::size_of::<f32>(),
            stride: MeshVertex::STRIDE,
        });
    }
    let actual = (mesh.vertices.len() / MeshVertex::FLOATS) as u32;
    if mesh.vertex_count != actual {
        return Err(ResourceError::CountMismatch {
            name: name.to_string(),
            reported: mesh.vertex_count,
            actual,
        });
    }
    Ok(actual)
}
