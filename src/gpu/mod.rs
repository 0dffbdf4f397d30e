//! The GPU context seam.
//!
//! Everything above this module talks to the graphics device through the
//! [`Gpu`] trait: a small, immediate-mode surface in the spirit of a GL
//! context (create, use, set uniform, bind, draw, present). The engine ships
//! [`device::WgpuDevice`], which records the immediate calls and replays them
//! into a wgpu render pass on `present`. Tests drive the same code through a
//! recording backend.
//!
//! The trait is not reentrant. One thread owns the implementation and issues
//! every call, in order.

use thiserror::Error;

use crate::data_structures::vertex::VertexLayout;

pub mod device;

/// Opaque vertex buffer id handed out by a [`Gpu`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

/// Opaque texture id handed out by a [`Gpu`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// Opaque program id handed out by a [`Gpu`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

/// Column-major 4x4 matrix as uploaded to a uniform slot.
pub type RawMatrix = [[f32; 4]; 4];

/// RGBA8 pixels for a 2D texture upload.
#[derive(Clone, Copy, Debug)]
pub struct TextureDesc<'a> {
    pub label: &'a str,
    pub width: u32,
    pub height: u32,
    pub rgba: &'a [u8],
}

/// A compiled and linked program, ready for the device.
///
/// The sources have already been validated and reflected by
/// [`crate::pipelines::compile`], so a backend can trust the interface it is
/// given here.
#[derive(Clone, Debug)]
pub struct ProgramDesc<'a> {
    pub label: &'a str,
    pub vertex_source: &'a str,
    pub fragment_source: &'a str,
    /// Size in bytes of the uniform block at group 0, binding 0. Zero if the
    /// program declares none.
    pub uniform_block_size: u32,
    /// Whether the fragment stage samples a texture at group 1.
    pub samples_texture: bool,
    /// Vertex input locations the program reads.
    pub vertex_inputs: &'a [u32],
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GpuError {
    #[error("unknown buffer {0:?}")]
    UnknownBuffer(BufferId),

    #[error("unknown texture {0:?}")]
    UnknownTexture(TextureId),

    #[error("unknown program {0:?}")]
    UnknownProgram(ProgramId),

    #[error("no program is active")]
    NoActiveProgram,

    #[error("no vertex streams are bound")]
    NothingBound,

    #[error("{layout:?} layout takes {expected} vertex streams, {got} were bound")]
    StreamCount {
        layout: VertexLayout,
        expected: usize,
        got: usize,
    },

    #[error("program `{program}` reads vertex location {location}, which the {layout:?} layout does not provide")]
    LayoutMismatch {
        program: String,
        layout: VertexLayout,
        location: u32,
    },

    #[error("program `{0}` samples a texture but none is bound")]
    MissingTexture(String),

    #[error("uniform write at offset {offset} overruns the {size}-byte block of `{program}`")]
    UniformOutOfRange {
        program: String,
        offset: u32,
        size: u32,
    },

    #[error("`{label}`: {what} of {size} exceeds the device limit of {max}")]
    OverLimit {
        label: String,
        what: &'static str,
        size: u64,
        max: u64,
    },

    #[error("could not create program `{label}`: {reason}")]
    Program { label: String, reason: String },

    #[error("surface lost or outdated")]
    SurfaceLost,

    #[error("surface error: {0}")]
    Surface(String),
}

/// Reject a texture the device cannot hold. A zero dimension counts as too
/// small for any device.
pub fn check_texture_extent(
    limits: &wgpu::Limits,
    label: &str,
    width: u32,
    height: u32,
) -> Result<(), GpuError> {
    let max = limits.max_texture_dimension_2d;
    for (what, size) in [("texture width", width), ("texture height", height)] {
        if size == 0 || size > max {
            return Err(GpuError::OverLimit {
                label: label.to_string(),
                what,
                size: size as u64,
                max: max as u64,
            });
        }
    }
    Ok(())
}

/// Reject a vertex buffer larger than the device allows.
pub fn check_buffer_size(limits: &wgpu::Limits, label: &str, bytes: usize) -> Result<(), GpuError> {
    let size = bytes as u64;
    if size > limits.max_buffer_size {
        return Err(GpuError::OverLimit {
            label: label.to_string(),
            what: "vertex buffer",
            size,
            max: limits.max_buffer_size,
        });
    }
    Ok(())
}

/// The graphics context as the renderer sees it.
///
/// Resource creation returns ids; every other call acts on the implicit
/// "current" state (active program, bound streams, bound texture) the way a
/// GL context does. Uniform values are stored per program, so switching
/// programs never disturbs another program's uniforms.
pub trait Gpu {
    fn create_vertex_buffer(&mut self, label: &str, contents: &[u8]) -> Result<BufferId, GpuError>;

    fn create_texture(&mut self, desc: &TextureDesc<'_>) -> Result<TextureId, GpuError>;

    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramId, GpuError>;

    fn release_buffer(&mut self, buffer: BufferId);

    fn release_texture(&mut self, texture: TextureId);

    /// Make `program` the target of subsequent draws.
    fn use_program(&mut self, program: ProgramId) -> Result<(), GpuError>;

    /// Write a matrix into `program`'s uniform block at byte `offset`.
    fn set_uniform_matrix(
        &mut self,
        program: ProgramId,
        offset: u32,
        matrix: &RawMatrix,
    ) -> Result<(), GpuError>;

    /// Bind one buffer per stream of `layout`, in stream order.
    fn bind_vertex_streams(
        &mut self,
        layout: VertexLayout,
        buffers: &[BufferId],
    ) -> Result<(), GpuError>;

    fn bind_texture(&mut self, texture: TextureId) -> Result<(), GpuError>;

    /// Drop all vertex stream and texture bindings.
    fn unbind(&mut self);

    /// Draw `vertex_count` vertices from the bound streams with the active
    /// program and its current uniform values.
    fn draw(
        &mut self,
        topology: wgpu::PrimitiveTopology,
        vertex_count: u32,
    ) -> Result<(), GpuError>;

    /// Clear colour and depth for the frame being built.
    fn clear(&mut self, colour: wgpu::Color) -> Result<(), GpuError>;

    /// Finish the frame and hand it to the display.
    fn present(&mut self) -> Result<(), GpuError>;
}
