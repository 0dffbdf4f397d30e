//! Error types for the registry, the shader table and the frame pipeline.
//!
//! Creation-time failures ([`ResourceError`], [`ShaderError`]) surface to the
//! caller synchronously. [`DrawError`] never leaves the frame loop: the
//! pipeline logs it and skips the drawable for the current frame. Only a
//! [`FrameError`] ends a run.

use thiserror::Error;

use crate::{gpu::GpuError, registry::DrawableHandle};

/// Which shader stage a compile error belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Malformed data handed to the registry. The drawable is not created.
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("`{name}`: vertex buffer is empty")]
    EmptyBuffer { name: String },

    #[error("`{name}`: {bytes} bytes is not a multiple of the {stride}-byte vertex stride")]
    BadStride {
        name: String,
        bytes: usize,
        stride: usize,
    },

    #[error("`{name}`: loader reported {reported} vertices but the buffer holds {actual}")]
    CountMismatch {
        name: String,
        reported: u32,
        actual: u32,
    },

    #[error("`{name}`: texture is {width}x{height} but carries {len} bytes of RGBA data")]
    BadTexture {
        name: String,
        width: u32,
        height: u32,
        len: usize,
    },

    #[error("`{name}`: GPU allocation failed: {source}")]
    Gpu {
        name: String,
        #[source]
        source: GpuError,
    },
}

/// Shader build failure. The binding table is left untouched.
#[derive(Error, Debug)]
pub enum ShaderError {
    #[error("{stage} stage failed to compile:\n{log}")]
    Compile { stage: ShaderStage, log: String },

    #[error("program failed to link:\n{log}")]
    Link { log: String },
}

/// Failure while drawing a single drawable.
#[derive(Error, Debug)]
pub enum DrawError {
    #[error("no drawable registered for {0:?}")]
    UnknownHandle(DrawableHandle),

    #[error(transparent)]
    Gpu(#[from] GpuError),
}

/// Fatal failures that end the frame loop.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("could not activate shader program `{name}`: {source}")]
    Activation {
        name: String,
        #[source]
        source: GpuError,
    },

    #[error("could not clear or present the frame: {0}")]
    Surface(#[source] GpuError),
}
