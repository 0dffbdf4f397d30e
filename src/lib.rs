//! flow-scene
//!
//! A small free-fly 3D scene viewer. Textured meshes and coloured line
//! segments are registered once, then drawn every frame through a shader
//! binding table while the camera is steered with WASD and the mouse.
//!
//! High-level modules
//! - `camera`: free-fly camera, perspective projection and mouse-look tracking
//! - `config`: startup configuration with defaults
//! - `context`: the render context that owns device, registry, shaders and camera
//! - `data_structures`: vertex formats, per-object transforms, device textures
//! - `error`: typed errors of the registry, shader table and frame pipeline
//! - `flow`: winit shell and the `SceneFlow` trait
//! - `gpu`: the `Gpu` seam and its wgpu implementation
//! - `pipelines`: shader compilation, binding table and render pipelines
//! - `registry`: GPU resources of every drawable
//! - `render`: the per-frame pipeline
//! - `resources`: OBJ and image loaders
//!

pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod error;
pub mod flow;
pub mod gpu;
pub mod pipelines;
pub mod registry;
pub mod render;
pub mod resources;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath;
pub use winit::keyboard::KeyCode;
