//! Startup configuration.
//!
//! Everything here has a working default; a flow can still adjust the live
//! [`crate::context::RenderContext`] in `on_init` (camera, clear colour, ...).

#[derive(Clone, Debug)]
pub struct CameraConfig {
    pub position: [f32; 3],
    /// Degrees. -90 looks down -Z.
    pub yaw: f32,
    /// Degrees.
    pub pitch: f32,
    /// World units per second while a movement key is held.
    pub speed: f32,
    /// Degrees per pixel of pointer movement.
    pub sensitivity: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 3.0],
            yaw: -90.0,
            pitch: 0.0,
            speed: 3.0,
            sensitivity: 0.25,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Vertical field of view, degrees.
    pub fov_y: f32,
    pub z_near: f32,
    pub z_far: f32,
    pub clear_colour: wgpu::Color,
    pub camera: CameraConfig,
    /// Uniform scale applied by the OBJ loader.
    pub mesh_scale: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: "flow-scene".to_string(),
            width: 1280,
            height: 720,
            fov_y: 45.0,
            z_near: 0.1,
            z_far: 100.0,
            clear_colour: wgpu::Color {
                r: 0.0,
                g: 0.1,
                b: 0.1,
                a: 1.0,
            },
            camera: CameraConfig::default(),
            mesh_scale: 0.3,
        }
    }
}
