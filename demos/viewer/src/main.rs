//! Coordinate axes and, optionally, a spinning textured model.
//!
//! ```sh
//! cd demos/viewer && cargo run -- earth.obj earth.png
//! ```

use std::time::Duration;

use flow_scene::{
    cgmath::Vector3,
    config::Config,
    context::RenderContext,
    flow::{SceneFlow, run},
    gpu::device::WgpuDevice,
    registry::DrawableHandle,
    resources::{MeshData, TextureData, load_mesh_obj, load_texture},
};

const AXIS_LENGTH: f32 = 50.0;
/// Degrees per second about the model's Y axis.
const SPIN_SPEED: f32 = 20.0;
/// Tilt of the spin axis about Z, degrees.
const AXIAL_TILT: f32 = 22.5;

struct Viewer {
    model: Option<(MeshData, TextureData)>,
    spinning: Option<DrawableHandle>,
}

impl SceneFlow for Viewer {
    fn on_init(&mut self, ctx: &mut RenderContext<WgpuDevice>) -> anyhow::Result<()> {
        let origin = Vector3::new(0.0, 0.0, 0.0);
        let axes = [
            ("x axis", Vector3::unit_x(), [1.0, 0.0, 0.0, 1.0]),
            ("y axis", Vector3::unit_y(), [0.0, 1.0, 0.0, 1.0]),
            ("z axis", Vector3::unit_z(), [0.0, 0.0, 1.0, 1.0]),
        ];
        for (name, direction, colour) in axes {
            ctx.create_line(name, origin, direction * AXIS_LENGTH, colour, colour)?;
        }

        if let Some((mesh, texture)) = self.model.take() {
            let handle = ctx.create_mesh("model", &mesh, &texture)?;
            if let Some(transform) = ctx.registry.transform_mut(handle) {
                transform.yaw = AXIAL_TILT;
            }
            self.spinning = Some(handle);
        }
        Ok(())
    }

    fn on_update(&mut self, ctx: &mut RenderContext<WgpuDevice>, dt: Duration) {
        let Some(transform) = self
            .spinning
            .and_then(|handle| ctx.registry.transform_mut(handle))
        else {
            return;
        };
        transform.pitch = (transform.pitch + SPIN_SPEED * dt.as_secs_f32()) % 360.0;
    }
}

fn main() -> anyhow::Result<()> {
    let config = Config::default();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let model = match args.as_slice() {
        [] => None,
        [mesh, texture] => {
            let runtime = tokio::runtime::Runtime::new()?;
            let scale = config.mesh_scale;
            Some(runtime.block_on(async {
                let mesh = load_mesh_obj(mesh, scale).await?;
                let texture = load_texture(texture).await?;
                anyhow::Ok((mesh, texture))
            })?)
        }
        _ => anyhow::bail!("usage: viewer [MESH.obj TEXTURE]"),
    };

    run(
        config,
        Viewer {
            model,
            spinning: None,
        },
    )
}
