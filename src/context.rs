use crate::{
    camera::{Camera, MouseLook, Projection},
    config::Config,
    error::{ResourceError, ShaderError},
    gpu::Gpu,
    pipelines::{CompiledProgram, ShaderId, ShaderTable, builtin, compile},
    registry::{DrawableHandle, DrawableKind, Registry},
    resources::{MeshData, TextureData},
};

/// Everything one frame loop owns: the device, what is drawn, and how it is
/// looked at.
///
/// There is exactly one per window. It is created once the device exists and
/// handed by reference to the flow and the pipeline.
pub struct RenderContext<G: Gpu> {
    pub gpu: G,
    pub registry: Registry,
    pub shaders: ShaderTable,
    pub camera: Camera,
    pub projection: Projection,
    pub mouse: MouseLook,
    pub clear_colour: wgpu::Color,
    /// Current window size in physical pixels.
    pub viewport: (u32, u32),
    pub config: Config,
    mesh_program: ShaderId,
    line_program: ShaderId,
}

/// Compile the two programs every context needs.
pub fn compile_builtin() -> Result<(CompiledProgram, CompiledProgram), ShaderError> {
    let mesh = compile(builtin::MESH, builtin::MESH_VERTEX, builtin::MESH_FRAGMENT)?;
    let line = compile(builtin::LINE, builtin::LINE_VERTEX, builtin::LINE_FRAGMENT)?;
    Ok((mesh, line))
}

impl<G: Gpu + 'static> RenderContext<G> {
    pub fn new(gpu: G, config: Config) -> Result<Self, ShaderError> {
        let (mesh, line) = compile_builtin()?;
        Self::with_programs(gpu, config, mesh, line)
    }

    /// Build a context around programs compiled ahead of time.
    pub fn with_programs(
        mut gpu: G,
        config: Config,
        mesh: CompiledProgram,
        line: CompiledProgram,
    ) -> Result<Self, ShaderError> {
        let mut shaders = ShaderTable::new();
        let mesh_program = shaders.register_compiled(&mut gpu, mesh)?;
        let line_program = shaders.register_compiled(&mut gpu, line)?;

        let projection = Projection::new(
            config.width,
            config.height,
            cgmath::Deg(config.fov_y),
            config.z_near,
            config.z_far,
        );

        Ok(Self {
            gpu,
            registry: Registry::new(),
            shaders,
            camera: Camera::from_config(&config.camera),
            projection,
            mouse: MouseLook::new(),
            clear_colour: config.clear_colour,
            viewport: (config.width, config.height),
            config,
            mesh_program,
            line_program,
        })
    }

    /// The program drawables of `kind` are drawn with.
    pub fn program_for(&self, kind: DrawableKind) -> ShaderId {
        match kind {
            DrawableKind::Mesh => self.mesh_program,
            DrawableKind::Line => self.line_program,
        }
    }

    pub fn create_mesh(
        &mut self,
        name: &str,
        mesh: &MeshData,
        texture: &TextureData,
    ) -> Result<DrawableHandle, ResourceError> {
        self.registry.create_mesh(&mut self.gpu, name, mesh, texture)
    }

    pub fn create_line(
        &mut self,
        name: &str,
        p1: cgmath::Vector3<f32>,
        p2: cgmath::Vector3<f32>,
        colour1: [f32; 4],
        colour2: [f32; 4],
    ) -> Result<DrawableHandle, ResourceError> {
        self.registry
            .create_line(&mut self.gpu, name, p1, p2, colour1, colour2)
    }

    /// Free all drawables' GPU resources.
    pub fn release(&mut self) {
        log::info!("releasing {} drawables", self.registry.len());
        self.registry.release(&mut self.gpu);
    }
}
