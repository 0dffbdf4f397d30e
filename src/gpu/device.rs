//! [`Gpu`] on top of wgpu.
//!
//! wgpu has no "current program" or "current uniform value"; a frame is a
//! command buffer. The device therefore keeps the GL-style state on the CPU
//! and records one [`DrawCommand`] per `draw`, snapshotting the active
//! program's uniform block into a per-frame arena. `present` turns the
//! recorded frame into a single render pass, with each draw reading its own
//! snapshot through a dynamic offset.

use std::{collections::HashMap, num::NonZeroU64, sync::Arc};

use winit::window::Window;

use crate::{
    data_structures::{
        texture::{self, Texture},
        vertex::VertexLayout,
    },
    pipelines::{
        basic::{mk_pipeline_layout, mk_render_pipeline},
        compile::MAX_UNIFORM_BLOCK,
    },
};

use super::{
    BufferId, Gpu, GpuError, ProgramDesc, ProgramId, RawMatrix, TextureDesc, TextureId,
    check_buffer_size, check_texture_extent,
};

const MATRIX_BYTES: u32 = std::mem::size_of::<RawMatrix>() as u32;

struct Program {
    label: String,
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    layout: wgpu::PipelineLayout,
    /// Current uniform values, `uniform_block_size` bytes.
    block: Vec<u8>,
    samples_texture: bool,
    vertex_inputs: Vec<u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: ProgramId,
    layout: VertexLayout,
    topology: wgpu::PrimitiveTopology,
}

#[derive(Debug)]
struct DrawCommand {
    pipeline: PipelineKey,
    streams: Vec<BufferId>,
    texture: Option<TextureId>,
    vertex_count: u32,
    /// Byte offset of this draw's uniform snapshot in the arena.
    uniform_offset: u32,
}

/// What a GL context would call the bound state.
#[derive(Debug, Default)]
struct BindState {
    program: Option<ProgramId>,
    streams: Option<(VertexLayout, Vec<BufferId>)>,
    texture: Option<TextureId>,
}

#[derive(Debug)]
struct Frame {
    clear: wgpu::Color,
    draws: Vec<DrawCommand>,
    uniforms: Vec<u8>,
}

/// Per-frame uniform snapshots, bound at group 0 with a dynamic offset.
struct UniformArena {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    capacity: u64,
    /// Distance between snapshots, aligned for dynamic offsets.
    stride: u64,
}

impl UniformArena {
    fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, slots: u64) -> Self {
        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let stride = wgpu::util::align_to(MAX_UNIFORM_BLOCK as u64, alignment);
        let capacity = stride * slots.max(1);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("uniform arena"),
            size: capacity,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("uniform arena"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: NonZeroU64::new(MAX_UNIFORM_BLOCK as u64),
                }),
            }],
        });
        Self {
            buffer,
            bind_group,
            capacity,
            stride,
        }
    }

    /// Grow to hold at least `bytes`, doubling so resizes stay rare.
    fn reserve(&mut self, device: &wgpu::Device, layout: &wgpu::BindGroupLayout, bytes: u64) {
        if bytes <= self.capacity {
            return;
        }
        let slots = (bytes / self.stride).next_power_of_two();
        log::info!("growing uniform arena to {slots} draws");
        *self = Self::new(device, layout, slots);
    }
}

fn uniform_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: NonZeroU64::new(MAX_UNIFORM_BLOCK as u64),
            },
            count: None,
        }],
        label: Some("uniform_bind_group_layout"),
    })
}

pub struct WgpuDevice {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    is_surface_configured: bool,
    depth_texture: Texture,
    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    arena: UniformArena,
    next_id: u32,
    buffers: HashMap<BufferId, wgpu::Buffer>,
    textures: HashMap<TextureId, Texture>,
    programs: HashMap<ProgramId, Program>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    bound: BindState,
    frame: Frame,
}

impl WgpuDevice {
    pub async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let size = window.inner_size();

        log::info!("wgpu setup");
        let instance = wgpu::Instance::default();
        let surface = instance.create_surface(window.clone())?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        log::info!("using adapter {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("flow-scene device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
                ..Default::default()
            })
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow::anyhow!("surface is not supported by the adapter"))?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let is_surface_configured = size.width > 0 && size.height > 0;
        if is_surface_configured {
            surface.configure(&device, &config);
        }

        let depth_texture =
            Texture::create_depth_texture(&device, [config.width, config.height], "depth_texture");
        let uniform_layout = uniform_layout(&device);
        let texture_layout = texture::sampled_texture_layout(&device);
        let sampler = texture::create_default_sampler(&device);
        let arena = UniformArena::new(&device, &uniform_layout, 64);

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            is_surface_configured,
            depth_texture,
            uniform_layout,
            texture_layout,
            sampler,
            arena,
            next_id: 1,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            programs: HashMap::new(),
            pipelines: HashMap::new(),
            bound: BindState::default(),
            frame: Frame {
                clear: wgpu::Color::BLACK,
                draws: Vec::new(),
                uniforms: Vec::new(),
            },
        })
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    /// Reconfigure the surface and depth buffer. A zero dimension (minimised
    /// window) leaves the surface unconfigured until the next real size.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            self.is_surface_configured = false;
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.is_surface_configured = true;
        self.depth_texture =
            Texture::create_depth_texture(&self.device, [width, height], "depth_texture");
    }

    fn reconfigure(&mut self) {
        let size = self.window.inner_size();
        self.resize(size.width, size.height);
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn program(&self, id: ProgramId) -> Result<&Program, GpuError> {
        self.programs.get(&id).ok_or(GpuError::UnknownProgram(id))
    }

    fn ensure_pipeline(&mut self, key: PipelineKey) -> Result<(), GpuError> {
        if self.pipelines.contains_key(&key) {
            return Ok(());
        }
        let program = self.programs.get(&key.program).ok_or(GpuError::UnknownProgram(key.program))?;
        let label = format!("{} {:?} {:?}", program.label, key.layout, key.topology);
        log::debug!("building render pipeline `{label}`");
        let pipeline = mk_render_pipeline(
            &self.device,
            &label,
            &program.layout,
            self.config.format,
            &program.vertex,
            &program.fragment,
            key.layout,
            key.topology,
        );
        self.pipelines.insert(key, pipeline);
        Ok(())
    }

    /// Encode the recorded frame into `view`.
    fn encode(&self, view: &wgpu::TextureView) -> wgpu::CommandBuffer {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.frame.clear),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });

            for draw in &self.frame.draws {
                let Some(pipeline) = self.pipelines.get(&draw.pipeline) else {
                    continue;
                };
                let streams: Option<Vec<&wgpu::Buffer>> =
                    draw.streams.iter().map(|id| self.buffers.get(id)).collect();
                let Some(streams) = streams else {
                    log::warn!("skipping draw: a vertex buffer was released mid-frame");
                    continue;
                };

                render_pass.set_pipeline(pipeline);
                render_pass.set_bind_group(0, &self.arena.bind_group, &[draw.uniform_offset]);
                if let Some(id) = draw.texture {
                    match self.textures.get(&id).and_then(|t| t.bind_group.as_ref()) {
                        Some(bind_group) => render_pass.set_bind_group(1, bind_group, &[]),
                        None => {
                            log::warn!("skipping draw: texture {id:?} was released mid-frame");
                            continue;
                        }
                    }
                }
                for (slot, buffer) in streams.into_iter().enumerate() {
                    render_pass.set_vertex_buffer(slot as u32, buffer.slice(..));
                }
                render_pass.draw(0..draw.vertex_count, 0..1);
            }
        }
        encoder.finish()
    }
}

impl Gpu for WgpuDevice {
    fn create_vertex_buffer(&mut self, label: &str, contents: &[u8]) -> Result<BufferId, GpuError> {
        use wgpu::util::DeviceExt;

        check_buffer_size(&self.device.limits(), label, contents.len())?;
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: wgpu::BufferUsages::VERTEX,
            });
        let id = BufferId(self.next_id());
        self.buffers.insert(id, buffer);
        Ok(id)
    }

    fn create_texture(&mut self, desc: &TextureDesc<'_>) -> Result<TextureId, GpuError> {
        check_texture_extent(&self.device.limits(), desc.label, desc.width, desc.height)?;
        let texture = Texture::from_rgba(
            &self.device,
            &self.queue,
            &self.texture_layout,
            &self.sampler,
            desc.label,
            desc.width,
            desc.height,
            desc.rgba,
        );
        let id = TextureId(self.next_id());
        self.textures.insert(id, texture);
        Ok(id)
    }

    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramId, GpuError> {
        if desc.uniform_block_size > MAX_UNIFORM_BLOCK {
            return Err(GpuError::Program {
                label: desc.label.to_string(),
                reason: format!(
                    "uniform block of {} bytes exceeds {MAX_UNIFORM_BLOCK}",
                    desc.uniform_block_size
                ),
            });
        }
        let vertex = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&format!("{} vertex", desc.label)),
                source: wgpu::ShaderSource::Wgsl(desc.vertex_source.into()),
            });
        let fragment = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&format!("{} fragment", desc.label)),
                source: wgpu::ShaderSource::Wgsl(desc.fragment_source.into()),
            });
        let layout = mk_pipeline_layout(
            &self.device,
            desc.label,
            &self.uniform_layout,
            desc.samples_texture.then_some(&self.texture_layout),
        );

        let id = ProgramId(self.next_id());
        self.programs.insert(
            id,
            Program {
                label: desc.label.to_string(),
                vertex,
                fragment,
                layout,
                block: vec![0; desc.uniform_block_size as usize],
                samples_texture: desc.samples_texture,
                vertex_inputs: desc.vertex_inputs.to_vec(),
            },
        );
        Ok(id)
    }

    fn release_buffer(&mut self, buffer: BufferId) {
        if let Some(buffer) = self.buffers.remove(&buffer) {
            buffer.destroy();
        }
    }

    fn release_texture(&mut self, texture: TextureId) {
        if let Some(texture) = self.textures.remove(&texture) {
            texture.texture.destroy();
        }
    }

    fn use_program(&mut self, program: ProgramId) -> Result<(), GpuError> {
        self.program(program)?;
        self.bound.program = Some(program);
        Ok(())
    }

    fn set_uniform_matrix(
        &mut self,
        program: ProgramId,
        offset: u32,
        matrix: &RawMatrix,
    ) -> Result<(), GpuError> {
        let target = self
            .programs
            .get_mut(&program)
            .ok_or(GpuError::UnknownProgram(program))?;
        let start = offset as usize;
        let end = start + MATRIX_BYTES as usize;
        if end > target.block.len() {
            return Err(GpuError::UniformOutOfRange {
                program: target.label.clone(),
                offset,
                size: target.block.len() as u32,
            });
        }
        target.block[start..end].copy_from_slice(bytemuck::cast_slice(matrix));
        Ok(())
    }

    fn bind_vertex_streams(
        &mut self,
        layout: VertexLayout,
        buffers: &[BufferId],
    ) -> Result<(), GpuError> {
        if buffers.len() != layout.stream_count() {
            return Err(GpuError::StreamCount {
                layout,
                expected: layout.stream_count(),
                got: buffers.len(),
            });
        }
        if let Some(missing) = buffers.iter().find(|id| !self.buffers.contains_key(id)) {
            return Err(GpuError::UnknownBuffer(*missing));
        }
        self.bound.streams = Some((layout, buffers.to_vec()));
        Ok(())
    }

    fn bind_texture(&mut self, texture: TextureId) -> Result<(), GpuError> {
        if !self.textures.contains_key(&texture) {
            return Err(GpuError::UnknownTexture(texture));
        }
        self.bound.texture = Some(texture);
        Ok(())
    }

    fn unbind(&mut self) {
        self.bound.streams = None;
        self.bound.texture = None;
    }

    fn draw(
        &mut self,
        topology: wgpu::PrimitiveTopology,
        vertex_count: u32,
    ) -> Result<(), GpuError> {
        let program_id = self.bound.program.ok_or(GpuError::NoActiveProgram)?;
        let (layout, streams) = self.bound.streams.clone().ok_or(GpuError::NothingBound)?;
        let program = self.program(program_id)?;

        if let Some(location) = program
            .vertex_inputs
            .iter()
            .copied()
            .find(|location| !layout.provides(*location))
        {
            return Err(GpuError::LayoutMismatch {
                program: program.label.clone(),
                layout,
                location,
            });
        }
        let texture = match (program.samples_texture, self.bound.texture) {
            (true, None) => return Err(GpuError::MissingTexture(program.label.clone())),
            (true, texture) => texture,
            (false, _) => None,
        };

        let uniform_offset = self.frame.uniforms.len() as u32;
        let mut snapshot = program.block.clone();
        snapshot.resize(self.arena.stride as usize, 0);
        self.frame.uniforms.extend_from_slice(&snapshot);

        let key = PipelineKey {
            program: program_id,
            layout,
            topology,
        };
        self.ensure_pipeline(key)?;
        self.frame.draws.push(DrawCommand {
            pipeline: key,
            streams,
            texture,
            vertex_count,
            uniform_offset,
        });
        Ok(())
    }

    fn clear(&mut self, colour: wgpu::Color) -> Result<(), GpuError> {
        self.frame.clear = colour;
        self.frame.draws.clear();
        self.frame.uniforms.clear();
        Ok(())
    }

    fn present(&mut self) -> Result<(), GpuError> {
        self.window.request_redraw();

        // Rendering requires the surface to be configured
        if !self.is_surface_configured {
            self.frame.draws.clear();
            self.frame.uniforms.clear();
            return Ok(());
        }

        let output = match self.surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(output)
            | wgpu::CurrentSurfaceTexture::Suboptimal(output) => output,
            wgpu::CurrentSurfaceTexture::Lost | wgpu::CurrentSurfaceTexture::Outdated => {
                self.reconfigure();
                return Err(GpuError::SurfaceLost);
            }
            e => return Err(GpuError::Surface(format!("{e:?}"))),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.arena.reserve(
            &self.device,
            &self.uniform_layout,
            self.frame.uniforms.len() as u64,
        );
        if !self.frame.uniforms.is_empty() {
            self.queue
                .write_buffer(&self.arena.buffer, 0, &self.frame.uniforms);
        }

        let commands = self.encode(&view);
        self.queue.submit(std::iter::once(commands));
        output.present();

        self.frame.draws.clear();
        self.frame.uniforms.clear();
        Ok(())
    }
}
