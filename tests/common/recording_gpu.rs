use std::collections::{HashMap, HashSet};

use cgmath::Matrix4;
use flow_scene::{
    data_structures::vertex::VertexLayout,
    gpu::{
        BufferId, Gpu, GpuError, ProgramDesc, ProgramId, RawMatrix, TextureDesc, TextureId,
        check_buffer_size, check_texture_extent,
    },
};

/// Everything a draw call saw, captured at the time of the call.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawRecord {
    pub program: ProgramId,
    pub label: String,
    pub topology: wgpu::PrimitiveTopology,
    pub vertex_count: u32,
    pub layout: VertexLayout,
    pub streams: Vec<BufferId>,
    pub texture: Option<TextureId>,
    /// Copy of the program's uniform block.
    pub uniforms: Vec<u8>,
}

impl DrawRecord {
    pub fn matrix_at(&self, offset: u32) -> Matrix4<f32> {
        read_matrix(&self.uniforms, offset)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    CreateBuffer(BufferId),
    CreateTexture(TextureId),
    CreateProgram(ProgramId),
    ReleaseBuffer(BufferId),
    ReleaseTexture(TextureId),
    UseProgram(ProgramId),
    SetUniform { program: ProgramId, offset: u32 },
    BindStreams(VertexLayout, Vec<BufferId>),
    BindTexture(TextureId),
    Unbind,
    Draw(DrawRecord),
    Clear,
    Present,
}

#[derive(Debug)]
struct FakeProgram {
    label: String,
    block: Vec<u8>,
    samples_texture: bool,
    vertex_inputs: Vec<u32>,
}

/// A [`Gpu`] that keeps the state a GL context would and logs every call.
///
/// Failures can be injected per operation to drive the error paths.
#[derive(Debug, Default)]
pub struct RecordingGpu {
    pub calls: Vec<Call>,
    next_id: u32,
    buffers: HashMap<BufferId, Vec<u8>>,
    textures: HashMap<TextureId, (u32, u32)>,
    programs: HashMap<ProgramId, FakeProgram>,
    active: Option<ProgramId>,
    streams: Option<(VertexLayout, Vec<BufferId>)>,
    texture: Option<TextureId>,

    /// Draws fail while one of these buffers is bound.
    pub poisoned_buffers: HashSet<BufferId>,
    pub fail_use_program: bool,
    pub fail_create_program: bool,
    pub fail_create_texture: bool,
    pub fail_present: Option<GpuError>,
    /// Creation calls are checked against these, like a real device.
    pub limits: wgpu::Limits,
}

impl RecordingGpu {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    pub fn draws(&self) -> Vec<&DrawRecord> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Draw(record) => Some(record),
                _ => None,
            })
            .collect()
    }

    pub fn used_programs(&self) -> Vec<ProgramId> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::UseProgram(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    /// Current value of a program's uniform at `offset`.
    pub fn uniform(&self, program: ProgramId, offset: u32) -> Matrix4<f32> {
        read_matrix(&self.programs[&program].block, offset)
    }

    pub fn buffer_floats(&self, id: BufferId) -> Vec<f32> {
        self.buffers[&id]
            .chunks_exact(4)
            .map(|chunk| f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn is_bound(&self) -> bool {
        self.streams.is_some() || self.texture.is_some()
    }

    pub fn clear_log(&mut self) {
        self.calls.clear();
    }
}

fn read_matrix(block: &[u8], offset: u32) -> Matrix4<f32> {
    let start = offset as usize;
    let raw: RawMatrix =
        bytemuck::pod_read_unaligned(&block[start..start + std::mem::size_of::<RawMatrix>()]);
    raw.into()
}

impl Gpu for RecordingGpu {
    fn create_vertex_buffer(&mut self, label: &str, contents: &[u8]) -> Result<BufferId, GpuError> {
        check_buffer_size(&self.limits, label, contents.len())?;
        let id = BufferId(self.next_id());
        self.buffers.insert(id, contents.to_vec());
        self.calls.push(Call::CreateBuffer(id));
        Ok(id)
    }

    fn create_texture(&mut self, desc: &TextureDesc<'_>) -> Result<TextureId, GpuError> {
        if self.fail_create_texture {
            return Err(GpuError::Surface("out of texture memory".to_string()));
        }
        check_texture_extent(&self.limits, desc.label, desc.width, desc.height)?;
        let id = TextureId(self.next_id());
        self.textures.insert(id, (desc.width, desc.height));
        self.calls.push(Call::CreateTexture(id));
        Ok(id)
    }

    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramId, GpuError> {
        if self.fail_create_program {
            return Err(GpuError::Program {
                label: desc.label.to_string(),
                reason: "driver rejected the program".to_string(),
            });
        }
        let id = ProgramId(self.next_id());
        self.programs.insert(
            id,
            FakeProgram {
                label: desc.label.to_string(),
                block: vec![0; desc.uniform_block_size as usize],
                samples_texture: desc.samples_texture,
                vertex_inputs: desc.vertex_inputs.to_vec(),
            },
        );
        self.calls.push(Call::CreateProgram(id));
        Ok(id)
    }

    fn release_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(&buffer);
        self.calls.push(Call::ReleaseBuffer(buffer));
    }

    fn release_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture);
        self.calls.push(Call::ReleaseTexture(texture));
    }

    fn use_program(&mut self, program: ProgramId) -> Result<(), GpuError> {
        if self.fail_use_program || !self.programs.contains_key(&program) {
            return Err(GpuError::UnknownProgram(program));
        }
        self.active = Some(program);
        self.calls.push(Call::UseProgram(program));
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
        let end = start + std::mem::size_of::<RawMatrix>();
        if end > target.block.len() {
            return Err(GpuError::UniformOutOfRange {
                program: target.label.clone(),
                offset,
                size: target.block.len() as u32,
            });
        }
        target.block[start..end].copy_from_slice(bytemuck::cast_slice(matrix));
        self.calls.push(Call::SetUniform { program, offset });
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
        self.streams = Some((layout, buffers.to_vec()));
        self.calls.push(Call::BindStreams(layout, buffers.to_vec()));
        Ok(())
    }

    fn bind_texture(&mut self, texture: TextureId) -> Result<(), GpuError> {
        if !self.textures.contains_key(&texture) {
            return Err(GpuError::UnknownTexture(texture));
        }
        self.texture = Some(texture);
        self.calls.push(Call::BindTexture(texture));
        Ok(())
    }

    fn unbind(&mut self) {
        self.streams = None;
        self.texture = None;
        self.calls.push(Call::Unbind);
    }

    fn draw(
        &mut self,
        topology: wgpu::PrimitiveTopology,
        vertex_count: u32,
    ) -> Result<(), GpuError> {
        let program_id = self.active.ok_or(GpuError::NoActiveProgram)?;
        let (layout, streams) = self.streams.clone().ok_or(GpuError::NothingBound)?;
        if let Some(poisoned) = streams.iter().find(|id| self.poisoned_buffers.contains(id)) {
            return Err(GpuError::UnknownBuffer(*poisoned));
        }
        let program = &self.programs[&program_id];
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
        if program.samples_texture && self.texture.is_none() {
            return Err(GpuError::MissingTexture(program.label.clone()));
        }
        let record = DrawRecord {
            program: program_id,
            label: program.label.clone(),
            topology,
            vertex_count,
            layout,
            streams,
            texture: self.texture,
            uniforms: program.block.clone(),
        };
        self.calls.push(Call::Draw(record));
        Ok(())
    }

    fn clear(&mut self, _colour: wgpu::Color) -> Result<(), GpuError> {
        self.calls.push(Call::Clear);
        Ok(())
    }

    fn present(&mut self) -> Result<(), GpuError> {
        if let Some(e) = self.fail_present.clone() {
            return Err(e);
        }
        self.calls.push(Call::Present);
        Ok(())
    }
}
