//! Shader binding table.
//!
//! Maps logical shader names to device programs and the uniform slots
//! resolved for them at registration. Registration is all-or-nothing: a
//! program that fails to compile, link, or be created on the device leaves
//! the table exactly as it was.
//!
//! Uniform values live per program on the device, so the mesh and the line
//! program can be switched freely within a frame.

use std::collections::HashMap;

use cgmath::Matrix4;

use crate::{
    error::ShaderError,
    gpu::{Gpu, GpuError, ProgramDesc, ProgramId},
};

pub mod basic;
pub mod compile;

pub use compile::{CompiledProgram, compile};

/// WGSL sources of the programs the renderer draws with.
pub mod builtin {
    pub const MESH_VERTEX: &str = include_str!("shaders/mesh.vert.wgsl");
    pub const MESH_FRAGMENT: &str = include_str!("shaders/mesh.frag.wgsl");
    pub const LINE_VERTEX: &str = include_str!("shaders/line.vert.wgsl");
    pub const LINE_FRAGMENT: &str = include_str!("shaders/line.frag.wgsl");

    pub const MESH: &str = "mesh";
    pub const LINE: &str = "line";
}

/// Where a uniform lives, resolved once per program.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformLocation {
    /// The program does not declare it. Writes are no-ops.
    Unused,
    /// Byte offset into the program's uniform block.
    Block { offset: u32 },
    /// A bound resource such as the texture sampler.
    Resource { group: u32, binding: u32 },
}

/// The matrix uniforms the pipeline writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatrixSlot {
    Model,
    View,
    Projection,
}

impl MatrixSlot {
    pub fn name(&self) -> &'static str {
        match self {
            MatrixSlot::Model => "model",
            MatrixSlot::View => "view",
            MatrixSlot::Projection => "projection",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "model" => Some(MatrixSlot::Model),
            "view" => Some(MatrixSlot::View),
            "projection" => Some(MatrixSlot::Projection),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UniformSlots {
    pub model: UniformLocation,
    pub view: UniformLocation,
    pub projection: UniformLocation,
    pub sampler: UniformLocation,
}

impl Default for UniformSlots {
    fn default() -> Self {
        Self {
            model: UniformLocation::Unused,
            view: UniformLocation::Unused,
            projection: UniformLocation::Unused,
            sampler: UniformLocation::Unused,
        }
    }
}

impl UniformSlots {
    pub fn matrix(&self, slot: MatrixSlot) -> UniformLocation {
        match slot {
            MatrixSlot::Model => self.model,
            MatrixSlot::View => self.view,
            MatrixSlot::Projection => self.projection,
        }
    }

    pub(crate) fn matrix_mut(&mut self, slot: MatrixSlot) -> &mut UniformLocation {
        match slot {
            MatrixSlot::Model => &mut self.model,
            MatrixSlot::View => &mut self.view,
            MatrixSlot::Projection => &mut self.projection,
        }
    }
}

/// Index of a program in its [`ShaderTable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShaderId(usize);

#[derive(Clone, Debug)]
pub struct ShaderProgram {
    name: String,
    program: ProgramId,
    slots: UniformSlots,
    /// Projection generation last uploaded to this program.
    projection_generation: Option<u64>,
}

impl ShaderProgram {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn program(&self) -> ProgramId {
        self.program
    }

    pub fn slots(&self) -> &UniformSlots {
        &self.slots
    }

    pub fn samples_texture(&self) -> bool {
        self.slots.sampler != UniformLocation::Unused
    }

    pub fn projection_generation(&self) -> Option<u64> {
        self.projection_generation
    }
}

#[derive(Debug, Default)]
pub struct ShaderTable {
    programs: Vec<ShaderProgram>,
    by_name: HashMap<String, ShaderId>,
    active: Option<ShaderId>,
}

impl ShaderTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile, link and create a program under `name`.
    pub fn register(
        &mut self,
        gpu: &mut dyn Gpu,
        name: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<ShaderId, ShaderError> {
        let compiled = compile(name, vertex_source, fragment_source)?;
        self.register_compiled(gpu, compiled)
    }

    /// Hand an already compiled program to the device.
    pub fn register_compiled(
        &mut self,
        gpu: &mut dyn Gpu,
        compiled: CompiledProgram,
    ) -> Result<ShaderId, ShaderError> {
        if self.by_name.contains_key(&compiled.name) {
            return Err(ShaderError::Link {
                log: format!("a program named `{}` is already registered", compiled.name),
            });
        }
        let program = gpu
            .create_program(&ProgramDesc {
                label: &compiled.name,
                vertex_source: &compiled.vertex_source,
                fragment_source: &compiled.fragment_source,
                uniform_block_size: compiled.uniform_block_size,
                samples_texture: compiled.samples_texture(),
                vertex_inputs: &compiled.vertex_inputs,
            })
            .map_err(|e| ShaderError::Link { log: e.to_string() })?;

        let id = ShaderId(self.programs.len());
        log::info!("registered shader program `{}` as {:?}", compiled.name, id);
        self.by_name.insert(compiled.name.clone(), id);
        self.programs.push(ShaderProgram {
            name: compiled.name,
            program,
            slots: compiled.slots,
            projection_generation: None,
        });
        Ok(id)
    }

    /// # Panics
    ///
    /// If `id` was issued by a different table.
    pub fn get(&self, id: ShaderId) -> &ShaderProgram {
        &self.programs[id.0]
    }

    pub fn find(&self, name: &str) -> Option<ShaderId> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = ShaderId> + '_ {
        (0..self.programs.len()).map(ShaderId)
    }

    pub fn active(&self) -> Option<ShaderId> {
        self.active
    }

    /// Make `id` the active program. Does nothing if it already is.
    pub fn use_program(&mut self, gpu: &mut dyn Gpu, id: ShaderId) -> Result<(), GpuError> {
        if self.active == Some(id) {
            return Ok(());
        }
        gpu.use_program(self.get(id).program)?;
        self.active = Some(id);
        Ok(())
    }

    /// Upload `matrix` to `slot` of program `id`. A slot the program does not
    /// declare is silently skipped.
    pub fn set_matrix(
        &self,
        gpu: &mut dyn Gpu,
        id: ShaderId,
        slot: MatrixSlot,
        matrix: &Matrix4<f32>,
    ) -> Result<(), GpuError> {
        let program = self.get(id);
        match program.slots.matrix(slot) {
            UniformLocation::Block { offset } => {
                gpu.set_uniform_matrix(program.program, offset, &(*matrix).into())
            }
            UniformLocation::Unused | UniformLocation::Resource { .. } => Ok(()),
        }
    }

    /// Upload a projection to `id` and remember its generation.
    pub fn set_projection(
        &mut self,
        gpu: &mut dyn Gpu,
        id: ShaderId,
        projection: &Matrix4<f32>,
        generation: u64,
    ) -> Result<(), GpuError> {
        self.set_matrix(gpu, id, MatrixSlot::Projection, projection)?;
        self.programs[id.0].projection_generation = Some(generation);
        Ok(())
    }

    /// Re-upload the projection to every registered program.
    pub fn upload_projection_all(
        &mut self,
        gpu: &mut dyn Gpu,
        projection: &Matrix4<f32>,
        generation: u64,
    ) -> Result<(), GpuError> {
        for index in 0..self.programs.len() {
            self.set_projection(gpu, ShaderId(index), projection, generation)?;
        }
        Ok(())
    }
}

/// Receives a drawable's model matrix right before its draw call.
pub trait UniformSetter {
    fn set_model(&mut self, gpu: &mut dyn Gpu, model: &Matrix4<f32>) -> Result<(), GpuError>;
}

/// A program of a table, as seen by the registry while drawing.
pub struct BoundProgram<'a> {
    table: &'a ShaderTable,
    id: ShaderId,
}

impl<'a> BoundProgram<'a> {
    pub fn new(table: &'a ShaderTable, id: ShaderId) -> Self {
        Self { table, id }
    }
}

impl UniformSetter for BoundProgram<'_> {
    fn set_model(&mut self, gpu: &mut dyn Gpu, model: &Matrix4<f32>) -> Result<(), GpuError> {
        self.table.set_matrix(gpu, self.id, MatrixSlot::Model, model)
    }
}
