//! Compiling, "linking" and reflecting WGSL programs with naga.
//!
//! This is the GPU-free half of program registration. Each stage is parsed
//! and validated on its own, then the two stages are checked against each
//! other and against the binding layout the renderer provides:
//!
//! - group 0, binding 0: one `var<uniform>` block holding the matrices
//! - group 1, binding 0: the diffuse `texture_2d<f32>`
//! - group 1, binding 1: the `s_texture` sampler
//!
//! Uniform slots are resolved here, once, by member name.

use naga::{
    AddressSpace, Binding, Handle, Module, Scalar, Type, TypeInner, VectorSize,
    valid::{Capabilities, ValidationFlags, Validator},
};

use crate::error::{ShaderError, ShaderStage};

use super::{MatrixSlot, UniformLocation, UniformSlots};

/// Largest uniform block the device reserves per draw.
pub const MAX_UNIFORM_BLOCK: u32 = 256;

/// Group holding the uniform block.
pub const UNIFORM_GROUP: u32 = 0;
/// Group holding the texture and its sampler.
pub const TEXTURE_GROUP: u32 = 1;

/// Name of the sampler uniform meshes are textured through.
pub const SAMPLER_NAME: &str = "s_texture";

/// A program that passed compilation and linking but has not been handed to
/// a device yet.
#[derive(Clone, Debug)]
pub struct CompiledProgram {
    pub name: String,
    pub vertex_source: String,
    pub fragment_source: String,
    pub slots: UniformSlots,
    pub uniform_block_size: u32,
    pub vertex_inputs: Vec<u32>,
}

impl CompiledProgram {
    pub fn samples_texture(&self) -> bool {
        self.slots.sampler != UniformLocation::Unused
    }
}

#[derive(Clone, Debug)]
struct GlobalResource {
    name: Option<String>,
    group: u32,
    binding: u32,
    space: AddressSpace,
    ty: Handle<Type>,
}

/// A user-defined stage input or output.
struct Varying {
    location: u32,
    ty: TypeInner,
}

/// What one stage exposes to the other and to the device.
struct StageInterface {
    inputs: Vec<Varying>,
    outputs: Vec<Varying>,
    resources: Vec<GlobalResource>,
}

/// Compile both stages and link them into a [`CompiledProgram`].
pub fn compile(
    name: &str,
    vertex_source: &str,
    fragment_source: &str,
) -> Result<CompiledProgram, ShaderError> {
    let vertex = parse(ShaderStage::Vertex, vertex_source)?;
    let fragment = parse(ShaderStage::Fragment, fragment_source)?;

    let vertex_interface = interface(ShaderStage::Vertex, &vertex)?;
    let fragment_interface = interface(ShaderStage::Fragment, &fragment)?;

    link(&vertex_interface, &fragment_interface)?;

    let mut slots = UniformSlots::default();
    let mut uniform_block_size = 0;
    for (module, stage) in [(&vertex, &vertex_interface), (&fragment, &fragment_interface)] {
        for resource in &stage.resources {
            match resource.space {
                AddressSpace::Uniform => {
                    uniform_block_size = resolve_block(module, resource, &mut slots)?;
                }
                AddressSpace::Handle => resolve_handle(module, resource, &mut slots)?,
                other => {
                    return Err(link_error(format!(
                        "global `{}` lives in unsupported address space {other:?}",
                        display_name(resource)
                    )));
                }
            }
        }
    }
    check_texture_pairing(&fragment, &fragment_interface, &slots)?;

    Ok(CompiledProgram {
        name: name.to_string(),
        vertex_source: vertex_source.to_string(),
        fragment_source: fragment_source.to_string(),
        slots,
        uniform_block_size,
        vertex_inputs: vertex_interface
            .inputs
            .iter()
            .map(|input| input.location)
            .collect(),
    })
}

fn parse(stage: ShaderStage, source: &str) -> Result<Module, ShaderError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| ShaderError::Compile {
        stage,
        log: e.emit_to_string(source),
    })?;
    Validator::new(ValidationFlags::all(), Capabilities::empty())
        .validate(&module)
        .map_err(|e| ShaderError::Compile {
            stage,
            log: e.emit_to_string(source),
        })?;
    Ok(module)
}

fn interface(stage: ShaderStage, module: &Module) -> Result<StageInterface, ShaderError> {
    let wanted = match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    };
    let entry = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == wanted)
        .ok_or_else(|| ShaderError::Compile {
            stage,
            log: format!("no @{stage} entry point"),
        })?;

    let mut inputs = Vec::new();
    for argument in &entry.function.arguments {
        collect_locations(module, argument.ty, argument.binding.as_ref(), &mut inputs);
    }
    let mut outputs = Vec::new();
    if let Some(result) = &entry.function.result {
        collect_locations(module, result.ty, result.binding.as_ref(), &mut outputs);
    }

    let resources = module
        .global_variables
        .iter()
        .filter_map(|(_, var)| {
            var.binding.as_ref().map(|binding| GlobalResource {
                name: var.name.clone(),
                group: binding.group,
                binding: binding.binding,
                space: var.space,
                ty: var.ty,
            })
        })
        .collect();

    Ok(StageInterface {
        inputs,
        outputs,
        resources,
    })
}

fn collect_locations(
    module: &Module,
    ty: Handle<Type>,
    binding: Option<&Binding>,
    out: &mut Vec<Varying>,
) {
    match binding {
        Some(Binding::Location { location, .. }) => out.push(Varying {
            location: *location,
            ty: module.types[ty].inner.clone(),
        }),
        Some(_) => {}
        None => {
            if let TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_locations(module, member.ty, member.binding.as_ref(), out);
                }
            }
        }
    }
}

fn link(vertex: &StageInterface, fragment: &StageInterface) -> Result<(), ShaderError> {
    let mut problems = Vec::new();

    for input in &fragment.inputs {
        match vertex.outputs.iter().find(|o| o.location == input.location) {
            None => problems.push(format!(
                "fragment input @location({}) is not written by the vertex stage",
                input.location
            )),
            Some(output) if output.ty != input.ty => problems.push(format!(
                "@location({}) is {:?} in the vertex stage but {:?} in the fragment stage",
                input.location, output.ty, input.ty
            )),
            Some(_) => {}
        }
    }

    for ours in &vertex.resources {
        for theirs in &fragment.resources {
            if ours.group == theirs.group
                && ours.binding == theirs.binding
                && (ours.name != theirs.name || ours.space != theirs.space)
            {
                problems.push(format!(
                    "@group({}) @binding({}) is `{}` in the vertex stage but `{}` in the fragment stage",
                    ours.group,
                    ours.binding,
                    display_name(ours),
                    display_name(theirs)
                ));
            }
        }
    }

    let uniform_blocks = vertex
        .resources
        .iter()
        .chain(fragment.resources.iter())
        .filter(|r| r.space == AddressSpace::Uniform)
        .filter(|r| (r.group, r.binding) != (UNIFORM_GROUP, 0))
        .count();
    if uniform_blocks > 0 {
        problems.push(format!(
            "uniform blocks must be declared at @group({UNIFORM_GROUP}) @binding(0)"
        ));
    }

    for resource in vertex.resources.iter().chain(fragment.resources.iter()) {
        if resource.group != UNIFORM_GROUP && resource.group != TEXTURE_GROUP {
            problems.push(format!(
                "`{}` uses @group({}), which the renderer does not provide",
                display_name(resource),
                resource.group
            ));
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(link_error(problems.join("\n")))
    }
}

/// Resolve matrix slots from the uniform block. Returns the block size.
fn resolve_block(
    module: &Module,
    resource: &GlobalResource,
    slots: &mut UniformSlots,
) -> Result<u32, ShaderError> {
    let TypeInner::Struct { members, span } = &module.types[resource.ty].inner else {
        return Err(link_error(format!(
            "uniform `{}` must be a struct of matrices",
            display_name(resource)
        )));
    };
    if *span > MAX_UNIFORM_BLOCK {
        return Err(link_error(format!(
            "uniform block `{}` is {span} bytes, the limit is {MAX_UNIFORM_BLOCK}",
            display_name(resource)
        )));
    }
    for member in members {
        let Some(slot) = member.name.as_deref().and_then(MatrixSlot::from_name) else {
            continue;
        };
        let is_mat4 = matches!(
            module.types[member.ty].inner,
            TypeInner::Matrix {
                columns: VectorSize::Quad,
                rows: VectorSize::Quad,
                scalar,
            } if scalar == Scalar::F32
        );
        if !is_mat4 {
            return Err(link_error(format!(
                "uniform `{}` must be a mat4x4<f32>",
                slot.name()
            )));
        }
        *slots.matrix_mut(slot) = UniformLocation::Block {
            offset: member.offset,
        };
    }
    Ok(*span)
}

fn resolve_handle(
    module: &Module,
    resource: &GlobalResource,
    slots: &mut UniformSlots,
) -> Result<(), ShaderError> {
    if resource.name.as_deref() != Some(SAMPLER_NAME) {
        return Ok(());
    }
    if !matches!(module.types[resource.ty].inner, TypeInner::Sampler { comparison: false }) {
        return Err(link_error(format!("`{SAMPLER_NAME}` must be a filtering sampler")));
    }
    if (resource.group, resource.binding) != (TEXTURE_GROUP, 1) {
        return Err(link_error(format!(
            "`{SAMPLER_NAME}` must be declared at @group({TEXTURE_GROUP}) @binding(1)"
        )));
    }
    slots.sampler = UniformLocation::Resource {
        group: resource.group,
        binding: resource.binding,
    };
    Ok(())
}

/// A sampled program needs its texture next to the sampler.
fn check_texture_pairing(
    module: &Module,
    fragment: &StageInterface,
    slots: &UniformSlots,
) -> Result<(), ShaderError> {
    if slots.sampler == UniformLocation::Unused {
        return Ok(());
    }
    let has_texture = fragment.resources.iter().any(|r| {
        (r.group, r.binding) == (TEXTURE_GROUP, 0)
            && matches!(module.types[r.ty].inner, TypeInner::Image { .. })
    });
    if has_texture {
        Ok(())
    } else {
        Err(link_error(format!(
            "`{SAMPLER_NAME}` needs a texture_2d at @group({TEXTURE_GROUP}) @binding(0)"
        )))
    }
}

fn display_name(resource: &GlobalResource) -> &str {
    resource.name.as_deref().unwrap_or("<unnamed>")
}

fn link_error(log: String) -> ShaderError {
    ShaderError::Link { log }
}
