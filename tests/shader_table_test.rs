use cgmath::{Matrix4, SquareMatrix};
use common::{recording_gpu::{Call, RecordingGpu}, test_utils::assert_matrix_eq};
use flow_scene::{
    error::{ShaderError, ShaderStage},
    pipelines::{MatrixSlot, ShaderTable, UniformLocation, builtin},
};

mod common;

/// A line-compatible program that only reads `model` and `view`.
const NO_PROJECTION_VERTEX: &str = r#"
struct Transforms {
    model: mat4x4<f32>,
    view: mat4x4<f32>,
};

@group(0) @binding(0)
var<uniform> transforms: Transforms;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) colour: vec4<f32>,
};

@vertex
fn vs_main(@location(0) position: vec3<f32>, @location(1) colour: vec4<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = transforms.view * transforms.model * vec4<f32>(position, 1.0);
    out.colour = colour;
    return out;
}
"#;

fn table_with_builtins(gpu: &mut RecordingGpu) -> ShaderTable {
    let mut table = ShaderTable::new();
    table
        .register(gpu, builtin::MESH, builtin::MESH_VERTEX, builtin::MESH_FRAGMENT)
        .unwrap();
    table
        .register(gpu, builtin::LINE, builtin::LINE_VERTEX, builtin::LINE_FRAGMENT)
        .unwrap();
    table
}

#[test]
fn compile_failure_leaves_the_table_untouched() {
    let mut gpu = RecordingGpu::new();
    let mut table = table_with_builtins(&mut gpu);
    gpu.clear_log();

    let err = table
        .register(&mut gpu, "broken", "@vertex fn vs_main( {", builtin::LINE_FRAGMENT)
        .unwrap_err();

    assert!(matches!(
        err,
        ShaderError::Compile {
            stage: ShaderStage::Vertex,
            ..
        }
    ));
    assert_eq!(table.len(), 2);
    assert_eq!(table.find("broken"), None);
    assert!(gpu.calls.is_empty(), "nothing may reach the device");
}

#[test]
fn link_failure_leaves_the_table_untouched() {
    let mut gpu = RecordingGpu::new();
    let mut table = table_with_builtins(&mut gpu);

    // The mesh fragment stage samples a texture and reads tex_coords, which
    // the line vertex stage writes as a vec4 colour.
    let err = table
        .register(&mut gpu, "mismatch", builtin::LINE_VERTEX, builtin::MESH_FRAGMENT)
        .unwrap_err();

    assert!(matches!(err, ShaderError::Link { .. }), "{err}");
    assert_eq!(table.len(), 2);
    assert_eq!(table.find("mismatch"), None);
}

#[test]
fn device_rejection_and_duplicates_are_link_errors() {
    let mut gpu = RecordingGpu::new();
    let mut table = table_with_builtins(&mut gpu);

    let err = table
        .register(&mut gpu, builtin::LINE, builtin::LINE_VERTEX, builtin::LINE_FRAGMENT)
        .unwrap_err();
    assert!(matches!(err, ShaderError::Link { .. }));

    gpu.fail_create_program = true;
    let err = table
        .register(&mut gpu, "other", builtin::LINE_VERTEX, builtin::LINE_FRAGMENT)
        .unwrap_err();
    assert!(matches!(err, ShaderError::Link { .. }));
    assert_eq!(table.len(), 2);
}

#[test]
fn use_program_skips_the_active_one() {
    let mut gpu = RecordingGpu::new();
    let mut table = table_with_builtins(&mut gpu);
    let mesh = table.find(builtin::MESH).unwrap();
    let line = table.find(builtin::LINE).unwrap();

    table.use_program(&mut gpu, mesh).unwrap();
    table.use_program(&mut gpu, mesh).unwrap();
    table.use_program(&mut gpu, line).unwrap();

    let mesh_program = table.get(mesh).program();
    let line_program = table.get(line).program();
    assert_eq!(gpu.used_programs(), vec![mesh_program, line_program]);
    assert_eq!(table.active(), Some(line));
}

#[test]
fn unused_slot_writes_are_no_ops() {
    let mut gpu = RecordingGpu::new();
    let mut table = ShaderTable::new();
    let id = table
        .register(&mut gpu, "flat", NO_PROJECTION_VERTEX, builtin::LINE_FRAGMENT)
        .unwrap();
    assert_eq!(table.get(id).slots().projection, UniformLocation::Unused);
    gpu.clear_log();

    table
        .set_matrix(&mut gpu, id, MatrixSlot::Projection, &Matrix4::identity())
        .unwrap();
    assert!(gpu.calls.is_empty());

    table
        .set_matrix(&mut gpu, id, MatrixSlot::View, &Matrix4::identity())
        .unwrap();
    assert_eq!(gpu.calls.len(), 1);
}

#[test]
fn switching_programs_keeps_each_programs_uniforms() {
    let mut gpu = RecordingGpu::new();
    let mut table = table_with_builtins(&mut gpu);
    let mesh = table.find(builtin::MESH).unwrap();
    let line = table.find(builtin::LINE).unwrap();
    let mesh_view = Matrix4::from_translation([1.0, 0.0, 0.0].into());
    let line_view = Matrix4::from_translation([0.0, 2.0, 0.0].into());

    table.use_program(&mut gpu, mesh).unwrap();
    table
        .set_matrix(&mut gpu, mesh, MatrixSlot::View, &mesh_view)
        .unwrap();
    table.use_program(&mut gpu, line).unwrap();
    table
        .set_matrix(&mut gpu, line, MatrixSlot::View, &line_view)
        .unwrap();

    let UniformLocation::Block { offset } = table.get(mesh).slots().view else {
        panic!("view is a block member");
    };
    assert_matrix_eq(gpu.uniform(table.get(mesh).program(), offset), mesh_view);
    assert_matrix_eq(gpu.uniform(table.get(line).program(), offset), line_view);
}

#[test]
fn projection_upload_reaches_every_program() {
    let mut gpu = RecordingGpu::new();
    let mut table = table_with_builtins(&mut gpu);
    gpu.clear_log();
    let projection = Matrix4::from_nonuniform_scale(2.0, 3.0, 4.0);

    table
        .upload_projection_all(&mut gpu, &projection, 7)
        .unwrap();

    for id in table.ids() {
        let program = table.get(id);
        assert_eq!(program.projection_generation(), Some(7));
        let UniformLocation::Block { offset } = program.slots().projection else {
            panic!("built-in programs declare a projection");
        };
        assert_matrix_eq(gpu.uniform(program.program(), offset), projection);
    }
    let uploads = gpu
        .calls
        .iter()
        .filter(|call| matches!(call, Call::SetUniform { .. }))
        .count();
    assert_eq!(uploads, 2);
}
