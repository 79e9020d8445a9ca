//! End-to-end translation scenarios
//! Demonstrates: AST → IR → Collect → Assign IDs → Emit → rspirv parse

mod common;

use common::*;
use rspirv::dr;
use rspirv::spirv::{self, GLOp};
use spirvgen::parser::{Attribute, AttributeValue, BinaryOp, Expression, IfPart, Statement, TypeRef};
use spirvgen::{CompileOptions, Compiler, Error, ShaderStage};
use std::collections::{HashMap, HashSet};

fn is_terminator(op: spirv::Op) -> bool {
    matches!(
        op,
        spirv::Op::Branch
            | spirv::Op::BranchConditional
            | spirv::Op::Return
            | spirv::Op::ReturnValue
            | spirv::Op::Kill
            | spirv::Op::Unreachable
    )
}

#[test]
fn test_pixel_entry_with_if_yields_three_blocks() {
    let x = Expression::local("x", TypeRef::Int);
    let body = vec![
        var("x", TypeRef::Int, Expression::int(1)),
        Statement::If {
            parts: vec![IfPart {
                condition: Some(Expression::binary(
                    BinaryOp::Gt,
                    x,
                    Expression::int(0),
                    TypeRef::Bool,
                )),
                body: vec![ret()],
            }],
        },
        ret(),
    ];
    let result = compile(&module(vec![stage_struct("Flat", "Pixel", body)]));
    assert_eq!(result.binaries.len(), 1);
    let binary = &result.binaries[0];
    assert_eq!(binary.stage, ShaderStage::Pixel);
    assert_eq!(binary.entry_name, "Flat.Main");

    let parsed = load(&binary.words);
    assert_eq!(parsed.entry_points.len(), 1);
    assert_eq!(
        parsed.entry_points[0].operands[0],
        dr::Operand::ExecutionModel(spirv::ExecutionModel::Fragment)
    );
    assert_eq!(
        parsed.entry_points[0].operands[2],
        dr::Operand::LiteralString("main".to_string())
    );
    assert_eq!(parsed.execution_modes.len(), 1);

    assert_eq!(parsed.functions.len(), 1);
    let blocks = &parsed.functions[0].blocks;
    assert_eq!(blocks.len(), 3);
    for block in blocks {
        let terminators = block
            .instructions
            .iter()
            .filter(|i| is_terminator(i.class.opcode))
            .count();
        assert_eq!(terminators, 1);
        let last = block.instructions.last().unwrap();
        assert!(is_terminator(last.class.opcode));
    }
    let header_ops: Vec<spirv::Op> = blocks[0]
        .instructions
        .iter()
        .map(|i| i.class.opcode)
        .collect();
    let merge = header_ops
        .iter()
        .position(|&op| op == spirv::Op::SelectionMerge)
        .expect("selection merge");
    assert_eq!(header_ops[merge + 1], spirv::Op::BranchConditional);
}

#[test]
fn test_clamp_lowers_to_one_glsl_ext_inst() {
    let float3 = TypeRef::float_vec(3);
    let body = vec![
        var(
            "v",
            float3.clone(),
            Expression::construct(
                float3.clone(),
                vec![
                    Expression::float(0.5),
                    Expression::float(1.5),
                    Expression::float(2.5),
                ],
            ),
        ),
        var(
            "r",
            float3.clone(),
            Expression::call_static(
                "Math",
                "Clamp",
                vec![
                    Expression::local("v", float3.clone()),
                    Expression::construct(float3.clone(), vec![Expression::float(0.0)]),
                    Expression::construct(float3.clone(), vec![Expression::float(1.0)]),
                ],
                float3.clone(),
            ),
        ),
        ret(),
    ];
    let result = compile(&module(vec![stage_struct("Clamped", "Pixel", body)]));
    let parsed = load(&result.binaries[0].words);

    assert_eq!(parsed.ext_inst_imports.len(), 1);
    assert_eq!(
        parsed.ext_inst_imports[0].operands[0],
        dr::Operand::LiteralString("GLSL.std.450".to_string())
    );

    let instructions = function_instructions(&parsed);
    let ext: Vec<_> = instructions
        .iter()
        .filter(|i| i.class.opcode == spirv::Op::ExtInst)
        .collect();
    assert_eq!(ext.len(), 1);
    let ext = ext[0];
    assert_eq!(ext.operands.len(), 5);
    assert_eq!(
        ext.operands[1],
        dr::Operand::LiteralExtInstInteger(GLOp::FClamp as u32)
    );

    let vec3 = parsed
        .types_global_values
        .iter()
        .find(|t| {
            t.class.opcode == spirv::Op::TypeVector
                && t.operands.get(1) == Some(&dr::Operand::LiteralBit32(3))
        })
        .and_then(|t| t.result_id)
        .unwrap();
    assert_eq!(ext.result_type, Some(vec3));

    let pointer_types: HashSet<u32> = parsed
        .types_global_values
        .iter()
        .filter(|t| t.class.opcode == spirv::Op::TypePointer)
        .filter_map(|t| t.result_id)
        .collect();
    let result_types: HashMap<u32, u32> = instructions
        .iter()
        .filter_map(|i| Some((i.result_id?, i.result_type?)))
        .collect();
    for operand in &ext.operands[2..] {
        let dr::Operand::IdRef(id) = *operand else {
            panic!("expected an id operand, got {:?}", operand);
        };
        let ty = result_types[&id];
        assert!(!pointer_types.contains(&ty), "argument %{} is a pointer", id);
    }
}

#[test]
fn test_header_and_bound() {
    let result = compile(&module(vec![stage_struct("Empty", "Vertex", vec![ret()])]));
    let words = &result.binaries[0].words;
    assert_eq!(&words[..3], &[0x0723_0203, 0x0001_0400, 0]);
    assert_eq!(words[4], 0);

    let parsed = load(words);
    let bound = parsed.header.as_ref().unwrap().bound;
    assert_eq!(bound, words[3]);
    let mut ids = HashSet::new();
    for inst in parsed.all_inst_iter() {
        if let Some(id) = inst.result_id {
            assert!(id > 0 && id < bound);
            assert!(ids.insert(id), "duplicate id %{}", id);
        }
    }
    assert_eq!(
        parsed.debug_string_source[0].class.opcode,
        spirv::Op::Source
    );
}

#[test]
fn test_declarations_precede_uses() {
    let float3 = TypeRef::float_vec(3);
    let body = vec![
        var(
            "v",
            float3.clone(),
            Expression::construct(float3, vec![Expression::float(2.0)]),
        ),
        ret(),
    ];
    let result = compile(&module(vec![stage_struct("Order", "Pixel", body)]));
    let parsed = load(&result.binaries[0].words);
    let mut declared = HashSet::new();
    for inst in &parsed.types_global_values {
        if let Some(ty) = inst.result_type {
            assert!(declared.contains(&ty), "type %{} used before declaration", ty);
        }
        for operand in &inst.operands {
            if let dr::Operand::IdRef(id) = operand {
                assert!(declared.contains(id), "%{} used before declaration", id);
            }
        }
        if let Some(id) = inst.result_id {
            declared.insert(id);
        }
    }
}

#[test]
fn test_vertex_interface_and_reflection() {
    let float4 = TypeRef::float_vec(4);
    let mut shader = stage_struct(
        "Transform",
        "Vertex",
        vec![
            Statement::Expression(Expression::assign(
                Expression::static_member("Transform", "outPos", float4.clone()),
                Expression::binary(
                    BinaryOp::Add,
                    Expression::static_member("Transform", "pos", float4.clone()),
                    Expression::static_member("Transform", "tint", float4.clone()),
                    float4.clone(),
                ),
            )),
            ret(),
        ],
    );
    shader.fields = vec![
        static_field("pos", float4.clone(), vec![Attribute::new("Input")]),
        static_field(
            "outPos",
            float4.clone(),
            vec![
                Attribute::new("Output"),
                Attribute::new("BuiltIn")
                    .with_positional(AttributeValue::Ident("Position".into())),
            ],
        ),
        static_field(
            "tint",
            float4.clone(),
            vec![Attribute::new("Uniform"), int_attr("Binding", 2)],
        ),
    ];
    let result = compile(&module(vec![shader]));
    let binary = &result.binaries[0];
    let reflection = &binary.reflection;

    assert_eq!(reflection.inputs.len(), 1);
    assert_eq!(reflection.inputs[0].name, "pos");
    assert_eq!(reflection.inputs[0].location, Some(0));
    assert_eq!(reflection.outputs.len(), 1);
    assert_eq!(reflection.outputs[0].builtin.as_deref(), Some("Position"));
    assert_eq!(reflection.outputs[0].location, None);
    assert_eq!(reflection.bindings.len(), 1);
    assert_eq!(reflection.bindings[0].name, "tint");
    assert_eq!(reflection.bindings[0].set, 0);
    assert_eq!(reflection.bindings[0].binding, 2);
    assert_eq!(reflection.bindings[0].type_name, "Float4");

    let parsed = load(&binary.words);
    // model, function, name, then the two interface variables
    assert_eq!(parsed.entry_points[0].operands.len(), 5);
    let has_block = parsed.annotations.iter().any(|a| {
        a.class.opcode == spirv::Op::Decorate
            && a.operands.get(1) == Some(&dr::Operand::Decoration(spirv::Decoration::Block))
    });
    assert!(has_block);

    let json: serde_json::Value = serde_json::from_str(&reflection.to_json().unwrap()).unwrap();
    assert_eq!(json["stage"], "Vertex");
    assert_eq!(json["outputs"][0]["builtin"], "Position");
}

#[test]
fn test_compute_local_size() {
    let mut kernel = stage_struct("Blur", "Compute", vec![ret()]);
    kernel.attributes = vec![Attribute::new("Compute")
        .with("localSizeX", AttributeValue::Int(8))
        .with("localSizeY", AttributeValue::Int(4))];
    let result = compile(&module(vec![kernel]));
    let binary = &result.binaries[0];
    assert_eq!(binary.reflection.local_size, Some([8, 4, 1]));

    let parsed = load(&binary.words);
    assert_eq!(
        parsed.entry_points[0].operands[0],
        dr::Operand::ExecutionModel(spirv::ExecutionModel::GLCompute)
    );
    assert_eq!(parsed.execution_modes.len(), 1);
    assert_eq!(parsed.execution_modes[0].operands.len(), 5);
}

#[test]
fn test_compute_local_size_out_of_range() {
    let mut kernel = stage_struct("Huge", "Compute", vec![ret()]);
    kernel.attributes =
        vec![Attribute::new("Compute").with("localSizeZ", AttributeValue::Int(65))];
    let err = Compiler::new(CompileOptions::default())
        .compile(&module(vec![kernel]))
        .unwrap_err();
    let diagnostics = err.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert!(diagnostics[0].full_message.contains("Expected signature"));
}

#[test]
fn test_all_diagnostics_are_reported_together() {
    let foreach = Statement::ForEach {
        variable: "i".into(),
        iterable: Expression::int(3),
        body: vec![],
        location: loc(7),
    };
    let shader = stage_struct("Broken", "Pixel", vec![foreach, ret()]);
    let mut class = stage_struct("Helper", "Vertex", vec![ret()]);
    class.attributes.clear();
    class.is_reference_type = true;

    let err = Compiler::new(CompileOptions::default())
        .compile(&module(vec![shader, class]))
        .unwrap_err();
    match &err {
        Error::TranslationFailed { count, diagnostics } => {
            assert!(*count >= 2);
            assert_eq!(*count, diagnostics.len());
            assert!(diagnostics
                .iter()
                .any(|d| d.short_message == "foreach is not supported." && d.location.line == 7));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_missing_main() {
    let mut shader = stage_struct("NoMain", "Pixel", vec![]);
    shader.functions[0].name = "Run".into();
    let module = module(vec![shader]);

    let err = Compiler::new(CompileOptions::default())
        .compile(&module)
        .unwrap_err();
    assert!(err.diagnostics()[0]
        .full_message
        .contains("Shader must have a function of signature 'Main()'."));

    let lenient = Compiler::new(CompileOptions {
        error_on_missing_main: false,
        ..Default::default()
    });
    let result = lenient.compile(&module).unwrap();
    assert!(result.binaries.is_empty());
    assert_eq!(result.warnings.len(), 1);
}

#[test]
fn test_pixel_only_intrinsic_from_vertex_stage() {
    let body = vec![
        var(
            "d",
            TypeRef::Float,
            Expression::call_static("Math", "Ddx", vec![Expression::float(1.0)], TypeRef::Float),
        ),
        ret(),
    ];
    let err = Compiler::new(CompileOptions::default())
        .compile(&module(vec![stage_struct("Wrong", "Vertex", body)]))
        .unwrap_err();
    assert!(err
        .diagnostics()
        .iter()
        .any(|d| d.full_message.contains("Pixel stage")));
}

#[test]
fn test_debug_names_can_be_disabled() {
    let shader = module(vec![stage_struct("Named", "Pixel", vec![ret()])]);
    let with_names = compile(&shader);
    let without = Compiler::new(CompileOptions {
        debug_names: false,
        ..Default::default()
    })
    .compile(&shader)
    .unwrap();

    assert!(!load(&with_names.binaries[0].words).debug_names.is_empty());
    assert!(load(&without.binaries[0].words).debug_names.is_empty());
    assert!(without.binaries[0].words.len() < with_names.binaries[0].words.len());
}

#[test]
fn test_explicit_entry_point_options() {
    let shader = module(vec![
        stage_struct("A", "Pixel", vec![ret()]),
        stage_struct("B", "Vertex", vec![ret()]),
    ]);
    let compiler = Compiler::new(CompileOptions {
        entry_points: vec![spirvgen::EntryPointOptions {
            function: "B.Main".into(),
            stage: ShaderStage::Vertex,
        }],
        ..Default::default()
    });
    let result = compiler.compile(&shader).unwrap();
    assert_eq!(result.binaries.len(), 1);
    assert_eq!(result.binaries[0].entry_name, "B.Main");
}

#[test]
fn test_json_input() -> anyhow::Result<()> {
    let shader = module(vec![stage_struct("Json", "Pixel", vec![ret()])]);
    let json = spirvgen::parser::to_json(&shader)?;
    let result = Compiler::new(CompileOptions::default()).compile_json(&json)?;
    assert_eq!(result.binaries.len(), 1);
    assert_eq!(result.binaries[0].digest, compile(&shader).binaries[0].digest);
    Ok(())
}
