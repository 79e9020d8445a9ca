//! Specialization constant shape tests

mod common;

use common::*;
use rspirv::dr;
use rspirv::spirv;
use spirvgen::parser::{Attribute, Expression, StructDecl, TypeRef};

/// `struct Light { Float3 color; Float intensity; }` plus a pixel shader
/// holding a `Light` specialization constant that `Main` reads
fn light_module() -> spirvgen::Module {
    let light = StructDecl {
        name: "Light".into(),
        fields: vec![
            field("color", TypeRef::float_vec(3)),
            field("intensity", TypeRef::Float),
        ],
        ..Default::default()
    };
    let light_ty = TypeRef::named("Light");
    let mut shader = stage_struct(
        "Lit",
        "Pixel",
        vec![
            var(
                "l",
                light_ty.clone(),
                Expression::static_member("Lit", "Sun", light_ty.clone()),
            ),
            var(
                "s",
                TypeRef::Int,
                Expression::static_member("Lit", "Samples", TypeRef::Int),
            ),
            ret(),
        ],
    );
    let mut samples = static_field("Samples", TypeRef::Int, vec![Attribute::new("SpecConstant")]);
    samples.initializer = Some(Expression::int(16));
    shader.fields = vec![
        static_field("Sun", light_ty, vec![Attribute::new("SpecConstant")]),
        samples,
    ];
    module(vec![light, shader])
}

#[test]
fn test_struct_spec_constant_has_sequential_leaf_ids() {
    let result = compile(&light_module());
    let parsed = load(&result.binaries[0].words);

    let spec_ids: Vec<(u32, u32)> = parsed
        .annotations
        .iter()
        .filter(|a| {
            a.operands.get(1) == Some(&dr::Operand::Decoration(spirv::Decoration::SpecId))
        })
        .map(|a| match (&a.operands[0], &a.operands[2]) {
            (dr::Operand::IdRef(id), dr::Operand::LiteralBit32(spec)) => (*id, *spec),
            other => panic!("unexpected SpecId operands {:?}", other),
        })
        .collect();
    // color.X, color.Y, color.Z, intensity, Samples
    assert_eq!(
        spec_ids.iter().map(|&(_, s)| s).collect::<Vec<_>>(),
        vec![1, 2, 3, 4, 5]
    );

    let scalar_specs: Vec<u32> = parsed
        .types_global_values
        .iter()
        .filter(|i| i.class.opcode == spirv::Op::SpecConstant)
        .filter_map(|i| i.result_id)
        .collect();
    assert_eq!(scalar_specs.len(), 5);
    for (id, _) in &spec_ids {
        assert!(scalar_specs.contains(id), "SpecId on a non-scalar %{}", id);
    }

    let composites: Vec<&dr::Instruction> = parsed
        .types_global_values
        .iter()
        .filter(|i| i.class.opcode == spirv::Op::SpecConstantComposite)
        .collect();
    // Float3 color and the Light itself
    assert_eq!(composites.len(), 2);
    let color = composites[0];
    for operand in &color.operands {
        let dr::Operand::IdRef(id) = operand else {
            panic!("composite operand {:?}", operand);
        };
        assert!(scalar_specs.contains(id));
    }
}

#[test]
fn test_reflection_maps_names_to_first_leaf() {
    let result = compile(&light_module());
    let specs = &result.binaries[0].reflection.spec_constants;
    assert_eq!(specs.get("Lit.Sun"), Some(&1));
    assert_eq!(specs.get("Lit.Samples"), Some(&5));
}

#[test]
fn test_spec_constant_default_value() {
    let result = compile(&light_module());
    let parsed = load(&result.binaries[0].words);
    let samples = parsed
        .types_global_values
        .iter()
        .filter(|i| i.class.opcode == spirv::Op::SpecConstant)
        .last()
        .unwrap();
    assert_eq!(samples.operands, vec![dr::Operand::LiteralBit32(16)]);
}

#[test]
fn test_spec_constant_is_read_only() {
    let mut module = light_module();
    let shader = &mut module.structs[1];
    shader.functions[0].body.insert(
        0,
        spirvgen::parser::Statement::Expression(Expression::assign(
            Expression::static_member("Lit", "Samples", TypeRef::Int),
            Expression::int(4),
        )),
    );
    let err = spirvgen::Compiler::new(Default::default())
        .compile(&module)
        .unwrap_err();
    assert!(!err.diagnostics().is_empty());
}

/// `SpecId` of the scalar specialization constant whose default is `default`
fn spec_id_with_default(parsed: &dr::Module, default: u32) -> Option<u32> {
    let id = parsed
        .types_global_values
        .iter()
        .find(|i| {
            i.class.opcode == spirv::Op::SpecConstant
                && i.operands == vec![dr::Operand::LiteralBit32(default)]
        })?
        .result_id?;
    parsed.annotations.iter().find_map(|a| match a.operands.as_slice() {
        [dr::Operand::IdRef(target), dr::Operand::Decoration(spirv::Decoration::SpecId), dr::Operand::LiteralBit32(spec)]
            if *target == id =>
        {
            Some(*spec)
        }
        _ => None,
    })
}

#[test]
fn test_spec_ids_are_numbered_per_binary() {
    let constant = |name: &str, default: i32| {
        let mut f = static_field(name, TypeRef::Int, vec![Attribute::new("SpecConstant")]);
        f.initializer = Some(Expression::int(default));
        f
    };
    let read = |name: &str| {
        var(
            &name.to_lowercase(),
            TypeRef::Int,
            Expression::static_member("Cfg", name, TypeRef::Int),
        )
    };
    let cfg = StructDecl {
        name: "Cfg".into(),
        fields: vec![constant("Taps", 7), constant("Radius", 9)],
        ..Default::default()
    };
    let module = module(vec![
        cfg,
        stage_struct("Both", "Vertex", vec![read("Taps"), read("Radius"), ret()]),
        stage_struct("One", "Pixel", vec![read("Radius"), ret()]),
    ]);
    let result = compile(&module);
    assert_eq!(result.binaries.len(), 2);

    let mut radius_ids = Vec::new();
    for binary in &result.binaries {
        let parsed = load(&binary.words);
        let radius = spec_id_with_default(&parsed, 9).expect("Radius is decorated");
        assert_eq!(
            binary.reflection.spec_constants.get("Cfg.Radius"),
            Some(&radius)
        );
        radius_ids.push(radius);
    }
    // the pixel binary has no Taps, so Radius moves up
    assert_eq!(radius_ids, vec![2, 1]);
    assert!(!result.binaries[1]
        .reflection
        .spec_constants
        .contains_key("Cfg.Taps"));
}
