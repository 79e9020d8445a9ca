//! Compiler-generated functions: entry wrappers, global initializers,
//! pre-constructors, property accessors and setter-backed writes

mod common;

use common::*;
use rspirv::spirv;
use spirvgen::compiler::ir::{FunctionId, Library, OpId, Operand};
use spirvgen::parser::{
    Attribute, BinaryOp, ExprKind, Expression, FieldDecl, FunctionDecl, Param, PropertyDecl,
    SourceLocation, Statement, StructDecl, TypeRef,
};
use spirvgen::{CompileOptions, Compiler, Error, Module};

fn translate(module: &Module) -> Library {
    Compiler::new(CompileOptions::default())
        .translate(module)
        .expect("module should translate")
}

fn function_named(lib: &Library, name: &str) -> FunctionId {
    lib.function_ids()
        .find(|&f| lib.function(f).name == name)
        .unwrap_or_else(|| panic!("no function '{}'", name))
}

/// `OpFunctionCall`s of a function in emission order: (callee name, call op)
fn calls(lib: &Library, function: FunctionId) -> Vec<(String, OpId)> {
    lib.function(function)
        .blocks
        .iter()
        .flat_map(|&b| lib.block(b).lines.iter().copied())
        .filter(|&l| lib.op(l).code == spirv::Op::FunctionCall)
        .filter_map(|l| match lib.op(l).args.first() {
            Some(Operand::Function(f)) => Some((lib.function(*f).name.clone(), l)),
            _ => None,
        })
        .collect()
}

fn call_names(lib: &Library, function: FunctionId) -> Vec<String> {
    calls(lib, function).into_iter().map(|(n, _)| n).collect()
}

fn self_ref(owner: &str) -> Expression {
    Expression::new(ExprKind::SelfRef, TypeRef::named(owner))
}

fn return_value(value: Expression) -> Statement {
    Statement::Return {
        value: Some(value),
        location: SourceLocation::default(),
    }
}

fn with_init(mut field: FieldDecl, init: Expression) -> FieldDecl {
    field.initializer = Some(init);
    field
}

fn translation_errors(module: &Module) -> Vec<String> {
    match Compiler::new(CompileOptions::default()).compile(module) {
        Err(Error::TranslationFailed { diagnostics, .. }) => {
            diagnostics.into_iter().map(|d| d.short_message).collect()
        }
        Err(other) => panic!("expected a translation failure, got {:?}", other),
        Ok(_) => panic!("expected a translation failure"),
    }
}

// =============================================================================
// Entry wrapper and global initialization
// =============================================================================

#[test]
fn test_instance_main_initializes_globals_before_self() {
    let mut shader = stage_struct("S", "Pixel", vec![ret()]);
    shader.functions[0].is_static = false;
    shader.fields = vec![
        with_init(
            static_field("Scale", TypeRef::Float, vec![]),
            Expression::float(2.0),
        ),
        with_init(
            field("V", TypeRef::Float),
            Expression::static_member("S", "Scale", TypeRef::Float),
        ),
    ];
    let lib = translate(&module(vec![shader]));

    let entry = &lib.entry_points()[0];
    assert_eq!(lib.function(entry.function).name, "S_EntryPoint");
    assert_eq!(lib.function(entry.main).name, "S.Main");
    assert_eq!(
        call_names(&lib, entry.function),
        vec!["S_InitializeGlobals", "S_PreConstructor", "S.Main"]
    );

    let init = function_named(&lib, "S_InitializeGlobals");
    assert_eq!(call_names(&lib, init), vec!["S_Init_Scale"]);
}

#[test]
fn test_static_initializer_writes_its_global() {
    let body = vec![
        var(
            "x",
            TypeRef::Float,
            Expression::static_member("S", "Scale", TypeRef::Float),
        ),
        ret(),
    ];
    let mut shader = stage_struct("S", "Pixel", body);
    shader.fields = vec![with_init(
        static_field("Scale", TypeRef::Float, vec![]),
        Expression::float(2.0),
    )];
    let lib = translate(&module(vec![shader]));

    let entry = &lib.entry_points()[0];
    assert_eq!(
        call_names(&lib, entry.function),
        vec!["S_InitializeGlobals", "S.Main"]
    );

    let global = lib
        .globals()
        .iter()
        .find(|g| g.name == "Scale")
        .expect("Scale is a global");
    let init = function_named(&lib, "S_Init_Scale");
    let stores: Vec<OpId> = lib
        .function(init)
        .blocks
        .iter()
        .flat_map(|&b| lib.block(b).lines.iter().copied())
        .filter(|&l| lib.op(l).code == spirv::Op::Store)
        .collect();
    assert_eq!(stores.len(), 1);
    assert_eq!(lib.op(stores[0]).args[0], Operand::Op(global.op));
}

#[test]
fn test_static_main_without_initializers_is_the_entry() {
    let lib = translate(&module(vec![stage_struct("Plain", "Pixel", vec![ret()])]));
    let entry = &lib.entry_points()[0];
    assert_eq!(entry.function, entry.main);
}

// =============================================================================
// Constructors
// =============================================================================

fn point_struct() -> StructDecl {
    StructDecl {
        name: "P".into(),
        fields: vec![with_init(field("a", TypeRef::Float), Expression::float(1.0))],
        constructors: vec![FunctionDecl {
            name: "ctor".into(),
            params: vec![Param {
                name: "x".into(),
                ty: TypeRef::Float,
                by_ref: false,
            }],
            return_type: TypeRef::Void,
            is_static: false,
            attributes: vec![],
            body: vec![
                Statement::Expression(Expression::assign(
                    Expression::member(self_ref("P"), "a", TypeRef::Float),
                    Expression::local("x", TypeRef::Float),
                )),
                ret(),
            ],
            location: SourceLocation::default(),
        }],
        ..Default::default()
    }
}

#[test]
fn test_construct_runs_pre_constructor_then_user_constructor() {
    let p = TypeRef::named("P");
    let body = vec![
        var(
            "p",
            p.clone(),
            Expression::construct(p.clone(), vec![Expression::float(3.0)]),
        ),
        var("q", p.clone(), Expression::construct(p, vec![])),
        ret(),
    ];
    let lib = translate(&module(vec![
        point_struct(),
        stage_struct("Uses", "Pixel", body),
    ]));
    let main = function_named(&lib, "Uses.Main");
    assert_eq!(
        call_names(&lib, main),
        vec!["P_PreConstructor", "P.ctor", "P_PreConstructor"]
    );

    // both calls of the first construction target the same temporary
    let main_calls = calls(&lib, main);
    let (pre, ctor) = (lib.op(main_calls[0].1), lib.op(main_calls[1].1));
    assert_eq!(pre.args[1], ctor.args[1]);
}

#[test]
fn test_unmatched_constructor_is_reported() {
    let p = TypeRef::named("P");
    let body = vec![
        var(
            "p",
            p.clone(),
            Expression::construct(p, vec![Expression::int(1), Expression::int(2)]),
        ),
        ret(),
    ];
    let errors = translation_errors(&module(vec![
        point_struct(),
        stage_struct("Uses", "Pixel", body),
    ]));
    assert!(errors.iter().any(|e| e == "No matching constructor."));
}

// =============================================================================
// Properties
// =============================================================================

fn property(name: &str, is_static: bool, getter: Vec<Statement>, setter: Vec<Statement>) -> PropertyDecl {
    PropertyDecl {
        name: name.into(),
        ty: TypeRef::Float,
        is_static,
        getter: Some(getter),
        setter: Some(setter),
        attributes: vec![],
        location: SourceLocation::default(),
    }
}

#[test]
fn test_static_property_writes_call_setter() {
    let gain = || Expression::static_member("Lit", "Gain", TypeRef::Float);
    let backing = || Expression::static_member("Lit", "backing", TypeRef::Float);
    let body = vec![
        Statement::Expression(Expression::assign(gain(), Expression::float(2.0))),
        Statement::Expression(Expression::binary(
            BinaryOp::AddAssign,
            gain(),
            Expression::float(1.0),
            TypeRef::Float,
        )),
        ret(),
    ];
    let mut shader = stage_struct("Lit", "Pixel", body);
    shader.fields = vec![static_field("backing", TypeRef::Float, vec![])];
    shader.properties = vec![property(
        "Gain",
        true,
        vec![return_value(backing())],
        vec![Statement::Expression(Expression::assign(
            backing(),
            Expression::local("value", TypeRef::Float),
        ))],
    )];
    let lib = translate(&module(vec![shader]));
    let main = function_named(&lib, "Lit.Main");
    assert_eq!(
        call_names(&lib, main),
        vec!["Lit.set_Gain", "Lit.get_Gain", "Lit.set_Gain"]
    );
}

#[test]
fn test_instance_property_compound_assignment_shares_object() {
    let width = |target: Expression| Expression::member(target, "Width", TypeRef::Float);
    let w = || Expression::member(self_ref("Box"), "w", TypeRef::Float);
    let boxed = StructDecl {
        name: "Box".into(),
        fields: vec![field("w", TypeRef::Float)],
        properties: vec![property(
            "Width",
            false,
            vec![return_value(w())],
            vec![Statement::Expression(Expression::assign(
                w(),
                Expression::local("value", TypeRef::Float),
            ))],
        )],
        ..Default::default()
    };
    let box_ty = TypeRef::named("Box");
    let b = Expression::local("b", box_ty.clone());
    let body = vec![
        var("b", box_ty.clone(), Expression::construct(box_ty, vec![])),
        Statement::Expression(Expression::binary(
            BinaryOp::AddAssign,
            width(b),
            Expression::float(1.0),
            TypeRef::Float,
        )),
        ret(),
    ];
    let lib = translate(&module(vec![boxed, stage_struct("Uses", "Pixel", body)]));
    let main = function_named(&lib, "Uses.Main");
    let main_calls = calls(&lib, main);
    let names: Vec<&str> = main_calls.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["Box_PreConstructor", "Box.get_Width", "Box.set_Width"]);

    let (get, set) = (lib.op(main_calls[1].1), lib.op(main_calls[2].1));
    assert_eq!(get.args[1], set.args[1]);
}

// =============================================================================
// Swizzle writes
// =============================================================================

#[test]
fn test_swizzle_write_shuffles_into_vector() {
    let v = || Expression::local("v", TypeRef::float_vec(4));
    let body = vec![
        var(
            "v",
            TypeRef::float_vec(4),
            Expression::construct(
                TypeRef::float_vec(4),
                (1..=4).map(|i| Expression::float(i as f32)).collect(),
            ),
        ),
        Statement::Expression(Expression::assign(
            Expression::member(v(), "XY", TypeRef::float_vec(2)),
            Expression::construct(
                TypeRef::float_vec(2),
                vec![Expression::float(5.0), Expression::float(6.0)],
            ),
        )),
        ret(),
    ];
    let lib = translate(&module(vec![stage_struct("Swz", "Pixel", body)]));
    let main = function_named(&lib, "Swz.Main");
    let lines: Vec<OpId> = lib
        .function(main)
        .blocks
        .iter()
        .flat_map(|&b| lib.block(b).lines.iter().copied())
        .collect();
    let last_store = lines
        .iter()
        .rev()
        .map(|&l| lib.op(l))
        .find(|op| op.code == spirv::Op::Store)
        .unwrap();
    let Operand::Op(stored) = last_store.args[1] else {
        panic!("store without a value operand");
    };
    let shuffle = lib.op(stored);
    assert_eq!(shuffle.code, spirv::Op::VectorShuffle);
    // lanes X, Y come from the new value, Z, W are kept
    assert_eq!(
        &shuffle.args[2..],
        &[
            Operand::Literal(4),
            Operand::Literal(5),
            Operand::Literal(2),
            Operand::Literal(3)
        ]
    );
}

#[test]
fn test_compound_swizzle_evaluates_target_once() {
    let vec4_array = TypeRef::FixedArray(Box::new(TypeRef::float_vec(4)), 2);
    let element = Expression::new(
        ExprKind::Index {
            target: Box::new(Expression::local("a", vec4_array.clone())),
            index: Box::new(Expression::call_static("S", "Next", vec![], TypeRef::Int)),
        },
        TypeRef::float_vec(4),
    );
    let body = vec![
        Statement::VarDecl {
            name: "a".into(),
            ty: vec4_array,
            initializer: None,
            location: SourceLocation::default(),
        },
        Statement::Expression(Expression::binary(
            BinaryOp::AddAssign,
            Expression::member(element, "XY", TypeRef::float_vec(2)),
            Expression::construct(
                TypeRef::float_vec(2),
                vec![Expression::float(1.0), Expression::float(1.0)],
            ),
            TypeRef::float_vec(2),
        )),
        ret(),
    ];
    let mut shader = stage_struct("S", "Pixel", body);
    shader.functions.push(FunctionDecl {
        name: "Next".into(),
        params: vec![],
        return_type: TypeRef::Int,
        is_static: true,
        attributes: vec![],
        body: vec![return_value(Expression::int(1))],
        location: SourceLocation::default(),
    });
    let module = module(vec![shader]);

    let lib = translate(&module);
    let main = function_named(&lib, "S.Main");
    assert_eq!(call_names(&lib, main), vec!["S.Next"]);

    let result = compile(&module);
    let parsed = load(&result.binaries[0].words);
    let binary_calls = function_instructions(&parsed)
        .iter()
        .filter(|i| i.class.opcode == spirv::Op::FunctionCall)
        .count();
    assert_eq!(binary_calls, 1);
}

// =============================================================================
// Read-only storage
// =============================================================================

#[test]
fn test_writes_to_input_and_uniform_are_rejected() {
    let float4 = TypeRef::float_vec(4);
    let splat = || {
        Expression::construct(
            TypeRef::float_vec(4),
            (0..4).map(|_| Expression::float(0.0)).collect(),
        )
    };
    let pos = || Expression::static_member("Ro", "pos", TypeRef::float_vec(4));
    let body = vec![
        Statement::Expression(Expression::assign(pos(), splat())),
        Statement::Expression(Expression::assign(
            Expression::static_member("Ro", "tint", TypeRef::float_vec(4)),
            splat(),
        )),
        Statement::Expression(Expression::assign(
            Expression::member(pos(), "XY", TypeRef::float_vec(2)),
            Expression::construct(
                TypeRef::float_vec(2),
                vec![Expression::float(1.0), Expression::float(1.0)],
            ),
        )),
        ret(),
    ];
    let mut shader = stage_struct("Ro", "Pixel", body);
    shader.fields = vec![
        static_field("pos", float4.clone(), vec![Attribute::new("Input")]),
        static_field(
            "tint",
            float4,
            vec![Attribute::new("Uniform"), int_attr("Binding", 0)],
        ),
    ];
    let errors = translation_errors(&module(vec![shader]));
    assert_eq!(errors.len(), 3);
    assert!(errors.iter().all(|e| e == "Cannot write to read-only storage."));
}
