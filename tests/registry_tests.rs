//! Host-supplied resolver tests

mod common;

use common::*;
use rspirv::dr;
use rspirv::spirv;
use spirvgen::compiler::ir::Operand;
use spirvgen::compiler::resolvers::{resolver, simple, FunctionKey, ResolverRegistry};
use spirvgen::parser::{Expression, TypeRef};
use spirvgen::{CompileOptions, Compiler, Error, Module};

/// `var y : Float = Host.<name>(2.0)`
fn host_call_module(name: &str) -> Module {
    let call = Expression::call_static("Host", name, vec![Expression::float(2.0)], TypeRef::Float);
    module(vec![stage_struct(
        "Hosted",
        "Pixel",
        vec![var("y", TypeRef::Float, call), ret()],
    )])
}

fn host_registry() -> ResolverRegistry {
    let mut registry = ResolverRegistry::with_defaults();
    registry.register_function(
        FunctionKey::new("Host", "Twice", vec![TypeRef::Float]),
        resolver(|gen, ctx, a| {
            let ty = gen.type_id(a.result, a.location);
            gen.emit(
                ctx,
                spirv::Op::FAdd,
                Some(ty),
                vec![Operand::Op(a.args[0]), Operand::Op(a.args[0])],
            )
        }),
    );
    registry.register_function(
        FunctionKey::new("Host", "Flip", vec![TypeRef::Float]),
        simple(spirv::Op::FNegate),
    );
    registry.register_function(
        FunctionKey::new("Host", "Forbidden", vec![TypeRef::Float]),
        resolver(|gen, _ctx, a| {
            gen.send_translation_error(
                a.location.clone(),
                "Not available.",
                "Host.Forbidden is not available in this pipeline.",
            );
            a.args[0]
        }),
    );
    registry
}

#[test]
fn test_default_registry_rejects_host_function() {
    let err = Compiler::new(CompileOptions::default())
        .compile(&host_call_module("Twice"))
        .unwrap_err();
    let Error::TranslationFailed { diagnostics, .. } = err else {
        panic!("expected a translation failure, got {:?}", err);
    };
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].short_message, "Unknown function.");
}

#[test]
fn test_closure_resolver_lowers_call() {
    let registry = host_registry();
    let result = Compiler::with_registry(CompileOptions::default(), &registry)
        .compile(&host_call_module("Twice"))
        .unwrap();
    let parsed = load(&result.binaries[0].words);
    let adds: Vec<&dr::Instruction> = function_instructions(&parsed)
        .into_iter()
        .filter(|i| i.class.opcode == spirv::Op::FAdd)
        .collect();
    assert_eq!(adds.len(), 1);
    assert_eq!(adds[0].operands[0], adds[0].operands[1]);
}

#[test]
fn test_simple_resolver_lowers_call() {
    let registry = host_registry();
    let result = Compiler::with_registry(CompileOptions::default(), &registry)
        .compile(&host_call_module("Flip"))
        .unwrap();
    let parsed = load(&result.binaries[0].words);
    assert!(function_instructions(&parsed)
        .iter()
        .any(|i| i.class.opcode == spirv::Op::FNegate));
}

#[test]
fn test_resolver_can_report_diagnostics() {
    let registry = host_registry();
    let err = Compiler::with_registry(CompileOptions::default(), &registry)
        .compile(&host_call_module("Forbidden"))
        .unwrap_err();
    assert_eq!(err.diagnostics().len(), 1);
    assert_eq!(err.diagnostics()[0].short_message, "Not available.");
}

#[test]
fn test_empty_registry_cannot_lower_arithmetic() {
    let registry = ResolverRegistry::new();
    let body = vec![
        var(
            "y",
            TypeRef::Float,
            Expression::binary(
                spirvgen::parser::BinaryOp::Add,
                Expression::float(1.0),
                Expression::float(2.0),
                TypeRef::Float,
            ),
        ),
        ret(),
    ];
    let err = Compiler::with_registry(CompileOptions::default(), &registry)
        .compile(&module(vec![stage_struct("Bare", "Pixel", body)]))
        .unwrap_err();
    assert!(!err.diagnostics().is_empty());
}
