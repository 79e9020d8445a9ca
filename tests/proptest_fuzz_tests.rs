//! Property-based fuzzing tests for the translator
//!
//! These tests use proptest to generate random inputs and verify that:
//! 1. The JSON front door never panics on arbitrary input
//! 2. Generated shaders always produce a binary that parses back
//! 3. Translation is deterministic (same input, same bytes)

mod common;

use common::*;
use proptest::prelude::*;
use rspirv::dr;
use spirvgen::parser::{self, BinaryOp, Expression, Statement, TypeRef};
use spirvgen::{CompileOptions, Compiler, Module};

// =============================================================================
// STRATEGY GENERATORS
// =============================================================================

/// Random strings that might break the JSON loader
fn arbitrary_source_string() -> impl Strategy<Value = String> {
    prop::string::string_regex(r"[\x00-\x7F]{0,300}").unwrap()
}

/// Float arithmetic over literals and the local `x`
fn float_expr() -> impl Strategy<Value = Expression> {
    let leaf = prop_oneof![
        (-100.0f32..100.0f32).prop_map(Expression::float),
        Just(Expression::local("x", TypeRef::Float)),
    ];
    leaf.prop_recursive(4, 32, 2, |inner| {
        (
            prop_oneof![
                Just(BinaryOp::Add),
                Just(BinaryOp::Sub),
                Just(BinaryOp::Mul),
                Just(BinaryOp::Div),
            ],
            inner.clone(),
            inner,
        )
            .prop_map(|(op, lhs, rhs)| Expression::binary(op, lhs, rhs, TypeRef::Float))
    })
}

/// Nested control flow: loops that break, conditionals on `x`, stores to `x`
fn statement() -> impl Strategy<Value = Statement> {
    let leaf = float_expr().prop_map(|value| {
        Statement::Expression(Expression::assign(
            Expression::local("x", TypeRef::Float),
            value,
        ))
    });
    leaf.prop_recursive(3, 24, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..3).prop_map(|mut body| {
                body.push(Statement::Break {
                    location: Default::default(),
                });
                Statement::Loop { body }
            }),
            (float_expr(), prop::collection::vec(inner.clone(), 0..3)).prop_map(
                |(bound, body)| Statement::While {
                    condition: Expression::binary(
                        BinaryOp::Lt,
                        Expression::local("x", TypeRef::Float),
                        bound,
                        TypeRef::Bool,
                    ),
                    body,
                }
            ),
            (
                prop::collection::vec(inner.clone(), 0..3),
                prop::collection::vec(inner, 0..3)
            )
                .prop_map(|(then, otherwise)| Statement::If {
                    parts: vec![
                        parser::IfPart {
                            condition: Some(Expression::binary(
                                BinaryOp::Gt,
                                Expression::local("x", TypeRef::Float),
                                Expression::float(0.0),
                                TypeRef::Bool,
                            )),
                            body: then,
                        },
                        parser::IfPart {
                            condition: None,
                            body: otherwise,
                        },
                    ],
                }),
        ]
    })
}

/// A pixel shader whose `Main` declares `x` then runs the statements
fn shader_module() -> impl Strategy<Value = Module> {
    prop::collection::vec(statement(), 0..5).prop_map(|statements| {
        let mut body = vec![var("x", TypeRef::Float, Expression::float(1.0))];
        body.extend(statements);
        body.push(ret());
        module(vec![stage_struct("Fuzz", "Pixel", body)])
    })
}

// =============================================================================
// FRONT DOOR FUZZ TESTS
// =============================================================================

proptest! {
    /// Arbitrary text is rejected with an error, never a panic
    #[test]
    fn json_loader_never_panics(source in arbitrary_source_string()) {
        let compiler = Compiler::new(CompileOptions::default());
        prop_assert!(compiler.compile_json(&source).is_err());
    }
}

// =============================================================================
// TRANSLATION FUZZ TESTS
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Generated shaders translate to a binary rspirv can load
    #[test]
    fn generated_shaders_parse(module in shader_module()) {
        let result = compile(&module);
        prop_assert_eq!(result.binaries.len(), 1);
        let words = &result.binaries[0].words;
        let parsed = dr::load_words(words);
        prop_assert!(parsed.is_ok(), "binary failed to parse: {:?}", parsed.err());
        prop_assert_eq!(parsed.unwrap().header.unwrap().bound, words[3]);
    }

    /// Translating the same module twice gives identical bytes
    #[test]
    fn translation_is_deterministic(module in shader_module()) {
        let first = compile(&module);
        let second = compile(&module);
        prop_assert_eq!(&first.binaries[0].words, &second.binaries[0].words);
        prop_assert_eq!(&first.binaries[0].digest, &second.binaries[0].digest);
    }

    /// The JSON form of a module translates exactly like the in-memory one
    #[test]
    fn json_round_trip_preserves_output(module in shader_module()) {
        let json = parser::to_json(&module).unwrap();
        let compiler = Compiler::new(CompileOptions::default());
        let from_json = compiler.compile_json(&json).unwrap();
        let direct = compile(&module);
        prop_assert_eq!(&from_json.binaries[0].digest, &direct.binaries[0].digest);
    }

    /// Debug names never change the instruction stream of function bodies
    #[test]
    fn debug_names_only_add_names(module in shader_module()) {
        let named = compile(&module);
        let bare = Compiler::new(CompileOptions {
            debug_names: false,
            ..CompileOptions::default()
        })
        .compile(&module)
        .unwrap();
        let named = load(&named.binaries[0].words);
        let bare = load(&bare.binaries[0].words);
        prop_assert!(bare.debug_names.is_empty());
        prop_assert_eq!(
            function_instructions(&named).len(),
            function_instructions(&bare).len()
        );
    }
}

// =============================================================================
// SPECIFIC REGRESSION TESTS
// =============================================================================

#[test]
fn regression_empty_input() {
    let compiler = Compiler::new(CompileOptions::default());
    assert!(compiler.compile_json("").is_err());
}

#[test]
fn regression_empty_module() {
    let compiler = Compiler::new(CompileOptions::default());
    let result = compiler
        .compile_json(r#"{"structs": [], "enums": []}"#)
        .unwrap();
    assert!(result.binaries.is_empty());
    assert!(result.warnings.is_empty());
}

#[test]
fn regression_deeply_nested_loops() {
    let mut body = vec![Statement::Break {
        location: Default::default(),
    }];
    for _ in 0..32 {
        body = vec![
            Statement::Loop { body },
            Statement::Break {
                location: Default::default(),
            },
        ];
    }
    body.pop();
    body.push(ret());
    let result = compile(&module(vec![stage_struct("Deep", "Pixel", body)]));
    let parsed = load(&result.binaries[0].words);
    let merges = function_instructions(&parsed)
        .iter()
        .filter(|i| i.class.opcode == rspirv::spirv::Op::LoopMerge)
        .count();
    assert_eq!(merges, 32);
}
