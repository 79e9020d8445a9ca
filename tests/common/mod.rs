//! Shared AST builders for the integration tests
#![allow(dead_code)]

use rspirv::dr;
use spirvgen::parser::{
    Attribute, AttributeValue, Expression, FieldDecl, FunctionDecl, Module, SourceLocation,
    Statement, StructDecl, TypeRef,
};
use spirvgen::{CompileOptions, CompileResult, Compiler};

pub fn loc(line: u32) -> SourceLocation {
    SourceLocation::new("test.shader", line, 1)
}

pub fn ret() -> Statement {
    Statement::Return {
        value: None,
        location: SourceLocation::default(),
    }
}

pub fn var(name: &str, ty: TypeRef, init: Expression) -> Statement {
    Statement::VarDecl {
        name: name.to_string(),
        ty,
        initializer: Some(init),
        location: SourceLocation::default(),
    }
}

pub fn function(name: &str, body: Vec<Statement>) -> FunctionDecl {
    FunctionDecl {
        name: name.to_string(),
        params: vec![],
        return_type: TypeRef::Void,
        is_static: true,
        attributes: vec![],
        body,
        location: SourceLocation::default(),
    }
}

pub fn static_field(name: &str, ty: TypeRef, attributes: Vec<Attribute>) -> FieldDecl {
    FieldDecl {
        name: name.to_string(),
        ty,
        is_static: true,
        attributes,
        initializer: None,
        location: SourceLocation::default(),
    }
}

pub fn field(name: &str, ty: TypeRef) -> FieldDecl {
    FieldDecl {
        name: name.to_string(),
        ty,
        is_static: false,
        attributes: vec![],
        initializer: None,
        location: SourceLocation::default(),
    }
}

/// A struct carrying `stage` whose `Main` runs `body`
pub fn stage_struct(name: &str, stage: &str, body: Vec<Statement>) -> StructDecl {
    StructDecl {
        name: name.to_string(),
        attributes: vec![Attribute::new(stage)],
        functions: vec![function("Main", body)],
        location: loc(1),
        ..Default::default()
    }
}

pub fn module(structs: Vec<StructDecl>) -> Module {
    Module {
        structs,
        enums: vec![],
    }
}

pub fn int_attr(name: &str, value: i64) -> Attribute {
    Attribute::new(name).with_positional(AttributeValue::Int(value))
}

pub fn compile(module: &Module) -> CompileResult {
    Compiler::new(CompileOptions::default())
        .compile(module)
        .expect("module should compile")
}

pub fn load(words: &[u32]) -> dr::Module {
    dr::load_words(words).expect("binary should parse")
}

/// Every instruction inside every function of a parsed module
pub fn function_instructions(module: &dr::Module) -> Vec<&dr::Instruction> {
    module
        .functions
        .iter()
        .flat_map(|f| f.blocks.iter())
        .flat_map(|b| b.instructions.iter())
        .collect()
}
