//! Spirvgen Parser Module
//!
//! Loads the type-checked shader AST handed over by the host compiler.
//! The host serializes its checked tree as JSON; every expression already
//! carries its resolved type, so no inference happens here.

mod ast;

pub use ast::{
    find_attribute, Attribute, AttributeParam, AttributeValue, BinaryOp, Callee, EnumDecl,
    EnumValue, ExprKind, Expression, FieldDecl, FunctionDecl, IfPart, ImageDesc, ImageDim,
    Literal, Module, Param, PropertyDecl, Scalar, SourceLocation, Statement, StructDecl, TypeRef,
    UnaryOp,
};

use crate::error::{Error, Result};

/// Decode a module from its JSON form
pub fn from_json(source: &str) -> Result<Module> {
    serde_json::from_str(source).map_err(|e| Error::ParseError(e.to_string()))
}

/// Encode a module as pretty-printed JSON
pub fn to_json(module: &Module) -> Result<String> {
    serde_json::to_string_pretty(module).map_err(|e| Error::ParseError(e.to_string()))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_module_loads() {
        let module = Module {
            structs: vec![StructDecl {
                name: "Shader".into(),
                attributes: vec![Attribute::new("Pixel")],
                ..Default::default()
            }],
            enums: vec![],
        };
        let text = to_json(&module).unwrap();
        let back = from_json(&text).unwrap();
        assert_eq!(back, module);
    }

    #[test]
    fn test_bad_json_is_parse_error() {
        let err = from_json("{ not json").unwrap_err();
        assert!(matches!(err, Error::ParseError(_)));
    }
}
