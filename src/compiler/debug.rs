//! Debug utilities for AST→SPIR-V translation
//!
//! Tools for inspecting the IR library and emitted binaries.

use super::ir::{is_constant, Library, Op, OpId, Operand, TypeId, TypeKind};
use crate::error::{Error, Result};
use rspirv::binary::Disassemble;
use std::fmt::Write;

/// Render a library in human-readable form
pub fn dump_library(lib: &Library) -> String {
    let mut out = String::new();
    let rule = "═══════════════════════════════════════════════════════════";
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "                    IR DUMP");
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(
        out,
        "Types: {}  Ops: {}  Failed: {}",
        lib.type_count(),
        lib.op_count(),
        lib.failed()
    );
    let _ = writeln!(out, "───────────────────────────────────────────────────────────");

    for i in 0..lib.type_count() {
        let ty = TypeId(i as u32);
        let _ = writeln!(out, "t{:<4} {}", i, format_type(lib, ty));
    }
    for i in 0..lib.op_count() {
        let op = OpId(i as u32);
        if is_constant(lib.op(op).code) {
            let _ = writeln!(out, "{}", format_op(lib, op));
        }
    }
    for global in lib.globals() {
        let _ = writeln!(
            out,
            "{}  ; {}.{} ({:?})",
            format_op(lib, global.op),
            global.owner,
            global.name,
            global.storage
        );
    }

    for id in lib.function_ids() {
        let function = lib.function(id);
        let _ = writeln!(out);
        let _ = writeln!(out, "fn {} -> {}", function.name, format_type(lib, function.return_type));
        for &param in &function.params {
            let _ = writeln!(out, "  param {}", format_op(lib, param));
        }
        for &block in &function.blocks {
            let b = lib.block(block);
            let _ = writeln!(
                out,
                "  b{}: {} [{:?}]",
                block.0,
                b.debug_name.as_deref().unwrap_or(""),
                b.tag
            );
            for &local in &b.locals {
                let _ = writeln!(out, "    {}", format_op(lib, local));
            }
            for &line in &b.lines {
                let _ = writeln!(out, "    {}", format_op(lib, line));
            }
        }
    }
    let _ = writeln!(out, "{}", rule);
    out
}

/// Short type name (`float`, `vec4<t2>`, `ptr<Output, t5>`, ...)
pub fn format_type(lib: &Library, ty: TypeId) -> String {
    let t = lib.ty(ty);
    let shape = match &t.kind {
        TypeKind::Void => "void".to_string(),
        TypeKind::Bool => "bool".to_string(),
        TypeKind::Int { signed: true } => "int".to_string(),
        TypeKind::Int { signed: false } => "uint".to_string(),
        TypeKind::Float => "float".to_string(),
        TypeKind::Vector { component, count } => format!("vec{}<t{}>", count, component.0),
        TypeKind::Matrix { column, columns } => format!("mat{}<t{}>", columns, column.0),
        TypeKind::FixedArray { element, length } => format!("t{}[%{}]", element.0, length.0),
        TypeKind::RuntimeArray { element } => format!("t{}[]", element.0),
        TypeKind::Struct { members } => format!("struct({} members)", members.len()),
        TypeKind::Function { return_type, params } => format!(
            "fn({}) -> t{}",
            params
                .iter()
                .map(|p| format!("t{}", p.0))
                .collect::<Vec<_>>()
                .join(", "),
            return_type.0
        ),
        TypeKind::Pointer { storage, pointee } => format!("ptr<{:?}, t{}>", storage, pointee.0),
        TypeKind::Image { sampled, desc } => format!("image<t{}, {:?}>", sampled.0, desc.dim),
        TypeKind::SampledImage { image } => format!("sampled<t{}>", image.0),
        TypeKind::Sampler => "sampler".to_string(),
    };
    if t.name.is_empty() {
        shape
    } else {
        format!("{} ({})", shape, t.name)
    }
}

/// Format a single op
pub fn format_op(lib: &Library, id: OpId) -> String {
    let op: &Op = lib.op(id);
    let args = op
        .args
        .iter()
        .map(|a| format_operand(lib, a))
        .collect::<Vec<_>>()
        .join(" ");
    let name = op
        .debug_name
        .as_ref()
        .map(|n| format!("  ; {}", n))
        .unwrap_or_default();
    match op.result_type {
        Some(ty) => format!("%{} = Op{:?} t{} {}{}", id.0, op.code, ty.0, args, name),
        None => format!("Op{:?} {}{}", op.code, args, name),
    }
}

fn format_operand(lib: &Library, operand: &Operand) -> String {
    match *operand {
        Operand::Op(op) => format!("%{}", op.0),
        Operand::Constant(literal) => format!("{:?}", lib.literal(literal).value),
        Operand::Literal(word) => word.to_string(),
        Operand::Function(function) => format!("@{}", lib.function(function).name),
        Operand::Block(block) => format!("b{}", block.0),
        Operand::Import(import) => format!("\"{}\"", lib.import_name(import)),
    }
}

/// Disassemble a SPIR-V binary into assembly text
pub fn disassemble(words: &[u32]) -> Result<String> {
    let module = rspirv::dr::load_words(words)
        .map_err(|e| Error::emit(format!("Failed to parse SPIR-V: {:?}", e)))?;
    Ok(module.disassemble())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dump_lists_types_and_constants() {
        let mut lib = Library::new();
        let float = lib.float();
        let v3 = lib.vector(float, 3);
        let _ = lib.float_constant(2.0);
        let dump = dump_library(&lib);
        assert!(dump.contains("IR DUMP"));
        assert!(dump.contains(&format!("vec3<t{}>", float.0)));
        assert!(dump.contains("OpConstant"));
        assert!(format_type(&lib, v3).starts_with("vec3"));
    }

    #[test]
    fn test_disassemble_rejects_garbage() {
        assert!(disassemble(&[0xdead_beef]).is_err());
    }
}
