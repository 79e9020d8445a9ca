//! # Intermediate Representation (IR) for shader translation
//!
//! The IR mirrors the structure of a SPIR-V module: typed ops grouped into
//! basic blocks, blocks grouped into functions, and a [`Library`] arena that
//! owns every type, constant, global and function of one translation.
//!
//! ## Module Structure
//!
//! ```text
//! ir/
//! ├── mod.rs          # This file - module definition and re-exports
//! ├── types.rs        # Type, TypeKind, StructMember, DecorationEntry
//! ├── instruction.rs  # Op, Operand, index types, opcode classification
//! ├── program.rs      # BasicBlock, Function, GlobalVariable, Library
//! ├── context.rs      # TranslationContext (insertion point, operand stack)
//! └── generator.rs    # IrGenerator, the two-pass AST-to-IR front end
//! ```
//!
//! ## Key Types
//!
//! - [`Op`] - One instruction: opcode, optional result type, ordered operands
//! - [`Library`] - Identity-preserving factories for types and constants
//! - [`IrGenerator`] - Walks the AST and populates a `Library`
//!
//! ## Values and pointers
//!
//! An op whose result type is a pointer denotes an addressable location;
//! any other result is an immutable value. The generator converts between
//! the two with `OpLoad` and with a store into a fresh function-local
//! temporary.

mod context;
mod generator;
mod instruction;
mod program;
mod types;

// Re-export all public types
pub use context::{LoopTargets, TranslationContext};
pub use generator::IrGenerator;
pub(crate) use generator::{CallArg, InterfaceCounters};
pub use instruction::{
    is_constant, is_scalar_spec_constant, is_spec_constant, is_terminator, BlockId,
    ConstantLiteral, FunctionId, ImportId, LiteralId, LiteralValue, Op, OpId, Operand,
};
pub use program::{
    BasicBlock, BlockTag, EntryPointInfo, Function, GlobalVariable, Library, SpecConstantDecl,
};
pub use types::{DecorationEntry, StructMember, Type, TypeId, TypeKind};
