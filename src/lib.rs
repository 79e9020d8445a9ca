//! # Spirvgen - Shader ASTs to SPIR-V
//!
//! [![Crates.io](https://img.shields.io/crates/v/spirvgen.svg)](https://crates.io/crates/spirvgen)
//! [![Documentation](https://docs.rs/spirvgen/badge.svg)](https://docs.rs/spirvgen)
//! [![License: MIT](https://img.shields.io/badge/License-MIT-yellow.svg)](https://opensource.org/licenses/MIT)
//!
//! Lowers a type-checked shader AST (structs, fields, properties, functions,
//! statements and typed expressions) to byte-exact SPIR-V 1.4 modules, one
//! per entry point, together with pipeline reflection.
//!
//! ## Features
//!
//! - **Structured control flow** - `if`/`while`/`do`/`for`/`loop` with merge and continue blocks
//! - **Data-driven lowering** - operators, casts, constructors, swizzles and intrinsics
//!   come from a [`ResolverRegistry`] that hosts can extend
//! - **Specialization constants** - scalar leaves get sequential `SpecId`s
//! - **Diagnostics, not panics** - every problem of a run is reported at once
//! - **Deterministic output** - identical input gives identical bytes (and digest)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use spirvgen::parser::{
//!     Attribute, FunctionDecl, Module, SourceLocation, Statement, StructDecl, TypeRef,
//! };
//! use spirvgen::{CompileOptions, Compiler};
//!
//! # fn main() -> spirvgen::Result<()> {
//! let module = Module {
//!     structs: vec![StructDecl {
//!         name: "Flat".into(),
//!         attributes: vec![Attribute::new("Pixel")],
//!         functions: vec![FunctionDecl {
//!             name: "Main".into(),
//!             params: vec![],
//!             return_type: TypeRef::Void,
//!             is_static: true,
//!             attributes: vec![],
//!             body: vec![Statement::Return { value: None, location: SourceLocation::default() }],
//!             location: SourceLocation::default(),
//!         }],
//!         ..Default::default()
//!     }],
//!     enums: vec![],
//! };
//!
//! let result = Compiler::new(CompileOptions::default()).compile(&module)?;
//! let binary = &result.binaries[0];
//! assert_eq!(binary.words[0], 0x0723_0203);
//! std::fs::write("flat.spv", binary.to_bytes()).ok();
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! AST (JSON or in-memory) → IrGenerator → Library → per entry point:
//!     DependencyCollector → IdAssignor → SpirvCodegen → words + reflection
//! ```
//!
//! ### Main Components
//!
//! - [`parser`] - The input AST and its JSON form
//! - [`compiler::ir`] - Library, ops, blocks, functions and the front end
//! - [`compiler::resolvers`] - Operator / intrinsic lowering tables
//! - [`compiler::collector`] - Per-entry-point dependency collection
//! - [`compiler::id_assign`] - Result ID and `SpecId` numbering
//! - [`compiler::spirv_codegen`] - Binary emission
//!
//! ## Error Handling
//!
//! Node-level problems (unsupported constructs, unknown intrinsics, bad
//! attributes) are collected as [`Diagnostic`]s and returned together:
//!
//! ```rust,ignore
//! match compiler.compile(&module) {
//!     Err(Error::TranslationFailed { diagnostics, .. }) => {
//!         for d in diagnostics {
//!             eprintln!("{}", d);
//!         }
//!     }
//!     other => { /* ... */ }
//! }
//! ```
//!
//! ## License
//!
//! Licensed under the [MIT License](https://opensource.org/licenses/MIT).

#![allow(clippy::too_many_arguments)] // Resolver helpers mirror instruction operand lists

/// Version of the spirvgen translator
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod compiler;
pub mod error;
pub mod parser;

// Re-export main types
pub use compiler::{
    CompileOptions, CompileResult, Compiler, EntryPointOptions, ResolverRegistry, ShaderStage,
    StageBinary,
};
pub use error::{Diagnostic, Error, ErrorSeverity, Result};
pub use parser::{Module, TypeRef};
