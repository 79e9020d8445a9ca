//! # Spirvgen Compiler - Shader AST to SPIR-V
//!
//! This module lowers a type-checked shader AST to one SPIR-V binary module
//! per entry point.
//!
//! ## Architecture
//!
//! ```text
//! AST → Pass 1 (declarations) → Pass 2 (bodies) → Entry points → Finish
//!     → per entry point: Collect → Assign IDs → Emit → Reflect
//! ```
//!
//! A module with any translation diagnostic is never serialized; every
//! diagnostic of the run is returned together in
//! [`Error::TranslationFailed`](crate::Error::TranslationFailed).
//!
//! ## Usage
//!
//! ```ignore
//! use spirvgen::compiler::{Compiler, CompileOptions};
//!
//! let module = spirvgen::parser::from_json(&std::fs::read_to_string("shader.ast.json")?)?;
//! let compiler = Compiler::new(CompileOptions::default());
//! let result = compiler.compile(&module)?;
//! for binary in &result.binaries {
//!     std::fs::write(format!("{}.spv", binary.entry_name), binary.to_bytes())?;
//! }
//! ```

pub mod collector;
pub mod debug;
pub mod entry_point;
pub mod glsl_ext;
pub mod id_assign;
pub mod ir;
pub mod reflection;
pub mod resolvers;
pub mod spirv_codegen;

pub use collector::{Collection, DependencyCollector};
pub use debug::{disassemble, dump_library};
pub use id_assign::{IdAssignor, IdMap};
pub use ir::{IrGenerator, Library};
pub use reflection::ShaderStageReflection;
pub use resolvers::{default_registry, ResolverRegistry};
pub use spirv_codegen::SpirvCodegen;

use crate::error::{Error, Result};
use crate::parser::Module;
use entry_point::EntryRequest;
use ir::EntryPointInfo;
use rspirv::spirv::ExecutionModel;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Pipeline stage of an entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShaderStage {
    /// Vertex shader
    Vertex,
    /// Pixel (fragment) shader
    Pixel,
    /// Geometry shader
    Geometry,
    /// Compute kernel
    Compute,
}

impl ShaderStage {
    /// Stage named by a struct or function attribute
    pub fn from_attribute(name: &str) -> Option<Self> {
        match name {
            "Vertex" => Some(ShaderStage::Vertex),
            "Pixel" => Some(ShaderStage::Pixel),
            "Geometry" => Some(ShaderStage::Geometry),
            "Compute" => Some(ShaderStage::Compute),
            _ => None,
        }
    }

    /// `OpEntryPoint` execution model
    pub fn execution_model(self) -> ExecutionModel {
        match self {
            ShaderStage::Vertex => ExecutionModel::Vertex,
            ShaderStage::Pixel => ExecutionModel::Fragment,
            ShaderStage::Geometry => ExecutionModel::Geometry,
            ShaderStage::Compute => ExecutionModel::GLCompute,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShaderStage::Vertex => "Vertex",
            ShaderStage::Pixel => "Pixel",
            ShaderStage::Geometry => "Geometry",
            ShaderStage::Compute => "Compute",
        };
        write!(f, "{}", name)
    }
}

/// One explicitly configured entry point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPointOptions {
    /// `Owner.Function`
    pub function: String,
    /// Stage to build it for
    pub stage: ShaderStage,
}

/// Compilation options
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Entry points to build; empty means every struct carrying a stage attribute
    pub entry_points: Vec<EntryPointOptions>,
    /// Emit `OpName` / `OpMemberName`
    pub debug_names: bool,
    /// Emit entry point modules on the rayon pool (needs the `parallel` feature)
    pub parallel_emit: bool,
    /// Report a stage struct without a `Main()` as an error instead of skipping it
    pub error_on_missing_main: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            entry_points: Vec::new(),
            debug_names: true,
            parallel_emit: true,
            error_on_missing_main: true,
        }
    }
}

/// One emitted stage module
#[derive(Debug, Clone)]
pub struct StageBinary {
    /// Pipeline stage
    pub stage: ShaderStage,
    /// `Owner.Function` of the entry function
    pub entry_name: String,
    /// SPIR-V words
    pub words: Vec<u32>,
    /// Pipeline reflection
    pub reflection: ShaderStageReflection,
    /// Lowercase hex SHA-256 of the little-endian bytes
    pub digest: String,
}

impl StageBinary {
    /// Little-endian byte stream (what a `.spv` file holds)
    pub fn to_bytes(&self) -> Vec<u8> {
        spirv_codegen::to_bytes(&self.words)
    }
}

/// Compilation result with metadata
#[derive(Debug)]
pub struct CompileResult {
    /// One module per entry point, in request order
    pub binaries: Vec<StageBinary>,
    /// Entry points that were skipped
    pub warnings: Vec<String>,
    /// Number of IR ops in the translated library
    pub ir_op_count: usize,
}

/// Shader AST to SPIR-V compiler
pub struct Compiler<'r> {
    options: CompileOptions,
    registry: &'r ResolverRegistry,
}

impl Compiler<'static> {
    /// Create a compiler using the built-in resolvers
    pub fn new(options: CompileOptions) -> Self {
        Self {
            options,
            registry: default_registry(),
        }
    }
}

impl<'r> Compiler<'r> {
    /// Create a compiler using a custom resolver registry
    pub fn with_registry(options: CompileOptions, registry: &'r ResolverRegistry) -> Self {
        Self { options, registry }
    }

    /// Options in effect
    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compile a module serialized as JSON
    pub fn compile_json(&self, source: &str) -> Result<CompileResult> {
        let module = crate::parser::from_json(source)?;
        self.compile(&module)
    }

    /// Compile a type-checked module
    pub fn compile(&self, module: &Module) -> Result<CompileResult> {
        let lib = self.translate(module)?;

        let entries = lib.entry_points().to_vec();
        let warnings = self.skipped_entry_points(module, &entries)?;
        let binaries = self.emit_all(&lib, &entries)?;

        Ok(CompileResult {
            binaries,
            warnings,
            ir_op_count: lib.op_count(),
        })
    }

    /// Run both front-end passes and build the entry points
    ///
    /// Returns the finished library, or every diagnostic of the run.
    pub fn translate(&self, module: &Module) -> Result<Library> {
        // Phase 1-2: Declarations and bodies
        let mut gen = IrGenerator::new(self.registry);
        gen.translate(module);

        // Phase 3: Entry points
        let requests = self.entry_requests(module)?;
        entry_point::build_entry_points(
            &mut gen,
            module,
            &requests,
            self.options.error_on_missing_main,
        )?;

        // Phase 4: Whole-program checks
        gen.finish();

        if gen.library().failed() {
            let diagnostics = gen.take_diagnostics();
            tracing::warn!("Translation failed with {} diagnostic(s)", diagnostics.len());
            return Err(Error::TranslationFailed {
                count: diagnostics.len(),
                diagnostics,
            });
        }
        Ok(gen.into_library())
    }

    fn entry_requests(&self, module: &Module) -> Result<Vec<EntryRequest>> {
        if self.options.entry_points.is_empty() {
            return Ok(entry_point::discover(module));
        }
        self.options
            .entry_points
            .iter()
            .map(|option| {
                let Some((owner, function)) = option.function.split_once('.') else {
                    return Err(Error::InvalidEntryPoint {
                        name: option.function.clone(),
                        reason: "expected 'Owner.Function'".to_string(),
                    });
                };
                if owner.is_empty() || function.is_empty() || function.contains('.') {
                    return Err(Error::InvalidEntryPoint {
                        name: option.function.clone(),
                        reason: "expected 'Owner.Function'".to_string(),
                    });
                }
                Ok(EntryRequest {
                    owner: owner.to_string(),
                    function: function.to_string(),
                    stage: option.stage,
                })
            })
            .collect()
    }

    fn skipped_entry_points(
        &self,
        module: &Module,
        entries: &[EntryPointInfo],
    ) -> Result<Vec<String>> {
        Ok(self
            .entry_requests(module)?
            .into_iter()
            .filter(|r| !entries.iter().any(|e| e.owner == r.owner && e.stage == r.stage))
            .map(|r| {
                format!(
                    "Skipped entry point {}.{} ({} stage): no '{}()' function",
                    r.owner, r.function, r.stage, r.function
                )
            })
            .collect())
    }

    fn emit_all(&self, lib: &Library, entries: &[EntryPointInfo]) -> Result<Vec<StageBinary>> {
        let debug_names = self.options.debug_names;

        #[cfg(feature = "parallel")]
        if self.options.parallel_emit && entries.len() > 1 {
            use rayon::prelude::*;
            return entries
                .par_iter()
                .map(|entry| emit_entry(lib, entry, debug_names))
                .collect();
        }

        entries
            .iter()
            .map(|entry| emit_entry(lib, entry, debug_names))
            .collect()
    }
}

/// Collect, number, serialize and reflect one entry point
pub fn emit_entry(lib: &Library, entry: &EntryPointInfo, debug_names: bool) -> Result<StageBinary> {
    let collection = DependencyCollector::collect(lib, entry);
    let ids = IdAssignor::assign(lib, &collection);
    let words = SpirvCodegen::new(lib, &collection, &ids, entry)
        .with_debug_names(debug_names)
        .generate()?;
    let reflection = ShaderStageReflection::build(lib, entry, &collection, &ids);
    let digest = hex::encode(Sha256::digest(spirv_codegen::to_bytes(&words)));
    let main = lib.function(entry.main);

    tracing::debug!(
        "Emitted {} ({} stage): {} words, digest {}",
        main.name,
        entry.stage,
        words.len(),
        &digest[..12]
    );
    Ok(StageBinary {
        stage: entry.stage,
        entry_name: main.name.clone(),
        words,
        reflection,
        digest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compiler_creation() {
        let compiler = Compiler::new(CompileOptions::default());
        assert!(compiler.options().debug_names);
        assert!(compiler.options().entry_points.is_empty());
    }

    #[test]
    fn test_stage_execution_models() {
        assert_eq!(ShaderStage::Pixel.execution_model(), ExecutionModel::Fragment);
        assert_eq!(ShaderStage::Compute.execution_model(), ExecutionModel::GLCompute);
        assert_eq!(ShaderStage::from_attribute("Geometry"), Some(ShaderStage::Geometry));
        assert_eq!(ShaderStage::from_attribute("Fragment"), None);
        assert_eq!(ShaderStage::Vertex.to_string(), "Vertex");
    }

    #[test]
    fn test_entry_point_option_must_be_qualified() {
        let compiler = Compiler::new(CompileOptions {
            entry_points: vec![EntryPointOptions {
                function: "Main".into(),
                stage: ShaderStage::Pixel,
            }],
            ..Default::default()
        });
        let err = compiler.compile(&Module::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidEntryPoint { .. }));
    }

    #[test]
    fn test_unknown_entry_owner() {
        let compiler = Compiler::new(CompileOptions {
            entry_points: vec![EntryPointOptions {
                function: "Missing.Main".into(),
                stage: ShaderStage::Vertex,
            }],
            ..Default::default()
        });
        let err = compiler.compile(&Module::default()).unwrap_err();
        assert!(matches!(err, Error::EntryPointNotFound { ref name } if name == "Missing.Main"));
    }
}
