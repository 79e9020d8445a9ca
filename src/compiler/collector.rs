//! Dependency collection for one entry point
//!
//! Walks everything reachable from an entry point (its interface globals,
//! the entry function and every function it calls) and gathers the module
//! sections in dependency order: a type or constant always appears after
//! everything it references. The library is only read, so several entry
//! points can be collected from one library concurrently.

use crate::compiler::ir::{
    is_constant, EntryPointInfo, FunctionId, ImportId, Library, OpId, Operand, TypeId, TypeKind,
};
use crate::compiler::ShaderStage;
use crate::parser::ImageDim;
use rspirv::spirv::{BuiltIn, Capability, Decoration, StorageClass};
use std::collections::HashSet;

/// Entry of the combined types/constants/globals section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Declaration {
    /// `OpType*`
    Type(TypeId),
    /// `OpConstant*` / `OpSpecConstant*`
    Constant(OpId),
    /// Module-scope `OpVariable`
    Global(OpId),
}

/// Everything one module needs, in emission order
#[derive(Debug, Clone, Default)]
pub struct Collection {
    /// Declared capabilities, deduplicated
    pub capabilities: Vec<Capability>,
    /// Declared extensions
    pub extensions: Vec<String>,
    /// Extended instruction set imports
    pub imports: Vec<ImportId>,
    /// Types in post-order
    pub types: Vec<TypeId>,
    /// Constants and spec constants in post-order
    pub constants: Vec<OpId>,
    /// Module-scope variables
    pub globals: Vec<OpId>,
    /// Combined declaration section
    pub declarations: Vec<Declaration>,
    /// Functions, entry function first
    pub functions: Vec<FunctionId>,
}

/// Collects the dependencies of one entry point
pub struct DependencyCollector<'a> {
    lib: &'a Library,
    seen_types: HashSet<TypeId>,
    seen_ops: HashSet<OpId>,
    seen_functions: HashSet<FunctionId>,
    uses_storage_buffer: bool,
    out: Collection,
}

impl<'a> DependencyCollector<'a> {
    /// Collect everything `entry` needs
    pub fn collect(lib: &'a Library, entry: &EntryPointInfo) -> Collection {
        let mut collector = Self {
            lib,
            seen_types: HashSet::new(),
            seen_ops: HashSet::new(),
            seen_functions: HashSet::new(),
            uses_storage_buffer: false,
            out: Collection::default(),
        };

        for &global in &entry.interface {
            collector.visit_global(global);
        }
        collector.enqueue(entry.function);
        let mut next = 0;
        while next < collector.out.functions.len() {
            let function = collector.out.functions[next];
            collector.visit_function(function);
            next += 1;
        }
        collector.derive_capabilities(entry.stage);

        tracing::debug!(
            "Collected {} types, {} constants, {} globals, {} functions",
            collector.out.types.len(),
            collector.out.constants.len(),
            collector.out.globals.len(),
            collector.out.functions.len()
        );
        collector.out
    }

    fn enqueue(&mut self, function: FunctionId) {
        if self.seen_functions.insert(function) {
            self.out.functions.push(function);
        }
    }

    fn visit_import(&mut self, import: ImportId) {
        if !self.out.imports.contains(&import) {
            self.out.imports.push(import);
        }
    }

    fn visit_type(&mut self, ty: TypeId) {
        if !self.seen_types.insert(ty) {
            return;
        }
        let lib = self.lib;
        match &lib.ty(ty).kind {
            TypeKind::Void | TypeKind::Bool | TypeKind::Int { .. } | TypeKind::Float => {}
            TypeKind::Sampler => {}
            TypeKind::Vector { component, .. } => self.visit_type(*component),
            TypeKind::Matrix { column, .. } => self.visit_type(*column),
            TypeKind::FixedArray { element, length } => {
                self.visit_type(*element);
                self.visit_constant(*length);
            }
            TypeKind::RuntimeArray { element } => self.visit_type(*element),
            TypeKind::Struct { members } => {
                for member in members {
                    self.visit_type(member.ty);
                }
            }
            TypeKind::Function {
                return_type,
                params,
            } => {
                self.visit_type(*return_type);
                for &param in params {
                    self.visit_type(param);
                }
            }
            TypeKind::Pointer { storage, pointee } => {
                if *storage == StorageClass::StorageBuffer {
                    self.uses_storage_buffer = true;
                }
                self.visit_type(*pointee);
            }
            TypeKind::Image { sampled, .. } => self.visit_type(*sampled),
            TypeKind::SampledImage { image } => self.visit_type(*image),
        }
        self.out.types.push(ty);
        self.out.declarations.push(Declaration::Type(ty));
    }

    fn visit_constant(&mut self, op: OpId) {
        if !self.seen_ops.insert(op) {
            return;
        }
        let lib = self.lib;
        let constant = lib.op(op);
        if let Some(ty) = constant.result_type {
            self.visit_type(ty);
        }
        for arg in &constant.args {
            if let Operand::Op(part) = arg {
                self.visit_constant(*part);
            }
        }
        self.out.constants.push(op);
        self.out.declarations.push(Declaration::Constant(op));
    }

    fn visit_global(&mut self, op: OpId) {
        if !self.seen_ops.insert(op) {
            return;
        }
        if let Some(ty) = self.lib.type_of(op) {
            self.visit_type(ty);
        }
        self.out.globals.push(op);
        self.out.declarations.push(Declaration::Global(op));
    }

    /// Module-scope op referenced from a function body
    fn visit_operand(&mut self, op: OpId) {
        let code = self.lib.op(op).code;
        if is_constant(code) {
            self.visit_constant(op);
        } else if self.lib.global_for_op(op).is_some() {
            self.visit_global(op);
        }
    }

    fn visit_function(&mut self, function: FunctionId) {
        let lib = self.lib;
        let f = lib.function(function);
        self.visit_type(f.function_type);
        self.visit_type(f.return_type);
        for &param in &f.params {
            if let Some(ty) = lib.type_of(param) {
                self.visit_type(ty);
            }
        }
        for &block in &f.blocks {
            let block = lib.block(block);
            for &local in &block.locals {
                if let Some(ty) = lib.type_of(local) {
                    self.visit_type(ty);
                }
            }
            for &line in &block.lines {
                let op = lib.op(line);
                if let Some(ty) = op.result_type {
                    self.visit_type(ty);
                }
                for arg in &op.args {
                    match arg {
                        Operand::Op(operand) => self.visit_operand(*operand),
                        Operand::Function(callee) => self.enqueue(*callee),
                        Operand::Import(import) => self.visit_import(*import),
                        Operand::Constant(_) | Operand::Literal(_) | Operand::Block(_) => {}
                    }
                }
            }
        }
    }

    fn derive_capabilities(&mut self, stage: ShaderStage) {
        let mut capabilities = vec![Capability::Shader];
        if stage == ShaderStage::Geometry {
            capabilities.push(Capability::Geometry);
        }
        for &global in &self.out.globals {
            let Some(variable) = self.lib.global_for_op(global) else {
                continue;
            };
            for entry in &variable.decorations {
                if entry.decoration != Decoration::BuiltIn {
                    continue;
                }
                let Some(&word) = entry.operands.first() else {
                    continue;
                };
                let capability = match word {
                    w if w == BuiltIn::ClipDistance as u32 => Capability::ClipDistance,
                    w if w == BuiltIn::CullDistance as u32 => Capability::CullDistance,
                    w if w == BuiltIn::PrimitiveId as u32 || w == BuiltIn::InvocationId as u32 => {
                        Capability::Geometry
                    }
                    _ => continue,
                };
                capabilities.push(capability);
            }
        }
        for &ty in &self.out.types {
            if let TypeKind::Image { desc, .. } = self.lib.ty(ty).kind {
                if desc.dim == ImageDim::Dim1D {
                    capabilities.push(Capability::Sampled1D);
                }
            }
        }

        let mut seen = HashSet::new();
        capabilities.retain(|c| seen.insert(*c));
        self.out.capabilities = capabilities;
        if self.uses_storage_buffer {
            self.out
                .extensions
                .push("SPV_KHR_storage_buffer_storage_class".to_string());
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
