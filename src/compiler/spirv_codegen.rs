//! # SPIR-V Code Generator
//!
//! Serializes one collected, ID-assigned entry point as a SPIR-V binary
//! module. Every instruction starts with a `(word count << 16) | opcode`
//! word; the count covers the whole instruction including that first word.
//!
//! ## Key Technical Details
//! - Header: magic, version 1.4, generator 0, ID bound, schema 0
//! - Strings are UTF-8, null-terminated and zero-padded to a word boundary
//! - Structured control flow: `OpSelectionMerge` / `OpLoopMerge` are written
//!   directly before the terminator of Selection / Loop tagged blocks
//! - No validation happens here; a miscounted instruction makes the module
//!   unparseable

use super::collector::{Collection, Declaration};
use super::id_assign::{Entity, IdMap};
use super::ir::{BlockTag, EntryPointInfo, Library, Op, Operand, TypeId, TypeKind};
use crate::error::{Error, Result};
use crate::parser::ImageDim;
use rspirv::spirv::{self, AddressingModel, Decoration, Dim, MemoryModel};

// =============================================================================
// MODULE HEADER
// =============================================================================

/// SPIR-V magic number
pub const MAGIC_NUMBER: u32 = 0x0723_0203;
/// Version 1.4
pub const VERSION: u32 = 0x0001_0400;
/// Generator magic (unregistered)
pub const GENERATOR: u32 = 0;
/// Reserved schema word
pub const SCHEMA: u32 = 0;
/// `OpSource` language (Unknown)
pub const SOURCE_LANGUAGE: u32 = 0;
/// `OpSource` version
pub const SOURCE_VERSION: u32 = 100;

// =============================================================================
// WORD ENCODING
// =============================================================================

/// First word of an instruction
pub fn instruction_header(word_count: u32, opcode: spirv::Op) -> u32 {
    (word_count << 16) | (opcode as u32)
}

/// A null-terminated, zero-padded UTF-8 string (`len / 4 + 1` words)
pub fn string_words(s: &str) -> Vec<u32> {
    let bytes = s.as_bytes();
    let mut words = vec![0u32; bytes.len() / 4 + 1];
    for (i, &byte) in bytes.iter().enumerate() {
        words[i / 4] |= (byte as u32) << ((i % 4) * 8);
    }
    words
}

/// Little-endian byte stream of a module
pub fn to_bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

// =============================================================================
// CODE GENERATOR
// =============================================================================

/// Emits the binary module of one entry point
pub struct SpirvCodegen<'a> {
    lib: &'a Library,
    collection: &'a Collection,
    ids: &'a IdMap,
    entry: &'a EntryPointInfo,
    /// Emit `OpName` / `OpMemberName`
    debug_names: bool,
    words: Vec<u32>,
}

impl<'a> SpirvCodegen<'a> {
    /// Create a generator over a collected, ID-assigned entry point
    pub fn new(
        lib: &'a Library,
        collection: &'a Collection,
        ids: &'a IdMap,
        entry: &'a EntryPointInfo,
    ) -> Self {
        Self {
            lib,
            collection,
            ids,
            entry,
            debug_names: true,
            words: Vec::new(),
        }
    }

    /// Enable or disable debug name instructions
    pub fn with_debug_names(mut self, enabled: bool) -> Self {
        self.debug_names = enabled;
        self
    }

    /// Serialize the module
    pub fn generate(mut self) -> Result<Vec<u32>> {
        self.emit_header();
        self.emit_capabilities();
        self.emit_imports()?;
        self.emit_memory_model();
        self.emit_entry_point()?;
        self.emit_source();
        if self.debug_names {
            self.emit_names()?;
        }
        self.emit_decorations()?;
        self.emit_declarations()?;
        let collection = self.collection;
        for &function in &collection.functions {
            self.emit_function(function)?;
        }
        tracing::debug!(
            "Emitted {} words for entry point {}",
            self.words.len(),
            self.entry.owner
        );
        Ok(self.words)
    }

    fn id(&self, entity: Entity) -> Result<u32> {
        self.ids
            .get(entity)
            .ok_or_else(|| Error::emit(format!("no result ID for {:?}", entity)))
    }

    fn inst(&mut self, opcode: spirv::Op, operands: &[u32]) {
        self.words
            .push(instruction_header(1 + operands.len() as u32, opcode));
        self.words.extend_from_slice(operands);
    }

    // -------------------------------------------------------------------------
    // Preamble
    // -------------------------------------------------------------------------

    fn emit_header(&mut self) {
        self.words.extend_from_slice(&[
            MAGIC_NUMBER,
            VERSION,
            GENERATOR,
            self.ids.bound(),
            SCHEMA,
        ]);
    }

    fn emit_capabilities(&mut self) {
        for capability in self.collection.capabilities.clone() {
            self.inst(spirv::Op::Capability, &[capability as u32]);
        }
        for extension in self.collection.extensions.clone() {
            self.inst(spirv::Op::Extension, &string_words(&extension));
        }
    }

    fn emit_imports(&mut self) -> Result<()> {
        let lib = self.lib;
        let collection = self.collection;
        for &import in &collection.imports {
            let mut operands = vec![self.id(Entity::Import(import))?];
            operands.extend(string_words(lib.import_name(import)));
            self.inst(spirv::Op::ExtInstImport, &operands);
        }
        Ok(())
    }

    fn emit_memory_model(&mut self) {
        self.inst(
            spirv::Op::MemoryModel,
            &[AddressingModel::Logical as u32, MemoryModel::GLSL450 as u32],
        );
    }

    fn emit_entry_point(&mut self) -> Result<()> {
        let entry = self.entry;
        let function = self.id(Entity::Function(entry.function))?;
        let mut operands = vec![entry.stage.execution_model() as u32, function];
        operands.extend(string_words(&entry.name));
        for &global in &entry.interface {
            operands.push(self.id(Entity::Op(global))?);
        }
        self.inst(spirv::Op::EntryPoint, &operands);

        for (mode, literals) in &entry.modes {
            let mut operands = vec![function, *mode as u32];
            operands.extend_from_slice(literals);
            self.inst(spirv::Op::ExecutionMode, &operands);
        }
        Ok(())
    }

    fn emit_source(&mut self) {
        self.inst(spirv::Op::Source, &[SOURCE_LANGUAGE, SOURCE_VERSION]);
    }

    // -------------------------------------------------------------------------
    // Debug names
    // -------------------------------------------------------------------------

    fn name(&mut self, id: u32, name: &str) {
        let mut operands = vec![id];
        operands.extend(string_words(name));
        self.inst(spirv::Op::Name, &operands);
    }

    fn op_name(&mut self, op: super::ir::OpId) -> Result<()> {
        let lib = self.lib;
        if let Some(name) = &lib.op(op).debug_name {
            let id = self.id(Entity::Op(op))?;
            self.name(id, name);
        }
        Ok(())
    }

    fn emit_names(&mut self) -> Result<()> {
        let lib = self.lib;
        let collection = self.collection;
        for &ty in &collection.types {
            let t = lib.ty(ty);
            if t.name.is_empty() {
                continue;
            }
            let id = self.id(Entity::Type(ty))?;
            self.name(id, &t.name);
            if let TypeKind::Struct { members } = &t.kind {
                for (index, member) in members.iter().enumerate() {
                    let mut operands = vec![id, index as u32];
                    operands.extend(string_words(&member.name));
                    self.inst(spirv::Op::MemberName, &operands);
                }
            }
        }
        for &global in &collection.globals {
            self.op_name(global)?;
        }
        for &constant in &collection.constants {
            self.op_name(constant)?;
        }
        for &function in &collection.functions {
            let f = lib.function(function);
            let id = self.id(Entity::Function(function))?;
            self.name(id, &f.name);
            for &param in &f.params {
                self.op_name(param)?;
            }
            for &block in &f.blocks {
                let b = lib.block(block);
                if let Some(label) = &b.debug_name {
                    let id = self.id(Entity::Block(block))?;
                    self.name(id, label);
                }
                for &local in &b.locals {
                    self.op_name(local)?;
                }
                for &line in &b.lines {
                    if lib.op(line).has_result() {
                        self.op_name(line)?;
                    }
                }
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Decorations
    // -------------------------------------------------------------------------

    fn emit_decorations(&mut self) -> Result<()> {
        let lib = self.lib;
        let collection = self.collection;
        for &ty in &collection.types {
            let t = lib.ty(ty);
            if t.decorations.is_empty() {
                continue;
            }
            let id = self.id(Entity::Type(ty))?;
            for entry in &t.decorations {
                let mut operands = vec![id, entry.decoration as u32];
                operands.extend_from_slice(&entry.operands);
                self.inst(spirv::Op::Decorate, &operands);
            }
        }
        for &ty in &collection.types {
            let t = lib.ty(ty);
            if t.member_decorations.is_empty() {
                continue;
            }
            let id = self.id(Entity::Type(ty))?;
            for (member, entry) in &t.member_decorations {
                let mut operands = vec![id, *member, entry.decoration as u32];
                operands.extend_from_slice(&entry.operands);
                self.inst(spirv::Op::MemberDecorate, &operands);
            }
        }
        for &global in &collection.globals {
            let Some(variable) = lib.global_for_op(global) else {
                continue;
            };
            let id = self.id(Entity::Op(global))?;
            for entry in &variable.decorations {
                let mut operands = vec![id, entry.decoration as u32];
                operands.extend_from_slice(&entry.operands);
                self.inst(spirv::Op::Decorate, &operands);
            }
        }
        for (constant, spec_id) in self.ids.spec_constants() {
            let id = self.id(Entity::Op(constant))?;
            self.inst(
                spirv::Op::Decorate,
                &[id, Decoration::SpecId as u32, spec_id],
            );
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Types, constants, globals
    // -------------------------------------------------------------------------

    fn emit_declarations(&mut self) -> Result<()> {
        let collection = self.collection;
        for &declaration in &collection.declarations {
            match declaration {
                Declaration::Type(ty) => self.emit_type(ty)?,
                Declaration::Constant(op) | Declaration::Global(op) => self.emit_op(op)?,
            }
        }
        Ok(())
    }

    fn emit_type(&mut self, ty: TypeId) -> Result<()> {
        let result = self.id(Entity::Type(ty))?;
        let lib = self.lib;
        let ty_id = |this: &Self, t: TypeId| this.id(Entity::Type(t));
        match &lib.ty(ty).kind {
            TypeKind::Void => self.inst(spirv::Op::TypeVoid, &[result]),
            TypeKind::Bool => self.inst(spirv::Op::TypeBool, &[result]),
            TypeKind::Int { signed } => {
                self.inst(spirv::Op::TypeInt, &[result, 32, *signed as u32]);
            }
            TypeKind::Float => self.inst(spirv::Op::TypeFloat, &[result, 32]),
            TypeKind::Vector { component, count } => {
                let component = ty_id(self, *component)?;
                self.inst(spirv::Op::TypeVector, &[result, component, *count]);
            }
            TypeKind::Matrix { column, columns } => {
                let column = ty_id(self, *column)?;
                self.inst(spirv::Op::TypeMatrix, &[result, column, *columns]);
            }
            TypeKind::FixedArray { element, length } => {
                let element = ty_id(self, *element)?;
                let length = self.id(Entity::Op(*length))?;
                self.inst(spirv::Op::TypeArray, &[result, element, length]);
            }
            TypeKind::RuntimeArray { element } => {
                let element = ty_id(self, *element)?;
                self.inst(spirv::Op::TypeRuntimeArray, &[result, element]);
            }
            TypeKind::Struct { members } => {
                let mut operands = vec![result];
                for member in members {
                    operands.push(ty_id(self, member.ty)?);
                }
                self.inst(spirv::Op::TypeStruct, &operands);
            }
            TypeKind::Function {
                return_type,
                params,
            } => {
                let mut operands = vec![result, ty_id(self, *return_type)?];
                for &param in params {
                    operands.push(ty_id(self, param)?);
                }
                self.inst(spirv::Op::TypeFunction, &operands);
            }
            TypeKind::Pointer { storage, pointee } => {
                let pointee = ty_id(self, *pointee)?;
                self.inst(spirv::Op::TypePointer, &[result, *storage as u32, pointee]);
            }
            TypeKind::Image { sampled, desc } => {
                let sampled = ty_id(self, *sampled)?;
                let dim = match desc.dim {
                    ImageDim::Dim1D => Dim::Dim1D,
                    ImageDim::Dim2D => Dim::Dim2D,
                    ImageDim::Dim3D => Dim::Dim3D,
                    ImageDim::Cube => Dim::DimCube,
                };
                self.inst(
                    spirv::Op::TypeImage,
                    &[
                        result,
                        sampled,
                        dim as u32,
                        desc.depth as u32,
                        desc.arrayed as u32,
                        desc.multisampled as u32,
                        if desc.storage { 2 } else { 1 },
                        spirv::ImageFormat::Unknown as u32,
                    ],
                );
            }
            TypeKind::SampledImage { image } => {
                let image = ty_id(self, *image)?;
                self.inst(spirv::Op::TypeSampledImage, &[result, image]);
            }
            TypeKind::Sampler => self.inst(spirv::Op::TypeSampler, &[result]),
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Generic instructions
    // -------------------------------------------------------------------------

    fn operand_word(&self, operand: &Operand) -> Result<u32> {
        match *operand {
            Operand::Op(op) => self.id(Entity::Op(op)),
            Operand::Constant(literal) => Ok(self.lib.literal(literal).value.word()),
            Operand::Literal(word) => Ok(word),
            Operand::Function(function) => self.id(Entity::Function(function)),
            Operand::Block(block) => self.id(Entity::Block(block)),
            Operand::Import(import) => self.id(Entity::Import(import)),
        }
    }

    /// `[result type, result]` followed by the arguments, or just the
    /// arguments for result-less ops
    fn emit_op(&mut self, op: super::ir::OpId) -> Result<()> {
        let lib = self.lib;
        let instruction: &Op = lib.op(op);
        if instruction.code == spirv::Op::Undef {
            return Err(Error::emit(format!(
                "placeholder op {:?} reached the emitter",
                op
            )));
        }
        let mut operands = Vec::with_capacity(instruction.args.len() + 2);
        if let Some(result_type) = instruction.result_type {
            operands.push(self.id(Entity::Type(result_type))?);
            operands.push(self.id(Entity::Op(op))?);
        }
        for arg in &instruction.args {
            operands.push(self.operand_word(arg)?);
        }
        self.inst(instruction.code, &operands);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Functions
    // -------------------------------------------------------------------------

    fn emit_function(&mut self, function: super::ir::FunctionId) -> Result<()> {
        let lib = self.lib;
        let f = lib.function(function);
        let result = self.id(Entity::Function(function))?;
        let return_type = self.id(Entity::Type(f.return_type))?;
        let function_type = self.id(Entity::Type(f.function_type))?;
        self.inst(
            spirv::Op::Function,
            &[
                return_type,
                result,
                spirv::FunctionControl::NONE.bits(),
                function_type,
            ],
        );
        for &param in &f.params {
            self.emit_op(param)?;
        }
        for &block in &f.blocks {
            let b = lib.block(block);
            let label = self.id(Entity::Block(block))?;
            self.inst(spirv::Op::Label, &[label]);
            for &local in &b.locals {
                self.emit_op(local)?;
            }
            let last = b.lines.len().saturating_sub(1);
            for (index, &line) in b.lines.iter().enumerate() {
                if index == last {
                    self.emit_merge(b.tag, b.merge, b.continue_target, lib.op(line).code)?;
                }
                self.emit_op(line)?;
            }
        }
        self.inst(spirv::Op::FunctionEnd, &[]);
        Ok(())
    }

    fn emit_merge(
        &mut self,
        tag: BlockTag,
        merge: Option<super::ir::BlockId>,
        continue_target: Option<super::ir::BlockId>,
        terminator: spirv::Op,
    ) -> Result<()> {
        match (tag, merge, terminator) {
            (BlockTag::Selection, Some(merge), spirv::Op::BranchConditional) => {
                let merge = self.id(Entity::Block(merge))?;
                self.inst(
                    spirv::Op::SelectionMerge,
                    &[merge, spirv::SelectionControl::NONE.bits()],
                );
            }
            (BlockTag::Loop, Some(merge), spirv::Op::Branch | spirv::Op::BranchConditional) => {
                let merge = self.id(Entity::Block(merge))?;
                let continue_target = match continue_target {
                    Some(block) => self.id(Entity::Block(block))?,
                    None => return Err(Error::emit("loop header without a continue target")),
                };
                self.inst(
                    spirv::Op::LoopMerge,
                    &[merge, continue_target, spirv::LoopControl::NONE.bits()],
                );
            }
            _ => {}
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
