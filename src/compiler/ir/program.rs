//! IR program and basic block definitions
//!
//! [`Library`] is the arena that owns every type, constant, op, block and
//! function of one translation. Entities refer to each other through the
//! small index types from [`super::instruction`], so the graph can be
//! self-referential without shared ownership.

use super::instruction::{
    is_spec_constant, is_terminator, BlockId, ConstantLiteral, FunctionId, ImportId, LiteralId,
    LiteralValue, Op, OpId, Operand,
};
use super::types::{DecorationEntry, StructMember, Type, TypeId, TypeKind};
use crate::compiler::ShaderStage;
use crate::parser::{Attribute, ImageDesc, SourceLocation, TypeRef};
use rspirv::spirv::{self, ExecutionMode, StorageClass};
use std::collections::HashMap;

/// Structured control-flow role of a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockTag {
    /// Ordinary block
    #[default]
    Plain,
    /// Header of a selection construct (`OpSelectionMerge`)
    Selection,
    /// Header of a loop construct (`OpLoopMerge`)
    Loop,
}

/// Basic block in the control flow graph
#[derive(Debug, Clone, Default)]
pub struct BasicBlock {
    /// Debug label
    pub debug_name: Option<String>,
    /// `OpVariable` declarations (only the entry block of a function has any)
    pub locals: Vec<OpId>,
    /// Instructions; the last one is the terminator once the function is finished
    pub lines: Vec<OpId>,
    /// Structured control-flow role
    pub tag: BlockTag,
    /// Merge block of the construct this block heads
    pub merge: Option<BlockId>,
    /// Continue target of the loop this block heads
    pub continue_target: Option<BlockId>,
}

impl BasicBlock {
    /// Create a new basic block with the given label
    pub fn new(label: &str) -> Self {
        Self {
            debug_name: Some(label.to_string()),
            ..Default::default()
        }
    }
}

/// Function with its signature and body
#[derive(Debug, Clone)]
pub struct Function {
    /// Debug name (`Owner.Name`)
    pub name: String,
    /// Declaring struct
    pub owner: Option<String>,
    /// `Function`-kind type of the signature
    pub function_type: TypeId,
    /// Return type
    pub return_type: TypeId,
    /// `OpFunctionParameter` ops (self pointer first for instance functions)
    pub params: Vec<OpId>,
    /// Blocks in emission order; the first is the entry block
    pub blocks: Vec<BlockId>,
    /// Declaration attributes
    pub attributes: Vec<Attribute>,
    /// Takes an implicit self pointer
    pub is_instance: bool,
    /// Stage this function may only be used from
    pub required_stage: Option<ShaderStage>,
    /// Declaration location
    pub location: SourceLocation,
}

/// Module-scope variable
#[derive(Debug, Clone)]
pub struct GlobalVariable {
    /// The `OpVariable` op
    pub op: OpId,
    /// Field name
    pub name: String,
    /// Declaring struct
    pub owner: String,
    /// Address space
    pub storage: StorageClass,
    /// Source-level type of the field
    pub source_type: TypeRef,
    /// Field value lives in member 0 of a generated block struct
    pub wrapped: bool,
    /// Function storing the initial value
    pub initializer: Option<FunctionId>,
    /// Variable decorations (`Location`, `BuiltIn`, `DescriptorSet`, `Binding`)
    pub decorations: Vec<DecorationEntry>,
}

/// Named specialization constant declaration
#[derive(Debug, Clone)]
pub struct SpecConstantDecl {
    /// `Owner.field`
    pub name: String,
    /// Top-level spec constant op
    pub op: OpId,
}

/// Entry point of one shader stage
#[derive(Debug, Clone)]
pub struct EntryPointInfo {
    /// Name written into `OpEntryPoint`
    pub name: String,
    /// Struct carrying the stage
    pub owner: String,
    /// Stage
    pub stage: ShaderStage,
    /// Function invoked by the pipeline (a generated wrapper or `Main`)
    pub function: FunctionId,
    /// The user `Main`
    pub main: FunctionId,
    /// `Input`/`Output` globals
    pub interface: Vec<OpId>,
    /// Execution modes with their literal operands
    pub modes: Vec<(ExecutionMode, Vec<u32>)>,
    /// Compute workgroup size
    pub local_size: Option<[u32; 3]>,
}

/// Owner of every entity produced by one translation
#[derive(Debug, Default)]
pub struct Library {
    types: Vec<Type>,
    literals: Vec<ConstantLiteral>,
    ops: Vec<Op>,
    blocks: Vec<BasicBlock>,
    functions: Vec<Function>,
    imports: Vec<String>,
    globals: Vec<GlobalVariable>,
    entry_points: Vec<EntryPointInfo>,
    type_cache: HashMap<TypeKind, TypeId>,
    pointer_cache: HashMap<(TypeId, StorageClass), TypeId>,
    named_types: HashMap<String, TypeId>,
    literal_cache: HashMap<(TypeId, LiteralValue), LiteralId>,
    constant_cache: HashMap<(TypeId, LiteralValue), OpId>,
    composite_cache: HashMap<(TypeId, Vec<OpId>), OpId>,
    spec_constants: HashMap<String, OpId>,
    spec_constant_decls: Vec<SpecConstantDecl>,
    enum_constants: HashMap<(String, String), OpId>,
    global_index: HashMap<OpId, usize>,
    failed: bool,
}

impl Library {
    /// Create an empty library
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Type by ID
    pub fn ty(&self, id: TypeId) -> &Type {
        &self.types[id.0 as usize]
    }

    /// Mutable type by ID
    pub fn ty_mut(&mut self, id: TypeId) -> &mut Type {
        &mut self.types[id.0 as usize]
    }

    /// Op by ID
    pub fn op(&self, id: OpId) -> &Op {
        &self.ops[id.0 as usize]
    }

    /// Mutable op by ID
    pub fn op_mut(&mut self, id: OpId) -> &mut Op {
        &mut self.ops[id.0 as usize]
    }

    /// Literal payload by ID
    pub fn literal(&self, id: LiteralId) -> &ConstantLiteral {
        &self.literals[id.0 as usize]
    }

    /// Block by ID
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.0 as usize]
    }

    /// Mutable block by ID
    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id.0 as usize]
    }

    /// Function by ID
    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id.0 as usize]
    }

    /// Mutable function by ID
    pub fn function_mut(&mut self, id: FunctionId) -> &mut Function {
        &mut self.functions[id.0 as usize]
    }

    /// All function IDs in creation order
    pub fn function_ids(&self) -> impl Iterator<Item = FunctionId> {
        (0..self.functions.len() as u32).map(FunctionId)
    }

    /// Name of an imported instruction set
    pub fn import_name(&self, id: ImportId) -> &str {
        &self.imports[id.0 as usize]
    }

    /// Every module-scope variable
    pub fn globals(&self) -> &[GlobalVariable] {
        &self.globals
    }

    /// The global backed by an `OpVariable` op
    pub fn global_for_op(&self, op: OpId) -> Option<&GlobalVariable> {
        self.global_index.get(&op).map(|&i| &self.globals[i])
    }

    /// Mutable access to the global backed by an op
    pub fn global_for_op_mut(&mut self, op: OpId) -> Option<&mut GlobalVariable> {
        match self.global_index.get(&op) {
            Some(&i) => Some(&mut self.globals[i]),
            None => None,
        }
    }

    /// Registered entry points
    pub fn entry_points(&self) -> &[EntryPointInfo] {
        &self.entry_points
    }

    /// Named specialization constants in declaration order
    pub fn spec_constant_decls(&self) -> &[SpecConstantDecl] {
        &self.spec_constant_decls
    }

    /// Number of ops created so far
    pub fn op_count(&self) -> usize {
        self.ops.len()
    }

    /// Number of types created so far
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Result type of an op
    pub fn type_of(&self, op: OpId) -> Option<TypeId> {
        self.op(op).result_type
    }

    /// Whether an op yields an addressable location
    pub fn is_pointer(&self, op: OpId) -> bool {
        self.type_of(op).map_or(false, |t| self.ty(t).is_pointer())
    }

    /// Whether an op is a specialization constant
    pub fn is_spec_constant(&self, op: OpId) -> bool {
        is_spec_constant(self.op(op).code)
    }

    /// Storage class of a pointer-typed op
    pub fn storage_of(&self, op: OpId) -> Option<StorageClass> {
        match self.ty(self.type_of(op)?).kind {
            TypeKind::Pointer { storage, .. } => Some(storage),
            _ => None,
        }
    }

    /// First terminator of a block, if any
    pub fn block_terminator(&self, block: BlockId) -> Option<OpId> {
        self.block(block)
            .lines
            .iter()
            .copied()
            .find(|&l| is_terminator(self.op(l).code))
    }

    // =========================================================================
    // Failure flag
    // =========================================================================

    /// Mark the translation as failed; sticky for the library's lifetime
    pub fn mark_failed(&mut self) {
        self.failed = true;
    }

    /// Whether any diagnostic was reported
    pub fn failed(&self) -> bool {
        self.failed
    }

    // =========================================================================
    // Type factories
    // =========================================================================

    /// Find an identical type or create it
    pub fn find_or_create_type(&mut self, name: &str, kind: TypeKind) -> TypeId {
        if let Some(&id) = self.type_cache.get(&kind) {
            return id;
        }
        let id = TypeId(self.types.len() as u32);
        self.types.push(Type::new(name, kind.clone()));
        self.type_cache.insert(kind, id);
        id
    }

    /// Void type
    pub fn void(&mut self) -> TypeId {
        self.find_or_create_type("Void", TypeKind::Void)
    }

    /// Bool type
    pub fn bool_type(&mut self) -> TypeId {
        self.find_or_create_type("Bool", TypeKind::Bool)
    }

    /// Signed 32-bit integer type
    pub fn int(&mut self) -> TypeId {
        self.find_or_create_type("Int", TypeKind::Int { signed: true })
    }

    /// Unsigned 32-bit integer type
    pub fn uint(&mut self) -> TypeId {
        self.find_or_create_type("UInt", TypeKind::Int { signed: false })
    }

    /// 32-bit float type
    pub fn float(&mut self) -> TypeId {
        self.find_or_create_type("Float", TypeKind::Float)
    }

    /// Vector of `count` components
    pub fn vector(&mut self, component: TypeId, count: u32) -> TypeId {
        let name = format!("{}{}", self.ty(component).name, count);
        self.find_or_create_type(&name, TypeKind::Vector { component, count })
    }

    /// Column-major matrix of `columns` column vectors
    pub fn matrix(&mut self, column: TypeId, columns: u32) -> TypeId {
        let name = format!("{}x{}", self.ty(column).name, columns);
        self.find_or_create_type(&name, TypeKind::Matrix { column, columns })
    }

    /// Sized array; also creates its length constant
    pub fn fixed_array(&mut self, element: TypeId, length: u32) -> TypeId {
        let length_op = self.int_constant(length as i32);
        let name = format!("FixedArray[{}, {}]", self.ty(element).name, length);
        self.find_or_create_type(
            &name,
            TypeKind::FixedArray {
                element,
                length: length_op,
            },
        )
    }

    /// Unsized array
    pub fn runtime_array(&mut self, element: TypeId) -> TypeId {
        let name = format!("RuntimeArray[{}]", self.ty(element).name);
        self.find_or_create_type(&name, TypeKind::RuntimeArray { element })
    }

    /// Pointer type, cached by (pointee, storage class)
    pub fn pointer(&mut self, pointee: TypeId, storage: StorageClass) -> TypeId {
        if let Some(&id) = self.pointer_cache.get(&(pointee, storage)) {
            return id;
        }
        let id = self.find_or_create_type("", TypeKind::Pointer { storage, pointee });
        self.pointer_cache.insert((pointee, storage), id);
        id
    }

    /// Function signature type
    pub fn function_type(&mut self, return_type: TypeId, params: Vec<TypeId>) -> TypeId {
        self.find_or_create_type(
            "",
            TypeKind::Function {
                return_type,
                params,
            },
        )
    }

    /// Image type sampling floats
    pub fn image(&mut self, desc: ImageDesc) -> TypeId {
        let sampled = self.float();
        let name = TypeRef::Image(desc).to_string();
        self.find_or_create_type(&name, TypeKind::Image { sampled, desc })
    }

    /// Image combined with a sampler
    pub fn sampled_image(&mut self, desc: ImageDesc) -> TypeId {
        let image = self.image(desc);
        let name = TypeRef::SampledImage(desc).to_string();
        self.find_or_create_type(&name, TypeKind::SampledImage { image })
    }

    /// Sampler type
    pub fn sampler(&mut self) -> TypeId {
        self.find_or_create_type("Sampler", TypeKind::Sampler)
    }

    /// Create a new, memberless struct type (never deduplicated)
    pub fn add_struct(&mut self, name: &str) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(Type::new(
            name,
            TypeKind::Struct {
                members: Vec::new(),
            },
        ));
        id
    }

    /// Fill in the members of a struct created by [`Library::add_struct`]
    pub fn set_struct_members(&mut self, id: TypeId, members: Vec<StructMember>) {
        self.ty_mut(id).kind = TypeKind::Struct { members };
    }

    /// Register a source-level name for a type
    pub fn register_named_type(&mut self, name: &str, id: TypeId) {
        self.named_types.insert(name.to_string(), id);
    }

    /// Type registered under a source-level name
    pub fn named_type(&self, name: &str) -> Option<TypeId> {
        self.named_types.get(name).copied()
    }

    /// Lower a source type; None for unknown names
    pub fn lower(&mut self, ty: &TypeRef) -> Option<TypeId> {
        let id = match ty {
            TypeRef::Void => self.void(),
            TypeRef::Bool => self.bool_type(),
            TypeRef::Int => self.int(),
            TypeRef::UInt => self.uint(),
            TypeRef::Float => self.float(),
            TypeRef::Vector(scalar, n) => {
                let component = self.lower(&scalar.to_type())?;
                self.vector(component, *n)
            }
            TypeRef::Matrix { rows, columns } => {
                let float = self.float();
                let column = self.vector(float, *rows);
                self.matrix(column, *columns)
            }
            TypeRef::FixedArray(element, n) => {
                let element = self.lower(element)?;
                self.fixed_array(element, *n)
            }
            TypeRef::RuntimeArray(element) => {
                let element = self.lower(element)?;
                self.runtime_array(element)
            }
            TypeRef::Image(desc) => self.image(*desc),
            TypeRef::SampledImage(desc) => self.sampled_image(*desc),
            TypeRef::Sampler => self.sampler(),
            TypeRef::Named(name) => self.named_type(name)?,
        };
        Some(id)
    }

    // =========================================================================
    // Constant factories
    // =========================================================================

    /// Literal payload, deduplicated by (type, value)
    pub fn literal_of(&mut self, ty: TypeId, value: LiteralValue) -> LiteralId {
        if let Some(&id) = self.literal_cache.get(&(ty, value)) {
            return id;
        }
        let id = LiteralId(self.literals.len() as u32);
        self.literals.push(ConstantLiteral { ty, value });
        self.literal_cache.insert((ty, value), id);
        id
    }

    /// Scalar constant op, deduplicated by (type, value)
    pub fn constant(&mut self, ty: TypeId, value: LiteralValue) -> OpId {
        if let Some(&id) = self.constant_cache.get(&(ty, value)) {
            return id;
        }
        let op = match value {
            LiteralValue::Bool(true) => Op::new(spirv::Op::ConstantTrue, Some(ty), vec![]),
            LiteralValue::Bool(false) => Op::new(spirv::Op::ConstantFalse, Some(ty), vec![]),
            _ => {
                let literal = self.literal_of(ty, value);
                Op::new(
                    spirv::Op::Constant,
                    Some(ty),
                    vec![Operand::Constant(literal)],
                )
            }
        };
        let id = self.add_op(op);
        self.constant_cache.insert((ty, value), id);
        id
    }

    /// Int constant
    pub fn int_constant(&mut self, value: i32) -> OpId {
        let ty = self.int();
        self.constant(ty, LiteralValue::Int(value))
    }

    /// UInt constant
    pub fn uint_constant(&mut self, value: u32) -> OpId {
        let ty = self.uint();
        self.constant(ty, LiteralValue::UInt(value))
    }

    /// Float constant
    pub fn float_constant(&mut self, value: f32) -> OpId {
        let ty = self.float();
        self.constant(ty, LiteralValue::float(value))
    }

    /// Bool constant
    pub fn bool_constant(&mut self, value: bool) -> OpId {
        let ty = self.bool_type();
        self.constant(ty, LiteralValue::Bool(value))
    }

    /// Composite constant, deduplicated by (type, constituents)
    pub fn composite_constant(&mut self, ty: TypeId, parts: Vec<OpId>) -> OpId {
        let key = (ty, parts);
        if let Some(&id) = self.composite_cache.get(&key) {
            return id;
        }
        let args = key.1.iter().map(|&p| Operand::Op(p)).collect();
        let id = self.add_op(Op::new(spirv::Op::ConstantComposite, Some(ty), args));
        self.composite_cache.insert(key, id);
        id
    }

    /// Scalar constant converted to the scalar kind of `ty`
    pub fn scalar_constant(&mut self, ty: TypeId, value: f32) -> Option<OpId> {
        let literal = match self.ty(ty).kind {
            TypeKind::Bool => LiteralValue::Bool(value != 0.0),
            TypeKind::Int { signed: true } => LiteralValue::Int(value as i32),
            TypeKind::Int { signed: false } => LiteralValue::UInt(value as u32),
            TypeKind::Float => LiteralValue::float(value),
            _ => return None,
        };
        Some(self.constant(ty, literal))
    }

    /// `value` in every scalar leaf of a scalar/vector/matrix/array/struct type
    pub fn splat_constant(&mut self, ty: TypeId, value: f32) -> Option<OpId> {
        let kind = self.ty(ty).kind.clone();
        match kind {
            TypeKind::Bool | TypeKind::Int { .. } | TypeKind::Float => {
                self.scalar_constant(ty, value)
            }
            TypeKind::Vector { component, count } => {
                let part = self.splat_constant(component, value)?;
                Some(self.composite_constant(ty, vec![part; count as usize]))
            }
            TypeKind::Matrix { column, columns } => {
                let part = self.splat_constant(column, value)?;
                Some(self.composite_constant(ty, vec![part; columns as usize]))
            }
            TypeKind::FixedArray { element, length } => {
                let n = self.constant_word(length)?;
                let part = self.splat_constant(element, value)?;
                Some(self.composite_constant(ty, vec![part; n as usize]))
            }
            TypeKind::Struct { members } => {
                let mut parts = Vec::with_capacity(members.len());
                for member in members {
                    parts.push(self.splat_constant(member.ty, value)?);
                }
                Some(self.composite_constant(ty, parts))
            }
            _ => None,
        }
    }

    /// Zero value of a type (None for types without constants)
    pub fn zero_constant(&mut self, ty: TypeId) -> Option<OpId> {
        self.splat_constant(ty, 0.0)
    }

    /// Literal word held by a scalar `OpConstant`
    pub fn constant_word(&self, op: OpId) -> Option<u32> {
        match self.op(op).args.first() {
            Some(Operand::Constant(lit)) => Some(self.literal(*lit).value.word()),
            _ => None,
        }
    }

    // =========================================================================
    // Specialization and enum constants
    // =========================================================================

    /// Register a keyed specialization constant
    pub fn register_spec_constant(&mut self, key: &str, op: OpId) {
        self.spec_constants.insert(key.to_string(), op);
        self.spec_constant_decls.push(SpecConstantDecl {
            name: key.to_string(),
            op,
        });
    }

    /// Specialization constant declared under `Owner.field`
    pub fn spec_constant(&self, key: &str) -> Option<OpId> {
        self.spec_constants.get(key).copied()
    }

    /// Record the constant of one enum value
    pub fn set_enum_constant(&mut self, owner: &str, name: &str, op: OpId) {
        self.enum_constants
            .insert((owner.to_string(), name.to_string()), op);
    }

    /// Constant of one enum value
    pub fn enum_constant(&self, owner: &str, name: &str) -> Option<OpId> {
        self.enum_constants
            .get(&(owner.to_string(), name.to_string()))
            .copied()
    }

    // =========================================================================
    // Ops, blocks, functions, globals
    // =========================================================================

    /// Add an op to the arena (not to any block)
    pub fn add_op(&mut self, op: Op) -> OpId {
        let id = OpId(self.ops.len() as u32);
        self.ops.push(op);
        id
    }

    /// Create a block (not yet attached to a function)
    pub fn add_block(&mut self, label: &str) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(BasicBlock::new(label));
        id
    }

    /// Add a function
    pub fn add_function(&mut self, function: Function) -> FunctionId {
        let id = FunctionId(self.functions.len() as u32);
        self.functions.push(function);
        id
    }

    /// Import an extended instruction set once
    pub fn import(&mut self, name: &str) -> ImportId {
        if let Some(i) = self.imports.iter().position(|n| n == name) {
            return ImportId(i as u32);
        }
        self.imports.push(name.to_string());
        ImportId(self.imports.len() as u32 - 1)
    }

    /// Register a module-scope variable
    pub fn add_global(&mut self, global: GlobalVariable) {
        self.global_index.insert(global.op, self.globals.len());
        self.globals.push(global);
    }

    /// Register an entry point
    pub fn add_entry_point(&mut self, entry: EntryPointInfo) {
        self.entry_points.push(entry);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pointer_types_are_cached() {
        let mut lib = Library::new();
        let float = lib.float();
        let a = lib.pointer(float, StorageClass::Function);
        let b = lib.pointer(float, StorageClass::Function);
        let c = lib.pointer(float, StorageClass::Private);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_constants_are_deduplicated() {
        let mut lib = Library::new();
        let a = lib.int_constant(3);
        let b = lib.int_constant(3);
        let c = lib.uint_constant(3);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(lib.constant_word(a), Some(3));
    }

    #[test]
    fn test_lower_vector_and_matrix() {
        let mut lib = Library::new();
        let v = lib.lower(&TypeRef::float_vec(3)).unwrap();
        assert_eq!(lib.ty(v).name, "Float3");
        let m = lib.lower(&TypeRef::Matrix { rows: 4, columns: 2 }).unwrap();
        match lib.ty(m).kind {
            TypeKind::Matrix { column, columns } => {
                assert_eq!(columns, 2);
                assert_eq!(lib.ty(column).name, "Float4");
            }
            ref other => panic!("unexpected {:?}", other),
        }
        assert!(lib.lower(&TypeRef::named("Missing")).is_none());
    }

    #[test]
    fn test_splat_constant_shares_parts() {
        let mut lib = Library::new();
        let v = lib.lower(&TypeRef::float_vec(4)).unwrap();
        let one = lib.splat_constant(v, 1.0).unwrap();
        let op = lib.op(one);
        assert_eq!(op.code, spirv::Op::ConstantComposite);
        assert_eq!(op.args.len(), 4);
        assert!(op.args.iter().all(|a| *a == op.args[0]));
    }
}
