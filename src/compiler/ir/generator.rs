//! IR Generator - transforms the type-checked AST to IR
//!
//! Translation runs in two passes over the module:
//!
//! 1. **Collection.** Every struct becomes a struct type and every enum the
//!    `Int` type, before any member is looked at, so declarations can refer
//!    to types declared later. Field, parameter and return types are then
//!    instantiated (arrays, images).
//! 2. **Translation.** Every function signature is declared first (calls may
//!    target functions declared further down), then globals and
//!    specialization constants, and finally every body is walked.
//!
//! ## Module Organization
//!
//! | Section | Search Term |
//! |---------|-------------|
//! | Pass 1 | `PASS 1` |
//! | Declarations | `DECLARATIONS` |
//! | Specialization constants | `SPECIALIZATION CONSTANTS` |
//! | Body walking | `BODIES` |
//! | Statements | `STATEMENTS` |
//! | Control flow | `CONTROL FLOW` |
//! | Expressions | `EXPRESSIONS` |
//! | Assignment | `ASSIGNMENT` |
//! | Calls | `CALLS` |
//! | Builder helpers | `BUILDER` |
//! | Finishing passes | `FINISHING` |
//!
//! Node-local failures never abort the walk: they are reported through
//! [`IrGenerator::send_translation_error`] and an `OpUndef` placeholder of the
//! expected type stands in for the missing value. Placeholders are never
//! added to a block; a library holding one is always marked failed.

use super::context::TranslationContext;
use super::instruction::{
    is_terminator, BlockId, FunctionId, ImportId, LiteralValue, Op, OpId, Operand,
};
use super::program::{BlockTag, Function, GlobalVariable, Library};
use super::types::{StructMember, TypeId, TypeKind};
use crate::compiler::entry_point;
use crate::compiler::glsl_ext::{ext_inst_operands, GLSL_STD_450};
use crate::compiler::resolvers::{
    FieldAccess, FunctionKey, ResolveArgs, ResolverRegistry, SetterAccess,
};
use crate::compiler::ShaderStage;
use crate::error::Diagnostic;
use crate::parser::{
    find_attribute, Attribute, BinaryOp, Callee, ExprKind, Expression, FieldDecl, IfPart, Literal,
    Module, Param, SourceLocation, Statement, StructDecl, TypeRef, UnaryOp,
};
use rspirv::spirv::{self, GLOp, StorageClass};
use std::collections::{HashMap, HashSet};

/// A declared user function overload
#[derive(Debug, Clone)]
pub(crate) struct Overload {
    /// Parameter types (without self)
    pub params: Vec<TypeRef>,
    /// Which parameters are passed by reference
    pub by_ref: Vec<bool>,
    /// The IR function
    pub id: FunctionId,
    /// Takes an implicit self pointer
    pub is_instance: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct StructInfo {
    pub ty: TypeId,
    pub fields: Vec<(String, TypeRef)>,
    pub pre_constructor: Option<FunctionId>,
}

#[derive(Debug, Clone, Copy)]
struct Accessor {
    id: FunctionId,
    is_instance: bool,
}

/// Body still to be walked in pass 2
#[derive(Debug, Clone, Copy)]
enum Body {
    Function { owner: usize, index: usize, id: FunctionId },
    Constructor { owner: usize, index: usize, id: FunctionId },
    Getter { owner: usize, index: usize, id: FunctionId },
    Setter { owner: usize, index: usize, id: FunctionId },
    PreConstructor { owner: usize, id: FunctionId },
    StaticInit { owner: usize, index: usize, id: FunctionId, global: OpId },
}

/// Argument of a user call
#[derive(Debug, Clone, Copy)]
pub(crate) enum CallArg {
    /// Passed as a loaded value
    Value(OpId),
    /// Passed as a pointer (self and by-reference parameters)
    Reference(OpId),
}

/// Per-struct counters for auto-assigned interface locations and bindings
#[derive(Debug, Default)]
pub(crate) struct InterfaceCounters {
    pub next_input: u32,
    pub next_output: u32,
    pub next_binding: u32,
}

/// IR Generator - transforms the type-checked AST to IR
pub struct IrGenerator<'r> {
    /// Operator/function/constructor callbacks
    registry: &'r ResolverRegistry,
    /// Everything produced so far
    library: Library,
    /// Reported problems, in order
    diagnostics: Vec<Diagnostic>,
    /// Location of the node being translated
    location: SourceLocation,
    /// Struct name -> type and layout
    structs: HashMap<String, StructInfo>,
    /// Declared enum names
    enums: HashSet<String>,
    /// (owner, name) -> overloads
    functions: HashMap<(String, String), Vec<Overload>>,
    /// owner -> constructor overloads
    constructors: HashMap<String, Vec<Overload>>,
    /// (owner, property) -> getter
    getters: HashMap<(String, String), Accessor>,
    /// (owner, property) -> setter
    setters: HashMap<(String, String), Accessor>,
    /// (owner, field) -> global variable op
    statics: HashMap<(String, String), OpId>,
    /// GLSL.std.450 import, created on first use
    glsl: Option<ImportId>,
}

impl<'r> IrGenerator<'r> {
    /// Create a generator resolving operators through `registry`
    pub fn new(registry: &'r ResolverRegistry) -> Self {
        Self {
            registry,
            library: Library::new(),
            diagnostics: Vec::new(),
            location: SourceLocation::default(),
            structs: HashMap::new(),
            enums: HashSet::new(),
            functions: HashMap::new(),
            constructors: HashMap::new(),
            getters: HashMap::new(),
            setters: HashMap::new(),
            statics: HashMap::new(),
            glsl: None,
        }
    }

    /// The library being populated
    pub fn library(&self) -> &Library {
        &self.library
    }

    /// Mutable access to the library being populated
    pub fn library_mut(&mut self) -> &mut Library {
        &mut self.library
    }

    /// Consume the generator, keeping its library
    pub fn into_library(self) -> Library {
        self.library
    }

    /// Diagnostics reported so far
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Take the reported diagnostics
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Record a node-local failure; the walk continues
    pub fn send_translation_error(
        &mut self,
        location: SourceLocation,
        short_message: impl Into<String>,
        full_message: impl Into<String>,
    ) {
        let diagnostic = Diagnostic {
            location,
            short_message: short_message.into(),
            full_message: full_message.into(),
        };
        tracing::warn!("{}", diagnostic);
        self.diagnostics.push(diagnostic);
        self.library.mark_failed();
    }

    /// Translate a whole module
    ///
    /// Returns false if any diagnostic was reported. Entry points are built
    /// afterwards by [`entry_point::build_entry_points`], then
    /// [`IrGenerator::finish`] runs the whole-program checks.
    pub fn translate(&mut self, module: &Module) -> bool {
        tracing::debug!(
            "Pass 1: collecting {} structs and {} enums",
            module.structs.len(),
            module.enums.len()
        );
        self.collect_types(module);
        if self.library.failed() {
            return false;
        }
        self.prewalk_templates(module);

        let mut bodies = self.declare_members(module);
        self.declare_globals(module, &mut bodies);
        if self.library.failed() {
            return false;
        }

        tracing::debug!("Pass 2: translating {} bodies", bodies.len());
        for body in &bodies {
            self.walk_body(module, *body);
        }
        !self.library.failed()
    }

    // =========================================================================
    // PASS 1: types
    // =========================================================================

    fn collect_types(&mut self, module: &Module) {
        for decl in &module.enums {
            if self.library.named_type(&decl.name).is_some() {
                self.send_translation_error(
                    SourceLocation::default(),
                    "Duplicate type.",
                    format!("Type '{}' is declared more than once.", decl.name),
                );
                continue;
            }
            let int = self.library.int();
            self.library.register_named_type(&decl.name, int);
            self.enums.insert(decl.name.clone());
            for value in &decl.values {
                let op = self.library.int_constant(value.value);
                self.library.set_enum_constant(&decl.name, &value.name, op);
            }
        }

        for decl in &module.structs {
            if decl.is_reference_type {
                self.send_translation_error(
                    decl.location.clone(),
                    "Class types are not supported.",
                    format!(
                        "Cannot declare class types in shaders ('{}'). Use struct instead.",
                        decl.name
                    ),
                );
            }
            if let Some(base) = &decl.base {
                self.send_translation_error(
                    decl.location.clone(),
                    "Inheritance is not supported.",
                    format!("Struct '{}' cannot inherit from '{}'.", decl.name, base),
                );
            }
            if decl.has_destructor {
                self.send_translation_error(
                    decl.location.clone(),
                    "Destructors are not supported.",
                    format!("Struct '{}' cannot declare a destructor.", decl.name),
                );
            }
            if self.library.named_type(&decl.name).is_some() {
                self.send_translation_error(
                    decl.location.clone(),
                    "Duplicate type.",
                    format!("Type '{}' is declared more than once.", decl.name),
                );
                continue;
            }
            let ty = self.library.add_struct(&decl.name);
            self.library.register_named_type(&decl.name, ty);
            self.structs.insert(
                decl.name.clone(),
                StructInfo {
                    ty,
                    fields: Vec::new(),
                    pre_constructor: None,
                },
            );
        }

        // members, now that every name resolves
        for decl in &module.structs {
            let Some(info) = self.structs.get(&decl.name) else {
                continue;
            };
            let struct_ty = info.ty;
            let mut members = Vec::new();
            let mut fields = Vec::new();
            for field in decl.fields.iter().filter(|f| !f.is_static) {
                if matches!(field.ty, TypeRef::RuntimeArray(_)) {
                    self.send_translation_error(
                        field.location.clone(),
                        "Runtime arrays must be static.",
                        format!(
                            "Field '{}.{}' is a runtime array and must be declared static.",
                            decl.name, field.name
                        ),
                    );
                    continue;
                }
                let ty = self.type_id(&field.ty, &field.location);
                members.push(StructMember {
                    name: field.name.clone(),
                    ty,
                });
                fields.push((field.name.clone(), field.ty.clone()));
            }
            self.library.set_struct_members(struct_ty, members);
            if let Some(info) = self.structs.get_mut(&decl.name) {
                info.fields = fields;
            }
        }
    }

    /// Instantiate every array/image type used by a declaration and validate
    /// runtime array contents
    fn prewalk_templates(&mut self, module: &Module) {
        for decl in &module.structs {
            for field in &decl.fields {
                self.type_id(&field.ty, &field.location);
                if let TypeRef::RuntimeArray(element) = &field.ty {
                    if matches!(
                        **element,
                        TypeRef::FixedArray(..) | TypeRef::RuntimeArray(_)
                    ) {
                        self.send_translation_error(
                            field.location.clone(),
                            "Invalid runtime array element.",
                            format!(
                                "Runtime array '{}.{}' cannot contain fixed arrays or other runtime arrays.",
                                decl.name, field.name
                            ),
                        );
                    }
                    if field.initializer.is_some() {
                        self.send_translation_error(
                            field.location.clone(),
                            "Runtime arrays cannot be initialized.",
                            format!(
                                "Runtime array '{}.{}' cannot have an initializer.",
                                decl.name, field.name
                            ),
                        );
                    }
                }
            }
            for property in &decl.properties {
                self.type_id(&property.ty, &property.location);
            }
            for function in decl.functions.iter().chain(decl.constructors.iter()) {
                self.type_id(&function.return_type, &function.location);
                for param in &function.params {
                    self.type_id(&param.ty, &function.location);
                }
            }
        }
    }

    // =========================================================================
    // DECLARATIONS
    // =========================================================================

    fn declare_members(&mut self, module: &Module) -> Vec<Body> {
        let mut bodies = Vec::new();
        for (owner, decl) in module.structs.iter().enumerate() {
            let name = decl.name.clone();

            let pre = self.declare_generated(
                &name,
                &format!("{}_PreConstructor", name),
                true,
                decl.location.clone(),
            );
            if let Some(info) = self.structs.get_mut(&name) {
                info.pre_constructor = Some(pre);
            }
            bodies.push(Body::PreConstructor { owner, id: pre });

            for (index, function) in decl.functions.iter().enumerate() {
                let id = self.declare_function(
                    &name,
                    &function.name,
                    !function.is_static,
                    &function.params,
                    &function.return_type,
                    &function.attributes,
                    &function.location,
                );
                self.functions
                    .entry((name.clone(), function.name.clone()))
                    .or_default()
                    .push(Overload {
                        params: function.params.iter().map(|p| p.ty.clone()).collect(),
                        by_ref: function.params.iter().map(|p| p.by_ref).collect(),
                        id,
                        is_instance: !function.is_static,
                    });
                bodies.push(Body::Function { owner, index, id });
            }

            for (index, ctor) in decl.constructors.iter().enumerate() {
                let id = self.declare_function(
                    &name,
                    "ctor",
                    true,
                    &ctor.params,
                    &TypeRef::Void,
                    &ctor.attributes,
                    &ctor.location,
                );
                self.constructors.entry(name.clone()).or_default().push(Overload {
                    params: ctor.params.iter().map(|p| p.ty.clone()).collect(),
                    by_ref: ctor.params.iter().map(|p| p.by_ref).collect(),
                    id,
                    is_instance: true,
                });
                bodies.push(Body::Constructor { owner, index, id });
            }

            for (index, property) in decl.properties.iter().enumerate() {
                let key = (name.clone(), property.name.clone());
                if property.getter.is_some() {
                    let id = self.declare_function(
                        &name,
                        &format!("get_{}", property.name),
                        !property.is_static,
                        &[],
                        &property.ty,
                        &property.attributes,
                        &property.location,
                    );
                    self.getters.insert(
                        key.clone(),
                        Accessor {
                            id,
                            is_instance: !property.is_static,
                        },
                    );
                    bodies.push(Body::Getter { owner, index, id });
                }
                if property.setter.is_some() {
                    let value = Param {
                        name: "value".to_string(),
                        ty: property.ty.clone(),
                        by_ref: false,
                    };
                    let id = self.declare_function(
                        &name,
                        &format!("set_{}", property.name),
                        !property.is_static,
                        &[value],
                        &TypeRef::Void,
                        &property.attributes,
                        &property.location,
                    );
                    self.setters.insert(
                        key,
                        Accessor {
                            id,
                            is_instance: !property.is_static,
                        },
                    );
                    bodies.push(Body::Setter { owner, index, id });
                }
            }
        }
        bodies
    }

    /// Declare a user function signature
    #[allow(clippy::too_many_arguments)]
    fn declare_function(
        &mut self,
        owner: &str,
        name: &str,
        is_instance: bool,
        params: &[Param],
        return_type: &TypeRef,
        attributes: &[Attribute],
        location: &SourceLocation,
    ) -> FunctionId {
        let ret = self.type_id(return_type, location);
        let mut param_types = Vec::new();
        let mut param_ops = Vec::new();
        if is_instance {
            let struct_ty = self.type_id(&TypeRef::named(owner), location);
            let ptr = self.library.pointer(struct_ty, StorageClass::Function);
            param_types.push(ptr);
            param_ops.push(self.library.add_op(
                Op::new(spirv::Op::FunctionParameter, Some(ptr), vec![]).named("self"),
            ));
        }
        for param in params {
            let mut ty = self.type_id(&param.ty, location);
            if param.by_ref {
                ty = self.library.pointer(ty, StorageClass::Function);
            }
            param_types.push(ty);
            param_ops.push(self.library.add_op(
                Op::new(spirv::Op::FunctionParameter, Some(ty), vec![]).named(param.name.clone()),
            ));
        }
        let function_type = self.library.function_type(ret, param_types);
        let required_stage = attributes
            .iter()
            .find_map(|a| ShaderStage::from_attribute(&a.name));
        self.library.add_function(Function {
            name: format!("{}.{}", owner, name),
            owner: Some(owner.to_string()),
            function_type,
            return_type: ret,
            params: param_ops,
            blocks: Vec::new(),
            attributes: attributes.to_vec(),
            is_instance,
            required_stage,
            location: location.clone(),
        })
    }

    /// Declare a compiler-generated `void` function, optionally taking self
    pub(crate) fn declare_generated(
        &mut self,
        owner: &str,
        name: &str,
        takes_self: bool,
        location: SourceLocation,
    ) -> FunctionId {
        let void = self.library.void();
        let mut params = Vec::new();
        let mut param_types = Vec::new();
        if takes_self {
            let struct_ty = self.type_id(&TypeRef::named(owner), &location);
            let ptr = self.library.pointer(struct_ty, StorageClass::Function);
            param_types.push(ptr);
            params.push(self.library.add_op(
                Op::new(spirv::Op::FunctionParameter, Some(ptr), vec![]).named("self"),
            ));
        }
        let function_type = self.library.function_type(void, param_types);
        self.library.add_function(Function {
            name: name.to_string(),
            owner: Some(owner.to_string()),
            function_type,
            return_type: void,
            params,
            blocks: Vec::new(),
            attributes: Vec::new(),
            is_instance: takes_self,
            required_stage: None,
            location,
        })
    }

    fn declare_globals(&mut self, module: &Module, bodies: &mut Vec<Body>) {
        for (owner, decl) in module.structs.iter().enumerate() {
            let mut counters = InterfaceCounters::default();
            for (index, field) in decl.fields.iter().enumerate() {
                if !field.is_static {
                    continue;
                }
                let key = format!("{}.{}", decl.name, field.name);
                if find_attribute(&field.attributes, "SpecConstant").is_some() {
                    self.create_spec_constant(
                        &key,
                        &field.ty,
                        field.initializer.as_ref(),
                        Some(&key),
                        &field.location,
                    );
                    continue;
                }
                let global = self.declare_global(decl, field, &mut counters);
                let private = self.library.storage_of(global) == Some(StorageClass::Private);
                if field.initializer.is_some() && private {
                    let id = self.declare_generated(
                        &decl.name,
                        &format!("{}_Init_{}", decl.name, field.name),
                        false,
                        field.location.clone(),
                    );
                    if let Some(g) = self.library.global_for_op_mut(global) {
                        g.initializer = Some(id);
                    }
                    bodies.push(Body::StaticInit {
                        owner,
                        index,
                        id,
                        global,
                    });
                }
            }
        }
    }

    fn declare_global(
        &mut self,
        decl: &StructDecl,
        field: &FieldDecl,
        counters: &mut InterfaceCounters,
    ) -> OpId {
        let storage = entry_point::storage_class_for(field);
        if field.initializer.is_some() && storage != StorageClass::Private {
            self.send_translation_error(
                field.location.clone(),
                "Only private globals can be initialized.",
                format!(
                    "Field '{}.{}' lives in {:?} storage and cannot have an initializer.",
                    decl.name, field.name, storage
                ),
            );
        }
        let value_ty = self.type_id(&field.ty, &field.location);
        let is_struct = matches!(self.library.ty(value_ty).kind, TypeKind::Struct { .. });
        let wrapped =
            matches!(storage, StorageClass::Uniform | StorageClass::StorageBuffer) && !is_struct;
        let var_ty = if wrapped {
            let block = self
                .library
                .add_struct(&format!("{}_{}_Block", decl.name, field.name));
            self.library.set_struct_members(
                block,
                vec![StructMember {
                    name: "value".to_string(),
                    ty: value_ty,
                }],
            );
            block
        } else {
            value_ty
        };
        let ptr = self.library.pointer(var_ty, storage);
        let op = self.library.add_op(
            Op::new(
                spirv::Op::Variable,
                Some(ptr),
                vec![Operand::Literal(storage as u32)],
            )
            .named(format!("{}.{}", decl.name, field.name)),
        );
        let decorations = entry_point::global_decorations(self, field, storage, var_ty, counters);
        self.library.add_global(GlobalVariable {
            op,
            name: field.name.clone(),
            owner: decl.name.clone(),
            storage,
            source_type: field.ty.clone(),
            wrapped,
            initializer: None,
            decorations,
        });
        self.statics
            .insert((decl.name.clone(), field.name.clone()), op);
        op
    }

    // =========================================================================
    // SPECIALIZATION CONSTANTS
    // =========================================================================

    /// Lower a specialization constant; composites recurse per component
    pub fn create_spec_constant(
        &mut self,
        name: &str,
        ty: &TypeRef,
        default: Option<&Expression>,
        key: Option<&str>,
        location: &SourceLocation,
    ) -> OpId {
        const AXES: [&str; 4] = ["X", "Y", "Z", "W"];
        let op = match ty {
            TypeRef::Bool | TypeRef::Int | TypeRef::UInt | TypeRef::Float => {
                let tid = self.type_id(ty, location);
                let value = default.and_then(literal_default).unwrap_or(0.0);
                let op = match ty {
                    TypeRef::Bool if value != 0.0 => {
                        Op::new(spirv::Op::SpecConstantTrue, Some(tid), vec![])
                    }
                    TypeRef::Bool => Op::new(spirv::Op::SpecConstantFalse, Some(tid), vec![]),
                    _ => {
                        let literal = match ty {
                            TypeRef::Int => LiteralValue::Int(value as i32),
                            TypeRef::UInt => LiteralValue::UInt(value as u32),
                            _ => LiteralValue::float(value as f32),
                        };
                        let lit = self.library.literal_of(tid, literal);
                        Op::new(
                            spirv::Op::SpecConstant,
                            Some(tid),
                            vec![Operand::Constant(lit)],
                        )
                    }
                };
                self.library.add_op(op.named(name))
            }
            TypeRef::Vector(..) | TypeRef::Matrix { .. } => {
                let tid = self.type_id(ty, location);
                let count = ty.component_count();
                let Some(component) = ty.component_type() else {
                    return self.placeholder(tid);
                };
                let mut parts = Vec::with_capacity(count as usize);
                for i in 0..count {
                    let child_default = default.and_then(|d| component_default(d, i, count));
                    let child = self.create_spec_constant(
                        &format!("{}.{}", name, AXES[i as usize % 4]),
                        &component,
                        child_default,
                        None,
                        location,
                    );
                    parts.push(Operand::Op(child));
                }
                self.library.add_op(
                    Op::new(spirv::Op::SpecConstantComposite, Some(tid), parts).named(name),
                )
            }
            TypeRef::Named(struct_name) if self.structs.contains_key(struct_name) => {
                let tid = self.type_id(ty, location);
                let fields = self
                    .structs
                    .get(struct_name)
                    .map(|info| info.fields.clone())
                    .unwrap_or_default();
                let count = fields.len() as u32;
                let mut parts = Vec::with_capacity(fields.len());
                for (i, (member, member_ty)) in fields.iter().enumerate() {
                    let child_default = default.and_then(|d| component_default(d, i as u32, count));
                    let child = self.create_spec_constant(
                        &format!("{}.{}", name, member),
                        member_ty,
                        child_default,
                        None,
                        location,
                    );
                    parts.push(Operand::Op(child));
                }
                self.library.add_op(
                    Op::new(spirv::Op::SpecConstantComposite, Some(tid), parts).named(name),
                )
            }
            _ => {
                self.send_translation_error(
                    location.clone(),
                    "Invalid specialization constant type.",
                    format!("Type '{}' is not valid as a specialization constant.", ty),
                );
                let void = self.library.void();
                return self.placeholder(void);
            }
        };
        if let Some(key) = key {
            self.library.register_spec_constant(key, op);
        }
        op
    }

    // =========================================================================
    // BODIES
    // =========================================================================

    fn walk_body(&mut self, module: &Module, body: Body) {
        match body {
            Body::Function { owner, index, id } => {
                let decl = &module.structs[owner];
                let function = &decl.functions[index];
                tracing::trace!("Translating {}.{}", decl.name, function.name);
                let mut ctx = self.begin_body(id, &decl.name, &function.params);
                self.walk_statements(&mut ctx, &function.body);
            }
            Body::Constructor { owner, index, id } => {
                let decl = &module.structs[owner];
                let ctor = &decl.constructors[index];
                let mut ctx = self.begin_body(id, &decl.name, &ctor.params);
                self.walk_statements(&mut ctx, &ctor.body);
            }
            Body::Getter { owner, index, id } => {
                let decl = &module.structs[owner];
                let property = &decl.properties[index];
                let mut ctx = self.begin_body(id, &decl.name, &[]);
                if let Some(getter) = &property.getter {
                    self.walk_statements(&mut ctx, getter);
                }
            }
            Body::Setter { owner, index, id } => {
                let decl = &module.structs[owner];
                let property = &decl.properties[index];
                let value = Param {
                    name: "value".to_string(),
                    ty: property.ty.clone(),
                    by_ref: false,
                };
                let mut ctx = self.begin_body(id, &decl.name, &[value]);
                if let Some(setter) = &property.setter {
                    self.walk_statements(&mut ctx, setter);
                }
            }
            Body::PreConstructor { owner, id } => {
                let decl = &module.structs[owner];
                let mut ctx = self.begin_body(id, &decl.name, &[]);
                self.walk_pre_constructor(&mut ctx, decl);
            }
            Body::StaticInit {
                owner,
                index,
                id,
                global,
            } => {
                let decl = &module.structs[owner];
                let field = &decl.fields[index];
                let mut ctx = self.begin_body(id, &decl.name, &[]);
                if let Some(init) = &field.initializer {
                    let value = self.value(&mut ctx, init);
                    self.emit_store(&mut ctx, global, value);
                }
            }
        }
    }

    /// Create the entry block of a function and bind its parameters
    pub(crate) fn begin_body(
        &mut self,
        id: FunctionId,
        owner: &str,
        params: &[Param],
    ) -> TranslationContext {
        let entry = self.library.add_block("entry");
        self.library.function_mut(id).blocks.push(entry);
        let function = self.library.function(id);
        let return_type = function.return_type;
        let is_instance = function.is_instance;
        let param_ops = function.params.clone();
        let returns_void = matches!(self.library.ty(return_type).kind, TypeKind::Void);

        let mut ctx = TranslationContext::new(id, entry, return_type, returns_void);
        ctx.owner = Some(owner.to_string());
        let mut ops = param_ops.into_iter();
        if is_instance {
            ctx.self_ptr = ops.next();
        }
        for (param, op) in params.iter().zip(ops) {
            if param.by_ref {
                ctx.declare_local(&param.name, op);
            } else {
                // by-value parameters are copied so the body may assign them
                let Some(ty) = self.library.type_of(op) else {
                    continue;
                };
                let local = self.add_local(&mut ctx, ty, &param.name);
                self.emit_store(&mut ctx, local, op);
                ctx.declare_local(&param.name, local);
            }
        }
        ctx
    }

    fn walk_pre_constructor(&mut self, ctx: &mut TranslationContext, decl: &StructDecl) {
        let Some(self_ptr) = ctx.self_ptr else {
            return;
        };
        let instance_fields = decl
            .fields
            .iter()
            .filter(|f| !f.is_static && !matches!(f.ty, TypeRef::RuntimeArray(_)));
        for (member, field) in instance_fields.enumerate() {
            let member_ty = self.type_id(&field.ty, &field.location);
            let index = self.library.int_constant(member as i32);
            let ptr = self.access_chain(ctx, self_ptr, &[index], member_ty);
            match &field.initializer {
                Some(init) => {
                    let value = self.value(ctx, init);
                    self.emit_store(ctx, ptr, value);
                }
                None => {
                    let nested = match &field.ty {
                        TypeRef::Named(name) => {
                            self.structs.get(name).and_then(|s| s.pre_constructor)
                        }
                        _ => None,
                    };
                    if let Some(pre) = nested {
                        self.emit_call(ctx, pre, vec![CallArg::Reference(ptr)]);
                    } else if let Some(zero) = self.library.zero_constant(member_ty) {
                        self.emit_store(ctx, ptr, zero);
                    }
                }
            }
        }
    }

    // =========================================================================
    // STATEMENTS
    // =========================================================================

    fn walk_statements(&mut self, ctx: &mut TranslationContext, statements: &[Statement]) {
        for statement in statements {
            self.walk_statement(ctx, statement);
        }
    }

    fn walk_scoped(&mut self, ctx: &mut TranslationContext, statements: &[Statement]) {
        ctx.push_scope();
        self.walk_statements(ctx, statements);
        ctx.pop_scope();
    }

    fn walk_statement(&mut self, ctx: &mut TranslationContext, statement: &Statement) {
        match statement {
            Statement::VarDecl {
                name,
                ty,
                initializer,
                location,
            } => {
                self.location = location.clone();
                let tid = self.type_id(ty, location);
                let local = self.add_local(ctx, tid, name);
                match initializer {
                    Some(init) => {
                        let value = self.value(ctx, init);
                        self.emit_store(ctx, local, value);
                    }
                    None => {
                        if let Some(pre) = self.pre_constructor_of(ty) {
                            self.emit_call(ctx, pre, vec![CallArg::Reference(local)]);
                        }
                    }
                }
                ctx.declare_local(name, local);
            }
            Statement::Expression(expr) => {
                self.walk_expr(ctx, expr);
                ctx.pop();
            }
            Statement::If { parts } => self.walk_if(ctx, parts),
            Statement::While { condition, body } => {
                self.walk_loop(ctx, Some(condition), None, body);
            }
            Statement::For {
                init,
                condition,
                step,
                body,
            } => {
                ctx.push_scope();
                if let Some(init) = init {
                    self.walk_statement(ctx, init);
                }
                self.walk_loop(ctx, condition.as_ref(), step.as_ref(), body);
                ctx.pop_scope();
            }
            Statement::Loop { body } => self.walk_loop(ctx, None, None, body),
            Statement::DoWhile { body, condition } => self.walk_do_while(ctx, body, condition),
            Statement::ForEach { location, .. } => {
                self.send_translation_error(
                    location.clone(),
                    "foreach is not supported.",
                    "foreach is not supported.",
                );
            }
            Statement::Break { location } => match ctx.innermost_loop() {
                Some(targets) => self.emit_branch(ctx, targets.merge_block),
                None => self.send_translation_error(
                    location.clone(),
                    "break outside of a loop.",
                    "'break' can only be used inside a loop.",
                ),
            },
            Statement::Continue { location } => match ctx.innermost_loop() {
                Some(targets) => self.emit_branch(ctx, targets.continue_block),
                None => self.send_translation_error(
                    location.clone(),
                    "continue outside of a loop.",
                    "'continue' can only be used inside a loop.",
                ),
            },
            Statement::Return { value, location } => match (value, ctx.returns_void) {
                (Some(expr), false) => {
                    let value = self.value(ctx, expr);
                    self.emit_void(ctx, spirv::Op::ReturnValue, vec![Operand::Op(value)]);
                }
                (None, true) => self.emit_void(ctx, spirv::Op::Return, vec![]),
                (Some(_), true) => self.send_translation_error(
                    location.clone(),
                    "Unexpected return value.",
                    "A void function cannot return a value.",
                ),
                (None, false) => self.send_translation_error(
                    location.clone(),
                    "Missing return value.",
                    "This function must return a value.",
                ),
            },
            Statement::Scope(statements) => self.walk_scoped(ctx, statements),
        }
    }

    // =========================================================================
    // CONTROL FLOW
    // =========================================================================

    /// `if` / `else if` / `else`
    ///
    /// Each conditioned part gets a selection header (the current block), a
    /// true block and a merge block. The false target of a part is the header
    /// of the next part, the `else` block, or the part's own merge block when
    /// nothing follows. Merge blocks are emitted innermost first, each one
    /// branching to the merge of the enclosing part.
    fn walk_if(&mut self, ctx: &mut TranslationContext, parts: &[IfPart]) {
        let conditioned: Vec<&IfPart> = parts
            .iter()
            .take_while(|p| p.condition.is_some())
            .collect();
        let else_part = parts.iter().find(|p| p.condition.is_none());
        if conditioned.is_empty() {
            if let Some(part) = else_part {
                self.walk_scoped(ctx, &part.body);
            }
            return;
        }

        let mut merges = Vec::with_capacity(conditioned.len());
        for (i, part) in conditioned.iter().enumerate() {
            let Some(condition) = &part.condition else {
                continue;
            };
            let cond = self.value(ctx, condition);
            let true_block = self.library.add_block("ifTrue");
            let merge = self.library.add_block("ifMerge");
            let is_last = i + 1 == conditioned.len();
            let false_block = if is_last && else_part.is_none() {
                merge
            } else {
                self.library.add_block("ifFalse")
            };

            self.tag_selection(ctx.block, merge);
            self.emit_void(
                ctx,
                spirv::Op::BranchConditional,
                vec![
                    Operand::Op(cond),
                    Operand::Block(true_block),
                    Operand::Block(false_block),
                ],
            );

            self.start_block(ctx, true_block);
            self.walk_scoped(ctx, &part.body);
            self.emit_branch(ctx, merge);
            merges.push(merge);

            if false_block != merge {
                self.start_block(ctx, false_block);
            }
        }

        if let (Some(part), Some(&last_merge)) = (else_part, merges.last()) {
            self.walk_scoped(ctx, &part.body);
            self.emit_branch(ctx, last_merge);
        }

        for i in (0..merges.len()).rev() {
            self.start_block(ctx, merges[i]);
            if i > 0 {
                self.emit_branch(ctx, merges[i - 1]);
            }
        }
    }

    /// `while`, `for` and bare `loop`: header, condition, body, continue, merge
    fn walk_loop(
        &mut self,
        ctx: &mut TranslationContext,
        condition: Option<&Expression>,
        step: Option<&Expression>,
        body: &[Statement],
    ) {
        let header = self.library.add_block("loopHeader");
        let cond_block = self.library.add_block("loopCondition");
        let body_block = self.library.add_block("loopBody");
        let continue_block = self.library.add_block("loopContinue");
        let merge = self.library.add_block("loopMerge");

        self.emit_branch(ctx, header);

        self.start_block(ctx, header);
        self.tag_loop(header, merge, continue_block);
        self.emit_branch(ctx, cond_block);

        self.start_block(ctx, cond_block);
        match condition {
            Some(condition) => {
                let cond = self.value(ctx, condition);
                self.emit_void(
                    ctx,
                    spirv::Op::BranchConditional,
                    vec![
                        Operand::Op(cond),
                        Operand::Block(body_block),
                        Operand::Block(merge),
                    ],
                );
            }
            None => self.emit_branch(ctx, body_block),
        }

        self.start_block(ctx, body_block);
        ctx.push_loop(continue_block, merge);
        self.walk_scoped(ctx, body);
        self.emit_branch(ctx, continue_block);
        ctx.pop_loop();

        self.start_block(ctx, continue_block);
        if let Some(step) = step {
            self.walk_expr(ctx, step);
            ctx.pop();
        }
        self.emit_branch(ctx, header);

        self.start_block(ctx, merge);
    }

    /// `do { } while (c)`: the condition block is the continue target
    fn walk_do_while(
        &mut self,
        ctx: &mut TranslationContext,
        body: &[Statement],
        condition: &Expression,
    ) {
        let header = self.library.add_block("loopHeader");
        let body_block = self.library.add_block("loopBody");
        let cond_block = self.library.add_block("loopCondition");
        let merge = self.library.add_block("loopMerge");

        self.emit_branch(ctx, header);

        self.start_block(ctx, header);
        self.tag_loop(header, merge, cond_block);
        self.emit_branch(ctx, body_block);

        self.start_block(ctx, body_block);
        ctx.push_loop(cond_block, merge);
        self.walk_scoped(ctx, body);
        self.emit_branch(ctx, cond_block);
        ctx.pop_loop();

        self.start_block(ctx, cond_block);
        let cond = self.value(ctx, condition);
        self.emit_void(
            ctx,
            spirv::Op::BranchConditional,
            vec![
                Operand::Op(cond),
                Operand::Block(header),
                Operand::Block(merge),
            ],
        );

        self.start_block(ctx, merge);
    }

    /// `a && b` / `a || b` through a bool temporary and a selection
    fn walk_short_circuit(
        &mut self,
        ctx: &mut TranslationContext,
        op: BinaryOp,
        lhs: &Expression,
        rhs: &Expression,
    ) -> OpId {
        let bool_ty = self.library.bool_type();
        let temp = self.add_local(ctx, bool_ty, "logical");
        let left = self.value(ctx, lhs);
        self.emit_store(ctx, temp, left);

        let rhs_block = self.library.add_block("logicalRhs");
        let merge = self.library.add_block("logicalMerge");
        let (on_true, on_false) = if op == BinaryOp::And {
            (rhs_block, merge)
        } else {
            (merge, rhs_block)
        };
        self.tag_selection(ctx.block, merge);
        self.emit_void(
            ctx,
            spirv::Op::BranchConditional,
            vec![
                Operand::Op(left),
                Operand::Block(on_true),
                Operand::Block(on_false),
            ],
        );

        self.start_block(ctx, rhs_block);
        let right = self.value(ctx, rhs);
        self.emit_store(ctx, temp, right);
        self.emit_branch(ctx, merge);

        self.start_block(ctx, merge);
        self.value_of(ctx, temp)
    }

    // =========================================================================
    // EXPRESSIONS
    // =========================================================================

    /// Walk an expression, pushing exactly one value or pointer
    pub fn walk_expr(&mut self, ctx: &mut TranslationContext, expr: &Expression) {
        self.location = expr.location.clone();
        let op = match &expr.kind {
            ExprKind::Literal(literal) => self.literal(literal),
            ExprKind::Local(name) => match ctx.lookup_local(name) {
                Some(op) => op,
                None => self.error_placeholder(
                    &expr.ty,
                    &expr.location,
                    "Unknown identifier.",
                    format!("'{}' is not declared in this scope.", name),
                ),
            },
            ExprKind::SelfRef => match ctx.self_ptr {
                Some(op) => op,
                None => self.error_placeholder(
                    &expr.ty,
                    &expr.location,
                    "No instance.",
                    "'this' can only be used inside an instance function.",
                ),
            },
            ExprKind::Member { target, name } => self.walk_member(ctx, target, name, expr),
            ExprKind::StaticMember { owner, name } => {
                self.walk_static_member(ctx, owner, name, expr)
            }
            ExprKind::Index { target, index } => self.walk_index(ctx, target, index, expr),
            ExprKind::Binary { op, lhs, rhs } => self.walk_binary(ctx, *op, lhs, rhs, expr),
            ExprKind::Unary { op, operand } => self.walk_unary(ctx, *op, operand, expr),
            ExprKind::Cast { operand } => self.walk_cast(ctx, operand, expr),
            ExprKind::Call { callee, args } => self.walk_call(ctx, callee, args, expr),
            ExprKind::Construct { args } => self.walk_construct(ctx, args, expr),
        };
        ctx.push(op);
    }

    /// Walk an expression and pop its result
    fn expr(&mut self, ctx: &mut TranslationContext, expr: &Expression) -> OpId {
        self.walk_expr(ctx, expr);
        match ctx.pop() {
            Some(op) => op,
            None => {
                let ty = self.type_id(&expr.ty, &expr.location);
                self.placeholder(ty)
            }
        }
    }

    /// Walk an expression and load its result if it is a pointer
    fn value(&mut self, ctx: &mut TranslationContext, expr: &Expression) -> OpId {
        let op = self.expr(ctx, expr);
        self.value_of(ctx, op)
    }

    fn literal(&mut self, literal: &Literal) -> OpId {
        match *literal {
            Literal::Bool(b) => self.library.bool_constant(b),
            Literal::Int(i) => self.library.int_constant(i),
            Literal::UInt(u) => self.library.uint_constant(u),
            Literal::Float(f) => self.library.float_constant(f),
        }
    }

    fn walk_member(
        &mut self,
        ctx: &mut TranslationContext,
        target: &Expression,
        name: &str,
        expr: &Expression,
    ) -> OpId {
        let object = self.member_object(ctx, target, name);
        self.read_member(ctx, object, target, name, expr)
    }

    /// Evaluate the object of a member access once; `None` when the member
    /// is a property whose accessors take no instance
    fn member_object(
        &mut self,
        ctx: &mut TranslationContext,
        target: &Expression,
        name: &str,
    ) -> Option<OpId> {
        if let TypeRef::Named(owner) = &target.ty {
            let key = (owner.clone(), name.to_string());
            let getter = self.getters.get(&key).copied();
            let setter = self.setters.get(&key).copied();
            let is_property = getter.is_some() || setter.is_some();
            let takes_instance = getter.into_iter().chain(setter).any(|a| a.is_instance);
            if is_property && !takes_instance {
                return None;
            }
        }
        Some(self.expr(ctx, target))
    }

    /// Read `name` from an already evaluated object
    fn read_member(
        &mut self,
        ctx: &mut TranslationContext,
        object: Option<OpId>,
        target: &Expression,
        name: &str,
        expr: &Expression,
    ) -> OpId {
        let registry = self.registry;
        if let TypeRef::Named(owner) = &target.ty {
            let key = (owner.clone(), name.to_string());
            if let Some(getter) = self.getters.get(&key).copied() {
                let mut args = Vec::new();
                if let (true, Some(object)) = (getter.is_instance, object) {
                    args.push(CallArg::Reference(object));
                }
                return self.emit_call(ctx, getter.id, args);
            }
        }

        let Some(object) = object else {
            return self.error_placeholder(
                &expr.ty,
                &expr.location,
                "Unknown member.",
                format!("Property '{}.{}' has no getter.", target.ty, name),
            );
        };

        let lookup = self.registry_type(&target.ty);
        if let Some(resolve) = registry.field(&lookup, name) {
            return resolve(
                self,
                ctx,
                &FieldAccess {
                    target: object,
                    target_type: &lookup,
                    name,
                    result: &expr.ty,
                    location: &expr.location,
                },
            );
        }

        // struct member by index
        if let TypeRef::Named(owner) = &target.ty {
            let index = self
                .structs
                .get(owner)
                .and_then(|s| s.fields.iter().position(|(f, _)| f == name));
            if let Some(index) = index {
                let member_ty = self.type_id(&expr.ty, &expr.location);
                if self.library.is_pointer(object) {
                    let index = self.library.int_constant(index as i32);
                    return self.access_chain(ctx, object, &[index], member_ty);
                }
                return self.emit(
                    ctx,
                    spirv::Op::CompositeExtract,
                    Some(member_ty),
                    vec![Operand::Op(object), Operand::Literal(index as u32)],
                );
            }
        }

        self.error_placeholder(
            &expr.ty,
            &expr.location,
            "Unknown member.",
            format!("Type '{}' has no member '{}'.", target.ty, name),
        )
    }

    fn walk_static_member(
        &mut self,
        ctx: &mut TranslationContext,
        owner: &str,
        name: &str,
        expr: &Expression,
    ) -> OpId {
        if let Some(op) = self.library.enum_constant(owner, name) {
            return op;
        }
        if let Some(op) = self.library.spec_constant(&format!("{}.{}", owner, name)) {
            return op;
        }
        let key = (owner.to_string(), name.to_string());
        if let Some(&global) = self.statics.get(&key) {
            let wrapped = self
                .library
                .global_for_op(global)
                .map_or(false, |g| g.wrapped);
            if wrapped {
                let value_ty = self.type_id(&expr.ty, &expr.location);
                let zero = self.library.int_constant(0);
                return self.access_chain(ctx, global, &[zero], value_ty);
            }
            return global;
        }
        if let Some(getter) = self.getters.get(&key).copied() {
            if !getter.is_instance {
                return self.emit_call(ctx, getter.id, vec![]);
            }
        }
        self.error_placeholder(
            &expr.ty,
            &expr.location,
            "Unknown static member.",
            format!("Type '{}' has no static member '{}'.", owner, name),
        )
    }

    fn walk_index(
        &mut self,
        ctx: &mut TranslationContext,
        target: &Expression,
        index: &Expression,
        expr: &Expression,
    ) -> OpId {
        let base = self.expr(ctx, target);
        let index = self.value(ctx, index);
        let element = self.type_id(&expr.ty, &expr.location);
        if self.library.is_pointer(base) {
            return self.access_chain(ctx, base, &[index], element);
        }
        if matches!(target.ty, TypeRef::Vector(..)) {
            return self.emit(
                ctx,
                spirv::Op::VectorExtractDynamic,
                Some(element),
                vec![Operand::Op(base), Operand::Op(index)],
            );
        }
        // dynamic indexing of array/matrix values goes through memory
        let ptr = self.pointer_of(ctx, base);
        self.access_chain(ctx, ptr, &[index], element)
    }

    fn walk_binary(
        &mut self,
        ctx: &mut TranslationContext,
        op: BinaryOp,
        lhs: &Expression,
        rhs: &Expression,
        expr: &Expression,
    ) -> OpId {
        if op == BinaryOp::Assign {
            return self.walk_assign(ctx, lhs, rhs, &expr.location);
        }
        if let Some(base) = op.compound_base() {
            return self.walk_compound(ctx, base, lhs, rhs, &expr.location);
        }
        if matches!(op, BinaryOp::And | BinaryOp::Or) {
            return self.walk_short_circuit(ctx, op, lhs, rhs);
        }
        let left = self.value(ctx, lhs);
        let right = self.value(ctx, rhs);
        self.resolve_binary(ctx, op, (left, &lhs.ty), (right, &rhs.ty), &expr.ty, &expr.location)
    }

    fn resolve_binary(
        &mut self,
        ctx: &mut TranslationContext,
        op: BinaryOp,
        (left, left_ty): (OpId, &TypeRef),
        (right, right_ty): (OpId, &TypeRef),
        result: &TypeRef,
        location: &SourceLocation,
    ) -> OpId {
        let registry = self.registry;
        let lhs_ty = self.registry_type(left_ty);
        let rhs_ty = self.registry_type(right_ty);
        let result_ty = self.registry_type(result);
        match registry.binary(&lhs_ty, op, &rhs_ty) {
            Some(resolve) => {
                let arg_types = [lhs_ty.clone(), rhs_ty.clone()];
                resolve(
                    self,
                    ctx,
                    &ResolveArgs {
                        args: &[left, right],
                        arg_types: &arg_types,
                        result: &result_ty,
                        location,
                    },
                )
            }
            None => self.error_placeholder(
                result,
                location,
                "Unsupported operator.",
                format!(
                    "No operator '{}' defined for '{}' and '{}'.",
                    op, left_ty, right_ty
                ),
            ),
        }
    }

    fn walk_unary(
        &mut self,
        ctx: &mut TranslationContext,
        op: UnaryOp,
        operand: &Expression,
        expr: &Expression,
    ) -> OpId {
        if matches!(op, UnaryOp::PreIncrement | UnaryOp::PreDecrement) {
            let target = self.expr(ctx, operand);
            let current = self.value_of(ctx, target);
            let Some(ty) = self.library.type_of(current) else {
                return self.error_placeholder(
                    &expr.ty,
                    &expr.location,
                    "Invalid operand.",
                    "Increment and decrement need a numeric operand.",
                );
            };
            let Some(one) = self.library.splat_constant(ty, 1.0) else {
                return self.error_placeholder(
                    &expr.ty,
                    &expr.location,
                    "Invalid operand.",
                    format!("Cannot increment or decrement '{}'.", operand.ty),
                );
            };
            let base = if op == UnaryOp::PreIncrement {
                BinaryOp::Add
            } else {
                BinaryOp::Sub
            };
            let result = self.resolve_binary(
                ctx,
                base,
                (current, &operand.ty),
                (one, &operand.ty),
                &operand.ty,
                &expr.location,
            );
            if self.library.is_pointer(target) {
                self.store_to_lvalue(ctx, target, result, &expr.location);
            }
            return result;
        }

        let registry = self.registry;
        let value = self.value(ctx, operand);
        let operand_ty = self.registry_type(&operand.ty);
        match registry.unary(op, &operand_ty) {
            Some(resolve) => {
                let arg_types = [operand_ty.clone()];
                let result_ty = self.registry_type(&expr.ty);
                resolve(
                    self,
                    ctx,
                    &ResolveArgs {
                        args: &[value],
                        arg_types: &arg_types,
                        result: &result_ty,
                        location: &expr.location,
                    },
                )
            }
            None => self.error_placeholder(
                &expr.ty,
                &expr.location,
                "Unsupported operator.",
                format!("No operator '{}' defined for '{}'.", op, operand.ty),
            ),
        }
    }

    fn walk_cast(
        &mut self,
        ctx: &mut TranslationContext,
        operand: &Expression,
        expr: &Expression,
    ) -> OpId {
        let registry = self.registry;
        let value = self.value(ctx, operand);
        let from = self.registry_type(&operand.ty);
        let to = self.registry_type(&expr.ty);
        if from == to {
            return value;
        }
        match registry.cast(&from, &to) {
            Some(resolve) => resolve(
                self,
                ctx,
                &ResolveArgs {
                    args: &[value],
                    arg_types: std::slice::from_ref(&from),
                    result: &to,
                    location: &expr.location,
                },
            ),
            None => self.error_placeholder(
                &expr.ty,
                &expr.location,
                "Invalid conversion.",
                format!("Cannot convert '{}' to '{}'.", operand.ty, expr.ty),
            ),
        }
    }

    fn walk_construct(
        &mut self,
        ctx: &mut TranslationContext,
        args: &[Expression],
        expr: &Expression,
    ) -> OpId {
        let arg_types: Vec<TypeRef> = args.iter().map(|a| a.ty.clone()).collect();
        if let TypeRef::Named(owner) = &expr.ty {
            if let Some(info) = self.structs.get(owner).cloned() {
                let temp = self.add_local(ctx, info.ty, "construct");
                if let Some(pre) = info.pre_constructor {
                    self.emit_call(ctx, pre, vec![CallArg::Reference(temp)]);
                }
                let ctor = self
                    .constructors
                    .get(owner)
                    .and_then(|list| list.iter().find(|o| o.params == arg_types))
                    .cloned();
                match ctor {
                    Some(ctor) => {
                        self.call_user(ctx, &ctor, Some(temp), args);
                    }
                    None if args.is_empty() => {}
                    None => {
                        let void = self.library.void();
                        self.send_translation_error(
                            expr.location.clone(),
                            "No matching constructor.",
                            format!(
                                "No constructor for '{}' takes ({}).",
                                owner,
                                type_list(&arg_types)
                            ),
                        );
                        return self.placeholder(void);
                    }
                }
                ctx.mark_temporary(temp);
                return temp;
            }
        }

        let registry = self.registry;
        let target = self.registry_type(&expr.ty);
        let lookup: Vec<TypeRef> = arg_types.iter().map(|t| self.registry_type(t)).collect();
        match registry.constructor(&target, &lookup) {
            Some(resolve) => {
                let values: Vec<OpId> = args.iter().map(|a| self.value(ctx, a)).collect();
                resolve(
                    self,
                    ctx,
                    &ResolveArgs {
                        args: &values,
                        arg_types: &lookup,
                        result: &target,
                        location: &expr.location,
                    },
                )
            }
            None => self.error_placeholder(
                &expr.ty,
                &expr.location,
                "No matching constructor.",
                format!(
                    "No constructor for '{}' takes ({}).",
                    expr.ty,
                    type_list(&arg_types)
                ),
            ),
        }
    }

    // =========================================================================
    // ASSIGNMENT
    // =========================================================================

    fn walk_assign(
        &mut self,
        ctx: &mut TranslationContext,
        lhs: &Expression,
        rhs: &Expression,
        location: &SourceLocation,
    ) -> OpId {
        let value = self.value(ctx, rhs);
        match &lhs.kind {
            ExprKind::Member { target, name } if self.has_member_setter(target, name) => {
                let object = self.member_object(ctx, target, name);
                self.write_member(ctx, object, target, name, value, location);
            }
            ExprKind::StaticMember { owner, name } if self.static_setter(owner, name).is_some() => {
                self.write_static(owner, name, ctx, value);
            }
            _ => {
                let target = self.expr(ctx, lhs);
                self.store_to_lvalue(ctx, target, value, location);
            }
        }
        value
    }

    fn walk_compound(
        &mut self,
        ctx: &mut TranslationContext,
        base: BinaryOp,
        lhs: &Expression,
        rhs: &Expression,
        location: &SourceLocation,
    ) -> OpId {
        // the target is evaluated exactly once; the read and the write share it
        let write = match &lhs.kind {
            ExprKind::Member { target, name } if self.has_member_setter(target, name) => {
                let object = self.member_object(ctx, target, name);
                let current = self.read_member(ctx, object, target, name, lhs);
                Some((current, object))
            }
            _ => None,
        };
        let target = match write {
            Some((current, _)) => current,
            None => self.expr(ctx, lhs),
        };
        let current = self.value_of(ctx, target);
        let operand = self.value(ctx, rhs);
        let result = self.resolve_binary(
            ctx,
            base,
            (current, &lhs.ty),
            (operand, &rhs.ty),
            &lhs.ty,
            location,
        );
        match (&lhs.kind, write) {
            (ExprKind::Member { target, name }, Some((_, object))) => {
                self.write_member(ctx, object, target, name, result, location);
            }
            (ExprKind::StaticMember { owner, name }, _)
                if self.static_setter(owner, name).is_some() =>
            {
                self.write_static(owner, name, ctx, result);
            }
            _ => self.store_to_lvalue(ctx, target, result, location),
        }
        result
    }

    /// Whether a member write goes through a property setter or a setter resolver
    fn has_member_setter(&self, target: &Expression, name: &str) -> bool {
        if let TypeRef::Named(owner) = &target.ty {
            if self.setters.contains_key(&(owner.clone(), name.to_string())) {
                return true;
            }
        }
        let lookup = self.registry_type(&target.ty);
        self.registry.setter(&lookup, name).is_some()
    }

    fn static_setter(&self, owner: &str, name: &str) -> Option<Accessor> {
        self.setters
            .get(&(owner.to_string(), name.to_string()))
            .copied()
            .filter(|s| !s.is_instance)
    }

    fn write_static(
        &mut self,
        owner: &str,
        name: &str,
        ctx: &mut TranslationContext,
        value: OpId,
    ) {
        if let Some(setter) = self.static_setter(owner, name) {
            self.emit_call(ctx, setter.id, vec![CallArg::Value(value)]);
        }
    }

    /// Write `name` on an already evaluated object through its setter
    fn write_member(
        &mut self,
        ctx: &mut TranslationContext,
        object: Option<OpId>,
        target: &Expression,
        name: &str,
        value: OpId,
        location: &SourceLocation,
    ) {
        let registry = self.registry;
        if let TypeRef::Named(owner) = &target.ty {
            let key = (owner.clone(), name.to_string());
            if let Some(setter) = self.setters.get(&key).copied() {
                let mut args = Vec::new();
                if let (true, Some(object)) = (setter.is_instance, object) {
                    args.push(CallArg::Reference(object));
                }
                args.push(CallArg::Value(value));
                self.emit_call(ctx, setter.id, args);
                return;
            }
        }
        let lookup = self.registry_type(&target.ty);
        let (Some(resolve), Some(object)) = (registry.setter(&lookup, name), object) else {
            return;
        };
        if self.check_writable(ctx, object, location) {
            resolve(
                self,
                ctx,
                &SetterAccess {
                    target: object,
                    target_type: &lookup,
                    name,
                    value,
                    location,
                },
            );
        }
    }

    /// Store into an lvalue after validating it
    fn store_to_lvalue(
        &mut self,
        ctx: &mut TranslationContext,
        target: OpId,
        value: OpId,
        location: &SourceLocation,
    ) {
        if self.check_writable(ctx, target, location) {
            self.emit_store(ctx, target, value);
        }
    }

    fn check_writable(
        &mut self,
        ctx: &TranslationContext,
        target: OpId,
        location: &SourceLocation,
    ) -> bool {
        if self.library.is_spec_constant(target) {
            self.send_translation_error(
                location.clone(),
                "Cannot write to a specialization constant.",
                "Specialization constants are read-only.",
            );
            return false;
        }
        if !self.library.is_pointer(target) {
            self.send_translation_error(
                location.clone(),
                "Value is not addressable.",
                "The left-hand side of an assignment must be a variable, field or element.",
            );
            return false;
        }
        if ctx.is_temporary(target) {
            self.send_translation_error(
                location.clone(),
                "Cannot assign to a temporary.",
                "The left-hand side of an assignment refers to a temporary value.",
            );
            return false;
        }
        if let Some(
            storage @ (StorageClass::Input | StorageClass::Uniform | StorageClass::UniformConstant),
        ) = self.library.storage_of(target)
        {
            self.send_translation_error(
                location.clone(),
                "Cannot write to read-only storage.",
                format!("Variables in {:?} storage are read-only.", storage),
            );
            return false;
        }
        true
    }

    // =========================================================================
    // CALLS
    // =========================================================================

    fn walk_call(
        &mut self,
        ctx: &mut TranslationContext,
        callee: &Callee,
        args: &[Expression],
        expr: &Expression,
    ) -> OpId {
        let registry = self.registry;
        let arg_types: Vec<TypeRef> = args.iter().map(|a| a.ty.clone()).collect();
        match callee {
            Callee::Static { owner, name } => {
                if let Some(overload) = self.find_overload(owner, name, &arg_types) {
                    let self_arg = if overload.is_instance {
                        match (ctx.owner.as_deref(), ctx.self_ptr) {
                            (Some(current), Some(ptr)) if current == owner => Some(ptr),
                            _ => {
                                return self.error_placeholder(
                                    &expr.ty,
                                    &expr.location,
                                    "No instance.",
                                    format!(
                                        "Instance function '{}.{}' needs an instance.",
                                        owner, name
                                    ),
                                );
                            }
                        }
                    } else {
                        None
                    };
                    return self.call_user(ctx, &overload, self_arg, args);
                }
                let params: Vec<TypeRef> = arg_types.iter().map(|t| self.registry_type(t)).collect();
                let key = FunctionKey::new(owner.clone(), name.clone(), params);
                if let Some(resolve) = registry.function(&key) {
                    let values: Vec<OpId> = args.iter().map(|a| self.value(ctx, a)).collect();
                    let result = self.registry_type(&expr.ty);
                    return resolve(
                        self,
                        ctx,
                        &ResolveArgs {
                            args: &values,
                            arg_types: &key.params,
                            result: &result,
                            location: &expr.location,
                        },
                    );
                }
                self.error_placeholder(
                    &expr.ty,
                    &expr.location,
                    "Unknown function.",
                    format!(
                        "No function '{}.{}({})' found.",
                        owner,
                        name,
                        type_list(&arg_types)
                    ),
                )
            }
            Callee::Method { target, name } => {
                if let TypeRef::Named(owner) = &target.ty {
                    if let Some(overload) = self.find_overload(owner, name, &arg_types) {
                        if overload.is_instance {
                            let object = self.expr(ctx, target);
                            return self.call_user(ctx, &overload, Some(object), args);
                        }
                    }
                }
                let receiver = self.registry_type(&target.ty);
                let mut params = vec![receiver.clone()];
                params.extend(arg_types.iter().map(|t| self.registry_type(t)));
                let key = FunctionKey::new(receiver.to_string(), name.clone(), params);
                if let Some(resolve) = registry.function(&key) {
                    let mut values = vec![self.value(ctx, target)];
                    for arg in args {
                        values.push(self.value(ctx, arg));
                    }
                    let result = self.registry_type(&expr.ty);
                    return resolve(
                        self,
                        ctx,
                        &ResolveArgs {
                            args: &values,
                            arg_types: &key.params,
                            result: &result,
                            location: &expr.location,
                        },
                    );
                }
                self.error_placeholder(
                    &expr.ty,
                    &expr.location,
                    "Unknown function.",
                    format!(
                        "Type '{}' has no function '{}({})'.",
                        target.ty,
                        name,
                        type_list(&arg_types)
                    ),
                )
            }
        }
    }

    pub(crate) fn struct_info(&self, name: &str) -> Option<&StructInfo> {
        self.structs.get(name)
    }

    pub(crate) fn find_overload(
        &self,
        owner: &str,
        name: &str,
        arg_types: &[TypeRef],
    ) -> Option<Overload> {
        self.functions
            .get(&(owner.to_string(), name.to_string()))?
            .iter()
            .find(|o| o.params == arg_types)
            .cloned()
    }

    fn call_user(
        &mut self,
        ctx: &mut TranslationContext,
        overload: &Overload,
        self_arg: Option<OpId>,
        args: &[Expression],
    ) -> OpId {
        let mut call_args = Vec::with_capacity(args.len() + 1);
        if let Some(object) = self_arg {
            call_args.push(CallArg::Reference(object));
        }
        for (arg, &by_ref) in args.iter().zip(&overload.by_ref) {
            let op = self.expr(ctx, arg);
            call_args.push(if by_ref {
                CallArg::Reference(op)
            } else {
                CallArg::Value(op)
            });
        }
        self.emit_call(ctx, overload.id, call_args)
    }

    /// Emit `OpFunctionCall`; pointers that are not function-local variables
    /// are copied in and written back afterwards
    pub(crate) fn emit_call(
        &mut self,
        ctx: &mut TranslationContext,
        function: FunctionId,
        args: Vec<CallArg>,
    ) -> OpId {
        let mut operands = vec![Operand::Function(function)];
        let mut writebacks = Vec::new();
        for arg in args {
            match arg {
                CallArg::Value(op) => {
                    let value = self.value_of(ctx, op);
                    operands.push(Operand::Op(value));
                }
                CallArg::Reference(op) => {
                    let (ptr, writeback) = self.reference_arg(ctx, op);
                    operands.push(Operand::Op(ptr));
                    writebacks.extend(writeback);
                }
            }
        }
        let ret = self.library.function(function).return_type;
        let result = self.emit(ctx, spirv::Op::FunctionCall, Some(ret), operands);
        for (temp, original) in writebacks {
            let value = self.value_of(ctx, temp);
            self.emit_store(ctx, original, value);
        }
        result
    }

    fn reference_arg(
        &mut self,
        ctx: &mut TranslationContext,
        op: OpId,
    ) -> (OpId, Option<(OpId, OpId)>) {
        if !self.library.is_pointer(op) {
            return (self.pointer_of(ctx, op), None);
        }
        let storage = self.library.storage_of(op);
        let is_local_variable = self.library.op(op).code == spirv::Op::Variable
            && storage == Some(StorageClass::Function);
        if is_local_variable {
            return (op, None);
        }
        let pointee = self
            .library
            .type_of(op)
            .and_then(|t| self.library.ty(t).pointee());
        let Some(pointee) = pointee else {
            return (op, None);
        };
        let temp = self.add_local(ctx, pointee, "argument");
        let value = self.value_of(ctx, op);
        self.emit_store(ctx, temp, value);
        let writable = matches!(
            storage,
            Some(
                StorageClass::Function
                    | StorageClass::Private
                    | StorageClass::Output
                    | StorageClass::StorageBuffer
                    | StorageClass::Workgroup
            )
        ) && !ctx.is_temporary(op);
        (temp, writable.then_some((temp, op)))
    }

    // =========================================================================
    // BUILDER
    // =========================================================================

    /// Lower a source type, reporting unknown names
    pub fn type_id(&mut self, ty: &TypeRef, location: &SourceLocation) -> TypeId {
        match self.library.lower(ty) {
            Some(id) => id,
            None => {
                self.send_translation_error(
                    location.clone(),
                    "Unknown type.",
                    format!("Type '{}' is not declared.", ty),
                );
                self.library.void()
            }
        }
    }

    /// Enum types resolve operators as `Int`
    fn registry_type(&self, ty: &TypeRef) -> TypeRef {
        match ty {
            TypeRef::Named(name) if self.enums.contains(name) => TypeRef::Int,
            other => other.clone(),
        }
    }

    fn pre_constructor_of(&self, ty: &TypeRef) -> Option<FunctionId> {
        match ty {
            TypeRef::Named(name) => self.structs.get(name).and_then(|s| s.pre_constructor),
            _ => None,
        }
    }

    /// Append an op with a result to the insertion block
    pub fn emit(
        &mut self,
        ctx: &mut TranslationContext,
        code: spirv::Op,
        result_type: Option<TypeId>,
        args: Vec<Operand>,
    ) -> OpId {
        let mut op = Op::new(code, result_type, args);
        op.location = Some(self.location.clone());
        let id = self.library.add_op(op);
        self.library.block_mut(ctx.block).lines.push(id);
        id
    }

    /// Append an op without a result
    pub fn emit_void(&mut self, ctx: &mut TranslationContext, code: spirv::Op, args: Vec<Operand>) {
        self.emit(ctx, code, None, args);
    }

    /// `OpStore`
    pub fn emit_store(&mut self, ctx: &mut TranslationContext, ptr: OpId, value: OpId) {
        self.emit_void(
            ctx,
            spirv::Op::Store,
            vec![Operand::Op(ptr), Operand::Op(value)],
        );
    }

    /// `OpBranch`
    pub fn emit_branch(&mut self, ctx: &mut TranslationContext, target: BlockId) {
        self.emit_void(ctx, spirv::Op::Branch, vec![Operand::Block(target)]);
    }

    /// `OpExtInst` from GLSL.std.450
    pub fn ext_inst(
        &mut self,
        ctx: &mut TranslationContext,
        result: TypeId,
        op: GLOp,
        args: &[OpId],
    ) -> OpId {
        let set = self.glsl_import();
        self.emit(
            ctx,
            spirv::Op::ExtInst,
            Some(result),
            ext_inst_operands(set, op, args),
        )
    }

    /// GLSL.std.450 import
    pub fn glsl_import(&mut self) -> ImportId {
        match self.glsl {
            Some(id) => id,
            None => {
                let id = self.library.import(GLSL_STD_450);
                self.glsl = Some(id);
                id
            }
        }
    }

    /// Declare a function-local variable in the entry block
    pub fn add_local(&mut self, ctx: &mut TranslationContext, pointee: TypeId, name: &str) -> OpId {
        let ptr = self.library.pointer(pointee, StorageClass::Function);
        let op = self.library.add_op(
            Op::new(
                spirv::Op::Variable,
                Some(ptr),
                vec![Operand::Literal(StorageClass::Function as u32)],
            )
            .named(name),
        );
        self.library.block_mut(ctx.entry_block).locals.push(op);
        op
    }

    /// Load a pointer; values pass through
    pub fn value_of(&mut self, ctx: &mut TranslationContext, op: OpId) -> OpId {
        let pointee = self
            .library
            .type_of(op)
            .and_then(|t| self.library.ty(t).pointee());
        match pointee {
            Some(pointee) => self.emit(ctx, spirv::Op::Load, Some(pointee), vec![Operand::Op(op)]),
            None => op,
        }
    }

    /// Store a value into a fresh temporary; pointers pass through
    pub fn pointer_of(&mut self, ctx: &mut TranslationContext, op: OpId) -> OpId {
        if self.library.is_pointer(op) {
            return op;
        }
        let Some(ty) = self.library.type_of(op) else {
            return op;
        };
        let temp = self.add_local(ctx, ty, "temp");
        self.emit_store(ctx, temp, op);
        ctx.mark_temporary(temp);
        temp
    }

    /// `OpAccessChain` keeping the storage class of `base`
    pub fn access_chain(
        &mut self,
        ctx: &mut TranslationContext,
        base: OpId,
        indices: &[OpId],
        pointee: TypeId,
    ) -> OpId {
        let storage = self
            .library
            .storage_of(base)
            .unwrap_or(StorageClass::Function);
        let ptr = self.library.pointer(pointee, storage);
        let mut args = vec![Operand::Op(base)];
        args.extend(indices.iter().map(|&i| Operand::Op(i)));
        let chain = self.emit(ctx, spirv::Op::AccessChain, Some(ptr), args);
        if ctx.is_temporary(base) {
            ctx.mark_temporary(chain);
        }
        chain
    }

    /// Vector or matrix whose every component is `scalar`
    pub fn splat(&mut self, ctx: &mut TranslationContext, scalar: OpId, ty: TypeId) -> OpId {
        let count = match self.library.ty(ty).kind {
            TypeKind::Vector { count, .. } => count,
            TypeKind::Matrix { columns, .. } => columns,
            _ => return scalar,
        };
        let parts = vec![Operand::Op(scalar); count as usize];
        self.emit(ctx, spirv::Op::CompositeConstruct, Some(ty), parts)
    }

    /// `OpUndef` stand-in that is never added to a block
    pub fn placeholder(&mut self, ty: TypeId) -> OpId {
        self.library
            .add_op(Op::new(spirv::Op::Undef, Some(ty), vec![]))
    }

    /// Result of a call that produces nothing
    pub fn void_value(&mut self) -> OpId {
        let void = self.library.void();
        self.placeholder(void)
    }

    fn error_placeholder(
        &mut self,
        ty: &TypeRef,
        location: &SourceLocation,
        short_message: &str,
        full_message: impl Into<String>,
    ) -> OpId {
        self.send_translation_error(location.clone(), short_message, full_message);
        let ty = self.library.lower(ty).unwrap_or_else(|| self.library.void());
        self.placeholder(ty)
    }

    /// Restrict the current function to one stage
    pub fn require_stage(
        &mut self,
        ctx: &TranslationContext,
        stage: ShaderStage,
        location: &SourceLocation,
    ) {
        let function = self.library.function_mut(ctx.function);
        match function.required_stage {
            None => function.required_stage = Some(stage),
            Some(existing) if existing == stage => {}
            Some(existing) => {
                let name = function.name.clone();
                self.send_translation_error(
                    location.clone(),
                    "Conflicting stage requirements.",
                    format!(
                        "Function '{}' uses features of both the {} and {} stages.",
                        name, existing, stage
                    ),
                );
            }
        }
    }

    /// Make `block` the insertion point and append it to the function
    pub(crate) fn start_block(&mut self, ctx: &mut TranslationContext, block: BlockId) {
        self.library.function_mut(ctx.function).blocks.push(block);
        ctx.block = block;
    }

    fn tag_selection(&mut self, block: BlockId, merge: BlockId) {
        let b = self.library.block_mut(block);
        b.tag = BlockTag::Selection;
        b.merge = Some(merge);
    }

    fn tag_loop(&mut self, block: BlockId, merge: BlockId, continue_target: BlockId) {
        let b = self.library.block_mut(block);
        b.tag = BlockTag::Loop;
        b.merge = Some(merge);
        b.continue_target = Some(continue_target);
    }

    // =========================================================================
    // FINISHING
    // =========================================================================

    /// Whole-program passes run after entry points are built
    pub fn finish(&mut self) {
        self.fix_block_terminators();
        self.detect_recursion();
        self.check_stage_requirements();
    }

    /// Exactly one terminator per block: drop everything after the first,
    /// synthesize one where none was written
    pub fn fix_block_terminators(&mut self) {
        let ids: Vec<FunctionId> = self.library.function_ids().collect();
        for id in ids {
            let function = self.library.function(id);
            let blocks = function.blocks.clone();
            let returns_void =
                matches!(self.library.ty(function.return_type).kind, TypeKind::Void);
            for block in blocks {
                let lines = &self.library.block(block).lines;
                let first = lines
                    .iter()
                    .position(|&l| is_terminator(self.library.op(l).code));
                match first {
                    Some(i) if i + 1 == lines.len() => {}
                    Some(i) => self.library.block_mut(block).lines.truncate(i + 1),
                    None => {
                        let code = if returns_void {
                            spirv::Op::Return
                        } else {
                            spirv::Op::Unreachable
                        };
                        let op = self.library.add_op(Op::new(code, None, vec![]));
                        self.library.block_mut(block).lines.push(op);
                    }
                }
            }
        }
    }

    /// Functions called from `function`, in first-call order
    pub fn callees(&self, function: FunctionId) -> Vec<FunctionId> {
        let mut out = Vec::new();
        for &block in &self.library.function(function).blocks {
            for &line in &self.library.block(block).lines {
                let op = self.library.op(line);
                if op.code != spirv::Op::FunctionCall {
                    continue;
                }
                if let Some(Operand::Function(callee)) = op.args.first() {
                    if !out.contains(callee) {
                        out.push(*callee);
                    }
                }
            }
        }
        out
    }

    /// Every function reachable from `root` (root first, depth-first order)
    pub fn reachable_functions(&self, root: FunctionId) -> Vec<FunctionId> {
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(f) = stack.pop() {
            if !seen.insert(f) {
                continue;
            }
            order.push(f);
            for callee in self.callees(f).into_iter().rev() {
                if !seen.contains(&callee) {
                    stack.push(callee);
                }
            }
        }
        order
    }

    fn detect_recursion(&mut self) {
        let ids: Vec<FunctionId> = self.library.function_ids().collect();
        let mut state: HashMap<FunctionId, u8> = HashMap::new();
        let mut cycles = Vec::new();
        for id in ids {
            let mut path = Vec::new();
            self.visit_calls(id, &mut state, &mut path, &mut cycles);
        }
        for cycle in cycles {
            let names: Vec<String> = cycle
                .iter()
                .map(|&f| self.library.function(f).name.clone())
                .collect();
            let location = cycle
                .first()
                .map(|&f| self.library.function(f).location.clone())
                .unwrap_or_default();
            self.send_translation_error(
                location,
                "Recursion is not supported.",
                format!("Recursive call detected: {}.", names.join(" -> ")),
            );
        }
    }

    fn visit_calls(
        &self,
        function: FunctionId,
        state: &mut HashMap<FunctionId, u8>,
        path: &mut Vec<FunctionId>,
        cycles: &mut Vec<Vec<FunctionId>>,
    ) {
        match state.get(&function) {
            Some(2) => return,
            Some(1) => {
                if let Some(start) = path.iter().position(|&f| f == function) {
                    let mut cycle = path[start..].to_vec();
                    cycle.push(function);
                    cycles.push(cycle);
                }
                return;
            }
            _ => {}
        }
        state.insert(function, 1);
        path.push(function);
        for callee in self.callees(function) {
            self.visit_calls(callee, state, path, cycles);
        }
        path.pop();
        state.insert(function, 2);
    }

    fn check_stage_requirements(&mut self) {
        let entries: Vec<(FunctionId, ShaderStage, String)> = self
            .library
            .entry_points()
            .iter()
            .map(|e| (e.function, e.stage, e.owner.clone()))
            .collect();
        for (root, stage, owner) in entries {
            for f in self.reachable_functions(root) {
                let function = self.library.function(f);
                let Some(required) = function.required_stage else {
                    continue;
                };
                if required != stage {
                    let location = function.location.clone();
                    let name = function.name.clone();
                    self.send_translation_error(
                        location,
                        "Function used from the wrong stage.",
                        format!(
                            "Function '{}' can only be used in the {} stage, but it is reachable from entry point '{}' ({} stage).",
                            name, required, owner, stage
                        ),
                    );
                }
            }
        }
    }
}

/// Default literal of a spec constant initializer
fn literal_default(expr: &Expression) -> Option<f64> {
    match &expr.kind {
        ExprKind::Literal(Literal::Bool(b)) => Some(if *b { 1.0 } else { 0.0 }),
        ExprKind::Literal(Literal::Int(i)) => Some(*i as f64),
        ExprKind::Literal(Literal::UInt(u)) => Some(*u as f64),
        ExprKind::Literal(Literal::Float(f)) => Some(*f as f64),
        ExprKind::Unary {
            op: UnaryOp::Neg,
            operand,
        } => literal_default(operand).map(|v| -v),
        ExprKind::Cast { operand } => literal_default(operand),
        _ => None,
    }
}

/// Default of component `index` of a composite spec constant initializer
fn component_default(expr: &Expression, index: u32, count: u32) -> Option<&Expression> {
    match &expr.kind {
        ExprKind::Construct { args } if args.len() == count as usize => args.get(index as usize),
        ExprKind::Construct { args } if args.len() == 1 => args.first(),
        _ => None,
    }
}

fn type_list(types: &[TypeRef]) -> String {
    types
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::resolvers::default_registry;
    use crate::parser::FunctionDecl;

    fn function(name: &str, body: Vec<Statement>) -> FunctionDecl {
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

    fn module_with(functions: Vec<FunctionDecl>) -> Module {
        Module {
            structs: vec![StructDecl {
                name: "Shader".into(),
                functions,
                ..Default::default()
            }],
            enums: vec![],
        }
    }

    fn ret() -> Statement {
        Statement::Return {
            value: None,
            location: SourceLocation::default(),
        }
    }

    fn main_blocks(gen: &IrGenerator<'_>) -> Vec<BlockId> {
        let (_, overload) = gen
            .functions
            .iter()
            .find(|((_, n), _)| n == "Main")
            .unwrap();
        gen.library.function(overload[0].id).blocks.clone()
    }

    #[test]
    fn test_if_without_else_uses_three_blocks() {
        let x = Expression::local("x", TypeRef::Int);
        let body = vec![
            Statement::VarDecl {
                name: "x".into(),
                ty: TypeRef::Int,
                initializer: Some(Expression::int(1)),
                location: SourceLocation::default(),
            },
            Statement::If {
                parts: vec![IfPart {
                    condition: Some(Expression::binary(
                        BinaryOp::Gt,
                        x,
                        Expression::int(0),
                        TypeRef::Bool,
                    )),
                    body: vec![ret()],
                }],
            },
            ret(),
        ];
        let module = module_with(vec![function("Main", body)]);
        let mut gen = IrGenerator::new(default_registry());
        assert!(gen.translate(&module));
        gen.finish();
        let blocks = main_blocks(&gen);
        assert_eq!(blocks.len(), 3);
        assert_eq!(gen.library.block(blocks[0]).tag, BlockTag::Selection);
        assert_eq!(gen.library.block(blocks[0]).merge, Some(blocks[2]));
        for block in blocks {
            let lines = &gen.library.block(block).lines;
            let terminators = lines
                .iter()
                .filter(|&&l| is_terminator(gen.library.op(l).code))
                .count();
            assert_eq!(terminators, 1);
            assert!(is_terminator(gen.library.op(*lines.last().unwrap()).code));
        }
    }

    #[test]
    fn test_missing_return_is_synthesized() {
        let module = module_with(vec![function("Main", vec![])]);
        let mut gen = IrGenerator::new(default_registry());
        assert!(gen.translate(&module));
        gen.finish();
        let blocks = main_blocks(&gen);
        let last = *gen.library.block(blocks[0]).lines.last().unwrap();
        assert_eq!(gen.library.op(last).code, spirv::Op::Return);
    }

    #[test]
    fn test_foreach_is_reported_and_walk_continues() {
        let body = vec![
            Statement::ForEach {
                variable: "i".into(),
                iterable: Expression::local("xs", TypeRef::Int),
                body: vec![],
                location: SourceLocation::new("s.shader", 4, 2),
            },
            Statement::Break {
                location: SourceLocation::new("s.shader", 5, 2),
            },
        ];
        let module = module_with(vec![function("Main", body)]);
        let mut gen = IrGenerator::new(default_registry());
        assert!(!gen.translate(&module));
        assert_eq!(gen.diagnostics().len(), 2);
        assert_eq!(gen.diagnostics()[0].full_message, "foreach is not supported.");
        assert!(gen.library().failed());
    }

    #[test]
    fn test_class_types_are_rejected() {
        let module = Module {
            structs: vec![StructDecl {
                name: "Thing".into(),
                is_reference_type: true,
                ..Default::default()
            }],
            enums: vec![],
        };
        let mut gen = IrGenerator::new(default_registry());
        assert!(!gen.translate(&module));
        assert!(gen.diagnostics()[0]
            .full_message
            .contains("Use struct instead."));
    }

    #[test]
    fn test_recursion_is_reported() {
        let call = Statement::Expression(Expression::call_static(
            "Shader",
            "Main",
            vec![],
            TypeRef::Void,
        ));
        let module = module_with(vec![function("Main", vec![call])]);
        let mut gen = IrGenerator::new(default_registry());
        assert!(gen.translate(&module));
        gen.finish();
        assert!(gen
            .diagnostics()
            .iter()
            .any(|d| d.full_message.starts_with("Recursive call detected")));
    }

    #[test]
    fn test_literal_defaults() {
        let neg = Expression::new(
            ExprKind::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(Expression::float(2.5)),
            },
            TypeRef::Float,
        );
        assert_eq!(literal_default(&neg), Some(-2.5));
        assert_eq!(literal_default(&Expression::boolean(true)), Some(1.0));
    }
}
