//! Entry points: wrapper functions, interfaces, decorations, execution modes
//!
//! Runs after both translation passes. For every requested stage struct it
//! finds the entry function, decides whether a generated wrapper is needed
//! (static initializers reachable from `Main`, or an instance `Main`),
//! collects the `Input`/`Output` interface and attaches execution modes.
//!
//! Global variable placement and decorations live here as well, since they
//! are only meaningful to the pipeline interface.

use crate::compiler::ir::{
    CallArg, DecorationEntry, EntryPointInfo, FunctionId, InterfaceCounters, IrGenerator, Library,
    OpId, Operand, TypeId, TypeKind,
};
use crate::compiler::ShaderStage;
use crate::error::{Error, Result};
use crate::parser::{
    find_attribute, Attribute, AttributeValue, FieldDecl, Module, StructDecl, TypeRef,
};
use rspirv::spirv::{self, BuiltIn, Decoration, ExecutionMode, StorageClass};

/// Name written into every `OpEntryPoint`
pub const ENTRY_POINT_NAME: &str = "main";

/// Compute workgroup size bounds (X, Y, Z)
pub const MAX_LOCAL_SIZE: [i64; 3] = [128, 128, 64];

const COMPUTE_SIGNATURE: &str =
    "[Compute(localSizeX: 1..128, localSizeY: 1..128, localSizeZ: 1..64)]";
const GEOMETRY_SIGNATURE: &str = "[Geometry(input: Points|Lines|Triangles, output: Points|LineStrip|TriangleStrip, maxVertices: Int)]";

/// One stage to build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRequest {
    /// Struct declaring the entry function
    pub owner: String,
    /// Entry function name (`Main` unless configured)
    pub function: String,
    /// Pipeline stage
    pub stage: ShaderStage,
}

/// Every struct whose attributes name a stage, entered through `Main`
pub fn discover(module: &Module) -> Vec<EntryRequest> {
    module
        .structs
        .iter()
        .filter_map(|s| {
            let stage = s
                .attributes
                .iter()
                .find_map(|a| ShaderStage::from_attribute(&a.name))?;
            Some(EntryRequest {
                owner: s.name.clone(),
                function: "Main".to_string(),
                stage,
            })
        })
        .collect()
}

/// Build and register the entry points of a translated module
///
/// Fails with [`Error::EntryPointNotFound`] when a requested struct does not
/// exist; a missing entry function is a diagnostic.
pub fn build_entry_points(
    gen: &mut IrGenerator<'_>,
    module: &Module,
    requests: &[EntryRequest],
    error_on_missing_main: bool,
) -> Result<()> {
    for request in requests {
        let Some(decl) = module.structs.iter().find(|s| s.name == request.owner) else {
            return Err(Error::EntryPointNotFound {
                name: format!("{}.{}", request.owner, request.function),
            });
        };
        let has_signature = decl.functions.iter().any(|f| {
            f.name == request.function && f.params.is_empty() && f.return_type == TypeRef::Void
        });
        let entry = gen.find_overload(&request.owner, &request.function, &[]);
        let Some(entry) = entry.filter(|_| has_signature) else {
            if error_on_missing_main {
                gen.send_translation_error(
                    decl.location.clone(),
                    "Missing entry function.",
                    format!(
                        "Shader must have a function of signature '{}()'.",
                        request.function
                    ),
                );
            } else {
                tracing::warn!(
                    "Skipping entry point {}: no '{}()' function",
                    request.owner,
                    request.function
                );
            }
            continue;
        };

        let (modes, local_size) = execution_modes(gen, decl, request.stage);
        let function = wrap_entry(gen, decl, entry.id, entry.is_instance);
        let reachable = gen.reachable_functions(function);
        let interface = used_globals(gen.library(), &reachable)
            .into_iter()
            .filter(|&g| {
                matches!(
                    gen.library().storage_of(g),
                    Some(StorageClass::Input | StorageClass::Output)
                )
            })
            .collect();
        tracing::debug!(
            "Entry point {} ({} stage): {} reachable functions",
            request.owner,
            request.stage,
            reachable.len()
        );
        gen.library_mut().add_entry_point(EntryPointInfo {
            name: ENTRY_POINT_NAME.to_string(),
            owner: request.owner.clone(),
            stage: request.stage,
            function,
            main: entry.id,
            interface,
            modes,
            local_size,
        });
    }
    Ok(())
}

/// Entry function, or a generated `<Owner>_EntryPoint` wrapper when globals
/// need initializing or `Main` needs an instance
fn wrap_entry(
    gen: &mut IrGenerator<'_>,
    decl: &StructDecl,
    main: FunctionId,
    is_instance: bool,
) -> FunctionId {
    let owner = decl.name.as_str();
    let pre_constructor = gen.struct_info(owner).and_then(|s| s.pre_constructor);

    let mut functions = gen.reachable_functions(main);
    if let (true, Some(pre)) = (is_instance, pre_constructor) {
        for f in gen.reachable_functions(pre) {
            if !functions.contains(&f) {
                functions.push(f);
            }
        }
    }

    // initializers can read other initialized globals; iterate to a fixpoint
    let mut initializers: Vec<FunctionId> = Vec::new();
    loop {
        let pending: Vec<FunctionId> = used_globals(gen.library(), &functions)
            .into_iter()
            .filter_map(|g| gen.library().global_for_op(g).and_then(|g| g.initializer))
            .filter(|f| !initializers.contains(f))
            .collect();
        if pending.is_empty() {
            break;
        }
        for init in pending {
            if initializers.contains(&init) {
                continue;
            }
            initializers.push(init);
            for f in gen.reachable_functions(init) {
                if !functions.contains(&f) {
                    functions.push(f);
                }
            }
        }
    }

    if initializers.is_empty() && !is_instance {
        return main;
    }

    let init_globals = if initializers.is_empty() {
        None
    } else {
        let id = gen.declare_generated(
            owner,
            &format!("{}_InitializeGlobals", owner),
            false,
            decl.location.clone(),
        );
        let mut ctx = gen.begin_body(id, owner, &[]);
        for init in &initializers {
            gen.emit_call(&mut ctx, *init, vec![]);
        }
        gen.emit_void(&mut ctx, spirv::Op::Return, vec![]);
        Some(id)
    };

    let wrapper = gen.declare_generated(
        owner,
        &format!("{}_EntryPoint", owner),
        false,
        decl.location.clone(),
    );
    let mut ctx = gen.begin_body(wrapper, owner, &[]);
    // globals first: field initializers run by the pre-constructor may read them
    if let Some(init) = init_globals {
        gen.emit_call(&mut ctx, init, vec![]);
    }
    let mut main_args = Vec::new();
    if is_instance {
        if let Some(struct_ty) = gen.struct_info(owner).map(|s| s.ty) {
            let instance = gen.add_local(&mut ctx, struct_ty, "self");
            if let Some(pre) = pre_constructor {
                gen.emit_call(&mut ctx, pre, vec![CallArg::Reference(instance)]);
            }
            main_args.push(CallArg::Reference(instance));
        }
    }
    gen.emit_call(&mut ctx, main, main_args);
    gen.emit_void(&mut ctx, spirv::Op::Return, vec![]);
    wrapper
}

/// Globals referenced by the given functions, in first-use order
pub fn used_globals(lib: &Library, functions: &[FunctionId]) -> Vec<OpId> {
    let mut out = Vec::new();
    for &function in functions {
        for &block in &lib.function(function).blocks {
            for &line in &lib.block(block).lines {
                for arg in &lib.op(line).args {
                    if let Operand::Op(op) = arg {
                        if lib.global_for_op(*op).is_some() && !out.contains(op) {
                            out.push(*op);
                        }
                    }
                }
            }
        }
    }
    out
}

// =============================================================================
// Execution modes
// =============================================================================

fn execution_modes(
    gen: &mut IrGenerator<'_>,
    decl: &StructDecl,
    stage: ShaderStage,
) -> (Vec<(ExecutionMode, Vec<u32>)>, Option<[u32; 3]>) {
    match stage {
        ShaderStage::Vertex => (Vec::new(), None),
        ShaderStage::Pixel => (vec![(ExecutionMode::OriginUpperLeft, Vec::new())], None),
        ShaderStage::Compute => {
            let size = local_size(gen, decl);
            (
                vec![(ExecutionMode::LocalSize, size.to_vec())],
                Some(size),
            )
        }
        ShaderStage::Geometry => (geometry_modes(gen, decl), None),
    }
}

/// `[Compute(localSizeX, localSizeY, localSizeZ)]`, each defaulting to 1
fn local_size(gen: &mut IrGenerator<'_>, decl: &StructDecl) -> [u32; 3] {
    const NAMES: [&str; 3] = ["localSizeX", "localSizeY", "localSizeZ"];
    let mut size = [1u32; 3];
    let Some(attr) = find_attribute(&decl.attributes, "Compute") else {
        return size;
    };
    for (position, param) in attr.params.iter().enumerate() {
        let slot = match &param.name {
            Some(name) => NAMES.iter().position(|n| n == name),
            None => (position < 3).then_some(position),
        };
        let value = match &param.value {
            AttributeValue::Int(v) => Some(*v),
            _ => None,
        };
        match (slot, value) {
            (Some(i), Some(v)) if (1..=MAX_LOCAL_SIZE[i]).contains(&v) => size[i] = v as u32,
            _ => gen.send_translation_error(
                decl.location.clone(),
                "Invalid attribute parameter.",
                format!("Expected signature: {}", COMPUTE_SIGNATURE),
            ),
        }
    }
    size
}

fn geometry_modes(gen: &mut IrGenerator<'_>, decl: &StructDecl) -> Vec<(ExecutionMode, Vec<u32>)> {
    let mut input = ExecutionMode::Triangles;
    let mut output = ExecutionMode::OutputTriangleStrip;
    let mut max_vertices = 1u32;
    if let Some(attr) = find_attribute(&decl.attributes, "Geometry") {
        for param in &attr.params {
            let ok = match (param.name.as_deref(), &param.value) {
                (Some("input"), AttributeValue::Ident(v)) => match v.as_str() {
                    "Points" => Some(ExecutionMode::InputPoints),
                    "Lines" => Some(ExecutionMode::InputLines),
                    "Triangles" => Some(ExecutionMode::Triangles),
                    _ => None,
                }
                .map(|m| input = m)
                .is_some(),
                (Some("output"), AttributeValue::Ident(v)) => match v.as_str() {
                    "Points" => Some(ExecutionMode::OutputPoints),
                    "LineStrip" => Some(ExecutionMode::OutputLineStrip),
                    "TriangleStrip" => Some(ExecutionMode::OutputTriangleStrip),
                    _ => None,
                }
                .map(|m| output = m)
                .is_some(),
                (Some("maxVertices"), AttributeValue::Int(n)) if *n >= 1 => {
                    max_vertices = *n as u32;
                    true
                }
                _ => false,
            };
            if !ok {
                gen.send_translation_error(
                    decl.location.clone(),
                    "Invalid attribute parameter.",
                    format!("Expected signature: {}", GEOMETRY_SIGNATURE),
                );
            }
        }
    }
    vec![
        (ExecutionMode::Invocations, vec![1]),
        (input, Vec::new()),
        (ExecutionMode::OutputVertices, vec![max_vertices]),
        (output, Vec::new()),
    ]
}

// =============================================================================
// Global placement and decorations
// =============================================================================

/// Storage class of a static field
pub fn storage_class_for(field: &FieldDecl) -> StorageClass {
    if matches!(field.ty, TypeRef::RuntimeArray(_)) {
        return StorageClass::StorageBuffer;
    }
    let explicit = [
        ("Input", StorageClass::Input),
        ("Output", StorageClass::Output),
        ("Uniform", StorageClass::Uniform),
        ("StorageBuffer", StorageClass::StorageBuffer),
    ];
    for (name, storage) in explicit {
        if find_attribute(&field.attributes, name).is_some() {
            return storage;
        }
    }
    match field.ty {
        TypeRef::Image(_) | TypeRef::SampledImage(_) | TypeRef::Sampler => {
            StorageClass::UniformConstant
        }
        _ => StorageClass::Private,
    }
}

/// Decorations of a global; lays out block types of buffers
pub(crate) fn global_decorations(
    gen: &mut IrGenerator<'_>,
    field: &FieldDecl,
    storage: StorageClass,
    var_ty: TypeId,
    counters: &mut InterfaceCounters,
) -> Vec<DecorationEntry> {
    let mut out = Vec::new();
    match storage {
        StorageClass::Input | StorageClass::Output => {
            if let Some(attr) = find_attribute(&field.attributes, "BuiltIn") {
                let builtin = match attr.params.first().map(|p| &p.value) {
                    Some(AttributeValue::Ident(name)) | Some(AttributeValue::Str(name)) => {
                        builtin_by_name(name)
                    }
                    _ => None,
                };
                match builtin {
                    Some(b) => out.push(DecorationEntry::with(Decoration::BuiltIn, b as u32)),
                    None => gen.send_translation_error(
                        field.location.clone(),
                        "Invalid attribute parameter.",
                        "Expected signature: [BuiltIn(name)] with a known built-in name",
                    ),
                }
                return out;
            }
            let location = match attribute_int(&field.attributes, "Location", None) {
                Some(n) => n as u32,
                None => {
                    let counter = if storage == StorageClass::Input {
                        &mut counters.next_input
                    } else {
                        &mut counters.next_output
                    };
                    *counter += 1;
                    *counter - 1
                }
            };
            out.push(DecorationEntry::with(Decoration::Location, location));
        }
        StorageClass::Uniform | StorageClass::StorageBuffer | StorageClass::UniformConstant => {
            let storage_attr = match storage {
                StorageClass::Uniform => "Uniform",
                StorageClass::StorageBuffer => "StorageBuffer",
                _ => "Resource",
            };
            let set = attribute_int(&field.attributes, "DescriptorSet", None)
                .or_else(|| attribute_int(&field.attributes, storage_attr, Some("set")))
                .unwrap_or(0) as u32;
            let binding = attribute_int(&field.attributes, "Binding", None)
                .or_else(|| attribute_int(&field.attributes, storage_attr, Some("binding")));
            let binding = match binding {
                Some(b) => {
                    counters.next_binding = counters.next_binding.max(b as u32 + 1);
                    b as u32
                }
                None => {
                    counters.next_binding += 1;
                    counters.next_binding - 1
                }
            };
            out.push(DecorationEntry::with(Decoration::DescriptorSet, set));
            out.push(DecorationEntry::with(Decoration::Binding, binding));
            if storage != StorageClass::UniformConstant {
                layout_block(gen.library_mut(), var_ty);
            }
        }
        _ => {}
    }
    out
}

/// Integer parameter of an attribute: the first positional one, or a named one
fn attribute_int(attributes: &[Attribute], attribute: &str, param: Option<&str>) -> Option<i64> {
    let attr = find_attribute(attributes, attribute)?;
    attr.params
        .iter()
        .find(|p| p.name.as_deref() == param)
        .and_then(|p| match p.value {
            AttributeValue::Int(v) => Some(v),
            _ => None,
        })
}

fn builtin_by_name(name: &str) -> Option<BuiltIn> {
    Some(match name {
        "Position" => BuiltIn::Position,
        "PointSize" => BuiltIn::PointSize,
        "ClipDistance" => BuiltIn::ClipDistance,
        "CullDistance" => BuiltIn::CullDistance,
        "VertexIndex" => BuiltIn::VertexIndex,
        "InstanceIndex" => BuiltIn::InstanceIndex,
        "PrimitiveId" => BuiltIn::PrimitiveId,
        "InvocationId" => BuiltIn::InvocationId,
        "Layer" => BuiltIn::Layer,
        "ViewportIndex" => BuiltIn::ViewportIndex,
        "FragCoord" => BuiltIn::FragCoord,
        "FrontFacing" => BuiltIn::FrontFacing,
        "FragDepth" => BuiltIn::FragDepth,
        "SampleId" => BuiltIn::SampleId,
        "SampleMask" => BuiltIn::SampleMask,
        "NumWorkgroups" => BuiltIn::NumWorkgroups,
        "WorkgroupId" => BuiltIn::WorkgroupId,
        "LocalInvocationId" => BuiltIn::LocalInvocationId,
        "GlobalInvocationId" => BuiltIn::GlobalInvocationId,
        "LocalInvocationIndex" => BuiltIn::LocalInvocationIndex,
        _ => return None,
    })
}

// =============================================================================
// Buffer layout
// =============================================================================

/// Decorate a buffer struct with `Block` and lay out its members
pub fn layout_block(lib: &mut Library, ty: TypeId) {
    if !matches!(lib.ty(ty).kind, TypeKind::Struct { .. }) {
        return;
    }
    lib.ty_mut(ty).decorate(DecorationEntry::flag(Decoration::Block));
    layout_struct(lib, ty);
}

fn round_up(value: u32, align: u32) -> u32 {
    value.div_ceil(align) * align
}

/// Member offsets of a struct; returns its (size, alignment)
fn layout_struct(lib: &mut Library, ty: TypeId) -> (u32, u32) {
    let members = lib.ty(ty).members().map(|m| m.to_vec()).unwrap_or_default();
    let mut offset = 0;
    for (index, member) in members.iter().enumerate() {
        let (size, align) = size_align(lib, member.ty);
        offset = round_up(offset, align);
        let index = index as u32;
        lib.ty_mut(ty)
            .decorate_member(index, DecorationEntry::with(Decoration::Offset, offset));
        if contains_matrix(lib, member.ty) {
            lib.ty_mut(ty)
                .decorate_member(index, DecorationEntry::flag(Decoration::ColMajor));
            lib.ty_mut(ty)
                .decorate_member(index, DecorationEntry::with(Decoration::MatrixStride, 16));
        }
        offset += size;
    }
    (round_up(offset, 16), 16)
}

/// A matrix, or an array of matrices
fn contains_matrix(lib: &Library, ty: TypeId) -> bool {
    match lib.ty(ty).kind {
        TypeKind::Matrix { .. } => true,
        TypeKind::FixedArray { element, .. } | TypeKind::RuntimeArray { element } => {
            contains_matrix(lib, element)
        }
        _ => false,
    }
}

/// std140 size and alignment; runtime arrays use their natural stride
fn size_align(lib: &mut Library, ty: TypeId) -> (u32, u32) {
    match lib.ty(ty).kind.clone() {
        TypeKind::Vector { count: 2, .. } => (8, 8),
        TypeKind::Vector { count: 3, .. } => (12, 16),
        TypeKind::Vector { .. } => (16, 16),
        TypeKind::Matrix { columns, .. } => (16 * columns, 16),
        TypeKind::FixedArray { element, length } => {
            let (size, _) = size_align(lib, element);
            let stride = round_up(size, 16);
            let n = lib.constant_word(length).unwrap_or(0);
            lib.ty_mut(ty)
                .decorate(DecorationEntry::with(Decoration::ArrayStride, stride));
            (stride * n, 16)
        }
        TypeKind::RuntimeArray { element } => {
            let (size, align) = size_align(lib, element);
            let stride = round_up(size, align);
            lib.ty_mut(ty)
                .decorate(DecorationEntry::with(Decoration::ArrayStride, stride));
            (0, align)
        }
        TypeKind::Struct { .. } => layout_struct(lib, ty),
        _ => (4, 4),
    }
}

// =============================================================================
// TESTS
// =============================================================================
