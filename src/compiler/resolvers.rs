//! Resolver registry
//!
//! Maps a source-level operation (binary/unary operator, cast, function,
//! constructor, member read or member write) on exact source types to the
//! closure that lowers it to IR. Lookups are exact matches; a small list of
//! "backup" resolvers (swizzles, generic vector/matrix constructors) is
//! consulted only when no exact entry exists.
//!
//! The default registry is built once per process and is immutable
//! afterwards, so any number of translations can share it across threads.

use crate::compiler::glsl_ext;
use crate::compiler::ir::{IrGenerator, OpId, Operand, TranslationContext};
use crate::compiler::ShaderStage;
use crate::parser::{BinaryOp, ImageDesc, ImageDim, Scalar, SourceLocation, TypeRef, UnaryOp};
use regex::Regex;
use rspirv::spirv::Op;
use std::collections::HashMap;

/// Operands handed to a resolver
#[derive(Debug)]
pub struct ResolveArgs<'a> {
    /// Value operands in source order
    pub args: &'a [OpId],
    /// Source types of the operands
    pub arg_types: &'a [TypeRef],
    /// Resolved type of the expression
    pub result: &'a TypeRef,
    /// Expression location
    pub location: &'a SourceLocation,
}

/// Member read handed to a field resolver
#[derive(Debug)]
pub struct FieldAccess<'a> {
    /// The accessed value or pointer
    pub target: OpId,
    /// Source type of the target
    pub target_type: &'a TypeRef,
    /// Member name
    pub name: &'a str,
    /// Resolved type of the access
    pub result: &'a TypeRef,
    /// Expression location
    pub location: &'a SourceLocation,
}

/// Member write handed to a setter resolver
#[derive(Debug)]
pub struct SetterAccess<'a> {
    /// Pointer to the written object
    pub target: OpId,
    /// Source type of the target
    pub target_type: &'a TypeRef,
    /// Member name
    pub name: &'a str,
    /// Value being stored
    pub value: OpId,
    /// Statement location
    pub location: &'a SourceLocation,
}

/// Lowers an operator, cast, call or constructor
pub type Resolver = Box<
    dyn Fn(&mut IrGenerator<'_>, &mut TranslationContext, &ResolveArgs<'_>) -> OpId + Send + Sync,
>;

/// Lowers a member read
pub type FieldResolver = Box<
    dyn Fn(&mut IrGenerator<'_>, &mut TranslationContext, &FieldAccess<'_>) -> OpId + Send + Sync,
>;

/// Lowers a member write
pub type SetterResolver =
    Box<dyn Fn(&mut IrGenerator<'_>, &mut TranslationContext, &SetterAccess<'_>) + Send + Sync>;

/// Applicability test of a backup resolver
pub type TypePredicate = fn(&TypeRef) -> bool;

/// Key of a registered function: owner (`Math`, or the receiver type for
/// methods), name and exact parameter types
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionKey {
    /// Owning library or receiver type name
    pub owner: String,
    /// Function name
    pub name: String,
    /// Parameter types (receiver first for methods)
    pub params: Vec<TypeRef>,
}

impl FunctionKey {
    /// Build a key
    pub fn new(owner: impl Into<String>, name: impl Into<String>, params: Vec<TypeRef>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            params,
        }
    }
}

struct BackupField {
    applies: TypePredicate,
    pattern: Regex,
    resolver: FieldResolver,
}

struct BackupSetter {
    applies: TypePredicate,
    pattern: Regex,
    resolver: SetterResolver,
}

struct BackupConstructor {
    applies: TypePredicate,
    resolver: Resolver,
}

/// Registry of translation callbacks
#[derive(Default)]
pub struct ResolverRegistry {
    binary: HashMap<(TypeRef, BinaryOp, TypeRef), Resolver>,
    unary: HashMap<(UnaryOp, TypeRef), Resolver>,
    casts: HashMap<(TypeRef, TypeRef), Resolver>,
    functions: HashMap<FunctionKey, Resolver>,
    constructors: HashMap<(TypeRef, Vec<TypeRef>), Resolver>,
    fields: HashMap<(TypeRef, String), FieldResolver>,
    setters: HashMap<(TypeRef, String), SetterResolver>,
    backup_fields: Vec<BackupField>,
    backup_setters: Vec<BackupSetter>,
    backup_constructors: Vec<BackupConstructor>,
}

impl std::fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverRegistry")
            .field("binary", &self.binary.len())
            .field("unary", &self.unary.len())
            .field("casts", &self.casts.len())
            .field("functions", &self.functions.len())
            .field("constructors", &self.constructors.len())
            .field("fields", &self.fields.len())
            .field("setters", &self.setters.len())
            .finish()
    }
}

/// Wrap a closure as a [`Resolver`]
pub fn resolver<F>(f: F) -> Resolver
where
    F: Fn(&mut IrGenerator<'_>, &mut TranslationContext, &ResolveArgs<'_>) -> OpId
        + Send
        + Sync
        + 'static,
{
    Box::new(f)
}

/// Wrap a closure as a [`FieldResolver`]
pub fn field_resolver<F>(f: F) -> FieldResolver
where
    F: Fn(&mut IrGenerator<'_>, &mut TranslationContext, &FieldAccess<'_>) -> OpId
        + Send
        + Sync
        + 'static,
{
    Box::new(f)
}

/// Wrap a closure as a [`SetterResolver`]
pub fn setter_resolver<F>(f: F) -> SetterResolver
where
    F: Fn(&mut IrGenerator<'_>, &mut TranslationContext, &SetterAccess<'_>) + Send + Sync + 'static,
{
    Box::new(f)
}

impl ResolverRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry populated with every built-in resolver
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        register_arithmetic(&mut registry);
        register_comparisons(&mut registry);
        register_bitwise(&mut registry);
        register_unary(&mut registry);
        register_casts(&mut registry);
        register_products(&mut registry);
        register_constructors(&mut registry);
        register_swizzles(&mut registry);
        register_member_functions(&mut registry);
        register_stage_intrinsics(&mut registry);
        register_textures(&mut registry);
        glsl_ext::register(&mut registry);
        tracing::debug!("Resolver registry initialized: {:?}", registry);
        registry
    }

    // Registration

    /// Register a binary operator
    pub fn register_binary(&mut self, lhs: TypeRef, op: BinaryOp, rhs: TypeRef, r: Resolver) {
        self.binary.insert((lhs, op, rhs), r);
    }

    /// Register a unary operator
    pub fn register_unary(&mut self, op: UnaryOp, operand: TypeRef, r: Resolver) {
        self.unary.insert((op, operand), r);
    }

    /// Register a conversion
    pub fn register_cast(&mut self, from: TypeRef, to: TypeRef, r: Resolver) {
        self.casts.insert((from, to), r);
    }

    /// Register a function
    pub fn register_function(&mut self, key: FunctionKey, r: Resolver) {
        self.functions.insert(key, r);
    }

    /// Register a constructor
    pub fn register_constructor(&mut self, ty: TypeRef, params: Vec<TypeRef>, r: Resolver) {
        self.constructors.insert((ty, params), r);
    }

    /// Register a member read
    pub fn register_field(&mut self, ty: TypeRef, name: &str, r: FieldResolver) {
        self.fields.insert((ty, name.to_string()), r);
    }

    /// Register a member write
    pub fn register_setter(&mut self, ty: TypeRef, name: &str, r: SetterResolver) {
        self.setters.insert((ty, name.to_string()), r);
    }

    /// Register a pattern-matched member read
    pub fn register_backup_field(&mut self, applies: TypePredicate, pattern: Regex, r: FieldResolver) {
        self.backup_fields.push(BackupField {
            applies,
            pattern,
            resolver: r,
        });
    }

    /// Register a pattern-matched member write
    pub fn register_backup_setter(
        &mut self,
        applies: TypePredicate,
        pattern: Regex,
        r: SetterResolver,
    ) {
        self.backup_setters.push(BackupSetter {
            applies,
            pattern,
            resolver: r,
        });
    }

    /// Register a constructor consulted when no exact signature matches
    pub fn register_backup_constructor(&mut self, applies: TypePredicate, r: Resolver) {
        self.backup_constructors.push(BackupConstructor {
            applies,
            resolver: r,
        });
    }

    // Lookup

    /// Binary operator resolver
    pub fn binary(&self, lhs: &TypeRef, op: BinaryOp, rhs: &TypeRef) -> Option<&Resolver> {
        self.binary.get(&(lhs.clone(), op, rhs.clone()))
    }

    /// Unary operator resolver
    pub fn unary(&self, op: UnaryOp, operand: &TypeRef) -> Option<&Resolver> {
        self.unary.get(&(op, operand.clone()))
    }

    /// Conversion resolver
    pub fn cast(&self, from: &TypeRef, to: &TypeRef) -> Option<&Resolver> {
        self.casts.get(&(from.clone(), to.clone()))
    }

    /// Function resolver
    pub fn function(&self, key: &FunctionKey) -> Option<&Resolver> {
        self.functions.get(key)
    }

    /// Constructor resolver: exact signature first, then backups
    pub fn constructor(&self, ty: &TypeRef, params: &[TypeRef]) -> Option<&Resolver> {
        self.constructors
            .get(&(ty.clone(), params.to_vec()))
            .or_else(|| {
                self.backup_constructors
                    .iter()
                    .find(|b| (b.applies)(ty))
                    .map(|b| &b.resolver)
            })
    }

    /// Member read resolver: exact name first, then pattern matches
    pub fn field(&self, ty: &TypeRef, name: &str) -> Option<&FieldResolver> {
        self.fields
            .get(&(ty.clone(), name.to_string()))
            .or_else(|| {
                self.backup_fields
                    .iter()
                    .find(|b| (b.applies)(ty) && b.pattern.is_match(name))
                    .map(|b| &b.resolver)
            })
    }

    /// Member write resolver: exact name first, then pattern matches
    pub fn setter(&self, ty: &TypeRef, name: &str) -> Option<&SetterResolver> {
        self.setters
            .get(&(ty.clone(), name.to_string()))
            .or_else(|| {
                self.backup_setters
                    .iter()
                    .find(|b| (b.applies)(ty) && b.pattern.is_match(name))
                    .map(|b| &b.resolver)
            })
    }
}

lazy_static::lazy_static! {
    /// Process-wide registry with every built-in resolver
    pub static ref DEFAULT_RESOLVERS: ResolverRegistry = ResolverRegistry::with_defaults();

    static ref SWIZZLE: Regex = Regex::new(r"^([XYZW]{1,4}|[RGBA]{1,4})$").unwrap();
}

/// The shared default registry (built by the first caller)
pub fn default_registry() -> &'static ResolverRegistry {
    &DEFAULT_RESOLVERS
}

// =============================================================================
// Helpers
// =============================================================================

const NUMERIC: [Scalar; 3] = [Scalar::Int, Scalar::UInt, Scalar::Float];

/// Scalar for width 1, vector otherwise
pub fn with_width(scalar: Scalar, width: u32) -> TypeRef {
    if width == 1 {
        scalar.to_type()
    } else {
        TypeRef::Vector(scalar, width)
    }
}

/// Resolver emitting `code` over all value operands
pub fn simple(code: Op) -> Resolver {
    resolver(move |gen, ctx, a| {
        let ty = gen.type_id(a.result, a.location);
        let args = a.args.iter().map(|&op| Operand::Op(op)).collect();
        gen.emit(ctx, code, Some(ty), args)
    })
}

/// Resolver emitting `code` with the two operands swapped
fn swapped(code: Op) -> Resolver {
    resolver(move |gen, ctx, a| {
        let ty = gen.type_id(a.result, a.location);
        gen.emit(
            ctx,
            code,
            Some(ty),
            vec![Operand::Op(a.args[1]), Operand::Op(a.args[0])],
        )
    })
}

/// Resolver splatting the scalar operand at `scalar_index` before emitting `code`
fn splatting(code: Op, scalar_index: usize) -> Resolver {
    resolver(move |gen, ctx, a| {
        let ty = gen.type_id(a.result, a.location);
        let vector_type = gen.type_id(&a.arg_types[1 - scalar_index], a.location);
        let splat = gen.splat(ctx, a.args[scalar_index], vector_type);
        let (lhs, rhs) = if scalar_index == 0 {
            (splat, a.args[1])
        } else {
            (a.args[0], splat)
        };
        gen.emit(ctx, code, Some(ty), vec![Operand::Op(lhs), Operand::Op(rhs)])
    })
}

fn arithmetic_op(scalar: Scalar, op: BinaryOp) -> Option<Op> {
    let code = match (scalar, op) {
        (Scalar::Float, BinaryOp::Add) => Op::FAdd,
        (Scalar::Float, BinaryOp::Sub) => Op::FSub,
        (Scalar::Float, BinaryOp::Mul) => Op::FMul,
        (Scalar::Float, BinaryOp::Div) => Op::FDiv,
        (Scalar::Float, BinaryOp::Mod) => Op::FMod,
        (Scalar::Int | Scalar::UInt, BinaryOp::Add) => Op::IAdd,
        (Scalar::Int | Scalar::UInt, BinaryOp::Sub) => Op::ISub,
        (Scalar::Int | Scalar::UInt, BinaryOp::Mul) => Op::IMul,
        (Scalar::Int, BinaryOp::Div) => Op::SDiv,
        (Scalar::UInt, BinaryOp::Div) => Op::UDiv,
        (Scalar::Int, BinaryOp::Mod) => Op::SMod,
        (Scalar::UInt, BinaryOp::Mod) => Op::UMod,
        _ => return None,
    };
    Some(code)
}

fn comparison_op(scalar: Scalar, op: BinaryOp) -> Option<Op> {
    let code = match (scalar, op) {
        (Scalar::Bool, BinaryOp::Eq) => Op::LogicalEqual,
        (Scalar::Bool, BinaryOp::NotEq) => Op::LogicalNotEqual,
        (Scalar::Int | Scalar::UInt, BinaryOp::Eq) => Op::IEqual,
        (Scalar::Int | Scalar::UInt, BinaryOp::NotEq) => Op::INotEqual,
        (Scalar::Int, BinaryOp::Lt) => Op::SLessThan,
        (Scalar::Int, BinaryOp::Gt) => Op::SGreaterThan,
        (Scalar::Int, BinaryOp::LtEq) => Op::SLessThanEqual,
        (Scalar::Int, BinaryOp::GtEq) => Op::SGreaterThanEqual,
        (Scalar::UInt, BinaryOp::Lt) => Op::ULessThan,
        (Scalar::UInt, BinaryOp::Gt) => Op::UGreaterThan,
        (Scalar::UInt, BinaryOp::LtEq) => Op::ULessThanEqual,
        (Scalar::UInt, BinaryOp::GtEq) => Op::UGreaterThanEqual,
        (Scalar::Float, BinaryOp::Eq) => Op::FOrdEqual,
        (Scalar::Float, BinaryOp::NotEq) => Op::FUnordNotEqual,
        (Scalar::Float, BinaryOp::Lt) => Op::FOrdLessThan,
        (Scalar::Float, BinaryOp::Gt) => Op::FOrdGreaterThan,
        (Scalar::Float, BinaryOp::LtEq) => Op::FOrdLessThanEqual,
        (Scalar::Float, BinaryOp::GtEq) => Op::FOrdGreaterThanEqual,
        _ => return None,
    };
    Some(code)
}

// =============================================================================
// Operators
// =============================================================================

fn register_arithmetic(registry: &mut ResolverRegistry) {
    let ops = [
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Mul,
        BinaryOp::Div,
        BinaryOp::Mod,
    ];
    for scalar in NUMERIC {
        for op in ops {
            let Some(code) = arithmetic_op(scalar, op) else {
                continue;
            };
            for width in 1..=4 {
                let ty = with_width(scalar, width);
                registry.register_binary(ty.clone(), op, ty.clone(), simple(code));
                if width > 1 && !(scalar == Scalar::Float && op == BinaryOp::Mul) {
                    // vector op scalar and scalar op vector splat the scalar
                    let s = scalar.to_type();
                    registry.register_binary(ty.clone(), op, s.clone(), splatting(code, 1));
                    registry.register_binary(s, op, ty, splatting(code, 0));
                }
            }
        }
    }
}

fn register_comparisons(registry: &mut ResolverRegistry) {
    let ops = [
        BinaryOp::Eq,
        BinaryOp::NotEq,
        BinaryOp::Lt,
        BinaryOp::Gt,
        BinaryOp::LtEq,
        BinaryOp::GtEq,
    ];
    for scalar in [Scalar::Bool, Scalar::Int, Scalar::UInt, Scalar::Float] {
        for op in ops {
            let Some(code) = comparison_op(scalar, op) else {
                continue;
            };
            for width in 1..=4 {
                let ty = with_width(scalar, width);
                registry.register_binary(ty.clone(), op, ty, simple(code));
            }
        }
    }
}

fn register_bitwise(registry: &mut ResolverRegistry) {
    for scalar in [Scalar::Int, Scalar::UInt] {
        let shr = if scalar == Scalar::Int {
            Op::ShiftRightArithmetic
        } else {
            Op::ShiftRightLogical
        };
        let table = [
            (BinaryOp::BitAnd, Op::BitwiseAnd),
            (BinaryOp::BitOr, Op::BitwiseOr),
            (BinaryOp::BitXor, Op::BitwiseXor),
            (BinaryOp::Shl, Op::ShiftLeftLogical),
            (BinaryOp::Shr, shr),
        ];
        for (op, code) in table {
            for width in 1..=4 {
                let ty = with_width(scalar, width);
                registry.register_binary(ty.clone(), op, ty, simple(code));
            }
        }
    }
    let logical = [
        (BinaryOp::BitAnd, Op::LogicalAnd),
        (BinaryOp::BitOr, Op::LogicalOr),
        (BinaryOp::BitXor, Op::LogicalNotEqual),
    ];
    for (op, code) in logical {
        for width in 1..=4 {
            let ty = with_width(Scalar::Bool, width);
            registry.register_binary(ty.clone(), op, ty, simple(code));
        }
    }
}

fn register_unary(registry: &mut ResolverRegistry) {
    for width in 1..=4 {
        registry.register_unary(
            UnaryOp::Neg,
            with_width(Scalar::Float, width),
            simple(Op::FNegate),
        );
        registry.register_unary(
            UnaryOp::Neg,
            with_width(Scalar::Int, width),
            simple(Op::SNegate),
        );
        registry.register_unary(
            UnaryOp::Not,
            with_width(Scalar::Bool, width),
            simple(Op::LogicalNot),
        );
        for scalar in [Scalar::Int, Scalar::UInt] {
            registry.register_unary(UnaryOp::BitNot, with_width(scalar, width), simple(Op::Not));
        }
    }
    for rows in 2..=4 {
        for columns in 2..=4 {
            // negate a matrix column by column
            let ty = TypeRef::Matrix { rows, columns };
            registry.register_unary(
                UnaryOp::Neg,
                ty,
                resolver(move |gen, ctx, a| {
                    let matrix = gen.type_id(a.result, a.location);
                    let column = gen.type_id(&TypeRef::float_vec(rows), a.location);
                    let mut parts = Vec::with_capacity(columns as usize);
                    for c in 0..columns {
                        let col = gen.emit(
                            ctx,
                            Op::CompositeExtract,
                            Some(column),
                            vec![Operand::Op(a.args[0]), Operand::Literal(c)],
                        );
                        let neg =
                            gen.emit(ctx, Op::FNegate, Some(column), vec![Operand::Op(col)]);
                        parts.push(Operand::Op(neg));
                    }
                    gen.emit(ctx, Op::CompositeConstruct, Some(matrix), parts)
                }),
            );
        }
    }
}

// =============================================================================
// Casts
// =============================================================================

fn register_casts(registry: &mut ResolverRegistry) {
    let conversions = [
        (Scalar::Int, Scalar::Float, Op::ConvertSToF),
        (Scalar::UInt, Scalar::Float, Op::ConvertUToF),
        (Scalar::Float, Scalar::Int, Op::ConvertFToS),
        (Scalar::Float, Scalar::UInt, Op::ConvertFToU),
        (Scalar::Int, Scalar::UInt, Op::Bitcast),
        (Scalar::UInt, Scalar::Int, Op::Bitcast),
    ];
    for width in 1..=4 {
        for (from, to, code) in conversions {
            registry.register_cast(with_width(from, width), with_width(to, width), simple(code));
        }
        for scalar in NUMERIC {
            // bool -> number selects between one and zero
            registry.register_cast(
                with_width(Scalar::Bool, width),
                with_width(scalar, width),
                resolver(|gen, ctx, a| {
                    let ty = gen.type_id(a.result, a.location);
                    let one = gen.library_mut().splat_constant(ty, 1.0);
                    let zero = gen.library_mut().splat_constant(ty, 0.0);
                    match (one, zero) {
                        (Some(one), Some(zero)) => gen.emit(
                            ctx,
                            Op::Select,
                            Some(ty),
                            vec![Operand::Op(a.args[0]), Operand::Op(one), Operand::Op(zero)],
                        ),
                        _ => gen.placeholder(ty),
                    }
                }),
            );
            // number -> bool compares against zero
            let code = if scalar == Scalar::Float {
                Op::FUnordNotEqual
            } else {
                Op::INotEqual
            };
            let source = with_width(scalar, width);
            registry.register_cast(
                source.clone(),
                with_width(Scalar::Bool, width),
                resolver(move |gen, ctx, a| {
                    let ty = gen.type_id(a.result, a.location);
                    let source_type = gen.type_id(&source, a.location);
                    match gen.library_mut().zero_constant(source_type) {
                        Some(zero) => gen.emit(
                            ctx,
                            code,
                            Some(ty),
                            vec![Operand::Op(a.args[0]), Operand::Op(zero)],
                        ),
                        None => gen.placeholder(ty),
                    }
                }),
            );
        }
    }
}

// =============================================================================
// Vector and matrix products
// =============================================================================

fn register_products(registry: &mut ResolverRegistry) {
    let float = TypeRef::Float;
    for n in 2..=4 {
        let v = TypeRef::float_vec(n);
        registry.register_binary(
            v.clone(),
            BinaryOp::Mul,
            float.clone(),
            simple(Op::VectorTimesScalar),
        );
        registry.register_binary(
            float.clone(),
            BinaryOp::Mul,
            v.clone(),
            swapped(Op::VectorTimesScalar),
        );
        registry.register_function(
            FunctionKey::new("Math", "Dot", vec![v.clone(), v.clone()]),
            simple(Op::Dot),
        );
    }
    for rows in 2..=4 {
        for columns in 2..=4 {
            let m = TypeRef::Matrix { rows, columns };
            registry.register_binary(
                m.clone(),
                BinaryOp::Mul,
                float.clone(),
                simple(Op::MatrixTimesScalar),
            );
            registry.register_binary(
                float.clone(),
                BinaryOp::Mul,
                m.clone(),
                swapped(Op::MatrixTimesScalar),
            );
            registry.register_binary(
                m.clone(),
                BinaryOp::Mul,
                TypeRef::float_vec(columns),
                simple(Op::MatrixTimesVector),
            );
            registry.register_binary(
                TypeRef::float_vec(rows),
                BinaryOp::Mul,
                m.clone(),
                simple(Op::VectorTimesMatrix),
            );
            for inner in 2..=4 {
                registry.register_binary(
                    TypeRef::Matrix {
                        rows,
                        columns: inner,
                    },
                    BinaryOp::Mul,
                    TypeRef::Matrix {
                        rows: inner,
                        columns,
                    },
                    simple(Op::MatrixTimesMatrix),
                );
            }
            registry.register_function(
                FunctionKey::new("Math", "Transpose", vec![m]),
                simple(Op::Transpose),
            );
        }
    }
}

// =============================================================================
// Constructors
// =============================================================================

fn is_vector(ty: &TypeRef) -> bool {
    matches!(ty, TypeRef::Vector(..))
}

fn is_matrix(ty: &TypeRef) -> bool {
    matches!(ty, TypeRef::Matrix { .. })
}

fn is_fixed_array(ty: &TypeRef) -> bool {
    matches!(ty, TypeRef::FixedArray(..))
}

fn constructor_mismatch(gen: &mut IrGenerator<'_>, a: &ResolveArgs<'_>) -> OpId {
    let params = a
        .arg_types
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let ty = gen.type_id(a.result, a.location);
    gen.send_translation_error(
        a.location.clone(),
        "No matching constructor.",
        format!("No constructor for '{}' takes ({}).", a.result, params),
    );
    gen.placeholder(ty)
}

fn register_constructors(registry: &mut ResolverRegistry) {
    // Vectors: splat, zero fill, or any mix of scalars and vectors whose
    // component count adds up
    registry.register_backup_constructor(
        is_vector,
        resolver(|gen, ctx, a| {
            let ty = gen.type_id(a.result, a.location);
            let count = a.result.component_count();
            if a.args.is_empty() {
                return match gen.library_mut().zero_constant(ty) {
                    Some(zero) => zero,
                    None => gen.placeholder(ty),
                };
            }
            if a.args.len() == 1 && a.arg_types[0].is_scalar() {
                return gen.splat(ctx, a.args[0], ty);
            }
            let supplied: u32 = a.arg_types.iter().map(|t| t.component_count()).sum();
            let scalars_match = a
                .arg_types
                .iter()
                .all(|t| t.scalar() == a.result.scalar() && !is_matrix(t));
            if supplied != count || !scalars_match {
                return constructor_mismatch(gen, a);
            }
            let args = a.args.iter().map(|&op| Operand::Op(op)).collect();
            gen.emit(ctx, Op::CompositeConstruct, Some(ty), args)
        }),
    );

    // Matrices: column vectors, rows*columns scalars (grouped per column),
    // splat, or zero fill
    registry.register_backup_constructor(
        is_matrix,
        resolver(|gen, ctx, a| {
            let TypeRef::Matrix { rows, columns } = *a.result else {
                return constructor_mismatch(gen, a);
            };
            let ty = gen.type_id(a.result, a.location);
            let column_ref = TypeRef::float_vec(rows);
            let column = gen.type_id(&column_ref, a.location);
            if a.args.is_empty() {
                return match gen.library_mut().zero_constant(ty) {
                    Some(zero) => zero,
                    None => gen.placeholder(ty),
                };
            }
            if a.args.len() == 1 && a.arg_types[0] == TypeRef::Float {
                let col = gen.splat(ctx, a.args[0], column);
                let parts = vec![Operand::Op(col); columns as usize];
                return gen.emit(ctx, Op::CompositeConstruct, Some(ty), parts);
            }
            if a.args.len() == columns as usize && a.arg_types.iter().all(|t| *t == column_ref) {
                let parts = a.args.iter().map(|&op| Operand::Op(op)).collect();
                return gen.emit(ctx, Op::CompositeConstruct, Some(ty), parts);
            }
            if a.args.len() == (rows * columns) as usize
                && a.arg_types.iter().all(|t| *t == TypeRef::Float)
            {
                let mut parts = Vec::with_capacity(columns as usize);
                for chunk in a.args.chunks(rows as usize) {
                    let scalars = chunk.iter().map(|&op| Operand::Op(op)).collect();
                    let col = gen.emit(ctx, Op::CompositeConstruct, Some(column), scalars);
                    parts.push(Operand::Op(col));
                }
                return gen.emit(ctx, Op::CompositeConstruct, Some(ty), parts);
            }
            constructor_mismatch(gen, a)
        }),
    );

    // Fixed arrays: one value per element, or zero fill
    registry.register_backup_constructor(
        is_fixed_array,
        resolver(|gen, ctx, a| {
            let ty = gen.type_id(a.result, a.location);
            if a.args.is_empty() {
                return match gen.library_mut().zero_constant(ty) {
                    Some(zero) => zero,
                    None => gen.placeholder(ty),
                };
            }
            let element = a.result.component_type();
            let fits = a.args.len() as u32 == a.result.component_count()
                && a.arg_types.iter().all(|t| Some(t) == element.as_ref());
            if !fits {
                return constructor_mismatch(gen, a);
            }
            let args = a.args.iter().map(|&op| Operand::Op(op)).collect();
            gen.emit(ctx, Op::CompositeConstruct, Some(ty), args)
        }),
    );
}

// =============================================================================
// Swizzles
// =============================================================================

fn swizzle_indices(name: &str) -> Vec<u32> {
    name.chars()
        .map(|c| match c {
            'X' | 'R' => 0,
            'Y' | 'G' => 1,
            'Z' | 'B' => 2,
            _ => 3,
        })
        .collect()
}

fn register_swizzles(registry: &mut ResolverRegistry) {
    registry.register_backup_field(
        is_vector,
        SWIZZLE.clone(),
        field_resolver(|gen, ctx, f| {
            let result = gen.type_id(f.result, f.location);
            let count = f.target_type.component_count();
            let indices = swizzle_indices(f.name);
            if indices.iter().any(|&i| i >= count) {
                gen.send_translation_error(
                    f.location.clone(),
                    "Swizzle out of range.",
                    format!("'{}' has no component in swizzle '{}'.", f.target_type, f.name),
                );
                return gen.placeholder(result);
            }
            if indices.len() == 1 && gen.library().is_pointer(f.target) {
                // single components of addressable vectors stay addressable
                let index = gen.library_mut().int_constant(indices[0] as i32);
                return gen.access_chain(ctx, f.target, &[index], result);
            }
            let value = gen.value_of(ctx, f.target);
            if indices.len() == 1 {
                return gen.emit(
                    ctx,
                    Op::CompositeExtract,
                    Some(result),
                    vec![Operand::Op(value), Operand::Literal(indices[0])],
                );
            }
            let mut args = vec![Operand::Op(value), Operand::Op(value)];
            args.extend(indices.into_iter().map(Operand::Literal));
            gen.emit(ctx, Op::VectorShuffle, Some(result), args)
        }),
    );

    registry.register_backup_setter(
        is_vector,
        SWIZZLE.clone(),
        setter_resolver(|gen, ctx, s| {
            let count = s.target_type.component_count();
            let indices = swizzle_indices(s.name);
            let mut seen = [false; 4];
            for &i in &indices {
                if i >= count || seen[i as usize] {
                    gen.send_translation_error(
                        s.location.clone(),
                        "Invalid swizzle write.",
                        format!(
                            "Swizzle '{}' cannot be assigned on '{}'.",
                            s.name, s.target_type
                        ),
                    );
                    return;
                }
                seen[i as usize] = true;
            }
            let vector = gen.type_id(s.target_type, s.location);
            if indices.len() == 1 {
                let Some(scalar) = s.target_type.scalar() else {
                    return;
                };
                let component = gen.type_id(&scalar.to_type(), s.location);
                let index = gen.library_mut().int_constant(indices[0] as i32);
                let ptr = gen.access_chain(ctx, s.target, &[index], component);
                gen.emit_store(ctx, ptr, s.value);
                return;
            }
            // shuffle the written components over the old value
            let old = gen.value_of(ctx, s.target);
            let mut args = vec![Operand::Op(old), Operand::Op(s.value)];
            for i in 0..count {
                let lane = match indices.iter().position(|&w| w == i) {
                    Some(j) => count + j as u32,
                    None => i,
                };
                args.push(Operand::Literal(lane));
            }
            let merged = gen.emit(ctx, Op::VectorShuffle, Some(vector), args);
            gen.emit_store(ctx, s.target, merged);
        }),
    );
}

// =============================================================================
// Member functions and properties of built-in types
// =============================================================================

fn register_member_functions(registry: &mut ResolverRegistry) {
    for n in 2..=4 {
        let v = TypeRef::float_vec(n);
        registry.register_field(
            v,
            "Length",
            field_resolver(|gen, ctx, f| {
                let result = gen.type_id(f.result, f.location);
                let value = gen.value_of(ctx, f.target);
                gen.ext_inst(ctx, result, rspirv::spirv::GLOp::Length, &[value])
            }),
        );

        let m = TypeRef::Matrix {
            rows: n,
            columns: n,
        };
        registry.register_field(
            m.clone(),
            "Transposed",
            field_resolver(|gen, ctx, f| {
                let result = gen.type_id(f.result, f.location);
                let value = gen.value_of(ctx, f.target);
                gen.emit(ctx, Op::Transpose, Some(result), vec![Operand::Op(value)])
            }),
        );
        registry.register_field(
            m,
            "Determinant",
            field_resolver(|gen, ctx, f| {
                let result = gen.type_id(f.result, f.location);
                let value = gen.value_of(ctx, f.target);
                gen.ext_inst(ctx, result, rspirv::spirv::GLOp::Determinant, &[value])
            }),
        );
    }
}

// =============================================================================
// Fragment-only intrinsics
// =============================================================================

fn register_stage_intrinsics(registry: &mut ResolverRegistry) {
    for width in 1..=4 {
        let ty = with_width(Scalar::Float, width);
        for (name, code) in [("Ddx", Op::DPdx), ("Ddy", Op::DPdy), ("Fwidth", Op::Fwidth)] {
            registry.register_function(
                FunctionKey::new("Math", name, vec![ty.clone()]),
                resolver(move |gen, ctx, a| {
                    gen.require_stage(ctx, ShaderStage::Pixel, a.location);
                    let result = gen.type_id(a.result, a.location);
                    gen.emit(ctx, code, Some(result), vec![Operand::Op(a.args[0])])
                }),
            );
        }
    }
    registry.register_function(
        FunctionKey::new("Math", "Discard", vec![]),
        resolver(|gen, ctx, a| {
            gen.require_stage(ctx, ShaderStage::Pixel, a.location);
            gen.emit_void(ctx, Op::Kill, vec![]);
            gen.void_value()
        }),
    );
}

// =============================================================================
// Textures
// =============================================================================

fn sampled_desc(dim: ImageDim) -> ImageDesc {
    ImageDesc {
        dim,
        ..ImageDesc::sampled_2d()
    }
}

fn register_textures(registry: &mut ResolverRegistry) {
    let shapes = [
        (ImageDim::Dim1D, 1),
        (ImageDim::Dim2D, 2),
        (ImageDim::Dim3D, 3),
        (ImageDim::Cube, 3),
    ];
    for (dim, coords) in shapes {
        let texture = TypeRef::SampledImage(sampled_desc(dim));
        let owner = texture.to_string();
        let uv = with_width(Scalar::Float, coords);

        registry.register_function(
            FunctionKey::new(owner.clone(), "Sample", vec![texture.clone(), uv.clone()]),
            resolver(|gen, ctx, a| {
                gen.require_stage(ctx, ShaderStage::Pixel, a.location);
                let result = gen.type_id(a.result, a.location);
                gen.emit(
                    ctx,
                    Op::ImageSampleImplicitLod,
                    Some(result),
                    vec![Operand::Op(a.args[0]), Operand::Op(a.args[1])],
                )
            }),
        );

        registry.register_function(
            FunctionKey::new(owner, "SampleLevel", vec![texture, uv, TypeRef::Float]),
            resolver(|gen, ctx, a| {
                let result = gen.type_id(a.result, a.location);
                gen.emit(
                    ctx,
                    Op::ImageSampleExplicitLod,
                    Some(result),
                    vec![
                        Operand::Op(a.args[0]),
                        Operand::Op(a.args[1]),
                        Operand::Literal(rspirv::spirv::ImageOperands::LOD.bits()),
                        Operand::Op(a.args[2]),
                    ],
                )
            }),
        );
    }
}

// =============================================================================
// TESTS
// =============================================================================
