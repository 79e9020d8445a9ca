//! GLSL.std.450 extended instruction table
//!
//! Static data describing which `Math` functions lower to an `OpExtInst` of
//! the standard GLSL instruction set. Each entry is registered once per
//! concrete scalar kind and vector width it supports.

use crate::compiler::ir::Operand;
use crate::compiler::resolvers::{resolver, with_width, FunctionKey, ResolverRegistry};
use crate::parser::{Scalar, TypeRef};
use rspirv::spirv::GLOp;

/// Name of the imported instruction set
pub const GLSL_STD_450: &str = "GLSL.std.450";

/// Operand/result shape of an intrinsic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Every operand and the result share one type
    Componentwise,
    /// Vector operands, scalar result (`Length`, `Distance`)
    Reduce,
    /// Two vector operands and a trailing scalar (`Refract`)
    TrailingScalar,
    /// Three-component vectors only (`Cross`)
    Vec3Only,
    /// Square matrix operand (`MatrixInverse` keeps the type, `Determinant` reduces)
    SquareMatrix,
}

/// One entry of the intrinsic table
#[derive(Debug, Clone, Copy)]
pub struct Intrinsic {
    /// Function name under `Math`
    pub name: &'static str,
    /// Number of operands
    pub arity: usize,
    /// Instruction for float operands
    pub float: Option<GLOp>,
    /// Instruction for signed integer operands
    pub sint: Option<GLOp>,
    /// Instruction for unsigned integer operands
    pub uint: Option<GLOp>,
    /// Operand/result shape
    pub shape: Shape,
}

const fn float_only(name: &'static str, arity: usize, op: GLOp) -> Intrinsic {
    Intrinsic {
        name,
        arity,
        float: Some(op),
        sint: None,
        uint: None,
        shape: Shape::Componentwise,
    }
}

const fn shaped(name: &'static str, arity: usize, op: GLOp, shape: Shape) -> Intrinsic {
    Intrinsic {
        name,
        arity,
        float: Some(op),
        sint: None,
        uint: None,
        shape,
    }
}

const fn numeric(
    name: &'static str,
    arity: usize,
    float: GLOp,
    sint: GLOp,
    uint: Option<GLOp>,
) -> Intrinsic {
    Intrinsic {
        name,
        arity,
        float: Some(float),
        sint: Some(sint),
        uint,
        shape: Shape::Componentwise,
    }
}

/// The intrinsic table
pub static INTRINSICS: &[Intrinsic] = &[
    // Trigonometry
    float_only("Sin", 1, GLOp::Sin),
    float_only("Cos", 1, GLOp::Cos),
    float_only("Tan", 1, GLOp::Tan),
    float_only("Asin", 1, GLOp::Asin),
    float_only("Acos", 1, GLOp::Acos),
    float_only("Atan", 1, GLOp::Atan),
    float_only("Atan2", 2, GLOp::Atan2),
    float_only("Sinh", 1, GLOp::Sinh),
    float_only("Cosh", 1, GLOp::Cosh),
    float_only("Tanh", 1, GLOp::Tanh),
    float_only("Radians", 1, GLOp::Radians),
    float_only("Degrees", 1, GLOp::Degrees),
    // Exponential
    float_only("Pow", 2, GLOp::Pow),
    float_only("Exp", 1, GLOp::Exp),
    float_only("Exp2", 1, GLOp::Exp2),
    float_only("Log", 1, GLOp::Log),
    float_only("Log2", 1, GLOp::Log2),
    float_only("Sqrt", 1, GLOp::Sqrt),
    float_only("InverseSqrt", 1, GLOp::InverseSqrt),
    // Common
    numeric("Abs", 1, GLOp::FAbs, GLOp::SAbs, None),
    numeric("Sign", 1, GLOp::FSign, GLOp::SSign, None),
    numeric("Min", 2, GLOp::FMin, GLOp::SMin, Some(GLOp::UMin)),
    numeric("Max", 2, GLOp::FMax, GLOp::SMax, Some(GLOp::UMax)),
    numeric("Clamp", 3, GLOp::FClamp, GLOp::SClamp, Some(GLOp::UClamp)),
    float_only("Floor", 1, GLOp::Floor),
    float_only("Ceil", 1, GLOp::Ceil),
    float_only("Fract", 1, GLOp::Fract),
    float_only("Round", 1, GLOp::Round),
    float_only("Trunc", 1, GLOp::Trunc),
    float_only("Lerp", 3, GLOp::FMix),
    float_only("Step", 2, GLOp::Step),
    float_only("SmoothStep", 3, GLOp::SmoothStep),
    float_only("Fma", 3, GLOp::Fma),
    // Geometric
    shaped("Length", 1, GLOp::Length, Shape::Reduce),
    shaped("Distance", 2, GLOp::Distance, Shape::Reduce),
    float_only("Normalize", 1, GLOp::Normalize),
    float_only("Reflect", 2, GLOp::Reflect),
    float_only("FaceForward", 3, GLOp::FaceForward),
    shaped("Refract", 3, GLOp::Refract, Shape::TrailingScalar),
    shaped("Cross", 2, GLOp::Cross, Shape::Vec3Only),
    // Matrix
    shaped("Determinant", 1, GLOp::Determinant, Shape::SquareMatrix),
    shaped("Inverse", 1, GLOp::MatrixInverse, Shape::SquareMatrix),
];

/// Register every table entry for each width it supports
pub fn register(registry: &mut ResolverRegistry) {
    let mut count = 0usize;
    for intrinsic in INTRINSICS {
        for (params, _result) in signatures(intrinsic) {
            let Some(op) = instruction_for(intrinsic, &params[0]) else {
                continue;
            };
            registry.register_function(
                FunctionKey::new("Math", intrinsic.name, params),
                resolver(move |gen, ctx, a| {
                    let result = gen.type_id(a.result, a.location);
                    gen.ext_inst(ctx, result, op, a.args)
                }),
            );
            count += 1;
        }
    }
    tracing::trace!("Registered {} GLSL.std.450 overloads", count);
}

/// Instruction for the scalar kind of the first operand
fn instruction_for(intrinsic: &Intrinsic, first: &TypeRef) -> Option<GLOp> {
    match first.scalar()? {
        Scalar::Float => intrinsic.float,
        Scalar::Int => intrinsic.sint,
        Scalar::UInt => intrinsic.uint,
        Scalar::Bool => None,
    }
}

/// Every (parameter list, result) pair an entry is registered for
pub fn signatures(intrinsic: &Intrinsic) -> Vec<(Vec<TypeRef>, TypeRef)> {
    let mut out = Vec::new();
    match intrinsic.shape {
        Shape::Componentwise => {
            let scalars = [
                (Scalar::Float, intrinsic.float),
                (Scalar::Int, intrinsic.sint),
                (Scalar::UInt, intrinsic.uint),
            ];
            for (scalar, op) in scalars {
                if op.is_none() {
                    continue;
                }
                for width in 1..=4 {
                    let ty = with_width(scalar, width);
                    out.push((vec![ty.clone(); intrinsic.arity], ty));
                }
            }
        }
        Shape::Reduce => {
            for width in 1..=4 {
                let ty = with_width(Scalar::Float, width);
                out.push((vec![ty; intrinsic.arity], TypeRef::Float));
            }
        }
        Shape::TrailingScalar => {
            for width in 2..=4 {
                let ty = TypeRef::float_vec(width);
                let mut params = vec![ty.clone(); intrinsic.arity - 1];
                params.push(TypeRef::Float);
                out.push((params, ty));
            }
        }
        Shape::Vec3Only => {
            let ty = TypeRef::float_vec(3);
            out.push((vec![ty.clone(); intrinsic.arity], ty));
        }
        Shape::SquareMatrix => {
            for n in 2..=4 {
                let ty = TypeRef::Matrix {
                    rows: n,
                    columns: n,
                };
                let result = if intrinsic.float == Some(GLOp::Determinant) {
                    TypeRef::Float
                } else {
                    ty.clone()
                };
                out.push((vec![ty; intrinsic.arity], result));
            }
        }
    }
    out
}

/// Operand list of an `OpExtInst`
pub fn ext_inst_operands(
    set: crate::compiler::ir::ImportId,
    op: GLOp,
    args: &[crate::compiler::ir::OpId],
) -> Vec<Operand> {
    let mut operands = Vec::with_capacity(args.len() + 2);
    operands.push(Operand::Import(set));
    operands.push(Operand::Literal(op as u32));
    operands.extend(args.iter().map(|&a| Operand::Op(a)));
    operands
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_has_all_scalar_kinds() {
        let clamp = INTRINSICS.iter().find(|i| i.name == "Clamp").unwrap();
        let sigs = signatures(clamp);
        assert_eq!(sigs.len(), 12);
        assert!(sigs
            .iter()
            .any(|(p, r)| *r == TypeRef::float_vec(3) && p.len() == 3));
    }

    #[test]
    fn test_length_reduces_to_float() {
        let length = INTRINSICS.iter().find(|i| i.name == "Length").unwrap();
        assert!(signatures(length).iter().all(|(_, r)| *r == TypeRef::Float));
    }

    #[test]
    fn test_ext_inst_operands_layout() {
        let ops = ext_inst_operands(
            crate::compiler::ir::ImportId(0),
            GLOp::FClamp,
            &[crate::compiler::ir::OpId(7)],
        );
        assert_eq!(ops[1], Operand::Literal(43));
        assert_eq!(ops.len(), 3);
    }
}
