//! IR instruction definitions

use super::types::TypeId;
use crate::parser::SourceLocation;
use rspirv::spirv;

/// Index of an op inside its library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId(pub u32);

/// Index of a constant literal payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LiteralId(pub u32);

/// Index of a function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(pub u32);

/// Index of a basic block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

/// Index of an extended instruction set import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImportId(pub u32);

/// Scalar payload of a constant (floats are held as their IEEE bits so the
/// value can be hashed and compared exactly)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiteralValue {
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i32),
    /// Unsigned integer
    UInt(u32),
    /// Float bits
    Float(u32),
}

impl LiteralValue {
    /// Float literal from its value
    pub fn float(value: f32) -> Self {
        LiteralValue::Float(value.to_bits())
    }

    /// The single wire word of this literal
    pub fn word(&self) -> u32 {
        match *self {
            LiteralValue::Bool(b) => b as u32,
            LiteralValue::Int(i) => i as u32,
            LiteralValue::UInt(u) => u,
            LiteralValue::Float(bits) => bits,
        }
    }

    /// Float view (integers are converted)
    pub fn as_f32(&self) -> f32 {
        match *self {
            LiteralValue::Bool(b) => b as u32 as f32,
            LiteralValue::Int(i) => i as f32,
            LiteralValue::UInt(u) => u as f32,
            LiteralValue::Float(bits) => f32::from_bits(bits),
        }
    }
}

/// Immutable scalar payload plus its owning type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstantLiteral {
    /// Scalar type of the payload
    pub ty: TypeId,
    /// Payload
    pub value: LiteralValue,
}

/// Instruction argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    /// Result of another op (value or pointer)
    Op(OpId),
    /// Constant literal payload, written as its raw word
    Constant(LiteralId),
    /// Raw literal word (storage class, extended opcode, member index)
    Literal(u32),
    /// Function reference (calls)
    Function(FunctionId),
    /// Block reference (branches)
    Block(BlockId),
    /// Extended instruction set reference
    Import(ImportId),
}

/// One IR instruction
#[derive(Debug, Clone)]
pub struct Op {
    /// Opcode
    pub code: spirv::Op,
    /// Result type (None for instructions that produce nothing)
    pub result_type: Option<TypeId>,
    /// Ordered arguments
    pub args: Vec<Operand>,
    /// Debug name written as `OpName`
    pub debug_name: Option<String>,
    /// Originating source location
    pub location: Option<SourceLocation>,
}

impl Op {
    /// Op without debug info
    pub fn new(code: spirv::Op, result_type: Option<TypeId>, args: Vec<Operand>) -> Self {
        Self {
            code,
            result_type,
            args,
            debug_name: None,
            location: None,
        }
    }

    /// Attach a debug name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.debug_name = Some(name.into());
        self
    }

    /// Whether this op defines a result ID
    pub fn has_result(&self) -> bool {
        self.result_type.is_some()
    }
}

/// Block terminators
pub fn is_terminator(code: spirv::Op) -> bool {
    matches!(
        code,
        spirv::Op::Return
            | spirv::Op::ReturnValue
            | spirv::Op::Branch
            | spirv::Op::BranchConditional
            | spirv::Op::Switch
            | spirv::Op::Kill
            | spirv::Op::Unreachable
    )
}

/// Module-scope constant opcodes (regular and specialization)
pub fn is_constant(code: spirv::Op) -> bool {
    matches!(
        code,
        spirv::Op::Constant
            | spirv::Op::ConstantTrue
            | spirv::Op::ConstantFalse
            | spirv::Op::ConstantComposite
            | spirv::Op::SpecConstant
            | spirv::Op::SpecConstantTrue
            | spirv::Op::SpecConstantFalse
            | spirv::Op::SpecConstantComposite
    )
}

/// Specialization constant opcodes
pub fn is_spec_constant(code: spirv::Op) -> bool {
    matches!(
        code,
        spirv::Op::SpecConstant
            | spirv::Op::SpecConstantTrue
            | spirv::Op::SpecConstantFalse
            | spirv::Op::SpecConstantComposite
    )
}

/// Scalar specialization constants (the ones that receive a `SpecId`)
pub fn is_scalar_spec_constant(code: spirv::Op) -> bool {
    matches!(
        code,
        spirv::Op::SpecConstant | spirv::Op::SpecConstantTrue | spirv::Op::SpecConstantFalse
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_literal_bits() {
        let lit = LiteralValue::float(1.0);
        assert_eq!(lit.word(), 0x3f80_0000);
        assert_eq!(lit.as_f32(), 1.0);
        assert_eq!(LiteralValue::Int(-1).word(), u32::MAX);
    }

    #[test]
    fn test_opcode_classes() {
        assert!(is_terminator(spirv::Op::Kill));
        assert!(!is_terminator(spirv::Op::Store));
        assert!(is_constant(spirv::Op::SpecConstantComposite));
        assert!(!is_scalar_spec_constant(spirv::Op::SpecConstantComposite));
        assert!(!Op::new(spirv::Op::Store, None, vec![]).has_result());
    }
}
