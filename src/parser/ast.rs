use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a node in the original shader source
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct SourceLocation {
    /// Originating file (or fragment) name
    pub file: String,
    /// 1-based line
    pub line: u32,
    /// 1-based column
    pub column: u32,
}

impl SourceLocation {
    /// Create a location
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Scalar component kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Scalar {
    /// Boolean
    Bool,
    /// 32-bit signed integer
    Int,
    /// 32-bit unsigned integer
    UInt,
    /// 32-bit float
    Float,
}

impl Scalar {
    /// The scalar as a standalone type
    pub fn to_type(self) -> TypeRef {
        match self {
            Scalar::Bool => TypeRef::Bool,
            Scalar::Int => TypeRef::Int,
            Scalar::UInt => TypeRef::UInt,
            Scalar::Float => TypeRef::Float,
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            Scalar::Bool => "Bool",
            Scalar::Int => "Int",
            Scalar::UInt => "UInt",
            Scalar::Float => "Float",
        }
    }
}

/// Image dimensionality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageDim {
    /// 1D image
    Dim1D,
    /// 2D image
    Dim2D,
    /// 3D image
    Dim3D,
    /// Cube map
    Cube,
}

/// Shape of an image type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageDesc {
    /// Dimensionality
    pub dim: ImageDim,
    /// Depth-comparison image
    pub depth: bool,
    /// Arrayed image
    pub arrayed: bool,
    /// Multisampled image
    pub multisampled: bool,
    /// Read/write storage image (otherwise sampled)
    pub storage: bool,
}

impl ImageDesc {
    /// A plain sampled 2D float image
    pub fn sampled_2d() -> Self {
        Self {
            dim: ImageDim::Dim2D,
            depth: false,
            arrayed: false,
            multisampled: false,
            storage: false,
        }
    }
}

/// Resolved source type as produced by the host type checker
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeRef {
    /// No value
    Void,
    /// Boolean scalar
    Bool,
    /// Signed integer scalar
    Int,
    /// Unsigned integer scalar
    UInt,
    /// Float scalar
    Float,
    /// Vector of 2-4 scalars
    Vector(Scalar, u32),
    /// Float matrix, stored column-major
    Matrix {
        /// Components per column
        rows: u32,
        /// Number of column vectors
        columns: u32,
    },
    /// Array with a compile-time length
    FixedArray(Box<TypeRef>, u32),
    /// Unsized array backed by a storage buffer
    RuntimeArray(Box<TypeRef>),
    /// Image without a sampler
    Image(ImageDesc),
    /// Image combined with a sampler
    SampledImage(ImageDesc),
    /// Standalone sampler
    Sampler,
    /// User declared struct or enum
    Named(String),
}

impl TypeRef {
    /// Shorthand for a float vector
    pub fn float_vec(n: u32) -> Self {
        TypeRef::Vector(Scalar::Float, n)
    }

    /// Shorthand for an integer vector
    pub fn int_vec(n: u32) -> Self {
        TypeRef::Vector(Scalar::Int, n)
    }

    /// Shorthand for a named type
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named(name.into())
    }

    /// Scalar kind of a scalar or vector type
    pub fn scalar(&self) -> Option<Scalar> {
        match self {
            TypeRef::Bool => Some(Scalar::Bool),
            TypeRef::Int => Some(Scalar::Int),
            TypeRef::UInt => Some(Scalar::UInt),
            TypeRef::Float => Some(Scalar::Float),
            TypeRef::Vector(s, _) => Some(*s),
            TypeRef::Matrix { .. } => Some(Scalar::Float),
            _ => None,
        }
    }

    /// True for bool/int/uint/float
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            TypeRef::Bool | TypeRef::Int | TypeRef::UInt | TypeRef::Float
        )
    }

    /// Number of top-level components (1 for scalars)
    pub fn component_count(&self) -> u32 {
        match self {
            TypeRef::Vector(_, n) => *n,
            TypeRef::Matrix { columns, .. } => *columns,
            TypeRef::FixedArray(_, n) => *n,
            _ => 1,
        }
    }

    /// Type of one top-level component (column for matrices)
    pub fn component_type(&self) -> Option<TypeRef> {
        match self {
            TypeRef::Vector(s, _) => Some(s.to_type()),
            TypeRef::Matrix { rows, .. } => Some(TypeRef::float_vec(*rows)),
            TypeRef::FixedArray(element, _) | TypeRef::RuntimeArray(element) => {
                Some((**element).clone())
            }
            _ => None,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TypeRef::Void => write!(f, "Void"),
            TypeRef::Bool => write!(f, "Bool"),
            TypeRef::Int => write!(f, "Int"),
            TypeRef::UInt => write!(f, "UInt"),
            TypeRef::Float => write!(f, "Float"),
            TypeRef::Vector(s, n) => write!(f, "{}{}", s.prefix(), n),
            TypeRef::Matrix { rows, columns } => write!(f, "Float{}x{}", rows, columns),
            TypeRef::FixedArray(element, n) => write!(f, "FixedArray[{}, {}]", element, n),
            TypeRef::RuntimeArray(element) => write!(f, "RuntimeArray[{}]", element),
            TypeRef::Image(desc) => write!(f, "Image{:?}", desc.dim),
            TypeRef::SampledImage(desc) => write!(f, "SampledImage{:?}", desc.dim),
            TypeRef::Sampler => write!(f, "Sampler"),
            TypeRef::Named(name) => write!(f, "{}", name),
        }
    }
}

/// Attribute argument value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// Integer literal
    Int(i64),
    /// Float literal
    Float(f64),
    /// Boolean literal
    Bool(bool),
    /// String literal
    Str(String),
    /// Bare identifier (e.g. `Position`, `Triangles`)
    Ident(String),
}

/// One (optionally named) attribute argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeParam {
    /// Parameter name (None for positional)
    pub name: Option<String>,
    /// Parameter value
    pub value: AttributeValue,
}

/// Attribute attached to a declaration, e.g. `[Compute(localSizeX: 8)]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute name
    pub name: String,
    /// Arguments in source order
    pub params: Vec<AttributeParam>,
}

impl Attribute {
    /// Attribute without parameters
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    /// Append a named parameter
    pub fn with(mut self, name: impl Into<String>, value: AttributeValue) -> Self {
        self.params.push(AttributeParam {
            name: Some(name.into()),
            value,
        });
        self
    }

    /// Append a positional parameter
    pub fn with_positional(mut self, value: AttributeValue) -> Self {
        self.params.push(AttributeParam { name: None, value });
        self
    }
}

/// Find the first attribute with the given name
pub fn find_attribute<'a>(attributes: &'a [Attribute], name: &str) -> Option<&'a Attribute> {
    attributes.iter().find(|a| a.name == name)
}

/// Complete type-checked module handed over by the host compiler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Module {
    /// Struct declarations in source order
    pub structs: Vec<StructDecl>,
    /// Enum declarations in source order
    pub enums: Vec<EnumDecl>,
}

/// Struct (or rejected class) declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StructDecl {
    /// Type name
    pub name: String,
    /// Declaration attributes (stage attributes live here)
    pub attributes: Vec<Attribute>,
    /// Instance and static fields
    pub fields: Vec<FieldDecl>,
    /// Properties with getter/setter bodies
    pub properties: Vec<PropertyDecl>,
    /// User constructors
    pub constructors: Vec<FunctionDecl>,
    /// Member functions
    pub functions: Vec<FunctionDecl>,
    /// Declared as a reference type (`class`)
    pub is_reference_type: bool,
    /// Base type name if the declaration inherits
    pub base: Option<String>,
    /// Declares a destructor
    pub has_destructor: bool,
    /// Declaration location
    pub location: SourceLocation,
}

/// Field declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    /// Field name
    pub name: String,
    /// Field type
    pub ty: TypeRef,
    /// Static (module-scope) field
    pub is_static: bool,
    /// Field attributes (`Input`, `Uniform`, `SpecConstant`, ...)
    pub attributes: Vec<Attribute>,
    /// Initial value expression
    pub initializer: Option<Expression>,
    /// Declaration location
    pub location: SourceLocation,
}

/// Property with user-defined accessors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDecl {
    /// Property name
    pub name: String,
    /// Property type
    pub ty: TypeRef,
    /// Static property
    pub is_static: bool,
    /// Getter body
    pub getter: Option<Vec<Statement>>,
    /// Setter body; the assigned value is the local `value`
    pub setter: Option<Vec<Statement>>,
    /// Declaration attributes
    pub attributes: Vec<Attribute>,
    /// Declaration location
    pub location: SourceLocation,
}

/// Function parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    /// Parameter name
    pub name: String,
    /// Parameter type
    pub ty: TypeRef,
    /// Passed by reference (pointer parameter)
    pub by_ref: bool,
}

/// Function or constructor declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    /// Function name
    pub name: String,
    /// Parameters (excluding the implicit self)
    pub params: Vec<Param>,
    /// Return type
    pub return_type: TypeRef,
    /// Static function (no implicit self)
    pub is_static: bool,
    /// Function attributes
    pub attributes: Vec<Attribute>,
    /// Body statements
    pub body: Vec<Statement>,
    /// Declaration location
    pub location: SourceLocation,
}

/// Enum declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDecl {
    /// Enum name
    pub name: String,
    /// Values in declaration order
    pub values: Vec<EnumValue>,
}

/// Single enum value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumValue {
    /// Value name
    pub name: String,
    /// Integral value
    pub value: i32,
}

/// One `if`/`else if`/`else` part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfPart {
    /// Condition (None for a trailing `else`)
    pub condition: Option<Expression>,
    /// Statements of this part
    pub body: Vec<Statement>,
}

/// Statements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    /// Local variable declaration: `var x : T = init`
    VarDecl {
        /// Variable name
        name: String,
        /// Declared type
        ty: TypeRef,
        /// Optional initializer
        initializer: Option<Expression>,
        /// Declaration location
        location: SourceLocation,
    },

    /// Expression statement
    Expression(Expression),

    /// If / else-if / else chain
    If {
        /// Parts in source order
        parts: Vec<IfPart>,
    },

    /// While loop
    While {
        /// Loop condition expression
        condition: Expression,
        /// Statements to execute in loop body
        body: Vec<Statement>,
    },

    /// Do-while loop
    DoWhile {
        /// Statements to execute in loop body
        body: Vec<Statement>,
        /// Condition evaluated after each iteration
        condition: Expression,
    },

    /// C-style for loop
    For {
        /// Initializer statement
        init: Option<Box<Statement>>,
        /// Loop condition (None loops until break)
        condition: Option<Expression>,
        /// Iterator expression run in the continue block
        step: Option<Expression>,
        /// Statements to execute in loop body
        body: Vec<Statement>,
    },

    /// Unconditional loop
    Loop {
        /// Statements to execute in loop body
        body: Vec<Statement>,
    },

    /// Range-based iteration (not translatable)
    ForEach {
        /// Loop variable name
        variable: String,
        /// Expression to iterate over
        iterable: Expression,
        /// Statements to execute in loop body
        body: Vec<Statement>,
        /// Statement location
        location: SourceLocation,
    },

    /// Break statement
    Break {
        /// Statement location
        location: SourceLocation,
    },

    /// Continue statement
    Continue {
        /// Statement location
        location: SourceLocation,
    },

    /// Return statement
    Return {
        /// Optional value to return
        value: Option<Expression>,
        /// Statement location
        location: SourceLocation,
    },

    /// Nested scope block
    Scope(Vec<Statement>),
}

/// Literal values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    /// Boolean literal
    Bool(bool),
    /// Signed integer literal
    Int(i32),
    /// Unsigned integer literal
    UInt(u32),
    /// Float literal
    Float(f32),
}

/// Call target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Callee {
    /// Instance method call: `target.name(args)`
    Method {
        /// Receiver expression
        target: Box<Expression>,
        /// Method name
        name: String,
    },
    /// Static call: `Owner.name(args)`
    Static {
        /// Owning type (user struct or built-in library such as `Math`)
        owner: String,
        /// Function name
        name: String,
    },
}

/// Expression node with its resolved type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    /// Expression shape
    pub kind: ExprKind,
    /// Resolved result type
    pub ty: TypeRef,
    /// Source location
    pub location: SourceLocation,
}

/// Expression shapes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    /// Literal constant
    Literal(Literal),
    /// Local variable or parameter reference
    Local(String),
    /// The implicit `this` of an instance function
    SelfRef,
    /// Member access: field, property or swizzle
    Member {
        /// Accessed value
        target: Box<Expression>,
        /// Member name
        name: String,
    },
    /// Static member access: static field, spec constant or enum value
    StaticMember {
        /// Owning type name
        owner: String,
        /// Member name
        name: String,
    },
    /// Indexing into an array, vector or matrix
    Index {
        /// Indexed value
        target: Box<Expression>,
        /// Index expression
        index: Box<Expression>,
    },
    /// Binary operation (including assignments)
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        lhs: Box<Expression>,
        /// Right operand
        rhs: Box<Expression>,
    },
    /// Unary operation
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        operand: Box<Expression>,
    },
    /// Conversion of the operand to this expression's type
    Cast {
        /// Value being converted
        operand: Box<Expression>,
    },
    /// Function call
    Call {
        /// Call target
        callee: Callee,
        /// Arguments in order
        args: Vec<Expression>,
    },
    /// Constructor call of this expression's type
    Construct {
        /// Constructor arguments
        args: Vec<Expression>,
    },
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    // Arithmetic
    /// Addition operator (+)
    Add,
    /// Subtraction operator (-)
    Sub,
    /// Multiplication operator (*)
    Mul,
    /// Division operator (/)
    Div,
    /// Modulo operator (%)
    Mod,

    // Comparison
    /// Equality operator (==)
    Eq,
    /// Inequality operator (!=)
    NotEq,
    /// Less than operator (<)
    Lt,
    /// Greater than operator (>)
    Gt,
    /// Less than or equal operator (<=)
    LtEq,
    /// Greater than or equal operator (>=)
    GtEq,

    // Logical
    /// Short-circuit AND operator (&&)
    And,
    /// Short-circuit OR operator (||)
    Or,

    // Bitwise
    /// Bitwise AND (&)
    BitAnd,
    /// Bitwise OR (|)
    BitOr,
    /// Bitwise XOR (^)
    BitXor,
    /// Left shift (<<)
    Shl,
    /// Right shift (>>)
    Shr,

    // Assignment
    /// Plain assignment (=)
    Assign,
    /// Add-assign (+=)
    AddAssign,
    /// Subtract-assign (-=)
    SubAssign,
    /// Multiply-assign (*=)
    MulAssign,
    /// Divide-assign (/=)
    DivAssign,
    /// Modulo-assign (%=)
    ModAssign,
}

impl BinaryOp {
    /// Arithmetic operator performed by a compound assignment
    pub fn compound_base(&self) -> Option<BinaryOp> {
        match self {
            BinaryOp::AddAssign => Some(BinaryOp::Add),
            BinaryOp::SubAssign => Some(BinaryOp::Sub),
            BinaryOp::MulAssign => Some(BinaryOp::Mul),
            BinaryOp::DivAssign => Some(BinaryOp::Div),
            BinaryOp::ModAssign => Some(BinaryOp::Mod),
            _ => None,
        }
    }

    /// True for comparison operators
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Lt
                | BinaryOp::Gt
                | BinaryOp::LtEq
                | BinaryOp::GtEq
        )
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Negation operator (-x)
    Neg,
    /// Logical NOT operator (!x)
    Not,
    /// Bitwise NOT operator (~x)
    BitNot,
    /// Pre-increment (++x)
    PreIncrement,
    /// Pre-decrement (--x)
    PreDecrement,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::LtEq => "<=",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Assign => "=",
            BinaryOp::AddAssign => "+=",
            BinaryOp::SubAssign => "-=",
            BinaryOp::MulAssign => "*=",
            BinaryOp::DivAssign => "/=",
            BinaryOp::ModAssign => "%=",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UnaryOp::Neg => write!(f, "-"),
            UnaryOp::Not => write!(f, "!"),
            UnaryOp::BitNot => write!(f, "~"),
            UnaryOp::PreIncrement => write!(f, "++"),
            UnaryOp::PreDecrement => write!(f, "--"),
        }
    }
}

// Convenience constructors used by hosts that build ASTs in code (and by tests)
impl Expression {
    /// Wrap a kind with its type at the default location
    pub fn new(kind: ExprKind, ty: TypeRef) -> Self {
        Self {
            kind,
            ty,
            location: SourceLocation::default(),
        }
    }

    /// Integer literal
    pub fn int(value: i32) -> Self {
        Self::new(ExprKind::Literal(Literal::Int(value)), TypeRef::Int)
    }

    /// Float literal
    pub fn float(value: f32) -> Self {
        Self::new(ExprKind::Literal(Literal::Float(value)), TypeRef::Float)
    }

    /// Boolean literal
    pub fn boolean(value: bool) -> Self {
        Self::new(ExprKind::Literal(Literal::Bool(value)), TypeRef::Bool)
    }

    /// Local variable reference
    pub fn local(name: impl Into<String>, ty: TypeRef) -> Self {
        Self::new(ExprKind::Local(name.into()), ty)
    }

    /// Binary operation producing `ty`
    pub fn binary(op: BinaryOp, lhs: Expression, rhs: Expression, ty: TypeRef) -> Self {
        Self::new(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty,
        )
    }

    /// Assignment `lhs = rhs`
    pub fn assign(lhs: Expression, rhs: Expression) -> Self {
        Self::binary(BinaryOp::Assign, lhs, rhs, TypeRef::Void)
    }

    /// Member access producing `ty`
    pub fn member(target: Expression, name: impl Into<String>, ty: TypeRef) -> Self {
        Self::new(
            ExprKind::Member {
                target: Box::new(target),
                name: name.into(),
            },
            ty,
        )
    }

    /// Static member access producing `ty`
    pub fn static_member(owner: impl Into<String>, name: impl Into<String>, ty: TypeRef) -> Self {
        Self::new(
            ExprKind::StaticMember {
                owner: owner.into(),
                name: name.into(),
            },
            ty,
        )
    }

    /// Static call producing `ty`
    pub fn call_static(
        owner: impl Into<String>,
        name: impl Into<String>,
        args: Vec<Expression>,
        ty: TypeRef,
    ) -> Self {
        Self::new(
            ExprKind::Call {
                callee: Callee::Static {
                    owner: owner.into(),
                    name: name.into(),
                },
                args,
            },
            ty,
        )
    }

    /// Constructor call of `ty`
    pub fn construct(ty: TypeRef, args: Vec<Expression>) -> Self {
        Self::new(ExprKind::Construct { args }, ty)
    }

    /// Attach a source location
    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = location;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(TypeRef::float_vec(3).to_string(), "Float3");
        assert_eq!(TypeRef::Matrix { rows: 4, columns: 3 }.to_string(), "Float4x3");
        assert_eq!(
            TypeRef::FixedArray(Box::new(TypeRef::Int), 4).to_string(),
            "FixedArray[Int, 4]"
        );
    }

    #[test]
    fn test_matrix_components_are_columns() {
        let m = TypeRef::Matrix { rows: 3, columns: 2 };
        assert_eq!(m.component_count(), 2);
        assert_eq!(m.component_type(), Some(TypeRef::float_vec(3)));
    }

    #[test]
    fn test_compound_base() {
        assert_eq!(BinaryOp::AddAssign.compound_base(), Some(BinaryOp::Add));
        assert_eq!(BinaryOp::Assign.compound_base(), None);
        assert!(BinaryOp::LtEq.is_comparison());
    }
}
