//! Wire-level type definitions

use super::instruction::OpId;
use crate::parser::ImageDesc;
use rspirv::spirv::{Decoration, StorageClass};

/// Index of a type inside its [`Library`](super::Library)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

/// A decoration with its literal operands
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecorationEntry {
    /// Decoration kind
    pub decoration: Decoration,
    /// Literal operands following the decoration
    pub operands: Vec<u32>,
}

impl DecorationEntry {
    /// Decoration with no operands
    pub fn flag(decoration: Decoration) -> Self {
        Self {
            decoration,
            operands: Vec::new(),
        }
    }

    /// Decoration with a single literal
    pub fn with(decoration: Decoration, value: u32) -> Self {
        Self {
            decoration,
            operands: vec![value],
        }
    }
}

/// A member of a struct type, in wire layout order
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructMember {
    /// Member name (debug info and field resolution)
    pub name: String,
    /// Member type
    pub ty: TypeId,
}

/// Shape of a type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// No value
    Void,
    /// Boolean
    Bool,
    /// 32-bit integer
    Int {
        /// Signedness (1 for Int, 0 for UInt on the wire)
        signed: bool,
    },
    /// 32-bit float
    Float,
    /// Vector of scalars
    Vector {
        /// Component scalar type
        component: TypeId,
        /// Component count (2-4)
        count: u32,
    },
    /// Column-major matrix
    Matrix {
        /// Column vector type
        column: TypeId,
        /// Number of columns
        columns: u32,
    },
    /// Sized array
    FixedArray {
        /// Element type
        element: TypeId,
        /// Int constant holding the length
        length: OpId,
    },
    /// Unsized array
    RuntimeArray {
        /// Element type
        element: TypeId,
    },
    /// Struct with ordered members
    Struct {
        /// Members in layout order
        members: Vec<StructMember>,
    },
    /// Function signature
    Function {
        /// Return type
        return_type: TypeId,
        /// Parameter types in order
        params: Vec<TypeId>,
    },
    /// Pointer into a storage class
    Pointer {
        /// Address space
        storage: StorageClass,
        /// Pointed-to type
        pointee: TypeId,
    },
    /// Image
    Image {
        /// Sampled component type
        sampled: TypeId,
        /// Image shape
        desc: ImageDesc,
    },
    /// Image combined with a sampler
    SampledImage {
        /// Underlying image type
        image: TypeId,
    },
    /// Sampler
    Sampler,
}

/// A type owned by the library
#[derive(Debug, Clone)]
pub struct Type {
    /// Source-level name (`Float3`, `Light`, ...)
    pub name: String,
    /// Wire shape
    pub kind: TypeKind,
    /// Type-level decorations (`Block`, `ArrayStride`)
    pub decorations: Vec<DecorationEntry>,
    /// Per-member decorations as (member index, decoration)
    pub member_decorations: Vec<(u32, DecorationEntry)>,
}

impl Type {
    /// Create an undecorated type
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            decorations: Vec::new(),
            member_decorations: Vec::new(),
        }
    }

    /// True for pointer types
    pub fn is_pointer(&self) -> bool {
        matches!(self.kind, TypeKind::Pointer { .. })
    }

    /// Pointee of a pointer type
    pub fn pointee(&self) -> Option<TypeId> {
        match self.kind {
            TypeKind::Pointer { pointee, .. } => Some(pointee),
            _ => None,
        }
    }

    /// Member list of a struct type
    pub fn members(&self) -> Option<&[StructMember]> {
        match &self.kind {
            TypeKind::Struct { members } => Some(members),
            _ => None,
        }
    }

    /// Index of a named struct member
    pub fn member_index(&self, name: &str) -> Option<u32> {
        self.members()?
            .iter()
            .position(|m| m.name == name)
            .map(|i| i as u32)
    }

    /// Add a decoration unless an identical one is present
    pub fn decorate(&mut self, entry: DecorationEntry) {
        if !self.decorations.contains(&entry) {
            self.decorations.push(entry);
        }
    }

    /// Add a member decoration unless an identical one is present
    pub fn decorate_member(&mut self, member: u32, entry: DecorationEntry) {
        let pair = (member, entry);
        if !self.member_decorations.contains(&pair) {
            self.member_decorations.push(pair);
        }
    }
}
