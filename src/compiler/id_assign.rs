//! Result ID assignment
//!
//! Numbers every collected entity with a dense ID starting at 1: imports,
//! types, constants and globals first, then each function in collection
//! order (the function, its parameters, then per block the label, the
//! locals and every line that has a result). Scalar specialization constants
//! additionally get sequential `SpecId`s starting at 1.

use crate::compiler::collector::Collection;
use crate::compiler::ir::{
    is_scalar_spec_constant, BlockId, FunctionId, ImportId, Library, OpId, Operand, TypeId,
};
use rspirv::spirv;
use std::collections::HashMap;

/// Anything that receives a result ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    /// Extended instruction set
    Import(ImportId),
    /// Type declaration
    Type(TypeId),
    /// Constant, global, parameter, local or instruction
    Op(OpId),
    /// Function
    Function(FunctionId),
    /// Block label
    Block(BlockId),
}

/// Assigned IDs of one module
#[derive(Debug, Clone, Default)]
pub struct IdMap {
    ids: HashMap<Entity, u32>,
    spec_ids: HashMap<OpId, u32>,
    bound: u32,
}

impl IdMap {
    /// ID of an entity
    pub fn get(&self, entity: Entity) -> Option<u32> {
        self.ids.get(&entity).copied()
    }

    /// One past the largest assigned ID
    pub fn bound(&self) -> u32 {
        self.bound
    }

    /// Number of assigned IDs
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether nothing was assigned
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// `SpecId` of a scalar specialization constant
    ///
    /// Numbering is per module: only the constants collected for this entry
    /// point are counted, so one constant can get different `SpecId`s in the
    /// binaries of different stages. Each binary's reflection reports its own.
    pub fn spec_id(&self, op: OpId) -> Option<u32> {
        self.spec_ids.get(&op).copied()
    }

    /// `SpecId` of a specialization constant; composites report their first leaf
    pub fn first_leaf_spec_id(&self, lib: &Library, op: OpId) -> Option<u32> {
        let mut current = op;
        loop {
            if let Some(id) = self.spec_id(current) {
                return Some(id);
            }
            if lib.op(current).code != spirv::Op::SpecConstantComposite {
                return None;
            }
            match lib.op(current).args.first() {
                Some(Operand::Op(first)) => current = *first,
                _ => return None,
            }
        }
    }

    /// Scalar spec constants with their `SpecId`, in ID order
    pub fn spec_constants(&self) -> Vec<(OpId, u32)> {
        let mut out: Vec<(OpId, u32)> = self.spec_ids.iter().map(|(&o, &i)| (o, i)).collect();
        out.sort_by_key(|&(_, id)| id);
        out
    }
}

/// Assigns IDs to a collected module
#[derive(Debug, Default)]
pub struct IdAssignor {
    map: IdMap,
    next: u32,
}

impl IdAssignor {
    /// Assign IDs to everything in `collection`
    pub fn assign(lib: &Library, collection: &Collection) -> IdMap {
        let mut assignor = Self {
            map: IdMap::default(),
            next: 1,
        };

        for &import in &collection.imports {
            assignor.number(Entity::Import(import));
        }
        for &ty in &collection.types {
            assignor.number(Entity::Type(ty));
        }
        for &constant in &collection.constants {
            assignor.number(Entity::Op(constant));
        }
        for &global in &collection.globals {
            assignor.number(Entity::Op(global));
        }
        for &function in &collection.functions {
            let f = lib.function(function);
            assignor.number(Entity::Function(function));
            for &param in &f.params {
                assignor.number(Entity::Op(param));
            }
            for &block in &f.blocks {
                assignor.number(Entity::Block(block));
                let b = lib.block(block);
                for &local in &b.locals {
                    assignor.number(Entity::Op(local));
                }
                for &line in &b.lines {
                    let op = lib.op(line);
                    if op.has_result() && op.code != spirv::Op::Undef {
                        assignor.number(Entity::Op(line));
                    }
                }
            }
        }

        let mut spec_id = 1;
        for &constant in &collection.constants {
            if is_scalar_spec_constant(lib.op(constant).code) {
                assignor.map.spec_ids.insert(constant, spec_id);
                spec_id += 1;
            }
        }

        assignor.map.bound = assignor.next;
        tracing::debug!("Assigned IDs, bound {}", assignor.map.bound);
        assignor.map
    }

    fn number(&mut self, entity: Entity) {
        if let std::collections::hash_map::Entry::Vacant(slot) = self.map.ids.entry(entity) {
            slot.insert(self.next);
            self.next += 1;
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::{LiteralValue, Op};

    #[test]
    fn test_sections_are_numbered_in_order() {
        let mut lib = Library::new();
        let import = lib.import("GLSL.std.450");
        let float = lib.float();
        let one = lib.float_constant(1.0);
        let collection = Collection {
            imports: vec![import],
            types: vec![float],
            constants: vec![one],
            ..Default::default()
        };
        let map = IdAssignor::assign(&lib, &collection);
        assert_eq!(map.get(Entity::Import(import)), Some(1));
        assert_eq!(map.get(Entity::Type(float)), Some(2));
        assert_eq!(map.get(Entity::Op(one)), Some(3));
        assert_eq!(map.bound(), 4);
    }

    #[test]
    fn test_spec_ids_follow_scalar_leaves() {
        let mut lib = Library::new();
        let float = lib.float();
        let v2 = lib.vector(float, 2);
        let lit = lib.literal_of(float, LiteralValue::float(0.0));
        let x = lib.add_op(Op::new(
            spirv::Op::SpecConstant,
            Some(float),
            vec![Operand::Constant(lit)],
        ));
        let y = lib.add_op(Op::new(
            spirv::Op::SpecConstant,
            Some(float),
            vec![Operand::Constant(lit)],
        ));
        let v = lib.add_op(Op::new(
            spirv::Op::SpecConstantComposite,
            Some(v2),
            vec![Operand::Op(x), Operand::Op(y)],
        ));
        let collection = Collection {
            types: vec![float, v2],
            constants: vec![x, y, v],
            ..Default::default()
        };
        let map = IdAssignor::assign(&lib, &collection);
        assert_eq!(map.spec_id(x), Some(1));
        assert_eq!(map.spec_id(y), Some(2));
        assert_eq!(map.spec_id(v), None);
        assert_eq!(map.first_leaf_spec_id(&lib, v), Some(1));
    }
}
