//! Per-function translation state
//!
//! One [`TranslationContext`] is threaded through the walk of a single
//! function body. It holds the insertion point, the operand stack that
//! expression walks push onto, the (continue, merge) pairs of enclosing
//! loops and the lexical scopes of locals.

use super::instruction::{BlockId, FunctionId, OpId};
use super::types::TypeId;
use std::collections::{HashMap, HashSet};

/// Branch targets of an enclosing loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopTargets {
    /// Target of `continue`
    pub continue_block: BlockId,
    /// Target of `break`
    pub merge_block: BlockId,
}

/// Mutable state for translating one function body
#[derive(Debug)]
pub struct TranslationContext {
    /// Function being translated
    pub function: FunctionId,
    /// Entry block (holds every local variable)
    pub entry_block: BlockId,
    /// Insertion block
    pub block: BlockId,
    /// Declared return type
    pub return_type: TypeId,
    /// The function returns nothing
    pub returns_void: bool,
    /// Struct whose member is being translated
    pub owner: Option<String>,
    /// Self pointer of instance functions
    pub self_ptr: Option<OpId>,
    stack: Vec<OpId>,
    loops: Vec<LoopTargets>,
    scopes: Vec<HashMap<String, OpId>>,
    temporaries: HashSet<OpId>,
}

impl TranslationContext {
    /// Context positioned at the entry block of `function`
    pub fn new(
        function: FunctionId,
        entry_block: BlockId,
        return_type: TypeId,
        returns_void: bool,
    ) -> Self {
        Self {
            function,
            entry_block,
            block: entry_block,
            return_type,
            returns_void,
            owner: None,
            self_ptr: None,
            stack: Vec::new(),
            loops: Vec::new(),
            scopes: vec![HashMap::new()],
            temporaries: HashSet::new(),
        }
    }

    // Operand stack

    /// Push the result of an expression walk
    pub fn push(&mut self, op: OpId) {
        self.stack.push(op);
    }

    /// Pop the most recent operand
    pub fn pop(&mut self) -> Option<OpId> {
        self.stack.pop()
    }

    // Loop targets

    /// Enter a loop body
    pub fn push_loop(&mut self, continue_block: BlockId, merge_block: BlockId) {
        self.loops.push(LoopTargets {
            continue_block,
            merge_block,
        });
    }

    /// Leave a loop body
    pub fn pop_loop(&mut self) -> Option<LoopTargets> {
        self.loops.pop()
    }

    /// Innermost enclosing loop
    pub fn innermost_loop(&self) -> Option<LoopTargets> {
        self.loops.last().copied()
    }

    // Scopes

    /// Open a lexical scope
    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Close the innermost lexical scope
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Bind a name in the innermost scope
    pub fn declare_local(&mut self, name: &str, op: OpId) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), op);
        }
    }

    /// Resolve a name, innermost scope first
    pub fn lookup_local(&self, name: &str) -> Option<OpId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    // Temporaries

    /// Mark a pointer as addressing a compiler temporary
    pub fn mark_temporary(&mut self, op: OpId) {
        self.temporaries.insert(op);
    }

    /// Whether a pointer addresses a compiler temporary
    pub fn is_temporary(&self, op: OpId) -> bool {
        self.temporaries.contains(&op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> TranslationContext {
        TranslationContext::new(FunctionId(0), BlockId(0), TypeId(0), true)
    }

    #[test]
    fn test_scopes_shadow_and_restore() {
        let mut c = ctx();
        c.declare_local("x", OpId(1));
        c.push_scope();
        c.declare_local("x", OpId(2));
        assert_eq!(c.lookup_local("x"), Some(OpId(2)));
        c.pop_scope();
        assert_eq!(c.lookup_local("x"), Some(OpId(1)));
        c.pop_scope();
        assert_eq!(c.lookup_local("x"), Some(OpId(1)));
    }

    #[test]
    fn test_innermost_loop_wins() {
        let mut c = ctx();
        c.push_loop(BlockId(1), BlockId(2));
        c.push_loop(BlockId(3), BlockId(4));
        assert_eq!(c.innermost_loop().map(|l| l.merge_block), Some(BlockId(4)));
        c.pop_loop();
        assert_eq!(c.innermost_loop().map(|l| l.continue_block), Some(BlockId(1)));
    }
}
