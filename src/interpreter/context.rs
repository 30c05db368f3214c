//! Per-node execution contexts
//!
//! A multi-step evaluation keeps its progress in an [`ExecutionContext`]: a phase
//! counter plus a scratch map of intermediate results. Contexts live in the
//! frame that evaluates the node (keyed by [`NodeId`](crate::parser::ast::NodeId)),
//! so recursive invocations of the same function never share state and popping
//! a frame discards everything it was in the middle of.

use crate::interpreter::errors::RuntimeError;
use crate::interpreter::eval::EvalResult;
use rustc_hash::FxHashMap;

/// Scratch slot names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Left,
    Right,
    Array,
    Index,
    Object,
    Operand,
    Arg(usize),
    Element(usize),
    Condition,
    /// Final result of a node with side effects, replayed on re-entry
    Result,
    /// Value relayed back from a finished call
    CallResult,
}

/// Branch chosen by an `if`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Then,
    Else,
}

/// Resumable state of one node in one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionContext {
    pub step: usize,
    scratch: FxHashMap<Slot, EvalResult>,
    /// Set by a call whose arguments are all evaluated
    pub ready_to_call: bool,
    /// Set once the scheduler has entered the callee
    pub awaiting_return: bool,
    pub branch: Option<Branch>,
}

impl ExecutionContext {
    pub fn advance(&mut self) {
        self.step += 1;
    }

    pub fn store(&mut self, slot: Slot, result: EvalResult) {
        self.scratch.insert(slot, result);
    }

    pub fn get(&self, slot: Slot) -> Option<&EvalResult> {
        self.scratch.get(&slot)
    }

    /// Stored result of a phase that must already have completed
    pub fn require(&self, slot: Slot) -> Result<&EvalResult, RuntimeError> {
        self.scratch
            .get(&slot)
            .ok_or_else(|| RuntimeError::UnsupportedOperation {
                message: format!("missing intermediate result {:?}", slot),
            })
    }

    pub fn reset(&mut self) {
        *self = ExecutionContext::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_advance() {
        let mut ctx = ExecutionContext::default();
        ctx.store(Slot::Left, EvalResult::int(3));
        ctx.advance();

        assert_eq!(ctx.step, 1);
        assert_eq!(ctx.get(Slot::Left), Some(&EvalResult::int(3)));
        assert!(ctx.require(Slot::Right).is_err());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut ctx = ExecutionContext::default();
        ctx.store(Slot::Arg(0), EvalResult::int(1));
        ctx.ready_to_call = true;
        ctx.branch = Some(Branch::Else);
        ctx.advance();

        ctx.reset();
        assert_eq!(ctx, ExecutionContext::default());
    }
}
