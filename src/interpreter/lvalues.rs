//! Assignment target resolution
//!
//! Resolving an [`LValue`] happens in the same step as the write. Its inner
//! expressions are evaluated to completion on the spot; one that would need to
//! suspend (a call, an array literal) is rejected.

use crate::interpreter::errors::RuntimeError;
use crate::interpreter::machine::Machine;
use crate::memory::Address;
use crate::parser::ast::{ExprKind, LValue, Program};

impl Machine {
    /// Address an assignment to `target` writes to
    pub(crate) fn get_address(&mut self, target: &LValue, program: &Program) -> Result<Address, RuntimeError> {
        match target {
            LValue::Variable(name) => self
                .memory
                .get_addr(name)
                .or_else(|err| self.memory.get_addr(&format!("{}.cap", name)).map_err(|_| err)),

            LValue::Dereference { inner, levels } => {
                let pointer = self.evaluate_now(inner, program)?;
                self.target_address(&pointer, *levels)
            }

            LValue::ArrayIndex { array, index } => {
                let base = match &array.kind {
                    ExprKind::Dereference { inner, levels } => {
                        let pointer = self.evaluate_now(inner, program)?;
                        self.indexed_base(&pointer, *levels)?
                    }
                    _ => {
                        let base = self.evaluate_now(array, program)?;
                        self.element_base(&base)?
                    }
                };
                let index = self.evaluate_now(index, program)?.as_int()?;
                self.offset(base, index)
            }

            LValue::Field { object, field } => {
                let object = self.evaluate_now(object, program)?;
                Ok(self.vec_base(&object)? + field.offset())
            }
        }
    }
}
