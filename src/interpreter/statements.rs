//! Statement execution implementation
//!
//! This module executes one instruction per call and reports whether it is
//! finished:
//!
//! - [`ExecStatus::Complete`]: the scheduler may move past the instruction
//! - [`ExecStatus::Incomplete`]: the instruction is waiting, either on a
//!   suspended expression or on the scheduler to enter a chosen block
//!
//! `if` and `while` only decide here; descending into their bodies is the
//! scheduler's job.

use crate::interpreter::context::{Branch, Slot};
use crate::interpreter::errors::RuntimeError;
use crate::interpreter::eval::{ready, EvalResult, ExecStatus};
use crate::interpreter::expressions::arithmetic;
use crate::interpreter::machine::Machine;
use crate::memory::{Value, DANGLING};
use crate::parser::ast::*;
use tracing::debug;

impl Machine {
    /// Execute an instruction one step further
    pub fn execute(&mut self, instr: &Instr, program: &Program) -> Result<ExecStatus, RuntimeError> {
        match &instr.kind {
            InstrKind::Nop(_) => Ok(ExecStatus::Complete),

            InstrKind::LetBinding { name, ty, init, .. } => {
                let Some(init) = init else {
                    self.memory.unbind(&format!("{}.cap", name));
                    self.memory.bind_stack_var(
                        (instr.id, 0),
                        name,
                        Some(ty.clone().unwrap_or(TypeTag::I32)),
                        &[],
                        false,
                        1,
                    )?;
                    return Ok(ExecStatus::Complete);
                };

                let result = ready!(self.evaluate(init, program), ExecStatus::Incomplete);
                self.bind(instr.id, name, ty.as_ref(), result)?;
                Ok(ExecStatus::Complete)
            }

            InstrKind::Assignment { target, value } => {
                let result = ready!(self.evaluate(value, program), ExecStatus::Incomplete);
                let addr = self.get_address(target, program)?;
                let result = self.materialize(result, &target.to_string())?;
                self.store_at(addr, result)?;
                Ok(ExecStatus::Complete)
            }

            InstrKind::CompoundAssignment { target, op, value } => {
                let rhs = ready!(self.evaluate(value, program), ExecStatus::Incomplete);
                let addr = self.get_address(target, program)?;
                let cell = self.memory.cell(addr)?;
                let current = cell
                    .value
                    .as_int()
                    .ok_or_else(|| RuntimeError::type_error("integer", cell.value.kind_name()))?;
                let is_pointer = cell.is_pointer;
                let updated = arithmetic(*op, current, rhs.as_int()?)?;
                self.memory.write(addr, Value::Int(updated), is_pointer)?;
                Ok(ExecStatus::Complete)
            }

            InstrKind::Expression(expr) => {
                ready!(self.evaluate(expr, program), ExecStatus::Incomplete);
                Ok(ExecStatus::Complete)
            }

            InstrKind::IfElse { condition, .. } => {
                if self.memory.context(instr.id)?.branch.is_some() {
                    return Ok(ExecStatus::Incomplete);
                }
                let taken = ready!(self.evaluate(condition, program), ExecStatus::Incomplete).as_bool()?;
                let ctx = self.memory.context(instr.id)?;
                ctx.branch = Some(if taken { Branch::Then } else { Branch::Else });
                ctx.advance();
                Ok(ExecStatus::Incomplete)
            }

            InstrKind::While { condition, .. } => {
                let holds = ready!(self.evaluate(condition, program), ExecStatus::Incomplete).as_bool()?;
                let mut ids = Vec::new();
                condition.walk(&mut |e| ids.push(e.id));
                self.memory.reset_contexts(&ids);
                self.memory
                    .context(instr.id)?
                    .store(Slot::Condition, EvalResult::scalar(Value::Bool(holds), TypeTag::Bool));
                Ok(ExecStatus::Incomplete)
            }

            InstrKind::Return(expr) => {
                if let Some(expr) = expr {
                    let result = ready!(self.evaluate(expr, program), ExecStatus::Incomplete);
                    // Places must be read before the frame holding them is popped
                    let result = self.materialize_place(result)?;
                    self.memory.context(instr.id)?.store(Slot::Result, result);
                }
                Ok(ExecStatus::Complete)
            }

            InstrKind::Drop { name, is_vec } => {
                let is_vec = *is_vec
                    || (self.memory.get_addr(name).is_err()
                        && self.memory.get_addr(&format!("{}.cap", name)).is_ok());
                if is_vec {
                    self.drop_vec(name)?;
                } else {
                    self.drop_box(name)?;
                }
                Ok(ExecStatus::Complete)
            }
        }
    }

    /// Bind the value of a `let` in the current frame
    fn bind(&mut self, id: NodeId, name: &str, declared: Option<&TypeTag>, result: EvalResult) -> Result<(), RuntimeError> {
        let result = self.materialize(result, name)?;

        if result.ty.is_vec() {
            let [cap, len, ptr] = result.values.as_slice() else {
                return Err(RuntimeError::CorruptedMetadata {
                    message: format!("'{}' expects 3 metadata words, got {}", name, result.values.len()),
                });
            };
            self.memory.unbind(name);
            // Highest address first, so `cap` ends up at the base
            let ptr_is_address = matches!(ptr, Value::Int(_));
            self.memory
                .bind_stack_var((id, 0), &format!("{}.ptr", name), Some(TypeTag::Ptr), &[ptr.clone()], ptr_is_address, 1)?;
            self.memory
                .bind_stack_var((id, 1), &format!("{}.len", name), Some(TypeTag::Usize), &[len.clone()], false, 1)?;
            self.memory
                .bind_stack_var((id, 2), &format!("{}.cap", name), Some(TypeTag::Usize), &[cap.clone()], false, 1)?;
            debug!(name, "bind vec");
            return Ok(());
        }

        self.memory.unbind(&format!("{}.cap", name));

        if result.values.len() > 1 {
            let n = result.values.len();
            let ty = match declared {
                Some(ty @ TypeTag::Array(..)) => ty.clone(),
                _ => match &result.ty {
                    ty @ TypeTag::Array(..) => ty.clone(),
                    _ => TypeTag::Array(Box::new(TypeTag::I32), n),
                },
            };
            self.memory
                .bind_stack_var((id, 0), name, Some(ty), &result.values, false, n)?;
            return Ok(());
        }

        let ty = declared.cloned().unwrap_or_else(|| result.ty.clone());
        let is_pointer = result.is_pointer || ty.is_pointer();
        let value = result.get_scalar()?.clone();
        self.memory
            .bind_stack_var((id, 0), name, Some(ty), &[value], is_pointer, 1)?;
        Ok(())
    }

    /// Write a materialized value at a resolved address
    fn store_at(&mut self, addr: usize, result: EvalResult) -> Result<(), RuntimeError> {
        if result.ty.is_vec() && result.values.len() == 3 {
            for (i, value) in result.values.into_iter().enumerate() {
                let is_pointer = i == VecField::Ptr.offset() && matches!(value, Value::Int(_));
                self.memory.write(addr + i, value, is_pointer)?;
            }
            return Ok(());
        }

        if result.values.len() > 1 {
            for (i, value) in result.values.into_iter().enumerate() {
                self.memory.write(addr + i, value, false)?;
            }
            return Ok(());
        }

        let value = result.get_scalar()?.clone();
        let cell = self.memory.cell_mut(addr)?;
        cell.value = value;
        cell.is_pointer = result.is_pointer;
        if cell.ty.is_none() {
            cell.ty = Some(result.ty);
        }
        Ok(())
    }

    /// Free the buffer and clear the metadata; dropping twice frees nothing the second time
    fn drop_vec(&mut self, name: &str) -> Result<(), RuntimeError> {
        let base = self.memory.get_addr(&format!("{}.cap", name))?;
        let ptr = self.memory.cell(base + VecField::Ptr.offset())?.value.clone();
        let cap = self.memory.cell(base + VecField::Cap.offset())?.value.clone();

        if let (Value::Int(ptr), Value::Int(cap)) = (ptr, cap) {
            if cap > 0 && ptr as usize != DANGLING {
                let start = self.offset(ptr.max(0) as usize, 0)?;
                for addr in start..start + cap as usize {
                    self.memory.free_cell(addr)?;
                }
            }
        }

        self.memory.write(base + VecField::Ptr.offset(), Value::Null, false)?;
        self.memory.write(base + VecField::Len.offset(), Value::Int(0), false)?;
        self.memory.write(base + VecField::Cap.offset(), Value::Int(0), false)?;
        debug!(name, "drop vec");
        Ok(())
    }

    /// Free the pointee of a Box and null the owning slot
    fn drop_box(&mut self, name: &str) -> Result<(), RuntimeError> {
        let slot = self.memory.get_addr(name)?;
        let current = self.memory.cell(slot)?.value.clone();
        if let Value::Int(target) = current {
            let target = self.offset(0, target)?;
            self.memory.free_cell(target)?;
        }
        self.memory.write(slot, Value::Null, false)?;
        debug!(name, "drop box");
        Ok(())
    }
}
