//! Expression evaluation implementation
//!
//! This module handles evaluation of every expression kind as a resumable,
//! multi-phase computation:
//!
//! - Literals, variables and references finish immediately
//! - Binary and unary operators, indexing, dereference and `Box::new` run their
//!   sub-expressions in phases and fall through to the next phase at once
//! - Array and `vec!` literals suspend after every element
//! - Function calls suspend after every argument, then raise `ready_to_call`
//!   and wait for the scheduler to relay the callee's result
//!
//! Completed phases are stored in the node's execution context, so a node that
//! is re-entered after suspending never evaluates a finished child twice.
//!
//! # Safety
//!
//! All arithmetic uses checked math and reports overflow and division by zero
//! as runtime errors instead of panicking.

use crate::interpreter::context::Slot;
use crate::interpreter::errors::RuntimeError;
use crate::interpreter::eval::{ready, Eval, EvalResult};
use crate::interpreter::machine::Machine;
use crate::memory::Value;
use crate::parser::ast::*;

impl Machine {
    /// Evaluate an expression one step further
    pub fn evaluate(&mut self, expr: &Expr, program: &Program) -> Result<Eval, RuntimeError> {
        match &expr.kind {
            ExprKind::Literal { value, ty } => {
                Ok(Eval::Done(EvalResult::scalar(value.clone(), ty.clone())))
            }

            ExprKind::Variable(name) => self.eval_variable(name).map(Eval::Done),

            ExprKind::Reference(name) => self.eval_reference(name).map(Eval::Done),

            ExprKind::BinaryOp { op, left, right } => {
                if !self.run_phase(expr.id, 0, Slot::Left, left, program)? {
                    return Ok(Eval::Suspended);
                }
                if !self.run_phase(expr.id, 1, Slot::Right, right, program)? {
                    return Ok(Eval::Suspended);
                }
                let ctx = self.memory.context(expr.id)?;
                let result = apply_binary(*op, ctx.require(Slot::Left)?, ctx.require(Slot::Right)?)?;
                Ok(Eval::Done(result))
            }

            ExprKind::Unary { op, operand } => {
                if !self.run_phase(expr.id, 0, Slot::Operand, operand, program)? {
                    return Ok(Eval::Suspended);
                }
                let ctx = self.memory.context(expr.id)?;
                let result = apply_unary(*op, ctx.require(Slot::Operand)?)?;
                Ok(Eval::Done(result))
            }

            ExprKind::ArrayAccess { array, index } => {
                // `(*p)[i]` indexes the pointee, not the value stored at it
                let (base_expr, levels) = match &array.kind {
                    ExprKind::Dereference { inner, levels } => (inner.as_ref(), *levels),
                    _ => (array.as_ref(), 0),
                };
                if !self.run_phase(expr.id, 0, Slot::Array, base_expr, program)? {
                    return Ok(Eval::Suspended);
                }
                if !self.run_phase(expr.id, 1, Slot::Index, index, program)? {
                    return Ok(Eval::Suspended);
                }
                let (base, index) = {
                    let ctx = self.memory.context(expr.id)?;
                    (ctx.require(Slot::Array)?.clone(), ctx.require(Slot::Index)?.as_int()?)
                };
                let base = self.indexed_base(&base, levels)?;
                let addr = self.offset(base, index)?;
                self.read_cell(addr).map(Eval::Done)
            }

            ExprKind::Dereference { inner, levels } => {
                if !self.run_phase(expr.id, 0, Slot::Operand, inner, program)? {
                    return Ok(Eval::Suspended);
                }
                let pointer = self.memory.context(expr.id)?.require(Slot::Operand)?.clone();
                let addr = self.target_address(&pointer, *levels)?;
                self.read_cell(addr).map(Eval::Done)
            }

            ExprKind::FunctionCall { name, args } => self.eval_call(expr.id, name, args, program),

            ExprKind::ArrayLiteral(elements) => {
                let elements = ready!(self.eval_elements(expr.id, elements, program));
                let elem_ty = match elements.values.first() {
                    Some(Value::Bool(_)) => TypeTag::Bool,
                    _ => TypeTag::I32,
                };
                let n = elements.values.len();
                Ok(Eval::Done(EvalResult::many(
                    elements.values,
                    TypeTag::Array(Box::new(elem_ty), n),
                )))
            }

            ExprKind::VecMacro(elements) => {
                let elements = ready!(self.eval_elements(expr.id, elements, program));
                Ok(Eval::Done(EvalResult::many(elements.values, TypeTag::VecLiteral)))
            }

            ExprKind::BoxNew(inner) => {
                if !self.run_phase(expr.id, 0, Slot::Operand, inner, program)? {
                    return Ok(Eval::Suspended);
                }
                let value = self.memory.context(expr.id)?.require(Slot::Operand)?.get_scalar()?.clone();
                Ok(Eval::Done(EvalResult::scalar(value, TypeTag::BoxLiteral)))
            }

            ExprKind::MethodCall {
                object,
                method,
                args,
            } => self.eval_method_call(expr.id, object, method, args, program),

            ExprKind::RandInt { min, max } => self.eval_rand_int(expr.id, min, max, program),

            ExprKind::Println {
                format,
                args,
                newline,
            } => self.eval_println(expr.id, format, args, *newline, program),
        }
    }

    /// Run `child` as phase `phase` of node `id`, storing its result in `slot`.
    ///
    /// Returns `false` if the child suspended. A phase that already completed is skipped.
    pub(crate) fn run_phase(
        &mut self,
        id: NodeId,
        phase: usize,
        slot: Slot,
        child: &Expr,
        program: &Program,
    ) -> Result<bool, RuntimeError> {
        if self.memory.context(id)?.step != phase {
            return Ok(true);
        }

        match self.evaluate(child, program)? {
            Eval::Suspended => Ok(false),
            Eval::Done(result) => {
                let ctx = self.memory.context(id)?;
                ctx.store(slot, result);
                ctx.advance();
                Ok(true)
            }
        }
    }

    /// Evaluate a finished expression or fail: used where suspension cannot be resumed
    pub(crate) fn evaluate_now(&mut self, expr: &Expr, program: &Program) -> Result<EvalResult, RuntimeError> {
        match self.evaluate(expr, program)? {
            Eval::Done(result) => Ok(result),
            Eval::Suspended => Err(RuntimeError::UnsupportedOperation {
                message: format!("'{}' cannot be evaluated inside an assignment target", expr),
            }),
        }
    }

    /// Element 0 of an indexing base, after following `levels` explicit dereferences
    pub(crate) fn indexed_base(&self, base: &EvalResult, levels: usize) -> Result<usize, RuntimeError> {
        if levels == 0 {
            return self.element_base(base);
        }
        let target = self.target_address(base, levels)?;
        if base.ty.points_to_vec() {
            return Ok(self.vec_metadata(target)?.ptr);
        }
        Ok(target)
    }

    /// One cell as a scalar; an array element reads as its element type
    fn read_cell(&self, addr: usize) -> Result<EvalResult, RuntimeError> {
        let cell = self.memory.cell(addr)?;
        let ty = match &cell.ty {
            Some(TypeTag::Array(elem, _)) => elem.as_ref().clone(),
            Some(ty) => ty.clone(),
            None => TypeTag::I32,
        };
        Ok(EvalResult {
            values: vec![cell.value.clone()],
            ty,
            is_pointer: cell.is_pointer,
            is_place: false,
        })
    }

    fn eval_variable(&self, name: &str) -> Result<EvalResult, RuntimeError> {
        let addr = match self.memory.get_addr(name) {
            Ok(addr) => addr,
            Err(err) => {
                // A Vec binding is only reachable through its metadata labels
                return match self.memory.get_addr(&format!("{}.cap", name)) {
                    Ok(base) => Ok(EvalResult::place(base, TypeTag::Vec(Box::new(TypeTag::I32)))),
                    Err(_) => Err(err),
                };
            }
        };

        let cell = self.memory.cell(addr)?;
        match &cell.ty {
            Some(ty @ TypeTag::Array(..)) => Ok(EvalResult::place(addr, ty.clone())),
            _ => self.read_cell(addr),
        }
    }

    fn eval_reference(&self, name: &str) -> Result<EvalResult, RuntimeError> {
        let addr = match self.memory.get_addr(name) {
            Ok(addr) => addr,
            Err(err) => {
                return match self.memory.get_addr(&format!("{}.cap", name)) {
                    Ok(base) => Ok(EvalResult::pointer(
                        base,
                        TypeTag::Ref(Box::new(TypeTag::Vec(Box::new(TypeTag::I32)))),
                    )),
                    Err(_) => Err(err),
                };
            }
        };

        let pointee = self.memory.cell(addr)?.ty.clone().unwrap_or(TypeTag::I32);
        Ok(EvalResult::pointer(addr, TypeTag::Ref(Box::new(pointee))))
    }

    /// Evaluate elements one per step; the assembled list is ready on the step after the last
    fn eval_elements(&mut self, id: NodeId, elements: &[Expr], program: &Program) -> Result<Eval, RuntimeError> {
        let step = self.memory.context(id)?.step;

        if let Some(element) = elements.get(step) {
            let result = ready!(self.evaluate(element, program));
            let value = result.get_scalar()?.clone();
            let ctx = self.memory.context(id)?;
            ctx.store(Slot::Element(step), EvalResult::scalar(value, result.ty));
            ctx.advance();
            return Ok(Eval::Suspended);
        }

        let ctx = self.memory.context(id)?;
        let values = (0..elements.len())
            .map(|i| ctx.require(Slot::Element(i)).and_then(|r| r.get_scalar().cloned()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Eval::Done(EvalResult::many(values, TypeTag::Unit)))
    }

    /// Call protocol: one argument per step, then `ready_to_call`, then the relayed result
    fn eval_call(&mut self, id: NodeId, name: &str, args: &[Expr], program: &Program) -> Result<Eval, RuntimeError> {
        let def = program.get(name).ok_or_else(|| RuntimeError::UndefinedFunction {
            name: name.to_string(),
        })?;
        if def.params.len() != args.len() {
            return Err(RuntimeError::ArgumentCountMismatch {
                function: name.to_string(),
                expected: def.params.len(),
                got: args.len(),
            });
        }

        let step = self.memory.context(id)?.step;

        if let Some(arg) = args.get(step) {
            let result = ready!(self.evaluate(arg, program));
            let result = match &def.params[step].ty {
                Some(ty) if ty.is_vec() || ty.array_len().is_some() => self.materialize_place(result)?,
                _ => result,
            };
            let ctx = self.memory.context(id)?;
            ctx.store(Slot::Arg(step), result);
            ctx.advance();
            return Ok(Eval::Suspended);
        }

        let ctx = self.memory.context(id)?;
        if step == args.len() {
            ctx.ready_to_call = true;
            return Ok(Eval::Suspended);
        }

        match ctx.get(Slot::CallResult) {
            Some(result) => Ok(Eval::Done(result.clone())),
            None => Err(RuntimeError::UnsupportedOperation {
                message: format!("call to '{}' finished without a result", name),
            }),
        }
    }
}

/// Floor division: the quotient rounds toward negative infinity
pub(crate) fn floor_div(a: i32, b: i32) -> Option<i32> {
    let q = a.checked_div(b)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        q.checked_sub(1)
    } else {
        Some(q)
    }
}

/// Integer arithmetic shared by binary operators and compound assignment
pub(crate) fn arithmetic(op: BinOp, a: i32, b: i32) -> Result<i32, RuntimeError> {
    let result = match op {
        BinOp::Add => a.checked_add(b),
        BinOp::Sub => a.checked_sub(b),
        BinOp::Mul => a.checked_mul(b),
        BinOp::Div => {
            if b == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            floor_div(a, b)
        }
        other => {
            return Err(RuntimeError::UnsupportedOperation {
                message: format!("'{}' is not an arithmetic operator", other.symbol()),
            })
        }
    };

    result.ok_or_else(|| RuntimeError::IntegerOverflow {
        operation: format!("{} {} {}", a, op.symbol(), b),
    })
}

#[inline]
fn truth(b: bool) -> EvalResult {
    EvalResult::int(i32::from(b))
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left.as_int(), right.as_int()) {
        (Some(a), Some(b)) => a == b,
        _ => left == right,
    }
}

pub(crate) fn apply_binary(op: BinOp, left: &EvalResult, right: &EvalResult) -> Result<EvalResult, RuntimeError> {
    match op {
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => {
            let value = arithmetic(op, left.as_int()?, right.as_int()?)?;
            // Pointer arithmetic keeps the pointer
            if left.is_pointer && matches!(op, BinOp::Add | BinOp::Sub) {
                return Ok(EvalResult {
                    values: vec![Value::Int(value)],
                    ty: left.ty.clone(),
                    is_pointer: true,
                    is_place: false,
                });
            }
            Ok(EvalResult::int(value))
        }
        BinOp::Eq => Ok(truth(values_equal(left.get_scalar()?, right.get_scalar()?))),
        BinOp::Ne => Ok(truth(!values_equal(left.get_scalar()?, right.get_scalar()?))),
        BinOp::Lt => Ok(truth(left.as_int()? < right.as_int()?)),
        BinOp::Gt => Ok(truth(left.as_int()? > right.as_int()?)),
        BinOp::Le => Ok(truth(left.as_int()? <= right.as_int()?)),
        BinOp::Ge => Ok(truth(left.as_int()? >= right.as_int()?)),
        BinOp::And => Ok(truth(left.as_bool()? && right.as_bool()?)),
        BinOp::Or => Ok(truth(left.as_bool()? || right.as_bool()?)),
    }
}

fn apply_unary(op: UnOp, operand: &EvalResult) -> Result<EvalResult, RuntimeError> {
    match op {
        UnOp::Neg => {
            let n = operand.as_int()?;
            n.checked_neg()
                .map(EvalResult::int)
                .ok_or_else(|| RuntimeError::IntegerOverflow {
                    operation: format!("-{}", n),
                })
        }
        UnOp::Not => Ok(EvalResult::scalar(Value::Bool(!operand.as_bool()?), TypeTag::Bool)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ReturnDescriptor;

    fn var(id: NodeId, name: &str) -> Expr {
        Expr {
            id,
            kind: ExprKind::Variable(name.to_string()),
        }
    }

    fn machine_with(vars: &[(&str, i32)]) -> Machine {
        let mut machine = Machine::new(Some(7));
        machine
            .memory
            .push_frame("main", vars.len().max(1), ReturnDescriptor::default())
            .unwrap();
        for (name, value) in vars {
            machine
                .memory
                .alloc_stack_var(name, Some(TypeTag::I32), &[Value::Int(*value)], false, 1)
                .unwrap();
        }
        machine
    }

    #[test]
    fn test_floor_division() {
        assert_eq!(floor_div(7, 2), Some(3));
        assert_eq!(floor_div(-7, 2), Some(-4));
        assert_eq!(floor_div(7, -2), Some(-4));
        assert_eq!(floor_div(-7, -2), Some(3));
        assert_eq!(floor_div(-8, 2), Some(-4));
        assert_eq!(floor_div(i32::MIN, -1), None);
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(
            arithmetic(BinOp::Div, 1, 0),
            Err(RuntimeError::DivisionByZero)
        );
    }

    #[test]
    fn test_overflow_is_an_error() {
        assert!(matches!(
            arithmetic(BinOp::Add, i32::MAX, 1),
            Err(RuntimeError::IntegerOverflow { .. })
        ));
    }

    #[test]
    fn test_comparisons_yield_integers() {
        let result = apply_binary(BinOp::Le, &EvalResult::int(2), &EvalResult::int(2)).unwrap();
        assert_eq!(result, EvalResult::int(1));

        let result = apply_binary(BinOp::Ne, &EvalResult::int(2), &EvalResult::int(2)).unwrap();
        assert_eq!(result, EvalResult::int(0));
    }

    #[test]
    fn test_binary_reentry_is_idempotent() {
        let program = Program::new();
        let mut machine = machine_with(&[("x", 5), ("y", 3)]);
        let expr = Expr {
            id: 0,
            kind: ExprKind::BinaryOp {
                op: BinOp::Sub,
                left: Box::new(var(1, "x")),
                right: Box::new(var(2, "y")),
            },
        };

        // Left operand already done in an earlier step
        let ctx = machine.memory.context(0).unwrap();
        ctx.store(Slot::Left, EvalResult::int(5));
        ctx.advance();

        let first = machine.evaluate(&expr, &program).unwrap();
        let second = machine.evaluate(&expr, &program).unwrap();
        assert_eq!(first, Eval::Done(EvalResult::int(2)));
        assert_eq!(first, second);
    }

    #[test]
    fn test_array_literal_suspends_per_element() {
        let program = Program::new();
        let mut machine = machine_with(&[]);
        let literal = |id, n| Expr {
            id,
            kind: ExprKind::Literal {
                value: Value::Int(n),
                ty: TypeTag::I32,
            },
        };
        let expr = Expr {
            id: 0,
            kind: ExprKind::ArrayLiteral(vec![literal(1, 4), literal(2, 5)]),
        };

        assert_eq!(machine.evaluate(&expr, &program).unwrap(), Eval::Suspended);
        assert_eq!(machine.evaluate(&expr, &program).unwrap(), Eval::Suspended);
        let Eval::Done(result) = machine.evaluate(&expr, &program).unwrap() else {
            panic!("array literal should be complete");
        };
        assert_eq!(result.values, vec![Value::Int(4), Value::Int(5)]);
        assert_eq!(result.ty.array_len(), Some(2));
    }

    #[test]
    fn test_dereference_of_freed_pointer_fails() {
        let program = Program::new();
        let mut machine = machine_with(&[("p", 0)]);
        let addr = machine.memory.get_addr("p").unwrap();
        machine.memory.write(addr, Value::Freed, true).unwrap();

        let expr = Expr {
            id: 0,
            kind: ExprKind::Dereference {
                inner: Box::new(var(1, "p")),
                levels: 1,
            },
        };
        assert!(matches!(
            machine.evaluate(&expr, &program),
            Err(RuntimeError::InvalidPointer { .. })
        ));
    }
}
