//! Step scheduler: the program counter and control transfer
//!
//! The program counter names a function, an index into the innermost open
//! block, the stack of open blocks (each with the index to resume at), and the
//! return stack of suspended callers.
//!
//! One [`Interpreter::step`](crate::interpreter::engine::Interpreter::step)
//! executes the current instruction once and then performs at most one
//! transition:
//!
//! - past the end of a block: leave it (or return from the function)
//! - complete `return`: pop the frame and relay the result to the waiting call
//! - complete anything else: move to the next instruction
//! - incomplete with a call ready: push the callee's frame and enter it
//! - incomplete `if` with a chosen branch: enter the branch
//! - incomplete `while` with an evaluated condition: enter the body or leave the loop

use crate::interpreter::context::{Branch, ExecutionContext, Slot};
use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::RuntimeError;
use crate::interpreter::eval::{EvalResult, ExecStatus};
use crate::memory::{ReturnDescriptor, Value};
use crate::parser::ast::*;
use tracing::{debug, trace};

/// A block being executed, and where to continue in its parent once it ends
#[derive(Debug, Clone)]
pub struct OpenBlock {
    pub body: Block,
    pub resume_index: usize,
}

/// A caller suspended at a call
#[derive(Debug, Clone)]
pub struct ReturnPoint {
    pub function: String,
    pub index: usize,
    pub blocks: Vec<OpenBlock>,
}

/// Position of execution
#[derive(Debug, Clone)]
pub struct ProgramCounter {
    pub function: String,
    pub index: usize,
    pub blocks: Vec<OpenBlock>,
    pub returns: Vec<ReturnPoint>,
}

impl ProgramCounter {
    pub fn new(entry: &str) -> Self {
        ProgramCounter {
            function: entry.to_string(),
            index: 0,
            blocks: Vec::new(),
            returns: Vec::new(),
        }
    }

    /// Innermost open block, or the current function's body
    pub fn current_block(&self, program: &Program) -> Result<Block, RuntimeError> {
        if let Some(open) = self.blocks.last() {
            return Ok(open.body.clone());
        }
        program
            .get(&self.function)
            .map(|def| def.body.clone())
            .ok_or_else(|| RuntimeError::UndefinedFunction {
                name: self.function.clone(),
            })
    }

    /// Leave every block whose end has been reached
    fn unwind(&mut self) {
        while let Some(open) = self.blocks.last() {
            if self.index < open.body.len() {
                break;
            }
            self.index = open.resume_index;
            self.blocks.pop();
        }
    }
}

impl Interpreter {
    /// Execute the current instruction once and apply the resulting transition.
    ///
    /// Returns whether the program counter moved.
    pub(crate) fn advance(&mut self) -> Result<bool, RuntimeError> {
        let block = self.pc.current_block(&self.program)?;
        let index = self.pc.index;

        let Some(instr) = block.get(index) else {
            self.handle_block_end()?;
            return Ok(true);
        };
        trace!(function = %self.pc.function, index, instr = %instr, "execute");

        match self.machine.execute(instr, &self.program)? {
            ExecStatus::Complete if instr.is_return() => {
                let result = self
                    .machine
                    .memory
                    .peek_context(instr.id)
                    .and_then(|ctx| ctx.get(Slot::Result))
                    .cloned();
                self.handle_return(result)?;
                Ok(true)
            }
            ExecStatus::Complete => {
                self.pc.index += 1;
                self.pc.unwind();
                Ok(true)
            }
            ExecStatus::Incomplete => self.transition(instr),
        }
    }

    fn handle_block_end(&mut self) -> Result<(), RuntimeError> {
        if let Some(open) = self.pc.blocks.pop() {
            self.pc.index = open.resume_index;
            return Ok(());
        }
        if !self.pc.returns.is_empty() {
            // Implicit return at the end of a callee's body
            return self.handle_return(None);
        }
        Ok(())
    }

    /// Pop the callee's frame and hand `result` to the call waiting in the caller
    fn handle_return(&mut self, result: Option<EvalResult>) -> Result<(), RuntimeError> {
        let Some(caller) = self.pc.returns.pop() else {
            // An explicit return from the entry function ends the run and clears the stack
            self.machine.memory.pop_frame();
            self.pc.blocks.clear();
            self.pc.index = self.pc.current_block(&self.program)?.len();
            debug!("entry function returned");
            return Ok(());
        };

        let frame = self.machine.memory.pop_frame();
        debug!(
            callee = frame.as_ref().map(|f| f.function.as_str()).unwrap_or(""),
            caller = %caller.function,
            "return"
        );

        self.pc.function = caller.function;
        self.pc.index = caller.index;
        self.pc.blocks = caller.blocks;

        let block = self.pc.current_block(&self.program)?;
        let waiting = block
            .get(self.pc.index)
            .ok_or_else(|| RuntimeError::UnsupportedOperation {
                message: format!(
                    "return point {}:{} no longer holds the waiting call",
                    self.pc.function, self.pc.index
                ),
            })?;
        if let Some(call) = self.find_call(waiting, |ctx| ctx.awaiting_return) {
            let ctx = self.machine.memory.context(call)?;
            ctx.awaiting_return = false;
            ctx.store(Slot::CallResult, result.unwrap_or_else(EvalResult::unit));
        }
        Ok(())
    }

    /// First call node in the instruction whose context satisfies `pred`
    fn find_call(
        &self,
        instr: &Instr,
        pred: impl Fn(&ExecutionContext) -> bool,
    ) -> Option<NodeId> {
        let mut found = None;
        for expr in instr.expressions() {
            expr.walk(&mut |e| {
                if found.is_none() && matches!(e.kind, ExprKind::FunctionCall { .. }) {
                    if let Some(ctx) = self.machine.memory.peek_context(e.id) {
                        if pred(ctx) {
                            found = Some(e.id);
                        }
                    }
                }
            });
        }
        found
    }

    fn transition(&mut self, instr: &Instr) -> Result<bool, RuntimeError> {
        if let Some(call) = self.find_call(instr, |ctx| ctx.ready_to_call) {
            self.enter_call(instr, call)?;
            return Ok(true);
        }

        match &instr.kind {
            InstrKind::IfElse {
                then_body,
                else_body,
                ..
            } => {
                let Some(branch) = self.machine.memory.peek_context(instr.id).and_then(|ctx| ctx.branch) else {
                    return Ok(false);
                };
                let body = match branch {
                    Branch::Then => then_body,
                    Branch::Else => else_body,
                };
                if body.is_empty() {
                    self.pc.index += 1;
                    self.pc.unwind();
                } else {
                    debug!(?branch, depth = self.pc.blocks.len() + 1, "enter branch");
                    self.pc.blocks.push(OpenBlock {
                        body: body.clone(),
                        resume_index: self.pc.index + 1,
                    });
                    self.pc.index = 0;
                }
                Ok(true)
            }

            InstrKind::While { body, .. } => {
                let Some(holds) = self
                    .machine
                    .memory
                    .peek_context(instr.id)
                    .and_then(|ctx| ctx.get(Slot::Condition))
                    .cloned()
                else {
                    return Ok(false);
                };
                // Every iteration starts from fresh contexts
                self.machine.memory.reset_contexts(&instr.subtree_ids());

                if holds.as_bool()? {
                    trace!(depth = self.pc.blocks.len() + 1, "enter loop body");
                    self.pc.blocks.push(OpenBlock {
                        body: body.clone(),
                        resume_index: self.pc.index,
                    });
                    self.pc.index = 0;
                } else {
                    self.pc.index += 1;
                    self.pc.unwind();
                }
                Ok(true)
            }

            _ => Ok(false),
        }
    }

    /// Push the callee's frame, bind its parameters and move into its body
    fn enter_call(&mut self, instr: &Instr, call: NodeId) -> Result<(), RuntimeError> {
        let name = instr
            .expressions()
            .into_iter()
            .find_map(|expr| find_call_name(expr, call))
            .ok_or_else(|| RuntimeError::UnsupportedOperation {
                message: format!("call site {}:{} holds no call", self.pc.function, self.pc.index),
            })?;
        let def = self
            .program
            .get(&name)
            .ok_or_else(|| RuntimeError::UndefinedFunction { name: name.clone() })?
            .clone();

        let args = {
            let ctx = self.machine.memory.context(call)?;
            let args = (0..def.params.len())
                .map(|i| ctx.require(Slot::Arg(i)).cloned())
                .collect::<Result<Vec<_>, _>>()?;
            ctx.ready_to_call = false;
            ctx.awaiting_return = true;
            ctx.advance();
            args
        };

        let size = frame_size(&def, &self.program);
        let ret = ReturnDescriptor {
            destination: destination(instr),
            ty: def.return_type.clone(),
            slots: def.return_type.as_ref().map(TypeTag::slot_count),
        };
        self.machine.memory.push_frame(&def.name, size, ret)?;

        for (param, arg) in def.params.iter().zip(args) {
            self.bind_param(&def.name, param, arg)?;
        }

        debug!(callee = %def.name, depth = self.machine.memory.depth(), size, "call");
        self.pc.returns.push(ReturnPoint {
            function: std::mem::replace(&mut self.pc.function, def.name.clone()),
            index: self.pc.index,
            blocks: std::mem::take(&mut self.pc.blocks),
        });
        self.pc.index = 0;
        Ok(())
    }

    fn bind_param(&mut self, function: &str, param: &Param, arg: EvalResult) -> Result<(), RuntimeError> {
        let memory = &mut self.machine.memory;
        let shape_error = |expected: usize, got: usize| RuntimeError::ArgumentShapeMismatch {
            function: function.to_string(),
            param: param.name.clone(),
            expected,
            got,
        };

        match &param.ty {
            Some(ty @ TypeTag::Array(_, n)) => {
                if arg.values.len() != *n {
                    return Err(shape_error(*n, arg.values.len()));
                }
                memory.alloc_stack_var(&param.name, Some(ty.clone()), &arg.values, false, *n)?;
            }
            Some(TypeTag::Vec(_)) => {
                let [cap, len, ptr] = arg.values.as_slice() else {
                    return Err(shape_error(3, arg.values.len()));
                };
                let ptr_is_address = matches!(ptr, Value::Int(_));
                memory.alloc_stack_var(
                    &format!("{}.ptr", param.name),
                    Some(TypeTag::Ptr),
                    &[ptr.clone()],
                    ptr_is_address,
                    1,
                )?;
                memory.alloc_stack_var(&format!("{}.len", param.name), Some(TypeTag::Usize), &[len.clone()], false, 1)?;
                memory.alloc_stack_var(&format!("{}.cap", param.name), Some(TypeTag::Usize), &[cap.clone()], false, 1)?;
            }
            declared => {
                let ty = match declared {
                    Some(ty) => ty.clone(),
                    None if arg.is_pointer => arg.ty.clone(),
                    None => TypeTag::I32,
                };
                let is_pointer = ty.is_pointer() || arg.is_pointer;
                let value = arg.get_scalar()?.clone();
                memory.alloc_stack_var(&param.name, Some(ty), &[value], is_pointer, 1)?;
            }
        }
        Ok(())
    }
}

fn find_call_name(expr: &Expr, id: NodeId) -> Option<String> {
    let mut name = None;
    expr.walk(&mut |e| {
        if let ExprKind::FunctionCall { name: callee, .. } = &e.kind {
            if e.id == id {
                name = Some(callee.clone());
            }
        }
    });
    name
}

/// What the waiting instruction will do with the result
fn destination(instr: &Instr) -> Option<String> {
    match &instr.kind {
        InstrKind::LetBinding { name, .. } => Some(name.clone()),
        InstrKind::Assignment { target, .. } | InstrKind::CompoundAssignment { target, .. } => {
            Some(target.to_string())
        }
        InstrKind::Return(_) => Some("return".to_string()),
        InstrKind::IfElse { .. } | InstrKind::While { .. } => Some("condition".to_string()),
        _ => None,
    }
}

/// Slots a frame for `def` reserves: parameters plus every binding in its body
pub(crate) fn frame_size(def: &FunctionDef, program: &Program) -> usize {
    let params: usize = def
        .params
        .iter()
        .map(|param| param.ty.as_ref().map_or(1, TypeTag::slot_count))
        .sum();
    (params + block_size(&def.body, program)).max(1)
}

fn block_size(block: &[Instr], program: &Program) -> usize {
    block
        .iter()
        .map(|instr| match &instr.kind {
            InstrKind::LetBinding {
                ty, inferred, init, ..
            } => binding_size(ty.as_ref().or(inferred.as_ref()), init.as_ref(), program),
            InstrKind::IfElse {
                then_body,
                else_body,
                ..
            } => block_size(then_body, program) + block_size(else_body, program),
            InstrKind::While { body, .. } => block_size(body, program),
            _ => 0,
        })
        .sum()
}

fn binding_size(ty: Option<&TypeTag>, init: Option<&Expr>, program: &Program) -> usize {
    if let Some(ty) = ty {
        return ty.slot_count();
    }
    match init.map(|expr| &expr.kind) {
        Some(ExprKind::VecMacro(_)) => 3,
        Some(ExprKind::ArrayLiteral(elements)) => elements.len().max(1),
        Some(ExprKind::FunctionCall { name, .. }) => program
            .get(name)
            .and_then(|def| def.return_type.as_ref())
            .map_or(1, TypeTag::slot_count),
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    #[test]
    fn test_frame_size_counts_params_and_bindings() {
        let source = "fn f(v: Vec<i32>, a: [i32; 2], x: &i32) -> i32 {\n\
                      let n = 1;\n\
                      if n > 0 { let w = vec![1]; } else { let y = 2; }\n\
                      return n;\n\
                      }\n\
                      fn main() { }";
        let program = Parser::new(source).unwrap().parse_program().unwrap();
        let def = program.get("f").unwrap();
        // 3 + 2 + 1 params, 1 for n, 3 + 1 for the branches
        assert_eq!(frame_size(def, &program), 11);
    }

    #[test]
    fn test_lost_return_point_is_reported() {
        let source = "fn f() { } fn main() { f(); }";
        let program = Parser::new(source).unwrap().parse_program().unwrap();
        let mut interpreter = Interpreter::new(program, Default::default()).unwrap();

        interpreter
            .machine
            .memory
            .push_frame("f", 1, ReturnDescriptor::default())
            .unwrap();
        interpreter.pc.returns.push(ReturnPoint {
            function: "main".to_string(),
            index: 7,
            blocks: Vec::new(),
        });

        match interpreter.handle_return(None) {
            Err(RuntimeError::UnsupportedOperation { message }) => {
                assert!(message.contains("main:7"), "{}", message);
            }
            other => panic!("expected a lost return point, got {:?}", other),
        }
    }

    #[test]
    fn test_frame_size_is_at_least_one() {
        let program = Parser::new("fn main() { }").unwrap().parse_program().unwrap();
        assert_eq!(frame_size(program.get("main").unwrap(), &program), 1);
    }
}
