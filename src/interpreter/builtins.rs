//! Built-in function implementations
//!
//! This module provides the operations handled directly by the interpreter
//! rather than defined in user code.
//!
//! # Supported Built-ins
//!
//! - `v.push(x)`: append, doubling the buffer (or allocating 4 cells) when full
//! - `v.len()`: the `len` metadata word
//! - `x.clone()`: deep copy of a Box pointee or a Vec buffer
//! - `rand_int(min, max)`: inclusive random integer
//! - `print!` / `println!`: `{}` and `{:?}` placeholders, `{{` and `}}` escapes
//!
//! # Implementation Notes
//!
//! Every built-in with a side effect stores its result once performed and
//! replays it on re-entry, so a statement resumed after a suspension never
//! pushes, prints or draws a random number twice.

use crate::interpreter::context::Slot;
use crate::interpreter::errors::RuntimeError;
use crate::interpreter::eval::{Eval, EvalResult};
use crate::interpreter::machine::Machine;
use crate::interpreter::memory_ops::VecMeta;
use crate::memory::Value;
use crate::parser::ast::{Expr, ExprKind, NodeId, Program, TypeTag, VecField};
use rand::Rng;
use tracing::trace;

impl Machine {
    /// Phases: receiver, then each argument, then the method itself
    pub(crate) fn eval_method_call(
        &mut self,
        id: NodeId,
        object: &Expr,
        method: &str,
        args: &[Expr],
        program: &Program,
    ) -> Result<Eval, RuntimeError> {
        if let Some(result) = self.memory.context(id)?.get(Slot::Result) {
            return Ok(Eval::Done(result.clone()));
        }

        // `(*r).push(x)` operates on the pointee
        let (receiver, levels) = match &object.kind {
            ExprKind::Dereference { inner, levels } => (inner.as_ref(), *levels),
            _ => (object, 0),
        };
        if !self.run_phase(id, 0, Slot::Object, receiver, program)? {
            return Ok(Eval::Suspended);
        }
        for (i, arg) in args.iter().enumerate() {
            if !self.run_phase(id, i + 1, Slot::Arg(i), arg, program)? {
                return Ok(Eval::Suspended);
            }
        }

        let (object, args) = {
            let ctx = self.memory.context(id)?;
            let object = ctx.require(Slot::Object)?.clone();
            let args = (0..args.len())
                .map(|i| ctx.require(Slot::Arg(i)).cloned())
                .collect::<Result<Vec<_>, _>>()?;
            (object, args)
        };
        let object = if levels > 0 {
            let target = self.target_address(&object, levels)?;
            match &object.ty {
                TypeTag::Ref(inner) | TypeTag::Raw(inner) | TypeTag::Boxed(inner) => {
                    EvalResult::place(target, inner.as_ref().clone())
                }
                _ => EvalResult::place(target, TypeTag::I32),
            }
        } else {
            object
        };

        let result = match method {
            "push" => {
                let [value] = args.as_slice() else {
                    return Err(RuntimeError::UnsupportedOperation {
                        message: format!("push takes 1 argument, got {}", args.len()),
                    });
                };
                self.vec_push(&object, value)?
            }
            "len" => {
                let meta = self.vec_metadata(self.vec_base(&object)?)?;
                EvalResult::scalar(Value::Int(meta.len as i32), TypeTag::Usize)
            }
            "clone" => self.clone_value(&object)?,
            other => {
                return Err(RuntimeError::UnsupportedMethod {
                    method: other.to_string(),
                })
            }
        };

        let ctx = self.memory.context(id)?;
        ctx.store(Slot::Result, result.clone());
        ctx.advance();
        Ok(Eval::Done(result))
    }

    fn vec_push(&mut self, object: &EvalResult, value: &EvalResult) -> Result<EvalResult, RuntimeError> {
        let base = self.vec_base(object)?;
        let VecMeta { cap, len, ptr } = self.vec_metadata(base)?;
        let element = value.get_scalar()?.clone();

        let ptr = if len == cap {
            let new_cap = if cap == 0 { 4 } else { cap * 2 };
            let name = self.vec_name(base);
            // New buffer first so it can never overlap the one being copied
            let new_ptr = self.copy_buffer(&name, ptr, len, new_cap)?;
            for addr in ptr..ptr + cap {
                self.memory.free_cell(addr)?;
            }
            self.memory
                .write(base + VecField::Ptr.offset(), Value::Int(new_ptr as i32), true)?;
            self.memory
                .write(base + VecField::Cap.offset(), Value::Int(new_cap as i32), false)?;
            trace!(from = ptr, to = new_ptr, cap = new_cap, "vec grow");
            new_ptr
        } else {
            ptr
        };

        self.memory.write(ptr + len, element, value.is_pointer)?;
        self.memory
            .write(base + VecField::Len.offset(), Value::Int(len as i32 + 1), false)?;
        Ok(EvalResult::unit())
    }

    fn clone_value(&mut self, object: &EvalResult) -> Result<EvalResult, RuntimeError> {
        if object.is_vec_place() || (object.is_pointer && object.ty.points_to_vec()) {
            let VecMeta { cap, len, ptr } = self.vec_metadata(self.vec_base(object)?)?;
            let copy = self.copy_buffer("clone", ptr, len, cap)?;
            return Ok(EvalResult::many(
                vec![Value::Int(cap as i32), Value::Int(len as i32), Value::Int(copy as i32)],
                TypeTag::Vec(Box::new(TypeTag::I32)),
            ));
        }

        if object.is_pointer {
            let source = object.as_address()?;
            let (value, ty) = {
                let cell = self.memory.cell(source)?;
                (cell.value.clone(), cell.ty.clone().unwrap_or(TypeTag::I32))
            };
            let copy = self.memory.alloc_heap("clone", ty)?;
            self.memory.write(copy, value, false)?;
            return Ok(EvalResult::pointer(copy, object.ty.clone()));
        }

        Err(RuntimeError::UnsupportedOperation {
            message: format!("cannot clone a value of type {}", object.ty),
        })
    }

    pub(crate) fn eval_rand_int(
        &mut self,
        id: NodeId,
        min: &Expr,
        max: &Expr,
        program: &Program,
    ) -> Result<Eval, RuntimeError> {
        if let Some(result) = self.memory.context(id)?.get(Slot::Result) {
            return Ok(Eval::Done(result.clone()));
        }
        if !self.run_phase(id, 0, Slot::Left, min, program)? {
            return Ok(Eval::Suspended);
        }
        if !self.run_phase(id, 1, Slot::Right, max, program)? {
            return Ok(Eval::Suspended);
        }

        let (lo, hi) = {
            let ctx = self.memory.context(id)?;
            (ctx.require(Slot::Left)?.as_int()?, ctx.require(Slot::Right)?.as_int()?)
        };
        if lo > hi {
            return Err(RuntimeError::UnsupportedOperation {
                message: format!("rand_int({}, {}): empty range", lo, hi),
            });
        }

        let result = EvalResult::int(self.rng.gen_range(lo..=hi));
        let ctx = self.memory.context(id)?;
        ctx.store(Slot::Result, result.clone());
        ctx.advance();
        Ok(Eval::Done(result))
    }

    pub(crate) fn eval_println(
        &mut self,
        id: NodeId,
        format: &str,
        args: &[Expr],
        newline: bool,
        program: &Program,
    ) -> Result<Eval, RuntimeError> {
        if let Some(result) = self.memory.context(id)?.get(Slot::Result) {
            return Ok(Eval::Done(result.clone()));
        }
        for (i, arg) in args.iter().enumerate() {
            if !self.run_phase(id, i, Slot::Arg(i), arg, program)? {
                return Ok(Eval::Suspended);
            }
        }

        let args = {
            let ctx = self.memory.context(id)?;
            (0..args.len())
                .map(|i| ctx.require(Slot::Arg(i)).cloned())
                .collect::<Result<Vec<_>, _>>()?
        };
        let rendered = args
            .iter()
            .map(|arg| self.display_result(arg))
            .collect::<Result<Vec<_>, _>>()?;
        let text = format_placeholders(format, &rendered)?;

        if newline {
            self.terminal.println(&text);
        } else {
            self.terminal.print(&text);
        }

        let ctx = self.memory.context(id)?;
        ctx.store(Slot::Result, EvalResult::unit());
        ctx.advance();
        Ok(Eval::Done(EvalResult::unit()))
    }

    /// Text shown for a value in formatted output
    fn display_result(&self, result: &EvalResult) -> Result<String, RuntimeError> {
        let values = if result.is_vec_place() || (result.is_pointer && result.ty.points_to_vec()) {
            let meta = self.vec_metadata(self.vec_base(result)?)?;
            self.read_values(meta.ptr, meta.len)?
        } else if result.is_array_place() {
            let count = result.ty.array_len().unwrap_or(1);
            self.read_values(result.as_address()?, count)?
        } else if result.values.len() == 1 {
            return Ok(display_value(&result.values[0]));
        } else {
            result.values.clone()
        };

        let items: Vec<String> = values.iter().map(display_value).collect();
        Ok(format!("[{}]", items.join(", ")))
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Uninitialized => "uninit".to_string(),
        other => other.to_string(),
    }
}

/// Substitute `{}` / `{:?}` placeholders in order
fn format_placeholders(format: &str, args: &[String]) -> Result<String, RuntimeError> {
    let mut out = String::with_capacity(format.len());
    let mut args = args.iter();
    let mut rest = format;

    while let Some(pos) = rest.find(|c| c == '{' || c == '}') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if let Some(after) = tail.strip_prefix("{{") {
            out.push('{');
            rest = after;
        } else if let Some(after) = tail.strip_prefix("}}") {
            out.push('}');
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{}").or_else(|| tail.strip_prefix("{:?}")) {
            let arg = args.next().ok_or_else(|| RuntimeError::UnsupportedOperation {
                message: format!("format string \"{}\" has more placeholders than arguments", format),
            })?;
            out.push_str(arg);
            rest = after;
        } else {
            return Err(RuntimeError::UnsupportedOperation {
                message: format!("unsupported format string \"{}\"", format),
            });
        }
    }
    out.push_str(rest);

    if args.next().is_some() {
        return Err(RuntimeError::UnsupportedOperation {
            message: format!("format string \"{}\" has fewer placeholders than arguments", format),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_placeholders() {
        let args = vec!["1".to_string(), "[2, 3]".to_string()];
        assert_eq!(
            format_placeholders("a = {}, v = {:?} {{ok}}", &args).unwrap(),
            "a = 1, v = [2, 3] {ok}"
        );
    }

    #[test]
    fn test_format_argument_count_must_match() {
        assert!(format_placeholders("{} {}", &["1".to_string()]).is_err());
        assert!(format_placeholders("none", &["1".to_string()]).is_err());
    }
}
