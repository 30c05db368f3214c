//! Call stack: frames carved out of the top of the address space
//!
//! A frame reserves a fixed extent on entry, sized by the caller's static
//! estimate. Bindings are then handed out from the top of that extent downward,
//! so the first `let` of a function always lands at the frame's highest address.

use super::value::{Address, Cell, Value};
use super::{Memory, STACK_LIMIT};
use crate::interpreter::context::ExecutionContext;
use crate::interpreter::errors::RuntimeError;
use crate::parser::ast::{NodeId, TypeTag};
use rustc_hash::FxHashMap;
use tracing::debug;

/// Where a callee's result is headed, shown next to the frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReturnDescriptor {
    /// Description of the waiting target (`x`, `v[1]`, ...)
    pub destination: Option<String>,
    pub ty: Option<TypeTag>,
    pub slots: Option<usize>,
}

/// Activation record of one function invocation
#[derive(Debug, Clone)]
pub struct Frame {
    pub function: String,
    pub base: Address,
    pub size: usize,
    /// Name → first address of the binding
    pub vars: FxHashMap<String, Address>,
    pub slots_allocated: usize,
    /// Resumable state of every node evaluated in this invocation
    pub contexts: FxHashMap<NodeId, ExecutionContext>,
    /// Slots reserved per binding site, reused when a loop body binds again
    pub reserved: FxHashMap<SlotKey, (Address, usize)>,
    pub ret: ReturnDescriptor,
}

/// Binding site: the `let` node plus the part of the binding (Vec metadata has three)
pub type SlotKey = (NodeId, usize);

impl Frame {
    /// Addresses reserved by this frame
    pub fn range(&self) -> std::ops::Range<Address> {
        self.base..self.base + self.size
    }
}

impl Memory {
    /// Reserve `size` cells below the current stack pointer for a new frame
    pub fn push_frame(
        &mut self,
        name: &str,
        size: usize,
        ret: ReturnDescriptor,
    ) -> Result<&Frame, RuntimeError> {
        let new_sp = match self.sp.checked_sub(size) {
            Some(sp) if sp >= STACK_LIMIT => sp,
            _ => {
                return Err(RuntimeError::StackOverflow {
                    requested: size,
                    stack_pointer: self.sp,
                })
            }
        };

        let index = self.frames.len();
        for addr in new_sp..self.sp {
            self.cells[addr] = Cell::owned_by(index);
        }

        debug!(function = name, base = new_sp, size, "push frame");
        self.frames.push(Frame {
            function: name.to_string(),
            base: new_sp,
            size,
            vars: FxHashMap::default(),
            slots_allocated: 0,
            contexts: FxHashMap::default(),
            reserved: FxHashMap::default(),
            ret,
        });
        self.sp = new_sp;

        Ok(&self.frames[index])
    }

    /// Remove the top frame and blank its cells. No-op without frames.
    pub fn pop_frame(&mut self) -> Option<Frame> {
        let frame = self.frames.pop()?;
        for addr in frame.range() {
            self.cells[addr] = Cell::default();
        }
        self.sp += frame.size;
        debug!(function = %frame.function, base = frame.base, "pop frame");
        Some(frame)
    }

    /// Bind `span` contiguous cells at the top of the current frame's free region.
    ///
    /// `values` is distributed element-wise; missing elements stay uninitialized.
    /// Arrays and spans larger than one label their cells `label[i]` and register
    /// `label` at the first (lowest) address.
    pub fn alloc_stack_var(
        &mut self,
        label: &str,
        ty: Option<TypeTag>,
        values: &[Value],
        is_pointer: bool,
        span: usize,
    ) -> Result<Address, RuntimeError> {
        let index = self.frames.len().checked_sub(1).ok_or(RuntimeError::NoStackFrame)?;
        let frame = &mut self.frames[index];

        if frame.slots_allocated + span > frame.size {
            return Err(RuntimeError::StackOverflow {
                requested: span,
                stack_pointer: frame.base,
            });
        }

        let addr = frame.base + frame.size - span - frame.slots_allocated;
        frame.slots_allocated += span;
        frame.vars.insert(label.to_string(), addr);

        for i in 0..span {
            self.cells[addr + i] = Cell {
                value: values.get(i).cloned().unwrap_or_default(),
                label: if span > 1 || matches!(ty, Some(TypeTag::Array(..))) {
                    format!("{}[{}]", label, i)
                } else {
                    label.to_string()
                },
                ty: ty.clone(),
                freed: false,
                is_pointer,
                frame: Some(index),
            };
        }

        Ok(addr)
    }

    /// Bind a name for a binding site, reusing the site's earlier slots in this frame.
    ///
    /// A `let` inside a loop body runs once per iteration; each run rebinds the same
    /// cells instead of consuming fresh ones.
    pub fn bind_stack_var(
        &mut self,
        key: SlotKey,
        label: &str,
        ty: Option<TypeTag>,
        values: &[Value],
        is_pointer: bool,
        span: usize,
    ) -> Result<Address, RuntimeError> {
        let index = self.frames.len().checked_sub(1).ok_or(RuntimeError::NoStackFrame)?;

        let Some(&(addr, reserved_span)) = self.frames[index].reserved.get(&key) else {
            let addr = self.alloc_stack_var(label, ty, values, is_pointer, span)?;
            self.frames[index].reserved.insert(key, (addr, span));
            return Ok(addr);
        };

        if reserved_span != span {
            let addr = self.alloc_stack_var(label, ty, values, is_pointer, span)?;
            self.frames[index].reserved.insert(key, (addr, span));
            return Ok(addr);
        }

        self.frames[index].vars.insert(label.to_string(), addr);
        for i in 0..span {
            self.cells[addr + i] = Cell {
                value: values.get(i).cloned().unwrap_or_default(),
                label: if span > 1 || matches!(ty, Some(TypeTag::Array(..))) {
                    format!("{}[{}]", label, i)
                } else {
                    label.to_string()
                },
                ty: ty.clone(),
                freed: false,
                is_pointer,
                frame: Some(index),
            };
        }
        Ok(addr)
    }

    /// Forget a name in the current frame so an outer or differently-shaped binding shows through
    pub fn unbind(&mut self, label: &str) {
        if let Some(frame) = self.frames.last_mut() {
            frame.vars.remove(label);
        }
    }
}
