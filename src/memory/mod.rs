//! Memory model for the interpreter
//!
//! A single flat array of [`MEM_SIZE`] cells holds both regions:
//!
//! ```text
//! 0x19 ┬ STACK_TOP      frames grow downward
//!      │  main
//!      │  callee ...
//! 0x0C ┼ STACK_LIMIT
//!      │  heap runs, first-fit from the bottom
//! 0x01 ┴ HEAP_BOTTOM
//! 0x00   never allocated
//! ```
//!
//! - [`value`]: [`Value`] scalars and the [`Cell`] that stores them
//! - `stack`: frames, [`Memory::push_frame`], [`Memory::alloc_stack_var`]
//! - `heap`: [`Memory::alloc_heap`], [`Memory::alloc_buffer`] and freeing
//!
//! Every cell records its owning frame, so the interpreter and the renderer
//! share one addressing scheme and pointers cross regions uniformly.

pub mod constants;
mod heap;
mod stack;
pub mod value;

pub use constants::{DANGLING, HEAP_BOTTOM, MEM_SIZE, STACK_LIMIT, STACK_TOP};
pub use stack::{Frame, ReturnDescriptor};
pub use value::{Address, Cell, Value};

use crate::interpreter::context::ExecutionContext;
use crate::interpreter::errors::RuntimeError;
use crate::parser::ast::NodeId;

/// The simulated address space plus the frame stack that partitions it
#[derive(Debug, Clone)]
pub struct Memory {
    cells: Vec<Cell>,
    frames: Vec<Frame>,
    /// Lowest address reserved by a live frame (`STACK_TOP + 1` when empty)
    sp: Address,
}

impl Memory {
    pub fn new() -> Self {
        Memory {
            cells: vec![Cell::default(); MEM_SIZE],
            frames: Vec::new(),
            sp: STACK_TOP + 1,
        }
    }

    /// All cells, indexed by address
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, addr: Address) -> Result<&Cell, RuntimeError> {
        self.cells.get(addr).ok_or_else(|| out_of_range(addr))
    }

    pub fn cell_mut(&mut self, addr: Address) -> Result<&mut Cell, RuntimeError> {
        self.cells.get_mut(addr).ok_or_else(|| out_of_range(addr))
    }

    /// Overwrite a cell's value and pointer flag, keeping its label and type
    pub fn write(&mut self, addr: Address, value: Value, is_pointer: bool) -> Result<(), RuntimeError> {
        let cell = self.cell_mut(addr)?;
        cell.value = value;
        cell.is_pointer = is_pointer;
        Ok(())
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn stack_pointer(&self) -> Address {
        self.sp
    }

    pub fn current_frame(&self) -> Option<&Frame> {
        self.frames.last()
    }

    /// Resolve a name to an address.
    ///
    /// Frames are searched innermost first, then unowned heap cells carrying the
    /// label. Within a frame the newest binding of a name wins.
    pub fn get_addr(&self, label: &str) -> Result<Address, RuntimeError> {
        for frame in self.frames.iter().rev() {
            if let Some(&addr) = frame.vars.get(label) {
                return Ok(addr);
            }
        }

        self.cells
            .iter()
            .position(|cell| cell.frame.is_none() && !cell.freed && cell.label == label)
            .ok_or_else(|| RuntimeError::VariableNotFound {
                name: label.to_string(),
            })
    }

    /// Execution context of a node in the current frame, created on first access
    pub fn context(&mut self, id: NodeId) -> Result<&mut ExecutionContext, RuntimeError> {
        let frame = self.frames.last_mut().ok_or(RuntimeError::NoStackFrame)?;
        Ok(frame.contexts.entry(id).or_default())
    }

    /// Execution context of a node in the current frame, without creating it
    pub fn peek_context(&self, id: NodeId) -> Option<&ExecutionContext> {
        self.frames.last().and_then(|frame| frame.contexts.get(&id))
    }

    /// Discard the contexts of the given nodes in the current frame
    pub fn reset_contexts(&mut self, ids: &[NodeId]) {
        if let Some(frame) = self.frames.last_mut() {
            for id in ids {
                frame.contexts.remove(id);
            }
        }
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

fn out_of_range(addr: Address) -> RuntimeError {
    RuntimeError::InvalidPointer {
        message: format!("address 0x{:02X} is outside memory", addr),
        address: Some(addr),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::TypeTag;

    #[test]
    fn test_push_pop_restores_stack_pointer() {
        let mut memory = Memory::new();
        memory
            .push_frame("main", 3, ReturnDescriptor::default())
            .unwrap();
        memory.push_frame("f", 2, ReturnDescriptor::default()).unwrap();
        assert_eq!(memory.stack_pointer(), STACK_TOP + 1 - 5);

        memory.pop_frame();
        memory.pop_frame();
        assert_eq!(memory.stack_pointer(), STACK_TOP + 1);
        assert!(memory.cells().iter().all(Cell::is_blank));
    }

    #[test]
    fn test_stack_overflow_at_limit() {
        let mut memory = Memory::new();
        let room = STACK_TOP + 1 - STACK_LIMIT;
        assert!(memory
            .push_frame("main", room, ReturnDescriptor::default())
            .is_ok());
        let result = memory.push_frame("f", 1, ReturnDescriptor::default());
        assert!(matches!(result, Err(RuntimeError::StackOverflow { .. })));
    }

    #[test]
    fn test_slots_fill_frame_from_the_top() {
        let mut memory = Memory::new();
        memory
            .push_frame("main", 4, ReturnDescriptor::default())
            .unwrap();
        let a = memory
            .alloc_stack_var("a", Some(TypeTag::I32), &[Value::Int(1)], false, 1)
            .unwrap();
        let arr = memory
            .alloc_stack_var(
                "arr",
                Some(TypeTag::I32),
                &[Value::Int(7), Value::Int(8)],
                false,
                2,
            )
            .unwrap();

        assert_eq!(a, STACK_TOP);
        assert_eq!(arr, STACK_TOP - 2);
        assert_eq!(memory.cell(arr + 1).unwrap().label, "arr[1]");
        assert_eq!(memory.cell(arr + 1).unwrap().value, Value::Int(8));
        assert_eq!(memory.get_addr("arr").unwrap(), arr);
    }

    #[test]
    fn test_frame_extent_is_enforced() {
        let mut memory = Memory::new();
        memory
            .push_frame("main", 1, ReturnDescriptor::default())
            .unwrap();
        memory
            .alloc_stack_var("a", None, &[Value::Int(1)], false, 1)
            .unwrap();
        let result = memory.alloc_stack_var("b", None, &[Value::Int(2)], false, 1);
        assert!(matches!(result, Err(RuntimeError::StackOverflow { .. })));
    }

    #[test]
    fn test_shadowing_resolves_newest_binding() {
        let mut memory = Memory::new();
        memory
            .push_frame("main", 2, ReturnDescriptor::default())
            .unwrap();
        let first = memory
            .alloc_stack_var("x", None, &[Value::Int(1)], false, 1)
            .unwrap();
        let second = memory
            .alloc_stack_var("x", None, &[Value::Int(2)], false, 1)
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(memory.get_addr("x").unwrap(), second);
    }

    #[test]
    fn test_heap_first_fit_reuses_freed_run() {
        let mut memory = Memory::new();
        let addr = memory.alloc_buffer("buf", TypeTag::I32, 3).unwrap();
        assert_eq!(addr, HEAP_BOTTOM);

        for a in addr..addr + 3 {
            memory.free_cell(a).unwrap();
        }
        let again = memory.alloc_buffer("buf", TypeTag::I32, 3).unwrap();
        assert_eq!(again, addr);
    }

    #[test]
    fn test_one_cell_buffer_keeps_its_index() {
        let mut memory = Memory::new();
        let addr = memory.alloc_buffer("v", TypeTag::I32, 1).unwrap();
        assert_eq!(memory.cell(addr).unwrap().label, "v[0]");
        assert!(memory.get_addr("v").is_err());
    }

    #[test]
    fn test_heap_overflow() {
        let mut memory = Memory::new();
        let capacity = STACK_LIMIT - HEAP_BOTTOM;
        assert!(memory.alloc_buffer("a", TypeTag::I32, capacity).is_ok());
        let result = memory.alloc_heap("*b", TypeTag::I32);
        assert!(matches!(result, Err(RuntimeError::HeapOverflow { .. })));
    }

    #[test]
    fn test_unknown_name_is_reported() {
        let memory = Memory::new();
        assert!(matches!(
            memory.get_addr("ghost"),
            Err(RuntimeError::VariableNotFound { .. })
        ));
    }
}
