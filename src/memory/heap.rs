//! Heap: first-fit runs between `HEAP_BOTTOM` and `STACK_LIMIT`
//!
//! There is no allocator bookkeeping beyond the cells themselves. A cell is
//! available when it was freed, or when nothing (frame, type, value) claims it.
//! Freed cells keep the `FREED` sentinel until reused so dangling reads stay visible.

use super::value::{Address, Cell, Value};
use super::{Memory, DANGLING, HEAP_BOTTOM, STACK_LIMIT};
use crate::interpreter::errors::RuntimeError;
use crate::parser::ast::TypeTag;
use tracing::trace;

impl Memory {
    /// Reserve one cell labelled `label`, first fit from `HEAP_BOTTOM`
    pub fn alloc_heap(&mut self, label: &str, ty: TypeTag) -> Result<Address, RuntimeError> {
        let addr = self.first_fit(1)?;
        self.cells[addr] = Cell {
            label: label.to_string(),
            ty: Some(ty),
            ..Cell::default()
        };
        trace!(addr, label, "heap alloc");
        Ok(addr)
    }

    /// Reserve a buffer of `size` contiguous cells labelled `name[i]`.
    ///
    /// Cells are typed but hold no value yet. A zero-sized request reserves
    /// nothing and yields [`DANGLING`].
    pub fn alloc_buffer(&mut self, name: &str, ty: TypeTag, size: usize) -> Result<Address, RuntimeError> {
        if size == 0 {
            return Ok(DANGLING);
        }

        let addr = self.first_fit(size)?;
        for (i, cell) in self.cells[addr..addr + size].iter_mut().enumerate() {
            *cell = Cell {
                label: format!("{}[{}]", name, i),
                ty: Some(ty.clone()),
                ..Cell::default()
            };
        }

        trace!(addr, size, name, "heap alloc buffer");
        Ok(addr)
    }

    fn first_fit(&self, size: usize) -> Result<Address, RuntimeError> {
        (HEAP_BOTTOM..STACK_LIMIT)
            .find(|&start| self.has_enough_space(start, size))
            .ok_or(RuntimeError::HeapOverflow { requested: size })
    }

    fn has_enough_space(&self, addr: Address, size: usize) -> bool {
        if addr + size > STACK_LIMIT {
            return false;
        }
        self.cells[addr..addr + size].iter().all(Cell::is_free)
    }

    /// Mark a heap cell freed. Already-freed cells are marked again without complaint.
    pub fn free_cell(&mut self, addr: Address) -> Result<(), RuntimeError> {
        let cell = self.cell_mut(addr)?;
        cell.freed = true;
        cell.value = Value::Freed;
        cell.label.clear();
        cell.is_pointer = false;
        trace!(addr, "heap free");
        Ok(())
    }
}
