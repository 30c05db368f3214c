//! Memory operations shared by expressions and statements
//!
//! This module provides the address arithmetic the evaluator relies on:
//!
//! - Pointer chasing with sentinel checks ([`Machine::target_address`])
//! - Vec metadata access and buffer copies
//! - Materialization: turning places (array bases, Vec metadata addresses) and
//!   literals (`vec![..]`, `Box::new(..)`) into concrete values before a
//!   binding, assignment, return or by-value argument takes them
//!
//! # Memory Layout
//!
//! - Arrays: elements stored contiguously, the binding address is element 0
//! - Vec metadata: `[cap, len, ptr]` at ascending addresses, the binding address is `cap`
//! - Box: a single heap cell, the binding holds its address

use crate::interpreter::errors::RuntimeError;
use crate::interpreter::eval::EvalResult;
use crate::interpreter::machine::Machine;
use crate::memory::{Address, Value, DANGLING, MEM_SIZE};
use crate::parser::ast::{TypeTag, VecField};

/// Decoded Vec metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VecMeta {
    pub cap: usize,
    pub len: usize,
    pub ptr: Address,
}

impl Machine {
    /// Values of `count` consecutive cells starting at `base`
    pub(crate) fn read_values(&self, base: Address, count: usize) -> Result<Vec<Value>, RuntimeError> {
        (base..base + count)
            .map(|addr| self.memory.cell(addr).map(|cell| cell.value.clone()))
            .collect()
    }

    /// `base + index`, rejecting anything outside the address space
    pub(crate) fn offset(&self, base: Address, index: i32) -> Result<Address, RuntimeError> {
        let addr = base as i64 + index as i64;
        if addr < 0 || addr >= MEM_SIZE as i64 {
            return Err(RuntimeError::InvalidPointer {
                message: format!("index {} from 0x{:02X} leaves memory", index, base),
                address: None,
            });
        }
        Ok(addr as Address)
    }

    /// Follow a pointer `levels` times and return the final target address.
    ///
    /// Every hop must hold an in-range integer; null and freed sentinels are
    /// reported as invalid pointers.
    pub(crate) fn target_address(&self, pointer: &EvalResult, levels: usize) -> Result<Address, RuntimeError> {
        let mut addr = checked_address(pointer.get_scalar()?)?;
        for _ in 1..levels {
            let cell = self.memory.cell(addr)?;
            addr = checked_address(&cell.value)?;
        }
        Ok(addr)
    }

    /// Read the metadata block at `base`
    pub(crate) fn vec_metadata(&self, base: Address) -> Result<VecMeta, RuntimeError> {
        let word = |field: VecField| -> Result<usize, RuntimeError> {
            let cell = self.memory.cell(base + field.offset())?;
            match cell.value {
                Value::Int(n) if n >= 0 => Ok(n as usize),
                ref other => Err(RuntimeError::CorruptedMetadata {
                    message: format!("{} at 0x{:02X} holds {}", field.name(), base + field.offset(), other.kind_name()),
                }),
            }
        };

        let meta = VecMeta {
            cap: word(VecField::Cap)?,
            len: word(VecField::Len)?,
            ptr: word(VecField::Ptr)?,
        };

        if meta.len > meta.cap {
            return Err(RuntimeError::CorruptedMetadata {
                message: format!("len {} exceeds cap {}", meta.len, meta.cap),
            });
        }
        Ok(meta)
    }

    /// Metadata base of the Vec a result designates: a Vec place or a pointer to one
    pub(crate) fn vec_base(&self, object: &EvalResult) -> Result<Address, RuntimeError> {
        if object.is_vec_place() || (object.is_pointer && object.ty.points_to_vec()) {
            return object.as_address();
        }
        Err(RuntimeError::type_error("Vec", &object.ty))
    }

    /// Address of element 0 for an indexing base: a Vec's buffer, an array or a pointer
    pub(crate) fn element_base(&self, base: &EvalResult) -> Result<Address, RuntimeError> {
        if base.is_vec_place() || (base.is_pointer && base.ty.points_to_vec()) {
            let meta = self.vec_metadata(base.as_address()?)?;
            return Ok(meta.ptr);
        }
        base.as_address()
    }

    /// Name a Vec's buffer after its metadata label (`v.cap` → `v`)
    pub(crate) fn vec_name(&self, base: Address) -> String {
        self.memory
            .cell(base)
            .ok()
            .and_then(|cell| cell.label.strip_suffix(".cap").map(str::to_string))
            .unwrap_or_else(|| "vec".to_string())
    }

    /// Allocate a buffer of `cap` cells and copy the first `len` elements of `from` into it
    pub(crate) fn copy_buffer(&mut self, label: &str, from: Address, len: usize, cap: usize) -> Result<Address, RuntimeError> {
        let to = self.memory.alloc_buffer(label, TypeTag::I32, cap)?;
        for i in 0..len {
            let (value, is_pointer) = {
                let cell = self.memory.cell(from + i)?;
                (cell.value.clone(), cell.is_pointer)
            };
            self.memory.write(to + i, value, is_pointer)?;
        }
        Ok(to)
    }

    /// Read array and Vec places into their values; anything else passes through
    pub(crate) fn materialize_place(&self, result: EvalResult) -> Result<EvalResult, RuntimeError> {
        if result.is_vec_place() {
            let base = result.as_address()?;
            let words = self.read_values(base, 3)?;
            return Ok(EvalResult::many(words, result.ty));
        }
        if result.is_array_place() {
            let base = result.as_address()?;
            let count = result.ty.array_len().unwrap_or(1);
            let values = self.read_values(base, count)?;
            return Ok(EvalResult::many(values, result.ty));
        }
        Ok(result)
    }

    /// Produce the concrete value a binding named `label` receives.
    ///
    /// `vec![..]` gets its heap buffer here (an empty one stays [`DANGLING`]
    /// with capacity 0) and `Box::new(..)` its heap cell.
    pub(crate) fn materialize(&mut self, result: EvalResult, label: &str) -> Result<EvalResult, RuntimeError> {
        match result.ty {
            TypeTag::VecLiteral => {
                let len = result.values.len();
                let ptr = if len == 0 {
                    DANGLING
                } else {
                    self.memory.alloc_buffer(label, TypeTag::I32, len)?
                };
                for (i, value) in result.values.into_iter().enumerate() {
                    self.memory.write(ptr + i, value, false)?;
                }
                Ok(EvalResult::many(
                    vec![Value::Int(len as i32), Value::Int(len as i32), Value::Int(ptr as i32)],
                    TypeTag::Vec(Box::new(TypeTag::I32)),
                ))
            }
            TypeTag::BoxLiteral => {
                let value = result.get_scalar()?.clone();
                let addr = self.memory.alloc_heap(&format!("*{}", label), TypeTag::I32)?;
                self.memory.write(addr, value, false)?;
                Ok(EvalResult::pointer(addr, TypeTag::Boxed(Box::new(TypeTag::I32))))
            }
            _ => self.materialize_place(result),
        }
    }
}

/// Validate one pointer hop
fn checked_address(value: &Value) -> Result<Address, RuntimeError> {
    match value {
        Value::Freed => Err(RuntimeError::InvalidPointer {
            message: "dangling pointer into freed memory".to_string(),
            address: None,
        }),
        Value::Null => Err(RuntimeError::InvalidPointer {
            message: "null pointer dereference".to_string(),
            address: None,
        }),
        Value::Int(n) => value.as_address().ok_or_else(|| RuntimeError::InvalidPointer {
            message: format!("address {} is outside memory", n),
            address: None,
        }),
        other => Err(RuntimeError::InvalidPointer {
            message: format!("{} is not an address", other.kind_name()),
            address: None,
        }),
    }
}
